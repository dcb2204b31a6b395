/*!
 * Common test utilities for the autotranslate test suite
 */

use anyhow::Result;
use axum::Router;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Three-cue SRT used across tests
pub const SAMPLE_SRT: &str = "1
00:00:01,000 --> 00:00:04,000
This is a test subtitle.

2
00:00:05,000 --> 00:00:09,000
It contains multiple entries.

3
00:00:10,000 --> 00:00:14,000
For testing purposes.
";

/// Route library logs to the test output; safe to call from every test
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Build an SRT with `count` cues, cue `i` reading `Line number i`
pub fn numbered_srt(count: usize) -> String {
    (1..=count)
        .map(|i| format!("{}\n00:00:{:02},000 --> 00:00:{:02},500\nLine number {}\n", i, i % 60, i % 60, i))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Serve a router on an ephemeral local port and return its base URL
pub async fn spawn_stub(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", address)
}
