/*!
 * Pipeline tests over the mock providers
 */

use std::sync::Arc;
use std::time::Duration;

use autotranslate::providers::mock::MockProvider;
use autotranslate::subtitle_processor::SubtitleDocument;
use autotranslate::translation::{BatchTranslator, RetryPolicy, TranslationClient, TranslationPipeline};

use crate::common::{SAMPLE_SRT, init_test_logging, numbered_srt};

fn pipeline(provider: &MockProvider, concurrency: usize, max_chunk_chars: usize) -> TranslationPipeline {
    init_test_logging();
    let client = TranslationClient::new(Arc::new(provider.clone()), RetryPolicy::immediate(3));
    TranslationPipeline::new(BatchTranslator::new(client, concurrency), max_chunk_chars)
}

#[tokio::test]
async fn test_translate_document_withDifferentConcurrency_shouldProduceSameOutput() {
    let doc = SubtitleDocument::parse(&numbered_srt(40));

    let serial_provider = MockProvider::uppercase().with_delay(Duration::from_millis(2));
    let parallel_provider = MockProvider::uppercase().with_delay(Duration::from_millis(2));

    let serial = pipeline(&serial_provider, 1, 40).translate_document(&doc, "de").await.unwrap();
    let parallel = pipeline(&parallel_provider, 4, 40).translate_document(&doc, "de").await.unwrap();

    assert_eq!(serial.report.chunks, 20);
    assert_eq!(serial.document, parallel.document);
    assert_eq!(serial_provider.peak_in_flight(), 1);
    assert!(parallel_provider.peak_in_flight() <= 4);
    assert_eq!(parallel.document.blocks[39].text_lines, vec!["LINE NUMBER 40"]);
}

#[tokio::test]
async fn test_translate_document_withIdentityProvider_shouldRoundTrip() {
    let raw = "1\n00:00:01,000 --> 00:00:02,000\n  indented line\n- dash line\n\n2\n00:00:03,000 --> 00:00:04,000\n\n3\n00:00:05,000 --> 00:00:06,000\n<i>Italic</i>\n";
    let provider = MockProvider::identity();

    for limit in [1, 10, 1500] {
        let result = pipeline(&provider, 3, limit)
            .translate_document(&SubtitleDocument::parse(raw), "fr")
            .await
            .unwrap();
        assert_eq!(result.document.to_srt(), raw, "round trip failed with limit {}", limit);
    }
}

#[tokio::test]
async fn test_translate_document_withIntermittentFailures_shouldStillComplete() {
    let provider = MockProvider::intermittent(3);
    let raw = numbered_srt(30);

    // Single worker: every failed call is followed by a successful one
    let result = pipeline(&provider, 1, 60)
        .translate_document(&SubtitleDocument::parse(&raw), "es")
        .await
        .unwrap();

    assert!(result.report.is_complete());
    assert!(result.report.calls > result.report.chunks);
    assert_eq!(result.document.to_srt(), raw);
}

#[tokio::test]
async fn test_translate_document_withRateLimitedEndpoint_shouldKeepEveryBlock() {
    let provider = MockProvider::rate_limited();
    let doc = SubtitleDocument::parse(&numbered_srt(12));

    let result = pipeline(&provider, 3, 60).translate_document(&doc, "it").await.unwrap();

    assert_eq!(result.document, doc);
    assert_eq!(result.report.degraded_chunks.len(), result.report.chunks);
    assert_eq!(result.report.calls, result.report.chunks * 3);
}

#[tokio::test]
async fn test_translate_document_withMergingEndpoint_shouldRecoverPerBlock() {
    let provider = MockProvider::merging();
    let doc = SubtitleDocument::parse(SAMPLE_SRT);

    let result = pipeline(&provider, 2, 1500).translate_document(&doc, "pt-BR").await.unwrap();

    assert_eq!(result.report.recovered_chunks, vec![0]);
    assert!(result.report.is_complete());
    assert_eq!(result.document.len(), 3);
    assert_eq!(result.document.to_srt(), SAMPLE_SRT);
    // One merged call, then one per block
    assert_eq!(provider.request_count(), 4);
}

#[tokio::test]
async fn test_translate_document_withUppercase_shouldPreserveTiming() {
    let doc = SubtitleDocument::parse(SAMPLE_SRT);
    let result = pipeline(&MockProvider::uppercase(), 2, 30).translate_document(&doc, "ja").await.unwrap();

    for (original, translated) in doc.blocks.iter().zip(&result.document.blocks) {
        assert_eq!(original.time_range, translated.time_range);
        assert_eq!(original.joined_text().to_uppercase(), translated.joined_text());
    }
}
