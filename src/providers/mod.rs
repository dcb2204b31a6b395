/*!
 * Provider implementations for translation endpoints.
 *
 * This module contains client implementations for the services that
 * translate chunk text:
 * - LibreTranslate: HTTP endpoint (also accepts MyMemory/Google-like shapes)
 * - Mock: deterministic providers for tests and offline runs
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::ProviderError;

/// Common trait for all translation endpoints
///
/// One call translates one piece of text. Implementations perform a single
/// attempt; retry and fallback live in `translation::core`.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Translate `text` into `target_language`
    ///
    /// # Arguments
    /// * `text` - The text to translate, possibly several blank-line separated blocks
    /// * `target_language` - Endpoint language code
    ///
    /// # Returns
    /// * `Result<String, ProviderError>` - The translated text or an error
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;

    /// Short name used in logs
    fn name(&self) -> &str;
}

pub mod libretranslate;
pub mod mock;
