/*!
 * Tests for application configuration
 */

use std::time::Duration;

use autotranslate::app_config::{CacheBackend, Config, LogLevel, TranslationConfig};
use log::LevelFilter;

use crate::common::{create_temp_dir, create_test_file};

#[test]
fn test_load_or_create_withUserFile_shouldApplyValuesAndDefaults() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(
        dir.path(),
        "conf.json",
        r#"{
            "server": {"port": 7000, "default_target_language": "es"},
            "source": {"upstreams": ["https://subs.example"]},
            "cache": {"backend": "disk", "directory": "/tmp/subs-cache", "ttl_hours": 2},
            "log_level": "debug"
        }"#,
    )
    .unwrap();

    let config = Config::load_or_create(&path).unwrap();

    assert_eq!(config.server.port, 7000);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.default_target_language, "es");
    assert_eq!(config.source.upstreams, vec!["https://subs.example"]);
    assert_eq!(config.cache.backend, CacheBackend::Disk);
    assert_eq!(config.cache.ttl(), Duration::from_secs(2 * 3600));
    assert_eq!(config.log_level, LogLevel::Debug);
    assert_eq!(config.translation.endpoint, "https://libretranslate.com");
    assert!(config.validate().is_ok());
}

#[test]
fn test_load_or_create_withMalformedFile_shouldFail() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(dir.path(), "conf.json", "{ not json").unwrap();

    assert!(Config::load_or_create(&path).is_err());
}

#[test]
fn test_api_key_withBlankValue_shouldBeIgnored() {
    let mut config = TranslationConfig::default();
    assert_eq!(config.get_api_key(), None);

    config.api_key = Some("   ".to_string());
    assert_eq!(config.get_api_key(), None);

    config.api_key = Some("secret".to_string());
    assert_eq!(config.get_api_key().as_deref(), Some("secret"));
}

#[test]
fn test_clamps_withSmallValues_shouldRaiseToMinimum() {
    let config = TranslationConfig {
        timeout_secs: 1,
        concurrent_requests: 1,
        ..TranslationConfig::default()
    };

    assert_eq!(config.request_timeout(), Duration::from_secs(15));
    assert_eq!(config.optimal_concurrent_requests(), 2);
}

#[test]
fn test_validate_withBadPublicBaseUrl_shouldFail() {
    let mut config = Config::default();
    config.server.public_base_url = Some("addon.example".to_string());
    assert!(config.validate().is_err());

    config.server.public_base_url = Some("https://addon.example".to_string());
    assert!(config.validate().is_ok());
}

#[test]
fn test_log_level_shouldMapToFilter() {
    assert_eq!(LogLevel::Warn.to_level_filter(), LevelFilter::Warn);
    assert_eq!(LogLevel::default().to_level_filter(), LevelFilter::Info);
}
