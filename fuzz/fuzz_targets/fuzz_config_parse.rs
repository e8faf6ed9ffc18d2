//! Fuzz target: configuration decoding
//!
//! Feeds arbitrary bytes to both the JSON and the postcard decoder and
//! verifies:
//! - No panics under arbitrary input
//! - Anything accepted also passes `validate()`
//! - An accepted config re-encodes and decodes to itself
//!
//! cargo fuzz run fuzz_config_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use luxloop::app::service::LightingService;
use luxloop::config::SystemConfig;

fn check(cfg: SystemConfig) {
    assert!(cfg.validate().is_ok());
    let bytes = cfg.to_bytes().expect("valid config must encode");
    assert_eq!(SystemConfig::from_bytes(&bytes).as_ref(), Ok(&cfg));
    // Any valid config must build a service.
    assert!(LightingService::new(cfg).is_ok());
}

fuzz_target!(|data: &[u8]| {
    if let Ok(cfg) = SystemConfig::from_bytes(data) {
        check(cfg);
    }
    if let Ok(text) = core::str::from_utf8(data) {
        if let Ok(cfg) = SystemConfig::from_json(text) {
            check(cfg);
        }
    }
});
