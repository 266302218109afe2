//! Fuzz target: `config::decode_blob`
//!
//! Feeds arbitrary bytes to the settings blob decoder and asserts that it
//! never panics, and that anything it accepts passes validation and
//! re-encodes to a blob that decodes to the same settings.
//!
//! cargo fuzz run fuzz_settings_blob

#![no_main]

use keyswitch::config;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(settings) = config::decode_blob(data) else {
        return;
    };
    assert!(settings.validate().is_ok(), "decoder accepted invalid settings");

    let blob = config::encode_blob(&settings).expect("validated settings must encode");
    assert_eq!(config::decode_blob(&blob).ok(), Some(settings));
});
