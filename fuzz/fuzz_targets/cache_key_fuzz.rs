//! Fuzz test for cache key decoding
//!
//! Cache keys are read back from an LMDB file and from text produced by other
//! processes, so both decoders see untrusted input. This target checks:
//! - Neither decoder panics on arbitrary input
//! - Anything that decodes re-encodes to the same bytes or text
//!
//! Run with: cargo +nightly fuzz run cache_key_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use stockroom_storage::TenantScopedKey;

fuzz_target!(|data: &[u8]| {
    if let Some(key) = TenantScopedKey::decode(data) {
        assert_eq!(&key.encode()[..], data, "binary key must re-encode exactly");
    }

    if let Ok(text) = std::str::from_utf8(data) {
        if let Some(key) = TenantScopedKey::parse(text) {
            let rendered = key.to_string();
            assert_eq!(
                TenantScopedKey::parse(&rendered),
                Some(key),
                "rendered key must parse back"
            );
        }
    }
});
