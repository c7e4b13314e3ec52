//! Fuzz test for the guild config cache codec
//!
//! Arbitrary bytes are fed to the decoder for every schema. Decoding must
//! either fail cleanly or produce a config that re-encodes to a blob the
//! decoder accepts again.
//!
//! Run with: cargo +nightly fuzz run config_codec_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use sonnet_storage::cache::codec::{decode, encode};
use sonnet_storage::cache::ALL_SCHEMAS;

fuzz_target!(|data: &[u8]| {
    for schema in ALL_SCHEMAS {
        if let Ok(config) = decode(schema, data) {
            let blob = encode(schema, &config).expect("decoded config re-encodes");
            let again = decode(schema, &blob).expect("re-encoded blob decodes");
            assert_eq!(again, config);
        }
    }
});
