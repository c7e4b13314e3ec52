//! Sonnet Test Utilities
//!
//! Centralized test infrastructure for the Sonnet workspace:
//! - Proptest generators for VFS paths, guild configs, directives and events
//! - Fixtures for common scenarios (seeded config stores, message bursts)
//! - Custom assertions for Sonnet error variants

// Re-export the mock config store from its source crate
pub use sonnet_storage::MockConfigStore;

// Re-export core types for convenience
pub use sonnet_automod::{AbuseEvent, DetectorName, DetectorSpec};
pub use sonnet_core::{
    CodecError, CryptoError, CryptoResult, GuildId, MessageId, SonnetError, SonnetResult,
    TimestampMillis, UserId, ValidationError, VfsError, VfsResult,
};
pub use sonnet_crypto::{AttachmentKey, IV_LEN, KEY_LEN};
pub use sonnet_storage::{
    CacheDirective, CacheTarget, ConfigSchema, FieldKind, FieldValue, FilePayload, GuildConfig,
    StatEvent,
};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating Sonnet values.

    use super::*;
    use proptest::prelude::*;

    // === Identity Generators ===

    pub fn arb_user_id() -> impl Strategy<Value = UserId> {
        1u64..16
    }

    // === VFS Generators ===

    /// A single non-empty path component.
    pub fn arb_path_component() -> impl Strategy<Value = String> {
        "[a-z0-9_.-]{1,8}"
    }

    /// A `/`-joined path of one to four components.
    pub fn arb_vfs_path() -> impl Strategy<Value = String> {
        prop::collection::vec(arb_path_component(), 1..5).prop_map(|parts| parts.join("/"))
    }

    pub fn arb_file_payload() -> impl Strategy<Value = FilePayload> {
        prop_oneof![
            prop::collection::vec(any::<u8>(), 0..64).prop_map(FilePayload::Bytes),
            prop::collection::btree_map(any::<u64>(), any::<u64>(), 0..8)
                .prop_map(FilePayload::Counters),
            prop::collection::vec("\\PC{0,12}", 0..6).prop_map(FilePayload::List),
        ]
    }

    // === Config Generators ===

    /// A CSV list item as the store normalises it: lowercase, no commas.
    pub fn arb_csv_item() -> impl Strategy<Value = String> {
        "[a-z0-9._-]{1,12}"
    }

    /// A value matching a field's kind.
    pub fn arb_field_value(kind: FieldKind) -> BoxedStrategy<FieldValue> {
        match kind {
            FieldKind::Scalar => "\\PC{0,24}".prop_map(FieldValue::Scalar).boxed(),
            FieldKind::CsvList => prop::collection::vec(arb_csv_item(), 0..6)
                .prop_map(FieldValue::List)
                .boxed(),
            FieldKind::StringList => prop::collection::vec("\\PC{0,16}", 0..6)
                .prop_map(FieldValue::List)
                .boxed(),
        }
    }

    /// A config holding a value for every field of `schema`.
    pub fn arb_guild_config(schema: &'static ConfigSchema) -> impl Strategy<Value = GuildConfig> {
        let fields: Vec<BoxedStrategy<(&'static str, FieldValue)>> = schema
            .fields
            .iter()
            .map(|field| {
                let name = field.name;
                arb_field_value(field.kind)
                    .prop_map(move |value| (name, value))
                    .boxed()
            })
            .collect();
        fields.prop_map(|pairs| {
            let mut config = GuildConfig::new();
            for (name, value) in pairs {
                config.insert(name, value);
            }
            config
        })
    }

    // === Directive Generators ===

    pub fn arb_cache_target() -> impl Strategy<Value = CacheTarget> {
        prop_oneof![
            arb_vfs_path().prop_map(CacheTarget::file),
            arb_vfs_path().prop_map(CacheTarget::directory),
        ]
    }

    pub fn arb_cache_directive() -> impl Strategy<Value = CacheDirective> {
        prop_oneof![
            Just(CacheDirective::Keep),
            Just(CacheDirective::Purge),
            Just(CacheDirective::Regenerate),
            prop::collection::vec(arb_cache_target(), 1..4).prop_map(CacheDirective::Direct),
        ]
    }

    pub fn arb_stat_event() -> impl Strategy<Value = StatEvent> {
        prop::sample::select(StatEvent::ALL.to_vec())
    }

    // === Automod Generators ===

    /// A single event in `guild_id` at or after `start`.
    pub fn arb_abuse_event(guild_id: GuildId, start: TimestampMillis) -> impl Strategy<Value = AbuseEvent> {
        (arb_user_id(), 0u64..10_000, 0u32..400).prop_map(move |(user_id, offset, char_count)| AbuseEvent {
            guild_id,
            user_id,
            timestamp_millis: start + offset,
            char_count,
        })
    }

    /// A time-ordered stream of events in one guild.
    pub fn arb_event_stream(guild_id: GuildId, max_len: usize) -> impl Strategy<Value = Vec<AbuseEvent>> {
        prop::collection::vec((arb_user_id(), 0u64..1_500, 0u32..400), 1..max_len.max(2)).prop_map(
            move |steps| {
                let mut now = 1_000_000;
                steps
                    .into_iter()
                    .map(|(user_id, gap, char_count)| {
                        now += gap;
                        AbuseEvent {
                            guild_id,
                            user_id,
                            timestamp_millis: now,
                            char_count,
                        }
                    })
                    .collect()
            },
        )
    }

    /// A detector spec with a non-trivial window.
    pub fn arb_detector_spec() -> impl Strategy<Value = DetectorSpec> {
        prop_oneof![
            (1u64..5_000, 1u64..6).prop_map(|(window_millis, threshold_count)| {
                DetectorSpec::MessageRate {
                    window_millis,
                    threshold_count,
                }
            }),
            (1u64..5_000, 1u64..6, 1u64..2_000).prop_map(
                |(window_millis, threshold_count, threshold_chars)| DetectorSpec::CharRate {
                    window_millis,
                    threshold_count,
                    threshold_chars,
                }
            ),
        ]
    }

    // === Crypto Generators ===

    pub fn arb_attachment_key() -> impl Strategy<Value = AttachmentKey> {
        (any::<[u8; KEY_LEN]>(), any::<[u8; IV_LEN]>()).prop_map(|(key, iv)| AttachmentKey::new(key, iv))
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;

    /// A fixed, non-secret key for deterministic ciphertext.
    pub fn test_key() -> AttachmentKey {
        AttachmentKey::new([0x42; KEY_LEN], [0x24; IV_LEN])
    }

    /// A store with message-rate `count,seconds` and char-rate
    /// `count,seconds,chars` automod settings for `guild_id`.
    pub fn store_with_antispam(guild_id: GuildId, antispam: &str, char_antispam: &str) -> MockConfigStore {
        let store = MockConfigStore::new();
        store.insert(guild_id, "antispam", antispam);
        store.insert(guild_id, "char-antispam", char_antispam);
        store
    }

    /// `count` events from one user, `spacing_millis` apart, starting at `start`.
    pub fn message_burst(
        guild_id: GuildId,
        user_id: UserId,
        start: TimestampMillis,
        spacing_millis: u64,
        count: usize,
        char_count: u32,
    ) -> Vec<AbuseEvent> {
        (0..count as u64)
            .map(|i| AbuseEvent {
                guild_id,
                user_id,
                timestamp_millis: start + i * spacing_millis,
                char_count,
            })
            .collect()
    }

    /// Deterministic pseudo-random bytes of `len`.
    pub fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i.wrapping_mul(31) % 251) as u8).collect()
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for Sonnet-specific validation.

    use super::*;

    /// Assert that a SonnetResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &SonnetResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a VFS operation failed with NotFound.
    #[track_caller]
    pub fn assert_vfs_not_found<T: std::fmt::Debug>(result: &VfsResult<T>) {
        match result {
            Err(VfsError::NotFound { .. }) => {}
            other => panic!("Expected NotFound, got: {:?}", other),
        }
    }

    /// Assert that a VFS operation failed with TypeMismatch.
    #[track_caller]
    pub fn assert_type_mismatch<T: std::fmt::Debug>(result: &VfsResult<T>) {
        match result {
            Err(VfsError::TypeMismatch { .. }) => {}
            other => panic!("Expected TypeMismatch, got: {:?}", other),
        }
    }

    /// Assert that a SonnetResult is a corruption signal.
    #[track_caller]
    pub fn assert_corruption<T: std::fmt::Debug>(result: &SonnetResult<T>) {
        match result {
            Err(e) if e.is_corruption() => {}
            other => panic!("Expected corruption error, got: {:?}", other),
        }
    }

    /// Assert that a codec decode failed closed.
    #[track_caller]
    pub fn assert_codec_error<T: std::fmt::Debug>(result: &Result<T, CodecError>) {
        assert!(result.is_err(), "Expected codec error, got Ok: {:?}", result);
    }

    /// Assert that a reader rejected a file as tampered.
    #[track_caller]
    pub fn assert_hmac_invalid<T>(result: &CryptoResult<T>) {
        match result {
            Err(CryptoError::HmacInvalid) => {}
            Err(other) => panic!("Expected HmacInvalid, got: {:?}", other),
            Ok(_) => panic!("Expected HmacInvalid, got Ok"),
        }
    }

    /// Assert that a reader rejected a file as not SONNETAES.
    #[track_caller]
    pub fn assert_not_sonnet_aes<T>(result: &CryptoResult<T>) {
        match result {
            Err(CryptoError::NotSonnetAes) => {}
            Err(other) => panic!("Expected NotSonnetAes, got: {:?}", other),
            Ok(_) => panic!("Expected NotSonnetAes, got Ok"),
        }
    }

    /// Assert that parsing failed with a ValidationError.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &Result<T, ValidationError>) {
        assert!(result.is_err(), "Expected ValidationError, got Ok: {:?}", result);
    }
}

// ============================================================================
// TESTS
// ============================================================================
