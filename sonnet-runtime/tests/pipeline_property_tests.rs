//! Property-based tests for the message pipeline and cache directives.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use sonnet_runtime::{complete_command, handle_message, Context, InboundMessage, RuntimeConfig};
use sonnet_storage::cache::GuildPath;
use sonnet_storage::{read_global_statistics, read_statistics, MESSAGE_CONFIG};
use sonnet_test_utils::*;
use tokio::runtime::Runtime;
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::Layer;

// ============================================================================
// TEST HELPERS
// ============================================================================

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

/// Counts events whose message equals `message`.
struct MessageCounter {
    message: &'static str,
    hits: Arc<AtomicUsize>,
}

impl<S: tracing::Subscriber> Layer<S> for MessageCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: LayerContext<'_, S>) {
        let mut visitor = MessageVisitor(None);
        event.record(&mut visitor);
        if visitor.0.as_deref() == Some(self.message) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct MessageVisitor(Option<String>);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = Some(format!("{:?}", value));
        }
    }
}

fn test_context() -> Context {
    Context::new(RuntimeConfig::default()).expect("default config is valid")
}

/// Directives whose targets match what the pipeline actually writes.
fn arb_pipeline_directive() -> impl Strategy<Value = CacheDirective> {
    let target = prop_oneof![
        Just(CacheTarget::directory("caches")),
        Just(CacheTarget::directory("regex")),
        Just(CacheTarget::directory("antispam")),
        Just(CacheTarget::file(format!("caches/{}", MESSAGE_CONFIG.cache_file_name()))),
    ];
    prop_oneof![
        Just(CacheDirective::Keep),
        Just(CacheDirective::Purge),
        Just(CacheDirective::Regenerate),
        prop::collection::vec(target, 1..4).prop_map(CacheDirective::Direct),
    ]
}

fn inbound(event: &AbuseEvent, message_id: MessageId) -> InboundMessage {
    let content = "x".repeat(event.char_count as usize);
    InboundMessage::new(event.guild_id, message_id, event.user_id, event.timestamp_millis, content)
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every handled message is counted once per guild and once globally.
    #[test]
    fn prop_statistics_count_every_message(events in generators::arb_event_stream(4, 30)) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let mut ctx = test_context();
            let store = MockConfigStore::new();

            for (i, event) in events.iter().enumerate() {
                handle_message(&mut ctx, &store, inbound(event, i as u64)).await.unwrap();
            }

            let n = events.len() as u64;
            let guild = read_statistics(&ctx.kernel_ram, 4).unwrap();
            let global = read_global_statistics(&ctx.kernel_ram).unwrap();
            prop_assert_eq!(guild.get(&StatEvent::OnMessage).copied(), Some(n));
            prop_assert_eq!(global.get(&StatEvent::OnMessage).copied(), Some(n));
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Directives never fail, whatever state the cache is in, and guild-wide
    /// directives leave the config cache cold or warm as intended.
    #[test]
    fn prop_directives_apply_cleanly(
        directives in prop::collection::vec(arb_pipeline_directive(), 1..8),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let mut ctx = test_context();
            let store = MockConfigStore::new();
            let cache_path = MESSAGE_CONFIG.cache_path(7);

            for (i, directive) in directives.iter().enumerate() {
                let ts = 1_000 + i as u64 * 10_000;
                handle_message(&mut ctx, &store, InboundMessage::new(7, ts, 1, ts, "hi")).await.unwrap();

                let result = complete_command(&mut ctx, &store, 7, directive).await;
                prop_assert!(result.is_ok(), "directive {:?} failed: {:?}", directive, result);

                match directive {
                    CacheDirective::Purge => {
                        prop_assert!(!ctx.ram.exists(cache_path.as_str()));
                        prop_assert!(!ctx.ram.exists(GuildPath::regex(7).as_str()));
                    }
                    CacheDirective::Regenerate => {
                        prop_assert!(ctx.ram.exists(cache_path.as_str()));
                        prop_assert!(!ctx.ram.exists(GuildPath::regex(7).as_str()));
                    }
                    CacheDirective::Keep => prop_assert!(ctx.ram.exists(cache_path.as_str())),
                    CacheDirective::Direct(_) => {}
                }
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// A store edit becomes visible exactly after the next guild-wide directive.
    #[test]
    fn prop_store_edit_visible_after_purge(prefix in "[!?$.%]{1,3}") {
        let rt = test_runtime()?;
        rt.block_on(async {
            let mut ctx = test_context();
            let store = MockConfigStore::new();

            let before = handle_message(&mut ctx, &store, InboundMessage::new(2, 1, 1, 1_000, "a")).await.unwrap();
            prop_assert_eq!(before.config.scalar("prefix"), Some("!"));

            store.insert(2, "prefix", &prefix);
            let stale = handle_message(&mut ctx, &store, InboundMessage::new(2, 2, 1, 2_000, "b")).await.unwrap();
            prop_assert_eq!(stale.config.scalar("prefix"), Some("!"));

            complete_command(&mut ctx, &store, 2, &CacheDirective::Purge).await.unwrap();
            let fresh = handle_message(&mut ctx, &store, InboundMessage::new(2, 3, 1, 3_000, "c")).await.unwrap();
            prop_assert_eq!(fresh.config.scalar("prefix"), Some(prefix.as_str()));
            Ok::<(), TestCaseError>(())
        })?;
    }
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[tokio::test]
async fn test_message_rate_scenario() {
    let store = fixtures::store_with_antispam(1, "3,2", "2,0,500");

    let mut ctx = test_context();
    let burst = fixtures::message_burst(1, 9, 50_000, 500, 3, 4);
    let mut flagged = Vec::new();
    for (i, event) in burst.iter().enumerate() {
        let outcome = handle_message(&mut ctx, &store, inbound(event, i as u64)).await.unwrap();
        flagged.push(outcome.is_flagged());
    }
    assert_eq!(flagged, vec![false, false, true]);

    let mut ctx = test_context();
    let slow = fixtures::message_burst(1, 9, 50_000, 1_500, 3, 4);
    for (i, event) in slow.iter().enumerate() {
        let outcome = handle_message(&mut ctx, &store, inbound(event, i as u64)).await.unwrap();
        assert!(!outcome.is_flagged());
    }
}

#[tokio::test]
async fn test_char_rate_scenario() {
    let store = fixtures::store_with_antispam(1, "100,0", "2,2,500");

    let mut ctx = test_context();
    let first = AbuseEvent { guild_id: 1, user_id: 1, timestamp_millis: 10_000, char_count: 250 };
    let second = AbuseEvent { guild_id: 1, user_id: 2, timestamp_millis: 10_500, char_count: 251 };
    assert!(!handle_message(&mut ctx, &store, inbound(&first, 1)).await.unwrap().is_flagged());
    let outcome = handle_message(&mut ctx, &store, inbound(&second, 2)).await.unwrap();
    assert_eq!(outcome.actions[0].reason, "Char-Antispam");

    let mut ctx = test_context();
    let second = AbuseEvent { char_count: 249, ..second };
    handle_message(&mut ctx, &store, inbound(&first, 1)).await.unwrap();
    assert!(!handle_message(&mut ctx, &store, inbound(&second, 2)).await.unwrap().is_flagged());
}

#[test]
fn test_detector_trigger_logged_once() {
    let hits = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(MessageCounter {
        message: "Abuse detector triggered",
        hits: Arc::clone(&hits),
    });
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    tracing::subscriber::with_default(subscriber, || {
        rt.block_on(async {
            let store = fixtures::store_with_antispam(1, "3,2", "2,0,500");
            let mut ctx = test_context();
            for (i, event) in fixtures::message_burst(1, 9, 50_000, 500, 3, 4).iter().enumerate() {
                handle_message(&mut ctx, &store, inbound(event, i as u64)).await.unwrap();
            }
        })
    });

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
