//! Message and command pipeline.
//!
//! Every inbound message runs the same sequence against the context:
//! reap expired attachment keys, count the event, load the guild config
//! (rebuilding on a miss), run the abuse detectors and the regex blacklist,
//! stash attachments, and parse a prefixed command. Moderation actions and
//! command dispatch belong to the caller; this module only decides.

use serde::Serialize;
use sonnet_automod::{check_all, AbuseEvent, AbuseVerdict, DetectorSpec};
use sonnet_core::{now_millis, GuildId, MessageId, TimestampMillis, UserId};
use sonnet_storage::cache::schema::GLOBAL_PREFIX;
use sonnet_storage::{
    inc_statistics, load_guild_config, load_regex_patterns, sweep, CacheDirective, GuildConfig,
    GuildConfigStore, RegexKind, StatEvent, SweepReport, MESSAGE_CONFIG,
};

use crate::attachments::{store_attachments, IncomingAttachment, StoredAttachments};
use crate::context::Context;
use crate::error::RuntimeResult;

/// Moderation reason for a regex blacklist hit.
pub const BLACKLIST_REASON: &str = "Blacklist";

// ============================================================================
// TYPES
// ============================================================================

/// A chat message as seen by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub guild_id: GuildId,
    pub message_id: MessageId,
    pub author_id: UserId,
    pub timestamp_millis: TimestampMillis,
    pub content: String,
    pub attachments: Vec<IncomingAttachment>,
}

impl InboundMessage {
    pub fn new(
        guild_id: GuildId,
        message_id: MessageId,
        author_id: UserId,
        timestamp_millis: TimestampMillis,
        content: impl Into<String>,
    ) -> Self {
        Self {
            guild_id,
            message_id,
            author_id,
            timestamp_millis,
            content: content.into(),
            attachments: Vec::new(),
        }
    }

    /// A message stamped with the current wall-clock time, the way live
    /// events enter the detectors.
    pub fn received(
        guild_id: GuildId,
        message_id: MessageId,
        author_id: UserId,
        content: impl Into<String>,
    ) -> Self {
        Self::new(guild_id, message_id, author_id, now_millis(), content)
    }

    pub fn with_attachment(mut self, attachment: IncomingAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    fn abuse_event(&self) -> AbuseEvent {
        AbuseEvent {
            guild_id: self.guild_id,
            user_id: self.author_id,
            timestamp_millis: self.timestamp_millis,
            char_count: u32::try_from(self.content.chars().count()).unwrap_or(u32::MAX),
        }
    }
}

/// A moderation action the caller should carry out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutomodAction {
    /// Reason string attached to the infraction.
    pub reason: String,
    /// Command to run, e.g. `mute` or `warn`.
    pub action: String,
    /// Duration argument for timed actions.
    pub duration: Option<String>,
}

/// A prefixed command found in a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Vec<String>,
}

#[derive(Debug)]
pub struct MessageOutcome {
    pub config: GuildConfig,
    pub verdict: Option<AbuseVerdict>,
    pub actions: Vec<AutomodAction>,
    pub command: Option<ParsedCommand>,
    pub attachments: Option<StoredAttachments>,
}

impl MessageOutcome {
    pub fn is_flagged(&self) -> bool {
        !self.actions.is_empty()
    }
}

// ============================================================================
// MESSAGE HANDLING
// ============================================================================

pub async fn handle_message<S>(
    ctx: &mut Context,
    store: &S,
    message: InboundMessage,
) -> RuntimeResult<MessageOutcome>
where
    S: GuildConfigStore + ?Sized,
{
    let guild_id = message.guild_id;
    ctx.reap_expired();
    record_event(ctx, guild_id, StatEvent::OnMessage);

    let options = ctx.config().cache_options();
    let config = load_guild_config(&mut ctx.ram, guild_id, &MESSAGE_CONFIG, store, &options).await?;

    let mut actions = Vec::new();

    let specs = DetectorSpec::from_guild_config(&config);
    let verdict = check_all(&mut ctx.ram, &message.abuse_event(), &specs)?;
    if let Some(verdict) = &verdict {
        tracing::info!(
            guild_id,
            user_id = message.author_id,
            detector = verdict.detector.as_str(),
            retained = verdict.retained,
            total_chars = verdict.total_chars,
            "Abuse detector triggered"
        );
        actions.push(AutomodAction {
            reason: verdict.detector.reason().to_string(),
            action: config_value(&config, "antispam-action"),
            duration: Some(config_value(&config, "antispam-time")).filter(|d| !d.is_empty()),
        });
    }

    let blacklist = load_regex_patterns(&mut ctx.ram, guild_id, RegexKind::Blacklist, store).await?;
    if blacklist.iter().any(|pattern| pattern.is_match(&message.content)) {
        tracing::info!(guild_id, user_id = message.author_id, "Regex blacklist matched");
        actions.push(AutomodAction {
            reason: BLACKLIST_REASON.to_string(),
            action: config_value(&config, "blacklist-action"),
            duration: None,
        });
    }

    let attachments = if message.attachments.is_empty() {
        None
    } else {
        Some(store_attachments(
            ctx,
            guild_id,
            message.message_id,
            message.attachments,
        )?)
    };

    let prefix = config.scalar("prefix").unwrap_or(GLOBAL_PREFIX);
    let command = parse_command(prefix, &message.content);

    Ok(MessageOutcome {
        config,
        verdict,
        actions,
        command,
        attachments,
    })
}

/// Count an event in the guild and global statistics. Failures are logged.
pub fn record_event(ctx: &mut Context, guild_id: GuildId, event: StatEvent) {
    if let Err(e) = inc_statistics(&mut ctx.kernel_ram, guild_id, event) {
        tracing::warn!(guild_id, event = event.as_str(), error = %e, "Failed to record statistic");
    }
}

/// Split `content` into a command and arguments if it starts with `prefix`.
pub fn parse_command(prefix: &str, content: &str) -> Option<ParsedCommand> {
    let rest = content.strip_prefix(prefix)?;
    let mut words = rest.split_whitespace();
    let name = words.next()?;
    // The command must touch the prefix: "! ban" is not a command.
    if !rest.starts_with(name) {
        return None;
    }
    Some(ParsedCommand {
        name: name.to_string(),
        args: words.map(str::to_string).collect(),
    })
}

fn config_value(config: &GuildConfig, field: &str) -> String {
    config
        .scalar(field)
        .or_else(|| MESSAGE_CONFIG.field(field).map(|spec| spec.default))
        .unwrap_or_default()
        .to_string()
}

// ============================================================================
// COMMAND COMPLETION
// ============================================================================

/// Apply a finished command's cache directive.
///
/// `Regenerate` re-warms the message config straight away so the next event
/// does not pay for the rebuild.
pub async fn complete_command<S>(
    ctx: &mut Context,
    store: &S,
    guild_id: GuildId,
    directive: &CacheDirective,
) -> RuntimeResult<SweepReport>
where
    S: GuildConfigStore + ?Sized,
{
    let report = sweep(&mut ctx.ram, guild_id, directive)?;

    if matches!(directive, CacheDirective::Regenerate) {
        let options = ctx.config().cache_options();
        load_guild_config(&mut ctx.ram, guild_id, &MESSAGE_CONFIG, store, &options).await?;
        tracing::debug!(guild_id, "Re-warmed config cache");
    }
    Ok(report)
}
