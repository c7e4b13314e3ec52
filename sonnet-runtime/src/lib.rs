//! Sonnet Runtime - Context, Message Pipeline and Background Jobs
//!
//! Wires the storage, automod and crypto crates into the per-event flow of
//! the bot. A single explicitly constructed [`Context`] replaces any
//! process-wide cache state; handlers borrow it mutably, one at a time.
//!
//! Chat platform I/O, command dispatch and the database live outside this
//! workspace. The pipeline returns decisions ([`MessageOutcome`]) and leaves
//! acting on them to the caller.

pub mod attachments;
pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod telemetry;

pub use attachments::{
    retrieve_attachments, store_attachments, IncomingAttachment, RecoveredAttachment,
    StoredAttachments,
};
pub use config::{LogFormat, RuntimeConfig};
pub use context::{Context, ExpiredAttachments};
pub use error::{RuntimeError, RuntimeResult};
pub use pipeline::{
    complete_command, handle_message, parse_command, record_event, AutomodAction, InboundMessage,
    MessageOutcome, ParsedCommand,
};
pub use telemetry::init_tracing;
