//! Sonnet Automod - Sliding-Window Abuse Detectors
//!
//! Two detectors share one windowed algorithm over per-guild VFS buffers:
//! - message-rate: too many messages from one user inside the window
//! - char-rate: too many characters inside the window across enough messages
//!
//! Buffers are plain cache state. Losing them only resets the windows.

pub mod detector;
pub mod record;
pub mod spec;

pub use detector::{
    buffer_path, check_abuse, check_all, AbuseEvent, AbuseVerdict, CHAR_RATE_SUMS_ALL_USERS,
};
pub use record::WindowEntry;
pub use spec::{DetectorName, DetectorSpec, CHAR_RATE_FIELD, MESSAGE_RATE_FIELD};
