//! Detector parameters and their parsing from guild config.

use serde::Serialize;
use sonnet_core::ValidationError;
use sonnet_storage::GuildConfig;

/// Config field holding `count,seconds` for the message-rate detector.
pub const MESSAGE_RATE_FIELD: &str = "antispam";
/// Config field holding `count,seconds,chars` for the char-rate detector.
pub const CHAR_RATE_FIELD: &str = "char-antispam";

/// Which detector tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DetectorName {
    MessageRate,
    CharRate,
}

impl DetectorName {
    /// Buffer file stem under `<guild>/antispam/`.
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorName::MessageRate => "message-rate",
            DetectorName::CharRate => "char-rate",
        }
    }

    /// Reason string attached to the resulting moderation action.
    pub fn reason(&self) -> &'static str {
        match self {
            DetectorName::MessageRate => "Antispam",
            DetectorName::CharRate => "Char-Antispam",
        }
    }

    pub fn buffer_file(&self) -> String {
        format!("{}.asam", self.as_str())
    }
}

/// Parameters of one detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DetectorSpec {
    /// Trigger when one user sends `threshold_count` messages within the window.
    MessageRate {
        window_millis: u64,
        threshold_count: u64,
    },
    /// Trigger when the window holds more than `threshold_chars` characters
    /// across at least `threshold_count` messages.
    CharRate {
        window_millis: u64,
        threshold_count: u64,
        threshold_chars: u64,
    },
}

impl DetectorSpec {
    pub fn name(&self) -> DetectorName {
        match self {
            DetectorSpec::MessageRate { .. } => DetectorName::MessageRate,
            DetectorSpec::CharRate { .. } => DetectorName::CharRate,
        }
    }

    pub fn window_millis(&self) -> u64 {
        match self {
            DetectorSpec::MessageRate { window_millis, .. }
            | DetectorSpec::CharRate { window_millis, .. } => *window_millis,
        }
    }

    pub fn threshold_count(&self) -> u64 {
        match self {
            DetectorSpec::MessageRate {
                threshold_count, ..
            }
            | DetectorSpec::CharRate {
                threshold_count, ..
            } => *threshold_count,
        }
    }

    /// Default message-rate detector: 2 messages, zero window (off).
    pub fn default_message_rate() -> Self {
        DetectorSpec::MessageRate {
            window_millis: 0,
            threshold_count: 2,
        }
    }

    /// Default char-rate detector: 2 messages, zero window, 500 chars.
    pub fn default_char_rate() -> Self {
        DetectorSpec::CharRate {
            window_millis: 0,
            threshold_count: 2,
            threshold_chars: 500,
        }
    }

    /// Parse `[count, seconds]`.
    pub fn parse_message_rate<S: AsRef<str>>(items: &[S]) -> Result<Self, ValidationError> {
        match items {
            [count, seconds] => Ok(DetectorSpec::MessageRate {
                threshold_count: parse_count(MESSAGE_RATE_FIELD, count.as_ref())?,
                window_millis: parse_seconds(MESSAGE_RATE_FIELD, seconds.as_ref())?,
            }),
            _ => Err(invalid(MESSAGE_RATE_FIELD, items, "expected count,seconds")),
        }
    }

    /// Parse `[count, seconds, chars]`.
    pub fn parse_char_rate<S: AsRef<str>>(items: &[S]) -> Result<Self, ValidationError> {
        match items {
            [count, seconds, chars] => Ok(DetectorSpec::CharRate {
                threshold_count: parse_count(CHAR_RATE_FIELD, count.as_ref())?,
                window_millis: parse_seconds(CHAR_RATE_FIELD, seconds.as_ref())?,
                threshold_chars: parse_count(CHAR_RATE_FIELD, chars.as_ref())?,
            }),
            _ => Err(invalid(CHAR_RATE_FIELD, items, "expected count,seconds,chars")),
        }
    }

    /// Both detectors as configured for a guild. Malformed settings fall back
    /// to the defaults.
    pub fn from_guild_config(config: &GuildConfig) -> Vec<DetectorSpec> {
        let message_rate = config
            .list(MESSAGE_RATE_FIELD)
            .map(Self::parse_message_rate)
            .unwrap_or_else(|| Ok(Self::default_message_rate()))
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Malformed antispam setting, using default");
                Self::default_message_rate()
            });

        let char_rate = config
            .list(CHAR_RATE_FIELD)
            .map(Self::parse_char_rate)
            .unwrap_or_else(|| Ok(Self::default_char_rate()))
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Malformed char-antispam setting, using default");
                Self::default_char_rate()
            });

        vec![message_rate, char_rate]
    }
}

fn parse_count(field: &str, value: &str) -> Result<u64, ValidationError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| ValidationError::InvalidDetectorSpec {
            field: field.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Seconds may be fractional; the window is rounded to whole milliseconds.
fn parse_seconds(field: &str, value: &str) -> Result<u64, ValidationError> {
    let err = |reason: &str| ValidationError::InvalidDetectorSpec {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };
    let seconds: f64 = value.trim().parse().map_err(|_| err("not a number"))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(err("must be a finite, non-negative number of seconds"));
    }
    let millis = (seconds * 1000.0).round();
    if millis > u64::MAX as f64 {
        return Err(err("window too large"));
    }
    Ok(millis as u64)
}

fn invalid<S: AsRef<str>>(field: &str, items: &[S], reason: &str) -> ValidationError {
    ValidationError::InvalidDetectorSpec {
        field: field.to_string(),
        value: items
            .iter()
            .map(|item| item.as_ref())
            .collect::<Vec<&str>>()
            .join(","),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonnet_storage::{FieldValue, MESSAGE_CONFIG};

    fn list(items: &[&str]) -> FieldValue {
        FieldValue::List(items.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_defaults_from_schema() {
        let config = GuildConfig::with_defaults(&MESSAGE_CONFIG);
        assert_eq!(
            DetectorSpec::from_guild_config(&config),
            vec![
                DetectorSpec::default_message_rate(),
                DetectorSpec::default_char_rate()
            ]
        );
    }

    #[test]
    fn test_parse_fractional_seconds() {
        let spec = DetectorSpec::parse_message_rate(&["3", "1.5"]).unwrap();
        assert_eq!(
            spec,
            DetectorSpec::MessageRate {
                window_millis: 1500,
                threshold_count: 3
            }
        );
    }

    #[test]
    fn test_parse_char_rate() {
        let spec = DetectorSpec::parse_char_rate(&["2", "2", "500"]).unwrap();
        assert_eq!(
            spec,
            DetectorSpec::CharRate {
                window_millis: 2000,
                threshold_count: 2,
                threshold_chars: 500
            }
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(DetectorSpec::parse_message_rate(&["3"]).is_err());
        assert!(DetectorSpec::parse_message_rate(&["x", "1"]).is_err());
        assert!(DetectorSpec::parse_message_rate(&["3", "-1"]).is_err());
        assert!(DetectorSpec::parse_message_rate(&["3", "inf"]).is_err());
        assert!(DetectorSpec::parse_char_rate(&["2", "2"]).is_err());
    }

    #[test]
    fn test_malformed_config_falls_back() {
        let mut config = GuildConfig::with_defaults(&MESSAGE_CONFIG);
        config.insert(MESSAGE_RATE_FIELD, list(&["lots", "2"]));
        config.insert(CHAR_RATE_FIELD, list(&["4", "10", "900"]));

        let specs = DetectorSpec::from_guild_config(&config);
        assert_eq!(specs[0], DetectorSpec::default_message_rate());
        assert_eq!(
            specs[1],
            DetectorSpec::CharRate {
                window_millis: 10_000,
                threshold_count: 4,
                threshold_chars: 900
            }
        );
    }

    #[test]
    fn test_reasons() {
        assert_eq!(DetectorName::MessageRate.reason(), "Antispam");
        assert_eq!(DetectorName::CharRate.reason(), "Char-Antispam");
        assert_eq!(DetectorName::CharRate.buffer_file(), "char-rate.asam");
    }
}
