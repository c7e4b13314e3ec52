//! Positional binary codec for guild config cache entries.
//!
//! # Wire Format
//!
//! Fields appear in schema order with no names or tags:
//! - Each field: `[len: u16 LE][len bytes]`; zero length encodes "empty"
//! - `Scalar`: UTF-8 bytes
//! - `CsvList`: items joined with `,`
//! - `StringList`: the field bytes are a sequence of `[len: u16 LE][UTF-8]`
//!
//! Decoding is all-or-nothing. Running short, leftover bytes, and invalid
//! UTF-8 are corruption; no partially filled config is ever returned.

use sonnet_core::CodecError;

use super::guild_config::{FieldValue, GuildConfig};
use super::schema::{ConfigSchema, FieldKind, FieldSpec};

/// Width of every length prefix.
const LEN_PREFIX: usize = 2;

/// Encode a config per `schema`.
///
/// Fields missing from `config` encode as empty. A value whose shape does not
/// match the field kind is coerced: lists are comma-joined into scalars and a
/// non-empty scalar becomes a one-item list.
pub fn encode(schema: &ConfigSchema, config: &GuildConfig) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    for field in schema.fields {
        let body = match config.get(field.name) {
            Some(value) => encode_field(field, value)?,
            None => Vec::new(),
        };
        write_prefixed(&mut out, field.name, &body)?;
    }
    Ok(out)
}

/// Decode a blob per `schema`.
pub fn decode(schema: &ConfigSchema, blob: &[u8]) -> Result<GuildConfig, CodecError> {
    let mut cursor = Cursor::new(blob);
    let mut config = GuildConfig::new();

    for field in schema.fields {
        let body = cursor.read_prefixed(field.name)?;
        let value = match field.kind {
            FieldKind::Scalar => FieldValue::Scalar(utf8(field.name, body)?.to_string()),
            FieldKind::CsvList => {
                let text = utf8(field.name, body)?;
                if text.is_empty() {
                    FieldValue::List(Vec::new())
                } else {
                    FieldValue::List(text.split(',').map(str::to_string).collect())
                }
            }
            FieldKind::StringList => FieldValue::List(decode_string_list(field.name, body)?),
        };
        config.insert(field.name, value);
    }

    if cursor.remaining() > 0 {
        return Err(CodecError::TrailingBytes {
            count: cursor.remaining(),
        });
    }
    Ok(config)
}

fn encode_field(field: &FieldSpec, value: &FieldValue) -> Result<Vec<u8>, CodecError> {
    let items: Vec<&str> = match value {
        FieldValue::Scalar(s) if s.is_empty() => Vec::new(),
        FieldValue::Scalar(s) => vec![s.as_str()],
        FieldValue::List(items) => items.iter().map(String::as_str).collect(),
    };

    match field.kind {
        FieldKind::Scalar | FieldKind::CsvList => Ok(items.join(",").into_bytes()),
        FieldKind::StringList => {
            let mut body = Vec::new();
            for item in items {
                write_prefixed(&mut body, field.name, item.as_bytes())?;
            }
            Ok(body)
        }
    }
}

fn decode_string_list(field: &str, body: &[u8]) -> Result<Vec<String>, CodecError> {
    let mut cursor = Cursor::new(body);
    let mut items = Vec::new();
    while cursor.remaining() > 0 {
        let item = cursor.read_prefixed(field)?;
        items.push(utf8(field, item)?.to_string());
    }
    Ok(items)
}

fn write_prefixed(out: &mut Vec<u8>, field: &str, bytes: &[u8]) -> Result<(), CodecError> {
    let len = u16::try_from(bytes.len()).map_err(|_| CodecError::FieldTooLong {
        field: field.to_string(),
        len: bytes.len(),
    })?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

fn utf8<'a>(field: &str, bytes: &'a [u8]) -> Result<&'a str, CodecError> {
    std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8 {
        field: field.to_string(),
    })
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, field: &str, needed: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < needed {
            return Err(CodecError::Truncated {
                field: field.to_string(),
                needed,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(bytes)
    }

    fn read_prefixed(&mut self, field: &str) -> Result<&'a [u8], CodecError> {
        let prefix = self.take(field, LEN_PREFIX)?;
        let len = u16::from_le_bytes([prefix[0], prefix[1]]) as usize;
        self.take(field, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::schema::{EMBED_COLORS, JOIN_NOTIFIER, MESSAGE_CONFIG};

    fn defaults(schema: &ConfigSchema) -> GuildConfig {
        let mut config = GuildConfig::new();
        for field in schema.fields {
            config.insert(field.name, field.default_value());
        }
        config
    }

    #[test]
    fn test_roundtrip_defaults() {
        for schema in [MESSAGE_CONFIG, EMBED_COLORS, JOIN_NOTIFIER] {
            let config = defaults(&schema);
            let blob = encode(&schema, &config).unwrap();
            assert_eq!(decode(&schema, &blob).unwrap(), config);
        }
    }

    #[test]
    fn test_wire_layout() {
        let mut config = defaults(&EMBED_COLORS);
        config.insert("embed-color-primary", FieldValue::Scalar("ab".to_string()));
        let blob = encode(&EMBED_COLORS, &config).unwrap();
        assert_eq!(&blob[..4], &[2, 0, b'a', b'b']);
    }

    #[test]
    fn test_empty_encodes_as_zero_length() {
        let blob = encode(&MESSAGE_CONFIG, &GuildConfig::new()).unwrap();
        assert_eq!(blob, vec![0u8; MESSAGE_CONFIG.fields.len() * LEN_PREFIX]);
    }

    #[test]
    fn test_string_list_layout() {
        let mut config = defaults(&JOIN_NOTIFIER);
        config.insert(
            "notifier-log-users",
            FieldValue::List(vec!["a,b".to_string(), String::new()]),
        );
        let blob = encode(&JOIN_NOTIFIER, &config).unwrap();
        // outer len 7: [3,0,'a',',','b'][0,0]
        let tail = &blob[blob.len() - 9..];
        assert_eq!(tail, &[7, 0, 3, 0, b'a', b',', b'b', 0, 0]);
        assert_eq!(decode(&JOIN_NOTIFIER, &blob).unwrap(), config);
    }

    #[test]
    fn test_truncated_fails_closed() {
        let blob = encode(&MESSAGE_CONFIG, &defaults(&MESSAGE_CONFIG)).unwrap();
        let short = &blob[..blob.len() - 1];
        assert!(matches!(
            decode(&MESSAGE_CONFIG, short),
            Err(CodecError::Truncated { .. })
        ));
        assert!(decode(&MESSAGE_CONFIG, &[]).is_err());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut blob = encode(&EMBED_COLORS, &defaults(&EMBED_COLORS)).unwrap();
        blob.push(0);
        assert_eq!(
            decode(&EMBED_COLORS, &blob),
            Err(CodecError::TrailingBytes { count: 1 })
        );
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let mut blob = encode(&EMBED_COLORS, &GuildConfig::new()).unwrap();
        blob[0] = 1;
        blob.insert(2, 0xff);
        assert!(matches!(
            decode(&EMBED_COLORS, &blob),
            Err(CodecError::InvalidUtf8 { .. })
        ));
    }

    #[test]
    fn test_inner_record_overrun_rejected() {
        let mut blob = encode(&JOIN_NOTIFIER, &GuildConfig::new()).unwrap();
        let last = blob.len() - LEN_PREFIX;
        blob.truncate(last);
        // outer length 3 wraps an inner record claiming 5 bytes
        blob.extend_from_slice(&[3, 0, 5, 0, b'x']);
        assert!(matches!(
            decode(&JOIN_NOTIFIER, &blob),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_field_too_long() {
        let mut config = GuildConfig::new();
        config.insert("prefix", FieldValue::Scalar("x".repeat(70_000)));
        assert!(matches!(
            encode(&MESSAGE_CONFIG, &config),
            Err(CodecError::FieldTooLong { .. })
        ));
    }
}
