//! Error types for Sonnet cache operations

use thiserror::Error;

/// Virtual filesystem errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VfsError {
    #[error("No such file or directory: {path}")]
    NotFound { path: String },

    #[error("Type mismatch at {path}: expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },
}

impl VfsError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn type_mismatch(path: impl Into<String>, expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch {
            path: path.into(),
            expected,
            found,
        }
    }
}

/// Guild config cache codec errors. Every variant means the blob is corrupt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Cache blob truncated in field {field}: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        field: String,
        needed: usize,
        remaining: usize,
    },

    #[error("Cache blob has {count} trailing bytes after the last field")]
    TrailingBytes { count: usize },

    #[error("Field {field} is not valid UTF-8")]
    InvalidUtf8 { field: String },

    #[error("Field {field} is {len} bytes, larger than a u16 length prefix allows")]
    FieldTooLong { field: String, len: usize },
}

/// Encrypted attachment codec errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("The file requested is not a SONNETAES file")]
    NotSonnetAes,

    #[error("The encrypted contents do not match the HMAC")]
    HmacInvalid,

    #[error("Invalid key material: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// External guild config store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Config store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Config store query for {field} failed: {reason}")]
    QueryFailed { field: String, reason: String },
}

/// Validation errors for command metadata and guild-provided settings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid cache directive {input:?}: {reason}")]
    InvalidDirective { input: String, reason: String },

    #[error("Invalid detector setting {field}={value:?}: {reason}")]
    InvalidDetectorSpec {
        field: String,
        value: String,
        reason: String,
    },
}

/// Runtime configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Sonnet errors.
#[derive(Debug, Error)]
pub enum SonnetError {
    #[error("VFS error: {0}")]
    Vfs(#[from] VfsError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl SonnetError {
    /// A missing VFS path. Recovered locally by rebuilding from the durable source.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SonnetError::Vfs(VfsError::NotFound { .. }))
    }

    /// A cache entry that must be discarded and rebuilt, never partially trusted.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            SonnetError::Codec(_) | SonnetError::Vfs(VfsError::TypeMismatch { .. })
        )
    }
}

/// Result type alias for VFS operations.
pub type VfsResult<T> = Result<T, VfsError>;

/// Result type alias for encrypted codec operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Result type alias for Sonnet operations.
pub type SonnetResult<T> = Result<T, SonnetError>;

// =============================================================================
// TESTS
// =============================================================================
