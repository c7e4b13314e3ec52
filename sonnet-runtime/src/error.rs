//! Runtime error type.
//!
//! Library failures arrive as [`SonnetError`]; the runtime adds the failure
//! modes of its own glue (subscriber setup, background task joins).

use sonnet_core::{ConfigError, CryptoError, SonnetError, StoreError, VfsError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Sonnet(#[from] SonnetError),

    #[error("Telemetry initialization failed: {0}")]
    Telemetry(String),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type alias for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

macro_rules! via_sonnet_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for RuntimeError {
                fn from(err: $ty) -> Self {
                    RuntimeError::Sonnet(err.into())
                }
            }
        )*
    };
}

via_sonnet_error!(VfsError, CryptoError, StoreError, ConfigError);
