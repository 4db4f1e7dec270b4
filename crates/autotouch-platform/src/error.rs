//! Error types for autotouch-platform.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("injection failed: {0}")]
    InjectionFailed(String),
    #[error("input hook failed: {0}")]
    Hook(String),
}

/// Result type for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;
