//! Error types for netverify.
//!
//! Each layer carries its own `thiserror` enum; this module ties them
//! together into the crate-level [`Error`] and maps them onto process exit
//! codes.

use std::path::PathBuf;
use thiserror::Error;

use crate::checks::CheckError;
use crate::dispatch::DispatchError;
use crate::host::HostError;
use crate::intent::IntentError;
use crate::inventory::InventoryError;
use crate::platform::PlatformError;
use crate::session::SessionError;

/// Result type alias for netverify operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Exit code when every case passed, skipped or failed as expected.
pub const EXIT_OK: i32 = 0;
/// Exit code when any case failed or errored.
pub const EXIT_FAILURES: i32 = 1;
/// Exit code for configuration errors detected before any device is contacted.
pub const EXIT_CONFIG: i32 = 4;
/// Exit code when no case was collected.
pub const EXIT_NO_CASES: i32 = 5;

/// The main error type for netverify.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A required option is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The inventory path does not exist.
    #[error("Inventory path not found: {}", .0.display())]
    InventoryPathMissing(PathBuf),

    // ========================================================================
    // Layer Errors
    // ========================================================================
    /// Inventory resolution failed.
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// Intent data could not be loaded.
    #[error(transparent)]
    Intent(#[from] IntentError),

    /// Platform mapping failed.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// Device session failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Command dispatch failure.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Test host lifecycle failure.
    #[error(transparent)]
    Host(#[from] HostError),

    /// A check could not be evaluated.
    #[error(transparent)]
    Check(#[from] CheckError),

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with source.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
        /// Source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a new configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// True for errors that must abort the run before any device is contacted.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::InventoryPathMissing(_)
                | Error::Inventory(InventoryError::PathNotFound(_))
        )
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        if self.is_config_error() {
            EXIT_CONFIG
        } else {
            EXIT_FAILURES
        }
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Adds context with a closure that is only evaluated on error.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Other {
            message: message.into(),
            source: Some(Box::new(e)),
        })
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| Error::Other {
            message: f().into(),
            source: Some(Box::new(e)),
        })
    }
}
