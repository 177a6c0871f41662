//! Domain error types
//!
//! This module defines the error hierarchy for the batcher. Every fallible
//! operation in the crate returns [`BatcherError`] through the
//! [`Result`](super::result::Result) alias.

use std::fmt;
use thiserror::Error;

/// Main batcher error type
///
/// Two variants have control-flow meaning beyond plain failure:
/// [`BatcherError::Skip`] ends processing of the current item only, and
/// [`BatcherError::Cancelled`] ends the whole run. Everything else is fatal
/// to the run.
#[derive(Debug, Error)]
pub enum BatcherError {
    /// A procedure or constraint asks to skip the remaining procedures for
    /// the current item
    #[error("Skipped: {0}")]
    Skip(String),

    /// The whole run was cancelled (user stop, overwrite cancel, or the host
    /// reported a cancelled export)
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// The output directory could not be created
    #[error("Invalid output directory: {0}")]
    InvalidOutputDirectory(ExportErrorDetail),

    /// A configured procedure or constraint does not resolve to a function
    #[error("Invalid procedure: {0}")]
    InvalidProcedure(String),

    /// An export failed with no automatic recovery available
    #[error("Export error: {0}")]
    Export(ExportErrorDetail),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Object filter errors (duplicate or unknown rule names)
    #[error("Filter error: {0}")]
    Filter(String),

    /// A host primitive failed
    #[error("Host error: {0}")]
    Host(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BatcherError {
    /// Returns `true` for the item-scoped skip signal
    pub fn is_skip(&self) -> bool {
        matches!(self, BatcherError::Skip(_))
    }

    /// Returns `true` for the run-scoped cancellation signal
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BatcherError::Cancelled(_))
    }
}

/// Export-specific error details
///
/// Carries the item and file extension involved in a failed export so the
/// caller can show where processing stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportErrorDetail {
    /// Error message
    pub message: String,

    /// Name of the item being exported
    pub item_name: Option<String>,

    /// File extension used for the export
    pub file_extension: Option<String>,
}

impl ExportErrorDetail {
    /// Creates a new export error detail
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            item_name: None,
            file_extension: None,
        }
    }

    /// Sets the item name
    pub fn with_item_name(mut self, item_name: impl Into<String>) -> Self {
        self.item_name = Some(item_name.into());
        self
    }

    /// Sets the file extension
    pub fn with_file_extension(mut self, file_extension: impl Into<String>) -> Self {
        self.file_extension = Some(file_extension.into());
        self
    }
}

impl fmt::Display for ExportErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(item_name) = self.item_name.as_deref().filter(|s| !s.is_empty()) {
            write!(f, "\nItem: {item_name}")?;
        }
        if let Some(ext) = self.file_extension.as_deref().filter(|s| !s.is_empty()) {
            write!(f, "\nFile extension: {ext}")?;
        }
        Ok(())
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for BatcherError {
    fn from(err: std::io::Error) -> Self {
        BatcherError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for BatcherError {
    fn from(err: serde_json::Error) -> Self {
        BatcherError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for BatcherError {
    fn from(err: toml::de::Error) -> Self {
        BatcherError::Configuration(format!("TOML parse error: {err}"))
    }
}
