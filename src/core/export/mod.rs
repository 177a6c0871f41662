//! Exporting items to files
//!
//! - [`formats`] - File format registry mapping extensions to export calls
//! - [`properties`] - Per-extension state kept for the duration of a run
//! - [`engine`] - Naming, overwrite handling and the retry state machine

pub mod engine;
pub mod formats;
pub mod properties;

pub use engine::{ExportEngine, ExportEnv, ExportOutcome, ExportSettings, ExportStatus, ExportTarget};
pub use formats::{FileFormat, FileFormatRegistry};
pub use properties::{FileExtension, FileExtensionProperties};
