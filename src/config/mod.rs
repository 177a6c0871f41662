//! Configuration management
//!
//! TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! Configuration files support:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `BATCHER_<SECTION>_<KEY>` environment overrides
//! - Default values for every setting
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use batcher::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("batcher.toml")?;
//!
//! println!("Output directory: {}", config.export.output_directory.display());
//! for procedure in &config.procedures {
//!     println!("Procedure: {} (enabled: {})", procedure.name, procedure.enabled);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level
//! - [`ExportConfig`] - Output directory, file extension, name pattern,
//!   overwrite policy, run mode, edit mode
//! - [`ActionConfig`] - One procedure or constraint
//! - [`LoggingConfig`] - Logging configuration
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [export]
//! output_directory = "${HOME}/exports"
//! file_extension = "png"
//! name_pattern = "[image name]-[001]"
//! overwrite_mode = "rename_new"
//!
//! [[procedures]]
//! name = "insert_background"
//! arguments = [{ name = "color_tag", value = "blue" }]
//!
//! [[constraints]]
//! name = "visible"
//! ```

pub mod loader;
pub mod schema;

// Re-export commonly used types
pub use loader::{load_config, load_config_from_str};
pub use schema::{
    ActionConfig, ApplicationConfig, ArgumentConfig, BatcherConfig, ExportConfig, LoggingConfig,
    RunOptions,
};
