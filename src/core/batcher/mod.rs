//! Batch processing of image items
//!
//! [`Batcher`] applies the configured procedures to every item of an image
//! that passes the configured constraints, then exports it.
//!
//! # Actions
//!
//! Procedures and constraints are referenced by name in the configuration
//! and resolved through an [`ActionRegistry`]. The built-in registry holds:
//!
//! - procedures: `rename`, `export`, `insert_background`,
//!   `insert_foreground`, `merge_background`, `merge_foreground`,
//!   `remove_folder_structure`
//! - constraints: `layers`, `group_layers`, `matching_file_extension`,
//!   `selected_in_host`, `top_level`, `visible`, `with_color_tags`,
//!   `without_color_tags`, `not_background`, `not_foreground`
//!
//! Unless configured explicitly, `rename` and `export` are added with the
//! configured name pattern and file extension (except in edit mode).

pub mod actions;
pub mod background;
pub mod builtin_constraints;
pub mod builtin_procedures;
pub mod context;
pub mod runner;
pub mod summary;

// Re-export commonly used types
pub use actions::{
    ActionRegistry, ConstraintEnv, DEFAULT_CONSTRAINTS_GROUP, DEFAULT_PROCEDURES_GROUP,
    NAME_ONLY_GROUP, NAME_ONLY_TAG,
};
pub use context::{BatchContext, StopHandle};
pub use runner::Batcher;
pub use summary::RunSummary;
