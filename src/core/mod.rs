//! Core batch-processing logic
//!
//! # Modules
//!
//! - [`objectfilter`] - Nested predicate sets deciding which items are processed
//! - [`itemtree`] - Flat, filterable snapshot of an image's items
//! - [`invoker`] - Grouped action registry invoked at pipeline hooks
//! - [`uniquifier`] - Per-run name uniquification
//! - [`path`] - File name validation and extension helpers
//! - [`overwrite`] - Resolution of existing output files
//! - [`renamer`] - Name pattern evaluation
//! - [`progress`] - Progress reporting
//! - [`export`] - Export engine with automatic retries
//! - [`batcher`] - The orchestrator running a pipeline over an item tree
//!
//! # Run Workflow
//!
//! 1. **Prepare**: Build (or reuse) the item tree and a fresh invoker
//! 2. **Register**: Add built-in and configured procedures and constraints
//! 3. **Filter**: Invoke constraints, which add rules to the tree filter
//! 4. **Process**: For each matching item, copy it into the working image and
//!    run the procedures (rename, export, ...)
//! 5. **Cleanup**: Restore undo state and drop the working image

pub mod batcher;
pub mod export;
pub mod invoker;
pub mod itemtree;
pub mod objectfilter;
pub mod overwrite;
pub mod path;
pub mod progress;
pub mod renamer;
pub mod uniquifier;
