//! Domain models and types for the batcher.
//!
//! The domain layer provides:
//! - **Opaque host handles** ([`ImageId`], [`RawItemId`]) and registry ids
//!   ([`ActionId`], [`FilterId`])
//! - **The item model** ([`Item`], [`ItemKey`], [`ItemType`], [`ColorTag`])
//! - **Error types** ([`BatcherError`], [`ExportErrorDetail`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T>`]:
//!
//! ```rust
//! use batcher::domain::{BatcherError, Result};
//!
//! fn example(stop_requested: bool) -> Result<()> {
//!     if stop_requested {
//!         return Err(BatcherError::Cancelled("stopped by user".to_string()));
//!     }
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod ids;
pub mod item;
pub mod result;

// Re-export commonly used types for convenience
pub use errors::{BatcherError, ExportErrorDetail};
pub use ids::{ActionId, FilterId, ImageId, RawItemId};
pub use item::{ColorTag, Item, ItemAttributes, ItemKey, ItemType};
pub use result::Result;
