//! Host application boundary
//!
//! The batcher never talks to a graphics application directly. It consumes
//! the [`Host`] trait for item/image primitives and [`ExportProcedure`] for
//! per-format export calls.

pub mod memory;
pub mod traits;

pub use memory::MemoryHost;
pub use traits::{ExportProcedure, Host, RunMode};
