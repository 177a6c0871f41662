//! External system integrations for the batcher.
//!
//! - [`host`] - Graphics host abstraction (trait-based) and the in-memory host
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** to isolate the host application
//! and enable testing with the in-memory implementation:
//!
//! ```rust
//! use batcher::adapters::host::{Host, MemoryHost};
//!
//! # fn example() -> batcher::domain::Result<()> {
//! let host = MemoryHost::new();
//! let image = host.add_image("scene");
//! let group = host.add_group(image, None, "Characters")?;
//! host.add_layer(image, Some(group), "Hero")?;
//!
//! assert_eq!(host.top_level_items(image)?.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod host;
