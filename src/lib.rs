// Batcher - Batch item-processing engine
// Copyright (c) 2025 Batcher Contributors
// Licensed under the MIT License

//! # Batcher - Batch processing and export of image items
//!
//! Batcher applies a configurable pipeline of procedures to the items
//! (layers and groups) of an image held by a host graphics application, and
//! exports each processed item to its own file.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Filtering** items with constraints combined into nested predicate sets
//! - **Processing** items with ordered, grouped procedures
//! - **Naming** output files from patterns, with per-folder uniquification
//! - **Exporting** through host-supplied per-format procedures, retrying
//!   recoverable failures automatically
//!
//! ## Architecture
//!
//! Batcher follows a layered architecture:
//!
//! - [`core`] - Business logic (filter, item tree, invoker, export, batcher)
//! - [`adapters`] - The host boundary and an in-memory host
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batcher::adapters::host::MemoryHost;
//! use batcher::config::{load_config, RunOptions};
//! use batcher::core::batcher::{ActionRegistry, Batcher};
//! use batcher::core::export::FileFormatRegistry;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load configuration
//!     let config = load_config("batcher.toml")?;
//!
//!     let host = MemoryHost::new();
//!     let image = host.add_image("scene");
//!     host.add_layer(image, None, "Background")?;
//!
//!     let mut batcher = Batcher::new(
//!         Box::new(host),
//!         image,
//!         config,
//!         ActionRegistry::with_builtins(),
//!         FileFormatRegistry::with_builtin_formats(None),
//!     )?;
//!
//!     let summary = batcher.run(RunOptions::default())?;
//!     println!("Exported {} items", summary.exported_count());
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Batcher uses the [`domain::BatcherError`] type for all errors. A
//! [`Skip`](domain::BatcherError::Skip) raised by a procedure only ends the
//! processing of the current item; every other error aborts the run after
//! cleanup.
//!
//! ## Logging
//!
//! Batcher uses structured logging with the `tracing` crate. See
//! [`logging::init_logging`] to install a subscriber.

pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
