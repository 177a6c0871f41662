//! Host abstraction traits
//!
//! This module defines the capabilities the batcher consumes from the host
//! graphics application. Items and images are opaque handles; every
//! operation goes through a [`Host`] implementation.

use crate::domain::ids::{ImageId, RawItemId};
use crate::domain::item::ColorTag;
use crate::domain::Result;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::path::Path;

/// Invocation mode for host export procedures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// The host may show a dialog to confirm format options
    Interactive,
    /// No dialog, default options
    #[default]
    NonInteractive,
    /// No dialog, reuse the options picked last time
    WithLastValues,
}

/// Host item and image primitives
///
/// Implementations are expected to be synchronous. Failures are reported as
/// [`BatcherError::Host`](crate::domain::BatcherError::Host).
pub trait Host {
    /// Downcast to Any for type-specific operations
    ///
    /// This allows tests and callers holding a boxed host to reach the
    /// concrete implementation after a run.
    fn as_any(&self) -> &dyn Any;

    /// Name of an image, used by the `[image name]` rename field
    fn image_name(&self, image: ImageId) -> Result<String>;

    /// Top-level items of an image, in stacking order
    fn top_level_items(&self, image: ImageId) -> Result<Vec<RawItemId>>;

    /// Children of a group, in stacking order
    fn children(&self, item: RawItemId) -> Result<Vec<RawItemId>>;

    /// Parent group of an item, `None` for top-level items
    fn parent(&self, item: RawItemId) -> Result<Option<RawItemId>>;

    fn is_group(&self, item: RawItemId) -> Result<bool>;

    /// Whether the handle still refers to a live item
    fn is_valid(&self, item: RawItemId) -> bool;

    /// Image the item belongs to
    fn image_of(&self, item: RawItemId) -> Result<ImageId>;

    fn name(&self, item: RawItemId) -> Result<String>;

    fn set_name(&mut self, item: RawItemId, name: &str) -> Result<()>;

    fn is_visible(&self, item: RawItemId) -> Result<bool>;

    fn set_visible(&mut self, item: RawItemId, visible: bool) -> Result<()>;

    fn color_tag(&self, item: RawItemId) -> Result<ColorTag>;

    fn set_color_tag(&mut self, item: RawItemId, tag: ColorTag) -> Result<()>;

    /// Position of the item among its siblings
    fn item_position(&self, item: RawItemId) -> Result<usize>;

    fn selected_items(&self, image: ImageId) -> Result<Vec<RawItemId>>;

    fn set_selected_items(&mut self, image: ImageId, items: &[RawItemId]) -> Result<()>;

    /// Creates a new image with the metadata of `image`
    ///
    /// Items are copied as well when `with_items` is set; otherwise the new
    /// image is empty.
    fn duplicate_image(&mut self, image: ImageId, with_items: bool) -> Result<ImageId>;

    fn delete_image(&mut self, image: ImageId) -> Result<()>;

    /// Copies `item` (with descendants) into `dest` under `parent` at `position`
    ///
    /// `position` past the end appends. Returns the handle of the copy.
    fn copy_item(
        &mut self,
        item: RawItemId,
        dest: ImageId,
        parent: Option<RawItemId>,
        position: usize,
    ) -> Result<RawItemId>;

    fn remove_item(&mut self, item: RawItemId) -> Result<()>;

    /// Merges `item` into the item directly below it
    ///
    /// Returns the handle of the merged item.
    fn merge_down(&mut self, item: RawItemId) -> Result<RawItemId>;

    fn undo_freeze(&mut self, image: ImageId) -> Result<()>;

    fn undo_thaw(&mut self, image: ImageId) -> Result<()>;

    fn undo_group_start(&mut self, image: ImageId) -> Result<()>;

    fn undo_group_end(&mut self, image: ImageId) -> Result<()>;
}

/// Per-format export call supplied by the host
///
/// The error string is the host's failure text. The export engine inspects
/// it to decide whether to retry.
pub trait ExportProcedure {
    fn export(
        &self,
        host: &dyn Host,
        run_mode: RunMode,
        image: ImageId,
        item: RawItemId,
        path: &Path,
        filename: &str,
    ) -> std::result::Result<(), String>;
}

impl<F> ExportProcedure for F
where
    F: Fn(&dyn Host, RunMode, ImageId, RawItemId, &Path, &str) -> std::result::Result<(), String>,
{
    fn export(
        &self,
        host: &dyn Host,
        run_mode: RunMode,
        image: ImageId,
        item: RawItemId,
        path: &Path,
        filename: &str,
    ) -> std::result::Result<(), String> {
        self(host, run_mode, image, item, path, filename)
    }
}
