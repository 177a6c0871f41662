//! State shared by every action of a run

use crate::adapters::host::Host;
use crate::config::{ActionConfig, ExportConfig};
use crate::core::export::FileFormatRegistry;
use crate::core::itemtree::ItemTree;
use crate::core::overwrite::{OverwriteChooser, OverwriteMode};
use crate::core::progress::ProgressUpdater;
use crate::domain::ids::{ImageId, RawItemId};
use crate::domain::item::{Item, ItemKey};
use crate::domain::{BatcherError, Result};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable flag requesting a run to stop
///
/// The run checks the flag before each item, so the current item always
/// finishes. Safe to set from another thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub(crate) fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Context every procedure and constraint is invoked with
///
/// Collaborators (host, file formats, overwrite chooser, progress) live
/// for the lifetime of the [`Batcher`](super::Batcher). The remaining
/// fields describe the run in progress and are reset by each run.
pub struct BatchContext {
    pub host: Box<dyn Host>,
    pub formats: Rc<FileFormatRegistry>,
    pub overwrite_chooser: Box<dyn OverwriteChooser>,
    pub progress: Box<dyn ProgressUpdater>,
    pub item_tree: ItemTree,

    /// Image the item tree was built from
    pub input_image: ImageId,
    /// Export settings with the run's overrides applied
    pub export: ExportConfig,
    /// Configured procedures, in order
    pub procedures: Vec<ActionConfig>,

    pub is_preview: bool,
    pub process_contents: bool,
    pub process_names: bool,
    pub process_export: bool,
    pub keep_image_copy: bool,

    /// Item being processed
    pub current_item: Option<ItemKey>,
    /// Host item procedures operate on (a copy unless in edit mode)
    pub current_raw_item: Option<RawItemId>,
    /// Working image (the image copy unless in edit mode)
    pub current_image: Option<ImageId>,
    /// Image copy created for the run
    pub image_copy: Option<ImageId>,
    /// Name of the configured procedure being invoked
    pub current_procedure: Option<String>,
    /// Extension the export procedure should try for the current item;
    /// `None` means the default extension
    pub current_file_extension: Option<String>,
    /// Overwrite decision of the last export
    pub current_overwrite_mode: Option<OverwriteMode>,
    /// Input items whose export was not skipped
    pub exported_raw_items: Vec<RawItemId>,
    /// Items whose procedures ended with a skip
    pub skipped_items: Vec<RawItemId>,

    stop: StopHandle,
}

impl BatchContext {
    pub(crate) fn new(
        host: Box<dyn Host>,
        formats: Rc<FileFormatRegistry>,
        overwrite_chooser: Box<dyn OverwriteChooser>,
        progress: Box<dyn ProgressUpdater>,
        item_tree: ItemTree,
        export: ExportConfig,
    ) -> Self {
        Self {
            host,
            formats,
            overwrite_chooser,
            progress,
            input_image: item_tree.image(),
            item_tree,
            export,
            procedures: Vec::new(),
            is_preview: false,
            process_contents: true,
            process_names: true,
            process_export: true,
            keep_image_copy: false,
            current_item: None,
            current_raw_item: None,
            current_image: None,
            image_copy: None,
            current_procedure: None,
            current_file_extension: None,
            current_overwrite_mode: None,
            exported_raw_items: Vec::new(),
            skipped_items: Vec::new(),
            stop: StopHandle::new(),
        }
    }

    pub(crate) fn reset_run_state(&mut self) {
        self.current_item = None;
        self.current_raw_item = None;
        self.current_image = Some(self.input_image);
        self.image_copy = None;
        self.current_procedure = None;
        self.current_file_extension = None;
        self.current_overwrite_mode = None;
        self.exported_raw_items.clear();
        self.skipped_items.clear();
        self.stop.clear();
    }

    /// Asks the run to stop before the next item
    pub fn request_stop(&self) {
        self.stop.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub(crate) fn should_stop(&self) -> bool {
        self.stop.is_stopped()
    }

    /// The item being processed
    ///
    /// # Errors
    ///
    /// Returns an error outside of per-item processing.
    pub fn current_item(&self) -> Result<&Item> {
        let key = self
            .current_item
            .ok_or_else(|| BatcherError::Configuration("No item is being processed".to_string()))?;
        self.item_tree.require(key)
    }

    pub fn current_item_mut(&mut self) -> Result<&mut Item> {
        let key = self
            .current_item
            .ok_or_else(|| BatcherError::Configuration("No item is being processed".to_string()))?;
        self.item_tree.require_mut(key)
    }

    pub fn current_raw_item(&self) -> Result<RawItemId> {
        self.current_raw_item
            .ok_or_else(|| BatcherError::Configuration("No raw item is being processed".to_string()))
    }

    pub fn current_image(&self) -> Result<ImageId> {
        self.current_image
            .ok_or_else(|| BatcherError::Configuration("No working image".to_string()))
    }

    /// Names of the current item's parents, outermost first
    pub fn current_parent_names(&self) -> Result<Vec<String>> {
        let item = self.current_item()?;
        item.parents
            .iter()
            .map(|parent| self.item_tree.require(*parent).map(|p| p.name.clone()))
            .collect()
    }

    /// Enabled procedures with `orig_name` configured before the current one
    pub fn previous_enabled_procedures(&self, orig_name: &str) -> Vec<&ActionConfig> {
        let mut previous = Vec::new();
        for procedure in &self.procedures {
            if self.current_procedure.as_deref() == Some(procedure.name.as_str()) {
                break;
            }
            if procedure.enabled && procedure.orig_name() == orig_name {
                previous.push(procedure);
            }
        }
        previous
    }
}
