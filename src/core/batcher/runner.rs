//! Batch run orchestration
//!
//! One [`Batcher::run`] call:
//!
//! 1. merges the call-time [`RunOptions`] into the configured export settings
//! 2. rebuilds the item tree from the host (or resets a supplied one) and
//!    builds a fresh invoker from the configured actions
//! 3. invokes the constraints once to build the tree filter
//! 4. duplicates the input image (unless in edit mode)
//! 5. processes every matching item, checking for a stop request before each
//! 6. cleans up, even if processing failed
//!
//! Hooks can be attached to the following groups through
//! [`Batcher::add_procedure`]: `before_process_items`,
//! `before_process_items_contents`, `before_process_item`,
//! `before_process_item_contents`, `after_process_item_contents`,
//! `after_process_item`, `after_process_items_contents`,
//! `after_process_items` and `cleanup_contents`. Per-item hooks receive the
//! raw item being processed as an additional argument.

use super::actions::{
    constraint_action, ActionRegistry, ConstraintEnv, ConstraintFn, DEFAULT_CONSTRAINTS_GROUP,
    DEFAULT_PROCEDURES_GROUP, NAME_ONLY_GROUP, NAME_ONLY_TAG,
};
use super::builtin_procedures::{
    set_active_and_current_item, set_active_and_current_item_after_action, ExportStep, RenameStep,
};
use super::context::{BatchContext, StopHandle};
use super::summary::RunSummary;
use crate::adapters::host::Host;
use crate::config::{ActionConfig, BatcherConfig, RunOptions};
use crate::core::export::FileFormatRegistry;
use crate::core::invoker::{ActionFn, Invoker, StepAction};
use crate::core::itemtree::ItemTree;
use crate::core::overwrite::{NoninteractiveOverwriteChooser, OverwriteChooser};
use crate::core::progress::{LoggingProgressUpdater, ProgressUpdater};
use crate::domain::ids::{ActionId, ImageId, RawItemId};
use crate::domain::item::{Item, ItemKey};
use crate::domain::{BatcherError, Result};
use chrono::Utc;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, info, warn};

const ITEM_TREE_NAME: &str = "layers";

const BEFORE_PROCESS_ITEMS: &str = "before_process_items";
const BEFORE_PROCESS_ITEMS_CONTENTS: &str = "before_process_items_contents";
const BEFORE_PROCESS_ITEM: &str = "before_process_item";
const BEFORE_PROCESS_ITEM_CONTENTS: &str = "before_process_item_contents";
const AFTER_PROCESS_ITEM_CONTENTS: &str = "after_process_item_contents";
const AFTER_PROCESS_ITEM: &str = "after_process_item";
const AFTER_PROCESS_ITEMS_CONTENTS: &str = "after_process_items_contents";
const AFTER_PROCESS_ITEMS: &str = "after_process_items";
const CLEANUP_CONTENTS: &str = "cleanup_contents";

/// Applies configured procedures to the items of an image and exports them
///
/// # Example
///
/// ```no_run
/// use batcher::adapters::host::MemoryHost;
/// use batcher::config::{BatcherConfig, RunOptions};
/// use batcher::core::batcher::{ActionRegistry, Batcher};
/// use batcher::core::export::FileFormatRegistry;
///
/// # fn example() -> batcher::domain::Result<()> {
/// let host = MemoryHost::new();
/// let image = host.add_image("scene");
/// host.add_layer(image, None, "Background")?;
///
/// let mut batcher = Batcher::new(
///     Box::new(host),
///     image,
///     BatcherConfig::default(),
///     ActionRegistry::with_builtins(),
///     FileFormatRegistry::with_builtin_formats(None),
/// )?;
/// let summary = batcher.run(RunOptions::default())?;
/// println!("Exported {} items", summary.exported_count());
/// # Ok(())
/// # }
/// ```
pub struct Batcher {
    ctx: BatchContext,
    config: BatcherConfig,
    registry: ActionRegistry,
    initial_invoker: Rc<RefCell<Invoker<BatchContext>>>,
    custom_overwrite_chooser: bool,
    supplied_item_tree: bool,
    orig_selected_items: Vec<RawItemId>,
}

impl Batcher {
    /// Creates a batcher for the items of `input_image`
    ///
    /// # Errors
    ///
    /// Returns [`BatcherError::Configuration`] if `config` is invalid, or a
    /// host error if the item tree cannot be built.
    pub fn new(
        host: Box<dyn Host>,
        input_image: ImageId,
        config: BatcherConfig,
        registry: ActionRegistry,
        formats: FileFormatRegistry,
    ) -> Result<Self> {
        config.validate().map_err(BatcherError::Configuration)?;

        let item_tree = ItemTree::build(host.as_ref(), input_image, ITEM_TREE_NAME)?;
        let overwrite_chooser = NoninteractiveOverwriteChooser::new(config.export.overwrite_mode);

        let ctx = BatchContext::new(
            host,
            Rc::new(formats),
            Box::new(overwrite_chooser),
            Box::new(LoggingProgressUpdater::new()),
            item_tree,
            config.export.clone(),
        );

        Ok(Self {
            ctx,
            config,
            registry,
            initial_invoker: Rc::new(RefCell::new(Invoker::new())),
            custom_overwrite_chooser: false,
            supplied_item_tree: false,
            orig_selected_items: Vec::new(),
        })
    }

    /// Uses `chooser` instead of the configured overwrite policy
    pub fn with_overwrite_chooser(mut self, chooser: Box<dyn OverwriteChooser>) -> Self {
        self.ctx.overwrite_chooser = chooser;
        self.custom_overwrite_chooser = true;
        self
    }

    /// Reuses `item_tree` on every run instead of rebuilding it from the host
    ///
    /// Only the filter and the item names are reset between runs, so items
    /// added to or removed from the image afterwards are not picked up.
    pub fn with_item_tree(mut self, item_tree: ItemTree) -> Self {
        self.ctx.item_tree = item_tree;
        self.supplied_item_tree = true;
        self
    }

    pub fn with_progress_updater(mut self, progress: Box<dyn ProgressUpdater>) -> Self {
        self.ctx.progress = progress;
        self
    }

    pub fn config(&self) -> &BatcherConfig {
        &self.config
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn context(&self) -> &BatchContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut BatchContext {
        &mut self.ctx
    }

    pub fn item_tree(&self) -> &ItemTree {
        &self.ctx.item_tree
    }

    pub fn host(&self) -> &dyn Host {
        self.ctx.host.as_ref()
    }

    /// Handle for stopping a run from a hook or another thread
    pub fn stop_handle(&self) -> StopHandle {
        self.ctx.stop_handle()
    }

    /// Asks the run in progress to stop before the next item
    pub fn stop(&self) {
        self.ctx.request_stop();
    }

    /// Adds an ad-hoc procedure applied on every run
    ///
    /// Ad-hoc procedures run before the configured ones. `groups` defaults
    /// to the per-item procedure group.
    pub fn add_procedure<F>(&mut self, func: F, groups: Option<&[&str]>, args: Vec<Value>) -> ActionId
    where
        F: Fn(&mut BatchContext, &[Value]) -> Result<()> + 'static,
    {
        let groups = groups.unwrap_or(&[DEFAULT_PROCEDURES_GROUP]);
        self.initial_invoker.borrow_mut().add(func, groups, args)
    }

    /// Adds an ad-hoc procedure keeping state across items
    pub fn add_step_procedure(
        &mut self,
        action: Box<dyn StepAction<BatchContext>>,
        groups: Option<&[&str]>,
        args: Vec<Value>,
    ) -> ActionId {
        let groups = groups.unwrap_or(&[DEFAULT_PROCEDURES_GROUP]);
        self.initial_invoker.borrow_mut().add_step(action, groups, args)
    }

    /// Adds an ad-hoc constraint applied on every run
    ///
    /// The predicate becomes a tree filter rule named `name`.
    pub fn add_constraint<F>(
        &mut self,
        name: impl Into<String>,
        func: F,
        groups: Option<&[&str]>,
        args: Vec<Value>,
    ) -> ActionId
    where
        F: Fn(&Item, &ConstraintEnv, &[Value]) -> bool + 'static,
    {
        let groups = groups.unwrap_or(&[DEFAULT_CONSTRAINTS_GROUP]);
        let func: ConstraintFn = Rc::new(func);
        let action: ActionFn<BatchContext> = constraint_action(func, name.into(), None);
        self.initial_invoker.borrow_mut().add_rc(action, groups, args)
    }

    /// Removes an ad-hoc action from `groups`, or from all its groups
    ///
    /// # Errors
    ///
    /// Returns an error if the action is unknown or not in one of `groups`.
    pub fn remove_action(&mut self, id: ActionId, groups: Option<&[&str]>) -> Result<()> {
        self.initial_invoker.borrow_mut().remove(id, groups)
    }

    /// Moves an ad-hoc action within `group`
    ///
    /// Negative positions count from the end.
    pub fn reorder_action(&mut self, id: ActionId, group: &str, position: isize) -> Result<()> {
        self.initial_invoker.borrow_mut().reorder(id, group, position)
    }

    /// Processes the items of the input image
    ///
    /// # Errors
    ///
    /// - [`BatcherError::Configuration`] if the call-time options produce
    ///   invalid export settings
    /// - [`BatcherError::Cancelled`] if the run was stopped or an export
    ///   was cancelled
    /// - [`BatcherError::InvalidProcedure`] if a configured action does not
    ///   resolve to a registered function
    /// - any error raised by a procedure, constraint or the export
    ///
    /// Cleanup runs in every case once the working image was created.
    pub fn run(&mut self, options: RunOptions) -> Result<RunSummary> {
        let started_at = Utc::now();
        let start_time = Instant::now();

        self.init_attributes(&options)?;

        let result = self.prepare().and_then(|invoker| {
            crate::log_run_start!(self.ctx.input_image, self.ctx.item_tree.len());
            self.execute(&invoker)
        });

        let processed_items = match result {
            Ok(processed_items) => processed_items,
            Err(e) => {
                crate::log_error_with_context!(&e, "Batch run failed");
                return Err(e);
            }
        };

        let mut summary = RunSummary::new(started_at).with_duration(start_time.elapsed());
        summary.processed_items = processed_items;
        summary.exported_items = self.ctx.exported_raw_items.clone();
        summary.skipped_items = self.ctx.skipped_items.clone();
        summary.image_copy = self.ctx.image_copy;

        crate::log_run_complete!(
            summary.processed_items,
            summary.exported_count(),
            summary.duration
        );
        summary.log_summary();

        Ok(summary)
    }

    fn init_attributes(&mut self, options: &RunOptions) -> Result<()> {
        let export = self.config.export.merged(options);
        export.validate().map_err(BatcherError::Configuration)?;

        if !self.custom_overwrite_chooser {
            self.ctx.overwrite_chooser =
                Box::new(NoninteractiveOverwriteChooser::new(export.overwrite_mode));
        }

        self.ctx.export = export;
        self.ctx.procedures = self.config.procedures.clone();
        self.ctx.is_preview = options.is_preview;
        self.ctx.process_contents = options.process_contents;
        self.ctx.process_names = options.process_names;
        self.ctx.process_export = options.process_export;
        self.ctx.keep_image_copy = options.keep_image_copy;
        self.ctx.reset_run_state();
        self.orig_selected_items.clear();
        Ok(())
    }

    fn edit_mode(&self) -> bool {
        self.ctx.export.edit_mode
    }

    fn prepare(&mut self) -> Result<Invoker<BatchContext>> {
        if self.supplied_item_tree {
            self.ctx.item_tree.reset_filter();
            self.ctx.item_tree.reset_items();
        } else {
            self.ctx.item_tree =
                ItemTree::build(self.ctx.host.as_ref(), self.ctx.input_image, ITEM_TREE_NAME)?;
        }

        let mut invoker = Invoker::new();
        self.add_actions(&mut invoker)?;
        self.add_name_only_actions(&mut invoker)?;

        invoker.invoke(&[DEFAULT_CONSTRAINTS_GROUP], &mut self.ctx, &[], None)?;

        self.ctx.progress.reset();
        self.ctx.progress.set_num_total_tasks(self.ctx.item_tree.len());
        Ok(invoker)
    }

    fn add_actions(&self, invoker: &mut Invoker<BatchContext>) -> Result<()> {
        invoker.add(set_active_and_current_item, &[DEFAULT_PROCEDURES_GROUP], Vec::new());
        invoker.add_foreach(
            set_active_and_current_item_after_action,
            &[DEFAULT_PROCEDURES_GROUP],
            Vec::new(),
        );

        let initial_groups = self.initial_invoker.borrow().list_groups(true);
        let initial_groups: Vec<&str> = initial_groups.iter().map(String::as_str).collect();
        invoker.add_invoker(Rc::clone(&self.initial_invoker), &initial_groups);

        self.add_default_rename(invoker, &[DEFAULT_PROCEDURES_GROUP]);

        for procedure in &self.config.procedures {
            self.registry
                .install_procedure(invoker, procedure, None, self.ctx.is_preview)?;
        }

        self.add_default_export(invoker, &[DEFAULT_PROCEDURES_GROUP]);

        for constraint in &self.config.constraints {
            self.registry
                .install_constraint(invoker, constraint, None, self.ctx.is_preview)?;
        }
        Ok(())
    }

    fn add_name_only_actions(&self, invoker: &mut Invoker<BatchContext>) -> Result<()> {
        let groups = [NAME_ONLY_GROUP];

        self.add_default_rename(invoker, &groups);

        for procedure in name_only(&self.config.procedures) {
            self.registry
                .install_procedure(invoker, procedure, Some(&groups), self.ctx.is_preview)?;
        }

        self.add_default_export(invoker, &groups);

        for constraint in name_only(&self.config.constraints) {
            self.registry
                .install_constraint(invoker, constraint, Some(&groups), self.ctx.is_preview)?;
        }
        Ok(())
    }

    fn has_enabled_procedure(&self, orig_name: &str) -> bool {
        self.config
            .procedures
            .iter()
            .any(|procedure| procedure.orig_name() == orig_name && procedure.enabled)
    }

    fn add_default_rename(&self, invoker: &mut Invoker<BatchContext>, groups: &[&str]) {
        if !self.edit_mode() && !self.has_enabled_procedure("rename") {
            invoker.add_step(
                Box::new(RenameStep::default()),
                groups,
                vec![Value::from(self.ctx.export.name_pattern.clone())],
            );
        }
    }

    fn add_default_export(&self, invoker: &mut Invoker<BatchContext>, groups: &[&str]) {
        if !self.edit_mode() && !self.has_enabled_procedure("export") {
            invoker.add_step(
                Box::new(ExportStep::default()),
                groups,
                vec![Value::from(self.ctx.export.file_extension.clone())],
            );
        }
    }

    /// Runs setup, item processing and cleanup; returns the processed count
    fn execute(&mut self, invoker: &Invoker<BatchContext>) -> Result<usize> {
        if self.ctx.process_contents {
            self.setup_contents()?;
        }

        let result = self.process_items(invoker);
        let finish_result = invoker.finish(&mut self.ctx);

        let cleanup_result = if self.ctx.process_contents {
            self.cleanup_contents(invoker, result.is_err() || finish_result.is_err())
        } else {
            Ok(())
        };

        let processed_items = result?;
        finish_result?;
        cleanup_result?;
        Ok(processed_items)
    }

    fn uses_image_copy(&self) -> bool {
        !self.edit_mode() || self.ctx.is_preview
    }

    fn setup_contents(&mut self) -> Result<()> {
        let input_image = self.ctx.input_image;

        if self.uses_image_copy() {
            let image_copy = self.ctx.host.duplicate_image(input_image, false)?;
            self.ctx.image_copy = Some(image_copy);
            self.ctx.current_image = Some(image_copy);
            debug!(image = %input_image, copy = %image_copy, "Created working image");

            let prepared = self
                .ctx
                .host
                .undo_freeze(image_copy)
                .and_then(|()| self.ctx.host.selected_items(image_copy));
            match prepared {
                Ok(selected) => self.orig_selected_items = selected,
                Err(e) => {
                    self.discard_image_copy(image_copy);
                    return Err(e);
                }
            }
        } else {
            self.ctx.host.undo_group_start(input_image)?;
            self.ctx.current_image = Some(input_image);

            match self.ctx.host.selected_items(input_image) {
                Ok(selected) => self.orig_selected_items = selected,
                Err(e) => {
                    if let Err(end_error) = self.ctx.host.undo_group_end(input_image) {
                        warn!(image = %input_image, error = %end_error, "Failed to end undo group");
                    }
                    self.ctx.current_image = None;
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    /// Deletes a working image whose setup failed
    fn discard_image_copy(&mut self, image_copy: ImageId) {
        if let Err(e) = self.ctx.host.delete_image(image_copy) {
            warn!(image = %image_copy, error = %e, "Failed to delete working image");
        }
        self.ctx.image_copy = None;
        self.ctx.current_image = None;
    }

    fn cleanup_contents(
        &mut self,
        invoker: &Invoker<BatchContext>,
        error_occurred: bool,
    ) -> Result<()> {
        let mut first_error = invoker
            .invoke(&[CLEANUP_CONTENTS], &mut self.ctx, &[], None)
            .err();

        if let Some(image) = self.ctx.current_image {
            if self.uses_image_copy() {
                let thawed = self.ctx.host.undo_thaw(image);
                let delete_copy =
                    !self.ctx.keep_image_copy || error_occurred || thawed.is_err();
                keep_first_error(&mut first_error, thawed);

                if delete_copy {
                    keep_first_error(&mut first_error, self.ctx.host.delete_image(image));
                    self.ctx.image_copy = None;
                    debug!(image = %image, "Deleted working image");
                }
            } else {
                let selected: Vec<RawItemId> = self
                    .orig_selected_items
                    .iter()
                    .copied()
                    .filter(|item| self.ctx.host.is_valid(*item))
                    .collect();
                keep_first_error(
                    &mut first_error,
                    self.ctx.host.set_selected_items(image, &selected),
                );
                keep_first_error(&mut first_error, self.ctx.host.undo_group_end(image));
            }
        }

        self.ctx.current_item = None;
        self.ctx.current_raw_item = None;
        self.ctx.current_image = None;

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn process_items(&mut self, invoker: &Invoker<BatchContext>) -> Result<usize> {
        invoker.invoke(&[BEFORE_PROCESS_ITEMS], &mut self.ctx, &[], None)?;
        if self.ctx.process_contents {
            invoker.invoke(&[BEFORE_PROCESS_ITEMS_CONTENTS], &mut self.ctx, &[], None)?;
        }

        let keys = self.ctx.item_tree.keys(false, true);
        let mut processed_items = 0;

        for key in keys {
            if self.ctx.should_stop() {
                info!(processed = processed_items, "Run stopped by user");
                return Err(BatcherError::Cancelled("stopped by user".to_string()));
            }

            if self.edit_mode() {
                let orig_name = self.ctx.item_tree.require(key)?.orig_name().to_string();
                self.ctx
                    .progress
                    .update_text(&format!("Processing \"{orig_name}\""));
            }

            self.process_item(invoker, key)?;
            processed_items += 1;
        }

        if self.ctx.process_contents {
            invoker.invoke(&[AFTER_PROCESS_ITEMS_CONTENTS], &mut self.ctx, &[], None)?;
        }
        invoker.invoke(&[AFTER_PROCESS_ITEMS], &mut self.ctx, &[], None)?;

        Ok(processed_items)
    }

    fn process_item(&mut self, invoker: &Invoker<BatchContext>, key: ItemKey) -> Result<()> {
        self.ctx.current_item = Some(key);
        self.ctx.current_raw_item = Some(key.raw);
        self.ctx.current_file_extension = None;

        if self.ctx.is_preview && self.ctx.process_names {
            self.process_item_with_name_only_actions(invoker)?;
        }

        if self.ctx.process_contents {
            self.process_item_with_actions(invoker, key.raw)?;
            self.refresh_current_image()?;
        }

        self.ctx.progress.update_tasks(1);
        Ok(())
    }

    fn process_item_with_name_only_actions(&mut self, invoker: &Invoker<BatchContext>) -> Result<()> {
        let hook_args = [Value::from(self.ctx.current_raw_item()?)];

        invoker.invoke(&[BEFORE_PROCESS_ITEM], &mut self.ctx, &hook_args, None)?;
        self.invoke_item_procedures(invoker, NAME_ONLY_GROUP)?;
        invoker.invoke(&[AFTER_PROCESS_ITEM], &mut self.ctx, &hook_args, None)
    }

    fn process_item_with_actions(
        &mut self,
        invoker: &Invoker<BatchContext>,
        raw_item: RawItemId,
    ) -> Result<()> {
        if self.uses_image_copy() {
            let image = self.ctx.current_image()?;
            let position = self.ctx.host.top_level_items(image)?.len();
            let raw_item_copy = self.ctx.host.copy_item(raw_item, image, None, position)?;
            let name = self.ctx.host.name(raw_item)?;
            self.ctx.host.set_name(raw_item_copy, &name)?;
            self.ctx.current_raw_item = Some(raw_item_copy);
        }

        let hook_args = [Value::from(self.ctx.current_raw_item()?)];

        invoker.invoke(&[BEFORE_PROCESS_ITEM], &mut self.ctx, &hook_args, None)?;
        invoker.invoke(&[BEFORE_PROCESS_ITEM_CONTENTS], &mut self.ctx, &hook_args, None)?;

        self.invoke_item_procedures(invoker, DEFAULT_PROCEDURES_GROUP)?;

        invoker.invoke(&[AFTER_PROCESS_ITEM_CONTENTS], &mut self.ctx, &hook_args, None)?;
        invoker.invoke(&[AFTER_PROCESS_ITEM], &mut self.ctx, &hook_args, None)
    }

    /// Invokes a per-item group; a skip ends the group for this item only
    fn invoke_item_procedures(&mut self, invoker: &Invoker<BatchContext>, group: &str) -> Result<()> {
        match invoker.invoke(&[group], &mut self.ctx, &[], None) {
            Err(BatcherError::Skip(reason)) => {
                let item = self.ctx.current_item()?;
                info!(item = %item.orig_name(), %reason, "Skipped item");
                let raw = item.raw();
                self.ctx.skipped_items.push(raw);
                Ok(())
            }
            result => result,
        }
    }

    fn refresh_current_image(&mut self) -> Result<()> {
        if self.edit_mode() || self.ctx.keep_image_copy {
            return Ok(());
        }

        let image = self.ctx.current_image()?;
        for item in self.ctx.host.top_level_items(image)? {
            self.ctx.host.remove_item(item)?;
        }
        Ok(())
    }
}

fn keep_first_error(first_error: &mut Option<BatcherError>, result: Result<()>) {
    if let Err(e) = result {
        if first_error.is_some() {
            warn!(error = %e, "Further error during cleanup");
        } else {
            *first_error = Some(e);
        }
    }
}

fn name_only(actions: &[ActionConfig]) -> impl Iterator<Item = &ActionConfig> {
    actions.iter().filter(|action| action.has_tag(NAME_ONLY_TAG))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::host::{ExportProcedure, MemoryHost, RunMode};
    use crate::core::export::FileFormat;
    use std::path::Path;
    use tempfile::TempDir;
    use test_case::test_case;

    fn sample_host() -> (MemoryHost, ImageId) {
        let host = MemoryHost::new();
        let image = host.add_image("scene");
        host.add_layer(image, None, "Sky").unwrap();
        let group = host.add_group(image, None, "Props").unwrap();
        host.add_layer(image, Some(group), "Tree").unwrap();
        host.add_layer(image, None, "Ground").unwrap();
        (host, image)
    }

    fn file_formats() -> FileFormatRegistry {
        let write_file: Rc<dyn ExportProcedure> = Rc::new(
            |_host: &dyn Host,
             _mode: RunMode,
             _image: ImageId,
             _item: RawItemId,
             path: &Path,
             _name: &str|
             -> std::result::Result<(), String> {
                std::fs::write(path, b"data").map_err(|e| e.to_string())
            },
        );
        let mut formats = FileFormatRegistry::new(Some(write_file));
        formats.register(FileFormat::new("PNG image", &["png"]));
        formats
    }

    fn config(output_directory: &Path) -> BatcherConfig {
        let mut config = BatcherConfig::default();
        config.export.output_directory = output_directory.to_path_buf();
        config
    }

    fn batcher(host: &MemoryHost, image: ImageId, config: BatcherConfig) -> Batcher {
        Batcher::new(
            Box::new(host.clone()),
            image,
            config,
            ActionRegistry::with_builtins(),
            file_formats(),
        )
        .unwrap()
    }

    #[test]
    fn test_run_exports_items_and_deletes_copy() {
        let dir = TempDir::new().unwrap();
        let (host, image) = sample_host();
        let mut batcher = batcher(&host, image, config(dir.path()));

        let summary = batcher.run(RunOptions::default()).unwrap();

        assert_eq!(summary.processed_items, 4);
        assert_eq!(summary.exported_count(), 4);
        assert!(dir.path().join("Sky.png").exists());
        assert!(dir.path().join("Props.png").exists());
        assert!(dir.path().join("Props").join("Tree.png").exists());
        assert!(dir.path().join("Ground.png").exists());

        assert!(summary.image_copy.is_none());
        assert_eq!(host.image_count(), 1);
        assert!(!host.is_undo_frozen(image));
    }

    #[test]
    fn test_keep_image_copy() {
        let dir = TempDir::new().unwrap();
        let (host, image) = sample_host();
        let mut batcher = batcher(&host, image, config(dir.path()));

        let options = RunOptions {
            keep_image_copy: true,
            ..RunOptions::default()
        };
        let summary = batcher.run(options).unwrap();

        let copy = summary.image_copy.unwrap();
        assert!(host.has_image(copy));
        assert!(!host.is_undo_frozen(copy));
        assert_eq!(host.top_level_names(copy).unwrap().len(), 4);
    }

    #[test]
    fn test_edit_mode_processes_input_in_place() {
        let (host, image) = sample_host();
        let mut config = BatcherConfig::default();
        config.export.edit_mode = true;
        let mut batcher = batcher(&host, image, config);

        batcher.add_procedure(
            |ctx: &mut BatchContext, _: &[Value]| {
                let raw = ctx.current_raw_item()?;
                let name = ctx.host.name(raw)?;
                ctx.host.set_name(raw, &name.to_uppercase())
            },
            None,
            Vec::new(),
        );

        let summary = batcher.run(RunOptions::default()).unwrap();

        assert_eq!(summary.exported_count(), 0);
        assert_eq!(host.image_count(), 1);
        assert_eq!(host.undo_group_depth(image), 0);
        assert_eq!(
            host.top_level_names(image).unwrap(),
            vec!["SKY", "PROPS", "GROUND"]
        );
    }

    #[test]
    fn test_hooks_receive_raw_item() {
        let dir = TempDir::new().unwrap();
        let (host, image) = sample_host();
        let mut batcher = batcher(&host, image, config(dir.path()));

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        batcher.add_procedure(
            move |ctx: &mut BatchContext, args: &[Value]| {
                assert_eq!(args.len(), 1);
                sink.borrow_mut().push(ctx.current_item()?.orig_name().to_string());
                Ok(())
            },
            Some(&[AFTER_PROCESS_ITEM]),
            Vec::new(),
        );

        batcher.run(RunOptions::default()).unwrap();

        assert_eq!(*seen.borrow(), vec!["Sky", "Props", "Tree", "Ground"]);
    }

    #[test]
    fn test_unknown_procedure_fails_before_processing() {
        let dir = TempDir::new().unwrap();
        let (host, image) = sample_host();
        let mut config = config(dir.path());
        config.procedures.push(ActionConfig::new("sharpen"));
        let mut batcher = batcher(&host, image, config);

        let err = batcher.run(RunOptions::default()).unwrap_err();

        assert!(matches!(err, BatcherError::InvalidProcedure(_)));
        assert_eq!(host.image_count(), 1);
        assert!(!dir.path().join("Sky.png").exists());
    }

    #[test]
    fn test_skip_continues_with_next_item() {
        let dir = TempDir::new().unwrap();
        let (host, image) = sample_host();
        let mut batcher = batcher(&host, image, config(dir.path()));

        batcher.add_procedure(
            |ctx: &mut BatchContext, _: &[Value]| {
                if ctx.current_item()?.orig_name() == "Sky" {
                    return Err(BatcherError::Skip("not this one".to_string()));
                }
                Ok(())
            },
            None,
            Vec::new(),
        );

        let summary = batcher.run(RunOptions::default()).unwrap();

        assert_eq!(summary.processed_items, 4);
        assert_eq!(summary.skipped_count(), 1);
        assert_eq!(summary.exported_count(), 3);
        assert!(!dir.path().join("Sky.png").exists());
        assert!(dir.path().join("Ground.png").exists());
    }

    #[test]
    fn test_names_preview_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let (host, image) = sample_host();
        let mut config = config(dir.path());
        config.export.name_pattern = "[layer name]-[01]".to_string();
        let mut batcher = batcher(&host, image, config);

        let summary = batcher.run(RunOptions::names_preview()).unwrap();

        assert_eq!(summary.processed_items, 4);
        assert_eq!(host.image_count(), 1);
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());

        let names: Vec<String> = batcher
            .item_tree()
            .iter(false, true)
            .map(|item| item.name.clone())
            .collect();
        assert_eq!(names, vec!["Sky-01.png", "Props-02.png", "Tree-03.png", "Ground-04.png"]);
    }

    #[test_case(""; "empty")]
    #[test_case(".png"; "leading period")]
    fn test_invalid_run_options_rejected(file_extension: &str) {
        let dir = TempDir::new().unwrap();
        let (host, image) = sample_host();
        let mut batcher = batcher(&host, image, config(dir.path()));

        let options = RunOptions {
            file_extension: Some(file_extension.to_string()),
            ..RunOptions::default()
        };
        let err = batcher.run(options).unwrap_err();

        assert!(matches!(err, BatcherError::Configuration(_)));
        assert_eq!(host.image_count(), 1);
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_supplied_item_tree_is_reused() {
        let dir = TempDir::new().unwrap();
        let (host, image) = sample_host();
        let tree = ItemTree::build(&host, image, "layers").unwrap();
        let mut batcher = batcher(&host, image, config(dir.path())).with_item_tree(tree);

        batcher.run(RunOptions::default()).unwrap();
        host.add_layer(image, None, "Late").unwrap();
        let summary = batcher.run(RunOptions::default()).unwrap();

        assert_eq!(summary.processed_items, 4);
        assert!(!dir.path().join("Late.png").exists());
    }
}
