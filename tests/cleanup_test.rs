//! Integration tests for working image cleanup when host calls fail

use batcher::adapters::host::{ExportProcedure, Host, MemoryHost, RunMode};
use batcher::config::{BatcherConfig, RunOptions};
use batcher::core::batcher::{ActionRegistry, BatchContext, Batcher};
use batcher::core::export::FileFormatRegistry;
use batcher::domain::{BatcherError, ColorTag, ImageId, RawItemId, Result};
use serde_json::Value;
use std::any::Any;
use std::path::Path;
use std::rc::Rc;
use tempfile::TempDir;

/// Host delegating to a [`MemoryHost`] except for the operations in `failing`
struct FailingHost {
    inner: MemoryHost,
    failing: Vec<&'static str>,
}

impl FailingHost {
    fn check(&self, operation: &str) -> Result<()> {
        if self.failing.iter().any(|failing| *failing == operation) {
            return Err(BatcherError::Host(format!("{operation} failed")));
        }
        Ok(())
    }
}

impl Host for FailingHost {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn image_name(&self, image: ImageId) -> Result<String> {
        self.inner.image_name(image)
    }

    fn top_level_items(&self, image: ImageId) -> Result<Vec<RawItemId>> {
        self.inner.top_level_items(image)
    }

    fn children(&self, item: RawItemId) -> Result<Vec<RawItemId>> {
        self.inner.children(item)
    }

    fn parent(&self, item: RawItemId) -> Result<Option<RawItemId>> {
        self.inner.parent(item)
    }

    fn is_group(&self, item: RawItemId) -> Result<bool> {
        self.inner.is_group(item)
    }

    fn is_valid(&self, item: RawItemId) -> bool {
        self.inner.is_valid(item)
    }

    fn image_of(&self, item: RawItemId) -> Result<ImageId> {
        self.inner.image_of(item)
    }

    fn name(&self, item: RawItemId) -> Result<String> {
        self.inner.name(item)
    }

    fn set_name(&mut self, item: RawItemId, name: &str) -> Result<()> {
        self.inner.set_name(item, name)
    }

    fn is_visible(&self, item: RawItemId) -> Result<bool> {
        self.inner.is_visible(item)
    }

    fn set_visible(&mut self, item: RawItemId, visible: bool) -> Result<()> {
        self.inner.set_visible(item, visible)
    }

    fn color_tag(&self, item: RawItemId) -> Result<ColorTag> {
        self.inner.color_tag(item)
    }

    fn set_color_tag(&mut self, item: RawItemId, tag: ColorTag) -> Result<()> {
        self.inner.set_color_tag(item, tag)
    }

    fn item_position(&self, item: RawItemId) -> Result<usize> {
        self.inner.item_position(item)
    }

    fn selected_items(&self, image: ImageId) -> Result<Vec<RawItemId>> {
        self.inner.selected_items(image)
    }

    fn set_selected_items(&mut self, image: ImageId, items: &[RawItemId]) -> Result<()> {
        self.inner.set_selected_items(image, items)
    }

    fn duplicate_image(&mut self, image: ImageId, with_items: bool) -> Result<ImageId> {
        self.inner.duplicate_image(image, with_items)
    }

    fn delete_image(&mut self, image: ImageId) -> Result<()> {
        self.inner.delete_image(image)
    }

    fn copy_item(
        &mut self,
        item: RawItemId,
        dest: ImageId,
        parent: Option<RawItemId>,
        position: usize,
    ) -> Result<RawItemId> {
        self.inner.copy_item(item, dest, parent, position)
    }

    fn remove_item(&mut self, item: RawItemId) -> Result<()> {
        self.inner.remove_item(item)
    }

    fn merge_down(&mut self, item: RawItemId) -> Result<RawItemId> {
        self.inner.merge_down(item)
    }

    fn undo_freeze(&mut self, image: ImageId) -> Result<()> {
        self.check("undo_freeze")?;
        self.inner.undo_freeze(image)
    }

    fn undo_thaw(&mut self, image: ImageId) -> Result<()> {
        self.check("undo_thaw")?;
        self.inner.undo_thaw(image)
    }

    fn undo_group_start(&mut self, image: ImageId) -> Result<()> {
        self.inner.undo_group_start(image)
    }

    fn undo_group_end(&mut self, image: ImageId) -> Result<()> {
        self.inner.undo_group_end(image)
    }
}

fn writing_procedure() -> Rc<dyn ExportProcedure> {
    Rc::new(
        |_host: &dyn Host,
         _mode: RunMode,
         _image: ImageId,
         _item: RawItemId,
         path: &Path,
         _name: &str| { std::fs::write(path, "data").map_err(|e| e.to_string()) },
    )
}

fn new_batcher(dir: &TempDir, failing: Vec<&'static str>) -> (MemoryHost, Batcher) {
    let host = MemoryHost::new();
    let image = host.add_image("scene");
    host.add_layer(image, None, "Sky").unwrap();
    host.add_layer(image, None, "Ground").unwrap();

    let mut config = BatcherConfig::default();
    config.export.output_directory = dir.path().to_path_buf();

    let failing_host = FailingHost {
        inner: host.clone(),
        failing,
    };
    let batcher = Batcher::new(
        Box::new(failing_host),
        image,
        config,
        ActionRegistry::with_builtins(),
        FileFormatRegistry::with_builtin_formats(Some(writing_procedure())),
    )
    .expect("Failed to create batcher");
    (host, batcher)
}

#[test]
fn test_failed_setup_deletes_working_image() {
    let dir = TempDir::new().unwrap();
    let (host, mut batcher) = new_batcher(&dir, vec!["undo_freeze"]);

    let err = batcher.run(RunOptions::default()).unwrap_err();

    assert!(matches!(err, BatcherError::Host(_)));
    assert_eq!(host.image_count(), 1);
    assert!(batcher.context().image_copy.is_none());
    assert!(!dir.path().join("Sky.png").exists());
}

#[test]
fn test_failed_thaw_still_deletes_working_image() {
    let dir = TempDir::new().unwrap();
    let (host, mut batcher) = new_batcher(&dir, vec!["undo_thaw"]);

    let options = RunOptions {
        keep_image_copy: true,
        ..RunOptions::default()
    };
    let err = batcher.run(options).unwrap_err();

    assert!(err.to_string().contains("undo_thaw failed"));
    assert_eq!(host.image_count(), 1);
    assert!(dir.path().join("Sky.png").exists());
    assert!(dir.path().join("Ground.png").exists());
}

#[test]
fn test_cleanup_hook_error_reported_first() {
    let dir = TempDir::new().unwrap();
    let (host, mut batcher) = new_batcher(&dir, vec!["undo_thaw"]);

    batcher.add_procedure(
        |_: &mut BatchContext, _: &[Value]| Err(BatcherError::Configuration("hook failed".to_string())),
        Some(&["cleanup_contents"]),
        Vec::new(),
    );

    let err = batcher.run(RunOptions::default()).unwrap_err();

    assert!(matches!(err, BatcherError::Configuration(ref message) if message == "hook failed"));
    assert_eq!(host.image_count(), 1);
}
