//! Integration tests for background and foreground procedures

use batcher::adapters::host::{ExportProcedure, Host, MemoryHost, RunMode};
use batcher::config::{ActionConfig, BatcherConfig, RunOptions};
use batcher::core::batcher::{ActionRegistry, Batcher};
use batcher::core::export::FileFormatRegistry;
use batcher::domain::{ColorTag, ImageId, RawItemId};
use std::path::Path;
use std::rc::Rc;
use tempfile::TempDir;

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

/// Adds a top-level layer carrying `tag`
fn tagged_layer(host: &MemoryHost, image: ImageId, name: &str, tag: ColorTag) -> RawItemId {
    let raw = host.add_layer(image, None, name).unwrap();
    let mut handle = host.clone();
    handle.set_color_tag(raw, tag).unwrap();
    raw
}

fn run_with(
    host: &MemoryHost,
    image: ImageId,
    dir: &TempDir,
    procedures: Vec<ActionConfig>,
    constraints: Vec<ActionConfig>,
) -> (Batcher, batcher::domain::Result<batcher::core::batcher::RunSummary>) {
    let mut config = BatcherConfig::default();
    config.export.output_directory = dir.path().to_path_buf();
    config.procedures = procedures;
    config.constraints = constraints;

    let mut batcher = Batcher::new(
        Box::new(host.clone()),
        image,
        config,
        ActionRegistry::with_builtins(),
        FileFormatRegistry::with_builtin_formats(Some(writing_procedure())),
    )
    .expect("Failed to create batcher");

    let options = RunOptions {
        keep_image_copy: true,
        ..RunOptions::default()
    };
    let result = batcher.run(options);
    (batcher, result)
}

fn insert_background() -> ActionConfig {
    ActionConfig::new("insert_background").with_argument("color_tag", "blue")
}

fn insert_foreground() -> ActionConfig {
    ActionConfig::new("insert_foreground").with_argument("color_tag", "green")
}

#[test]
fn test_background_merged_into_item() {
    let dir = TempDir::new().unwrap();
    let host = MemoryHost::new();
    let image = host.add_image("scene");
    host.add_layer(image, None, "Hero").unwrap();
    tagged_layer(&host, image, "Backdrop", ColorTag::Blue);

    let (_batcher, result) = run_with(
        &host,
        image,
        &dir,
        vec![insert_background(), ActionConfig::new("merge_background")],
        vec![ActionConfig::new("not_background")],
    );
    let summary = result.unwrap();

    assert_eq!(summary.processed_items, 1);
    assert!(summary.skipped_items.is_empty());
    assert!(dir.path().join("Hero.png").exists());
    assert!(!dir.path().join("Backdrop.png").exists());

    let copy = summary.image_copy.unwrap();
    assert_eq!(host.top_level_names(copy).unwrap(), vec!["Hero"]);
    let merged = host.top_level_items(copy).unwrap()[0];
    assert_eq!(host.color_tag(merged).unwrap(), ColorTag::None);
}

#[test]
fn test_multiple_background_items_merged_first() {
    let dir = TempDir::new().unwrap();
    let host = MemoryHost::new();
    let image = host.add_image("scene");
    host.add_layer(image, None, "Hero").unwrap();
    tagged_layer(&host, image, "Clouds", ColorTag::Blue);
    tagged_layer(&host, image, "Sky", ColorTag::Blue);

    let (_batcher, result) = run_with(
        &host,
        image,
        &dir,
        vec![insert_background()],
        vec![ActionConfig::new("not_background")],
    );
    let summary = result.unwrap();

    let copy = summary.image_copy.unwrap();
    let items = host.top_level_items(copy).unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(host.name(items[0]).unwrap(), "Hero");
    assert_eq!(host.color_tag(items[1]).unwrap(), ColorTag::Blue);
    assert!(host.is_visible(items[1]).unwrap());
}

#[test]
fn test_foreground_merged_into_item() {
    let dir = TempDir::new().unwrap();
    let host = MemoryHost::new();
    let image = host.add_image("scene");
    tagged_layer(&host, image, "Frame", ColorTag::Green);
    host.add_layer(image, None, "Hero").unwrap();

    let (_batcher, result) = run_with(
        &host,
        image,
        &dir,
        vec![insert_foreground(), ActionConfig::new("merge_foreground")],
        vec![ActionConfig::new("not_foreground")],
    );
    let summary = result.unwrap();

    assert!(summary.skipped_items.is_empty());
    assert!(dir.path().join("Hero.png").exists());

    let copy = summary.image_copy.unwrap();
    assert_eq!(host.top_level_names(copy).unwrap(), vec!["Hero"]);
}

#[test]
fn test_merge_without_insert_skips_item() {
    let dir = TempDir::new().unwrap();
    let host = MemoryHost::new();
    let image = host.add_image("scene");
    host.add_layer(image, None, "Hero").unwrap();
    tagged_layer(&host, image, "Backdrop", ColorTag::Blue);

    let (_batcher, result) = run_with(
        &host,
        image,
        &dir,
        vec![ActionConfig::new("merge_background")],
        vec![ActionConfig::new("not_background")],
    );
    let summary = result.unwrap();

    assert_eq!(summary.processed_items, 1);
    assert_eq!(summary.skipped_count(), 1);
    assert_eq!(summary.exported_count(), 0);
    assert!(!dir.path().join("Hero.png").exists());
}

#[test]
fn test_no_tagged_items_leaves_item_alone() {
    let dir = TempDir::new().unwrap();
    let host = MemoryHost::new();
    let image = host.add_image("scene");
    host.add_layer(image, None, "Hero").unwrap();

    let (_batcher, result) = run_with(&host, image, &dir, vec![insert_background()], vec![]);
    let summary = result.unwrap();

    let copy = summary.image_copy.unwrap();
    assert_eq!(host.top_level_names(copy).unwrap(), vec!["Hero"]);
    assert!(dir.path().join("Hero.png").exists());
}
