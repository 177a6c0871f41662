//! Per-extension export state
//!
//! All extensions of one file format share a single entry, so format
//! options confirmed once for `jpg` are reused for `jpeg`.

use super::formats::FileFormatRegistry;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Export state of one file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileExtension {
    /// `false` once an export with this extension failed and fell back to
    /// the default extension
    pub is_valid: bool,
    /// Number of items exported with this extension (overwrite skips not
    /// counted)
    pub processed_count: usize,
}

impl Default for FileExtension {
    fn default() -> Self {
        Self {
            is_valid: true,
            processed_count: 0,
        }
    }
}

/// Lowercase-keyed map of [`FileExtension`] entries, one instance per run
#[derive(Debug, Default)]
pub struct FileExtensionProperties {
    properties: HashMap<String, Rc<RefCell<FileExtension>>>,
}

impl FileExtensionProperties {
    /// Creates properties where aliases of each registered format share state
    pub fn new(registry: &FileFormatRegistry) -> Self {
        let mut properties = HashMap::new();
        for format in registry.formats() {
            let shared = Rc::new(RefCell::new(FileExtension::default()));
            for ext in format.extensions() {
                properties
                    .entry(ext.to_lowercase())
                    .or_insert_with(|| Rc::clone(&shared));
            }
        }
        Self { properties }
    }

    fn entry(&mut self, extension: &str) -> Rc<RefCell<FileExtension>> {
        Rc::clone(
            self.properties
                .entry(extension.to_lowercase())
                .or_default(),
        )
    }

    /// Current state of `extension` (default state if never seen)
    pub fn get(&self, extension: &str) -> FileExtension {
        self.properties
            .get(&extension.to_lowercase())
            .map(|entry| *entry.borrow())
            .unwrap_or_default()
    }

    pub fn is_valid(&self, extension: &str) -> bool {
        self.get(extension).is_valid
    }

    pub fn processed_count(&self, extension: &str) -> usize {
        self.get(extension).processed_count
    }

    pub fn invalidate(&mut self, extension: &str) {
        self.entry(extension).borrow_mut().is_valid = false;
    }

    pub fn increment_processed_count(&mut self, extension: &str) {
        self.entry(extension).borrow_mut().processed_count += 1;
    }
}
