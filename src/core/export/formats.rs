//! File format registry
//!
//! Maps file extensions to export procedures. The registry is an explicit
//! object handed to the batcher, so independent runs never share state.

use crate::adapters::host::ExportProcedure;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Common raster formats: (format name, extensions)
const BUILTIN_FORMATS: &[(&str, &[&str])] = &[
    ("bmp", &["bmp"]),
    ("gif", &["gif"]),
    ("ico", &["ico"]),
    ("jpeg", &["jpg", "jpeg", "jpe"]),
    ("jxl", &["jxl"]),
    ("openraster", &["ora"]),
    ("pcx", &["pcx", "pcc"]),
    ("pdf", &["pdf"]),
    ("png", &["png"]),
    ("pnm", &["pnm"]),
    ("psd", &["psd"]),
    ("qoi", &["qoi"]),
    ("raw", &["raw", "data"]),
    ("sgi", &["sgi", "rgb", "rgba", "bw", "icon"]),
    ("tga", &["tga"]),
    ("tiff", &["tif", "tiff"]),
    ("webp", &["webp"]),
    ("xcf", &["xcf"]),
    ("xcf-gz", &["xcf.gz", "xcfgz"]),
    ("xcf-bz2", &["xcf.bz2", "xcfbz2"]),
];

/// A file format and its extensions
#[derive(Clone)]
pub struct FileFormat {
    name: String,
    extensions: Vec<String>,
    procedure: Option<Rc<dyn ExportProcedure>>,
}

impl FileFormat {
    /// Creates a format without a dedicated export procedure
    pub fn new(name: impl Into<String>, extensions: &[&str]) -> Self {
        Self {
            name: name.into(),
            extensions: extensions.iter().map(|ext| ext.to_lowercase()).collect(),
            procedure: None,
        }
    }

    /// Sets a dedicated export procedure
    pub fn with_procedure(mut self, procedure: Rc<dyn ExportProcedure>) -> Self {
        self.procedure = Some(procedure);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

impl fmt::Debug for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileFormat")
            .field("name", &self.name)
            .field("extensions", &self.extensions)
            .field("has_procedure", &self.procedure.is_some())
            .finish()
    }
}

/// Extension-keyed registry of export procedures
///
/// Extensions without a dedicated procedure use the fallback (the host's
/// generic "save by extension" call).
#[derive(Clone, Default)]
pub struct FileFormatRegistry {
    formats: Vec<FileFormat>,
    by_extension: HashMap<String, usize>,
    fallback: Option<Rc<dyn ExportProcedure>>,
}

impl FileFormatRegistry {
    /// Creates an empty registry
    pub fn new(fallback: Option<Rc<dyn ExportProcedure>>) -> Self {
        Self {
            fallback,
            ..Self::default()
        }
    }

    /// Creates a registry holding the common raster formats
    pub fn with_builtin_formats(fallback: Option<Rc<dyn ExportProcedure>>) -> Self {
        let mut registry = Self::new(fallback);
        for (name, extensions) in BUILTIN_FORMATS {
            registry.register(FileFormat::new(*name, extensions));
        }
        registry
    }

    /// Registers a format
    ///
    /// Extensions already claimed by an earlier format keep their mapping.
    pub fn register(&mut self, format: FileFormat) {
        let index = self.formats.len();
        for ext in &format.extensions {
            self.by_extension.entry(ext.clone()).or_insert(index);
        }
        self.formats.push(format);
    }

    pub fn formats(&self) -> &[FileFormat] {
        &self.formats
    }

    /// Format owning `extension` (case-insensitive)
    pub fn format_for(&self, extension: &str) -> Option<&FileFormat> {
        self.by_extension
            .get(&extension.to_lowercase())
            .map(|index| &self.formats[*index])
    }

    pub fn is_supported(&self, extension: &str) -> bool {
        self.format_for(extension).is_some()
    }

    /// Export procedure for `extension`
    ///
    /// Falls back to the registry-wide procedure when the format has none
    /// or the extension is unknown.
    pub fn export_procedure(&self, extension: &str) -> Option<Rc<dyn ExportProcedure>> {
        self.format_for(extension)
            .and_then(|format| format.procedure.clone())
            .or_else(|| self.fallback.clone())
    }
}

impl fmt::Debug for FileFormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileFormatRegistry")
            .field("formats", &self.formats)
            .field("has_fallback", &self.fallback.is_some())
            .finish()
    }
}
