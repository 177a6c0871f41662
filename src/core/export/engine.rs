//! Export engine
//!
//! Names and exports one item at a time. State that must survive across the
//! items of a run (name uniquifier, per-extension properties, processed
//! parent folders) lives in [`ExportEngine`]; one engine is created per run.
//!
//! Per item the status starts as [`ExportStatus::NotExportedYet`]. A failed
//! export call is classified by its failure text:
//!
//! 1. a cancellation message aborts the run
//! 2. a "calling error" under a non-interactive run mode is retried once
//!    interactively
//! 3. an extension other than the default is marked invalid and the item is
//!    renamed and exported again with the default extension
//! 4. anything else is a fatal [`BatcherError::Export`]

use super::formats::FileFormatRegistry;
use super::properties::FileExtensionProperties;
use crate::adapters::host::{Host, RunMode};
use crate::core::itemtree::ItemTree;
use crate::core::overwrite::{handle_overwrite, OverwriteChooser, OverwriteMode};
use crate::core::path::{
    file_extension, filename_with_new_extension, unique_substring_position, FilenameValidator,
};
use crate::core::progress::ProgressUpdater;
use crate::core::uniquifier::ItemUniquifier;
use crate::domain::ids::{ImageId, RawItemId};
use crate::domain::item::ItemKey;
use crate::domain::{BatcherError, ExportErrorDetail, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Outcome of the last export attempt for an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStatus {
    NotExportedYet,
    ExportSuccessful,
    ForceInteractive,
    UseDefaultFileExtension,
}

/// Run-wide export settings
#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub output_directory: PathBuf,
    /// Extension without the leading period
    pub default_file_extension: String,
    pub initial_run_mode: RunMode,
    /// Rename items (extension, validation, uniquification)
    pub process_names: bool,
    /// Write files
    pub process_export: bool,
}

/// Collaborators an export call needs
pub struct ExportEnv<'a> {
    pub host: &'a dyn Host,
    pub formats: &'a FileFormatRegistry,
    pub chooser: &'a mut dyn OverwriteChooser,
    pub progress: &'a mut dyn ProgressUpdater,
}

/// Item to export
#[derive(Debug, Clone, Copy)]
pub struct ExportTarget<'a> {
    pub key: ItemKey,
    pub image: ImageId,
    pub raw_item: RawItemId,
    /// Extension to try first; usually the default extension
    pub file_extension: &'a str,
}

/// Result of [`ExportEngine::export_item`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    pub status: ExportStatus,
    /// `None` when no file existed at the output path
    pub overwrite_mode: Option<OverwriteMode>,
    /// Final output path (empty if nothing was exported)
    pub path: PathBuf,
    /// Number of calls made to the export procedure
    pub attempts: usize,
}

/// Per-run export state machine
#[derive(Debug)]
pub struct ExportEngine {
    settings: ExportSettings,
    uniquifier: ItemUniquifier,
    properties: FileExtensionProperties,
    processed_parents: HashSet<ItemKey>,
}

impl ExportEngine {
    pub fn new(settings: ExportSettings, formats: &FileFormatRegistry) -> Self {
        Self {
            settings,
            uniquifier: ItemUniquifier::new(),
            properties: FileExtensionProperties::new(formats),
            processed_parents: HashSet::new(),
        }
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    pub fn properties(&self) -> &FileExtensionProperties {
        &self.properties
    }

    /// Names and exports one item
    ///
    /// # Errors
    ///
    /// - [`BatcherError::Cancelled`] on overwrite cancel or a cancelled export
    /// - [`BatcherError::InvalidOutputDirectory`] if the directory cannot be
    ///   created
    /// - [`BatcherError::Export`] for unrecoverable export failures
    pub fn export_item(
        &mut self,
        env: &mut ExportEnv<'_>,
        tree: &mut ItemTree,
        target: ExportTarget<'_>,
    ) -> Result<ExportOutcome> {
        let mut outcome = ExportOutcome {
            status: ExportStatus::NotExportedYet,
            overwrite_mode: None,
            path: PathBuf::new(),
            attempts: 0,
        };

        if self.settings.process_names {
            self.process_parent_folder_names(tree, target.key)?;
            self.process_item_name(tree, target.key, target.file_extension, false)?;
        }

        if !self.settings.process_export {
            return Ok(outcome);
        }

        self.export_to_file(env, tree, target, &mut outcome)?;

        if outcome.status == ExportStatus::UseDefaultFileExtension {
            let item_name = tree.require(target.key)?.name.clone();
            crate::log_retry_attempt!(
                item_name,
                outcome.attempts + 1,
                format!(
                    "extension not accepted, using .{}",
                    self.settings.default_file_extension
                )
            );
            if self.settings.process_names {
                self.process_item_name(tree, target.key, target.file_extension, true)?;
            }
            self.export_to_file(env, tree, target, &mut outcome)?;
        }

        if outcome.overwrite_mode != Some(OverwriteMode::Skip) {
            let name = &tree.require(target.key)?.name;
            self.properties
                .increment_processed_count(file_extension(name));
        }

        Ok(outcome)
    }

    fn process_parent_folder_names(&mut self, tree: &mut ItemTree, key: ItemKey) -> Result<()> {
        let parents = tree.require(key)?.parents.clone();
        for parent_key in parents {
            if self.processed_parents.insert(parent_key) {
                let parent = tree.require_mut(parent_key)?;
                parent.name = FilenameValidator::validate(&parent.name);
                self.uniquifier.uniquify(parent, None);
            }
        }
        Ok(())
    }

    fn process_item_name(
        &mut self,
        tree: &mut ItemTree,
        key: ItemKey,
        current_file_extension: &str,
        force_default_file_extension: bool,
    ) -> Result<()> {
        let default_extension = self.settings.default_file_extension.as_str();
        let item = tree.require_mut(key)?;

        item.name = if force_default_file_extension {
            filename_with_new_extension(&item.name, default_extension, true)
        } else if current_file_extension == default_extension {
            format!("{}.{}", item.name, default_extension)
        } else {
            filename_with_new_extension(&item.name, current_file_extension, true)
        };

        item.name = FilenameValidator::validate(&item.name);
        let position = unique_substring_position(&item.name, file_extension(&item.name));
        self.uniquifier.uniquify(item, Some(position));
        Ok(())
    }

    fn item_filepath(&self, tree: &ItemTree, key: ItemKey) -> Result<PathBuf> {
        let mut path = if self.settings.output_directory.is_absolute() {
            self.settings.output_directory.clone()
        } else {
            std::env::current_dir()?.join(&self.settings.output_directory)
        };

        let item = tree.require(key)?;
        for parent in &item.parents {
            path.push(&tree.require(*parent)?.name);
        }
        path.push(&item.name);
        Ok(path)
    }

    fn export_to_file(
        &mut self,
        env: &mut ExportEnv<'_>,
        tree: &ItemTree,
        target: ExportTarget<'_>,
        outcome: &mut ExportOutcome,
    ) -> Result<()> {
        let item_name = tree.require(target.key)?.name.clone();
        let output_path = self.item_filepath(tree, target.key)?;
        let extension = file_extension(&item_name).to_string();

        env.progress
            .update_text(&format!("Saving \"{}\"", output_path.display()));

        let position = unique_substring_position(&output_path.to_string_lossy(), &extension);
        let (overwrite_mode, output_path) =
            handle_overwrite(&output_path, &mut *env.chooser, Some(position))?;

        outcome.overwrite_mode = overwrite_mode;
        outcome.path = output_path.clone();
        outcome.status = ExportStatus::NotExportedYet;

        if overwrite_mode == Some(OverwriteMode::Skip) {
            info!(item = %item_name, path = %output_path.display(), "Skipping existing file");
            return Ok(());
        }

        if let Some(dir) = output_path.parent() {
            self.make_dirs(dir, &item_name)?;
        }

        let run_mode = self.run_mode(&extension);
        outcome.status = self.export_once(env, target, &item_name, &output_path, &extension, run_mode)?;
        outcome.attempts += 1;

        if outcome.status == ExportStatus::ForceInteractive {
            crate::log_retry_attempt!(item_name, outcome.attempts + 1, "calling error, retrying interactively");
            outcome.status = self.export_once(
                env,
                target,
                &item_name,
                &output_path,
                &extension,
                RunMode::Interactive,
            )?;
            outcome.attempts += 1;
        }

        Ok(())
    }

    fn make_dirs(&self, dir: &Path, item_name: &str) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(|e| {
            BatcherError::InvalidOutputDirectory(
                ExportErrorDetail::new(format!("{e}: \"{}\"", dir.display()))
                    .with_item_name(item_name)
                    .with_file_extension(self.settings.default_file_extension.clone()),
            )
        })
    }

    /// Run mode for a fresh export with `extension`
    ///
    /// Reuses the last values once the format was exported successfully in
    /// this run.
    pub fn run_mode(&self, extension: &str) -> RunMode {
        let properties = self.properties.get(extension);
        if properties.is_valid && properties.processed_count > 0 {
            RunMode::WithLastValues
        } else {
            self.settings.initial_run_mode
        }
    }

    fn export_once(
        &mut self,
        env: &ExportEnv<'_>,
        target: ExportTarget<'_>,
        item_name: &str,
        output_path: &Path,
        extension: &str,
        run_mode: RunMode,
    ) -> Result<ExportStatus> {
        let filename = output_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!(item = %item_name, path = %output_path.display(), ?run_mode, "Exporting item");

        let result = match env.formats.export_procedure(extension) {
            Some(procedure) => procedure.export(
                env.host,
                run_mode,
                target.image,
                target.raw_item,
                output_path,
                &filename,
            ),
            None => Err(format!(
                "No export procedure available for file extension \"{extension}\""
            )),
        };

        let message = match result {
            Ok(()) => return Ok(ExportStatus::ExportSuccessful),
            Err(message) => message,
        };
        let lowered = message.to_lowercase();

        if lowered.contains("cancelled") || lowered.contains("canceled") {
            return Err(BatcherError::Cancelled(message));
        }

        if lowered.contains("calling error")
            && matches!(run_mode, RunMode::WithLastValues | RunMode::NonInteractive)
        {
            return Ok(ExportStatus::ForceInteractive);
        }

        if !extension.eq_ignore_ascii_case(&self.settings.default_file_extension) {
            self.properties.invalidate(extension);
            return Ok(ExportStatus::UseDefaultFileExtension);
        }

        Err(BatcherError::Export(
            ExportErrorDetail::new(message)
                .with_item_name(item_name)
                .with_file_extension(self.settings.default_file_extension.clone()),
        ))
    }
}
