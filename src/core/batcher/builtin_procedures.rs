//! Built-in procedures

use super::actions::ActionRegistry;
use super::context::BatchContext;
use crate::core::export::{ExportEngine, ExportEnv, ExportSettings, ExportTarget};
use crate::core::invoker::StepAction;
use crate::core::overwrite::OverwriteMode;
use crate::core::renamer::{RenameInput, Renamer};
use crate::domain::Result;
use serde_json::Value;
use tracing::debug;

pub(crate) fn register(registry: &mut ActionRegistry) {
    registry.register_step_procedure("rename", || Box::new(RenameStep::default()));
    registry.register_step_procedure("export", || Box::new(ExportStep::default()));
    registry.register_procedure("remove_folder_structure", remove_folder_structure);
}

/// Selects the current raw item in the working image
pub fn set_active_and_current_item(ctx: &mut BatchContext, _args: &[Value]) -> Result<()> {
    let raw = ctx.current_raw_item()?;
    if ctx.host.is_valid(raw) {
        let image = ctx.current_image()?;
        ctx.host.set_selected_items(image, &[raw])?;
    }
    Ok(())
}

/// Re-syncs the current raw item after an action
///
/// A procedure may replace the current raw item (for example by merging
/// it). If the item no longer exists, the first selected item of the
/// working image takes its place.
pub fn set_active_and_current_item_after_action(
    ctx: &mut BatchContext,
    _args: &[Value],
) -> Result<()> {
    let raw = ctx.current_raw_item()?;
    let image = ctx.current_image()?;

    if ctx.host.is_valid(raw) {
        ctx.host.set_selected_items(image, &[raw])?;
    } else if let Some(selected) = ctx.host.selected_items(image)?.first().copied() {
        if ctx.host.is_valid(selected) {
            debug!(from = %raw, to = %selected, "Current raw item replaced");
            ctx.current_raw_item = Some(selected);
        }
    }
    Ok(())
}

/// Exports directly into the output directory, dropping parent folders
pub fn remove_folder_structure(ctx: &mut BatchContext, _args: &[Value]) -> Result<()> {
    ctx.current_item_mut()?.parents.clear();
    Ok(())
}

/// Renames items according to a name pattern
///
/// The pattern is the first argument, or the configured name pattern.
/// Numbering fields count across the items of a run.
#[derive(Debug, Default)]
pub struct RenameStep {
    renamer: Option<Renamer>,
}

impl StepAction<BatchContext> for RenameStep {
    fn begin(&mut self, ctx: &mut BatchContext, args: &[Value]) -> Result<()> {
        let pattern = args
            .first()
            .and_then(Value::as_str)
            .unwrap_or(&ctx.export.name_pattern);
        self.renamer = Some(Renamer::new(pattern)?);
        Ok(())
    }

    fn step(&mut self, ctx: &mut BatchContext, _args: &[Value]) -> Result<()> {
        let Some(renamer) = self.renamer.as_mut() else {
            return Ok(());
        };

        let image_name = ctx.host.image_name(ctx.input_image)?;
        let parent_names = ctx.current_parent_names()?;
        let item = ctx.current_item_mut()?;

        let new_name = renamer.rename(&RenameInput {
            layer_name: &item.name,
            image_name: &image_name,
            parent_names: &parent_names,
        });
        debug!(from = %item.name, to = %new_name, "Renamed item");
        item.name = new_name;
        Ok(())
    }

    fn end(&mut self, _ctx: &mut BatchContext) -> Result<()> {
        self.renamer = None;
        Ok(())
    }
}

/// Exports the current item
///
/// The default file extension is the first argument, or the configured
/// file extension. One export engine serves all items of a run.
#[derive(Debug, Default)]
pub struct ExportStep {
    engine: Option<ExportEngine>,
}

impl StepAction<BatchContext> for ExportStep {
    fn begin(&mut self, ctx: &mut BatchContext, args: &[Value]) -> Result<()> {
        let default_file_extension = args
            .first()
            .and_then(Value::as_str)
            .unwrap_or(&ctx.export.file_extension)
            .to_string();

        let settings = ExportSettings {
            output_directory: ctx.export.output_directory.clone(),
            default_file_extension,
            initial_run_mode: ctx.export.initial_run_mode,
            process_names: ctx.process_names,
            process_export: ctx.process_export,
        };
        self.engine = Some(ExportEngine::new(settings, &ctx.formats));
        Ok(())
    }

    fn step(&mut self, ctx: &mut BatchContext, _args: &[Value]) -> Result<()> {
        let Some(engine) = self.engine.as_mut() else {
            return Ok(());
        };

        let key = ctx.current_item()?.key();
        let image = ctx.current_image()?;
        let raw_item = ctx.current_raw_item()?;
        let file_extension = ctx
            .current_file_extension
            .clone()
            .unwrap_or_else(|| engine.settings().default_file_extension.clone());

        let mut env = ExportEnv {
            host: ctx.host.as_ref(),
            formats: &ctx.formats,
            chooser: ctx.overwrite_chooser.as_mut(),
            progress: ctx.progress.as_mut(),
        };
        let outcome = engine.export_item(
            &mut env,
            &mut ctx.item_tree,
            ExportTarget {
                key,
                image,
                raw_item,
                file_extension: &file_extension,
            },
        )?;

        ctx.current_overwrite_mode = outcome.overwrite_mode;
        if ctx.process_export && outcome.overwrite_mode != Some(OverwriteMode::Skip) {
            ctx.exported_raw_items.push(key.raw);
        }
        Ok(())
    }

    fn end(&mut self, _ctx: &mut BatchContext) -> Result<()> {
        self.engine = None;
        Ok(())
    }
}
