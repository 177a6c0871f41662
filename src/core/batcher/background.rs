//! Background and foreground insertion and merging
//!
//! Items carrying a color tag are treated as background (or foreground)
//! layers. The insert procedures place a merged copy of them next to every
//! processed item; the merge procedures then merge that copy into the item.

use super::actions::ActionRegistry;
use super::context::BatchContext;
use crate::core::invoker::StepAction;
use crate::domain::ids::{ImageId, RawItemId};
use crate::domain::item::ColorTag;
use crate::domain::{BatcherError, Result};
use serde_json::Value;
use tracing::debug;

const INSERT_BACKGROUND: &str = "insert_background";
const INSERT_FOREGROUND: &str = "insert_foreground";

pub(crate) fn register(registry: &mut ActionRegistry) {
    registry.register_step_procedure(INSERT_BACKGROUND, || {
        Box::new(InsertTaggedItems::new(Placement::After))
    });
    registry.register_step_procedure(INSERT_FOREGROUND, || {
        Box::new(InsertTaggedItems::new(Placement::Before))
    });
    registry.register_procedure("merge_background", merge_background);
    registry.register_procedure("merge_foreground", merge_foreground);
}

/// Where tagged items go relative to the current item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Below the current item (background)
    After,
    /// Above the current item (foreground)
    Before,
}

/// Inserts copies of the items tagged with a color tag next to each item
///
/// The tagged items are gathered once per run from the unfiltered item
/// tree. Multiple copies are merged into one item carrying the tag.
#[derive(Debug)]
pub struct InsertTaggedItems {
    placement: Placement,
    tagged_items: Vec<RawItemId>,
}

impl InsertTaggedItems {
    pub fn new(placement: Placement) -> Self {
        Self {
            placement,
            tagged_items: Vec::new(),
        }
    }
}

impl StepAction<BatchContext> for InsertTaggedItems {
    fn begin(&mut self, ctx: &mut BatchContext, args: &[Value]) -> Result<()> {
        let tag = args
            .first()
            .and_then(ColorTag::from_value)
            .ok_or_else(|| {
                BatcherError::Configuration(format!(
                    "Expected a color tag argument, got {:?}",
                    args.first()
                ))
            })?;

        self.tagged_items = if tag == ColorTag::None {
            Vec::new()
        } else {
            ctx.item_tree
                .iter(false, false)
                .map(|item| item.raw())
                .filter(|raw| ctx.host.is_valid(*raw))
                .filter(|raw| matches!(ctx.host.color_tag(*raw), Ok(t) if t == tag))
                .collect()
        };

        debug!(%tag, count = self.tagged_items.len(), placement = ?self.placement, "Gathered tagged items");
        Ok(())
    }

    fn step(&mut self, ctx: &mut BatchContext, _args: &[Value]) -> Result<()> {
        if self.tagged_items.is_empty() {
            return Ok(());
        }

        let raw = ctx.current_raw_item()?;
        let image = ctx.host.image_of(raw)?;
        let parent = ctx.host.parent(raw)?;
        let mut position = ctx.host.item_position(raw)?;
        if self.placement == Placement::After {
            position += 1;
        }

        insert_merged_tagged_item(ctx, &self.tagged_items, image, parent, position)?;
        Ok(())
    }

    fn end(&mut self, _ctx: &mut BatchContext) -> Result<()> {
        self.tagged_items.clear();
        Ok(())
    }
}

fn siblings(ctx: &BatchContext, image: ImageId, parent: Option<RawItemId>) -> Result<Vec<RawItemId>> {
    match parent {
        Some(parent) => ctx.host.children(parent),
        None => ctx.host.top_level_items(image),
    }
}

fn insert_merged_tagged_item(
    ctx: &mut BatchContext,
    tagged_items: &[RawItemId],
    image: ImageId,
    parent: Option<RawItemId>,
    position: usize,
) -> Result<RawItemId> {
    for (i, item) in tagged_items.iter().enumerate() {
        let copy = ctx.host.copy_item(*item, image, parent, position + i)?;
        ctx.host.set_visible(copy, true)?;
    }

    let children = siblings(ctx, image, parent)?;
    let lookup = |index: usize| {
        children.get(index).copied().ok_or_else(|| {
            BatcherError::Host(format!("No item at position {index} after inserting tagged items"))
        })
    };

    if tagged_items.len() == 1 {
        return lookup(position);
    }

    // Merging bottom-up leaves the items above the merge point in place.
    let second_to_last = position + tagged_items.len() - 2;
    let color_tag = ctx.host.color_tag(lookup(second_to_last)?)?;
    let mut merged = ctx.host.merge_down(lookup(second_to_last)?)?;
    for index in (position..second_to_last).rev() {
        merged = ctx.host.merge_down(lookup(index)?)?;
    }
    ctx.host.set_color_tag(merged, color_tag)?;
    Ok(merged)
}

/// Merges the current item into the background item below it
///
/// # Errors
///
/// Returns [`BatcherError::Skip`] if no background item inserted by an
/// earlier enabled `insert_background` procedure is adjacent.
pub fn merge_background(ctx: &mut BatchContext, _args: &[Value]) -> Result<()> {
    merge_tagged_item(ctx, Placement::After)
}

/// Merges the foreground item above the current item into it
///
/// # Errors
///
/// Returns [`BatcherError::Skip`] if no foreground item inserted by an
/// earlier enabled `insert_foreground` procedure is adjacent.
pub fn merge_foreground(ctx: &mut BatchContext, _args: &[Value]) -> Result<()> {
    merge_tagged_item(ctx, Placement::Before)
}

fn merge_tagged_item(ctx: &mut BatchContext, placement: Placement) -> Result<()> {
    let tagged_item = adjacent_tagged_item(ctx, placement)?;
    let raw = ctx.current_raw_item()?;

    let name = ctx.host.name(raw)?;
    let visible = ctx.host.is_visible(raw)?;
    let color_tag = ctx.host.color_tag(raw)?;

    let to_merge_down = match placement {
        Placement::After => raw,
        Placement::Before => tagged_item,
    };

    ctx.host.set_visible(raw, true)?;
    let merged = ctx.host.merge_down(to_merge_down)?;

    ctx.host.set_name(merged, &name)?;
    ctx.host.set_visible(merged, visible)?;
    ctx.host.set_color_tag(merged, color_tag)?;
    ctx.current_raw_item = Some(merged);

    debug!(item = %name, ?placement, "Merged tagged item");
    Ok(())
}

fn adjacent_tagged_item(ctx: &mut BatchContext, placement: Placement) -> Result<RawItemId> {
    let (insert_procedure, skip_message) = match placement {
        Placement::After => (INSERT_BACKGROUND, "There are no background layers."),
        Placement::Before => (INSERT_FOREGROUND, "There are no foreground layers."),
    };

    let raw = ctx.current_raw_item()?;
    let image = ctx.host.image_of(raw)?;
    let children = siblings(ctx, image, ctx.host.parent(raw)?)?;
    let num_items = children.len();

    let adjacent = if num_items > 1 {
        let position = ctx.host.item_position(raw)?;
        match placement {
            Placement::After if position + 1 < num_items => Some(children[position + 1]),
            Placement::Before if position > 0 => Some(children[position - 1]),
            _ => None,
        }
    } else {
        None
    };

    let color_tags: Vec<ColorTag> = ctx
        .previous_enabled_procedures(insert_procedure)
        .iter()
        .filter_map(|procedure| {
            procedure
                .argument("color_tag")
                .or_else(|| procedure.arguments.first().map(|arg| &arg.value))
                .and_then(ColorTag::from_value)
        })
        .collect();

    match adjacent {
        Some(item) if color_tags.contains(&ctx.host.color_tag(item)?) => {
            ctx.host.set_selected_items(image, &[item])?;
            Ok(item)
        }
        _ => Err(BatcherError::Skip(skip_message.to_string())),
    }
}
