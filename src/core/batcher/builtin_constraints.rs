//! Built-in constraints
//!
//! Constraints are item predicates. They see the attributes captured when
//! the item tree was built, not live host state.

use super::actions::{ActionRegistry, ConstraintEnv};
use crate::core::path::file_extension;
use crate::domain::item::{ColorTag, Item, ItemType};
use serde_json::Value;

pub(crate) fn register(registry: &mut ActionRegistry) {
    registry.register_constraint("layers", is_layer);
    registry.register_constraint("group_layers", is_nonempty_group);
    registry.register_constraint("matching_file_extension", has_matching_file_extension);
    registry.register_constraint("selected_in_host", |item: &Item, _: &ConstraintEnv, _: &[Value]| {
        item.is_selected()
    });
    registry.register_constraint("top_level", |item: &Item, _: &ConstraintEnv, _: &[Value]| {
        item.depth() == 0
    });
    registry.register_constraint("visible", |item: &Item, _: &ConstraintEnv, _: &[Value]| {
        item.is_visible()
    });
    registry.register_constraint("with_color_tags", has_color_tags);
    registry.register_constraint("without_color_tags", |item: &Item, env: &ConstraintEnv, args: &[Value]| {
        !has_color_tags(item, env, args)
    });
    registry.register_constraint("not_background", is_not_background);
    registry.register_constraint("not_foreground", is_not_foreground);
}

pub fn is_layer(item: &Item, _env: &ConstraintEnv, _args: &[Value]) -> bool {
    item.item_type() == ItemType::Item
}

/// Matches groups with at least one child
pub fn is_nonempty_group(item: &Item, _env: &ConstraintEnv, _args: &[Value]) -> bool {
    item.item_type() == ItemType::Group && !item.children.is_empty()
}

/// Matches items whose name already ends with the run's file extension
///
/// The comparison ignores case.
pub fn has_matching_file_extension(item: &Item, env: &ConstraintEnv, _args: &[Value]) -> bool {
    file_extension(&item.name).to_lowercase() == env.file_extension.to_lowercase()
}

/// Matches items carrying a color tag
///
/// The first argument may list accepted tags; an empty or missing list
/// accepts any tag.
pub fn has_color_tags(item: &Item, _env: &ConstraintEnv, args: &[Value]) -> bool {
    let tag = item.color_tag();
    if tag == ColorTag::None {
        return false;
    }

    let accepted: Vec<ColorTag> = args
        .first()
        .and_then(Value::as_array)
        .map(|tags| tags.iter().filter_map(ColorTag::from_value).collect())
        .unwrap_or_default();

    accepted.is_empty() || accepted.contains(&tag)
}

/// Excludes background items (tagged blue unless the argument says otherwise)
pub fn is_not_background(item: &Item, _env: &ConstraintEnv, args: &[Value]) -> bool {
    item.color_tag() != color_tag_arg(args, ColorTag::Blue)
}

/// Excludes foreground items (tagged green unless the argument says otherwise)
pub fn is_not_foreground(item: &Item, _env: &ConstraintEnv, args: &[Value]) -> bool {
    item.color_tag() != color_tag_arg(args, ColorTag::Green)
}

fn color_tag_arg(args: &[Value], default: ColorTag) -> ColorTag {
    args.first()
        .and_then(ColorTag::from_value)
        .unwrap_or(default)
}
