//! Item model
//!
//! An [`Item`] wraps one host node. The working `name` is rewritten freely
//! while a run processes the item; `orig_name` never changes and is what
//! [`Item::reset`] restores.

use super::ids::RawItemId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Kind of a tree node
///
/// A host group produces two nodes: a [`ItemType::Folder`] acting as a path
/// component for its children, and a [`ItemType::Group`] standing for the
/// group as a processable element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// Leaf element
    Item,
    /// Group processed as a single element
    Group,
    /// Group acting as a container
    Folder,
}

/// Color label attached to host items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorTag {
    /// No color tag
    #[default]
    None,
    Blue,
    Green,
    Yellow,
    Orange,
    Brown,
    Red,
    Violet,
    Gray,
}

impl ColorTag {
    /// Parses a color tag from an action argument
    ///
    /// Accepts the lowercase name (`"blue"`); anything else yields `None`.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        value.as_str().and_then(|s| s.parse().ok())
    }

    /// Returns the lowercase name of the tag
    pub fn as_str(self) -> &'static str {
        match self {
            ColorTag::None => "none",
            ColorTag::Blue => "blue",
            ColorTag::Green => "green",
            ColorTag::Yellow => "yellow",
            ColorTag::Orange => "orange",
            ColorTag::Brown => "brown",
            ColorTag::Red => "red",
            ColorTag::Violet => "violet",
            ColorTag::Gray => "gray",
        }
    }
}

impl fmt::Display for ColorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(ColorTag::None),
            "blue" => Ok(ColorTag::Blue),
            "green" => Ok(ColorTag::Green),
            "yellow" => Ok(ColorTag::Yellow),
            "orange" => Ok(ColorTag::Orange),
            "brown" => Ok(ColorTag::Brown),
            "red" => Ok(ColorTag::Red),
            "violet" => Ok(ColorTag::Violet),
            "gray" | "grey" => Ok(ColorTag::Gray),
            other => Err(format!("Unknown color tag '{other}'")),
        }
    }
}

/// Key of an item inside an [`ItemTree`](crate::core::itemtree::ItemTree)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey {
    /// Underlying host item
    pub raw: RawItemId,
    /// Node kind
    pub kind: ItemType,
}

impl ItemKey {
    /// Creates a new key
    pub fn new(raw: RawItemId, kind: ItemType) -> Self {
        Self { raw, kind }
    }
}

/// Host attributes captured when the tree is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemAttributes {
    pub visible: bool,
    pub color_tag: ColorTag,
    pub selected: bool,
}

/// A wrapped host node
#[derive(Debug, Clone)]
pub struct Item {
    key: ItemKey,
    orig_name: String,
    depth: usize,
    orig_parents: Vec<ItemKey>,
    orig_children: Vec<ItemKey>,
    attributes: ItemAttributes,

    /// Working name, rewritten by renaming and export
    pub name: String,

    /// Ancestors, outermost first
    pub parents: Vec<ItemKey>,

    /// Children (folders and groups only)
    pub children: Vec<ItemKey>,

    /// Arbitrary labels
    pub tags: BTreeSet<String>,
}

impl Item {
    /// Creates a new item
    pub fn new(
        key: ItemKey,
        name: impl Into<String>,
        parents: Vec<ItemKey>,
        children: Vec<ItemKey>,
        attributes: ItemAttributes,
    ) -> Self {
        let name = name.into();
        Self {
            key,
            orig_name: name.clone(),
            depth: parents.len(),
            orig_parents: parents.clone(),
            orig_children: children.clone(),
            attributes,
            name,
            parents,
            children,
            tags: BTreeSet::new(),
        }
    }

    pub fn key(&self) -> ItemKey {
        self.key
    }

    pub fn raw(&self) -> RawItemId {
        self.key.raw
    }

    pub fn item_type(&self) -> ItemType {
        self.key.kind
    }

    /// Name the item had when the tree was built
    pub fn orig_name(&self) -> &str {
        &self.orig_name
    }

    /// Nesting depth, 0 for top-level items
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn orig_parents(&self) -> &[ItemKey] {
        &self.orig_parents
    }

    pub fn orig_children(&self) -> &[ItemKey] {
        &self.orig_children
    }

    pub fn attributes(&self) -> ItemAttributes {
        self.attributes
    }

    pub fn is_visible(&self) -> bool {
        self.attributes.visible
    }

    pub fn color_tag(&self) -> ColorTag {
        self.attributes.color_tag
    }

    /// Whether the item was selected in the host when the tree was built
    pub fn is_selected(&self) -> bool {
        self.attributes.selected
    }

    /// Key of the direct parent folder, if any
    pub fn parent(&self) -> Option<ItemKey> {
        self.parents.last().copied()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        self.tags.insert(tag.into())
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        self.tags.remove(tag)
    }

    /// Restores the working name, parents and children
    pub fn reset(&mut self) {
        self.name = self.orig_name.clone();
        self.parents = self.orig_parents.clone();
        self.children = self.orig_children.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: u64, kind: ItemType) -> ItemKey {
        ItemKey::new(RawItemId::new(id), kind)
    }

    #[test]
    fn test_item_depth_follows_parents() {
        let parents = vec![key(1, ItemType::Folder), key(2, ItemType::Folder)];
        let item = Item::new(
            key(3, ItemType::Item),
            "Leaf",
            parents,
            vec![],
            ItemAttributes::default(),
        );

        assert_eq!(item.depth(), 2);
        assert_eq!(item.parent(), Some(key(2, ItemType::Folder)));
        assert_eq!(item.item_type(), ItemType::Item);
    }

    #[test]
    fn test_item_reset_restores_name_and_parents() {
        let mut item = Item::new(
            key(3, ItemType::Item),
            "Leaf",
            vec![key(1, ItemType::Folder)],
            vec![],
            ItemAttributes::default(),
        );

        item.name = "Leaf.png".to_string();
        item.parents.clear();
        item.reset();

        assert_eq!(item.name, "Leaf");
        assert_eq!(item.orig_name(), "Leaf");
        assert_eq!(item.parents, vec![key(1, ItemType::Folder)]);
    }

    #[test]
    fn test_item_tags() {
        let mut item = Item::new(
            key(1, ItemType::Item),
            "Sky",
            vec![],
            vec![],
            ItemAttributes::default(),
        );

        assert!(item.add_tag("background"));
        assert!(!item.add_tag("background"));
        assert!(item.has_tag("background"));
        assert!(item.remove_tag("background"));
        assert!(!item.has_tag("background"));
    }

    #[test]
    fn test_color_tag_parsing() {
        assert_eq!("Blue".parse::<ColorTag>().unwrap(), ColorTag::Blue);
        assert_eq!("grey".parse::<ColorTag>().unwrap(), ColorTag::Gray);
        assert!("teal".parse::<ColorTag>().is_err());
        assert_eq!(
            ColorTag::from_value(&serde_json::json!("green")),
            Some(ColorTag::Green)
        );
        assert_eq!(ColorTag::from_value(&serde_json::json!(3)), None);
    }
}
