//! Item tree
//!
//! Flat pre-order list of [`Item`]s built from a host image, plus the
//! [`ObjectFilter`] that constraints add rules to.
//!
//! A host group yields two items: a folder (path component for its children,
//! visible only with `with_folders`) followed by a group item. Children come
//! right after the group item.
//!
//! Filtering is per item. Excluding a folder does not exclude its
//! descendants; a pipeline wanting that must add a rule checking ancestors.

use crate::adapters::host::Host;
use crate::core::objectfilter::{MatchType, ObjectFilter};
use crate::domain::ids::{FilterId, ImageId, RawItemId};
use crate::domain::item::{Item, ItemAttributes, ItemKey, ItemType};
use crate::domain::{BatcherError, Result};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Ordered collection of items with a filter
#[derive(Debug, Clone)]
pub struct ItemTree {
    name: String,
    image: ImageId,
    items: Vec<Item>,
    index: HashMap<ItemKey, usize>,
    filter: ObjectFilter<Item>,
}

impl ItemTree {
    /// Builds a tree from the items of `image`
    ///
    /// # Errors
    ///
    /// Returns an error if a host query fails.
    pub fn build(host: &dyn Host, image: ImageId, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let selected: HashSet<RawItemId> = host.selected_items(image)?.into_iter().collect();

        let mut items = Vec::new();
        for raw in host.top_level_items(image)? {
            Self::visit(host, raw, &[], &selected, &mut items)?;
        }

        let index = items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.key(), i))
            .collect();

        debug!(tree = %name, %image, items = items.len(), "Built item tree");

        Ok(Self {
            filter: ObjectFilter::new(name.clone(), MatchType::All),
            name,
            image,
            items,
            index,
        })
    }

    fn visit(
        host: &dyn Host,
        raw: RawItemId,
        parents: &[ItemKey],
        selected: &HashSet<RawItemId>,
        items: &mut Vec<Item>,
    ) -> Result<()> {
        let name = host.name(raw)?;
        let attributes = ItemAttributes {
            visible: host.is_visible(raw)?,
            color_tag: host.color_tag(raw)?,
            selected: selected.contains(&raw),
        };

        if !host.is_group(raw)? {
            items.push(Item::new(
                ItemKey::new(raw, ItemType::Item),
                name,
                parents.to_vec(),
                Vec::new(),
                attributes,
            ));
            return Ok(());
        }

        let raw_children = host.children(raw)?;
        let mut child_keys = Vec::with_capacity(raw_children.len());
        for child in &raw_children {
            let kind = if host.is_group(*child)? {
                ItemType::Folder
            } else {
                ItemType::Item
            };
            child_keys.push(ItemKey::new(*child, kind));
        }

        let folder_key = ItemKey::new(raw, ItemType::Folder);
        items.push(Item::new(
            folder_key,
            name.clone(),
            parents.to_vec(),
            child_keys.clone(),
            attributes,
        ));
        items.push(Item::new(
            ItemKey::new(raw, ItemType::Group),
            name,
            parents.to_vec(),
            child_keys,
            attributes,
        ));

        let mut child_parents = parents.to_vec();
        child_parents.push(folder_key);
        for child in raw_children {
            Self::visit(host, child, &child_parents, selected, items)?;
        }

        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Image the tree was built from
    pub fn image(&self) -> ImageId {
        self.image
    }

    pub fn filter(&self) -> &ObjectFilter<Item> {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut ObjectFilter<Item> {
        &mut self.filter
    }

    /// Replaces the filter with an empty one
    pub fn reset_filter(&mut self) {
        self.filter = ObjectFilter::new(self.name.clone(), MatchType::All);
    }

    /// Restores names, parents and children of every item
    pub fn reset_items(&mut self) {
        for item in &mut self.items {
            item.reset();
        }
    }

    /// Iterates items in pre-order
    ///
    /// Each call re-walks the stored items; the filtered view evaluates the
    /// current filter lazily.
    pub fn iter(&self, with_folders: bool, filtered: bool) -> impl Iterator<Item = &Item> + '_ {
        self.items.iter().filter(move |item| {
            (with_folders || item.item_type() != ItemType::Folder)
                && (!filtered || self.filter.is_match(item))
        })
    }

    /// Keys of the items [`ItemTree::iter`] would yield
    pub fn keys(&self, with_folders: bool, filtered: bool) -> Vec<ItemKey> {
        self.iter(with_folders, filtered).map(Item::key).collect()
    }

    /// Every item, folders included, ignoring the filter
    pub fn walk(&self) -> impl Iterator<Item = &Item> + '_ {
        self.items.iter()
    }

    /// Number of filtered items, folders excluded
    pub fn len(&self) -> usize {
        self.iter(false, true).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: ItemKey) -> Option<&Item> {
        self.index.get(&key).map(|i| &self.items[*i])
    }

    pub fn get_mut(&mut self, key: ItemKey) -> Option<&mut Item> {
        self.index.get(&key).map(|i| &mut self.items[*i])
    }

    /// Returns the item or an error naming the missing key
    pub fn require(&self, key: ItemKey) -> Result<&Item> {
        self.get(key).ok_or_else(|| {
            BatcherError::Host(format!("{} ({:?}) is not in tree '{}'", key.raw, key.kind, self.name))
        })
    }

    pub fn require_mut(&mut self, key: ItemKey) -> Result<&mut Item> {
        let name = self.name.clone();
        self.get_mut(key).ok_or_else(|| {
            BatcherError::Host(format!("{} ({:?}) is not in tree '{name}'", key.raw, key.kind))
        })
    }

    /// First non-folder item whose original name matches
    pub fn find_by_name(&self, name: &str) -> Option<&Item> {
        self.items
            .iter()
            .find(|item| item.item_type() != ItemType::Folder && item.orig_name() == name)
    }

    /// Non-folder item wrapping `raw`
    pub fn get_by_raw(&self, raw: RawItemId) -> Option<&Item> {
        self.get(ItemKey::new(raw, ItemType::Item))
            .or_else(|| self.get(ItemKey::new(raw, ItemType::Group)))
    }

    /// Runs `f` with an extra rule in the filter
    ///
    /// The rule is removed before returning, also when `f` panics.
    pub fn with_temp_rule<F, R>(
        &mut self,
        name: &str,
        func: F,
        args: Vec<Value>,
        f: impl FnOnce(&ItemTree) -> R,
    ) -> Result<R>
    where
        F: Fn(&Item, &[Value]) -> bool + 'static,
    {
        let id = self.filter.add_rule(name, func, args)?;
        let guard = TempTreeRule { tree: self, id };
        Ok(f(&*guard.tree))
    }
}

struct TempTreeRule<'a> {
    tree: &'a mut ItemTree,
    id: FilterId,
}

impl Drop for TempTreeRule<'_> {
    fn drop(&mut self) {
        let _ = self.tree.filter.remove(self.id);
    }
}
