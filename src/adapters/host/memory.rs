//! In-memory host
//!
//! [`MemoryHost`] keeps images and items in plain collections. It is the
//! reference [`Host`] implementation and the test double for the batcher.
//! The handle is cheap to clone; clones share the same state, so a caller
//! can keep one while the batcher owns another.

use super::traits::Host;
use crate::domain::ids::{ImageId, RawItemId};
use crate::domain::item::ColorTag;
use crate::domain::{BatcherError, Result};
use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

#[derive(Debug, Clone)]
struct Node {
    image: ImageId,
    name: String,
    parent: Option<RawItemId>,
    children: Vec<RawItemId>,
    is_group: bool,
    visible: bool,
    color_tag: ColorTag,
}

#[derive(Debug, Clone, Default)]
struct Image {
    name: String,
    top: Vec<RawItemId>,
    selected: Vec<RawItemId>,
    undo_frozen: bool,
    undo_group_depth: usize,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    images: BTreeMap<ImageId, Image>,
    nodes: HashMap<RawItemId, Node>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn image(&self, image: ImageId) -> Result<&Image> {
        self.images
            .get(&image)
            .ok_or_else(|| BatcherError::Host(format!("Invalid image {image}")))
    }

    fn image_mut(&mut self, image: ImageId) -> Result<&mut Image> {
        self.images
            .get_mut(&image)
            .ok_or_else(|| BatcherError::Host(format!("Invalid image {image}")))
    }

    fn node(&self, item: RawItemId) -> Result<&Node> {
        self.nodes
            .get(&item)
            .ok_or_else(|| BatcherError::Host(format!("Invalid item {item}")))
    }

    fn node_mut(&mut self, item: RawItemId) -> Result<&mut Node> {
        self.nodes
            .get_mut(&item)
            .ok_or_else(|| BatcherError::Host(format!("Invalid item {item}")))
    }

    fn siblings(&self, image: ImageId, parent: Option<RawItemId>) -> Result<&Vec<RawItemId>> {
        match parent {
            Some(parent) => Ok(&self.node(parent)?.children),
            None => Ok(&self.image(image)?.top),
        }
    }

    fn siblings_mut(
        &mut self,
        image: ImageId,
        parent: Option<RawItemId>,
    ) -> Result<&mut Vec<RawItemId>> {
        match parent {
            Some(parent) => {
                let node = self.node_mut(parent)?;
                if !node.is_group {
                    return Err(BatcherError::Host(format!("{parent} is not a group")));
                }
                Ok(&mut node.children)
            }
            None => Ok(&mut self.image_mut(image)?.top),
        }
    }

    fn insert_node(&mut self, node: Node, position: usize) -> Result<RawItemId> {
        let (image, parent) = (node.image, node.parent);
        self.siblings_mut(image, parent)?;

        let id = RawItemId::new(self.next_id());
        self.nodes.insert(id, node);
        let siblings = self.siblings_mut(image, parent)?;
        let position = position.min(siblings.len());
        siblings.insert(position, id);
        Ok(id)
    }

    fn copy_subtree(
        &mut self,
        item: RawItemId,
        dest: ImageId,
        parent: Option<RawItemId>,
        position: usize,
    ) -> Result<RawItemId> {
        let source = self.node(item)?.clone();
        let copy = Node {
            image: dest,
            parent,
            children: Vec::new(),
            ..source.clone()
        };
        let id = self.insert_node(copy, position)?;
        for (index, child) in source.children.iter().enumerate() {
            self.copy_subtree(*child, dest, Some(id), index)?;
        }
        Ok(id)
    }

    fn delete_subtree(&mut self, item: RawItemId) {
        if let Some(node) = self.nodes.remove(&item) {
            for child in node.children {
                self.delete_subtree(child);
            }
            if let Some(image) = self.images.get_mut(&node.image) {
                image.selected.retain(|selected| *selected != item);
            }
        }
    }

    fn detach(&mut self, item: RawItemId) -> Result<()> {
        let node = self.node(item)?;
        let (image, parent) = (node.image, node.parent);
        self.siblings_mut(image, parent)?.retain(|id| *id != item);
        Ok(())
    }
}

/// Shared in-memory host state
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    state: Rc<RefCell<State>>,
}

impl MemoryHost {
    /// Creates an empty host
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new empty image
    pub fn add_image(&self, name: &str) -> ImageId {
        let mut state = self.state.borrow_mut();
        let id = ImageId::new(state.next_id());
        state.images.insert(
            id,
            Image {
                name: name.to_string(),
                ..Image::default()
            },
        );
        id
    }

    /// Appends a layer under `parent` (or at the top level)
    pub fn add_layer(
        &self,
        image: ImageId,
        parent: Option<RawItemId>,
        name: &str,
    ) -> Result<RawItemId> {
        self.add_node(image, parent, name, false)
    }

    /// Appends an empty group under `parent` (or at the top level)
    pub fn add_group(
        &self,
        image: ImageId,
        parent: Option<RawItemId>,
        name: &str,
    ) -> Result<RawItemId> {
        self.add_node(image, parent, name, true)
    }

    fn add_node(
        &self,
        image: ImageId,
        parent: Option<RawItemId>,
        name: &str,
        is_group: bool,
    ) -> Result<RawItemId> {
        let mut state = self.state.borrow_mut();
        let node = Node {
            image,
            name: name.to_string(),
            parent,
            children: Vec::new(),
            is_group,
            visible: true,
            color_tag: ColorTag::None,
        };
        state.insert_node(node, usize::MAX)
    }

    /// Whether the image still exists
    pub fn has_image(&self, image: ImageId) -> bool {
        self.state.borrow().images.contains_key(&image)
    }

    /// Number of live images
    pub fn image_count(&self) -> usize {
        self.state.borrow().images.len()
    }

    /// Names of the top-level items of an image
    pub fn top_level_names(&self, image: ImageId) -> Result<Vec<String>> {
        let state = self.state.borrow();
        state
            .image(image)?
            .top
            .iter()
            .map(|id| Ok(state.node(*id)?.name.clone()))
            .collect()
    }

    pub fn is_undo_frozen(&self, image: ImageId) -> bool {
        self.state
            .borrow()
            .images
            .get(&image)
            .is_some_and(|image| image.undo_frozen)
    }

    pub fn undo_group_depth(&self, image: ImageId) -> usize {
        self.state
            .borrow()
            .images
            .get(&image)
            .map_or(0, |image| image.undo_group_depth)
    }
}

impl Host for MemoryHost {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn image_name(&self, image: ImageId) -> Result<String> {
        Ok(self.state.borrow().image(image)?.name.clone())
    }

    fn top_level_items(&self, image: ImageId) -> Result<Vec<RawItemId>> {
        Ok(self.state.borrow().image(image)?.top.clone())
    }

    fn children(&self, item: RawItemId) -> Result<Vec<RawItemId>> {
        Ok(self.state.borrow().node(item)?.children.clone())
    }

    fn parent(&self, item: RawItemId) -> Result<Option<RawItemId>> {
        Ok(self.state.borrow().node(item)?.parent)
    }

    fn is_group(&self, item: RawItemId) -> Result<bool> {
        Ok(self.state.borrow().node(item)?.is_group)
    }

    fn is_valid(&self, item: RawItemId) -> bool {
        self.state.borrow().nodes.contains_key(&item)
    }

    fn image_of(&self, item: RawItemId) -> Result<ImageId> {
        Ok(self.state.borrow().node(item)?.image)
    }

    fn name(&self, item: RawItemId) -> Result<String> {
        Ok(self.state.borrow().node(item)?.name.clone())
    }

    fn set_name(&mut self, item: RawItemId, name: &str) -> Result<()> {
        self.state.borrow_mut().node_mut(item)?.name = name.to_string();
        Ok(())
    }

    fn is_visible(&self, item: RawItemId) -> Result<bool> {
        Ok(self.state.borrow().node(item)?.visible)
    }

    fn set_visible(&mut self, item: RawItemId, visible: bool) -> Result<()> {
        self.state.borrow_mut().node_mut(item)?.visible = visible;
        Ok(())
    }

    fn color_tag(&self, item: RawItemId) -> Result<ColorTag> {
        Ok(self.state.borrow().node(item)?.color_tag)
    }

    fn set_color_tag(&mut self, item: RawItemId, tag: ColorTag) -> Result<()> {
        self.state.borrow_mut().node_mut(item)?.color_tag = tag;
        Ok(())
    }

    fn item_position(&self, item: RawItemId) -> Result<usize> {
        let state = self.state.borrow();
        let node = state.node(item)?;
        state
            .siblings(node.image, node.parent)?
            .iter()
            .position(|id| *id == item)
            .ok_or_else(|| BatcherError::Host(format!("{item} is detached")))
    }

    fn selected_items(&self, image: ImageId) -> Result<Vec<RawItemId>> {
        Ok(self.state.borrow().image(image)?.selected.clone())
    }

    fn set_selected_items(&mut self, image: ImageId, items: &[RawItemId]) -> Result<()> {
        self.state.borrow_mut().image_mut(image)?.selected = items.to_vec();
        Ok(())
    }

    fn duplicate_image(&mut self, image: ImageId, with_items: bool) -> Result<ImageId> {
        let mut state = self.state.borrow_mut();
        let source = state.image(image)?.clone();
        let id = ImageId::new(state.next_id());
        state.images.insert(
            id,
            Image {
                name: source.name.clone(),
                ..Image::default()
            },
        );
        if with_items {
            for (index, item) in source.top.iter().enumerate() {
                state.copy_subtree(*item, id, None, index)?;
            }
        }
        Ok(id)
    }

    fn delete_image(&mut self, image: ImageId) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let removed = state
            .images
            .remove(&image)
            .ok_or_else(|| BatcherError::Host(format!("Invalid image {image}")))?;
        for item in removed.top {
            state.delete_subtree(item);
        }
        Ok(())
    }

    fn copy_item(
        &mut self,
        item: RawItemId,
        dest: ImageId,
        parent: Option<RawItemId>,
        position: usize,
    ) -> Result<RawItemId> {
        let mut state = self.state.borrow_mut();
        state.image(dest)?;
        state.copy_subtree(item, dest, parent, position)
    }

    fn remove_item(&mut self, item: RawItemId) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.detach(item)?;
        state.delete_subtree(item);
        Ok(())
    }

    fn merge_down(&mut self, item: RawItemId) -> Result<RawItemId> {
        let mut state = self.state.borrow_mut();
        let node = state.node(item)?.clone();
        let siblings = state.siblings(node.image, node.parent)?;
        let position = siblings
            .iter()
            .position(|id| *id == item)
            .ok_or_else(|| BatcherError::Host(format!("{item} is detached")))?;
        let below = *siblings
            .get(position + 1)
            .ok_or_else(|| BatcherError::Host(format!("No item below {item} to merge into")))?;
        let lower = state.node(below)?.clone();

        state.detach(item)?;
        state.detach(below)?;
        state.delete_subtree(item);
        state.delete_subtree(below);

        let merged = Node {
            image: node.image,
            name: lower.name,
            parent: node.parent,
            children: Vec::new(),
            is_group: false,
            visible: lower.visible,
            color_tag: ColorTag::None,
        };
        state.insert_node(merged, position)
    }

    fn undo_freeze(&mut self, image: ImageId) -> Result<()> {
        self.state.borrow_mut().image_mut(image)?.undo_frozen = true;
        Ok(())
    }

    fn undo_thaw(&mut self, image: ImageId) -> Result<()> {
        self.state.borrow_mut().image_mut(image)?.undo_frozen = false;
        Ok(())
    }

    fn undo_group_start(&mut self, image: ImageId) -> Result<()> {
        self.state.borrow_mut().image_mut(image)?.undo_group_depth += 1;
        Ok(())
    }

    fn undo_group_end(&mut self, image: ImageId) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let image = state.image_mut(image)?;
        image.undo_group_depth = image.undo_group_depth.saturating_sub(1);
        Ok(())
    }
}
