//! Name uniquification
//!
//! Collisions are logical: they are checked against names this run has
//! already produced, never against the file system.

use crate::domain::item::{Item, ItemKey};
use std::collections::{HashMap, HashSet};

/// Inserts ` (n)` into `s` at `position` until `is_taken` returns `false`
///
/// `n` starts at 1. `position` defaults to the end of the string and is
/// clamped to a valid character boundary. `s` is returned unchanged when it
/// is not taken.
///
/// # Examples
///
/// ```
/// use batcher::core::uniquifier::uniquify_string;
///
/// let taken = ["image.png", "image (1).png"];
/// let unique = uniquify_string("image.png", |s| taken.contains(&s), Some(5));
/// assert_eq!(unique, "image (2).png");
/// ```
pub fn uniquify_string(s: &str, is_taken: impl Fn(&str) -> bool, position: Option<usize>) -> String {
    if !is_taken(s) {
        return s.to_string();
    }

    let mut position = position.unwrap_or(s.len()).min(s.len());
    while !s.is_char_boundary(position) {
        position -= 1;
    }
    let (head, tail) = s.split_at(position);

    let mut n: u64 = 1;
    loop {
        let candidate = format!("{head} ({n}){tail}");
        if !is_taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Per-run uniquifier for item names
///
/// Names are tracked per parent scope, so the same name under different
/// parents never collides. Comparison is case-sensitive.
#[derive(Debug, Default, Clone)]
pub struct ItemUniquifier {
    seen: HashMap<Option<ItemKey>, HashSet<String>>,
}

impl ItemUniquifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `item.name` unique within the item's parent scope
    ///
    /// Returns `true` if the name had to be changed. The final name is
    /// recorded as seen.
    pub fn uniquify(&mut self, item: &mut Item, position: Option<usize>) -> bool {
        let names = self.seen.entry(item.parent()).or_default();
        let unique = uniquify_string(&item.name, |name| names.contains(name), position);
        let changed = unique != item.name;
        names.insert(unique.clone());
        item.name = unique;
        changed
    }

    /// Forgets every recorded name
    pub fn reset(&mut self) {
        self.seen.clear();
    }
}
