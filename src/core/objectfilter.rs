//! Object filter
//!
//! A named boolean predicate tree. Each entry is either a rule (predicate
//! plus bound arguments) or a nested subfilter. Entries are combined with
//! [`MatchType::All`] or [`MatchType::Any`].
//!
//! # Examples
//!
//! ```
//! use batcher::core::objectfilter::{MatchType, ObjectFilter};
//!
//! let mut filter = ObjectFilter::<i32>::new("numbers", MatchType::All);
//! assert!(filter.is_match(&7));
//!
//! filter.add_rule("positive", |n: &i32, _| *n > 0, vec![]).unwrap();
//! assert!(filter.is_match(&7));
//! assert!(!filter.is_match(&-7));
//! ```

use crate::domain::ids::FilterId;
use crate::domain::{BatcherError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

/// Predicate signature: the candidate plus the rule's bound arguments
pub type RuleFn<T> = Rc<dyn Fn(&T, &[Value]) -> bool>;

/// How entries of a filter are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Every entry must match
    #[default]
    All,
    /// At least one entry must match
    Any,
}

/// A single predicate with bound arguments
pub struct Rule<T> {
    name: String,
    func: RuleFn<T>,
    args: Vec<Value>,
}

impl<T> Rule<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    fn is_match(&self, obj: &T) -> bool {
        (self.func)(obj, &self.args)
    }
}

impl<T> Clone for Rule<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            func: Rc::clone(&self.func),
            args: self.args.clone(),
        }
    }
}

impl<T> fmt::Debug for Rule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// Entry of an [`ObjectFilter`]
#[derive(Debug, Clone)]
pub enum FilterEntry<T> {
    Rule(Rule<T>),
    Subfilter(ObjectFilter<T>),
}

impl<T> FilterEntry<T> {
    pub fn name(&self) -> &str {
        match self {
            FilterEntry::Rule(rule) => rule.name(),
            FilterEntry::Subfilter(filter) => filter.name(),
        }
    }

    fn is_match(&self, obj: &T) -> bool {
        match self {
            FilterEntry::Rule(rule) => rule.is_match(obj),
            FilterEntry::Subfilter(filter) => filter.is_match(obj),
        }
    }
}

/// Boolean predicate tree over objects of type `T`
///
/// Entry names are unique within one filter (not across nested subfilters).
#[derive(Debug, Clone)]
pub struct ObjectFilter<T> {
    name: String,
    match_type: MatchType,
    entries: Vec<(FilterId, FilterEntry<T>)>,
    next_id: u64,
}

impl<T> ObjectFilter<T> {
    /// Creates an empty filter
    pub fn new(name: impl Into<String>, match_type: MatchType) -> Self {
        Self {
            name: name.into(),
            match_type,
            entries: Vec::new(),
            next_id: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn match_type(&self) -> MatchType {
        self.match_type
    }

    /// Number of direct entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds a rule
    ///
    /// # Errors
    ///
    /// Returns [`BatcherError::Filter`] if an entry with the same name exists.
    pub fn add_rule<F>(
        &mut self,
        name: impl Into<String>,
        func: F,
        args: Vec<Value>,
    ) -> Result<FilterId>
    where
        F: Fn(&T, &[Value]) -> bool + 'static,
    {
        self.add_rule_rc(name, Rc::new(func), args)
    }

    /// Adds a rule from a shared predicate
    pub fn add_rule_rc(
        &mut self,
        name: impl Into<String>,
        func: RuleFn<T>,
        args: Vec<Value>,
    ) -> Result<FilterId> {
        let rule = Rule {
            name: name.into(),
            func,
            args,
        };
        self.push(FilterEntry::Rule(rule))
    }

    /// Adds a nested filter, evaluated as a single predicate
    pub fn add_subfilter(&mut self, filter: ObjectFilter<T>) -> Result<FilterId> {
        self.push(FilterEntry::Subfilter(filter))
    }

    fn push(&mut self, entry: FilterEntry<T>) -> Result<FilterId> {
        if self.find(entry.name()).is_some() {
            return Err(BatcherError::Filter(format!(
                "Filter '{}' already contains an entry named '{}'",
                self.name,
                entry.name()
            )));
        }
        self.next_id += 1;
        let id = FilterId(self.next_id);
        self.entries.push((id, entry));
        Ok(id)
    }

    /// Returns the id of the entry with the given name
    pub fn find(&self, name: &str) -> Option<FilterId> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.name() == name)
            .map(|(id, _)| *id)
    }

    pub fn contains(&self, id: FilterId) -> bool {
        self.entries.iter().any(|(entry_id, _)| *entry_id == id)
    }

    pub fn get(&self, id: FilterId) -> Option<&FilterEntry<T>> {
        self.entries
            .iter()
            .find(|(entry_id, _)| *entry_id == id)
            .map(|(_, entry)| entry)
    }

    /// Returns the nested filter with the given name
    pub fn get_subfilter(&self, name: &str) -> Option<&ObjectFilter<T>> {
        self.entries.iter().find_map(|(_, entry)| match entry {
            FilterEntry::Subfilter(filter) if filter.name() == name => Some(filter),
            _ => None,
        })
    }

    pub fn get_subfilter_mut(&mut self, name: &str) -> Option<&mut ObjectFilter<T>> {
        self.entries.iter_mut().find_map(|(_, entry)| match entry {
            FilterEntry::Subfilter(filter) if filter.name() == name => Some(filter),
            _ => None,
        })
    }

    /// Removes an entry by id
    ///
    /// # Errors
    ///
    /// Returns [`BatcherError::Filter`] if no entry has this id.
    pub fn remove(&mut self, id: FilterId) -> Result<FilterEntry<T>> {
        let index = self.index_of(id).ok_or_else(|| {
            BatcherError::Filter(format!("Filter '{}' has no entry {id}", self.name))
        })?;
        Ok(self.entries.remove(index).1)
    }

    /// Removes an entry by name
    pub fn remove_by_name(&mut self, name: &str) -> Result<FilterEntry<T>> {
        let id = self.find(name).ok_or_else(|| {
            BatcherError::Filter(format!(
                "Filter '{}' has no entry named '{name}'",
                self.name
            ))
        })?;
        self.remove(id)
    }

    /// Removes all entries
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    fn index_of(&self, id: FilterId) -> Option<usize> {
        self.entries.iter().position(|(entry_id, _)| *entry_id == id)
    }

    /// Evaluates the filter against `obj`
    ///
    /// An empty filter matches everything.
    pub fn is_match(&self, obj: &T) -> bool {
        if self.entries.is_empty() {
            return true;
        }
        match self.match_type {
            MatchType::All => self.entries.iter().all(|(_, entry)| entry.is_match(obj)),
            MatchType::Any => self.entries.iter().any(|(_, entry)| entry.is_match(obj)),
        }
    }

    /// Adds a rule that is removed when the returned guard is dropped
    pub fn add_rule_temp<F>(
        &mut self,
        name: impl Into<String>,
        func: F,
        args: Vec<Value>,
    ) -> Result<TempRule<'_, T>>
    where
        F: Fn(&T, &[Value]) -> bool + 'static,
    {
        let id = self.add_rule(name, func, args)?;
        Ok(TempRule { filter: self, id })
    }

    /// Removes an entry until the returned guard is dropped
    ///
    /// The entry is put back at its original position.
    pub fn remove_rule_temp(&mut self, name: &str) -> Result<RemovedRule<'_, T>> {
        let id = self.find(name).ok_or_else(|| {
            BatcherError::Filter(format!(
                "Filter '{}' has no entry named '{name}'",
                self.name
            ))
        })?;
        let index = self.index_of(id).unwrap_or(self.entries.len());
        let (id, entry) = self.entries.remove(index);
        Ok(RemovedRule {
            filter: self,
            index,
            removed: Some((id, entry)),
        })
    }
}

/// Guard returned by [`ObjectFilter::add_rule_temp`]
pub struct TempRule<'a, T> {
    filter: &'a mut ObjectFilter<T>,
    id: FilterId,
}

impl<T> TempRule<'_, T> {
    pub fn id(&self) -> FilterId {
        self.id
    }
}

impl<T> Deref for TempRule<'_, T> {
    type Target = ObjectFilter<T>;

    fn deref(&self) -> &Self::Target {
        self.filter
    }
}

impl<T> DerefMut for TempRule<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.filter
    }
}

impl<T> Drop for TempRule<'_, T> {
    fn drop(&mut self) {
        if let Some(index) = self.filter.index_of(self.id) {
            self.filter.entries.remove(index);
        }
    }
}

/// Guard returned by [`ObjectFilter::remove_rule_temp`]
pub struct RemovedRule<'a, T> {
    filter: &'a mut ObjectFilter<T>,
    index: usize,
    removed: Option<(FilterId, FilterEntry<T>)>,
}

impl<T> Deref for RemovedRule<'_, T> {
    type Target = ObjectFilter<T>;

    fn deref(&self) -> &Self::Target {
        self.filter
    }
}

impl<T> DerefMut for RemovedRule<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.filter
    }
}

impl<T> Drop for RemovedRule<'_, T> {
    fn drop(&mut self) {
        if let Some((id, entry)) = self.removed.take() {
            let index = self.index.min(self.filter.entries.len());
            self.filter.entries.insert(index, (id, entry));
        }
    }
}
