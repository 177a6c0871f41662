//! Invoker
//!
//! Ordered registry of actions grouped by name. Invoking a group calls its
//! actions in insertion order against a shared context. Three kinds of
//! entries exist:
//!
//! - plain functions
//! - step actions ([`StepAction`]), which keep state across invocations and
//!   are told when the pipeline begins and ends
//! - nested invokers, invoked recursively with the same group and arguments
//!
//! Foreach entries of a group run right after each regular entry of that
//! group.

use crate::domain::ids::ActionId;
use crate::domain::{BatcherError, Result};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// Action signature: the invocation context plus the final argument list
pub type ActionFn<C> = Rc<dyn Fn(&mut C, &[Value]) -> Result<()>>;

/// Action that keeps state across invocations
///
/// `begin` runs once before the first `step`; `end` runs when the owning
/// pipeline finishes (see [`Invoker::finish`]).
pub trait StepAction<C> {
    fn begin(&mut self, _ctx: &mut C, _args: &[Value]) -> Result<()> {
        Ok(())
    }

    fn step(&mut self, ctx: &mut C, args: &[Value]) -> Result<()>;

    fn end(&mut self, _ctx: &mut C) -> Result<()> {
        Ok(())
    }
}

struct StepSlot<C> {
    action: Box<dyn StepAction<C>>,
    begun: bool,
}

enum Callable<C> {
    Func(ActionFn<C>),
    Step(Rc<RefCell<StepSlot<C>>>),
    Nested(Rc<RefCell<Invoker<C>>>),
}

impl<C> Clone for Callable<C> {
    fn clone(&self) -> Self {
        match self {
            Callable::Func(func) => Callable::Func(Rc::clone(func)),
            Callable::Step(slot) => Callable::Step(Rc::clone(slot)),
            Callable::Nested(invoker) => Callable::Nested(Rc::clone(invoker)),
        }
    }
}

struct Action<C> {
    callable: Callable<C>,
    args: Vec<Value>,
    foreach: bool,
}

#[derive(Debug, Default)]
struct Group {
    actions: Vec<ActionId>,
    foreach_actions: Vec<ActionId>,
}

impl Group {
    fn list_mut(&mut self, foreach: bool) -> &mut Vec<ActionId> {
        if foreach {
            &mut self.foreach_actions
        } else {
            &mut self.actions
        }
    }

    fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.foreach_actions.is_empty()
    }
}

/// Named-group action registry and dispatcher
pub struct Invoker<C> {
    groups: Vec<(String, Group)>,
    actions: HashMap<ActionId, Action<C>>,
    next_id: u64,
}

impl<C> Default for Invoker<C> {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            actions: HashMap::new(),
            next_id: 0,
        }
    }
}

impl<C> fmt::Debug for Invoker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invoker")
            .field("groups", &self.groups)
            .field("num_actions", &self.actions.len())
            .finish()
    }
}

impl<C> Invoker<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a function to each of `groups`
    pub fn add<F>(&mut self, func: F, groups: &[&str], args: Vec<Value>) -> ActionId
    where
        F: Fn(&mut C, &[Value]) -> Result<()> + 'static,
    {
        self.add_callable(Callable::Func(Rc::new(func)), groups, args, false)
    }

    /// Adds a shared function to each of `groups`
    pub fn add_rc(&mut self, func: ActionFn<C>, groups: &[&str], args: Vec<Value>) -> ActionId {
        self.add_callable(Callable::Func(func), groups, args, false)
    }

    /// Adds a function run after every regular action of `groups`
    pub fn add_foreach<F>(&mut self, func: F, groups: &[&str], args: Vec<Value>) -> ActionId
    where
        F: Fn(&mut C, &[Value]) -> Result<()> + 'static,
    {
        self.add_callable(Callable::Func(Rc::new(func)), groups, args, true)
    }

    /// Adds a step action to each of `groups`
    pub fn add_step(
        &mut self,
        action: Box<dyn StepAction<C>>,
        groups: &[&str],
        args: Vec<Value>,
    ) -> ActionId {
        let slot = StepSlot {
            action,
            begun: false,
        };
        self.add_callable(
            Callable::Step(Rc::new(RefCell::new(slot))),
            groups,
            args,
            false,
        )
    }

    /// Adds a nested invoker to each of `groups`
    pub fn add_invoker(&mut self, invoker: Rc<RefCell<Invoker<C>>>, groups: &[&str]) -> ActionId {
        self.add_callable(Callable::Nested(invoker), groups, Vec::new(), false)
    }

    fn add_callable(
        &mut self,
        callable: Callable<C>,
        groups: &[&str],
        args: Vec<Value>,
        foreach: bool,
    ) -> ActionId {
        self.next_id += 1;
        let id = ActionId(self.next_id);

        for name in groups {
            self.group_mut_or_insert(name).list_mut(foreach).push(id);
        }

        self.actions.insert(
            id,
            Action {
                callable,
                args,
                foreach,
            },
        );
        id
    }

    fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|(n, _)| n == name).map(|(_, g)| g)
    }

    fn group_mut(&mut self, name: &str) -> Option<&mut Group> {
        self.groups
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, g)| g)
    }

    fn group_mut_or_insert(&mut self, name: &str) -> &mut Group {
        let index = match self.groups.iter().position(|(n, _)| n == name) {
            Some(index) => index,
            None => {
                self.groups.push((name.to_string(), Group::default()));
                self.groups.len() - 1
            }
        };
        &mut self.groups[index].1
    }

    pub fn contains(&self, id: ActionId) -> bool {
        self.actions.contains_key(&id)
    }

    /// Group names, in creation order
    ///
    /// Groups whose actions were all removed are listed only with
    /// `include_empty_groups`.
    pub fn list_groups(&self, include_empty_groups: bool) -> Vec<String> {
        self.groups
            .iter()
            .filter(|(_, group)| include_empty_groups || !group.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Regular (or foreach) action ids of a group, in invocation order
    pub fn list_actions(&self, group: &str, foreach: bool) -> Vec<ActionId> {
        self.group(group)
            .map(|g| {
                if foreach {
                    g.foreach_actions.clone()
                } else {
                    g.actions.clone()
                }
            })
            .unwrap_or_default()
    }

    /// Groups containing the action
    pub fn action_groups(&self, id: ActionId) -> Vec<String> {
        self.groups
            .iter()
            .filter(|(_, g)| g.actions.contains(&id) || g.foreach_actions.contains(&id))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Removes an action from `groups`, or from every group if `None`
    ///
    /// # Errors
    ///
    /// Returns an error if the action is unknown or not in one of `groups`.
    pub fn remove(&mut self, id: ActionId, groups: Option<&[&str]>) -> Result<()> {
        let foreach = self
            .actions
            .get(&id)
            .map(|action| action.foreach)
            .ok_or_else(|| BatcherError::Configuration(format!("{id} is not registered")))?;

        let targets: Vec<String> = match groups {
            Some(groups) => groups.iter().map(|g| g.to_string()).collect(),
            None => self.action_groups(id),
        };

        for name in &targets {
            let list = self
                .group_mut(name)
                .map(|g| g.list_mut(foreach))
                .filter(|list| list.contains(&id))
                .ok_or_else(|| {
                    BatcherError::Configuration(format!("{id} is not in group '{name}'"))
                })?;
            list.retain(|action_id| *action_id != id);
        }

        if self.action_groups(id).is_empty() {
            self.actions.remove(&id);
        }
        Ok(())
    }

    /// Moves an action within `group`
    ///
    /// Negative positions count from the end (`-1` is last). Positions past
    /// either end are clamped.
    pub fn reorder(&mut self, id: ActionId, group: &str, position: isize) -> Result<()> {
        let foreach = self
            .actions
            .get(&id)
            .map(|action| action.foreach)
            .ok_or_else(|| BatcherError::Configuration(format!("{id} is not registered")))?;

        let list = self
            .group_mut(group)
            .map(|g| g.list_mut(foreach))
            .filter(|list| list.contains(&id))
            .ok_or_else(|| BatcherError::Configuration(format!("{id} is not in group '{group}'")))?;

        list.retain(|action_id| *action_id != id);
        let len = list.len() as isize;
        let index = if position >= 0 {
            position.min(len)
        } else {
            (len + 1 + position).max(0)
        };
        list.insert(index as usize, id);
        Ok(())
    }

    /// Invokes every action of `groups` in order
    ///
    /// `additional_args` are spliced into each action's own arguments at
    /// `position` (appended when `None`). The first error stops invocation
    /// and is returned unchanged.
    pub fn invoke(
        &self,
        groups: &[&str],
        ctx: &mut C,
        additional_args: &[Value],
        position: Option<usize>,
    ) -> Result<()> {
        for name in groups {
            let Some(group) = self.group(name) else {
                continue;
            };

            for id in &group.actions {
                self.invoke_action(*id, name, ctx, additional_args, position)?;
                for foreach_id in &group.foreach_actions {
                    self.invoke_action(*foreach_id, name, ctx, additional_args, position)?;
                }
            }
        }
        Ok(())
    }

    fn invoke_action(
        &self,
        id: ActionId,
        group: &str,
        ctx: &mut C,
        additional_args: &[Value],
        position: Option<usize>,
    ) -> Result<()> {
        let Some(action) = self.actions.get(&id) else {
            return Ok(());
        };

        trace!(action = %id, group, "Invoking action");

        match &action.callable {
            Callable::Nested(invoker) => {
                invoker
                    .borrow()
                    .invoke(&[group], ctx, additional_args, position)
            }
            Callable::Func(func) => {
                let args = splice_args(&action.args, additional_args, position);
                func(ctx, &args)
            }
            Callable::Step(slot) => {
                let args = splice_args(&action.args, additional_args, position);
                let mut slot = slot.borrow_mut();
                if !slot.begun {
                    slot.action.begin(ctx, &args)?;
                    slot.begun = true;
                }
                slot.action.step(ctx, &args)
            }
        }
    }

    /// Ends every begun step action, nested invokers included
    ///
    /// Actions are ended in group order, then in their order within the
    /// group. All actions are ended even if one fails; the first error is
    /// returned.
    pub fn finish(&self, ctx: &mut C) -> Result<()> {
        let mut first_error = None;
        let mut finished = HashSet::new();

        let ordered_ids = self
            .groups
            .iter()
            .flat_map(|(_, group)| group.actions.iter().chain(&group.foreach_actions));

        for id in ordered_ids {
            if !finished.insert(*id) {
                continue;
            }
            let Some(action) = self.actions.get(id) else {
                continue;
            };
            let result = match &action.callable {
                Callable::Func(_) => Ok(()),
                Callable::Nested(invoker) => invoker.borrow().finish(ctx),
                Callable::Step(slot) => {
                    let mut slot = slot.borrow_mut();
                    if slot.begun {
                        slot.begun = false;
                        slot.action.end(ctx)
                    } else {
                        Ok(())
                    }
                }
            };
            if let Err(err) = result {
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn splice_args(args: &[Value], additional: &[Value], position: Option<usize>) -> Vec<Value> {
    let position = position.unwrap_or(args.len()).min(args.len());
    let mut result = Vec::with_capacity(args.len() + additional.len());
    result.extend_from_slice(&args[..position]);
    result.extend_from_slice(additional);
    result.extend_from_slice(&args[position..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    type Log = Vec<String>;

    fn record(tag: &'static str) -> impl Fn(&mut Log, &[Value]) -> Result<()> {
        move |log: &mut Log, args: &[Value]| {
            if args.is_empty() {
                log.push(tag.to_string());
            } else {
                let args: Vec<String> = args.iter().map(Value::to_string).collect();
                log.push(format!("{tag}[{}]", args.join(", ")));
            }
            Ok(())
        }
    }

    #[test]
    fn test_invocation_follows_insertion_order() {
        let mut invoker = Invoker::new();
        invoker.add(record("p1"), &["main"], vec![]);
        invoker.add(record("p2"), &["main"], vec![]);
        invoker.add(record("p3"), &["main"], vec![]);

        let mut log = Log::new();
        invoker.invoke(&["main"], &mut log, &[], None).unwrap();
        assert_eq!(log, vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_reorder_to_front() {
        let mut invoker = Invoker::new();
        invoker.add(record("p1"), &["main"], vec![]);
        let p2 = invoker.add(record("p2"), &["main"], vec![]);
        invoker.add(record("p3"), &["main"], vec![]);

        invoker.reorder(p2, "main", 0).unwrap();

        let mut log = Log::new();
        invoker.invoke(&["main"], &mut log, &[], None).unwrap();
        assert_eq!(log, vec!["p2", "p1", "p3"]);
    }

    #[test_case(-1, &["p2", "p3", "p1"] ; "minus one is last")]
    #[test_case(-2, &["p2", "p1", "p3"] ; "minus two")]
    #[test_case(10, &["p2", "p3", "p1"] ; "past end clamps")]
    #[test_case(-10, &["p1", "p2", "p3"] ; "before start clamps")]
    fn test_reorder_positions(position: isize, expected: &[&str]) {
        let mut invoker = Invoker::new();
        let p1 = invoker.add(record("p1"), &["main"], vec![]);
        invoker.add(record("p2"), &["main"], vec![]);
        invoker.add(record("p3"), &["main"], vec![]);

        invoker.reorder(p1, "main", position).unwrap();

        let mut log = Log::new();
        invoker.invoke(&["main"], &mut log, &[], None).unwrap();
        assert_eq!(log, expected);
    }

    #[test]
    fn test_reorder_only_affects_named_group() {
        let mut invoker = Invoker::new();
        let a = invoker.add(record("a"), &["one", "two"], vec![]);
        invoker.add(record("b"), &["one", "two"], vec![]);

        invoker.reorder(a, "one", -1).unwrap();

        let mut log = Log::new();
        invoker.invoke(&["one"], &mut log, &[], None).unwrap();
        invoker.invoke(&["two"], &mut log, &[], None).unwrap();
        assert_eq!(log, vec!["b", "a", "a", "b"]);
    }

    #[test]
    fn test_foreach_runs_after_each_action() {
        let mut invoker = Invoker::new();
        invoker.add(record("p1"), &["main"], vec![]);
        invoker.add_foreach(record("each"), &["main"], vec![]);
        invoker.add(record("p2"), &["main"], vec![]);

        let mut log = Log::new();
        invoker.invoke(&["main"], &mut log, &[], None).unwrap();
        assert_eq!(log, vec!["p1", "each", "p2", "each"]);
    }

    #[test_case(Some(0), "p[1, 2, 3]" ; "prepended")]
    #[test_case(Some(1), "p[2, 1, 3]" ; "in the middle")]
    #[test_case(None, "p[2, 3, 1]" ; "appended")]
    fn test_additional_args_are_spliced(position: Option<usize>, expected: &str) {
        let mut invoker = Invoker::new();
        invoker.add(record("p"), &["main"], vec![json!(2), json!(3)]);

        let mut log = Log::new();
        invoker
            .invoke(&["main"], &mut log, &[json!(1)], position)
            .unwrap();
        assert_eq!(log, vec![expected]);
    }

    #[test]
    fn test_error_stops_invocation() {
        let mut invoker = Invoker::new();
        invoker.add(record("p1"), &["main"], vec![]);
        invoker.add(
            |_: &mut Log, _: &[Value]| Err(BatcherError::Skip("skip".to_string())),
            &["main"],
            vec![],
        );
        invoker.add(record("p3"), &["main"], vec![]);

        let mut log = Log::new();
        let err = invoker.invoke(&["main"], &mut log, &[], None).unwrap_err();
        assert!(err.is_skip());
        assert_eq!(log, vec!["p1"]);
    }

    #[test]
    fn test_remove_from_some_groups() {
        let mut invoker = Invoker::new();
        let id = invoker.add(record("a"), &["one", "two"], vec![]);

        invoker.remove(id, Some(&["one"])).unwrap();
        assert!(invoker.contains(id));
        assert_eq!(invoker.action_groups(id), vec!["two"]);

        invoker.remove(id, None).unwrap();
        assert!(!invoker.contains(id));
        assert!(invoker.remove(id, None).is_err());
    }

    #[test]
    fn test_list_groups() {
        let mut invoker = Invoker::<Log>::new();
        let id = invoker.add(record("a"), &["one"], vec![]);
        invoker.add(record("b"), &["two"], vec![]);
        invoker.remove(id, None).unwrap();

        assert_eq!(invoker.list_groups(false), vec!["two"]);
        assert_eq!(invoker.list_groups(true), vec!["one", "two"]);
    }

    #[test]
    fn test_nested_invoker() {
        let nested = Rc::new(RefCell::new(Invoker::new()));
        nested.borrow_mut().add(record("inner"), &["main"], vec![]);
        nested.borrow_mut().add(record("other"), &["other"], vec![]);

        let mut invoker = Invoker::new();
        invoker.add(record("before"), &["main"], vec![]);
        let groups = nested.borrow().list_groups(true);
        let group_refs: Vec<&str> = groups.iter().map(String::as_str).collect();
        invoker.add_invoker(Rc::clone(&nested), &group_refs);
        invoker.add(record("after"), &["main"], vec![]);

        let mut log = Log::new();
        invoker.invoke(&["main"], &mut log, &[], None).unwrap();
        assert_eq!(log, vec!["before", "inner", "after"]);

        nested.borrow_mut().add(record("late"), &["main"], vec![]);
        log.clear();
        invoker.invoke(&["main"], &mut log, &[], None).unwrap();
        assert_eq!(log, vec!["before", "inner", "late", "after"]);
    }

    struct Counter {
        count: usize,
    }

    impl StepAction<Log> for Counter {
        fn begin(&mut self, log: &mut Log, _args: &[Value]) -> Result<()> {
            log.push("begin".to_string());
            Ok(())
        }

        fn step(&mut self, log: &mut Log, _args: &[Value]) -> Result<()> {
            self.count += 1;
            log.push(format!("step{}", self.count));
            Ok(())
        }

        fn end(&mut self, log: &mut Log) -> Result<()> {
            log.push("end".to_string());
            Ok(())
        }
    }

    #[test]
    fn test_step_action_lifecycle() {
        let nested = Rc::new(RefCell::new(Invoker::new()));
        nested
            .borrow_mut()
            .add_step(Box::new(Counter { count: 0 }), &["main"], vec![]);

        let mut invoker = Invoker::new();
        invoker.add_step(Box::new(Counter { count: 10 }), &["main"], vec![]);
        invoker.add_invoker(Rc::clone(&nested), &["main"]);

        let mut log = Log::new();
        invoker.invoke(&["main"], &mut log, &[], None).unwrap();
        invoker.invoke(&["main"], &mut log, &[], None).unwrap();
        assert_eq!(
            log,
            vec!["begin", "step11", "begin", "step1", "step12", "step2"]
        );

        log.clear();
        invoker.finish(&mut log).unwrap();
        assert_eq!(log, vec!["end", "end"]);

        log.clear();
        invoker.finish(&mut log).unwrap();
        assert!(log.is_empty());
    }

    struct Named(&'static str);

    impl StepAction<Log> for Named {
        fn step(&mut self, _log: &mut Log, _args: &[Value]) -> Result<()> {
            Ok(())
        }

        fn end(&mut self, log: &mut Log) -> Result<()> {
            log.push(format!("end {}", self.0));
            Ok(())
        }
    }

    #[test]
    fn test_finish_follows_registration_order() {
        let mut invoker = Invoker::new();
        let names = ["s1", "s2", "s3", "s4", "s5", "s6"];
        let mut ids = Vec::new();
        for name in names {
            ids.push(invoker.add_step(Box::new(Named(name)), &["main", "other"], vec![]));
        }
        invoker.add_step(Box::new(Named("s7")), &["other"], vec![]);
        invoker.reorder(ids[5], "main", 0).unwrap();

        let mut log = Log::new();
        invoker.invoke(&["other", "main"], &mut log, &[], None).unwrap();
        invoker.finish(&mut log).unwrap();
        assert_eq!(
            log,
            vec!["end s6", "end s1", "end s2", "end s3", "end s4", "end s5", "end s7"]
        );
    }

    #[test]
    fn test_unknown_group_is_ignored() {
        let invoker = Invoker::<Log>::new();
        let mut log = Log::new();
        invoker.invoke(&["missing"], &mut log, &[], None).unwrap();
        assert!(log.is_empty());
    }
}
