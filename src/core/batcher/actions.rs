//! Action registry
//!
//! Configured actions refer to functions by name. The registry maps those
//! names to procedures and constraints and installs configured actions into
//! an invoker, so persisted configuration never holds code.

use super::context::BatchContext;
use crate::config::ActionConfig;
use crate::core::invoker::{ActionFn, Invoker, StepAction};
use crate::core::objectfilter::{MatchType, ObjectFilter};
use crate::domain::item::Item;
use crate::domain::{BatcherError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Group holding the procedures applied to each item
pub const DEFAULT_PROCEDURES_GROUP: &str = "default_procedures";
/// Group holding the constraints, invoked once before processing
pub const DEFAULT_CONSTRAINTS_GROUP: &str = "default_constraints";
/// Group of the name-only preview pass
pub const NAME_ONLY_GROUP: &str = "name";
/// Tag marking actions that take part in the name-only pass
pub const NAME_ONLY_TAG: &str = "name";

/// Predicate of a constraint
///
/// Receives the candidate item, run-wide values, and the configured
/// arguments.
pub type ConstraintFn = Rc<dyn Fn(&Item, &ConstraintEnv, &[Value]) -> bool>;

/// Creates a fresh step action for each installation
pub type StepFactory = Rc<dyn Fn() -> Box<dyn StepAction<BatchContext>>>;

/// Run-wide values available to constraint predicates
#[derive(Debug, Clone)]
pub struct ConstraintEnv {
    /// Default file extension of the run
    pub file_extension: String,
}

#[derive(Clone)]
enum ProcedureEntry {
    Func(ActionFn<BatchContext>),
    Step(StepFactory),
}

/// Name-keyed procedures and constraints
#[derive(Clone, Default)]
pub struct ActionRegistry {
    procedures: HashMap<String, ProcedureEntry>,
    constraints: HashMap<String, ConstraintFn>,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut procedures: Vec<_> = self.procedures.keys().collect();
        procedures.sort();
        let mut constraints: Vec<_> = self.constraints.keys().collect();
        constraints.sort();
        f.debug_struct("ActionRegistry")
            .field("procedures", &procedures)
            .field("constraints", &constraints)
            .finish()
    }
}

impl ActionRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in procedures and constraints
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        super::builtin_procedures::register(&mut registry);
        super::background::register(&mut registry);
        super::builtin_constraints::register(&mut registry);
        registry
    }

    pub fn register_procedure<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&mut BatchContext, &[Value]) -> Result<()> + 'static,
    {
        self.procedures
            .insert(name.into(), ProcedureEntry::Func(Rc::new(func)));
    }

    /// Registers a procedure keeping state across items
    pub fn register_step_procedure<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn StepAction<BatchContext>> + 'static,
    {
        self.procedures
            .insert(name.into(), ProcedureEntry::Step(Rc::new(factory)));
    }

    pub fn register_constraint<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&Item, &ConstraintEnv, &[Value]) -> bool + 'static,
    {
        self.constraints.insert(name.into(), Rc::new(func));
    }

    pub fn has_procedure(&self, name: &str) -> bool {
        self.procedures.contains_key(name)
    }

    pub fn has_constraint(&self, name: &str) -> bool {
        self.constraints.contains_key(name)
    }

    /// Installs a configured procedure into `invoker`
    ///
    /// Inactive procedures (disabled, or disabled for previews during a
    /// preview) are not installed. `groups` overrides the configured groups.
    ///
    /// # Errors
    ///
    /// Returns [`BatcherError::InvalidProcedure`] if the function is not
    /// registered.
    pub fn install_procedure(
        &self,
        invoker: &mut Invoker<BatchContext>,
        action: &ActionConfig,
        groups: Option<&[&str]>,
        is_preview: bool,
    ) -> Result<()> {
        let entry = self.procedures.get(action.function()).ok_or_else(|| {
            BatcherError::InvalidProcedure(format!(
                "invalid procedure \"{}\" for action \"{}\"",
                action.function(),
                action.name
            ))
        })?;

        if !action.is_active(is_preview) {
            debug!(action = %action.name, "Procedure disabled, not installed");
            return Ok(());
        }

        let configured = action_groups(action, DEFAULT_PROCEDURES_GROUP);
        let groups = groups.map(|g| g.to_vec()).unwrap_or_else(|| {
            configured.iter().map(String::as_str).collect()
        });
        let name = action.name.clone();
        let args = action.argument_values();

        match entry {
            ProcedureEntry::Func(func) => {
                let func = Rc::clone(func);
                invoker.add(
                    move |ctx: &mut BatchContext, args: &[Value]| {
                        ctx.current_procedure = Some(name.clone());
                        func(ctx, args)
                    },
                    &groups,
                    args,
                );
            }
            ProcedureEntry::Step(factory) => {
                let step = NamedStep {
                    name,
                    inner: factory(),
                };
                invoker.add_step(Box::new(step), &groups, args);
            }
        }

        debug!(action = %action.name, ?groups, "Installed procedure");
        Ok(())
    }

    /// Installs a configured constraint into `invoker`
    ///
    /// Invoking the installed action adds a rule named after the action to
    /// the item tree filter, or to the named subfilter (created on first use
    /// with any-match semantics). Invoking it again once the rule exists
    /// does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`BatcherError::InvalidProcedure`] if the function is not
    /// registered.
    pub fn install_constraint(
        &self,
        invoker: &mut Invoker<BatchContext>,
        action: &ActionConfig,
        groups: Option<&[&str]>,
        is_preview: bool,
    ) -> Result<()> {
        let func = self.constraints.get(action.function()).ok_or_else(|| {
            BatcherError::InvalidProcedure(format!(
                "invalid constraint \"{}\" for action \"{}\"",
                action.function(),
                action.name
            ))
        })?;

        if !action.is_active(is_preview) {
            debug!(action = %action.name, "Constraint disabled, not installed");
            return Ok(());
        }

        let configured = action_groups(action, DEFAULT_CONSTRAINTS_GROUP);
        let groups = groups.map(|g| g.to_vec()).unwrap_or_else(|| {
            configured.iter().map(String::as_str).collect()
        });

        invoker.add_rc(
            constraint_action(Rc::clone(func), action.name.clone(), action.subfilter.clone()),
            &groups,
            action.argument_values(),
        );

        debug!(action = %action.name, ?groups, "Installed constraint");
        Ok(())
    }
}

fn action_groups(action: &ActionConfig, default_group: &str) -> Vec<String> {
    if action.action_groups.is_empty() {
        vec![default_group.to_string()]
    } else {
        action.action_groups.clone()
    }
}

/// Wraps a predicate into an action adding it as a filter rule
pub fn constraint_action(
    func: ConstraintFn,
    rule_name: String,
    subfilter: Option<String>,
) -> ActionFn<BatchContext> {
    Rc::new(move |ctx: &mut BatchContext, args: &[Value]| -> Result<()> {
        let env = ConstraintEnv {
            file_extension: ctx.export.file_extension.clone(),
        };
        let func = Rc::clone(&func);
        let rule = move |item: &Item, args: &[Value]| func(item, &env, args);

        let filter = ctx.item_tree.filter_mut();
        let target = match &subfilter {
            None => filter,
            Some(name) => {
                if filter.get_subfilter(name).is_none() {
                    filter.add_subfilter(ObjectFilter::new(name.clone(), MatchType::Any))?;
                }
                filter.get_subfilter_mut(name).ok_or_else(|| {
                    BatcherError::Filter(format!("Subfilter '{name}' could not be created"))
                })?
            }
        };

        // The name-only pass re-invokes constraints once per item.
        if target.find(&rule_name).is_none() {
            target.add_rule(rule_name.clone(), rule, args.to_vec())?;
        }
        Ok(())
    })
}

/// Step action recording its name as the current procedure
struct NamedStep {
    name: String,
    inner: Box<dyn StepAction<BatchContext>>,
}

impl StepAction<BatchContext> for NamedStep {
    fn begin(&mut self, ctx: &mut BatchContext, args: &[Value]) -> Result<()> {
        ctx.current_procedure = Some(self.name.clone());
        self.inner.begin(ctx, args)
    }

    fn step(&mut self, ctx: &mut BatchContext, args: &[Value]) -> Result<()> {
        ctx.current_procedure = Some(self.name.clone());
        self.inner.step(ctx, args)
    }

    fn end(&mut self, ctx: &mut BatchContext) -> Result<()> {
        self.inner.end(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = ActionRegistry::with_builtins();

        for name in [
            "rename",
            "export",
            "insert_background",
            "insert_foreground",
            "merge_background",
            "merge_foreground",
            "remove_folder_structure",
        ] {
            assert!(registry.has_procedure(name), "missing procedure {name}");
        }
        for name in [
            "layers",
            "group_layers",
            "matching_file_extension",
            "selected_in_host",
            "top_level",
            "visible",
            "with_color_tags",
            "without_color_tags",
            "not_background",
            "not_foreground",
        ] {
            assert!(registry.has_constraint(name), "missing constraint {name}");
        }
    }

    #[test]
    fn test_unknown_function_is_invalid_procedure() {
        let registry = ActionRegistry::new();
        let mut invoker = Invoker::new();
        let action = ActionConfig::new("sharpen");

        let err = registry
            .install_procedure(&mut invoker, &action, None, false)
            .unwrap_err();
        assert!(matches!(err, BatcherError::InvalidProcedure(_)));

        let err = registry
            .install_constraint(&mut invoker, &action, None, false)
            .unwrap_err();
        assert!(matches!(err, BatcherError::InvalidProcedure(_)));
    }

    #[test]
    fn test_inactive_actions_not_installed() {
        let mut registry = ActionRegistry::new();
        registry.register_procedure("noop", |_: &mut BatchContext, _: &[Value]| Ok(()));
        let mut invoker = Invoker::new();

        let disabled = ActionConfig::new("noop").with_enabled(false);
        registry
            .install_procedure(&mut invoker, &disabled, None, false)
            .unwrap();

        let not_for_previews = ActionConfig::new("noop").with_enabled_for_previews(false);
        registry
            .install_procedure(&mut invoker, &not_for_previews, None, true)
            .unwrap();

        assert!(invoker.list_groups(true).is_empty());

        registry
            .install_procedure(&mut invoker, &not_for_previews, None, false)
            .unwrap();
        assert_eq!(invoker.list_groups(false), vec![DEFAULT_PROCEDURES_GROUP]);
    }

    #[test]
    fn test_group_override() {
        let mut registry = ActionRegistry::new();
        registry.register_constraint("always", |_: &Item, _: &ConstraintEnv, _: &[Value]| true);
        let mut invoker = Invoker::new();

        let action = ActionConfig::new("always").with_action_groups(&["custom"]);
        registry
            .install_constraint(&mut invoker, &action, None, false)
            .unwrap();
        registry
            .install_constraint(&mut invoker, &action, Some(&[NAME_ONLY_GROUP]), false)
            .unwrap();

        assert_eq!(invoker.list_groups(false), vec!["custom", NAME_ONLY_GROUP]);
    }
}
