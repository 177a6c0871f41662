//! Configuration schema types
//!
//! Typed configuration for a batch run: export settings, the ordered
//! procedure and constraint lists, and logging.

use crate::adapters::host::RunMode;
use crate::core::overwrite::OverwriteMode;
use crate::domain::{BatcherError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;

/// Main batcher configuration
///
/// This is the root configuration structure that maps to the TOML file.
/// Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatcherConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Export settings
    #[serde(default)]
    pub export: ExportConfig,

    /// Procedures, in invocation order
    #[serde(default)]
    pub procedures: Vec<ActionConfig>,

    /// Constraints, in invocation order
    #[serde(default)]
    pub constraints: Vec<ActionConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BatcherConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.application.validate()?;
        self.export.validate()?;
        validate_actions("procedures", &self.procedures)?;
        validate_actions("constraints", &self.constraints)?;
        self.logging.validate()?;
        Ok(())
    }

    /// Resolves a `/`-separated path over the configuration
    ///
    /// List elements are addressed by index or by action name, e.g.
    /// `procedures/rename/enabled` or `procedures/0/arguments/0/value`.
    ///
    /// # Errors
    ///
    /// Returns [`BatcherError::Configuration`] if a path component does not
    /// exist.
    ///
    /// # Examples
    ///
    /// ```
    /// use batcher::config::BatcherConfig;
    ///
    /// let config = BatcherConfig::default();
    /// let extension = config.value_at("export/file_extension")?;
    /// assert_eq!(extension, "png");
    /// # Ok::<(), batcher::domain::BatcherError>(())
    /// ```
    pub fn value_at(&self, path: &str) -> Result<Value> {
        let mut current = serde_json::to_value(self)?;

        for component in path.split('/').filter(|c| !c.is_empty()) {
            let next = match &current {
                Value::Object(map) => map.get(component).cloned(),
                Value::Array(items) => match component.parse::<usize>() {
                    Ok(index) => items.get(index).cloned(),
                    Err(_) => items
                        .iter()
                        .find(|item| item.get("name").and_then(Value::as_str) == Some(component))
                        .cloned(),
                },
                _ => None,
            };

            current = next.ok_or_else(|| {
                BatcherError::Configuration(format!(
                    "Unknown configuration path '{path}' (at '{component}')"
                ))
            })?;
        }

        Ok(current)
    }

    /// Looks up a procedure by name
    pub fn procedure(&self, name: &str) -> Option<&ActionConfig> {
        self.procedures.iter().find(|p| p.name == name)
    }

    /// Looks up a constraint by name
    pub fn constraint(&self, name: &str) -> Option<&ActionConfig> {
        self.constraints.iter().find(|c| c.name == name)
    }
}

fn validate_actions(section: &str, actions: &[ActionConfig]) -> std::result::Result<(), String> {
    let mut names = HashSet::new();
    for action in actions {
        if action.name.is_empty() {
            return Err(format!("{section}: action name must not be empty"));
        }
        if !names.insert(action.name.as_str()) {
            return Err(format!(
                "{section}: duplicate action name '{}'",
                action.name
            ));
        }
    }
    Ok(())
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ApplicationConfig {
    fn validate(&self) -> std::result::Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Export settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory exported files are written to; relative paths are resolved
    /// against the working directory
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,

    /// Default file extension, without the leading period
    #[serde(default = "default_file_extension")]
    pub file_extension: String,

    /// Pattern used by the default rename procedure
    #[serde(default = "default_name_pattern")]
    pub name_pattern: String,

    /// Policy for existing output files
    #[serde(default)]
    pub overwrite_mode: OverwriteMode,

    /// Run mode for the first export of each file format
    #[serde(default)]
    pub initial_run_mode: RunMode,

    /// Modify the input image in place instead of exporting a copy
    #[serde(default)]
    pub edit_mode: bool,
}

impl ExportConfig {
    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        if self.file_extension.is_empty() {
            return Err("export.file_extension must not be empty".to_string());
        }
        if self.file_extension.starts_with('.') {
            return Err(format!(
                "export.file_extension '{}' must not start with a period",
                self.file_extension
            ));
        }
        if self.output_directory.as_os_str().is_empty() {
            return Err("export.output_directory must not be empty".to_string());
        }
        Ok(())
    }

    /// Returns a copy with the call-time overrides of `options` applied
    pub fn merged(&self, options: &RunOptions) -> Self {
        let mut merged = self.clone();
        if let Some(dir) = &options.output_directory {
            merged.output_directory = dir.clone();
        }
        if let Some(ext) = &options.file_extension {
            merged.file_extension = ext.clone();
        }
        if let Some(pattern) = &options.name_pattern {
            merged.name_pattern = pattern.clone();
        }
        if let Some(mode) = options.overwrite_mode {
            merged.overwrite_mode = mode;
        }
        if let Some(mode) = options.initial_run_mode {
            merged.initial_run_mode = mode;
        }
        if let Some(edit_mode) = options.edit_mode {
            merged.edit_mode = edit_mode;
        }
        merged
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_directory: default_output_directory(),
            file_extension: default_file_extension(),
            name_pattern: default_name_pattern(),
            overwrite_mode: OverwriteMode::default(),
            initial_run_mode: RunMode::default(),
            edit_mode: false,
        }
    }
}

/// One named argument of an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentConfig {
    pub name: String,
    pub value: Value,
}

/// A configured procedure or constraint
///
/// `function` names an entry of the action registry and is resolved when
/// the action is installed, not when it is configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
    /// Unique name within its list
    pub name: String,

    /// Name of the built-in action this one was created from (defaults to
    /// `name`)
    #[serde(default)]
    pub orig_name: String,

    /// Registry key of the function (defaults to `orig_name`)
    #[serde(default)]
    pub function: String,

    /// Ordered arguments
    #[serde(default)]
    pub arguments: Vec<ArgumentConfig>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub enabled_for_previews: bool,

    /// Invoker groups (defaults to the default procedure/constraint group)
    #[serde(default)]
    pub action_groups: Vec<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub display_name: String,

    /// Named subfilter constraint rules are added to (constraints only)
    #[serde(default)]
    pub subfilter: Option<String>,
}

impl ActionConfig {
    /// Creates an enabled action with no arguments
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            orig_name: String::new(),
            function: String::new(),
            arguments: Vec::new(),
            enabled: true,
            enabled_for_previews: true,
            action_groups: Vec::new(),
            tags: Vec::new(),
            display_name: String::new(),
            subfilter: None,
        }
    }

    pub fn with_orig_name(mut self, orig_name: impl Into<String>) -> Self {
        self.orig_name = orig_name.into();
        self
    }

    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = function.into();
        self
    }

    /// Appends an argument
    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.push(ArgumentConfig {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_enabled_for_previews(mut self, enabled: bool) -> Self {
        self.enabled_for_previews = enabled;
        self
    }

    pub fn with_action_groups(mut self, groups: &[&str]) -> Self {
        self.action_groups = groups.iter().map(|g| g.to_string()).collect();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_subfilter(mut self, subfilter: impl Into<String>) -> Self {
        self.subfilter = Some(subfilter.into());
        self
    }

    /// Original name, falling back to `name`
    pub fn orig_name(&self) -> &str {
        if self.orig_name.is_empty() {
            &self.name
        } else {
            &self.orig_name
        }
    }

    /// Registry key, falling back to [`ActionConfig::orig_name`]
    pub fn function(&self) -> &str {
        if self.function.is_empty() {
            self.orig_name()
        } else {
            &self.function
        }
    }

    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments
            .iter()
            .find(|arg| arg.name == name)
            .map(|arg| &arg.value)
    }

    /// Argument values in order
    pub fn argument_values(&self) -> Vec<Value> {
        self.arguments.iter().map(|arg| arg.value.clone()).collect()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Whether the action runs in the current mode
    pub fn is_active(&self, is_preview: bool) -> bool {
        self.enabled && (!is_preview || self.enabled_for_previews)
    }
}

/// Call-time overrides for one [`Batcher::run`](crate::core::batcher::Batcher::run)
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_directory: Option<PathBuf>,
    pub file_extension: Option<String>,
    pub name_pattern: Option<String>,
    pub overwrite_mode: Option<OverwriteMode>,
    pub initial_run_mode: Option<RunMode>,
    pub edit_mode: Option<bool>,

    /// Run for a preview: actions disabled for previews are skipped and the
    /// name-only pass runs
    pub is_preview: bool,

    /// Modify item contents (copy into the working image, run procedures)
    pub process_contents: bool,

    /// Rename items
    pub process_names: bool,

    /// Write files
    pub process_export: bool,

    /// Keep the working image after the run instead of deleting it
    pub keep_image_copy: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            output_directory: None,
            file_extension: None,
            name_pattern: None,
            overwrite_mode: None,
            initial_run_mode: None,
            edit_mode: None,
            is_preview: false,
            process_contents: true,
            process_names: true,
            process_export: true,
            keep_image_copy: false,
        }
    }
}

impl RunOptions {
    /// Options for a name-only preview
    pub fn names_preview() -> Self {
        Self {
            is_preview: true,
            process_contents: false,
            process_names: true,
            process_export: false,
            ..Self::default()
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default)]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy (daily, hourly, never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> std::result::Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        if self.local_enabled && self.local_path.is_empty() {
            return Err("logging.local_path must not be empty".to_string());
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_output_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_file_extension() -> String {
    "png".to_string()
}

fn default_name_pattern() -> String {
    "[layer name]".to_string()
}

fn default_local_path() -> String {
    "logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_application_config_validation() {
        let mut config = ApplicationConfig {
            log_level: "info".to_string(),
        };

        assert!(config.validate().is_ok());

        config.log_level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_export_config_validation() {
        let mut config = ExportConfig::default();
        assert!(config.validate().is_ok());

        config.file_extension = ".png".to_string();
        assert!(config.validate().is_err());

        config.file_extension = String::new();
        assert!(config.validate().is_err());

        config.file_extension = "jpg".to_string();
        config.output_directory = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_action_names_rejected() {
        let config = BatcherConfig {
            procedures: vec![ActionConfig::new("rename"), ActionConfig::new("rename")],
            ..BatcherConfig::default()
        };

        let err = config.validate().unwrap_err();
        assert!(err.contains("duplicate"));
    }

    #[test]
    fn test_logging_config_validation() {
        let mut config = LoggingConfig::default();
        assert!(config.validate().is_ok());

        config.local_rotation = "weekly".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_action_name_fallbacks() {
        let action = ActionConfig::new("rename_2");
        assert_eq!(action.orig_name(), "rename_2");
        assert_eq!(action.function(), "rename_2");

        let action = action.with_orig_name("rename");
        assert_eq!(action.orig_name(), "rename");
        assert_eq!(action.function(), "rename");

        let action = action.with_function("custom");
        assert_eq!(action.function(), "custom");
    }

    #[test]
    fn test_action_is_active() {
        let action = ActionConfig::new("a").with_enabled_for_previews(false);
        assert!(action.is_active(false));
        assert!(!action.is_active(true));
        assert!(!action.with_enabled(false).is_active(false));
    }

    #[test]
    fn test_value_at() {
        let config = BatcherConfig {
            procedures: vec![ActionConfig::new("insert_background")
                .with_argument("color_tag", "blue")],
            ..BatcherConfig::default()
        };

        assert_eq!(config.value_at("export/file_extension").unwrap(), json!("png"));
        assert_eq!(
            config.value_at("procedures/insert_background/arguments/0/value").unwrap(),
            json!("blue")
        );
        assert_eq!(config.value_at("procedures/0/enabled").unwrap(), json!(true));
        assert!(config.value_at("export/missing").is_err());
        assert!(config.value_at("procedures/unknown").is_err());
    }

    #[test]
    fn test_merged_run_options() {
        let config = ExportConfig::default();
        let options = RunOptions {
            file_extension: Some("jpg".to_string()),
            overwrite_mode: Some(OverwriteMode::Skip),
            ..RunOptions::default()
        };

        let merged = config.merged(&options);
        assert_eq!(merged.file_extension, "jpg");
        assert_eq!(merged.overwrite_mode, OverwriteMode::Skip);
        assert_eq!(merged.name_pattern, config.name_pattern);
    }

    #[test]
    fn test_minimal_toml() {
        let config: BatcherConfig = toml::from_str(
            r#"
[export]
file_extension = "jpg"
overwrite_mode = "rename_existing"

[[procedures]]
name = "insert_background"
arguments = [{ name = "color_tag", value = "blue" }]

[[constraints]]
name = "visible"
enabled = false
"#,
        )
        .unwrap();

        assert_eq!(config.export.file_extension, "jpg");
        assert_eq!(config.export.overwrite_mode, OverwriteMode::RenameExisting);
        assert_eq!(config.procedures[0].argument("color_tag"), Some(&json!("blue")));
        assert!(!config.constraints[0].enabled);
        assert!(config.validate().is_ok());
    }
}
