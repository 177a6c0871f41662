//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::BatcherConfig;
use crate::domain::{BatcherError, Result};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Loads variables from a `.env` file, if one exists
/// 2. Reads the TOML file
/// 3. Performs environment variable substitution (`${VAR}` syntax)
/// 4. Parses the TOML into [`BatcherConfig`]
/// 5. Applies environment variable overrides (`BATCHER_*` prefix)
/// 6. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - A referenced environment variable is not set
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use batcher::config::loader::load_config;
///
/// let config = load_config("batcher.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<BatcherConfig> {
    let path = path.as_ref();

    let _ = dotenvy::dotenv();

    if !path.exists() {
        return Err(BatcherError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        BatcherError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    load_config_from_str(&contents)
}

/// Same as [`load_config`] for in-memory TOML, without reading `.env`
///
/// # Errors
///
/// See [`load_config`].
pub fn load_config_from_str(contents: &str) -> Result<BatcherConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: BatcherConfig = toml::from_str(&contents)
        .map_err(|e| BatcherError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        BatcherError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format `${VAR_NAME}`
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| BatcherError::Configuration(format!("Invalid substitution regex: {e}")))?;
    let mut result = String::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(BatcherError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Parses an enum override through its serde (snake_case) representation
fn parse_enum<T: DeserializeOwned>(var: &str, value: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(value.to_lowercase())).map_err(|e| {
        BatcherError::Configuration(format!("Invalid value '{value}' for {var}: {e}"))
    })
}

/// Applies environment variable overrides using the `BATCHER_*` prefix
///
/// Environment variables follow the pattern `BATCHER_<SECTION>_<KEY>`, for
/// example `BATCHER_EXPORT_FILE_EXTENSION`.
fn apply_env_overrides(config: &mut BatcherConfig) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("BATCHER_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // Export overrides
    if let Ok(val) = std::env::var("BATCHER_EXPORT_OUTPUT_DIRECTORY") {
        config.export.output_directory = val.into();
    }
    if let Ok(val) = std::env::var("BATCHER_EXPORT_FILE_EXTENSION") {
        config.export.file_extension = val;
    }
    if let Ok(val) = std::env::var("BATCHER_EXPORT_NAME_PATTERN") {
        config.export.name_pattern = val;
    }
    if let Ok(val) = std::env::var("BATCHER_EXPORT_OVERWRITE_MODE") {
        config.export.overwrite_mode = parse_enum("BATCHER_EXPORT_OVERWRITE_MODE", &val)?;
    }
    if let Ok(val) = std::env::var("BATCHER_EXPORT_INITIAL_RUN_MODE") {
        config.export.initial_run_mode = parse_enum("BATCHER_EXPORT_INITIAL_RUN_MODE", &val)?;
    }
    if let Ok(val) = std::env::var("BATCHER_EXPORT_EDIT_MODE") {
        config.export.edit_mode = val.parse().unwrap_or(false);
    }

    // Logging overrides
    if let Ok(val) = std::env::var("BATCHER_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("BATCHER_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Ok(val) = std::env::var("BATCHER_LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::overwrite::OverwriteMode;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Tests in this module mutate the process environment
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_substitute_env_vars() {
        let _guard = ENV_MUTEX.lock().unwrap();
        std::env::set_var("BATCHER_TEST_DIR", "/tmp/out");
        let input = "output_directory = \"${BATCHER_TEST_DIR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "output_directory = \"/tmp/out\"\n");
        std::env::remove_var("BATCHER_TEST_DIR");
    }

    #[test]
    fn test_substitute_env_vars_reports_all_missing() {
        let _guard = ENV_MUTEX.lock().unwrap();
        std::env::remove_var("MISSING_ONE");
        std::env::remove_var("MISSING_TWO");
        let input = "a = \"${MISSING_ONE}\"\nb = \"${MISSING_TWO}\"";

        let err = substitute_env_vars(input).unwrap_err().to_string();
        assert!(err.contains("MISSING_ONE"));
        assert!(err.contains("MISSING_TWO"));
    }

    #[test]
    fn test_substitute_env_vars_skips_comments() {
        let _guard = ENV_MUTEX.lock().unwrap();
        std::env::remove_var("COMMENTED_OUT");
        let input = "# path = \"${COMMENTED_OUT}\"";
        assert!(substitute_env_vars(input).is_ok());
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_valid() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let toml_content = r#"
[application]
log_level = "debug"

[export]
output_directory = "out"
file_extension = "jpg"
overwrite_mode = "skip"

[[procedures]]
name = "insert_background"
arguments = [{ name = "color_tag", value = "blue" }]

[[constraints]]
name = "visible"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.application.log_level, "debug");
        assert_eq!(config.export.file_extension, "jpg");
        assert_eq!(config.export.overwrite_mode, OverwriteMode::Skip);
        assert_eq!(config.procedures.len(), 1);
        assert_eq!(config.constraints[0].name, "visible");
    }

    #[test]
    fn test_env_override_enum() {
        let _guard = ENV_MUTEX.lock().unwrap();
        std::env::set_var("BATCHER_EXPORT_OVERWRITE_MODE", "RENAME_NEW");
        let config = load_config_from_str("[export]\noverwrite_mode = \"replace\"\n");
        std::env::remove_var("BATCHER_EXPORT_OVERWRITE_MODE");

        assert_eq!(config.unwrap().export.overwrite_mode, OverwriteMode::RenameNew);
    }

    #[test]
    fn test_env_override_invalid_enum() {
        let _guard = ENV_MUTEX.lock().unwrap();
        std::env::set_var("BATCHER_EXPORT_INITIAL_RUN_MODE", "sometimes");
        let result = load_config_from_str("");
        std::env::remove_var("BATCHER_EXPORT_INITIAL_RUN_MODE");

        assert!(result.is_err());
    }

    #[test]
    fn test_validation_failure() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let result = load_config_from_str("[export]\nfile_extension = \".png\"\n");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("validation failed"));
    }
}
