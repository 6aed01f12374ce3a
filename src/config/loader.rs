//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{OnError, StoreBackend, VeilConfig};
use super::secret::secret_string;
use crate::deidentify::operator::pseudonymize::StoreFailureAction;
use crate::domain::errors::VeilError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into VeilConfig
/// 4. Applies environment variable overrides (VEIL_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - A referenced environment variable is not set
/// - An override has an unparsable value
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use veil::config::loader::load_config;
///
/// let config = load_config("veil.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<VeilConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(VeilError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        VeilError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses configuration from TOML text
///
/// Same steps as [`load_config`] minus the file read.
pub fn parse_config(contents: &str) -> Result<VeilConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: VeilConfig = toml::from_str(&contents)
        .map_err(|e| VeilError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        VeilError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left alone.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| VeilError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{var_name}}}");
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        lines.push(processed_line);
    }

    if !missing_vars.is_empty() {
        return Err(VeilError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

/// Parse an override value, naming the variable on failure
fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| {
        VeilError::Configuration(format!("Invalid value '{value}' for {name}: {e}"))
    })
}

/// Parse a snake_case enum override through serde
fn parse_env_enum<T: serde::de::DeserializeOwned>(name: &str, value: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(value.trim().to_string())).map_err(|_| {
        VeilError::Configuration(format!("Invalid value '{value}' for {name}"))
    })
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Applies environment variable overrides using VEIL_* prefix
///
/// Environment variables follow the pattern: VEIL_<SECTION>_<KEY>
/// For example: VEIL_ENGINE_STRICT_MODE, VEIL_RISK_K_MIN
fn apply_env_overrides(config: &mut VeilConfig) -> Result<()> {
    // Application overrides
    if let Some(val) = env_var("VEIL_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // Engine overrides
    if let Some(val) = env_var("VEIL_ENGINE_STRICT_MODE") {
        config.engine.strict_mode = parse_env("VEIL_ENGINE_STRICT_MODE", &val)?;
    }
    if let Some(val) = env_var("VEIL_ENGINE_PERTURBATION_SEED") {
        config.engine.perturbation_seed = Some(parse_env("VEIL_ENGINE_PERTURBATION_SEED", &val)?);
    }
    if let Some(val) = env_var("VEIL_ENGINE_REVERSIBLE_BY_DEFAULT") {
        config.engine.reversible_by_default =
            parse_env("VEIL_ENGINE_REVERSIBLE_BY_DEFAULT", &val)?;
    }
    if let Some(val) = env_var("VEIL_ENGINE_WORKERS") {
        config.engine.workers = parse_env("VEIL_ENGINE_WORKERS", &val)?;
    }
    if let Some(val) = env_var("VEIL_ENGINE_STABLE_ORDERING") {
        config.engine.stable_ordering = parse_env("VEIL_ENGINE_STABLE_ORDERING", &val)?;
    }
    if let Some(val) = env_var("VEIL_ENGINE_STORE_TIMEOUT_MS") {
        config.engine.store_timeout_ms = parse_env("VEIL_ENGINE_STORE_TIMEOUT_MS", &val)?;
    }
    if let Some(val) = env_var("VEIL_ENGINE_STORE_FAILURE") {
        config.engine.store_failure =
            parse_env_enum::<StoreFailureAction>("VEIL_ENGINE_STORE_FAILURE", &val)?;
    }
    if let Some(val) = env_var("VEIL_ENGINE_ON_ERROR") {
        config.engine.on_error = parse_env_enum::<OnError>("VEIL_ENGINE_ON_ERROR", &val)?;
    }
    if let Some(val) = env_var("VEIL_ENGINE_REFERENCE_DATE") {
        config.engine.reference_date = Some(parse_env("VEIL_ENGINE_REFERENCE_DATE", &val)?);
    }

    // Risk overrides
    if let Some(val) = env_var("VEIL_RISK_ENABLED") {
        config.risk.enabled = parse_env("VEIL_RISK_ENABLED", &val)?;
    }
    if let Some(val) = env_var("VEIL_RISK_K_MIN") {
        config.risk.k_min = parse_env("VEIL_RISK_K_MIN", &val)?;
    }
    if let Some(val) = env_var("VEIL_RISK_APPLY_SUPPRESSION") {
        config.risk.apply_suppression = parse_env("VEIL_RISK_APPLY_SUPPRESSION", &val)?;
    }

    // Store overrides
    if let Some(val) = env_var("VEIL_STORE_BACKEND") {
        config.store.backend = parse_env_enum::<StoreBackend>("VEIL_STORE_BACKEND", &val)?;
    }
    if let Some(val) = env_var("VEIL_STORE_PATH") {
        config.store.path = val.into();
    }
    if let Some(val) = env_var("VEIL_STORE_ENCRYPTION_KEY") {
        config.store.encryption_key = Some(secret_string(val));
    }
    if let Some(val) = env_var("VEIL_STORE_HMAC_KEY") {
        config.store.hmac_key = Some(secret_string(val));
    }

    // Logging overrides
    if let Some(val) = env_var("VEIL_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = parse_env("VEIL_LOGGING_LOCAL_ENABLED", &val)?;
    }
    if let Some(val) = env_var("VEIL_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deidentify::policy::FieldMatcher;
    use crate::deidentify::technique::Technique;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("VEIL_TEST_SUBST_VAR", "test_value");
        let input = "hmac_key = \"${VEIL_TEST_SUBST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "hmac_key = \"test_value\"");
        std::env::remove_var("VEIL_TEST_SUBST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("VEIL_TEST_MISSING_VAR");
        let input = "hmac_key = \"${VEIL_TEST_MISSING_VAR}\"";
        let err = substitute_env_vars(input).unwrap_err();
        assert!(err.to_string().contains("VEIL_TEST_MISSING_VAR"));
    }

    #[test]
    fn test_substitute_env_vars_skips_comments() {
        std::env::remove_var("VEIL_TEST_COMMENTED_VAR");
        let input = "# key = \"${VEIL_TEST_COMMENTED_VAR}\"\nk_min = 5";
        let result = substitute_env_vars(input).unwrap();
        assert!(result.contains("${VEIL_TEST_COMMENTED_VAR}"));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_valid() {
        let toml_content = r#"
[application]
log_level = "debug"

[engine]
strict_mode = true
perturbation_seed = 42

[risk]
enabled = true
quasi_identifiers = [["zip", "birthYear"]]
k_min = 5

[[policies]]
matcher = { field = "email" }
techniques = [{ technique = "mask", keep_leading = 1 }]

[[policies]]
matcher = { type = "postal_code" }
precedence = 10
techniques = [{ technique = "generalize", kind = "postal_prefix", prefix_len = 3 }]
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.application.log_level, "debug");
        assert_eq!(config.engine.perturbation_seed, Some(42));
        assert_eq!(config.policies.len(), 2);
        assert_eq!(
            config.policies[0].matcher,
            FieldMatcher::Field("email".to_string())
        );
        assert!(matches!(config.policies[0].techniques[0], Technique::Mask(_)));
        assert_eq!(config.risk.quasi_identifiers[0], vec!["zip", "birthYear"]);
    }

    #[test]
    fn test_invalid_policy_set_is_rejected() {
        let toml_content = r#"
[[policies]]
matcher = { type = "postal_code" }
techniques = [{ technique = "suppress" }]
"#;
        let err = parse_config(toml_content).unwrap_err();
        assert!(matches!(err, VeilError::Configuration(_)));
    }

    #[test]
    fn test_parse_env_reports_variable() {
        let err = parse_env::<usize>("VEIL_ENGINE_WORKERS", "many").unwrap_err();
        assert!(err.to_string().contains("VEIL_ENGINE_WORKERS"));

        let action: StoreFailureAction =
            parse_env_enum("VEIL_ENGINE_STORE_FAILURE", "one_way_fallback").unwrap();
        assert_eq!(action, StoreFailureAction::OneWayFallback);
        assert!(parse_env_enum::<OnError>("VEIL_ENGINE_ON_ERROR", "explode").is_err());
    }
}
