//! Integration tests for configuration loading

use std::io::Write;
use tempfile::NamedTempFile;
use veil::config::{load_config, OnError, StoreBackend};
use veil::deidentify::{FieldMatcher, StoreFailureAction};
use veil::domain::{FieldType, VeilError};
use veil::store::crypto::generate_key_base64;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_full_configuration_loads() {
    let encryption_key = generate_key_base64(32);
    let hmac_key = generate_key_base64(32);
    std::env::set_var("VEIL_IT_ENCRYPTION_KEY", &encryption_key);
    std::env::set_var("VEIL_IT_HMAC_KEY", &hmac_key);

    let file = write_config(
        r#"
[application]
log_level = "warn"

[engine]
strict_mode = true
default_technique = [{ technique = "suppress" }]
perturbation_seed = 99
workers = 8
store_timeout_ms = 500
store_failure = "one_way_fallback"
on_error = "return_partial"
reference_date = "2025-01-01"

[risk]
enabled = true
quasi_identifiers = [["zip", "birthYear"], ["zip", "gender"]]
k_min = 4
outlier_ignore = ["id"]

[store]
backend = "journal"
path = "./data/test.jsonl"
encryption_key = "${VEIL_IT_ENCRYPTION_KEY}"
hmac_key = "${VEIL_IT_HMAC_KEY}"

[[policies]]
matcher = { field = "id" }
techniques = [{ technique = "pseudonymize", technique_id = "customer", reversible = true }]

[[policies]]
matcher = { type = "phone" }
precedence = 1
techniques = [{ technique = "mask", keep_leading = 2, keep_trailing = 2 }]

[[policies]]
matcher = { pattern = "^note" }
precedence = 2
strictness = "lenient"
techniques = [{ technique = "suppress" }]
"#,
    );

    let config = load_config(file.path()).unwrap();
    std::env::remove_var("VEIL_IT_ENCRYPTION_KEY");
    std::env::remove_var("VEIL_IT_HMAC_KEY");

    assert_eq!(config.application.log_level, "warn");
    assert_eq!(config.engine.workers, 8);
    assert_eq!(config.engine.store_failure, StoreFailureAction::OneWayFallback);
    assert_eq!(config.engine.on_error, OnError::ReturnPartial);
    assert_eq!(config.engine.default_technique.as_ref().map(Vec::len), Some(1));
    assert_eq!(config.risk.quasi_identifiers.len(), 2);
    assert_eq!(config.store.backend, StoreBackend::Journal);
    assert_eq!(config.policies.len(), 3);
    assert_eq!(config.policies[1].matcher, FieldMatcher::Type(FieldType::Phone));
    assert!(config.store.protector().is_ok());
}

#[test]
fn test_defaults_are_strict_and_one_way() {
    let file = write_config("");
    let config = load_config(file.path()).unwrap();

    assert!(config.engine.strict_mode);
    assert!(!config.engine.reversible_by_default);
    assert!(config.engine.stable_ordering);
    assert!(!config.risk.enabled);
    assert_eq!(config.risk.k_min, 5);
    assert_eq!(config.store.backend, StoreBackend::Memory);
}

#[test]
fn test_journal_backend_requires_keys() {
    let file = write_config("[store]\nbackend = \"journal\"\n");
    let err = load_config(file.path()).unwrap_err();
    assert!(matches!(err, VeilError::Configuration(_)));
}

#[test]
fn test_risk_requires_quasi_identifiers() {
    let file = write_config("[risk]\nenabled = true\n");
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("quasi"));
}

#[test]
fn test_duplicate_exact_policies_are_rejected() {
    let file = write_config(
        r#"
[[policies]]
matcher = { field = "email" }
techniques = [{ technique = "suppress" }]

[[policies]]
matcher = { field = "email" }
techniques = [{ technique = "mask" }]
"#,
    );
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("duplicate policy"));
}

#[test]
fn test_unknown_technique_is_rejected() {
    let file = write_config(
        r#"
[[policies]]
matcher = { field = "email" }
techniques = [{ technique = "encrypt" }]
"#,
    );
    assert!(load_config(file.path()).is_err());
}
