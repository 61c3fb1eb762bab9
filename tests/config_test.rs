use std::fs;
use std::path::Path;

use project_migrator::config::{ConfigManager, ConfigurationError, MigratorConfig};
use project_migrator::hierarchy::OrphanPolicy;
use tempfile::TempDir;

const BASE: &str = r#"
retry:
  max_attempts: 5
  initial_delay_ms: 1000
  backoff_multiplier: 2.0
  max_delay_ms: 60000
reconciler:
  cache_enabled: true
hierarchy:
  orphan_policy: reattach_to_root
"#;

fn write(dir: &Path, relative: &str, contents: &str) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

#[test]
fn test_environment_file_overrides_base() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "migrator.yaml", BASE);
    write(
        dir.path(),
        "environments/test.yaml",
        "retry:\n  max_attempts: 10\nhierarchy:\n  orphan_policy: attach_to_nearest_ancestor\n",
    );

    let manager =
        ConfigManager::load_with_env_prefix(dir.path().join("migrator.yaml"), "test", "MIGRATOR_CFGTEST_A").unwrap();

    let config = manager.config();
    assert_eq!(config.retry.max_attempts, 10);
    assert_eq!(config.retry.initial_delay_ms, 1000);
    assert_eq!(config.hierarchy.orphan_policy, OrphanPolicy::AttachToNearestAncestor);
    assert_eq!(manager.environment(), "test");
    assert_eq!(config.retry.to_policy().worst_case_delay().as_secs(), 243);
}

#[test]
fn test_missing_environment_file_is_optional() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "migrator.yaml", BASE);

    let manager =
        ConfigManager::load_with_env_prefix(dir.path().join("migrator.yaml"), "staging", "MIGRATOR_CFGTEST_B").unwrap();

    assert_eq!(manager.config().retry.max_attempts, 5);
    assert_eq!(manager.config().hierarchy.orphan_policy, OrphanPolicy::ReattachToRoot);
}

#[test]
fn test_environment_variables_win() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "migrator.yaml", BASE);
    std::env::set_var("MIGRATOR_CFGTEST_C__RETRY__MAX_ATTEMPTS", "8");
    std::env::set_var("MIGRATOR_CFGTEST_C__RECONCILER__CACHE_ENABLED", "false");

    let result =
        ConfigManager::load_with_env_prefix(dir.path().join("migrator.yaml"), "development", "MIGRATOR_CFGTEST_C");
    std::env::remove_var("MIGRATOR_CFGTEST_C__RETRY__MAX_ATTEMPTS");
    std::env::remove_var("MIGRATOR_CFGTEST_C__RECONCILER__CACHE_ENABLED");

    let config = result.unwrap().into_config();
    assert_eq!(config.retry.max_attempts, 8);
    assert!(!config.reconciler.cache_enabled);
}

#[test]
fn test_invalid_values_are_rejected_at_load() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "migrator.yaml", "retry:\n  backoff_multiplier: 0.5\n");

    let error =
        ConfigManager::load_with_env_prefix(dir.path().join("migrator.yaml"), "test", "MIGRATOR_CFGTEST_D").unwrap_err();

    assert!(matches!(
        error,
        ConfigurationError::InvalidValue { ref field, .. } if field == "retry.backoff_multiplier"
    ));
}

#[test]
fn test_unknown_orphan_policy_fails_to_deserialize() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "migrator.yaml", "hierarchy:\n  orphan_policy: reject\n");

    let error =
        ConfigManager::load_with_env_prefix(dir.path().join("migrator.yaml"), "test", "MIGRATOR_CFGTEST_E").unwrap_err();

    assert!(matches!(error, ConfigurationError::DeserializeError { .. }));
}

#[test]
fn test_shipped_configuration_loads() {
    let base = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/migrator.yaml");

    let development = ConfigManager::load_with_env_prefix(&base, "development", "MIGRATOR_CFGTEST_F").unwrap();
    let test = ConfigManager::load_with_env_prefix(&base, "test", "MIGRATOR_CFGTEST_F").unwrap();

    assert_eq!(development.config(), &MigratorConfig::default());
    assert_eq!(test.config().retry.max_attempts, 10);
    assert_eq!(test.config().logging.level.as_deref(), Some("debug"));
}
