use serial_test::serial;
use std::env;
use std::fs::write;
use std::time::Duration;
use tempfile::NamedTempFile;

use kb_sync::load_config::{
    load_config, DIFY_API_KEY_ENV, DIFY_KNOWLEDGE_BASE_ENV, GITLAB_TOKEN_ENV,
};

fn config_file(yaml: &str) -> NamedTempFile {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), yaml).unwrap();
    config_file
}

fn clear_env() {
    env::remove_var(GITLAB_TOKEN_ENV);
    env::remove_var(DIFY_API_KEY_ENV);
    env::remove_var(DIFY_KNOWLEDGE_BASE_ENV);
}

const FULL_CONFIG: &str = r#"
gitlab:
  host: https://gitlab.example.com
  private_token: file-token
  allowed_file_extensions: [".md"]
dify:
  host: https://dify.example.com/
  api_key: file-key
  knowledge_base_id: kb-file
  indexing_technique: economy
sync:
  timeout: 30
  max_retries: 5
  retry_interval: 1
  page_size: 50
  verify_ssl: false
  cleanup_deleted: true
  enable_metadata: false
"#;

#[test]
#[serial]
fn test_load_config_reads_every_section() {
    clear_env();
    let file = config_file(FULL_CONFIG);

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.gitlab.private_token, "file-token");
    assert_eq!(config.dify.indexing_technique, "economy");

    let sync = config.sync_config();
    assert_eq!(sync.allowed_extensions, vec![".md".to_string()]);
    assert!(sync.cleanup_deleted);
    assert!(!sync.enable_metadata);

    let http = config.http_settings();
    assert_eq!(http.timeout, Duration::from_secs(30));
    assert_eq!(http.max_retries, 5);
    assert_eq!(http.retry_interval, Duration::from_secs(1));
    assert!(!http.verify_ssl);

    assert_eq!(config.gitlab_settings().page_size, 50);
    assert_eq!(config.dify_settings().knowledge_base_id, "kb-file");
}

#[test]
#[serial]
fn test_load_config_applies_defaults() {
    clear_env();
    let file = config_file(
        r#"
gitlab:
  host: https://gitlab.example.com
  private_token: t
dify:
  host: https://dify.example.com
  api_key: k
  knowledge_base_id: kb
"#,
    );

    let config = load_config(file.path()).expect("Config should load");

    let sync = config.sync_config();
    assert_eq!(sync.allowed_extensions, vec![".md".to_string(), ".mdx".to_string()]);
    assert!(!sync.cleanup_deleted);
    assert!(sync.enable_metadata);
    assert_eq!(config.http_settings().timeout, Duration::from_secs(60));
    assert_eq!(config.http_settings().max_retries, 3);
    assert_eq!(config.dify.indexing_technique, "high_quality");
    assert_eq!(config.dify_settings().process_rule["mode"], "automatic");
}

#[test]
#[serial]
fn test_load_config_environment_overrides_secrets() {
    clear_env();
    env::set_var(GITLAB_TOKEN_ENV, "env-token");
    env::set_var(DIFY_API_KEY_ENV, "env-key");
    env::set_var(DIFY_KNOWLEDGE_BASE_ENV, "kb-env");
    let file = config_file(FULL_CONFIG);

    let config = load_config(file.path());
    clear_env();
    let config = config.expect("Config should load");

    assert_eq!(config.gitlab.private_token, "env-token");
    assert_eq!(config.dify.api_key, "env-key");
    assert_eq!(config.dify.knowledge_base_id, "kb-env");
}

#[test]
#[serial]
fn test_load_config_secrets_from_environment_only() {
    clear_env();
    env::set_var(GITLAB_TOKEN_ENV, "env-token");
    env::set_var(DIFY_API_KEY_ENV, "env-key");
    env::set_var(DIFY_KNOWLEDGE_BASE_ENV, "kb-env");
    let file = config_file(
        r#"
gitlab:
  host: https://gitlab.example.com
dify:
  host: https://dify.example.com
"#,
    );

    let config = load_config(file.path());
    clear_env();
    assert!(config.is_ok(), "secrets from env should suffice: {config:?}");
}

#[test]
#[serial]
fn test_load_config_errors_on_missing_secret() {
    clear_env();
    let file = config_file(
        r#"
gitlab:
  host: https://gitlab.example.com
  private_token: t
dify:
  host: https://dify.example.com
  api_key: k
"#,
    );

    let err = load_config(file.path()).unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("dify.knowledge_base_id"), "got: {msg}");
}

#[test]
#[serial]
fn test_load_config_rejects_zero_retries() {
    clear_env();
    let file = config_file(
        r#"
gitlab: {host: "https://g", private_token: t}
dify: {host: "https://d", api_key: k, knowledge_base_id: kb}
sync: {max_retries: 0}
"#,
    );

    let err = load_config(file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("max_retries"));
}

#[test]
#[serial]
fn test_load_config_errors_for_invalid_file() {
    clear_env();
    let file = config_file("not-yaml: [:::");

    let msg = load_config(file.path()).unwrap_err().to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}

#[test]
#[serial]
fn test_load_config_errors_for_missing_file() {
    let msg = load_config("/definitely/not/here.yaml")
        .unwrap_err()
        .to_string();
    assert!(msg.contains("Failed to read config file"), "got: {msg}");
}
