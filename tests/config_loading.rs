use std::io::Write;

use switchboard_core::config::{AppConfig, DEFAULT_ORDERS_URL, DEFAULT_RETRIEVAL_URL};
use switchboard_core::error::FlowError;
use switchboard_test_utils::write_config;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[model]
provider = "openai"
model_id = "gpt-4.1"
api_key = "sk-test-key"
base_url = "http://localhost:4000/v1"
max_tokens = 2048
temperature = 0.2

[model.retry]
max_retries = 4
initial_backoff_ms = 250

[[fallback_models]]
model_id = "gpt-4.1-mini"

[engine]
max_retries = 2
trace = false
max_node_visits = 8

[orders]
base_url = "http://orders.internal:8000"
timeout_secs = 5

[retrieval]
base_url = "http://retrieval.internal:8100"
policy_collection = "store_policies"
shop_collection = "catalog"

[vision]
base_url = "http://vision.internal:9000"
api_key = "vision-key"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.model.provider, "openai");
    assert_eq!(config.model.model_id, "gpt-4.1");
    assert_eq!(config.model.api_key.as_deref(), Some("sk-test-key"));
    assert_eq!(config.model.max_tokens, 2048);
    assert!((config.model.temperature - 0.2).abs() < f32::EPSILON);

    let retry = config.model.retry.as_ref().expect("retry section");
    assert_eq!(retry.max_retries, 4);
    assert_eq!(retry.initial_backoff_ms, 250);
    assert_eq!(retry.max_backoff_ms, 30000);

    assert_eq!(config.fallback_models.len(), 1);
    assert_eq!(config.fallback_models[0].provider, "openai");

    assert_eq!(config.engine.max_retries, 2);
    assert!(!config.engine.trace);
    assert_eq!(config.engine.max_node_visits, 8);

    let orders = config.orders_or_default();
    assert_eq!(orders.base_url, "http://orders.internal:8000");
    assert_eq!(orders.timeout_secs, 5);

    let retrieval = config.retrieval_or_default();
    assert_eq!(retrieval.policy_collection, "store_policies");
    assert_eq!(retrieval.shop_collection, "catalog");

    let vision = config.vision.as_ref().expect("vision section");
    assert_eq!(vision.api_key.as_deref(), Some("vision-key"));
    assert_eq!(vision.timeout_secs, 30);
}

#[test]
fn test_missing_sections_fall_back_to_local_services() {
    let config = AppConfig::from_toml(
        r#"
[model]
model_id = "gpt-4.1"
"#,
    )
    .expect("minimal config");

    assert_eq!(config.orders_or_default().base_url, DEFAULT_ORDERS_URL);
    let retrieval = config.retrieval_or_default();
    assert_eq!(retrieval.base_url, DEFAULT_RETRIEVAL_URL);
    assert_eq!(retrieval.policy_collection, "policies");
    assert!(config.vision.is_none());
}

#[test]
fn test_env_var_expansion_in_file() {
    std::env::set_var("SWITCHBOARD_TEST_ORDERS_KEY", "orders-secret");

    let (_dir, path) = write_config(
        r#"
[model]
model_id = "gpt-4.1"
api_key = "${SWITCHBOARD_TEST_UNSET_KEY}"

[orders]
base_url = "http://127.0.0.1:8000"
api_key = "${SWITCHBOARD_TEST_ORDERS_KEY}"
"#,
    );

    let config = AppConfig::load(&path).expect("load config");
    assert_eq!(
        config.orders.and_then(|o| o.api_key).as_deref(),
        Some("orders-secret")
    );
    // Unset variables stay as written
    assert_eq!(
        config.model.api_key.as_deref(),
        Some("${SWITCHBOARD_TEST_UNSET_KEY}")
    );

    std::env::remove_var("SWITCHBOARD_TEST_ORDERS_KEY");
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = AppConfig::load(&dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, FlowError::ConfigNotFound(_)));
}

#[test]
fn test_invalid_configs_rejected() {
    // No model section
    assert!(matches!(
        AppConfig::from_toml("[engine]\nmax_retries = 3\n"),
        Err(FlowError::Config(_))
    ));

    // Zero visit cap
    let err = AppConfig::from_toml(
        r#"
[model]
model_id = "gpt-4.1"

[engine]
max_node_visits = 0
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("max_node_visits"));
}

#[test]
fn test_config_round_trips_through_toml() {
    let config = AppConfig::from_toml(
        r#"
[model]
model_id = "gpt-4.1"

[engine]
max_retries = 5
"#,
    )
    .expect("config");

    let rendered = toml::to_string_pretty(&config).expect("serialize");
    let reparsed = AppConfig::from_toml(&rendered).expect("reparse");
    assert_eq!(reparsed.engine.max_retries, 5);
    assert_eq!(reparsed.model.model_id, "gpt-4.1");
}
