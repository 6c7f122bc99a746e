//! Integration tests for layered loading, interpolation, nesting and validation
//!
//! Every config type has its own field names so the process environment,
//! which is merged into every load, never collides between tests.

use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use strata::source::ENVIRONMENT_SOURCE;
use strata::{ConfigSchema, FieldKind, FieldSpec, LoadOptions, Schema, Secret, StrataError};
use tempfile::TempDir;

// Mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[derive(Debug, Deserialize)]
struct LayeredConfig {
    lt_app_name: String,
    lt_port: u16,
    lt_debug: bool,
    lt_region: String,
}

impl ConfigSchema for LayeredConfig {
    fn schema() -> Schema {
        Schema::new("LayeredConfig")
            .field(FieldSpec::new("LT_APP_NAME", FieldKind::String).required())
            .field(FieldSpec::new("LT_PORT", FieldKind::Integer).default_value("8000"))
            .field(FieldSpec::new("LT_DEBUG", FieldKind::Boolean).default_value("false"))
            .field(FieldSpec::new("LT_REGION", FieldKind::String).default_value("eu-west-1"))
    }
}

#[test]
fn test_layer_precedence_and_provenance() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    std::env::set_var("LT_REGION", "us-east-2");

    let dir = TempDir::new().unwrap();
    let base = write(&dir, ".env", "LT_APP_NAME=base\nLT_PORT=8080\nLT_DEBUG=true\nLT_REGION=file\n");
    let staging = write(&dir, ".env.staging", "LT_APP_NAME=staging\nLT_PORT=9090\n");
    let local = write(&dir, ".env.local", "export LT_PORT=9999\n");

    let options = LoadOptions::new().base(&base).env("staging").cache(false);
    let loaded = strata::load::<LayeredConfig>(&options);
    std::env::remove_var("LT_REGION");
    let loaded = loaded.unwrap();

    assert_eq!(loaded.lt_app_name, "staging");
    assert_eq!(loaded.lt_port, 9999);
    assert!(loaded.lt_debug);
    assert_eq!(loaded.lt_region, "us-east-2");

    let source = |key: &str| loaded.mapping.source_of(key).map(str::to_string);
    assert_eq!(source("LT_APP_NAME"), Some(staging.to_string_lossy().to_string()));
    assert_eq!(source("LT_PORT"), Some(local.to_string_lossy().to_string()));
    assert_eq!(source("LT_DEBUG"), Some(base.to_string_lossy().to_string()));
    assert_eq!(source("LT_REGION").as_deref(), Some(ENVIRONMENT_SOURCE));
}

#[test]
fn test_missing_files_fall_back_to_defaults() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    std::env::set_var("LT_APP_NAME", "from-env-only");

    let dir = TempDir::new().unwrap();
    let options = LoadOptions::new()
        .base(dir.path().join(".env"))
        .env("nowhere")
        .cache(false);
    let loaded = strata::load::<LayeredConfig>(&options);
    std::env::remove_var("LT_APP_NAME");
    let loaded = loaded.unwrap();

    assert_eq!(loaded.lt_app_name, "from-env-only");
    assert_eq!(loaded.lt_port, 8000);
    assert!(!loaded.lt_debug);
}

#[derive(Debug, Deserialize)]
struct NestedConfig {
    nt_service: String,
    nt_database: NestedDatabase,
}

#[derive(Debug, Deserialize)]
struct NestedDatabase {
    host: String,
    port: u16,
    url: String,
    pool: NestedPool,
}

#[derive(Debug, Deserialize)]
struct NestedPool {
    size: u32,
}

impl ConfigSchema for NestedConfig {
    fn schema() -> Schema {
        Schema::new("NestedConfig")
            .field(FieldSpec::new("NT_SERVICE", FieldKind::String).required())
            .group("NT_DATABASE", "Database connection")
            .field(FieldSpec::new("NT_DATABASE__HOST", FieldKind::String).default_value("localhost"))
            .field(FieldSpec::new("NT_DATABASE__PORT", FieldKind::Integer).default_value("5432"))
            .field(FieldSpec::new("NT_DATABASE__URL", FieldKind::String).required())
            .field(FieldSpec::new("NT_DATABASE__POOL__SIZE", FieldKind::Integer).default_value("10"))
    }
}

#[test]
fn test_nested_groups_and_interpolation() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let base = write(
        &dir,
        ".env",
        "NT_SERVICE=orders\n\
         NT_DATABASE__HOST=db.internal\n\
         NT_DATABASE__URL=postgres://${NT_DATABASE__HOST}:${NT_DATABASE__PORT}/${NT_SERVICE}\n\
         NT_DATABASE__PORT=6543\n\
         NT_DATABASE__POOL__SIZE=25\n",
    );

    let options = LoadOptions::new().base(&base).cache(false);
    let loaded = strata::load::<NestedConfig>(&options).unwrap();

    assert_eq!(loaded.nt_service, "orders");
    assert_eq!(loaded.nt_database.host, "db.internal");
    assert_eq!(loaded.nt_database.port, 6543);
    assert_eq!(loaded.nt_database.url, "postgres://db.internal:6543/orders");
    assert_eq!(loaded.nt_database.pool.size, 25);
}

#[test]
fn test_custom_delimiter() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

    #[derive(Debug, Deserialize)]
    struct DotConfig {
        dt_cache: DotCache,
    }

    #[derive(Debug, Deserialize)]
    struct DotCache {
        ttl: u64,
    }

    impl ConfigSchema for DotConfig {
        fn schema() -> Schema {
            Schema::new("DotConfig").field(FieldSpec::new("DT_CACHE.TTL", FieldKind::Integer).required())
        }
    }

    let dir = TempDir::new().unwrap();
    let base = write(&dir, ".env", "DT_CACHE.TTL=300\n");
    let options = LoadOptions::new().base(&base).delimiter(".").cache(false);
    let loaded = strata::load::<DotConfig>(&options).unwrap();
    assert_eq!(loaded.dt_cache.ttl, 300);
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct FailingConfig {
    ft_url: String,
    ft_port: u16,
}

impl ConfigSchema for FailingConfig {
    fn schema() -> Schema {
        Schema::new("FailingConfig")
            .field(FieldSpec::new("FT_URL", FieldKind::String).required())
            .field(FieldSpec::new("FT_PORT", FieldKind::Integer).default_value("80"))
    }
}

#[test]
fn test_cyclic_reference_aborts_load() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let base = write(&dir, ".env", "FT_URL=${FT_CYCLE_A}\nFT_CYCLE_A=${FT_CYCLE_B}\nFT_CYCLE_B=${FT_CYCLE_A}\n");

    let err = strata::load::<FailingConfig>(&LoadOptions::new().base(&base).cache(false)).unwrap_err();
    match &err {
        StrataError::CyclicReference { cycle } => {
            assert!(cycle.contains(&"FT_CYCLE_A".to_string()));
            assert!(cycle.contains(&"FT_CYCLE_B".to_string()));
        }
        other => panic!("expected cyclic reference, got {other:?}"),
    }
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn test_unresolved_reference_aborts_load() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let base = write(&dir, ".env", "FT_URL=http://${FT_NOWHERE_HOST}/\n");

    let err = strata::load::<FailingConfig>(&LoadOptions::new().base(&base).cache(false)).unwrap_err();
    assert!(matches!(
        err,
        StrataError::UnresolvedReference { ref token, ref key } if token == "FT_NOWHERE_HOST" && key == "FT_URL"
    ));
}

#[test]
fn test_parse_error_reports_line() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let base = write(&dir, ".env", "# header\nFT_URL=ok\nnot a pair\n");

    let err = strata::load::<FailingConfig>(&LoadOptions::new().base(&base).cache(false)).unwrap_err();
    match err {
        StrataError::Parse { line, .. } => assert_eq!(line, 3),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn test_schema_errors_carry_source_and_suggestion() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let base = write(&dir, ".env", "FT_ULR=http://typo\nFT_PORT=eighty\n");

    let err = strata::load::<FailingConfig>(&LoadOptions::new().base(&base).cache(false)).unwrap_err();
    assert_eq!(err.exit_code(), 2);
    let StrataError::SchemaValidation { errors } = err else {
        panic!("expected schema validation error");
    };

    let url = errors.iter().find(|e| e.field == "FT_URL").unwrap();
    assert_eq!(url.suggestion.as_deref(), Some("FT_ULR"));

    let port = errors.iter().find(|e| e.field == "FT_PORT").unwrap();
    assert_eq!(port.source.as_deref(), Some(base.to_string_lossy().as_ref()));
}

#[test]
fn test_strict_mode_rejects_typo_in_override_file() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let base = write(&dir, ".env", "FT_URL=http://ok\nFT_PROT=81\n");

    let options = LoadOptions::new().base(&base).strict(true).cache(false);
    let err = strata::load::<FailingConfig>(&options).unwrap_err();
    match err {
        StrataError::StrictModeViolation { unknown, suggestions } => {
            assert_eq!(unknown, vec!["FT_PROT".to_string()]);
            assert_eq!(suggestions.get("FT_PROT").map(String::as_str), Some("FT_PORT"));
        }
        other => panic!("expected strict violation, got {other:?}"),
    }

    // Without strict mode the extra key is ignored
    let loaded = strata::load::<FailingConfig>(&options.clone().strict(false)).unwrap();
    assert_eq!(loaded.ft_port, 80);
}

#[derive(Debug, Deserialize)]
struct SecretConfig {
    st_user: String,
    st_password: Secret,
    st_api_key: Secret,
}

impl ConfigSchema for SecretConfig {
    fn schema() -> Schema {
        Schema::new("SecretConfig")
            .field(FieldSpec::new("ST_USER", FieldKind::String).required())
            .field(FieldSpec::new("ST_PASSWORD", FieldKind::Secret).required())
            .field(FieldSpec::new("ST_API_KEY", FieldKind::Secret).default_value("secretref:env:ST_RAW_API_KEY"))
    }
}

#[tokio::test]
async fn test_secret_fields_masked_and_resolved_lazily() {
    use secrecy::ExposeSecret;

    let dir = TempDir::new().unwrap();
    let base = write(
        &dir,
        ".env",
        "ST_USER=app\nST_PASSWORD=hunter2\nST_RAW_API_KEY=k-123\n",
    );

    // Held across the awaits: the env backend reads the mapping published by the last load
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let loaded =
        strata::load::<SecretConfig>(&LoadOptions::new().base(&base).cache(false)).unwrap();

    let debug = format!("{:?}", *loaded);
    assert!(!debug.contains("hunter2"));
    assert!(debug.contains("***"));

    assert!(loaded.st_password.reference().is_none());
    assert_eq!(
        loaded.st_password.resolve().await.unwrap().expose_secret().as_str(),
        "hunter2"
    );

    assert!(!loaded.st_api_key.is_resolved());
    assert_eq!(loaded.st_api_key.reference().map(|r| r.backend()), Some("env"));
    let key = loaded.st_api_key.resolve().await.unwrap();
    assert_eq!(key.expose_secret().as_str(), "k-123");
    assert!(loaded.st_api_key.is_resolved());
    assert_eq!(loaded.st_user, "app");
}

#[test]
fn test_invalid_secret_reference_is_schema_error() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let base = write(&dir, ".env", "ST_USER=app\nST_PASSWORD=secretref:missing-key\n");

    let err = strata::load::<SecretConfig>(&LoadOptions::new().base(&base).cache(false)).unwrap_err();
    let StrataError::SchemaValidation { errors } = err else {
        panic!("expected schema validation error");
    };
    let password = errors.iter().find(|e| e.field == "ST_PASSWORD").unwrap();
    assert_eq!(password.message, "invalid secret reference");
    assert!(!password.to_string().contains("missing-key"));
}
