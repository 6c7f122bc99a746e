//! Integration tests for the per-type cache, reload and reload callbacks

use serde::Deserialize;
use std::fs;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use strata::{ConfigSchema, FieldKind, FieldSpec, LoadOptions, Schema, StrataError};
use tempfile::TempDir;

static ENV_MUTEX: Mutex<()> = Mutex::new(());

macro_rules! reload_config {
    ($name:ident, $field:ident, $key:literal) => {
        #[derive(Debug, Deserialize)]
        struct $name {
            $field: u32,
        }

        impl ConfigSchema for $name {
            fn schema() -> Schema {
                Schema::new(stringify!($name))
                    .field(FieldSpec::new($key, FieldKind::Integer).required())
            }
        }
    };
}

reload_config!(CachedConfig, rt_cached_workers, "RT_CACHED_WORKERS");
reload_config!(ReloadConfig, rt_reload_workers, "RT_RELOAD_WORKERS");
reload_config!(FailedReloadConfig, rt_failed_workers, "RT_FAILED_WORKERS");
reload_config!(CallbackConfig, rt_callback_workers, "RT_CALLBACK_WORKERS");
reload_config!(UncachedConfig, rt_uncached_workers, "RT_UNCACHED_WORKERS");

fn env_file(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(".env");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_load_returns_cached_instance() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    strata::reset::<CachedConfig>();
    let dir = TempDir::new().unwrap();
    let base = env_file(&dir, "RT_CACHED_WORKERS=4\n");
    let options = LoadOptions::new().base(&base);

    let first = strata::load::<CachedConfig>(&options).unwrap();
    fs::write(&base, "RT_CACHED_WORKERS=8\n").unwrap();
    let second = strata::load::<CachedConfig>(&options).unwrap();

    assert!(Arc::ptr_eq(&first.instance, &second.instance));
    assert_eq!(second.rt_cached_workers, 4);
    assert_eq!(strata::generation::<CachedConfig>(), 1);

    strata::reset::<CachedConfig>();
    assert!(strata::current::<CachedConfig>().is_none());
    let third = strata::load::<CachedConfig>(&options).unwrap();
    assert_eq!(third.rt_cached_workers, 8);
    assert_eq!(third.generation, 1);
}

#[test]
fn test_reload_picks_up_changes_and_notifies() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    strata::reset::<ReloadConfig>();
    let dir = TempDir::new().unwrap();
    let base = env_file(&dir, "RT_RELOAD_WORKERS=2\n");

    let seen = Arc::new(AtomicU64::new(0));
    let seen_in_callback = Arc::clone(&seen);
    strata::on_reload::<ReloadConfig, _>(move |loaded| {
        seen_in_callback.store(u64::from(loaded.rt_reload_workers), Ordering::SeqCst);
        Ok(())
    });

    let first = strata::load::<ReloadConfig>(&LoadOptions::new().base(&base)).unwrap();
    assert_eq!(first.rt_reload_workers, 2);
    assert_eq!(seen.load(Ordering::SeqCst), 0, "load must not notify");

    fs::write(&base, "RT_RELOAD_WORKERS=16\n").unwrap();
    let reloaded = strata::reload::<ReloadConfig>().unwrap();

    assert_eq!(reloaded.rt_reload_workers, 16);
    assert_eq!(reloaded.generation, 2);
    assert!(reloaded.loaded_at >= first.loaded_at);
    assert_eq!(seen.load(Ordering::SeqCst), 16);

    let current = strata::current::<ReloadConfig>().unwrap();
    assert!(Arc::ptr_eq(&current.instance, &reloaded.instance));
    // The old snapshot is untouched
    assert_eq!(first.rt_reload_workers, 2);
}

#[test]
fn test_failed_reload_keeps_previous_snapshot() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    strata::reset::<FailedReloadConfig>();
    let dir = TempDir::new().unwrap();
    let base = env_file(&dir, "RT_FAILED_WORKERS=3\n");

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_callback = Arc::clone(&calls);
    strata::on_reload::<FailedReloadConfig, _>(move |_| {
        calls_in_callback.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    strata::load::<FailedReloadConfig>(&LoadOptions::new().base(&base)).unwrap();

    fs::write(&base, "RT_FAILED_WORKERS=lots\n").unwrap();
    let err = strata::reload::<FailedReloadConfig>().unwrap_err();
    assert!(matches!(err, StrataError::SchemaValidation { .. }));

    let current = strata::current::<FailedReloadConfig>().unwrap();
    assert_eq!(current.rt_failed_workers, 3);
    assert_eq!(current.generation, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_callback_failures_are_isolated() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    strata::reset::<CallbackConfig>();
    let dir = TempDir::new().unwrap();
    let base = env_file(&dir, "RT_CALLBACK_WORKERS=1\n");

    let reached = Arc::new(AtomicUsize::new(0));
    strata::on_reload::<CallbackConfig, _>(|_| anyhow::bail!("listener is down"));
    strata::on_reload::<CallbackConfig, _>(|_| panic!("listener crashed"));
    let reached_in_callback = Arc::clone(&reached);
    strata::on_reload::<CallbackConfig, _>(move |_| {
        reached_in_callback.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    strata::load::<CallbackConfig>(&LoadOptions::new().base(&base)).unwrap();
    let reloaded = strata::reload_with::<CallbackConfig>(&LoadOptions::new().base(&base)).unwrap();

    assert_eq!(reloaded.generation, 2);
    assert_eq!(reached.load(Ordering::SeqCst), 1);
}

#[test]
fn test_uncached_load_does_not_install() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    strata::reset::<UncachedConfig>();
    let dir = TempDir::new().unwrap();
    let base = env_file(&dir, "RT_UNCACHED_WORKERS=5\n");

    let loaded = strata::load::<UncachedConfig>(&LoadOptions::new().base(&base).cache(false)).unwrap();
    assert_eq!(loaded.rt_uncached_workers, 5);
    assert!(strata::current::<UncachedConfig>().is_none());
    assert_eq!(strata::generation::<UncachedConfig>(), 0);
}
