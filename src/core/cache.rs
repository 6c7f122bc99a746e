//! Cache & reload manager
//!
//! One [`ConfigCell`] per configuration type holds the last successfully
//! resolved instance. The cell's lock is held while the pipeline runs, so
//! racing first loads resolve once and the later caller receives the cached
//! instance. Reload callbacks run after the lock is released, in
//! registration order; a failing or panicking callback is logged and the
//! rest still run.

use super::pipeline::{build, LoadOptions};
use crate::domain::result::Result;
use crate::schema::ConfigSchema;
use crate::secrets::SecretRegistry;
use crate::source::ResolvedMapping;
use chrono::{DateTime, Utc};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::ops::Deref;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

/// An installed configuration snapshot
#[derive(Debug)]
pub struct Loaded<T> {
    pub instance: Arc<T>,

    /// When the pipeline that produced this snapshot finished
    pub loaded_at: DateTime<Utc>,

    /// 1 for the first load, incremented by each successful reload
    pub generation: u64,

    /// Provenance of every resolved key
    pub mapping: Arc<ResolvedMapping>,
}

impl<T> Clone for Loaded<T> {
    fn clone(&self) -> Self {
        Self {
            instance: Arc::clone(&self.instance),
            loaded_at: self.loaded_at,
            generation: self.generation,
            mapping: Arc::clone(&self.mapping),
        }
    }
}

impl<T> Deref for Loaded<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.instance
    }
}

/// Reload callback; an `Err` is logged and does not stop later callbacks
pub type ReloadCallback<T> = dyn Fn(&Loaded<T>) -> anyhow::Result<()> + Send + Sync;

struct CellState<T> {
    current: Option<Loaded<T>>,
    generation: u64,
    last_options: Option<LoadOptions>,
}

/// Cached configuration for one type
pub struct ConfigCell<T> {
    state: Mutex<CellState<T>>,
    callbacks: Mutex<Vec<Arc<ReloadCallback<T>>>>,
}

impl<T: ConfigSchema> Default for ConfigCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ConfigSchema> ConfigCell<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CellState {
                current: None,
                generation: 0,
                last_options: None,
            }),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CellState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(options: &LoadOptions, generation: u64) -> Result<Loaded<T>> {
        let resolved = build::<T>(&T::schema(), options)?;
        Ok(Loaded {
            instance: Arc::new(resolved.value),
            loaded_at: Utc::now(),
            generation,
            mapping: Arc::new(resolved.mapping),
        })
    }

    /// Returns the cached snapshot, or runs the pipeline and installs it
    ///
    /// With `options.cache` unset the pipeline always runs and the result is
    /// returned without being installed.
    ///
    /// # Errors
    ///
    /// Any pipeline error; the cached snapshot, if any, is kept.
    pub fn load(&self, options: &LoadOptions) -> Result<Loaded<T>> {
        let mut state = self.lock_state();

        if !options.cache {
            return Self::resolve(options, state.generation);
        }
        if let Some(current) = &state.current {
            return Ok(current.clone());
        }

        let loaded = Self::resolve(options, state.generation + 1)?;
        state.generation = loaded.generation;
        state.current = Some(loaded.clone());
        state.last_options = Some(options.clone());
        Ok(loaded)
    }

    /// Re-runs the pipeline with the options of the last load
    ///
    /// Before any load, options come from [`LoadOptions::from_env`].
    ///
    /// # Errors
    ///
    /// Any pipeline error; the cached snapshot is kept.
    pub fn reload(&self) -> Result<Loaded<T>> {
        let options = self
            .lock_state()
            .last_options
            .clone()
            .unwrap_or_else(LoadOptions::from_env);
        self.reload_with(&options)
    }

    /// Re-runs the pipeline unconditionally and swaps the snapshot
    ///
    /// On success the process-wide secret cache is cleared so rotated secrets
    /// are fetched again, then every callback runs with the new snapshot.
    ///
    /// # Errors
    ///
    /// Any pipeline error; the cached snapshot is kept and no callback runs.
    pub fn reload_with(&self, options: &LoadOptions) -> Result<Loaded<T>> {
        let loaded = {
            let mut state = self.lock_state();
            let loaded = match Self::resolve(options, state.generation + 1) {
                Ok(loaded) => loaded,
                Err(e) => {
                    crate::log_load_failure!(e, options);
                    tracing::warn!(
                        generation = state.generation,
                        "Reload failed, keeping previous configuration"
                    );
                    return Err(e);
                }
            };
            state.generation = loaded.generation;
            state.current = Some(loaded.clone());
            state.last_options = Some(options.clone());
            loaded
        };

        SecretRegistry::global().clear_cache();
        tracing::info!(generation = loaded.generation, "Configuration reloaded");

        self.notify(&loaded);
        Ok(loaded)
    }

    fn notify(&self, loaded: &Loaded<T>) {
        let callbacks: Vec<Arc<ReloadCallback<T>>> = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (index, callback) in callbacks.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| callback(loaded))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(callback = index, error = %e, "Reload callback failed");
                }
                Err(_) => {
                    tracing::warn!(callback = index, "Reload callback panicked");
                }
            }
        }
    }

    /// Registers a callback invoked after every successful reload
    pub fn on_reload<F>(&self, callback: F)
    where
        F: Fn(&Loaded<T>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(callback));
    }

    /// Installed snapshot, without running the pipeline
    pub fn current(&self) -> Option<Loaded<T>> {
        self.lock_state().current.clone()
    }

    /// Generation of the installed snapshot; 0 before the first load
    pub fn generation(&self) -> u64 {
        self.lock_state().generation
    }

    /// Drops the snapshot and generation; callbacks stay registered and are not invoked
    pub fn reset(&self) {
        let mut state = self.lock_state();
        state.current = None;
        state.generation = 0;
        state.last_options = None;
    }
}

type CellMap = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

fn cells() -> &'static Mutex<CellMap> {
    static CELLS: OnceLock<Mutex<CellMap>> = OnceLock::new();
    CELLS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Process-wide cell for `T`
pub fn cell<T: ConfigSchema>() -> Arc<ConfigCell<T>> {
    let mut cells = cells().lock().unwrap_or_else(PoisonError::into_inner);
    let entry = cells
        .entry(TypeId::of::<T>())
        .or_insert_with(|| Arc::new(ConfigCell::<T>::new()) as Arc<dyn Any + Send + Sync>);

    match Arc::clone(entry).downcast::<ConfigCell<T>>() {
        Ok(cell) => cell,
        Err(_) => {
            let cell = Arc::new(ConfigCell::<T>::new());
            *entry = cell.clone() as Arc<dyn Any + Send + Sync>;
            cell
        }
    }
}

/// Loads `T`, returning the cached instance when there is one
///
/// # Errors
///
/// Any pipeline error.
pub fn load<T: ConfigSchema>(options: &LoadOptions) -> Result<Loaded<T>> {
    cell::<T>().load(options)
}

/// Reloads `T` with the options of its last load
///
/// # Errors
///
/// Any pipeline error; the previous instance stays cached.
pub fn reload<T: ConfigSchema>() -> Result<Loaded<T>> {
    cell::<T>().reload()
}

/// Reloads `T` with new options
///
/// # Errors
///
/// Any pipeline error; the previous instance stays cached.
pub fn reload_with<T: ConfigSchema>(options: &LoadOptions) -> Result<Loaded<T>> {
    cell::<T>().reload_with(options)
}

/// Cached snapshot of `T`, if loaded
pub fn current<T: ConfigSchema>() -> Option<Loaded<T>> {
    cell::<T>().current()
}

/// Generation of `T`'s snapshot
pub fn generation<T: ConfigSchema>() -> u64 {
    cell::<T>().generation()
}

/// Registers a reload callback for `T`
pub fn on_reload<T, F>(callback: F)
where
    T: ConfigSchema,
    F: Fn(&Loaded<T>) -> anyhow::Result<()> + Send + Sync + 'static,
{
    cell::<T>().on_reload(callback);
}

/// Clears `T`'s cached snapshot (test isolation)
pub fn reset<T: ConfigSchema>() {
    cell::<T>().reset();
}
