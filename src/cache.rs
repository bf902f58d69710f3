//! Process-lifetime cache of loaded engines.
//!
//! Each [`ConfigId`] owns one slot. The first caller for a slot performs the
//! load while holding the slot lock, so concurrent cold starts for the same
//! configuration wait for that single load instead of duplicating it. Loads
//! of different configurations only share the brief map lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use crate::config::ConfigId;
use crate::error::HandlerError;
use crate::{EngineError, SpeechEngine};

/// Shared handle to a loaded engine.
pub type EngineHandle = Arc<dyn SpeechEngine>;

/// Performs the expensive construction of an engine for a configuration.
pub trait EngineLoader: Send + Sync {
    fn load(&self, config: &ConfigId) -> Result<EngineHandle, EngineError>;
}

impl<F> EngineLoader for F
where
    F: Fn(&ConfigId) -> Result<EngineHandle, EngineError> + Send + Sync,
{
    fn load(&self, config: &ConfigId) -> Result<EngineHandle, EngineError> {
        self(config)
    }
}

type Slot = Arc<Mutex<Option<EngineHandle>>>;

/// Lazily loads engines and keeps them for the lifetime of the process.
///
/// There is no eviction. A failed load leaves the slot empty, so the next
/// request for the same configuration retries from scratch.
pub struct ModelCache {
    loader: Arc<dyn EngineLoader>,
    slots: RwLock<HashMap<ConfigId, Slot>>,
    /// Loaded engines, readable without touching the slot locks.
    ready: RwLock<HashMap<ConfigId, EngineHandle>>,
}

impl ModelCache {
    pub fn new(loader: Arc<dyn EngineLoader>) -> Self {
        Self {
            loader,
            slots: RwLock::new(HashMap::new()),
            ready: RwLock::new(HashMap::new()),
        }
    }

    /// Return the engine for `config`, loading it on first use.
    pub fn get(&self, config: &ConfigId) -> Result<EngineHandle, HandlerError> {
        let slot = self.slot(config);
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(engine) = guard.as_ref() {
            return Ok(Arc::clone(engine));
        }

        log::info!("Loading engine {config}");
        let start = Instant::now();
        let engine = self
            .loader
            .load(config)
            .map_err(|source| HandlerError::EngineLoad {
                config: config.clone(),
                source,
            })?;
        log::info!(
            "Engine '{}' for {config} loaded in {:.2?}",
            engine.name(),
            start.elapsed()
        );

        *guard = Some(Arc::clone(&engine));
        self.ready
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(config.clone(), Arc::clone(&engine));
        Ok(engine)
    }

    /// Load `config` ahead of the first request.
    pub fn preload(&self, config: &ConfigId) -> Result<(), HandlerError> {
        self.get(config).map(|_| ())
    }

    /// Return the engine for `config` only if it is already loaded.
    ///
    /// Never waits on a load in progress.
    pub fn peek(&self, config: &ConfigId) -> Option<EngineHandle> {
        let ready = self.ready.read().unwrap_or_else(PoisonError::into_inner);
        ready.get(config).map(Arc::clone)
    }

    /// Configurations with a loaded engine.
    pub fn loaded(&self) -> Vec<ConfigId> {
        let ready = self.ready.read().unwrap_or_else(PoisonError::into_inner);
        ready.keys().cloned().collect()
    }

    fn slot(&self, config: &ConfigId) -> Slot {
        {
            let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(slot) = slots.get(config) {
                return Arc::clone(slot);
            }
        }
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(config.clone()).or_default())
    }
}
