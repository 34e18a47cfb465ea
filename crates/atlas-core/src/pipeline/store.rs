//! Run-record store collaborator.
//!
//! The core never keeps cross-run state. A store hands out the immutable
//! context of a run and receives its outcome; [`process_run`] glues the two
//! around [`Pipeline::execute`].

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::geo::Aoi;
use crate::params::{Mode, RunParameters};

use super::{DataSources, Pipeline, ProgressObserver, RunRequest, RunResult};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("run `{0}` not found")]
    NotFound(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Everything recorded when a run was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunContext {
    pub aoi: Aoi,
    pub mode: Mode,
    pub params: RunParameters,
}

pub trait RunStore {
    fn load_context(&self, run_id: &str) -> Result<RunContext, StoreError>;
    fn persist_outcome(&self, result: &RunResult) -> Result<(), StoreError>;
}

/// Load a run's context, execute it and persist the outcome.
///
/// A failed run is still a persisted outcome; only store errors are returned
/// as `Err`.
pub fn process_run(
    pipeline: &Pipeline,
    store: &dyn RunStore,
    run_id: &str,
    sources: &DataSources<'_>,
    observer: &dyn ProgressObserver,
) -> Result<RunResult, StoreError> {
    let RunContext { aoi, mode, params } = store.load_context(run_id)?;
    let request = RunRequest { run_id: run_id.to_string(), aoi, mode, params };
    let result = pipeline.execute(&request, sources, observer);
    store.persist_outcome(&result)?;
    info!(run_id, completed = result.is_completed(), "run outcome persisted");
    Ok(result)
}

/// In-process store keyed by run id.
#[derive(Debug, Default)]
pub struct MemoryRunStore {
    contexts: Mutex<BTreeMap<String, RunContext>>,
    outcomes: Mutex<BTreeMap<String, RunResult>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, run_id: impl Into<String>, context: RunContext) -> Result<(), StoreError> {
        self.contexts.lock().map_err(poisoned)?.insert(run_id.into(), context);
        Ok(())
    }

    pub fn outcome(&self, run_id: &str) -> Option<RunResult> {
        self.outcomes.lock().ok()?.get(run_id).cloned()
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

impl RunStore for MemoryRunStore {
    fn load_context(&self, run_id: &str) -> Result<RunContext, StoreError> {
        self.contexts
            .lock()
            .map_err(poisoned)?
            .get(run_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(run_id.to_string()))
    }

    fn persist_outcome(&self, result: &RunResult) -> Result<(), StoreError> {
        self.outcomes.lock().map_err(poisoned)?.insert(result.run_id.clone(), result.clone());
        Ok(())
    }
}
