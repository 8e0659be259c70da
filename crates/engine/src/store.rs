//! Workflow store: exclusive owner of workflow records.
//!
//! The store is the only place workflow state changes. Each record sits behind
//! its own lock, so mutations of one workflow serialize with reads of that
//! workflow while unrelated workflows proceed independently.
//!
//! Mutations are applied to a draft copy and swapped in only when the mutation
//! reports a change, which means a reader never observes a half-applied update
//! and a skipped mutation leaves `updated_at` untouched.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sparta_types::Workflow;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::StoreError;

/// Outcome of [`WorkflowStore::mutate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// The change was committed; holds the new record.
    Applied(Workflow),
    /// The mutation declined to change anything; holds the unchanged record.
    Skipped(Workflow),
}

impl Mutation {
    pub fn applied(&self) -> bool {
        matches!(self, Mutation::Applied(_))
    }

    pub fn workflow(&self) -> &Workflow {
        match self {
            Mutation::Applied(workflow) | Mutation::Skipped(workflow) => workflow,
        }
    }

    pub fn into_workflow(self) -> Workflow {
        match self {
            Mutation::Applied(workflow) | Mutation::Skipped(workflow) => workflow,
        }
    }
}

/// Keyed, thread-safe container of workflow records.
#[derive(Debug, Default)]
pub struct WorkflowStore {
    records: RwLock<HashMap<String, Arc<Mutex<Workflow>>>>,
}

impl WorkflowStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record. Fails when the id is already present.
    pub async fn create(&self, workflow: Workflow) -> Result<Workflow, StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&workflow.id) {
            return Err(StoreError::Duplicate { id: workflow.id });
        }
        let snapshot = workflow.clone();
        records.insert(workflow.id.clone(), Arc::new(Mutex::new(workflow)));
        debug!(workflow_id = %snapshot.id, "stored new workflow");
        Ok(snapshot)
    }

    /// Return a snapshot of a record.
    pub async fn get(&self, id: &str) -> Result<Workflow, StoreError> {
        let record = self.record(id).await?;
        let workflow = record.lock().await;
        Ok(workflow.clone())
    }

    /// Apply `mutation` to a record as one atomic unit.
    ///
    /// The closure receives a draft copy and returns whether it changed
    /// anything. Returning `true` commits the draft and stamps `updated_at`;
    /// returning `false` discards it.
    pub async fn mutate<F>(&self, id: &str, mutation: F) -> Result<Mutation, StoreError>
    where
        F: FnOnce(&mut Workflow) -> bool,
    {
        let record = self.record(id).await?;
        let mut workflow = record.lock().await;
        let mut draft = workflow.clone();
        if !mutation(&mut draft) {
            return Ok(Mutation::Skipped(workflow.clone()));
        }
        draft.touch(Utc::now());
        *workflow = draft;
        Ok(Mutation::Applied(workflow.clone()))
    }

    /// Whether a record with `id` exists.
    pub async fn contains(&self, id: &str) -> bool {
        self.records.read().await.contains_key(id)
    }

    /// Number of stored workflows.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn record(&self, id: &str) -> Result<Arc<Mutex<Workflow>>, StoreError> {
        let records = self.records.read().await;
        records
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }
}
