//! In-memory registry of executions and their transition histories.
//!
//! A record accepts writes only while its status is `RUNNING`; once it leaves
//! that status every mutator is a no-op, so a late write from a cancelled or
//! timed-out task can never change a finished execution.
//!
//! Finished records are kept up to a retention limit; past it the oldest
//! finished records are evicted. `RUNNING` records are never evicted.

use std::{
    collections::HashMap,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use chrono::Utc;
use tracing::debug;
use visitnote_types::{
    ExecutionFailure, ExecutionHandle, ExecutionHistory, ExecutionSnapshot, ExecutionStatus, ResultEnvelope, StateTransition,
    WorkflowState,
};

#[derive(Debug, Clone)]
struct ExecutionRecord {
    snapshot: ExecutionSnapshot,
    transitions: Vec<StateTransition>,
    /// Position in finishing order; set when the record turns terminal.
    finished_seq: Option<u64>,
}

/// Number of execution records kept when no limit is configured.
pub const DEFAULT_MAX_RETAINED_EXECUTIONS: usize = 500;

/// Shared, cloneable execution registry.
#[derive(Debug, Clone)]
pub struct ExecutionStore {
    records: Arc<RwLock<HashMap<ExecutionHandle, ExecutionRecord>>>,
    finished: Arc<AtomicU64>,
    retention: usize,
}

impl Default for ExecutionStore {
    fn default() -> Self {
        Self::with_retention(DEFAULT_MAX_RETAINED_EXECUTIONS)
    }
}

impl ExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that keeps at most `retention` records once older ones have finished.
    pub fn with_retention(retention: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            finished: Arc::new(AtomicU64::new(0)),
            retention: retention.max(1),
        }
    }

    /// Register a new `RUNNING` execution positioned before its first state.
    pub fn create(&self, handle: ExecutionHandle, envelope: ResultEnvelope) -> ExecutionSnapshot {
        let snapshot = running_snapshot(handle.clone(), envelope);
        let record = ExecutionRecord {
            snapshot: snapshot.clone(),
            transitions: Vec::new(),
            finished_seq: None,
        };
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.insert(handle, record);
        evict_finished(&mut records, self.retention);
        snapshot
    }

    /// Like [`create`](Self::create), but refuses while another execution of the
    /// same job is `RUNNING`; the error carries that execution's handle.
    pub fn try_create(&self, handle: ExecutionHandle, envelope: ResultEnvelope) -> Result<ExecutionSnapshot, ExecutionHandle> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let job_name = &envelope.input().job_name;
        if let Some(existing) = records.values().find(|record| is_running_job(record, job_name)) {
            return Err(existing.snapshot.handle.clone());
        }
        let snapshot = running_snapshot(handle.clone(), envelope);
        records.insert(
            handle,
            ExecutionRecord {
                snapshot: snapshot.clone(),
                transitions: Vec::new(),
                finished_seq: None,
            },
        );
        evict_finished(&mut records, self.retention);
        Ok(snapshot)
    }

    /// Record entry into `state`. Returns false once the execution is terminal.
    pub fn enter(&self, handle: &ExecutionHandle, state: WorkflowState) -> bool {
        self.update_running(handle, |record| {
            record.snapshot.state = state;
            record.transitions.push(StateTransition {
                state,
                entered_at: Utc::now(),
            });
        })
    }

    /// Replace the stored envelope with the engine's latest copy.
    pub fn record_envelope(&self, handle: &ExecutionHandle, envelope: &ResultEnvelope) -> bool {
        self.update_running(handle, |record| record.snapshot.envelope = envelope.clone())
    }

    /// Move a running execution to a terminal status.
    ///
    /// `SUCCEEDED` and `FAILED` also enter the matching terminal state;
    /// `ABORTED` leaves the execution in the state it was stopped in.
    pub fn finish(
        &self,
        handle: &ExecutionHandle,
        status: ExecutionStatus,
        failure: Option<ExecutionFailure>,
        envelope: Option<&ResultEnvelope>,
    ) -> bool {
        let finished_seq = self.finished.fetch_add(1, Ordering::Relaxed);
        self.update_running(handle, |record| {
            let now = Utc::now();
            record.finished_seq = Some(finished_seq);
            let terminal_state = match status {
                ExecutionStatus::Succeeded => Some(WorkflowState::Succeed),
                ExecutionStatus::Failed => Some(WorkflowState::Fail),
                ExecutionStatus::Running | ExecutionStatus::Aborted => None,
            };
            if let Some(state) = terminal_state {
                record.snapshot.state = state;
                record.transitions.push(StateTransition { state, entered_at: now });
            }
            if let Some(envelope) = envelope {
                record.snapshot.envelope = envelope.clone();
            }
            record.snapshot.status = status;
            record.snapshot.failure = failure;
            record.snapshot.stopped_at = Some(now);
        })
    }

    pub fn snapshot(&self, handle: &ExecutionHandle) -> Option<ExecutionSnapshot> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(handle)
            .map(|record| record.snapshot.clone())
    }

    pub fn history(&self, handle: &ExecutionHandle) -> Option<ExecutionHistory> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(handle)
            .map(|record| ExecutionHistory {
                handle: handle.clone(),
                transitions: record.transitions.clone(),
            })
    }

    /// Snapshots of every execution, oldest first.
    pub fn list(&self) -> Vec<ExecutionSnapshot> {
        let mut snapshots: Vec<_> = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|record| record.snapshot.clone())
            .collect();
        snapshots.sort_by(|left, right| left.started_at.cmp(&right.started_at));
        snapshots
    }

    fn update_running<F>(&self, handle: &ExecutionHandle, update: F) -> bool
    where
        F: FnOnce(&mut ExecutionRecord),
    {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        match records.get_mut(handle) {
            Some(record) if record.snapshot.status == ExecutionStatus::Running => {
                update(record);
                true
            }
            _ => false,
        }
    }
}

fn running_snapshot(handle: ExecutionHandle, envelope: ResultEnvelope) -> ExecutionSnapshot {
    ExecutionSnapshot {
        handle,
        status: ExecutionStatus::Running,
        state: WorkflowState::SubmitTranscription,
        envelope,
        failure: None,
        started_at: Utc::now(),
        stopped_at: None,
    }
}

/// Drop the oldest finished records until at most `retention` remain.
fn evict_finished(records: &mut HashMap<ExecutionHandle, ExecutionRecord>, retention: usize) {
    let excess = records.len().saturating_sub(retention);
    if excess == 0 {
        return;
    }
    let mut finished: Vec<_> = records
        .values()
        .filter(|record| record.snapshot.status.is_terminal())
        .map(|record| (record.finished_seq, record.snapshot.handle.clone()))
        .collect();
    finished.sort();
    for (_, handle) in finished.into_iter().take(excess) {
        records.remove(&handle);
    }
    debug!(retained = records.len(), retention, "evicted finished executions");
}

fn is_running_job(record: &ExecutionRecord, job_name: &str) -> bool {
    record.snapshot.status == ExecutionStatus::Running && record.snapshot.envelope.input().job_name == job_name
}
