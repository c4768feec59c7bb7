//! Event stream publisher and run registry.
//!
//! The log is the only coupling between producers and consumers: appends are
//! linearized per run (strictly increasing sequence ids), readers tail
//! independently with their own last-seen position, and nothing is ever
//! mutated or removed. Any durable append-only store with multi-reader
//! semantics can sit behind [`EventLog`]; [`MemoryEventLog`] is the
//! in-process reference implementation.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::error::StreamError;
use crate::events::{EventRecord, ReviewEvent};
use crate::run::{RunId, RunKey};

#[async_trait]
pub trait EventLog: Send + Sync {
    /// Append one event to a run's stream; returns its sequence id.
    async fn append(&self, run: &RunKey, event: ReviewEvent) -> Result<u64, StreamError>;

    /// Blocking read of every event with a sequence id greater than `after`
    /// (`None` reads from the beginning of the log). Returns an empty batch
    /// when `wait` elapses with nothing new; readers surface that as a
    /// keep-alive.
    async fn read_after(
        &self,
        run: &RunKey,
        after: Option<u64>,
        wait: Duration,
    ) -> Result<Vec<EventRecord>, StreamError>;

    /// Record a run in the registry. Idempotent set-add: registering the
    /// same run twice is a no-op.
    async fn register_run(&self, repo: &str, pr_number: u64, run_id: &RunId)
        -> Result<(), StreamError>;

    /// Run ids registered for one (repository, pull request), newest first.
    async fn list_runs(&self, repo: &str, pr_number: u64) -> Result<Vec<RunId>, StreamError>;

    /// Every known (repository, pull request, run id) triple, newest first.
    async fn list_all_runs(&self) -> Result<Vec<RunKey>, StreamError>;

    /// Drop all streams and registry entries; returns how many keys were
    /// removed. Administrative surface, not used by the engine itself.
    async fn clear(&self) -> Result<usize, StreamError>;
}

/// In-memory event log and registry.
pub struct MemoryEventLog {
    streams: Mutex<HashMap<RunKey, Vec<EventRecord>>>,
    registry: Mutex<BTreeMap<(String, u64), BTreeSet<RunId>>>,
    appended: Notify,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        MemoryEventLog {
            streams: Mutex::new(HashMap::new()),
            registry: Mutex::new(BTreeMap::new()),
            appended: Notify::new(),
        }
    }
}

impl Default for MemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventLog for MemoryEventLog {
    async fn append(&self, run: &RunKey, event: ReviewEvent) -> Result<u64, StreamError> {
        let sequence = {
            let mut streams = self.streams.lock().unwrap();
            let records = streams.entry(run.clone()).or_default();
            let sequence = records.len() as u64 + 1;
            records.push(EventRecord {
                sequence,
                event,
                recorded_at: Utc::now(),
            });
            sequence
        };
        self.appended.notify_waiters();
        debug!(run = %run, sequence, "event appended");
        Ok(sequence)
    }

    async fn read_after(
        &self,
        run: &RunKey,
        after: Option<u64>,
        wait: Duration,
    ) -> Result<Vec<EventRecord>, StreamError> {
        let deadline = Instant::now() + wait;
        loop {
            let notified = self.appended.notified();
            tokio::pin!(notified);
            // Register interest before checking, so an append between the
            // check and the wait cannot be missed.
            notified.as_mut().enable();

            {
                let streams = self.streams.lock().unwrap();
                if let Some(records) = streams.get(run) {
                    let fresh: Vec<EventRecord> = records
                        .iter()
                        .filter(|r| after.map_or(true, |a| r.sequence > a))
                        .cloned()
                        .collect();
                    if !fresh.is_empty() {
                        return Ok(fresh);
                    }
                }
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = sleep_until(deadline) => return Ok(Vec::new()),
            }
        }
    }

    async fn register_run(
        &self,
        repo: &str,
        pr_number: u64,
        run_id: &RunId,
    ) -> Result<(), StreamError> {
        let mut registry = self.registry.lock().unwrap();
        registry
            .entry((repo.to_string(), pr_number))
            .or_default()
            .insert(run_id.clone());
        Ok(())
    }

    async fn list_runs(&self, repo: &str, pr_number: u64) -> Result<Vec<RunId>, StreamError> {
        let registry = self.registry.lock().unwrap();
        Ok(registry
            .get(&(repo.to_string(), pr_number))
            .map(|runs| runs.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_all_runs(&self) -> Result<Vec<RunKey>, StreamError> {
        let registry = self.registry.lock().unwrap();
        let mut all: Vec<RunKey> = registry
            .iter()
            .flat_map(|((repo, pr_number), runs)| {
                runs.iter()
                    .map(|run_id| RunKey::new(repo, *pr_number, run_id.clone()))
            })
            .collect();
        all.sort_by(|a, b| b.run_id.cmp(&a.run_id));
        Ok(all)
    }

    async fn clear(&self) -> Result<usize, StreamError> {
        let mut streams = self.streams.lock().unwrap();
        let mut registry = self.registry.lock().unwrap();
        let removed = streams.len() + registry.len();
        streams.clear();
        registry.clear();
        Ok(removed)
    }
}
