//! Bounded-concurrency job pool
//!
//! Every job is spawned up front and waits for a semaphore permit, so exactly
//! `max_workers` jobs run at a time and a finished job's slot is taken by the
//! next waiting one immediately. A failed or panicked job is reported and
//! never cancels its siblings.

use anyhow::Result;
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::infrastructure::config::DispatcherConfig;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobOutcome<T> {
    Completed { label: String, value: T },
    Failed { label: String, error: String },
}

impl<T> JobOutcome<T> {
    pub fn label(&self) -> &str {
        match self {
            Self::Completed { label, .. } | Self::Failed { label, .. } => label,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport<T> {
    pub dispatch_id: String,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Highest number of jobs observed running at once
    pub max_in_flight: usize,
    /// One outcome per job, in submission order
    pub outcomes: Vec<JobOutcome<T>>,
}

#[derive(Default)]
struct PoolCounters {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    finished: AtomicUsize,
}

/// Running-job slot; released on drop so a panicking job still frees it
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counters: &'a PoolCounters) -> (Self, usize) {
        let running = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_in_flight.fetch_max(running, Ordering::SeqCst);
        (Self(&counters.in_flight), running)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct ParallelDispatcher {
    max_workers: usize,
}

impl ParallelDispatcher {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    /// Pool sized by configuration, defaulting to the logical core count
    pub fn from_config(config: &DispatcherConfig) -> Self {
        Self::new(config.resolved_workers())
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run `work(position, job)` for every job with at most `max_workers` in flight.
    pub async fn run<J, F, Fut, T>(&self, jobs: Vec<J>, work: F) -> DispatchReport<T>
    where
        J: Display + Send + 'static,
        F: Fn(usize, J) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let dispatch_id = Uuid::new_v4().to_string();
        let total = jobs.len();
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let counters = Arc::new(PoolCounters::default());
        let work = Arc::new(work);

        info!(
            "🚀 Dispatch {} started: {} jobs on {} workers",
            dispatch_id, total, self.max_workers
        );

        let mut labels = Vec::with_capacity(total);
        let mut tasks = Vec::with_capacity(total);
        for (position, job) in jobs.into_iter().enumerate() {
            let label = job.to_string();
            labels.push(label.clone());

            let semaphore = Arc::clone(&semaphore);
            let counters = Arc::clone(&counters);
            let work = Arc::clone(&work);
            let span = info_span!("worker", dispatch = %dispatch_id, position);

            let task = tokio::spawn(
                async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| anyhow::anyhow!("Worker pool closed"))?;

                    let (slot, running) = InFlight::enter(&counters);
                    debug!("🔓 Job {} started ({} running)", label, running);

                    let result = work(position, job).await;

                    drop(slot);
                    let finished = counters.finished.fetch_add(1, Ordering::SeqCst) + 1;
                    match &result {
                        Ok(_) => info!("✅ [{}/{}] Job {} completed", finished, total, label),
                        Err(e) => warn!("❌ [{}/{}] Job {} failed: {:#}", finished, total, label, e),
                    }
                    result
                }
                .instrument(span),
            );
            tasks.push(task);
        }

        let results = futures::future::join_all(tasks).await;

        let mut outcomes = Vec::with_capacity(total);
        for (label, result) in labels.into_iter().zip(results) {
            let outcome = match result {
                Ok(Ok(value)) => JobOutcome::Completed { label, value },
                Ok(Err(e)) => JobOutcome::Failed {
                    label,
                    error: format!("{e:#}"),
                },
                Err(join_error) => {
                    error!("❌ Job {} aborted: {}", label, join_error);
                    JobOutcome::Failed {
                        label,
                        error: join_error.to_string(),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let completed = outcomes.iter().filter(|o| o.is_completed()).count();
        let report = DispatchReport {
            dispatch_id,
            total,
            completed,
            failed: total - completed,
            max_in_flight: counters.max_in_flight.load(Ordering::SeqCst),
            outcomes,
        };
        info!(
            "🏁 Dispatch {} finished: {}/{} completed, {} failed, max {} in flight",
            report.dispatch_id, report.completed, report.total, report.failed, report.max_in_flight
        );
        report
    }
}
