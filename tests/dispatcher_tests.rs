//! Category jobs on the bounded worker pool
mod common;

use anyhow::{Result, bail};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use review_harvester_lib::application::{JobOrchestrator, JobOutcome, ParallelDispatcher};
use review_harvester_lib::domain::{ErrorLog, JobSpec, ProductRecord, ReviewRecord};
use review_harvester_lib::infrastructure::session::SnapshotFactory;
use review_harvester_lib::infrastructure::storage::{CatalogStore, CsvCatalogStore};

use common::{fast_crawler, product_site};

const BROKEN_CATEGORY: &str = "불량";

/// CSV store that refuses to write one category's product table
struct FlakyStore {
    inner: CsvCatalogStore,
}

impl CatalogStore for FlakyStore {
    fn save_reviews(
        &self,
        category: &str,
        product_num: usize,
        reviews: &[ReviewRecord],
    ) -> Result<PathBuf> {
        self.inner.save_reviews(category, product_num, reviews)
    }

    fn save_products(&self, category: &str, products: &[ProductRecord]) -> Result<PathBuf> {
        if category == BROKEN_CATEGORY {
            bail!("disk full");
        }
        self.inner.save_products(category, products)
    }

    fn save_reviewers(&self, category: &str, reviewers: &BTreeSet<String>) -> Result<PathBuf> {
        self.inner.save_reviewers(category, reviewers)
    }

    fn save_errors(&self, errors: &ErrorLog) -> Result<PathBuf> {
        self.inner.save_errors(errors)
    }
}

#[tokio::test(start_paused = true)]
async fn five_jobs_on_two_workers_survive_one_failure() {
    let dir = TempDir::new().unwrap();
    let categories = ["토너", "에센스", BROKEN_CATEGORY, "크림", "선케어"];

    let mut sites = HashMap::new();
    let mut jobs = Vec::new();
    for (i, category) in categories.iter().enumerate() {
        let urls: Vec<String> = (0..2)
            .map(|n| format!("https://shop.test/goods/{i}{n}"))
            .collect();
        for url in &urls {
            sites.insert(url.clone(), product_site(&format!("u{i}"), 11));
        }
        jobs.push(JobSpec::new(*category, urls));
    }

    let store = Arc::new(FlakyStore {
        inner: CsvCatalogStore::new(dir.path()),
    });
    let orchestrator = Arc::new(JobOrchestrator::new(
        Arc::new(SnapshotFactory::new(sites)),
        store,
        fast_crawler(),
    ));

    let report = ParallelDispatcher::new(2)
        .run(jobs, move |position, spec| {
            let orchestrator = Arc::clone(&orchestrator);
            async move {
                let mut errors = ErrorLog::new();
                orchestrator.run_job(&spec, Some(position), &mut errors).await
            }
        })
        .await;

    assert_eq!(report.total, 5);
    assert_eq!(report.completed, 4);
    assert_eq!(report.failed, 1);
    assert_eq!(report.max_in_flight, 2);

    let failed: Vec<&str> = report
        .outcomes
        .iter()
        .filter(|o| !o.is_completed())
        .map(JobOutcome::label)
        .collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].contains(BROKEN_CATEGORY));

    for outcome in &report.outcomes {
        if let JobOutcome::Completed { value, .. } = outcome {
            assert_eq!(value.products, 2);
            assert_eq!(value.reviews, 22);
            assert_eq!(value.errors, 0);
        }
    }

    let inner = CsvCatalogStore::new(dir.path());
    for category in ["토너", "에센스", "크림", "선케어"] {
        assert!(inner.products_path(category).exists(), "{category} table missing");
    }
    assert!(!inner.products_path(BROKEN_CATEGORY).exists());
    // reviews of the failed job were written before the table write failed
    assert!(inner.reviews_path(BROKEN_CATEGORY, 1).exists());
}

#[tokio::test]
async fn a_single_worker_runs_jobs_one_at_a_time() {
    let report = ParallelDispatcher::new(1)
        .run((0..4).collect::<Vec<u32>>(), |_, n| async move {
            tokio::task::yield_now().await;
            Ok(n * 10)
        })
        .await;

    assert_eq!(report.max_in_flight, 1);
    let values: Vec<u32> = report
        .outcomes
        .into_iter()
        .filter_map(|o| match o {
            JobOutcome::Completed { value, .. } => Some(value),
            JobOutcome::Failed { .. } => None,
        })
        .collect();
    assert_eq!(values, vec![0, 10, 20, 30]);
}
