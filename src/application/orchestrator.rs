//! Per-category job orchestration
//!
//! One job walks the product URLs of a category in order. Every URL gets a
//! fresh session that is closed on every path, including a panic inside the
//! extractors. Faults are recorded in the caller's `ErrorLog` and never stop
//! the job. A failed review table write is recorded the same way; only the
//! closing category tables can fail the job.

use anyhow::{Context, Result};
use chrono::Utc;
use futures::FutureExt;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::domain::{ErrorLog, ErrorReason, JobSpec, JobSummary, ProductRecord, ReviewRecord};
use crate::infrastructure::config::CrawlerConfig;
use crate::infrastructure::extraction::{
    FieldExtractor, extract_ingredients, extract_product_info, extract_reviews,
};
use crate::infrastructure::session::{Session, SessionFactory};
use crate::infrastructure::storage::CatalogStore;

/// Everything extracted from one product page
#[derive(Debug, Clone, PartialEq)]
pub struct ProductPage {
    pub record: ProductRecord,
    pub reviews: Vec<ReviewRecord>,
}

/// Run product info, ingredient and review extraction over an already loaded page.
///
/// A product info fault degrades to empty header fields and is recorded;
/// the page still yields exactly one `ProductRecord`.
pub async fn extract_product_page(
    session: &mut dyn Session,
    category: &str,
    url: &str,
    config: &CrawlerConfig,
    errors: &mut ErrorLog,
) -> ProductPage {
    let selectors = config.layout.selectors();
    let mut ex = FieldExtractor::new(session, url, config.field_wait());

    let info = match extract_product_info(&mut ex, selectors, config).await {
        Ok(info) => info,
        Err(e) => {
            if e.is_expected() {
                warn!("Product info unavailable for {}: {}", url, e);
            } else {
                error!("Unexpected error reading product info for {}: {}", url, e);
            }
            errors.record(url, ErrorReason::ProductInfo);
            Default::default()
        }
    };

    let ingredients = extract_ingredients(&mut ex, selectors, config, errors).await;

    let reviews = if config.collect_reviews {
        extract_reviews(&mut ex, selectors, config, &info, errors).await
    } else {
        Vec::new()
    };

    if ex.faults() > 0 {
        debug!("{} lookups degraded to defaults on {}", ex.faults(), url);
    }

    ProductPage {
        record: ProductRecord::new(category, url, info, ingredients),
        reviews,
    }
}

pub struct JobOrchestrator {
    sessions: Arc<dyn SessionFactory>,
    store: Arc<dyn CatalogStore>,
    config: CrawlerConfig,
}

impl JobOrchestrator {
    pub fn new(
        sessions: Arc<dyn SessionFactory>,
        store: Arc<dyn CatalogStore>,
        config: CrawlerConfig,
    ) -> Self {
        Self {
            sessions,
            store,
            config,
        }
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Visit every pending URL of `spec` and persist the category tables.
    ///
    /// `position` is the worker slot running this job, carried in log spans only.
    pub async fn run_job(
        &self,
        spec: &JobSpec,
        position: Option<usize>,
        errors: &mut ErrorLog,
    ) -> Result<JobSummary> {
        let span = info_span!("job", category = %spec.category, position = ?position);
        self.run_job_inner(spec, errors).instrument(span).await
    }

    async fn run_job_inner(&self, spec: &JobSpec, errors: &mut ErrorLog) -> Result<JobSummary> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let errors_before = errors.len();
        let total = spec.pending_count();
        info!("Starting job {}", spec);

        let mut products = Vec::with_capacity(total);
        let mut reviewers = BTreeSet::new();
        let mut review_total = 0;
        let mut skipped_urls = 0;

        for (visited, (product_num, url)) in spec.pending().enumerate() {
            info!("[{}/{}] Visiting product #{}: {}", visited + 1, total, product_num, url);

            let span = info_span!("product", num = product_num, url = %url);
            let Some(page) = self.visit(&spec.category, url, errors).instrument(span).await else {
                skipped_urls += 1;
                continue;
            };

            let ProductPage { record, reviews } = page;
            review_total += reviews.len();
            reviewers.extend(reviews.iter().filter_map(|r| r.user_code.clone()));
            if self.config.collect_reviews {
                let category = spec.category.clone();
                let saved = self
                    .persist(move |store| store.save_reviews(&category, product_num, &reviews))
                    .await;
                if let Err(e) = saved {
                    error!("Failed to save reviews of product #{} ({}): {:#}", product_num, url, e);
                    errors.record(url, ErrorReason::Persistence);
                }
            }
            products.push(record);

            sleep(self.config.cooldown()).await;
        }

        let product_total = products.len();
        let reviewer_total = reviewers.len();
        let category = spec.category.clone();
        self.persist(move |store| store.save_products(&category, &products))
            .await
            .context("Failed to save product table")?;
        if self.config.collect_reviews {
            let category = spec.category.clone();
            self.persist(move |store| store.save_reviewers(&category, &reviewers))
                .await
                .context("Failed to save reviewer list")?;
        }

        let summary = JobSummary {
            category: spec.category.clone(),
            products: product_total,
            reviews: review_total,
            reviewers: reviewer_total,
            skipped_urls,
            errors: errors.len() - errors_before,
            started_at,
            elapsed: timer.elapsed(),
        };
        info!(
            "Finished job {}: {} products, {} reviews, {} reviewers, {} skipped, {} errors in {:?}",
            summary.category,
            summary.products,
            summary.reviews,
            summary.reviewers,
            summary.skipped_urls,
            summary.errors,
            summary.elapsed
        );
        Ok(summary)
    }

    /// Run a blocking store write off the async worker threads
    async fn persist<T, F>(&self, write: F) -> Result<T>
    where
        F: FnOnce(&dyn CatalogStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || write(store.as_ref()))
            .await
            .context("Store write task failed")?
    }

    /// Open, load, extract, close. `None` when the page never loaded.
    async fn visit(&self, category: &str, url: &str, errors: &mut ErrorLog) -> Option<ProductPage> {
        let mut session = match self.sessions.open().await {
            Ok(session) => session,
            Err(e) => {
                error!("Could not open a session for {}: {}", url, e);
                errors.record(url, ErrorReason::SessionOpen);
                return None;
            }
        };

        let page = match session.goto(url).await {
            Ok(()) => {
                let extraction = extract_product_page(
                    session.as_mut(),
                    category,
                    url,
                    &self.config,
                    errors,
                );
                match AssertUnwindSafe(extraction).catch_unwind().await {
                    Ok(page) => Some(page),
                    Err(_) => {
                        error!("Extraction panicked on {}", url);
                        errors.record(url, ErrorReason::PageLoad);
                        None
                    }
                }
            }
            Err(e) => {
                error!("Could not load {}: {}", url, e);
                errors.record(url, ErrorReason::PageLoad);
                None
            }
        };

        if let Err(e) = session.close().await {
            warn!("Failed to close session for {}: {}", url, e);
        }
        page
    }
}
