//! Command handlers behind the CLI subcommands
//!
//! `crawl` and `dispatch` write the global error table exactly once, after
//! all work has finished or failed.

use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use crate::application::{JobOrchestrator, ParallelDispatcher, extract_product_page};
use crate::cli::{CrawlArgs, CrawlOptions, DispatchArgs, ReplayArgs};
use crate::domain::{ErrorLog, JobSummary};
use crate::infrastructure::config::{AppConfig, ConfigManager, CrawlerConfig, defaults};
use crate::infrastructure::extraction::PageLayout;
use crate::infrastructure::job_input::{list_job_files, read_job_file};
use crate::infrastructure::session::{
    Session, SessionFactory, SiteSnapshot, SnapshotSession, WebDriverFactory,
};
use crate::infrastructure::storage::{CatalogStore, CsvCatalogStore};
use crate::infrastructure::url_discovery::{UrlDiscovery, write_discovered};

/// Apply the crawl flags on top of the loaded crawler settings
pub fn crawler_settings(base: &CrawlerConfig, options: &CrawlOptions) -> CrawlerConfig {
    let mut crawler = base.clone();
    if options.legacy_layout {
        crawler.layout = PageLayout::Legacy;
        crawler.review_page_cap = defaults::LEGACY_REVIEW_PAGE_CAP;
        crawler.settle_interval_ms = defaults::LEGACY_SETTLE_INTERVAL_MS;
    }
    if options.product_info_only {
        crawler.collect_reviews = false;
    }
    crawler
}

fn build_orchestrator(
    config: &AppConfig,
    options: &CrawlOptions,
) -> (JobOrchestrator, Arc<CsvCatalogStore>) {
    let mut webdriver = config.webdriver.clone();
    if let Some(url) = &options.webdriver_url {
        webdriver.server_url = url.clone();
    }
    let sessions: Arc<dyn SessionFactory> = Arc::new(WebDriverFactory::new(webdriver));
    let store = Arc::new(CsvCatalogStore::new(&config.output.root_dir));
    let crawler = crawler_settings(&config.crawler, options);
    info!(
        "Crawler: layout={:?}, page cap={}, reviews={}",
        crawler.layout, crawler.review_page_cap, crawler.collect_reviews
    );
    (JobOrchestrator::new(sessions, store.clone(), crawler), store)
}

async fn flush_errors(store: Arc<CsvCatalogStore>, errors: ErrorLog) {
    let entries = errors.len();
    match tokio::task::spawn_blocking(move || store.save_errors(&errors)).await {
        Ok(Ok(path)) => info!("Error table ({} entries) written to {}", entries, path.display()),
        Ok(Err(e)) => error!("Failed to write error table: {:#}", e),
        Err(e) => error!("Error table write task failed: {}", e),
    }
}

pub async fn crawl(config: &AppConfig, args: &CrawlArgs) -> Result<Vec<JobSummary>> {
    let (orchestrator, store) = build_orchestrator(config, &args.options);
    let mut errors = ErrorLog::new();

    let outcome = crawl_file(
        &orchestrator,
        &args.job_file,
        args.options.start,
        args.position,
        &mut errors,
    )
    .await;

    flush_errors(store, errors).await;
    outcome
}

async fn crawl_file(
    orchestrator: &JobOrchestrator,
    path: &Path,
    start: usize,
    position: Option<usize>,
    errors: &mut ErrorLog,
) -> Result<Vec<JobSummary>> {
    let jobs = read_job_file(path, start)?;
    let mut summaries = Vec::with_capacity(jobs.len());
    for spec in &jobs {
        summaries.push(orchestrator.run_job(spec, position, errors).await?);
    }
    Ok(summaries)
}

struct JobFile(PathBuf);

impl fmt::Display for JobFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

pub async fn dispatch(config: &AppConfig, args: &DispatchArgs) -> Result<usize> {
    let (orchestrator, store) = build_orchestrator(config, &args.options);
    let orchestrator = Arc::new(orchestrator);
    let collected = Arc::new(Mutex::new(ErrorLog::new()));

    let outcome = async {
        let files = list_job_files(&args.url_dir)?;
        if files.is_empty() {
            bail!("No job files found in {}", args.url_dir.display());
        }

        let dispatcher = match args.workers {
            Some(workers) => ParallelDispatcher::new(workers),
            None => ParallelDispatcher::from_config(&config.dispatcher),
        };
        let start = args.options.start;
        let sink = Arc::clone(&collected);
        let report = dispatcher
            .run(files.into_iter().map(JobFile).collect(), move |position, file| {
                let orchestrator = Arc::clone(&orchestrator);
                let sink = Arc::clone(&sink);
                async move {
                    let mut errors = ErrorLog::new();
                    let result =
                        crawl_file(&orchestrator, &file.0, start, Some(position), &mut errors).await;
                    match sink.lock() {
                        Ok(mut all) => all.absorb(errors),
                        Err(_) => warn!("Error collector poisoned; dropping {} entries", errors.len()),
                    }
                    result
                }
            })
            .await;

        for outcome in &report.outcomes {
            if !outcome.is_completed() {
                warn!("Job file {} did not complete", outcome.label());
            }
        }
        Ok::<usize, anyhow::Error>(report.failed)
    }
    .await;

    let errors = match collected.lock() {
        Ok(errors) => Some(errors.clone()),
        Err(_) => None,
    };
    match errors {
        Some(errors) => flush_errors(store, errors).await,
        None => error!("Error collector poisoned; error table not written"),
    }
    outcome
}

pub async fn discover(config: &AppConfig) -> Result<Vec<PathBuf>> {
    let discovery = UrlDiscovery::new(config.discovery.clone())?;
    let jobs = discovery.discover_all().await;
    if jobs.is_empty() {
        bail!("No category listing could be fetched");
    }
    let written = write_discovered(&config.output.root_dir, &jobs)?;
    info!("Wrote {} url files under {}", written.len(), config.output.root_dir.display());
    Ok(written)
}

/// Crawler settings for static snapshots: short waits, no pacing
pub fn replay_settings(base: &CrawlerConfig, args: &ReplayArgs) -> CrawlerConfig {
    let mut crawler = base.clone();
    crawler.wait_timeout_ms = args.wait_ms;
    crawler.container_timeout_ms = args.wait_ms;
    crawler.tab_click_timeout_ms = args.wait_ms;
    crawler.page_click_timeout_ms = args.wait_ms;
    crawler.poll_interval_ms = crawler.poll_interval_ms.min(args.wait_ms.max(1));
    crawler.settle_interval_ms = 0;
    crawler.cooldown_ms = 0;
    crawler.collect_reviews = true;
    if args.legacy_layout {
        crawler.layout = PageLayout::Legacy;
        crawler.review_page_cap = defaults::LEGACY_REVIEW_PAGE_CAP;
    }
    crawler
}

pub async fn replay(config: &AppConfig, args: &ReplayArgs) -> Result<serde_json::Value> {
    let crawler = replay_settings(&config.crawler, args);
    let selectors = crawler.layout.selectors();

    let mut pages = Vec::with_capacity(args.pages.len());
    for path in &args.pages {
        pages.push(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read snapshot {}", path.display()))?,
        );
    }

    let site = SiteSnapshot::paginated(pages, |n| selectors.page_link(n));
    let mut session = SnapshotSession::new(Arc::new(HashMap::from([(args.url.clone(), site)])));
    session.goto(&args.url).await?;

    let mut errors = ErrorLog::new();
    let page = extract_product_page(&mut session, &args.category, &args.url, &crawler, &mut errors).await;
    info!(
        "Replayed {} pages: {} reviews, {} errors",
        args.pages.len(),
        page.reviews.len(),
        errors.len()
    );

    Ok(serde_json::json!({
        "product": page.record,
        "reviews": page.reviews,
        "errors": errors.entries(),
    }))
}

pub async fn init_config(path: Option<&Path>, force: bool) -> Result<PathBuf> {
    let manager = ConfigManager::resolve(path)?;
    if manager.config_path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite",
            manager.config_path.display()
        );
    }
    manager.save_config(&AppConfig::default()).await?;
    Ok(manager.config_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options(product_info_only: bool, legacy_layout: bool) -> CrawlOptions {
        CrawlOptions {
            product_info_only,
            legacy_layout,
            ..CrawlOptions::default()
        }
    }

    #[test]
    fn test_flags_override_crawler_settings() {
        let base = CrawlerConfig::default();

        let plain = crawler_settings(&base, &options(false, false));
        assert_eq!(plain.review_page_cap, 100);
        assert!(plain.collect_reviews);

        let legacy = crawler_settings(&base, &options(true, true));
        assert_eq!(legacy.layout, PageLayout::Legacy);
        assert_eq!(legacy.review_page_cap, 10);
        assert_eq!(legacy.settle_interval_ms, 2_000);
        assert!(!legacy.collect_reviews);
    }

    #[tokio::test]
    async fn test_replay_reports_records_and_errors() {
        let dir = TempDir::new().unwrap();
        let page = dir.path().join("page1.html");
        std::fs::write(&page, "<html><body><p>empty product</p></body></html>").unwrap();

        let args = ReplayArgs {
            pages: vec![page],
            category: "선케어".into(),
            url: "replay://product".into(),
            wait_ms: 20,
            legacy_layout: false,
        };
        let value = replay(&AppConfig::default(), &args).await.unwrap();

        assert_eq!(value["product"]["category"], "선케어");
        assert_eq!(value["product"]["url"], "replay://product");
        assert_eq!(value["reviews"].as_array().unwrap().len(), 0);
        let reasons: Vec<_> = value["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["reason"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(reasons, vec!["product info error", "ingredients error", "review count error"]);
    }

    #[tokio::test]
    async fn test_init_config_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        assert_eq!(init_config(Some(path.as_path()), false).await.unwrap(), path);
        assert!(init_config(Some(path.as_path()), false).await.is_err());
        assert!(init_config(Some(path.as_path()), true).await.is_ok());
    }
}
