//! Product URL discovery from category best-seller listings
//!
//! Listing pages are static HTML, so a plain HTTP fetch is enough here;
//! the browser session is reserved for product pages.

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use reqwest::{Client, ClientBuilder};
use scraper::{Html, Selector};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::domain::JobSpec;
use crate::infrastructure::config::{CategoryEntry, DiscoveryConfig};
use crate::infrastructure::job_input::write_job_file;

static PRODUCT_BLOCK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.prd_info").expect("product block selector is valid"));
static PRODUCT_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("product link selector is valid"));

pub const ALL_PRODUCTS_FILE: &str = "all_products_url.csv";

/// First link of every product block, resolved against `base`
pub fn parse_product_links(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();
    for block in document.select(&PRODUCT_BLOCK) {
        let Some(href) = block
            .select(&PRODUCT_LINK)
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            continue;
        };
        match base.join(href.trim()) {
            Ok(url) => links.push(url.to_string()),
            Err(e) => warn!("Skipping unparsable product link '{}': {}", href, e),
        }
    }
    links
}

pub struct UrlDiscovery {
    client: Client,
    config: DiscoveryConfig,
}

impl UrlDiscovery {
    pub fn new(config: DiscoveryConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(&config.user_agent)
            .cookie_store(true)
            .gzip(true)
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(Self { client, config })
    }

    pub async fn fetch_category(&self, category: &CategoryEntry) -> Result<Vec<String>> {
        let listing = self.config.listing_url(category);
        let base = Url::parse(&listing).with_context(|| format!("Invalid listing url {listing}"))?;

        debug!("Fetching listing for {}: {}", category.name, listing);
        let body = self
            .client
            .get(base.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .with_context(|| format!("Request failed for {listing}"))?
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read response body: {}", e))?;

        Ok(parse_product_links(&body, &base))
    }

    /// One job per configured category; a failed category is logged and left out
    pub async fn discover_all(&self) -> Vec<JobSpec> {
        let mut jobs = Vec::with_capacity(self.config.categories.len());
        for (index, category) in self.config.categories.iter().enumerate() {
            if index > 0 {
                sleep(Duration::from_millis(self.config.request_delay_ms)).await;
            }
            match self.fetch_category(category).await {
                Ok(urls) => {
                    info!("Found {} product urls for {}", urls.len(), category.name);
                    jobs.push(JobSpec::new(category.name.clone(), urls));
                }
                Err(e) => error!("URL discovery failed for {}: {:#}", category.name, e),
            }
        }
        jobs
    }
}

/// `url/url_<i>.csv` per job plus the combined table at the root
pub fn write_discovered(root: &Path, jobs: &[JobSpec]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(jobs.len() + 1);
    for (index, job) in jobs.iter().enumerate() {
        let path = root.join("url").join(format!("url_{index}.csv"));
        write_job_file(&path, std::slice::from_ref(job))?;
        written.push(path);
    }
    let combined = root.join(ALL_PRODUCTS_FILE);
    write_job_file(&combined, jobs)?;
    written.push(combined);
    Ok(written)
}
