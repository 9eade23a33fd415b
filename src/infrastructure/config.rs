//! Configuration infrastructure
//!
//! Settings are layered in this order, later sources winning:
//! 1. Built-in defaults (`defaults` module)
//! 2. JSON config file (optional)
//! 3. `HARVESTER__SECTION__KEY` environment variables

#![allow(clippy::derivable_impls)]

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::info;

use crate::infrastructure::extraction::selectors::PageLayout;
use crate::infrastructure::session::WaitPolicy;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub crawler: CrawlerConfig,
    pub webdriver: WebDriverConfig,
    pub dispatcher: DispatcherConfig,
    pub output: OutputConfig,
    pub discovery: DiscoveryConfig,
    pub logging: LoggingConfig,
}

/// Timeouts, pacing and bounds for one product visit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum review pages visited per product
    pub review_page_cap: u32,

    /// Reviews rendered per review page
    pub reviews_per_page: u32,

    /// Default visibility wait for field lookups
    pub wait_timeout_ms: u64,

    /// Wait for the product info containers
    pub container_timeout_ms: u64,

    /// Wait for the ingredient / review tab controls
    pub tab_click_timeout_ms: u64,

    /// Wait for a page number control
    pub page_click_timeout_ms: u64,

    pub poll_interval_ms: u64,

    /// Pause after a page transition before reading the DOM again
    pub settle_interval_ms: u64,

    /// Pause after each product visit
    pub cooldown_ms: u64,

    /// Pause after each product visit when reviews are skipped
    pub product_info_cooldown_ms: u64,

    /// Run review pagination (false = product table only)
    pub collect_reviews: bool,

    pub layout: PageLayout,
}

/// WebDriver connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverConfig {
    pub server_url: String,
    pub browser_args: Vec<String>,
}

/// Worker pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Concurrent jobs; 0 means one per logical core
    pub max_workers: usize,
}

/// Output tables location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub root_dir: PathBuf,
}

/// Best-list URL discovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Listing endpoint; `{category_no}` is replaced per category
    pub best_list_url: String,
    pub categories: Vec<CategoryEntry>,
    pub request_timeout_seconds: u64,
    pub request_delay_ms: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub name: String,
    pub code: String,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted file logs
    pub json_format: bool,

    pub console_output: bool,

    pub file_output: bool,

    /// Log directory; empty means `logs/` next to the executable
    pub log_dir: String,

    pub file_name: String,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,

    /// Enable automatic log cleanup on startup
    pub auto_cleanup_logs: bool,

    /// Keep only the most recent log file (delete all others)
    pub keep_only_latest: bool,

    /// Module-specific log level filters (e.g., "thirtyfour": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            webdriver: WebDriverConfig::default(),
            dispatcher: DispatcherConfig::default(),
            output: OutputConfig::default(),
            discovery: DiscoveryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            review_page_cap: defaults::REVIEW_PAGE_CAP,
            reviews_per_page: defaults::REVIEWS_PER_PAGE,
            wait_timeout_ms: defaults::WAIT_TIMEOUT_MS,
            container_timeout_ms: defaults::CONTAINER_TIMEOUT_MS,
            tab_click_timeout_ms: defaults::TAB_CLICK_TIMEOUT_MS,
            page_click_timeout_ms: defaults::PAGE_CLICK_TIMEOUT_MS,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            settle_interval_ms: defaults::SETTLE_INTERVAL_MS,
            cooldown_ms: defaults::COOLDOWN_MS,
            product_info_cooldown_ms: defaults::PRODUCT_INFO_COOLDOWN_MS,
            collect_reviews: true,
            layout: PageLayout::Current,
        }
    }
}

impl CrawlerConfig {
    /// Settings of the earlier page layout: 10 page cap, 2s settle
    pub fn legacy() -> Self {
        Self {
            review_page_cap: defaults::LEGACY_REVIEW_PAGE_CAP,
            settle_interval_ms: defaults::LEGACY_SETTLE_INTERVAL_MS,
            layout: PageLayout::Legacy,
            ..Self::default()
        }
    }

    fn policy(&self, timeout_ms: u64) -> WaitPolicy {
        WaitPolicy::new(
            Duration::from_millis(timeout_ms),
            Duration::from_millis(self.poll_interval_ms),
        )
    }

    pub fn field_wait(&self) -> WaitPolicy {
        self.policy(self.wait_timeout_ms)
    }

    pub fn container_wait(&self) -> WaitPolicy {
        self.policy(self.container_timeout_ms)
    }

    pub fn tab_click_wait(&self) -> WaitPolicy {
        self.policy(self.tab_click_timeout_ms)
    }

    pub fn page_click_wait(&self) -> WaitPolicy {
        self.policy(self.page_click_timeout_ms)
    }

    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_interval_ms)
    }

    /// Courtesy delay after one product visit
    pub fn cooldown(&self) -> Duration {
        if self.collect_reviews {
            Duration::from_millis(self.cooldown_ms)
        } else {
            Duration::from_millis(self.product_info_cooldown_ms)
        }
    }
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            server_url: defaults::WEBDRIVER_URL.to_string(),
            browser_args: defaults::BROWSER_ARGS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { max_workers: 0 }
    }
}

impl DispatcherConfig {
    pub fn resolved_workers(&self) -> usize {
        if self.max_workers > 0 {
            return self.max_workers;
        }
        std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from(defaults::OUTPUT_ROOT),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            best_list_url: defaults::BEST_LIST_URL.to_string(),
            categories: defaults::CATEGORIES
                .iter()
                .map(|(name, code)| CategoryEntry {
                    name: (*name).to_string(),
                    code: (*code).to_string(),
                })
                .collect(),
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            request_delay_ms: defaults::DISCOVERY_DELAY_MS,
            user_agent: defaults::USER_AGENT.to_string(),
        }
    }
}

impl DiscoveryConfig {
    pub fn listing_url(&self, category: &CategoryEntry) -> String {
        self.best_list_url.replace("{category_no}", &category.code)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: true,
            log_dir: String::new(),
            file_name: defaults::LOG_FILE_NAME.to_string(),
            max_files: defaults::LOG_MAX_FILES,
            auto_cleanup_logs: true,
            keep_only_latest: false,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("thirtyfour".to_string(), "warn".to_string());
                filters.insert("reqwest".to_string(), "info".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("tokio".to_string(), "info".to_string());
                filters.insert("review_harvester_lib".to_string(), "info".to_string());
                filters
            },
        }
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME);

        Ok(config_dir)
    }

    /// Manager over the per-user config file
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join(defaults::CONFIG_FILE_NAME);
        Ok(Self { config_path })
    }

    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Explicit path if given, per-user file otherwise
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Ok(Self::with_path(path)),
            None => Self::new(),
        }
    }

    /// Load configuration: defaults, then the file if present, then environment
    pub fn load_config(&self) -> Result<AppConfig> {
        let base = config::Config::try_from(&AppConfig::default())
            .context("Failed to serialize default configuration")?;

        let layered = config::Config::builder()
            .add_source(base)
            .add_source(
                config::File::from(self.config_path.as_path())
                    .format(config::FileFormat::Json)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {:?}", self.config_path))?;

        let config: AppConfig = layered
            .try_deserialize()
            .context("Configuration has invalid values")?;

        if self.config_path.exists() {
            info!("Loaded configuration from: {:?}", self.config_path);
        } else {
            info!("No configuration file at {:?}, using defaults", self.config_path);
        }
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "review-harvester";
    pub const CONFIG_FILE_NAME: &str = "config.json";
    pub const ENV_PREFIX: &str = "HARVESTER";

    pub const REVIEW_PAGE_CAP: u32 = 100;
    pub const LEGACY_REVIEW_PAGE_CAP: u32 = 10;
    pub const REVIEWS_PER_PAGE: u32 = 10;

    pub const WAIT_TIMEOUT_MS: u64 = 10_000;
    pub const CONTAINER_TIMEOUT_MS: u64 = 20_000;
    pub const TAB_CLICK_TIMEOUT_MS: u64 = 20_000;
    pub const PAGE_CLICK_TIMEOUT_MS: u64 = 10_000;
    pub const POLL_INTERVAL_MS: u64 = 500;
    pub const SETTLE_INTERVAL_MS: u64 = 1_500;
    pub const LEGACY_SETTLE_INTERVAL_MS: u64 = 2_000;
    pub const COOLDOWN_MS: u64 = 2_000;
    pub const PRODUCT_INFO_COOLDOWN_MS: u64 = 5_000;

    pub const WEBDRIVER_URL: &str = "http://localhost:9515";
    pub const BROWSER_ARGS: &[&str] = &[
        "--headless",
        "--window-size=1920,1080",
        "--disable-gpu",
        "--disable-infobars",
        "--no-sandbox",
        "--disable-blink-features=AutomationControlled",
    ];

    pub const OUTPUT_ROOT: &str = "data";

    pub const BEST_LIST_URL: &str = "https://www.oliveyoung.co.kr/store/main/getBestList.do?dispCatNo=900000100100001&fltDispCatNo={category_no}";
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 100;
    pub const DISCOVERY_DELAY_MS: u64 = 2_000;
    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

    /// (category name, listing category number)
    pub const CATEGORIES: &[(&str, &str)] = &[
        ("선케어", "10000010011"),
        ("메이크업", "10000010002"),
        ("미용소품", "10000010006"),
        ("더모코스메틱", "10000010008"),
        ("맨즈케어", "10000010007"),
        ("헤어케어", "10000010004"),
        ("바디케어", "10000010003"),
        ("스킨케어", "10000010001"),
        ("마스크팩", "10000010009"),
        ("클렌징", "10000010010"),
    ];

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_FILE_NAME: &str = "review-harvester.log";
    pub const LOG_MAX_FILES: u32 = 10;
}
