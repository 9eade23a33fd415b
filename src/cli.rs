//! Command-line interface

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "review-harvester",
    version,
    about = "Fault-tolerant product and review extraction for e-commerce catalogs"
)]
pub struct Cli {
    /// Configuration file (JSON); defaults to the per-user config file
    #[arg(long, global = true, env = "HARVESTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output root directory, overriding the configuration
    #[arg(long, global = true)]
    pub output: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Crawl every category of one job file
    Crawl(CrawlArgs),
    /// Crawl every job file of a directory on a worker pool
    Dispatch(DispatchArgs),
    /// Collect product URLs from the category best-seller listings
    Discover,
    /// Run the extractors over saved HTML pages and print the records as JSON
    Replay(ReplayArgs),
    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Options shared by `crawl` and `dispatch`
#[derive(Args, Debug, Clone, Default)]
pub struct CrawlOptions {
    /// Index of the first URL to visit in every category column
    #[arg(long, default_value_t = 0)]
    pub start: usize,

    /// Product table only; skip review pagination
    #[arg(long)]
    pub product_info_only: bool,

    /// Use selectors and pacing of the earlier page layout
    #[arg(long)]
    pub legacy_layout: bool,

    /// WebDriver server URL, overriding the configuration
    #[arg(long, env = "HARVESTER_WEBDRIVER_URL")]
    pub webdriver_url: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CrawlArgs {
    /// Job file: one column per category, one product URL per cell
    pub job_file: PathBuf,

    /// Worker position reported in progress logs
    #[arg(long)]
    pub position: Option<usize>,

    #[command(flatten)]
    pub options: CrawlOptions,
}

#[derive(Args, Debug, Clone)]
pub struct DispatchArgs {
    /// Directory of job files
    pub url_dir: PathBuf,

    /// Pool size; defaults to the configured value or the logical core count
    #[arg(long)]
    pub workers: Option<usize>,

    #[command(flatten)]
    pub options: CrawlOptions,
}

#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// Saved product page states, review page 1 first
    #[arg(required = true)]
    pub pages: Vec<PathBuf>,

    #[arg(long)]
    pub category: String,

    /// URL recorded in the product record
    #[arg(long, default_value = "replay://product")]
    pub url: String,

    /// Visibility wait for elements missing from the snapshot
    #[arg(long, default_value_t = 1_000)]
    pub wait_ms: u64,

    #[arg(long)]
    pub legacy_layout: bool,
}
