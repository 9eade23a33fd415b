//! Infrastructure layer: browser sessions, DOM extraction, persistence and configuration

pub mod config;
pub mod extraction;
pub mod job_input;
pub mod logging;
pub mod session;
pub mod storage;
pub mod url_discovery;

pub use config::{AppConfig, ConfigManager, CrawlerConfig};
pub use logging::{get_log_directory, init_logging_with_config, log_system_info};
pub use session::{Session, SessionError, SessionFactory, SnapshotFactory, WebDriverFactory};
pub use storage::{CatalogStore, CsvCatalogStore};
pub use url_discovery::UrlDiscovery;
