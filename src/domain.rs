//! Domain module - Records produced by the extraction engine
//!
//! Each module is its own file in the domain/ directory.
//! Public exports are defined here for convenience.

pub mod error_log;
pub mod job;
pub mod product;
pub mod review;

pub use error_log::{ErrorEntry, ErrorLog, ErrorReason};
pub use job::{JobSpec, JobSummary};
pub use product::{ProductInfo, ProductRecord};
pub use review::{ReviewRecord, ONLINE_PURCHASE_CHANNEL};
