//! Application layer: job orchestration and the worker pool that runs jobs

pub mod dispatcher;
pub mod orchestrator;

pub use dispatcher::{DispatchReport, JobOutcome, ParallelDispatcher};
pub use orchestrator::{JobOrchestrator, ProductPage, extract_product_page};
