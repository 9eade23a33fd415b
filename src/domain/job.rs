use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Input for one orchestrator run: a category and its product URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub category: String,
    pub urls: Vec<String>,
    /// Index of the first URL to visit; also the first product number
    pub start_offset: usize,
}

impl JobSpec {
    pub fn new(category: impl Into<String>, urls: Vec<String>) -> Self {
        Self {
            category: category.into(),
            urls,
            start_offset: 0,
        }
    }

    pub fn with_start_offset(mut self, start_offset: usize) -> Self {
        self.start_offset = start_offset;
        self
    }

    /// URLs still to visit, paired with their product number
    pub fn pending(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.urls
            .iter()
            .enumerate()
            .skip(self.start_offset)
            .map(|(n, url)| (n, url.as_str()))
    }

    pub fn pending_count(&self) -> usize {
        self.urls.len().saturating_sub(self.start_offset)
    }
}

impl fmt::Display for JobSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} urls from #{})",
            self.category,
            self.pending_count(),
            self.start_offset
        )
    }
}

/// Outcome of one orchestrator run.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub category: String,
    pub products: usize,
    pub reviews: usize,
    pub reviewers: usize,
    pub skipped_urls: usize,
    pub errors: usize,
    pub started_at: DateTime<Utc>,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}
