//! Non-fatal extraction faults collected during a job
//!
//! The log is an explicit accumulator owned by whoever runs the job and
//! passed down to the extractors by `&mut`. Entries are only ever appended.

use serde::Serialize;
use std::fmt;

/// Phase tag recorded with every error entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum ErrorReason {
    ProductInfo,
    Ingredients,
    ReviewCount,
    PageNavigation { page: u32 },
    ReviewExtraction { page: u32, review: usize },
    SessionOpen,
    PageLoad,
    Persistence,
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProductInfo => write!(f, "product info error"),
            Self::Ingredients => write!(f, "ingredients error"),
            Self::ReviewCount => write!(f, "review count error"),
            Self::PageNavigation { page } => write!(f, "navigating to page error on {page}"),
            Self::ReviewExtraction { page, review } => {
                write!(f, "extracting review error review[{review}] on page {page}")
            }
            Self::SessionOpen => write!(f, "session error"),
            Self::PageLoad => write!(f, "page load error"),
            Self::Persistence => write!(f, "saving error"),
        }
    }
}

impl From<ErrorReason> for String {
    fn from(reason: ErrorReason) -> Self {
        reason.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    pub url: String,
    pub reason: ErrorReason,
}

#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    entries: Vec<ErrorEntry>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, url: impl Into<String>, reason: ErrorReason) {
        self.entries.push(ErrorEntry {
            url: url.into(),
            reason,
        });
    }

    /// Move every entry of `other` to the end of this log
    pub fn absorb(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[ErrorEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_matching(&self, reason: &ErrorReason) -> usize {
        self.entries.iter().filter(|e| &e.reason == reason).count()
    }
}
