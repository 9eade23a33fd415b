//! Browser session abstraction
//!
//! A `Session` is one exclusively owned page-rendering context. Elements are
//! referenced through opaque `ElementHandle`s that become stale after the
//! next navigation or click, which bounds the handles a session holds to
//! those of the page currently shown.
//!
//! Two backends are provided:
//! - `webdriver`: a real browser driven over the WebDriver protocol
//! - `snapshot`: static HTML documents with scripted click transitions

pub mod snapshot;
pub mod wait;
pub mod webdriver;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub use snapshot::{SiteSnapshot, SnapshotFactory, SnapshotSession};
pub use wait::{wait_for_clickable, wait_for_visible, WaitPolicy};
pub use webdriver::{WebDriverFactory, WebDriverSession};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No element matches '{selector}'")]
    NotFound { selector: String },

    #[error("Timed out after {waited_ms}ms waiting for '{selector}'")]
    Timeout { selector: String, waited_ms: u64 },

    #[error("Stale element reference for '{selector}'")]
    StaleElement { selector: String },

    #[error("Element '{selector}' is not interactable")]
    NotInteractable { selector: String },

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Session could not be opened: {reason}")]
    Unavailable { reason: String },

    #[error("Driver error: {message}")]
    Driver { message: String },
}

impl SessionError {
    pub fn not_found(selector: &str) -> Self {
        Self::NotFound {
            selector: selector.to_string(),
        }
    }

    pub fn stale(selector: &str) -> Self {
        Self::StaleElement {
            selector: selector.to_string(),
        }
    }

    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Classify a raw driver message into the session taxonomy
    pub fn from_driver_message(selector: &str, message: &str) -> Self {
        let lower = message.to_lowercase();

        if lower.contains("stale element") {
            return Self::stale(selector);
        }
        if lower.contains("no such element") {
            return Self::not_found(selector);
        }
        if lower.contains("not interactable") || lower.contains("click intercepted") {
            return Self::NotInteractable {
                selector: selector.to_string(),
            };
        }
        if lower.contains("timeout") || lower.contains("timed out") {
            return Self::Timeout {
                selector: selector.to_string(),
                waited_ms: 0,
            };
        }

        Self::driver(message)
    }

    /// Not-found, timeout and stale references are routine on a page that
    /// renders asynchronously. Everything else is logged with full detail.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Timeout { .. } | Self::StaleElement { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NoSuchElement",
            Self::Timeout { .. } => "Timeout",
            Self::StaleElement { .. } => "StaleElementReference",
            Self::NotInteractable { .. } => "ElementNotInteractable",
            Self::Navigation { .. } => "Navigation",
            Self::Unavailable { .. } => "SessionUnavailable",
            Self::Driver { .. } => "Driver",
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Opaque reference to an element found in a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    id: usize,
    generation: u64,
    selector: String,
}

impl ElementHandle {
    pub fn new(id: usize, generation: u64, selector: impl Into<String>) -> Self {
        Self {
            id,
            generation,
            selector: selector.into(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Selector this element was found with
    pub fn selector(&self) -> &str {
        &self.selector
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.selector, self.id, self.generation)
    }
}

#[async_trait]
pub trait Session: Send {
    async fn goto(&mut self, url: &str) -> SessionResult<()>;

    /// All elements matching `selector` below `scope` (or the document), in DOM order.
    /// No match is `Ok(vec![])`.
    async fn find_all(
        &mut self,
        scope: Option<&ElementHandle>,
        selector: &str,
    ) -> SessionResult<Vec<ElementHandle>>;

    async fn text(&mut self, element: &ElementHandle) -> SessionResult<String>;

    async fn attribute(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> SessionResult<Option<String>>;

    async fn is_displayed(&mut self, element: &ElementHandle) -> SessionResult<bool>;

    async fn is_enabled(&mut self, element: &ElementHandle) -> SessionResult<bool>;

    async fn click(&mut self, element: &ElementHandle) -> SessionResult<()>;

    /// Release the underlying browser context
    async fn close(self: Box<Self>) -> SessionResult<()>;

    async fn find(
        &mut self,
        scope: Option<&ElementHandle>,
        selector: &str,
    ) -> SessionResult<ElementHandle> {
        self.find_all(scope, selector)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SessionError::not_found(selector))
    }
}

/// Opens a fresh session for every product visit.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> SessionResult<Box<dyn Session>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_message_classification() {
        let sel = "li#reviewInfo";
        assert_eq!(
            SessionError::from_driver_message(sel, "stale element reference: element is not attached"),
            SessionError::stale(sel)
        );
        assert_eq!(
            SessionError::from_driver_message(sel, "no such element: Unable to locate element"),
            SessionError::not_found(sel)
        );
        assert!(matches!(
            SessionError::from_driver_message(sel, "element click intercepted"),
            SessionError::NotInteractable { .. }
        ));
        assert!(matches!(
            SessionError::from_driver_message(sel, "chrome not reachable"),
            SessionError::Driver { .. }
        ));
    }

    #[test]
    fn test_expected_family() {
        assert!(SessionError::not_found("a").is_expected());
        assert!(SessionError::stale("a").is_expected());
        assert!(!SessionError::driver("boom").is_expected());
        assert!(
            !SessionError::Navigation {
                url: "http://x".into(),
                reason: "dns".into()
            }
            .is_expected()
        );
    }
}
