//! Total-function field lookups
//!
//! Every lookup either yields a value or the type's default (`None` / empty
//! `Vec`). A failed lookup is logged once with its selector and page URL
//! and counted; the fault itself never reaches the caller.
//!
//! A visibility wait that times out is counted as the lookup's fault, and the
//! query still runs: elements present but not yet visible are returned.

use tracing::{error, warn};

use crate::infrastructure::session::{
    wait_for_clickable, wait_for_visible, ElementHandle, Session, SessionError, SessionResult,
    WaitPolicy,
};

/// Whether to wait for visibility before querying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Query immediately
    Skip,
    /// Wait with the extractor's default policy
    Visible,
    /// Wait with an explicit policy
    Within(WaitPolicy),
}

pub struct FieldExtractor<'s> {
    session: &'s mut dyn Session,
    url: &'s str,
    default_wait: WaitPolicy,
    faults: usize,
}

impl<'s> FieldExtractor<'s> {
    pub fn new(session: &'s mut dyn Session, url: &'s str, default_wait: WaitPolicy) -> Self {
        Self {
            session,
            url,
            default_wait,
            faults: 0,
        }
    }

    pub fn url(&self) -> &str {
        self.url
    }

    /// Failed lookups so far
    pub fn faults(&self) -> usize {
        self.faults
    }

    pub fn default_wait(&self) -> WaitPolicy {
        self.default_wait
    }

    /// Trimmed text of the first match
    pub async fn text(
        &mut self,
        scope: Option<&ElementHandle>,
        selector: &str,
        wait: Wait,
    ) -> Option<String> {
        let (timed_out, found) = self.try_element(scope, selector, wait).await;
        let result = match found {
            Ok(element) => self.session.text(&element).await,
            Err(e) => Err(e),
        };
        self.settle(selector, result.map(|t| t.trim().to_string()), timed_out)
    }

    pub async fn element(
        &mut self,
        scope: Option<&ElementHandle>,
        selector: &str,
        wait: Wait,
    ) -> Option<ElementHandle> {
        let (timed_out, result) = self.try_element(scope, selector, wait).await;
        self.settle(selector, result, timed_out)
    }

    /// Trimmed text of every match, in DOM order
    pub async fn texts(
        &mut self,
        scope: Option<&ElementHandle>,
        selector: &str,
        wait: Wait,
    ) -> Vec<String> {
        let (timed_out, result) = self.try_texts(scope, selector, wait).await;
        self.settle(selector, result, timed_out).unwrap_or_default()
    }

    pub async fn elements(
        &mut self,
        scope: Option<&ElementHandle>,
        selector: &str,
        wait: Wait,
    ) -> Vec<ElementHandle> {
        let (timed_out, result) = self.try_elements(scope, selector, wait).await;
        self.settle(selector, result, timed_out).unwrap_or_default()
    }

    /// Trimmed text of an element already in hand
    pub async fn text_of(&mut self, element: &ElementHandle) -> Option<String> {
        let result = self.session.text(element).await;
        self.settle(element.selector(), result.map(|t| t.trim().to_string()), false)
    }

    pub async fn attribute(&mut self, element: &ElementHandle, name: &str) -> Option<String> {
        let result = self.session.attribute(element, name).await;
        self.settle(element.selector(), result, false).flatten()
    }

    /// Wait for `selector` anywhere in the document; the caller decides what a timeout means
    pub async fn wait_visible(&mut self, selector: &str, policy: WaitPolicy) -> SessionResult<()> {
        wait_for_visible(&mut *self.session, None, selector, policy)
            .await
            .map(|_| ())
    }

    /// Wait until `selector` is clickable, then click it
    pub async fn click_when_clickable(
        &mut self,
        selector: &str,
        policy: WaitPolicy,
    ) -> SessionResult<()> {
        let element = wait_for_clickable(&mut *self.session, selector, policy).await?;
        self.session.click(&element).await
    }

    fn policy(&self, wait: Wait) -> Option<WaitPolicy> {
        match wait {
            Wait::Skip => None,
            Wait::Visible => Some(self.default_wait),
            Wait::Within(policy) => Some(policy),
        }
    }

    /// `Ok(true)` when the wait timed out; that timeout is already logged and counted
    async fn await_visible(
        &mut self,
        scope: Option<&ElementHandle>,
        selector: &str,
        wait: Wait,
    ) -> SessionResult<bool> {
        let Some(policy) = self.policy(wait) else {
            return Ok(false);
        };
        match wait_for_visible(&mut *self.session, scope, selector, policy).await {
            Ok(_) => Ok(false),
            Err(e @ SessionError::Timeout { .. }) => {
                self.faults += 1;
                warn!("{} exception for {} at {}; querying anyway", e.kind(), selector, self.url);
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    async fn try_element(
        &mut self,
        scope: Option<&ElementHandle>,
        selector: &str,
        wait: Wait,
    ) -> (bool, SessionResult<ElementHandle>) {
        match self.await_visible(scope, selector, wait).await {
            Ok(timed_out) => (timed_out, self.session.find(scope, selector).await),
            Err(e) => (false, Err(e)),
        }
    }

    async fn try_elements(
        &mut self,
        scope: Option<&ElementHandle>,
        selector: &str,
        wait: Wait,
    ) -> (bool, SessionResult<Vec<ElementHandle>>) {
        match self.await_visible(scope, selector, wait).await {
            Ok(timed_out) => (timed_out, self.session.find_all(scope, selector).await),
            Err(e) => (false, Err(e)),
        }
    }

    async fn try_texts(
        &mut self,
        scope: Option<&ElementHandle>,
        selector: &str,
        wait: Wait,
    ) -> (bool, SessionResult<Vec<String>>) {
        let (timed_out, found) = self.try_elements(scope, selector, wait).await;
        let elements = match found {
            Ok(elements) => elements,
            Err(e) => return (timed_out, Err(e)),
        };
        let mut texts = Vec::with_capacity(elements.len());
        for element in &elements {
            match self.session.text(element).await {
                Ok(text) => texts.push(text.trim().to_string()),
                Err(e) => return (timed_out, Err(e)),
            }
        }
        (timed_out, Ok(texts))
    }

    /// `counted`: the lookup's fault was already taken by a timed-out wait
    fn settle<T>(&mut self, selector: &str, result: SessionResult<T>, counted: bool) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                if !counted {
                    self.faults += 1;
                }
                if e.is_expected() {
                    warn!("{} exception for {} at {}", e.kind(), selector, self.url);
                } else {
                    error!("{} exception for {} at {}: {}", e.kind(), selector, self.url, e);
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::session::{SiteSnapshot, SnapshotSession};
    use std::time::Duration;

    const URL: &str = "http://x/p1";
    const PAGE: &str = r#"
        <html><body>
          <div class="score_area">
            <span class="review_point"><span class="point">5점만점에 4점</span></span>
            <span class="date"> 2024.05.01 </span>
          </div>
          <p class="tag"><span>건성</span><span>쿨톤</span></p>
          <p class="tag late" style="display:none"><span>지성</span></p>
          <a class="id" onclick="move('abc=')">user01</a>
        </body></html>
    "#;

    async fn loaded() -> SnapshotSession {
        let mut session = SnapshotSession::single(URL, SiteSnapshot::new(PAGE));
        session.goto(URL).await.unwrap();
        session
    }

    fn quick() -> WaitPolicy {
        WaitPolicy::new(Duration::from_millis(100), Duration::from_millis(20))
    }

    #[tokio::test]
    async fn test_text_is_trimmed() {
        let mut session = loaded().await;
        let mut ex = FieldExtractor::new(&mut session, URL, quick());
        let date = ex.text(None, "div.score_area > span.date", Wait::Skip).await;
        assert_eq!(date.as_deref(), Some("2024.05.01"));
        assert_eq!(ex.faults(), 0);
    }

    #[tokio::test]
    async fn test_texts_in_dom_order() {
        let mut session = loaded().await;
        let mut ex = FieldExtractor::new(&mut session, URL, quick());
        let skin = ex.texts(None, "p.tag > span", Wait::Skip).await;
        assert_eq!(skin, vec!["건성", "쿨톤", ""]);
    }

    #[tokio::test]
    async fn test_missing_scalar_is_none_with_one_fault() {
        let mut session = loaded().await;
        let mut ex = FieldExtractor::new(&mut session, URL, quick());
        let badge = ex.text(None, "span.ico_offlineStore", Wait::Skip).await;
        assert!(badge.is_none());
        assert_eq!(ex.faults(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_timeout_still_queries_hidden_elements() {
        let mut session = loaded().await;
        let mut ex = FieldExtractor::new(&mut session, URL, quick());
        let hidden = ex.elements(None, "p.late > span", Wait::Visible).await;
        assert_eq!(hidden.len(), 1);
        assert_eq!(ex.faults(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_timeout_on_missing_scalar_counts_one_fault() {
        let mut session = loaded().await;
        let mut ex = FieldExtractor::new(&mut session, URL, quick());
        let badge = ex.text(None, "span.ico_offlineStore", Wait::Visible).await;
        assert!(badge.is_none());
        assert_eq!(ex.faults(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_list_items_are_found_after_timeout() {
        const LIST: &str = r#"<html><body><ul>
            <li style="display: none">첫번째</li><li style="display:none">두번째</li>
        </ul></body></html>"#;
        let mut session = SnapshotSession::single(URL, SiteSnapshot::new(LIST));
        session.goto(URL).await.unwrap();
        let mut ex = FieldExtractor::new(&mut session, URL, quick());

        let waited = ex.elements(None, "ul > li", Wait::Visible).await;
        let immediate = ex.elements(None, "ul > li", Wait::Skip).await;

        assert_eq!(waited.len(), 2);
        assert_eq!(immediate.len(), 2);
        assert_eq!(ex.faults(), 1);
    }

    #[tokio::test]
    async fn test_no_match_list_is_empty_without_fault() {
        let mut session = loaded().await;
        let mut ex = FieldExtractor::new(&mut session, URL, quick());
        let polls = ex.elements(None, "dl.poll_type1", Wait::Skip).await;
        assert!(polls.is_empty());
        assert_eq!(ex.faults(), 0);
    }

    #[tokio::test]
    async fn test_stale_scope_degrades() {
        let mut session = loaded().await;
        let scope = session.find(None, "div.score_area").await.unwrap();
        session.goto(URL).await.unwrap();

        let mut ex = FieldExtractor::new(&mut session, URL, quick());
        let rating = ex.text(Some(&scope), "span.point", Wait::Skip).await;
        assert!(rating.is_none());
        assert_eq!(ex.faults(), 1);
    }

    #[tokio::test]
    async fn test_attribute_of_element() {
        let mut session = loaded().await;
        let mut ex = FieldExtractor::new(&mut session, URL, quick());
        let link = ex.element(None, "a.id", Wait::Visible).await.unwrap();
        assert_eq!(ex.attribute(&link, "onclick").await.as_deref(), Some("move('abc=')"));
        assert_eq!(ex.attribute(&link, "href").await, None);
        assert_eq!(ex.text_of(&link).await.as_deref(), Some("user01"));
        assert_eq!(ex.faults(), 0);
    }
}
