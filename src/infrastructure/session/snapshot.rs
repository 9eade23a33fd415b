//! Static-DOM session backed by saved HTML
//!
//! Each site is a list of page states. Clicking an element that matches a
//! registered transition selector swaps the current state. Like the browser
//! backend, every click makes the handles issued before it stale.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use super::{ElementHandle, Session, SessionError, SessionFactory, SessionResult};

/// Saved page states for one URL.
#[derive(Debug, Clone, Default)]
pub struct SiteSnapshot {
    pages: Vec<String>,
    transitions: Vec<(String, usize)>,
}

impl SiteSnapshot {
    pub fn new(first_page: impl Into<String>) -> Self {
        Self {
            pages: vec![first_page.into()],
            transitions: Vec::new(),
        }
    }

    pub fn with_page(mut self, html: impl Into<String>) -> Self {
        self.pages.push(html.into());
        self
    }

    /// Clicking an element matched by `selector` switches to page state `target`
    pub fn with_transition(mut self, selector: impl Into<String>, target: usize) -> Self {
        self.transitions.push((selector.into(), target));
        self
    }

    /// Pages 1..n of a paginated listing, wired through `page_link(n)` selectors
    pub fn paginated(pages: Vec<String>, page_link: impl Fn(u32) -> String) -> Self {
        let mut transitions = Vec::with_capacity(pages.len());
        for (index, _) in pages.iter().enumerate() {
            let page_no = u32::try_from(index + 1).unwrap_or(u32::MAX);
            transitions.push((page_link(page_no), index));
        }
        Self { pages, transitions }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[derive(Debug, Clone)]
struct Locator {
    parent: Option<usize>,
    selector: String,
    nth: usize,
}

pub struct SnapshotSession {
    sites: Arc<HashMap<String, SiteSnapshot>>,
    current: Option<(String, usize)>,
    generation: u64,
    arena: Vec<Locator>,
    clicks: Vec<String>,
    closed: Option<Arc<AtomicUsize>>,
}

impl SnapshotSession {
    pub fn new(sites: Arc<HashMap<String, SiteSnapshot>>) -> Self {
        Self {
            sites,
            current: None,
            generation: 0,
            arena: Vec::new(),
            clicks: Vec::new(),
            closed: None,
        }
    }

    pub fn single(url: impl Into<String>, site: SiteSnapshot) -> Self {
        let mut sites = HashMap::new();
        sites.insert(url.into(), site);
        Self::new(Arc::new(sites))
    }

    /// Selectors of every element clicked so far
    pub fn clicks(&self) -> &[String] {
        &self.clicks
    }

    /// Handles issued since the last navigation or click
    pub fn live_handles(&self) -> usize {
        self.arena.len()
    }

    /// Index of the page state currently shown
    pub fn current_page(&self) -> Option<usize> {
        self.current.as_ref().map(|(_, page)| *page)
    }

    fn document(&self) -> SessionResult<Html> {
        let (url, page) = self
            .current
            .as_ref()
            .ok_or_else(|| SessionError::driver("no page loaded"))?;
        let html = self
            .sites
            .get(url)
            .and_then(|site| site.pages.get(*page))
            .ok_or_else(|| SessionError::driver(format!("missing page state {page} for {url}")))?;
        Ok(Html::parse_document(html))
    }

    fn locate<'a>(&self, doc: &'a Html, handle: &ElementHandle) -> SessionResult<ElementRef<'a>> {
        if handle.generation() != self.generation {
            return Err(SessionError::stale(handle.selector()));
        }
        self.resolve(doc, handle.id())
            .ok_or_else(|| SessionError::stale(handle.selector()))
    }

    fn resolve<'a>(&self, doc: &'a Html, id: usize) -> Option<ElementRef<'a>> {
        let locator = self.arena.get(id)?;
        let selector = Selector::parse(&locator.selector).ok()?;
        match locator.parent {
            Some(parent) => {
                let parent = self.resolve(doc, parent)?;
                parent.select(&selector).nth(locator.nth)
            }
            None => doc.select(&selector).nth(locator.nth),
        }
    }

    fn invalidate_handles(&mut self) {
        self.generation += 1;
        self.arena.clear();
    }
}

fn parse_selector(selector: &str) -> SessionResult<Selector> {
    Selector::parse(selector)
        .map_err(|e| SessionError::driver(format!("invalid selector '{selector}': {e:?}")))
}

fn hides(element: ElementRef<'_>) -> bool {
    let value = element.value();
    if value.attr("hidden").is_some() {
        return true;
    }
    value.attr("style").is_some_and(|style| {
        let compact: String = style.chars().filter(|c| !c.is_whitespace()).collect();
        compact.to_lowercase().contains("display:none")
    })
}

fn displayed(element: ElementRef<'_>) -> bool {
    !hides(element) && !element.ancestors().filter_map(ElementRef::wrap).any(hides)
}

/// Rendered text: one trimmed line per non-empty text line
fn rendered_text(element: ElementRef<'_>) -> String {
    let raw: String = element.text().collect();
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Session for SnapshotSession {
    async fn goto(&mut self, url: &str) -> SessionResult<()> {
        if !self.sites.contains_key(url) {
            return Err(SessionError::Navigation {
                url: url.to_string(),
                reason: "no snapshot recorded for this url".to_string(),
            });
        }
        self.current = Some((url.to_string(), 0));
        self.invalidate_handles();
        Ok(())
    }

    async fn find_all(
        &mut self,
        scope: Option<&ElementHandle>,
        selector: &str,
    ) -> SessionResult<Vec<ElementHandle>> {
        let parsed = parse_selector(selector)?;
        let doc = self.document()?;
        let count = match scope {
            Some(handle) => self.locate(&doc, handle)?.select(&parsed).count(),
            None => doc.select(&parsed).count(),
        };

        let parent = scope.map(ElementHandle::id);
        let mut handles = Vec::with_capacity(count);
        for nth in 0..count {
            let id = self.arena.len();
            self.arena.push(Locator {
                parent,
                selector: selector.to_string(),
                nth,
            });
            handles.push(ElementHandle::new(id, self.generation, selector));
        }
        Ok(handles)
    }

    async fn text(&mut self, element: &ElementHandle) -> SessionResult<String> {
        let doc = self.document()?;
        let found = self.locate(&doc, element)?;
        if displayed(found) {
            Ok(rendered_text(found))
        } else {
            Ok(String::new())
        }
    }

    async fn attribute(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> SessionResult<Option<String>> {
        let doc = self.document()?;
        let found = self.locate(&doc, element)?;
        Ok(found.value().attr(name).map(str::to_string))
    }

    async fn is_displayed(&mut self, element: &ElementHandle) -> SessionResult<bool> {
        let doc = self.document()?;
        Ok(displayed(self.locate(&doc, element)?))
    }

    async fn is_enabled(&mut self, element: &ElementHandle) -> SessionResult<bool> {
        let doc = self.document()?;
        Ok(self.locate(&doc, element)?.value().attr("disabled").is_none())
    }

    async fn click(&mut self, element: &ElementHandle) -> SessionResult<()> {
        let target = {
            let doc = self.document()?;
            let found = self.locate(&doc, element)?;
            if !displayed(found) {
                return Err(SessionError::NotInteractable {
                    selector: element.selector().to_string(),
                });
            }

            let (url, _) = self
                .current
                .as_ref()
                .ok_or_else(|| SessionError::driver("no page loaded"))?;
            let transitions = self
                .sites
                .get(url)
                .map(|site| site.transitions.as_slice())
                .unwrap_or_default();

            let mut target = None;
            for (selector, page) in transitions {
                let parsed = parse_selector(selector)?;
                if doc.select(&parsed).any(|candidate| candidate.id() == found.id()) {
                    target = Some(*page);
                    break;
                }
            }
            target
        };

        self.clicks.push(element.selector().to_string());
        if let (Some(page), Some((url, current))) = (target, self.current.as_mut()) {
            debug!("snapshot transition {} -> page state {} ({})", current, page, url);
            *current = page;
        }
        self.invalidate_handles();
        Ok(())
    }

    async fn close(self: Box<Self>) -> SessionResult<()> {
        if let Some(closed) = &self.closed {
            closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Hands out snapshot sessions over a shared set of sites.
#[derive(Debug, Clone, Default)]
pub struct SnapshotFactory {
    sites: Arc<HashMap<String, SiteSnapshot>>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl SnapshotFactory {
    pub fn new(sites: HashMap<String, SiteSnapshot>) -> Self {
        Self {
            sites: Arc::new(sites),
            ..Self::default()
        }
    }

    pub fn with_site(url: impl Into<String>, site: SiteSnapshot) -> Self {
        let mut sites = HashMap::new();
        sites.insert(url.into(), site);
        Self::new(sites)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for SnapshotFactory {
    async fn open(&self) -> SessionResult<Box<dyn Session>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let mut session = SnapshotSession::new(Arc::clone(&self.sites));
        session.closed = Some(Arc::clone(&self.closed));
        Ok(Box::new(session))
    }
}
