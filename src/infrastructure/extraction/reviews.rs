//! Paginated review extraction
//!
//! ```text
//! Init --tab+container--> TabOpened --> PageLoaded(1)
//! PageLoaded(n) --n < pages--> Navigate(n+1) --> PageLoaded(n+1)
//! PageLoaded(n) --n == pages--> Done
//! ```
//!
//! A failed tab open ends the walk immediately. A failed page transition
//! is recorded and the current page is read again. A failed review is
//! recorded and the next review is read. `run` always returns what it has.

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::error::{ExtractError, ExtractResult};
use super::field_extractor::{FieldExtractor, Wait};
use super::parse::{extract_user_code, page_count, parse_count_lenient, parse_review_rating};
use super::selectors::Selectors;
use crate::domain::{ErrorLog, ErrorReason, ProductInfo, ReviewRecord, ONLINE_PURCHASE_CHANNEL};
use crate::infrastructure::config::CrawlerConfig;
use crate::infrastructure::session::ElementHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationState {
    Init,
    TabOpened,
    PageLoaded(u32),
    Navigate(u32),
    Done,
}

pub struct ReviewPaginator<'a, 's> {
    ex: &'a mut FieldExtractor<'s>,
    selectors: &'a Selectors,
    config: &'a CrawlerConfig,
    product: &'a ProductInfo,
    errors: &'a mut ErrorLog,
    pages: u32,
    records: Vec<ReviewRecord>,
}

impl<'a, 's> ReviewPaginator<'a, 's> {
    pub fn new(
        ex: &'a mut FieldExtractor<'s>,
        selectors: &'a Selectors,
        config: &'a CrawlerConfig,
        product: &'a ProductInfo,
        errors: &'a mut ErrorLog,
    ) -> Self {
        Self {
            ex,
            selectors,
            config,
            product,
            errors,
            pages: 0,
            records: Vec::new(),
        }
    }

    /// Pages this walk will visit (known once the tab is open)
    pub fn pages(&self) -> u32 {
        self.pages
    }

    pub async fn run(mut self) -> Vec<ReviewRecord> {
        let mut state = PaginationState::Init;
        loop {
            debug!("review pagination state {:?}", state);
            state = match state {
                PaginationState::Init => self.open_tab().await,
                PaginationState::TabOpened => {
                    self.pages = page_count(
                        self.product.review_count_or_zero(),
                        self.config.reviews_per_page,
                        self.config.review_page_cap,
                    );
                    info!("Visiting {} review pages for {}", self.pages, self.ex.url());
                    PaginationState::PageLoaded(1)
                }
                PaginationState::Navigate(page) => self.turn_to(page).await,
                PaginationState::PageLoaded(page) => {
                    self.read_page(page).await;
                    if page < self.pages {
                        PaginationState::Navigate(page + 1)
                    } else {
                        PaginationState::Done
                    }
                }
                PaginationState::Done => break,
            };
        }

        info!(
            "[extract_reviews] FINISH with {} reviews from {}",
            self.records.len(),
            self.ex.url()
        );
        self.records
    }

    async fn open_tab(&mut self) -> PaginationState {
        info!("[extract_reviews] START");
        let opened = match self
            .ex
            .click_when_clickable(self.selectors.review_tab, self.config.tab_click_wait())
            .await
        {
            Ok(()) => {
                info!("The review tab has been successfully clicked");
                self.ex
                    .wait_visible(self.selectors.review_container, self.config.field_wait())
                    .await
            }
            Err(e) => Err(e),
        };

        match opened {
            Ok(()) => PaginationState::TabOpened,
            Err(e) => {
                if e.is_expected() {
                    warn!("{} occurred while preparing reviews for {}: {}", e.kind(), self.ex.url(), e);
                } else {
                    error!("Unexpected error while preparing reviews for {}: {}", self.ex.url(), e);
                }
                self.errors.record(self.ex.url(), ErrorReason::ReviewCount);
                PaginationState::Done
            }
        }
    }

    async fn turn_to(&mut self, page: u32) -> PaginationState {
        let link = self.selectors.page_link(page);
        match self
            .ex
            .click_when_clickable(&link, self.config.page_click_wait())
            .await
        {
            Ok(()) => {
                debug!("The review page {} button has been successfully clicked", page);
                sleep(self.config.settle_interval()).await;
            }
            Err(e) => {
                warn!(
                    "{} occurred while navigating to page {} for {}: {}",
                    e.kind(),
                    page,
                    self.ex.url(),
                    e
                );
                self.errors
                    .record(self.ex.url(), ErrorReason::PageNavigation { page });
            }
        }
        PaginationState::PageLoaded(page)
    }

    async fn read_page(&mut self, page: u32) {
        let nodes = self
            .ex
            .elements(None, self.selectors.review_items, Wait::Visible)
            .await;
        debug!("page {} has {} review nodes", page, nodes.len());

        for (index, node) in nodes.iter().enumerate() {
            self.await_anchors(page, index).await;
            match self.read_review(node).await {
                Ok(record) => self.records.push(record),
                Err(e) => {
                    if e.is_expected() {
                        warn!(
                            "Skipping review[{}] on page {} for {}: {}",
                            index,
                            page,
                            self.ex.url(),
                            e
                        );
                    } else {
                        error!(
                            "Unexpected error extracting review[{}] on page {} for {}: {}",
                            index,
                            page,
                            self.ex.url(),
                            e
                        );
                    }
                    self.errors.record(
                        self.ex.url(),
                        ErrorReason::ReviewExtraction {
                            page,
                            review: index,
                        },
                    );
                }
            }
        }
    }

    /// Render barrier before a review is read; a timeout is recorded but not fatal
    async fn await_anchors(&mut self, page: u32, index: usize) {
        for anchor in [self.selectors.user_anchor, self.selectors.text_anchor] {
            if let Err(e) = self.ex.wait_visible(anchor, self.config.field_wait()).await {
                warn!(
                    "{} occurred while extracting review[{}] on page {} for {}",
                    e.kind(),
                    index,
                    page,
                    self.ex.url()
                );
                self.errors.record(
                    self.ex.url(),
                    ErrorReason::ReviewExtraction {
                        page,
                        review: index,
                    },
                );
                return;
            }
        }
    }

    async fn read_review(&mut self, node: &ElementHandle) -> ExtractResult<ReviewRecord> {
        let s = self.selectors;
        let ex = &mut *self.ex;

        let mut record = ReviewRecord {
            brand_name: self.product.brand_name.clone(),
            product_name: self.product.product_name.clone(),
            ..ReviewRecord::default()
        };

        if let Some(user) = ex.element(Some(node), s.user_info, Wait::Skip).await {
            if let Some(link) = ex.element(Some(&user), s.user_link, Wait::Skip).await {
                record.user_code = ex
                    .attribute(&link, "onclick")
                    .await
                    .and_then(|handler| extract_user_code(&handler));
                record.user_id = ex.text_of(&link).await;
            }
            record.user_skin_types = ex.texts(Some(&user), s.skin_types, Wait::Skip).await;
            record.user_tags = ex.texts(Some(&user), s.user_tags, Wait::Skip).await;
        }

        let content = ex
            .element(Some(node), s.review_content, Wait::Skip)
            .await
            .ok_or_else(|| ExtractError::missing("review_cont"))?;

        record.rating = match ex.text(Some(&content), s.review_rating, Wait::Skip).await {
            Some(raw) => Some(parse_review_rating(&raw)?),
            None => None,
        };
        record.date = ex.text(Some(&content), s.review_date, Wait::Skip).await;
        record.purchase_channel = ex
            .text(Some(&content), s.offline_badge, Wait::Skip)
            .await
            .filter(|channel| !channel.is_empty())
            .unwrap_or_else(|| ONLINE_PURCHASE_CHANNEL.to_string());
        record.item_option = ex.text(Some(&content), s.item_option, Wait::Skip).await;

        for row in ex.elements(Some(&content), s.poll_rows, Wait::Skip).await {
            let question = ex.text(Some(&row), s.poll_question, Wait::Skip).await;
            let answer = ex.text(Some(&row), s.poll_answer, Wait::Skip).await;
            if let (Some(question), Some(answer)) = (question, answer) {
                match record.poll_answers.iter_mut().find(|(q, _)| *q == question) {
                    Some(existing) => existing.1 = answer,
                    None => record.poll_answers.push((question, answer)),
                }
            }
        }

        record.review_text = ex.text(Some(&content), s.review_text, Wait::Skip).await;
        record.recommend_count = ex
            .text(Some(&content), s.recommend_count, Wait::Skip)
            .await
            .and_then(|raw| parse_count_lenient(&raw));

        Ok(record)
    }
}

/// Walk every review page of the loaded product and collect its reviews.
pub async fn extract_reviews(
    ex: &mut FieldExtractor<'_>,
    selectors: &Selectors,
    config: &CrawlerConfig,
    product: &ProductInfo,
    errors: &mut ErrorLog,
) -> Vec<ReviewRecord> {
    ReviewPaginator::new(ex, selectors, config, product, errors)
        .run()
        .await
}
