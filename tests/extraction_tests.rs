//! Whole-page extraction over saved snapshots
mod common;

use std::collections::HashMap;
use std::sync::Arc;

use review_harvester_lib::application::extract_product_page;
use review_harvester_lib::domain::{ErrorLog, ErrorReason};
use review_harvester_lib::infrastructure::extraction::selectors::CURRENT;
use review_harvester_lib::infrastructure::session::{Session, SiteSnapshot, SnapshotSession};

use common::{fast_crawler, product_page, product_site, review_node};

const URL: &str = "https://shop.test/goods/E001";

fn session(site: SiteSnapshot) -> SnapshotSession {
    SnapshotSession::new(Arc::new(HashMap::from([(URL.to_string(), site)])))
}

#[tokio::test(start_paused = true)]
async fn reloading_an_unchanged_page_gives_the_same_result() {
    let mut session = session(product_site("e", 12));
    let config = fast_crawler();

    let mut first_errors = ErrorLog::new();
    session.goto(URL).await.unwrap();
    let first = extract_product_page(&mut session, "토너", URL, &config, &mut first_errors).await;

    let mut second_errors = ErrorLog::new();
    session.goto(URL).await.unwrap();
    let second = extract_product_page(&mut session, "토너", URL, &config, &mut second_errors).await;

    assert_eq!(first, second);
    assert_eq!(first.reviews.len(), 12);
    assert!(first_errors.is_empty());
    assert!(second_errors.is_empty());
}

#[tokio::test(start_paused = true)]
async fn review_records_copy_the_product_header() {
    let mut session = session(product_site("h", 4));
    let mut errors = ErrorLog::new();
    session.goto(URL).await.unwrap();

    let page = extract_product_page(&mut session, "토너", URL, &fast_crawler(), &mut errors).await;

    assert_eq!(page.record.brand_name.as_deref(), Some("아누아"));
    assert_eq!(page.record.product_flags, vec!["세일", "오늘드림"]);
    for review in &page.reviews {
        assert_eq!(review.brand_name, page.record.brand_name);
        assert_eq!(review.product_name, page.record.product_name);
        assert_eq!(review.rating, Some(5.0));
        assert_eq!(review.user_skin_types, vec!["지성", "여름쿨톤"]);
    }
}

#[tokio::test(start_paused = true)]
async fn page_cap_bounds_the_walk() {
    let mut session = session(product_site("k", 45));
    let config = review_harvester_lib::infrastructure::config::CrawlerConfig {
        review_page_cap: 2,
        ..fast_crawler()
    };
    let mut errors = ErrorLog::new();
    session.goto(URL).await.unwrap();

    let page = extract_product_page(&mut session, "토너", URL, &config, &mut errors).await;

    assert_eq!(page.reviews.len(), 20);
    assert_eq!(page.record.review_count, Some(45));
    assert_eq!(session.clicks().last().map(String::as_str), Some(CURRENT.page_link(2).as_str()));
    assert!(errors.is_empty());
}

#[tokio::test(start_paused = true)]
async fn a_missing_page_link_is_recorded_once_per_page() {
    // Three pages of reviews are announced but only the first is reachable
    let nodes: Vec<String> = (0..10).map(|i| review_node(&format!("m{i}"), "4점")).collect();
    let site = SiteSnapshot::new(product_page(25, &nodes, 1));
    let mut session = session(site);
    let mut errors = ErrorLog::new();
    session.goto(URL).await.unwrap();

    let page = extract_product_page(&mut session, "토너", URL, &fast_crawler(), &mut errors).await;

    assert_eq!(errors.count_matching(&ErrorReason::PageNavigation { page: 2 }), 1);
    assert_eq!(errors.count_matching(&ErrorReason::PageNavigation { page: 3 }), 1);
    // the stuck page is read again after each failed turn
    assert_eq!(page.reviews.len(), 30);
    assert!(page.reviews.iter().all(|r| r.rating == Some(4.0)));
}
