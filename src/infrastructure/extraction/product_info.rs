//! Product header extraction: brand, name, flags, review summary

use tracing::{info, warn};

use super::error::{ExtractError, ExtractResult};
use super::field_extractor::{FieldExtractor, Wait};
use super::parse::{parse_overall_rating, parse_review_count};
use super::selectors::Selectors;
use crate::domain::ProductInfo;
use crate::infrastructure::config::CrawlerConfig;

/// Read the product header of the loaded page.
///
/// Missing brand, name or flags degrade to empty values. The review count
/// and overall rating are required: when either is absent or malformed the
/// whole header is reported as a fault.
pub async fn extract_product_info(
    ex: &mut FieldExtractor<'_>,
    selectors: &Selectors,
    config: &CrawlerConfig,
) -> ExtractResult<ProductInfo> {
    info!("[extract_product_info] Start");

    for anchor in [selectors.flag_anchor, selectors.summary_anchor] {
        if let Err(e) = ex.wait_visible(anchor, config.field_wait()).await {
            warn!("Product anchor not ready at {}: {}", ex.url(), e);
        }
    }

    let container_wait = Wait::Within(config.container_wait());
    let product = ex.element(None, selectors.product_info, container_wait).await;
    let social = ex.element(None, selectors.social_info, container_wait).await;

    let (brand_name, product_name, product_flags) = match &product {
        Some(scope) => (
            ex.text(Some(scope), selectors.brand, Wait::Skip).await,
            ex.text(Some(scope), selectors.name, Wait::Skip).await,
            ex.texts(Some(scope), selectors.flags, Wait::Skip).await,
        ),
        None => (None, None, Vec::new()),
    };

    let social = social.ok_or_else(|| ExtractError::missing("prd_social_info"))?;
    let review_count = ex
        .text(Some(&social), selectors.review_count, Wait::Skip)
        .await
        .ok_or_else(|| ExtractError::missing("review_cnt"))
        .and_then(|raw| parse_review_count(&raw))?;
    let overall_rating = ex
        .text(Some(&social), selectors.overall_rating, Wait::Skip)
        .await
        .ok_or_else(|| ExtractError::missing("overall_rating"))
        .and_then(|raw| parse_overall_rating(&raw))?;

    info!(
        "[extract_product_info] Finished with: brand_name={:?}, product_name={:?}, review_cnt={}, overall_rating={}",
        brand_name, product_name, review_count, overall_rating
    );

    Ok(ProductInfo {
        brand_name,
        product_name,
        product_flags,
        review_count: Some(review_count),
        overall_rating: Some(overall_rating),
    })
}
