use tracing::{error, info, warn};

use super::field_extractor::{FieldExtractor, Wait};
use super::selectors::{Selectors, INGREDIENT_LABEL};
use crate::domain::{ErrorLog, ErrorReason};
use crate::infrastructure::config::CrawlerConfig;

/// Open the purchase-info tab and return the full ingredient disclosure.
///
/// A failed tab click is tolerated; whatever is rendered is scanned anyway.
/// The first entry of the list is a header and is never matched.
pub async fn extract_ingredients(
    ex: &mut FieldExtractor<'_>,
    selectors: &Selectors,
    config: &CrawlerConfig,
    errors: &mut ErrorLog,
) -> Option<String> {
    info!("[extract_ingredients] START");

    match ex
        .click_when_clickable(selectors.ingredient_tab, config.tab_click_wait())
        .await
    {
        Ok(()) => info!("The ingredient tab has been successfully clicked"),
        Err(e) if e.is_expected() => {
            warn!("{} occurred while opening ingredients for {}: {}", e.kind(), ex.url(), e);
        }
        Err(e) => error!("Unexpected error while opening ingredients for {}: {}", ex.url(), e),
    }

    let entries = ex
        .elements(None, selectors.ingredient_entries, Wait::Visible)
        .await;
    for entry in entries.iter().skip(1) {
        let label = ex.text(Some(entry), selectors.ingredient_label, Wait::Skip).await;
        if label.as_deref() == Some(INGREDIENT_LABEL) {
            let ingredients = ex.text(Some(entry), selectors.ingredient_value, Wait::Skip).await;
            info!("[extract_ingredients] FINISH");
            return ingredients;
        }
    }

    warn!("No ingredient information found for {}", ex.url());
    errors.record(ex.url(), ErrorReason::Ingredients);
    None
}
