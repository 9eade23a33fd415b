use serde::{Deserialize, Serialize};

/// Product fields read from the detail page header.
///
/// Every field is optional: a lookup failure degrades the field to `None`
/// instead of dropping the product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub brand_name: Option<String>,
    pub product_name: Option<String>,
    pub product_flags: Vec<String>,
    pub review_count: Option<u32>,
    pub overall_rating: Option<f32>,
}

impl ProductInfo {
    /// Review count used for page derivation (0 when unknown)
    pub fn review_count_or_zero(&self) -> u32 {
        self.review_count.unwrap_or(0)
    }
}

/// One row of the per-category product table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub category: String,
    pub brand_name: Option<String>,
    pub product_name: Option<String>,
    pub product_flags: Vec<String>,
    pub url: String,
    pub ingredients: Option<String>,
    pub review_count: Option<u32>,
    pub overall_rating: Option<f32>,
}

impl ProductRecord {
    pub fn new(
        category: impl Into<String>,
        url: impl Into<String>,
        info: ProductInfo,
        ingredients: Option<String>,
    ) -> Self {
        Self {
            category: category.into(),
            brand_name: info.brand_name,
            product_name: info.product_name,
            product_flags: info.product_flags,
            url: url.into(),
            ingredients,
            review_count: info.review_count,
            overall_rating: info.overall_rating,
        }
    }

    /// Flags as written to the product table
    pub fn joined_flags(&self) -> String {
        self.product_flags.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_takes_info_fields() {
        let info = ProductInfo {
            brand_name: Some("라운드랩".into()),
            product_name: Some("자작나무 수분 선크림".into()),
            product_flags: vec!["세일".into(), "쿠폰".into()],
            review_count: Some(23),
            overall_rating: Some(4.8),
        };
        let record = ProductRecord::new("선케어", "http://x/p1", info, None);

        assert_eq!(record.category, "선케어");
        assert_eq!(record.review_count, Some(23));
        assert_eq!(record.joined_flags(), "세일,쿠폰");
        assert!(record.ingredients.is_none());
    }

    #[test]
    fn test_unknown_review_count_counts_as_zero() {
        assert_eq!(ProductInfo::default().review_count_or_zero(), 0);
    }
}
