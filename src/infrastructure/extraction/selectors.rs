//! CSS selectors for the product detail page
//!
//! Two page layouts are known. `Current` is the live layout; `Legacy`
//! differs only in the review list, point-flag badges and poll markup.

use serde::{Deserialize, Serialize};

/// Label of the ingredient entry in the product information list (exact match)
pub const INGREDIENT_LABEL: &str = "화장품법에 따라 기재해야 하는 모든 성분";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageLayout {
    #[default]
    Current,
    Legacy,
}

impl PageLayout {
    pub fn selectors(self) -> &'static Selectors {
        match self {
            Self::Current => &CURRENT,
            Self::Legacy => &LEGACY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selectors {
    // product header
    pub flag_anchor: &'static str,
    pub summary_anchor: &'static str,
    pub product_info: &'static str,
    pub social_info: &'static str,
    pub brand: &'static str,
    pub name: &'static str,
    pub flags: &'static str,
    pub review_count: &'static str,
    pub overall_rating: &'static str,

    // ingredient tab
    pub ingredient_tab: &'static str,
    pub ingredient_entries: &'static str,
    pub ingredient_label: &'static str,
    pub ingredient_value: &'static str,

    // review tab and pagination
    pub review_tab: &'static str,
    pub review_container: &'static str,
    pub review_items: &'static str,

    // one review node
    pub user_anchor: &'static str,
    pub text_anchor: &'static str,
    pub user_info: &'static str,
    pub user_link: &'static str,
    pub skin_types: &'static str,
    pub user_tags: &'static str,
    pub review_content: &'static str,
    pub review_rating: &'static str,
    pub review_date: &'static str,
    pub offline_badge: &'static str,
    pub item_option: &'static str,
    pub poll_rows: &'static str,
    pub poll_question: &'static str,
    pub poll_answer: &'static str,
    pub review_text: &'static str,
    pub recommend_count: &'static str,
}

impl Selectors {
    /// Page number control for review page `page`
    pub fn page_link(&self, page: u32) -> String {
        format!("div.pageing > a[data-page-no='{page}']")
    }
}

pub const CURRENT: Selectors = Selectors {
    flag_anchor: "div.right_area > div.prd_info > p.prd_flag span",
    summary_anchor: "div.left_area > div.prd_social_info > p#repReview",
    product_info: "div.right_area > div.prd_info",
    social_info: "div.left_area > div.prd_social_info",
    brand: "p.prd_brand",
    name: "p.prd_name",
    flags: "p.prd_flag span",
    review_count: "p#repReview > em",
    overall_rating: "p#repReview > b",

    ingredient_tab: "li#buyInfo",
    ingredient_entries: "div#artcInfo > dl.detail_info_list",
    ingredient_label: "dt",
    ingredient_value: "dd",

    review_tab: "li#reviewInfo",
    review_container: "div.review_list_wrap",
    review_items: "div.review_list_wrap > ul#gdasList > li",

    user_anchor: "div#Contents div.review_wrap div.info > div.user > p.info_user",
    text_anchor: "div#Contents div.review_wrap div.review_cont > div.txt_inner",
    user_info: "div.info > div.user",
    user_link: "p.info_user > a.id",
    skin_types: "p.tag > span",
    user_tags: "div.badge > a.point_flag",
    review_content: "div.review_cont",
    review_rating: "div.score_area > span.review_point > span.point",
    review_date: "div.score_area > span.date",
    offline_badge: "div.score_area > span.ico_offlineStore",
    item_option: "p.item_option",
    poll_rows: "div.poll_sample dl.poll_type1",
    poll_question: "dt",
    poll_answer: "dd",
    review_text: "div.txt_inner",
    recommend_count: "div.recom_area button span.num",
};

pub const LEGACY: Selectors = Selectors {
    review_items: "ul#gdasList > li",
    user_tags: "div.badge > div > a.point_flag",
    poll_question: "dt > span",
    poll_answer: "dd > span",
    ..CURRENT
};

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Selector;

    fn all(s: &Selectors) -> Vec<&'static str> {
        vec![
            s.flag_anchor, s.summary_anchor, s.product_info, s.social_info, s.brand, s.name,
            s.flags, s.review_count, s.overall_rating, s.ingredient_tab, s.ingredient_entries,
            s.ingredient_label, s.ingredient_value, s.review_tab, s.review_container,
            s.review_items, s.user_anchor, s.text_anchor, s.user_info, s.user_link, s.skin_types,
            s.user_tags, s.review_content, s.review_rating, s.review_date, s.offline_badge,
            s.item_option, s.poll_rows, s.poll_question, s.poll_answer, s.review_text,
            s.recommend_count,
        ]
    }

    #[test]
    fn test_every_selector_compiles() {
        for layout in [PageLayout::Current, PageLayout::Legacy] {
            let selectors = layout.selectors();
            for css in all(selectors) {
                assert!(Selector::parse(css).is_ok(), "{css}");
            }
            assert!(Selector::parse(&selectors.page_link(7)).is_ok());
        }
    }

    #[test]
    fn test_legacy_overrides_only_review_markup() {
        assert_eq!(LEGACY.review_items, "ul#gdasList > li");
        assert_eq!(LEGACY.review_tab, CURRENT.review_tab);
        assert_eq!(LEGACY.ingredient_entries, CURRENT.ingredient_entries);
    }
}
