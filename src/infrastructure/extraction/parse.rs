//! Text normalisation for decorated numeric fields

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::{ExtractError, ExtractResult};

static USER_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"'([A-Za-z0-9+/=]+)'").expect("user code pattern is valid"));

static TRAILING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\D*$").expect("trailing number pattern is valid"));

/// "(1,234건)" -> 1234
pub fn parse_review_count(raw: &str) -> ExtractResult<u32> {
    let cleaned = raw
        .trim()
        .trim_matches(|c| c == '(' || c == ')')
        .trim_end_matches('건')
        .replace(',', "");
    cleaned
        .trim()
        .parse()
        .map_err(|_| ExtractError::malformed("review_cnt", raw))
}

/// "4.8" -> 4.8
pub fn parse_overall_rating(raw: &str) -> ExtractResult<f32> {
    raw.trim()
        .parse()
        .map_err(|_| ExtractError::malformed("overall_rating", raw))
}

/// Score of a single review; the last number in the text wins ("5점만점에 4점" -> 4)
pub fn parse_review_rating(raw: &str) -> ExtractResult<f32> {
    TRAILING_NUMBER
        .captures(raw.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| ExtractError::malformed("review_rating", raw))
}

/// Reviewer token quoted inside the profile link handler
pub fn extract_user_code(onclick: &str) -> Option<String> {
    USER_CODE
        .captures(onclick)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Digits only, ignoring decoration; `None` when there are none
pub fn parse_count_lenient(raw: &str) -> Option<u32> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Review pages to visit for a product with `review_count` reviews
pub fn page_count(review_count: u32, per_page: u32, cap: u32) -> u32 {
    cap.min(review_count / per_page.max(1) + 1)
}
