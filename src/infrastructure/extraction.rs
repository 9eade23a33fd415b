//! Page extraction over a live or snapshot session
//!
//! Layered leaf-first:
//! - `field_extractor`: single field / list lookups that never fail
//! - `product_info`, `ingredients`: one pass over the product header and tabs
//! - `reviews`: the paginated review walk
//!
//! Selectors for both supported page layouts live in `selectors`, text
//! normalisation in `parse`.

pub mod error;
pub mod field_extractor;
pub mod ingredients;
pub mod parse;
pub mod product_info;
pub mod reviews;
pub mod selectors;

pub use error::{ExtractError, ExtractResult};
pub use field_extractor::{FieldExtractor, Wait};
pub use ingredients::extract_ingredients;
pub use product_info::extract_product_info;
pub use reviews::{extract_reviews, ReviewPaginator};
pub use selectors::{PageLayout, Selectors};
