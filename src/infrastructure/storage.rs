//! CSV persistence for extracted catalogs
//!
//! Layout under the output root:
//!
//! ```text
//! products/<category>.csv
//! reviews/<category>/<category>_<n>_reviews.csv
//! <category>_reviewers.csv
//! error/error_list.csv
//! ```
//!
//! Writes are blocking file I/O; async callers hand them to the blocking pool.

use anyhow::{Context, Result};
use csv::Writer;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::domain::{ErrorLog, ProductRecord, ReviewRecord};

const PRODUCT_COLUMNS: [&str; 8] = [
    "category",
    "product_name",
    "brand_name",
    "product_flag",
    "url",
    "ingredients",
    "review_cnt",
    "overall_rating",
];

const REVIEW_LEADING_COLUMNS: [&str; 10] = [
    "user_id",
    "user_code",
    "user_skintype",
    "user_tag",
    "brand_name",
    "product_name",
    "review_rating",
    "review_date",
    "purchase_channel",
    "item_option",
];

const REVIEW_TRAILING_COLUMNS: [&str; 2] = ["review", "recommend_num"];

/// Persistence boundary used by the job orchestrator.
pub trait CatalogStore: Send + Sync {
    /// Reviews of the `product_num`-th product of `category`
    fn save_reviews(
        &self,
        category: &str,
        product_num: usize,
        reviews: &[ReviewRecord],
    ) -> Result<PathBuf>;

    fn save_products(&self, category: &str, products: &[ProductRecord]) -> Result<PathBuf>;

    fn save_reviewers(&self, category: &str, reviewers: &BTreeSet<String>) -> Result<PathBuf>;

    fn save_errors(&self, errors: &ErrorLog) -> Result<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct CsvCatalogStore {
    root: PathBuf,
}

impl CsvCatalogStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn products_path(&self, category: &str) -> PathBuf {
        self.root.join("products").join(format!("{category}.csv"))
    }

    pub fn reviews_path(&self, category: &str, product_num: usize) -> PathBuf {
        self.root
            .join("reviews")
            .join(category)
            .join(format!("{category}_{product_num}_reviews.csv"))
    }

    pub fn reviewers_path(&self, category: &str) -> PathBuf {
        self.root.join(format!("{category}_reviewers.csv"))
    }

    pub fn errors_path(&self) -> PathBuf {
        self.root.join("error").join("error_list.csv")
    }

    fn writer(path: &Path) -> Result<Writer<fs::File>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        Writer::from_path(path).with_context(|| format!("Failed to open {}", path.display()))
    }
}

/// Poll questions across `reviews`, in first-seen order
pub fn poll_columns(reviews: &[ReviewRecord]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for review in reviews {
        for (question, _) in &review.poll_answers {
            if !columns.contains(question) {
                columns.push(question.clone());
            }
        }
    }
    columns
}

/// Header names for `polls`; a question that collides with another column gets a `poll_` prefix
fn poll_headers(polls: &[String]) -> Vec<String> {
    let mut taken: HashSet<String> = REVIEW_LEADING_COLUMNS
        .iter()
        .chain(REVIEW_TRAILING_COLUMNS.iter())
        .map(|column| (*column).to_string())
        .collect();
    polls
        .iter()
        .map(|question| {
            let mut name = question.clone();
            while taken.contains(&name) {
                name = format!("poll_{name}");
            }
            taken.insert(name.clone());
            name
        })
        .collect()
}

fn opt<T: ToString>(value: Option<&T>) -> String {
    value.map(ToString::to_string).unwrap_or_default()
}

fn review_row(review: &ReviewRecord, polls: &[String]) -> Vec<String> {
    let mut row = vec![
        opt(review.user_id.as_ref()),
        opt(review.user_code.as_ref()),
        review.user_skin_types.join(","),
        review.user_tags.join(","),
        opt(review.brand_name.as_ref()),
        opt(review.product_name.as_ref()),
        opt(review.rating.as_ref()),
        opt(review.date.as_ref()),
        review.purchase_channel.clone(),
        opt(review.item_option.as_ref()),
    ];
    row.extend(
        polls
            .iter()
            .map(|question| review.poll_answer(question).unwrap_or_default().to_string()),
    );
    row.push(opt(review.review_text.as_ref()));
    row.push(opt(review.recommend_count.as_ref()));
    row
}

impl CatalogStore for CsvCatalogStore {
    fn save_reviews(
        &self,
        category: &str,
        product_num: usize,
        reviews: &[ReviewRecord],
    ) -> Result<PathBuf> {
        let path = self.reviews_path(category, product_num);
        let polls = poll_columns(reviews);
        let mut writer = Self::writer(&path)?;

        let poll_names = poll_headers(&polls);
        let header: Vec<&str> = REVIEW_LEADING_COLUMNS
            .iter()
            .copied()
            .chain(poll_names.iter().map(String::as_str))
            .chain(REVIEW_TRAILING_COLUMNS.iter().copied())
            .collect();
        writer.write_record(&header)?;
        for review in reviews {
            writer.write_record(review_row(review, &polls))?;
        }
        writer.flush()?;

        debug!("Saved {} reviews to {}", reviews.len(), path.display());
        Ok(path)
    }

    fn save_products(&self, category: &str, products: &[ProductRecord]) -> Result<PathBuf> {
        let path = self.products_path(category);
        let mut writer = Self::writer(&path)?;

        writer.write_record(PRODUCT_COLUMNS)?;
        for product in products {
            writer.write_record([
                product.category.clone(),
                opt(product.product_name.as_ref()),
                opt(product.brand_name.as_ref()),
                product.joined_flags(),
                product.url.clone(),
                opt(product.ingredients.as_ref()),
                opt(product.review_count.as_ref()),
                opt(product.overall_rating.as_ref()),
            ])?;
        }
        writer.flush()?;

        info!("Saved {} products to {}", products.len(), path.display());
        Ok(path)
    }

    fn save_reviewers(&self, category: &str, reviewers: &BTreeSet<String>) -> Result<PathBuf> {
        let path = self.reviewers_path(category);
        let mut writer = Self::writer(&path)?;

        writer.write_record(["user_code"])?;
        for code in reviewers {
            writer.write_record([code])?;
        }
        writer.flush()?;

        info!("Saved {} reviewer codes to {}", reviewers.len(), path.display());
        Ok(path)
    }

    fn save_errors(&self, errors: &ErrorLog) -> Result<PathBuf> {
        let path = self.errors_path();
        let mut writer = Self::writer(&path)?;

        writer.write_record(["url", "reason"])?;
        for entry in errors.entries() {
            writer.write_record([entry.url.clone(), entry.reason.to_string()])?;
        }
        writer.flush()?;

        info!("Saved {} error entries to {}", errors.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorReason, ProductInfo};
    use tempfile::TempDir;

    fn review(user: &str, polls: &[(&str, &str)]) -> ReviewRecord {
        ReviewRecord {
            user_id: Some(user.to_string()),
            user_code: Some(format!("{user}==")),
            user_skin_types: vec!["건성".into(), "쿨톤".into()],
            rating: Some(4.0),
            poll_answers: polls
                .iter()
                .map(|(q, a)| ((*q).to_string(), (*a).to_string()))
                .collect(),
            review_text: Some("촉촉해요".into()),
            recommend_count: Some(2),
            ..ReviewRecord::default()
        }
    }

    fn read(path: &Path) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)
            .unwrap();
        reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_review_table_unions_poll_columns() {
        let dir = TempDir::new().unwrap();
        let store = CsvCatalogStore::new(dir.path());
        let reviews = vec![
            review("a", &[("피부타입", "건성에 좋아요")]),
            review("b", &[("자극도", "순해요"), ("피부타입", "복합성에 좋아요")]),
        ];

        let path = store.save_reviews("스킨케어", 3, &reviews).unwrap();
        assert!(path.ends_with("reviews/스킨케어/스킨케어_3_reviews.csv"));

        let rows = read(&path);
        assert_eq!(rows[0][9], "item_option");
        assert_eq!(rows[0][10], "피부타입");
        assert_eq!(rows[0][11], "자극도");
        assert_eq!(rows[0][12], "review");
        assert_eq!(rows[1][11], "");
        assert_eq!(rows[2][10], "복합성에 좋아요");
        assert_eq!(rows[2][11], "순해요");
        assert_eq!(rows[1][2], "건성,쿨톤");
        assert_eq!(rows[1][6], "4");
        assert_eq!(rows[1][8], "온라인");
        assert_eq!(rows[1][13], "2");
    }

    #[test]
    fn test_poll_question_named_like_a_column_is_prefixed() {
        let dir = TempDir::new().unwrap();
        let store = CsvCatalogStore::new(dir.path());
        let reviews = vec![review("a", &[("review", "좋아요"), ("user_id", "있어요")])];

        let rows = read(&store.save_reviews("스킨케어", 0, &reviews).unwrap());

        let header = &rows[0];
        let unique: HashSet<&String> = header.iter().collect();
        assert_eq!(unique.len(), header.len());
        assert_eq!(header[10], "poll_review");
        assert_eq!(header[11], "poll_user_id");
        assert_eq!(header[12], "review");
        assert_eq!(rows[1][10], "좋아요");
        assert_eq!(rows[1][11], "있어요");
        assert_eq!(rows[1][12], "촉촉해요");
        assert_eq!(rows[1][0], "a");
    }

    #[test]
    fn test_product_table_columns() {
        let dir = TempDir::new().unwrap();
        let store = CsvCatalogStore::new(dir.path());
        let info = ProductInfo {
            brand_name: Some("라운드랩".into()),
            product_name: Some("자작나무 수분 선크림".into()),
            product_flags: vec!["세일".into(), "쿠폰".into()],
            review_count: Some(23),
            overall_rating: Some(4.8),
        };
        let products = vec![
            ProductRecord::new("선케어", "http://x/p1", info, Some("정제수".into())),
            ProductRecord::new("선케어", "http://x/p2", ProductInfo::default(), None),
        ];

        let rows = read(&store.save_products("선케어", &products).unwrap());
        assert_eq!(rows[0], PRODUCT_COLUMNS.to_vec());
        assert_eq!(
            rows[1],
            vec!["선케어", "자작나무 수분 선크림", "라운드랩", "세일,쿠폰", "http://x/p1", "정제수", "23", "4.8"]
        );
        assert_eq!(rows[2], vec!["선케어", "", "", "", "http://x/p2", "", "", ""]);
    }

    #[test]
    fn test_reviewers_are_sorted_and_unique() {
        let dir = TempDir::new().unwrap();
        let store = CsvCatalogStore::new(dir.path());
        let reviewers: BTreeSet<String> = ["b==", "a==", "b=="].iter().map(|s| (*s).to_string()).collect();

        let rows = read(&store.save_reviewers("마스크팩", &reviewers).unwrap());
        assert_eq!(rows, vec![vec!["user_code"], vec!["a=="], vec!["b=="]]);
    }

    #[test]
    fn test_error_table_uses_reason_tags() {
        let dir = TempDir::new().unwrap();
        let store = CsvCatalogStore::new(dir.path());
        let mut errors = ErrorLog::new();
        errors.record("http://x/p1", ErrorReason::Ingredients);
        errors.record("http://x/p2", ErrorReason::ReviewExtraction { page: 3, review: 7 });

        let path = store.save_errors(&errors).unwrap();
        assert!(path.ends_with("error/error_list.csv"));
        let rows = read(&path);
        assert_eq!(rows[0], vec!["url", "reason"]);
        assert_eq!(rows[1], vec!["http://x/p1", "ingredients error"]);
        assert_eq!(rows[2], vec!["http://x/p2", "extracting review error review[7] on page 3"]);
    }

    #[test]
    fn test_empty_error_log_still_writes_header() {
        let dir = TempDir::new().unwrap();
        let store = CsvCatalogStore::new(dir.path().join("nested"));
        let rows = read(&store.save_errors(&ErrorLog::new()).unwrap());
        assert_eq!(rows, vec![vec!["url", "reason"]]);
    }
}
