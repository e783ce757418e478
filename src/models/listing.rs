use crate::http::{Error, Result};
use crate::models::post::{Post, PostFromQuery, SELECT_POSTS};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_LIMIT: i64 = 6;

/// Query string of `GET /posts`.
///
/// Everything is optional; see `DEFAULT_PAGE`, `DEFAULT_LIMIT` and `SortKey::default()`.
#[derive(serde::Deserialize, Default, Debug)]
#[serde(default)]
pub struct ListPostsQuery {
    /// Case-insensitive substring matched against title or content.
    pub search: Option<String>,
    /// A field name, optionally prefixed with `-` for descending order, e.g. `-createdAt`.
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Classic page-number pagination.
///
/// Unlike cursor pagination this lets the frontend render "page 3 of 7", which is what it asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Result<Self> {
        let page = page.unwrap_or(DEFAULT_PAGE);
        let limit = limit.unwrap_or(DEFAULT_LIMIT);

        if page < 1 {
            return Err(Error::bad_request("page must be at least 1"));
        }

        if limit < 1 {
            return Err(Error::bad_request("limit must be at least 1"));
        }

        Ok(Self { page, limit })
    }

    /// Rows to skip: `(page - 1) * limit`.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// `ceil(total / limit)`; zero posts means zero pages.
    pub fn total_pages(&self, total: i64) -> i64 {
        if total <= 0 {
            return 0;
        }

        total / self.limit + i64::from(total % self.limit != 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

impl Default for SortKey {
    /// Newest first.
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            descending: true,
        }
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (descending, name) = match s.strip_prefix('-') {
            Some(name) => (true, name),
            None => (false, s),
        };

        let field = match name {
            "createdAt" => SortField::CreatedAt,
            "updatedAt" => SortField::UpdatedAt,
            "title" => SortField::Title,
            _ => return Err(Error::bad_request(format!("cannot sort by {s:?}"))),
        };

        Ok(Self { field, descending })
    }
}

impl SortKey {
    /// The `order by` clause for this key.
    ///
    /// This is spliced into the query text, which is only okay because every possible output
    /// is one of the literals below.
    fn order_by(&self) -> &'static str {
        match (self.field, self.descending) {
            (SortField::CreatedAt, false) => "post.created_at asc, post.post_id",
            (SortField::CreatedAt, true) => "post.created_at desc, post.post_id",
            (SortField::UpdatedAt, false) => "post.updated_at asc, post.post_id",
            (SortField::UpdatedAt, true) => "post.updated_at desc, post.post_id",
            (SortField::Title, false) => "post.title asc, post.post_id",
            (SortField::Title, true) => "post.title desc, post.post_id",
        }
    }
}

/// The validated form of `ListPostsQuery`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostFilter {
    pub search: Option<String>,
    pub sort: SortKey,
    pub pagination: Pagination,
}

impl TryFrom<ListPostsQuery> for PostFilter {
    type Error = Error;

    fn try_from(query: ListPostsQuery) -> Result<Self> {
        Ok(Self {
            // `?search=` means no filter at all.
            search: query.search.filter(|s| !s.is_empty()),
            sort: query
                .sort
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<SortKey>())
                .transpose()?
                .unwrap_or_default(),
            pagination: Pagination::new(query.page, query.limit)?,
        })
    }
}

/// Turns a search term into an `ilike` pattern that matches it literally anywhere in the text.
fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[derive(Clone)]
pub struct ListingController {
    pool: PgPool,
}

impl ListingController {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub type DynListingCtrl = Arc<dyn ListingCtrlTrait + Send + Sync>;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ListingCtrlTrait {
    /// One page of posts matching `filter`.
    async fn list_posts(&self, filter: PostFilter) -> Result<Vec<Post>>;
    /// How many posts match `search` across all pages.
    async fn count_posts(&self, search: Option<String>) -> Result<i64>;
}

#[async_trait]
impl ListingCtrlTrait for ListingController {
    async fn list_posts(&self, filter: PostFilter) -> Result<Vec<Post>> {
        let sql = format!(
            // language=PostgreSQL
            r#"
                {SELECT_POSTS}
                where ($1::text is null or post.title ilike $1 or post.content ilike $1)
                order by {}
                limit $2
                offset $3
            "#,
            filter.sort.order_by()
        );

        let posts: Vec<_> = sqlx::query_as::<_, PostFromQuery>(&sql)
            .bind(filter.search.as_deref().map(like_pattern))
            .bind(filter.pagination.limit)
            .bind(filter.pagination.offset())
            .fetch(&self.pool)
            .map_ok(PostFromQuery::into_post)
            .try_collect()
            .await?;

        Ok(posts)
    }

    async fn count_posts(&self, search: Option<String>) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
                select count(*)
                from post
                where ($1::text is null or post.title ilike $1 or post.content ilike $1)
            "#,
        )
        .bind(search.as_deref().map(like_pattern))
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
