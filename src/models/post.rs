use crate::http::types::Timestamptz;
use crate::http::{Error, Result};
use crate::models::profile::UserSummary;
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    /// The owner.
    pub user: UserSummary,
    /// Public paths, in upload order. `DELETE /posts/:id/images/:imageIndex` indexes into this.
    pub images: Vec<String>,
    pub likes: Vec<Uuid>,
    pub like_count: usize,
    pub created_at: Timestamptz,
    pub updated_at: Timestamptz,
}

impl Post {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user.id == user_id
    }

    pub fn is_liked_by(&self, user_id: Uuid) -> bool {
        self.likes.contains(&user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub images: Vec<String>,
}

/// `None` leaves a field as it is; `new_images` are appended after the existing ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatePost {
    pub title: Option<String>,
    pub content: Option<String>,
    pub new_images: Vec<String>,
}

// Same trick as everywhere else a nested object comes back from a query: select the owner's
// columns flattened into the row, then fix up the structure afterwards.
#[derive(FromRow)]
pub struct PostFromQuery {
    pub post_id: Uuid,
    pub title: String,
    pub content: String,
    pub images: Vec<String>,
    pub likes: Vec<Uuid>,
    pub created_at: Timestamptz,
    pub updated_at: Timestamptz,
    pub author_id: Uuid,
    pub author_email: String,
    pub author_profile_picture: Option<String>,
}

impl PostFromQuery {
    pub fn into_post(self) -> Post {
        Post {
            id: self.post_id,
            title: self.title,
            content: self.content,
            user: UserSummary {
                id: self.author_id,
                email: self.author_email,
                profile_picture: self.author_profile_picture,
            },
            images: self.images,
            like_count: self.likes.len(),
            likes: self.likes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Every query returning `Post`s starts from this and appends its own `where`/`order by`.
pub(crate) const SELECT_POSTS: &str = r#"
    select
        post.post_id,
        post.title,
        post.content,
        post.images,
        array(
            select l.user_id from post_like l
            where l.post_id = post.post_id
            order by l.created_at
        ) "likes",
        post.created_at,
        post.updated_at,
        author.user_id author_id,
        author.email author_email,
        author.profile_picture author_profile_picture
    from post
    inner join "user" author using (user_id)
"#;

#[derive(Clone)]
pub struct PostController {
    pool: PgPool,
}

impl PostController {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub type DynPostCtrl = Arc<dyn PostCtrlTrait + Send + Sync>;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PostCtrlTrait {
    async fn post_by_id(&self, post_id: Uuid) -> Result<Option<Post>>;
    /// Newest first.
    async fn posts_by_user(&self, user_id: Uuid) -> Result<Vec<Post>>;
    async fn create_post(&self, user_id: Uuid, post: NewPost) -> Result<Post>;
    async fn update_post(&self, post_id: Uuid, update: UpdatePost) -> Result<Post>;
    async fn delete_post(&self, post_id: Uuid) -> Result<()>;
    /// Splices out the image at `index`. Returns `false` if the index was out of range.
    async fn remove_image(&self, post_id: Uuid, index: usize) -> Result<bool>;
    /// Returns `false` if `user_id` already liked the post.
    async fn like(&self, post_id: Uuid, user_id: Uuid) -> Result<bool>;
    /// Returns `false` if `user_id` had not liked the post.
    async fn unlike(&self, post_id: Uuid, user_id: Uuid) -> Result<bool>;
}

#[async_trait]
impl PostCtrlTrait for PostController {
    async fn post_by_id(&self, post_id: Uuid) -> Result<Option<Post>> {
        let sql = format!("{SELECT_POSTS} where post.post_id = $1");

        let post = sqlx::query_as::<_, PostFromQuery>(&sql)
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await?
            .map(PostFromQuery::into_post);

        Ok(post)
    }

    async fn posts_by_user(&self, user_id: Uuid) -> Result<Vec<Post>> {
        let sql = format!(
            "{SELECT_POSTS} where post.user_id = $1 order by post.created_at desc, post.post_id"
        );

        let posts: Vec<_> = sqlx::query_as::<_, PostFromQuery>(&sql)
            .bind(user_id)
            .fetch(&self.pool)
            .map_ok(PostFromQuery::into_post)
            .try_collect()
            .await?;

        Ok(posts)
    }

    async fn create_post(&self, user_id: Uuid, post: NewPost) -> Result<Post> {
        let post_id = sqlx::query_scalar::<_, Uuid>(
            // language=PostgreSQL
            r#"
                insert into post (user_id, title, content, images)
                values ($1, $2, $3, $4)
                returning post_id
            "#,
        )
        .bind(user_id)
        .bind(post.title)
        .bind(post.content)
        .bind(post.images)
        .fetch_one(&self.pool)
        .await?;

        self.post_by_id(post_id)
            .await?
            .ok_or_else(|| Error::not_found("Post not found"))
    }

    async fn update_post(&self, post_id: Uuid, update: UpdatePost) -> Result<Post> {
        let result = sqlx::query(
            // language=PostgreSQL
            r#"
                update post
                set
                    title = coalesce($1, title),
                    content = coalesce($2, content),
                    -- new uploads go after the ones already there
                    images = images || $3::text[]
                where post_id = $4
            "#,
        )
        .bind(update.title)
        .bind(update.content)
        .bind(update.new_images)
        .bind(post_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("Post not found"));
        }

        self.post_by_id(post_id)
            .await?
            .ok_or_else(|| Error::not_found("Post not found"))
    }

    async fn delete_post(&self, post_id: Uuid) -> Result<()> {
        // Likes go with it via `on delete cascade`.
        sqlx::query("delete from post where post_id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn remove_image(&self, post_id: Uuid, index: usize) -> Result<bool> {
        let Ok(index) = i32::try_from(index) else {
            return Ok(false);
        };

        let result = sqlx::query(
            // language=PostgreSQL
            r#"
                -- Postgres arrays are 1-based: keep everything before position `$2 + 1`
                -- and everything after it.
                update post
                set images = images[1:$2] || images[($2 + 2):]
                where post_id = $1 and cardinality(images) > $2
            "#,
        )
        .bind(post_id)
        .bind(index)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn like(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "insert into post_like(post_id, user_id) values ($1, $2) on conflict do nothing",
        )
        .bind(post_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn unlike(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("delete from post_like where post_id = $1 and user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}
