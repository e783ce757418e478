use crate::http::types::Timestamptz;
use crate::http::{Error, Result, ResultExt};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

/// The public face of a user, embedded wherever another record points at one.
#[derive(serde::Serialize, serde::Deserialize, FromRow, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[sqlx(rename = "user_id")]
    pub id: Uuid,
    pub email: String,
    pub profile_picture: Option<String>,
}

/// A user as shown to other users: never carries the password hash.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub profile_picture: Option<String>,
    pub followers: Vec<UserSummary>,
    pub following: Vec<UserSummary>,
    pub created_at: Timestamptz,
}

#[derive(FromRow)]
struct ProfileRow {
    user_id: Uuid,
    email: String,
    profile_picture: Option<String>,
    created_at: Timestamptz,
}

#[derive(Clone)]
pub struct ProfileController {
    pool: PgPool,
}

impl ProfileController {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub type DynProfileCtrl = Arc<dyn ProfileCtrlTrait + Send + Sync>;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProfileCtrlTrait {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>>;
    async fn is_following(&self, follower: Uuid, followed: Uuid) -> Result<bool>;
    /// Returns `false` if the relationship already existed.
    async fn follow(&self, follower: Uuid, followed: Uuid) -> Result<bool>;
    /// Returns `false` if there was no relationship to remove.
    async fn unfollow(&self, follower: Uuid, followed: Uuid) -> Result<bool>;
}

#[async_trait]
impl ProfileCtrlTrait for ProfileController {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        // Read all three parts from the same snapshot so the lists agree with each other.
        // The default `read committed` would give every statement its own.
        let mut tx = self.pool.begin().await?;

        sqlx::query("set transaction isolation level repeatable read, read only")
            .execute(&mut tx)
            .await?;

        let Some(user) = sqlx::query_as::<_, ProfileRow>(
            r#"select user_id, email, profile_picture, created_at from "user" where user_id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(&mut tx)
        .await?
        else {
            return Ok(None);
        };

        let followers = sqlx::query_as::<_, UserSummary>(
            // language=PostgreSQL
            r#"
                select u.user_id, u.email, u.profile_picture
                from follow
                inner join "user" u on u.user_id = follow.following_user_id
                where follow.followed_user_id = $1
                order by follow.created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut tx)
        .await?;

        let following = sqlx::query_as::<_, UserSummary>(
            // language=PostgreSQL
            r#"
                select u.user_id, u.email, u.profile_picture
                from follow
                inner join "user" u on u.user_id = follow.followed_user_id
                where follow.following_user_id = $1
                order by follow.created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut tx)
        .await?;

        tx.commit().await?;

        Ok(Some(Profile {
            id: user.user_id,
            email: user.email,
            profile_picture: user.profile_picture,
            followers,
            following,
            created_at: user.created_at,
        }))
    }

    async fn is_following(&self, follower: Uuid, followed: Uuid) -> Result<bool> {
        let following = sqlx::query_scalar::<_, bool>(
            "select exists(select 1 from follow where following_user_id = $1 and followed_user_id = $2)",
        )
        .bind(follower)
        .bind(followed)
        .fetch_one(&self.pool)
        .await?;

        Ok(following)
    }

    /// Both sides of the relationship live in the one `follow` row, so the follower's
    /// "following" list and the target's "followers" list change together or not at all.
    async fn follow(&self, follower: Uuid, followed: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "insert into follow(following_user_id, followed_user_id) values ($1, $2) \
             on conflict do nothing", // If the row already exists, we don't need to do anything.
        )
        .bind(follower)
        .bind(followed)
        .execute(&self.pool)
        .await
        .on_constraint("user_cannot_follow_self", |_| {
            Error::bad_request("You cannot follow yourself")
        })?;

        Ok(result.rows_affected() == 1)
    }

    async fn unfollow(&self, follower: Uuid, followed: Uuid) -> Result<bool> {
        let result =
            sqlx::query("delete from follow where following_user_id = $1 and followed_user_id = $2")
                .bind(follower)
                .bind(followed)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() == 1)
    }
}
