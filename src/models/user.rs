use crate::http::types::Timestamptz;
use crate::http::{Error, Result, ResultExt};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

#[derive(FromRow, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub profile_picture: Option<String>,
    pub created_at: Timestamptz,
}

#[derive(Clone)]
pub struct UserController {
    pool: PgPool,
}

impl UserController {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub type DynUserCtrl = Arc<dyn UserCtrlTrait + Send + Sync>;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserCtrlTrait {
    /// Fails with `400 Bad Request` if the email is already registered.
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User>;
    async fn user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn user_by_id(&self, user_id: Uuid) -> Result<Option<User>>;
    /// `None` clears the picture.
    async fn set_profile_picture(&self, user_id: Uuid, path: Option<String>) -> Result<()>;
}

#[async_trait]
impl UserCtrlTrait for UserController {
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            // language=PostgreSQL
            r#"
                insert into "user" (email, password_hash) values ($1, $2)
                returning user_id, email, password_hash, profile_picture, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        // Someone else registered the same address between our lookup and this insert.
        .on_constraint("user_email_key", |_| {
            Error::bad_request("User already exists")
        })?;

        Ok(user)
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
                select user_id, email, password_hash, profile_picture, created_at
                from "user" where email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn user_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
                select user_id, email, password_hash, profile_picture, created_at
                from "user" where user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn set_profile_picture(&self, user_id: Uuid, path: Option<String>) -> Result<()> {
        let result = sqlx::query(r#"update "user" set profile_picture = $1 where user_id = $2"#)
            .bind(path)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("User not found"));
        }

        Ok(())
    }
}
