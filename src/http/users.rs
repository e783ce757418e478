use crate::http::extractor::{AuthUser, Json, Path};
use crate::http::types::MessageBody;
use crate::http::{ApiContext, Error, Result};
use crate::models::profile::{DynProfileCtrl, Profile};
use anyhow::Context;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn router() -> Router<ApiContext> {
    Router::new()
        .route("/user/register", post(register_user))
        .route("/user/login", post(login_user))
        .route("/user/profile", get(get_current_profile))
        .route("/user/:user_id", get(get_profile_by_id))
}

/// Body of both `register` and `login`.
///
/// Missing fields deserialize as empty strings so we can answer with our own 400
/// instead of the JSON extractor's rejection.
#[derive(serde::Serialize, serde::Deserialize, Default)]
#[serde(default)]
struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    fn require_both(&self) -> Result<()> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(Error::bad_request("Email and password are required"));
        }
        Ok(())
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct Account {
    id: Uuid,
    email: String,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct RegisteredBody {
    #[serde(flatten)]
    message: MessageBody,
    user: Account,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct LoginBody {
    token: String,
    user: Account,
}

// POST /user/register
async fn register_user(
    ctx: State<ApiContext>,
    Json(req): Json<Credentials>,
) -> Result<(StatusCode, Json<RegisteredBody>)> {
    req.require_both()?;

    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let email = req.email.trim();
    let users = ctx.store.user();

    if users.user_by_email(email).await?.is_some() {
        return Err(Error::bad_request("User already exists"));
    }

    let password_hash = hash_password(req.password).await?;

    // The unique constraint backs up the check above if two registrations race.
    let user = users.create_user(email, &password_hash).await?;

    // The account is kept even if this fails; the client just sees a 500.
    ctx.mailer
        .send_welcome(&user.email)
        .await
        .with_context(|| format!("failed to send welcome mail to {}", user.email))?;

    Ok((
        StatusCode::CREATED,
        Json(RegisteredBody {
            message: MessageBody::new("User registered successfully"),
            user: Account {
                id: user.user_id,
                email: user.email,
            },
        }),
    ))
}

// POST /user/login
async fn login_user(
    ctx: State<ApiContext>,
    Json(req): Json<Credentials>,
) -> Result<Json<LoginBody>> {
    req.require_both()?;

    // Same answer for an unknown email and a wrong password, so this can't be used to probe
    // which addresses are registered.
    let user = ctx
        .store
        .user()
        .user_by_email(req.email.trim())
        .await?
        .ok_or_else(invalid_credentials)?;

    verify_password(req.password, user.password_hash).await?;

    Ok(Json(LoginBody {
        token: AuthUser {
            user_id: user.user_id,
        }
        .to_jwt(&ctx.config.hmac_key),
        user: Account {
            id: user.user_id,
            email: user.email,
        },
    }))
}

// GET /user/profile
async fn get_current_profile(
    auth_user: AuthUser,
    profile_controller: State<DynProfileCtrl>,
) -> Result<Json<Profile>> {
    let profile = profile_controller
        .get_profile(auth_user.user_id)
        .await?
        .ok_or_else(user_not_found)?;

    Ok(Json(profile))
}

// GET /user/:user_id
async fn get_profile_by_id(
    Path(user_id): Path<Uuid>,
    profile_controller: State<DynProfileCtrl>,
) -> Result<Json<Profile>> {
    let profile = profile_controller
        .get_profile(user_id)
        .await?
        .ok_or_else(user_not_found)?;

    Ok(Json(profile))
}

pub(in crate::http) fn user_not_found() -> Error {
    Error::not_found("User not found")
}

fn invalid_credentials() -> Error {
    Error::unauthorized("Invalid email or password")
}

async fn hash_password(password: String) -> Result<String> {
    // Argon2 hashing is designed to be computationally intensive,
    // so we need to do this on a blocking thread.
    tokio::task::spawn_blocking(move || -> Result<String> {
        let salt = SaltString::generate(rand::thread_rng());
        Ok(PasswordHash::generate(Argon2::default(), password, &salt)
            .map_err(|e| anyhow::anyhow!("failed to generate password hash: {}", e))?
            .to_string())
    })
    .await
    .context("panic in generating password hash")?
}

async fn verify_password(password: String, password_hash: String) -> Result<()> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        let hash = PasswordHash::new(&password_hash)
            .map_err(|e| anyhow::anyhow!("invalid password hash: {}", e))?;

        hash.verify_password(&[&Argon2::default()], password)
            .map_err(|e| match e {
                argon2::password_hash::Error::Password => invalid_credentials(),
                _ => anyhow::anyhow!("failed to verify password hash: {}", e).into(),
            })
    })
    .await
    .context("panic in verifying password hash")?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_helpers::{bearer, send, Mocks};
    use crate::http::types::Timestamptz;
    use crate::models::profile::{MockProfileCtrlTrait, UserSummary};
    use crate::models::user::{MockUserCtrlTrait, User};
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use mockall::predicate::*;
    use serde_json::json;
    use std::sync::Arc;
    use time::macros::datetime;

    fn sample_user(email: &str, password_hash: &str) -> User {
        User {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            profile_picture: None,
            created_at: Timestamptz(datetime!(2024-01-01 0:00 UTC)),
        }
    }

    fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// A store whose user controller is built fresh by `make` on every `store.user()` call.
    fn with_users(mocks: &mut Mocks, make: impl Fn() -> MockUserCtrlTrait + Send + Sync + 'static) {
        mocks
            .store
            .expect_user()
            .returning(move || Arc::new(make()));
    }

    #[tokio::test]
    async fn register_rejects_short_password() {
        // No expectations: touching the store at all would panic.
        let app = router().with_state(Mocks::new().into_context());

        let (status, body) = send(
            app,
            json_request(
                "/user/register",
                json!({ "email": "fred@example.com", "password": "12345" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Password must be at least 6 characters");
    }

    #[tokio::test]
    async fn register_requires_email_and_password() {
        let app = router().with_state(Mocks::new().into_context());

        let (status, body) = send(
            app,
            json_request("/user/register", json!({ "email": "fred@example.com" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Email and password are required");
    }

    #[tokio::test]
    async fn register_creates_user_and_sends_welcome() {
        let mut mocks = Mocks::new();
        with_users(&mut mocks, || {
            let mut users = MockUserCtrlTrait::new();
            users
                .expect_user_by_email()
                .with(eq("fred@example.com"))
                .returning(|_| Ok(None));
            users
                .expect_create_user()
                .withf(|email, hash| email == "fred@example.com" && hash.starts_with("$argon2"))
                .times(1)
                .returning(|email, hash| Ok(sample_user(email, hash)));
            users
        });
        mocks
            .mailer
            .expect_send_welcome()
            .with(eq("fred@example.com"))
            .times(1)
            .returning(|_| Ok(()));

        let app = router().with_state(mocks.into_context());
        let (status, body) = send(
            app,
            json_request(
                "/user/register",
                json!({ "email": "fred@example.com", "password": "yabbadabbadoo" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "User registered successfully");
        assert_eq!(body["user"]["email"], "fred@example.com");
        assert!(body["user"].get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn register_twice_is_rejected() {
        let mut mocks = Mocks::new();
        with_users(&mut mocks, || {
            let mut users = MockUserCtrlTrait::new();
            users
                .expect_user_by_email()
                .returning(|email| Ok(Some(sample_user(email, "$argon2id$..."))));
            // `create_user` has no expectation, so reaching it would fail the test.
            users
        });

        let app = router().with_state(mocks.into_context());
        let (status, body) = send(
            app,
            json_request(
                "/user/register",
                json!({ "email": "fred@example.com", "password": "yabbadabbadoo" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "User already exists");
    }

    #[tokio::test]
    async fn mail_failure_is_500_but_user_is_created() {
        let mut mocks = Mocks::new();
        with_users(&mut mocks, || {
            let mut users = MockUserCtrlTrait::new();
            users.expect_user_by_email().returning(|_| Ok(None));
            users
                .expect_create_user()
                .times(1)
                .returning(|email, hash| Ok(sample_user(email, hash)));
            users
        });
        mocks
            .mailer
            .expect_send_welcome()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("smtp down")));

        let app = router().with_state(mocks.into_context());
        let (status, body) = send(
            app,
            json_request(
                "/user/register",
                json!({ "email": "fred@example.com", "password": "yabbadabbadoo" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        // The relay's error stays in the log.
        assert!(!body.to_string().contains("smtp down"));
    }

    #[tokio::test]
    async fn malformed_json_gets_message_body() {
        let app = router().with_state(Mocks::new().into_context());
        let (status, body) = send(
            app,
            Request::builder()
                .method(Method::POST)
                .uri("/user/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"email": "fred@example.com", "#))
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string(), "{body}");
    }

    #[tokio::test]
    async fn non_uuid_profile_id_gets_message_body() {
        let app = router().with_state(Mocks::new().into_context());
        let (status, body) = send(
            app,
            Request::builder()
                .uri("/user/not-a-uuid")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string(), "{body}");
    }

    #[tokio::test]
    async fn login_issues_token_for_correct_password() {
        let hash = hash_password("yabbadabbadoo".to_string()).await.unwrap();
        let user = sample_user("fred@example.com", &hash);
        let user_id = user.user_id;

        let mut mocks = Mocks::new();
        with_users(&mut mocks, move || {
            let user = user.clone();
            let mut users = MockUserCtrlTrait::new();
            users
                .expect_user_by_email()
                .returning(move |_| Ok(Some(user.clone())));
            users
        });

        let app = router().with_state(mocks.into_context());
        let (status, body) = send(
            app,
            json_request(
                "/user/login",
                json!({ "email": "fred@example.com", "password": "yabbadabbadoo" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["id"], user_id.to_string());

        // The token we got back is accepted by the extractor.
        let token = body["token"].as_str().unwrap();
        let mut mocks = Mocks::new();
        mocks.store.expect_profile().returning(move || {
            let mut profiles = MockProfileCtrlTrait::new();
            profiles
                .expect_get_profile()
                .with(eq(user_id))
                .returning(|id| {
                    Ok(Some(Profile {
                        id,
                        email: "fred@example.com".to_string(),
                        profile_picture: None,
                        followers: vec![],
                        following: vec![],
                        created_at: Timestamptz(datetime!(2024-01-01 0:00 UTC)),
                    }))
                });
            Arc::new(profiles)
        });
        let app = router().with_state(mocks.into_context());
        let (status, _) = send(
            app,
            Request::builder()
                .uri("/user/profile")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let hash = hash_password("yabbadabbadoo".to_string()).await.unwrap();
        let user = sample_user("fred@example.com", &hash);

        let mut mocks = Mocks::new();
        with_users(&mut mocks, move || {
            let user = user.clone();
            let mut users = MockUserCtrlTrait::new();
            users
                .expect_user_by_email()
                .returning(move |_| Ok(Some(user.clone())));
            users
        });

        let app = router().with_state(mocks.into_context());
        let (status, body) = send(
            app,
            json_request(
                "/user/login",
                json!({ "email": "fred@example.com", "password": "wilma" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid email or password");
    }

    #[tokio::test]
    async fn login_rejects_unknown_email() {
        let mut mocks = Mocks::new();
        with_users(&mut mocks, || {
            let mut users = MockUserCtrlTrait::new();
            users.expect_user_by_email().returning(|_| Ok(None));
            users
        });

        let app = router().with_state(mocks.into_context());
        let (status, body) = send(
            app,
            json_request(
                "/user/login",
                json!({ "email": "nobody@example.com", "password": "whatever" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid email or password");
    }

    #[tokio::test]
    async fn profile_requires_token() {
        let app = router().with_state(Mocks::new().into_context());

        let (status, body) = send(
            app,
            Request::builder()
                .uri("/user/profile")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "No token, authorization denied");
    }

    #[tokio::test]
    async fn profile_by_id_expands_relationships() {
        let user_id = Uuid::new_v4();
        let follower = UserSummary {
            id: Uuid::new_v4(),
            email: "barney@example.com".to_string(),
            profile_picture: Some("/uploads/barney.png".to_string()),
        };

        let mut mocks = Mocks::new();
        mocks.store.expect_profile().returning(move || {
            let follower = follower.clone();
            let mut profiles = MockProfileCtrlTrait::new();
            profiles
                .expect_get_profile()
                .with(eq(user_id))
                .returning(move |id| {
                    Ok(Some(Profile {
                        id,
                        email: "fred@example.com".to_string(),
                        profile_picture: None,
                        followers: vec![follower.clone()],
                        following: vec![],
                        created_at: Timestamptz(datetime!(2024-01-01 0:00 UTC)),
                    }))
                });
            Arc::new(profiles)
        });

        let app = router().with_state(mocks.into_context());
        let (status, body) = send(
            app,
            Request::builder()
                .uri(format!("/user/{user_id}"))
                .header(header::AUTHORIZATION, bearer(Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["followers"][0]["email"], "barney@example.com");
        assert_eq!(body["followers"][0]["profilePicture"], "/uploads/barney.png");
        assert!(body.get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn unknown_profile_is_404() {
        let mut mocks = Mocks::new();
        mocks.store.expect_profile().returning(|| {
            let mut profiles = MockProfileCtrlTrait::new();
            profiles.expect_get_profile().returning(|_| Ok(None));
            Arc::new(profiles)
        });

        let app = router().with_state(mocks.into_context());
        let (status, body) = send(
            app,
            Request::builder()
                .uri(format!("/user/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "User not found");
    }
}
