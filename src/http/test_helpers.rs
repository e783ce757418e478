//! Shared plumbing for the handler tests: a context full of mocks, bearer tokens,
//! and a way to push a request through a router and look at what comes out.

use crate::config::Config;
use crate::http::extractor::AuthUser;
use crate::http::types::Timestamptz;
use crate::http::ApiContext;
use crate::mailer::{DynMailer, MockMailer};
use crate::models::listing::{DynListingCtrl, MockListingCtrlTrait};
use crate::models::post::{DynPostCtrl, MockPostCtrlTrait, Post};
use crate::models::profile::UserSummary;
use crate::models::MockStoreTrait;
use crate::uploads::{DynFileStore, MockFileStoreTrait};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use time::macros::datetime;
use tower::ServiceExt;
use uuid::Uuid;

pub const HMAC_KEY: &str = "Yabba Dabba Doo!";

pub const BOUNDARY: &str = "------------------------blogboundary";

pub struct Mocks {
    pub store: MockStoreTrait,
    pub files: MockFileStoreTrait,
    pub mailer: MockMailer,
}

impl Mocks {
    pub fn new() -> Self {
        Self {
            store: MockStoreTrait::new(),
            files: MockFileStoreTrait::new(),
            mailer: MockMailer::new(),
        }
    }

    pub fn into_context(self) -> ApiContext {
        ApiContext {
            config: Arc::new(Config {
                hmac_key: HMAC_KEY.to_string(),
                ..Default::default()
            }),
            store: Arc::new(self.store),
            files: Arc::new(self.files) as DynFileStore,
            mailer: Arc::new(self.mailer) as DynMailer,
        }
    }

    /// Hands out the same post controller every time the store is asked for one, so
    /// expectations hold across the whole request.
    pub fn serve_posts(&mut self, posts: MockPostCtrlTrait) {
        let posts: DynPostCtrl = Arc::new(posts);
        self.store.expect_post().returning(move || posts.clone());
    }

    pub fn serve_listing(&mut self, listing: MockListingCtrlTrait) {
        let listing: DynListingCtrl = Arc::new(listing);
        self.store.expect_listing().returning(move || listing.clone());
    }
}

pub fn bearer(user_id: Uuid) -> String {
    format!("Bearer {}", AuthUser { user_id }.to_jwt(HMAC_KEY))
}

pub fn sample_post(owner: Uuid) -> Post {
    Post {
        id: Uuid::new_v4(),
        title: "Segfaults and You".to_string(),
        content: "When raw pointers go wrong".to_string(),
        user: UserSummary {
            id: owner,
            email: "fred@example.com".to_string(),
            profile_picture: None,
        },
        images: vec![
            "/uploads/first.png".to_string(),
            "/uploads/second.png".to_string(),
        ],
        likes: vec![],
        like_count: 0,
        created_at: Timestamptz(datetime!(2024-03-01 12:00:00 UTC)),
        updated_at: Timestamptz(datetime!(2024-03-01 12:00:00 UTC)),
    }
}

/// Runs one request through `app` and returns the status with the body parsed as JSON
/// (`Value::Null` for an empty or non-JSON body).
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    println!("response: {}", String::from_utf8_lossy(&body));
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

/// One part of a hand-built multipart body.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    /// field name, file name, content type, bytes
    File(&'a str, &'a str, &'a str, &'a [u8]),
}

pub fn multipart_body(parts: &[Part<'_>]) -> Body {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, file_name, content_type, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}
