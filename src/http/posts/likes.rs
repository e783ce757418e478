use axum::extract::State;
use axum::routing::post;
use axum::Router;
use uuid::Uuid;

use crate::http::extractor::{AuthUser, Json, Path};
use crate::http::posts::posts::post_not_found;
use crate::http::types::MessageBody;
use crate::http::{ApiContext, Error, Result};
use crate::models::post::DynPostCtrl;

pub(super) fn router() -> Router<ApiContext> {
    Router::new()
        .route("/posts/:post_id/like", post(like_post))
        .route("/posts/:post_id/unlike", post(unlike_post))
}

// POST /posts/:id/like
async fn like_post(
    auth_user: AuthUser,
    Path(post_id): Path<Uuid>,
    State(posts): State<DynPostCtrl>,
) -> Result<Json<MessageBody>> {
    let post = posts.post_by_id(post_id).await?.ok_or_else(post_not_found)?;

    if post.is_liked_by(auth_user.user_id) {
        return Err(already_liked());
    }

    // Lost a race with another request from the same user.
    if !posts.like(post_id, auth_user.user_id).await? {
        return Err(already_liked());
    }

    Ok(Json(MessageBody::new("Post liked successfully")))
}

// POST /posts/:id/unlike
async fn unlike_post(
    auth_user: AuthUser,
    Path(post_id): Path<Uuid>,
    State(posts): State<DynPostCtrl>,
) -> Result<Json<MessageBody>> {
    let post = posts.post_by_id(post_id).await?.ok_or_else(post_not_found)?;

    if !post.is_liked_by(auth_user.user_id) {
        return Err(not_liked());
    }

    if !posts.unlike(post_id, auth_user.user_id).await? {
        return Err(not_liked());
    }

    Ok(Json(MessageBody::new("Post unliked successfully")))
}

fn already_liked() -> Error {
    Error::bad_request("Post already liked")
}

fn not_liked() -> Error {
    Error::bad_request("Post not liked")
}
