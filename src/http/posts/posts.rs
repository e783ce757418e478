use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::Router;
use uuid::Uuid;

use crate::http::extractor::{AuthUser, Json, Path};
use crate::http::multipart::Form;
use crate::http::types::MessageBody;
use crate::http::{ApiContext, Error, Result};
use crate::models::post::{DynPostCtrl, NewPost, Post, UpdatePost};
use crate::uploads::UploadedFile;

use crate::http::posts::likes::router as likes_router;
use crate::http::posts::listing;

/// Form field the images of a post are uploaded under.
const IMAGES_FIELD: &str = "images";

const MAX_POST_IMAGES: usize = 5;

pub(crate) fn router() -> Router<ApiContext> {
    // Same deal as with users: every verb under one path has to be registered in one place,
    // so the listing handlers are routed from here.
    Router::new()
        .route("/posts", get(listing::list_posts).post(create_post))
        .route("/posts/user/posts", get(listing::user_posts))
        .route(
            "/posts/:post_id",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/posts/:post_id/images/:image_index", delete(delete_image))
        .merge(likes_router())
}

// GET /posts/:id
async fn get_post(ctx: State<ApiContext>, Path(post_id): Path<Uuid>) -> Result<Json<Post>> {
    let post = ctx
        .store
        .post()
        .post_by_id(post_id)
        .await?
        .ok_or_else(post_not_found)?;

    Ok(Json(post))
}

// POST /posts
async fn create_post(
    auth_user: AuthUser,
    ctx: State<ApiContext>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Post>)> {
    let mut form = Form::read(multipart, IMAGES_FIELD, MAX_POST_IMAGES).await?;

    let (Some(title), Some(content)) = (form.take_text("title"), form.take_text("content")) else {
        return Err(Error::bad_request("Title and content are required"));
    };

    let images = store_files(&ctx, form.files).await?;

    let created = ctx
        .store
        .post()
        .create_post(
            auth_user.user_id,
            NewPost {
                title,
                content,
                images: images.clone(),
            },
        )
        .await;

    match created {
        Ok(post) => Ok((StatusCode::CREATED, Json(post))),
        Err(e) => {
            discard_files(&ctx, &images).await;
            Err(e)
        }
    }
}

// PUT /posts/:id
async fn update_post(
    auth_user: AuthUser,
    ctx: State<ApiContext>,
    Path(post_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Post>> {
    let posts = ctx.store.post();

    // Check ownership before anything in the body gets looked at.
    owned_post(&posts, post_id, auth_user, "update this post").await?;

    let mut form = Form::read(multipart, IMAGES_FIELD, MAX_POST_IMAGES).await?;
    let title = form.take_text("title");
    let content = form.take_text("content");
    let new_images = store_files(&ctx, form.files).await?;

    let updated = posts
        .update_post(
            post_id,
            UpdatePost {
                title,
                content,
                new_images: new_images.clone(),
            },
        )
        .await;

    match updated {
        Ok(post) => Ok(Json(post)),
        Err(e) => {
            discard_files(&ctx, &new_images).await;
            Err(e)
        }
    }
}

// DELETE /posts/:id
async fn delete_post(
    auth_user: AuthUser,
    ctx: State<ApiContext>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<MessageBody>> {
    let posts = ctx.store.post();
    let post = owned_post(&posts, post_id, auth_user, "delete this post").await?;

    for image in &post.images {
        ctx.files.remove(image).await?;
    }

    posts.delete_post(post_id).await?;

    Ok(Json(MessageBody::new("Post deleted successfully")))
}

// DELETE /posts/:id/images/:imageIndex
async fn delete_image(
    auth_user: AuthUser,
    ctx: State<ApiContext>,
    Path((post_id, image_index)): Path<(Uuid, String)>,
) -> Result<Json<MessageBody>> {
    let posts = ctx.store.post();
    let post = owned_post(&posts, post_id, auth_user, "delete this image").await?;

    let index = image_index
        .parse::<usize>()
        .ok()
        .filter(|&index| index < post.images.len())
        .ok_or_else(invalid_image_index)?;

    ctx.files.remove(&post.images[index]).await?;

    // The array may have shrunk since we read it.
    if !posts.remove_image(post_id, index).await? {
        return Err(invalid_image_index());
    }

    Ok(Json(MessageBody::new("Image deleted successfully")))
}

/// Fetches a post for a mutation by `auth_user`: 404 if it doesn't exist, 403 if it isn't theirs.
async fn owned_post(
    posts: &DynPostCtrl,
    post_id: Uuid,
    auth_user: AuthUser,
    action: &str,
) -> Result<Post> {
    let post = posts.post_by_id(post_id).await?.ok_or_else(post_not_found)?;

    if !post.is_owned_by(auth_user.user_id) {
        return Err(Error::forbidden(format!(
            "You don't have permission to {action}"
        )));
    }

    Ok(post)
}

pub(super) fn post_not_found() -> Error {
    Error::not_found("Post not found")
}

fn invalid_image_index() -> Error {
    Error::bad_request("Invalid image index")
}

/// Writes out every file, returning their public paths in upload order.
///
/// If one of them fails, the ones already written are removed again.
async fn store_files(ctx: &ApiContext, files: Vec<UploadedFile>) -> Result<Vec<String>> {
    let mut paths = Vec::with_capacity(files.len());

    for file in files {
        match ctx.files.save(file).await {
            Ok(path) => paths.push(path),
            Err(e) => {
                discard_files(ctx, &paths).await;
                return Err(e.into());
            }
        }
    }

    Ok(paths)
}

async fn discard_files(ctx: &ApiContext, paths: &[String]) {
    for path in paths {
        if let Err(e) = ctx.files.remove(path).await {
            log::warn!("failed to clean up {}: {:?}", path, e);
        }
    }
}
