use crate::http::extractor::{AuthUser, Json, Path};
use crate::http::multipart::Form;
use crate::http::types::MessageBody;
use crate::http::users::user_not_found;
use crate::http::{ApiContext, Error, Result};
use axum::extract::{Multipart, State};
use axum::routing::post;
use axum::Router;
use uuid::Uuid;

pub(crate) fn router() -> Router<ApiContext> {
    Router::new()
        .route(
            "/user/profile-picture",
            post(upload_profile_picture).delete(delete_profile_picture),
        )
        .route("/user/follow/:user_id", post(follow_user))
        .route("/user/unfollow/:user_id", post(unfollow_user))
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfilePictureBody {
    #[serde(flatten)]
    message: MessageBody,
    profile_picture: String,
}

// POST /user/profile-picture
async fn upload_profile_picture(
    auth_user: AuthUser,
    ctx: State<ApiContext>,
    multipart: Multipart,
) -> Result<Json<ProfilePictureBody>> {
    let mut form = Form::read(multipart, "profilePicture", 1).await?;
    let file = form
        .files
        .pop()
        .ok_or_else(|| Error::bad_request("No file uploaded"))?;

    let users = ctx.store.user();
    let user = users
        .user_by_id(auth_user.user_id)
        .await?
        .ok_or_else(user_not_found)?;

    let new_path = ctx.files.save(file).await?;

    // The row is switched over before the old file goes, so it never points at a missing file.
    if let Err(e) = users
        .set_profile_picture(user.user_id, Some(new_path.clone()))
        .await
    {
        // Nothing points at the new file, don't leave it lying around.
        if let Err(cleanup) = ctx.files.remove(&new_path).await {
            log::warn!("failed to clean up {}: {:?}", new_path, cleanup);
        }
        return Err(e);
    }

    // Past this point a failure only leaves an orphaned file behind.
    if let Some(old_path) = &user.profile_picture {
        if let Err(e) = ctx.files.remove(old_path).await {
            log::warn!("failed to remove old profile picture {}: {:?}", old_path, e);
        }
    }

    Ok(Json(ProfilePictureBody {
        message: MessageBody::new("Profile picture uploaded successfully"),
        profile_picture: new_path,
    }))
}

// DELETE /user/profile-picture
async fn delete_profile_picture(
    auth_user: AuthUser,
    ctx: State<ApiContext>,
) -> Result<Json<MessageBody>> {
    let users = ctx.store.user();
    let user = users
        .user_by_id(auth_user.user_id)
        .await?
        .ok_or_else(user_not_found)?;

    let path = user
        .profile_picture
        .ok_or_else(|| Error::bad_request("No profile picture to delete"))?;

    ctx.files.remove(&path).await?;
    users.set_profile_picture(user.user_id, None).await?;

    Ok(Json(MessageBody::new("Profile picture deleted successfully")))
}

// POST /user/follow/:user_id
async fn follow_user(
    auth_user: AuthUser,
    ctx: State<ApiContext>,
    Path(target): Path<Uuid>,
) -> Result<Json<MessageBody>> {
    if auth_user.user_id == target {
        return Err(Error::bad_request("You cannot follow yourself"));
    }

    ctx.store
        .user()
        .user_by_id(target)
        .await?
        .ok_or_else(user_not_found)?;

    let profiles = ctx.store.profile();

    if profiles.is_following(auth_user.user_id, target).await? {
        return Err(already_following());
    }

    // Someone else may have gotten there between the check and here; same answer.
    if !profiles.follow(auth_user.user_id, target).await? {
        return Err(already_following());
    }

    Ok(Json(MessageBody::new("User followed successfully")))
}

// POST /user/unfollow/:user_id
async fn unfollow_user(
    auth_user: AuthUser,
    ctx: State<ApiContext>,
    Path(target): Path<Uuid>,
) -> Result<Json<MessageBody>> {
    if auth_user.user_id == target {
        return Err(Error::bad_request("You cannot unfollow yourself"));
    }

    ctx.store
        .user()
        .user_by_id(target)
        .await?
        .ok_or_else(user_not_found)?;

    let profiles = ctx.store.profile();

    if !profiles.is_following(auth_user.user_id, target).await? {
        return Err(not_following());
    }

    if !profiles.unfollow(auth_user.user_id, target).await? {
        return Err(not_following());
    }

    Ok(Json(MessageBody::new("User unfollowed successfully")))
}

fn already_following() -> Error {
    Error::bad_request("Already following this user")
}

fn not_following() -> Error {
    Error::bad_request("Not following this user")
}
