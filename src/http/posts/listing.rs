use axum::extract::State;

use crate::http::extractor::{AuthUser, Json, Query};
use crate::http::Result;
use crate::models::listing::{DynListingCtrl, ListPostsQuery, PostFilter};
use crate::models::post::{DynPostCtrl, Post};

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::http) struct PostPage {
    posts: Vec<Post>,
    total_posts: i64,
    total_pages: i64,
    current_page: i64,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub(in crate::http) struct PostsBody {
    posts: Vec<Post>,
}

// GET /posts?search&sort&page&limit
pub(in crate::http) async fn list_posts(
    Query(query): Query<ListPostsQuery>,
    State(listing): State<DynListingCtrl>,
) -> Result<Json<PostPage>> {
    let filter = PostFilter::try_from(query)?;
    let pagination = filter.pagination;

    let total_posts = listing.count_posts(filter.search.clone()).await?;
    let posts = listing.list_posts(filter).await?;

    Ok(Json(PostPage {
        posts,
        total_posts,
        total_pages: pagination.total_pages(total_posts),
        current_page: pagination.page,
    }))
}

// GET /posts/user/posts
pub(in crate::http) async fn user_posts(
    auth_user: AuthUser,
    State(posts): State<DynPostCtrl>,
) -> Result<Json<PostsBody>> {
    let posts = posts.posts_by_user(auth_user.user_id).await?;
    Ok(Json(PostsBody { posts }))
}
