use sqlx::PgPool;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

pub mod listing;
pub mod post;
pub mod profile;
pub mod user;

pub type DynStore = Arc<dyn StoreTrait + Send + Sync>;

/// Hands out the per-table controllers.
///
/// Handlers only ever see these trait objects, which lets tests swap in mocks
/// without a running database.
#[cfg_attr(test, automock)]
pub trait StoreTrait {
    fn user(&self) -> user::DynUserCtrl;
    fn profile(&self) -> profile::DynProfileCtrl;
    fn post(&self) -> post::DynPostCtrl;
    fn listing(&self) -> listing::DynListingCtrl;
}

#[derive(Clone)]
pub struct Store {
    user: user::DynUserCtrl,
    profile: profile::DynProfileCtrl,
    post: post::DynPostCtrl,
    listing: listing::DynListingCtrl,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self {
            user: Arc::new(user::UserController::new(pool.clone())),
            profile: Arc::new(profile::ProfileController::new(pool.clone())),
            post: Arc::new(post::PostController::new(pool.clone())),
            listing: Arc::new(listing::ListingController::new(pool)),
        }
    }
}

impl StoreTrait for Store {
    fn user(&self) -> user::DynUserCtrl {
        self.user.clone()
    }

    fn profile(&self) -> profile::DynProfileCtrl {
        self.profile.clone()
    }

    fn post(&self) -> post::DynPostCtrl {
        self.post.clone()
    }

    fn listing(&self) -> listing::DynListingCtrl {
        self.listing.clone()
    }
}
