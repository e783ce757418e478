use crate::config::Config;
use crate::mailer::DynMailer;
use crate::models::listing::DynListingCtrl;
use crate::models::post::DynPostCtrl;
use crate::models::profile::DynProfileCtrl;
use crate::models::user::DynUserCtrl;
use crate::models::DynStore;
use crate::uploads::DynFileStore;
use axum::extract::FromRef;
use std::sync::Arc;

/// Everything a handler may need, shared by cheap `Arc` clones across requests.
///
/// Production wires in the Postgres store, the disk file store and a real mailer;
/// tests substitute `mockall` mocks for all three.
#[derive(Clone)]
pub struct ApiContext {
    pub config: Arc<Config>,
    pub store: DynStore,
    pub files: DynFileStore,
    pub mailer: DynMailer,
}

// These let a handler ask for just the controller it uses, e.g. `State<DynPostCtrl>`.

impl FromRef<ApiContext> for DynUserCtrl {
    fn from_ref(ctx: &ApiContext) -> DynUserCtrl {
        ctx.store.user()
    }
}

impl FromRef<ApiContext> for DynProfileCtrl {
    fn from_ref(ctx: &ApiContext) -> DynProfileCtrl {
        ctx.store.profile()
    }
}

impl FromRef<ApiContext> for DynPostCtrl {
    fn from_ref(ctx: &ApiContext) -> DynPostCtrl {
        ctx.store.post()
    }
}

impl FromRef<ApiContext> for DynListingCtrl {
    fn from_ref(ctx: &ApiContext) -> DynListingCtrl {
        ctx.store.listing()
    }
}
