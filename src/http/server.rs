use crate::config::Config;
use crate::http::*;
use crate::mailer;
use crate::models::{DynStore, Store};
use crate::uploads::{DiskFileStore, DynFileStore, PUBLIC_PREFIX};
use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use sqlx::PgPool;
use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub async fn serve(config: Config, db: PgPool) -> anyhow::Result<()> {
    let port = config.port;

    let files = DiskFileStore::new(&config.upload_dir);
    files.ensure_dir().await?;

    let api_context = ApiContext {
        mailer: mailer::from_config(&config),
        store: Arc::new(Store::new(db)) as DynStore,
        files: Arc::new(files) as DynFileStore,
        config: Arc::new(config),
    };

    let app = api_router(api_context);

    // Port is configured in .env
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    log::info!("listening on {}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .context("error running HTTP server")
}

fn api_router(api_context: ApiContext) -> Router {
    let uploads = ServeDir::new(&api_context.config.upload_dir);
    let body_limit = api_context.config.max_upload_bytes;

    Router::new()
        .merge(users::router())
        .merge(profiles::router())
        .merge(posts::router())
        .nest_service(PUBLIC_PREFIX, uploads)
        // Multipart bodies carry whole images; the default 2 MB cap is too small.
        .layer(DefaultBodyLimit::max(body_limit))
        // Enables logging. Use `RUST_LOG=tower_http=debug`
        .layer(TraceLayer::new_for_http())
        .with_state(api_context)
}
