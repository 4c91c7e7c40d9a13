pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower::util::ServiceExt;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use handlers::ws::ChangeFeed;
use services::{
    mailer::Mailer, matcher::MatchingService, oauth::IdentityProvider, storage::MediaStore,
};

const STATIC_DIR: &str = "static";

#[derive(Clone)]
pub struct AppState {
    pub db: db::Database,
    pub config: config::Config,
    pub feed: ChangeFeed,
    pub media: MediaStore,
    pub matcher: MatchingService,
    pub mailer: Arc<dyn Mailer>,
    pub identity: Arc<dyn IdentityProvider>,
}

pub fn build_router(state: AppState) -> Router {
    // Writes require a bearer token
    let protected_routes = Router::new()
        .nest("/profile", routes::profile::router())
        .nest("/startups", routes::startups::protected_router())
        .nest("/hackathons", routes::hackathons::protected_router())
        .nest("/teams", routes::teams::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    // Listings and detail pages are readable by anyone
    let public_routes = Router::new()
        .nest("/auth", routes::auth::router())
        .nest("/freelancers", routes::freelancers::router())
        .nest("/startups", routes::startups::router())
        .nest("/hackathons", routes::hackathons::router())
        .nest("/teams", routes::teams::router())
        .nest("/match", routes::matching::router());

    let api_router = public_routes.merge(protected_routes);

    let media = ServeDir::new(state.media.base_path());

    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(handlers::ws::ws_handler))
        .nest("/api", api_router)
        .nest_service("/media", media)
        .fallback(serve_spa)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn health_check() -> &'static str {
    "OK"
}

async fn serve_spa(req: Request<Body>) -> Response {
    let path = req.uri().path().trim_start_matches('/');

    if !path.is_empty() && Path::new(STATIC_DIR).join(path).is_file() {
        return match ServeDir::new(STATIC_DIR).oneshot(req).await {
            Ok(res) => res.into_response(),
            Err(never) => match never {},
        };
    }

    // Client-side routes all load the app shell
    match tokio::fs::read(Path::new(STATIC_DIR).join("index.html")).await {
        Ok(contents) => ([(header::CONTENT_TYPE, "text/html")], contents).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}
