mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{any, get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Settings;
use crate::registry::Registry;
use crate::store::FeatureStore;
use crate::templates::TemplateSource;

pub use middleware::{CurrentUser, SecurityConfig, REMOTE_USER_HEADER};

/// Shared, read-only state of every request.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub store: Arc<dyn FeatureStore>,
    pub settings: Arc<Settings>,
    pub templates: Arc<dyn TemplateSource>,
}

impl AppState {
    pub fn new(
        registry: Registry,
        store: impl FeatureStore + 'static,
        settings: Settings,
        templates: impl TemplateSource + 'static,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            store: Arc::new(store),
            settings: Arc::new(settings),
            templates: Arc::new(templates),
        }
    }
}

pub fn create_router(state: AppState, security: SecurityConfig) -> Router {
    let features = Router::new()
        // Per feature class
        .route(
            "/{slug}/form/",
            get(handlers::create_form).post(handlers::create_feature),
        )
        .route(
            "/{slug}/{uid}/",
            get(handlers::resource).delete(handlers::delete_resource),
        )
        .route("/{slug}/{uid}/form/", get(handlers::update_form))
        .route(
            "/{slug}/{uid}/share/",
            get(handlers::share_form).post(handlers::share),
        )
        // Collections
        .route("/{slug}/{uid}/add/{uids}", post(handlers::add_features))
        .route("/{slug}/{uid}/remove/{uids}", post(handlers::remove_features))
        // Links
        .route("/{slug}/links/{link}/{uids}/", any(handlers::invoke_link))
        // Workspaces
        .route("/workspaces/public.json", get(handlers::workspace_public))
        .route(
            "/workspaces/{username}/owner.json",
            get(handlers::workspace_owner),
        )
        .route(
            "/workspaces/{username}/shared.json",
            get(handlers::workspace_shared),
        )
        .route("/feature_tree.css", get(handlers::feature_tree_css));

    let prefix = state.settings.url_prefix.clone();
    let features = if prefix.is_empty() {
        features
    } else {
        Router::new().nest(&prefix, features)
    };

    // Layers added here only wrap the routes registered so far.
    let protected = features
        .layer(from_fn_with_state(state.clone(), middleware::identify_user))
        .layer(from_fn_with_state(
            security.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&security))
        .with_state(state)
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    match &security.cors_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::permissive(),
    }
}
