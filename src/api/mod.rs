use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::get,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::SameSite;
use tower_sessions::session_store::ExpiredDeletion;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::SqliteStore;
use tracing::warn;

use crate::config::{Config, ServerConfig, SessionBackend};
use crate::services::AccountService;
use crate::state::SharedState;

pub mod auth;
mod error;
pub mod messages;
mod observability;
mod types;
pub mod urls;
pub mod users;
mod validation;

pub use error::ApiError;
pub use types::*;
pub use urls::Urls;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub urls: Urls,

    /// Landing page after an account is deleted.
    pub index_url: String,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn accounts(&self) -> &Arc<dyn AccountService> {
        &self.shared.accounts
    }
}

pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    let urls = Urls::new(&shared.config.server.mount_path);
    let index_url = shared.config.server.index_url.clone();

    Arc::new(AppState {
        shared,
        urls,
        index_url,
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub async fn router(state: Arc<AppState>) -> anyhow::Result<Router> {
    let server = state.config().server.clone();

    let accounts = account_routes(state.clone());
    let accounts = match server.session_backend {
        SessionBackend::Memory => accounts.layer(session_layer(MemoryStore::default(), &server)),
        SessionBackend::Database => {
            let store = SqliteStore::new(state.store().conn.get_sqlite_connection_pool().clone());
            store.migrate().await?;
            spawn_session_sweeper(store.clone());
            accounts.layer(session_layer(store, &server))
        }
    };

    let app = if state.urls.base().is_empty() {
        Router::new().merge(accounts)
    } else {
        Router::new().nest(state.urls.base(), accounts)
    };

    let cors_origins = &server.cors_allowed_origins;
    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Ok(app
        .route("/metrics", get(observability::get_metrics))
        .with_state(state)
        .layer(middleware::from_fn(observability::logging_middleware))
        .layer(middleware::from_fn(
            observability::security_headers_middleware,
        ))
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http()))
}

fn account_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let owner_routes = Router::new()
        .route(
            "/{username}/update-account/",
            get(users::update_page).post(users::update),
        )
        .route("/{username}/delete-account/", get(users::delete))
        .route(
            "/{username}/change-password/",
            get(users::change_password_page).post(users::change_password),
        )
        .route_layer(middleware::from_fn(auth::owner_required))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::login_required,
        ));

    let login_routes = Router::new()
        .route("/~redirect/", get(auth::redirect_to_profile))
        .route_layer(middleware::from_fn_with_state(state, auth::login_required));

    Router::new()
        .route(
            "/register/",
            get(users::register_page).post(users::register),
        )
        .route("/login/", get(auth::login_page).post(auth::login))
        .route("/logout/", get(auth::logout).post(auth::logout))
        .route("/{username}/", get(users::detail))
        .merge(owner_routes)
        .merge(login_routes)
}

fn session_layer<S>(store: S, server: &ServerConfig) -> SessionManagerLayer<S>
where
    S: SessionStore + Clone,
{
    SessionManagerLayer::new(store)
        .with_secure(server.secure_cookies)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            server.session_idle_minutes,
        )))
}

fn spawn_session_sweeper(store: SqliteStore) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            if let Err(e) = store.delete_expired().await {
                warn!("Failed to delete expired sessions: {e}");
            }
        }
    });
}
