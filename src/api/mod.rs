//! HTTP surface: axum router, shared state and middleware.

pub mod extract;
pub mod routes;
pub mod webhook;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, StatusCode};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn};

use crate::config::{ServerConfig, WebhookConfig};
use crate::diagnostics::ConfiguredDatabase;
use crate::engage::{CommentMatcher, ConversationLogger, DmResponder};
use crate::error::Result;
use crate::store::{DocumentStore, LibSqlStore};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub matcher: CommentMatcher,
    pub responder: DmResponder,
    pub webhook: WebhookConfig,
    pub configured: ConfiguredDatabase,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        webhook: WebhookConfig,
        configured: ConfiguredDatabase,
    ) -> Self {
        let logger = ConversationLogger::new(Arc::clone(&store), webhook.conversation_mode);
        Self {
            matcher: CommentMatcher::new(logger.clone()),
            responder: DmResponder::new(logger, webhook.opt_out_source),
            store,
            webhook,
            configured,
        }
    }

    pub fn from_config(store: Arc<dyn DocumentStore>, config: &ServerConfig) -> Self {
        let configured = ConfiguredDatabase {
            url_set: !config.database_url.is_empty(),
            name_set: config.database_name.is_some(),
        };
        Self::new(store, config.webhook.clone(), configured)
    }
}

/// Build the router with every route, without middleware.
pub fn app_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/schema", get(routes::schema))
        .route("/connect", post(routes::connect))
        .route("/flows", get(routes::list_flows).post(routes::create_flow))
        .route("/assign", post(routes::assign))
        .route("/webhook", get(webhook::verify))
        .route("/webhook/comment", post(webhook::on_comment))
        .route("/webhook/dm", post(webhook::on_dm))
        .route("/analytics/summary", get(routes::analytics_summary))
        .route("/test", get(routes::test_connection))
        .with_state(state)
}

/// CORS policy from the configured allow-list. `None` sends no CORS headers.
pub fn cors_layer(allowed_origins: &[String]) -> Option<CorsLayer> {
    if allowed_origins.is_empty() {
        return None;
    }
    let origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };
    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

/// The full application: routes plus timeout and CORS middleware.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let timeout =
        TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, config.request_timeout);
    let mut router = app_routes(state).layer(timeout);
    if let Some(cors) = cors_layer(&config.allowed_origins) {
        router = router.layer(cors);
    }
    router
}

/// Open the configured store and serve the application until shutdown.
pub async fn serve(config: ServerConfig) -> Result<()> {
    let store: Arc<dyn DocumentStore> = Arc::new(LibSqlStore::open(&config.database_url).await?);
    let app = build_router(AppState::from_config(store, &config), &config);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr.as_str()).await?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        %addr,
        opt_out_source = ?config.webhook.opt_out_source,
        conversation_mode = ?config.webhook.conversation_mode,
        signatures = config.webhook.app_secret.is_some(),
        "IG Engage listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
