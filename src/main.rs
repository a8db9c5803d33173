use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::ConnectInfo,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use axum_prometheus::PrometheusMetricLayer;
use tokio::sync::RwLock;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kcchat_server::auth::{AuthRegistry, GoogleProvider};
use kcchat_server::commands::{register_builtins, CommandRegistry};
use kcchat_server::config::{Config, LogFormat};
use kcchat_server::donations::DonationVerifier;
use kcchat_server::state::{AppState, DEFAULT_FOLLOW_MODE_SECS, DEFAULT_SLOW_MODE_SECS};
use kcchat_server::storage::{bans, responses};
use kcchat_server::websocket::connection_manager::ConnectionRegistry;
use kcchat_server::websocket::overlay::{overlay_ws_handler, OverlayRegistry};
use kcchat_server::websocket::chat_ws_handler;
use kcchat_server::{db, error::AppError};

/// Restricts `/metrics` to loopback callers only — no bearer token scheme
/// exists for this endpoint, so network topology is the access control.
async fn require_loopback(
    connect_info: Option<ConnectInfo<SocketAddr>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    match connect_info {
        Some(ConnectInfo(addr)) if addr.ip().is_loopback() => next.run(req).await,
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn healthz() -> &'static str {
    "ok"
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "kcchat_server=info,tower_http=info,sqlx=warn".parse().unwrap());

    match format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::load().expect("failed to load configuration");
    init_tracing(config.log_format);
    info!("kcchat-server starting");

    let pool = db::create_pool(&config.database_url()).await?;
    db::run_migrations(&pool).await?;
    db::health_check(&pool).await?;
    info!("database ready");

    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .expect("failed to build HTTP client");

    let banned_words = bans::load_banned_words(&pool).await?;
    let simple_responses: HashMap<String, String> = responses::load_all(&pool)
        .await?
        .into_iter()
        .map(|r| (r.command, r.response))
        .collect();

    let mut commands = CommandRegistry::new();
    register_builtins(&mut commands);

    let mut auth = AuthRegistry::new();
    auth.register(Box::new(GoogleProvider::new(http_client.clone(), config.youtube_client_id.clone())));

    let config = Arc::new(config);

    let state = AppState {
        pool,
        config: config.clone(),
        http_client,
        connections: ConnectionRegistry::new(),
        overlay: OverlayRegistry::new(),
        auth: Arc::new(auth),
        donations: Arc::new(DonationVerifier::new()),
        commands: Arc::new(RwLock::new(commands)),
        simple_responses: Arc::new(RwLock::new(simple_responses)),
        banned_words: Arc::new(banned_words),
        timers: Arc::new(RwLock::new(HashMap::new())),
        slow_mode_secs: Arc::new(RwLock::new(DEFAULT_SLOW_MODE_SECS)),
        follow_mode_secs: Arc::new(RwLock::new(DEFAULT_FOLLOW_MODE_SECS)),
    };

    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .finish()
            .expect("invalid governor configuration"),
    );

    let chat_app = Router::new()
        .route("/ws", get(chat_ws_handler))
        .route("/healthz", get(healthz))
        .route(
            "/metrics",
            get(move || async move { metric_handle.render() })
                .route_layer(middleware::from_fn(require_loopback)),
        )
        .layer(GovernorLayer { config: governor_conf })
        .layer(SetResponseHeaderLayer::if_not_present(
            header::HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(prometheus_layer)
        .with_state(state.clone());

    let overlay_app = Router::new()
        .route("/ws", get(overlay_ws_handler))
        .route("/healthz", get(healthz))
        .with_state(state);

    let chat_addr = config.chat_addr();
    let overlay_addr = config.overlay_addr();

    let chat_listener = tokio::net::TcpListener::bind(&chat_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind chat listener on {chat_addr}: {e}"));
    let overlay_listener = tokio::net::TcpListener::bind(&overlay_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind overlay listener on {overlay_addr}: {e}"));

    info!(%chat_addr, "chat relay listening");
    info!(%overlay_addr, "overlay relay listening");

    let chat_server = axum::serve(
        chat_listener,
        chat_app.into_make_service_with_connect_info::<SocketAddr>(),
    );
    let overlay_server = axum::serve(
        overlay_listener,
        overlay_app.into_make_service_with_connect_info::<SocketAddr>(),
    );

    tokio::try_join!(chat_server, overlay_server).expect("server failed");

    Ok(())
}
