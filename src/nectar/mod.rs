//! HTTP service wiring: shared state, router, and server bootstrap.

pub mod handlers;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request},
    routing::get,
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::{net::TcpListener, signal, sync::mpsc};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use ulid::Ulid;
use utoipa::OpenApi;

use crate::keys::ServerKeys;
use crate::session::{sweeper::ExpirySweeper, SessionTable, SWEEP_INTERVAL};

pub const SOFTWARE: &str = "Nectar-Server";
pub const API_VERSION_MAJOR: &str = "1";
pub const API_VERSION_MINOR: &str = "2";

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

/// State shared by every handler: the key pair, the session table, the FTS
/// root and the static info descriptor. The table is the only mutable part.
pub struct AppState {
    pub keys: ServerKeys,
    pub sessions: Arc<SessionTable>,
    pub fts_root: PathBuf,
    pub info: handlers::info::ServerInfo,
}

/// Everything the server action resolved before starting the listener.
pub struct ServerOptions {
    pub keys: ServerKeys,
    pub fts_root: PathBuf,
    pub send_system_data: bool,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::info::info,
        handlers::token_request::token_request,
        handlers::ping::ping,
        handlers::switch_state::switch_state,
        handlers::fts::download,
    ),
    components(schemas(handlers::info::ServerInfo, handlers::info::SystemInfo)),
    tags(
        (name = "nectar", description = "Client session and authorization API"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

fn api_path(suffix: &str) -> String {
    format!("/nectar/api/{API_VERSION_MAJOR}/{API_VERSION_MINOR}/{suffix}")
}

/// Build the application router around shared state.
///
/// Kept separate from [`new`] so tests can drive the full HTTP surface
/// without a database or a listener.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_origin(Any);

    Router::new()
        .route(&api_path("infoRequest"), get(handlers::info))
        .route(&api_path("auth/tokenRequest"), get(handlers::token_request))
        .route(&api_path("client/ping"), get(handlers::ping))
        .route(&api_path("client/switchState"), get(handlers::switch_state))
        .route(&api_path("fts/download"), get(handlers::download))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(state)),
        )
        .route("/health", get(handlers::health).options(handlers::health))
}

/// Run the server until shutdown.
///
/// # Errors
///
/// Returns an error if the database is unreachable, the port cannot be
/// bound, or serving fails. All of these are fatal at startup.
pub async fn new(port: u16, dsn: String, options: ServerOptions) -> Result<()> {
    // The pool backs user-data storage outside the session core; reaching
    // the database is a startup precondition all the same.
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let sessions = Arc::new(SessionTable::new());
    let sweeper = ExpirySweeper::spawn(sessions.clone(), SWEEP_INTERVAL);

    let state = Arc::new(AppState {
        keys: options.keys,
        sessions,
        fts_root: options.fts_root,
        info: handlers::info::ServerInfo::collect(options.send_system_data),
    });

    let app = router(state).layer(Extension(pool));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            let _ = tx.send(());
        }
    });

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            rx.recv().await;
            info!("Gracefully shutdown");
        })
        .await?;

    // The sweeper owns nothing but the table, still: stop it cleanly before
    // the process tears shared state down.
    sweeper.shutdown().await;

    Ok(())
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", path, ?headers, request_id)
}
