//! HTTP server assembly
//! Mission: Wire stores, services and middleware into one router and run it

use crate::auth::{
    api as auth_api, auth_middleware, AuthGate, AuthService, AuthState, JwtHandler,
    MemoryUserStore, SqliteUserStore, UserStore,
};
use crate::config::Config;
use crate::middleware::{rate_limit_middleware, request_logging, RateLimiter};
use crate::notes::{api as notes_api, MemoryNoteStore, NoteService, NoteState, NoteStore, SqliteNoteStore};
use crate::storage::StorageBackend;
use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::{net::TcpListener, sync::watch};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

/// The two stores every service is built on.
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub notes: Arc<dyn NoteStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(MemoryUserStore::new()),
            notes: Arc::new(MemoryNoteStore::new()),
        }
    }
}

/// Open the stores for the configured backend.
pub fn open_stores(config: &Config) -> Result<Stores> {
    match config.storage {
        StorageBackend::Memory => {
            warn!("Using in-memory storage; all data is lost on shutdown");
            Ok(Stores::in_memory())
        }
        StorageBackend::Sqlite => {
            let users = SqliteUserStore::open(&config.database_path).with_context(|| {
                format!("Failed to open user store at {}", config.database_path)
            })?;
            let notes = SqliteNoteStore::open(&config.database_path).with_context(|| {
                format!("Failed to open note store at {}", config.database_path)
            })?;
            info!("📦 SQLite storage at {}", config.database_path);
            Ok(Stores {
                users: Arc::new(users),
                notes: Arc::new(notes),
            })
        }
    }
}

/// Build the services from config and stores, then the router on top of them.
pub fn build_app(config: &Config, stores: Stores, limiter: RateLimiter) -> Result<Router> {
    let jwt = Arc::new(JwtHandler::with_validity(&config.secret, config.token_ttl));
    let auth_service = AuthService::new(stores.users, jwt.clone(), config.bcrypt_cost)
        .context("Failed to initialise auth service")?;
    let note_service = NoteService::new(stores.notes);

    Ok(build_router(
        AuthState::new(Arc::new(auth_service)),
        NoteState::new(Arc::new(note_service)),
        Arc::new(AuthGate::new(jwt)),
        limiter,
    ))
}

/// Every route sits behind the auth gate; the gate's allow-list decides
/// which paths pass without a token.
pub fn build_router(
    auth_state: AuthState,
    note_state: NoteState,
    gate: Arc<AuthGate>,
    limiter: RateLimiter,
) -> Router {
    let credential_routes = Router::new()
        .route("/user/register", post(auth_api::register))
        .route("/user/login", post(auth_api::login))
        .route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
        .with_state(auth_state.clone());

    let user_routes = Router::new()
        .route("/user/me", get(auth_api::get_current_user))
        .with_state(auth_state);

    let note_routes = Router::new()
        .route(
            "/notes",
            get(notes_api::list_notes).post(notes_api::create_note),
        )
        .route(
            "/notes/:id",
            get(notes_api::get_note)
                .put(notes_api::update_note)
                .delete(notes_api::delete_note),
        )
        .with_state(note_state);

    Router::new()
        .route("/health", get(health_check))
        .merge(credential_routes)
        .merge(user_routes)
        .merge(note_routes)
        .layer(middleware::from_fn_with_state(gate, auth_middleware))
        .layer(middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Run the server until SIGINT/SIGTERM, then give in-flight requests the
/// configured grace period before returning.
pub async fn serve(config: Config) -> Result<()> {
    let stores = open_stores(&config)?;
    let limiter = RateLimiter::new(config.rate_limit.clone());
    let app = build_app(&config, stores, limiter.clone())?;

    spawn_rate_limit_cleanup(limiter, config.rate_limit.window);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("🎯 StudyNote API listening on {}", addr);

    let (stop_tx, stop_rx) = watch::channel(false);
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, draining connections");
        let _ = stop_tx.send(true);
    })
    .into_future();

    match run_with_grace(server, stop_rx, config.shutdown_grace).await? {
        ShutdownOutcome::Drained => info!("Gracefully shutdown"),
        ShutdownOutcome::GraceElapsed => warn!(
            grace_secs = config.shutdown_grace.as_secs(),
            "Grace period elapsed, dropping in-flight requests"
        ),
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShutdownOutcome {
    Drained,
    GraceElapsed,
}

/// Drive `server` to completion, but stop waiting `grace` after `stopping`
/// flips to true. Whatever the server still holds at that point is dropped.
pub(crate) async fn run_with_grace<F>(
    server: F,
    mut stopping: watch::Receiver<bool>,
    grace: Duration,
) -> Result<ShutdownOutcome>
where
    F: Future<Output = std::io::Result<()>>,
{
    let deadline = async move {
        if stopping.wait_for(|stopping| *stopping).await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => {
            result.context("Server error")?;
            Ok(ShutdownOutcome::Drained)
        }
        _ = deadline => Ok(ShutdownOutcome::GraceElapsed),
    }
}

fn spawn_rate_limit_cleanup(limiter: RateLimiter, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            limiter.cleanup();
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::RateLimitConfig;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use secrecy::SecretString;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    fn test_config(storage: StorageBackend, database_path: String) -> Config {
        Config {
            secret: SecretString::from("server-test-secret".to_string()),
            host: "127.0.0.1".to_string(),
            port: 0,
            storage,
            database_path,
            token_ttl: chrono::Duration::hours(1),
            bcrypt_cost: crate::auth::service::MIN_BCRYPT_COST,
            shutdown_grace: Duration::from_secs(1),
            rate_limit: RateLimitConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let config = test_config(StorageBackend::Memory, String::new());
        let limiter = RateLimiter::new(config.rate_limit.clone());
        let app = build_app(&config, Stores::in_memory(), limiter).unwrap();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["status"], "ok");
    }

    #[tokio::test]
    async fn test_unknown_path_requires_token() {
        let config = test_config(StorageBackend::Memory, String::new());
        let limiter = RateLimiter::new(config.rate_limit.clone());
        let app = build_app(&config, Stores::in_memory(), limiter).unwrap();

        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_open_sqlite_stores() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("studynote.db");
        let config = test_config(StorageBackend::Sqlite, path.to_string_lossy().into_owned());

        let stores = open_stores(&config).unwrap();
        assert!(stores.users.get_by_email("nobody@example.com").unwrap().is_none());
        assert!(path.exists());
    }

    /// A server future that, once told to stop, keeps "draining" a request
    /// for `drain` before it completes.
    fn draining_server(
        mut stopping: watch::Receiver<bool>,
        drain: Duration,
        finished: Arc<AtomicBool>,
    ) -> impl Future<Output = std::io::Result<()>> + Send + 'static {
        async move {
            let _ = stopping.wait_for(|stopping| *stopping).await;
            tokio::time::sleep(drain).await;
            finished.store(true, Ordering::SeqCst);
            Ok::<(), std::io::Error>(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_request_dropped_after_grace() {
        let (stop_tx, stop_rx) = watch::channel(false);
        let finished = Arc::new(AtomicBool::new(false));
        let server = draining_server(stop_rx.clone(), Duration::from_secs(60), finished.clone());

        let start = tokio::time::Instant::now();
        let run = tokio::spawn(run_with_grace(server, stop_rx, Duration::from_secs(5)));

        tokio::time::sleep(Duration::from_secs(2)).await;
        stop_tx.send(true).unwrap();

        let outcome = run.await.unwrap().unwrap();
        assert_eq!(outcome, ShutdownOutcome::GraceElapsed);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(7) && elapsed < Duration::from_secs(8));
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_drain_finishes_inside_grace() {
        let (stop_tx, stop_rx) = watch::channel(false);
        let finished = Arc::new(AtomicBool::new(false));
        let server = draining_server(stop_rx.clone(), Duration::from_secs(1), finished.clone());

        let run = tokio::spawn(run_with_grace(server, stop_rx, Duration::from_secs(5)));
        stop_tx.send(true).unwrap();

        assert_eq!(run.await.unwrap().unwrap(), ShutdownOutcome::Drained);
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_deadline_without_shutdown_signal() {
        let (stop_tx, stop_rx) = watch::channel(false);
        let server = async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok::<(), std::io::Error>(())
        };

        let outcome = run_with_grace(server, stop_rx, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(outcome, ShutdownOutcome::Drained);
        drop(stop_tx);
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let (_stop_tx, stop_rx) = watch::channel(false);
        let server = async { Err::<(), _>(std::io::Error::other("listener closed")) };

        assert!(run_with_grace(server, stop_rx, Duration::from_secs(5))
            .await
            .is_err());
    }
}
