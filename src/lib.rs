use axum::{
    Router,
    extract::FromRef,
    handler::Handler,
    http::HeaderName,
    middleware,
    routing::get,
};

use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod locals;
pub mod models;
pub mod payload;
pub mod repository;
pub mod schema;
pub mod session;
pub mod views;

// Role-partitioned route groups (/auth, /student, /faculty, /supervisor).
pub mod routes;
use routes::{auth as auth_routes, faculty, student, supervisor};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{InMemoryRepository, MongoRepository, RepositoryState};
pub use session::SessionKeys;
pub use views::Views;

/// AppState
///
/// The single, immutable container holding every shared service. Cloned into
/// each request; all members are cheap handles.
#[derive(Clone)]
pub struct AppState {
    /// Persistence: MongoDB in production, in-memory in tests.
    pub repo: RepositoryState,
    /// Compiled templates.
    pub views: Views,
    /// Session cookie signing keys, derived from `SESSION_SECRET`.
    pub sessions: SessionKeys,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Assembles the state, compiling the templates and deriving the session keys.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Result<Self, minijinja::Error> {
        Ok(Self {
            repo,
            views: Views::new()?,
            sessions: SessionKeys::new(&config.session_secret),
            config,
        })
    }
}

// --- Axum FromRef Extractor Implementations ---

// Let middleware take only the piece of the state it needs.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(app_state: &AppState) -> SessionKeys {
        app_state.sessions.clone()
    }
}

/// create_router
///
/// Assembles the whole application. Inside-out, a page request passes through:
/// session loading, user resolution, the error page, then the route. Static files
/// under `public/` and `uploads/` bypass the session layers; whatever matches
/// nothing renders the 404 page, which does see the session. Panics and handler
/// errors are turned into the 500 page, and every request is traced under its
/// request id.
pub fn create_router(state: AppState) -> Router {
    let x_request_id = HeaderName::from_static("x-request-id");

    // 1. Page routes with the session -> auth -> error page middleware chain.
    // Layers added last run first.
    let pages = Router::new()
        .route("/", get(handlers::home))
        .route("/dashboard", get(handlers::dashboard))
        .nest("/auth", auth_routes::auth_routes())
        .nest("/student", student::student_routes())
        .nest("/faculty", faculty::faculty_routes())
        .nest("/supervisor", supervisor::supervisor_routes())
        .method_not_allowed_fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), error::error_page_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), session::session_middleware));

    // 2. Static files, falling through to the 404 page.
    let not_found = ServiceBuilder::new()
        .layer(middleware::from_fn_with_state(state.clone(), session::session_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_middleware))
        .service(handlers::not_found.with_state(state.clone()));
    let public_files = ServeDir::new(&state.config.public_dir)
        .call_fallback_on_method_not_allowed(true)
        .not_found_service(not_found.clone());
    let uploaded_files = ServeDir::new(&state.config.uploads_dir)
        .call_fallback_on_method_not_allowed(true)
        .not_found_service(not_found);

    let app = Router::new()
        .merge(pages)
        .nest_service("/uploads", uploaded_files)
        .fallback_service(public_files)
        .with_state(state.clone());

    // 3. Request correlation, panic recovery and the error page for failures
    // outside the page stack (outermost).
    app.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace_span_logger)
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            .layer(PropagateRequestIdLayer::new(x_request_id))
            .layer(middleware::from_fn_with_state(state, error::error_page_middleware))
            .layer(CatchPanicLayer::custom(error::panic_response)),
    )
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: every log line of a request carries its
/// method, URI and `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
