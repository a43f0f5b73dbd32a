use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Auth Router Module
///
/// Mounted at `/auth`. Login and registration are reachable anonymously; logout
/// simply clears whatever session is present.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        // GET /auth/login renders the form, POST /auth/login runs the local strategy.
        .route("/login", get(handlers::login_page).post(handlers::login))
        // POST /auth/register
        // Target of both registration forms on the landing page.
        .route("/register", post(handlers::register))
        // GET /auth/logout
        .route("/logout", get(handlers::logout))
}
