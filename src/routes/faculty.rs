use crate::{AppState, auth::require_role, handlers, models::RoleKind};
use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    routing::{get, post},
};

/// Faculty Router Module
///
/// Mounted at `/faculty`. Every route requires a logged-in faculty member.
pub fn faculty_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(handlers::faculty_dashboard))
        .route(
            "/notifications/{id}/read",
            post(handlers::mark_notification_read),
        )
        .route_layer(middleware::from_fn(|request: Request, next: Next| {
            require_role(RoleKind::Faculty, request, next)
        }))
}
