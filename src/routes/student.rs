use crate::{AppState, auth::require_role, handlers, models::RoleKind};
use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    routing::{get, post},
};

/// Student Router Module
///
/// Mounted at `/student`. Every route requires a logged-in student.
pub fn student_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(handlers::student_dashboard))
        .route(
            "/notifications/{id}/read",
            post(handlers::mark_notification_read),
        )
        .route_layer(middleware::from_fn(|request: Request, next: Next| {
            require_role(RoleKind::Student, request, next)
        }))
}
