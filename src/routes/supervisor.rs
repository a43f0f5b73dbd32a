use crate::{AppState, auth::require_role, handlers, models::RoleKind};
use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    routing::{get, post},
};

/// Supervisor Router Module
///
/// Mounted at `/supervisor`. Batch management lives here: supervisors create
/// batches, assign faculty guides and place students. Every route requires a
/// logged-in supervisor.
pub fn supervisor_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(handlers::supervisor_dashboard))
        // POST /supervisor/batches
        .route("/batches", post(handlers::create_batch))
        // POST /supervisor/batches/{id}/guide
        // Assigns the faculty guide and notifies them.
        .route("/batches/{id}/guide", post(handlers::assign_guide))
        // POST /supervisor/batches/{id}/students
        // Adds a student by JNTU number; a student can be in one batch only.
        .route("/batches/{id}/students", post(handlers::add_student))
        .route(
            "/notifications/{id}/read",
            post(handlers::mark_notification_read),
        )
        .route_layer(middleware::from_fn(|request: Request, next: Next| {
            require_role(RoleKind::Supervisor, request, next)
        }))
}
