use std::any::Any;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::{AppState, auth::CurrentUser, locals::Locals, session::Session, views};

pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong!";

/// RepoError
///
/// Failures surfaced by a `Repository` implementation.
#[derive(Error, Debug)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("{0} already exists")]
    Duplicate(&'static str),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// AppError
///
/// Every failure a request handler can propagate with `?`. None of these are
/// user mistakes (those are flashed and redirected); all of them end in the 500 page.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Repository(#[from] RepoError),

    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("password hashing failed: {0}")]
    Password(#[from] bcrypt::BcryptError),

    #[error("session encoding failed: {0}")]
    Session(#[from] jsonwebtoken::errors::Error),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("handler panicked: {0}")]
    Panic(String),
}

/// ErrorDetail
///
/// Response extension marking a 500 produced by `AppError`. The error-page
/// middleware picks it up, logs it and replaces the body with the rendered `error` view.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response
            .extensions_mut()
            .insert(ErrorDetail(self.to_string()));
        response
    }
}

/// panic_response
///
/// Turns a caught panic payload into the same response a failing handler produces,
/// so panics also end in the rendered 500 page.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "unknown panic payload".to_string()
    };

    AppError::Panic(detail).into_response()
}

/// error_page_middleware
///
/// Any response marked with `ErrorDetail` is logged and replaced by the rendered
/// `error` view. The detail is only shown to the client in development.
///
/// Installed twice: inside the page stack, where the session and current user
/// are known and the page keeps the navigation and flash, and around the whole
/// app for failures raised before them (user lookup, panics).
pub async fn error_page_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let session = request.extensions().get::<Session>().cloned();
    let user = request.extensions().get::<CurrentUser>().cloned().unwrap_or_default();
    let response = next.run(request).await;

    let Some(ErrorDetail(detail)) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };
    tracing::error!(%method, %uri, error = %detail, "request failed");
    let locals = Locals::take(session.as_ref(), user.0.as_ref());

    let page = json!({
        "title": "Error",
        "message": GENERIC_ERROR_MESSAGE,
        "detail": state.config.env.is_development().then_some(detail),
    });
    match state.views.render(views::ERROR, &locals, page) {
        Ok(html) => (StatusCode::INTERNAL_SERVER_ERROR, html).into_response(),
        Err(e) => {
            tracing::error!("failed to render error page: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_ERROR_MESSAGE).into_response()
        }
    }
}
