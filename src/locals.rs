use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::Serialize;

use crate::{
    auth::CurrentUser,
    models::{User, UserView},
    session::Session,
};

// Flash categories exposed to every template.
pub const SUCCESS_MSG: &str = "success_msg";
pub const ERROR_MSG: &str = "error_msg";
pub const ERROR: &str = "error";

/// Locals
///
/// Values every rendered view can read: the flash messages pending for this
/// request and the logged-in user.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Locals {
    pub success_msg: Vec<String>,
    pub error_msg: Vec<String>,
    pub error: Vec<String>,
    pub user: Option<UserView>,
}

impl Locals {
    /// Collects the locals for a page about to be rendered. Pending flash
    /// messages are removed from the session, so only a rendered page consumes
    /// them and redirects pass them on untouched.
    pub fn take(session: Option<&Session>, user: Option<&User>) -> Self {
        let mut locals = Locals {
            user: user.map(UserView::from),
            ..Locals::default()
        };
        if let Some(session) = session {
            locals.success_msg = session.take_flash(SUCCESS_MSG);
            locals.error_msg = session.take_flash(ERROR_MSG);
            locals.error = session.take_flash(ERROR);
        }
        locals
    }
}

/// Extracting `Locals` consumes the flash; take it only in handlers that always render.
impl<S> FromRequestParts<S> for Locals
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<CurrentUser>() {
            Some(CurrentUser(user)) => user.as_ref(),
            None => None,
        };
        Ok(Locals::take(parts.extensions.get::<Session>(), user))
    }
}
