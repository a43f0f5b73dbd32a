use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    error::AppError,
    handlers::redirect,
    locals::ERROR_MSG,
    models::{RoleKind, User},
    repository::RepositoryState,
    session::Session,
};

/// CurrentUser
///
/// The user resolved from the session for this request, or `None` for anonymous
/// requests. Inserted into the request extensions by `auth_middleware`.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<User>);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<CurrentUser>().cloned().unwrap_or_default())
    }
}

/// AuthUser Extractor
///
/// A logged-in user, required. Handlers taking an `AuthUser` never run for anonymous
/// requests: the extractor flashes a login prompt and redirects to `/auth/login`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

pub const LOGIN_REQUIRED: &str = "Please log in to view that resource";
pub const NOT_AUTHORIZED: &str = "You are not authorized to view that page";

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(CurrentUser(Some(user))) = parts.extensions.get::<CurrentUser>() {
            return Ok(AuthUser(user.clone()));
        }

        if let Some(session) = parts.extensions.get::<Session>() {
            session.flash(ERROR_MSG, LOGIN_REQUIRED);
        }
        Err(redirect("/auth/login"))
    }
}

/// auth_middleware
///
/// Resolves the user id stored in the session into a full `User` for every request.
/// An id that no longer matches a user (account removed) is dropped from the session.
pub async fn auth_middleware(
    State(repo): State<RepositoryState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Response {
    let user = match session.user_id() {
        Some(id) => match repo.get_user(id).await {
            Ok(Some(user)) => Some(user),
            Ok(None) => {
                tracing::warn!(user_id = %id, "session refers to a missing user; logging out");
                session.clear_user();
                None
            }
            Err(e) => return AppError::from(e).into_response(),
        },
        None => None,
    };

    request.extensions_mut().insert(CurrentUser(user));
    next.run(request).await
}

/// require_role
///
/// Route-group guard. Anonymous requests are sent to the login page, users of any
/// other role back to `/`, both with a flash message.
pub async fn require_role(expected: RoleKind, request: Request, next: Next) -> Response {
    let user_kind = match request.extensions().get::<CurrentUser>() {
        Some(CurrentUser(Some(user))) => Some(user.role.kind()),
        _ => None,
    };
    let session = request.extensions().get::<Session>().cloned();

    match user_kind {
        Some(kind) if kind == expected => next.run(request).await,
        Some(kind) => {
            tracing::debug!(
                expected = expected.as_str(),
                actual = kind.as_str(),
                "role guard rejected request"
            );
            if let Some(session) = session {
                session.flash(ERROR_MSG, NOT_AUTHORIZED);
            }
            redirect("/")
        }
        None => {
            if let Some(session) = session {
                session.flash(ERROR_MSG, LOGIN_REQUIRED);
            }
            redirect("/auth/login")
        }
    }
}

// --- Passwords ---

/// Hashes a password on the blocking pool; bcrypt is deliberately slow.
pub async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
    Ok(hash)
}

/// Verifies a password against a stored hash. A malformed stored hash counts as a mismatch.
pub async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    let outcome = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await?;
    match outcome {
        Ok(matches) => Ok(matches),
        Err(e) => {
            tracing::warn!("stored password hash could not be verified: {}", e);
            Ok(false)
        }
    }
}

/// authenticate
///
/// The local login strategy: look the account up by email or JNTU number and
/// check the password. `None` means the credentials were rejected.
pub async fn authenticate(
    repo: &RepositoryState,
    login: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    let login = login.trim();
    if login.is_empty() || password.is_empty() {
        return Ok(None);
    }

    let Some(user) = repo.find_user_by_login(login).await? else {
        return Ok(None);
    };

    if verify_password(password.to_string(), user.password_hash.clone()).await? {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}
