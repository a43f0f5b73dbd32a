use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use mongodb::bson::oid::ObjectId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "pms.sid";

/// Lifetime of an issued session token.
const SESSION_TTL_DAYS: i64 = 7;

/// SessionData
///
/// Everything a session remembers between requests. Serialized as the claims of
/// an HS256 token signed with `SESSION_SECRET`, so the client can read but never
/// forge it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionData {
    pub sid: Uuid,
    // Hex ObjectId of the logged-in user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    // Pending one-shot messages, keyed by category.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub flash: BTreeMap<String, Vec<String>>,
}

impl SessionData {
    pub fn is_empty(&self) -> bool {
        self.user.is_none() && self.flash.is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    #[serde(flatten)]
    data: SessionData,
    iat: i64,
    exp: i64,
}

/// SessionKeys
///
/// Signing and verification keys derived from the session secret.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys").finish_non_exhaustive()
    }
}

impl SessionKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Signs the session data into a cookie value.
    pub fn seal(&self, data: &SessionData) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = SessionClaims {
            data: data.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::days(SESSION_TTL_DAYS)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    /// Verifies a cookie value. Bad signatures, expired or malformed tokens yield `None`.
    pub fn open(&self, token: &str) -> Option<SessionData> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        match decode::<SessionClaims>(token, &self.decoding, &validation) {
            Ok(data) => Some(data.claims.data),
            Err(e) => {
                tracing::debug!("discarding invalid session cookie: {}", e);
                None
            }
        }
    }
}

#[derive(Debug)]
struct SessionInner {
    data: SessionData,
    modified: bool,
}

/// Session
///
/// Request-scoped handle on the current session. Cheap to clone; all clones share
/// the same state, which the session middleware writes back to the cookie once the
/// handler has run.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionInner>>,
}

impl Session {
    pub fn new(data: SessionData) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                data,
                modified: false,
            })),
        }
    }

    pub fn user_id(&self) -> Option<ObjectId> {
        let inner = self.inner.lock();
        inner
            .data
            .user
            .as_deref()
            .and_then(|hex| ObjectId::parse_str(hex).ok())
    }

    pub fn set_user(&self, id: ObjectId) {
        let mut inner = self.inner.lock();
        inner.data.user = Some(id.to_hex());
        inner.modified = true;
    }

    pub fn clear_user(&self) {
        let mut inner = self.inner.lock();
        if inner.data.user.take().is_some() {
            inner.modified = true;
        }
    }

    /// Queues a message for the next request that reads `key`.
    pub fn flash(&self, key: &str, message: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner
            .data
            .flash
            .entry(key.to_string())
            .or_default()
            .push(message.into());
        inner.modified = true;
    }

    /// Returns and forgets every message queued under `key`.
    pub fn take_flash(&self, key: &str) -> Vec<String> {
        let mut inner = self.inner.lock();
        match inner.data.flash.remove(key) {
            Some(messages) => {
                inner.modified = true;
                messages
            }
            None => Vec::new(),
        }
    }

    fn take_if_modified(&self) -> Option<SessionData> {
        let mut inner = self.inner.lock();
        if inner.modified {
            inner.modified = false;
            Some(inner.data.clone())
        } else {
            None
        }
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Session>().cloned().ok_or_else(|| {
            tracing::error!("Session extractor used on a route without session_middleware");
            StatusCode::INTERNAL_SERVER_ERROR
        })
    }
}

/// Finds the session cookie value among the request's `Cookie` headers.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

fn set_cookie(value: &str) -> String {
    format!("{SESSION_COOKIE}={value}; Path=/; HttpOnly; SameSite=Lax")
}

fn clear_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// session_middleware
///
/// Loads the session from the cookie (or starts an empty one), exposes it to the
/// inner layers as a request extension and, after the handler ran, writes it back
/// if anything changed. Untouched new sessions never produce a cookie.
pub async fn session_middleware(
    State(keys): State<SessionKeys>,
    mut request: Request,
    next: Next,
) -> Response {
    let existing =
        read_cookie(request.headers(), SESSION_COOKIE).and_then(|token| keys.open(token));
    let had_cookie = existing.is_some();

    let session = Session::new(existing.unwrap_or_else(|| SessionData {
        sid: Uuid::new_v4(),
        ..SessionData::default()
    }));
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    let Some(data) = session.take_if_modified() else {
        return response;
    };

    let cookie = if data.is_empty() {
        if !had_cookie {
            return response;
        }
        clear_cookie()
    } else {
        match keys.seal(&data) {
            Ok(token) => set_cookie(&token),
            Err(e) => {
                tracing::error!("failed to seal session {}: {}", data.sid, e);
                return response;
            }
        }
    };

    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!("invalid session cookie header: {}", e),
    }
    response
}
