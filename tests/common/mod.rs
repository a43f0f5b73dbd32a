#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, StatusCode, header},
};
use mongodb::bson::oid::ObjectId;
use project_portal::{
    AppConfig, AppState, InMemoryRepository, RepositoryState, create_router,
    auth::hash_password,
    error::{RepoError, RepoResult},
    models::{Batch, Faculty, Notification, Role, Student, User},
    repository::Repository,
    session::{SESSION_COOKIE, SessionData},
};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "secret123";

/// A router over an empty in-memory store, plus the state it was built from.
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(Arc::new(InMemoryRepository::new()), AppConfig::default())
    }

    pub fn with(repo: RepositoryState, config: AppConfig) -> Self {
        let state = AppState::new(repo, config).unwrap();
        let router = create_router(state.clone());
        Self { state, router }
    }

    /// A client that keeps the session cookie across requests.
    pub fn browser(&self) -> Browser<'_> {
        Browser { app: self, cookie: None }
    }

    pub fn browser_as(&self, user: ObjectId) -> Browser<'_> {
        Browser {
            app: self,
            cookie: Some(self.login_cookie(user)),
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// A `Cookie` header value for a session logged in as `user`.
    pub fn login_cookie(&self, user: ObjectId) -> String {
        let data = SessionData {
            sid: Uuid::new_v4(),
            user: Some(user.to_hex()),
            ..SessionData::default()
        };
        format!("{SESSION_COOKIE}={}", self.state.sessions.seal(&data).unwrap())
    }

    async fn user(&self, name: &str, email: &str, role: Role) -> User {
        let hash = hash_password(PASSWORD.into(), 4).await.unwrap();
        self.state
            .repo
            .create_user(User::new(name.into(), email.into(), hash, role))
            .await
            .unwrap()
    }

    pub async fn seed_student(&self, name: &str, email: &str, jntu: &str) -> (User, Student) {
        let user = self.user(name, email, Role::student(jntu)).await;
        let student = self
            .state
            .repo
            .create_student(Student {
                id: ObjectId::new(),
                user: user.id,
                name: name.into(),
                email: email.into(),
                jntu_number: user.role.jntu_number().unwrap_or_default().to_string(),
                branch: "CSE".into(),
                batch: None,
            })
            .await
            .unwrap();
        (user, student)
    }

    pub async fn seed_faculty(&self, name: &str, email: &str) -> (User, Faculty) {
        let user = self.user(name, email, Role::Faculty).await;
        let faculty = self
            .state
            .repo
            .create_faculty(Faculty {
                id: ObjectId::new(),
                user: user.id,
                name: name.into(),
                email: email.into(),
                department: "CSE".into(),
                designation: "Professor".into(),
            })
            .await
            .unwrap();
        (user, faculty)
    }

    pub async fn seed_supervisor(&self, name: &str, email: &str) -> User {
        self.user(name, email, Role::Supervisor).await
    }

    pub async fn seed_other(&self, name: &str, email: &str) -> User {
        self.user(name, email, Role::Other).await
    }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_form(uri: &str, form: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(form.to_string())).unwrap()
}

pub fn location(response: &Response<Body>) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

/// The `name=value` part of the session cookie the response sets, if any.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(SESSION_COOKIE))
        .map(|value| value.split(';').next().unwrap_or_default().to_string())
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Browser
///
/// Sends requests with the current session cookie and stores whatever cookie
/// each response sets, the way a real browser does across redirects.
pub struct Browser<'a> {
    app: &'a TestApp,
    cookie: Option<String>,
}

impl Browser<'_> {
    pub async fn send(&mut self, request: Request<Body>) -> Response<Body> {
        let response = self.app.send(request).await;
        if let Some(cookie) = session_cookie(&response) {
            let cleared = cookie.ends_with('=');
            self.cookie = (!cleared).then_some(cookie);
        }
        response
    }

    pub async fn get(&mut self, uri: &str) -> Response<Body> {
        let request = get(uri, self.cookie.as_deref());
        self.send(request).await
    }

    pub async fn post(&mut self, uri: &str, form: &str) -> Response<Body> {
        let request = post_form(uri, form, self.cookie.as_deref());
        self.send(request).await
    }

    /// Follows redirects until a page is rendered.
    pub async fn follow(&mut self, mut response: Response<Body>) -> Response<Body> {
        for _ in 0..5 {
            if response.status() != StatusCode::FOUND {
                return response;
            }
            let to = location(&response).to_string();
            response = self.get(&to).await;
        }
        panic!("too many redirects");
    }

    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }
}

// --- Failing Repository ---

/// Which call of `FailingRepository` goes wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// `get_user` returns a database error.
    UserLookup,
    /// `notifications_for` panics.
    Notifications,
    /// `create_student` reports a duplicate, as if another request won a race.
    StudentConflict,
}

/// An in-memory store with one call rigged to fail.
pub struct FailingRepository {
    inner: InMemoryRepository,
    failure: Failure,
}

impl FailingRepository {
    pub fn new(failure: Failure) -> Self {
        Self {
            inner: InMemoryRepository::new(),
            failure,
        }
    }
}

#[async_trait]
impl Repository for FailingRepository {
    async fn get_user(&self, id: ObjectId) -> RepoResult<Option<User>> {
        if self.failure == Failure::UserLookup {
            let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset");
            return Err(RepoError::Database(mongodb::error::Error::from(io)));
        }
        self.inner.get_user(id).await
    }
    async fn find_user_by_login(&self, login: &str) -> RepoResult<Option<User>> {
        self.inner.find_user_by_login(login).await
    }
    async fn create_user(&self, user: User) -> RepoResult<User> {
        self.inner.create_user(user).await
    }
    async fn delete_user(&self, id: ObjectId) -> RepoResult<bool> {
        self.inner.delete_user(id).await
    }
    async fn create_student(&self, student: Student) -> RepoResult<Student> {
        if self.failure == Failure::StudentConflict {
            return Err(RepoError::Duplicate("a student with that JNTU number"));
        }
        self.inner.create_student(student).await
    }
    async fn get_student_by_user(&self, user_id: ObjectId) -> RepoResult<Option<Student>> {
        self.inner.get_student_by_user(user_id).await
    }
    async fn find_student_by_jntu(&self, jntu_number: &str) -> RepoResult<Option<Student>> {
        self.inner.find_student_by_jntu(jntu_number).await
    }
    async fn get_students(&self, ids: &[ObjectId]) -> RepoResult<Vec<Student>> {
        self.inner.get_students(ids).await
    }
    async fn unassigned_students(&self) -> RepoResult<Vec<Student>> {
        self.inner.unassigned_students().await
    }
    async fn create_faculty(&self, faculty: Faculty) -> RepoResult<Faculty> {
        self.inner.create_faculty(faculty).await
    }
    async fn get_faculty(&self, id: ObjectId) -> RepoResult<Option<Faculty>> {
        self.inner.get_faculty(id).await
    }
    async fn get_faculty_by_user(&self, user_id: ObjectId) -> RepoResult<Option<Faculty>> {
        self.inner.get_faculty_by_user(user_id).await
    }
    async fn list_faculty(&self) -> RepoResult<Vec<Faculty>> {
        self.inner.list_faculty().await
    }
    async fn create_batch(&self, batch: Batch) -> RepoResult<Batch> {
        self.inner.create_batch(batch).await
    }
    async fn get_batch(&self, id: ObjectId) -> RepoResult<Option<Batch>> {
        self.inner.get_batch(id).await
    }
    async fn list_batches(&self) -> RepoResult<Vec<Batch>> {
        self.inner.list_batches().await
    }
    async fn batches_for_guide(&self, faculty_id: ObjectId) -> RepoResult<Vec<Batch>> {
        self.inner.batches_for_guide(faculty_id).await
    }
    async fn set_batch_guide(&self, batch_id: ObjectId, faculty_id: ObjectId) -> RepoResult<bool> {
        self.inner.set_batch_guide(batch_id, faculty_id).await
    }
    async fn add_student_to_batch(
        &self,
        batch_id: ObjectId,
        student_id: ObjectId,
    ) -> RepoResult<bool> {
        self.inner.add_student_to_batch(batch_id, student_id).await
    }
    async fn create_notification(&self, notification: Notification) -> RepoResult<Notification> {
        self.inner.create_notification(notification).await
    }
    async fn notifications_for(&self, user_id: ObjectId) -> RepoResult<Vec<Notification>> {
        if self.failure == Failure::Notifications {
            panic!("notification store exploded");
        }
        self.inner.notifications_for(user_id).await
    }
    async fn mark_notification_read(&self, id: ObjectId, user_id: ObjectId) -> RepoResult<bool> {
        self.inner.mark_notification_read(id, user_id).await
    }
}
