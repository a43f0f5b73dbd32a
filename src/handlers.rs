use crate::{
    AppState,
    auth::{self, AuthUser, CurrentUser},
    error::{AppError, RepoError},
    locals::{ERROR, ERROR_MSG, Locals, SUCCESS_MSG},
    models::{
        AddStudentForm, AssignGuideForm, Batch, BatchForm, Faculty, LoginForm, Notification,
        NotificationView, RegisterForm, Role, Student, User, is_email,
    },
    payload::Payload,
    session::Session,
    views,
};
use axum::{
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use serde::Serialize;
use serde_json::json;

pub const WELCOME_TITLE: &str = "Welcome to Project Management System";
pub const DASHBOARD_LOGIN_REQUIRED: &str = "Please log in to access the dashboard";
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";
pub const MIN_PASSWORD_LEN: usize = 6;

/// redirect
///
/// A `302 Found` redirect, the status browsers follow with a GET after a form POST.
pub fn redirect(to: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, to.to_string())]).into_response()
}

// --- Root & Role Dispatch ---

/// home
///
/// `GET /`. Anonymous visitors get the landing page with the registration forms;
/// logged-in users are sent to their role's dashboard, or to `/dashboard` when
/// their role has none.
pub async fn home(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    session: Session,
) -> Result<Response, AppError> {
    if let Some(user) = user {
        return Ok(redirect(user.role.dashboard_path().unwrap_or("/dashboard")));
    }

    let locals = Locals::take(Some(&session), None);
    let page = state
        .views
        .render(views::INDEX, &locals, json!({ "title": WELCOME_TITLE }))?;
    Ok(page.into_response())
}

/// dashboard
///
/// `GET /dashboard`. Same dispatch as `/`, except that anonymous visitors are
/// flashed an error and sent to `/`, and roles without a dashboard also land on `/`.
pub async fn dashboard(CurrentUser(user): CurrentUser, session: Session) -> Response {
    match user {
        Some(user) => redirect(user.role.dashboard_path().unwrap_or("/")),
        None => {
            session.flash(ERROR_MSG, DASHBOARD_LOGIN_REQUIRED);
            redirect("/")
        }
    }
}

/// not_found
///
/// Catch-all for anything no route or static file matched.
pub async fn not_found(State(state): State<AppState>, locals: Locals) -> Response {
    match state.views.render(views::NOT_FOUND, &locals, json!({})) {
        Ok(page) => (StatusCode::NOT_FOUND, page).into_response(),
        Err(e) => {
            tracing::error!("failed to render 404 page: {}", e);
            (StatusCode::NOT_FOUND, "Not Found").into_response()
        }
    }
}

// --- Authentication ---

/// `GET /auth/login`. Logged-in users have nothing to do here.
pub async fn login_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    session: Session,
) -> Result<Response, AppError> {
    if user.is_some() {
        return Ok(redirect("/dashboard"));
    }
    let locals = Locals::take(Some(&session), None);
    let page = state.views.render(views::LOGIN, &locals, json!({ "title": "Login" }))?;
    Ok(page.into_response())
}

/// login
///
/// `POST /auth/login`. On success the user id goes into the session and the browser
/// is sent through `/dashboard`, which dispatches by role.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Payload(form): Payload<LoginForm>,
) -> Result<Response, AppError> {
    match auth::authenticate(&state.repo, &form.email, &form.password).await? {
        Some(user) => {
            tracing::info!(user_id = %user.id, role = user.role.kind().as_str(), "user logged in");
            session.set_user(user.id);
            session.flash(SUCCESS_MSG, "You are now logged in");
            Ok(redirect("/dashboard"))
        }
        None => {
            tracing::debug!("login rejected");
            session.flash(ERROR, INVALID_CREDENTIALS);
            Ok(redirect("/auth/login"))
        }
    }
}

/// `GET /auth/logout`
pub async fn logout(session: Session) -> Response {
    session.clear_user();
    session.flash(SUCCESS_MSG, "You are logged out");
    redirect("/")
}

fn validate_registration(form: &RegisterForm) -> Vec<&'static str> {
    let mut errors = Vec::new();

    let base_fields = [&form.name, &form.email, &form.password, &form.password2];
    if base_fields.iter().any(|field| field.trim().is_empty()) {
        errors.push("Please fill in all fields");
    }
    if !form.email.trim().is_empty() && !is_email(&form.email) {
        errors.push("Please enter a valid email address");
    }
    match form.role.as_str() {
        "student" if form.jntu_number.trim().is_empty() => {
            errors.push("JNTU number is required for students")
        }
        "faculty" if form.department.trim().is_empty() => {
            errors.push("Department is required for faculty")
        }
        "student" | "faculty" => {}
        _ => errors.push("Please choose to register as a student or as faculty"),
    }
    if form.password != form.password2 {
        errors.push("Passwords do not match");
    }
    if form.password.len() < MIN_PASSWORD_LEN {
        errors.push("Password must be at least 6 characters");
    }
    errors
}

/// register
///
/// `POST /auth/register`. Creates the account and its role profile. Validation
/// problems and taken identifiers are flashed back to the landing page.
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Payload(form): Payload<RegisterForm>,
) -> Result<Response, AppError> {
    let errors = validate_registration(&form);
    if !errors.is_empty() {
        session.flash(ERROR_MSG, errors.join(". "));
        return Ok(redirect("/"));
    }

    let email = form.email.trim().to_lowercase();
    if state.repo.find_user_by_login(&email).await?.is_some() {
        session.flash(ERROR_MSG, "Email is already registered");
        return Ok(redirect("/"));
    }

    let role = if form.role == "student" {
        if state.repo.find_student_by_jntu(&form.jntu_number).await?.is_some() {
            session.flash(ERROR_MSG, "JNTU number is already registered");
            return Ok(redirect("/"));
        }
        Role::student(&form.jntu_number)
    } else {
        Role::Faculty
    };

    let password_hash = auth::hash_password(form.password.clone(), state.config.bcrypt_cost).await?;
    let name = form.name.trim().to_string();
    let user = match state
        .repo
        .create_user(User::new(name.clone(), email.clone(), password_hash, role))
        .await
    {
        Ok(user) => user,
        // Lost a race with a concurrent registration of the same identifier.
        Err(RepoError::Duplicate(what)) => {
            session.flash(ERROR_MSG, format!("{what} already exists"));
            return Ok(redirect("/"));
        }
        Err(e) => return Err(e.into()),
    };

    let profile = match &user.role {
        Role::Student { jntu_number } => state
            .repo
            .create_student(Student {
                id: ObjectId::new(),
                user: user.id,
                name,
                email,
                jntu_number: jntu_number.clone(),
                branch: form.branch.trim().to_string(),
                batch: None,
            })
            .await
            .map(|_| ()),
        _ => state
            .repo
            .create_faculty(Faculty {
                id: ObjectId::new(),
                user: user.id,
                name,
                email,
                department: form.department.trim().to_string(),
                designation: form.designation.trim().to_string(),
            })
            .await
            .map(|_| ()),
    };

    // An account never outlives a failed profile insert.
    if let Err(e) = profile {
        if let Err(cleanup) = state.repo.delete_user(user.id).await {
            tracing::error!(
                user_id = %user.id,
                "failed to remove account without profile: {}",
                cleanup
            );
        }
        return match e {
            RepoError::Duplicate(what) => {
                tracing::warn!(user_id = %user.id, "profile conflict on registration: {}", what);
                session.flash(ERROR_MSG, format!("{what} already exists"));
                Ok(redirect("/"))
            }
            e => Err(e.into()),
        };
    }

    tracing::info!(user_id = %user.id, role = user.role.kind().as_str(), "user registered");
    session.flash(SUCCESS_MSG, "You are now registered and can log in");
    Ok(redirect("/auth/login"))
}

// --- Dashboards ---

#[derive(Debug, Serialize)]
struct StudentView {
    id: String,
    name: String,
    #[serde(rename = "jntuNumber")]
    jntu_number: String,
    branch: String,
}

impl From<&Student> for StudentView {
    fn from(s: &Student) -> Self {
        Self {
            id: s.id.to_hex(),
            name: s.name.clone(),
            jntu_number: s.jntu_number.clone(),
            branch: s.branch.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct FacultyView {
    id: String,
    name: String,
    email: String,
    department: String,
    designation: String,
}

impl From<&Faculty> for FacultyView {
    fn from(f: &Faculty) -> Self {
        Self {
            id: f.id.to_hex(),
            name: f.name.clone(),
            email: f.email.clone(),
            department: f.department.clone(),
            designation: f.designation.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct BatchView {
    id: String,
    name: String,
    year: i32,
    #[serde(rename = "projectTitle")]
    project_title: String,
    // Guide's display name.
    guide: Option<String>,
    students: Vec<StudentView>,
}

/// Resolves a batch's guide and members for display.
async fn batch_view(state: &AppState, batch: &Batch) -> Result<BatchView, AppError> {
    let guide = match batch.guide {
        Some(id) => state.repo.get_faculty(id).await?.map(|f| f.name),
        None => None,
    };
    let students = state.repo.get_students(&batch.students).await?;

    Ok(BatchView {
        id: batch.id.to_hex(),
        name: batch.name.clone(),
        year: batch.year,
        project_title: batch.project_title.clone(),
        guide,
        students: students.iter().map(StudentView::from).collect(),
    })
}

async fn notification_views(
    state: &AppState,
    user_id: ObjectId,
) -> Result<Vec<NotificationView>, AppError> {
    let notifications = state.repo.notifications_for(user_id).await?;
    Ok(notifications.iter().map(NotificationView::from).collect())
}

/// `GET /student/dashboard`
pub async fn student_dashboard(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    locals: Locals,
) -> Result<Response, AppError> {
    let student = state.repo.get_student_by_user(user.id).await?;

    let batch = match student.as_ref().and_then(|s| s.batch) {
        Some(batch_id) => match state.repo.get_batch(batch_id).await? {
            Some(batch) => Some(batch_view(&state, &batch).await?),
            None => None,
        },
        None => None,
    };

    let page = state.views.render(
        views::STUDENT_DASHBOARD,
        &locals,
        json!({
            "title": "Student Dashboard",
            "student": student.as_ref().map(StudentView::from),
            "batch": batch,
            "notifications": notification_views(&state, user.id).await?,
        }),
    )?;
    Ok(page.into_response())
}

/// `GET /faculty/dashboard`
pub async fn faculty_dashboard(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    locals: Locals,
) -> Result<Response, AppError> {
    let faculty = state.repo.get_faculty_by_user(user.id).await?;

    let mut batches = Vec::new();
    if let Some(faculty) = &faculty {
        for batch in state.repo.batches_for_guide(faculty.id).await? {
            batches.push(batch_view(&state, &batch).await?);
        }
    }

    let page = state.views.render(
        views::FACULTY_DASHBOARD,
        &locals,
        json!({
            "title": "Faculty Dashboard",
            "faculty": faculty.as_ref().map(FacultyView::from),
            "batches": batches,
            "notifications": notification_views(&state, user.id).await?,
        }),
    )?;
    Ok(page.into_response())
}

/// `GET /supervisor/dashboard`
pub async fn supervisor_dashboard(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    locals: Locals,
) -> Result<Response, AppError> {
    let mut batches = Vec::new();
    for batch in state.repo.list_batches().await? {
        batches.push(batch_view(&state, &batch).await?);
    }
    let faculty = state.repo.list_faculty().await?;
    let unassigned = state.repo.unassigned_students().await?;

    let page = state.views.render(
        views::SUPERVISOR_DASHBOARD,
        &locals,
        json!({
            "title": "Supervisor Dashboard",
            "batches": batches,
            "faculty": faculty.iter().map(FacultyView::from).collect::<Vec<_>>(),
            "unassigned": unassigned.iter().map(StudentView::from).collect::<Vec<_>>(),
            "notifications": notification_views(&state, user.id).await?,
        }),
    )?;
    Ok(page.into_response())
}

// --- Supervisor Actions ---

const SUPERVISOR_HOME: &str = "/supervisor/dashboard";

/// `POST /supervisor/batches`
pub async fn create_batch(
    State(state): State<AppState>,
    session: Session,
    Payload(form): Payload<BatchForm>,
) -> Result<Response, AppError> {
    let name = form.name.trim();
    let project_title = form.project_title.trim();
    let year = form.year.trim().parse::<i32>().ok().filter(|y| (2000..=2100).contains(y));

    let (Some(year), false, false) = (year, name.is_empty(), project_title.is_empty()) else {
        session.flash(ERROR_MSG, "Batch name, a valid year and a project title are required");
        return Ok(redirect(SUPERVISOR_HOME));
    };

    let batch = Batch {
        id: ObjectId::new(),
        name: name.to_string(),
        year,
        project_title: project_title.to_string(),
        guide: None,
        students: Vec::new(),
        created_at: Utc::now(),
    };

    match state.repo.create_batch(batch).await {
        Ok(batch) => {
            tracing::info!(batch_id = %batch.id, name = %batch.name, "batch created");
            session.flash(SUCCESS_MSG, format!("Batch {} created", batch.name));
        }
        Err(RepoError::Duplicate(_)) => {
            session.flash(ERROR_MSG, format!("A batch named {name} already exists"));
        }
        Err(e) => return Err(e.into()),
    }
    Ok(redirect(SUPERVISOR_HOME))
}

/// Loads the batch named by a path segment, or flashes and returns `None`.
async fn find_batch(
    state: &AppState,
    session: &Session,
    id: &str,
) -> Result<Option<Batch>, AppError> {
    let batch = match ObjectId::parse_str(id) {
        Ok(id) => state.repo.get_batch(id).await?,
        Err(_) => None,
    };
    if batch.is_none() {
        session.flash(ERROR_MSG, "Batch not found");
    }
    Ok(batch)
}

/// `POST /supervisor/batches/{id}/guide`. Notifies the newly assigned guide.
pub async fn assign_guide(
    State(state): State<AppState>,
    session: Session,
    Path(batch_id): Path<String>,
    Payload(form): Payload<AssignGuideForm>,
) -> Result<Response, AppError> {
    let Some(batch) = find_batch(&state, &session, &batch_id).await? else {
        return Ok(redirect(SUPERVISOR_HOME));
    };

    let faculty = match ObjectId::parse_str(form.faculty_id.trim()) {
        Ok(id) => state.repo.get_faculty(id).await?,
        Err(_) => None,
    };
    let Some(faculty) = faculty else {
        session.flash(ERROR_MSG, "Faculty member not found");
        return Ok(redirect(SUPERVISOR_HOME));
    };

    if state.repo.set_batch_guide(batch.id, faculty.id).await? {
        state
            .repo
            .create_notification(Notification::new(
                faculty.user,
                format!(
                    "You have been assigned as guide for batch {} ({})",
                    batch.name, batch.project_title
                ),
            ))
            .await?;
        session.flash(SUCCESS_MSG, format!("{} now guides batch {}", faculty.name, batch.name));
    } else {
        session.flash(ERROR_MSG, "Batch not found");
    }
    Ok(redirect(SUPERVISOR_HOME))
}

/// `POST /supervisor/batches/{id}/students`. Notifies the added student.
pub async fn add_student(
    State(state): State<AppState>,
    session: Session,
    Path(batch_id): Path<String>,
    Payload(form): Payload<AddStudentForm>,
) -> Result<Response, AppError> {
    let Some(batch) = find_batch(&state, &session, &batch_id).await? else {
        return Ok(redirect(SUPERVISOR_HOME));
    };

    let Some(student) = state.repo.find_student_by_jntu(&form.jntu_number).await? else {
        session.flash(ERROR_MSG, "No student with that JNTU number");
        return Ok(redirect(SUPERVISOR_HOME));
    };

    if state.repo.add_student_to_batch(batch.id, student.id).await? {
        state
            .repo
            .create_notification(Notification::new(
                student.user,
                format!("You have been added to batch {} ({})", batch.name, batch.project_title),
            ))
            .await?;
        session.flash(SUCCESS_MSG, format!("{} added to batch {}", student.name, batch.name));
    } else {
        session.flash(ERROR_MSG, format!("{} already belongs to a batch", student.name));
    }
    Ok(redirect(SUPERVISOR_HOME))
}

// --- Notifications ---

/// `POST /{role}/notifications/{id}/read`
///
/// Only the recipient can mark a notification read; anything else is a no-op
/// that still returns to the caller's dashboard.
pub async fn mark_notification_read(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    session: Session,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let marked = match ObjectId::parse_str(&id) {
        Ok(id) => state.repo.mark_notification_read(id, user.id).await?,
        Err(_) => false,
    };
    if !marked {
        session.flash(ERROR_MSG, "Notification not found");
    }
    Ok(redirect(user.role.dashboard_path().unwrap_or("/")))
}
