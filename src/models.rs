use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime as bson_datetime;
use serde::{Deserialize, Serialize};

// --- Core Application Schemas (Mapped to Collections) ---

/// Role
///
/// Explicit discriminant for the kind of account a `User` is. Stored as a
/// sub-document under `role.kind`; the student's JNTU number lives inside the
/// `Student` variant, so an account is a student exactly when it carries one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Role {
    Student {
        #[serde(rename = "jntuNumber")]
        jntu_number: String,
    },
    Faculty,
    Supervisor,
    /// Any role string this application has no dashboard for.
    #[serde(other)]
    Other,
}

/// Login identifiers with an `@` are emails; JNTU numbers never contain one.
pub fn is_email(value: &str) -> bool {
    value.contains('@')
}

/// Normalizes a JNTU number for storage and lookup.
pub fn normalize_jntu(jntu_number: &str) -> String {
    jntu_number.trim().to_uppercase()
}

impl Role {
    pub fn student(jntu_number: &str) -> Self {
        Role::Student {
            jntu_number: normalize_jntu(jntu_number),
        }
    }

    /// Role-specific dashboard, or `None` when the role has no dashboard.
    pub fn dashboard_path(&self) -> Option<&'static str> {
        match self {
            Role::Student { .. } => Some("/student/dashboard"),
            Role::Faculty => Some("/faculty/dashboard"),
            Role::Supervisor => Some("/supervisor/dashboard"),
            Role::Other => None,
        }
    }

    pub fn kind(&self) -> RoleKind {
        match self {
            Role::Student { .. } => RoleKind::Student,
            Role::Faculty => RoleKind::Faculty,
            Role::Supervisor => RoleKind::Supervisor,
            Role::Other => RoleKind::Other,
        }
    }

    pub fn jntu_number(&self) -> Option<&str> {
        match self {
            Role::Student { jntu_number } => Some(jntu_number),
            _ => None,
        }
    }
}

/// Data-less mirror of `Role`, used where only the kind matters (route guards, views).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleKind {
    Student,
    Faculty,
    Supervisor,
    Other,
}

impl RoleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RoleKind::Student => "student",
            RoleKind::Faculty => "faculty",
            RoleKind::Supervisor => "supervisor",
            RoleKind::Other => "other",
        }
    }
}

/// User
///
/// The login account stored in the `users` collection. Every person in the system
/// has exactly one, and role-specific profiles (`Student`, `Faculty`) point back to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    // Stored lowercase; unique.
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    #[serde(with = "bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: String, password_hash: String, role: Role) -> Self {
        Self {
            id: ObjectId::new(),
            name,
            email: email.to_lowercase(),
            password_hash,
            role,
            created_at: Utc::now(),
        }
    }
}

/// Faculty
///
/// Faculty profile in the `faculties` collection. Faculty members guide batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Faculty {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    // FK to users._id (unique).
    pub user: ObjectId,
    pub name: String,
    pub email: String,
    pub department: String,
    pub designation: String,
}

/// Student
///
/// Student profile in the `students` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    // FK to users._id (unique).
    pub user: ObjectId,
    pub name: String,
    pub email: String,
    pub jntu_number: String,
    pub branch: String,
    // FK to batches._id; a student belongs to at most one batch.
    pub batch: Option<ObjectId>,
}

/// Batch
///
/// A project batch: a group of students working on one project under one guide.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub year: i32,
    pub project_title: String,
    // FK to faculties._id.
    pub guide: Option<ObjectId>,
    // FKs to students._id.
    pub students: Vec<ObjectId>,
    #[serde(with = "bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// Notification
///
/// A message addressed to a single user; shown on that user's dashboard until read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    // FK to users._id.
    pub recipient: ObjectId,
    pub message: String,
    pub read: bool,
    #[serde(with = "bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(recipient: ObjectId, message: impl Into<String>) -> Self {
        Self {
            id: ObjectId::new(),
            recipient,
            message: message.into(),
            read: false,
            created_at: Utc::now(),
        }
    }
}

// --- Request Payloads (url-encoded forms) ---
//
// Every field defaults to empty so a missing input becomes a validation message
// rather than a 422 rejection from the extractor.

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoginForm {
    // Email address, or a student's JNTU number.
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password2: String,
    // "student" or "faculty".
    pub role: String,
    pub jntu_number: String,
    pub branch: String,
    pub department: String,
    pub designation: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct BatchForm {
    pub name: String,
    pub year: String,
    pub project_title: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct AssignGuideForm {
    pub faculty_id: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct AddStudentForm {
    pub jntu_number: String,
}

// --- View Models (template context) ---

/// UserView
///
/// The subset of `User` exposed to templates as `user`. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: &'static str,
    #[serde(rename = "jntuNumber")]
    pub jntu_number: Option<String>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_hex(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role.kind().as_str(),
            jntu_number: user.role.jntu_number().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationView {
    pub id: String,
    pub message: String,
    pub read: bool,
    pub created_at: String,
}

impl From<&Notification> for NotificationView {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id.to_hex(),
            message: n.message.clone(),
            read: n.read,
            created_at: n.created_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}
