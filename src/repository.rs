use crate::{
    config::DEFAULT_DATABASE,
    error::{RepoError, RepoResult},
    models::{Batch, Faculty, Notification, Student, User, is_email, normalize_jntu},
    schema::{BATCHES, FACULTIES, NOTIFICATIONS, STUDENTS, USERS},
};
use async_trait::async_trait;
use mongodb::{
    Client, Collection, Cursor, Database,
    bson::{Bson, doc, oid::ObjectId},
    error::{ErrorKind, WriteError, WriteFailure},
};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Repository Trait
///
/// The persistence contract used by every handler. Handlers only see
/// `Arc<dyn Repository>`, so the MongoDB implementation and the in-memory one
/// are interchangeable.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: ObjectId) -> RepoResult<Option<User>>;
    // An identifier containing `@` is matched as an email (case-insensitive),
    // anything else as a student's JNTU number.
    async fn find_user_by_login(&self, login: &str) -> RepoResult<Option<User>>;
    async fn create_user(&self, user: User) -> RepoResult<User>;
    async fn delete_user(&self, id: ObjectId) -> RepoResult<bool>;

    // --- Students ---
    async fn create_student(&self, student: Student) -> RepoResult<Student>;
    async fn get_student_by_user(&self, user_id: ObjectId) -> RepoResult<Option<Student>>;
    async fn find_student_by_jntu(&self, jntu_number: &str) -> RepoResult<Option<Student>>;
    async fn get_students(&self, ids: &[ObjectId]) -> RepoResult<Vec<Student>>;
    // Students not yet placed in any batch.
    async fn unassigned_students(&self) -> RepoResult<Vec<Student>>;

    // --- Faculty ---
    async fn create_faculty(&self, faculty: Faculty) -> RepoResult<Faculty>;
    async fn get_faculty(&self, id: ObjectId) -> RepoResult<Option<Faculty>>;
    async fn get_faculty_by_user(&self, user_id: ObjectId) -> RepoResult<Option<Faculty>>;
    async fn list_faculty(&self) -> RepoResult<Vec<Faculty>>;

    // --- Batches ---
    async fn create_batch(&self, batch: Batch) -> RepoResult<Batch>;
    async fn get_batch(&self, id: ObjectId) -> RepoResult<Option<Batch>>;
    async fn list_batches(&self) -> RepoResult<Vec<Batch>>;
    async fn batches_for_guide(&self, faculty_id: ObjectId) -> RepoResult<Vec<Batch>>;
    // Returns false when the batch does not exist.
    async fn set_batch_guide(&self, batch_id: ObjectId, faculty_id: ObjectId) -> RepoResult<bool>;
    // Returns false when the student already belongs to a batch.
    async fn add_student_to_batch(
        &self,
        batch_id: ObjectId,
        student_id: ObjectId,
    ) -> RepoResult<bool>;

    // --- Notifications ---
    async fn create_notification(&self, notification: Notification) -> RepoResult<Notification>;
    // Newest first.
    async fn notifications_for(&self, user_id: ObjectId) -> RepoResult<Vec<Notification>>;
    // Ownership enforced: only the recipient can mark a notification read.
    async fn mark_notification_read(&self, id: ObjectId, user_id: ObjectId) -> RepoResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// --- MongoDB ---

const DUPLICATE_KEY: i32 = 11000;

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(WriteError { code: DUPLICATE_KEY, .. }))
    )
}

fn insert_error(err: mongodb::error::Error, what: &'static str) -> RepoError {
    if is_duplicate_key(&err) {
        RepoError::Duplicate(what)
    } else {
        RepoError::Database(err)
    }
}

async fn collect<T>(mut cursor: Cursor<T>) -> RepoResult<Vec<T>>
where
    T: DeserializeOwned + Send + Sync,
{
    let mut items = Vec::new();
    while cursor.advance().await? {
        items.push(cursor.deserialize_current()?);
    }
    Ok(items)
}

/// MongoRepository
///
/// The production implementation, one typed collection handle per registered schema.
#[derive(Clone, Debug)]
pub struct MongoRepository {
    db: Database,
    users: Collection<User>,
    faculties: Collection<Faculty>,
    students: Collection<Student>,
    batches: Collection<Batch>,
    notifications: Collection<Notification>,
}

impl MongoRepository {
    /// connect
    ///
    /// Opens the process-wide client and verifies the server answers a `ping`.
    /// The database is the one named in the URI, else `project_management`.
    pub async fn connect(uri: &str) -> Result<Self, mongodb::error::Error> {
        let client = Client::with_uri_str(uri).await?;
        let db = client
            .default_database()
            .unwrap_or_else(|| client.database(DEFAULT_DATABASE));
        crate::schema::ping(&db).await?;
        Ok(Self::new(db))
    }

    pub fn new(db: Database) -> Self {
        Self {
            users: db.collection(USERS),
            faculties: db.collection(FACULTIES),
            students: db.collection(STUDENTS),
            batches: db.collection(BATCHES),
            notifications: db.collection(NOTIFICATIONS),
            db,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl Repository for MongoRepository {
    async fn get_user(&self, id: ObjectId) -> RepoResult<Option<User>> {
        Ok(self.users.find_one(doc! { "_id": id }).await?)
    }

    async fn find_user_by_login(&self, login: &str) -> RepoResult<Option<User>> {
        let filter = if is_email(login) {
            doc! { "email": normalize_email(login) }
        } else {
            doc! { "role.jntuNumber": normalize_jntu(login) }
        };
        Ok(self.users.find_one(filter).await?)
    }

    async fn delete_user(&self, id: ObjectId) -> RepoResult<bool> {
        let result = self.users.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count == 1)
    }

    async fn create_user(&self, user: User) -> RepoResult<User> {
        self.users
            .insert_one(&user)
            .await
            .map_err(|e| insert_error(e, "an account with that email or JNTU number"))?;
        Ok(user)
    }

    async fn create_student(&self, student: Student) -> RepoResult<Student> {
        self.students
            .insert_one(&student)
            .await
            .map_err(|e| insert_error(e, "a student with that JNTU number"))?;
        Ok(student)
    }

    async fn get_student_by_user(&self, user_id: ObjectId) -> RepoResult<Option<Student>> {
        Ok(self.students.find_one(doc! { "user": user_id }).await?)
    }

    async fn find_student_by_jntu(&self, jntu_number: &str) -> RepoResult<Option<Student>> {
        let filter = doc! { "jntuNumber": normalize_jntu(jntu_number) };
        Ok(self.students.find_one(filter).await?)
    }

    async fn get_students(&self, ids: &[ObjectId]) -> RepoResult<Vec<Student>> {
        let ids: Vec<Bson> = ids.iter().copied().map(Bson::ObjectId).collect();
        let cursor = self
            .students
            .find(doc! { "_id": { "$in": ids } })
            .sort(doc! { "jntuNumber": 1 })
            .await?;
        collect(cursor).await
    }

    async fn unassigned_students(&self) -> RepoResult<Vec<Student>> {
        // `null` also matches documents where the field is absent.
        let cursor = self
            .students
            .find(doc! { "batch": Bson::Null })
            .sort(doc! { "jntuNumber": 1 })
            .await?;
        collect(cursor).await
    }

    async fn create_faculty(&self, faculty: Faculty) -> RepoResult<Faculty> {
        self.faculties
            .insert_one(&faculty)
            .await
            .map_err(|e| insert_error(e, "a faculty profile for that account"))?;
        Ok(faculty)
    }

    async fn get_faculty(&self, id: ObjectId) -> RepoResult<Option<Faculty>> {
        Ok(self.faculties.find_one(doc! { "_id": id }).await?)
    }

    async fn get_faculty_by_user(&self, user_id: ObjectId) -> RepoResult<Option<Faculty>> {
        Ok(self.faculties.find_one(doc! { "user": user_id }).await?)
    }

    async fn list_faculty(&self) -> RepoResult<Vec<Faculty>> {
        let cursor = self.faculties.find(doc! {}).sort(doc! { "name": 1 }).await?;
        collect(cursor).await
    }

    async fn create_batch(&self, batch: Batch) -> RepoResult<Batch> {
        self.batches
            .insert_one(&batch)
            .await
            .map_err(|e| insert_error(e, "a batch with that name"))?;
        Ok(batch)
    }

    async fn get_batch(&self, id: ObjectId) -> RepoResult<Option<Batch>> {
        Ok(self.batches.find_one(doc! { "_id": id }).await?)
    }

    async fn list_batches(&self) -> RepoResult<Vec<Batch>> {
        let cursor = self.batches.find(doc! {}).sort(doc! { "_id": -1 }).await?;
        collect(cursor).await
    }

    async fn batches_for_guide(&self, faculty_id: ObjectId) -> RepoResult<Vec<Batch>> {
        let cursor = self
            .batches
            .find(doc! { "guide": faculty_id })
            .sort(doc! { "_id": -1 })
            .await?;
        collect(cursor).await
    }

    async fn set_batch_guide(&self, batch_id: ObjectId, faculty_id: ObjectId) -> RepoResult<bool> {
        let result = self
            .batches
            .update_one(doc! { "_id": batch_id }, doc! { "$set": { "guide": faculty_id } })
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn add_student_to_batch(
        &self,
        batch_id: ObjectId,
        student_id: ObjectId,
    ) -> RepoResult<bool> {
        // Claim the student first so a student can never land in two batches.
        let claimed = self
            .students
            .update_one(
                doc! { "_id": student_id, "batch": Bson::Null },
                doc! { "$set": { "batch": batch_id } },
            )
            .await?;
        if claimed.matched_count == 0 {
            return Ok(false);
        }

        self.batches
            .update_one(
                doc! { "_id": batch_id },
                doc! { "$addToSet": { "students": student_id } },
            )
            .await?;
        Ok(true)
    }

    async fn create_notification(&self, notification: Notification) -> RepoResult<Notification> {
        self.notifications.insert_one(&notification).await?;
        Ok(notification)
    }

    async fn notifications_for(&self, user_id: ObjectId) -> RepoResult<Vec<Notification>> {
        let cursor = self
            .notifications
            .find(doc! { "recipient": user_id })
            .sort(doc! { "_id": -1 })
            .await?;
        collect(cursor).await
    }

    async fn mark_notification_read(&self, id: ObjectId, user_id: ObjectId) -> RepoResult<bool> {
        let result = self
            .notifications
            .update_one(
                doc! { "_id": id, "recipient": user_id },
                doc! { "$set": { "read": true } },
            )
            .await?;
        Ok(result.matched_count == 1)
    }
}

// --- In-memory ---

#[derive(Debug, Default)]
struct MemoryStore {
    users: Vec<User>,
    faculties: Vec<Faculty>,
    students: Vec<Student>,
    batches: Vec<Batch>,
    notifications: Vec<Notification>,
}

/// InMemoryRepository
///
/// A process-local implementation with the same uniqueness and ownership rules
/// as `MongoRepository`. Used by the test suite to drive the full router without
/// a database.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    store: RwLock<MemoryStore>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: ObjectId) -> RepoResult<Option<User>> {
        Ok(self.store.read().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_login(&self, login: &str) -> RepoResult<Option<User>> {
        let store = self.store.read();
        let user = if is_email(login) {
            let email = normalize_email(login);
            store.users.iter().find(|u| u.email == email)
        } else {
            let jntu = normalize_jntu(login);
            store.users.iter().find(|u| u.role.jntu_number() == Some(jntu.as_str()))
        };
        Ok(user.cloned())
    }

    async fn delete_user(&self, id: ObjectId) -> RepoResult<bool> {
        let mut store = self.store.write();
        let before = store.users.len();
        store.users.retain(|u| u.id != id);
        Ok(store.users.len() < before)
    }

    async fn create_user(&self, user: User) -> RepoResult<User> {
        let mut store = self.store.write();
        let clash = store.users.iter().any(|u| {
            u.email == user.email
                || (u.role.jntu_number().is_some()
                    && u.role.jntu_number() == user.role.jntu_number())
        });
        if clash {
            return Err(RepoError::Duplicate("an account with that email or JNTU number"));
        }
        store.users.push(user.clone());
        Ok(user)
    }

    async fn create_student(&self, student: Student) -> RepoResult<Student> {
        let mut store = self.store.write();
        if store
            .students
            .iter()
            .any(|s| s.jntu_number == student.jntu_number || s.user == student.user)
        {
            return Err(RepoError::Duplicate("a student with that JNTU number"));
        }
        store.students.push(student.clone());
        Ok(student)
    }

    async fn get_student_by_user(&self, user_id: ObjectId) -> RepoResult<Option<Student>> {
        Ok(self.store.read().students.iter().find(|s| s.user == user_id).cloned())
    }

    async fn find_student_by_jntu(&self, jntu_number: &str) -> RepoResult<Option<Student>> {
        let jntu = normalize_jntu(jntu_number);
        Ok(self
            .store
            .read()
            .students
            .iter()
            .find(|s| s.jntu_number == jntu)
            .cloned())
    }

    async fn get_students(&self, ids: &[ObjectId]) -> RepoResult<Vec<Student>> {
        let mut students: Vec<Student> = self
            .store
            .read()
            .students
            .iter()
            .filter(|s| ids.contains(&s.id))
            .cloned()
            .collect();
        students.sort_by(|a, b| a.jntu_number.cmp(&b.jntu_number));
        Ok(students)
    }

    async fn unassigned_students(&self) -> RepoResult<Vec<Student>> {
        let mut students: Vec<Student> = self
            .store
            .read()
            .students
            .iter()
            .filter(|s| s.batch.is_none())
            .cloned()
            .collect();
        students.sort_by(|a, b| a.jntu_number.cmp(&b.jntu_number));
        Ok(students)
    }

    async fn create_faculty(&self, faculty: Faculty) -> RepoResult<Faculty> {
        let mut store = self.store.write();
        if store.faculties.iter().any(|f| f.user == faculty.user) {
            return Err(RepoError::Duplicate("a faculty profile for that account"));
        }
        store.faculties.push(faculty.clone());
        Ok(faculty)
    }

    async fn get_faculty(&self, id: ObjectId) -> RepoResult<Option<Faculty>> {
        Ok(self.store.read().faculties.iter().find(|f| f.id == id).cloned())
    }

    async fn get_faculty_by_user(&self, user_id: ObjectId) -> RepoResult<Option<Faculty>> {
        Ok(self.store.read().faculties.iter().find(|f| f.user == user_id).cloned())
    }

    async fn list_faculty(&self) -> RepoResult<Vec<Faculty>> {
        let mut faculty = self.store.read().faculties.clone();
        faculty.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(faculty)
    }

    async fn create_batch(&self, batch: Batch) -> RepoResult<Batch> {
        let mut store = self.store.write();
        if store.batches.iter().any(|b| b.name == batch.name) {
            return Err(RepoError::Duplicate("a batch with that name"));
        }
        store.batches.push(batch.clone());
        Ok(batch)
    }

    async fn get_batch(&self, id: ObjectId) -> RepoResult<Option<Batch>> {
        Ok(self.store.read().batches.iter().find(|b| b.id == id).cloned())
    }

    async fn list_batches(&self) -> RepoResult<Vec<Batch>> {
        Ok(self.store.read().batches.iter().rev().cloned().collect())
    }

    async fn batches_for_guide(&self, faculty_id: ObjectId) -> RepoResult<Vec<Batch>> {
        Ok(self
            .store
            .read()
            .batches
            .iter()
            .rev()
            .filter(|b| b.guide == Some(faculty_id))
            .cloned()
            .collect())
    }

    async fn set_batch_guide(&self, batch_id: ObjectId, faculty_id: ObjectId) -> RepoResult<bool> {
        let mut store = self.store.write();
        match store.batches.iter_mut().find(|b| b.id == batch_id) {
            Some(batch) => {
                batch.guide = Some(faculty_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn add_student_to_batch(
        &self,
        batch_id: ObjectId,
        student_id: ObjectId,
    ) -> RepoResult<bool> {
        let mut store = self.store.write();
        let Some(student) = store
            .students
            .iter_mut()
            .find(|s| s.id == student_id && s.batch.is_none())
        else {
            return Ok(false);
        };
        student.batch = Some(batch_id);

        if let Some(batch) = store.batches.iter_mut().find(|b| b.id == batch_id)
            && !batch.students.contains(&student_id)
        {
            batch.students.push(student_id);
        }
        Ok(true)
    }

    async fn create_notification(&self, notification: Notification) -> RepoResult<Notification> {
        self.store.write().notifications.push(notification.clone());
        Ok(notification)
    }

    async fn notifications_for(&self, user_id: ObjectId) -> RepoResult<Vec<Notification>> {
        Ok(self
            .store
            .read()
            .notifications
            .iter()
            .rev()
            .filter(|n| n.recipient == user_id)
            .cloned()
            .collect())
    }

    async fn mark_notification_read(&self, id: ObjectId, user_id: ObjectId) -> RepoResult<bool> {
        let mut store = self.store.write();
        match store
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.recipient == user_id)
        {
            Some(notification) => {
                notification.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
