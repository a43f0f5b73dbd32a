use mongodb::{
    Database, IndexModel,
    bson::{Document, doc},
    options::IndexOptions,
};

/// An index declared by a schema.
#[derive(Debug, Clone, Copy)]
pub struct IndexSpec {
    pub key: &'static str,
    pub unique: bool,
}

/// Schema
///
/// One registered model: its name, the collection backing it, and the indexes
/// that enforce its invariants (uniqueness) and serve its lookups.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub model: &'static str,
    pub collection: &'static str,
    pub indexes: &'static [IndexSpec],
}

pub const USERS: &str = "users";
pub const FACULTIES: &str = "faculties";
pub const STUDENTS: &str = "students";
pub const BATCHES: &str = "batches";
pub const NOTIFICATIONS: &str = "notifications";

/// Registration order. Each schema only references schemas registered before it:
/// Faculty/Student -> User, Batch -> Faculty/Student, Notification -> User.
pub const SCHEMAS: [Schema; 5] = [
    Schema {
        model: "User",
        collection: USERS,
        indexes: &[
            IndexSpec { key: "email", unique: true },
            IndexSpec { key: "role.jntuNumber", unique: true },
        ],
    },
    Schema {
        model: "Faculty",
        collection: FACULTIES,
        indexes: &[IndexSpec { key: "user", unique: true }],
    },
    Schema {
        model: "Student",
        collection: STUDENTS,
        indexes: &[
            IndexSpec { key: "user", unique: true },
            IndexSpec { key: "jntuNumber", unique: true },
            IndexSpec { key: "batch", unique: false },
        ],
    },
    Schema {
        model: "Batch",
        collection: BATCHES,
        indexes: &[
            IndexSpec { key: "name", unique: true },
            IndexSpec { key: "guide", unique: false },
        ],
    },
    Schema {
        model: "Notification",
        collection: NOTIFICATIONS,
        indexes: &[IndexSpec { key: "recipient", unique: false }],
    },
];

fn index_model(spec: &IndexSpec) -> IndexModel {
    let mut keys = Document::new();
    keys.insert(spec.key, 1);

    // Sparse so that documents without the field (non-student users) never collide.
    let options = IndexOptions::builder()
        .unique(spec.unique)
        .sparse(spec.unique)
        .build();

    IndexModel::builder().keys(keys).options(options).build()
}

/// register_schemas
///
/// Creates the indexes of every schema, strictly in `SCHEMAS` order, and returns
/// the names of the registered models. Index creation is idempotent.
pub async fn register_schemas(db: &Database) -> Result<Vec<&'static str>, mongodb::error::Error> {
    let mut registered = Vec::with_capacity(SCHEMAS.len());

    for schema in &SCHEMAS {
        let collection = db.collection::<Document>(schema.collection);
        for spec in schema.indexes {
            collection.create_index(index_model(spec)).await?;
        }
        tracing::debug!(model = schema.model, collection = schema.collection, "schema registered");
        registered.push(schema.model);
    }

    Ok(registered)
}

/// Confirms the server is reachable.
pub async fn ping(db: &Database) -> Result<(), mongodb::error::Error> {
    db.run_command(doc! { "ping": 1 }).await?;
    Ok(())
}
