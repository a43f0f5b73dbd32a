/// Router Module Index
///
/// The four mounted route groups. Each role group applies its own role guard,
/// so a route can never be reached by the wrong kind of account through a
/// missing check in a handler.

/// Login, logout and registration. Mounted at `/auth`.
pub mod auth;

/// Student dashboard and notifications. Mounted at `/student`.
pub mod student;

/// Faculty dashboard and notifications. Mounted at `/faculty`.
pub mod faculty;

/// Batch management and the supervisor dashboard. Mounted at `/supervisor`.
pub mod supervisor;
