//! Durable store: plain-SQL query functions grouped per entity.

pub mod maps;
pub mod models;
pub mod pois;
pub mod sessions;
pub mod users;

/// Whether an error is a Postgres unique-constraint violation on the named
/// constraint. Engines use this to turn insert races into typed conflicts.
pub fn is_unique_violation(err: &anyhow::Error, constraint: &str) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|db| {
            db.code().as_deref() == Some("23505") && db.constraint() == Some(constraint)
        })
}
