//! Database module: models, schema, queries and the actor that owns the pool.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `queries.rs`: SQL shared by the actions
//! - `uow.rs`: transaction plus post-commit hooks
//! - `actor.rs`: serializes mutations through one actor

pub mod actor;
pub mod models;
pub mod queries;
pub mod schema;
pub mod uow;

pub use actor::{DbActorHandle, connect, spawn};
pub use models::{
    AuditEventType, DbRealm, DbRealmAuditLog, DbStream, DbSubscription, DbUser, STREAM_RECIPIENT_TYPE,
};
pub use schema::SQLITE_INIT;
pub use uow::UnitOfWork;
