//! Database module: models, schema and store for persistent storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows and enum types
//! - `schema.rs`: SQL DDL for initializing the database (PostgreSQL)
//! - `postgres.rs`: `Database`, the typed store over a `PgPool`

pub mod models;
pub mod postgres;
pub mod schema;

pub use models::{DbProfile, DbSession, DbUser, SessionAndUser};
pub use postgres::{Database, PgPool};
pub use schema::POSTGRES_INIT;
