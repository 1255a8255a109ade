//! # schemaguard-adapter
//!
//! Driver-correct DDL generation and live schema introspection.
//!
//! This crate provides:
//! - A [`Connection`] seam for running raw SQL against a live database
//! - The [`DatabaseAdapter`] capability surface: introspection, DDL generation,
//!   archive renames, row capture and re-insertion, transactions
//! - Adapters for MySQL, PostgreSQL and SQLite
//! - An [`AdapterFactory`] that picks, validates and caches adapters
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────────┐
//! │  Connection  │────▶│ AdapterFactory │────▶│ DatabaseAdapter  │
//! │ (driver id)  │     │ enabled? reg?  │     │ mysql/pg/sqlite  │
//! └──────────────┘     └────────────────┘     └──────────────────┘
//!                              │                       │
//!                              ▼                       ▼
//!                      ┌────────────────┐     ┌──────────────────┐
//!                      │ default cache  │     │ introspect / DDL │
//!                      └────────────────┘     └──────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use schemaguard_adapter::{AdapterFactory, DriverConfig, SqliteConnection};
//!
//! let conn = Arc::new(SqliteConnection::open("app.db").await?);
//! let factory = AdapterFactory::new(DriverConfig::default());
//! let adapter = factory.default_adapter(conn)?;
//!
//! for table in adapter.get_all_tables().await? {
//!     println!("{table}: {} rows", adapter.get_table_row_count(&table).await?);
//! }
//! ```
//!
//! ## Features
//!
//! - `sqlite` (default): [`SqliteConnection`] over `tokio-rusqlite`
//! - `postgres`: `PostgresConnection` over `tokio-postgres`
//! - `mysql`: `MySqlConnection` over `mysql_async`
//!
//! The adapters themselves are always available; the features only gate the
//! live connections.

pub mod adapter;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod factory;
pub mod mysql;
pub mod postgres;
pub mod sql;
pub mod sqlite;
pub mod types;

pub use adapter::{DatabaseAdapter, INSERT_CHUNK_SIZE};
pub use config::DriverConfig;
pub use connection::{BINARY_KEY, Connection, Row, as_binary_hex, binary_value};
pub use error::{AdapterError, AdapterResult};
pub use factory::{AdapterConstructor, AdapterFactory};
pub use mysql::{MYSQL_DRIVER, MySqlAdapter};
pub use postgres::{POSTGRES_DRIVER, PostgresAdapter};
pub use sqlite::{SQLITE_DRIVER, SqliteAdapter};
pub use types::{
    Column, ColumnDefinition, ColumnType, ForeignKey, Index, IndexDefinition, OperationKind,
};

#[cfg(feature = "mysql")]
pub use driver::MySqlConnection;
#[cfg(feature = "postgres")]
pub use driver::PostgresConnection;
#[cfg(feature = "sqlite")]
pub use driver::SqliteConnection;
