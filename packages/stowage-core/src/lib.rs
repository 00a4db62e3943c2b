//! Record persistence over interchangeable storage backends.
//!
//! A record type registers its fields once; from that registration this
//! crate derives a storage schema, converts instances to and from a flat
//! field-value form, and stores them either in a SQLite database or in
//! flat record files. [`Database`] is the typed entry point:
//!
//! ```no_run
//! use stowage_core::{BackendKind, Database, StoreConfig};
//! use stowage_types::{FieldDef, Filter, Record};
//!
//! #[derive(Debug, Default)]
//! struct Player {
//!     id: i32,
//!     name: String,
//!     active: bool,
//! }
//!
//! impl Record for Player {
//!     const NAME: &'static str = "Player";
//!
//!     fn fields() -> Vec<FieldDef<Self>> {
//!         vec![
//!             FieldDef::new("Id", |p: &Player| &p.id, |p| &mut p.id)
//!                 .primary_key()
//!                 .auto_increment(),
//!             FieldDef::new("Name", |p: &Player| &p.name, |p| &mut p.name),
//!             FieldDef::new("Active", |p: &Player| &p.active, |p| &mut p.active),
//!         ]
//!     }
//! }
//!
//! # fn main() -> Result<(), stowage_core::StoreError> {
//! let config = StoreConfig::with_data_dir("./data");
//! let db = Database::create(BackendKind::Sqlite, "game", &config)?;
//! db.create_table::<Player>()?;
//! db.insert(&Player { name: "ana".into(), active: true, ..Default::default() })?;
//! let found: Option<Player> = db.find(Filter::eq("Name", "ana".to_string()))?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod codec;
pub mod config;
pub mod database;
pub mod error;
pub mod flatfile;
pub mod io_utils;
pub mod predicate;
pub mod schema;
pub mod sqlite;

pub use backend::{Backend, BackendKind, RowQuery};
pub use config::StoreConfig;
pub use database::Database;
pub use error::StoreError;
pub use flatfile::FlatFileBackend;
pub use predicate::Predicate;
pub use schema::{FieldDescriptor, Schema};
pub use sqlite::SqliteBackend;
