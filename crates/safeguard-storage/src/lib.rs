//! Safeguard Storage - SQLite persistence layer.
//!
//! Persists the two durable policy sets as JSON arrays in a key-value
//! snapshot table. The sets are read once at process start and written
//! back as partial updates (only the set that changed); the temporary
//! allow set and the recency list are deliberately never stored.
//!
//! # Example
//!
//! ```
//! use safeguard_storage::Database;
//! use safeguard_core::policy::PolicyUpdate;
//!
//! let db = Database::in_memory().unwrap();
//!
//! db.save_policy(&PolicyUpdate {
//!     allow: Some(vec!["example.com".to_string()]),
//!     redirect: None,
//! })
//! .unwrap();
//!
//! let snapshot = db.load_policy().unwrap();
//! assert_eq!(snapshot.allow, vec!["example.com"]);
//! ```

mod database;
pub mod error;
mod schema;

pub use database::Database;
pub use error::{Result, StorageError};
