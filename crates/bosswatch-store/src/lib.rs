//! `bosswatch-store`: the shared document store behind the boss catalog and
//! the notifier settings document.
//!
//! [`DocumentStore`] is the narrow interface the scheduling core consumes:
//! snapshot subscriptions, merge-writes, and an atomic read-modify-write over
//! the settings document. [`SqliteStore`] implements it on a SQLite file that
//! any number of processes may share.

pub mod db;
pub mod error;
pub mod sqlite;
pub mod store;

pub use error::{Result, StoreError};
pub use sqlite::SqliteStore;
pub use store::{DocumentStore, SettingsTxn};
