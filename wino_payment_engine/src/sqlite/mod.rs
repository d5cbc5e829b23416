//! SQLite storage backend for the Wino Payment Engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
