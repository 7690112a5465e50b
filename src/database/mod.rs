/*!
 * Database module for persistent job bookkeeping.
 *
 * This module provides SQLite-based persistence for the job registry, so
 * deduplication survives restarts and can be shared between processes.
 */

pub mod schema;
pub mod connection;
pub mod repository;
pub mod models;

// Re-export main types
pub use connection::DatabaseConnection;
pub use repository::SqliteJobRegistry;
