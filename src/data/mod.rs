//! Data layer module
//!
//! Handles all data persistence and caching:
//! - SQLite database operations
//! - Feed ranking cache (volatile)

mod cache;
mod database;
mod models;

pub use cache::{RankingCache, apply_ordering};
pub use database::Database;
pub use models::*;
