//! Storage layer for Cadence.
//!
//! `ItemStore` is the seam the scheduler talks to. Two implementations ship
//! with the crate:
//! - **`InMemoryStore`**: `BTreeMap` behind a mutex, for tests and embedding
//! - **`SqliteStore`**: a single SQLite file, used by the `cadence` binary

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{ItemStore, apply_update};
