//! Incremental, deduplicated local file backup: FastCDC chunking over a
//! content-addressed, refcounted chunk store, driven by diffing successive
//! directory snapshots.

pub mod checksum;
pub mod chunker;
pub mod config;
pub mod diff;
pub mod error;
pub mod fnode;
pub mod hierarchy;
pub mod store;
pub mod sync_engine;
pub mod watcher;

pub use error::{Error, Result};
