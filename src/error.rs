//! Crate-wide error type. Operational code returns this via `?`; `main`
//! surfaces it through `eyre`/`color-eyre` for a reported backtrace.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunking error: {0}")]
    Chunking(#[from] crate::chunker::ChunkingError),

    #[error("index error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("migration error: {0}")]
    Migration(#[from] rusqlite_migration::Error),

    #[error("json codec error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, Error>;
