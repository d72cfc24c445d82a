//! Splits byte streams into content-defined chunks.

pub mod fast_cdc;

use std::io::Read;

pub use fast_cdc::{ChunkData, ChunkerOptions, Normalization, StreamCdc};

/// Turns a [`Read`] source into an iterator of [`ChunkData`].
///
/// A single implementation ([`fast_cdc::StreamCdc`]) exists today; the trait
/// exists so call sites (`sync_engine`, tests) depend on the chunking
/// contract rather than the FastCDC type directly.
pub trait Chunker<R: Read> {
    type Iter: Iterator<Item = Result<ChunkData, ChunkingError>>;

    fn chunk(self, source: R) -> Self::Iter;
}

impl<R: Read> Chunker<R> for ChunkerOptions {
    type Iter = StreamCdc<R>;

    fn chunk(self, source: R) -> Self::Iter {
        StreamCdc::new(source, self)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChunkingError {
    #[error("io error while chunking: {0}")]
    Io(#[from] std::io::Error),
}
