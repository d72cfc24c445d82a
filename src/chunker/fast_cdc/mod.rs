//! FastCDC content-defined chunking (Xia et al., 2020) with gear-hash cut-point
//! judgement, sub-minimum skipping and normalized chunking.
//!
//! This implementation is synchronous and generic over [`Read`]: it pulls bytes
//! into a single growable buffer and hands back one [`ChunkData`] at a time via
//! the [`Iterator`] impl on [`StreamCdc`]. There is no background task and no
//! shared buffer pool; the buffer is owned by the iterator and grows up to
//! `max_size` as needed, then gets drained on every cut.

mod consts;

use std::fmt;
use std::io::Read;

use consts::{GEAR, GEAR_LS, MASKS};
pub use consts::{AVERAGE_MAX, AVERAGE_MIN, MAXIMUM_MAX, MAXIMUM_MIN, MINIMUM_MAX, MINIMUM_MIN};

use crate::chunker::ChunkingError;

/// Degree of normalized chunking: how tightly chunk sizes cluster around
/// `avg_size`. Higher levels produce more uniform sizes at the cost of
/// slightly worse boundary-shift resilience.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Normalization {
    Level0,
    Level1,
    Level2,
    Level3,
}

impl Normalization {
    fn bits(self) -> u32 {
        match self {
            Normalization::Level0 => 0,
            Normalization::Level1 => 1,
            Normalization::Level2 => 2,
            Normalization::Level3 => 3,
        }
    }
}

impl fmt::Display for Normalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.bits().fmt(f)
    }
}

/// Base-2 logarithm, rounded to the nearest integer, used to pick the pair of
/// mask widths that straddle `avg_size`.
fn logarithm2(value: u32) -> u32 {
    f64::from(value).log2().round() as u32
}

/// Find the next cut point in `source`. Returns the gear hash as of the cut
/// and the byte offset at which the chunk ends. A `count` of 0 means `source`
/// did not contain enough bytes to cut even a sub-minimum final chunk.
#[allow(clippy::too_many_arguments)]
fn cut(
    source: &[u8],
    min_size: usize,
    avg_size: usize,
    max_size: usize,
    mask_s: u64,
    mask_l: u64,
    mask_s_ls: u64,
    mask_l_ls: u64,
    gear: &[u64; 256],
    gear_ls: &[u64; 256],
) -> (u64, usize) {
    let mut remaining = source.len();
    if remaining <= min_size {
        return (0, remaining);
    }
    let mut center = avg_size;
    if remaining > max_size {
        remaining = max_size;
    } else if remaining < center {
        center = remaining;
    }
    let mut index = min_size / 2;
    let mut hash: u64 = 0;
    while index < center / 2 {
        let a = index * 2;
        hash = (hash << 2).wrapping_add(gear_ls[source[a] as usize]);
        if (hash & mask_s_ls) == 0 {
            return (hash, a);
        }
        hash = hash.wrapping_add(gear[source[a + 1] as usize]);
        if (hash & mask_s) == 0 {
            return (hash, a + 1);
        }
        index += 1;
    }
    while index < remaining / 2 {
        let a = index * 2;
        hash = (hash << 2).wrapping_add(gear_ls[source[a] as usize]);
        if (hash & mask_l_ls) == 0 {
            return (hash, a);
        }
        hash = hash.wrapping_add(gear[source[a + 1] as usize]);
        if (hash & mask_l) == 0 {
            return (hash, a + 1);
        }
        index += 1;
    }
    // pathological data (e.g. all zeroes): take the largest allowed chunk
    (hash, remaining)
}

/// A chunk as produced by [`StreamCdc`]: its content, its gear hash, and its
/// position within the overall stream.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ChunkData {
    /// Gear hash value as of the end of the chunk. Low entropy; not a content
    /// identifier on its own, see [`crate::checksum::checksum`].
    pub hash: u64,
    /// Byte offset of the start of this chunk within the stream.
    pub offset: u64,
    /// Number of bytes in this chunk.
    pub length: usize,
    /// The chunk's bytes.
    pub data: Vec<u8>,
}

/// Parameters bounding the chunker: the minimum, average (target) and maximum
/// chunk size, plus the normalization level.
#[derive(Copy, Clone, Debug)]
pub struct ChunkerOptions {
    pub min_size: u32,
    pub avg_size: u32,
    pub max_size: u32,
    pub normalization: Normalization,
}

impl Default for ChunkerOptions {
    fn default() -> Self {
        ChunkerOptions {
            min_size: 2048,
            avg_size: 8192,
            max_size: 65536,
            normalization: Normalization::Level2,
        }
    }
}

/// Streams chunks out of any [`Read`] source using FastCDC boundary detection.
///
/// Holds a single buffer that fills up to `max_size` bytes at a time; every
/// yielded chunk drains the consumed prefix back out of it and tops the
/// buffer back up from `source` before the next cut is attempted.
pub struct StreamCdc<R: Read> {
    buffer: Vec<u8>,
    capacity: usize,
    length: usize,
    source: R,
    processed: u64,
    eof: bool,
    min_size: usize,
    avg_size: usize,
    max_size: usize,
    mask_s: u64,
    mask_l: u64,
    mask_s_ls: u64,
    mask_l_ls: u64,
}

impl<R: Read> StreamCdc<R> {
    pub fn new(source: R, opts: ChunkerOptions) -> Self {
        assert!(opts.min_size >= MINIMUM_MIN && opts.min_size <= MINIMUM_MAX);
        assert!(opts.avg_size >= AVERAGE_MIN && opts.avg_size <= AVERAGE_MAX);
        assert!(opts.max_size >= MAXIMUM_MIN && opts.max_size <= MAXIMUM_MAX);
        let bits = logarithm2(opts.avg_size);
        let normalization = opts.normalization.bits();
        let mask_s = MASKS[(bits + normalization) as usize];
        let mask_l = MASKS[(bits - normalization) as usize];
        StreamCdc {
            buffer: Vec::with_capacity(opts.max_size as usize),
            capacity: opts.max_size as usize,
            length: 0,
            source,
            processed: 0,
            eof: false,
            min_size: opts.min_size as usize,
            avg_size: opts.avg_size as usize,
            max_size: opts.max_size as usize,
            mask_s,
            mask_l,
            mask_s_ls: mask_s << 1,
            mask_l_ls: mask_l << 1,
        }
    }

    /// Top the buffer back up to capacity, growing it from empty as needed.
    fn fill_buffer(&mut self) -> Result<usize, ChunkingError> {
        if self.eof {
            return Ok(0);
        }
        if self.buffer.len() < self.capacity {
            self.buffer.resize(self.capacity, 0);
        }
        let mut all_bytes_read = 0;
        while !self.eof && self.length < self.capacity {
            let bytes_read = self
                .source
                .read(&mut self.buffer[self.length..])
                .map_err(ChunkingError::Io)?;
            if bytes_read == 0 {
                self.eof = true;
            } else {
                self.length += bytes_read;
                all_bytes_read += bytes_read;
            }
        }
        Ok(all_bytes_read)
    }

    fn drain_bytes(&mut self, count: usize) -> Vec<u8> {
        let data = self.buffer.drain(..count).collect::<Vec<u8>>();
        self.length -= count;
        self.buffer.resize(self.capacity, 0);
        data
    }

    /// Produce the next chunk, or `Ok(None)` once the source is exhausted. The
    /// chunker is single-use: once this returns `Err`, behavior on further
    /// calls is unspecified and the instance should be discarded.
    pub fn next_chunk(&mut self) -> Result<Option<ChunkData>, ChunkingError> {
        self.fill_buffer()?;
        if self.length == 0 {
            return Ok(None);
        }
        let (hash, count) = cut(
            &self.buffer[..self.length],
            self.min_size,
            self.avg_size,
            self.max_size,
            self.mask_s,
            self.mask_l,
            self.mask_s_ls,
            self.mask_l_ls,
            &GEAR,
            &GEAR_LS,
        );
        if count == 0 {
            return Ok(None);
        }
        let offset = self.processed;
        self.processed += count as u64;
        let data = self.drain_bytes(count);
        Ok(Some(ChunkData {
            hash,
            offset,
            length: count,
            data,
        }))
    }
}

impl<R: Read> Iterator for StreamCdc<R> {
    type Item = Result<ChunkData, ChunkingError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
