//! Chunk identity: a fixed SHA-1 digest over a chunk's bytes, used as both the
//! content address in the blob store and the primary key in the refcount
//! index. There is no per-chunk algorithm negotiation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Content address of a chunk: `SHA1(chunk bytes)`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ChunkId([u8; 20]);

impl ChunkId {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        ChunkId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Compute the content address of a chunk.
pub fn checksum(data: &[u8]) -> ChunkId {
    let mut hasher = Sha1::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest);
    ChunkId(bytes)
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkId({})", self.to_hex())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid chunk id: {0}")]
pub struct ParseChunkIdError(String);

impl FromStr for ChunkId {
    type Err = ParseChunkIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 40 {
            return Err(ParseChunkIdError(s.to_string()));
        }
        let mut bytes = [0u8; 20];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let hi = s.as_bytes()[i * 2];
            let lo = s.as_bytes()[i * 2 + 1];
            let hex = |c: u8| -> Result<u8, ParseChunkIdError> {
                match c {
                    b'0'..=b'9' => Ok(c - b'0'),
                    b'a'..=b'f' => Ok(c - b'a' + 10),
                    b'A'..=b'F' => Ok(c - b'A' + 10),
                    _ => Err(ParseChunkIdError(s.to_string())),
                }
            };
            *byte = (hex(hi)? << 4) | hex(lo)?;
        }
        Ok(ChunkId(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_hex() {
        let id = checksum(b"hello world");
        let hex = id.to_hex();
        let parsed: ChunkId = hex.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn same_bytes_same_id() {
        assert_eq!(checksum(b"abc"), checksum(b"abc"));
        assert_ne!(checksum(b"abc"), checksum(b"abd"));
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!("not-hex".parse::<ChunkId>().is_err());
        assert!("abcd".parse::<ChunkId>().is_err());
    }
}
