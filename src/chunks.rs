//! Splitting blobs into numbered chunks for size-limited transports.
//!
//! Each chunk is a slice of the blob followed by two metadata bytes: the
//! chunk's index and the index of the last chunk. A blob is split into at
//! most 256 chunks.

use crate::error::ChunkError;
use std::collections::BTreeMap;
use tracing::debug;

const MAX_CHUNKS: usize = 256;

/// Splits `blob` into chunks carrying at most `max_payload` bytes of data.
/// An empty blob yields a single chunk with an empty payload.
pub fn split(blob: &[u8], max_payload: usize) -> Result<Vec<Vec<u8>>, ChunkError> {
    if max_payload == 0 {
        return Err(ChunkError::ZeroCapacity);
    }
    let count = blob.len().div_ceil(max_payload).max(1);
    if count > MAX_CHUNKS {
        return Err(ChunkError::TooManyChunks(count));
    }
    let last = (count - 1) as u8;
    if blob.is_empty() {
        return Ok(vec![vec![0, last]]);
    }
    Ok(blob
        .chunks(max_payload)
        .enumerate()
        .map(|(index, payload)| {
            let mut chunk = Vec::with_capacity(payload.len() + 2);
            chunk.extend_from_slice(payload);
            chunk.extend_from_slice(&[index as u8, last]);
            chunk
        })
        .collect())
}

/// Reassembles a complete set of chunks given in any order. Identical
/// duplicates are tolerated.
pub fn reassemble<C: AsRef<[u8]>>(chunks: &[C]) -> Result<Vec<u8>, ChunkError> {
    let mut assembler = Assembler::new();
    for chunk in chunks {
        assembler.add_chunk(chunk.as_ref())?;
    }
    assembler.assemble()
}

fn metadata(chunk: &[u8]) -> Result<(u8, u8), ChunkError> {
    match chunk {
        [.., index, last] => Ok((*index, *last)),
        _ => Err(ChunkError::Malformed(chunk.len())),
    }
}

/// Collects chunks as they arrive.
#[derive(Clone, Debug, Default)]
pub struct Assembler {
    last: Option<u8>,
    chunks: BTreeMap<u8, Vec<u8>>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a chunk. Re-adding a chunk already held is a no-op; chunks of a
    /// differently sized set or conflicting with a held chunk are rejected.
    pub fn add_chunk(&mut self, chunk: &[u8]) -> Result<(), ChunkError> {
        let (index, last) = metadata(chunk)?;
        if let Some(expected) = self.last {
            if expected != last {
                return Err(ChunkError::DifferentSet {
                    expected: usize::from(expected) + 1,
                    found: usize::from(last) + 1,
                });
            }
        }
        if index > last {
            return Err(ChunkError::IndexOutOfRange { index, last });
        }
        if let Some(held) = self.chunks.get(&index) {
            if held.as_slice() == chunk {
                debug!(index, "duplicate chunk");
                return Ok(());
            }
            return Err(ChunkError::Conflict(index));
        }
        self.last = Some(last);
        self.chunks.insert(index, chunk.to_vec());
        Ok(())
    }

    /// `(chunks held, chunks in the set)`, or `(0, 0)` before the first chunk.
    pub fn status(&self) -> (usize, usize) {
        match self.last {
            Some(last) => (self.chunks.len(), usize::from(last) + 1),
            None => (0, 0),
        }
    }

    pub fn is_assembled(&self) -> bool {
        let (received, expected) = self.status();
        expected > 0 && received == expected
    }

    pub fn assemble(&self) -> Result<Vec<u8>, ChunkError> {
        let (received, expected) = self.status();
        if expected == 0 {
            return Err(ChunkError::Empty);
        }
        if received != expected {
            return Err(ChunkError::Incomplete { received, expected });
        }
        Ok(self
            .chunks
            .values()
            .flat_map(|chunk| &chunk[..chunk.len() - 2])
            .copied()
            .collect())
    }
}
