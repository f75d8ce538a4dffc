//! Bounded chunk buffer
//!
//! Holds the most recent raw chunks received for a stream. When full, the
//! oldest chunk is evicted to make room for the newest, so memory per stream
//! stays bounded no matter how long a feed runs.

use std::collections::VecDeque;

use bytes::Bytes;

/// Fixed-capacity FIFO of raw chunks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkBuffer {
    /// Maximum number of chunks
    capacity: usize,
    /// Total bytes currently held
    size: usize,
    /// Chunks in arrival order, oldest first
    chunks: VecDeque<Bytes>,
}

impl ChunkBuffer {
    /// Create an empty buffer holding at most `capacity` chunks
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            size: 0,
            chunks: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a chunk, evicting from the front while over capacity
    ///
    /// Returns the number of chunks evicted.
    pub fn push(&mut self, chunk: Bytes) -> usize {
        self.size += chunk.len();
        self.chunks.push_back(chunk);

        let mut evicted = 0;
        while self.chunks.len() > self.capacity {
            if let Some(old) = self.chunks.pop_front() {
                self.size -= old.len();
                evicted += 1;
            }
        }
        evicted
    }

    /// Number of chunks held
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether no chunk has been received (or all were cleared)
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Maximum number of chunks
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total bytes held
    pub fn size(&self) -> usize {
        self.size
    }

    /// Most recently received chunk
    pub fn latest(&self) -> Option<&Bytes> {
        self.chunks.back()
    }

    /// Iterate chunks oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Bytes> {
        self.chunks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(n: u8) -> Bytes {
        Bytes::from(vec![n; n as usize + 1])
    }

    #[test]
    fn test_push_under_capacity() {
        let mut buffer = ChunkBuffer::with_capacity(3);
        assert!(buffer.is_empty());

        assert_eq!(buffer.push(chunk(0)), 0);
        assert_eq!(buffer.push(chunk(1)), 0);

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.size(), 3);
        assert_eq!(buffer.latest(), Some(&chunk(1)));
    }

    #[test]
    fn test_evicts_oldest() {
        let mut buffer = ChunkBuffer::with_capacity(10);

        for n in 0..25u8 {
            buffer.push(chunk(n));
            assert!(buffer.len() <= 10);
        }

        let held: Vec<u8> = buffer.iter().map(|c| c[0]).collect();
        assert_eq!(held, (15..25).collect::<Vec<u8>>());
        let expected_size: usize = (15..25usize).map(|n| n + 1).sum();
        assert_eq!(buffer.size(), expected_size);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut buffer = ChunkBuffer::with_capacity(0);
        assert_eq!(buffer.capacity(), 1);

        buffer.push(chunk(1));
        assert_eq!(buffer.push(chunk(2)), 1);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.latest(), Some(&chunk(2)));
    }
}
