//! Fixed-capacity download arena for feed resources.
//!
//! One buffer is allocated at startup and reused for every fetch in every
//! poll cycle. It is reset (`clear`), never resized; anything that would
//! grow it past its capacity is rejected by the caller instead.

use alloc::boxed::Box;
use alloc::vec;

/// Capacity of the shared image download buffer in bytes.
///
/// The feed images are small indexed GIFs, typically well under 16 KiB.
pub const IMAGE_BUFFER_CAPACITY: usize = 20_000;

/// A write past the buffer's fixed capacity was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityError;

/// Fixed-capacity byte buffer with an explicit valid-length field.
pub struct ResourceBuffer {
    data: Box<[u8]>,
    len: usize,
}

impl ResourceBuffer {
    /// Allocate a buffer with the default feed image capacity.
    pub fn new() -> Self {
        Self::with_capacity(IMAGE_BUFFER_CAPACITY)
    }

    /// Allocate a buffer with an explicit capacity (tests use small ones).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Invalidate the current contents. The allocation is kept.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// The valid bytes received so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Unwritten tail of the buffer, for direct read-into I/O.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.len..]
    }

    /// Mark `n` bytes of the spare region as valid after a direct read.
    pub fn commit(&mut self, n: usize) -> Result<(), CapacityError> {
        if self.len + n > self.data.len() {
            return Err(CapacityError);
        }
        self.len += n;
        Ok(())
    }

    /// Append a chunk, failing without any partial write if it would
    /// overflow the fixed capacity.
    pub fn extend_from_slice(&mut self, chunk: &[u8]) -> Result<(), CapacityError> {
        if self.len + chunk.len() > self.data.len() {
            return Err(CapacityError);
        }
        self.data[self.len..self.len + chunk.len()].copy_from_slice(chunk);
        self.len += chunk.len();
        Ok(())
    }
}

impl Default for ResourceBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend_within_capacity() {
        let mut buf = ResourceBuffer::with_capacity(8);
        buf.extend_from_slice(&[1, 2, 3]).unwrap();
        buf.extend_from_slice(&[4, 5]).unwrap();
        assert_eq!(buf.as_slice(), &[1, 2, 3, 4, 5]);
        assert_eq!(buf.capacity(), 8);
    }

    #[test]
    fn test_overflowing_chunk_is_rejected_whole() {
        let mut buf = ResourceBuffer::with_capacity(4);
        buf.extend_from_slice(&[1, 2, 3]).unwrap();
        assert_eq!(buf.extend_from_slice(&[4, 5]), Err(CapacityError));
        // The failed chunk must not be partially visible.
        assert_eq!(buf.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn test_clear_resets_length_not_capacity() {
        let mut buf = ResourceBuffer::with_capacity(4);
        buf.extend_from_slice(&[9; 4]).unwrap();
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 4);
        buf.extend_from_slice(&[1; 4]).unwrap();
    }

    #[test]
    fn test_commit_tracks_spare_reads() {
        let mut buf = ResourceBuffer::with_capacity(6);
        buf.spare_mut()[..3].copy_from_slice(&[7, 8, 9]);
        buf.commit(3).unwrap();
        assert_eq!(buf.as_slice(), &[7, 8, 9]);
        assert_eq!(buf.spare_mut().len(), 3);
        assert_eq!(buf.commit(4), Err(CapacityError));
    }
}
