use crate::error::{Result, TsError};

/// Growth step added on top of doubling when the arena needs more room.
pub const GROWTH_INCREMENT: usize = 32 * 1024;

/// Owned, growable byte arena with a read cursor.
///
/// Bytes are appended at `len()`; `position()` is a read cursor into the
/// filled region. Capacity grows by doubling plus [`GROWTH_INCREMENT`] but
/// never beyond `max_capacity`: an append that would cross it fails with
/// [`TsError::UnsupportedFeature`] and leaves the arena untouched.
#[derive(Debug)]
pub struct ByteArena {
    data: Vec<u8>,
    len: usize,
    position: usize,
    max_capacity: usize,
}

impl ByteArena {
    /// Creates an arena with an initial and a maximum capacity
    pub fn new(initial_capacity: usize, max_capacity: usize) -> Self {
        let initial_capacity = initial_capacity.min(max_capacity);
        Self {
            data: vec![0; initial_capacity],
            len: 0,
            position: 0,
            max_capacity,
        }
    }

    /// Appends bytes, growing the arena when needed
    pub fn push(&mut self, bytes: &[u8]) -> Result<()> {
        let needed = self.len + bytes.len();
        self.ensure_capacity(needed)?;
        self.data[self.len..needed].copy_from_slice(bytes);
        self.len = needed;
        Ok(())
    }

    fn ensure_capacity(&mut self, needed: usize) -> Result<()> {
        if needed <= self.data.len() {
            return Ok(());
        }
        if needed > self.max_capacity {
            return Err(TsError::UnsupportedFeature(format!(
                "unit of {} bytes exceeds arena cap of {} bytes",
                needed, self.max_capacity
            )));
        }
        let grown = (self.data.len() * 2 + GROWTH_INCREMENT)
            .max(needed)
            .min(self.max_capacity);
        self.data.resize(grown, 0);
        log::debug!("resize byte arena (new size:{})", grown);
        Ok(())
    }

    /// Drops the content, keeps the allocation
    pub fn clear(&mut self) {
        self.len = 0;
        self.position = 0;
    }

    /// Filled bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Filled bytes from the read cursor on
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.position..self.len]
    }

    /// Number of filled bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when nothing has been pushed since the last clear
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read cursor
    pub fn position(&self) -> usize {
        self.position
    }

    /// Moves the read cursor, clamped to the filled region
    pub fn set_position(&mut self, position: usize) {
        self.position = position.min(self.len);
    }

    /// Currently allocated bytes
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Largest size the arena may reach
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }
}
