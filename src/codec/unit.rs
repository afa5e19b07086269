use crate::error::{Result, TsError};
use log::debug;

/// Largest unit handed to the decoder in one buffer
pub const MAX_UNIT_BLOCK_SIZE: usize = 8 * 1024;
/// Number of blocks in a [`UnitRing`]; one slot always stays free for writing
pub const MAX_UNIT_BLOCKS: usize = 32;

/// One decoder access unit. Storage is allocated once and reused.
#[derive(Debug, Clone)]
pub struct UnitBlock {
    data: Box<[u8]>,
    length: usize,
    write_position: usize,
    timestamp_us: Option<i64>,
}

impl UnitBlock {
    fn new() -> Self {
        Self {
            data: vec![0; MAX_UNIT_BLOCK_SIZE].into_boxed_slice(),
            length: 0,
            write_position: 0,
            timestamp_us: None,
        }
    }

    fn clear(&mut self) {
        self.length = 0;
        self.write_position = 0;
        self.timestamp_us = None;
    }

    /// Unit bytes written so far
    pub fn data(&self) -> &[u8] {
        &self.data[..self.write_position]
    }

    /// Expected length of the unit
    pub fn len(&self) -> usize {
        self.length
    }

    /// True when nothing was written
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// True once every expected byte was written
    pub fn is_complete(&self) -> bool {
        self.length > 0 && self.write_position == self.length
    }

    /// Own timestamp of a syncframe, `None` for pass-through units
    pub fn timestamp_us(&self) -> Option<i64> {
        self.timestamp_us
    }
}

/// Fixed ring of [`UnitBlock`]s between a splitter and the consumer pulling units.
///
/// Blocks in `[read, write)` are complete and waiting to be consumed; the block
/// at `write` is the one being filled, possibly across several PES.
#[derive(Debug, Clone)]
pub struct UnitRing {
    blocks: Vec<UnitBlock>,
    read: usize,
    write: usize,
    pes_timestamp_us: i64,
}

impl Default for UnitRing {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitRing {
    /// Allocates every block up front
    pub fn new() -> Self {
        Self {
            blocks: (0..MAX_UNIT_BLOCKS).map(|_| UnitBlock::new()).collect(),
            read: 0,
            write: 0,
            pes_timestamp_us: 0,
        }
    }

    /// Timestamp of the PES being split, used for units without their own
    pub fn pes_timestamp_us(&self) -> i64 {
        self.pes_timestamp_us
    }

    /// Stores the timestamp of the PES being split
    pub fn set_pes_timestamp_us(&mut self, timestamp_us: i64) {
        self.pes_timestamp_us = timestamp_us;
    }

    /// True if a complete unit waits to be read
    pub fn has_unit(&self) -> bool {
        self.read != self.write
    }

    /// Number of complete units waiting to be read
    pub fn pending(&self) -> usize {
        (self.write + MAX_UNIT_BLOCKS - self.read) % MAX_UNIT_BLOCKS
    }

    /// Unit at the read position
    pub fn current(&self) -> Option<&UnitBlock> {
        self.has_unit().then(|| &self.blocks[self.read])
    }

    /// Releases the current unit, returns true if another one is available
    pub fn advance(&mut self) -> bool {
        if !self.has_unit() {
            return false;
        }
        self.read = (self.read + 1) % MAX_UNIT_BLOCKS;
        self.has_unit()
    }

    /// True if the write block started a unit that is not complete yet
    pub fn has_partial_unit(&self) -> bool {
        let block = &self.blocks[self.write];
        block.length > 0 && block.write_position < block.length
    }

    /// Starts a unit of `size` bytes in the write block
    pub fn start_unit(&mut self, size: usize, timestamp_us: Option<i64>) -> Result<()> {
        if size == 0 || size > MAX_UNIT_BLOCK_SIZE {
            return Err(TsError::UnsupportedFeature(format!(
                "unit size {} out of range (max {})",
                size, MAX_UNIT_BLOCK_SIZE
            )));
        }
        let block = &mut self.blocks[self.write];
        block.clear();
        block.length = size;
        block.timestamp_us = timestamp_us;
        Ok(())
    }

    /// Copies bytes into the unit being filled and commits it once complete.
    ///
    /// Returns the number of bytes taken from `bytes`.
    pub fn fill(&mut self, bytes: &[u8]) -> Result<usize> {
        let block = &mut self.blocks[self.write];
        if block.length == 0 || block.write_position >= block.length {
            return Ok(0);
        }
        let to_copy = bytes.len().min(block.length - block.write_position);
        block.data[block.write_position..block.write_position + to_copy]
            .copy_from_slice(&bytes[..to_copy]);
        block.write_position += to_copy;
        if block.write_position == block.length {
            self.commit()?;
        }
        Ok(to_copy)
    }

    /// Stores `bytes` as complete units, split in blocks of at most
    /// [`MAX_UNIT_BLOCK_SIZE`] bytes sharing `timestamp_us`
    pub fn push_unit(&mut self, bytes: &[u8], timestamp_us: Option<i64>) -> Result<()> {
        for chunk in bytes.chunks(MAX_UNIT_BLOCK_SIZE) {
            self.start_unit(chunk.len(), timestamp_us)?;
            self.fill(chunk)?;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let next = (self.write + 1) % MAX_UNIT_BLOCKS;
        if next == self.read {
            return Err(TsError::UnsupportedFeature(format!(
                "too many units: write:{} read:{}",
                self.write, self.read
            )));
        }
        self.write = next;
        self.blocks[self.write].clear();
        Ok(())
    }

    /// Drops unread units and the unit being filled
    pub fn discard(&mut self) {
        if self.has_unit() || self.has_partial_unit() {
            debug!("discarding {} units", self.pending());
        }
        self.read = self.write;
        self.blocks[self.write].clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unit_spanning_two_fills() {
        let mut ring = UnitRing::new();
        ring.start_unit(6, Some(42)).unwrap();
        assert_eq!(ring.fill(&[1, 2, 3, 4]).unwrap(), 4);
        assert!(ring.has_partial_unit());
        assert!(!ring.has_unit());
        assert_eq!(ring.fill(&[5, 6, 7]).unwrap(), 2);
        assert!(ring.has_unit());

        let unit = ring.current().unwrap();
        assert_eq!(unit.data(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(unit.timestamp_us(), Some(42));
        assert!(!ring.advance());
        assert!(ring.current().is_none());
    }

    #[test]
    fn test_too_many_units() {
        let mut ring = UnitRing::new();
        for i in 0..MAX_UNIT_BLOCKS - 1 {
            ring.push_unit(&[i as u8], None).unwrap();
        }
        assert_eq!(ring.pending(), MAX_UNIT_BLOCKS - 1);
        assert!(matches!(
            ring.push_unit(&[0xFF], None),
            Err(TsError::UnsupportedFeature(_))
        ));

        ring.discard();
        assert_eq!(ring.pending(), 0);
        ring.push_unit(&[0xFF], None).unwrap();
        assert_eq!(ring.current().unwrap().data(), &[0xFF]);
    }

    #[test]
    fn test_large_unit_is_split() {
        let mut ring = UnitRing::new();
        let payload = vec![0xAB; MAX_UNIT_BLOCK_SIZE * 2 + 10];
        ring.push_unit(&payload, Some(7)).unwrap();
        assert_eq!(ring.pending(), 3);
        assert_eq!(ring.current().unwrap().len(), MAX_UNIT_BLOCK_SIZE);
        ring.advance();
        ring.advance();
        assert_eq!(ring.current().unwrap().data().len(), 10);
    }

    #[test]
    fn test_unit_size_limits() {
        let mut ring = UnitRing::new();
        assert!(ring.start_unit(0, None).is_err());
        assert!(ring.start_unit(MAX_UNIT_BLOCK_SIZE + 1, None).is_err());
        assert_eq!(ring.fill(&[1, 2]).unwrap(), 0);
    }
}
