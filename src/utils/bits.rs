use crate::error::{Result, TsError};

/// A bit-level cursor over a borrowed byte slice.
///
/// Used by every header decoder in the crate (PES optional header, AC-3 and
/// E-AC-3 syncframe headers). The reader never owns the buffer; it only keeps
/// a bit position that can be moved forward with reads and skips, or moved
/// anywhere with the absolute seeks.
///
/// Example:
/// ```
/// use tsio::utils::BitReader;
///
/// let data = [0b10110011];
/// let mut reader = BitReader::new(&data);
///
/// assert_eq!(reader.read_bit().unwrap(), true);   // 1
/// assert_eq!(reader.read_bits(3).unwrap(), 0b011); // 011
/// assert_eq!(reader.bit_position(), 4);
/// ```
pub struct BitReader<'a> {
    data: &'a [u8],
    byte_offset: usize,
    bit_offset: u8,
}

impl<'a> BitReader<'a> {
    /// Creates a new BitReader from a byte slice
    pub fn new(data: &'a [u8]) -> Self {
        BitReader {
            data,
            byte_offset: 0,
            bit_offset: 0,
        }
    }

    /// Reads a single bit from the stream.
    /// Returns true for 1, false for 0.
    ///
    /// Returns error if end of data is reached.
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.byte_offset >= self.data.len() {
            return Err(TsError::Parser("Reached end of data".into()));
        }

        let bit = (self.data[self.byte_offset] >> (7 - self.bit_offset)) & 1;
        self.bit_offset += 1;

        if self.bit_offset == 8 {
            self.bit_offset = 0;
            self.byte_offset += 1;
        }

        Ok(bit == 1)
    }

    /// Reads a one-bit flag.
    pub fn read_bool(&mut self) -> Result<bool> {
        self.read_bit()
    }

    /// Reads n bits and returns them as a number.
    /// The bits are interpreted as big-endian.
    ///
    /// Returns error if n > 32 or end of data is reached. On error the
    /// position is left untouched.
    pub fn read_bits(&mut self, n: u32) -> Result<u32> {
        if n > 32 {
            return Err(TsError::Parser("Too many bits requested".into()));
        }
        if (n as usize) > self.available_bits() {
            return Err(TsError::Parser(format!(
                "Reached end of data: {} bits requested, {} available",
                n,
                self.available_bits()
            )));
        }

        let mut value = 0u32;
        let n = n as usize;

        for i in 0..n {
            let bit = self.read_bit()?;
            if bit {
                value |= 1 << (n - 1 - i);
            }
        }

        Ok(value)
    }

    /// Skips n bits in the stream.
    pub fn skip_bits(&mut self, n: u32) -> Result<()> {
        let target = self.bit_position() + n as usize;
        if target > self.data.len() * 8 {
            return Err(TsError::Parser("Skip past end of data".into()));
        }
        self.seek_to_bit(target)
    }

    /// Aligns reader to next byte boundary by skipping remaining bits in current byte.
    pub fn align_byte(&mut self) -> Result<()> {
        if self.bit_offset != 0 {
            self.bit_offset = 0;
            self.byte_offset += 1;
        }
        Ok(())
    }

    /// Moves the cursor to an absolute bit position.
    ///
    /// Seeking exactly to the end of the data is allowed.
    pub fn seek_to_bit(&mut self, position: usize) -> Result<()> {
        if position > self.data.len() * 8 {
            return Err(TsError::Parser(format!(
                "Seek to bit {} past end of {} bytes",
                position,
                self.data.len()
            )));
        }
        self.byte_offset = position / 8;
        self.bit_offset = (position % 8) as u8;
        Ok(())
    }

    /// Moves the cursor to the start of an absolute byte position.
    pub fn seek_to_byte(&mut self, position: usize) -> Result<()> {
        self.seek_to_bit(position * 8)
    }

    /// Current position in bits from the start of the slice
    pub fn bit_position(&self) -> usize {
        self.byte_offset * 8 + self.bit_offset as usize
    }

    /// Index of the byte holding the next bit to read
    pub fn byte_position(&self) -> usize {
        self.byte_offset
    }

    /// True when the cursor sits on a byte boundary
    pub fn is_byte_aligned(&self) -> bool {
        self.bit_offset == 0
    }

    /// Length of the underlying slice in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the underlying slice is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns number of bits available to read.
    pub fn available_bits(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.bit_position())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_read_bits() {
        // Simple pattern within a byte
        let data = [0b10110011];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(3).unwrap(), 0b101);
        assert_eq!(reader.read_bits(5).unwrap(), 0b10011);

        // Cross-byte boundary
        let data = [0b10110011, 0b01011010];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(3).unwrap(), 0b101);
        assert_eq!(reader.read_bits(8).unwrap(), 0b10011010);

        // Reading zero bits
        let data = [0b10101010];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(0).unwrap(), 0);

        // Error on too many bits
        let data = [0xFF; 8];
        let mut reader = BitReader::new(&data);
        assert!(reader.read_bits(33).is_err());

        // Cross multiple byte boundaries
        let data = [0b10110011, 0b11001100, 0b10101010];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(20).unwrap(), 0b10110011110011001010);
    }

    #[test]
    fn test_positions_and_seeks() {
        let data = [0x0B, 0x77, 0x12, 0x34];
        let mut reader = BitReader::new(&data);
        reader.skip_bits(12).unwrap();
        assert_eq!(reader.bit_position(), 12);
        assert_eq!(reader.byte_position(), 1);
        assert!(!reader.is_byte_aligned());

        reader.seek_to_byte(2).unwrap();
        assert_eq!(reader.read_bits(8).unwrap(), 0x12);

        reader.seek_to_bit(0).unwrap();
        assert_eq!(reader.read_bits(16).unwrap(), 0x0B77);

        reader.seek_to_bit(32).unwrap();
        assert_eq!(reader.available_bits(), 0);
        assert!(reader.seek_to_bit(33).is_err());
    }

    #[test]
    fn test_error_cases() {
        // Reading past end of data
        let data = [0xFF];
        let mut reader = BitReader::new(&data);
        reader.read_bits(8).unwrap();
        assert!(reader.read_bit().is_err());

        // A failed read does not move the cursor
        let data = [0b10110011];
        let mut reader = BitReader::new(&data);
        reader.read_bits(6).unwrap();
        assert!(reader.read_bits(8).is_err());
        assert_eq!(reader.bit_position(), 6);
        assert!(reader.skip_bits(3).is_err());

        // Byte alignment
        let data = [0xFF, 0x00];
        let mut reader = BitReader::new(&data);
        reader.read_bits(3).unwrap();
        assert_eq!(reader.bit_offset, 3);
        reader.align_byte().unwrap();
        assert_eq!(reader.bit_offset, 0);
        assert_eq!(reader.byte_offset, 1);
    }

    #[quickcheck]
    fn prop_read_bits_matches_manual(data: Vec<u8>, n: u8) -> bool {
        if data.is_empty() {
            return true;
        }

        let mut reader = BitReader::new(&data);
        let n = n % 33;

        match reader.read_bits(n as u32) {
            Ok(result) => {
                let mut expected = 0u64;
                for i in 0..n as usize {
                    let byte_idx = i / 8;
                    let bit_idx = 7 - (i % 8);
                    let bit = (data[byte_idx] >> bit_idx) & 1;
                    expected |= (bit as u64) << (n as usize - 1 - i);
                }
                result as u64 == expected
            }
            Err(_) => (n as usize) > data.len() * 8,
        }
    }

    #[quickcheck]
    fn prop_seek_then_read_matches_skip(data: Vec<u8>, skip: u16) -> bool {
        if data.is_empty() {
            return true;
        }
        let skip = skip as usize % (data.len() * 8);
        let mut seeking = BitReader::new(&data);
        let mut skipping = BitReader::new(&data);
        seeking.seek_to_bit(skip).unwrap();
        skipping.skip_bits(skip as u32).unwrap();
        seeking.read_bit().ok() == skipping.read_bit().ok()
    }
}
