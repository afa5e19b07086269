use super::types::*;

/// Read-only view over one 188-byte transport stream packet.
///
/// Fields are decoded on demand from fixed bit offsets
/// (ISO/IEC 13818-1, section 2.4.3.2, table 2-2). The view never copies the
/// underlying bytes. Offsets returned by the `*_offset` accessors are relative
/// to the first byte of the packet.
///
/// ```
/// use tsio::format::ts::PacketView;
///
/// let mut bytes = [0xFFu8; 188];
/// bytes[..4].copy_from_slice(&[0x47, 0x41, 0x00, 0x13]);
/// let packet = PacketView::wrap(&bytes, 0).unwrap();
/// assert!(packet.is_valid());
/// assert_eq!(packet.pid(), 0x100);
/// assert_eq!(packet.continuity_counter(), 3);
/// assert_eq!(packet.pes_payload_offset(), Some(4));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PacketView<'a> {
    bytes: &'a [u8],
}

impl<'a> PacketView<'a> {
    /// Wraps the packet starting at `offset` in `buffer`.
    ///
    /// Returns `None` if fewer than 188 bytes are available from `offset`.
    pub fn wrap(buffer: &'a [u8], offset: usize) -> Option<Self> {
        let end = offset.checked_add(TS_PACKET_SIZE)?;
        buffer.get(offset..end).map(|bytes| Self { bytes })
    }

    /// The 188 bytes of the packet
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// True if the sync byte is present and the transport error bit is clear
    pub fn is_valid(&self) -> bool {
        self.bytes[0] == TS_SYNC_BYTE && (self.bytes[1] & 0x80) == 0
    }

    /// 13-bit packet identifier
    pub fn pid(&self) -> u16 {
        (((self.bytes[1] & 0x1F) as u16) << 8) | self.bytes[2] as u16
    }

    /// payload_unit_start_indicator
    pub fn is_unit_start(&self) -> bool {
        (self.bytes[1] & 0x40) != 0
    }

    /// transport_scrambling_control, 0 when clear
    pub fn scrambling_control(&self) -> u8 {
        (self.bytes[3] & 0xC0) >> 6
    }

    /// adaptation_field_control has the adaptation bit
    pub fn has_adaptation(&self) -> bool {
        (self.bytes[3] & 0x20) != 0
    }

    /// adaptation_field_control has the payload bit
    pub fn has_payload(&self) -> bool {
        (self.bytes[3] & 0x10) != 0
    }

    /// 4-bit continuity_counter
    pub fn continuity_counter(&self) -> u8 {
        self.bytes[3] & 0x0F
    }

    /// Adaptation field length byte, 0 when there is no adaptation field
    pub fn adaptation_length(&self) -> usize {
        if !self.has_adaptation() {
            return 0;
        }
        self.bytes[4] as usize
    }

    /// Random access indicator of the adaptation field
    pub fn has_random_access_indicator(&self) -> bool {
        self.adaptation_length() > 0 && (self.bytes[5] & 0x40) != 0
    }

    /// Discontinuity indicator of the adaptation field
    pub fn has_discontinuity_indicator(&self) -> bool {
        self.adaptation_length() > 0 && (self.bytes[5] & 0x80) != 0
    }

    /// PCR_flag of a long enough adaptation field
    pub fn has_pcr(&self) -> bool {
        // the flags byte plus the 6 pcr bytes must fit in the adaptation field
        self.adaptation_length() >= 7 && (self.bytes[5] & 0x10) != 0
    }

    /// 33-bit pcr base, in 90 kHz ticks
    pub fn pcr(&self) -> Option<i64> {
        if !self.has_pcr() {
            return None;
        }
        let b = &self.bytes[6..12];
        Some(
            ((b[0] as i64) << 25)
                | ((b[1] as i64) << 17)
                | ((b[2] as i64) << 9)
                | ((b[3] as i64) << 1)
                | ((b[4] as i64) >> 7),
        )
    }

    /// 9-bit pcr extension, in 27 MHz ticks
    pub fn pcr_extension(&self) -> Option<u16> {
        if !self.has_pcr() {
            return None;
        }
        Some((((self.bytes[10] & 0x01) as u16) << 8) | self.bytes[11] as u16)
    }

    /// Full pcr in 27 MHz ticks (base * 300 + extension)
    pub fn pcr_27mhz(&self) -> Option<i64> {
        Some(self.pcr()? * 300 + self.pcr_extension()? as i64)
    }

    /// Offset of the payload start, see ISO/IEC 13818-1 section 2.4.3.3.
    ///
    /// `None` when the packet carries no payload or when the adaptation field
    /// length runs past the end of the packet.
    pub fn pes_payload_offset(&self) -> Option<usize> {
        if !self.has_payload() {
            return None;
        }
        let offset = if self.has_adaptation() {
            TS_HEADER_SIZE + 1 + self.adaptation_length()
        } else {
            TS_HEADER_SIZE
        };
        (offset < TS_PACKET_SIZE).then_some(offset)
    }

    /// Offset of the PSI payload, before the pointer field
    pub fn psi_payload_offset(&self) -> Option<usize> {
        self.pes_payload_offset()
    }

    /// Offset of the first section in a packet starting a PSI unit, past the pointer field
    pub fn psi_start_payload_offset(&self) -> Option<usize> {
        if !self.is_unit_start() {
            return None;
        }
        let pos = self.pes_payload_offset()?;
        let offset = pos + self.bytes[pos] as usize + 1;
        (offset < TS_PACKET_SIZE).then_some(offset)
    }

    /// Payload bytes, empty if the packet has none
    pub fn payload(&self) -> &'a [u8] {
        match self.pes_payload_offset() {
            Some(offset) => &self.bytes[offset..],
            None => &[],
        }
    }

    /// Copies the payload from `payload_offset` into `dest`, returns the copied length
    pub fn fill_with_payload(&self, dest: &mut [u8], payload_offset: usize) -> usize {
        if payload_offset >= TS_PACKET_SIZE {
            return 0;
        }
        let size = (TS_PACKET_SIZE - payload_offset).min(dest.len());
        dest[..size].copy_from_slice(&self.bytes[payload_offset..payload_offset + size]);
        size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ts::test_util::PacketBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_header_fields() {
        let bytes = PacketBuilder::new(0x1FFF)
            .unit_start(true)
            .continuity_counter(0x0A)
            .scrambling(2)
            .payload(&[1, 2, 3])
            .build();
        let packet = PacketView::wrap(&bytes, 0).unwrap();
        assert!(packet.is_valid());
        assert_eq!(packet.pid(), 0x1FFF);
        assert!(packet.is_unit_start());
        assert_eq!(packet.scrambling_control(), 2);
        assert_eq!(packet.continuity_counter(), 0x0A);
        assert!(!packet.has_pcr());
        assert_eq!(packet.pcr(), None);
    }

    #[test]
    fn test_pcr_extraction() {
        let base = 0x1_2345_6789i64;
        let bytes = PacketBuilder::new(0x100)
            .pcr(base, 0x155)
            .random_access(true)
            .build();
        let packet = PacketView::wrap(&bytes, 0).unwrap();
        assert!(packet.has_pcr());
        assert_eq!(packet.pcr(), Some(base));
        assert_eq!(packet.pcr_extension(), Some(0x155));
        assert_eq!(packet.pcr_27mhz(), Some(base * 300 + 0x155));
        assert!(packet.has_random_access_indicator());
        assert_eq!(packet.pes_payload_offset(), None);
    }

    #[test]
    fn test_payload_offset_with_adaptation() {
        let bytes = PacketBuilder::new(0x44)
            .pcr(1000, 0)
            .payload(&[0xAA; 10])
            .build();
        let packet = PacketView::wrap(&bytes, 0).unwrap();
        let offset = packet.pes_payload_offset().unwrap();
        assert_eq!(offset, TS_PACKET_SIZE - 10);
        assert_eq!(packet.payload(), &[0xAA; 10]);

        let mut dest = [0u8; 4];
        assert_eq!(packet.fill_with_payload(&mut dest, offset), 4);
        assert_eq!(dest, [0xAA; 4]);
    }

    #[test]
    fn test_psi_pointer_field() {
        let mut payload = vec![0x02, 0xFF, 0xFF, 0x00];
        payload.resize(TS_PACKET_SIZE - TS_HEADER_SIZE, 0x11);
        let bytes = PacketBuilder::new(0).unit_start(true).payload(&payload).build();
        let packet = PacketView::wrap(&bytes, 0).unwrap();
        assert_eq!(packet.psi_payload_offset(), Some(4));
        assert_eq!(packet.psi_start_payload_offset(), Some(7));
    }

    #[test]
    fn test_malformed_packets() {
        let mut bytes = PacketBuilder::new(0x100).payload(&[0; 4]).build();
        bytes[0] = 0x46;
        assert!(!PacketView::wrap(&bytes, 0).unwrap().is_valid());

        bytes[0] = TS_SYNC_BYTE;
        bytes[1] |= 0x80;
        assert!(!PacketView::wrap(&bytes, 0).unwrap().is_valid());

        // adaptation length pointing past the packet yields no payload
        let mut bytes = PacketBuilder::new(0x100).payload(&[0; 4]).build();
        bytes[3] |= 0x20;
        bytes[4] = 0xFF;
        let packet = PacketView::wrap(&bytes, 0).unwrap();
        assert_eq!(packet.pes_payload_offset(), None);
        assert!(packet.payload().is_empty());

        assert!(PacketView::wrap(&bytes, 1).is_none());
    }
}
