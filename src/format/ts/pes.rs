use super::packet::PacketView;
use super::types::*;
use crate::error::{Result, TsError};
use crate::utils::{BitReader, ByteArena};
use log::{debug, warn};

/// Initial size of the reassembly arena
pub const PES_INITIAL_CAPACITY: usize = 64 * 1024;
/// Largest PES the reassembler accepts before dropping the unit
pub const PES_MAX_CAPACITY: usize = 4 * 1024 * 1024;

/// Packetized Elementary Stream (PES) header, as decoded from the start of a unit.
///
/// Ref: ISO/IEC 13818-1, sections 2.4.3.6 and 2.4.3.7
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PesHeader {
    /// Stream identifier indicating content type (video/audio/etc.)
    pub stream_id: u8,
    /// PES_packet_length field, 0 for unbounded units
    pub packet_length: u16,
    /// Data alignment indicator
    pub data_alignment: bool,
    /// PTS_DTS_flags
    pub pts_dts_flags: u8,
    /// CRC flag
    pub crc_flag: bool,
    /// Extension flag
    pub extension_flag: bool,
    /// Length of the header data following the fixed part
    pub header_data_length: u8,
    /// Offset of the elementary stream payload from the start of the unit
    pub header_length: usize,
    /// Presentation Time Stamp (33 bits)
    pub pts: Option<i64>,
    /// Decoding Time Stamp (33 bits)
    pub dts: Option<i64>,
}

impl PesHeader {
    /// Decodes a header from the first bytes of a PES unit.
    ///
    /// Returns `Ok(None)` while `data` is too short to hold the whole header,
    /// and an error when the start code prefix is not `0x000001`.
    pub fn parse(data: &[u8]) -> Result<Option<PesHeader>> {
        if data.len() < PES_MIN_HEADER_SIZE {
            return Ok(None);
        }

        let mut reader = BitReader::new(data);
        let start_code_prefix = reader.read_bits(24)?;
        if start_code_prefix != 0x000001 {
            return Err(TsError::InvalidData(format!(
                "bad start code prefix {:#x}",
                start_code_prefix
            )));
        }

        let mut header = PesHeader {
            stream_id: reader.read_bits(8)? as u8,
            packet_length: reader.read_bits(16)? as u16,
            ..Default::default()
        };

        if has_no_optional_header(header.stream_id) {
            header.header_length = reader.byte_position();
            return Ok(Some(header));
        }

        if data.len() < PES_MIN_HEADER_WITH_EXTENSION_SIZE {
            return Ok(None);
        }
        let header_data_length = data[8] as usize;
        if data.len() < PES_MIN_HEADER_WITH_EXTENSION_SIZE + header_data_length {
            return Ok(None);
        }

        reader.skip_bits(2)?; // '10'
        reader.skip_bits(2)?; // PES_scrambling_control
        reader.skip_bits(1)?; // PES_priority
        header.data_alignment = reader.read_bool()?;
        reader.skip_bits(1)?; // copyright
        reader.skip_bits(1)?; // original_or_copy
        header.pts_dts_flags = reader.read_bits(2)? as u8;
        reader.skip_bits(1)?; // ESCR_flag
        reader.skip_bits(1)?; // ES_rate_flag
        reader.skip_bits(1)?; // DSM_trick_mode_flag
        reader.skip_bits(1)?; // additional_copy_info_flag
        header.crc_flag = reader.read_bool()?;
        header.extension_flag = reader.read_bool()?;
        header.header_data_length = reader.read_bits(8)? as u8;
        header.header_length = reader.byte_position() + header_data_length;

        if header.pts_dts_flags & 0x02 != 0 {
            header.pts = Some(read_timestamp(&mut reader)?);
        }
        if header.pts_dts_flags & 0x01 != 0 {
            header.dts = Some(read_timestamp(&mut reader)?);
        }

        Ok(Some(header))
    }
}

/// Reads the 5-byte PTS/DTS layout: `[4 | 32..30 | 1 | 29..15 | 1 | 14..0 | 1]`
fn read_timestamp(reader: &mut BitReader) -> Result<i64> {
    reader.skip_bits(4)?;
    let high = reader.read_bits(3)? as i64;
    reader.skip_bits(1)?;
    let middle = reader.read_bits(15)? as i64;
    reader.skip_bits(1)?;
    let low = reader.read_bits(15)? as i64;
    reader.skip_bits(1)?;
    Ok((high << 30) | (middle << 15) | low)
}

/// Reassembly state of a [`PesUnit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PesState {
    /// Waiting for a packet starting a unit
    Idle,
    /// Collecting payloads of consecutive packets
    Accumulating,
    /// The declared length has been reached
    Complete,
}

/// Reassembles the payloads of one PID into a PES unit.
///
/// Not internally synchronized; one instance is fed by a single ingest loop
/// and reused for every unit of its PID.
#[derive(Debug)]
pub struct PesUnit {
    data: ByteArena,
    state: PesState,
    last_continuity_counter: Option<u8>,
    random_access: bool,
    header: Option<PesHeader>,
}

impl Default for PesUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl PesUnit {
    /// Unit with the default capacity and cap
    pub fn new() -> Self {
        Self::with_capacity(PES_INITIAL_CAPACITY, PES_MAX_CAPACITY)
    }

    /// Unit whose storage starts at `initial_capacity` and never exceeds `max_capacity`
    pub fn with_capacity(initial_capacity: usize, max_capacity: usize) -> Self {
        Self {
            data: ByteArena::new(initial_capacity, max_capacity),
            state: PesState::Idle,
            last_continuity_counter: None,
            random_access: false,
            header: None,
        }
    }

    /// Feeds one packet of the PID into the unit and returns the new state.
    ///
    /// A repeated continuity counter is taken as a duplicated packet and
    /// ignored; any other gap drops the partial unit. A packet starting a unit
    /// right after such a drop starts the next unit.
    pub fn consume_packet(&mut self, packet: &PacketView) -> PesState {
        let continuity_counter = packet.continuity_counter();
        let last_continuity_counter = self.last_continuity_counter.replace(continuity_counter);

        match self.state {
            PesState::Accumulating => {
                if last_continuity_counter == Some(continuity_counter) {
                    debug!(
                        "pid {}: duplicated packet (cc:{}), ignored",
                        packet.pid(),
                        continuity_counter
                    );
                } else if !is_next_continuity_counter(last_continuity_counter, continuity_counter)
                {
                    debug!(
                        "pid {}: continuity break {:?} -> {}, drop {} bytes",
                        packet.pid(),
                        last_continuity_counter,
                        continuity_counter,
                        self.data.len()
                    );
                    self.reset();
                    if packet.is_unit_start() {
                        self.start(packet);
                    }
                } else {
                    self.push_pes_payload(packet);
                }
            }
            PesState::Idle => {
                if last_continuity_counter == Some(continuity_counter) {
                    debug!(
                        "pid {}: duplicated packet (cc:{}) after a unit, ignored",
                        packet.pid(),
                        continuity_counter
                    );
                } else if packet.is_unit_start() {
                    self.start(packet);
                }
            }
            PesState::Complete => {
                debug!("pid {}: packet ignored, unit not taken yet", packet.pid());
            }
        }

        self.state
    }

    fn start(&mut self, packet: &PacketView) {
        // ISO/IEC 13818-1 2.4.3.3: the payload commences with the first byte of a PES
        self.state = PesState::Accumulating;
        self.last_continuity_counter = Some(packet.continuity_counter());
        self.push_pes_payload(packet);
    }

    fn push_pes_payload(&mut self, packet: &PacketView) {
        self.random_access |= packet.has_random_access_indicator();
        if let Err(e) = self.data.push(packet.payload()) {
            warn!("pid {}: {}, unit dropped", packet.pid(), e);
            self.reset();
            return;
        }
        if self.is_complete() {
            self.state = PesState::Complete;
        }
    }

    /// Appends bytes that did not come from a packet
    pub fn push_extra_data(&mut self, data: &[u8]) -> Result<()> {
        self.data.push(data)
    }

    /// Closes an unbounded unit, typically when the next unit starts
    pub fn finish(&mut self) {
        if self.state == PesState::Accumulating {
            self.state = PesState::Complete;
        }
    }

    /// Drops the content and the continuity history, returns to
    /// [`PesState::Idle`]. Used on a continuity break or a seek.
    pub fn reset(&mut self) {
        self.release();
        self.last_continuity_counter = None;
    }

    /// Drops the content once the unit was handed over. The last continuity
    /// counter is kept so a duplicate of the final packet is still detected.
    pub fn release(&mut self) {
        self.data.clear();
        self.state = PesState::Idle;
        self.random_access = false;
        self.header = None;
    }

    /// Current reassembly state
    pub fn state(&self) -> PesState {
        self.state
    }

    /// Counter of the last packet fed, `None` after a [`PesUnit::reset`]
    pub fn last_continuity_counter(&self) -> Option<u8> {
        self.last_continuity_counter
    }

    /// True when nothing was written
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True once the accumulated bytes cover the declared PES_packet_length
    pub fn is_complete(&self) -> bool {
        let bytes = self.data.as_slice();
        if bytes.len() < PES_MIN_HEADER_SIZE {
            return false;
        }
        let pes_length = ((bytes[4] as usize) << 8) | bytes[5] as usize;
        if pes_length == 0 {
            return false;
        }
        // start_code_prefix, stream_id and PES_packet_length are not counted, table 2-21
        bytes.len() >= pes_length + PES_MIN_HEADER_SIZE
    }

    /// Decodes the header once enough bytes are available.
    ///
    /// Returns false while the header is incomplete or malformed; callers must
    /// not read the payload until this returns true.
    pub fn parse_header(&mut self) -> bool {
        if self.header.is_some() {
            return true;
        }
        match PesHeader::parse(self.data.as_slice()) {
            Ok(Some(header)) => {
                self.header = Some(header);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("pes: {}", e);
                false
            }
        }
    }

    /// True once [`PesUnit::parse_header`] succeeded
    pub fn is_header_parsed(&self) -> bool {
        self.header.is_some()
    }

    /// Parsed header, if any
    pub fn header(&self) -> Option<&PesHeader> {
        self.header.as_ref()
    }

    /// Bytes before the payload, 0 until the header is parsed
    pub fn header_length(&self) -> usize {
        self.header.as_ref().map_or(0, |h| h.header_length)
    }

    /// Total accumulated length, 0 until the header is parsed
    pub fn length(&self) -> usize {
        if self.header.is_some() {
            self.data.len()
        } else {
            0
        }
    }

    /// stream_id of the parsed header
    pub fn stream_id(&self) -> Option<u8> {
        self.header.as_ref().map(|h| h.stream_id)
    }

    /// PTS in 90 kHz ticks
    pub fn pts(&self) -> Option<i64> {
        self.header.as_ref().and_then(|h| h.pts)
    }

    /// DTS in 90 kHz ticks
    pub fn dts(&self) -> Option<i64> {
        self.header.as_ref().and_then(|h| h.dts)
    }

    /// True if a packet of the unit had the random access indicator set
    pub fn has_random_access_point(&self) -> bool {
        self.random_access
    }

    /// Raw accumulated bytes, header included
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// Elementary stream bytes; empty until the header is parsed
    pub fn payload(&self) -> &[u8] {
        match &self.header {
            Some(header) => {
                let bytes = self.data.as_slice();
                &bytes[header.header_length.min(bytes.len())..]
            }
            None => &[],
        }
    }

    /// At most `length` payload bytes starting `offset` bytes into the payload
    pub fn payload_range(&self, offset: usize, length: usize) -> &[u8] {
        let payload = self.payload();
        let start = offset.min(payload.len());
        let end = start + length.min(payload.len() - start);
        &payload[start..end]
    }
}

fn is_next_continuity_counter(current: Option<u8>, next: u8) -> bool {
    current.map_or(false, |current| (current + 1) % 16 == next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ts::test_util::{build_pes, packetize, PacketBuilder};
    use pretty_assertions::assert_eq;

    const PID: u16 = 0x44;

    fn feed(pes: &mut PesUnit, packets: &[Vec<u8>]) -> PesState {
        let mut state = pes.state();
        for bytes in packets {
            let packet = PacketView::wrap(bytes, 0).unwrap();
            state = pes.consume_packet(&packet);
        }
        state
    }

    fn four_packet_pes() -> Vec<u8> {
        // 9 byte header + 5 byte pts + payload = 4 * 184
        let payload: Vec<u8> = (0..722).map(|i| i as u8).collect();
        let pes = build_pes(0xBD, Some(900_000), None, &payload);
        assert_eq!(pes.len(), 4 * 184);
        pes
    }

    #[test]
    fn test_duplicate_packet_is_ignored() {
        let pes_bytes = four_packet_pes();
        let packets = packetize(PID, &pes_bytes, 0);
        let sequence = vec![
            packets[0].clone(),
            packets[1].clone(),
            packets[2].clone(),
            packets[2].clone(),
            packets[3].clone(),
        ];

        let mut pes = PesUnit::new();
        assert_eq!(feed(&mut pes, &sequence), PesState::Complete);
        assert_eq!(pes.as_bytes(), pes_bytes.as_slice());
        assert!(pes.parse_header());
        assert_eq!(pes.stream_id(), Some(0xBD));
        assert_eq!(pes.pts(), Some(900_000));
        assert_eq!(pes.header_length(), 14);
        assert_eq!(pes.payload().len(), 722);
    }

    #[test]
    fn test_duplicate_after_release_is_ignored() {
        let packets = packetize(PID, &build_pes(0xBD, Some(0), None, &[3; 40]), 7);
        assert_eq!(packets.len(), 1);

        let mut pes = PesUnit::new();
        assert_eq!(feed(&mut pes, &packets), PesState::Complete);
        pes.release();
        assert_eq!(pes.last_continuity_counter(), Some(7));
        assert_eq!(feed(&mut pes, &packets), PesState::Idle);
        assert!(pes.is_empty());

        // after a reset the same packet is a new unit
        pes.reset();
        assert_eq!(feed(&mut pes, &packets), PesState::Complete);
    }

    #[test]
    fn test_continuity_break_drops_unit() {
        let pes_bytes = four_packet_pes();
        let packets = packetize(PID, &pes_bytes, 0);
        let jump = PacketBuilder::new(PID)
            .continuity_counter(5)
            .payload(&[0x55; 184])
            .build();

        let mut pes = PesUnit::new();
        feed(&mut pes, &packets[..2]);
        assert_eq!(pes.state(), PesState::Accumulating);
        assert_eq!(feed(&mut pes, &[jump]), PesState::Idle);
        assert!(pes.is_empty());
    }

    #[test]
    fn test_continuity_break_on_unit_start_restarts() {
        let pes_bytes = four_packet_pes();
        let packets = packetize(PID, &pes_bytes, 0);
        let next = packetize(PID, &build_pes(0xBD, Some(1), None, &[7; 20]), 5);

        let mut pes = PesUnit::new();
        feed(&mut pes, &packets[..2]);
        assert_eq!(feed(&mut pes, &next), PesState::Complete);
        assert_eq!(pes.as_bytes()[..4], [0x00, 0x00, 0x01, 0xBD]);
        assert!(pes.parse_header());
        assert_eq!(pes.payload(), &[7; 20]);
    }

    #[test]
    fn test_counter_wraps() {
        let pes_bytes = four_packet_pes();
        let packets = packetize(PID, &pes_bytes, 14);
        let mut pes = PesUnit::new();
        assert_eq!(feed(&mut pes, &packets), PesState::Complete);
    }

    #[test]
    fn test_waits_for_unit_start() {
        let pes_bytes = four_packet_pes();
        let packets = packetize(PID, &pes_bytes, 0);
        let mut pes = PesUnit::new();
        assert_eq!(feed(&mut pes, &packets[1..]), PesState::Idle);
        assert!(pes.is_empty());
    }

    #[test]
    fn test_parse_header_defers_and_rejects() {
        let mut pes = PesUnit::new();
        pes.push_extra_data(&[0x00, 0x00, 0x01, 0xBD, 0x00]).unwrap();
        assert!(!pes.parse_header());

        let mut pes = PesUnit::new();
        pes.push_extra_data(&[0x00, 0x00, 0x01, 0xBD, 0x00, 0x20, 0x84, 0x80, 0x05, 0x21])
            .unwrap();
        assert!(!pes.parse_header());
        assert!(pes.payload().is_empty());

        let mut pes = PesUnit::new();
        pes.push_extra_data(&[0x00, 0x00, 0x02, 0xBD, 0x00, 0x03, 0x84, 0x00, 0x00])
            .unwrap();
        assert!(!pes.parse_header());
        assert!(!pes.is_header_parsed());
    }

    #[test]
    fn test_header_without_optional_fields() {
        let mut pes = PesUnit::new();
        pes.push_extra_data(&[0x00, 0x00, 0x01, STREAM_ID_PADDING_STREAM, 0x00, 0x02, 0xFF, 0xFF])
            .unwrap();
        assert!(pes.is_complete());
        assert!(pes.parse_header());
        assert_eq!(pes.header_length(), 6);
        assert_eq!(pes.pts(), None);
        assert_eq!(pes.payload(), &[0xFF, 0xFF]);
        assert_eq!(pes.payload_range(1, 10), &[0xFF]);
    }

    #[test]
    fn test_pts_and_dts() {
        let pts = 0x1_2345_6789;
        let dts = 0x0_0000_0003;
        let bytes = build_pes(0xE0, Some(pts), Some(dts), &[1, 2, 3]);
        let header = PesHeader::parse(&bytes).unwrap().unwrap();
        assert_eq!(header.pts, Some(pts));
        assert_eq!(header.dts, Some(dts));
        assert_eq!(header.pts_dts_flags, 3);
        assert_eq!(header.header_length, 19);
        assert!(header.data_alignment);
    }

    #[test]
    fn test_unbounded_unit_is_finished_by_caller() {
        let mut bytes = build_pes(0xE0, Some(0), None, &[0x10; 300]);
        bytes[4] = 0;
        bytes[5] = 0;
        let packets = packetize(PID, &bytes, 0);
        let mut pes = PesUnit::new();
        assert_eq!(feed(&mut pes, &packets), PesState::Accumulating);
        pes.finish();
        assert_eq!(pes.state(), PesState::Complete);
        assert!(pes.parse_header());
        assert_eq!(pes.payload().len(), 300);
    }

    #[test]
    fn test_oversized_unit_is_dropped() {
        let pes_bytes = four_packet_pes();
        let packets = packetize(PID, &pes_bytes, 0);
        let mut pes = PesUnit::with_capacity(184, 400);
        assert_eq!(feed(&mut pes, &packets[..3]), PesState::Idle);
        assert!(pes.is_empty());
    }
}
