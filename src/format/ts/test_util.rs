//! Synthetic transport stream builders shared by the unit tests.

use super::types::*;

pub struct PacketBuilder {
    pid: u16,
    unit_start: bool,
    continuity_counter: u8,
    scrambling: u8,
    pcr: Option<(i64, u16)>,
    random_access: bool,
    payload: Option<Vec<u8>>,
}

impl PacketBuilder {
    pub fn new(pid: u16) -> Self {
        Self {
            pid,
            unit_start: false,
            continuity_counter: 0,
            scrambling: 0,
            pcr: None,
            random_access: false,
            payload: None,
        }
    }

    pub fn unit_start(mut self, unit_start: bool) -> Self {
        self.unit_start = unit_start;
        self
    }

    pub fn continuity_counter(mut self, cc: u8) -> Self {
        self.continuity_counter = cc & 0x0F;
        self
    }

    pub fn scrambling(mut self, scrambling: u8) -> Self {
        self.scrambling = scrambling & 0x03;
        self
    }

    pub fn pcr(mut self, base: i64, extension: u16) -> Self {
        self.pcr = Some((base, extension));
        self
    }

    pub fn random_access(mut self, random_access: bool) -> Self {
        self.random_access = random_access;
        self
    }

    /// Payload placed at the end of the packet, stuffing the adaptation field if shorter
    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = Some(payload.to_vec());
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(TS_PACKET_SIZE);
        let payload = self.payload.unwrap_or_default();
        let has_payload = !payload.is_empty();
        let needs_adaptation =
            self.pcr.is_some() || self.random_access || payload.len() < TS_PACKET_SIZE - 4;
        assert!(payload.len() <= TS_PACKET_SIZE - 4);

        packet.push(TS_SYNC_BYTE);
        packet.push(
            if self.unit_start { 0x40 } else { 0x00 } | ((self.pid >> 8) as u8 & 0x1F),
        );
        packet.push(self.pid as u8);
        let mut b3 = (self.scrambling << 6) | self.continuity_counter;
        if needs_adaptation {
            b3 |= 0x20;
        }
        if has_payload {
            b3 |= 0x10;
        }
        packet.push(b3);

        if needs_adaptation {
            let adaptation_length = TS_PACKET_SIZE - 5 - payload.len();
            packet.push(adaptation_length as u8);
            if adaptation_length > 0 {
                let mut flags = 0u8;
                if self.random_access {
                    flags |= 0x40;
                }
                if self.pcr.is_some() {
                    flags |= 0x10;
                }
                packet.push(flags);
                if let Some((base, ext)) = self.pcr {
                    assert!(adaptation_length >= 7);
                    packet.push((base >> 25) as u8);
                    packet.push((base >> 17) as u8);
                    packet.push((base >> 9) as u8);
                    packet.push((base >> 1) as u8);
                    packet.push((((base & 1) << 7) as u8) | 0x7E | ((ext >> 8) as u8 & 0x01));
                    packet.push(ext as u8);
                }
            }
            packet.resize(TS_PACKET_SIZE - payload.len(), 0xFF);
        }
        packet.extend_from_slice(&payload);
        assert_eq!(packet.len(), TS_PACKET_SIZE);
        packet
    }
}

/// Encodes a 33-bit timestamp in the 5-byte PES layout
pub fn encode_timestamp(marker: u8, ts: i64) -> [u8; 5] {
    let ts = ts & PTS_MAX_VALUE;
    let middle = (((ts >> 14) & 0xFFFE) | 0x01) as u16;
    let last = (((ts << 1) & 0xFFFE) | 0x01) as u16;
    [
        marker | ((ts >> 29) & 0x0E) as u8 | 0x01,
        (middle >> 8) as u8,
        middle as u8,
        (last >> 8) as u8,
        last as u8,
    ]
}

/// Builds a complete PES packet with an optional PTS and DTS
pub fn build_pes(stream_id: u8, pts: Option<i64>, dts: Option<i64>, payload: &[u8]) -> Vec<u8> {
    let mut header_data = Vec::new();
    let mut flags = 0u8;
    if let Some(pts) = pts {
        let marker = if dts.is_some() { 0x30 } else { 0x20 };
        header_data.extend_from_slice(&encode_timestamp(marker, pts));
        flags |= 0x80;
    }
    if let Some(dts) = dts {
        header_data.extend_from_slice(&encode_timestamp(0x10, dts));
        flags |= 0x40;
    }
    let pes_length = 3 + header_data.len() + payload.len();
    let mut pes = vec![0x00, 0x00, 0x01, stream_id];
    pes.push((pes_length >> 8) as u8);
    pes.push(pes_length as u8);
    pes.push(0x84);
    pes.push(flags);
    pes.push(header_data.len() as u8);
    pes.extend_from_slice(&header_data);
    pes.extend_from_slice(payload);
    pes
}

/// Splits a PES into TS packets on one pid, counters starting at `first_cc`
pub fn packetize(pid: u16, pes: &[u8], first_cc: u8) -> Vec<Vec<u8>> {
    pes.chunks(TS_PACKET_SIZE - 4)
        .enumerate()
        .map(|(i, chunk)| {
            PacketBuilder::new(pid)
                .unit_start(i == 0)
                .continuity_counter(first_cc.wrapping_add(i as u8))
                .payload(chunk)
                .build()
        })
        .collect()
}
