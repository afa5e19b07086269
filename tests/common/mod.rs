//! Synthetic transport streams for the integration tests.
#![allow(dead_code)]

pub const PACKET_SIZE: usize = 188;
pub const AUDIO_PID: u16 = 0x44;
pub const PCR_PID: u16 = 0x100;

/// Ticks of one 48 kHz AC-3 syncframe (1536 samples, 32 ms)
pub const FRAME_TICKS: i64 = 2880;
pub const FRAME_US: i64 = 32_000;

/// Builds one packet; the payload goes at the end, after adaptation stuffing.
pub fn ts_packet(pid: u16, unit_start: bool, cc: u8, pcr: Option<i64>, payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() <= PACKET_SIZE - 4);
    let needs_adaptation = pcr.is_some() || payload.len() < PACKET_SIZE - 4;

    let mut packet = vec![
        0x47,
        if unit_start { 0x40 } else { 0x00 } | ((pid >> 8) as u8 & 0x1F),
        pid as u8,
        (cc & 0x0F)
            | if needs_adaptation { 0x20 } else { 0x00 }
            | if payload.is_empty() { 0x00 } else { 0x10 },
    ];
    if needs_adaptation {
        let adaptation_length = PACKET_SIZE - 5 - payload.len();
        packet.push(adaptation_length as u8);
        if adaptation_length > 0 {
            packet.push(if pcr.is_some() { 0x10 } else { 0x00 });
            if let Some(base) = pcr {
                packet.extend_from_slice(&[
                    (base >> 25) as u8,
                    (base >> 17) as u8,
                    (base >> 9) as u8,
                    (base >> 1) as u8,
                    (((base & 1) << 7) as u8) | 0x7E,
                    0x00,
                ]);
            }
        }
        packet.resize(PACKET_SIZE - payload.len(), 0xFF);
    }
    packet.extend_from_slice(payload);
    assert_eq!(packet.len(), PACKET_SIZE);
    packet
}

/// Private stream 1 PES carrying `payload`, with an optional PTS
pub fn pes(pts: Option<i64>, payload: &[u8]) -> Vec<u8> {
    let mut header_data = Vec::new();
    if let Some(pts) = pts {
        let pts = pts & 0x1_FFFF_FFFF;
        header_data.extend_from_slice(&[
            0x21 | ((pts >> 29) & 0x0E) as u8,
            (pts >> 22) as u8,
            ((pts >> 14) & 0xFE) as u8 | 0x01,
            (pts >> 7) as u8,
            ((pts << 1) & 0xFE) as u8 | 0x01,
        ]);
    }
    let length = 3 + header_data.len() + payload.len();
    let mut pes = vec![
        0x00,
        0x00,
        0x01,
        0xBD,
        (length >> 8) as u8,
        length as u8,
        0x84,
        if pts.is_some() { 0x80 } else { 0x00 },
        header_data.len() as u8,
    ];
    pes.extend_from_slice(&header_data);
    pes.extend_from_slice(payload);
    pes
}

/// 128-byte AC-3 syncframe, 48 kHz stereo, filled with `fill`
pub fn ac3_frame(fill: u8) -> Vec<u8> {
    let mut frame = vec![fill; 128];
    frame[..7].copy_from_slice(&[0x0B, 0x77, 0x00, 0x00, 0x00, 0x40, 0x40]);
    frame
}

/// Broadcast-like audio stream: per 32 ms, one pcr packet followed by one
/// single-packet PES holding one syncframe whose PTS equals that pcr.
///
/// From frame `jump_at` on, pcrs and PTSs jump forward by `jump` ticks.
pub struct AudioStream {
    pub frames: usize,
    pub first_pcr: i64,
    pub jump_at: usize,
    pub jump: i64,
}

impl AudioStream {
    pub fn new(frames: usize) -> Self {
        Self {
            frames,
            first_pcr: 900_000,
            jump_at: usize::MAX,
            jump: 0,
        }
    }

    pub fn with_jump(mut self, jump_at: usize, jump: i64) -> Self {
        self.jump_at = jump_at;
        self.jump = jump;
        self
    }

    pub fn pcr_of(&self, frame: usize) -> i64 {
        let mut pcr = self.first_pcr + frame as i64 * FRAME_TICKS;
        if frame >= self.jump_at {
            pcr += self.jump;
        }
        pcr
    }

    /// Byte position of the pcr packet of `frame`
    pub fn position_of(frame: usize) -> i64 {
        (2 * frame * PACKET_SIZE) as i64
    }

    pub fn build(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.frames * 2 * PACKET_SIZE);
        for frame in 0..self.frames {
            let pcr = self.pcr_of(frame);
            let cc = frame as u8;
            data.extend(ts_packet(PCR_PID, false, cc, Some(pcr), &[]));
            data.extend(ts_packet(
                AUDIO_PID,
                true,
                cc,
                None,
                &pes(Some(pcr), &ac3_frame(frame as u8)),
            ));
        }
        data
    }
}

/// Splits a PES into packets of `pid`, counters starting at `first_cc`
pub fn packetize(pid: u16, pes: &[u8], first_cc: u8) -> Vec<Vec<u8>> {
    pes.chunks(PACKET_SIZE - 4)
        .enumerate()
        .map(|(i, chunk)| ts_packet(pid, i == 0, first_cc.wrapping_add(i as u8), None, chunk))
        .collect()
}
