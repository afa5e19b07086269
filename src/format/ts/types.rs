use std::time::Duration;

// Packet layout
/// Size of one transport packet
pub const TS_PACKET_SIZE: usize = 188;
/// Fixed packet header
pub const TS_HEADER_SIZE: usize = 4;
/// Header plus adaptation field length and flags
pub const TS_HEADER_SIZE_AF: usize = 6;
/// Header plus an adaptation field carrying a pcr
pub const TS_HEADER_SIZE_PCR: usize = 12;
/// First byte of every packet
pub const TS_SYNC_BYTE: u8 = 0x47;
/// Largest 13-bit pid
pub const PID_MAX: u16 = 8191;

// PES layout, ISO/IEC 13818-1 table 2-21
/// start code prefix, stream id, packet length
pub const PES_MIN_HEADER_SIZE: usize = 6;
/// Fixed header plus flags and header data length
pub const PES_MIN_HEADER_WITH_EXTENSION_SIZE: usize = 9;

// Stream IDs
/// stream_id program stream map
pub const STREAM_ID_PROGRAM_STREAM_MAP: u8 = 0xBC;
/// Carries AC-3 and E-AC-3 in DVB and ATSC
pub const STREAM_ID_PRIVATE_STREAM_1: u8 = 0xBD;
/// stream_id padding stream
pub const STREAM_ID_PADDING_STREAM: u8 = 0xBE;
/// stream_id private stream 2
pub const STREAM_ID_PRIVATE_STREAM_2: u8 = 0xBF;
/// stream_id audio min
pub const STREAM_ID_AUDIO_MIN: u8 = 0xC0;
/// stream_id audio max
pub const STREAM_ID_AUDIO_MAX: u8 = 0xDF;
/// stream_id video min
pub const STREAM_ID_VIDEO_MIN: u8 = 0xE0;
/// stream_id video max
pub const STREAM_ID_VIDEO_MAX: u8 = 0xEF;
/// stream_id ecm stream
pub const STREAM_ID_ECM_STREAM: u8 = 0xF0;
/// stream_id emm stream
pub const STREAM_ID_EMM_STREAM: u8 = 0xF1;
/// stream_id dsmcc
pub const STREAM_ID_DSMCC: u8 = 0xF2;
/// stream_id h222 1 type e
pub const STREAM_ID_H222_1_TYPE_E: u8 = 0xF8;
/// stream_id program stream directory
pub const STREAM_ID_PROGRAM_STREAM_DIRECTORY: u8 = 0xFF;

// Clocks
/// PTS and pcr base clock
pub const PTS_HZ: i64 = 90_000;
/// Full pcr clock
pub const PCR_HZ: i64 = 27_000_000;
/// Microseconds in a second
pub const MICROS_PER_SECOND: i64 = 1_000_000;

/// Largest 33-bit PTS/PCR base value
pub const PTS_MAX_VALUE: i64 = 0x1_FFFF_FFFF;

/// [`PTS_MAX_VALUE`] expressed in microseconds, the modulus of every
/// timestamp computation done in microseconds
pub const PTS_MAX_VALUE_US: i64 = PTS_MAX_VALUE * MICROS_PER_SECOND / PTS_HZ;

/// Largest gap between two pcrs of a continuous stream
pub const PCR_MAX_DELTA_US: i64 = 200_000;

/// Returns true if PES packets with this stream id carry only the 6-byte fixed header
pub fn has_no_optional_header(stream_id: u8) -> bool {
    matches!(
        stream_id,
        STREAM_ID_PROGRAM_STREAM_MAP
            | STREAM_ID_PADDING_STREAM
            | STREAM_ID_PRIVATE_STREAM_2
            | STREAM_ID_ECM_STREAM
            | STREAM_ID_EMM_STREAM
            | STREAM_ID_PROGRAM_STREAM_DIRECTORY
            | STREAM_ID_DSMCC
            | STREAM_ID_H222_1_TYPE_E
    )
}

// Time conversion utilities
/// 90 kHz ticks to microseconds
pub fn pts_to_us(pts: i64) -> i64 {
    pts * MICROS_PER_SECOND / PTS_HZ
}

/// Microseconds to 90 kHz ticks
pub fn us_to_pts(us: i64) -> i64 {
    us * PTS_HZ / MICROS_PER_SECOND
}

/// Converts a full 27 MHz pcr (base * 300 + extension) to microseconds
pub fn pcr_to_us(pcr: i64) -> i64 {
    pcr * MICROS_PER_SECOND / PCR_HZ
}

/// 90 kHz ticks to a [`Duration`], negative values clamp to zero
pub fn pts_to_time(pts: i64) -> Duration {
    Duration::from_micros(pts_to_us(pts.max(0)) as u64)
}

/// Signed difference of two 33-bit tick values, taking the wrap at 2^33 into account
pub fn delta_pts(pts1: i64, pts2: i64) -> i64 {
    wrapping_delta(pts1, pts2, PTS_MAX_VALUE)
}

/// Shortest signed distance from `b` to `a` on a circle of size `modulus`.
///
/// The modulus is odd for both domains used here, so the result is unique and
/// `wrapping_delta(a, b) == -wrapping_delta(b, a)` always holds.
pub(crate) fn wrapping_delta(a: i64, b: i64, modulus: i64) -> i64 {
    let delta = (a - b).rem_euclid(modulus);
    if delta > modulus / 2 {
        delta - modulus
    } else {
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_conversions() {
        assert_eq!(pts_to_us(90_000), 1_000_000);
        assert_eq!(us_to_pts(1_000_000), 90_000);
        assert_eq!(pcr_to_us(27_000_000), 1_000_000);
        assert_eq!(pts_to_time(45_000), Duration::from_millis(500));
        assert_eq!(PTS_MAX_VALUE_US, 95_443_717_677);
    }

    #[test]
    fn test_delta_pts_wraps() {
        assert_eq!(delta_pts(10, 5), 5);
        assert_eq!(delta_pts(5, 10), -5);
        assert_eq!(delta_pts(2, PTS_MAX_VALUE - 3), 5);
        assert_eq!(delta_pts(PTS_MAX_VALUE - 3, 2), -5);
    }

    #[test]
    fn test_stream_ids_without_optional_header() {
        assert!(has_no_optional_header(STREAM_ID_PADDING_STREAM));
        assert!(has_no_optional_header(STREAM_ID_H222_1_TYPE_E));
        assert!(!has_no_optional_header(STREAM_ID_PRIVATE_STREAM_1));
        assert!(!has_no_optional_header(STREAM_ID_AUDIO_MIN));
    }
}
