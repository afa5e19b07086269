use super::timeline::TimestampPoint;
use super::types::*;
use crate::config::{self, AdjusterConfig};
use log::info;

/// Signed difference `a - b` of two microsecond timestamps taken modulo the
/// 33-bit pts range, i.e. the representative of smallest magnitude.
pub fn delta_timestamp(a: i64, b: i64) -> i64 {
    wrapping_delta(a, b, PTS_MAX_VALUE_US)
}

/// `timestamp + addition`, wrapped into `[0, PTS_MAX_VALUE_US)`
pub fn plus(timestamp: i64, addition: i64) -> i64 {
    (timestamp + addition).rem_euclid(PTS_MAX_VALUE_US)
}

/// Maps decoder timestamps onto one continuous time axis anchored on the byte
/// source timeline.
///
/// Pcr samples are pushed by the ingest loop while `adjust` and the reference
/// accessors are used by the control side. The adjuster is not synchronized:
/// the owning session serializes both.
#[derive(Debug, Clone)]
pub struct TimestampAdjuster {
    config: AdjusterConfig,
    pcr_loops: i64,
    reference: TimestampPoint,
    origin_position_us: i64,
    origin_timestamp_us: i64,
    pending_discontinuities: u32,
    discontinuity_detected: bool,
}

impl Default for TimestampAdjuster {
    fn default() -> Self {
        Self::new()
    }
}

impl TimestampAdjuster {
    /// Adjuster with the process-wide thresholds
    pub fn new() -> Self {
        Self::with_config(config::adjuster_config())
    }

    /// Same as `new` with explicit settings
    pub fn with_config(config: AdjusterConfig) -> Self {
        Self {
            config,
            pcr_loops: 0,
            reference: TimestampPoint::INVALID,
            origin_position_us: -1,
            origin_timestamp_us: -1,
            pending_discontinuities: 0,
            discontinuity_detected: false,
        }
    }

    /// Forgets the reference, the origin and the wrap count
    pub fn reset(&mut self) {
        self.reference.reset();
        self.origin_position_us = -1;
        self.origin_timestamp_us = -1;
        self.pending_discontinuities = 0;
        self.discontinuity_detected = false;
        self.pcr_loops = 0;
    }

    /// True once a pcr was pushed
    pub fn has_reference(&self) -> bool {
        self.reference.is_valid()
    }

    /// Byte position of the reference pcr, -1 without one
    pub fn reference_position(&self) -> i64 {
        self.reference.position
    }

    /// Time of the reference pcr on the continuous axis
    pub fn reference_time_us(&self) -> i64 {
        (self.reference.time_us - self.origin_timestamp_us) + self.origin_position_us
    }

    /// True only right after the push that confirmed a discontinuity
    pub fn discontinuity_detected(&self) -> bool {
        self.discontinuity_detected
    }

    /// Number of times the pcr wrapped since the reference was set
    pub fn pcr_loops(&self) -> i64 {
        self.pcr_loops
    }

    /// Feeds the pcr base (90 kHz ticks) read at byte `position`.
    ///
    /// `origin_time` gives the source timeline time of a byte position; it is
    /// only called for the first sample, and an unknown time anchors the axis
    /// at zero.
    pub fn push_pcr<F>(&mut self, position: i64, pcr: i64, origin_time: F)
    where
        F: FnOnce(i64) -> Option<i64>,
    {
        self.discontinuity_detected = false;

        if !self.reference.is_valid() {
            self.reference = TimestampPoint::new(position, pts_to_us(pcr));
            self.origin_position_us = origin_time(position).filter(|t| *t >= 0).unwrap_or(0);
            self.origin_timestamp_us = self.reference.time_us;
            return;
        }

        let mut pcr_us = pts_to_us(pcr) + self.pcr_loops * PTS_MAX_VALUE_US;
        let mut possible_loop = false;
        while pcr_us < self.reference.time_us {
            pcr_us += PTS_MAX_VALUE_US;
            possible_loop = true;
        }

        let delta_us = pcr_us - self.reference.time_us;
        if delta_us > self.config.max_gap_us {
            self.pending_discontinuities += 1;
            info!(
                "potential pcr discontinuity at position {}, pcr:[adj:{} ms, loop:{}, {} ms], last:{} ms, delta:{} ms, count:{}",
                position,
                pcr_us / 1000,
                self.pcr_loops,
                pts_to_us(pcr) / 1000,
                self.reference.time_us / 1000,
                delta_us / 1000,
                self.pending_discontinuities
            );
            if self.pending_discontinuities >= self.config.confirm_count {
                info!("pcr discontinuity confirmed at position {}", position);
                self.discontinuity_detected = true;
                self.pending_discontinuities = 0;
                self.move_reference(position, pcr_us, possible_loop);
            }
        } else {
            self.pending_discontinuities = 0;
            self.move_reference(position, pcr_us, possible_loop);
        }
    }

    fn move_reference(&mut self, position: i64, pcr_us: i64, possible_loop: bool) {
        self.reference = TimestampPoint::new(position, pcr_us);
        if possible_loop {
            self.pcr_loops += 1;
        }
    }

    /// Maps a raw decoder timestamp onto the continuous axis.
    ///
    /// Returned unchanged until a first pcr has been pushed.
    pub fn adjust(&self, timestamp_us: i64) -> i64 {
        if !self.reference.is_valid() {
            return timestamp_us;
        }
        (timestamp_us + self.pcr_loops * PTS_MAX_VALUE_US - self.origin_timestamp_us)
            + self.origin_position_us
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quickcheck_macros::quickcheck;

    fn in_range(value: u64) -> i64 {
        (value % PTS_MAX_VALUE_US as u64) as i64
    }

    #[quickcheck]
    fn prop_delta_of_same_value_is_zero(p: u64) -> bool {
        let p = in_range(p);
        delta_timestamp(p, p) == 0
    }

    #[quickcheck]
    fn prop_delta_is_antisymmetric(a: u64, b: u64) -> bool {
        let (a, b) = (in_range(a), in_range(b));
        delta_timestamp(a, b) == -delta_timestamp(b, a)
    }

    #[quickcheck]
    fn prop_plus_decomposes(t: u64, d1: u32, d2: u32) -> bool {
        let t = in_range(t);
        let (d1, d2) = (d1 as i64, d2 as i64);
        plus(plus(t, d1), d2) == plus(t, d1 + d2)
    }

    #[test]
    fn test_delta_and_plus_wrap() {
        assert_eq!(delta_timestamp(1_000, PTS_MAX_VALUE_US - 1_000), 2_000);
        assert_eq!(delta_timestamp(PTS_MAX_VALUE_US - 1_000, 1_000), -2_000);
        assert_eq!(plus(PTS_MAX_VALUE_US - 1, 2), 1);
        assert_eq!(plus(10, -20), PTS_MAX_VALUE_US - 10);
    }

    fn adjuster() -> TimestampAdjuster {
        TimestampAdjuster::with_config(AdjusterConfig::default())
    }

    #[test]
    fn test_adjust_without_reference() {
        let adjuster = adjuster();
        assert!(!adjuster.has_reference());
        assert_eq!(adjuster.adjust(123_456), 123_456);
    }

    #[test]
    fn test_first_pcr_sets_origin() {
        let mut adjuster = adjuster();
        adjuster.push_pcr(1880, 900_000, |position| {
            assert_eq!(position, 1880);
            Some(2_000_000)
        });
        assert!(adjuster.has_reference());
        assert_eq!(adjuster.reference_position(), 1880);
        assert_eq!(adjuster.reference_time_us(), 2_000_000);
        // pts 10.5 s is 0.5 s after the 10 s origin pcr
        assert_eq!(adjuster.adjust(10_500_000), 2_500_000);

        let mut unknown = TimestampAdjuster::with_config(AdjusterConfig::default());
        unknown.push_pcr(0, 900_000, |_| None);
        assert_eq!(unknown.adjust(10_000_000), 0);
    }

    #[test]
    fn test_continuous_pcrs_move_reference() {
        let mut adjuster = adjuster();
        adjuster.push_pcr(0, 0, |_| Some(0));
        adjuster.push_pcr(188, 9_000, |_| unreachable!());
        assert_eq!(adjuster.reference_position(), 188);
        assert_eq!(adjuster.reference_time_us(), 100_000);
        assert!(!adjuster.discontinuity_detected());
    }

    #[test]
    fn test_discontinuity_confirmed_on_third_jump() {
        let mut adjuster = adjuster();
        adjuster.push_pcr(0, 0, |_| Some(0));

        // jump of ten seconds, repeated
        adjuster.push_pcr(188, 900_000, |_| None);
        assert!(!adjuster.discontinuity_detected());
        assert_eq!(adjuster.reference_position(), 0);
        adjuster.push_pcr(376, 909_000, |_| None);
        assert!(!adjuster.discontinuity_detected());
        adjuster.push_pcr(564, 918_000, |_| None);
        assert!(adjuster.discontinuity_detected());
        assert_eq!(adjuster.reference_position(), 564);
        assert_eq!(adjuster.reference_time_us(), 10_200_000);

        adjuster.push_pcr(752, 927_000, |_| None);
        assert!(!adjuster.discontinuity_detected());
        assert_eq!(adjuster.reference_position(), 752);
    }

    #[test]
    fn test_small_delta_clears_pending_jumps() {
        let mut adjuster = adjuster();
        adjuster.push_pcr(0, 0, |_| Some(0));
        adjuster.push_pcr(188, 900_000, |_| None);
        adjuster.push_pcr(376, 900_000, |_| None);
        adjuster.push_pcr(564, 9_000, |_| None);
        assert_eq!(adjuster.reference_position(), 564);
        adjuster.push_pcr(752, 900_000, |_| None);
        adjuster.push_pcr(940, 909_000, |_| None);
        assert!(!adjuster.discontinuity_detected());
        assert_eq!(adjuster.reference_position(), 564);
    }

    #[test]
    fn test_pcr_wrap_keeps_axis_continuous() {
        let mut adjuster = adjuster();
        let before_wrap = PTS_MAX_VALUE - 9_000;
        adjuster.push_pcr(0, before_wrap, |_| Some(0));
        adjuster.push_pcr(188, 0, |_| None);
        assert_eq!(adjuster.pcr_loops(), 1);
        assert!(!adjuster.discontinuity_detected());
        // 50 ms after the wrap is 150 ms after the origin
        assert_eq!(adjuster.adjust(pts_to_us(4_500)), 150_000);
    }

    #[test]
    fn test_configurable_thresholds() {
        let mut adjuster = TimestampAdjuster::with_config(AdjusterConfig {
            max_gap_us: 50_000,
            confirm_count: 1,
        });
        adjuster.push_pcr(0, 0, |_| Some(0));
        adjuster.push_pcr(188, 9_000, |_| None);
        assert!(adjuster.discontinuity_detected());

        adjuster.reset();
        assert!(!adjuster.has_reference());
        assert!(!adjuster.discontinuity_detected());
    }
}
