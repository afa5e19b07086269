/// A pcr sample: byte position of the packet carrying it and its value in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampPoint {
    /// Byte position of the packet
    pub position: i64,
    /// Pcr value in microseconds
    pub time_us: i64,
}

impl TimestampPoint {
    /// Sentinel for "no sample"
    pub const INVALID: TimestampPoint = TimestampPoint {
        position: -1,
        time_us: -1,
    };

    /// Creates an empty instance
    pub fn new(position: i64, time_us: i64) -> Self {
        Self { position, time_us }
    }

    /// False for the sentinel
    pub fn is_valid(&self) -> bool {
        self.position >= 0 && self.time_us >= 0
    }

    /// Back to [`TimestampPoint::INVALID`]
    pub fn reset(&mut self) {
        *self = Self::INVALID;
    }
}

impl Default for TimestampPoint {
    fn default() -> Self {
        Self::INVALID
    }
}

/// One pcr-continuous region of a source.
///
/// `start_time_us` is the position of the chunk on the source timeline, that is
/// the sum of the durations of every chunk before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimelineChunk {
    /// First pcr of the chunk
    pub start_point: TimestampPoint,
    /// Last pcr of the chunk
    pub end_point: TimestampPoint,
    /// Start on the source timeline
    pub start_time_us: i64,
    /// Pcr span of the chunk
    pub duration_us: i64,
}

impl TimelineChunk {
    /// End on the source timeline
    pub fn end_time_us(&self) -> i64 {
        self.start_time_us + self.duration_us
    }

    /// True if `time_us`, on the source timeline, falls in this chunk
    pub fn contains_time(&self, time_us: i64) -> bool {
        time_us >= self.start_time_us && time_us <= self.end_time_us()
    }

    /// True if `position` lies between the chunk pcrs
    pub fn contains_position(&self, position: i64) -> bool {
        position >= self.start_point.position && position <= self.end_point.position
    }
}
