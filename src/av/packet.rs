use bytes::Bytes;
use std::time::Duration;

/// One access unit ready for a decoder.
///
/// `pts` is on the continuous playback axis, `raw_pts` is the value derived
/// from the stream before adjustment. Both are in microseconds.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Unit bytes
    pub data: Bytes,
    /// Presentation time on the playback axis
    pub pts: Option<i64>,
    /// Presentation time as carried by the stream
    pub raw_pts: Option<i64>,
    /// Byte position of the PES the unit was extracted from
    pub position: i64,
    /// Index of the stream in [`crate::format::Demuxer::streams`]
    pub stream_index: usize,
    /// Set when the PES carried a random access indicator
    pub is_key: bool,
    /// Duration of a syncframe, `None` for pass-through units
    pub duration: Option<Duration>,
}

impl Packet {
    /// Untimed packet at an unknown position
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            pts: None,
            raw_pts: None,
            position: -1,
            stream_index: 0,
            is_key: false,
            duration: None,
        }
    }

    /// Sets the playback axis timestamp
    pub fn with_pts(mut self, pts: i64) -> Self {
        self.pts = Some(pts);
        self
    }

    /// Sets the stream timestamp
    pub fn with_raw_pts(mut self, raw_pts: i64) -> Self {
        self.raw_pts = Some(raw_pts);
        self
    }

    /// Sets the source byte position
    pub fn with_position(mut self, position: i64) -> Self {
        self.position = position;
        self
    }

    /// Sets the stream index
    pub fn with_stream_index(mut self, index: usize) -> Self {
        self.stream_index = index;
        self
    }

    /// Marks the packet as a random access point
    pub fn with_key_flag(mut self, is_key: bool) -> Self {
        self.is_key = is_key;
        self
    }

    /// Sets the unit duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}
