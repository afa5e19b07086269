//! # MPEG Transport Stream (TS) Demultiplexing
//!
//! This module turns a transport stream byte source into timestamped audio
//! units:
//!
//! - [`PacketView`]: zero-copy accessors over one 188-byte packet
//! - [`PesUnit`]: PES reassembly with continuity checks
//! - [`PcrTimelineAnalyzer`]: chunked pcr timeline for time based seeking
//! - [`TimestampAdjuster`]: wrap and discontinuity free playback axis
//! - [`TsDemuxer`] / [`TsSession`]: the ingest pipeline and its async owner
//!
//! ## Example Usage
//!
//! ### Reading audio units from a file
//!
//! ```rust,no_run
//! use tsio::format::ts::{FileSource, TsDemuxer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut demuxer = TsDemuxer::new(FileSource::new("recording.ts"), 0x44, Some(0x100));
//! demuxer.open()?;
//! if demuxer.update_timeline() {
//!     demuxer.seek_to_time(60_000_000)?;
//! }
//! while let Some(packet) = demuxer.read_packet()? {
//!     println!("{} bytes at {:?} us", packet.data.len(), packet.pts);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Timestamp arithmetic
//!
//! 33-bit timestamps wrap after about 26.5 hours; differences and sums must
//! go through the modular helpers.
//!
//! ```rust
//! use tsio::format::ts::adjuster::{delta_timestamp, plus};
//! use tsio::format::ts::PTS_MAX_VALUE_US;
//!
//! let before_wrap = PTS_MAX_VALUE_US - 1_000;
//! let after_wrap = plus(before_wrap, 3_000);
//! assert_eq!(after_wrap, 2_000);
//! assert_eq!(delta_timestamp(after_wrap, before_wrap), 3_000);
//! ```

/// Timestamp arithmetic and continuous playback axis
pub mod adjuster;

/// PCR timeline analysis
pub mod analyzer;

/// Audio ingest pipeline
pub mod demuxer;

/// Transport stream packet accessors
pub mod packet;

/// PES reassembly
pub mod pes;

/// Async session owning a demuxer
pub mod session;

/// Byte sources and time based positioning
pub mod source;

/// Timeline value types
pub mod timeline;

/// Core TS types and constants
pub mod types;

#[cfg(test)]
pub(crate) mod test_util;

pub use adjuster::TimestampAdjuster;
pub use analyzer::PcrTimelineAnalyzer;
pub use demuxer::TsDemuxer;
pub use packet::PacketView;
pub use pes::{PesHeader, PesState, PesUnit};
pub use session::TsSession;
pub use source::{align_position, ByteSource, FileSource, MemorySource, SeekableSource};
pub use timeline::{TimelineChunk, TimestampPoint};
pub use types::{
    pts_to_us,
    us_to_pts,
    PCR_MAX_DELTA_US,
    PTS_MAX_VALUE,
    PTS_MAX_VALUE_US,
    TS_PACKET_SIZE,
    TS_SYNC_BYTE,
};
