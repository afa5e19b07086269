use crate::av::{CodecData, Packet};
use crate::Result;

pub mod ts;

/// Common trait for format demuxers
#[async_trait::async_trait]
pub trait Demuxer: Send {
    /// Read the next packet from the stream
    async fn read_packet(&mut self) -> Result<Packet>;

    /// Get stream information
    async fn streams(&mut self) -> Result<Vec<Box<dyn CodecData>>>;
}

pub use self::ts::{TsDemuxer, TsSession};
