use super::demuxer::TsDemuxer;
use super::source::ByteSource;
use crate::av::{CodecData, Packet};
use crate::encapsulation::MetadataQueue;
use crate::error::{Result, TsError};
use crate::format::Demuxer;
use bytes::BytesMut;
use log::{debug, info};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;

/// Async owner of a [`TsDemuxer`].
///
/// The ingest side (`read_packet`) and the control side (seek, timeline
/// queries) share one lock, so calls into the demuxer never overlap. Every
/// call taking that lock runs on the blocking thread pool, as the lock may be
/// held for a whole timeline scan. The metadata queue has its own lock and is
/// reached without the demuxer. The session is cheap to clone; clones drive
/// the same demuxer.
///
/// ```rust
/// use tsio::format::ts::{MemorySource, TsDemuxer, TsSession};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let session = TsSession::new(TsDemuxer::new(MemorySource::new(Vec::new()), 0x44, None));
/// let seekable = session.open().await?;
/// assert!(!seekable);
/// assert!(session.next_packet().await?.is_none());
/// # Ok(())
/// # }
/// ```
pub struct TsSession<S: ByteSource + 'static> {
    demuxer: Arc<Mutex<TsDemuxer<S>>>,
    metadata: Arc<MetadataQueue>,
}

impl<S: ByteSource + 'static> Clone for TsSession<S> {
    fn clone(&self) -> Self {
        Self {
            demuxer: Arc::clone(&self.demuxer),
            metadata: Arc::clone(&self.metadata),
        }
    }
}

impl<S: ByteSource + 'static> TsSession<S> {
    /// Takes ownership of `demuxer`, which may or may not be open yet
    pub fn new(demuxer: TsDemuxer<S>) -> Self {
        Self {
            metadata: demuxer.metadata_queue(),
            demuxer: Arc::new(Mutex::new(demuxer)),
        }
    }

    async fn run_blocking<T, F>(&self, operation: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut TsDemuxer<S>) -> Result<T> + Send + 'static,
    {
        let demuxer = Arc::clone(&self.demuxer);
        tokio::task::spawn_blocking(move || operation(&mut demuxer.lock()))
            .await
            .map_err(|e| TsError::Io(io::Error::new(io::ErrorKind::Other, e)))?
    }

    /// Opens the source and builds its timeline. Returns true when the
    /// source can be positioned by time.
    pub async fn open(&self) -> Result<bool> {
        let seekable = self
            .run_blocking(|demuxer| {
                demuxer.open()?;
                Ok(demuxer.update_timeline())
            })
            .await?;
        info!("session opened, seekable: {}", seekable);
        Ok(seekable)
    }

    /// Closes the source
    pub async fn close(&self) -> Result<()> {
        self.run_blocking(|demuxer| {
            demuxer.close();
            Ok(())
        })
        .await
    }

    /// Next audio unit, `None` at the end of the source
    pub async fn next_packet(&self) -> Result<Option<Packet>> {
        self.run_blocking(|demuxer| demuxer.read_packet()).await
    }

    /// See [`TsDemuxer::seek_to_time`]
    pub async fn seek_to_time(&self, time_us: i64) -> Result<i64> {
        debug!("session seek to {} ms", time_us / 1000);
        self.run_blocking(move |demuxer| demuxer.seek_to_time(time_us))
            .await
    }

    /// See [`TsDemuxer::seek`]
    pub async fn seek(&self, position: i64) -> Result<i64> {
        self.run_blocking(move |demuxer| demuxer.seek(position)).await
    }

    /// Byte position of `time_us` on the source timeline
    pub async fn position_for_time(&self, time_us: i64) -> Result<i64> {
        self.run_blocking(move |demuxer| demuxer.source_mut().position_for_time(time_us))
            .await
    }

    /// Source timeline time of `position`, `None` when unknown
    pub async fn time_for_position(&self, position: i64) -> Result<Option<i64>> {
        self.run_blocking(move |demuxer| Ok(demuxer.source_mut().time_for_position(position)))
            .await
    }

    /// True when the last open built a timeline
    pub async fn is_seekable(&self) -> Result<bool> {
        self.run_blocking(|demuxer| Ok(demuxer.source().is_seekable()))
            .await
    }

    /// Start and end of the source timeline in microseconds
    pub async fn time_range_us(&self) -> Result<Option<(i64, i64)>> {
        self.run_blocking(|demuxer| {
            let source = demuxer.source();
            Ok(source.start_position_us().zip(source.end_position_us()))
        })
        .await
    }

    /// End of the source in bytes, its length when no timeline was built
    pub async fn end_position_bytes(&self) -> Result<i64> {
        self.run_blocking(|demuxer| Ok(demuxer.source().end_position_bytes()))
            .await
    }

    /// Maps a decoder timestamp onto the continuous playback axis
    pub async fn adjust_timestamp(&self, timestamp_us: i64) -> Result<i64> {
        self.run_blocking(move |demuxer| Ok(demuxer.adjuster().adjust(timestamp_us)))
            .await
    }

    /// Queue shared with the demuxer, writable from any thread
    pub fn metadata_queue(&self) -> Arc<MetadataQueue> {
        Arc::clone(&self.metadata)
    }

    /// See [`MetadataQueue::encode_packet`]
    pub fn encapsulation_packet(&self, buf: &mut BytesMut, length: usize) -> Result<()> {
        self.metadata.encode_packet(buf, length)
    }
}

#[async_trait::async_trait]
impl<S: ByteSource + 'static> Demuxer for TsSession<S> {
    async fn read_packet(&mut self) -> Result<Packet> {
        self.next_packet().await?.ok_or_else(|| {
            TsError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "end of transport stream",
            ))
        })
    }

    async fn streams(&mut self) -> Result<Vec<Box<dyn CodecData>>> {
        let format = self
            .run_blocking(|demuxer| Ok(demuxer.media_format().cloned()))
            .await?;
        Ok(format
            .map(|format| Box::new(format) as Box<dyn CodecData>)
            .into_iter()
            .collect())
    }
}
