use super::analyzer::PcrTimelineAnalyzer;
use super::timeline::TimelineChunk;
use super::types::TS_PACKET_SIZE;
use crate::config::AnalyzerConfig;
use crate::error::{Result, TsError};
use bytes::Bytes;
use log::{debug, warn};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Random access byte source feeding the demuxer and the timeline analyzer.
pub trait ByteSource: Send {
    /// Opens the source at position 0
    fn open(&mut self) -> Result<()>;

    /// Closes the source
    fn close(&mut self);

    /// True between open and close
    fn is_open(&self) -> bool;

    /// Reads at the current position, returns 0 at end of source
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Moves the read position, returns the new position
    fn seek(&mut self, position: i64) -> Result<i64>;

    /// Current read position
    fn position(&self) -> i64;

    /// Total length in bytes
    fn length(&self) -> i64;

    /// Reads until `buf` is full or the source ends
    fn read_fully(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// Seeks to `position`, then reads like [`ByteSource::read_fully`]
    fn read_at(&mut self, position: i64, buf: &mut [u8]) -> Result<usize> {
        self.seek(position)?;
        self.read_fully(buf)
    }
}

/// Rounds a byte position down to a packet boundary
pub fn align_position(position: i64) -> i64 {
    let position = position.max(0);
    position - position % TS_PACKET_SIZE as i64
}

/// Transport stream file on disk
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    file: Option<File>,
    position: i64,
    length: i64,
}

impl FileSource {
    /// The file is opened by [`ByteSource::open`]
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
            position: 0,
            length: 0,
        }
    }

    /// Path given at creation
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&mut self) -> Result<&mut File> {
        self.file.as_mut().ok_or_else(|| {
            TsError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "source is not open",
            ))
        })
    }
}

impl ByteSource for FileSource {
    fn open(&mut self) -> Result<()> {
        let file = File::open(&self.path)?;
        self.length = file.metadata()?.len() as i64;
        self.position = 0;
        self.file = Some(file);
        debug!("opened {} ({} bytes)", self.path.display(), self.length);
        Ok(())
    }

    fn close(&mut self) {
        self.file = None;
        self.position = 0;
        self.length = 0;
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.file()?.read(buf)?;
        self.position += n as i64;
        Ok(n)
    }

    fn seek(&mut self, position: i64) -> Result<i64> {
        let position = position.max(0) as u64;
        let new_position = self.file()?.seek(SeekFrom::Start(position))? as i64;
        self.position = new_position;
        Ok(new_position)
    }

    fn position(&self) -> i64 {
        self.position
    }

    fn length(&self) -> i64 {
        self.length
    }
}

/// In-memory source, mostly for tests and recorded buffers
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
    position: i64,
    open: bool,
}

impl MemorySource {
    /// Creates an empty instance
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            position: 0,
            open: false,
        }
    }
}

impl ByteSource for MemorySource {
    fn open(&mut self) -> Result<()> {
        self.open = true;
        self.position = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
        self.position = 0;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let start = (self.position as usize).min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.position += n as i64;
        Ok(n)
    }

    fn seek(&mut self, position: i64) -> Result<i64> {
        self.position = position.clamp(0, self.data.len() as i64);
        Ok(self.position)
    }

    fn position(&self) -> i64 {
        self.position
    }

    fn length(&self) -> i64 {
        self.data.len() as i64
    }
}

/// Byte source with a pcr timeline, allowing time based positioning.
///
/// The timeline is built by [`SeekableSource::update_timeline`] and dropped on
/// close. Until it exists, or when the analysis failed, the source falls back
/// to byte-only positioning: times are unknown and the end is the source length.
#[derive(Debug)]
pub struct SeekableSource<S: ByteSource> {
    source: S,
    analyzer: PcrTimelineAnalyzer,
    seekable: bool,
}

impl<S: ByteSource> SeekableSource<S> {
    /// Wraps `source` with the process-wide analyzer budgets
    pub fn new(source: S) -> Self {
        Self {
            source,
            analyzer: PcrTimelineAnalyzer::new(),
            seekable: false,
        }
    }

    /// Same as `new` with explicit settings
    pub fn with_config(source: S, config: AnalyzerConfig) -> Self {
        Self {
            source,
            analyzer: PcrTimelineAnalyzer::with_config(config),
            seekable: false,
        }
    }

    /// Locks the pid the analyzer takes pcrs from
    pub fn set_pcr_pid(&mut self, pid: Option<u16>) {
        self.analyzer.set_pcr_pid(pid);
    }

    /// Scans the whole source and builds the timeline. Blocking.
    pub fn update_timeline(&mut self) -> bool {
        self.seekable = self.analyzer.update_timeline(&mut self.source);
        self.seekable
    }

    /// True if the last analysis built a timeline
    pub fn is_seekable(&self) -> bool {
        self.seekable
    }

    /// Chunks of the timeline, empty without one
    pub fn chunks(&self) -> &[TimelineChunk] {
        self.analyzer.chunks()
    }

    /// The timeline always starts at byte 0
    pub fn start_position_bytes(&self) -> i64 {
        0
    }

    /// Last pcr position, or the source length without a timeline
    pub fn end_position_bytes(&self) -> i64 {
        if self.seekable {
            self.analyzer.end_position_bytes()
        } else {
            self.source.length()
        }
    }

    /// 0 with a timeline, `None` without one
    pub fn start_position_us(&self) -> Option<i64> {
        self.seekable.then(|| self.analyzer.start_position_us())
    }

    /// Duration of the timeline, `None` without one
    pub fn end_position_us(&self) -> Option<i64> {
        self.seekable.then(|| self.analyzer.end_position_us())
    }

    /// Byte position of `time_us`; fails with [`TsError::NotSeekable`] without a timeline
    pub fn position_for_time(&mut self, time_us: i64) -> Result<i64> {
        if !self.seekable {
            return Err(TsError::NotSeekable);
        }
        self.analyzer.position_for_time(&mut self.source, time_us)
    }

    /// Time of a byte position on the source timeline, `None` when unknown
    pub fn time_for_position(&mut self, position: i64) -> Option<i64> {
        if !self.seekable {
            return None;
        }
        match self.analyzer.time_for_position(&mut self.source, position) {
            Ok(time_us) => Some(time_us),
            Err(e) => {
                warn!("can't get time of position {}: {}", position, e);
                None
            }
        }
    }

    /// Moves the read position to the packet closest to `time_us`
    pub fn seek_to_time(&mut self, time_us: i64) -> Result<i64> {
        let position = self.position_for_time(time_us)?;
        self.source.seek(align_position(position))
    }

    /// Wrapped source
    pub fn inner(&self) -> &S {
        &self.source
    }

    /// Mutable access to the wrapped source
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Unwraps the source
    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: ByteSource> ByteSource for SeekableSource<S> {
    fn open(&mut self) -> Result<()> {
        self.seekable = false;
        self.analyzer.reset();
        self.source.open()
    }

    fn close(&mut self) {
        self.seekable = false;
        self.analyzer.reset();
        self.source.close();
    }

    fn is_open(&self) -> bool {
        self.source.is_open()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.source.read(buf)
    }

    fn seek(&mut self, position: i64) -> Result<i64> {
        self.source.seek(position)
    }

    fn position(&self) -> i64 {
        self.source.position()
    }

    fn length(&self) -> i64 {
        self.source.length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_memory_source_reads() {
        let mut source = MemorySource::new((0u8..=255).collect::<Vec<u8>>());
        source.open().unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(source.read_at(250, &mut buf).unwrap(), 6);
        assert_eq!(&buf[..6], &[250, 251, 252, 253, 254, 255]);
        assert_eq!(source.position(), 256);
        assert_eq!(source.read(&mut buf).unwrap(), 0);
        assert_eq!(source.seek(-5).unwrap(), 0);
    }

    #[test]
    fn test_file_source_reads() {
        let path = std::env::temp_dir().join(format!("tsio_source_{}.ts", std::process::id()));
        {
            let mut file = File::create(&path).unwrap();
            file.write_all(&[0x47; 376]).unwrap();
        }

        let mut source = FileSource::new(&path);
        assert!(source.read(&mut [0u8; 4]).is_err());
        source.open().unwrap();
        assert_eq!(source.length(), 376);
        let mut buf = vec![0u8; 400];
        assert_eq!(source.read_at(188, &mut buf).unwrap(), 188);
        assert_eq!(source.position(), 376);
        source.close();
        assert!(!source.is_open());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_byte_only_fallback() {
        let mut source = SeekableSource::new(MemorySource::new(vec![0u8; 188 * 4]));
        source.open().unwrap();
        assert!(!source.update_timeline());
        assert!(!source.is_seekable());
        assert_eq!(source.end_position_bytes(), 188 * 4);
        assert_eq!(source.end_position_us(), None);
        assert_eq!(source.time_for_position(188), None);
        assert!(matches!(source.position_for_time(0), Err(TsError::NotSeekable)));
    }

    #[test]
    fn test_align_position() {
        assert_eq!(align_position(0), 0);
        assert_eq!(align_position(187), 0);
        assert_eq!(align_position(189), 188);
        assert_eq!(align_position(-3), 0);
    }
}
