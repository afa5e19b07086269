use super::adjuster::{plus, TimestampAdjuster};
use super::packet::PacketView;
use super::pes::{PesState, PesUnit};
use super::source::{align_position, ByteSource, SeekableSource};
use super::types::*;
use crate::av::Packet;
use crate::codec::{Ac3UnitSplitter, AudioFormat, AudioUnitSplitter};
use crate::config::{self, AdjusterConfig, AnalyzerConfig};
use crate::encapsulation::MetadataQueue;
use crate::error::Result;
use bytes::BytesMut;
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;

/// Packets fetched from the source per read
const PACKETS_PER_READ: usize = 64;

/// Demultiplexes the audio elementary stream of a transport stream source.
///
/// The audio and pcr pids come from whoever configured the tuner filters.
/// Every yielded [`Packet`] is one decoder unit: an AC-3 or E-AC-3 syncframe,
/// or a whole PES payload when the splitter fell back to pass-through. Its
/// `pts` is on the continuous playback axis built from the pcrs.
///
/// Not internally synchronized, see [`TsSession`](super::TsSession) for the
/// locked wrapper.
#[derive(Debug)]
pub struct TsDemuxer<S: ByteSource> {
    source: SeekableSource<S>,
    audio_pid: u16,
    pcr_pid: Option<u16>,
    pes: PesUnit,
    splitter: Ac3UnitSplitter,
    adjuster: TimestampAdjuster,
    metadata: Arc<MetadataQueue>,

    read_buffer: Vec<u8>,
    read_length: usize,
    read_offset: usize,
    /// Source position of `read_buffer[0]`
    read_position: i64,
    end_of_source: bool,

    /// Position of the packet that started the current PES
    pes_position: i64,
    unit_position: i64,
    unit_is_key: bool,
    unit_has_timestamp: bool,
    next_timestamp_us: Option<i64>,
    unit_buffer: BytesMut,
}

impl<S: ByteSource> TsDemuxer<S> {
    /// Creates a demuxer with the process-wide configuration.
    ///
    /// Without a pcr pid, pcrs are taken from every pid.
    pub fn new(source: S, audio_pid: u16, pcr_pid: Option<u16>) -> Self {
        Self::with_config(
            source,
            audio_pid,
            pcr_pid,
            config::analyzer_config(),
            config::adjuster_config(),
        )
    }

    /// Creates a demuxer with explicit analyzer and adjuster settings
    pub fn with_config(
        source: S,
        audio_pid: u16,
        pcr_pid: Option<u16>,
        analyzer_config: AnalyzerConfig,
        adjuster_config: AdjusterConfig,
    ) -> Self {
        let mut source = SeekableSource::with_config(source, analyzer_config);
        source.set_pcr_pid(pcr_pid);
        Self {
            source,
            audio_pid,
            pcr_pid,
            pes: PesUnit::new(),
            splitter: Ac3UnitSplitter::new(),
            adjuster: TimestampAdjuster::with_config(adjuster_config),
            metadata: Arc::new(MetadataQueue::new()),
            read_buffer: vec![0; PACKETS_PER_READ * TS_PACKET_SIZE],
            read_length: 0,
            read_offset: 0,
            read_position: 0,
            end_of_source: false,
            pes_position: -1,
            unit_position: -1,
            unit_is_key: false,
            unit_has_timestamp: false,
            next_timestamp_us: None,
            unit_buffer: BytesMut::new(),
        }
    }

    /// Pid of the audio elementary stream
    pub fn audio_pid(&self) -> u16 {
        self.audio_pid
    }

    /// Pid pcrs are taken from, `None` for any pid
    pub fn pcr_pid(&self) -> Option<u16> {
        self.pcr_pid
    }

    /// Opens the source and restarts the pipeline at position 0
    pub fn open(&mut self) -> Result<()> {
        self.source.open()?;
        self.reset_pipeline(0);
        info!(
            "source opened, {} bytes, audio pid {}, pcr pid {:?}",
            self.source.length(),
            self.audio_pid,
            self.pcr_pid
        );
        Ok(())
    }

    /// Closes the source, dropping its timeline
    pub fn close(&mut self) {
        self.source.close();
        self.reset_pipeline(0);
    }

    /// Builds the pcr timeline of the source. Blocking, see
    /// [`SeekableSource::update_timeline`].
    pub fn update_timeline(&mut self) -> bool {
        let seekable = self.source.update_timeline();
        if !seekable {
            info!("no timeline, byte positioning only");
        }
        seekable
    }

    /// Source with its timeline
    pub fn source(&self) -> &SeekableSource<S> {
        &self.source
    }

    /// Mutable access to the source
    pub fn source_mut(&mut self) -> &mut SeekableSource<S> {
        &mut self.source
    }

    /// Adjuster fed by the pcrs read so far
    pub fn adjuster(&self) -> &TimestampAdjuster {
        &self.adjuster
    }

    /// Queue whose entries go into the next encapsulation packet
    pub fn metadata_queue(&self) -> Arc<MetadataQueue> {
        Arc::clone(&self.metadata)
    }

    /// Format of the audio stream, known once a syncframe was parsed
    pub fn media_format(&self) -> Option<&AudioFormat> {
        self.splitter.media_format()
    }

    /// Moves to the packet closest to `time_us` and restarts the pipeline
    pub fn seek_to_time(&mut self, time_us: i64) -> Result<i64> {
        let position = self.source.seek_to_time(time_us)?;
        self.reset_pipeline(position);
        debug!("seek to {} ms: position {}", time_us / 1000, position);
        Ok(position)
    }

    /// Moves to the packet boundary at or before `position` and restarts the pipeline
    pub fn seek(&mut self, position: i64) -> Result<i64> {
        let position = self.source.seek(align_position(position))?;
        self.reset_pipeline(position);
        Ok(position)
    }

    fn reset_pipeline(&mut self, position: i64) {
        self.pes.reset();
        self.splitter.reset();
        self.adjuster.reset();
        self.read_length = 0;
        self.read_offset = 0;
        self.read_position = position;
        self.end_of_source = false;
        self.pes_position = -1;
        self.next_timestamp_us = None;
    }

    /// Writes an encapsulation packet with the pending metadata into `buf`,
    /// see [`MetadataQueue::encode_packet`]
    pub fn encapsulation_packet(&self, buf: &mut BytesMut, length: usize) -> Result<()> {
        self.metadata.encode_packet(buf, length)
    }

    /// Returns the next audio unit, `None` at the end of the source
    pub fn read_packet(&mut self) -> Result<Option<Packet>> {
        loop {
            if let Some(packet) = self.take_unit() {
                return Ok(Some(packet));
            }
            if self.read_ts_packet()? {
                continue;
            }
            // last unit of a source may be unbounded
            if self.pes.state() == PesState::Accumulating {
                self.close_pes();
                continue;
            }
            return Ok(None);
        }
    }

    fn take_unit(&mut self) -> Option<Packet> {
        if !self.splitter.has_audio_buffer() {
            return None;
        }

        self.splitter.audio_buffer_data(&mut self.unit_buffer);
        let raw_us = self.splitter.audio_buffer_timestamp_us();
        // pass-through units carry no timestamp of their own
        let syncframe = self
            .splitter
            .units()
            .current()
            .map_or(false, |unit| unit.timestamp_us().is_some());
        self.splitter.move_to_next();

        let mut packet = Packet::new(self.unit_buffer.split().freeze())
            .with_position(self.unit_position)
            .with_key_flag(self.unit_is_key);
        if self.unit_has_timestamp {
            packet = packet
                .with_raw_pts(raw_us)
                .with_pts(self.adjuster.adjust(raw_us));
        }
        if let Some(format) = self.splitter.media_format().filter(|_| syncframe) {
            let duration_us = format.frame_duration_us();
            packet = packet.with_duration(Duration::from_micros(duration_us as u64));
            if self.unit_has_timestamp {
                self.next_timestamp_us = Some(plus(raw_us, duration_us));
            }
        }
        Some(packet)
    }

    /// Handles the next packet of the source, returns false at its end
    fn read_ts_packet(&mut self) -> Result<bool> {
        if self.read_offset + TS_PACKET_SIZE > self.read_length && !self.fill_read_buffer()? {
            return Ok(false);
        }

        let buffer = std::mem::take(&mut self.read_buffer);
        let position = self.read_position + self.read_offset as i64;
        if let Some(packet) = PacketView::wrap(&buffer[..self.read_length], self.read_offset) {
            self.handle_packet(&packet, position);
        }
        self.read_buffer = buffer;
        self.read_offset += TS_PACKET_SIZE;
        Ok(true)
    }

    fn fill_read_buffer(&mut self) -> Result<bool> {
        if self.end_of_source {
            return Ok(false);
        }
        self.read_position += self.read_offset as i64;
        self.read_offset = 0;
        if self.source.position() != self.read_position {
            self.source.seek(self.read_position)?;
        }

        self.read_length = self.source.read_fully(&mut self.read_buffer)?;
        if self.read_length < self.read_buffer.len() {
            self.end_of_source = true;
            if self.read_length % TS_PACKET_SIZE != 0 {
                debug!(
                    "{} trailing bytes at the end of the source",
                    self.read_length % TS_PACKET_SIZE
                );
            }
        }
        Ok(self.read_length >= TS_PACKET_SIZE)
    }

    fn handle_packet(&mut self, packet: &PacketView, position: i64) {
        if !packet.is_valid() {
            debug!("invalid packet at position {}, skipped", position);
            return;
        }

        let pid = packet.pid();
        if self.pcr_pid.map_or(true, |pcr_pid| pcr_pid == pid) {
            if let Some(pcr) = packet.pcr() {
                self.push_pcr(position, pcr);
            }
        }

        if pid != self.audio_pid || !packet.has_payload() {
            return;
        }
        if packet.scrambling_control() != 0 {
            debug!("scrambled packet at position {}, skipped", position);
            return;
        }

        // a repeated counter is a duplicate, not the start of the next unit
        let starts_unit = packet.is_unit_start()
            && self.pes.last_continuity_counter() != Some(packet.continuity_counter());
        if starts_unit {
            if self.pes.state() == PesState::Accumulating {
                self.close_pes();
            }
            self.pes_position = position;
        }
        if self.pes.consume_packet(packet) == PesState::Complete {
            self.process_pes();
        }
    }

    /// Ends the unit in progress when the next one starts or the source ends.
    /// Only an unbounded unit is complete at that point.
    fn close_pes(&mut self) {
        let unbounded = self.pes.parse_header()
            && self.pes.header().map_or(false, |header| header.packet_length == 0);
        if unbounded {
            self.pes.finish();
            self.process_pes();
        } else {
            debug!(
                "pes at {} cut short, {} bytes dropped",
                self.pes_position,
                self.pes.as_bytes().len()
            );
            self.pes.reset();
        }
    }

    fn push_pcr(&mut self, position: i64, pcr: i64) {
        let continued_us = self
            .adjuster
            .has_reference()
            .then(|| self.adjuster.reference_time_us());

        let source = &mut self.source;
        self.adjuster.push_pcr(position, pcr, |p| source.time_for_position(p));
        if !self.adjuster.discontinuity_detected() {
            return;
        }

        // re-anchor on the source timeline, or right after the last pcr
        // before the splice when the source has none
        self.adjuster.reset();
        self.adjuster.push_pcr(position, pcr, |p| {
            source.time_for_position(p).or(continued_us)
        });
        info!(
            "pcr discontinuity at position {}, playback axis resumes at {} ms",
            position,
            self.adjuster.reference_time_us() / 1000
        );
    }

    fn process_pes(&mut self) {
        if !self.pes.parse_header() {
            self.pes.release();
            return;
        }

        let timestamp_us = match self.pes.pts() {
            Some(pts) => Some(pts_to_us(pts)),
            None => self.next_timestamp_us,
        };
        self.unit_position = self.pes_position;
        self.unit_is_key = self.pes.has_random_access_point();
        self.unit_has_timestamp = timestamp_us.is_some();
        debug!(
            "pes at {}: {} bytes, pts {:?}",
            self.pes_position,
            self.pes.payload().len(),
            self.pes.pts()
        );
        self.splitter.set_pes(&mut self.pes, timestamp_us.unwrap_or(0));
    }
}

impl<S: ByteSource> Drop for TsDemuxer<S> {
    fn drop(&mut self) {
        if self.source.is_open() {
            self.source.close();
        }
    }
}
