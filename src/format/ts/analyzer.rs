use super::adjuster::{delta_timestamp, plus};
use super::packet::PacketView;
use super::source::{align_position, ByteSource};
use super::timeline::{TimelineChunk, TimestampPoint};
use super::types::*;
use crate::config::{self, AnalyzerConfig};
use crate::error::{Result, TsError};
use log::{debug, info, warn};
use std::time::{Duration, Instant};

/// Packets read per scan step. At least one pcr every 100 ms means ~1600
/// packets for a 25 Mb/s stream and ~70 for a 1 Mb/s one.
const PACKETS_PER_READ: usize = 1000;

/// Largest acceptable time error of a position lookup
const POSITION_TOLERANCE_US: i64 = 500_000;

/// Byte rate ratios outside this range flag a discontinuity
const MIN_BYTE_RATE_RATIO: f64 = 0.1;
const MAX_BYTE_RATE_RATIO: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// Wall clock budget of one analyzer operation
#[derive(Debug, Clone, Copy)]
struct Deadline {
    operation: &'static str,
    started: Instant,
    limit: Duration,
}

impl Deadline {
    fn start(operation: &'static str, limit: Duration) -> Self {
        Self {
            operation,
            started: Instant::now(),
            limit,
        }
    }

    fn check(&self) -> Result<()> {
        let elapsed = self.started.elapsed();
        if elapsed > self.limit {
            return Err(TsError::Timeout {
                operation: self.operation,
                elapsed_ms: elapsed.as_millis(),
                limit_ms: self.limit.as_millis() as u64,
            });
        }
        Ok(())
    }
}

/// Builds the pcr timeline of a byte source: the ordered list of its
/// pcr-continuous chunks, and answers position/time queries against it.
///
/// The analysis reads the source synchronously and may take up to the
/// configured budgets; run it away from latency sensitive paths. Every scan
/// puts the source position back where it found it.
#[derive(Debug)]
pub struct PcrTimelineAnalyzer {
    config: AnalyzerConfig,
    estimated_byte_rate: i64,
    pcr_pid: Option<u16>,
    pcr_start: TimestampPoint,
    pcr_end: TimestampPoint,
    chunks: Vec<TimelineChunk>,
    read_buffer: Vec<u8>,
}

impl Default for PcrTimelineAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl PcrTimelineAnalyzer {
    /// Analyzer with the process-wide budgets
    pub fn new() -> Self {
        Self::with_config(config::analyzer_config())
    }

    /// Same as `new` with explicit settings
    pub fn with_config(config: AnalyzerConfig) -> Self {
        Self {
            config,
            estimated_byte_rate: 0,
            pcr_pid: None,
            pcr_start: TimestampPoint::INVALID,
            pcr_end: TimestampPoint::INVALID,
            chunks: Vec::new(),
            read_buffer: vec![0; PACKETS_PER_READ * TS_PACKET_SIZE],
        }
    }

    /// Restricts pcr lookups to one pid. Without it the pid of the first pcr
    /// found is used from then on.
    pub fn set_pcr_pid(&mut self, pid: Option<u16>) {
        self.pcr_pid = pid;
    }

    /// Pid pcrs are taken from, `None` for any pid
    pub fn pcr_pid(&self) -> Option<u16> {
        self.pcr_pid
    }

    /// Forgets the timeline. A pid locked by a previous analysis is kept.
    pub fn reset(&mut self) {
        self.chunks.clear();
        self.pcr_start.reset();
        self.pcr_end.reset();
        self.estimated_byte_rate = 0;
    }

    /// Chunks in source order
    pub fn chunks(&self) -> &[TimelineChunk] {
        &self.chunks
    }

    /// Bytes per second measured by the last analysis
    pub fn estimated_byte_rate(&self) -> i64 {
        self.estimated_byte_rate
    }

    /// The timeline always starts at 0
    pub fn start_position_us(&self) -> i64 {
        0
    }

    /// The timeline always starts at byte 0
    pub fn start_position_bytes(&self) -> i64 {
        0
    }

    /// Sum of the chunk durations
    pub fn end_position_us(&self) -> i64 {
        self.chunks.last().map_or(0, |chunk| chunk.end_time_us())
    }

    /// Position of the last pcr found
    pub fn end_position_bytes(&self) -> i64 {
        self.chunks.last().map_or(0, |chunk| chunk.end_point.position)
    }

    /// Scans `source` and rebuilds the chunk list.
    ///
    /// Returns false when no timeline could be built, in which case the source
    /// must be treated as not seekable.
    pub fn update_timeline<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> bool {
        self.reset();
        match self.analyze(source) {
            Ok(()) => {
                self.dump_chunks();
                true
            }
            Err(e) => {
                warn!("can't analyze source: {}", e);
                self.reset();
                false
            }
        }
    }

    fn analyze<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> Result<()> {
        let deadline = Deadline::start("estimate byte rate", self.config.general_timeout);

        self.pcr_start = self.find_pcr(source, 0, Direction::Forward, &deadline)?;

        let mut first = self.pcr_start;
        let mut current = first;
        let elapsed_us = loop {
            deadline.check()?;
            let pcr = self.find_pcr(
                source,
                current.position + TS_PACKET_SIZE as i64,
                Direction::Forward,
                &deadline,
            )?;

            let delta_us = delta_timestamp(pcr.time_us, current.time_us);
            if delta_us <= 0 || delta_us >= PCR_MAX_DELTA_US {
                info!(
                    "pcr jump ({} us) at position {}, restart byte rate estimation",
                    delta_us, pcr.position
                );
                first = pcr;
            }
            current = pcr;

            let elapsed_us = delta_timestamp(current.time_us, first.time_us);
            if elapsed_us >= MICROS_PER_SECOND {
                break elapsed_us;
            }
        };

        self.estimated_byte_rate =
            (current.position - first.position) * MICROS_PER_SECOND / elapsed_us;
        if self.estimated_byte_rate <= 0 {
            return Err(TsError::InvalidData(format!(
                "bad byte rate estimation {}",
                self.estimated_byte_rate
            )));
        }
        debug!("estimated byte rate {} B/s", self.estimated_byte_rate);

        self.pcr_end = self.find_pcr(source, source.length(), Direction::Backward, &deadline)?;

        self.search_discontinuities(source)
    }

    fn search_discontinuities<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> Result<()> {
        info!("looking for pcr discontinuities");
        let deadline = Deadline::start("search discontinuities", self.config.discontinuity_timeout);

        let mut chunk_start = self.pcr_start;
        let mut segment_start = self.pcr_start;
        let mut chunk_start_time_us = 0;

        while segment_start.position < self.pcr_end.position {
            deadline.check()?;

            let segment_end = self.compute_end_pcr(source, segment_start, &deadline)?;
            if !self.detect_discontinuity(segment_start, segment_end, true) {
                segment_start = segment_end;
                continue;
            }

            match self.search_discontinuity(source, segment_start, segment_end, &deadline)? {
                Some((last_before, first_after)) => {
                    let chunk = TimelineChunk {
                        start_point: chunk_start,
                        end_point: last_before,
                        start_time_us: chunk_start_time_us,
                        duration_us: delta_timestamp(last_before.time_us, chunk_start.time_us),
                    };
                    chunk_start_time_us += chunk.duration_us;
                    self.chunks.push(chunk);

                    segment_start = first_after;
                    chunk_start = first_after;
                }
                None => segment_start = segment_end,
            }
        }

        self.chunks.push(TimelineChunk {
            start_point: chunk_start,
            end_point: self.pcr_end,
            start_time_us: chunk_start_time_us,
            duration_us: delta_timestamp(self.pcr_end.time_us, chunk_start.time_us),
        });

        Ok(())
    }

    /// Last pcr of the segment of `segment_secs` starting at `origin`
    fn compute_end_pcr<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        origin: TimestampPoint,
        deadline: &Deadline,
    ) -> Result<TimestampPoint> {
        let estimated_position = (self.config.segment_secs * self.estimated_byte_rate
            + origin.position)
            .min(self.pcr_end.position + TS_PACKET_SIZE as i64);

        let pcr = self.find_pcr(source, estimated_position, Direction::Backward, deadline)?;
        if pcr.position > origin.position {
            return Ok(pcr);
        }
        // segment shorter than the pcr interval
        self.find_pcr(
            source,
            origin.position + TS_PACKET_SIZE as i64,
            Direction::Forward,
            deadline,
        )
    }

    /// Narrows `[before, after]` by bisection until both ends are consecutive pcrs.
    ///
    /// Returns the pcrs on each side of the break, or `None` if the narrowed
    /// range turns out to be continuous.
    fn search_discontinuity<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        before: TimestampPoint,
        after: TimestampPoint,
        deadline: &Deadline,
    ) -> Result<Option<(TimestampPoint, TimestampPoint)>> {
        let mut before = before;
        let mut after = after;

        loop {
            deadline.check()?;

            let middle = align_position((before.position + after.position) / 2)
                .max(before.position + TS_PACKET_SIZE as i64);
            let mut pcr = self.find_pcr(source, middle, Direction::Forward, deadline)?;
            if pcr.position >= after.position {
                pcr = self.find_pcr(source, after.position, Direction::Backward, deadline)?;
                if pcr.position <= before.position {
                    break;
                }
            }

            if self.detect_discontinuity(before, pcr, false) {
                after = pcr;
            } else {
                before = pcr;
            }
        }

        if self.detect_discontinuity(before, after, false) {
            info!(
                "pcr discontinuity between [{}, {} ms] and [{}, {} ms]",
                before.position,
                before.time_us / 1000,
                after.position,
                after.time_us / 1000
            );
            Ok(Some((before, after)))
        } else {
            debug!(
                "no discontinuity left between {} and {}",
                before.position, after.position
            );
            Ok(None)
        }
    }

    fn detect_discontinuity(&self, first: TimestampPoint, last: TimestampPoint, dump: bool) -> bool {
        let delta_time_us = delta_timestamp(last.time_us, first.time_us);
        let delta_position = last.position - first.position;
        let byte_rate = if delta_time_us != 0 {
            delta_position * MICROS_PER_SECOND / delta_time_us.abs()
        } else {
            0
        };
        let ratio = byte_rate as f64 / self.estimated_byte_rate as f64;

        let detected = delta_time_us <= 0
            || !(MIN_BYTE_RATE_RATIO..=MAX_BYTE_RATE_RATIO).contains(&ratio);
        if detected && dump {
            info!(
                "pos[{}, {}] delta:{} us, byte rate:{} (vs {})",
                first.position, last.position, delta_time_us, byte_rate, self.estimated_byte_rate
            );
        }
        detected
    }

    /// Byte position of `time_us`, a time on the source timeline
    pub fn position_for_time<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        time_us: i64,
    ) -> Result<i64> {
        let chunk = match self.chunk_with_time(time_us) {
            Some(chunk) => *chunk,
            None => {
                let last = self.chunks.last().ok_or(TsError::NotSeekable)?;
                return Ok(last.end_point.position);
            }
        };
        let delta_in_chunk_us = (time_us - chunk.start_time_us).max(0);
        self.position_in_chunk(source, &chunk, delta_in_chunk_us)
    }

    fn position_in_chunk<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        chunk: &TimelineChunk,
        delta_in_chunk_us: i64,
    ) -> Result<i64> {
        let deadline = Deadline::start("search position", self.config.position_timeout);

        let target_us = plus(chunk.start_point.time_us, delta_in_chunk_us);
        let mut first = chunk.start_point;
        let mut last = chunk.end_point;

        loop {
            deadline.check()?;

            let span_us = delta_timestamp(last.time_us, first.time_us);
            if span_us <= 0 {
                return Ok(first.position);
            }
            let ratio = delta_timestamp(target_us, first.time_us) as f64 / span_us as f64;
            let position = ((last.position - first.position) as f64 * ratio) as i64 + first.position;

            let pcr = match self.find_pcr(source, position, Direction::Forward, &deadline) {
                Ok(pcr) => pcr,
                Err(TsError::PcrNotFound(_)) => return Ok(position),
                Err(e) => {
                    warn!(
                        "chunk[{},{} ms {},{} ms], local position:{} ms, search[{},{} ms - {},{} ms]: {}",
                        chunk.start_point.position,
                        chunk.start_point.time_us / 1000,
                        chunk.end_point.position,
                        chunk.end_point.time_us / 1000,
                        delta_in_chunk_us / 1000,
                        first.position,
                        first.time_us / 1000,
                        last.position,
                        last.time_us / 1000,
                        e
                    );
                    return Err(e);
                }
            };

            let residual_us = delta_timestamp(pcr.time_us, target_us);
            if residual_us.abs() <= POSITION_TOLERANCE_US || pcr == first || pcr == last {
                return Ok(position);
            }
            if residual_us < 0 {
                first = pcr;
            } else {
                last = pcr;
            }
        }
    }

    /// Time on the source timeline of the first pcr at or after `position`,
    /// clamped to the chunk holding it
    pub fn time_for_position<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        position: i64,
    ) -> Result<i64> {
        let chunk = *self.chunk_with_position(position).ok_or(TsError::NotSeekable)?;

        let pcr = if position >= chunk.end_point.position {
            chunk.end_point
        } else if position <= chunk.start_point.position {
            chunk.start_point
        } else {
            let deadline = Deadline::start("search pcr", self.config.pcr_timeout);
            self.find_pcr(source, position, Direction::Forward, &deadline)?
        };

        Ok(delta_timestamp(pcr.time_us, chunk.start_point.time_us) + chunk.start_time_us)
    }

    fn chunk_with_time(&self, time_us: i64) -> Option<&TimelineChunk> {
        self.chunks
            .iter()
            .find(|chunk| time_us < chunk.end_time_us())
    }

    fn chunk_with_position(&self, position: i64) -> Option<&TimelineChunk> {
        self.chunks
            .iter()
            .find(|chunk| position <= chunk.end_point.position)
            .or_else(|| self.chunks.last())
    }

    /// Finds the first pcr at or after `offset` going forward, or the last one
    /// in a packet starting before `offset` going backward.
    fn find_pcr<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        offset: i64,
        direction: Direction,
        deadline: &Deadline,
    ) -> Result<TimestampPoint> {
        let old_position = source.position();
        let result = self.scan_for_pcr(source, align_position(offset), direction, deadline);
        source.seek(old_position)?;
        result
    }

    fn scan_for_pcr<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        offset: i64,
        direction: Direction,
        deadline: &Deadline,
    ) -> Result<TimestampPoint> {
        let length = source.length();
        let step = self.read_buffer.len() as i64;

        match direction {
            Direction::Forward => {
                let mut position = offset;
                while position < length {
                    deadline.check()?;
                    source.seek(position)?;
                    let n = source.read_fully(&mut self.read_buffer)?;
                    if n == 0 {
                        break;
                    }
                    for index in 0..n / TS_PACKET_SIZE {
                        if let Some(time_us) = self.pcr_at(index) {
                            return Ok(TimestampPoint::new(
                                position + (index * TS_PACKET_SIZE) as i64,
                                time_us,
                            ));
                        }
                    }
                    position += step;
                }
            }
            Direction::Backward => {
                let mut end = offset.min(align_position(length));
                while end > 0 {
                    deadline.check()?;
                    let start = (end - step).max(0);
                    source.seek(start)?;
                    let wanted = (end - start) as usize;
                    let n = source.read_fully(&mut self.read_buffer[..wanted])?;
                    for index in (0..n / TS_PACKET_SIZE).rev() {
                        if let Some(time_us) = self.pcr_at(index) {
                            return Ok(TimestampPoint::new(
                                start + (index * TS_PACKET_SIZE) as i64,
                                time_us,
                            ));
                        }
                    }
                    end = start;
                }
            }
        }

        Err(TsError::PcrNotFound(offset))
    }

    /// Pcr time of the packet at `index` in the read buffer, locking the pcr pid
    fn pcr_at(&mut self, index: usize) -> Option<i64> {
        let packet = PacketView::wrap(&self.read_buffer, index * TS_PACKET_SIZE)?;
        if !packet.is_valid() {
            return None;
        }
        let pcr = packet.pcr()?;
        if self.pcr_pid.map_or(false, |pid| pid != packet.pid()) {
            return None;
        }
        self.pcr_pid = Some(packet.pid());
        Some(pts_to_us(pcr))
    }

    fn dump_chunks(&self) {
        info!("nb chunks:{}", self.chunks.len());
        for chunk in &self.chunks {
            info!(
                "    duration:{} ms start[{}, {} ms] end[{}, {} ms]",
                chunk.duration_us / 1000,
                chunk.start_point.position,
                chunk.start_point.time_us / 1000,
                chunk.end_point.position,
                chunk.end_point.time_us / 1000
            );
        }
    }
}
