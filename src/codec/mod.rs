//! Audio elementary stream splitting.
//!
//! A splitter takes the payload of a reassembled PES and cuts it into decoder
//! access units, each with its own timestamp, stored in a [`UnitRing`] that the
//! consumer drains one unit at a time.

pub mod ac3;
/// Unit ring shared by the splitters
pub mod unit;

pub use ac3::Ac3UnitSplitter;
pub use unit::{UnitBlock, UnitRing, MAX_UNIT_BLOCKS, MAX_UNIT_BLOCK_SIZE};

use crate::av::{CodecData, CodecType};
use crate::error::Result;
use crate::format::ts::PesUnit;
use bytes::BytesMut;
use log::warn;

/// Audio format found in the stream headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFormat {
    /// AC-3 or E-AC-3
    pub codec: CodecType,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channels, LFE included
    pub channel_count: u32,
    /// Size of one syncframe in bytes
    pub syncframe_size: usize,
    /// Samples per channel in one syncframe
    pub samples_per_syncframe: u32,
}

impl AudioFormat {
    /// Duration of one syncframe
    pub fn frame_duration_us(&self) -> i64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples_per_syncframe as i64 * 1_000_000 / self.sample_rate as i64
    }

    /// Duration of the whole syncframes held in `buffer_bytes` bytes
    pub fn buffer_duration_us(&self, buffer_bytes: usize) -> i64 {
        if self.syncframe_size == 0 || self.sample_rate == 0 {
            return 0;
        }
        let frames = (buffer_bytes / self.syncframe_size) as i64;
        frames * self.samples_per_syncframe as i64 * 1_000_000 / self.sample_rate as i64
    }

    /// MIME type of the codec
    pub fn mime_type(&self) -> &'static str {
        self.codec.mime_type()
    }
}

impl CodecData for AudioFormat {
    fn codec_type(&self) -> CodecType {
        self.codec
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channel_count(&self) -> u32 {
        self.channel_count
    }

    fn extra_data(&self) -> Option<&[u8]> {
        None
    }
}

/// Splits PES payloads of one audio codec into decoder units.
///
/// Implementors provide the unit storage and the codec specific `parse`; the
/// provided methods handle the fallback and the consumer side. Any error from
/// `parse` turns the whole payload into opaque pass-through units, so a PES
/// always reaches the decoder in some form.
pub trait AudioUnitSplitter {
    /// Ring holding the split units
    fn units(&self) -> &UnitRing;

    /// Mutable access to the ring
    fn units_mut(&mut self) -> &mut UnitRing;

    /// Cuts `payload` into units. The PES timestamp is already stored in the ring.
    fn parse(&mut self, payload: &[u8]) -> Result<()>;

    /// Last format found in the stream, `None` until a header was parsed
    fn media_format(&self) -> Option<&AudioFormat>;

    /// Splits the payload of a complete PES, then releases it for the next unit.
    ///
    /// Returns false if the payload went through the pass-through fallback.
    fn set_pes(&mut self, pes: &mut PesUnit, timestamp_us: i64) -> bool {
        let parsed = self.set_payload(pes.payload(), timestamp_us);
        pes.release();
        parsed
    }

    /// Same as [`AudioUnitSplitter::set_pes`] for a bare PES payload
    fn set_payload(&mut self, payload: &[u8], timestamp_us: i64) -> bool {
        self.units_mut().set_pes_timestamp_us(timestamp_us);
        match self.parse(payload) {
            Ok(()) => true,
            Err(e) => {
                warn!("unsupported feature: {}, payload passed through", e);
                let units = self.units_mut();
                units.discard();
                if let Err(e) = units.push_unit(payload, None) {
                    warn!("pass-through failed: {}", e);
                }
                false
            }
        }
    }

    /// True if a complete unit can be taken
    fn has_audio_buffer(&self) -> bool {
        self.units().has_unit()
    }

    /// Replaces the content of `sink` with the current unit, returns its length
    fn audio_buffer_data(&self, sink: &mut BytesMut) -> usize {
        sink.clear();
        match self.units().current() {
            Some(unit) => {
                sink.extend_from_slice(unit.data());
                unit.data().len()
            }
            None => 0,
        }
    }

    /// Timestamp of the current unit, the PES timestamp for units without
    /// their own, 0 when there is no unit
    fn audio_buffer_timestamp_us(&self) -> i64 {
        let units = self.units();
        match units.current() {
            Some(unit) => unit.timestamp_us().unwrap_or(units.pes_timestamp_us()),
            None => 0,
        }
    }

    /// Releases the current unit, returns true if another one is available
    fn move_to_next(&mut self) -> bool {
        self.units_mut().advance()
    }

    /// Drops every pending unit
    fn reset(&mut self) {
        self.units_mut().discard();
    }
}
