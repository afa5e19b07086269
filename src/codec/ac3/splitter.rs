use super::types::{SyncFrameHeader, XAC3_MIN_HEADER_SIZE};
use crate::codec::unit::UnitRing;
use crate::codec::{AudioFormat, AudioUnitSplitter};
use crate::error::{Result, TsError};
use crate::format::ts::adjuster::plus;
use log::{debug, info};

/// Splits AC-3 and E-AC-3 PES payloads into syncframes.
///
/// A syncframe may straddle two PES: its bytes are completed from the next
/// payload, and a header cut before [`XAC3_MIN_HEADER_SIZE`] bytes is kept
/// aside and prepended to it.
#[derive(Debug)]
pub struct Ac3UnitSplitter {
    units: UnitRing,
    format: Option<AudioFormat>,
    partial_header: [u8; XAC3_MIN_HEADER_SIZE],
    partial_header_len: usize,
    scratch: Vec<u8>,
}

impl Default for Ac3UnitSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Ac3UnitSplitter {
    /// Creates an empty instance
    pub fn new() -> Self {
        Self {
            units: UnitRing::new(),
            format: None,
            partial_header: [0; XAC3_MIN_HEADER_SIZE],
            partial_header_len: 0,
            scratch: Vec::new(),
        }
    }

    fn split(&mut self, data: &[u8]) -> Result<()> {
        // end of a syncframe started in the previous PES
        let mut position = self.units.fill(data)?;

        let pes_timestamp_us = self.units.pes_timestamp_us();
        let mut index = 0;
        while let Some(marker) = find_sync(data, position) {
            if marker + XAC3_MIN_HEADER_SIZE > data.len() {
                let rest = &data[marker..];
                self.partial_header[..rest.len()].copy_from_slice(rest);
                self.partial_header_len = rest.len();
                break;
            }

            let header = SyncFrameHeader::parse(&data[marker..])?;
            if !header.is_primary() {
                return Err(TsError::UnsupportedFeature(format!(
                    "substream {} of type {}",
                    header.substream_id, header.stream_type
                )));
            }
            self.update_format(&header);

            let timestamp_us = plus(pes_timestamp_us, index * header.frame_duration_us());
            self.units.start_unit(header.frame_size, Some(timestamp_us))?;
            self.units.fill(&data[marker..])?;
            index += 1;

            position = marker + header.frame_size;
        }

        debug!("{} syncframes, {} units pending", index, self.units.pending());
        Ok(())
    }

    fn update_format(&mut self, header: &SyncFrameHeader) {
        let changed = self.format.as_ref().map_or(true, |format| {
            format.sample_rate != header.sample_rate || format.channel_count != header.channel_count
        });
        if !changed {
            return;
        }
        let format = AudioFormat {
            codec: header.codec,
            sample_rate: header.sample_rate,
            channel_count: header.channel_count,
            syncframe_size: header.frame_size,
            samples_per_syncframe: header.samples_per_syncframe,
        };
        info!(
            "audio format: {} {} Hz, {} channels, syncframe {} bytes",
            format.mime_type(),
            format.sample_rate,
            format.channel_count,
            format.syncframe_size
        );
        self.format = Some(format);
    }
}

impl AudioUnitSplitter for Ac3UnitSplitter {
    fn units(&self) -> &UnitRing {
        &self.units
    }

    fn units_mut(&mut self) -> &mut UnitRing {
        &mut self.units
    }

    fn media_format(&self) -> Option<&AudioFormat> {
        self.format.as_ref()
    }

    fn parse(&mut self, payload: &[u8]) -> Result<()> {
        let mut data = std::mem::take(&mut self.scratch);
        data.clear();
        data.extend_from_slice(&self.partial_header[..self.partial_header_len]);
        data.extend_from_slice(payload);
        self.partial_header_len = 0;

        let result = self.split(&data);
        self.scratch = data;
        result
    }

    fn reset(&mut self) {
        self.units.discard();
        self.partial_header_len = 0;
    }
}

/// Position of the next `0x0B77` syncword at or after `from`
fn find_sync(data: &[u8], from: usize) -> Option<usize> {
    if from >= data.len() {
        return None;
    }
    data[from..]
        .windows(2)
        .position(|w| w == [0x0B, 0x77])
        .map(|offset| from + offset)
        .or_else(|| (data.last() == Some(&0x0B)).then(|| data.len() - 1))
}
