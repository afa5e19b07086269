//! AC-3 and E-AC-3 syncframe headers.
//!
//! Ref: ATSC A/52:2012 and ETSI TS 102 366 Annex E

use crate::av::CodecType;
use crate::error::{Result, TsError};
use crate::utils::BitReader;

/// Syncword opening every syncframe
pub const AC3_SYNC_WORD: u16 = 0x0B77;

/// Bytes needed to decode the header fields used here
pub const XAC3_MIN_HEADER_SIZE: usize = 7;

/// New samples per audio block (ETSI TS 102 366 section 4.1)
pub const SAMPLES_PER_AUDIO_BLOCK: u32 = 256;

/// Sample rates indexed by fscod (A/52 table 5.6)
const SAMPLE_RATE_BY_FSCOD: [u32; 3] = [48000, 44100, 32000];

/// Sample rates indexed by fscod2 (Annex E table E2.3)
const SAMPLE_RATE_BY_FSCOD2: [u32; 3] = [24000, 22050, 16000];

/// Channel counts indexed by acmod, LFE excluded (A/52 table 5.8)
const CHANNEL_COUNT_BY_ACMOD: [u32; 8] = [2, 1, 2, 3, 3, 4, 4, 5];

/// Blocks per syncframe indexed by numblkscod (Annex E table E2.4)
const BLOCKS_PER_SYNCFRAME: [u32; 4] = [1, 2, 3, 6];

// Syncframe sizes in 16-bit words, indexed by frmsizecod (A/52 table 5.18)
const FRAME_SIZE_BY_CODE_32KHZ: [u16; 38] = [
    96, 96, 120, 120, 144, 144, 168, 168, 192, 192, 240, 240, 288, 288, 336, 336, 384, 384, 480,
    480, 576, 576, 672, 672, 768, 768, 960, 960, 1152, 1152, 1344, 1344, 1536, 1536, 1728, 1728,
    1920, 1920,
];
const FRAME_SIZE_BY_CODE_44_1KHZ: [u16; 38] = [
    69, 70, 87, 88, 104, 105, 121, 122, 139, 140, 174, 175, 208, 209, 243, 244, 278, 279, 348,
    349, 417, 418, 487, 488, 557, 558, 696, 697, 835, 836, 975, 976, 1114, 1115, 1253, 1254, 1393,
    1394,
];
const FRAME_SIZE_BY_CODE_48KHZ: [u16; 38] = [
    64, 64, 80, 80, 96, 96, 112, 112, 128, 128, 160, 160, 192, 192, 224, 224, 256, 256, 320, 320,
    384, 384, 448, 448, 512, 512, 640, 640, 768, 768, 896, 896, 1024, 1024, 1152, 1152, 1280, 1280,
];

/// Fields of a syncframe header needed to split and describe the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFrameHeader {
    /// AC-3 or E-AC-3, from the bsid
    pub codec: CodecType,
    /// Bit stream identification
    pub bsid: u8,
    /// E-AC-3 strmtyp, 0 for AC-3
    pub stream_type: u8,
    /// E-AC-3 substreamid, 0 for AC-3
    pub substream_id: u8,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channels from acmod, LFE included
    pub channel_count: u32,
    /// Low frequency effects channel present
    pub lfe_on: bool,
    /// Syncframe size in bytes
    pub frame_size: usize,
    /// 256 samples per audio block
    pub samples_per_syncframe: u32,
}

impl SyncFrameHeader {
    /// Decodes the header at the start of `data`, which must begin with the syncword.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < XAC3_MIN_HEADER_SIZE {
            return Err(TsError::Parser("syncframe header too short".into()));
        }
        if u16::from_be_bytes([data[0], data[1]]) != AC3_SYNC_WORD {
            return Err(TsError::Parser("missing ac-3 syncword".into()));
        }

        // bsid follows the 40-bit syncinfo of AC-3, same offset in E-AC-3
        let mut reader = BitReader::new(data);
        reader.skip_bits(40)?;
        let bsid = reader.read_bits(5)? as u8;

        if bsid > 10 && bsid <= 16 {
            Self::parse_eac3(data, bsid)
        } else {
            Self::parse_ac3(data, bsid)
        }
    }

    fn parse_ac3(data: &[u8], bsid: u8) -> Result<Self> {
        let mut reader = BitReader::new(data);

        // syncinfo, A/52 section 5.4.1
        reader.skip_bits(16)?; // syncword
        reader.skip_bits(16)?; // crc1
        let fscod = reader.read_bits(2)? as usize;
        let frmsizecod = reader.read_bits(6)? as usize;

        // bsi, A/52 section 5.4.2
        reader.skip_bits(5)?; // bsid
        reader.skip_bits(3)?; // bsmod
        let acmod = reader.read_bits(3)? as usize;
        if (acmod & 0x01) != 0 && acmod != 1 {
            reader.skip_bits(2)?; // cmixlev
        }
        if (acmod & 0x04) != 0 {
            reader.skip_bits(2)?; // surmixlev
        }
        if acmod == 2 {
            reader.skip_bits(2)?; // dsurmod
        }
        let lfe_on = reader.read_bool()?;

        let sample_rate = *SAMPLE_RATE_BY_FSCOD
            .get(fscod)
            .ok_or_else(|| TsError::UnsupportedFeature(format!("invalid fscod: {}", fscod)))?;

        let frame_sizes = match sample_rate {
            32000 => &FRAME_SIZE_BY_CODE_32KHZ,
            44100 => &FRAME_SIZE_BY_CODE_44_1KHZ,
            _ => &FRAME_SIZE_BY_CODE_48KHZ,
        };
        let frame_size = *frame_sizes.get(frmsizecod).ok_or_else(|| {
            TsError::UnsupportedFeature(format!("invalid frmsizecod: {}", frmsizecod))
        })? as usize
            * 2;

        Ok(Self {
            codec: CodecType::Ac3,
            bsid,
            stream_type: 0,
            substream_id: 0,
            sample_rate,
            channel_count: CHANNEL_COUNT_BY_ACMOD[acmod] + lfe_on as u32,
            lfe_on,
            frame_size,
            samples_per_syncframe: SAMPLES_PER_AUDIO_BLOCK * 6,
        })
    }

    fn parse_eac3(data: &[u8], bsid: u8) -> Result<Self> {
        let mut reader = BitReader::new(data);

        // syncinfo, Annex E section 2.2.1
        reader.skip_bits(16)?; // syncword

        // bsi, Annex E section 2.2.2
        let stream_type = reader.read_bits(2)? as u8;
        let substream_id = reader.read_bits(3)? as u8;
        let frmsiz = reader.read_bits(11)? as usize;
        let fscod = reader.read_bits(2)? as usize;
        let (sample_rate, numblkscod) = if fscod == 0x03 {
            let fscod2 = reader.read_bits(2)? as usize;
            let sample_rate = *SAMPLE_RATE_BY_FSCOD2.get(fscod2).ok_or_else(|| {
                TsError::UnsupportedFeature(format!("invalid fscod2: {}", fscod2))
            })?;
            (sample_rate, 3)
        } else {
            (SAMPLE_RATE_BY_FSCOD[fscod], reader.read_bits(2)? as usize)
        };
        let acmod = reader.read_bits(3)? as usize;
        let lfe_on = reader.read_bool()?;

        Ok(Self {
            codec: CodecType::Eac3,
            bsid,
            stream_type,
            substream_id,
            sample_rate,
            channel_count: CHANNEL_COUNT_BY_ACMOD[acmod] + lfe_on as u32,
            lfe_on,
            frame_size: 2 * (frmsiz + 1),
            samples_per_syncframe: SAMPLES_PER_AUDIO_BLOCK * BLOCKS_PER_SYNCFRAME[numblkscod],
        })
    }

    /// True for AC-3 frames and independent E-AC-3 substream 0
    pub fn is_primary(&self) -> bool {
        self.substream_id == 0 && (self.stream_type == 0 || self.stream_type == 2)
    }

    /// Duration of one syncframe
    pub fn frame_duration_us(&self) -> i64 {
        self.samples_per_syncframe as i64 * 1_000_000 / self.sample_rate as i64
    }
}
