//! Stream-independent audio/video types handed to decoders.

/// Codecs the demuxer produces units for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecType {
    /// Dolby Digital, ATSC A/52
    Ac3,
    /// Dolby Digital Plus, ETSI TS 102 366 Annex E
    Eac3,
}

impl CodecType {
    /// MIME type of the codec
    pub fn mime_type(&self) -> &'static str {
        match self {
            CodecType::Ac3 => "audio/ac3",
            CodecType::Eac3 => "audio/eac3",
        }
    }
}

/// Decoder configuration of one elementary stream
pub trait CodecData: Send + Sync {
    /// Codec of the stream
    fn codec_type(&self) -> CodecType;
    /// Sample rate in Hz
    fn sample_rate(&self) -> u32;
    /// Number of channels, LFE included
    fn channel_count(&self) -> u32;
    /// Codec specific configuration bytes, if any
    fn extra_data(&self) -> Option<&[u8]>;
}

mod packet;
pub use packet::*;
