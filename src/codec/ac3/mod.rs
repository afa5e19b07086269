//! # AC-3 / E-AC-3 Support
//!
//! Syncframe header decoding and PES splitting for Dolby Digital (ATSC A/52)
//! and Dolby Digital Plus (ETSI TS 102 366 Annex E) streams.
//!
//! ```rust
//! use tsio::codec::{Ac3UnitSplitter, AudioUnitSplitter};
//!
//! let mut splitter = Ac3UnitSplitter::new();
//! // one 48 kHz stereo syncframe of 128 bytes
//! let mut frame = vec![0u8; 128];
//! frame[..7].copy_from_slice(&[0x0B, 0x77, 0x00, 0x00, 0x00, 0x40, 0x40]);
//!
//! assert!(splitter.set_payload(&frame, 1_000_000));
//! assert!(splitter.has_audio_buffer());
//! assert_eq!(splitter.audio_buffer_timestamp_us(), 1_000_000);
//! assert_eq!(splitter.media_format().unwrap().sample_rate, 48000);
//! ```

/// PES payload splitting into syncframes
pub mod splitter;

/// Syncframe header fields and tables
pub mod types;

pub use splitter::Ac3UnitSplitter;
pub use types::{SyncFrameHeader, AC3_SYNC_WORD, XAC3_MIN_HEADER_SIZE};
