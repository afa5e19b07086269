#![doc(html_root_url = "https://docs.rs/tsio/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

//! # tsio - MPEG Transport Stream Toolkit
//!
//! `tsio` is the demultiplexing core of a broadcast audio player. It reads a
//! recorded or live transport stream from a byte source and hands
//! timestamped AC-3 / E-AC-3 access units to a decoder, together with the
//! provenance metadata the decoder needs to mix them.
//!
//! ## Features
//!
//! ### Transport Stream
//! - Zero-copy packet accessors (PCR, adaptation field, payload offsets)
//! - PES reassembly with continuity counter checks
//! - PCR timeline analysis: chunked, discontinuity aware, for time seeking
//! - Continuous playback axis across PCR wraps and splices
//!
//! ### Audio
//! - AC-3 and E-AC-3 syncframe header parsing
//! - Syncframe splitting with per-frame timestamps and pass-through fallback
//!
//! ### Encapsulation
//! - Binary framing of tuner and mix placement metadata
//!
//! ## Quick Start
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! tsio = "0.1.0"
//! ```
//!
//! ### Session Example
//!
//! ```rust,no_run
//! use tsio::format::ts::{FileSource, TsDemuxer, TsSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let demuxer = TsDemuxer::new(FileSource::new("recording.ts"), 0x44, Some(0x100));
//!     let session = TsSession::new(demuxer);
//!
//!     if session.open().await? {
//!         session.seek_to_time(30_000_000).await?;
//!     }
//!
//!     while let Some(packet) = session.next_packet().await? {
//!         println!("unit of {} bytes, pts {:?}", packet.data.len(), packet.pts);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - `av`: decoder facing types
//!   - Access unit packets
//!   - Codec descriptions
//!
//! - `codec`: audio unit splitting
//!   - AC-3 / E-AC-3 syncframe headers
//!   - Unit ring buffer
//!
//! - `format`: container handling
//!   - TS packets, PES, PCR timeline, timestamp adjustment
//!   - Demuxer and async session
//!
//! - `encapsulation`: metadata framing for the decoder
//!
//! - `error`: Error handling types and utilities
//!   - Custom error types for different failure scenarios
//!   - Result type alias for convenience
//!
//! - `utils`: Common utilities and helper functions
//!   - Bitstream reading
//!   - Byte arena
//!
/// Audio/Video base types
pub mod av;

/// Audio unit splitters
pub mod codec;

/// Metadata encapsulation for the decoder
pub mod encapsulation;

/// Error types and utilities
pub mod error;

/// Media format implementations
pub mod format;

/// Common utilities and helper functions
pub mod utils;

/// Configuration module
pub mod config;

pub use error::{Result, TsError};
