//! # Encapsulation
//!
//! Framing that carries provenance [`Metadata`] next to the payload units
//! handed to the decoder. All integers are big-endian.
//!
//! ```text
//! header (10 bytes)      sync:u16 = 0x5555, version:u16 = 3, total_length:u32, flags:u16
//! metadata block         block_length:u32, unit_count:u16        (if flags bit 14)
//!   unit                 type:u16, unit_length:u16, body
//!     tuner (1)          filter_id:u32, encoding_type:u32, audio_type:u8
//!     mix placement      placement:u8
//!     (10002)
//! ```
//!
//! Lengths include their own headers.
//!
//! ```rust
//! use bytes::BytesMut;
//! use tsio::encapsulation::{decode_packet, encode_packet, Metadata};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut buf = BytesMut::new();
//! let tuner = Metadata::Tuner { audio_type: 1, encoding_type: 2, filter_id: 7 };
//! encode_packet(&mut buf, &[tuner.clone()], 64)?;
//! assert_eq!(buf.len(), 64);
//!
//! let packet = decode_packet(&buf)?;
//! assert_eq!(packet.metadata, vec![tuner]);
//! # Ok(())
//! # }
//! ```

mod metadata;

pub use metadata::*;

use crate::error::{Result, TsError};
use bytes::{Buf, BufMut, BytesMut};
use log::debug;

/// First two bytes of every packet
pub const SYNC_BYTES: u16 = 0x5555;
/// Only supported version
pub const VERSION: u16 = 0x0003;
/// Set when a metadata block follows the header
pub const FLAGS_METADATA_PRESENT: u16 = 0x01 << 14;

/// sync, version, total length, flags
pub const HEADER_BYTES: usize = 10;
/// block length, unit count
pub const METADATA_HEADER_BYTES: usize = 6;
/// unit type, unit length
pub const METADATA_UNIT_HEADER_BYTES: usize = 4;

/// Unit type of [`Metadata::Tuner`]
pub const METADATA_TYPE_TUNER: u16 = 1;
/// Unit type of [`Metadata::Placement`]
pub const METADATA_TYPE_MIX_PLACEMENT: u16 = 10002;

/// Encoded size of a tuner unit, unit header included
pub const METADATA_LENGTH_TUNER: usize = METADATA_UNIT_HEADER_BYTES + 9;
/// Encoded size of a placement unit, unit header included
pub const METADATA_LENGTH_MIX_PLACEMENT: usize = METADATA_UNIT_HEADER_BYTES + 1;

/// Decoded encapsulation packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncapsulationPacket {
    /// Format version
    pub version: u16,
    /// Length announced by the header
    pub total_length: u32,
    /// Header flags
    pub flags: u16,
    /// Known units, in wire order
    pub metadata: Vec<Metadata>,
}

impl EncapsulationPacket {
    /// True if the metadata flag is set
    pub fn has_metadata(&self) -> bool {
        self.flags & FLAGS_METADATA_PRESENT != 0
    }
}

/// Writes a header-only packet announcing `length` bytes, with no flag set.
///
/// `buf` ends up `length` bytes long (at least the header), zero filled past
/// the header.
pub fn encode_empty_packet(buf: &mut BytesMut, length: usize) {
    buf.clear();
    write_header(buf, length as u32, 0);
    buf.resize(length.max(HEADER_BYTES), 0);
}

/// Writes a packet carrying `metadata_list`.
///
/// With metadata, `buf` is resized to `length` so the caller can place the
/// unit payload after the encapsulation bytes. Without, `buf` is left empty to
/// signal there is nothing to send this cycle.
pub fn encode_packet(buf: &mut BytesMut, metadata_list: &[Metadata], length: usize) -> Result<()> {
    buf.clear();

    let mut body = BytesMut::new();
    let mut flags = 0;
    let mut total_length = HEADER_BYTES;

    if !metadata_list.is_empty() {
        let mut units = BytesMut::new();
        for metadata in metadata_list {
            write_metadata(&mut units, metadata);
        }
        flags |= FLAGS_METADATA_PRESENT;
        let block_length = METADATA_HEADER_BYTES + units.len();
        body.put_u32(block_length as u32);
        body.put_u16(metadata_list.len() as u16);
        body.extend_from_slice(&units);
        total_length += block_length;
    }

    if flags == 0 {
        return Ok(());
    }

    if total_length > length {
        return Err(TsError::Encapsulation(format!(
            "{} bytes of metadata do not fit in {} bytes",
            total_length, length
        )));
    }

    write_header(buf, total_length as u32, flags);
    buf.extend_from_slice(&body);
    buf.resize(length, 0);
    debug!("encapsulation packet: {} metadata, {} bytes", metadata_list.len(), total_length);
    Ok(())
}

fn write_header(buf: &mut BytesMut, total_length: u32, flags: u16) {
    buf.put_u16(SYNC_BYTES);
    buf.put_u16(VERSION);
    buf.put_u32(total_length);
    buf.put_u16(flags);
}

fn write_metadata(buf: &mut BytesMut, metadata: &Metadata) {
    match metadata {
        Metadata::Tuner {
            audio_type,
            encoding_type,
            filter_id,
        } => {
            buf.put_u16(METADATA_TYPE_TUNER);
            buf.put_u16(METADATA_LENGTH_TUNER as u16);
            buf.put_u32(*filter_id);
            buf.put_u32(*encoding_type);
            buf.put_u8(*audio_type);
        }
        Metadata::Placement { placement } => {
            buf.put_u16(METADATA_TYPE_MIX_PLACEMENT);
            buf.put_u16(METADATA_LENGTH_MIX_PLACEMENT as u16);
            buf.put_u8(*placement);
        }
    }
}

/// Decodes a packet written by [`encode_packet`] or [`encode_empty_packet`].
///
/// Metadata units of unknown type are skipped.
pub fn decode_packet(data: &[u8]) -> Result<EncapsulationPacket> {
    if data.len() < HEADER_BYTES {
        return Err(TsError::Encapsulation(format!(
            "packet too short: {} bytes",
            data.len()
        )));
    }

    let mut reader = data;
    let sync = reader.get_u16();
    if sync != SYNC_BYTES {
        return Err(TsError::Encapsulation(format!("bad sync bytes {:#06x}", sync)));
    }
    let version = reader.get_u16();
    if version != VERSION {
        return Err(TsError::Encapsulation(format!("unsupported version {}", version)));
    }
    let total_length = reader.get_u32();
    let flags = reader.get_u16();

    let mut packet = EncapsulationPacket {
        version,
        total_length,
        flags,
        metadata: Vec::new(),
    };
    if !packet.has_metadata() {
        return Ok(packet);
    }

    if reader.remaining() < METADATA_HEADER_BYTES {
        return Err(TsError::Encapsulation("truncated metadata header".into()));
    }
    let block_length = reader.get_u32() as usize;
    let count = reader.get_u16();
    let units_length = block_length.saturating_sub(METADATA_HEADER_BYTES);
    if reader.remaining() < units_length {
        return Err(TsError::Encapsulation(format!(
            "metadata block of {} bytes, {} available",
            block_length,
            reader.remaining() + METADATA_HEADER_BYTES
        )));
    }
    let mut units = &reader[..units_length];

    for _ in 0..count {
        if units.remaining() < METADATA_UNIT_HEADER_BYTES {
            return Err(TsError::Encapsulation("truncated metadata unit".into()));
        }
        let unit_type = units.get_u16();
        let unit_length = units.get_u16() as usize;
        let body_length = unit_length.saturating_sub(METADATA_UNIT_HEADER_BYTES);
        if units.remaining() < body_length {
            return Err(TsError::Encapsulation(format!(
                "metadata unit {} of {} bytes is truncated",
                unit_type, unit_length
            )));
        }
        let mut body = &units[..body_length];
        units.advance(body_length);

        match unit_type {
            METADATA_TYPE_TUNER if body.len() >= METADATA_LENGTH_TUNER - METADATA_UNIT_HEADER_BYTES => {
                let filter_id = body.get_u32();
                let encoding_type = body.get_u32();
                let audio_type = body.get_u8();
                packet.metadata.push(Metadata::Tuner {
                    audio_type,
                    encoding_type,
                    filter_id,
                });
            }
            METADATA_TYPE_MIX_PLACEMENT if !body.is_empty() => {
                packet.metadata.push(Metadata::Placement {
                    placement: body.get_u8(),
                });
            }
            _ => debug!("skipping metadata unit {} ({} bytes)", unit_type, unit_length),
        }
    }

    Ok(packet)
}
