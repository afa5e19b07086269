use crate::error::Result;
use bytes::BytesMut;
use parking_lot::Mutex;
use std::mem;

/// Tuner audio type of the main program audio
pub const AUDIO_TYPE_MAIN: u8 = 0;
/// Tuner audio type of a supplementary (e.g. audio description) track
pub const AUDIO_TYPE_SUPPLEMENTARY: u8 = 1;

/// Mix placement values
pub const PLACEMENT_NORMAL: u8 = 0;
/// Mix on the right side
pub const PLACEMENT_RIGHT: u8 = 1;
/// Mix on the left side
pub const PLACEMENT_LEFT: u8 = 2;

/// Provenance of a payload unit, attached to it for the downstream decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Metadata {
    /// Tuner filter the unit comes from
    Tuner {
        /// [`AUDIO_TYPE_MAIN`] or [`AUDIO_TYPE_SUPPLEMENTARY`]
        audio_type: u8,
        /// Encoding the tuner reports for the stream
        encoding_type: u32,
        /// Tuner filter identifier
        filter_id: u32,
    },
    /// Where the decoder mixes the unit
    Placement {
        /// One of the `PLACEMENT_*` values
        placement: u8,
    },
}

/// Metadata waiting to be attached to the next encapsulation packet.
///
/// At most one entry per kind is kept: writing a tuner entry replaces the
/// pending tuner entry. Producers are on the control side while the ingest
/// side drains, hence the lock.
#[derive(Debug, Default)]
pub struct MetadataQueue {
    pending: Mutex<Vec<Metadata>>,
}

impl MetadataQueue {
    /// Creates an empty instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `metadata`, replacing a pending entry of the same kind
    pub fn write(&self, metadata: Metadata) {
        let mut pending = self.pending.lock();
        pending.retain(|m| mem::discriminant(m) != mem::discriminant(&metadata));
        pending.push(metadata);
    }

    /// Takes every pending entry
    pub fn drain(&self) -> Vec<Metadata> {
        mem::take(&mut *self.pending.lock())
    }

    /// Writes an encapsulation packet with every pending entry into `buf`.
    ///
    /// `buf` is left empty when nothing is pending. Entries are put back if
    /// the packet can't hold them.
    pub fn encode_packet(&self, buf: &mut BytesMut, length: usize) -> Result<()> {
        let pending = self.drain();
        if let Err(e) = super::encode_packet(buf, &pending, length) {
            for metadata in pending {
                self.write(metadata);
            }
            return Err(e);
        }
        Ok(())
    }

    /// True when nothing was written
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Number of pending entries
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_one_entry_per_kind() {
        let queue = MetadataQueue::new();
        queue.write(Metadata::Placement {
            placement: PLACEMENT_LEFT,
        });
        queue.write(Metadata::Tuner {
            audio_type: AUDIO_TYPE_MAIN,
            encoding_type: 2,
            filter_id: 1,
        });
        queue.write(Metadata::Placement {
            placement: PLACEMENT_RIGHT,
        });
        assert_eq!(queue.len(), 2);

        let drained = queue.drain();
        assert_eq!(
            drained,
            vec![
                Metadata::Tuner {
                    audio_type: AUDIO_TYPE_MAIN,
                    encoding_type: 2,
                    filter_id: 1,
                },
                Metadata::Placement {
                    placement: PLACEMENT_RIGHT,
                },
            ]
        );
        assert!(queue.is_empty());
    }
}
