//! # Utility Functions and Types
//!
//! Common building blocks shared by the parsers of this crate:
//!
//! - Bit-level cursor used by every header decoder
//! - Growable byte arena backing PES reassembly
//!
//! ## Bit Operations
//!
//! ```rust
//! use tsio::utils::BitReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = vec![0b10110011u8];
//! let mut reader = BitReader::new(&data);
//!
//! // Read specific number of bits
//! let value = reader.read_bits(3)?; // Reads first 3 bits (101)
//! assert_eq!(value, 0b101);
//! # Ok(())
//! # }
//! ```
//!
//! ## Byte Arena
//!
//! ```rust
//! use tsio::utils::ByteArena;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut arena = ByteArena::new(188, 64 * 1024);
//! arena.push(&[0x00, 0x00, 0x01])?;
//! assert_eq!(arena.len(), 3);
//! # Ok(())
//! # }
//! ```

/// Bit manipulation and bitstream reading utilities
pub mod bits;

/// Growable byte storage with cursors
pub mod buffer;

// Re-export commonly used types
pub use bits::BitReader;
pub use buffer::ByteArena;
