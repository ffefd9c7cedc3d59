// Format constants for bsig v2 / v3

use crate::core::error::{BsigError, Result};

pub const MAGIC: &[u8; 4] = b"BSIG";
pub const FOOTER_MAGIC: &[u8; 4] = b"BIN\0";

// File header: MAGIC(4) version(u8) reserved(3)
pub const HEADER_SIZE: usize = 4 + 4; // 8 bytes

// Footer: signal_count(u32) block_size(u32) desc_len(u32) offset_len(u32)
//         internal_version(3) compression(u8) FOOTER_MAGIC(4)
pub const FOOTER_SIZE: usize = 4 * 4 + 3 + 1 + 4; // 24 bytes

// Every compressed block is prefixed with its length as u32
pub const BLOCK_PREFIX_SIZE: usize = 4;

pub const DEFAULT_BLOCK_SIZE: u32 = 4096;
pub const MIN_BLOCK_SIZE: u32 = 1 << 8;
pub const MAX_BLOCK_SIZE: u32 = 1 << 16;

/// On-disk format generation, selects the width of the offset table entries.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatVersion {
    V2 = 2,
    #[default]
    V3 = 3,
}

impl FormatVersion {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            2 => Some(FormatVersion::V2),
            3 => Some(FormatVersion::V3),
            _ => None,
        }
    }

    /// Byte width of one block offset in the offset table.
    pub fn offset_width(self) -> usize {
        match self {
            FormatVersion::V2 => 4,
            FormatVersion::V3 => 8,
        }
    }
}

impl TryFrom<u8> for FormatVersion {
    type Error = BsigError;

    fn try_from(val: u8) -> Result<Self> {
        Self::from_u8(val).ok_or_else(|| {
            BsigError::InvalidConfig(format!("format version must be 2 or 3, got {}", val))
        })
    }
}

// Compression flag stored in the last footer byte before the magic
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    None = 0,
    Zlib = 1,
}

impl CompressionType {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0 => Some(CompressionType::None),
            1 => Some(CompressionType::Zlib),
            _ => None,
        }
    }
}
