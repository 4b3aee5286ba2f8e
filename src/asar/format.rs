#![forbid(unsafe_code)]

use crate::asar::error::{AsarError, AsarResult};
use crate::asar::io::read_u32;

/// Value of the `magic` header field.
pub const MAGIC: u32 = 4;

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 16;

/// Public view of one file entry (for listing and inspection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub path: String,
    /// Offset relative to the data section.
    pub offset: u64,
    pub size: u64,
}

/// Archive header.
///
/// Layout (16 bytes, little-endian):
/// ```text
/// Offset  Size  Field
/// 0       4     magic      (= 4)
/// 4       4     unk1       (= unk2 + 4)
/// 8       4     unk2       (= json_size + padding + 4)
/// 12      4     json_size  (exact length of the JSON index)
/// 16      ..    JSON index, then 1..=4 zero bytes of padding
/// ..      4     zero bytes (the `+ 4` in unk2)
/// 16+unk2 ..    data section
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: u32,
    pub unk1: u32,
    pub unk2: u32,
    pub json_size: u32,
}

/// Number of zero bytes written after an index of `json_size` bytes.
///
/// Always 1..=4 and brings `json_size + padding` to a multiple of 4; an already
/// aligned index still gets a full 4 bytes.
pub fn padding_for(json_size: u32) -> u32 {
    4 - json_size % 4
}

impl Header {
    /// Header for an index of `json_size` bytes. This is the only place header
    /// fields are derived from each other.
    pub fn for_json_len(json_size: usize) -> AsarResult<Self> {
        let json_size = u32::try_from(json_size)
            .map_err(|_| AsarError::Format(format!("index too large: {json_size} bytes")))?;
        let unk2 = json_size
            .checked_add(padding_for(json_size) + 4)
            .ok_or_else(|| AsarError::Format("index too large for header".into()))?;
        let unk1 = unk2
            .checked_add(4)
            .ok_or_else(|| AsarError::Format("index too large for header".into()))?;
        Ok(Self {
            magic: MAGIC,
            unk1,
            unk2,
            json_size,
        })
    }

    pub fn padding(&self) -> u32 {
        padding_for(self.json_size)
    }

    /// Absolute archive offset of the data section.
    pub fn data_offset(&self) -> u64 {
        HEADER_SIZE as u64 + u64::from(self.unk2)
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..8].copy_from_slice(&self.unk1.to_le_bytes());
        buf[8..12].copy_from_slice(&self.unk2.to_le_bytes());
        buf[12..16].copy_from_slice(&self.json_size.to_le_bytes());
        buf
    }

    /// Decodes the four header fields. No relationship between them is checked here.
    pub fn from_bytes(bytes: &[u8]) -> AsarResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(AsarError::Format(format!(
                "header too short: {} of {HEADER_SIZE} bytes",
                bytes.len()
            )));
        }
        let mut cur = &bytes[..HEADER_SIZE];
        Ok(Self {
            magic: read_u32(&mut cur)?,
            unk1: read_u32(&mut cur)?,
            unk2: read_u32(&mut cur)?,
            json_size: read_u32(&mut cur)?,
        })
    }

    /// Checks the relationships the writer guarantees. The reader itself only
    /// requires the magic; this is used by `verify`.
    pub fn check_consistency(&self) -> AsarResult<()> {
        if self.magic != MAGIC {
            return Err(AsarError::BadMagic(self.magic));
        }
        let expected_unk2 = u64::from(self.json_size) + u64::from(self.padding()) + 4;
        if u64::from(self.unk2) != expected_unk2 {
            return Err(AsarError::Format(format!(
                "unk2 is {}, expected {expected_unk2}",
                self.unk2
            )));
        }
        if u64::from(self.unk1) != u64::from(self.unk2) + 4 {
            return Err(AsarError::Format(format!(
                "unk1 is {}, expected {}",
                self.unk1,
                u64::from(self.unk2) + 4
            )));
        }
        Ok(())
    }
}
