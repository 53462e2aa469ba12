//! Byte-level helpers shared by the register decoders.
//!
//! Inbound layout: `[module, register | flag, payload...]`. Multi-byte
//! fields are little-endian unless a decoder says otherwise.

use crate::error::DecodeError;
use serde::Serialize;

/// Bit 7 of the register byte marks a read request / read response.
pub const READ_FLAG: u8 = 0x80;

/// Offset of the first payload byte in every command and notification.
pub const PAYLOAD_OFFSET: usize = 2;

/// Fail with [`DecodeError::TooShort`] unless `data` holds `needed` bytes.
pub fn require(data: &[u8], needed: usize) -> Result<(), DecodeError> {
    if data.len() < needed {
        return Err(DecodeError::TooShort {
            needed,
            actual: data.len(),
        });
    }
    Ok(())
}

/// True when the register byte carries the read flag.
pub fn is_read_response(data: &[u8]) -> bool {
    data.len() > 1 && data[1] & READ_FLAG != 0
}

pub fn u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

pub fn i16_le(data: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([data[offset], data[offset + 1]])
}

pub fn u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Sign-extend a 12-bit reading packed in the top of a little-endian i16.
pub fn i12_packed(data: &[u8], offset: usize) -> i16 {
    i16_le(data, offset) >> 4
}

/// The (module, register, index) triple several "add entry" registers use to
/// name the data source they are attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceDescriptor {
    pub module: u8,
    pub register: u8,
    pub index: u8,
}

impl SourceDescriptor {
    pub fn new(module: u8, register: u8, index: u8) -> Self {
        Self {
            module,
            register,
            index,
        }
    }

    pub fn from_bytes(data: &[u8], offset: usize) -> Result<Self, DecodeError> {
        require(data, offset + 3)?;
        Ok(Self::new(data[offset], data[offset + 1], data[offset + 2]))
    }

    pub fn to_bytes(self) -> [u8; 3] {
        [self.module, self.register, self.index]
    }
}

/// Pack a byte window into a source: offset in bits 0-4, `length - 1` in
/// bits 5-6.
pub fn pack_offset_len(offset: u8, length: u8) -> u8 {
    (offset & 0x1f) | ((length.saturating_sub(1) & 0x03) << 5)
}

/// Inverse of [`pack_offset_len`], returns `(offset, length)`.
pub fn unpack_offset_len(packed: u8) -> (u8, u8) {
    (packed & 0x1f, ((packed >> 5) & 0x03) + 1)
}

/// Format bytes as `05-88-03`.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join("-")
}

/// Error returned by [`parse_hex`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hex byte string: {0}")]
pub struct ParseHexError(pub String);

/// Parse `05 88 03`, `05-88-03`, `0x05,0x88,0x03` or `058803`.
pub fn parse_hex(input: &str) -> Result<Vec<u8>, ParseHexError> {
    let tokens: Vec<&str> = input
        .split(|c: char| c.is_whitespace() || c == '-' || c == ',' || c == ':')
        .filter(|t| !t.is_empty())
        .collect();

    let mut out = Vec::new();
    for token in tokens {
        let token = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        if token.len() % 2 != 0 {
            return Err(ParseHexError(input.to_string()));
        }
        for i in (0..token.len()).step_by(2) {
            let byte = u8::from_str_radix(&token[i..i + 2], 16)
                .map_err(|_| ParseHexError(input.to_string()))?;
            out.push(byte);
        }
    }
    Ok(out)
}
