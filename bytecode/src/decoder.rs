use thiserror::Error;

use crate::image::ProgramImage;
use crate::op::{Mem, Opcode};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of bytecode at offset {offset:#010x}")]
    Truncated { offset: usize },
    #[error("invalid opcode {group}-{op} at offset {offset:#010x}")]
    InvalidOpcode { offset: usize, group: u8, op: u8 },
    #[error("invalid location kind {kind} at offset {offset:#010x}")]
    InvalidLocation { offset: usize, kind: u8 },
    #[error("string offset {offset} lies outside the string table")]
    StringOutOfRange { offset: u32 },
    #[error("string at offset {offset} is not NUL-terminated")]
    UnterminatedString { offset: u32 },
    #[error("jump target {target:#010x} lies outside the code")]
    JumpOutOfRange { target: u32 },
}

/// Resolve a NUL-terminated string in `table` starting at `offset`.
pub(crate) fn c_str(table: &[u8], offset: u32) -> Result<&[u8], DecodeError> {
    let tail = table
        .get(offset as usize..)
        .filter(|tail| !tail.is_empty())
        .ok_or(DecodeError::StringOutOfRange { offset })?;
    let len = tail
        .iter()
        .position(|&b| b == 0)
        .ok_or(DecodeError::UnterminatedString { offset })?;
    Ok(&tail[..len])
}

/// A cursor over the instruction stream of a [`ProgramImage`].
///
/// Decoding is lazy: [`fetch_opcode`](Self::fetch_opcode) reads only the
/// opcode byte and the handler pulls the operands it needs with the other
/// `fetch_*` methods. Every read is bounds-checked.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    code: &'a [u8],
    strings: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(image: &'a ProgramImage) -> Self {
        Self::from_parts(image.code(), image.string_table())
    }

    pub fn from_parts(code: &'a [u8], strings: &'a [u8]) -> Self {
        Self { code, strings, pos: 0 }
    }

    /// Current byte offset in the stream.
    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.pos
    }

    #[inline(always)]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.code.len()
    }

    /// Move the cursor to an absolute code offset.
    pub fn jump(&mut self, target: u32) -> Result<(), DecodeError> {
        if target as usize > self.code.len() {
            return Err(DecodeError::JumpOutOfRange { target });
        }
        self.pos = target as usize;
        Ok(())
    }

    #[inline(always)]
    pub fn fetch_byte(&mut self) -> Result<u8, DecodeError> {
        let byte = *self
            .code
            .get(self.pos)
            .ok_or(DecodeError::Truncated { offset: self.pos })?;
        self.pos += 1;
        Ok(byte)
    }

    /// Little-endian 32-bit operand.
    #[inline(always)]
    pub fn fetch_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes: [u8; 4] = self
            .code
            .get(self.pos..self.pos + 4)
            .and_then(|s| s.try_into().ok())
            .ok_or(DecodeError::Truncated { offset: self.pos })?;
        self.pos += 4;
        Ok(u32::from_le_bytes(bytes))
    }

    #[inline(always)]
    pub fn fetch_i32(&mut self) -> Result<i32, DecodeError> {
        self.fetch_u32().map(|v| v as i32)
    }

    /// Resolve a string-table offset; the slice borrows the table.
    pub fn fetch_str(&self, offset: u32) -> Result<&'a [u8], DecodeError> {
        c_str(self.strings, offset)
    }

    pub fn fetch_opcode(&mut self) -> Result<Opcode, DecodeError> {
        let offset = self.pos;
        let byte = self.fetch_byte()?;
        Opcode::decode(byte).ok_or(DecodeError::InvalidOpcode {
            offset,
            group: byte >> 4,
            op: byte & 0x0f,
        })
    }

    /// One `(kind, index)` entry of a `CLOSURE` capture list.
    pub fn fetch_location(&mut self) -> Result<(Mem, u32), DecodeError> {
        let offset = self.pos;
        let kind = self.fetch_byte()?;
        let mem = Mem::try_from(kind)
            .map_err(|kind| DecodeError::InvalidLocation { offset, kind })?;
        Ok((mem, self.fetch_u32()?))
    }
}
