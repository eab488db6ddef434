//! The in-memory view of a compiled program.
//!
//! ```text
//! i32  string table size (bytes)
//! i32  global area size (words)
//! i32  public symbol count
//! n × (i32 name offset, i32 code offset)
//! string table bytes
//! code bytes (remainder of the file)
//! ```
//!
//! All integers are little-endian.

use std::io;
use std::path::{Path, PathBuf};

use object::Value;
use thiserror::Error;

use crate::decoder::{DecodeError, c_str};

pub(crate) const HEADER_BYTES: usize = 3 * 4;
pub(crate) const SYMBOL_BYTES: usize = 2 * 4;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("truncated image: {section} needs {needed} bytes, {available} available")]
    Truncated {
        section: &'static str,
        needed: usize,
        available: usize,
    },
    #[error("negative {field} in image header: {value}")]
    NegativeSize { field: &'static str, value: i32 },
    #[error("public symbol {index} names offset {offset} outside the string table")]
    BadSymbol { index: usize, offset: u32 },
}

/// An exported entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicSymbol {
    /// String-table offset of the symbol's name.
    pub name: u32,
    /// Code offset of the entry point.
    pub offset: u32,
}

/// Immutable program image. The global area is not stored here; the engine
/// asks for a fresh one with [`new_global_area`](Self::new_global_area) and
/// owns it for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    strings: Vec<u8>,
    publics: Vec<PublicSymbol>,
    global_area_size: usize,
    code: Vec<u8>,
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, section: &'static str, len: usize) -> Result<&'a [u8], LoadError> {
        let available = self.bytes.len() - self.pos;
        if len > available {
            return Err(LoadError::Truncated { section, needed: len, available });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn i32(&mut self, section: &'static str) -> Result<i32, LoadError> {
        let bytes = self.take(section, 4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn size(&mut self, field: &'static str) -> Result<usize, LoadError> {
        let value = self.i32("header")?;
        usize::try_from(value).map_err(|_| LoadError::NegativeSize { field, value })
    }

    fn rest(&mut self) -> &'a [u8] {
        let slice = &self.bytes[self.pos..];
        self.pos = self.bytes.len();
        slice
    }
}

impl ProgramImage {
    pub fn read_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&bytes)
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, LoadError> {
        if bytes.len() < HEADER_BYTES {
            return Err(LoadError::Truncated {
                section: "header",
                needed: HEADER_BYTES,
                available: bytes.len(),
            });
        }

        let mut reader = Reader { bytes, pos: 0 };
        let string_table_size = reader.size("string table size")?;
        let global_area_size = reader.size("global area size")?;
        let public_count = reader.size("public symbol count")?;

        let table_len = public_count.checked_mul(SYMBOL_BYTES).ok_or(LoadError::Truncated {
            section: "public symbols",
            needed: usize::MAX,
            available: bytes.len() - HEADER_BYTES,
        })?;
        let mut table = Reader {
            bytes: reader.take("public symbols", table_len)?,
            pos: 0,
        };
        let mut publics = Vec::with_capacity(public_count);
        for _ in 0..public_count {
            let name = table.i32("public symbols")? as u32;
            let offset = table.i32("public symbols")? as u32;
            publics.push(PublicSymbol { name, offset });
        }

        let strings = reader.take("string table", string_table_size)?.to_vec();
        let code = reader.rest().to_vec();

        for (index, symbol) in publics.iter().enumerate() {
            if c_str(&strings, symbol.name).is_err() {
                return Err(LoadError::BadSymbol { index, offset: symbol.name });
            }
        }

        log::debug!(
            "loaded image: {} string bytes, {} globals, {} public symbols, {} code bytes",
            strings.len(),
            global_area_size,
            publics.len(),
            code.len()
        );

        Ok(Self {
            strings,
            publics,
            global_area_size,
            code,
        })
    }

    #[inline]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    #[inline]
    pub fn string_table(&self) -> &[u8] {
        &self.strings
    }

    #[inline]
    pub fn global_area_size(&self) -> usize {
        self.global_area_size
    }

    /// A zero-filled global area sized for this program.
    pub fn new_global_area(&self) -> Vec<Value> {
        vec![Value::zero(); self.global_area_size]
    }

    pub fn string_at(&self, offset: u32) -> Result<&[u8], DecodeError> {
        c_str(&self.strings, offset)
    }

    #[inline]
    pub fn public_symbols(&self) -> &[PublicSymbol] {
        &self.publics
    }

    /// Name of public symbol `i`. Names were validated at load time.
    pub fn public_name(&self, i: usize) -> Option<&[u8]> {
        let symbol = self.publics.get(i)?;
        self.string_at(symbol.name).ok()
    }

    pub fn public_offset(&self, i: usize) -> Option<u32> {
        self.publics.get(i).map(|symbol| symbol.offset)
    }
}
