//! Constructor-tag hashing for s-expressions.
//!
//! A tag name is packed six bits per character into an `i32`; only the
//! first [`TAG_CHARS`] characters take part, so the hash always fits the
//! unboxed integer range.

use thiserror::Error;

const ALPHABET: &[u8; 64] =
    b"_abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789'";

pub const TAG_CHARS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("tag hash: character {0:?} is not allowed in a constructor name")]
    InvalidChar(char),
}

/// Hash a constructor name.
pub fn tag_hash(name: &[u8]) -> Result<i32, TagError> {
    name.iter().take(TAG_CHARS).try_fold(0i32, |hash, &c| {
        let pos = ALPHABET
            .iter()
            .position(|&a| a == c)
            .ok_or(TagError::InvalidChar(c as char))?;
        Ok((hash << 6) | pos as i32)
    })
}

/// Recover the (possibly truncated) name from a tag hash.
pub fn tag_name(mut hash: i32) -> String {
    let mut out = Vec::with_capacity(TAG_CHARS);
    while hash != 0 {
        out.push(ALPHABET[(hash & 0x3f) as usize]);
        hash >>= 6;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
