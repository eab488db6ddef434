use crate::{ObjectKind, Value};

/// Body of a heap object.
///
/// Aggregates hold tagged words, strings hold raw bytes. A closure's first
/// payload word is its entry address; captures follow it, so field `i + 1`
/// is capture `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Str(Vec<u8>),
    Array(Vec<Value>),
    Sexp { tag: i32, fields: Vec<Value> },
    Closure { entry: u32, captures: Vec<Value> },
}

impl Object {
    #[inline]
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Str(_) => ObjectKind::Str,
            Self::Array(_) => ObjectKind::Array,
            Self::Sexp { .. } => ObjectKind::Sexp,
            Self::Closure { .. } => ObjectKind::Closure,
        }
    }

    /// Declared length: bytes for strings, words for everything else
    /// (a closure counts its entry word).
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Self::Str(bytes) => bytes.len(),
            Self::Array(items) => items.len(),
            Self::Sexp { fields, .. } => fields.len(),
            Self::Closure { captures, .. } => captures.len() + 1,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read payload word `index`. String bytes read as unboxed integers.
    pub fn field(&self, index: usize) -> Option<Value> {
        match self {
            Self::Str(bytes) => bytes.get(index).map(|&b| Value::int(b as i32)),
            Self::Array(items) => items.get(index).copied(),
            Self::Sexp { fields, .. } => fields.get(index).copied(),
            Self::Closure { entry, captures } => match index {
                0 => Some(Value::int(*entry as i32)),
                i => captures.get(i - 1).copied(),
            },
        }
    }

    /// Overwrite payload word `index`. Returns `false` when the index is out
    /// of range or the value cannot live in that slot (a non-integer stored
    /// into a string, or anything stored over a closure's entry word).
    pub fn set_field(&mut self, index: usize, value: Value) -> bool {
        let slot = match self {
            Self::Str(bytes) => {
                return match (bytes.get_mut(index), value.as_int()) {
                    (Some(byte), Some(n)) => {
                        *byte = n as u8;
                        true
                    }
                    _ => false,
                };
            }
            Self::Array(items) => items.get_mut(index),
            Self::Sexp { fields, .. } => fields.get_mut(index),
            Self::Closure { captures, .. } => match index {
                0 => None,
                i => captures.get_mut(i - 1),
            },
        };
        match slot {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// The tagged words held by this object; empty for strings.
    pub fn values(&self) -> &[Value] {
        match self {
            Self::Str(_) => &[],
            Self::Array(items) => items,
            Self::Sexp { fields, .. } => fields,
            Self::Closure { captures, .. } => captures,
        }
    }
}
