/// Width of an unboxed integer in bits. Matches the `BOX`/`UNBOX` encoding
/// of the 32-bit word the bytecode was compiled for.
pub const INT_BITS: u32 = 31;

pub const INT_MIN: i32 = -(1 << (INT_BITS - 1));
pub const INT_MAX: i32 = (1 << (INT_BITS - 1)) - 1;

/// Index of an object in the heap arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ObjRef(pub u32);

impl ObjRef {
    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// The address of a single variable cell.
///
/// Produced by `LDA` and by closure calls. Stores through an address land in
/// the cell it names, so two addresses to the same cell alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    /// Slot `i` of the global area.
    Global(u32),
    /// Absolute index into the operand stack.
    Stack(u32),
    /// Word `index` of a heap object's payload.
    Field { object: ObjRef, index: u32 },
}

/// A tagged value.
///
/// Encoding:
/// - **Int**:  unboxed integer, always within `INT_MIN..=INT_MAX`.
/// - **Ref**:  reference to a heap object.
/// - **Addr**: address of a variable cell; counts as boxed.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i32),
    Ref(ObjRef),
    Addr(Address),
}

impl Value {
    /// Box an integer, wrapping it into the 31-bit range the same way a
    /// one-bit left shift of a 32-bit word would.
    #[inline(always)]
    pub const fn int(n: i32) -> Self {
        Self::Int(wrap_int(n))
    }

    #[inline(always)]
    pub const fn from_bool(b: bool) -> Self {
        Self::Int(b as i32)
    }

    #[inline(always)]
    pub const fn zero() -> Self {
        Self::Int(0)
    }

    #[inline(always)]
    pub const fn is_unboxed(self) -> bool {
        matches!(self, Self::Int(_))
    }

    #[inline(always)]
    pub const fn is_boxed(self) -> bool {
        !self.is_unboxed()
    }

    #[inline(always)]
    pub const fn as_int(self) -> Option<i32> {
        match self {
            Self::Int(n) => Some(n),
            _ => None,
        }
    }

    #[inline(always)]
    pub const fn as_ref(self) -> Option<ObjRef> {
        match self {
            Self::Ref(r) => Some(r),
            _ => None,
        }
    }

    #[inline(always)]
    pub const fn as_addr(self) -> Option<Address> {
        match self {
            Self::Addr(a) => Some(a),
            _ => None,
        }
    }

    /// The heap object this value keeps alive, if any.
    #[inline]
    pub const fn referent(self) -> Option<ObjRef> {
        match self {
            Self::Ref(r) => Some(r),
            Self::Addr(Address::Field { object, .. }) => Some(object),
            _ => None,
        }
    }
}

#[inline(always)]
pub const fn wrap_int(n: i32) -> i32 {
    n.wrapping_shl(32 - INT_BITS) >> (32 - INT_BITS)
}

impl Default for Value {
    fn default() -> Self {
        Self::zero()
    }
}

impl core::fmt::Debug for Value {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Int(n) => write!(f, "Int({n})"),
            Self::Ref(r) => write!(f, "Ref(#{})", r.0),
            Self::Addr(Address::Global(i)) => write!(f, "Addr(G{i})"),
            Self::Addr(Address::Stack(i)) => write!(f, "Addr(S{i})"),
            Self::Addr(Address::Field { object, index }) => {
                write!(f, "Addr(#{}[{index}])", object.0)
            }
        }
    }
}
