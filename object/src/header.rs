/// Heap object kind, using the runtime's header tag values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ObjectKind {
    Str = 0x1,
    Array = 0x3,
    Sexp = 0x5,
    Closure = 0x7,
}

impl ObjectKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Str => "string",
            Self::Array => "array",
            Self::Sexp => "sexp",
            Self::Closure => "closure",
        }
    }
}
