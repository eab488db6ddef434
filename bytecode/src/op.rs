/// Instruction families, selected by the high nibble of an opcode byte.
pub mod group {
    pub const BINOP: u8 = 0;
    pub const MISC: u8 = 1;
    pub const LD: u8 = 2;
    pub const LDA: u8 = 3;
    pub const ST: u8 = 4;
    pub const CONTROL: u8 = 5;
    pub const PATT: u8 = 6;
    pub const BUILTIN: u8 = 7;
    pub const STOP: u8 = 15;
}

/// Binary operators (`BINOP` family). Operands are unboxed integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BinOp {
    Add = 1,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinOp {
    pub const ALL: [BinOp; 13] = [
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Div,
        Self::Rem,
        Self::Lt,
        Self::Le,
        Self::Gt,
        Self::Ge,
        Self::Eq,
        Self::Ne,
        Self::And,
        Self::Or,
    ];

    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::And => "&&",
            Self::Or => "!!",
        }
    }
}

impl TryFrom<u8> for BinOp {
    type Error = u8;

    fn try_from(op: u8) -> Result<Self, u8> {
        match op {
            1..=13 => Ok(Self::ALL[op as usize - 1]),
            other => Err(other),
        }
    }
}

/// Storage class of a variable: the operand of `LD`, `LDA`, `ST` and of
/// each `CLOSURE` capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mem {
    Global = 0,
    Local,
    Arg,
    Capture,
}

impl Mem {
    pub const fn letter(self) -> char {
        match self {
            Self::Global => 'G',
            Self::Local => 'L',
            Self::Arg => 'A',
            Self::Capture => 'C',
        }
    }
}

impl TryFrom<u8> for Mem {
    type Error = u8;

    fn try_from(kind: u8) -> Result<Self, u8> {
        match kind {
            0 => Ok(Self::Global),
            1 => Ok(Self::Local),
            2 => Ok(Self::Arg),
            3 => Ok(Self::Capture),
            other => Err(other),
        }
    }
}

/// Pattern tests (`PATT` family).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Pattern {
    /// Two strings with equal contents.
    StrEq = 0,
    IsString,
    IsArray,
    IsSexp,
    IsBoxed,
    IsUnboxed,
    IsClosure,
}

impl Pattern {
    pub const fn name(self) -> &'static str {
        match self {
            Self::StrEq => "=str",
            Self::IsString => "#string",
            Self::IsArray => "#array",
            Self::IsSexp => "#sexp",
            Self::IsBoxed => "#ref",
            Self::IsUnboxed => "#val",
            Self::IsClosure => "#fun",
        }
    }
}

impl TryFrom<u8> for Pattern {
    type Error = u8;

    fn try_from(op: u8) -> Result<Self, u8> {
        match op {
            0 => Ok(Self::StrEq),
            1 => Ok(Self::IsString),
            2 => Ok(Self::IsArray),
            3 => Ok(Self::IsSexp),
            4 => Ok(Self::IsBoxed),
            5 => Ok(Self::IsUnboxed),
            6 => Ok(Self::IsClosure),
            other => Err(other),
        }
    }
}

/// A decoded opcode byte.
///
/// Operands are not part of the opcode; the handler pulls them from the
/// stream as it needs them. Operand shapes:
///
/// | opcode                         | operands                                   |
/// |--------------------------------|--------------------------------------------|
/// | `Const`                        | `value:i32`                                |
/// | `String`                       | `str:u32`                                  |
/// | `Sexp`, `Tag`                  | `str:u32`, `arity:u32`                     |
/// | `Jmp`, `CjmpZ`, `CjmpNz`       | `target:u32`                               |
/// | `Ld`, `Lda`, `St`              | `index:u32`                                |
/// | `Begin`, `CBegin`              | `args:u32`, `locals:u32`                   |
/// | `Closure`                      | `target:u32`, `n:u32`, `n × (kind:u8, index:u32)` |
/// | `CallC`, `Array`, `Barray`, `Line` | `n:u32`                                |
/// | `Call`                         | `target:u32`, `args:u32`                   |
/// | `Fail`                         | `line:u32`, `column:u32`                   |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Binop(BinOp),

    Const,
    String,
    Sexp,
    Sti,
    Sta,
    Jmp,
    End,
    Ret,
    Drop,
    Dup,
    Swap,
    Elem,

    Ld(Mem),
    Lda(Mem),
    St(Mem),

    CjmpZ,
    CjmpNz,
    Begin,
    CBegin,
    Closure,
    CallC,
    Call,
    Tag,
    Array,
    Fail,
    Line,

    Patt(Pattern),

    Read,
    Write,
    Length,
    Stringify,
    Barray,

    Stop,
}

impl Opcode {
    /// Split an opcode byte into its family and variant and map it to an
    /// [`Opcode`]. Returns `None` for combinations with no meaning.
    pub fn decode(byte: u8) -> Option<Self> {
        let (hi, lo) = (byte >> 4, byte & 0x0f);
        let op = match hi {
            group::BINOP => Self::Binop(BinOp::try_from(lo).ok()?),
            group::MISC => match lo {
                0 => Self::Const,
                1 => Self::String,
                2 => Self::Sexp,
                3 => Self::Sti,
                4 => Self::Sta,
                5 => Self::Jmp,
                6 => Self::End,
                7 => Self::Ret,
                8 => Self::Drop,
                9 => Self::Dup,
                10 => Self::Swap,
                11 => Self::Elem,
                _ => return None,
            },
            group::LD => Self::Ld(Mem::try_from(lo).ok()?),
            group::LDA => Self::Lda(Mem::try_from(lo).ok()?),
            group::ST => Self::St(Mem::try_from(lo).ok()?),
            group::CONTROL => match lo {
                0 => Self::CjmpZ,
                1 => Self::CjmpNz,
                2 => Self::Begin,
                3 => Self::CBegin,
                4 => Self::Closure,
                5 => Self::CallC,
                6 => Self::Call,
                7 => Self::Tag,
                8 => Self::Array,
                9 => Self::Fail,
                10 => Self::Line,
                _ => return None,
            },
            group::PATT => Self::Patt(Pattern::try_from(lo).ok()?),
            group::BUILTIN => match lo {
                0 => Self::Read,
                1 => Self::Write,
                2 => Self::Length,
                3 => Self::Stringify,
                4 => Self::Barray,
                _ => return None,
            },
            group::STOP => Self::Stop,
            _ => return None,
        };
        Some(op)
    }

    pub const fn encode(self) -> u8 {
        let (hi, lo) = match self {
            Self::Binop(op) => (group::BINOP, op as u8),
            Self::Const => (group::MISC, 0),
            Self::String => (group::MISC, 1),
            Self::Sexp => (group::MISC, 2),
            Self::Sti => (group::MISC, 3),
            Self::Sta => (group::MISC, 4),
            Self::Jmp => (group::MISC, 5),
            Self::End => (group::MISC, 6),
            Self::Ret => (group::MISC, 7),
            Self::Drop => (group::MISC, 8),
            Self::Dup => (group::MISC, 9),
            Self::Swap => (group::MISC, 10),
            Self::Elem => (group::MISC, 11),
            Self::Ld(mem) => (group::LD, mem as u8),
            Self::Lda(mem) => (group::LDA, mem as u8),
            Self::St(mem) => (group::ST, mem as u8),
            Self::CjmpZ => (group::CONTROL, 0),
            Self::CjmpNz => (group::CONTROL, 1),
            Self::Begin => (group::CONTROL, 2),
            Self::CBegin => (group::CONTROL, 3),
            Self::Closure => (group::CONTROL, 4),
            Self::CallC => (group::CONTROL, 5),
            Self::Call => (group::CONTROL, 6),
            Self::Tag => (group::CONTROL, 7),
            Self::Array => (group::CONTROL, 8),
            Self::Fail => (group::CONTROL, 9),
            Self::Line => (group::CONTROL, 10),
            Self::Patt(p) => (group::PATT, p as u8),
            Self::Read => (group::BUILTIN, 0),
            Self::Write => (group::BUILTIN, 1),
            Self::Length => (group::BUILTIN, 2),
            Self::Stringify => (group::BUILTIN, 3),
            Self::Barray => (group::BUILTIN, 4),
            Self::Stop => (group::STOP, 15),
        };
        (hi << 4) | lo
    }

    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Binop(_) => "BINOP",
            Self::Const => "CONST",
            Self::String => "STRING",
            Self::Sexp => "SEXP",
            Self::Sti => "STI",
            Self::Sta => "STA",
            Self::Jmp => "JMP",
            Self::End => "END",
            Self::Ret => "RET",
            Self::Drop => "DROP",
            Self::Dup => "DUP",
            Self::Swap => "SWAP",
            Self::Elem => "ELEM",
            Self::Ld(_) => "LD",
            Self::Lda(_) => "LDA",
            Self::St(_) => "ST",
            Self::CjmpZ => "CJMPz",
            Self::CjmpNz => "CJMPnz",
            Self::Begin => "BEGIN",
            Self::CBegin => "CBEGIN",
            Self::Closure => "CLOSURE",
            Self::CallC => "CALLC",
            Self::Call => "CALL",
            Self::Tag => "TAG",
            Self::Array => "ARRAY",
            Self::Fail => "FAIL",
            Self::Line => "LINE",
            Self::Patt(_) => "PATT",
            Self::Read => "Lread",
            Self::Write => "Lwrite",
            Self::Length => "Llength",
            Self::Stringify => "Lstring",
            Self::Barray => "Barray",
            Self::Stop => "STOP",
        }
    }
}
