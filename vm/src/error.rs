use std::io;

use bytecode::DecodeError;
use object::{ObjRef, TagError, Value};
use thiserror::Error;

/// Every failure the engine can hit. All of them end the run.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Tag(#[from] TagError),
    #[error("invalid settings: {0}")]
    InvalidSettings(&'static str),
    #[error("stack overflow (limit {limit} words)")]
    StackOverflow { limit: usize },
    #[error("stack underflow")]
    StackUnderflow,
    #[error("stack slot {index} was never written")]
    StackIndex { index: usize },
    #[error("corrupt activation record at stack slot {fp}")]
    CorruptFrame { fp: usize },
    #[error("{op} executed outside of any frame")]
    NoFrame { op: &'static str },
    #[error("match failure at {file}:{line}:{column}, value '{value}'")]
    MatchFailure {
        file: String,
        line: u32,
        column: u32,
        value: String,
    },
    #[error("division by zero at offset {offset:#010x}")]
    DivisionByZero { offset: usize },
    #[error("type error: expected {expected}, got {got:?}")]
    TypeError { expected: &'static str, got: Value },
    #[error("global {index} outside the global area of {size} words")]
    GlobalOutOfRange { index: u32, size: usize },
    #[error("index {index} out of range for {kind} of length {len}")]
    IndexOutOfRange {
        index: i64,
        len: usize,
        kind: &'static str,
    },
    #[error("dangling reference {0:?}")]
    DanglingReference(ObjRef),
    #[error("bad input: {0:?} is not an integer")]
    BadInput(String),
    #[error("unexpected end of input")]
    EndOfInput,
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}
