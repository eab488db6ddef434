//! Builtins and the value helpers the engine delegates to.
//!
//! Everything here works on values and the heap only; allocation stays in
//! the interpreter, which owns the roots.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::io::{self, BufRead, Write};

use heap::Heap;
use object::{ObjRef, Object, ObjectKind, Value, tag_hash, tag_name};

use crate::RuntimeError;

// ── console ────────────────────────────────────────────────────────

/// Where `Lread` takes integers from and `Lwrite` sends them to.
pub trait Console {
    fn read_int(&mut self) -> Result<i32, RuntimeError>;
    fn write_int(&mut self, n: i32) -> Result<(), RuntimeError>;
}

fn parse_int(line: &str) -> Result<i32, RuntimeError> {
    let trimmed = line.trim();
    trimmed
        .parse()
        .map_err(|_| RuntimeError::BadInput(trimmed.to_owned()))
}

/// Process stdin/stdout. Reads print a `> ` prompt first.
#[derive(Debug, Default)]
pub struct StdConsole;

impl StdConsole {
    pub fn new() -> Self {
        Self
    }
}

impl Console for StdConsole {
    fn read_int(&mut self) -> Result<i32, RuntimeError> {
        let mut out = io::stdout().lock();
        write!(out, "> ")?;
        out.flush()?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(RuntimeError::EndOfInput);
        }
        parse_int(&line)
    }

    fn write_int(&mut self, n: i32) -> Result<(), RuntimeError> {
        writeln!(io::stdout().lock(), "{n}")?;
        Ok(())
    }
}

/// In-memory console: scripted input lines, captured output.
#[derive(Debug, Default)]
pub struct BufferConsole {
    input: VecDeque<String>,
    output: String,
}

impl BufferConsole {
    pub fn with_input<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            input: lines.into_iter().map(Into::into).collect(),
            output: String::new(),
        }
    }

    pub fn output(&self) -> &str {
        &self.output
    }
}

impl Console for BufferConsole {
    fn read_int(&mut self) -> Result<i32, RuntimeError> {
        let line = self.input.pop_front().ok_or(RuntimeError::EndOfInput)?;
        parse_int(&line)
    }

    fn write_int(&mut self, n: i32) -> Result<(), RuntimeError> {
        let _ = writeln!(self.output, "{n}");
        Ok(())
    }
}

// ── value helpers ──────────────────────────────────────────────────

pub fn expect_int(value: Value) -> Result<i32, RuntimeError> {
    value.as_int().ok_or(RuntimeError::TypeError {
        expected: "integer",
        got: value,
    })
}

/// The heap object behind a reference.
pub fn object(heap: &Heap, value: Value) -> Result<&Object, RuntimeError> {
    let r = value.as_ref().ok_or(RuntimeError::TypeError {
        expected: "reference",
        got: value,
    })?;
    heap.get(r).ok_or(RuntimeError::DanglingReference(r))
}

fn kind_of(heap: &Heap, value: Value) -> Option<ObjectKind> {
    value.as_ref().and_then(|r| heap.get(r)).map(Object::kind)
}

fn out_of_range(index: i32, object: &Object) -> RuntimeError {
    RuntimeError::IndexOutOfRange {
        index: index.into(),
        len: object.len(),
        kind: object.kind().name(),
    }
}

/// `ELEM`: element `index` of an aggregate. String elements are bytes.
pub fn elem(heap: &Heap, aggregate: Value, index: i32) -> Result<Value, RuntimeError> {
    let object = object(heap, aggregate)?;
    usize::try_from(index)
        .ok()
        .and_then(|i| object.field(i))
        .ok_or_else(|| out_of_range(index, object))
}

/// `STA` with an integer index: element store into an aggregate.
pub fn sta(heap: &mut Heap, aggregate: Value, index: i32, value: Value) -> Result<(), RuntimeError> {
    let r = aggregate.as_ref().ok_or(RuntimeError::TypeError {
        expected: "aggregate",
        got: aggregate,
    })?;
    let object = heap.get_mut(r).ok_or(RuntimeError::DanglingReference(r))?;
    if matches!(object, Object::Str(_)) && !value.is_unboxed() {
        return Err(RuntimeError::TypeError {
            expected: "integer",
            got: value,
        });
    }
    let stored = usize::try_from(index)
        .map(|i| object.set_field(i, value))
        .unwrap_or(false);
    if stored { Ok(()) } else { Err(out_of_range(index, object)) }
}

/// `Llength`: declared length of an object.
pub fn length(heap: &Heap, value: Value) -> Result<i32, RuntimeError> {
    Ok(object(heap, value)?.len() as i32)
}

// ── pattern helpers ────────────────────────────────────────────────

pub fn string_patt(heap: &Heap, x: Value, y: Value) -> bool {
    match (
        x.as_ref().and_then(|r| heap.get(r)),
        y.as_ref().and_then(|r| heap.get(r)),
    ) {
        (Some(Object::Str(a)), Some(Object::Str(b))) => a == b,
        _ => false,
    }
}

/// `TAG name arity`: an s-expression with that constructor and arity.
pub fn tag_patt(heap: &Heap, value: Value, name: &[u8], arity: u32) -> Result<bool, RuntimeError> {
    let hash = tag_hash(name)?;
    Ok(matches!(
        value.as_ref().and_then(|r| heap.get(r)),
        Some(Object::Sexp { tag, fields }) if *tag == hash && fields.len() == arity as usize
    ))
}

/// `ARRAY arity`: an array of exactly that length.
pub fn array_patt(heap: &Heap, value: Value, arity: u32) -> bool {
    matches!(
        value.as_ref().and_then(|r| heap.get(r)),
        Some(Object::Array(items)) if items.len() == arity as usize
    )
}

pub fn kind_patt(heap: &Heap, value: Value, kind: ObjectKind) -> bool {
    kind_of(heap, value) == Some(kind)
}

// ── printing ───────────────────────────────────────────────────────

/// Render a value the way `Lstring` and match-failure diagnostics show it.
///
/// An object reached again through its own fields prints as `...`.
pub fn stringify(heap: &Heap, value: Value) -> String {
    let mut out = String::new();
    Printer { heap, path: Vec::new(), out: &mut out }.value(value);
    out
}

struct Printer<'h, 'o> {
    heap: &'h Heap,
    /// Objects currently being printed, outermost first.
    path: Vec<ObjRef>,
    out: &'o mut String,
}

impl<'h> Printer<'h, '_> {
    fn value(&mut self, value: Value) {
        let r = match value {
            Value::Int(n) => {
                let _ = write!(self.out, "{n}");
                return;
            }
            Value::Addr(addr) => {
                let _ = write!(self.out, "{addr:?}");
                return;
            }
            Value::Ref(r) => r,
        };
        if self.path.contains(&r) {
            self.out.push_str("...");
            return;
        }
        let heap = self.heap;
        let Some(object) = heap.get(r) else {
            self.out.push_str("<dangling>");
            return;
        };
        self.path.push(r);
        match object {
            Object::Str(bytes) => {
                self.out.push('"');
                self.out.push_str(&String::from_utf8_lossy(bytes));
                self.out.push('"');
            }
            Object::Array(items) => {
                self.out.push('[');
                self.list(items);
                self.out.push(']');
            }
            Object::Sexp { tag, fields } => {
                let name = tag_name(*tag);
                if name == "cons" {
                    self.cons(fields);
                } else {
                    self.out.push_str(&name);
                    if !fields.is_empty() {
                        self.out.push_str(" (");
                        self.list(fields);
                        self.out.push(')');
                    }
                }
            }
            Object::Closure { entry, captures } => {
                let _ = write!(self.out, "<closure {entry:#x}");
                for &capture in captures {
                    self.out.push_str(", ");
                    self.value(capture);
                }
                self.out.push('>');
            }
        }
        self.path.pop();
    }

    fn list(&mut self, items: &[Value]) {
        for (i, &item) in items.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.value(item);
        }
    }

    /// A `cons` chain prints as `{a, b, c}`; the walk stops at the first tail
    /// that is not another non-empty s-expression.
    fn cons(&mut self, fields: &'h [Value]) {
        let depth = self.path.len();
        let heap = self.heap;
        self.out.push('{');
        let mut cell = fields;
        while let Some(&head) = cell.first() {
            self.value(head);
            let Some(tail) = cell.get(1).and_then(|tail| tail.as_ref()) else {
                break;
            };
            if self.path.contains(&tail) {
                self.out.push_str(", ...");
                break;
            }
            match heap.get(tail) {
                Some(Object::Sexp { fields, .. }) if !fields.is_empty() => {
                    self.out.push_str(", ");
                    self.path.push(tail);
                    cell = fields;
                }
                _ => break,
            }
        }
        self.out.push('}');
        self.path.truncate(depth);
    }
}
