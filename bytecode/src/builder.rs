use std::collections::HashMap;

use crate::image::{HEADER_BYTES, SYMBOL_BYTES};
use crate::op::{BinOp, Mem, Opcode, Pattern};

/// A code position that may be referenced before it is bound.
///
/// Created by [`BytecodeBuilder::label`]; every jump, call or closure that
/// targets it is patched when the bytecode is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// Builds an instruction stream.
///
/// Jump, call and closure targets are absolute code offsets. They are given
/// as [`Label`]s and resolved by [`into_bytes`](Self::into_bytes), so forward
/// and backward references look the same.
#[derive(Debug, Default)]
pub struct BytecodeBuilder {
    buf: Vec<u8>,
    labels: Vec<Option<u32>>,
    fixups: Vec<(usize, Label)>,
}

impl BytecodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every label reference and return the code.
    ///
    /// Panics if a referenced label was never bound.
    pub fn into_bytes(mut self) -> Vec<u8> {
        for &(pos, label) in &self.fixups {
            let Some(target) = self.labels[label.0] else {
                panic!("label {} referenced but never bound", label.0);
            };
            self.buf[pos..pos + 4].copy_from_slice(&target.to_le_bytes());
        }
        self.buf
    }

    // ── labels ─────────────────────────────────────────────────────

    pub fn label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind `label` to the current offset.
    pub fn bind(&mut self, label: Label) {
        self.labels[label.0] = Some(self.buf.len() as u32);
    }

    // ── emit helpers ───────────────────────────────────────────────

    fn emit_op(&mut self, op: Opcode) {
        self.buf.push(op.encode());
    }

    fn emit_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn emit_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn emit_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn emit_target(&mut self, label: Label) {
        self.fixups.push((self.buf.len(), label));
        self.emit_u32(0); // patched in into_bytes
    }

    // ── instructions ───────────────────────────────────────────────

    pub fn binop(&mut self, op: BinOp) {
        self.emit_op(Opcode::Binop(op));
    }

    pub fn const_(&mut self, value: i32) {
        self.emit_op(Opcode::Const);
        self.emit_i32(value);
    }

    /// `offset` is a string-table offset.
    pub fn string(&mut self, offset: u32) {
        self.emit_op(Opcode::String);
        self.emit_u32(offset);
    }

    pub fn sexp(&mut self, tag: u32, arity: u32) {
        self.emit_op(Opcode::Sexp);
        self.emit_u32(tag);
        self.emit_u32(arity);
    }

    pub fn sti(&mut self) {
        self.emit_op(Opcode::Sti);
    }

    pub fn sta(&mut self) {
        self.emit_op(Opcode::Sta);
    }

    pub fn jmp(&mut self, target: Label) {
        self.emit_op(Opcode::Jmp);
        self.emit_target(target);
    }

    pub fn end(&mut self) {
        self.emit_op(Opcode::End);
    }

    pub fn ret(&mut self) {
        self.emit_op(Opcode::Ret);
    }

    pub fn drop_(&mut self) {
        self.emit_op(Opcode::Drop);
    }

    pub fn dup(&mut self) {
        self.emit_op(Opcode::Dup);
    }

    pub fn swap(&mut self) {
        self.emit_op(Opcode::Swap);
    }

    pub fn elem(&mut self) {
        self.emit_op(Opcode::Elem);
    }

    pub fn ld(&mut self, mem: Mem, index: u32) {
        self.emit_op(Opcode::Ld(mem));
        self.emit_u32(index);
    }

    pub fn lda(&mut self, mem: Mem, index: u32) {
        self.emit_op(Opcode::Lda(mem));
        self.emit_u32(index);
    }

    pub fn st(&mut self, mem: Mem, index: u32) {
        self.emit_op(Opcode::St(mem));
        self.emit_u32(index);
    }

    pub fn cjmpz(&mut self, target: Label) {
        self.emit_op(Opcode::CjmpZ);
        self.emit_target(target);
    }

    pub fn cjmpnz(&mut self, target: Label) {
        self.emit_op(Opcode::CjmpNz);
        self.emit_target(target);
    }

    pub fn begin(&mut self, args: u32, locals: u32) {
        self.emit_op(Opcode::Begin);
        self.emit_u32(args);
        self.emit_u32(locals);
    }

    pub fn cbegin(&mut self, args: u32, locals: u32) {
        self.emit_op(Opcode::CBegin);
        self.emit_u32(args);
        self.emit_u32(locals);
    }

    pub fn closure(&mut self, target: Label, captures: &[(Mem, u32)]) {
        self.emit_op(Opcode::Closure);
        self.emit_target(target);
        self.emit_u32(captures.len() as u32);
        for &(mem, index) in captures {
            self.emit_u8(mem as u8);
            self.emit_u32(index);
        }
    }

    pub fn callc(&mut self, args: u32) {
        self.emit_op(Opcode::CallC);
        self.emit_u32(args);
    }

    pub fn call(&mut self, target: Label, args: u32) {
        self.emit_op(Opcode::Call);
        self.emit_target(target);
        self.emit_u32(args);
    }

    pub fn tag(&mut self, tag: u32, arity: u32) {
        self.emit_op(Opcode::Tag);
        self.emit_u32(tag);
        self.emit_u32(arity);
    }

    pub fn array(&mut self, arity: u32) {
        self.emit_op(Opcode::Array);
        self.emit_u32(arity);
    }

    pub fn fail(&mut self, line: u32, column: u32) {
        self.emit_op(Opcode::Fail);
        self.emit_u32(line);
        self.emit_u32(column);
    }

    pub fn line(&mut self, line: u32) {
        self.emit_op(Opcode::Line);
        self.emit_u32(line);
    }

    pub fn patt(&mut self, pattern: Pattern) {
        self.emit_op(Opcode::Patt(pattern));
    }

    pub fn read(&mut self) {
        self.emit_op(Opcode::Read);
    }

    pub fn write(&mut self) {
        self.emit_op(Opcode::Write);
    }

    pub fn length(&mut self) {
        self.emit_op(Opcode::Length);
    }

    pub fn stringify(&mut self) {
        self.emit_op(Opcode::Stringify);
    }

    pub fn barray(&mut self, n: u32) {
        self.emit_op(Opcode::Barray);
        self.emit_u32(n);
    }

    pub fn stop(&mut self) {
        self.emit_op(Opcode::Stop);
    }

    /// Emit a raw byte, for hand-crafting malformed streams.
    pub fn raw(&mut self, byte: u8) {
        self.emit_u8(byte);
    }
}

/// Assembles a complete program image in the loader's format.
#[derive(Debug, Default)]
pub struct ImageBuilder {
    strings: Vec<u8>,
    interned: HashMap<String, u32>,
    globals: u32,
    publics: Vec<(u32, u32)>,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `s` in the string table and return its offset.
    pub fn string(&mut self, s: &str) -> u32 {
        if let Some(&offset) = self.interned.get(s) {
            return offset;
        }
        let offset = self.strings.len() as u32;
        self.strings.extend_from_slice(s.as_bytes());
        self.strings.push(0);
        self.interned.insert(s.to_owned(), offset);
        offset
    }

    pub fn globals(&mut self, count: u32) -> &mut Self {
        self.globals = count;
        self
    }

    pub fn public(&mut self, name: &str, offset: u32) -> &mut Self {
        let name = self.string(name);
        self.publics.push((name, offset));
        self
    }

    pub fn finish(&self, code: &[u8]) -> Vec<u8> {
        let symbols = self.publics.len() * SYMBOL_BYTES;
        let mut out =
            Vec::with_capacity(HEADER_BYTES + symbols + self.strings.len() + code.len());
        out.extend_from_slice(&(self.strings.len() as i32).to_le_bytes());
        out.extend_from_slice(&(self.globals as i32).to_le_bytes());
        out.extend_from_slice(&(self.publics.len() as i32).to_le_bytes());
        for &(name, offset) in &self.publics {
            out.extend_from_slice(&name.to_le_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
        }
        out.extend_from_slice(&self.strings);
        out.extend_from_slice(code);
        out
    }
}
