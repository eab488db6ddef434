use bytecode::{BinOp, Decoder, Mem, Opcode, Pattern, ProgramImage};
use heap::{Heap, RootProvider};
use object::{Address, Object, ObjectKind, Value};

use crate::frame::Activation;
use crate::runtime::{self, Console, expect_int};
use crate::{RuntimeError, Stack, VmSettings};

/// What the collector may treat as live during an allocating step: the
/// published stack range and the global area.
pub(crate) struct Roots<'a> {
    stack: &'a [Value],
    globals: &'a [Value],
}

impl RootProvider for Roots<'_> {
    fn visit_roots(&self, visitor: &mut dyn FnMut(Value)) {
        for &value in self.stack.iter().chain(self.globals) {
            visitor(value);
        }
    }
}

// Borrows the two fields directly so the heap can be borrowed mutably
// alongside.
macro_rules! roots {
    ($self:ident) => {
        &Roots {
            stack: $self.stack.live(),
            globals: &$self.globals,
        }
    };
}

enum Flow {
    Continue,
    Halt,
}

/// Executes a [`ProgramImage`] from code offset 0 until the stop opcode or a
/// return from the outermost frame.
pub struct Interpreter<'a, C: Console> {
    decoder: Decoder<'a>,
    file_name: String,
    stack: Stack,
    globals: Vec<Value>,
    heap: Heap,
    /// Current frame pointer and the record stored there.
    frame: Option<(usize, Activation)>,
    console: C,
    line: u32,
}

impl<'a, C: Console> Interpreter<'a, C> {
    /// `file_name` only appears in match-failure diagnostics.
    pub fn new(
        image: &'a ProgramImage,
        file_name: impl Into<String>,
        settings: VmSettings,
        console: C,
    ) -> Result<Self, RuntimeError> {
        settings.validate().map_err(RuntimeError::InvalidSettings)?;
        Ok(Self {
            decoder: Decoder::new(image),
            file_name: file_name.into(),
            stack: Stack::new(settings.stack_words),
            globals: image.new_global_area(),
            heap: Heap::new(settings.heap),
            frame: None,
            console,
            line: 0,
        })
    }

    pub fn run(&mut self) -> Result<(), RuntimeError> {
        log::debug!(
            "running {} (stack bound {} words)",
            self.file_name,
            self.stack.limit()
        );
        let mut steps: u64 = 0;
        loop {
            steps += 1;
            match self.step() {
                Ok(Flow::Continue) => {}
                Ok(Flow::Halt) => break,
                Err(err) => {
                    log::debug!(
                        "aborted after {steps} instructions (last line {}): {err}",
                        self.line
                    );
                    return Err(err);
                }
            }
        }
        log::debug!(
            "halted after {steps} instructions, stack top {}, {:?}",
            self.stack.top(),
            self.heap.stats()
        );
        Ok(())
    }

    /// The live operand stack, bottom first.
    pub fn stack(&self) -> &[Value] {
        self.stack.live()
    }

    /// The value left on top of the stack, if any.
    pub fn result(&self) -> Option<Value> {
        self.stack.peek().ok()
    }

    pub fn globals(&self) -> &[Value] {
        &self.globals
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn frame_pointer(&self) -> Option<usize> {
        self.frame.map(|(fp, _)| fp)
    }

    // ── dispatch ───────────────────────────────────────────────────

    fn step(&mut self) -> Result<Flow, RuntimeError> {
        let offset = self.decoder.offset();
        let op = self.decoder.fetch_opcode()?;
        log::trace!("{offset:#010x}: {:?} (sp {})", op, self.stack.top());

        match op {
            Opcode::Binop(bin) => {
                let y = expect_int(self.stack.pop()?)?;
                let x = expect_int(self.stack.pop()?)?;
                let result = binop(bin, x, y).ok_or(RuntimeError::DivisionByZero { offset })?;
                self.stack.push(Value::int(result))?;
            }

            Opcode::Const => {
                let n = self.decoder.fetch_i32()?;
                self.stack.push(Value::int(n))?;
            }
            Opcode::String => {
                let offset = self.decoder.fetch_u32()?;
                let bytes = self.decoder.fetch_str(offset)?;
                let r = self.heap.alloc_string(roots!(self), bytes);
                self.stack.push(Value::Ref(r))?;
            }
            Opcode::Sexp => {
                let name = self.decoder.fetch_u32()?;
                let tag = object::tag_hash(self.decoder.fetch_str(name)?)?;
                let arity = self.decoder.fetch_u32()? as usize;
                let fields = self.stack.pop_many(arity)?;
                let r = self.heap.alloc_sexp(roots!(self), tag, &fields);
                self.stack.push(Value::Ref(r))?;
            }
            Opcode::Sti => {
                let value = self.stack.pop()?;
                let target = self.stack.pop()?;
                let addr = target.as_addr().ok_or(RuntimeError::TypeError {
                    expected: "address",
                    got: target,
                })?;
                self.store(addr, value)?;
                self.stack.push(value)?;
            }
            Opcode::Sta => {
                let value = self.stack.pop()?;
                let index = self.stack.pop()?;
                let base = self.stack.pop()?;
                match index {
                    Value::Int(i) => runtime::sta(&mut self.heap, base, i, value)?,
                    Value::Addr(addr) => self.store(addr, value)?,
                    Value::Ref(_) => {
                        return Err(RuntimeError::TypeError {
                            expected: "index or address",
                            got: index,
                        });
                    }
                }
                self.stack.push(value)?;
            }
            Opcode::Jmp => {
                let target = self.decoder.fetch_u32()?;
                self.decoder.jump(target)?;
            }
            Opcode::End | Opcode::Ret => return self.leave(),
            Opcode::Drop => {
                self.stack.pop()?;
            }
            Opcode::Dup => {
                let top = self.stack.peek()?;
                self.stack.push(top)?;
            }
            Opcode::Swap => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push(a)?;
                self.stack.push(b)?;
            }
            Opcode::Elem => {
                let index = expect_int(self.stack.pop()?)?;
                let aggregate = self.stack.pop()?;
                let value = runtime::elem(&self.heap, aggregate, index)?;
                self.stack.push(value)?;
            }

            Opcode::Ld(mem) => {
                let index = self.decoder.fetch_u32()?;
                let addr = self.var_addr(mem, index, "LD")?;
                let value = self.load(addr)?;
                self.stack.push(value)?;
            }
            Opcode::Lda(mem) => {
                let index = self.decoder.fetch_u32()?;
                let addr = Value::Addr(self.var_addr(mem, index, "LDA")?);
                self.stack.push(addr)?;
                self.stack.push(addr)?;
            }
            Opcode::St(mem) => {
                let index = self.decoder.fetch_u32()?;
                let value = self.stack.peek()?;
                let addr = self.var_addr(mem, index, "ST")?;
                self.store(addr, value)?;
            }

            Opcode::CjmpZ | Opcode::CjmpNz => {
                let target = self.decoder.fetch_u32()?;
                let cond = expect_int(self.stack.pop()?)?;
                if (cond == 0) == (op == Opcode::CjmpZ) {
                    self.decoder.jump(target)?;
                }
            }
            Opcode::Begin => {
                let nargs = self.decoder.fetch_u32()? as usize;
                let nlocals = self.decoder.fetch_u32()? as usize;
                let args = self.stack.top();
                self.stack.rewind(args + nargs + 1)?;
                let old_ip = self.return_address(args)?;
                let locals = self.stack.top();
                self.enter(args, locals, locals, nlocals, old_ip)?;
            }
            Opcode::CBegin => {
                let nargs = self.decoder.fetch_u32()? as usize;
                let nlocals = self.decoder.fetch_u32()? as usize;
                let args = self.stack.top();
                self.stack.rewind(args + nargs + 2)?;
                let captures = expect_int(self.stack.pop()?)?;
                let captures = usize::try_from(captures)
                    .map_err(|_| RuntimeError::CorruptFrame { fp: args })?;
                let old_ip = self.return_address(args)?;
                self.stack.rewind(args + nargs + 2)?;
                let accesses = self.stack.top();
                self.enter(args, accesses, accesses + captures, nlocals, old_ip)?;
            }
            Opcode::Closure => {
                let entry = self.decoder.fetch_u32()?;
                let n = self.decoder.fetch_u32()?;
                let mut captures = Vec::new();
                for _ in 0..n {
                    let (mem, index) = self.decoder.fetch_location()?;
                    let addr = self.var_addr(mem, index, "CLOSURE")?;
                    captures.push(self.load(addr)?);
                }
                let r = self.heap.alloc_closure(roots!(self), entry, &captures);
                self.stack.push(Value::Ref(r))?;
            }
            Opcode::CallC => {
                let nargs = self.decoder.fetch_u32()? as usize;
                self.call_closure(nargs)?;
            }
            Opcode::Call => {
                let target = self.decoder.fetch_u32()?;
                let nargs = self.decoder.fetch_u32()? as usize;
                let ret = self.decoder.offset();
                self.stack.push(Value::int(ret as i32))?;
                self.stack.push(Value::zero())?;
                self.decoder.jump(target)?;
                let base = self
                    .stack
                    .top()
                    .checked_sub(nargs + 2)
                    .ok_or(RuntimeError::StackUnderflow)?;
                self.stack.rewind(base)?;
            }
            Opcode::Tag => {
                let name = self.decoder.fetch_u32()?;
                let name = self.decoder.fetch_str(name)?;
                let arity = self.decoder.fetch_u32()?;
                let value = self.stack.pop()?;
                let matched = runtime::tag_patt(&self.heap, value, name, arity)?;
                self.stack.push(Value::from_bool(matched))?;
            }
            Opcode::Array => {
                let arity = self.decoder.fetch_u32()?;
                let value = self.stack.pop()?;
                let matched = runtime::array_patt(&self.heap, value, arity);
                self.stack.push(Value::from_bool(matched))?;
            }
            Opcode::Fail => {
                let line = self.decoder.fetch_u32()?;
                let column = self.decoder.fetch_u32()?;
                let value = self.stack.pop()?;
                return Err(RuntimeError::MatchFailure {
                    file: self.file_name.clone(),
                    line,
                    column,
                    value: runtime::stringify(&self.heap, value),
                });
            }
            Opcode::Line => {
                self.line = self.decoder.fetch_u32()?;
                log::trace!("line {}", self.line);
            }

            Opcode::Patt(pattern) => {
                let matched = self.pattern(pattern)?;
                self.stack.push(Value::from_bool(matched))?;
            }

            Opcode::Read => {
                let n = self.console.read_int()?;
                self.stack.push(Value::int(n))?;
            }
            Opcode::Write => {
                let n = expect_int(self.stack.pop()?)?;
                self.console.write_int(n)?;
                self.stack.push(Value::zero())?;
            }
            Opcode::Length => {
                let value = self.stack.pop()?;
                let len = runtime::length(&self.heap, value)?;
                self.stack.push(Value::int(len))?;
            }
            Opcode::Stringify => {
                let value = self.stack.pop()?;
                let text = runtime::stringify(&self.heap, value);
                let r = self.heap.alloc_string(roots!(self), text.as_bytes());
                self.stack.push(Value::Ref(r))?;
            }
            Opcode::Barray => {
                let n = self.decoder.fetch_u32()? as usize;
                let elements = self.stack.pop_many(n)?;
                let r = self.heap.alloc_array(roots!(self), &elements);
                self.stack.push(Value::Ref(r))?;
            }

            Opcode::Stop => return Ok(Flow::Halt),
        }
        Ok(Flow::Continue)
    }

    fn pattern(&mut self, pattern: Pattern) -> Result<bool, RuntimeError> {
        let value = self.stack.pop()?;
        let heap = &self.heap;
        Ok(match pattern {
            Pattern::StrEq => {
                let other = self.stack.pop()?;
                runtime::string_patt(heap, other, value)
            }
            Pattern::IsString => runtime::kind_patt(heap, value, ObjectKind::Str),
            Pattern::IsArray => runtime::kind_patt(heap, value, ObjectKind::Array),
            Pattern::IsSexp => runtime::kind_patt(heap, value, ObjectKind::Sexp),
            Pattern::IsClosure => runtime::kind_patt(heap, value, ObjectKind::Closure),
            Pattern::IsBoxed => value.is_boxed(),
            Pattern::IsUnboxed => value.is_unboxed(),
        })
    }

    // ── frames ─────────────────────────────────────────────────────

    fn current_frame(&self, op: &'static str) -> Result<Activation, RuntimeError> {
        self.frame
            .map(|(_, record)| record)
            .ok_or(RuntimeError::NoFrame { op })
    }

    /// Pop the return address a call left just above the arguments.
    fn return_address(&mut self, args: usize) -> Result<usize, RuntimeError> {
        let ip = expect_int(self.stack.pop()?)?;
        usize::try_from(ip).map_err(|_| RuntimeError::CorruptFrame { fp: args })
    }

    /// Lay out zeroed locals above `locals`, then the activation record.
    fn enter(
        &mut self,
        args: usize,
        accesses: usize,
        locals: usize,
        nlocals: usize,
        old_ip: usize,
    ) -> Result<(), RuntimeError> {
        let fp = locals + nlocals;
        self.stack.rewind(fp)?;
        for slot in locals..fp {
            self.stack.set(slot, Value::zero())?;
        }
        let record = Activation {
            args,
            locals,
            accesses,
            old_fp: self.frame_pointer(),
            old_ip,
        };
        record.push_at(&mut self.stack, fp)?;
        log::trace!("enter frame at {fp}: {record:?}");
        self.frame = Some((fp, record));
        Ok(())
    }

    fn leave(&mut self) -> Result<Flow, RuntimeError> {
        let Some((fp, record)) = self.frame else {
            return Ok(Flow::Halt);
        };
        let Some(old_fp) = record.old_fp else {
            log::trace!("return from outermost frame at {fp}");
            return Ok(Flow::Halt);
        };
        let result = self.stack.pop()?;
        self.decoder.jump(record.old_ip as u32)?;
        self.stack.rewind(record.args)?;
        self.frame = Some((old_fp, Activation::read(&self.stack, old_fp)?));
        self.stack.push(result)?;
        log::trace!("leave frame at {fp}, back to {old_fp}");
        Ok(Flow::Continue)
    }

    /// `CALLC`: drop the closure from below the arguments, then lay out the
    /// return address, capture count and one address per capture above
    /// them for `CBEGIN` to pick up.
    fn call_closure(&mut self, nargs: usize) -> Result<(), RuntimeError> {
        let top = self.stack.top();
        let base = top.checked_sub(nargs + 1).ok_or(RuntimeError::StackUnderflow)?;
        let callee = self.stack.get(base)?;
        let not_closure = || RuntimeError::TypeError {
            expected: "closure",
            got: callee,
        };
        let closure = callee.as_ref().ok_or_else(not_closure)?;
        let (entry, ncaptures) = match self.heap.get(closure) {
            Some(Object::Closure { entry, captures }) => (*entry, captures.len()),
            Some(_) => return Err(not_closure()),
            None => return Err(RuntimeError::DanglingReference(closure)),
        };

        for slot in base..top - 1 {
            let arg = self.stack.get(slot + 1)?;
            self.stack.set(slot, arg)?;
        }
        self.stack.rewind(top - 1)?;

        let ret = self.decoder.offset();
        self.stack.check_capacity(ncaptures + 2)?;
        self.stack.push(Value::int(ret as i32))?;
        self.stack.push(Value::int(ncaptures as i32))?;
        for i in 0..ncaptures {
            self.stack.push(Value::Addr(Address::Field {
                object: closure,
                index: i as u32 + 1,
            }))?;
        }
        self.decoder.jump(entry)?;
        self.stack.rewind(base)?;
        Ok(())
    }

    // ── variables ──────────────────────────────────────────────────

    fn var_addr(&self, mem: Mem, index: u32, op: &'static str) -> Result<Address, RuntimeError> {
        Ok(match mem {
            Mem::Global => {
                if index as usize >= self.globals.len() {
                    return Err(RuntimeError::GlobalOutOfRange {
                        index,
                        size: self.globals.len(),
                    });
                }
                Address::Global(index)
            }
            Mem::Local => Address::Stack((self.current_frame(op)?.locals + index as usize) as u32),
            Mem::Arg => Address::Stack((self.current_frame(op)?.args + index as usize) as u32),
            Mem::Capture => {
                let slot = self.current_frame(op)?.accesses + index as usize;
                let access = self.stack.get(slot)?;
                access.as_addr().ok_or(RuntimeError::TypeError {
                    expected: "capture address",
                    got: access,
                })?
            }
        })
    }

    fn load(&self, addr: Address) -> Result<Value, RuntimeError> {
        match addr {
            Address::Global(i) => self.globals.get(i as usize).copied().ok_or(
                RuntimeError::GlobalOutOfRange {
                    index: i,
                    size: self.globals.len(),
                },
            ),
            Address::Stack(i) => self.stack.get(i as usize),
            Address::Field { object, index } => {
                let obj = runtime::object(&self.heap, Value::Ref(object))?;
                obj.field(index as usize).ok_or(RuntimeError::IndexOutOfRange {
                    index: index.into(),
                    len: obj.len(),
                    kind: obj.kind().name(),
                })
            }
        }
    }

    fn store(&mut self, addr: Address, value: Value) -> Result<(), RuntimeError> {
        match addr {
            Address::Global(i) => {
                let size = self.globals.len();
                let slot = self
                    .globals
                    .get_mut(i as usize)
                    .ok_or(RuntimeError::GlobalOutOfRange { index: i, size })?;
                *slot = value;
                Ok(())
            }
            Address::Stack(i) => self.stack.set(i as usize, value),
            Address::Field { object, index } => {
                let obj = self
                    .heap
                    .get_mut(object)
                    .ok_or(RuntimeError::DanglingReference(object))?;
                if obj.set_field(index as usize, value) {
                    Ok(())
                } else {
                    Err(RuntimeError::IndexOutOfRange {
                        index: index.into(),
                        len: obj.len(),
                        kind: obj.kind().name(),
                    })
                }
            }
        }
    }
}

/// `None` on division or remainder by zero. Results are wrapped to the
/// unboxed range by the caller.
fn binop(op: BinOp, x: i32, y: i32) -> Option<i32> {
    Some(match op {
        BinOp::Add => x.wrapping_add(y),
        BinOp::Sub => x.wrapping_sub(y),
        BinOp::Mul => x.wrapping_mul(y),
        BinOp::Div => x.checked_div(y)?,
        BinOp::Rem => x.checked_rem(y)?,
        BinOp::Lt => (x < y) as i32,
        BinOp::Le => (x <= y) as i32,
        BinOp::Gt => (x > y) as i32,
        BinOp::Ge => (x >= y) as i32,
        BinOp::Eq => (x == y) as i32,
        BinOp::Ne => (x != y) as i32,
        BinOp::And => (x != 0 && y != 0) as i32,
        BinOp::Or => (x != 0 || y != 0) as i32,
    })
}
