use object::Value;

use crate::{RuntimeError, Stack};

/// `old_fp` of the outermost frame. Returning from such a frame ends the run.
pub const NO_FRAME: i32 = -1;

/// Words an activation record occupies on the stack.
pub const RECORD_WORDS: usize = 5;

/// Bookkeeping for one call, written in place on the operand stack at the
/// frame pointer as five boxed words in field order.
///
/// ```text
///   args      first argument
///   locals    first local
///   accesses  first capture address (closure frames only)
///   old_fp    caller's frame pointer, or NO_FRAME
///   old_ip    code offset to resume at
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    pub args: usize,
    pub locals: usize,
    pub accesses: usize,
    pub old_fp: Option<usize>,
    pub old_ip: usize,
}

impl Activation {
    fn words(&self) -> [i32; RECORD_WORDS] {
        [
            self.args as i32,
            self.locals as i32,
            self.accesses as i32,
            self.old_fp.map_or(NO_FRAME, |fp| fp as i32),
            self.old_ip as i32,
        ]
    }

    /// Store the record at `fp..fp + RECORD_WORDS` and move the top past it.
    pub fn push_at(&self, stack: &mut Stack, fp: usize) -> Result<(), RuntimeError> {
        stack.rewind(fp)?;
        stack.check_capacity(RECORD_WORDS)?;
        for word in self.words() {
            stack.push(Value::int(word))?;
        }
        Ok(())
    }

    pub fn read(stack: &Stack, fp: usize) -> Result<Self, RuntimeError> {
        let mut words = [0i32; RECORD_WORDS];
        for (i, word) in words.iter_mut().enumerate() {
            *word = stack
                .get(fp + i)?
                .as_int()
                .ok_or(RuntimeError::CorruptFrame { fp })?;
        }
        let index = |n: i32| usize::try_from(n).map_err(|_| RuntimeError::CorruptFrame { fp });
        Ok(Self {
            args: index(words[0])?,
            locals: index(words[1])?,
            accesses: index(words[2])?,
            old_fp: match words[3] {
                NO_FRAME => None,
                n => Some(index(n)?),
            },
            old_ip: index(words[4])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_round_trips_through_the_stack() {
        let mut stack = Stack::new(16);
        let outer = Activation {
            args: 0,
            locals: 2,
            accesses: 2,
            old_fp: None,
            old_ip: 0,
        };
        outer.push_at(&mut stack, 3).unwrap();
        assert_eq!(stack.top(), 3 + RECORD_WORDS);
        assert_eq!(stack.get(6).unwrap(), Value::int(NO_FRAME));
        assert_eq!(Activation::read(&stack, 3).unwrap(), outer);

        let inner = Activation {
            args: 8,
            locals: 10,
            accesses: 9,
            old_fp: Some(3),
            old_ip: 42,
        };
        inner.push_at(&mut stack, 11).unwrap();
        assert_eq!(Activation::read(&stack, 11).unwrap(), inner);
    }

    #[test]
    fn record_that_does_not_fit_overflows() {
        let mut stack = Stack::new(6);
        let record = Activation {
            args: 0,
            locals: 0,
            accesses: 0,
            old_fp: None,
            old_ip: 0,
        };
        assert!(matches!(
            record.push_at(&mut stack, 2),
            Err(RuntimeError::StackOverflow { limit: 6 })
        ));
    }

    #[test]
    fn boxed_word_in_record_is_corrupt() {
        let mut stack = Stack::new(8);
        for _ in 0..RECORD_WORDS {
            stack.push(Value::Ref(object::ObjRef(0))).unwrap();
        }
        assert!(matches!(
            Activation::read(&stack, 0),
            Err(RuntimeError::CorruptFrame { fp: 0 })
        ));
    }
}
