use object::Value;

use crate::RuntimeError;

/// The operand stack.
///
/// One contiguous buffer bounded by `limit` words for the whole run. Words
/// are materialized lazily as the top first reaches them and are never
/// released, so a slot above `top` keeps the last value written there. Frame
/// entry relies on that: `CALL` leaves the return address above the new top
/// and `BEGIN` pops it back.
#[derive(Debug, Clone)]
pub struct Stack {
    slots: Vec<Value>,
    top: usize,
    limit: usize,
}

impl Stack {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            slots: Vec::new(),
            top: 0,
            limit,
        }
    }

    #[inline(always)]
    pub fn top(&self) -> usize {
        self.top
    }

    #[inline(always)]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// The published range `[0, top)`: every word the collector must see.
    #[inline(always)]
    pub fn live(&self) -> &[Value] {
        &self.slots[..self.top]
    }

    /// Fails unless `n` more words fit under the limit.
    #[inline(always)]
    pub fn check_capacity(&self, n: usize) -> Result<(), RuntimeError> {
        match self.top.checked_add(n) {
            Some(end) if end <= self.limit => Ok(()),
            _ => Err(RuntimeError::StackOverflow { limit: self.limit }),
        }
    }

    #[inline(always)]
    pub fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        self.check_capacity(1)?;
        if self.top < self.slots.len() {
            self.slots[self.top] = value;
        } else {
            self.slots.push(value);
        }
        self.top += 1;
        Ok(())
    }

    #[inline(always)]
    pub fn pop(&mut self) -> Result<Value, RuntimeError> {
        if self.top == 0 {
            return Err(RuntimeError::StackUnderflow);
        }
        self.top -= 1;
        Ok(self.slots[self.top])
    }

    #[inline(always)]
    pub fn peek(&self) -> Result<Value, RuntimeError> {
        match self.top {
            0 => Err(RuntimeError::StackUnderflow),
            top => Ok(self.slots[top - 1]),
        }
    }

    /// Move the top to `to`, in either direction. Newly reached words are
    /// zero-filled; words already materialized keep their contents.
    pub fn rewind(&mut self, to: usize) -> Result<(), RuntimeError> {
        if to > self.limit {
            return Err(RuntimeError::StackOverflow { limit: self.limit });
        }
        if to > self.slots.len() {
            self.slots.resize(to, Value::zero());
        }
        self.top = to;
        Ok(())
    }

    /// Pop `n` words, returning them bottom first.
    pub fn pop_many(&mut self, n: usize) -> Result<Vec<Value>, RuntimeError> {
        let base = self.top.checked_sub(n).ok_or(RuntimeError::StackUnderflow)?;
        let values = self.slots[base..self.top].to_vec();
        self.top = base;
        Ok(values)
    }

    #[inline(always)]
    pub fn get(&self, index: usize) -> Result<Value, RuntimeError> {
        self.slots
            .get(index)
            .copied()
            .ok_or(RuntimeError::StackIndex { index })
    }

    #[inline(always)]
    pub fn set(&mut self, index: usize, value: Value) -> Result<(), RuntimeError> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(RuntimeError::StackIndex { index })?;
        *slot = value;
        Ok(())
    }
}
