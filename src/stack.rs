//! Execution stack and the values that live on it.
//!
//! Opcodes that produce booleans or numbers push them as such instead of
//! immediately serializing; every value still has exactly one canonical byte
//! projection, and comparisons, hashing and signature checks all go through
//! it. Byte chunks are reference-counted so duplication opcodes never copy
//! payloads.

use crate::num::{NumError, ScriptNum};
use std::borrow::Cow;
use std::sync::Arc;

/// Stack error type.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum StackError {
    #[error("insufficient stack elements for operation")]
    Underflow,
    #[error(transparent)]
    Num(#[from] NumError),
}

/// A single element of the execution stack.
#[derive(Debug, Clone)]
pub enum StackValue {
    Bool(bool),
    Num(i64),
    Chunk(Arc<[u8]>),
}

impl StackValue {
    pub fn chunk(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::Chunk(bytes.into())
    }

    /// The canonical byte projection: `false` is empty, `true` is `[1]`,
    /// numbers use their minimal encoding, chunks are themselves.
    pub fn as_bytes(&self) -> Cow<'_, [u8]> {
        match self {
            Self::Bool(false) => Cow::Borrowed(&[]),
            Self::Bool(true) => Cow::Borrowed(&[1]),
            Self::Num(n) => Cow::Owned(ScriptNum::from(*n).to_bytes()),
            Self::Chunk(bytes) => Cow::Borrowed(bytes),
        }
    }

    /// Length of the canonical byte projection.
    pub fn len(&self) -> usize {
        match self {
            Self::Bool(false) => 0,
            Self::Bool(true) => 1,
            Self::Num(n) => ScriptNum::from(*n).to_bytes().len(),
            Self::Chunk(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Truthiness: any non-zero byte counts, except a lone sign bit in the
    /// last position (negative zero).
    pub fn cast_to_bool(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Num(n) => *n != 0,
            Self::Chunk(bytes) => cast_bytes_to_bool(bytes),
        }
    }

    /// Numeric reinterpretation under the operand length bound.
    ///
    /// Values already held as booleans or numbers are canonically encoded and
    /// only need the length check; chunks go through the strict decoder.
    pub fn cast_to_num(
        &self,
        require_minimal: bool,
        max_size: Option<usize>,
    ) -> Result<ScriptNum, NumError> {
        match self {
            Self::Bool(b) => Ok(ScriptNum::from(*b as i64)),
            Self::Num(n) => {
                let num = ScriptNum::from(*n);
                if num.to_bytes().len() > max_size.unwrap_or(ScriptNum::MAX_NUM_SIZE) {
                    return Err(NumError::Overflow);
                }
                Ok(num)
            }
            Self::Chunk(bytes) => ScriptNum::from_bytes(bytes, require_minimal, max_size),
        }
    }
}

impl PartialEq for StackValue {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for StackValue {}

fn cast_bytes_to_bool(bytes: &[u8]) -> bool {
    let Some((&last, rest)) = bytes.split_last() else {
        return false;
    };
    rest.iter().any(|&b| b != 0) || (last != 0 && last != 0x80)
}

/// The execution stack.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stack {
    data: Vec<StackValue>,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a stack from witness elements, bottom-first.
    pub fn from_witness(elements: &[Arc<[u8]>]) -> Self {
        Self {
            data: elements
                .iter()
                .map(|e| StackValue::Chunk(Arc::clone(e)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Errors unless at least `len` elements are present.
    pub fn require(&self, len: usize) -> Result<(), StackError> {
        if self.data.len() < len {
            return Err(StackError::Underflow);
        }
        Ok(())
    }

    pub fn push(&mut self, value: StackValue) {
        self.data.push(value);
    }

    pub fn push_bool(&mut self, value: bool) {
        self.data.push(StackValue::Bool(value));
    }

    pub fn push_num(&mut self, value: impl Into<ScriptNum>) {
        self.data.push(StackValue::Num(value.into().value()));
    }

    pub fn push_chunk(&mut self, bytes: impl Into<Arc<[u8]>>) {
        self.data.push(StackValue::Chunk(bytes.into()));
    }

    pub fn pop(&mut self) -> Result<StackValue, StackError> {
        self.data.pop().ok_or(StackError::Underflow)
    }

    pub fn pop_bool(&mut self) -> Result<bool, StackError> {
        Ok(self.pop()?.cast_to_bool())
    }

    pub fn pop_num(&mut self, require_minimal: bool) -> Result<ScriptNum, StackError> {
        self.pop_num_with_size(require_minimal, None)
    }

    pub fn pop_num_with_size(
        &mut self,
        require_minimal: bool,
        max_size: Option<usize>,
    ) -> Result<ScriptNum, StackError> {
        Ok(self.pop()?.cast_to_num(require_minimal, max_size)?)
    }

    /// The element `depth` positions below the top (`0` is the top).
    pub fn peek(&self, depth: usize) -> Result<&StackValue, StackError> {
        self.data
            .len()
            .checked_sub(depth + 1)
            .and_then(|i| self.data.get(i))
            .ok_or(StackError::Underflow)
    }

    pub fn last(&self) -> Result<&StackValue, StackError> {
        self.data.last().ok_or(StackError::Underflow)
    }

    /// Removes the element `depth` positions below the top and returns it.
    pub fn remove(&mut self, depth: usize) -> Result<StackValue, StackError> {
        let index = self
            .data
            .len()
            .checked_sub(depth + 1)
            .ok_or(StackError::Underflow)?;
        Ok(self.data.remove(index))
    }

    /// Drops the top `n` elements.
    pub fn drop(&mut self, n: usize) -> Result<(), StackError> {
        self.require(n)?;
        self.data.truncate(self.data.len() - n);
        Ok(())
    }

    /// Duplicates the top `n` elements in order.
    pub fn dup(&mut self, n: usize) -> Result<(), StackError> {
        self.require(n)?;
        let start = self.data.len() - n;
        for i in start..self.data.len() {
            self.data.push(self.data[i].clone());
        }
        Ok(())
    }

    /// Copies the `n` elements below the top `n` on top: `x1 x2 -> x1 x2 x1`.
    pub fn over(&mut self, n: usize) -> Result<(), StackError> {
        self.require(2 * n)?;
        let start = self.data.len() - 2 * n;
        for i in start..start + n {
            self.data.push(self.data[i].clone());
        }
        Ok(())
    }

    /// Rotates three groups of `n` elements: `x1 x2 x3 -> x2 x3 x1`.
    pub fn rot(&mut self, n: usize) -> Result<(), StackError> {
        self.require(3 * n)?;
        let start = self.data.len() - 3 * n;
        self.data[start..].rotate_left(n);
        Ok(())
    }

    /// Swaps two groups of `n` elements: `x1 x2 -> x2 x1`.
    pub fn swap(&mut self, n: usize) -> Result<(), StackError> {
        self.require(2 * n)?;
        let start = self.data.len() - 2 * n;
        self.data[start..].rotate_left(n);
        Ok(())
    }

    /// Removes the element below the top: `x1 x2 -> x2`.
    pub fn nip(&mut self) -> Result<(), StackError> {
        self.remove(1).map(|_| ())
    }

    /// Copies the top element below the second: `x1 x2 -> x2 x1 x2`.
    pub fn tuck(&mut self) -> Result<(), StackError> {
        self.require(2)?;
        let top = self.data[self.data.len() - 1].clone();
        self.data.insert(self.data.len() - 2, top);
        Ok(())
    }

    /// Consumes the stack, exposing its elements bottom-first.
    pub fn into_inner(self) -> Vec<StackValue> {
        self.data
    }
}
