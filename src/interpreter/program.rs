//! Per-run execution context.

use crate::constants::{MAX_OPS_PER_SCRIPT, MAX_STACK_SIZE};
use crate::error::Error;
use crate::stack::Stack;

/// Conditional-branch state for `OP_IF`/`OP_NOTIF` nesting.
///
/// Tracks only the depth and the position of the first false branch, so
/// `all_true` stays constant-time no matter how deep the nesting goes.
#[derive(Debug, Default)]
pub struct ConditionStack {
    size: usize,
    first_false_pos: Option<usize>,
}

impl ConditionStack {
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn all_true(&self) -> bool {
        self.first_false_pos.is_none()
    }

    pub fn push(&mut self, value: bool) {
        if !value && self.first_false_pos.is_none() {
            self.first_false_pos = Some(self.size);
        }
        self.size += 1;
    }

    /// Pops the innermost branch state; `false` when nothing is open.
    pub fn pop(&mut self) -> bool {
        if self.size == 0 {
            return false;
        }
        self.size -= 1;
        if self.first_false_pos == Some(self.size) {
            self.first_false_pos = None;
        }
        true
    }

    /// Inverts the innermost branch state; `false` when nothing is open.
    pub fn toggle_top(&mut self) -> bool {
        if self.size == 0 {
            return false;
        }
        match self.first_false_pos {
            // Every open branch is true: the innermost becomes the first
            // false one.
            None => self.first_false_pos = Some(self.size - 1),
            // The innermost is the first false one: it becomes true.
            Some(pos) if pos == self.size - 1 => self.first_false_pos = None,
            // A false branch is open further out; the toggle is unobservable.
            Some(_) => {}
        }
        true
    }
}

/// Everything one script run owns: the primary, alternate and conditional
/// stacks plus the operation counter.
///
/// Deliberately neither `Clone` nor `Copy`. Chained runs (input script to
/// output script, output script to redeem script) thread only the primary
/// stack through [`Program::into_stack`]; every other piece of state starts
/// fresh per run.
#[derive(Debug, Default)]
pub struct Program {
    stack: Stack,
    alt_stack: Stack,
    condition: ConditionStack,
    op_count: usize,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a run with an inherited (or witness-seeded) primary stack.
    pub fn with_stack(stack: Stack) -> Self {
        Self {
            stack,
            ..Self::default()
        }
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut Stack {
        &mut self.stack
    }

    pub fn alt_stack_mut(&mut self) -> &mut Stack {
        &mut self.alt_stack
    }

    pub fn condition(&self) -> &ConditionStack {
        &self.condition
    }

    pub fn condition_mut(&mut self) -> &mut ConditionStack {
        &mut self.condition
    }

    /// Counts one non-push operation against the per-script ceiling.
    pub fn count_op(&mut self) -> Result<(), Error> {
        self.op_count += 1;
        if self.op_count > MAX_OPS_PER_SCRIPT {
            return Err(Error::InvalidOperationCount);
        }
        Ok(())
    }

    /// Counts `n` additional operations (multisig key accounting).
    pub fn count_ops(&mut self, n: usize) -> Result<(), Error> {
        self.op_count += n;
        if self.op_count > MAX_OPS_PER_SCRIPT {
            return Err(Error::InvalidOperationCount);
        }
        Ok(())
    }

    /// The combined stack ceiling, checked after every operation.
    pub fn check_stack_limit(&self) -> Result<(), Error> {
        if self.stack.len() + self.alt_stack.len() > MAX_STACK_SIZE {
            return Err(Error::InvalidStackSize);
        }
        Ok(())
    }

    /// Surrenders the primary stack for the next chained run.
    pub fn into_stack(self) -> Stack {
        self.stack
    }
}
