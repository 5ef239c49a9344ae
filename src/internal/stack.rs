//! Per-call-path resolution stack for dependency loop detection.

use std::cell::RefCell;

use crate::context::ContextId;
use crate::error::{DiError, DiResult};
use crate::key::Key;

const MAX_DEPTH: usize = 256;

// Loop detection is only meaningful along a single logical call chain, so the
// stack is strictly thread-local and never shared.
thread_local! {
    static RESOLUTION_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// One in-flight construction: the key, the cache-context identity, and the
/// override level. The level is part of the match so that override
/// delegation (level + 1 on the same key and context) is not a false loop.
pub(crate) struct Frame {
    pub(crate) key: Key,
    pub(crate) context: ContextId,
    pub(crate) level: usize,
    pub(crate) context_name: &'static str,
}

impl Frame {
    // Only formatted when a loop is actually reported; pushes stay
    // allocation-free apart from the key clone.
    fn label(&self) -> String {
        match self.context {
            ContextId::Any => self.key.to_string(),
            ContextId::Value(..) => format!("{} in {}", self.key, self.context_name),
        }
    }
}

/// Guard that pops its frame on every exit path, including unwinds.
#[derive(Debug)]
pub(crate) struct StackGuard {
    _priv: (),
}

impl StackGuard {
    /// Checks for a loop, then pushes `frame`.
    ///
    /// On a match the full stack plus the offending frame is returned as the
    /// cycle trace and nothing is pushed.
    pub(crate) fn push(frame: Frame) -> DiResult<Self> {
        RESOLUTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack
                .iter()
                .any(|f| f.key == frame.key && f.context == frame.context && f.level == frame.level)
            {
                let mut trace: Vec<String> = stack.iter().map(Frame::label).collect();
                trace.push(frame.label());
                return Err(DiError::DependencyLoop(trace));
            }
            if stack.len() >= MAX_DEPTH {
                return Err(DiError::DepthExceeded(stack.len()));
            }
            stack.push(frame);
            Ok(())
        })?;
        Ok(StackGuard { _priv: () })
    }

    #[cfg(test)]
    pub(crate) fn depth() -> usize {
        RESOLUTION_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        RESOLUTION_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}
