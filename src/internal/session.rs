//! Per-call resolution state used for cycle and depth detection.

use std::cell::RefCell;

use crate::error::{DiError, DiResult};

/// In-flight identifiers for one top-level resolution.
///
/// A session is created by `Container::get`/`make` and passed by reference
/// through the whole recursive call chain, so concurrent resolutions never
/// share a stack.
pub(crate) struct ResolutionSession {
    stack: RefCell<Vec<String>>,
    max_depth: usize,
}

impl ResolutionSession {
    pub(crate) fn new(max_depth: usize) -> Self {
        Self {
            stack: RefCell::new(Vec::new()),
            max_depth,
        }
    }

    /// Pushes `id`, failing if it is already being resolved on this path
    /// or if the path is too deep. The returned guard pops on drop, so the
    /// stack unwinds on both success and error.
    pub(crate) fn enter(&self, id: &str) -> DiResult<SessionGuard<'_>> {
        let mut stack = self.stack.borrow_mut();

        // Circular detection BEFORE pushing the new id
        if let Some(start) = stack.iter().position(|entry| entry == id) {
            let mut path: Vec<String> = stack[start..].to_vec();
            path.push(id.to_string());
            return Err(DiError::Circular { path });
        }

        if stack.len() >= self.max_depth {
            return Err(DiError::DepthExceeded(self.max_depth));
        }

        stack.push(id.to_string());
        Ok(SessionGuard { session: self })
    }

    pub(crate) fn depth(&self) -> usize {
        self.stack.borrow().len()
    }

    /// Current path, outermost first.
    pub(crate) fn path(&self) -> Vec<String> {
        self.stack.borrow().clone()
    }
}

pub(crate) struct SessionGuard<'s> {
    session: &'s ResolutionSession,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.session.stack.borrow_mut().pop();
    }
}
