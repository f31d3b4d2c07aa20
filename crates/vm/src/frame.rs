//! Call frames (§4.3). Each frame is a `Closure` plus a program counter into
//! its chunk and the stack index of its slot 0.
//!
//! `ip` is an index into `chunk.code` rather than a raw pointer, and `slots`
//! is a base index into the VM's value stack rather than a raw pointer or a
//! held `&mut` reference. Both `self.frames` and `self.stack` are `Vec`s the
//! dispatch loop mutates (pushing/popping frames on call/return, pushing/
//! popping values constantly); holding indices instead of references means
//! those mutations never invalidate what a frame remembers.

use ember_core::ObjectRef;

pub struct CallFrame {
    pub closure: ObjectRef,
    pub ip: usize,
    pub slots: usize,
}

impl CallFrame {
    pub fn new(closure: ObjectRef, slots: usize) -> Self {
        CallFrame { closure, ip: 0, slots }
    }

    pub fn function(&self) -> ObjectRef {
        self.closure.as_closure().function
    }
}
