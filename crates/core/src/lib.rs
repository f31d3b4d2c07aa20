//! Core data model shared by the compiler and the VM: the `Value` type, the
//! heap-allocated object kinds, the tracing garbage collector, the
//! open-addressed hash table, and the `Chunk`/`OpCode` bytecode container.
//!
//! This crate deliberately knows nothing about lexical scope, call frames,
//! or source text — those live in `ember-compiler` and `ember-vm`. The
//! [`heap::GcRoots`] trait is the seam that lets this crate's collector
//! trace roots it doesn't otherwise know about.

pub mod chunk;
pub mod heap;
pub mod object;
pub mod table;
pub mod value;

pub use chunk::{Chunk, OpCode};
pub use heap::{GcRoots, Heap, Marker, GC_GROW_FACTOR};
pub use object::{
    fnv1a_hash, NativeFn, ObjBoundMethod, ObjClass, ObjClosure, ObjFunction, ObjHeader,
    ObjInstance, ObjKind, ObjNative, ObjString, ObjUpvalue, ObjectRef, UpvalueLocation,
};
pub use table::Table;
pub use value::{format_number, Value};
