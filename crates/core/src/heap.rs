//! The heap: sole owner of every allocated object, and the tracing
//! mark-and-sweep collector that reclaims them (§4.4).
//!
//! The heap knows how to trace the *internals* of every object kind (a
//! `Function`'s constants, a `Closure`'s upvalues, and so on) because those
//! kinds are defined in this crate. It does not know about the VM's stack,
//! call frames or the compiler's in-progress state — those are external
//! root sets, supplied through the [`GcRoots`] trait so this crate stays
//! decoupled from `ember-vm` and `ember-compiler`.

use std::cell::Cell;
use std::ptr::NonNull;

use crate::chunk::Chunk;
use crate::object::{
    fnv1a_hash, ObjBoundMethod, ObjClass, ObjClosure, ObjFunction, ObjHeader, ObjInstance,
    ObjKind, ObjNative, ObjString, ObjUpvalue, ObjectRef, NativeFn, UpvalueLocation,
};
use crate::table::Table;
use crate::value::Value;

/// Grows `next_gc` by this factor after every collection (§4.4).
pub const GC_GROW_FACTOR: f64 = 2.0;

/// A type that can hand the garbage collector its set of GC roots: every
/// `Value`/`ObjectRef` reachable from outside the heap. `ember-vm`'s `Vm`
/// and `ember-compiler`'s active compiler chain both implement this.
pub trait GcRoots {
    fn mark_roots(&self, marker: &mut Marker<'_>);
}

/// Accumulates the gray worklist during the mark phase. `mark_value` and
/// `mark_object` are the only ways external crates touch the collector.
pub struct Marker<'a> {
    heap: &'a mut Heap,
}

impl<'a> Marker<'a> {
    pub fn mark_value(&mut self, value: Value) {
        if value.is_object() {
            self.mark_object(value.as_object());
        }
    }

    pub fn mark_object(&mut self, obj: ObjectRef) {
        if obj.is_marked() {
            return;
        }
        obj.set_marked(true);
        self.heap.gray_stack.push(obj);
    }
}

pub struct Heap {
    objects: Option<NonNull<ObjHeader>>,
    strings: Table,
    gray_stack: Vec<ObjectRef>,
    pub bytes_allocated: usize,
    pub next_gc: usize,
    pub stress_gc: bool,
    /// Multiplier applied to `bytes_allocated` to compute `next_gc` after a
    /// collection. Defaults to [`GC_GROW_FACTOR`]; exposed so `VmConfig` can
    /// tune it.
    pub grow_factor: f64,
    /// Collections run so far, exposed for diagnostics/tracing (§10).
    pub collections_run: usize,
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            objects: None,
            strings: Table::new(),
            gray_stack: Vec::new(),
            bytes_allocated: 0,
            next_gc: 1024 * 1024,
            stress_gc: false,
            grow_factor: GC_GROW_FACTOR,
            collections_run: 0,
        }
    }

    fn link(&mut self, header: NonNull<ObjHeader>) {
        unsafe {
            header.as_ref().next.set(self.objects);
        }
        self.objects = Some(header);
    }

    fn account(&mut self, bytes: usize) {
        self.bytes_allocated += bytes;
    }

    /// Runs a collection now if the stress flag is set or the allocation
    /// budget is exhausted (§4.4).
    pub fn maybe_collect(&mut self, roots: &dyn GcRoots) {
        if self.stress_gc || self.bytes_allocated > self.next_gc {
            self.collect(roots);
        }
    }

    pub fn collect(&mut self, roots: &dyn GcRoots) {
        {
            let mut marker = Marker { heap: self };
            roots.mark_roots(&mut marker);
        }

        while let Some(obj) = self.gray_stack.pop() {
            self.blacken(obj);
        }

        self.strings.remove_white();
        self.sweep();

        self.next_gc = ((self.bytes_allocated as f64) * self.grow_factor) as usize;
        self.collections_run += 1;
    }

    fn blacken(&mut self, obj: ObjectRef) {
        match obj.kind() {
            ObjKind::String | ObjKind::Native => {}
            ObjKind::Function => {
                let function = obj.as_function();
                if let Some(name) = function.name {
                    self.mark_now(name);
                }
                for constant in &function.chunk.constants {
                    self.mark_value_now(*constant);
                }
            }
            ObjKind::Closure => {
                let closure = obj.as_closure();
                self.mark_now(closure.function);
                for upvalue in closure.upvalues.iter() {
                    self.mark_now(*upvalue);
                }
            }
            ObjKind::Upvalue => {
                let upvalue = obj.as_upvalue();
                if let UpvalueLocation::Closed(v) = unsafe { &*upvalue.location.as_ptr() } {
                    self.mark_value_now(*v);
                }
            }
            ObjKind::Class => {
                let class = obj.as_class();
                self.mark_now(class.name);
                for (key, value) in class.methods.iter() {
                    self.mark_now(key);
                    self.mark_value_now(value);
                }
            }
            ObjKind::Instance => {
                let instance = obj.as_instance();
                self.mark_now(instance.class);
                for (key, value) in instance.fields.iter() {
                    self.mark_now(key);
                    self.mark_value_now(value);
                }
            }
            ObjKind::BoundMethod => {
                let bound = obj.as_bound_method();
                self.mark_value_now(bound.receiver);
                self.mark_now(bound.method);
            }
        }
    }

    fn mark_now(&mut self, obj: ObjectRef) {
        if !obj.is_marked() {
            obj.set_marked(true);
            self.gray_stack.push(obj);
        }
    }

    fn mark_value_now(&mut self, value: Value) {
        if value.is_object() {
            self.mark_now(value.as_object());
        }
    }

    fn sweep(&mut self) {
        let mut previous: Option<NonNull<ObjHeader>> = None;
        let mut current = self.objects;
        while let Some(node) = current {
            let header = unsafe { node.as_ref() };
            let next = header.next.get();
            if header.marked.get() {
                header.marked.set(false);
                previous = Some(node);
            } else {
                match previous {
                    Some(prev) => unsafe { prev.as_ref().next.set(next) },
                    None => self.objects = next,
                }
                unsafe { free_object(node) };
            }
            current = next;
        }
    }

    // ---- allocation ----

    fn alloc_header(&mut self, kind: ObjKind) -> ObjHeader {
        ObjHeader { kind, marked: Cell::new(false), next: Cell::new(None) }
    }

    fn finish_alloc<T>(&mut self, boxed: Box<T>, bytes: usize) -> ObjectRef
    where
        T: HasHeader,
    {
        let ptr = Box::into_raw(boxed);
        let header_ptr = unsafe { NonNull::new_unchecked(ptr as *mut ObjHeader) };
        self.link(header_ptr);
        self.account(bytes);
        unsafe { ObjectRef::from_header(header_ptr) }
    }

    /// Interns `bytes`, returning the canonical `ObjString` object (I2).
    pub fn intern(&mut self, bytes: &[u8]) -> ObjectRef {
        let hash = fnv1a_hash(bytes);
        if let Some(existing) = self.strings.find_string(bytes, hash) {
            return existing;
        }
        let mut owned = Vec::with_capacity(bytes.len() + 1);
        owned.extend_from_slice(bytes);
        owned.push(0);
        let size = std::mem::size_of::<ObjString>() + owned.len();
        let header = self.alloc_header(ObjKind::String);
        let obj = self.finish_alloc(
            Box::new(ObjString { header, hash, bytes: owned.into_boxed_slice() }),
            size,
        );
        self.strings.set(obj, Value::nil());
        obj
    }

    pub fn intern_str(&mut self, s: &str) -> ObjectRef {
        self.intern(s.as_bytes())
    }

    pub fn alloc_function(&mut self, arity: u8, name: Option<ObjectRef>) -> ObjectRef {
        let header = self.alloc_header(ObjKind::Function);
        self.finish_alloc(
            Box::new(ObjFunction {
                header,
                arity,
                upvalue_count: 0,
                name,
                chunk: Chunk::new(),
            }),
            std::mem::size_of::<ObjFunction>(),
        )
    }

    pub fn alloc_native(&mut self, name: ObjectRef, function: NativeFn) -> ObjectRef {
        let header = self.alloc_header(ObjKind::Native);
        self.finish_alloc(
            Box::new(ObjNative { header, function, name }),
            std::mem::size_of::<ObjNative>(),
        )
    }

    pub fn alloc_closure(&mut self, function: ObjectRef, upvalues: Vec<ObjectRef>) -> ObjectRef {
        let header = self.alloc_header(ObjKind::Closure);
        let size = std::mem::size_of::<ObjClosure>() + upvalues.len() * std::mem::size_of::<ObjectRef>();
        self.finish_alloc(
            Box::new(ObjClosure { header, function, upvalues: upvalues.into_boxed_slice() }),
            size,
        )
    }

    pub fn alloc_upvalue(&mut self, slot: NonNull<Value>) -> ObjectRef {
        let header = self.alloc_header(ObjKind::Upvalue);
        self.finish_alloc(
            Box::new(ObjUpvalue {
                header,
                location: Cell::new(UpvalueLocation::Open(slot)),
                next_open: Cell::new(None),
            }),
            std::mem::size_of::<ObjUpvalue>(),
        )
    }

    pub fn alloc_class(&mut self, name: ObjectRef) -> ObjectRef {
        let header = self.alloc_header(ObjKind::Class);
        self.finish_alloc(
            Box::new(ObjClass { header, name, methods: Table::new() }),
            std::mem::size_of::<ObjClass>(),
        )
    }

    pub fn alloc_instance(&mut self, class: ObjectRef) -> ObjectRef {
        let header = self.alloc_header(ObjKind::Instance);
        self.finish_alloc(
            Box::new(ObjInstance { header, class, fields: Table::new() }),
            std::mem::size_of::<ObjInstance>(),
        )
    }

    pub fn alloc_bound_method(&mut self, receiver: Value, method: ObjectRef) -> ObjectRef {
        let header = self.alloc_header(ObjKind::BoundMethod);
        self.finish_alloc(
            Box::new(ObjBoundMethod { header, receiver, method }),
            std::mem::size_of::<ObjBoundMethod>(),
        )
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        let mut current = self.objects;
        while let Some(node) = current {
            let next = unsafe { node.as_ref().next.get() };
            unsafe { free_object(node) };
            current = next;
        }
    }
}

/// Marker trait tying a concrete `Obj*` type to the fact that its first
/// field is an `ObjHeader`, which is what makes the `Box::into_raw` /
/// `Box::from_raw` round-trip through `*mut ObjHeader` sound.
trait HasHeader {}
impl HasHeader for ObjString {}
impl HasHeader for ObjFunction {}
impl HasHeader for ObjNative {}
impl HasHeader for ObjClosure {}
impl HasHeader for ObjUpvalue {}
impl HasHeader for ObjClass {}
impl HasHeader for ObjInstance {}
impl HasHeader for ObjBoundMethod {}

/// # Safety
/// `ptr` must have been produced by `Box::into_raw` on one of the `Obj*`
/// types above, cast to `*mut ObjHeader`, and not yet freed.
unsafe fn free_object(ptr: NonNull<ObjHeader>) {
    let kind = ptr.as_ref().kind;
    match kind {
        ObjKind::String => drop(Box::from_raw(ptr.as_ptr() as *mut ObjString)),
        ObjKind::Function => drop(Box::from_raw(ptr.as_ptr() as *mut ObjFunction)),
        ObjKind::Native => drop(Box::from_raw(ptr.as_ptr() as *mut ObjNative)),
        ObjKind::Closure => drop(Box::from_raw(ptr.as_ptr() as *mut ObjClosure)),
        ObjKind::Upvalue => drop(Box::from_raw(ptr.as_ptr() as *mut ObjUpvalue)),
        ObjKind::Class => drop(Box::from_raw(ptr.as_ptr() as *mut ObjClass)),
        ObjKind::Instance => drop(Box::from_raw(ptr.as_ptr() as *mut ObjInstance)),
        ObjKind::BoundMethod => drop(Box::from_raw(ptr.as_ptr() as *mut ObjBoundMethod)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoRoots;
    impl GcRoots for NoRoots {
        fn mark_roots(&self, _marker: &mut Marker<'_>) {}
    }

    #[test]
    fn interning_canonicalizes_equal_bytes() {
        let mut heap = Heap::new();
        let a = heap.intern_str("hello");
        let b = heap.intern_str("hello");
        assert_eq!(a, b);
        let c = heap.intern_str("world");
        assert_ne!(a, c);
    }

    #[test]
    fn collect_frees_unreachable_strings() {
        let mut heap = Heap::new();
        let _kept = heap.intern_str("kept");
        {
            let _dropped = heap.intern_str("dropped");
        }
        heap.collect(&NoRoots);
        // "kept" was rooted by nothing either, in this minimal test, so a
        // real collection sweeps everything unreachable from NoRoots.
        assert!(heap.strings.find_string(b"kept", fnv1a_hash(b"kept")).is_none());
    }

    #[test]
    fn table_set_get_delete_roundtrip() {
        let mut heap = Heap::new();
        let key = heap.intern_str("x");
        let mut table = Table::new();
        assert!(table.set(key, Value::number(1.0)));
        assert_eq!(table.get(key), Some(Value::number(1.0)));
        assert!(!table.set(key, Value::number(2.0)));
        assert_eq!(table.get(key), Some(Value::number(2.0)));
        assert!(table.delete(key));
        assert_eq!(table.get(key), None);
    }
}
