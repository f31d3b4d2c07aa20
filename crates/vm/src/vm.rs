//! The dispatch loop (§4.3): one value stack, one call-frame stack, a
//! globals table, an open-upvalue list, and a `Heap`.
//!
//! Every allocation site here follows the same discipline as the compiler's
//! (`ember_compiler::compiler::Compiler::intern`): check the GC threshold
//! *before* allocating, using only state that is already fully rooted, then
//! allocate and root the result (push it, write it into a table, link it
//! into the open-upvalue list) before doing anything else that could
//! allocate. Grounded the same way `FuelLabs-fuel-vm`'s `Interpreter::_instruction`
//! is: one big `match` over the opcode enum, one `?` per fallible step.

use std::io::Write as _;
use std::ptr::NonNull;

use ember_core::{GcRoots, Heap, Marker, ObjKind, ObjectRef, OpCode, Table, Value};

use crate::config::VmConfig;
use crate::error::{InterpretError, InterpretResult, RuntimeError, RuntimeFault, TraceFrame};
use crate::frame::CallFrame;
use crate::native::{self, HeapBinding};

pub struct Vm {
    heap: Heap,
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    globals: Table,
    open_upvalues: Option<ObjectRef>,
    init_string: ObjectRef,
    config: VmConfig,
    stdout: Box<dyn std::io::Write>,
}

impl Vm {
    pub fn new(config: VmConfig) -> Self {
        Self::with_stdout(config, Box::new(std::io::stdout()))
    }

    /// Builds a `Vm` that writes `print` output to `stdout` instead of the
    /// process's real standard output. Used by tests that need to assert on
    /// a program's literal output (§8's testable properties) rather than
    /// just whether it ran without a fault.
    pub fn with_stdout(config: VmConfig, stdout: Box<dyn std::io::Write>) -> Self {
        let mut heap = Heap::new();
        heap.stress_gc = config.stress_gc;
        heap.grow_factor = config.gc_grow_factor;
        let init_string = heap.intern_str("init");

        let mut vm = Vm {
            heap,
            stack: Vec::with_capacity(config.stack_capacity),
            frames: Vec::with_capacity(config.frame_capacity),
            globals: Table::new(),
            open_upvalues: None,
            init_string,
            config,
            stdout,
        };
        for entry in native::STANDARD_NATIVES.iter() {
            let (name, function) = *entry;
            vm.define_native(name, function);
        }
        vm
    }

    fn define_native(&mut self, name: &str, function: ember_core::NativeFn) {
        self.collect_if_needed();
        let name_obj = self.heap.intern_str(name);
        let native_obj = self.heap.alloc_native(name_obj, function);
        self.globals.set(name_obj, Value::object(native_obj));
    }

    /// Compiles and runs one program to completion, the bottom script frame
    /// acting as call frame 0 (§2 "Data flow").
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn interpret(&mut self, source: &[u8]) -> Result<(), InterpretError> {
        let function =
            ember_compiler::compile(source, &mut self.heap, ember_compiler::CompilerConfig::default())
                .map_err(InterpretError::Compile)?;

        self.collect_if_needed();
        let closure = self.heap.alloc_closure(function, Vec::new());
        self.push(Value::object(closure))
            .expect("a freshly reset VM always has room for the script closure");
        self.frames.push(CallFrame::new(closure, self.stack.len() - 1));

        self.run().map_err(InterpretError::Runtime)
    }

    pub fn run(&mut self) -> InterpretResult<()> {
        loop {
            match self.step() {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(error) => return Err(self.runtime_fault(error)),
            }
        }
    }

    /// Runs one opcode. Returns `Ok(true)` once the outermost (script) frame
    /// returns, which ends the program.
    fn step(&mut self) -> Result<bool, RuntimeError> {
        if self.config.trace_execution {
            self.trace_instruction();
        }
        let op = self.read_op();
        match op {
            OpCode::Constant => {
                let idx = self.read_u16();
                let value = self.constant_at(idx);
                self.push(value)?;
            }
            OpCode::Nil => self.push(Value::nil())?,
            OpCode::True => self.push(Value::bool(true))?,
            OpCode::False => self.push(Value::bool(false))?,
            OpCode::Pop => {
                self.pop();
            }
            OpCode::GetLocal => {
                let slot = self.read_u8() as usize;
                let base = self.frames.last().unwrap().slots;
                self.push(self.stack[base + slot])?;
            }
            OpCode::SetLocal => {
                let slot = self.read_u8() as usize;
                let base = self.frames.last().unwrap().slots;
                self.stack[base + slot] = self.peek(0);
            }
            OpCode::GetGlobal => {
                let idx = self.read_u16();
                let name = self.constant_at(idx).as_object();
                let value = self
                    .globals
                    .get(name)
                    .ok_or_else(|| undefined_variable(name))?;
                self.push(value)?;
            }
            OpCode::DefineGlobal => {
                let idx = self.read_u16();
                let name = self.constant_at(idx).as_object();
                let value = self.pop();
                self.globals.set(name, value);
            }
            OpCode::SetGlobal => {
                let idx = self.read_u16();
                let name = self.constant_at(idx).as_object();
                let value = self.peek(0);
                if self.globals.set(name, value) {
                    self.globals.delete(name);
                    return Err(undefined_variable(name));
                }
            }
            OpCode::GetUpvalue => {
                let slot = self.read_u8() as usize;
                let closure = self.frames.last().unwrap().closure;
                let upvalue = closure.as_closure().upvalues[slot];
                self.push(upvalue.as_upvalue().get())?;
            }
            OpCode::SetUpvalue => {
                let slot = self.read_u8() as usize;
                let closure = self.frames.last().unwrap().closure;
                let upvalue = closure.as_closure().upvalues[slot];
                upvalue.as_upvalue().set(self.peek(0));
            }
            OpCode::GetProperty => {
                let idx = self.read_u16();
                let name = self.constant_at(idx).as_object();
                self.get_property(name)?;
            }
            OpCode::SetProperty => {
                let idx = self.read_u16();
                let name = self.constant_at(idx).as_object();
                self.set_property(name)?;
            }
            OpCode::GetSuper => {
                let idx = self.read_u16();
                let name = self.constant_at(idx).as_object();
                let superclass = self.pop().as_object();
                self.bind_method(superclass, name, true)?;
            }
            OpCode::Equal => {
                let b = self.pop();
                let a = self.pop();
                self.push(Value::bool(a == b))?;
            }
            OpCode::Greater => self.binary_cmp(|a, b| a > b)?,
            OpCode::Less => self.binary_cmp(|a, b| a < b)?,
            OpCode::Add => self.add()?,
            OpCode::Subtract => self.binary_numeric(|a, b| a - b)?,
            OpCode::Multiply => self.binary_numeric(|a, b| a * b)?,
            OpCode::Divide => self.binary_numeric(|a, b| a / b)?,
            OpCode::Not => {
                let value = self.pop();
                self.push(Value::bool(value.is_falsey()))?;
            }
            OpCode::Negate => {
                if !self.peek(0).is_number() {
                    return Err(RuntimeError::OperandMustBeNumber);
                }
                let n = self.pop().as_number();
                self.push(Value::number(-n))?;
            }
            OpCode::Print => {
                let value = self.pop();
                let text = self.stringify(value);
                writeln!(self.stdout, "{text}").expect("write to the print sink should not fail");
            }
            OpCode::Jump => {
                let offset = self.read_u16() as usize;
                self.frames.last_mut().unwrap().ip += offset;
            }
            OpCode::JumpIfFalse => {
                let offset = self.read_u16() as usize;
                if self.peek(0).is_falsey() {
                    self.frames.last_mut().unwrap().ip += offset;
                }
            }
            OpCode::Loop => {
                let offset = self.read_u16() as usize;
                self.frames.last_mut().unwrap().ip -= offset;
            }
            OpCode::Call => {
                let argc = self.read_u8();
                let callee = self.peek(argc as usize);
                self.call_value(callee, argc)?;
            }
            OpCode::Invoke => {
                let idx = self.read_u16();
                let name = self.constant_at(idx).as_object();
                let argc = self.read_u8();
                self.invoke(name, argc)?;
            }
            OpCode::SuperInvoke => {
                let idx = self.read_u16();
                let name = self.constant_at(idx).as_object();
                let argc = self.read_u8();
                let superclass = self.pop().as_object();
                self.invoke_from_class(superclass, name, argc, true)?;
            }
            OpCode::Closure => self.closure()?,
            OpCode::CloseUpvalue => {
                let top = self.stack.len() - 1;
                self.close_upvalues(top);
                self.pop();
            }
            OpCode::Return => {
                let result = self.pop();
                let frame = self.frames.pop().expect("return with no active frame");
                self.close_upvalues(frame.slots);
                self.stack.truncate(frame.slots);
                if self.frames.is_empty() {
                    return Ok(true);
                }
                self.push(result)?;
            }
            OpCode::Class => {
                let idx = self.read_u16();
                let name = self.constant_at(idx).as_object();
                self.collect_if_needed();
                let class = self.heap.alloc_class(name);
                self.push(Value::object(class))?;
            }
            OpCode::Inherit => self.inherit()?,
            OpCode::Method => {
                let idx = self.read_u16();
                let name = self.constant_at(idx).as_object();
                self.define_method(name);
            }
        }
        Ok(false)
    }

    /// Prints the value stack and the instruction about to run, the way
    /// clox's `DEBUG_TRACE_EXECUTION` does. Read-only: does not advance `ip`.
    fn trace_instruction(&self) {
        let mut line = String::from("          ");
        for value in &self.stack {
            line.push_str(&format!("[ {} ]", self.stringify(*value)));
        }
        eprintln!("{line}");
        let frame = self.frames.last().expect("no active call frame");
        let chunk = &frame.function().as_function().chunk;
        let (text, _) = ember_compiler::disassemble_instruction(chunk, frame.ip);
        eprintln!("{text}");
    }

    // ---- bytecode cursor ----

    fn read_op(&mut self) -> OpCode {
        let byte = self.read_u8();
        OpCode::from_byte(byte).expect("malformed bytecode: unrecognized opcode")
    }

    fn read_u8(&mut self) -> u8 {
        let frame = self.frames.last_mut().expect("no active call frame");
        let byte = frame.function().as_function().chunk.code[frame.ip];
        frame.ip += 1;
        byte
    }

    fn read_u16(&mut self) -> u16 {
        let frame = self.frames.last_mut().expect("no active call frame");
        let value = frame.function().as_function().chunk.read_u16(frame.ip);
        frame.ip += 2;
        value
    }

    fn constant_at(&self, idx: u16) -> Value {
        let frame = self.frames.last().expect("no active call frame");
        frame.function().as_function().chunk.constants[idx as usize]
    }

    // ---- stack ----

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.len() >= self.config.stack_capacity {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("stack underflow: malformed bytecode")
    }

    fn peek(&self, distance: usize) -> Value {
        self.stack[self.stack.len() - 1 - distance]
    }

    // ---- arithmetic ----

    fn binary_numeric(&mut self, op: impl Fn(f64, f64) -> f64) -> Result<(), RuntimeError> {
        if !self.peek(0).is_number() || !self.peek(1).is_number() {
            return Err(RuntimeError::OperandsMustBeNumbers);
        }
        let b = self.pop().as_number();
        let a = self.pop().as_number();
        self.push(Value::number(op(a, b)))
    }

    fn binary_cmp(&mut self, op: impl Fn(f64, f64) -> bool) -> Result<(), RuntimeError> {
        if !self.peek(0).is_number() || !self.peek(1).is_number() {
            return Err(RuntimeError::OperandsMustBeNumbers);
        }
        let b = self.pop().as_number();
        let a = self.pop().as_number();
        self.push(Value::bool(op(a, b)))
    }

    fn add(&mut self) -> Result<(), RuntimeError> {
        if self.peek(0).is_number() && self.peek(1).is_number() {
            let b = self.pop().as_number();
            let a = self.pop().as_number();
            return self.push(Value::number(a + b));
        }
        if is_string(self.peek(0)) && is_string(self.peek(1)) {
            return self.concatenate();
        }
        Err(RuntimeError::AddOperandsInvalid)
    }

    fn concatenate(&mut self) -> Result<(), RuntimeError> {
        // Both operands are still on the stack (rooted) so a collection
        // triggered here cannot reclaim them before the new string exists.
        self.collect_if_needed();
        let b = self.peek(0).as_object();
        let a = self.peek(1).as_object();
        let mut bytes = Vec::with_capacity(a.as_string().as_bytes().len() + b.as_string().as_bytes().len());
        bytes.extend_from_slice(a.as_string().as_bytes());
        bytes.extend_from_slice(b.as_string().as_bytes());
        let result = self.heap.intern(&bytes);
        self.pop();
        self.pop();
        self.push(Value::object(result))
    }

    // ---- calls ----

    fn call_value(&mut self, callee: Value, argc: u8) -> Result<(), RuntimeError> {
        if !callee.is_object() {
            return Err(RuntimeError::NotCallable);
        }
        match callee.as_object().kind() {
            ObjKind::Closure => self.call_closure(callee.as_object(), argc),
            ObjKind::Native => self.call_native(callee.as_object(), argc),
            ObjKind::Class => self.call_class(callee.as_object(), argc),
            ObjKind::BoundMethod => self.call_bound_method(callee.as_object(), argc),
            _ => Err(RuntimeError::NotCallable),
        }
    }

    fn call_closure(&mut self, closure: ObjectRef, argc: u8) -> Result<(), RuntimeError> {
        let arity = closure.as_closure().function.as_function().arity;
        if argc != arity {
            return Err(RuntimeError::ArityMismatch { expected: arity, got: argc });
        }
        if self.frames.len() >= self.config.frame_capacity {
            return Err(RuntimeError::StackOverflow);
        }
        let slots = self.stack.len() - argc as usize - 1;
        self.frames.push(CallFrame::new(closure, slots));
        Ok(())
    }

    fn call_native(&mut self, native: ObjectRef, argc: u8) -> Result<(), RuntimeError> {
        let argv_start = self.stack.len() - argc as usize;
        let function = native.as_native().function;
        let result = {
            let _binding = unsafe { HeapBinding::bind(&mut self.heap) };
            function(argc as u32, &self.stack[argv_start..])
        };
        match result {
            Ok(value) => {
                self.stack.truncate(argv_start - 1);
                self.push(value)
            }
            Err(message) => Err(RuntimeError::Native(message)),
        }
    }

    fn call_class(&mut self, class: ObjectRef, argc: u8) -> Result<(), RuntimeError> {
        self.collect_if_needed();
        let instance = self.heap.alloc_instance(class);
        let callee_slot = self.stack.len() - argc as usize - 1;
        self.stack[callee_slot] = Value::object(instance);
        match class.as_class().methods.get(self.init_string) {
            Some(init) => self.call_closure(init.as_object(), argc),
            None if argc == 0 => Ok(()),
            None => Err(RuntimeError::ArityMismatch { expected: 0, got: argc }),
        }
    }

    fn call_bound_method(&mut self, bound: ObjectRef, argc: u8) -> Result<(), RuntimeError> {
        let receiver = bound.as_bound_method().receiver;
        let method = bound.as_bound_method().method;
        let slot = self.stack.len() - argc as usize - 1;
        self.stack[slot] = receiver;
        self.call_closure(method, argc)
    }

    fn invoke(&mut self, name: ObjectRef, argc: u8) -> Result<(), RuntimeError> {
        let receiver_val = self.peek(argc as usize);
        if !receiver_val.is_object() || receiver_val.as_object().kind() != ObjKind::Instance {
            return Err(RuntimeError::OnlyInstancesHaveProperties);
        }
        let instance = receiver_val.as_object();
        if let Some(value) = instance.as_instance().fields.get(name) {
            let slot = self.stack.len() - argc as usize - 1;
            self.stack[slot] = value;
            return self.call_value(value, argc);
        }
        self.invoke_from_class(instance.as_instance().class, name, argc, false)
    }

    fn invoke_from_class(
        &mut self,
        class: ObjectRef,
        name: ObjectRef,
        argc: u8,
        via_super: bool,
    ) -> Result<(), RuntimeError> {
        let method = class
            .as_class()
            .methods
            .get(name)
            .ok_or_else(|| lookup_miss(name, via_super))?;
        self.call_closure(method.as_object(), argc)
    }

    // ---- properties ----

    fn get_property(&mut self, name: ObjectRef) -> Result<(), RuntimeError> {
        let receiver_val = self.peek(0);
        if !receiver_val.is_object() || receiver_val.as_object().kind() != ObjKind::Instance {
            return Err(RuntimeError::OnlyInstancesHaveProperties);
        }
        let instance = receiver_val.as_object();
        if let Some(value) = instance.as_instance().fields.get(name) {
            self.pop();
            return self.push(value);
        }
        self.bind_method(instance.as_instance().class, name, false)
    }

    fn set_property(&mut self, name: ObjectRef) -> Result<(), RuntimeError> {
        let receiver_val = self.peek(1);
        if !receiver_val.is_object() || receiver_val.as_object().kind() != ObjKind::Instance {
            return Err(RuntimeError::OnlyInstancesHaveFields);
        }
        let instance = receiver_val.as_object();
        let value = self.peek(0);
        instance.as_instance_mut().fields.set(name, value);
        let value = self.pop();
        self.pop();
        self.push(value)
    }

    fn bind_method(&mut self, class: ObjectRef, name: ObjectRef, via_super: bool) -> Result<(), RuntimeError> {
        let method = class
            .as_class()
            .methods
            .get(name)
            .ok_or_else(|| lookup_miss(name, via_super))?;
        // The receiver is still on the stack (peek(0)), so it's rooted
        // across this check-then-allocate.
        self.collect_if_needed();
        let receiver = self.peek(0);
        let bound = self.heap.alloc_bound_method(receiver, method.as_object());
        self.pop();
        self.push(Value::object(bound))
    }

    fn inherit(&mut self) -> Result<(), RuntimeError> {
        let superclass_val = self.peek(1);
        if !superclass_val.is_object() || superclass_val.as_object().kind() != ObjKind::Class {
            return Err(RuntimeError::SuperclassMustBeAClass);
        }
        let superclass = superclass_val.as_object();
        let subclass = self.peek(0).as_object();
        let super_methods: *const Table = &superclass.as_class().methods;
        // Safety: `super_methods` points at a field of a distinct, live
        // object (the freshly created subclass can never alias its own
        // superclass), borrowed immutably while `subclass` is borrowed
        // mutably below.
        subclass.as_class_mut().methods.add_all(unsafe { &*super_methods });
        self.pop(); // the re-loaded subclass reference; the superclass
                    // value underneath becomes the `super` local's value.
        Ok(())
    }

    fn define_method(&mut self, name: ObjectRef) {
        let method = self.peek(0);
        let class = self.peek(1).as_object();
        class.as_class_mut().methods.set(name, method);
        self.pop();
    }

    // ---- closures and upvalues ----

    fn closure(&mut self) -> Result<(), RuntimeError> {
        let idx = self.read_u16();
        let function = self.constant_at(idx).as_object();
        let upvalue_count = function.as_function().upvalue_count;
        let mut upvalues = Vec::with_capacity(upvalue_count);
        for _ in 0..upvalue_count {
            let is_local = self.read_u8() != 0;
            let index = self.read_u8() as usize;
            if is_local {
                let base = self.frames.last().unwrap().slots;
                upvalues.push(self.capture_upvalue(base + index));
            } else {
                let enclosing = self.frames.last().unwrap().closure;
                upvalues.push(enclosing.as_closure().upvalues[index]);
            }
        }
        self.collect_if_needed();
        let closure = self.heap.alloc_closure(function, upvalues);
        self.push(Value::object(closure))
    }

    /// Reuses an existing open upvalue for `stack_slot` if one exists,
    /// otherwise inserts a new one keeping the list in descending
    /// slot-index order (I4, I5; §4.3 "Upvalues").
    fn capture_upvalue(&mut self, stack_slot: usize) -> ObjectRef {
        let mut prev: Option<ObjectRef> = None;
        let mut current = self.open_upvalues;
        while let Some(candidate) = current {
            let slot = self.slot_index_of(candidate);
            if slot == stack_slot {
                return candidate;
            }
            if slot < stack_slot {
                break;
            }
            prev = Some(candidate);
            current = candidate.as_upvalue().next_open.get();
        }

        // `current` (if any) is already an open upvalue, hence already
        // rooted via the list; checking here and allocating immediately
        // after keeps the new upvalue's only unrooted window empty, since
        // it's linked into the list (a GC root) right below.
        self.collect_if_needed();
        let slot_ptr =
            unsafe { NonNull::new_unchecked(self.stack.as_mut_ptr().add(stack_slot)) };
        let created = self.heap.alloc_upvalue(slot_ptr);
        created.as_upvalue().next_open.set(current);
        match prev {
            Some(p) => p.as_upvalue().next_open.set(Some(created)),
            None => self.open_upvalues = Some(created),
        }
        created
    }

    fn slot_index_of(&self, upvalue: ObjectRef) -> usize {
        let ptr = upvalue
            .as_upvalue()
            .open_slot_ptr()
            .expect("open_upvalues list only holds open upvalues")
            .as_ptr();
        unsafe { ptr.offset_from(self.stack.as_ptr()) as usize }
    }

    /// Closes every open upvalue at or above `from_slot`, in descending
    /// order (§4.3 "Upvalues").
    fn close_upvalues(&mut self, from_slot: usize) {
        while let Some(candidate) = self.open_upvalues {
            if self.slot_index_of(candidate) < from_slot {
                break;
            }
            candidate.as_upvalue().close();
            self.open_upvalues = candidate.as_upvalue().next_open.get();
        }
    }

    // ---- printing ----

    fn stringify(&self, value: Value) -> String {
        if value.is_nil() {
            return "nil".to_string();
        }
        if value.is_bool() {
            return value.as_bool().to_string();
        }
        if value.is_number() {
            return ember_core::format_number(value.as_number());
        }
        let obj = value.as_object();
        match obj.kind() {
            ObjKind::String => obj.as_string().as_str().to_string(),
            ObjKind::Function => match obj.as_function().name {
                Some(name) => format!("<fn {}>", name.as_string().as_str()),
                None => "<script>".to_string(),
            },
            ObjKind::Native => format!("<native fn {}>", obj.as_native().name.as_string().as_str()),
            ObjKind::Closure => self.stringify(Value::object(obj.as_closure().function)),
            ObjKind::Class => obj.as_class().name.as_string().as_str().to_string(),
            ObjKind::Instance => {
                format!("<instance {}>", obj.as_instance().class.as_class().name.as_string().as_str())
            }
            ObjKind::BoundMethod => self.stringify(Value::object(obj.as_bound_method().method)),
            ObjKind::Upvalue => "<upvalue>".to_string(),
        }
    }

    // ---- errors ----

    fn runtime_fault(&mut self, error: RuntimeError) -> RuntimeFault {
        let mut trace = Vec::with_capacity(self.frames.len());
        for frame in self.frames.iter().rev() {
            let function = frame.function().as_function();
            let label = match function.name {
                Some(name) => format!("{}()", name.as_string().as_str()),
                None => "script".to_string(),
            };
            let line = function.chunk.line_at(frame.ip.saturating_sub(1));
            trace.push(TraceFrame { line, label });
        }
        self.stack.clear();
        self.frames.clear();
        RuntimeFault { error, trace }
    }

    // ---- GC ----

    fn collect_if_needed(&mut self) {
        let view = VmRootsView {
            stack: &self.stack,
            frames: &self.frames,
            globals: &self.globals,
            open_upvalues: self.open_upvalues,
            init_string: self.init_string,
        };
        self.heap.maybe_collect(&view);
    }
}

fn is_string(value: Value) -> bool {
    value.is_object() && value.as_object().kind() == ObjKind::String
}

fn undefined_variable(name: ObjectRef) -> RuntimeError {
    RuntimeError::UndefinedVariable(name.as_string().as_str().to_string())
}

fn lookup_miss(name: ObjectRef, via_super: bool) -> RuntimeError {
    let label = name.as_string().as_str().to_string();
    if via_super {
        RuntimeError::UndefinedSuperMethod(label)
    } else {
        RuntimeError::UndefinedProperty(label)
    }
}

fn mark_roots(
    stack: &[Value],
    frames: &[CallFrame],
    globals: &Table,
    open_upvalues: Option<ObjectRef>,
    init_string: ObjectRef,
    marker: &mut Marker<'_>,
) {
    for value in stack {
        marker.mark_value(*value);
    }
    for frame in frames {
        marker.mark_object(frame.closure);
    }
    let mut upvalue = open_upvalues;
    while let Some(uv) = upvalue {
        marker.mark_object(uv);
        upvalue = uv.as_upvalue().next_open.get();
    }
    for (key, value) in globals.iter() {
        marker.mark_object(key);
        marker.mark_value(value);
    }
    marker.mark_object(init_string);
}

/// Borrows just the root-bearing fields of a `Vm`, so `collect_if_needed`
/// can hand them to the heap while `&mut self.heap` is borrowed separately
/// (the same split-borrow shape as the compiler's `CompilerRootsView`).
struct VmRootsView<'a> {
    stack: &'a [Value],
    frames: &'a [CallFrame],
    globals: &'a Table,
    open_upvalues: Option<ObjectRef>,
    init_string: ObjectRef,
}

impl GcRoots for VmRootsView<'_> {
    fn mark_roots(&self, marker: &mut Marker<'_>) {
        mark_roots(self.stack, self.frames, self.globals, self.open_upvalues, self.init_string, marker);
    }
}

impl GcRoots for Vm {
    fn mark_roots(&self, marker: &mut Marker<'_>) {
        mark_roots(&self.stack, &self.frames, &self.globals, self.open_upvalues, self.init_string, marker);
    }
}
