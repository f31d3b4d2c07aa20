//! Native (host-exposed) functions (§6 "Native ABI").
//!
//! `ember_core::NativeFn` is a plain `fn(argc, argv) -> Result<Value, String>`
//! pointer, not a closure, because that is the ABI the spec names. A few
//! natives (`substring`, `chr`, file open) need to allocate a fresh interned
//! string, which needs the heap. Since a bare `fn` pointer cannot capture the
//! heap, the VM binds it into a thread-local for the duration of each native
//! call, the same way the teacher's runtime threads FFI error state through
//! `thread_local!` rather than an explicit context argument. Every entry
//! point that can allocate calls [`with_heap`]; nothing else touches the
//! thread-local.
//!
//! File handles 3..7 are user-opened files, threaded through a second
//! thread-local table; handles 0/1/2 are wired directly to stdio.

use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::{Read, Write};
use std::ptr::NonNull;
use std::time::Instant;

use ember_core::{Heap, NativeFn, ObjectRef, Value};

thread_local! {
    static NATIVE_HEAP: Cell<Option<NonNull<Heap>>> = const { Cell::new(None) };
    static START: Instant = Instant::now();
    static FILES: RefCell<[Option<File>; 5]> = const { RefCell::new([None, None, None, None, None]) };
    static ARGV: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Binds `heap` to the current thread for the lifetime of the guard. Used by
/// the VM around every native call; unbound outside of one.
pub struct HeapBinding;

impl HeapBinding {
    /// # Safety
    /// `heap` must outlive the returned guard, and no other `HeapBinding`
    /// may be alive on this thread at the same time (natives never
    /// re-enter the VM, so calls never nest).
    pub unsafe fn bind(heap: &mut Heap) -> Self {
        NATIVE_HEAP.with(|cell| cell.set(Some(NonNull::from(heap))));
        HeapBinding
    }
}

impl Drop for HeapBinding {
    fn drop(&mut self) {
        NATIVE_HEAP.with(|cell| cell.set(None));
    }
}

fn with_heap<R>(f: impl FnOnce(&mut Heap) -> R) -> R {
    NATIVE_HEAP.with(|cell| {
        let mut ptr = cell.get().expect("native function called outside a HeapBinding");
        f(unsafe { ptr.as_mut() })
    })
}

/// Records the program's `argv[1..]` (the script and its arguments are
/// excluded by the caller as it sees fit) so the `argv` native can see them.
pub fn set_argv(args: Vec<String>) {
    ARGV.with(|cell| *cell.borrow_mut() = args);
}

fn expect_number(argv: &[Value], i: usize, who: &str) -> Result<f64, String> {
    argv.get(i)
        .filter(|v| v.is_number())
        .map(|v| v.as_number())
        .ok_or_else(|| format!("{who}: expected a number argument"))
}

fn expect_string(argv: &[Value], i: usize, who: &str) -> Result<ObjectRef, String> {
    argv.get(i)
        .filter(|v| v.is_object() && v.as_object().kind() == ember_core::ObjKind::String)
        .map(|v| v.as_object())
        .ok_or_else(|| format!("{who}: expected a string argument"))
}

fn native_clock(_argc: u32, _argv: &[Value]) -> Result<Value, String> {
    let secs = START.with(|start| start.elapsed().as_secs_f64());
    Ok(Value::number(secs))
}

fn native_argc(_argc: u32, _argv: &[Value]) -> Result<Value, String> {
    Ok(Value::number(ARGV.with(|a| a.borrow().len()) as f64))
}

fn native_argv(_argc: u32, argv: &[Value]) -> Result<Value, String> {
    let i = expect_number(argv, 0, "argv")? as usize;
    let arg = ARGV.with(|a| a.borrow().get(i).cloned());
    match arg {
        Some(s) => Ok(Value::object(with_heap(|heap| heap.intern_str(&s)))),
        None => Ok(Value::nil()),
    }
}

fn native_length(_argc: u32, argv: &[Value]) -> Result<Value, String> {
    let s = expect_string(argv, 0, "length")?;
    Ok(Value::number(s.as_string().as_bytes().len() as f64))
}

fn native_substring(_argc: u32, argv: &[Value]) -> Result<Value, String> {
    let s = expect_string(argv, 0, "substring")?;
    let start = expect_number(argv, 1, "substring")? as usize;
    let count = expect_number(argv, 2, "substring")? as usize;
    let bytes = s.as_string().as_bytes();
    let end = (start + count).min(bytes.len());
    let slice = if start <= end && start <= bytes.len() { &bytes[start..end] } else { &[] };
    Ok(Value::object(with_heap(|heap| heap.intern(slice))))
}

fn native_chr(_argc: u32, argv: &[Value]) -> Result<Value, String> {
    let n = expect_number(argv, 0, "chr")? as i64;
    if !(0..=255).contains(&n) {
        return Err("chr: argument out of byte range".to_string());
    }
    Ok(Value::object(with_heap(|heap| heap.intern(&[n as u8]))))
}

fn native_ord(_argc: u32, argv: &[Value]) -> Result<Value, String> {
    let s = expect_string(argv, 0, "ord")?;
    let bytes = s.as_string().as_bytes();
    if bytes.is_empty() {
        return Err("ord: empty string".to_string());
    }
    Ok(Value::number(bytes[0] as f64))
}

fn native_trunc(_argc: u32, argv: &[Value]) -> Result<Value, String> {
    let n = expect_number(argv, 0, "trunc")?;
    Ok(Value::number(n.trunc()))
}

fn file_slot(handle: i64) -> Result<usize, String> {
    if (3..8).contains(&handle) {
        Ok((handle - 3) as usize)
    } else {
        Err(format!("no such file handle: {handle}"))
    }
}

fn native_open_read(_argc: u32, argv: &[Value]) -> Result<Value, String> {
    let path = expect_string(argv, 0, "read")?;
    let path = path.as_string().as_str();
    match File::open(path) {
        Ok(file) => FILES.with(|files| {
            let mut files = files.borrow_mut();
            match files.iter().position(|f| f.is_none()) {
                Some(slot) => {
                    files[slot] = Some(file);
                    Ok(Value::number((slot + 3) as f64))
                }
                None => Err("no free file handles".to_string()),
            }
        }),
        Err(e) => Err(format!("read: {e}")),
    }
}

fn native_open_write(_argc: u32, argv: &[Value]) -> Result<Value, String> {
    let path = expect_string(argv, 0, "write")?;
    let path = path.as_string().as_str();
    match File::create(path) {
        Ok(file) => FILES.with(|files| {
            let mut files = files.borrow_mut();
            match files.iter().position(|f| f.is_none()) {
                Some(slot) => {
                    files[slot] = Some(file);
                    Ok(Value::number((slot + 3) as f64))
                }
                None => Err("no free file handles".to_string()),
            }
        }),
        Err(e) => Err(format!("write: {e}")),
    }
}

fn native_close(_argc: u32, argv: &[Value]) -> Result<Value, String> {
    let handle = expect_number(argv, 0, "close")? as i64;
    let slot = file_slot(handle)?;
    FILES.with(|files| files.borrow_mut()[slot] = None);
    Ok(Value::nil())
}

fn native_get(_argc: u32, argv: &[Value]) -> Result<Value, String> {
    let handle = expect_number(argv, 0, "get")? as i64;
    let mut byte = [0u8; 1];
    let n = match handle {
        0 => std::io::stdin().read(&mut byte).map_err(|e| e.to_string())?,
        _ => {
            let slot = file_slot(handle)?;
            FILES.with(|files| {
                let mut files = files.borrow_mut();
                match files[slot].as_mut() {
                    Some(file) => file.read(&mut byte).map_err(|e| e.to_string()),
                    None => Err(format!("file handle {handle} is not open")),
                }
            })?
        }
    };
    if n == 0 {
        Ok(Value::number(-1.0))
    } else {
        Ok(Value::number(byte[0] as f64))
    }
}

fn native_put(_argc: u32, argv: &[Value]) -> Result<Value, String> {
    let byte = expect_number(argv, 0, "put")? as i64;
    if !(0..=255).contains(&byte) {
        return Err("put: argument out of byte range".to_string());
    }
    let handle = expect_number(argv, 1, "put")? as i64;
    let byte = [byte as u8];
    match handle {
        1 => std::io::stdout().write_all(&byte).map_err(|e| e.to_string())?,
        2 => std::io::stderr().write_all(&byte).map_err(|e| e.to_string())?,
        _ => {
            let slot = file_slot(handle)?;
            FILES.with(|files| {
                let mut files = files.borrow_mut();
                match files[slot].as_mut() {
                    Some(file) => file.write_all(&byte).map_err(|e| e.to_string()),
                    None => Err(format!("file handle {handle} is not open")),
                }
            })?
        }
    }
    Ok(Value::nil())
}

/// The standard native set registered into globals at VM startup (§6).
pub const STANDARD_NATIVES: &[(&str, NativeFn)] = &[
    ("clock", native_clock),
    ("argc", native_argc),
    ("argv", native_argv),
    ("length", native_length),
    ("substring", native_substring),
    ("chr", native_chr),
    ("ord", native_ord),
    ("trunc", native_trunc),
    ("read", native_open_read),
    ("write", native_open_write),
    ("close", native_close),
    ("get", native_get),
    ("put", native_put),
];
