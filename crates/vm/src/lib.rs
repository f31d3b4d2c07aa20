//! The stack-based virtual machine: call frames, value stack, globals, and
//! the host-native ABI (§4.3, §6).

pub mod config;
pub mod error;
pub mod frame;
pub mod native;
pub mod vm;

pub use config::VmConfig;
pub use error::{InterpretError, InterpretResult, RuntimeError, RuntimeFault, TraceFrame};
pub use frame::CallFrame;
pub use native::set_argv;
pub use vm::Vm;
