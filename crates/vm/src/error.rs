//! Runtime diagnostics (§7). Every variant corresponds to a recognized
//! runtime error named in the spec; the `Display` text is what `print_error`
//! puts on the error stream before the frame traceback.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Operand must be a number.")]
    OperandMustBeNumber,
    #[error("Operands must be numbers.")]
    OperandsMustBeNumbers,
    #[error("Operands must be two numbers or two strings.")]
    AddOperandsInvalid,
    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),
    #[error("Only instances have properties.")]
    OnlyInstancesHaveProperties,
    #[error("Only instances have fields.")]
    OnlyInstancesHaveFields,
    #[error("Undefined property '{0}'.")]
    UndefinedProperty(String),
    #[error("Superclass must be a class.")]
    SuperclassMustBeAClass,
    #[error("Can only call functions and classes.")]
    NotCallable,
    #[error("Expected {expected} arguments but got {got}.")]
    ArityMismatch { expected: u8, got: u8 },
    #[error("Stack overflow.")]
    StackOverflow,
    #[error("Undefined property '{0}' via super.")]
    UndefinedSuperMethod(String),
    #[error("{0}")]
    Native(String),
}

/// One entry of a runtime traceback. `label` is already formatted as either
/// `name()` for a function/method frame or the bare word `script` for the
/// top-level frame (§4.3 "On runtime error").
#[derive(Debug, Clone)]
pub struct TraceFrame {
    pub line: u32,
    pub label: String,
}

/// A runtime error plus the frame stack captured at the moment it was
/// raised, in innermost-first order, as printed by the interpreter (§4.3
/// "On runtime error").
#[derive(Debug, Clone)]
pub struct RuntimeFault {
    pub error: RuntimeError,
    pub trace: Vec<TraceFrame>,
}

impl std::fmt::Display for RuntimeFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.error)?;
        for frame in &self.trace {
            writeln!(f, "[line {}] in {}", frame.line, frame.label)?;
        }
        Ok(())
    }
}

pub type InterpretResult<T> = Result<T, RuntimeFault>;

/// Top-level outcome of [`crate::vm::Vm::interpret`], distinguishing a
/// compile-time failure (exit 65) from a runtime one (exit 70) the way
/// `ember-cli` needs to.
#[derive(Debug)]
pub enum InterpretError {
    Compile(ember_compiler::CompileErrors),
    Runtime(RuntimeFault),
}

impl std::fmt::Display for InterpretError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterpretError::Compile(errors) => write!(f, "{errors}"),
            InterpretError::Runtime(fault) => write!(f, "{fault}"),
        }
    }
}

impl std::error::Error for InterpretError {}
