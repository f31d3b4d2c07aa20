//! Compile-time diagnostics (§7).

use std::fmt;

/// A single compile error, already formatted the way the CLI prints it:
/// `[line N] Error at 'lexeme': message` (or `at end` for EOF tokens).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub line: u32,
    pub location: String,
    pub message: String,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] Error{}: {}", self.line, self.location, self.message)
    }
}

impl std::error::Error for CompileError {}

/// All diagnostics produced by one compile, in source order (panic-mode
/// synchronization means a single compile can surface more than one).
#[derive(Debug, Default)]
pub struct CompileErrors(pub Vec<CompileError>);

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileErrors {}
