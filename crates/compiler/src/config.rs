//! Compile-time limits and knobs (§11).

/// Bounds and feature toggles threaded through one compile. Mirrors the
/// reference workspace's per-pass `CompilerConfig` (see seq-compiler/src/config.rs).
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Collapse equal constants into one pool slot (I7). Disabling this is
    /// useful for tests that want to assert on raw pool layout.
    pub dedup_constants: bool,
    /// Locals per call frame before the compiler reports an overflow error.
    pub max_locals: usize,
    /// Upvalues per closure before the compiler reports an overflow error.
    pub max_upvalues: usize,
    /// Parameters per function declaration before the compiler reports an
    /// overflow error (also the hard ceiling on call-site argument count).
    pub max_call_arity: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            dedup_constants: true,
            max_locals: 256,
            max_upvalues: 256,
            max_call_arity: 255,
        }
    }
}
