//! Compiler configuration (§6 "External interfaces").

use std::path::PathBuf;

/// What a run should produce, set by the CLI's emit flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Emit {
    /// Execute the program. The default.
    #[default]
    Run,
    /// `--tokens`: dump the token stream, one per line.
    Tokens,
    /// `--wyast` / `--ast`: dump the parsed AST.
    WyAst,
    /// `--pyast`: dump the lowered IR (the "other" tree the original
    /// multi-backend compiler called its Python AST; this compiler has one
    /// backend, so the flag now names the IR dump instead).
    PyAst,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// `--no-outputHanzi`: suppress the Hanzi spacing conventions
    /// `__format` otherwise applies, for output meant to match the
    /// reference implementation's compatibility mode byte for byte.
    pub no_output_hanzi: bool,
    /// Directories searched for `吾嘗觀 "<module>" 之書`, in order, after
    /// the importing file's own directory.
    pub lib_paths: Vec<PathBuf>,
    pub emit: Emit,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_no_output_hanzi(mut self, value: bool) -> Self {
        self.no_output_hanzi = value;
        self
    }

    pub fn with_lib_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.lib_paths = paths;
        self
    }

    pub fn with_emit(mut self, emit: Emit) -> Self {
        self.emit = emit;
        self
    }
}
