//! Pass orchestration and the process-wide compilation environment (§5).
//!
//! [`Env`] owns the three caches the concurrency model calls for, each keyed
//! by a module's canonicalized path: macro-expanded source text, the public
//! items a module exports (what an importer actually needs, rather than the
//! module's whole statement list), and the two disjoint in-progress sets
//! that turn a self-import cycle into a [`循環匯入`](CompileError) fault
//! instead of unbounded recursion.

use crate::ast;
use crate::config::{Config, Emit};
use crate::error::{GrammarFault, SourceMap};
use crate::lexer::Lexer;
use crate::lower;
use crate::parser::parse_program;
use crate::preprocessor;
use crate::token::{Span, Token};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;
use wenyan_runtime::ir;
use wenyan_runtime::{Interpreter, WenyanFault};

#[derive(Debug)]
pub enum CompileError {
    Grammar(GrammarFault),
    Runtime(WenyanFault),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Grammar(e) => write!(f, "{e}"),
            CompileError::Runtime(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<GrammarFault> for CompileError {
    fn from(e: GrammarFault) -> Self {
        CompileError::Grammar(e)
    }
}

impl From<WenyanFault> for CompileError {
    fn from(e: WenyanFault) -> Self {
        CompileError::Runtime(e)
    }
}

fn io_fault(filename: &str, err: &std::io::Error) -> GrammarFault {
    GrammarFault::new(format!("找不到檔案：{err}"), filename, 1, 1, "")
}

fn is_exported(stmt: &ast::Stmt, exposed: &[String]) -> bool {
    let (public, names): (bool, Vec<&str>) = match stmt {
        ast::Stmt::Declare { public, names, .. } => (*public, names.iter().map(String::as_str).collect()),
        ast::Stmt::ProcDef { public, name, .. } => (*public, vec![name.as_str()]),
        _ => (false, Vec::new()),
    };
    if !public {
        return false;
    }
    exposed.is_empty() || names.iter().any(|n| exposed.iter().any(|e| e == n))
}

/// The process-wide compilation environment: every file compiled in one
/// `wenyanc` invocation shares one `Env`, so a module imported from two
/// different sites is only ever tokenized, parsed, and lowered once.
#[derive(Default)]
pub struct Env {
    lib_paths: Vec<PathBuf>,
    source_cache: HashMap<PathBuf, Rc<str>>,
    export_cache: HashMap<PathBuf, Rc<[ast::Stmt]>>,
    macros_in_progress: HashSet<PathBuf>,
    imports_in_progress: HashSet<PathBuf>,
}

impl Env {
    pub fn new(lib_paths: Vec<PathBuf>) -> Self {
        Env { lib_paths, ..Default::default() }
    }

    fn load_and_expand(&mut self, path: &Path) -> Result<Rc<str>, CompileError> {
        if let Some(cached) = self.source_cache.get(path) {
            return Ok(cached.clone());
        }
        if !self.macros_in_progress.insert(path.to_path_buf()) {
            return Err(CompileError::Grammar(GrammarFault::new(
                "循環匯入",
                path.to_string_lossy(),
                1,
                1,
                "",
            )));
        }
        let filename = path.to_string_lossy().to_string();
        let raw = fs::read_to_string(path).map_err(|e| io_fault(&filename, &e))?;
        let expanded: Rc<str> = preprocessor::expand_macros(&raw, &filename)?.into();
        self.macros_in_progress.remove(path);
        self.source_cache.insert(path.to_path_buf(), expanded.clone());
        Ok(expanded)
    }

    /// Tokenizes and parses `path`, splicing each `Stmt::Import` with the
    /// resolved module's exported items in place. Returns the *whole*
    /// resolved statement list — callers that only need what `path` exports
    /// should filter with [`is_exported`] themselves (see
    /// [`Env::exported_items`]).
    pub fn resolve_file(&mut self, path: &Path) -> Result<ast::Program, CompileError> {
        let src = self.load_and_expand(path)?;
        let filename = path.to_string_lossy().to_string();
        let tokens = debug_span(&filename, "tokenize", || Lexer::new(&src, filename.clone()).tokenize())?;
        let program = debug_span(&filename, "parse", || parse_program(&tokens, &filename, &src))?;

        let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        let mut out = Vec::with_capacity(program.stmts.len());
        for stmt in program.stmts {
            match stmt {
                ast::Stmt::Import { module, exposed, span } => {
                    let resolved = self.locate_module(&module, &dir, &filename, &span)?;
                    let items = self.exported_items(&resolved)?;
                    out.extend(
                        items
                            .iter()
                            .filter(|s| is_exported(s, &exposed))
                            .cloned(),
                    );
                }
                other => out.push(other),
            }
        }
        Ok(ast::Program { stmts: out })
    }

    fn locate_module(&self, module: &str, dir: &Path, filename: &str, span: &Span) -> Result<PathBuf, CompileError> {
        preprocessor::resolve_module(module, dir, &self.lib_paths).ok_or_else(|| {
            let src = self.source_cache.get(Path::new(filename)).map(|s| s.as_ref()).unwrap_or("");
            let map = SourceMap::new(src);
            let (line, col, line_text) = map.locate(span.start);
            CompileError::Grammar(GrammarFault::new("匯入之書不見", filename, line, col, line_text))
        })
    }

    fn exported_items(&mut self, module_path: &Path) -> Result<Rc<[ast::Stmt]>, CompileError> {
        if let Some(cached) = self.export_cache.get(module_path) {
            return Ok(cached.clone());
        }
        if !self.imports_in_progress.insert(module_path.to_path_buf()) {
            return Err(CompileError::Grammar(GrammarFault::new(
                "循環匯入",
                module_path.to_string_lossy(),
                1,
                1,
                "",
            )));
        }
        let resolved = self.resolve_file(module_path)?;
        self.imports_in_progress.remove(module_path);

        let exported: Vec<ast::Stmt> = resolved
            .stmts
            .into_iter()
            .filter(|s| is_exported(s, &[]))
            .collect();
        let rc: Rc<[ast::Stmt]> = Rc::from(exported.into_boxed_slice());
        self.export_cache.insert(module_path.to_path_buf(), rc.clone());
        Ok(rc)
    }
}

fn debug_span<T>(filename: &str, pass: &str, f: impl FnOnce() -> Result<T, GrammarFault>) -> Result<T, GrammarFault> {
    let _span = tracing::debug_span!("pass", file = filename, pass).entered();
    let result = f();
    debug!(pass, ok = result.is_ok(), "pass complete");
    result
}

pub fn tokenize_file(path: &Path, env: &mut Env) -> Result<Vec<Token>, CompileError> {
    let src = env.load_and_expand(path)?;
    let filename = path.to_string_lossy().to_string();
    Ok(Lexer::new(&src, filename).tokenize()?)
}

pub fn parse_file(path: &Path, env: &mut Env) -> Result<ast::Program, CompileError> {
    env.resolve_file(path)
}

pub fn lower_file(path: &Path, env: &mut Env) -> Result<ir::Program, CompileError> {
    let program = env.resolve_file(path)?;
    let filename = path.to_string_lossy().to_string();
    let src = env.source_cache.get(path).map(|s| s.as_ref().to_string()).unwrap_or_default();
    let ir = debug_span(&filename, "lower", || lower::lower_program(&program, &filename, &src))?;
    Ok(ir)
}

/// Runs the pass the CLI's emit flag asks for against a freshly built
/// `Env` scoped to this one invocation, returning rendered text for every
/// mode except [`Emit::Run`] (which writes program output to `out` instead
/// and returns an empty string).
pub fn run_emit(path: &Path, config: &Config, out: &mut dyn Write) -> Result<String, CompileError> {
    let mut env = Env::new(config.lib_paths.clone());
    match config.emit {
        Emit::Run => {
            let ir = lower_file(path, &mut env)?;
            let filename = path.to_string_lossy().to_string();
            let _span = tracing::debug_span!("run", file = filename.as_str()).entered();
            let mut interp = Interpreter::new(config.no_output_hanzi, out);
            interp.run(&ir)?;
            Ok(String::new())
        }
        Emit::Tokens => {
            let tokens = tokenize_file(path, &mut env)?;
            Ok(tokens.iter().map(|t| format!("{:?}", t.kind)).collect::<Vec<_>>().join("\n"))
        }
        Emit::WyAst => {
            let program = parse_file(path, &mut env)?;
            Ok(format!("{program:#?}"))
        }
        Emit::PyAst => {
            let ir = lower_file(path, &mut env)?;
            Ok(format!("{ir:#?}"))
        }
    }
}
