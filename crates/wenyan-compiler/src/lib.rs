//! Tokenizer, parser, scope analyzer, and lowering pass turning Wenyan
//! source text into `wenyan_runtime::ir::Program`.

pub mod ast;
pub mod config;
pub mod driver;
pub mod error;
pub mod keywords;
pub mod lexer;
pub mod lower;
pub mod numerals;
pub mod parser;
pub mod preprocessor;
pub mod scope;
pub mod token;

pub use config::{Config, Emit};
pub use driver::{CompileError, Env};
pub use error::GrammarFault;
