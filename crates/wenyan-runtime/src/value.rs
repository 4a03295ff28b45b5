//! Runtime values.
//!
//! Mirrors the reference JavaScript implementation's value domain: numbers
//! are IEEE-754 doubles (so large numeral literals lose precision exactly
//! the way they would under `Number()` in JS — see `wenyan_compiler::numerals`
//! for the exact-decimal-string decode step that happens before this point),
//! strings and procedures are reference types, and lists/dicts are shared and
//! mutable (`Rc<RefCell<_>>`) so that two names bound to "the same" container
//! alias the way JS object references do. That aliasing is also what makes
//! the negative-index side table (`crate::negidx`) keyable by identity.

use crate::procedure::Procedure;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

pub type SharedList = Rc<RefCell<Vec<Value>>>;
pub type SharedDict = Rc<RefCell<IndexMap<String, Value>>>;

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    List(SharedList),
    Dict(SharedDict),
    Proc(Rc<Procedure>),
}

impl Value {
    pub fn str(s: impl Into<Rc<str>>) -> Value {
        Value::Str(s.into())
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn dict(entries: IndexMap<String, Value>) -> Value {
        Value::Dict(Rc::new(RefCell::new(entries)))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.borrow().is_empty(),
            Value::Dict(d) => !d.borrow().is_empty(),
            Value::Proc(_) => true,
        }
    }

    /// Identity used as the first half of a negative-index side-table key.
    /// Only meaningful for reference types; primitives never get negative
    /// indices taken of them in well-formed programs.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::List(l) => Some(Rc::as_ptr(l) as usize),
            Value::Dict(d) => Some(Rc::as_ptr(d) as usize),
            Value::Proc(p) => Some(Rc::as_ptr(p) as usize),
            _ => None,
        }
    }

    /// `__typeOf`: the type tag used by Wenyan's declaration type words and
    /// by error messages. Matches the seven type words from §6's keyword
    /// set (數/言/爻/列/物/術 plus the implicit null type).
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Proc(_) => "function",
        }
    }

    /// `__toInt`: coercion used by indexing and the counted-loop form.
    /// Truncates toward zero, as `Math.trunc`/`|0` does in the reference
    /// implementation.
    pub fn to_int(&self) -> i64 {
        match self {
            Value::Number(n) => *n as i64,
            Value::Str(s) => s.parse::<f64>().map(|f| f as i64).unwrap_or(0),
            Value::Bool(b) => *b as i64,
            _ => 0,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            // Reference types compare by identity, matching JS `===` on
            // objects/arrays/functions.
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            (Value::Proc(a), Value::Proc(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", crate::format::display_scalar(self))
    }
}
