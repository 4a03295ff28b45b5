//! Lexical environment frames.
//!
//! Each call frame is a `HashMap<String, Value>` behind an `Rc<RefCell<_>>`
//! so a `ProcDef`'s closure can share a frame with the scope that defined
//! it (`nonlocals`, per §4.5). The top-level frame is the `globals` target.

use crate::value::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub type Frame = Rc<RefCell<HashMap<String, Value>>>;
pub type NameSet = Rc<HashSet<String>>;

pub fn new_frame() -> Frame {
    Rc::new(RefCell::new(HashMap::new()))
}

/// The chain of frames a procedure body resolves names against: its own
/// fresh local frame, plus whichever enclosing frames its `nonlocals`
/// closed over, plus the top-level frame for `globals`. `proc_globals` and
/// `proc_nonlocals` are this call's §4.5 scope-analysis results, consulted
/// only by `bind` (reads always just walk the frame chain).
#[derive(Debug, Clone)]
pub struct Env {
    pub locals: Frame,
    /// Enclosing frames captured at `ProcDef` evaluation time, outermost
    /// last checked — i.e. nearest enclosing scope first. Empty for
    /// top-level code.
    pub enclosing: Vec<Frame>,
    pub globals: Frame,
    pub proc_globals: NameSet,
    pub proc_nonlocals: NameSet,
}

impl Env {
    pub fn top_level(globals: Frame) -> Self {
        Env {
            locals: globals.clone(),
            enclosing: Vec::new(),
            globals,
            proc_globals: Rc::new(HashSet::new()),
            proc_nonlocals: Rc::new(HashSet::new()),
        }
    }

    /// A fresh call frame for a procedure invocation, closing over `self`
    /// (the defining scope) as its enclosing chain.
    pub fn child(&self, proc_globals: NameSet, proc_nonlocals: NameSet) -> Self {
        let mut enclosing = Vec::with_capacity(self.enclosing.len() + 1);
        enclosing.push(self.locals.clone());
        enclosing.extend(self.enclosing.iter().cloned());
        Env {
            locals: new_frame(),
            enclosing,
            globals: self.globals.clone(),
            proc_globals,
            proc_nonlocals,
        }
    }

    /// Route an assignment per §4.5: a name the scope analyzer classified
    /// as `globals` writes straight to the top-level frame; `nonlocals`
    /// writes to whichever enclosing frame already holds it; anything else
    /// is a fresh local binding.
    pub fn bind(&self, name: &str, value: Value) {
        if self.proc_globals.contains(name) {
            self.declare_global(name, value);
        } else if self.proc_nonlocals.contains(name) {
            self.assign_nonlocal(name, value);
        } else {
            self.declare_local(name, value);
        }
    }

    pub fn declare_local(&self, name: &str, value: Value) {
        self.locals.borrow_mut().insert(name.to_string(), value);
    }

    pub fn declare_global(&self, name: &str, value: Value) {
        self.globals.borrow_mut().insert(name.to_string(), value);
    }

    /// Bind `name` in the nearest enclosing frame that already defines it
    /// (used for §4.5 `nonlocals`); falls back to a fresh local binding if
    /// no enclosing frame has it yet (first assignment in that frame).
    pub fn assign_nonlocal(&self, name: &str, value: Value) {
        for frame in &self.enclosing {
            if frame.borrow().contains_key(name) {
                frame.borrow_mut().insert(name.to_string(), value);
                return;
            }
        }
        self.declare_local(name, value);
    }

    /// Plain lookup-order name resolution: local frame, then enclosing
    /// frames innermost-first, then globals.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.locals.borrow().get(name) {
            return Some(v.clone());
        }
        for frame in &self.enclosing {
            if let Some(v) = frame.borrow().get(name) {
                return Some(v.clone());
            }
        }
        self.globals.borrow().get(name).cloned()
    }
}
