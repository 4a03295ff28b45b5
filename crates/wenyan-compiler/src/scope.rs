//! Free-variable classification per procedure (§4.5 "Scope Analyzer").
//!
//! Wenyan has no block scoping: every name bound anywhere in a procedure's
//! body (including inside nested `if`/`while`/`for`/`foreach`/`try` blocks)
//! is local to that procedure, never to the block. Only a nested `ProcDef`
//! opens a fresh scope. `lower.rs` calls [`analyze`] once per procedure body
//! it lowers, threading the growing stack of enclosing procedures' local
//! sets down through recursive descent rather than precomputing a map keyed
//! by node identity — the AST has already been handed to the lowering pass
//! by the time scope analysis runs, and walking it once serves both jobs.

use crate::ast::Stmt;
use std::collections::HashSet;

/// Names this procedure assigns that resolve outside its own locals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    /// Assigned here, bound in no enclosing procedure: binds at the top level.
    pub globals: Vec<String>,
    /// Assigned here, bound in some enclosing (non-top) procedure: closes over it.
    pub nonlocals: Vec<String>,
}

/// Classifies `body`'s free assignments against `enclosing`, the local-name
/// sets of each procedure lexically surrounding `body`, outermost first.
/// The top level is not itself represented in `enclosing` — an assignment
/// that matches nothing in `enclosing` is a `global` by definition.
pub fn analyze(body: &[Stmt], enclosing: &[HashSet<String>]) -> Scope {
    let mut locals = HashSet::new();
    let mut assigned = HashSet::new();
    collect(body, &mut locals, &mut assigned);

    let mut globals = Vec::new();
    let mut nonlocals = Vec::new();
    for name in assigned {
        if locals.contains(&name) {
            continue;
        }
        if enclosing.iter().rev().any(|frame| frame.contains(&name)) {
            nonlocals.push(name);
        } else {
            globals.push(name);
        }
    }
    globals.sort();
    nonlocals.sort();
    Scope { globals, nonlocals }
}

/// The set of names `body` binds locally, for pushing onto the `enclosing`
/// stack before recursing into a nested procedure. Computed the same way
/// `analyze`'s internal `locals` set is, exposed separately since `lower.rs`
/// needs it independent of the global/nonlocal split.
pub fn local_names(body: &[Stmt]) -> HashSet<String> {
    let mut locals = HashSet::new();
    let mut assigned = HashSet::new();
    collect(body, &mut locals, &mut assigned);
    locals
}

fn collect(body: &[Stmt], locals: &mut HashSet<String>, assigned: &mut HashSet<String>) {
    for stmt in body {
        match stmt {
            Stmt::Declare { names, .. } => {
                for n in names {
                    locals.insert(n.clone());
                }
            }
            Stmt::Init { name: Some(n), .. } => {
                locals.insert(n.clone());
            }
            Stmt::Init { name: None, .. } => {}
            Stmt::Assign(names, _) => {
                for n in names {
                    locals.insert(n.clone());
                    assigned.insert(n.clone());
                }
            }
            Stmt::ObjectDef { name, .. } => {
                locals.insert(name.clone());
            }
            Stmt::Store {
                name, lhs_idx: None, ..
            } => {
                assigned.insert(name.clone());
            }
            Stmt::Store { .. } => {}
            Stmt::ProcDef { name, .. } => {
                // Binds its own name locally; its body is a fresh scope and
                // is analyzed separately when lowering descends into it.
                locals.insert(name.clone());
            }
            Stmt::If {
                then, elifs, els, ..
            } => {
                collect(then, locals, assigned);
                for elif in elifs {
                    collect(&elif.body, locals, assigned);
                }
                collect(els, locals, assigned);
            }
            Stmt::While { body, .. } => collect(body, locals, assigned),
            Stmt::For { body, .. } => collect(body, locals, assigned),
            Stmt::Foreach { var, body, .. } => {
                locals.insert(var.clone());
                collect(body, locals, assigned);
            }
            Stmt::Try { body, handlers, .. } => {
                collect(body, locals, assigned);
                for handler in handlers {
                    if let Some(bind) = &handler.bind {
                        locals.insert(bind.clone());
                    }
                    collect(&handler.body, locals, assigned);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Span;

    fn dummy_span() -> Span {
        0..0
    }

    #[test]
    fn assign_with_no_enclosing_is_global() {
        let body = vec![Stmt::Assign(vec!["和".to_string()], dummy_span())];
        let scope = analyze(&body, &[]);
        assert_eq!(scope.globals, vec!["和".to_string()]);
        assert!(scope.nonlocals.is_empty());
    }

    #[test]
    fn assign_matching_enclosing_is_nonlocal() {
        let mut outer = HashSet::new();
        outer.insert("計".to_string());
        let body = vec![Stmt::Store {
            name: "計".to_string(),
            lhs_idx: None,
            rhs: None,
            rhs_idx: None,
            delete: false,
            span: dummy_span(),
        }];
        let scope = analyze(&body, &[outer]);
        assert_eq!(scope.nonlocals, vec!["計".to_string()]);
        assert!(scope.globals.is_empty());
    }

    #[test]
    fn locally_declared_name_is_excluded() {
        let body = vec![
            Stmt::Declare {
                count: 1,
                type_tag: crate::ast::TypeTag::Number,
                inits: vec![],
                names: vec!["數".to_string()],
                public: false,
                span: dummy_span(),
            },
            Stmt::Assign(vec!["數".to_string()], dummy_span()),
        ];
        let scope = analyze(&body, &[]);
        assert!(scope.globals.is_empty());
        assert!(scope.nonlocals.is_empty());
    }

    #[test]
    fn indexed_store_does_not_assign() {
        let body = vec![Stmt::Store {
            name: "列".to_string(),
            lhs_idx: Some(crate::ast::Value::Number("1".to_string())),
            rhs: None,
            rhs_idx: None,
            delete: false,
            span: dummy_span(),
        }];
        let scope = analyze(&body, &[]);
        assert!(scope.globals.is_empty());
        assert!(scope.nonlocals.is_empty());
    }
}
