//! Procedure values and the variadic/curried call convention (§4.6
//! "Procedures"/"Invocation").
//!
//! A `Procedure` carries `__paramCount`/`__takesRest`-equivalent metadata —
//! `body.param_names.len()` and `body.rest_name` — plus whatever args have
//! already been bound by a prior partial application. `invoke` implements
//! the three-way call dispatch: rest-absorption, curried chaining when
//! there are extra args and no rest, and partial application
//! (a fresh `Procedure` closing over the combined args) when there aren't
//! enough yet.

use crate::env::{Env, NameSet};
use crate::error::WenyanFault;
use crate::ir::Stmt;
use crate::value::Value;
use std::rc::Rc;

#[derive(Debug)]
pub struct ProcBody {
    pub name: String,
    pub param_names: Vec<String>,
    pub rest_name: Option<String>,
    pub body: Rc<[Stmt]>,
    /// The environment in effect where the procedure was defined — gives
    /// the body access to `nonlocals` without re-resolving scope at call
    /// time.
    pub defining_env: Env,
    /// §4.5 scope-analysis results for this procedure's own body.
    pub globals: NameSet,
    pub nonlocals: NameSet,
}

#[derive(Debug)]
pub struct Procedure {
    pub body: Rc<ProcBody>,
    pub bound: Vec<Value>,
}

impl Procedure {
    pub fn new(body: Rc<ProcBody>) -> Rc<Procedure> {
        Rc::new(Procedure {
            body,
            bound: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.body.name
    }
}

/// Outcome of combining a procedure's already-bound args with newly
/// supplied ones, before the interpreter actually runs a body.
pub enum Dispatch {
    /// Enough args (and no rest parameter): run the body with exactly
    /// `fixed`, then, if `extra` is nonempty, feed the body's result and
    /// `extra` back into `invoke` for curried chaining.
    Run { fixed: Vec<Value>, extra: Vec<Value> },
    /// Enough args and a rest parameter: run the body with `fixed` plus the
    /// rest list; nothing left over to chain (rest absorbs everything).
    RunWithRest { fixed: Vec<Value>, rest: Vec<Value> },
    /// Not enough args yet: a new procedure value closing over the
    /// combined bound args.
    Partial(Rc<Procedure>),
}

/// `__invoke`: combine `proc`'s already-bound args with `new_args` and
/// decide what to do, per §4.6. Does not itself execute a body — the
/// interpreter calls this, then runs `Dispatch::Run`/`RunWithRest` bodies
/// and recurses into `invoke` again for chained extras.
pub fn dispatch(proc: &Rc<Procedure>, new_args: Vec<Value>) -> Dispatch {
    let mut combined = proc.bound.clone();
    combined.extend(new_args);

    let fixed_arity = proc.body.param_names.len();
    if combined.len() >= fixed_arity {
        let extra = combined.split_off(fixed_arity);
        if proc.body.rest_name.is_some() {
            Dispatch::RunWithRest {
                fixed: combined,
                rest: extra,
            }
        } else {
            Dispatch::Run {
                fixed: combined,
                extra,
            }
        }
    } else {
        Dispatch::Partial(Rc::new(Procedure {
            body: proc.body.clone(),
            bound: combined,
        }))
    }
}

/// Error raised when `__invoke` is asked to call a non-procedure value.
pub fn not_callable(value: &Value) -> WenyanFault {
    WenyanFault::with_msg("不識之值", format!("not callable: {}", value.type_of()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{Env, new_frame};
    use std::collections::HashSet;

    fn dummy_body(param_names: Vec<&str>, rest: Option<&str>) -> Rc<ProcBody> {
        Rc::new(ProcBody {
            name: "f".into(),
            param_names: param_names.into_iter().map(String::from).collect(),
            rest_name: rest.map(String::from),
            body: Rc::from(Vec::<Stmt>::new()),
            defining_env: Env::top_level(new_frame()),
            globals: Rc::new(HashSet::new()),
            nonlocals: Rc::new(HashSet::new()),
        })
    }

    #[test]
    fn partial_application_accumulates() {
        let proc = Procedure::new(dummy_body(vec!["a", "b"], None));
        match dispatch(&proc, vec![Value::Number(1.0)]) {
            Dispatch::Partial(p) => {
                assert_eq!(p.bound, vec![Value::Number(1.0)]);
                match dispatch(&p, vec![Value::Number(2.0)]) {
                    Dispatch::Run { fixed, extra } => {
                        assert_eq!(fixed, vec![Value::Number(1.0), Value::Number(2.0)]);
                        assert!(extra.is_empty());
                    }
                    _ => panic!("expected Run"),
                }
            }
            _ => panic!("expected Partial"),
        }
    }

    #[test]
    fn extra_args_without_rest_chain() {
        let proc = Procedure::new(dummy_body(vec!["a"], None));
        match dispatch(&proc, vec![Value::Number(1.0), Value::Number(2.0)]) {
            Dispatch::Run { fixed, extra } => {
                assert_eq!(fixed, vec![Value::Number(1.0)]);
                assert_eq!(extra, vec![Value::Number(2.0)]);
            }
            _ => panic!("expected Run"),
        }
    }

    #[test]
    fn rest_absorbs_everything() {
        let proc = Procedure::new(dummy_body(vec!["a"], Some("more")));
        match dispatch(&proc, vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]) {
            Dispatch::RunWithRest { fixed, rest } => {
                assert_eq!(fixed, vec![Value::Number(1.0)]);
                assert_eq!(rest, vec![Value::Number(2.0), Value::Number(3.0)]);
            }
            _ => panic!("expected RunWithRest"),
        }
    }
}
