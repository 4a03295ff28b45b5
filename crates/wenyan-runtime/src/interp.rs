//! The tree-walking executor for the lowered program graph (§4.6, §5).
//!
//! Each call frame owns its own `Stack`, so the "save `__stack` on entry,
//! restore on every exit path including exceptions" invariant holds for
//! free: the caller's `Stack` is simply a different local variable that the
//! callee never touches, and Rust's normal scoping restores it whether the
//! callee returns normally or via `?`.

use crate::env::{Env, NameSet};
use crate::error::WenyanFault;
use crate::format;
use crate::index_ops::{self, Key};
use crate::ir::{Arith, Cmp, Cond, ElseIf, Expr, ProcDef, Program, Stmt, Take};
use crate::negidx::NegIndex;
use crate::procedure::{self, Dispatch, ProcBody, Procedure};
use crate::stack::Stack;
use crate::value::Value;
use std::collections::HashSet;
use std::io::Write;
use std::rc::Rc;

/// How a block finished, threaded back up through `exec_block` instead of
/// using Rust exceptions/panics for `乃止`/`乃止是遍`/`乃得`.
pub enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

pub struct Interpreter<'w> {
    pub globals: crate::env::Frame,
    neg: NegIndex,
    pub no_output_hanzi: bool,
    out: &'w mut dyn Write,
}

impl<'w> Interpreter<'w> {
    pub fn new(no_output_hanzi: bool, out: &'w mut dyn Write) -> Self {
        Interpreter {
            globals: crate::env::new_frame(),
            neg: NegIndex::new(),
            no_output_hanzi,
            out,
        }
    }

    pub fn run(&mut self, program: &Program) -> Result<(), WenyanFault> {
        let env = Env::top_level(self.globals.clone());
        let mut stack = Stack::new();
        self.exec_block(&env, &mut stack, &program.stmts)?;
        Ok(())
    }

    pub fn exec_block(
        &mut self,
        env: &Env,
        stack: &mut Stack,
        stmts: &[Stmt],
    ) -> Result<Flow, WenyanFault> {
        for stmt in stmts {
            match self.exec_stmt(env, stack, stmt)? {
                Flow::Normal => continue,
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, env: &Env, stack: &mut Stack, stmt: &Stmt) -> Result<Flow, WenyanFault> {
        match stmt {
            Stmt::Declare { names, inits, public: _, type_tag } => {
                for (i, name) in names.iter().enumerate() {
                    let value = match inits.get(i) {
                        Some(e) => self.eval_expr(env, stack, e)?,
                        None => type_tag.default_value(),
                    };
                    env.bind(name, value);
                }
                Ok(Flow::Normal)
            }
            Stmt::Assign(names) => {
                for name in names.iter().rev() {
                    let v = stack.pop_one()?;
                    env.bind(name, v);
                }
                Ok(Flow::Normal)
            }
            Stmt::ProcDef(def) => {
                let proc = self.make_procedure(env, def);
                env.bind(&def.name, Value::Proc(proc));
                Ok(Flow::Normal)
            }
            Stmt::Call { callee, args } => {
                let callee_v = self.eval_expr(env, stack, callee)?;
                let mut arg_vs = Vec::with_capacity(args.len());
                for a in args {
                    arg_vs.push(self.eval_expr(env, stack, a)?);
                }
                let result = self.invoke_value(callee_v, arg_vs)?;
                stack.push(result);
                Ok(Flow::Normal)
            }
            Stmt::PipeCall { callee, take } => {
                let callee_v = self.eval_expr(env, stack, callee)?;
                let args = match take {
                    Take::Count(n) => stack.pop_n(*n)?,
                    Take::Rest => stack.pop_rest(),
                };
                let result = self.invoke_value(callee_v, args)?;
                stack.push(result);
                Ok(Flow::Normal)
            }
            Stmt::Return { value, pop_stack } => {
                let v = if *pop_stack {
                    stack.pop_one()?
                } else {
                    match value {
                        Some(e) => self.eval_expr(env, stack, e)?,
                        None => Value::Null,
                    }
                };
                Ok(Flow::Return(v))
            }
            Stmt::Append { target, values } => {
                let container = self.eval_expr(env, stack, target)?;
                let mut vs = Vec::with_capacity(values.len());
                for v in values {
                    vs.push(self.eval_expr(env, stack, v)?);
                }
                if let Value::List(list) = &container {
                    list.borrow_mut().extend(vs);
                }
                Ok(Flow::Normal)
            }
            Stmt::Concat { target, lists } => {
                let container = self.eval_expr(env, stack, target)?;
                for l in lists {
                    let v = self.eval_expr(env, stack, l)?;
                    if let (Value::List(dst), Value::List(src)) = (&container, &v) {
                        if Rc::ptr_eq(dst, src) {
                            let extra = dst.borrow().clone();
                            dst.borrow_mut().extend(extra);
                        } else {
                            dst.borrow_mut().extend(src.borrow().iter().cloned());
                        }
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::ObjectDef { name, props } => {
                let mut dict = indexmap::IndexMap::new();
                for (k, v) in props {
                    let value = self.eval_expr(env, stack, v)?;
                    dict.insert(k.clone(), value);
                }
                env.bind(name, Value::dict(dict));
                Ok(Flow::Normal)
            }
            Stmt::Print => {
                let values = stack.pop_rest();
                let line = format::format_stack(&values, self.no_output_hanzi);
                writeln!(self.out, "{}", line).ok();
                Ok(Flow::Normal)
            }
            Stmt::Clear => {
                stack.clear();
                Ok(Flow::Normal)
            }
            Stmt::BinOp { op, lhs, rhs } => {
                let l = self.eval_expr(env, stack, lhs)?;
                let r = self.eval_expr(env, stack, rhs)?;
                stack.push(apply_arith(*op, &l, &r));
                Ok(Flow::Normal)
            }
            Stmt::Not(e) => {
                let v = self.eval_expr(env, stack, e)?;
                stack.push(Value::Bool(!v.is_truthy()));
                Ok(Flow::Normal)
            }
            Stmt::Push(e) => {
                let v = self.eval_expr(env, stack, e)?;
                stack.push(v);
                Ok(Flow::Normal)
            }
            Stmt::Store { name, lhs_index, rhs, delete } => {
                self.exec_store(env, stack, name, lhs_index.as_ref(), rhs.as_ref(), *delete)?;
                Ok(Flow::Normal)
            }
            Stmt::If { cond, then, elifs, els } => {
                if self.eval_cond(env, stack, cond)? {
                    return self.exec_block(env, stack, then);
                }
                for arm in elifs {
                    let ElseIf { cond, body } = arm;
                    if self.eval_cond(env, stack, cond)? {
                        return self.exec_block(env, stack, body);
                    }
                }
                self.exec_block(env, stack, els)
            }
            Stmt::While { body } => loop {
                match self.exec_block(env, stack, body)? {
                    Flow::Break => return Ok(Flow::Normal),
                    Flow::Return(v) => return Ok(Flow::Return(v)),
                    Flow::Continue | Flow::Normal => continue,
                }
            },
            Stmt::For { count, body } => {
                let n = self.eval_expr(env, stack, count)?.to_int().max(0);
                for _ in 0..n {
                    match self.exec_block(env, stack, body)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Continue | Flow::Normal => continue,
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Foreach { container, var, body } => {
                let c = self.eval_expr(env, stack, container)?;
                let items: Vec<Value> = match &c {
                    Value::List(l) => l.borrow().clone(),
                    Value::Dict(d) => d.borrow().values().cloned().collect(),
                    _ => Vec::new(),
                };
                for item in items {
                    env.declare_local(var, item);
                    match self.exec_block(env, stack, body)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Continue | Flow::Normal => continue,
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Try { body, handlers } => {
                match self.exec_block(env, stack, body) {
                    Ok(flow) => Ok(flow),
                    Err(fault) => {
                        for h in handlers {
                            let matches = match &h.fault_name {
                                Some(n) => n == &fault.name,
                                None => true,
                            };
                            if matches {
                                if let Some(bind_name) = &h.bind {
                                    env.declare_local(bind_name, fault_to_value(&fault));
                                }
                                return self.exec_block(env, stack, &h.body);
                            }
                        }
                        Err(fault)
                    }
                }
            }
            Stmt::Raise { name, msg } => {
                let msg = match msg {
                    Some(e) => Some(format::display_scalar(&self.eval_expr(env, stack, e)?)),
                    None => None,
                };
                Err(match msg {
                    Some(m) => WenyanFault::with_msg(name.clone(), m),
                    None => WenyanFault::new(name.clone()),
                })
            }
        }
    }

    fn exec_store(
        &mut self,
        env: &Env,
        stack: &mut Stack,
        name: &str,
        lhs_index: Option<&Expr>,
        rhs: Option<&Expr>,
        delete: bool,
    ) -> Result<(), WenyanFault> {
        match (lhs_index, delete) {
            (None, true) => {
                env.bind(name, Value::Null);
            }
            (Some(idx_expr), true) => {
                let container = self.lookup(env, name)?;
                let key = self.eval_key(env, stack, idx_expr)?;
                index_ops::delete(&container, &key, &mut self.neg);
            }
            (None, false) => {
                let v = match rhs {
                    Some(e) => self.eval_expr(env, stack, e)?,
                    None => Value::Null,
                };
                env.bind(name, v);
            }
            (Some(idx_expr), false) => {
                let container = self.lookup(env, name)?;
                let key = self.eval_key(env, stack, idx_expr)?;
                let v = match rhs {
                    Some(e) => self.eval_expr(env, stack, e)?,
                    None => Value::Null,
                };
                index_ops::set(&container, &key, v, &mut self.neg);
            }
        }
        Ok(())
    }

    fn lookup(&self, env: &Env, name: &str) -> Result<Value, WenyanFault> {
        env.get(name)
            .ok_or_else(|| WenyanFault::with_msg("未知之名", name.to_string()))
    }

    fn eval_key(&mut self, env: &Env, stack: &mut Stack, e: &Expr) -> Result<Key, WenyanFault> {
        let v = self.eval_expr(env, stack, e)?;
        Ok(match v {
            Value::Str(s) => Key::Str(s.to_string()),
            other => Key::Int(other.to_int()),
        })
    }

    fn eval_expr(&mut self, env: &Env, stack: &mut Stack, expr: &Expr) -> Result<Value, WenyanFault> {
        match expr {
            Expr::Name(n) => self.lookup(env, n),
            Expr::Str(s) => Ok(Value::str(s.clone())),
            Expr::Num(n) => Ok(Value::Number(*n)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::SelfTop => Ok(stack.top_and_clear()),
            Expr::Index(container, index) => {
                let c = self.eval_expr(env, stack, container)?;
                let key = self.eval_key(env, stack, index)?;
                Ok(index_ops::get(&c, &key, &self.neg))
            }
            Expr::Length(e) => {
                let v = self.eval_expr(env, stack, e)?;
                let len = match &v {
                    Value::List(l) => l.borrow().len(),
                    Value::Dict(d) => d.borrow().len(),
                    Value::Str(s) => s.chars().count(),
                    _ => 0,
                };
                Ok(Value::Number(len as f64))
            }
            Expr::Contains(container, item, want_present) => {
                let c = self.eval_expr(env, stack, container)?;
                let needle = self.eval_expr(env, stack, item)?;
                let present = match &c {
                    Value::List(l) => l.borrow().iter().any(|v| v == &needle),
                    Value::Dict(d) => d.borrow().values().any(|v| v == &needle),
                    Value::Str(s) => match &needle {
                        Value::Str(n) => s.contains(n.as_ref()),
                        _ => false,
                    },
                    _ => false,
                };
                Ok(Value::Bool(present == *want_present))
            }
        }
    }

    fn eval_cond(&mut self, env: &Env, stack: &mut Stack, cond: &Cond) -> Result<bool, WenyanFault> {
        match cond {
            Cond::Compare(op, l, r) => {
                let lv = self.eval_expr(env, stack, l)?;
                let rv = self.eval_expr(env, stack, r)?;
                Ok(compare(*op, &lv, &rv))
            }
            Cond::And(a, b) => Ok(self.eval_cond(env, stack, a)? && self.eval_cond(env, stack, b)?),
            Cond::Or(a, b) => Ok(self.eval_cond(env, stack, a)? || self.eval_cond(env, stack, b)?),
            Cond::Not(c) => Ok(!self.eval_cond(env, stack, c)?),
            Cond::Truthy(e) => Ok(self.eval_expr(env, stack, e)?.is_truthy()),
        }
    }

    fn make_procedure(&self, env: &Env, def: &ProcDef) -> Rc<Procedure> {
        let globals: NameSet = Rc::new(def.globals.iter().cloned().collect::<HashSet<_>>());
        let nonlocals: NameSet = Rc::new(def.nonlocals.iter().cloned().collect::<HashSet<_>>());
        let body = Rc::new(ProcBody {
            name: def.name.clone(),
            param_names: def.param_names.clone(),
            rest_name: def.rest_name.clone(),
            body: def.body.clone(),
            defining_env: env.clone(),
            globals,
            nonlocals,
        });
        Procedure::new(body)
    }

    pub fn invoke_value(&mut self, callee: Value, args: Vec<Value>) -> Result<Value, WenyanFault> {
        match callee {
            Value::Proc(p) => self.invoke_proc(p, args),
            other => Err(procedure::not_callable(&other)),
        }
    }

    fn invoke_proc(&mut self, proc: Rc<Procedure>, args: Vec<Value>) -> Result<Value, WenyanFault> {
        match procedure::dispatch(&proc, args) {
            Dispatch::Partial(p) => Ok(Value::Proc(p)),
            Dispatch::RunWithRest { fixed, rest } => self.call_body(&proc.body, fixed, Some(rest)),
            Dispatch::Run { fixed, extra } => {
                let result = self.call_body(&proc.body, fixed, None)?;
                if extra.is_empty() {
                    Ok(result)
                } else {
                    self.invoke_value(result, extra)
                }
            }
        }
    }

    fn call_body(
        &mut self,
        body: &Rc<ProcBody>,
        fixed_args: Vec<Value>,
        rest: Option<Vec<Value>>,
    ) -> Result<Value, WenyanFault> {
        let call_env = body
            .defining_env
            .child(body.globals.clone(), body.nonlocals.clone());
        for (name, value) in body.param_names.iter().zip(fixed_args) {
            call_env.declare_local(name, value);
        }
        if let Some(rest_name) = &body.rest_name {
            call_env.declare_local(rest_name, Value::list(rest.unwrap_or_default()));
        }
        let mut call_stack = Stack::new();
        match self.exec_block(&call_env, &mut call_stack, &body.body)? {
            Flow::Return(v) => Ok(v),
            _ => Ok(Value::Null),
        }
    }
}

/// The value bound by a `Try` handler's `名之曰` clause: a dict exposing
/// the fault's name and message under fixed keys, so `夫「禍」之「「名」」`
/// (§8 scenario 6) resolves the way an indexed read normally would.
fn fault_to_value(fault: &WenyanFault) -> Value {
    let mut dict = indexmap::IndexMap::new();
    dict.insert("名".to_string(), Value::str(fault.name.clone()));
    dict.insert(
        "訊".to_string(),
        fault
            .msg
            .clone()
            .map(Value::str)
            .unwrap_or(Value::Null),
    );
    Value::dict(dict)
}

fn apply_arith(op: Arith, l: &Value, r: &Value) -> Value {
    let (a, b) = (numeric(l), numeric(r));
    Value::Number(match op {
        Arith::Add => a + b,
        Arith::Sub => a - b,
        Arith::Mul => a * b,
        Arith::Div => a / b,
    })
}

fn numeric(v: &Value) -> f64 {
    match v {
        Value::Number(n) => *n,
        Value::Str(s) => s.parse().unwrap_or(f64::NAN),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => f64::NAN,
    }
}

fn compare(op: Cmp, l: &Value, r: &Value) -> bool {
    match op {
        Cmp::Eq => l == r,
        Cmp::Ne => l != r,
        _ => {
            let ordering = match (l, r) {
                (Value::Str(a), Value::Str(b)) => a.as_ref().partial_cmp(b.as_ref()),
                _ => numeric(l).partial_cmp(&numeric(r)),
            };
            match ordering {
                Some(std::cmp::Ordering::Less) => matches!(op, Cmp::Lt | Cmp::Le),
                Some(std::cmp::Ordering::Greater) => matches!(op, Cmp::Gt | Cmp::Ge),
                Some(std::cmp::Ordering::Equal) => matches!(op, Cmp::Le | Cmp::Ge),
                None => false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Arith as A, Expr as E, TypeTag};

    fn run_stmts(stmts: Vec<Stmt>) -> String {
        let mut out = Vec::new();
        {
            let mut interp = Interpreter::new(false, &mut out);
            let program = Program { stmts };
            interp.run(&program).unwrap();
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn push_and_print() {
        let out = run_stmts(vec![Stmt::Push(E::Str("hello".into())), Stmt::Print]);
        assert_eq!(out, "hello\n");
    }

    #[test]
    fn binop_then_assign_then_self_print() {
        // 加一以二 名之曰甲 加甲以一 昔之甲者今其是矣 夫甲 書之  =>  4
        let stmts = vec![
            Stmt::BinOp { op: A::Add, lhs: E::Num(1.0), rhs: E::Num(2.0) },
            Stmt::Assign(vec!["甲".to_string()]),
            Stmt::BinOp { op: A::Add, lhs: E::Name("甲".into()), rhs: E::Num(1.0) },
            Stmt::Store {
                name: "甲".into(),
                lhs_index: None,
                rhs: Some(E::SelfTop),
                delete: false,
            },
            Stmt::Push(E::Name("甲".into())),
            Stmt::Print,
        ];
        assert_eq!(run_stmts(stmts), "4\n");
    }

    #[test]
    fn while_loop_accumulates() {
        let stmts = vec![
            Stmt::Declare { names: vec!["和".into()], inits: vec![E::Num(0.0)], public: false, type_tag: TypeTag::Number },
            Stmt::For {
                count: E::Num(3.0),
                body: vec![
                    Stmt::BinOp { op: A::Add, lhs: E::Name("和".into()), rhs: E::Num(1.0) },
                    Stmt::Store { name: "和".into(), lhs_index: None, rhs: Some(E::SelfTop), delete: false },
                ],
            },
            Stmt::Push(E::Name("和".into())),
            Stmt::Print,
        ];
        assert_eq!(run_stmts(stmts), "3\n");
    }
}
