//! AST → `wenyan_runtime::ir` lowering (§4.6).
//!
//! Lowering and scope analysis run together: each procedure body is handed
//! to [`scope::analyze`] as it's lowered, with the growing stack of
//! enclosing procedures' local-name sets threaded straight through the
//! recursive descent (see `scope.rs`'s module doc for why that replaces a
//! separately precomputed node-identity map).
//!
//! `Import`/`Macro`/`Comment` statements lower to nothing: by the time a
//! compilation unit reaches this pass, the driver has already expanded
//! macros and inlined imported modules (§4.3) into the token stream that
//! was parsed, so encountering one of these nodes here means it slipped
//! through unexpanded. They're treated as no-ops rather than faults, since
//! a defensive no-op can't corrupt an otherwise-correct program the way a
//! spurious fault would.

use crate::ast;
use crate::error::{GrammarFault, SourceMap};
use crate::scope;
use crate::token::Span;
use std::collections::HashSet;
use std::rc::Rc;
use wenyan_runtime::ir;

pub fn lower_program(program: &ast::Program, filename: &str, src: &str) -> Result<ir::Program, GrammarFault> {
    let l = Lowerer { filename, src };
    let stmts = l.lower_body(&program.stmts, &[])?;
    Ok(ir::Program { stmts })
}

struct Lowerer<'a> {
    filename: &'a str,
    src: &'a str,
}

impl<'a> Lowerer<'a> {
    fn fault(&self, span: &Span, message: &str) -> GrammarFault {
        let map = SourceMap::new(self.src);
        let (line, col, text) = map.locate(span.start);
        GrammarFault::new(message.to_string(), self.filename.to_string(), line, col, text)
    }

    fn lower_value(&self, v: &ast::Value, span: &Span) -> Result<ir::Expr, GrammarFault> {
        Ok(match v {
            ast::Value::Name(n) => ir::Expr::Name(n.clone()),
            ast::Value::Str(s) => ir::Expr::Str(s.clone()),
            ast::Value::Number(s) => ir::Expr::Num(s.parse::<f64>().map_err(|_| self.fault(span, "不識之值"))?),
            ast::Value::Bool(b) => ir::Expr::Bool(*b),
            ast::Value::SelfValue => ir::Expr::SelfTop,
            // `其餘` only ever denotes the rest-take marker, consumed directly
            // by the parser's `Take`/`PipeCall` handling; it never reaches
            // here as an ordinary value in a well-formed program.
            ast::Value::Rest => return Err(self.fault(span, "不識之值")),
        })
    }

    fn lower_arith(op: ast::Arith) -> ir::Arith {
        match op {
            ast::Arith::Add => ir::Arith::Add,
            ast::Arith::Sub => ir::Arith::Sub,
            ast::Arith::Mul => ir::Arith::Mul,
            ast::Arith::Div => ir::Arith::Div,
        }
    }

    fn lower_cmp(op: ast::Cmp) -> ir::Cmp {
        match op {
            ast::Cmp::Eq => ir::Cmp::Eq,
            ast::Cmp::Ne => ir::Cmp::Ne,
            ast::Cmp::Le => ir::Cmp::Le,
            ast::Cmp::Ge => ir::Cmp::Ge,
            ast::Cmp::Lt => ir::Cmp::Lt,
            ast::Cmp::Gt => ir::Cmp::Gt,
        }
    }

    fn lower_type_tag(tag: ast::TypeTag) -> ir::TypeTag {
        match tag {
            ast::TypeTag::Number => ir::TypeTag::Number,
            ast::TypeTag::String => ir::TypeTag::String,
            ast::TypeTag::Bool => ir::TypeTag::Bool,
            ast::TypeTag::List => ir::TypeTag::List,
            ast::TypeTag::Object => ir::TypeTag::Object,
            ast::TypeTag::Proc => ir::TypeTag::Proc,
            ast::TypeTag::Any => ir::TypeTag::Any,
        }
    }

    fn lower_atom(&self, atom: &ast::CondAtom, span: &Span) -> Result<ir::Expr, GrammarFault> {
        Ok(match atom {
            ast::CondAtom::Value(v) => self.lower_value(v, span)?,
            ast::CondAtom::Indexed(v, idx) => {
                ir::Expr::Index(Box::new(self.lower_value(v, span)?), Box::new(self.lower_value(idx, span)?))
            }
            ast::CondAtom::Length(v) => ir::Expr::Length(Box::new(self.lower_value(v, span)?)),
        })
    }

    fn lower_cond(&self, cond: &ast::CondExpr, span: &Span) -> Result<ir::Cond, GrammarFault> {
        Ok(match cond {
            ast::CondExpr::Atom(a) => ir::Cond::Truthy(self.lower_atom(a, span)?),
            ast::CondExpr::Compare(cmp, l, r) => {
                ir::Cond::Compare(Self::lower_cmp(*cmp), self.lower_atom(l, span)?, self.lower_atom(r, span)?)
            }
            ast::CondExpr::And(l, r) => {
                ir::Cond::And(Box::new(self.lower_cond(l, span)?), Box::new(self.lower_cond(r, span)?))
            }
            ast::CondExpr::Or(l, r) => {
                ir::Cond::Or(Box::new(self.lower_cond(l, span)?), Box::new(self.lower_cond(r, span)?))
            }
            ast::CondExpr::SelfTruthy { invert: false } => ir::Cond::Truthy(ir::Expr::SelfTop),
            ast::CondExpr::SelfTruthy { invert: true } => ir::Cond::Not(Box::new(ir::Cond::Truthy(ir::Expr::SelfTop))),
        })
    }

    /// Splits a flat parameter-group list into the flat `param_names` +
    /// `rest_name` shape `ir::ProcDef` wants. A group's `count` may exceed
    /// the number of names it actually bound (positions declared but left
    /// anonymous); those positions still consume an argument slot, so they
    /// get an unreachable synthetic name — no source identifier can ever
    /// collide with one, since the lexer only accepts Han-script identifiers.
    fn flatten_params(params: &[ast::ParamGroup]) -> (Vec<String>, Option<String>) {
        let mut param_names = Vec::new();
        let mut rest_name = None;
        let mut anon = 0usize;
        for group in params {
            if group.is_rest {
                rest_name = group.names.first().cloned();
                continue;
            }
            for i in 0..group.count as usize {
                match group.names.get(i) {
                    Some(name) => param_names.push(name.clone()),
                    None => {
                        param_names.push(format!("__{anon}"));
                        anon += 1;
                    }
                }
            }
        }
        (param_names, rest_name)
    }

    fn lower_proc_def(
        &self,
        name: &str,
        params: &[ast::ParamGroup],
        body: &[ast::Stmt],
        public: bool,
        enclosing: &[HashSet<String>],
    ) -> Result<ir::ProcDef, GrammarFault> {
        let (param_names, rest_name) = Self::flatten_params(params);

        let mut inner_enclosing = enclosing.to_vec();
        inner_enclosing.push(scope::local_names(body));
        let lowered_body = self.lower_body(body, &inner_enclosing)?;

        let analyzed = scope::analyze(body, enclosing);
        Ok(ir::ProcDef {
            name: name.to_string(),
            param_names,
            rest_name,
            body: Rc::from(lowered_body.into_boxed_slice()),
            public,
            globals: analyzed.globals,
            nonlocals: analyzed.nonlocals,
        })
    }

    fn lower_body(&self, stmts: &[ast::Stmt], enclosing: &[HashSet<String>]) -> Result<Vec<ir::Stmt>, GrammarFault> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < stmts.len() {
            let stmt = &stmts[i];
            if let ast::Stmt::Take { count, rest, span } = stmt {
                let next = stmts.get(i + 1);
                let ast::Stmt::PipeCall { callee, span: call_span } = next.expect("parser guarantees Take is followed by PipeCall") else {
                    return Err(self.fault(span, "取後未以施"));
                };
                let take = if *rest { ir::Take::Rest } else { ir::Take::Count(count.expect("count set when rest is false") as usize) };
                out.push(ir::Stmt::PipeCall { callee: self.lower_value(callee, call_span)?, take });
                i += 2;
                continue;
            }
            self.lower_stmt(stmt, enclosing, &mut out)?;
            i += 1;
        }
        Ok(out)
    }

    fn lower_stmt(&self, stmt: &ast::Stmt, enclosing: &[HashSet<String>], out: &mut Vec<ir::Stmt>) -> Result<(), GrammarFault> {
        match stmt {
            ast::Stmt::Declare { count, type_tag, inits, names, public, span } => {
                if inits.len() as u32 > *count {
                    return Err(self.fault(span, "初值多於數量"));
                }
                if names.len() as u32 > *count {
                    return Err(self.fault(span, "名多於數量"));
                }
                let lowered_inits = inits.iter().map(|v| self.lower_value(v, span)).collect::<Result<Vec<_>, _>>()?;
                out.push(ir::Stmt::Declare {
                    names: names.clone(),
                    inits: lowered_inits,
                    public: *public,
                    type_tag: Self::lower_type_tag(*type_tag),
                });
            }
            ast::Stmt::Init { value, name, span, .. } => {
                out.push(ir::Stmt::Push(self.lower_value(value, span)?));
                if let Some(n) = name {
                    out.push(ir::Stmt::Assign(vec![n.clone()]));
                }
            }
            ast::Stmt::Assign(names, _) => out.push(ir::Stmt::Assign(names.clone())),
            ast::Stmt::Import { .. } | ast::Stmt::Macro { .. } | ast::Stmt::Comment(_) => {}
            ast::Stmt::ProcDef { name, params, body, public, .. } => {
                let def = self.lower_proc_def(name, params, body, *public, enclosing)?;
                out.push(ir::Stmt::ProcDef(def));
            }
            ast::Stmt::Call { callee, args, span } => {
                out.push(ir::Stmt::Call {
                    callee: self.lower_value(callee, span)?,
                    args: args.iter().map(|a| self.lower_value(a, span)).collect::<Result<_, _>>()?,
                });
            }
            // `lower_body`'s loop always consumes a `Take` together with the
            // `PipeCall` the parser guarantees follows it, so neither ever
            // reaches here on its own.
            ast::Stmt::PipeCall { .. } | ast::Stmt::Take { .. } => unreachable!("Take/PipeCall consumed in lower_body"),
            ast::Stmt::Return { value, pop_stack, span, .. } => {
                let value = match value {
                    Some(v) => Some(self.lower_value(v, span)?),
                    None => None,
                };
                out.push(ir::Stmt::Return { value, pop_stack: *pop_stack });
            }
            ast::Stmt::Append { target, values, span } => {
                out.push(ir::Stmt::Append {
                    target: self.lower_value(target, span)?,
                    values: values.iter().map(|v| self.lower_value(v, span)).collect::<Result<_, _>>()?,
                });
            }
            ast::Stmt::Concat { target, lists, span } => {
                out.push(ir::Stmt::Concat {
                    target: self.lower_value(target, span)?,
                    lists: lists.iter().map(|v| self.lower_value(v, span)).collect::<Result<_, _>>()?,
                });
            }
            ast::Stmt::ObjectDef { name, props, span } => {
                let props = props
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.lower_value(v, span)?)))
                    .collect::<Result<Vec<_>, GrammarFault>>()?;
                out.push(ir::Stmt::ObjectDef { name: name.clone(), props });
            }
            ast::Stmt::Print(_) => out.push(ir::Stmt::Print),
            ast::Stmt::Clear(_) => out.push(ir::Stmt::Clear),
            ast::Stmt::BinOp { op, lhs, rhs, span } => {
                out.push(ir::Stmt::BinOp {
                    op: Self::lower_arith(*op),
                    lhs: self.lower_value(lhs, span)?,
                    rhs: self.lower_value(rhs, span)?,
                });
            }
            ast::Stmt::Not { value, span } => out.push(ir::Stmt::Not(self.lower_value(value, span)?)),
            ast::Stmt::Push { value, span } => out.push(ir::Stmt::Push(self.lower_value(value, span)?)),
            ast::Stmt::Index { container, index, span } => {
                out.push(ir::Stmt::Push(ir::Expr::Index(
                    Box::new(self.lower_value(container, span)?),
                    Box::new(self.lower_value(index, span)?),
                )));
            }
            ast::Stmt::Length { container, span } => {
                out.push(ir::Stmt::Push(ir::Expr::Length(Box::new(self.lower_value(container, span)?))));
            }
            ast::Stmt::Contains { container, item, want_present, span } => {
                out.push(ir::Stmt::Push(ir::Expr::Contains(
                    Box::new(self.lower_value(container, span)?),
                    Box::new(self.lower_value(item, span)?),
                    *want_present,
                )));
            }
            ast::Stmt::Store { name, lhs_idx, rhs, rhs_idx, delete, span } => {
                let lhs_index = match lhs_idx {
                    Some(v) => Some(self.lower_value(v, span)?),
                    None => None,
                };
                let rhs_expr = if *delete {
                    None
                } else {
                    let base = self.lower_value(rhs.as_ref().ok_or_else(|| self.fault(span, "缺右值"))?, span)?;
                    Some(match rhs_idx {
                        Some(idx) => ir::Expr::Index(Box::new(base), Box::new(self.lower_value(idx, span)?)),
                        None => base,
                    })
                };
                out.push(ir::Stmt::Store { name: name.clone(), lhs_index, rhs: rhs_expr, delete: *delete });
            }
            ast::Stmt::If { cond, then, elifs, els, span } => {
                out.push(ir::Stmt::If {
                    cond: self.lower_cond(cond, span)?,
                    then: self.lower_body(then, enclosing)?,
                    elifs: elifs
                        .iter()
                        .map(|e| {
                            Ok(ir::ElseIf { cond: self.lower_cond(&e.cond, &e.span)?, body: self.lower_body(&e.body, enclosing)? })
                        })
                        .collect::<Result<Vec<_>, GrammarFault>>()?,
                    els: self.lower_body(els, enclosing)?,
                });
            }
            ast::Stmt::While { body, .. } => out.push(ir::Stmt::While { body: self.lower_body(body, enclosing)? }),
            ast::Stmt::For { count, body, span } => {
                out.push(ir::Stmt::For { count: self.lower_value(count, span)?, body: self.lower_body(body, enclosing)? });
            }
            ast::Stmt::Break(_) => out.push(ir::Stmt::Break),
            ast::Stmt::Continue(_) => out.push(ir::Stmt::Continue),
            ast::Stmt::Foreach { container, var, body, span } => {
                out.push(ir::Stmt::Foreach {
                    container: self.lower_value(container, span)?,
                    var: var.clone(),
                    body: self.lower_body(body, enclosing)?,
                });
            }
            ast::Stmt::Try { body, handlers, .. } => {
                out.push(ir::Stmt::Try {
                    body: self.lower_body(body, enclosing)?,
                    handlers: handlers
                        .iter()
                        .map(|h| {
                            Ok(ir::Handler {
                                fault_name: h.fault_name.clone(),
                                bind: h.bind.clone(),
                                body: self.lower_body(&h.body, enclosing)?,
                            })
                        })
                        .collect::<Result<Vec<_>, GrammarFault>>()?,
                });
            }
            ast::Stmt::Raise { name, msg, span } => {
                let msg = match msg {
                    Some(v) => Some(self.lower_value(v, span)?),
                    None => None,
                };
                out.push(ir::Stmt::Raise { name: name.clone(), msg });
            }
        }
        Ok(())
    }
}
