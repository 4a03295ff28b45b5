//! Recursive-descent parser (§4.4).
//!
//! One token of lookahead suffices almost everywhere. The two exceptions
//! get dedicated handling: [`Parser::looks_like_proc_def`] scans forward
//! (bounded to ~64 tokens — long parameter lists may exceed it, so this
//! bound may grow but must never shrink) to tell a procedure definition
//! from a plain `術`-typed declaration, and
//! [`Parser::parse_push_or_contains`] speculatively parses a second value
//! to tell a containment test from a plain push.
//!
//! Blocks close either on an explicit closer keyword or, implicitly, on a
//! return-family statement — [`Parser::collect_body`] reports which and
//! lets each caller decide how to consume (or not consume) the closer.

use crate::ast::*;
use crate::error::{GrammarFault, SourceMap};
use crate::keywords::keyword_text;
use crate::token::{Kw, Span, Token, TokenKind};

/// How a statement group can terminate when collected by [`Parser::collect_body`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockEnd {
    /// Stopped sitting on a closer keyword the caller asked about; it was
    /// *not* consumed.
    Closer,
    /// The last statement collected was a return-family statement; the
    /// block is implicitly done and nothing more needs consuming.
    ImplicitReturn,
    /// Ran out of tokens before either of the above.
    Eof,
}

#[derive(Debug, Clone, Copy)]
enum PendingTake {
    Count(u32),
    Rest,
}

pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    filename: String,
    src: &'a str,
    pending_take: Option<PendingTake>,
    /// §4.4 dangling-terminator rule: set when a statement just consumed a
    /// `是也` whose `也` half a structural closer may also need. Read (and
    /// cleared) by the very next [`Parser::is_closer`] check.
    synthetic_ye_pending: bool,
    /// Whether the most recent `is_closer` match was satisfied by
    /// `synthetic_ye_pending` rather than a real token, so
    /// [`Parser::consume_closer`] knows not to advance past a token that
    /// isn't actually there.
    last_closer_was_synthetic: bool,
}

pub fn parse_program(tokens: &[Token], filename: &str, src: &str) -> Result<Program, GrammarFault> {
    let mut p = Parser {
        tokens,
        pos: 0,
        filename: filename.to_string(),
        src,
        pending_take: None,
        synthetic_ye_pending: false,
        last_closer_was_synthetic: false,
    };
    let mut stmts = Vec::new();
    while !p.at_end() {
        stmts.extend(p.parse_stmt_group()?);
    }
    Ok(Program { stmts })
}

impl<'a> Parser<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kw(&self) -> Option<Kw> {
        match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Keyword(k)) => Some(*k),
            _ => None,
        }
    }

    fn check_kw(&self, kw: Kw) -> bool {
        self.peek_kw() == Some(kw)
    }

    fn advance(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn span_here(&self) -> Span {
        self.peek()
            .map(|t| t.span.clone())
            .or_else(|| self.tokens.last().map(|t| t.span.end..t.span.end))
            .unwrap_or(0..0)
    }

    fn span_from(&self, start: usize) -> Span {
        let start_byte = self.tokens.get(start).map(|t| t.span.start).unwrap_or(self.src.len());
        let end_byte = if start < self.pos {
            self.tokens[self.pos - 1].span.end
        } else {
            start_byte
        };
        start_byte..end_byte
    }

    fn fault_here(&self, message: &str) -> GrammarFault {
        let span = self.span_here();
        let map = SourceMap::new(self.src);
        let (line, col, text) = map.locate(span.start);
        GrammarFault::new(message.to_string(), self.filename.clone(), line, col, text)
    }

    fn expect_kw(&mut self, kw: Kw) -> Result<(), GrammarFault> {
        if self.check_kw(kw) {
            self.advance();
            Ok(())
        } else {
            Err(self.fault_here(&format!("當為「{}」", keyword_text(kw))))
        }
    }

    fn try_identifier(&mut self) -> Option<String> {
        match self.peek().map(|t| t.kind.clone()) {
            Some(TokenKind::Identifier(name)) => {
                self.advance();
                Some(name)
            }
            _ => None,
        }
    }

    fn expect_identifier(&mut self) -> Result<String, GrammarFault> {
        self.try_identifier().ok_or_else(|| self.fault_here("當為名"))
    }

    fn expect_count(&mut self) -> Result<u32, GrammarFault> {
        match self.peek().map(|t| t.kind.clone()) {
            Some(TokenKind::NumberLiteral(s)) => {
                self.advance();
                s.parse::<u32>().map_err(|_| self.fault_here("當為數"))
            }
            _ => Err(self.fault_here("當為數")),
        }
    }

    fn expect_type_word(&mut self) -> Result<TypeTag, GrammarFault> {
        let tag = match self.peek_kw() {
            Some(Kw::TypeNumber) => TypeTag::Number,
            Some(Kw::TypeString) => TypeTag::String,
            Some(Kw::TypeBool) => TypeTag::Bool,
            Some(Kw::TypeList) => TypeTag::List,
            Some(Kw::TypeObject) => TypeTag::Object,
            Some(Kw::TypeProc) => TypeTag::Proc,
            Some(Kw::TypeAny) => TypeTag::Any,
            _ => return Err(self.fault_here("當為型別詞")),
        };
        self.advance();
        Ok(tag)
    }

    /// A bare value: name, string, number, bool, `其`, or `其餘`. Does not
    /// consume a following `之`/`之長` suffix — see [`Self::parse_value_suffixed`].
    fn parse_value(&mut self) -> Result<Value, GrammarFault> {
        match self.peek().map(|t| t.kind.clone()) {
            Some(TokenKind::Identifier(name)) => {
                self.advance();
                Ok(Value::Name(name))
            }
            Some(TokenKind::StringLiteral(s)) => {
                self.advance();
                Ok(Value::Str(s))
            }
            Some(TokenKind::NumberLiteral(s)) => {
                self.advance();
                Ok(Value::Number(s))
            }
            Some(TokenKind::Keyword(Kw::SelfKw)) => {
                self.advance();
                Ok(Value::SelfValue)
            }
            Some(TokenKind::Keyword(Kw::RestMarker)) => {
                self.advance();
                Ok(Value::Rest)
            }
            Some(TokenKind::Keyword(Kw::BoolTrue)) => {
                self.advance();
                Ok(Value::Bool(true))
            }
            Some(TokenKind::Keyword(Kw::BoolFalse)) => {
                self.advance();
                Ok(Value::Bool(false))
            }
            _ => Err(self.fault_here("不識之值")),
        }
    }

    /// Tries `parse_value`, backtracking (consuming nothing) on failure.
    fn try_parse_value(&mut self) -> Option<Value> {
        let checkpoint = self.pos;
        match self.parse_value() {
            Ok(v) => Some(v),
            Err(_) => {
                self.pos = checkpoint;
                None
            }
        }
    }

    /// A value optionally followed by `之長` or `之 <idx>`. When either
    /// suffix is present, the indexing/length operation is pushed as its
    /// own statement and the value actually referenced here is `其` — the
    /// natural stack-passing idiom this language already uses everywhere
    /// else (see `CondAtom`, where the same suffixes are folded directly
    /// into the atom instead; they can't be here, since `Value` has no
    /// index-carrying variant).
    fn parse_value_suffixed(&mut self) -> Result<(Vec<Stmt>, Value), GrammarFault> {
        let start = self.pos;
        let base = self.parse_value()?;
        if self.check_kw(Kw::LengthOf) {
            self.advance();
            let span = self.span_from(start);
            return Ok((vec![Stmt::Length { container: base, span }], Value::SelfValue));
        }
        if self.check_kw(Kw::Of) {
            self.advance();
            let idx = self.parse_value()?;
            let span = self.span_from(start);
            return Ok((vec![Stmt::Index { container: base, index: idx, span }], Value::SelfValue));
        }
        Ok((Vec::new(), base))
    }

    fn parse_atom(&mut self) -> Result<CondAtom, GrammarFault> {
        let base = self.parse_value()?;
        if self.check_kw(Kw::LengthOf) {
            self.advance();
            return Ok(CondAtom::Length(base));
        }
        if self.check_kw(Kw::Of) {
            self.advance();
            let idx = self.parse_value()?;
            return Ok(CondAtom::Indexed(base, Box::new(idx)));
        }
        Ok(CondAtom::Value(base))
    }

    fn peek_cmp(&self) -> Option<Cmp> {
        match self.peek_kw() {
            Some(Kw::Eq) => Some(Cmp::Eq),
            Some(Kw::Ne) => Some(Cmp::Ne),
            Some(Kw::Ge) => Some(Cmp::Ge),
            Some(Kw::Le) => Some(Cmp::Le),
            Some(Kw::Lt) => Some(Cmp::Lt),
            Some(Kw::Gt) => Some(Cmp::Gt),
            _ => None,
        }
    }

    fn parse_cond(&mut self) -> Result<CondExpr, GrammarFault> {
        self.parse_cond_or()
    }

    fn parse_cond_or(&mut self) -> Result<CondExpr, GrammarFault> {
        let mut left = self.parse_cond_and()?;
        while self.check_kw(Kw::Or) {
            self.advance();
            let right = self.parse_cond_and()?;
            left = CondExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_cond_and(&mut self) -> Result<CondExpr, GrammarFault> {
        let mut left = self.parse_cond_cmp()?;
        while self.check_kw(Kw::And) {
            self.advance();
            let right = self.parse_cond_cmp()?;
            left = CondExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_cond_cmp(&mut self) -> Result<CondExpr, GrammarFault> {
        if self.check_kw(Kw::IfSelfTrue) {
            self.advance();
            return Ok(CondExpr::SelfTruthy { invert: false });
        }
        if self.check_kw(Kw::IfSelfFalse) {
            self.advance();
            return Ok(CondExpr::SelfTruthy { invert: true });
        }
        let left = self.parse_atom()?;
        if let Some(cmp) = self.peek_cmp() {
            self.advance();
            let right = self.parse_atom()?;
            return Ok(CondExpr::Compare(cmp, left, right));
        }
        Ok(CondExpr::Atom(left))
    }

    /// Collects statements until either a keyword in `is_close` is the
    /// current token (not consumed) or the last statement parsed was a
    /// return-family statement (block implicitly ends there).
    fn collect_body(&mut self, closers: &[Kw]) -> Result<(Vec<Stmt>, BlockEnd), GrammarFault> {
        let mut body = Vec::new();
        loop {
            if self.is_closer(closers) {
                return Ok((body, BlockEnd::Closer));
            }
            if self.at_end() {
                return Ok((body, BlockEnd::Eof));
            }
            let group = self.parse_stmt_group()?;
            let ends_in_return = matches!(group.last(), Some(Stmt::Return { .. }));
            body.extend(group);
            if ends_in_return {
                return Ok((body, BlockEnd::ImplicitReturn));
            }
        }
    }

    /// Checks whether the parser is sitting on one of `closers`, either as
    /// a real upcoming token or via a pending synthetic `也` (§4.4). Either
    /// way this consumes `synthetic_ye_pending` — it only ever answers for
    /// the one structural position immediately following the statement
    /// that set it.
    fn is_closer(&mut self, closers: &[Kw]) -> bool {
        let synthetic = std::mem::take(&mut self.synthetic_ye_pending);
        if synthetic && closers.contains(&Kw::EndYe) {
            self.last_closer_was_synthetic = true;
            return true;
        }
        self.last_closer_was_synthetic = false;
        self.peek_kw().is_some_and(|k| closers.contains(&k))
    }

    /// Consumes the closer token `is_closer` just reported — unless it was
    /// satisfied synthetically, in which case there is no token to skip.
    fn consume_closer(&mut self) {
        if self.last_closer_was_synthetic {
            self.last_closer_was_synthetic = false;
        } else {
            self.advance();
        }
    }

    /// Bounded forward scan (§4.4): at `吾有/今有 <N> 術`, look for
    /// `是術曰`/`乃行是術曰` within ~64 tokens to tell a procedure
    /// definition from a plain declaration of type `術`. Must not cross a
    /// `是謂…之術也` pair belonging to an enclosing definition.
    fn looks_like_proc_def(&self) -> bool {
        let limit = (self.pos + 64).min(self.tokens.len());
        for tok in &self.tokens[self.pos..limit] {
            match &tok.kind {
                TokenKind::Keyword(Kw::ProcBodyOpenA) | TokenKind::Keyword(Kw::ProcBodyOpenB) => return true,
                TokenKind::Keyword(Kw::EndShiWei) => return false,
                _ => {}
            }
        }
        false
    }

    fn parse_stmt_group(&mut self) -> Result<Vec<Stmt>, GrammarFault> {
        // A synthetic `也` only ever applies to the structural position
        // immediately following the statement that set it; `is_closer`
        // already consumes it there. Reaching here without that check
        // having run (e.g. back at the top level, which has no closers at
        // all) means it was never a real closer opportunity.
        self.synthetic_ye_pending = false;
        let public = if self.check_kw(Kw::Public) {
            self.advance();
            true
        } else {
            false
        };
        match self.peek_kw() {
            Some(Kw::ThereIs) | Some(Kw::ThereIsNow) => Ok(vec![self.parse_declare_or_procdef(public)?]),
            Some(Kw::Means) => Ok(vec![self.parse_init()?]),
            Some(Kw::NameIt) => Ok(vec![self.parse_assign()?]),
            Some(Kw::Add) => self.parse_binop(Arith::Add),
            Some(Kw::Sub) => self.parse_binop(Arith::Sub),
            Some(Kw::Mul) => self.parse_binop(Arith::Mul),
            Some(Kw::Div) => self.parse_binop(Arith::Div),
            Some(Kw::NotKw) => self.parse_not(),
            Some(Kw::Push) => self.parse_push_or_contains(),
            Some(Kw::Print) => {
                let start = self.pos;
                self.advance();
                Ok(vec![Stmt::Print(self.span_from(start))])
            }
            Some(Kw::Clear) => {
                let start = self.pos;
                self.advance();
                Ok(vec![Stmt::Clear(self.span_from(start))])
            }
            Some(Kw::Former) => Ok(vec![self.parse_store()?]),
            Some(Kw::Append) => Ok(vec![self.parse_append()?]),
            Some(Kw::Concat) => Ok(vec![self.parse_concat()?]),
            Some(Kw::NewObject) => Ok(vec![self.parse_object_def()?]),
            Some(Kw::If) | Some(Kw::IfSelfTrue) | Some(Kw::IfSelfFalse) => Ok(vec![self.parse_if()?]),
            Some(Kw::While) => Ok(vec![self.parse_while()?]),
            Some(Kw::For) => Ok(vec![self.parse_for()?]),
            Some(Kw::Foreach) => Ok(vec![self.parse_foreach()?]),
            Some(Kw::Break) => {
                let start = self.pos;
                self.advance();
                Ok(vec![Stmt::Break(self.span_from(start))])
            }
            Some(Kw::Continue) => {
                let start = self.pos;
                self.advance();
                Ok(vec![Stmt::Continue(self.span_from(start))])
            }
            Some(Kw::ReturnPopStack) | Some(Kw::ReturnValue) | Some(Kw::ReturnEmpty) => self.parse_return(),
            Some(Kw::Take) => Ok(vec![self.parse_take()?]),
            Some(Kw::PipeInvoke) => Ok(vec![self.parse_pipecall()?]),
            Some(Kw::Invoke) => Ok(vec![self.parse_call()?]),
            Some(Kw::TryOpen) => Ok(vec![self.parse_try()?]),
            Some(Kw::Raise) => Ok(vec![self.parse_raise()?]),
            Some(Kw::ImportKw) => Ok(vec![self.parse_import()?]),
            Some(Kw::MacroDef) => Ok(vec![self.parse_macro()?]),
            _ => Err(self.fault_here("不識之句")),
        }
    }

    fn parse_declare_or_procdef(&mut self, public: bool) -> Result<Stmt, GrammarFault> {
        let start = self.pos;
        self.advance(); // 吾有 / 今有
        let count = self.expect_count()?;
        let type_tag = self.expect_type_word()?;
        if type_tag == TypeTag::Proc && self.looks_like_proc_def() {
            return self.parse_proc_def_rest(start, count, public);
        }
        let mut names = Vec::new();
        if self.check_kw(Kw::NameIt) {
            self.advance();
            while let Some(name) = self.try_identifier() {
                names.push(name);
            }
            if names.is_empty() {
                return Err(self.fault_here("當為名"));
            }
        }
        if names.len() as u32 > count {
            return Err(self.fault_here("名多於數量"));
        }
        Ok(Stmt::Declare {
            count,
            type_tag,
            inits: Vec::new(),
            names,
            public,
            span: self.span_from(start),
        })
    }

    fn parse_proc_def_rest(&mut self, start: usize, count: u32, public: bool) -> Result<Stmt, GrammarFault> {
        if count != 1 {
            return Err(self.fault_here("術定義數量須為一"));
        }
        self.expect_kw(Kw::NameIt)?;
        let name = self.expect_identifier()?;
        if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Identifier(_))) {
            return Err(self.fault_here("術名不可多"));
        }
        self.expect_kw(Kw::ProcWillRun)?;
        self.expect_kw(Kw::ParamsRequire)?;
        let params = self.parse_param_groups()?;
        if !(self.check_kw(Kw::ProcBodyOpenA) || self.check_kw(Kw::ProcBodyOpenB)) {
            return Err(self.fault_here("術體未始"));
        }
        self.advance();
        let (body, end) = self.collect_body(&[Kw::EndShiWei])?;
        match end {
            BlockEnd::Eof => return Err(self.fault_here("意外之終")),
            BlockEnd::ImplicitReturn => {
                return Ok(Stmt::ProcDef { name, params, body, public, span: self.span_from(start) });
            }
            BlockEnd::Closer => {
                self.consume_closer(); // 是謂
                self.expect_identifier()?; // closing name, required but not load-bearing
                self.expect_kw(Kw::ProcDefClose)?; // 之術也
            }
        }
        Ok(Stmt::ProcDef { name, params, body, public, span: self.span_from(start) })
    }

    fn parse_param_groups(&mut self) -> Result<Vec<ParamGroup>, GrammarFault> {
        let mut groups = Vec::new();
        let mut saw_rest = false;
        loop {
            if self.check_kw(Kw::ProcBodyOpenA) || self.check_kw(Kw::ProcBodyOpenB) {
                break;
            }
            if saw_rest {
                return Err(self.fault_here("其餘參數須居末"));
            }
            let is_rest = if self.check_kw(Kw::RestMarker) {
                self.advance();
                true
            } else {
                false
            };
            let count = if is_rest { 1 } else { self.expect_count()? };
            let type_tag = self.expect_type_word()?;
            let mut names = Vec::new();
            while self.check_kw(Kw::Means) {
                self.advance();
                names.push(self.expect_identifier()?);
            }
            if is_rest {
                if names.len() != 1 {
                    return Err(self.fault_here("其餘參數須一名"));
                }
                saw_rest = true;
            }
            groups.push(ParamGroup { count, type_tag, names, is_rest });
        }
        Ok(groups)
    }

    fn parse_init(&mut self) -> Result<Stmt, GrammarFault> {
        let start = self.pos;
        self.advance(); // 曰
        let value = self.parse_value()?;
        Ok(Stmt::Init { type_tag: None, value, name: None, span: self.span_from(start) })
    }

    fn parse_assign(&mut self) -> Result<Stmt, GrammarFault> {
        let start = self.pos;
        self.advance(); // 名之曰
        let mut names = Vec::new();
        while let Some(n) = self.try_identifier() {
            names.push(n);
        }
        if names.is_empty() {
            return Err(self.fault_here("當為名"));
        }
        Ok(Stmt::Assign(names, self.span_from(start)))
    }

    fn parse_binop(&mut self, op: Arith) -> Result<Vec<Stmt>, GrammarFault> {
        let start = self.pos;
        self.advance(); // 加/減/乘/除
        let lhs = self.parse_value()?;
        if !self.check_kw(Kw::With) {
            return Err(self.fault_here("算術句介詞非法"));
        }
        self.advance();
        let rhs = self.parse_value()?;
        Ok(vec![Stmt::BinOp { op, lhs, rhs, span: self.span_from(start) }])
    }

    fn parse_not(&mut self) -> Result<Vec<Stmt>, GrammarFault> {
        let start = self.pos;
        self.advance(); // 非
        let value = self.parse_value()?;
        Ok(vec![Stmt::Not { value, span: self.span_from(start) }])
    }

    /// §4.4's `夫 <a> <b> 中有陽乎/中無陰乎` ambiguity: speculatively try a
    /// second value; only treat this as a containment test if it's
    /// immediately followed by one of the containment keywords, else
    /// backtrack to a plain push of `a`.
    fn parse_push_or_contains(&mut self) -> Result<Vec<Stmt>, GrammarFault> {
        let start = self.pos;
        self.expect_kw(Kw::Push)?;
        let (mut prelude, a) = self.parse_value_suffixed()?;
        let checkpoint = self.pos;
        if let Some(b) = self.try_parse_value() {
            if self.check_kw(Kw::ContainsTruthy) || self.check_kw(Kw::ContainsFalsy) {
                let want_present = self.check_kw(Kw::ContainsTruthy);
                self.advance();
                prelude.push(Stmt::Contains { container: a, item: b, want_present, span: self.span_from(start) });
                return Ok(prelude);
            }
        }
        self.pos = checkpoint;
        prelude.push(Stmt::Push { value: a, span: self.span_from(start) });
        Ok(prelude)
    }

    fn parse_store(&mut self) -> Result<Stmt, GrammarFault> {
        let start = self.pos;
        self.advance(); // 昔之
        let name = self.expect_identifier()?;
        let lhs_idx = if self.check_kw(Kw::Of) {
            self.advance();
            let idx = self.parse_value()?;
            if idx == Value::Rest {
                return Err(self.fault_here("昔今句左值非法"));
            }
            Some(idx)
        } else {
            None
        };
        self.expect_kw(Kw::ThatWhich)?; // 者
        self.expect_kw(Kw::Now)?; // 今

        if self.check_kw(Kw::NoLongerExists) {
            self.advance();
            if self.check_kw(Kw::EndYeSentence) {
                self.advance();
                // The `也` half of `是也` may also be the enclosing block's
                // closer (§4.4) — see `is_closer`.
                self.synthetic_ye_pending = true;
            }
            return Ok(Stmt::Store { name, lhs_idx, rhs: None, rhs_idx: None, delete: true, span: self.span_from(start) });
        }

        let rhs = self.parse_value()?;
        let rhs_idx = if self.check_kw(Kw::Of) {
            self.advance();
            Some(self.parse_value()?)
        } else {
            None
        };
        if self.check_kw(Kw::EndYiSentence) {
            self.advance();
        } else if self.check_kw(Kw::EndYeSentence) {
            self.advance();
            self.synthetic_ye_pending = true;
        } else {
            return Err(self.fault_here("缺右值"));
        }
        Ok(Stmt::Store { name, lhs_idx, rhs: Some(rhs), rhs_idx, delete: false, span: self.span_from(start) })
    }

    fn parse_append(&mut self) -> Result<Stmt, GrammarFault> {
        let start = self.pos;
        self.advance(); // 充
        let target = self.parse_value()?;
        let mut values = Vec::new();
        if self.check_kw(Kw::With) {
            self.advance();
            while let Some(v) = self.try_parse_value() {
                values.push(v);
            }
        }
        if values.is_empty() {
            return Err(self.fault_here("充需以值"));
        }
        Ok(Stmt::Append { target, values, span: self.span_from(start) })
    }

    fn parse_concat(&mut self) -> Result<Stmt, GrammarFault> {
        let start = self.pos;
        self.advance(); // 銜
        let target = self.parse_value()?;
        let mut lists = Vec::new();
        if self.check_kw(Kw::With) {
            self.advance();
            while let Some(v) = self.try_parse_value() {
                lists.push(v);
            }
        }
        if lists.is_empty() {
            return Err(self.fault_here("銜需以列"));
        }
        Ok(Stmt::Concat { target, lists, span: self.span_from(start) })
    }

    fn parse_object_def(&mut self) -> Result<Stmt, GrammarFault> {
        let start = self.pos;
        self.advance(); // 乃造一物
        let mut props = Vec::new();
        while self.check_kw(Kw::Means) {
            self.advance();
            let key = match self.parse_value()? {
                Value::Str(s) => s,
                _ => return Err(self.fault_here("物鍵當為言")),
            };
            self.expect_kw(Kw::ValueOf)?; // 之值
            let value = self.parse_value()?;
            props.push((key, value));
        }
        self.expect_kw(Kw::NameIt)?;
        let name = self.expect_identifier()?;
        Ok(Stmt::ObjectDef { name, props, span: self.span_from(start) })
    }

    fn parse_if(&mut self) -> Result<Stmt, GrammarFault> {
        let start = self.pos;
        let cond = if self.check_kw(Kw::IfSelfTrue) {
            self.advance();
            CondExpr::SelfTruthy { invert: false }
        } else if self.check_kw(Kw::IfSelfFalse) {
            self.advance();
            CondExpr::SelfTruthy { invert: true }
        } else {
            self.expect_kw(Kw::If)?;
            let c = self.parse_cond()?;
            self.expect_kw(Kw::ThatWhich)?;
            c
        };

        let closers = [Kw::ElseIf, Kw::Else, Kw::EndYunYun, Kw::EndYe, Kw::EndShiWei];
        let (then, end) = self.collect_body(&closers)?;
        if matches!(end, BlockEnd::Eof) {
            return Err(self.fault_here("若未終"));
        }

        let mut elifs = Vec::new();
        let mut els = Vec::new();

        if matches!(end, BlockEnd::Closer) {
            loop {
                if self.check_kw(Kw::ElseIf) {
                    let estart = self.pos;
                    self.advance();
                    let c = self.parse_cond()?;
                    self.expect_kw(Kw::ThatWhich)?;
                    let (body, eend) = self.collect_body(&closers)?;
                    if matches!(eend, BlockEnd::Eof) {
                        return Err(self.fault_here("若未終"));
                    }
                    elifs.push(ElseIf { cond: c, body, span: self.span_from(estart) });
                    if matches!(eend, BlockEnd::ImplicitReturn) {
                        break;
                    }
                    continue;
                }
                if self.check_kw(Kw::Else) {
                    self.advance();
                    let final_closers = [Kw::EndYunYun, Kw::EndYe, Kw::EndShiWei];
                    let (body, eend) = self.collect_body(&final_closers)?;
                    els = body;
                    if matches!(eend, BlockEnd::Eof) {
                        return Err(self.fault_here("若未終"));
                    }
                    if matches!(eend, BlockEnd::Closer) {
                        self.consume_closer();
                    }
                    break;
                }
                // sitting on a plain closer right after `then` or an elif
                // (possibly the synthetic `也` of a dangling `是也` — see
                // `is_closer`)
                self.consume_closer();
                break;
            }
        }

        Ok(Stmt::If { cond, then, elifs, els, span: self.span_from(start) })
    }

    fn parse_while(&mut self) -> Result<Stmt, GrammarFault> {
        let start = self.pos;
        self.expect_kw(Kw::While)?;
        let closers = [Kw::EndYunYun, Kw::EndYe];
        let (body, end) = self.collect_body(&closers)?;
        match end {
            BlockEnd::Eof => return Err(self.fault_here("循環未終")),
            BlockEnd::Closer => {
                self.consume_closer();
            }
            BlockEnd::ImplicitReturn => {}
        }
        Ok(Stmt::While { body, span: self.span_from(start) })
    }

    fn parse_for(&mut self) -> Result<Stmt, GrammarFault> {
        let start = self.pos;
        self.expect_kw(Kw::For)?;
        let count = self.parse_value()?;
        self.expect_kw(Kw::Times)?; // 遍
        let closers = [Kw::EndYunYun, Kw::EndYe];
        let (body, end) = self.collect_body(&closers)?;
        match end {
            BlockEnd::Eof => return Err(self.fault_here("循環未終")),
            BlockEnd::Closer => {
                self.consume_closer();
            }
            BlockEnd::ImplicitReturn => {}
        }
        Ok(Stmt::For { count, body, span: self.span_from(start) })
    }

    fn parse_foreach(&mut self) -> Result<Stmt, GrammarFault> {
        let start = self.pos;
        self.advance(); // 凡
        let container = self.parse_value()?;
        self.expect_kw(Kw::ForeachVar)?; // 中之
        let var = self.expect_identifier()?;
        let closers = [Kw::EndYunYun, Kw::EndYe];
        let (body, end) = self.collect_body(&closers)?;
        match end {
            BlockEnd::Eof => return Err(self.fault_here("循環未終")),
            BlockEnd::Closer => {
                self.consume_closer();
            }
            BlockEnd::ImplicitReturn => {}
        }
        Ok(Stmt::Foreach { container, var, body, span: self.span_from(start) })
    }

    fn parse_return(&mut self) -> Result<Vec<Stmt>, GrammarFault> {
        let start = self.pos;
        if self.check_kw(Kw::ReturnPopStack) {
            self.advance();
            return Ok(vec![Stmt::Return { value: None, pop_stack: true, empty: false, span: self.span_from(start) }]);
        }
        if self.check_kw(Kw::ReturnEmpty) {
            self.advance();
            return Ok(vec![Stmt::Return { value: None, pop_stack: false, empty: true, span: self.span_from(start) }]);
        }
        self.expect_kw(Kw::ReturnValue)?;
        let (mut prelude, value) = self.parse_value_suffixed()?;
        prelude.push(Stmt::Return { value: Some(value), pop_stack: false, empty: false, span: self.span_from(start) });
        Ok(prelude)
    }

    fn parse_take(&mut self) -> Result<Stmt, GrammarFault> {
        let start = self.pos;
        self.advance(); // 取
        let (count, rest) = if self.check_kw(Kw::RestMarker) {
            self.advance();
            (None, true)
        } else {
            (Some(self.expect_count()?), false)
        };
        let span = self.span_from(start);
        if self.at_end() {
            return Err(self.fault_here("取後未以施"));
        }
        if !self.check_kw(Kw::PipeInvoke) {
            return Err(self.fault_here("取後需以施"));
        }
        self.pending_take = Some(if rest { PendingTake::Rest } else { PendingTake::Count(count.unwrap()) });
        Ok(Stmt::Take { count, rest, span })
    }

    fn parse_pipecall(&mut self) -> Result<Stmt, GrammarFault> {
        let start = self.pos;
        self.advance(); // 以施
        if self.pending_take.is_none() {
            return Err(self.fault_here("以施需先取"));
        }
        self.pending_take = None;
        let callee = self.parse_value()?;
        Ok(Stmt::PipeCall { callee, span: self.span_from(start) })
    }

    fn parse_call(&mut self) -> Result<Stmt, GrammarFault> {
        let start = self.pos;
        self.advance(); // 施
        let callee = self.parse_value()?;
        let mut args = Vec::new();
        if self.check_kw(Kw::With) {
            self.advance();
            while let Some(v) = self.try_parse_value() {
                args.push(v);
            }
        }
        Ok(Stmt::Call { callee, args, span: self.span_from(start) })
    }

    fn parse_try(&mut self) -> Result<Stmt, GrammarFault> {
        let start = self.pos;
        self.advance(); // 姑妄行此
        let (body, end) = self.collect_body(&[Kw::CatchIntro])?;
        match end {
            BlockEnd::Eof => return Err(self.fault_here("意外之終")),
            BlockEnd::ImplicitReturn => return Err(self.fault_here("意外之終")),
            BlockEnd::Closer => {
                self.advance(); // 如事不諧
            }
        }

        let mut handlers = Vec::new();
        loop {
            if self.check_kw(Kw::CaseFault) {
                let hstart = self.pos;
                self.advance();
                let fault_name = match self.peek().map(|t| t.kind.clone()) {
                    Some(TokenKind::StringLiteral(s)) => {
                        self.advance();
                        s
                    }
                    _ => return Err(self.fault_here("捕捉需錯名")),
                };
                self.expect_kw(Kw::CaseFaultEnd)?; // 之禍歟
                let bind = if self.check_kw(Kw::NameIt) {
                    self.advance();
                    Some(self.expect_identifier()?)
                } else {
                    None
                };
                let (hbody, hend) =
                    self.collect_body(&[Kw::CaseFault, Kw::CatchAll, Kw::TryClose])?;
                if matches!(hend, BlockEnd::Eof) {
                    return Err(self.fault_here("意外之終"));
                }
                handlers.push(Handler { fault_name: Some(fault_name), bind, body: hbody, span: self.span_from(hstart) });
                continue;
            }
            if self.check_kw(Kw::CatchAll) {
                let hstart = self.pos;
                self.advance();
                let bind = if self.check_kw(Kw::NameIt) {
                    self.advance();
                    Some(self.expect_identifier()?)
                } else {
                    None
                };
                let (hbody, hend) = self.collect_body(&[Kw::TryClose])?;
                if matches!(hend, BlockEnd::Eof) {
                    return Err(self.fault_here("意外之終"));
                }
                handlers.push(Handler { fault_name: None, bind, body: hbody, span: self.span_from(hstart) });
            }
            break;
        }
        self.expect_kw(Kw::TryClose)?; // 乃作罷
        Ok(Stmt::Try { body, handlers, span: self.span_from(start) })
    }

    fn parse_raise(&mut self) -> Result<Stmt, GrammarFault> {
        let start = self.pos;
        self.advance(); // 嗚呼
        let name = match self.parse_value()? {
            Value::Str(s) => s,
            _ => return Err(self.fault_here("不識之值")),
        };
        self.expect_kw(Kw::RaiseFault)?; // 之禍
        let msg = if self.check_kw(Kw::Means) {
            self.advance();
            Some(self.parse_value()?)
        } else {
            None
        };
        Ok(Stmt::Raise { name, msg, span: self.span_from(start) })
    }

    fn parse_import(&mut self) -> Result<Stmt, GrammarFault> {
        let start = self.pos;
        self.advance(); // 吾嘗觀
        let module = match self.parse_value()? {
            Value::Str(s) => s,
            Value::Name(s) => s,
            _ => return Err(self.fault_here("不識之值")),
        };
        self.expect_kw(Kw::ImportBook)?; // 之書
        let mut exposed = Vec::new();
        if self.check_kw(Kw::Expose) {
            self.advance();
            while let Some(name) = self.try_identifier() {
                exposed.push(name);
            }
            self.expect_kw(Kw::ExposeSuffix)?; // 之義
        }
        Ok(Stmt::Import { module, exposed, span: self.span_from(start) })
    }

    fn parse_macro(&mut self) -> Result<Stmt, GrammarFault> {
        let start = self.pos;
        self.advance(); // 或云
        let pattern = match self.parse_value()? {
            Value::Str(s) => s,
            _ => return Err(self.fault_here("不識之值")),
        };
        self.expect_kw(Kw::MacroReplace)?; // 蓋謂
        let replacement = match self.parse_value()? {
            Value::Str(s) => s,
            _ => return Err(self.fault_here("不識之值")),
        };
        Ok(Stmt::Macro { pattern, replacement, span: self.span_from(start) })
    }
}
