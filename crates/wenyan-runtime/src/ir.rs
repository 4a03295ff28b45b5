//! The target program graph produced by `wenyan_compiler`'s lowering pass.
//!
//! This is a host-agnostic program graph (§4.6): a flat `Vec<Stmt>` per
//! scope (procedure body or top level), with control constructs nested
//! directly rather than addressed by jump targets. "Host-agnostic" in the
//! sense that nothing here is tied to a particular target language's AST —
//! but unlike the reference implementation (which lowers to JavaScript
//! *source text*), this crate's
//! `Stmt`/`Expr` graph is executed directly by `crate::interp::Interpreter`
//! rather than printed.
//!
//! Scope-analysis results (§4.5) are baked into `ProcDef` as `globals` and
//! `nonlocals` rather than carried in a side table, since the IR is already
//! a fresh tree distinct from the parser's AST.

use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arith {
    Add,
    Sub,
    Mul,
    Div,
}

/// Mirrors `wenyan_compiler::ast::TypeTag`. Carried into the IR (rather
/// than depended on directly — `wenyan-runtime` sits below
/// `wenyan-compiler` in the dependency graph) so an uninitialized
/// `Declare` slot can bind a type-appropriate default instead of `Null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Number,
    String,
    Bool,
    List,
    Object,
    Proc,
    Any,
}

impl TypeTag {
    /// The value an uninitialized `Declare` slot of this type binds to,
    /// rather than `Value::Null` — so e.g. an uninitialized `數` behaves as
    /// `0` under arithmetic instead of propagating `NaN`.
    pub fn default_value(self) -> crate::value::Value {
        use crate::value::Value;
        match self {
            TypeTag::Number => Value::Number(0.0),
            TypeTag::String => Value::str(""),
            TypeTag::Bool => Value::Bool(false),
            TypeTag::List => Value::list(Vec::new()),
            TypeTag::Object => Value::dict(indexmap::IndexMap::new()),
            TypeTag::Proc | TypeTag::Any => Value::Null,
        }
    }
}

/// A value-producing expression. Evaluating one never by itself mutates the
/// current frame's stack; callers decide whether to push the result.
#[derive(Debug, Clone)]
pub enum Expr {
    Name(String),
    Str(String),
    Num(f64),
    Bool(bool),
    /// `其` / `Self`: destructive read-and-clear of the stack top. Must stay
    /// a single node (not inlined) so it evaluates exactly once — see the
    /// "Destructive top-of-stack read" design note.
    SelfTop,
    Index(Box<Expr>, Box<Expr>),
    Length(Box<Expr>),
    /// `夫 <a> <b> 中有陽乎` / `中無陰乎`: does `container` hold a value equal
    /// to `item`? `want_present` is `false` for the `中無陰乎` (absence) form.
    Contains(Box<Expr>, Box<Expr>, bool),
}

/// A boolean-producing condition expression (§3 "Condition expression").
/// `&&` binds tighter than `||`, which the parser has already resolved by
/// construction (`And` nodes only ever nest inside `Or`, never the reverse,
/// unless the source used explicit grouping that the grammar doesn't
/// support — so this tree has no precedence ambiguity left to resolve).
#[derive(Debug, Clone)]
pub enum Cond {
    Compare(Cmp, Expr, Expr),
    And(Box<Cond>, Box<Cond>),
    Or(Box<Cond>, Box<Cond>),
    Not(Box<Cond>),
    /// A bare value used as a condition (`夫 X` alone, or `其` via
    /// `若其然者`), truthy per `Value::is_truthy`.
    Truthy(Expr),
}

#[derive(Debug, Clone)]
pub struct ElseIf {
    pub cond: Cond,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct Handler {
    /// `None` for the catch-all `不知何禍歟` arm.
    pub fault_name: Option<String>,
    pub bind: Option<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct ProcDef {
    pub name: String,
    pub param_names: Vec<String>,
    pub rest_name: Option<String>,
    pub body: Rc<[Stmt]>,
    pub public: bool,
    /// Names assigned in this procedure that bind in the top-level frame
    /// directly (§4.5 `globals`).
    pub globals: Vec<String>,
    /// Names assigned in this procedure that bind in an enclosing
    /// non-top-level frame (§4.5 `nonlocals`) — these make the procedure a
    /// true closure over that frame.
    pub nonlocals: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    /// Bare declaration: reserve `names`, each bound to `type_tag`'s default
    /// value unless `inits` supplies a value positionally.
    Declare {
        names: Vec<String>,
        inits: Vec<Expr>,
        public: bool,
        type_tag: TypeTag,
    },
    /// `Assign(names)`: pop `len(names)` stack values, binding right to
    /// left (rightmost name receives the most-recently-pushed value).
    Assign(Vec<String>),
    ProcDef(ProcDef),
    /// Evaluate `callee` and `args` left to right, invoke, push the result.
    Call { callee: Expr, args: Vec<Expr> },
    /// Consume the pending take: pop `k` args (or the whole stack for a
    /// rest-take) and invoke `callee`, pushing the result.
    PipeCall { callee: Expr, take: Take },
    Return {
        value: Option<Expr>,
        /// `乃得矣`: pop-and-return the top of the stack rather than
        /// evaluating `value`.
        pop_stack: bool,
    },
    Append {
        target: Expr,
        values: Vec<Expr>,
    },
    Concat {
        target: Expr,
        lists: Vec<Expr>,
    },
    ObjectDef {
        name: String,
        props: Vec<(String, Expr)>,
    },
    /// `書之`: format the current stack through `__format`, print it, then
    /// clear the stack.
    Print,
    Clear,
    /// Arithmetic as a statement: compute `lhs op rhs`, push the result.
    BinOp {
        op: Arith,
        lhs: Expr,
        rhs: Expr,
    },
    Not(Expr),
    Push(Expr),
    /// `昔之「X」[之idx]者 今 ...`. When `rhs_idx` was present in the source,
    /// lowering has already folded it into `rhs` as an `Expr::Index` node,
    /// so this IR node only ever needs one index slot (`lhs_index`).
    Store {
        name: String,
        lhs_index: Option<Expr>,
        rhs: Option<Expr>,
        delete: bool,
    },
    If {
        cond: Cond,
        then: Vec<Stmt>,
        elifs: Vec<ElseIf>,
        els: Vec<Stmt>,
    },
    While {
        body: Vec<Stmt>,
    },
    For {
        count: Expr,
        body: Vec<Stmt>,
    },
    Break,
    Continue,
    Foreach {
        container: Expr,
        var: String,
        body: Vec<Stmt>,
    },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<Handler>,
    },
    Raise {
        name: String,
        msg: Option<Expr>,
    },
}

/// Pending-take arity, carried from the parser's pending-take state (§4.4)
/// into the `PipeCall` node lowering produces.
#[derive(Debug, Clone, Copy)]
pub enum Take {
    Count(usize),
    Rest,
}

/// A fully lowered compilation unit: import statements have already been
/// inlined (each module compiled at most once — §5), so this is simply the
/// ordered statement list to execute at the top level.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}
