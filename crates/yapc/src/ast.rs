use serde::{Deserialize, Serialize};
use yap_bytecode::{Truth, Type};

/// A complete program: an ordered statement sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

/// Function definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FnDef {
    pub name: String,
    /// Ordered (type, name) parameter pairs.
    pub params: Vec<(Type, String)>,
    /// Declared return type (`void` when the arrow is omitted).
    pub ret: Type,
    pub body: Vec<Stmt>,
}

/// Statements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    /// `type name = expr;` — containers declare without an initializer.
    Declaration {
        ty: Type,
        name: String,
        value: Option<Expr>,
    },
    Assignment {
        name: String,
        value: Expr,
    },
    /// Indexed-target assignment: `a[i] = v;`, `a[i][j] = v;`, `m[k] = v;`.
    IndexAssign {
        target: Expr,
        index: Expr,
        value: Expr,
    },
    /// `if` arm plus zero-or-more `elif` arms, each (condition, body),
    /// with an optional trailing `else` body.
    Cond {
        arms: Vec<(Expr, Vec<Stmt>)>,
        otherwise: Option<Vec<Stmt>>,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
    },
    For {
        init: Box<Stmt>,
        condition: Expr,
        step: Box<Stmt>,
        body: Vec<Stmt>,
    },
    Break,
    Continue,
    Function(FnDef),
    /// `yeet [expr]`.
    Return(Option<Expr>),
    /// `yap(e, e, …);` — one output line per statement.
    Print(Vec<Expr>),
    /// `struct Name { type field; … }` — registered, no construction
    /// syntax yet.
    StructDef {
        name: String,
        fields: Vec<(Type, String)>,
    },
    Expr(Expr),
}

/// Expressions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(Truth),
    Var(String),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnOp,
        expr: Box<Expr>,
    },
    Paren(Box<Expr>),
    ArrayLit(Vec<Expr>),
    /// `target[index]`; chains by nesting targets.
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    /// `arr.append(v)` — in-place, evaluates to the array.
    Append {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    /// `coll.delete(i)` — in-place, evaluates to the collection.
    Delete {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    /// `coll.len()`.
    Len(Box<Expr>),
    /// `s.push(v)` on a stack or queue — in-place, evaluates to the
    /// container.
    SeqPush {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    /// `s.pop()` — LIFO for stacks, FIFO for queues.
    SeqPop(Box<Expr>),
    /// `spill()` — one blocking input read. The type starts `Unknown`
    /// and is patched to the declaration's target type by the parser.
    Input(Type),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BinOp {
    And,
    Or,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitOr,
    Add,
    Sub,
    Mod,
    Mul,
    Div,
    FloorDiv,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum UnOp {
    Not,
    BitNot,
}
