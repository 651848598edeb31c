use crate::arena::{ExprId, LocalId, StmtId};
use crate::location::Location;
use crate::types::{BinaryOp, UnaryOp};

/// An expression node: a span plus a tagged payload.
#[derive(Debug, Clone)]
pub struct ExprNode {
    pub location: Location,
    pub kind: ExprKind,
}

/// Expression variants, mirroring the surface parser's node hierarchy:
///
///   AstExprGroup          -> Group
///   AstExprConstantNil    -> Nil
///   AstExprConstantBool   -> Bool
///   AstExprConstantNumber -> Number
///   AstExprConstantString -> String
///   AstExprLocal          -> Local
///   AstExprGlobal         -> Global
///   AstExprVarargs        -> Varargs
///   AstExprCall           -> Call
///   AstExprIndexName      -> IndexName
///   AstExprIndexExpr      -> IndexExpr
///   AstExprFunction       -> Function
///   AstExprTable          -> Table
///   AstExprUnary          -> Unary
///   AstExprBinary         -> Binary
#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Parenthesized expression: `(expr)`.
    Group(ExprId),

    Nil,
    Bool(bool),
    Number(f64),
    /// Raw string payload — bytecode strings are byte strings, not
    /// necessarily valid UTF-8.
    String(Vec<u8>),

    /// Reference to a local binding. `upvalue` is true when the binding
    /// belongs to an enclosing function.
    Local { local: LocalId, upvalue: bool },

    Global(String),

    /// `...`
    Varargs,

    /// `func(args...)`; `self_call` marks `recv:name(args)` sugar, in which
    /// case `func` is an `IndexName`.
    Call {
        func: ExprId,
        args: Vec<ExprId>,
        self_call: bool,
    },

    /// `expr.index` with an identifier index.
    IndexName { expr: ExprId, index: String },

    /// `expr[index]` with an arbitrary expression index.
    IndexExpr { expr: ExprId, index: ExprId },

    /// `function(args...) body end`
    Function {
        args: Vec<LocalId>,
        vararg: bool,
        body: StmtId,
    },

    /// Table constructor. Entries with a `None` key are array items.
    Table {
        pairs: Vec<(Option<ExprId>, ExprId)>,
    },

    Unary {
        op: UnaryOp,
        expr: ExprId,
    },

    Binary {
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
    },
}
