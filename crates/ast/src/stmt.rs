use crate::arena::{ExprId, LocalId, StmtId};
use crate::location::Location;

/// A statement node: a span plus a tagged payload.
#[derive(Debug, Clone)]
pub struct StmtNode {
    pub location: Location,
    pub kind: StmtKind,
}

/// Statement variants, mirroring the surface parser's node hierarchy.
///
/// The lifter only ever produces `Block`, `If`, `While`, `Return`, `Expr`,
/// `Local`, `LocalFunction` and `Assign`; the remaining variants exist for
/// the printer and for the inliner's refusal list.
#[derive(Debug, Clone)]
pub enum StmtKind {
    Block(Vec<StmtId>),

    /// `if cond then body end` / `if cond then body else body end`.
    /// An `If` in `else_body` renders as `elseif`.
    If {
        condition: ExprId,
        then_body: StmtId,
        else_body: Option<StmtId>,
    },

    While {
        condition: ExprId,
        body: StmtId,
    },

    Repeat {
        body: StmtId,
        condition: ExprId,
    },

    Break,

    Return(Vec<ExprId>),

    /// Expression in statement position (a call evaluated for effect).
    Expr(ExprId),

    /// `local v1, v2, ... = e1, e2, ...`
    Local {
        vars: Vec<LocalId>,
        values: Vec<ExprId>,
    },

    /// `local function name(...) body end`
    LocalFunction {
        local: LocalId,
        func: ExprId,
    },

    /// `t1, t2, ... = e1, e2, ...` — targets are lvalue expressions.
    Assign {
        targets: Vec<ExprId>,
        values: Vec<ExprId>,
    },

    /// `for var = from, to [, step] do body end`
    For {
        var: LocalId,
        from: ExprId,
        to: ExprId,
        step: Option<ExprId>,
        body: StmtId,
    },

    /// `for v1, v2, ... in e1, e2, ... do body end`
    ForIn {
        vars: Vec<LocalId>,
        values: Vec<ExprId>,
        body: StmtId,
    },

    /// `function name(...) body end` with an lvalue name.
    Function {
        name: ExprId,
        func: ExprId,
    },
}
