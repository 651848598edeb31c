use wick_ast::{BinaryOp, ExprKind};

/// Operator precedence levels (higher binds tighter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Precedence(pub(crate) u8);

impl Precedence {
    pub(crate) const OR: Self = Precedence(1);
    pub(crate) const AND: Self = Precedence(2);
    pub(crate) const COMPARE: Self = Precedence(3);
    pub(crate) const CONCAT: Self = Precedence(4);
    pub(crate) const ADD: Self = Precedence(5);
    pub(crate) const MUL: Self = Precedence(6);
    pub(crate) const UNARY: Self = Precedence(7);
    pub(crate) const POW: Self = Precedence(8);

    pub(crate) const POSTFIX: Self = Precedence(10);
}

pub(crate) fn binop_precedence(op: BinaryOp) -> Precedence {
    match op {
        BinaryOp::Or => Precedence::OR,
        BinaryOp::And => Precedence::AND,
        BinaryOp::CompareEq
        | BinaryOp::CompareNe
        | BinaryOp::CompareLt
        | BinaryOp::CompareLe
        | BinaryOp::CompareGt
        | BinaryOp::CompareGe => Precedence::COMPARE,
        BinaryOp::Concat => Precedence::CONCAT,
        BinaryOp::Add | BinaryOp::Sub => Precedence::ADD,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => Precedence::MUL,
        BinaryOp::Pow => Precedence::POW,
    }
}

pub(crate) fn expr_precedence(kind: &ExprKind) -> Precedence {
    match kind {
        ExprKind::Binary { op, .. } => binop_precedence(*op),
        ExprKind::Unary { .. } => Precedence::UNARY,
        _ => Precedence(20), // atoms never need parens
    }
}

pub(crate) fn binop_str(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        BinaryOp::Pow => "^",
        BinaryOp::Concat => "..",
        BinaryOp::CompareNe => "~=",
        BinaryOp::CompareEq => "==",
        BinaryOp::CompareLt => "<",
        BinaryOp::CompareLe => "<=",
        BinaryOp::CompareGt => ">",
        BinaryOp::CompareGe => ">=",
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
    }
}
