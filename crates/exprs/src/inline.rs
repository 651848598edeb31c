use wick_ast::{Arena, ExprId, ExprKind, LocalId, StmtId, StmtKind};

/// Substitute references to `find` inside one statement with a copy of
/// `replacement`, overwriting the matching expression slots in place.
///
/// The walk is deliberately capability-limited: it descends into groups,
/// calls, name/expression indexes, unary and binary operands, return lists,
/// expression statements, declaration values, `if` conditions and bodies,
/// `while` conditions and bodies, and both sides of assignments. It refuses
/// tables, numeric and generic for loops, repeat blocks, function bodies and
/// break statements — substituting across a loop boundary or into a table
/// literal changes evaluation order.
///
/// Returns the number of slots rewritten.
pub(crate) fn inline_into_stmt(
    stmt: StmtId,
    find: LocalId,
    replacement: ExprId,
    arena: &mut Arena,
) -> usize {
    match arena.stmt(stmt).kind.clone() {
        StmtKind::Expr(expr) => inline_into_expr(expr, find, replacement, arena),

        StmtKind::Return(values) => values
            .iter()
            .map(|&value| inline_into_expr(value, find, replacement, arena))
            .sum(),

        StmtKind::Local { values, .. } => values
            .iter()
            .map(|&value| inline_into_expr(value, find, replacement, arena))
            .sum(),

        StmtKind::Assign { targets, values } => {
            let mut count = 0;
            for &value in &values {
                count += inline_into_expr(value, find, replacement, arena);
            }
            for &target in &targets {
                count += inline_into_expr(target, find, replacement, arena);
            }
            count
        }

        StmtKind::If {
            condition,
            then_body,
            else_body,
        } => {
            let mut count = inline_into_expr(condition, find, replacement, arena);
            count += inline_into_block(then_body, find, replacement, arena);
            if let Some(else_body) = else_body {
                count += inline_into_block(else_body, find, replacement, arena);
            }
            count
        }

        StmtKind::While { condition, body } => {
            let mut count = inline_into_expr(condition, find, replacement, arena);
            count += inline_into_block(body, find, replacement, arena);
            count
        }

        // Refused constructs.
        StmtKind::Block(_)
        | StmtKind::Repeat { .. }
        | StmtKind::Break
        | StmtKind::LocalFunction { .. }
        | StmtKind::For { .. }
        | StmtKind::ForIn { .. }
        | StmtKind::Function { .. } => 0,
    }
}

/// Recurse into the statements of an `if`/`while` body block.
fn inline_into_block(block: StmtId, find: LocalId, replacement: ExprId, arena: &mut Arena) -> usize {
    match arena.stmt(block).kind.clone() {
        StmtKind::Block(stmts) => stmts
            .iter()
            .map(|&s| inline_into_stmt(s, find, replacement, arena))
            .sum(),
        _ => inline_into_stmt(block, find, replacement, arena),
    }
}

fn inline_into_expr(slot: ExprId, find: LocalId, replacement: ExprId, arena: &mut Arena) -> usize {
    let children: Vec<ExprId> = match &arena.expr(slot).kind {
        ExprKind::Local { local, .. } if *local == find => {
            arena.copy_expr_into(slot, replacement);
            return 1;
        }
        ExprKind::Group(inner) => vec![*inner],
        ExprKind::Call { func, args, .. } => {
            let mut children = vec![*func];
            children.extend_from_slice(args);
            children
        }
        ExprKind::IndexName { expr, .. } => vec![*expr],
        ExprKind::IndexExpr { expr, index } => vec![*expr, *index],
        ExprKind::Unary { expr, .. } => vec![*expr],
        ExprKind::Binary { left, right, .. } => vec![*left, *right],
        // Tables and function bodies are refused.
        _ => return 0,
    };

    children
        .into_iter()
        .map(|child| inline_into_expr(child, find, replacement, arena))
        .sum()
}
