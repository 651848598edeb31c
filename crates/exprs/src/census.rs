use rustc_hash::FxHashMap;

use wick_ast::{Arena, ExprId, ExprKind, LocalId, StmtId, StmtKind};

/// Which statements reference each local, in visitation order.
///
/// A reference is any `Local` expression reachable from a statement's
/// expression trees — reads and assignment targets alike. The recorded
/// context is the directly enclosing statement; statements nested in `if`
/// and loop bodies record themselves, not their parent.
#[derive(Debug, Default)]
pub(crate) struct Census {
    refs: FxHashMap<LocalId, Vec<StmtId>>,
}

impl Census {
    pub(crate) fn refs(&self, local: LocalId) -> Option<&[StmtId]> {
        self.refs.get(&local).map(|v| v.as_slice())
    }
}

pub(crate) fn collect(body: &[StmtId], arena: &Arena) -> Census {
    let mut census = Census::default();
    for &stmt in body {
        visit_stmt(stmt, arena, &mut census);
    }
    census
}

fn visit_stmt(stmt: StmtId, arena: &Arena, census: &mut Census) {
    match &arena.stmt(stmt).kind {
        StmtKind::Block(stmts) => {
            for &s in stmts {
                visit_stmt(s, arena, census);
            }
        }
        StmtKind::If {
            condition,
            then_body,
            else_body,
        } => {
            visit_expr(*condition, stmt, arena, census);
            visit_stmt(*then_body, arena, census);
            if let Some(else_body) = else_body {
                visit_stmt(*else_body, arena, census);
            }
        }
        StmtKind::While { condition, body } => {
            visit_expr(*condition, stmt, arena, census);
            visit_stmt(*body, arena, census);
        }
        StmtKind::Repeat { body, condition } => {
            visit_stmt(*body, arena, census);
            visit_expr(*condition, stmt, arena, census);
        }
        StmtKind::Break => {}
        StmtKind::Return(values) => {
            for &value in values {
                visit_expr(value, stmt, arena, census);
            }
        }
        StmtKind::Expr(expr) => visit_expr(*expr, stmt, arena, census),
        StmtKind::Local { values, .. } => {
            for &value in values {
                visit_expr(value, stmt, arena, census);
            }
        }
        StmtKind::LocalFunction { func, .. } => visit_expr(*func, stmt, arena, census),
        StmtKind::Assign { targets, values } => {
            for &target in targets {
                visit_expr(target, stmt, arena, census);
            }
            for &value in values {
                visit_expr(value, stmt, arena, census);
            }
        }
        StmtKind::For {
            from,
            to,
            step,
            body,
            ..
        } => {
            visit_expr(*from, stmt, arena, census);
            visit_expr(*to, stmt, arena, census);
            if let Some(step) = step {
                visit_expr(*step, stmt, arena, census);
            }
            visit_stmt(*body, arena, census);
        }
        StmtKind::ForIn { values, body, .. } => {
            for &value in values {
                visit_expr(value, stmt, arena, census);
            }
            visit_stmt(*body, arena, census);
        }
        StmtKind::Function { name, func } => {
            visit_expr(*name, stmt, arena, census);
            visit_expr(*func, stmt, arena, census);
        }
    }
}

fn visit_expr(expr: ExprId, context: StmtId, arena: &Arena, census: &mut Census) {
    match &arena.expr(expr).kind {
        ExprKind::Local { local, .. } => {
            census.refs.entry(*local).or_default().push(context);
        }
        ExprKind::Group(inner) => visit_expr(*inner, context, arena, census),
        ExprKind::Call { func, args, .. } => {
            visit_expr(*func, context, arena, census);
            for &arg in args {
                visit_expr(arg, context, arena, census);
            }
        }
        ExprKind::IndexName { expr, .. } => visit_expr(*expr, context, arena, census),
        ExprKind::IndexExpr { expr, index } => {
            visit_expr(*expr, context, arena, census);
            visit_expr(*index, context, arena, census);
        }
        // Closure bodies are visited; their statements become their own
        // reference contexts.
        ExprKind::Function { body, .. } => visit_stmt(*body, arena, census),
        ExprKind::Table { pairs } => {
            for (key, value) in pairs {
                if let Some(key) = key {
                    visit_expr(*key, context, arena, census);
                }
                visit_expr(*value, context, arena, census);
            }
        }
        ExprKind::Unary { expr, .. } => visit_expr(*expr, context, arena, census),
        ExprKind::Binary { left, right, .. } => {
            visit_expr(*left, context, arena, census);
            visit_expr(*right, context, arena, census);
        }
        ExprKind::Nil
        | ExprKind::Bool(_)
        | ExprKind::Number(_)
        | ExprKind::String(_)
        | ExprKind::Global(_)
        | ExprKind::Varargs => {}
    }
}
