mod exprs;
mod precedence;
mod stmts;

use wick_ast::{Arena, StmtId};

/// Serialize the AST rooted at `root` into formatted source text.
///
/// The root block prints bare; any nested bare block prints as `do ... end`.
pub fn format_ast(arena: &Arena, root: StmtId) -> String {
    let mut writer = SourceWriter::new(arena);
    writer.emit_stmt(root);
    writer.out
}

pub(crate) struct SourceWriter<'a> {
    pub(crate) arena: &'a Arena,
    pub(crate) out: String,
    pub(crate) indent: usize,
    /// The first block encountered is the chunk itself and prints without a
    /// `do ... end` wrapper.
    pub(crate) root_emitted: bool,
}

impl<'a> SourceWriter<'a> {
    pub(crate) fn new(arena: &'a Arena) -> Self {
        Self {
            arena,
            out: String::new(),
            indent: 0,
            root_emitted: false,
        }
    }

    pub(crate) fn write_indent(&mut self) {
        for _ in 0..self.indent * 4 {
            self.out.push(' ');
        }
    }
}

/// Whether a string can stand as a bare identifier.
pub(crate) fn is_valid_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use wick_ast::{ExprKind, Location, LocalInfo, StmtKind};

    fn block(arena: &mut Arena, stmts: Vec<StmtId>) -> StmtId {
        arena.alloc_stmt(Location::default(), StmtKind::Block(stmts))
    }

    #[test]
    fn test_root_block_prints_bare() {
        let mut arena = Arena::new();
        let value = arena.alloc_expr(Location::default(), ExprKind::Number(1.0));
        let ret = arena.alloc_stmt(Location::default(), StmtKind::Return(vec![value]));
        let root = block(&mut arena, vec![ret]);

        assert_eq!(format_ast(&arena, root), "return 1\n");
    }

    #[test]
    fn test_nested_block_prints_do_end() {
        let mut arena = Arena::new();
        let value = arena.alloc_expr(Location::default(), ExprKind::Number(1.0));
        let ret = arena.alloc_stmt(Location::default(), StmtKind::Return(vec![value]));
        let inner = block(&mut arena, vec![ret]);
        let root = block(&mut arena, vec![inner]);

        assert_eq!(format_ast(&arena, root), "do\n    return 1\nend\n");
    }

    #[test]
    fn test_empty_root_is_whitespace_only() {
        let mut arena = Arena::new();
        let root = block(&mut arena, Vec::new());
        assert!(format_ast(&arena, root).trim().is_empty());
    }

    #[test]
    fn test_nil_declaration_collapses() {
        let mut arena = Arena::new();
        let local = arena.alloc_local(LocalInfo::new("var0", 1));
        let nil = arena.alloc_expr(Location::default(), ExprKind::Nil);
        let decl = arena.alloc_stmt(
            Location::default(),
            StmtKind::Local {
                vars: vec![local],
                values: vec![nil],
            },
        );
        let root = block(&mut arena, vec![decl]);

        assert_eq!(format_ast(&arena, root), "local var0\n");
    }

    #[test]
    fn test_if_with_negated_condition() {
        let mut arena = Arena::new();
        let cond_inner = arena.alloc_expr(Location::default(), ExprKind::Bool(false));
        let cond = arena.alloc_expr(
            Location::default(),
            ExprKind::Unary {
                op: wick_ast::UnaryOp::Not,
                expr: cond_inner,
            },
        );
        let value = arena.alloc_expr(Location::default(), ExprKind::Number(1.0));
        let ret = arena.alloc_stmt(Location::default(), StmtKind::Return(vec![value]));
        let then_body = block(&mut arena, vec![ret]);
        let if_stmt = arena.alloc_stmt(
            Location::default(),
            StmtKind::If {
                condition: cond,
                then_body,
                else_body: None,
            },
        );
        let root = block(&mut arena, vec![if_stmt]);

        assert_eq!(
            format_ast(&arena, root),
            "if not false then\n    return 1\nend\n"
        );
    }

    #[test]
    fn test_while_loop() {
        let mut arena = Arena::new();
        let cond = arena.alloc_expr(Location::default(), ExprKind::Bool(true));
        let brk = arena.alloc_stmt(Location::default(), StmtKind::Break);
        let body = block(&mut arena, vec![brk]);
        let while_stmt = arena.alloc_stmt(
            Location::default(),
            StmtKind::While {
                condition: cond,
                body,
            },
        );
        let root = block(&mut arena, vec![while_stmt]);

        assert_eq!(
            format_ast(&arena, root),
            "while true do\n    break\nend\n"
        );
    }
}
