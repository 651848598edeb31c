use std::fmt::Write;

use wick_ast::{ExprId, ExprKind, UnaryOp};

use crate::precedence::{binop_precedence, binop_str, expr_precedence, Precedence};
use crate::{is_valid_name, SourceWriter};

enum QuoteKind {
    Single,
    Double,
    Long,
}

/// Pick quotes that avoid escaping: double by default, single when the
/// payload holds double quotes, long brackets when it holds newlines,
/// backslashes, or both quote kinds.
fn quote_kind(s: &str) -> QuoteKind {
    let mut has_single = false;
    let mut has_double = false;
    for c in s.chars() {
        if c == '\n' || c == '\\' {
            return QuoteKind::Long;
        }
        if c == '"' {
            has_double = true;
        } else if c == '\'' {
            has_single = true;
        }
    }
    match (has_single, has_double) {
        (_, false) => QuoteKind::Double,
        (false, true) => QuoteKind::Single,
        (true, true) => QuoteKind::Long,
    }
}

impl<'a> SourceWriter<'a> {
    pub(crate) fn emit_expr(&mut self, id: ExprId) {
        let node = self.arena.expr(id);
        match &node.kind {
            ExprKind::Group(inner) => {
                self.out.push('(');
                self.emit_expr(*inner);
                self.out.push(')');
            }

            ExprKind::Nil => self.out.push_str("nil"),

            ExprKind::Bool(value) => {
                self.out.push_str(if *value { "true" } else { "false" });
            }

            ExprKind::Number(value) => self.emit_number(*value),

            ExprKind::String(bytes) => self.emit_string(bytes),

            ExprKind::Local { local, .. } => {
                let name = self.arena.local(*local).name.as_str();
                self.out.push_str(name);
            }

            ExprKind::Global(name) => self.out.push_str(name),

            ExprKind::Varargs => self.out.push_str("..."),

            ExprKind::Call {
                func,
                args,
                self_call,
            } => {
                let func_node = self.arena.expr(*func);
                if *self_call {
                    if let ExprKind::IndexName { expr, index } = &func_node.kind {
                        self.emit_expr_parens(*expr, Precedence::POSTFIX);
                        self.out.push(':');
                        self.out.push_str(index);
                    } else {
                        self.emit_expr(*func);
                    }
                } else {
                    let bare = matches!(
                        func_node.kind,
                        ExprKind::Local { .. }
                            | ExprKind::Global(_)
                            | ExprKind::Group(_)
                            | ExprKind::IndexName { .. }
                            | ExprKind::IndexExpr { .. }
                    );
                    if !bare {
                        self.out.push('(');
                    }
                    self.emit_expr(*func);
                    if !bare {
                        self.out.push(')');
                    }
                }

                self.out.push('(');
                for (i, &arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.emit_expr(arg);
                }
                self.out.push(')');
            }

            ExprKind::IndexName { expr, index } => {
                self.emit_expr_parens(*expr, Precedence::POSTFIX);
                self.out.push('.');
                self.out.push_str(index);
            }

            ExprKind::IndexExpr { expr, index } => {
                self.emit_expr_parens(*expr, Precedence::POSTFIX);

                // A string key that reads as an identifier prints as a name
                // access.
                if let ExprKind::String(bytes) = &self.arena.expr(*index).kind {
                    let key = String::from_utf8_lossy(bytes);
                    if is_valid_name(&key) {
                        self.out.push('.');
                        self.out.push_str(&key);
                        return;
                    }
                }
                self.out.push('[');
                self.emit_expr(*index);
                self.out.push(']');
            }

            ExprKind::Function { args, vararg, body } => {
                self.out.push_str("function(");
                for (i, &arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    let name = self.arena.local(arg).name.as_str();
                    self.out.push_str(name);
                }
                if *vararg {
                    if !args.is_empty() {
                        self.out.push_str(", ");
                    }
                    self.out.push_str("...");
                }
                self.out.push_str(")\n");

                self.indent += 1;
                self.emit_body(*body);
                self.indent -= 1;

                self.write_indent();
                self.out.push_str("end");
            }

            ExprKind::Table { pairs } => self.emit_table(pairs),

            ExprKind::Unary { op, expr } => {
                match op {
                    UnaryOp::Not => self.out.push_str("not "),
                    UnaryOp::Minus => self.out.push('-'),
                    UnaryOp::Len => self.out.push('#'),
                }
                self.emit_expr_parens(*expr, Precedence::UNARY);
            }

            ExprKind::Binary { op, left, right } => {
                let prec = binop_precedence(*op);
                self.emit_expr_parens(*left, prec);
                let _ = write!(self.out, " {} ", binop_str(*op));
                // `..` and `^` associate to the right.
                let right_prec = if matches!(op, wick_ast::BinaryOp::Concat | wick_ast::BinaryOp::Pow)
                {
                    Precedence(prec.0 - 1)
                } else {
                    Precedence(prec.0 + 1)
                };
                self.emit_expr_parens(*right, right_prec);
            }
        }
    }

    pub(crate) fn emit_expr_parens(&mut self, id: ExprId, min: Precedence) {
        if expr_precedence(&self.arena.expr(id).kind) < min {
            self.out.push('(');
            self.emit_expr(id);
            self.out.push(')');
        } else {
            self.emit_expr(id);
        }
    }

    fn emit_number(&mut self, value: f64) {
        if value.is_infinite() {
            self.out.push_str(if value.is_sign_positive() {
                "math.huge"
            } else {
                "-math.huge"
            });
        } else if value.is_nan() {
            self.out.push_str("(0/0)");
        } else if value.fract() == 0.0 && value.abs() < 1e15 {
            let _ = write!(self.out, "{}", value as i64);
        } else {
            let _ = write!(self.out, "{}", value);
        }
    }

    fn emit_string(&mut self, bytes: &[u8]) {
        let value = String::from_utf8_lossy(bytes);
        match quote_kind(&value) {
            QuoteKind::Single => {
                self.out.push('\'');
                self.out.push_str(&value);
                self.out.push('\'');
            }
            QuoteKind::Double => {
                self.out.push('"');
                self.out.push_str(&value);
                self.out.push('"');
            }
            QuoteKind::Long => {
                self.out.push_str("[[");
                self.out.push_str(&value);
                self.out.push_str("]]");
            }
        }
    }

    fn emit_table(&mut self, pairs: &[(Option<ExprId>, ExprId)]) {
        self.out.push('{');

        if !pairs.is_empty() {
            self.indent += 1;

            let last = pairs.len() - 1;
            for (i, (key, value)) in pairs.iter().enumerate() {
                if i % 15 == 0 {
                    self.out.push('\n');
                    self.write_indent();
                }

                if let Some(key) = key {
                    let mut bracketed = true;
                    if let ExprKind::String(bytes) = &self.arena.expr(*key).kind {
                        let name = String::from_utf8_lossy(bytes);
                        if is_valid_name(&name) {
                            self.out.push_str(&name);
                            self.out.push_str(" = ");
                            bracketed = false;
                        }
                    }
                    if bracketed {
                        self.out.push('[');
                        self.emit_expr(*key);
                        self.out.push_str("] = ");
                    }
                }
                self.emit_expr(*value);

                if i != last {
                    self.out.push_str(", ");
                } else {
                    self.out.push('\n');
                }
            }

            self.indent -= 1;
            self.write_indent();
        }

        self.out.push('}');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wick_ast::{Arena, BinaryOp, Location, StmtKind};

    fn render(arena: &Arena, id: ExprId) -> String {
        let mut writer = SourceWriter::new(arena);
        writer.emit_expr(id);
        writer.out
    }

    #[test]
    fn test_string_quoting() {
        let mut arena = Arena::new();
        let loc = Location::default();

        let plain = arena.alloc_expr(loc, ExprKind::String(b"hi".to_vec()));
        assert_eq!(render(&arena, plain), "\"hi\"");

        let with_double = arena.alloc_expr(loc, ExprKind::String(b"say \"hi\"".to_vec()));
        assert_eq!(render(&arena, with_double), "'say \"hi\"'");

        let with_newline = arena.alloc_expr(loc, ExprKind::String(b"a\nb".to_vec()));
        assert_eq!(render(&arena, with_newline), "[[a\nb]]");

        let with_both = arena.alloc_expr(loc, ExprKind::String(b"\"'".to_vec()));
        assert_eq!(render(&arena, with_both), "[[\"']]");
    }

    #[test]
    fn test_identifier_index_sugar() {
        let mut arena = Arena::new();
        let loc = Location::default();

        let table = arena.alloc_expr(loc, ExprKind::Global("t".into()));
        let key = arena.alloc_expr(loc, ExprKind::String(b"foo".to_vec()));
        let access = arena.alloc_expr(
            loc,
            ExprKind::IndexExpr {
                expr: table,
                index: key,
            },
        );
        assert_eq!(render(&arena, access), "t.foo");

        let table = arena.alloc_expr(loc, ExprKind::Global("t".into()));
        let key = arena.alloc_expr(loc, ExprKind::String(b"1x".to_vec()));
        let access = arena.alloc_expr(
            loc,
            ExprKind::IndexExpr {
                expr: table,
                index: key,
            },
        );
        assert_eq!(render(&arena, access), "t[\"1x\"]");
    }

    #[test]
    fn test_precedence_parens() {
        let mut arena = Arena::new();
        let loc = Location::default();

        let a = arena.alloc_expr(loc, ExprKind::Global("a".into()));
        let b = arena.alloc_expr(loc, ExprKind::Global("b".into()));
        let c = arena.alloc_expr(loc, ExprKind::Global("c".into()));
        let sum = arena.alloc_expr(
            loc,
            ExprKind::Binary {
                op: BinaryOp::Add,
                left: a,
                right: b,
            },
        );
        let product = arena.alloc_expr(
            loc,
            ExprKind::Binary {
                op: BinaryOp::Mul,
                left: sum,
                right: c,
            },
        );
        assert_eq!(render(&arena, product), "(a + b) * c");
    }

    #[test]
    fn test_method_call_sugar() {
        let mut arena = Arena::new();
        let loc = Location::default();

        let recv = arena.alloc_expr(loc, ExprKind::Global("obj".into()));
        let func = arena.alloc_expr(
            loc,
            ExprKind::IndexName {
                expr: recv,
                index: "foo".into(),
            },
        );
        let call = arena.alloc_expr(
            loc,
            ExprKind::Call {
                func,
                args: Vec::new(),
                self_call: true,
            },
        );
        assert_eq!(render(&arena, call), "obj:foo()");
    }

    #[test]
    fn test_number_formatting() {
        let mut arena = Arena::new();
        let loc = Location::default();

        let whole = arena.alloc_expr(loc, ExprKind::Number(42.0));
        assert_eq!(render(&arena, whole), "42");

        let fractional = arena.alloc_expr(loc, ExprKind::Number(1.5));
        assert_eq!(render(&arena, fractional), "1.5");

        let negative = arena.alloc_expr(loc, ExprKind::Number(-3.0));
        assert_eq!(render(&arena, negative), "-3");
    }

    #[test]
    fn test_anonymous_function() {
        let mut arena = Arena::new();
        let loc = Location::default();

        let arg = arena.alloc_local(wick_ast::LocalInfo::new("a0", 2));
        let body = arena.alloc_stmt(loc, StmtKind::Block(Vec::new()));
        let func = arena.alloc_expr(
            loc,
            ExprKind::Function {
                args: vec![arg],
                vararg: true,
                body,
            },
        );
        assert_eq!(render(&arena, func), "function(a0, ...)\nend");
    }
}
