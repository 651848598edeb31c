use wick_ast::{ExprId, ExprKind, StmtId, StmtKind};

use crate::SourceWriter;

impl<'a> SourceWriter<'a> {
    pub(crate) fn emit_stmt(&mut self, id: StmtId) {
        let node = self.arena.stmt(id);
        match &node.kind {
            StmtKind::Block(stmts) => {
                let nested = self.root_emitted;
                self.root_emitted = true;

                if nested {
                    self.write_indent();
                    self.out.push_str("do");
                }

                if !stmts.is_empty() {
                    if nested {
                        self.out.push('\n');
                        self.indent += 1;
                    }
                    for &stmt in stmts {
                        self.emit_stmt(stmt);
                    }
                    if nested {
                        self.indent -= 1;
                        self.write_indent();
                    }
                } else {
                    self.out.push(' ');
                }

                if nested {
                    self.out.push_str("end\n");
                }
            }

            StmtKind::If {
                condition,
                then_body,
                else_body,
            } => {
                self.write_indent();
                self.out.push_str("if ");
                self.emit_if(*condition, *then_body, *else_body);
                self.write_indent();
                self.out.push_str("end\n");
            }

            StmtKind::While { condition, body } => {
                self.write_indent();
                self.out.push_str("while ");
                self.emit_expr(*condition);
                self.out.push_str(" do\n");

                self.indent += 1;
                self.emit_body(*body);
                self.indent -= 1;

                self.write_indent();
                self.out.push_str("end\n");
            }

            StmtKind::Repeat { body, condition } => {
                self.write_indent();
                self.out.push_str("repeat\n");

                self.indent += 1;
                self.emit_body(*body);
                self.indent -= 1;

                self.write_indent();
                self.out.push_str("until ");
                self.emit_expr(*condition);
                self.out.push('\n');
            }

            StmtKind::Break => {
                self.write_indent();
                self.out.push_str("break\n");
            }

            StmtKind::Return(values) => {
                self.write_indent();
                self.out.push_str("return");
                for (i, &value) in values.iter().enumerate() {
                    self.out.push_str(if i == 0 { " " } else { ", " });
                    self.emit_expr(value);
                }
                self.out.push('\n');
            }

            StmtKind::Expr(expr) => {
                self.write_indent();
                self.emit_expr(*expr);
                self.out.push('\n');
            }

            StmtKind::Local { vars, values } => {
                self.write_indent();
                self.out.push_str("local ");
                for (i, &var) in vars.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    let name = self.arena.local(var).name.as_str();
                    self.out.push_str(name);
                }

                if !values.is_empty() {
                    // `local x = nil` collapses to a bare declaration.
                    let lone_nil = values.len() == 1
                        && matches!(self.arena.expr(values[0]).kind, ExprKind::Nil);
                    if !lone_nil {
                        self.out.push_str(" = ");
                        for (i, &value) in values.iter().enumerate() {
                            if i > 0 {
                                self.out.push_str(", ");
                            }
                            self.emit_expr(value);
                        }
                    }
                }

                self.out.push('\n');
            }

            StmtKind::LocalFunction { local, func } => {
                self.write_indent();
                self.out.push_str("local function ");
                let name = self.arena.local(*local).name.as_str();
                self.out.push_str(name);
                self.emit_function_tail(*func);
            }

            StmtKind::Assign { targets, values } => {
                self.write_indent();
                for (i, &target) in targets.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.emit_expr(target);
                }
                self.out.push_str(" = ");
                for (i, &value) in values.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.emit_expr(value);
                }
                self.out.push('\n');
            }

            StmtKind::For {
                var,
                from,
                to,
                step,
                body,
            } => {
                self.write_indent();
                self.out.push_str("for ");
                let name = self.arena.local(*var).name.as_str();
                self.out.push_str(name);
                self.out.push_str(" = ");
                self.emit_expr(*from);
                self.out.push_str(", ");
                self.emit_expr(*to);
                if let Some(step) = step {
                    self.out.push_str(", ");
                    self.emit_expr(*step);
                }
                self.out.push_str(" do\n");

                self.indent += 1;
                self.emit_body(*body);
                self.indent -= 1;

                self.write_indent();
                self.out.push_str("end\n");
            }

            StmtKind::ForIn { vars, values, body } => {
                self.write_indent();
                self.out.push_str("for ");
                for (i, &var) in vars.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    let name = self.arena.local(var).name.as_str();
                    self.out.push_str(name);
                }
                self.out.push_str(" in ");
                for (i, &value) in values.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.emit_expr(value);
                }
                self.out.push_str(" do\n");

                self.indent += 1;
                self.emit_body(*body);
                self.indent -= 1;

                self.write_indent();
                self.out.push_str("end\n");
            }

            StmtKind::Function { name, func } => {
                self.write_indent();
                self.out.push_str("function ");
                self.emit_expr(*name);
                self.emit_function_tail(*func);
            }
        }
    }

    /// Condition and bodies of an `if`, shared with the `elseif` chain.
    /// The caller has written `if ` or `elseif ` and writes the final `end`.
    fn emit_if(&mut self, condition: ExprId, then_body: StmtId, else_body: Option<StmtId>) {
        self.emit_expr(condition);
        self.out.push_str(" then\n");

        self.indent += 1;
        self.emit_body(then_body);
        self.indent -= 1;

        if let Some(else_body) = else_body {
            self.write_indent();
            if let StmtKind::If {
                condition,
                then_body,
                else_body,
            } = self.arena.stmt(else_body).kind.clone()
            {
                self.out.push_str("elseif ");
                self.emit_if(condition, then_body, else_body);
                return;
            }
            self.out.push_str("else\n");
            self.indent += 1;
            self.emit_body(else_body);
            self.indent -= 1;
        }
    }

    /// Parameter list and body of a function statement, from its
    /// function-valued expression.
    fn emit_function_tail(&mut self, func: ExprId) {
        let ExprKind::Function { args, vararg, body } = self.arena.expr(func).kind.clone() else {
            // Not a function literal; print it as a plain assignment tail.
            self.out.push_str(" = ");
            self.emit_expr(func);
            self.out.push('\n');
            return;
        };

        self.out.push('(');
        for (i, &arg) in args.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            let name = self.arena.local(arg).name.as_str();
            self.out.push_str(name);
        }
        if vararg {
            if !args.is_empty() {
                self.out.push_str(", ");
            }
            self.out.push_str("...");
        }
        self.out.push_str(")\n");

        self.indent += 1;
        self.emit_body(body);
        self.indent -= 1;

        self.write_indent();
        self.out.push_str("end\n");
    }

    /// Emit the statements of a body block without a `do ... end` wrapper.
    pub(crate) fn emit_body(&mut self, body: StmtId) {
        match &self.arena.stmt(body).kind {
            StmtKind::Block(stmts) => {
                for &stmt in stmts {
                    self.emit_stmt(stmt);
                }
            }
            _ => self.emit_stmt(body),
        }
    }
}
