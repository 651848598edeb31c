use tracing::warn;

use wick_ast::{BinaryOp, ExprKind, StmtKind, UnaryOp};
use wick_bytecode::{Instruction, OpCode, Proto};

use super::{ControlFlow, Lifter, ProtoContext, TestKind};
use crate::LiftError;

impl<'a> Lifter<'a> {
    /// Process one instruction. Returns how many extra code words the
    /// instruction consumed (its auxiliary word, or the capture
    /// pseudo-instructions of a `Closure`).
    pub(crate) fn dispatch(
        &mut self,
        ctx: &mut ProtoContext,
        proto: &'a Proto,
        pc: usize,
        insn: Instruction,
        is_main: bool,
    ) -> Result<usize, LiftError> {
        let aux_words = insn.op.has_aux() as usize;
        let location = self.line_location(proto, pc);

        match insn.op {
            OpCode::Nop => {
                self.set_flagged();
            }

            OpCode::SaveCode => {
                warn!("save code instruction in stream");
            }

            OpCode::LoadNil => {
                let (local, created) = self.find_or_create_local(ctx, insn.a);
                let value = self.arena.alloc_expr(location, ExprKind::Nil);
                let stmt = self.assign_or_declare(location, local, created, value);
                ctx.body.push(stmt);
            }

            OpCode::LoadBool => {
                let (local, created) = self.find_or_create_local(ctx, insn.a);
                let value = self
                    .arena
                    .alloc_expr(location, ExprKind::Bool(insn.b != 0));
                let stmt = self.assign_or_declare(location, local, created, value);
                ctx.body.push(stmt);
            }

            OpCode::LoadShort => {
                let (local, created) = self.find_or_create_local(ctx, insn.a);
                let value = self
                    .arena
                    .alloc_expr(location, ExprKind::Number(insn.s_b_x() as f64));
                let stmt = self.assign_or_declare(location, local, created, value);
                ctx.body.push(stmt);
            }

            // GetGlobalConst carries a hash-verifier word which is discarded.
            OpCode::LoadConst | OpCode::GetGlobalConst => {
                let (local, created) = self.find_or_create_local(ctx, insn.a);
                let value = self.constant(proto, insn.b_x() as usize)?;
                let stmt = self.assign_or_declare(location, local, created, value);
                ctx.body.push(stmt);
            }

            OpCode::Move => {
                let (to_local, to_created) = self.find_or_create_local(ctx, insn.a);

                // With a tail pending, registers at and above its base fan
                // out the multiple values: the base carries the expression,
                // the rest are nil.
                let value = match ctx.tail {
                    Some((base, expr)) if insn.b >= base => {
                        if insn.b == base {
                            expr
                        } else {
                            self.arena.alloc_expr(location, ExprKind::Nil)
                        }
                    }
                    _ => {
                        let (from_local, from_created) = self.find_or_create_local(ctx, insn.b);
                        if from_created {
                            self.set_flagged();
                        }
                        self.local_expr(location, from_local, false)
                    }
                };

                let stmt = self.assign_or_declare(location, to_local, to_created, value);
                ctx.body.push(stmt);
            }

            OpCode::GetGlobal => {
                let (local, created) = self.find_or_create_local(ctx, insn.a);
                let name = self.constant_name(proto, insn.aux as usize)?;
                let value = self.arena.alloc_expr(location, ExprKind::Global(name));
                let stmt = self.assign_or_declare(location, local, created, value);
                ctx.body.push(stmt);
            }

            OpCode::SetGlobal => {
                let (local, _) = self.find_or_create_local(ctx, insn.a);
                let value = self.local_expr(location, local, false);
                let name = self.constant_name(proto, insn.aux as usize)?;
                let target = self.arena.alloc_expr(location, ExprKind::Global(name));
                let stmt = self.arena.alloc_stmt(
                    location,
                    StmtKind::Assign {
                        targets: vec![target],
                        values: vec![value],
                    },
                );
                ctx.body.push(stmt);
            }

            OpCode::GetUpvalue => {
                let (local, created) = self.find_or_create_local(ctx, insn.a);
                let up = ctx
                    .upvalues
                    .get(insn.b as usize)
                    .copied()
                    .ok_or(LiftError::BadUpvalue(insn.b))?;
                let value = self.local_expr(location, up, true);
                let stmt = self.assign_or_declare(location, local, created, value);
                ctx.body.push(stmt);
            }

            OpCode::SetUpvalue => {
                let (local, _) = self.find_or_create_local(ctx, insn.a);
                let up = ctx
                    .upvalues
                    .get(insn.b as usize)
                    .copied()
                    .ok_or(LiftError::BadUpvalue(insn.b))?;
                let value = self.local_expr(location, local, true);
                let stmt = self.assign_or_declare(location, up, false, value);
                ctx.body.push(stmt);
            }

            OpCode::SaveRegisters | OpCode::ClearStack | OpCode::ClearStackFull => {}

            OpCode::GetTableIndex => {
                let (res, res_created) = self.find_or_create_local(ctx, insn.a);
                let (table, table_created) = self.find_or_create_local(ctx, insn.b);
                let (index, index_created) = self.find_or_create_local(ctx, insn.c);
                if table_created || index_created {
                    self.set_flagged();
                }

                let table_expr = self.local_expr(location, table, false);
                let index_expr = self.local_expr(location, index, false);
                let value = self.arena.alloc_expr(
                    location,
                    ExprKind::IndexExpr {
                        expr: table_expr,
                        index: index_expr,
                    },
                );
                let stmt = self.assign_or_declare(location, res, res_created, value);
                ctx.body.push(stmt);
            }

            OpCode::SetTableIndex => {
                let (value_local, _) = self.find_or_create_local(ctx, insn.a);
                let (table, _) = self.find_or_create_local(ctx, insn.b);
                let (index, _) = self.find_or_create_local(ctx, insn.c);

                let value = self.local_expr(location, value_local, false);
                let table_expr = self.local_expr(location, table, false);
                let index_expr = self.local_expr(location, index, false);
                let target = self.arena.alloc_expr(
                    location,
                    ExprKind::IndexExpr {
                        expr: table_expr,
                        index: index_expr,
                    },
                );
                let stmt = self.arena.alloc_stmt(
                    location,
                    StmtKind::Assign {
                        targets: vec![target],
                        values: vec![value],
                    },
                );
                ctx.body.push(stmt);
            }

            OpCode::GetTableIndexConstant => {
                let (res, res_created) = self.find_or_create_local(ctx, insn.a);
                let (table, table_created) = self.find_or_create_local(ctx, insn.b);
                if table_created {
                    self.set_flagged();
                }

                let table_expr = self.local_expr(location, table, false);
                let index_expr = self.constant(proto, insn.aux as usize)?;
                let value = self.arena.alloc_expr(
                    location,
                    ExprKind::IndexExpr {
                        expr: table_expr,
                        index: index_expr,
                    },
                );
                let stmt = self.assign_or_declare(location, res, res_created, value);
                ctx.body.push(stmt);
            }

            OpCode::SetTableIndexConstant => {
                let (value_local, _) = self.find_or_create_local(ctx, insn.a);
                let (table, _) = self.find_or_create_local(ctx, insn.b);

                let value = self.local_expr(location, value_local, false);
                let table_expr = self.local_expr(location, table, false);
                let index_expr = self.constant(proto, insn.aux as usize)?;
                let target = self.arena.alloc_expr(
                    location,
                    ExprKind::IndexExpr {
                        expr: table_expr,
                        index: index_expr,
                    },
                );
                let stmt = self.arena.alloc_stmt(
                    location,
                    StmtKind::Assign {
                        targets: vec![target],
                        values: vec![value],
                    },
                );
                ctx.body.push(stmt);
            }

            OpCode::GetTableIndexByte => {
                let (res, res_created) = self.find_or_create_local(ctx, insn.a);
                let (table, table_created) = self.find_or_create_local(ctx, insn.b);
                if table_created {
                    self.set_flagged();
                }

                let table_expr = self.local_expr(location, table, false);
                let index_expr = self
                    .arena
                    .alloc_expr(location, ExprKind::Number((insn.c as f64) + 1.0));
                let value = self.arena.alloc_expr(
                    location,
                    ExprKind::IndexExpr {
                        expr: table_expr,
                        index: index_expr,
                    },
                );
                let stmt = self.assign_or_declare(location, res, res_created, value);
                ctx.body.push(stmt);
            }

            OpCode::SetTableIndexByte => {
                let (value_local, _) = self.find_or_create_local(ctx, insn.a);
                let (table, _) = self.find_or_create_local(ctx, insn.b);

                let value = self.local_expr(location, value_local, false);
                let table_expr = self.local_expr(location, table, false);
                let index_expr = self
                    .arena
                    .alloc_expr(location, ExprKind::Number((insn.c as f64) + 1.0));
                let target = self.arena.alloc_expr(
                    location,
                    ExprKind::IndexExpr {
                        expr: table_expr,
                        index: index_expr,
                    },
                );
                let stmt = self.arena.alloc_stmt(
                    location,
                    StmtKind::Assign {
                        targets: vec![target],
                        values: vec![value],
                    },
                );
                ctx.body.push(stmt);
            }

            OpCode::Closure => {
                return self.lift_closure(ctx, proto, pc, insn, location);
            }

            OpCode::SelfCall => {
                let (_res, _res_created) = self.find_or_create_local(ctx, insn.a);
                let (table, _table_created) = self.find_or_create_local(ctx, insn.b);

                let table_expr = self.local_expr(location, table, false);
                let index = self.constant_name(proto, insn.aux as usize)?;
                let expr = self.arena.alloc_expr(
                    location,
                    ExprKind::IndexName {
                        expr: table_expr,
                        index,
                    },
                );
                ctx.self_expr = Some(expr);
            }

            OpCode::Call => {
                self.lift_call(ctx, insn, location)?;
            }

            OpCode::Return => {
                // A bare return at the end of a function (or anywhere in the
                // main chunk) is implicit in source form.
                if insn.b == 1 && (is_main || pc == proto.code.len() - 1) {
                    return Ok(aux_words);
                }

                let mut values = Vec::new();
                if insn.b == 0 {
                    let (tail_base, tail_expr) =
                        ctx.tail.take().ok_or(LiftError::MissingTail)?;
                    for reg in insn.a..tail_base {
                        let local = self.read_local(ctx, reg)?;
                        values.push(self.local_expr_auto(location, local));
                        ctx.local_stack.remove(&reg);
                    }
                    values.push(tail_expr);
                } else {
                    for j in 0..insn.b - 1 {
                        let reg = insn.a.wrapping_add(j);
                        let local = self.read_local(ctx, reg)?;
                        values.push(self.local_expr_auto(location, local));
                        ctx.local_stack.remove(&reg);
                    }
                }

                let stmt = self.arena.alloc_stmt(location, StmtKind::Return(values));
                ctx.body.push(stmt);
            }

            OpCode::Jump => {
                warn!("unsupported opcode jump");
            }

            OpCode::LoopJump => {
                self.lift_loop_jump(ctx, pc, insn, location)?;
            }

            OpCode::Test | OpCode::NotTest => {
                let (local, created) = self.find_or_create_local(ctx, insn.a);
                if created {
                    self.set_flagged();
                }
                if insn.s_b_x() <= 0 {
                    self.set_flagged();
                    warn!("test does not skip forward");
                }

                let code_end = (pc as i64 + insn.s_b_x() as i64).max(0) as usize;
                let kind = if insn.op == OpCode::Test {
                    TestKind::Test
                } else {
                    TestKind::NotTest
                };
                ctx.fringe.push_back(ControlFlow {
                    code_start: pc,
                    body_start: ctx.body.len(),
                    code_end,
                    local,
                    kind,
                    location,
                });
            }

            // Comparison pairs are not reconstructed; their conditional
            // jump target word is skipped with them.
            OpCode::Equal
            | OpCode::LesserOrEqual
            | OpCode::LesserThan
            | OpCode::NotEqual
            | OpCode::GreaterThan
            | OpCode::GreaterOrEqual => {
                warn!(op = ?insn.op, "comparison opcode not reconstructed");
            }

            OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Mod
            | OpCode::Pow => {
                let (left, left_created) = self.find_or_create_local(ctx, insn.b);
                if left_created {
                    self.set_flagged();
                }
                let (right, right_created) = self.find_or_create_local(ctx, insn.c);
                if right_created {
                    self.set_flagged();
                }
                let (res, res_created) = self.find_or_create_local(ctx, insn.a);

                let left_expr = self.local_expr(location, left, false);
                let right_expr = self.local_expr(location, right, false);
                let op = BinaryOp::from_arith_offset(insn.op as u8 - OpCode::Add as u8)
                    .expect("arithmetic opcode block matches operator order");
                let value = self.arena.alloc_expr(
                    location,
                    ExprKind::Binary {
                        op,
                        left: left_expr,
                        right: right_expr,
                    },
                );
                let stmt = self.assign_or_declare(location, res, res_created, value);
                ctx.body.push(stmt);
            }

            OpCode::AddByte
            | OpCode::SubByte
            | OpCode::MulByte
            | OpCode::DivByte
            | OpCode::ModByte
            | OpCode::PowByte => {
                let (left, left_created) = self.find_or_create_local(ctx, insn.b);
                if left_created {
                    self.set_flagged();
                }
                let (res, res_created) = self.find_or_create_local(ctx, insn.a);

                let left_expr = self.local_expr(location, left, false);
                let right_expr = self.constant(proto, insn.c as usize)?;
                let op = BinaryOp::from_arith_offset(insn.op as u8 - OpCode::AddByte as u8)
                    .expect("arithmetic opcode block matches operator order");
                let value = self.arena.alloc_expr(
                    location,
                    ExprKind::Binary {
                        op,
                        left: left_expr,
                        right: right_expr,
                    },
                );
                let stmt = self.assign_or_declare(location, res, res_created, value);
                ctx.body.push(stmt);
            }

            OpCode::Or => warn!("unsupported opcode or"),
            OpCode::And => warn!("unsupported opcode and"),
            OpCode::OrByte => warn!("unsupported opcode orbyte"),
            OpCode::AndByte => warn!("unsupported opcode andbyte"),

            OpCode::Concat => {
                let (res, res_created) = self.find_or_create_local(ctx, insn.a);
                let (start, start_created) = self.find_or_create_local(ctx, insn.b);
                if start_created {
                    self.set_flagged();
                }

                let mut value = self.local_expr(location, start, false);
                let mut reg = insn.b as u16 + 1;
                while reg <= insn.c as u16 {
                    let (rhs, rhs_created) = self.find_or_create_local(ctx, reg as u8);
                    if rhs_created {
                        self.set_flagged();
                    }
                    let rhs_expr = self.local_expr(location, rhs, false);
                    value = self.arena.alloc_expr(
                        location,
                        ExprKind::Binary {
                            op: BinaryOp::Concat,
                            left: value,
                            right: rhs_expr,
                        },
                    );
                    reg += 1;
                }

                let stmt = self.assign_or_declare(location, res, res_created, value);
                ctx.body.push(stmt);
            }

            OpCode::Not | OpCode::UnaryMinus | OpCode::Len => {
                let (res, res_created) = self.find_or_create_local(ctx, insn.a);
                let (operand, operand_created) = self.find_or_create_local(ctx, insn.b);
                if operand_created {
                    self.set_flagged();
                }

                let operand_expr = self.local_expr(location, operand, false);
                let op = UnaryOp::from_offset(insn.op as u8 - OpCode::Not as u8)
                    .expect("unary opcode block matches operator order");
                let value = self.arena.alloc_expr(
                    location,
                    ExprKind::Unary {
                        op,
                        expr: operand_expr,
                    },
                );
                let stmt = self.assign_or_declare(location, res, res_created, value);
                ctx.body.push(stmt);
            }

            // Sizing hints (and any SetList payload) are not reconstructed;
            // every table starts out empty.
            OpCode::NewTable | OpCode::NewTableConst => {
                let (res, res_created) = self.find_or_create_local(ctx, insn.a);
                let value = self
                    .arena
                    .alloc_expr(location, ExprKind::Table { pairs: Vec::new() });
                let stmt = self.assign_or_declare(location, res, res_created, value);
                ctx.body.push(stmt);
            }

            OpCode::SetList => {}

            OpCode::ForPrep => warn!("unsupported opcode forprep"),
            OpCode::ForLoop => warn!("unsupported opcode forloop"),
            OpCode::TForLoop => warn!("unsupported opcode tforloop"),
            OpCode::LoopJumpIPairs => warn!("unsupported opcode loopjumpipairs"),
            OpCode::TForLoopIPairs => warn!("unsupported opcode tforloopipairs"),
            OpCode::LoopJumpNext => warn!("unsupported opcode loopjumpnext"),
            OpCode::TForLoopNext => warn!("unsupported opcode tforloopnext"),

            OpCode::LoadVarargs => {
                let value = self.arena.alloc_expr(location, ExprKind::Varargs);
                if insn.b == 0 {
                    debug_assert!(ctx.tail.is_none(), "tail produced while one is pending");
                    ctx.tail = Some((insn.a, value));
                    return Ok(aux_words);
                }

                let mut locals = Vec::new();
                let mut last = false;
                for j in 0..insn.b - 1 {
                    let (local, created) =
                        self.find_or_create_local(ctx, insn.a.wrapping_add(j));
                    if j != 0 && created != last {
                        return Err(LiftError::MixedVarargTargets);
                    }
                    locals.push(local);
                    last = created;
                }

                if !last {
                    return Err(LiftError::BadVarargTargets);
                }
                let stmt = self.arena.alloc_stmt(
                    location,
                    StmtKind::Local {
                        vars: locals,
                        values: vec![value],
                    },
                );
                ctx.body.push(stmt);
            }

            OpCode::LoadConstLarge => warn!("unsupported opcode loadconstlarge"),
            OpCode::FarJump => warn!("unsupported opcode farjump"),
            OpCode::BuiltinCall => warn!("unsupported opcode builtincall"),
        }

        Ok(aux_words)
    }

    /// `Closure` instantiates a child prototype and consumes one capture
    /// pseudo-instruction per upvalue: `Move b` binds a parent register,
    /// `GetUpvalue b` re-exports a parent upvalue.
    fn lift_closure(
        &mut self,
        ctx: &mut ProtoContext,
        proto: &'a Proto,
        pc: usize,
        insn: Instruction,
        location: wick_ast::Location,
    ) -> Result<usize, LiftError> {
        let module = self.module();
        let (res, res_created) = self.find_or_create_local(ctx, insn.a);

        let slot = insn.b_x() as usize;
        let child_index = *proto
            .children
            .get(slot)
            .ok_or(LiftError::BadChild(slot))?;
        let child = &module.protos[child_index];

        let mut upvalues = Vec::with_capacity(child.upval_count as usize);
        let mut use_local_function = false;
        for j in 0..child.upval_count as usize {
            let capture = proto
                .code
                .get(pc + 1 + j)
                .copied()
                .ok_or(LiftError::TruncatedCapture)?;
            match capture.op {
                OpCode::Move => {
                    let (up, up_created) = self.find_or_create_local(ctx, capture.b);
                    if up_created {
                        self.set_flagged();
                    }
                    // The closure captures the register it is being bound
                    // into: a self-recursive `local function`.
                    if up == res {
                        use_local_function = true;
                    }
                    upvalues.push(up);
                }
                OpCode::GetUpvalue => {
                    let up = ctx
                        .upvalues
                        .get(capture.b as usize)
                        .copied()
                        .ok_or(LiftError::BadUpvalue(capture.b))?;
                    upvalues.push(up);
                }
                _ => self.set_flagged(),
            }
        }

        let lifted = self.lift_proto(child_index, upvalues)?;
        let func = self.arena.alloc_expr(
            location,
            ExprKind::Function {
                args: lifted.args,
                vararg: child.is_vararg,
                body: lifted.body,
            },
        );

        let stmt = if use_local_function && res_created {
            self.arena
                .alloc_stmt(location, StmtKind::LocalFunction { local: res, func })
        } else {
            self.assign_or_declare(location, res, res_created, func)
        };
        ctx.body.push(stmt);

        Ok(child.upval_count as usize)
    }

    fn lift_call(
        &mut self,
        ctx: &mut ProtoContext,
        insn: Instruction,
        location: wick_ast::Location,
    ) -> Result<(), LiftError> {
        let base = insn.a;
        let staged_self = ctx.self_expr.take();
        let self_call = staged_self.is_some();
        let self_offset = self_call as u8;

        let func = match staged_self {
            Some(expr) => expr,
            None => {
                let local = self.read_local(ctx, base)?;
                self.local_expr_auto(location, local)
            }
        };
        ctx.local_stack.remove(&base);

        let mut args = Vec::new();
        if insn.b != 0 {
            for j in 1 + self_offset..insn.b {
                let reg = base.wrapping_add(j);
                let local = self.read_local(ctx, reg)?;
                args.push(self.local_expr_auto(location, local));
                ctx.local_stack.remove(&reg);
            }
        } else {
            let (tail_base, tail_expr) = ctx.tail.take().ok_or(LiftError::MissingTail)?;
            for reg in base.wrapping_add(1 + self_offset)..tail_base {
                let local = self.read_local(ctx, reg)?;
                args.push(self.local_expr_auto(location, local));
                ctx.local_stack.remove(&reg);
            }
            args.push(tail_expr);
        }

        let call = self.arena.alloc_expr(
            location,
            ExprKind::Call {
                func,
                args,
                self_call,
            },
        );

        if insn.c != 0 {
            let stmt = if insn.c > 1 {
                let mut locals = Vec::new();
                for j in 0..insn.c - 1 {
                    let (local, _) = self.find_or_create_local(ctx, base.wrapping_add(j));
                    locals.push(local);
                }
                self.arena.alloc_stmt(
                    location,
                    StmtKind::Local {
                        vars: locals,
                        values: vec![call],
                    },
                )
            } else {
                self.arena.alloc_stmt(location, StmtKind::Expr(call))
            };
            ctx.body.push(stmt);
        } else {
            debug_assert!(ctx.tail.is_none(), "tail produced while one is pending");
            ctx.tail = Some((base, call));
        }

        Ok(())
    }

    fn lift_loop_jump(
        &mut self,
        ctx: &mut ProtoContext,
        pc: usize,
        insn: Instruction,
        location: wick_ast::Location,
    ) -> Result<(), LiftError> {
        // Loop jumps always target an earlier instruction: the body spans
        // from the jump target up to here.
        let target = pc as i64 + insn.s_b_x() as i64;
        if insn.s_b_x() >= 0 {
            self.set_flagged();
            warn!("loop jump does not target an earlier instruction");
        }

        let mut body_start = usize::try_from(target)
            .ok()
            .and_then(|t| ctx.instr_body_map.get(t).copied())
            .ok_or(LiftError::BadLoopTarget(target))?;

        let mut condition = self.arena.alloc_expr(location, ExprKind::Bool(true));
        let closes = ctx.fringe.front().is_some_and(|head| head.code_end == pc);
        if closes {
            if let Some(info) = ctx.fringe.pop_front() {
                // A test immediately before the back-jump is the repeat..until
                // shape; it is emitted in the same unified while form.
                if info.code_start == pc.wrapping_sub(1) {
                    tracing::debug!("repeat shape emitted as while");
                }
                condition = self.arena.alloc_expr(
                    info.location,
                    ExprKind::Local {
                        local: info.local,
                        upvalue: false,
                    },
                );
                body_start = info.body_start;
            }
        }

        let mut inner = ctx.body.split_off(body_start.min(ctx.body.len()));
        wick_exprs::optimize(&mut inner, self.arena, &mut self.names);
        let block = self.arena.alloc_stmt(location, StmtKind::Block(inner));

        let stmt = self
            .arena
            .alloc_stmt(location, StmtKind::While { condition, body: block });
        ctx.body.push(stmt);
        Ok(())
    }
}
