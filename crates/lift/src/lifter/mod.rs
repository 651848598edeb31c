mod opcodes;

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use wick_ast::{
    Arena, ExprId, ExprKind, LocalId, LocalInfo, Location, NameGen, Position, StmtId, StmtKind,
    UnaryOp,
};
use wick_bytecode::{Module, Proto};

use crate::LiftError;

/// Which test opcode opened a fringe entry. `Test` skips the body when the
/// register is truthy, so its condition prints negated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TestKind {
    Test,
    NotTest,
}

/// An open conditional awaiting closure at its computed end instruction.
#[derive(Debug)]
pub(crate) struct ControlFlow {
    pub code_start: usize,
    pub body_start: usize,
    pub code_end: usize,
    pub local: LocalId,
    pub kind: TestKind,
    pub location: Location,
}

/// Per-prototype lifting state. A fresh context is built for every
/// prototype; the recursion through `Closure` never shares register files.
pub(crate) struct ProtoContext {
    pub upvalues: Vec<LocalId>,
    pub args: Vec<LocalId>,
    /// The growing statement list of the current block.
    pub body: Vec<StmtId>,
    /// Register file: which local currently occupies each register.
    pub local_stack: FxHashMap<u8, LocalId>,
    /// Body size at the moment each instruction index began processing.
    pub instr_body_map: Vec<usize>,
    /// Pending multi-value expression: `(base register, expression)`.
    pub tail: Option<(u8, ExprId)>,
    /// Method receiver staged by `SelfCall` for the following `Call`.
    pub self_expr: Option<ExprId>,
    /// Open conditionals, oldest first.
    pub fringe: VecDeque<ControlFlow>,
}

impl ProtoContext {
    fn new(upvalues: Vec<LocalId>, code_len: usize) -> Self {
        Self {
            upvalues,
            args: Vec::new(),
            body: Vec::new(),
            local_stack: FxHashMap::default(),
            instr_body_map: vec![0; code_len],
            tail: None,
            self_expr: None,
            fringe: VecDeque::new(),
        }
    }
}

/// A lifted prototype: its block plus the argument locals created for it.
pub(crate) struct LiftedProto {
    pub body: StmtId,
    pub args: Vec<LocalId>,
}

pub(crate) struct Lifter<'a> {
    module: &'a Module,
    pub(crate) arena: &'a mut Arena,
    pub(crate) names: NameGen,
    /// Prototype indices of the functions currently being lifted; the depth
    /// recorded on created locals is this stack's length.
    function_stack: Vec<usize>,
    flagged: bool,
}

impl<'a> Lifter<'a> {
    pub(crate) fn new(module: &'a Module, arena: &'a mut Arena) -> Self {
        Self {
            module,
            arena,
            names: NameGen::new(),
            function_stack: Vec::new(),
            flagged: false,
        }
    }

    pub(crate) fn flagged(&self) -> bool {
        self.flagged
    }

    pub(crate) fn set_flagged(&mut self) {
        if !self.flagged {
            tracing::debug!("module flagged as potentially incompatible");
        }
        self.flagged = true;
    }

    pub(crate) fn lift_proto(
        &mut self,
        proto_index: usize,
        upvalues: Vec<LocalId>,
    ) -> Result<LiftedProto, LiftError> {
        let module: &'a Module = self.module;
        let proto = &module.protos[proto_index];
        let is_main = proto_index == module.main;

        self.function_stack.push(proto_index);
        let depth = self.function_stack.len();

        let mut ctx = ProtoContext::new(upvalues, proto.code.len());
        for i in 0..proto.arg_count {
            let local = self
                .arena
                .alloc_local(LocalInfo::new(format!("a{}", i), depth));
            ctx.local_stack.insert(i, local);
            ctx.args.push(local);
        }

        let mut pc = 0usize;
        while pc < proto.code.len() {
            let body_size = ctx.body.len();
            ctx.instr_body_map[pc] = body_size;

            let insn = proto.code[pc];
            let extra = self.dispatch(&mut ctx, proto, pc, insn, is_main)?;
            for slot in ctx.instr_body_map[pc + 1..].iter_mut().take(extra) {
                *slot = body_size;
            }

            // The closure check runs against the last word this instruction
            // consumed, matching the position of the original's loop index
            // after auxiliary words were skipped.
            let last = pc + extra;
            self.close_conditional(&mut ctx, last);
            pc = last + 1;
        }

        let start = proto.line_info.first().copied().unwrap_or(0);
        let end = proto.line_info.last().copied().unwrap_or(0);
        let location = Location::new(Position::new(start, 0), Position::new(end, 0));

        wick_exprs::optimize(&mut ctx.body, self.arena, &mut self.names);
        let root = self.arena.alloc_stmt(location, StmtKind::Block(ctx.body));

        self.function_stack.pop();
        Ok(LiftedProto {
            body: root,
            args: ctx.args,
        })
    }

    /// Close the fringe head as an `if` when its end index is reached.
    fn close_conditional(&mut self, ctx: &mut ProtoContext, pc_last: usize) {
        let closes = ctx
            .fringe
            .front()
            .is_some_and(|head| head.code_end == pc_last);
        if !closes {
            return;
        }
        let Some(info) = ctx.fringe.pop_front() else {
            return;
        };

        let mut inner = ctx.body.split_off(info.body_start.min(ctx.body.len()));
        wick_exprs::optimize(&mut inner, self.arena, &mut self.names);
        let block = self.arena.alloc_stmt(info.location, StmtKind::Block(inner));

        // `Test` skips the body when the register is truthy, so the body
        // runs under the negation.
        let mut condition = self.arena.alloc_expr(
            info.location,
            ExprKind::Local {
                local: info.local,
                upvalue: false,
            },
        );
        if info.kind == TestKind::Test {
            condition = self.arena.alloc_expr(
                info.location,
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    expr: condition,
                },
            );
        }

        let stmt = self.arena.alloc_stmt(
            info.location,
            StmtKind::If {
                condition,
                then_body: block,
                else_body: None,
            },
        );
        ctx.body.push(stmt);
    }

    // ---- Helpers ----

    pub(crate) fn module(&self) -> &'a Module {
        self.module
    }

    pub(crate) fn line_location(&self, proto: &Proto, pc: usize) -> Location {
        let line = proto.line_info.get(pc).copied().unwrap_or(0);
        Location::at_line(line)
    }

    fn create_local(&mut self) -> LocalId {
        let name = self.names.fresh();
        let depth = self.function_stack.len();
        self.arena.alloc_local(LocalInfo::new(name, depth))
    }

    /// Look up the local occupying `reg`, creating a fresh one on first
    /// write. The boolean reports creation: a created result turns the
    /// emission into a declaration, and a created result where a value was
    /// expected is a flag condition at the call sites.
    pub(crate) fn find_or_create_local(
        &mut self,
        ctx: &mut ProtoContext,
        reg: u8,
    ) -> (LocalId, bool) {
        if let Some(&local) = ctx.local_stack.get(&reg) {
            return (local, false);
        }
        let local = self.create_local();
        ctx.local_stack.insert(reg, local);
        (local, true)
    }

    /// Read a register that must already hold a value.
    pub(crate) fn read_local(&self, ctx: &ProtoContext, reg: u8) -> Result<LocalId, LiftError> {
        ctx.local_stack
            .get(&reg)
            .copied()
            .ok_or(LiftError::UnmappedRegister(reg))
    }

    pub(crate) fn local_expr(
        &mut self,
        location: Location,
        local: LocalId,
        upvalue: bool,
    ) -> ExprId {
        self.arena
            .alloc_expr(location, ExprKind::Local { local, upvalue })
    }

    /// Local reference with the upvalue flag derived from function depth.
    pub(crate) fn local_expr_auto(&mut self, location: Location, local: LocalId) -> ExprId {
        let upvalue = self.arena.local(local).function_depth != self.function_stack.len();
        self.local_expr(location, local, upvalue)
    }

    /// `local x = value` when the target was just created, `x = value`
    /// otherwise.
    pub(crate) fn assign_or_declare(
        &mut self,
        location: Location,
        local: LocalId,
        created: bool,
        value: ExprId,
    ) -> StmtId {
        if created {
            self.arena.alloc_stmt(
                location,
                StmtKind::Local {
                    vars: vec![local],
                    values: vec![value],
                },
            )
        } else {
            let target = self.local_expr(location, local, false);
            self.arena.alloc_stmt(
                location,
                StmtKind::Assign {
                    targets: vec![target],
                    values: vec![value],
                },
            )
        }
    }

    pub(crate) fn constant(&self, proto: &Proto, index: usize) -> Result<ExprId, LiftError> {
        proto
            .constants
            .get(index)
            .copied()
            .ok_or(LiftError::BadConstant(index))?
            .ok_or(LiftError::MissingConstant(index))
    }

    /// Constant that must be a string naming a global or method.
    pub(crate) fn constant_name(&self, proto: &Proto, index: usize) -> Result<String, LiftError> {
        let id = self.constant(proto, index)?;
        match &self.arena.expr(id).kind {
            ExprKind::String(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
            _ => Err(LiftError::BadNameConstant(index)),
        }
    }
}
