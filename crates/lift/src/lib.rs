mod lifter;

use thiserror::Error;

use wick_ast::{Arena, StmtId};
use wick_bytecode::Module;

use lifter::Lifter;

/// Internal inconsistencies that abort a lift. Unsupported opcodes are not
/// errors — they degrade the output and report on the diagnostic channel.
#[derive(Debug, Error)]
pub enum LiftError {
    #[error("read from register {0} which holds no value")]
    UnmappedRegister(u8),
    #[error("multi-value consumer found no pending tail expression")]
    MissingTail,
    #[error("upvalue slot {0} out of range")]
    BadUpvalue(u8),
    #[error("constant index {0} out of range")]
    BadConstant(usize),
    #[error("constant {0} has no expression form")]
    MissingConstant(usize),
    #[error("constant {0} does not name anything")]
    BadNameConstant(usize),
    #[error("child prototype slot {0} out of range")]
    BadChild(usize),
    #[error("closure capture list runs past the end of the code")]
    TruncatedCapture,
    #[error("loop jump target {0} out of range")]
    BadLoopTarget(i64),
    #[error("vararg targets mix fresh and occupied registers")]
    MixedVarargTargets,
    #[error("vararg spill into occupied registers")]
    BadVarargTargets,
}

/// Result of lifting a module: the main prototype's block and whether any
/// flag condition fired along the way.
#[derive(Debug)]
pub struct LiftOutput {
    pub root: StmtId,
    pub flagged: bool,
}

/// Lift the main prototype (and, through `Closure` opcodes, every reachable
/// child) into an AST rooted at a block statement.
pub fn lift(module: &Module, arena: &mut Arena) -> Result<LiftOutput, LiftError> {
    let mut lifter = Lifter::new(module, arena);
    let main = lifter.lift_proto(module.main, Vec::new())?;
    Ok(LiftOutput {
        root: main.body,
        flagged: lifter.flagged(),
    })
}
