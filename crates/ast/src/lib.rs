pub mod arena;
pub mod expr;
pub mod local;
pub mod location;
pub mod stmt;
pub mod types;

pub use arena::{Arena, ExprId, LocalId, StmtId};
pub use expr::{ExprKind, ExprNode};
pub use local::{LocalInfo, NameGen};
pub use location::{Location, Position};
pub use stmt::{StmtKind, StmtNode};
pub use types::{BinaryOp, UnaryOp};
