use crate::expr::{ExprKind, ExprNode};
use crate::local::LocalInfo;
use crate::location::Location;
use crate::stmt::{StmtKind, StmtNode};

/// Opaque expression identifier. Index into the arena's expression region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(pub u32);

/// Opaque statement identifier. Index into the arena's statement region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StmtId(pub u32);

/// Opaque local-descriptor identifier. Two references carrying the same
/// `LocalId` denote the same variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalId(pub u32);

/// Flat arena owning every AST node of one decompilation.
///
/// Nodes reference each other by id, not by nesting, so replacing a node is
/// an O(1) slot overwrite — this is how the inliner substitutes a local
/// reference with its defining expression. The whole tree is released at once
/// when the arena is dropped; nothing is freed individually.
#[derive(Debug, Default)]
pub struct Arena {
    exprs: Vec<ExprNode>,
    stmts: Vec<StmtNode>,
    locals: Vec<LocalInfo>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_expr(&mut self, location: Location, kind: ExprKind) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(ExprNode { location, kind });
        id
    }

    pub fn expr(&self, id: ExprId) -> &ExprNode {
        &self.exprs[id.0 as usize]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut ExprNode {
        &mut self.exprs[id.0 as usize]
    }

    /// Overwrite the slot `target` with a copy of the node at `source`.
    /// Children of `source` become shared; the tree shape keeps each parent
    /// pointing at distinct slots, so the share is only ever read.
    pub fn copy_expr_into(&mut self, target: ExprId, source: ExprId) {
        let node = self.exprs[source.0 as usize].clone();
        self.exprs[target.0 as usize] = node;
    }

    pub fn alloc_stmt(&mut self, location: Location, kind: StmtKind) -> StmtId {
        let id = StmtId(self.stmts.len() as u32);
        self.stmts.push(StmtNode { location, kind });
        id
    }

    pub fn stmt(&self, id: StmtId) -> &StmtNode {
        &self.stmts[id.0 as usize]
    }

    pub fn stmt_mut(&mut self, id: StmtId) -> &mut StmtNode {
        &mut self.stmts[id.0 as usize]
    }

    pub fn alloc_local(&mut self, info: LocalInfo) -> LocalId {
        let id = LocalId(self.locals.len() as u32);
        self.locals.push(info);
        id
    }

    pub fn local(&self, id: LocalId) -> &LocalInfo {
        &self.locals[id.0 as usize]
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    pub fn stmt_count(&self) -> usize {
        self.stmts.len()
    }

    pub fn local_count(&self) -> usize {
        self.locals.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expr_slot_replacement() {
        let mut arena = Arena::new();
        let loc = Location::default();
        let slot = arena.alloc_expr(loc, ExprKind::Nil);
        let value = arena.alloc_expr(loc, ExprKind::Number(4.0));

        arena.copy_expr_into(slot, value);
        assert!(matches!(arena.expr(slot).kind, ExprKind::Number(n) if n == 4.0));
        // The source slot is untouched.
        assert!(matches!(arena.expr(value).kind, ExprKind::Number(_)));
    }

    #[test]
    fn test_local_identity() {
        let mut arena = Arena::new();
        let a = arena.alloc_local(LocalInfo::new("var0", 1));
        let b = arena.alloc_local(LocalInfo::new("var0", 1));
        assert_ne!(a, b);
        assert_eq!(arena.local(a).name, arena.local(b).name);
    }
}
