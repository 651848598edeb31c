use rustc_hash::FxHashSet;

use wick_ast::{Arena, ExprId, ExprKind, LocalId, LocalInfo, NameGen, StmtId, StmtKind};

use crate::census;
use crate::inline;

/// Collapse register pressure in one statement list.
///
/// Runs at every block boundary: splits reassigned locals into fresh
/// bindings, then inlines single-reference declarations into their use
/// sites. Both passes work off a local-use census and leave statements the
/// lifter could not improve untouched.
pub fn optimize(body: &mut Vec<StmtId>, arena: &mut Arena, names: &mut NameGen) {
    split_locals(body, arena, names);
    inline_single_refs(body, arena);
}

/// Detect locals whose reassignment starts a new value identity and rebind
/// the reassignment as a fresh declaration.
///
/// For each single-variable declaration in the list, its references are
/// walked in order tracking whether the previous reference was a declaration
/// or an assignment to the local; a further assignment to the local seen in
/// that state is split. References above the split keep the original local;
/// every later statement is rewritten to the fresh one.
fn split_locals(body: &[StmtId], arena: &mut Arena, names: &mut NameGen) {
    let census = census::collect(body, arena);

    let mut to_split: FxHashSet<StmtId> = FxHashSet::default();
    for &stmt in body.iter() {
        let StmtKind::Local { vars, .. } = &arena.stmt(stmt).kind else {
            continue;
        };
        if vars.len() != 1 {
            continue;
        }
        let local = vars[0];
        let Some(refs) = census.refs(local) else {
            continue;
        };
        if refs.len() <= 1 {
            continue;
        }

        let mut last_assign = false;
        for &reference in refs {
            let assigns_local = assignment_targets_local(reference, local, arena);
            if assigns_local && last_assign {
                to_split.insert(reference);
            }
            let is_declaration = matches!(arena.stmt(reference).kind, StmtKind::Local { .. });
            last_assign = is_declaration || assigns_local;
        }
    }

    // Rewrites applied to every statement below the split point.
    let mut renames: Vec<(LocalId, ExprId)> = Vec::new();
    for &stmt in body.iter() {
        for &(find, replacement) in &renames {
            inline::inline_into_stmt(stmt, find, replacement, arena);
        }

        if !to_split.contains(&stmt) {
            continue;
        }
        let StmtKind::Assign { targets, values } = arena.stmt(stmt).kind.clone() else {
            continue;
        };
        let Some(&target) = targets.first() else {
            continue;
        };
        let ExprKind::Local { local, .. } = arena.expr(target).kind else {
            continue;
        };

        let location = arena.stmt(stmt).location;
        let depth = arena.local(local).function_depth;
        let fresh = arena.alloc_local(LocalInfo::new(names.fresh(), depth));
        let replacement = arena.alloc_expr(
            location,
            ExprKind::Local {
                local: fresh,
                upvalue: false,
            },
        );
        renames.push((local, replacement));

        arena.stmt_mut(stmt).kind = StmtKind::Local {
            vars: vec![fresh],
            values,
        };
    }
}

/// Whether `stmt` is an assignment whose target list contains `local`.
fn assignment_targets_local(stmt: StmtId, local: LocalId, arena: &Arena) -> bool {
    let StmtKind::Assign { targets, .. } = &arena.stmt(stmt).kind else {
        return false;
    };
    targets.iter().any(|&target| {
        matches!(arena.expr(target).kind, ExprKind::Local { local: l, .. } if l == local)
    })
}

/// Inline declarations whose local has exactly one referencing statement,
/// removing the declaration once every variable it binds was inlined.
fn inline_single_refs(body: &mut Vec<StmtId>, arena: &mut Arena) {
    let census = census::collect(body, arena);

    body.retain(|&stmt| {
        let StmtKind::Local { vars, values } = &arena.stmt(stmt).kind else {
            return true;
        };

        // A multi-value producer feeding several variables cannot be pulled
        // apart.
        let Some(&last_value) = values.last() else {
            return true;
        };
        let is_multi_value = matches!(
            arena.expr(last_value).kind,
            ExprKind::Call { .. } | ExprKind::Varargs
        );
        if is_multi_value && vars.len() > 1 {
            return true;
        }

        let vars = vars.clone();
        let values = values.clone();
        let mut inlined = 0;
        'vars: for (i, &var) in vars.iter().enumerate() {
            let Some(refs) = census.refs(var) else {
                continue;
            };
            if refs.len() != 1 {
                continue;
            }
            let ref_stmt = refs[0];

            // Inlining into a store whose target is the local itself would
            // fold the declaration into its own overwrite.
            if let StmtKind::Assign { targets, .. } = &arena.stmt(ref_stmt).kind {
                for &target in targets {
                    if matches!(
                        arena.expr(target).kind,
                        ExprKind::Local { local, .. } if local == var
                    ) {
                        continue 'vars;
                    }
                }
            }

            let Some(&value) = values.get(i) else {
                continue;
            };
            inline::inline_into_stmt(ref_stmt, var, value, arena);
            inlined += 1;
        }

        inlined != vars.len()
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use wick_ast::Location;

    fn local_named(arena: &mut Arena, names: &mut NameGen) -> LocalId {
        let name = names.fresh();
        arena.alloc_local(LocalInfo::new(name, 1))
    }

    fn local_expr(arena: &mut Arena, local: LocalId) -> ExprId {
        arena.alloc_expr(
            Location::default(),
            ExprKind::Local {
                local,
                upvalue: false,
            },
        )
    }

    fn decl(arena: &mut Arena, local: LocalId, value: ExprId) -> StmtId {
        arena.alloc_stmt(
            Location::default(),
            StmtKind::Local {
                vars: vec![local],
                values: vec![value],
            },
        )
    }

    #[test]
    fn test_single_use_declaration_is_inlined() {
        let mut arena = Arena::new();
        let mut names = NameGen::new();

        let var0 = local_named(&mut arena, &mut names);
        let value = arena.alloc_expr(Location::default(), ExprKind::Number(42.0));
        let declaration = decl(&mut arena, var0, value);

        let use_expr = local_expr(&mut arena, var0);
        let ret = arena.alloc_stmt(Location::default(), StmtKind::Return(vec![use_expr]));

        let mut body = vec![declaration, ret];
        optimize(&mut body, &mut arena, &mut names);

        assert_eq!(body, vec![ret]);
        let StmtKind::Return(values) = &arena.stmt(ret).kind else {
            panic!("return survived as something else");
        };
        assert!(matches!(arena.expr(values[0]).kind, ExprKind::Number(n) if n == 42.0));
    }

    #[test]
    fn test_multi_value_declaration_is_kept() {
        let mut arena = Arena::new();
        let mut names = NameGen::new();

        let a = local_named(&mut arena, &mut names);
        let b = local_named(&mut arena, &mut names);
        let callee = arena.alloc_expr(Location::default(), ExprKind::Global("f".into()));
        let call = arena.alloc_expr(
            Location::default(),
            ExprKind::Call {
                func: callee,
                args: Vec::new(),
                self_call: false,
            },
        );
        let declaration = arena.alloc_stmt(
            Location::default(),
            StmtKind::Local {
                vars: vec![a, b],
                values: vec![call],
            },
        );
        let use_a = local_expr(&mut arena, a);
        let ret = arena.alloc_stmt(Location::default(), StmtKind::Return(vec![use_a]));

        let mut body = vec![declaration, ret];
        optimize(&mut body, &mut arena, &mut names);
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn test_store_into_same_local_is_not_inlined() {
        let mut arena = Arena::new();
        let mut names = NameGen::new();

        let var0 = local_named(&mut arena, &mut names);
        let one = arena.alloc_expr(Location::default(), ExprKind::Number(1.0));
        let declaration = decl(&mut arena, var0, one);

        let target = local_expr(&mut arena, var0);
        let two = arena.alloc_expr(Location::default(), ExprKind::Number(2.0));
        let store = arena.alloc_stmt(
            Location::default(),
            StmtKind::Assign {
                targets: vec![target],
                values: vec![two],
            },
        );

        let mut body = vec![declaration, store];
        optimize(&mut body, &mut arena, &mut names);
        assert_eq!(body.len(), 2);
        assert!(matches!(arena.stmt(body[0]).kind, StmtKind::Local { .. }));
    }

    #[test]
    fn test_reassignment_after_assignment_is_split() {
        let mut arena = Arena::new();
        let mut names = NameGen::new();

        let var0 = local_named(&mut arena, &mut names);
        let one = arena.alloc_expr(Location::default(), ExprKind::Number(1.0));
        let declaration = decl(&mut arena, var0, one);

        let first_target = local_expr(&mut arena, var0);
        let two = arena.alloc_expr(Location::default(), ExprKind::Number(2.0));
        let first_store = arena.alloc_stmt(
            Location::default(),
            StmtKind::Assign {
                targets: vec![first_target],
                values: vec![two],
            },
        );

        let second_target = local_expr(&mut arena, var0);
        let three = arena.alloc_expr(Location::default(), ExprKind::Number(3.0));
        let second_store = arena.alloc_stmt(
            Location::default(),
            StmtKind::Assign {
                targets: vec![second_target],
                values: vec![three],
            },
        );

        let use_expr = local_expr(&mut arena, var0);
        let ret = arena.alloc_stmt(Location::default(), StmtKind::Return(vec![use_expr]));

        let mut body = vec![declaration, first_store, second_store, ret];
        optimize(&mut body, &mut arena, &mut names);

        // The second store becomes `local var1 = 3`; the return then reads
        // the fresh local, which the inline pass folds to `return 3`.
        assert_eq!(body.len(), 3);
        assert!(matches!(arena.stmt(body[0]).kind, StmtKind::Local { .. }));
        assert!(matches!(arena.stmt(body[1]).kind, StmtKind::Assign { .. }));
        let StmtKind::Return(values) = &arena.stmt(body[2]).kind else {
            panic!("expected trailing return");
        };
        assert!(matches!(arena.expr(values[0]).kind, ExprKind::Number(n) if n == 3.0));
    }

    #[test]
    fn test_inliner_refuses_table_constructors() {
        let mut arena = Arena::new();
        let mut names = NameGen::new();

        let var0 = local_named(&mut arena, &mut names);
        let one = arena.alloc_expr(Location::default(), ExprKind::Number(1.0));
        let declaration = decl(&mut arena, var0, one);

        let item = local_expr(&mut arena, var0);
        let table = arena.alloc_expr(
            Location::default(),
            ExprKind::Table {
                pairs: vec![(None, item)],
            },
        );
        let ret = arena.alloc_stmt(Location::default(), StmtKind::Return(vec![table]));

        let mut body = vec![declaration, ret];
        optimize(&mut body, &mut arena, &mut names);

        // The reference inside the table is left alone; the declaration is
        // still dropped once its variable is considered handled.
        assert_eq!(body, vec![ret]);
        assert!(matches!(
            arena.expr(item).kind,
            ExprKind::Local { local, .. } if local == var0
        ));
    }
}
