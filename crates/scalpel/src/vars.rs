//! Variable extraction.
//!
//! Computes, for a single statement, which variable names it declares,
//! defines (writes) and uses (reads). Block-structured statements only
//! contribute their header here; nested statements become graph nodes of
//! their own, so their actions are extracted separately.

use crate::ast::{CatchClause, Expr, StmtKind, SwitchCase};
use crate::graph::VarActions;

/// Extract the variable actions of a statement header.
pub fn for_stmt(kind: &StmtKind) -> VarActions {
    let mut actions = VarActions::default();
    match kind {
        StmtKind::Expr { expr } => collect_expr(expr, &mut actions),
        StmtKind::Decl { name, init, .. } => {
            actions.declared.insert(name.clone());
            if let Some(init) = init {
                actions.defined.insert(name.clone());
                collect_expr(init, &mut actions);
            }
        }
        StmtKind::If { cond, .. }
        | StmtKind::While { cond, .. }
        | StmtKind::DoWhile { cond, .. } => collect_expr(cond, &mut actions),
        StmtKind::For { cond, .. } => {
            if let Some(cond) = cond {
                collect_expr(cond, &mut actions);
            }
        }
        StmtKind::ForEach { var, iterable, .. } => {
            actions.declared.insert(var.clone());
            actions.defined.insert(var.clone());
            collect_expr(iterable, &mut actions);
        }
        StmtKind::Switch { selector, .. } => collect_expr(selector, &mut actions),
        StmtKind::Return { value } => {
            if let Some(value) = value {
                collect_expr(value, &mut actions);
            }
        }
        StmtKind::Throw { value } => collect_expr(value, &mut actions),
        StmtKind::Break | StmtKind::Continue | StmtKind::Try { .. } | StmtKind::Block { .. } => {}
    }
    actions
}

/// Variable actions of a `case`/`default` entry (its label expression).
pub fn for_case(case: &SwitchCase) -> VarActions {
    let mut actions = VarActions::default();
    if let Some(label) = &case.label {
        collect_expr(label, &mut actions);
    }
    actions
}

/// Variable actions of a catch clause header: binds the caught exception.
pub fn for_catch(catch: &CatchClause) -> VarActions {
    let mut actions = VarActions::default();
    actions.declared.insert(catch.var.clone());
    actions.defined.insert(catch.var.clone());
    actions
}

/// Walk an expression, adding its reads and writes to `actions`.
pub fn collect_expr(expr: &Expr, actions: &mut VarActions) {
    match expr {
        Expr::Literal { .. } => {}
        Expr::Name { name } => {
            actions.used.insert(name.clone());
        }
        Expr::Unary { op, operand } => {
            // ++/-- both read and write their operand.
            if let (true, Expr::Name { name }) = (op == "++" || op == "--", operand.as_ref()) {
                actions.defined.insert(name.clone());
                actions.used.insert(name.clone());
            } else {
                collect_expr(operand, actions);
            }
        }
        Expr::Binary { lhs, rhs, .. } => {
            collect_expr(lhs, actions);
            collect_expr(rhs, actions);
        }
        Expr::Assign { target, op, value } => {
            actions.defined.insert(target.clone());
            // A compound assignment reads its target too.
            if op.is_some() {
                actions.used.insert(target.clone());
            }
            collect_expr(value, actions);
        }
        Expr::Call(call) => {
            if let Some(receiver) = &call.receiver {
                collect_expr(receiver, actions);
            }
            for arg in &call.args {
                collect_expr(arg, actions);
            }
        }
        Expr::Field { object, .. } => collect_expr(object, actions),
        Expr::New { args, .. } => {
            for arg in args {
                collect_expr(arg, actions);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast_builder as b;

    fn names(set: &rustc_hash::FxHashSet<String>) -> Vec<&str> {
        let mut v: Vec<&str> = set.iter().map(String::as_str).collect();
        v.sort_unstable();
        v
    }

    #[test]
    fn declaration_with_initializer_declares_defines_and_uses() {
        let stmt = b::decl(1, "int", "x", Some(b::bin("+", b::name("a"), b::lit("1"))));
        let actions = for_stmt(&stmt.kind);
        assert_eq!(names(&actions.declared), ["x"]);
        assert_eq!(names(&actions.defined), ["x"]);
        assert_eq!(names(&actions.used), ["a"]);
    }

    #[test]
    fn bare_declaration_does_not_define() {
        let stmt = b::decl(1, "int", "x", None);
        let actions = for_stmt(&stmt.kind);
        assert_eq!(names(&actions.declared), ["x"]);
        assert!(actions.defined.is_empty());
    }

    #[test]
    fn compound_assignment_reads_its_target() {
        let stmt = b::expr_stmt(1, b::compound_assign("x", "+", b::name("y")));
        let actions = for_stmt(&stmt.kind);
        assert_eq!(names(&actions.defined), ["x"]);
        assert_eq!(names(&actions.used), ["x", "y"]);
    }

    #[test]
    fn increment_reads_and_writes() {
        let stmt = b::expr_stmt(1, b::unary("++", b::name("i")));
        let actions = for_stmt(&stmt.kind);
        assert_eq!(names(&actions.defined), ["i"]);
        assert_eq!(names(&actions.used), ["i"]);
    }

    #[test]
    fn call_arguments_and_receiver_are_uses() {
        let stmt = b::expr_stmt(
            1,
            b::assign(
                "r",
                b::call_unresolved("compute", vec![b::name("a"), b::field(b::name("p"), "size")]),
            ),
        );
        let actions = for_stmt(&stmt.kind);
        assert_eq!(names(&actions.defined), ["r"]);
        assert_eq!(names(&actions.used), ["a", "p"]);
    }

    #[test]
    fn foreach_binds_its_variable() {
        let stmt = b::for_each(1, "int", "v", b::name("items"), vec![]);
        let actions = for_stmt(&stmt.kind);
        assert_eq!(names(&actions.declared), ["v"]);
        assert_eq!(names(&actions.defined), ["v"]);
        assert_eq!(names(&actions.used), ["items"]);
    }
}
