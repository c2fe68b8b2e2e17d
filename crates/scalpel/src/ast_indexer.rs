//! Statement indexing pass.
//!
//! Front ends do not assign statement ids; this pass walks the whole program
//! in source order and numbers every statement (plus switch cases and catch
//! clauses, which the projection treats as keepable units of their own).
//! Ids start at 1 so the serde default (0) always means "not indexed".

use crate::ast::{CatchClause, Program, Stmt, StmtId, StmtKind, SwitchCase};

/// Assigns unique [`StmtId`]s across an entire program.
#[derive(Debug)]
pub struct AstIndexer {
    next: u32,
}

impl AstIndexer {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Index every statement in the program; returns the number of ids
    /// assigned.
    pub fn index_program(mut self, program: &mut Program) -> u32 {
        for unit in &mut program.units {
            for ty in &mut unit.types {
                for method in &mut ty.methods {
                    self.index_stmts(&mut method.body);
                }
            }
        }
        self.next - 1
    }

    fn fresh(&mut self) -> StmtId {
        let id = StmtId(self.next);
        self.next += 1;
        id
    }

    fn index_stmts(&mut self, stmts: &mut [Stmt]) {
        for stmt in stmts {
            self.index_stmt(stmt);
        }
    }

    fn index_stmt(&mut self, stmt: &mut Stmt) {
        stmt.id = self.fresh();
        match &mut stmt.kind {
            StmtKind::If { then_branch, else_branch, .. } => {
                self.index_stmts(then_branch);
                self.index_stmts(else_branch);
            }
            StmtKind::While { body, .. }
            | StmtKind::DoWhile { body, .. }
            | StmtKind::ForEach { body, .. }
            | StmtKind::Block { body } => self.index_stmts(body),
            StmtKind::For { init, update, body, .. } => {
                self.index_stmts(init);
                self.index_stmts(update);
                self.index_stmts(body);
            }
            StmtKind::Switch { cases, .. } => {
                for case in cases {
                    self.index_case(case);
                }
            }
            StmtKind::Try { body, catches, finally } => {
                self.index_stmts(body);
                for catch in catches {
                    self.index_catch(catch);
                }
                self.index_stmts(finally);
            }
            StmtKind::Expr { .. }
            | StmtKind::Decl { .. }
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Return { .. }
            | StmtKind::Throw { .. } => {}
        }
    }

    fn index_case(&mut self, case: &mut SwitchCase) {
        case.id = self.fresh();
        self.index_stmts(&mut case.body);
    }

    fn index_catch(&mut self, catch: &mut CatchClause) {
        catch.id = self.fresh();
        self.index_stmts(&mut catch.body);
    }
}

impl Default for AstIndexer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast_builder as b;

    #[test]
    fn assigns_unique_ids_in_source_order() {
        let mut program = b::program(b::unit(
            "Example.java",
            vec![b::class(
                "Example",
                vec![b::method(
                    "main",
                    1,
                    vec![],
                    vec![
                        b::decl(2, "int", "x", Some(b::lit("1"))),
                        b::if_then(3, b::name("x"), vec![b::expr_stmt(4, b::assign("x", b::lit("2")))]),
                    ],
                )],
            )],
        ));

        let count = AstIndexer::new().index_program(&mut program);
        assert_eq!(count, 3);

        let body = &program.units[0].types[0].methods[0].body;
        assert_eq!(body[0].id, StmtId(1));
        assert_eq!(body[1].id, StmtId(2));
        let StmtKind::If { then_branch, .. } = &body[1].kind else {
            panic!("expected if statement");
        };
        assert_eq!(then_branch[0].id, StmtId(3));
    }
}
