//! Slice projection and source reconstruction.
//!
//! A slice is a set of graph nodes; projection maps it back onto the AST:
//! a statement survives when its id is in the slice or when a descendant
//! survives (it is then a structurally required ancestor). Block-structured
//! constructs whose bodies project to nothing are omitted entirely. Methods
//! survive when any of their nodes is a slice member; classes and units
//! follow their methods.
//!
//! The surviving AST is rendered back to source text, one file per touched
//! compilation unit, each prefixed with a provenance comment.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use rustc_hash::FxHashSet;

use crate::ast::{
    CatchClause, CompilationUnit, MethodDecl, Program, Stmt, StmtId, StmtKind, SwitchCase,
    TypeDecl,
};
use crate::criterion::SlicingCriterion;
use crate::sdg::Sdg;
use crate::slicer::Slice;

/// Project a slice onto the program, returning the surviving AST.
pub fn project(program: &Program, sdg: &Sdg, slice: &Slice) -> Program {
    let keep = slice.statements(sdg);
    let methods = slice.methods(sdg);

    let units = program
        .units
        .iter()
        .filter_map(|unit| {
            let types: Vec<TypeDecl> = unit
                .types
                .iter()
                .filter_map(|ty| {
                    let kept: Vec<MethodDecl> = ty
                        .methods
                        .iter()
                        .filter(|m| methods.contains(m.key(&ty.name).as_str()))
                        .map(|m| MethodDecl {
                            body: filter_stmts(&m.body, &keep),
                            ..m.clone()
                        })
                        .collect();
                    (!kept.is_empty()).then(|| TypeDecl {
                        name: ty.name.clone(),
                        line: ty.line,
                        methods: kept,
                    })
                })
                .collect();
            (!types.is_empty()).then(|| CompilationUnit { path: unit.path.clone(), types })
        })
        .collect();
    Program { units }
}

fn filter_stmts(stmts: &[Stmt], keep: &FxHashSet<StmtId>) -> Vec<Stmt> {
    stmts.iter().filter_map(|s| filter_stmt(s, keep)).collect()
}

fn filter_stmt(stmt: &Stmt, keep: &FxHashSet<StmtId>) -> Option<Stmt> {
    let kind = match &stmt.kind {
        StmtKind::Expr { .. }
        | StmtKind::Decl { .. }
        | StmtKind::Break
        | StmtKind::Continue
        | StmtKind::Return { .. }
        | StmtKind::Throw { .. } => keep.contains(&stmt.id).then(|| stmt.kind.clone())?,
        StmtKind::If { cond, then_branch, else_branch } => {
            let then_branch = filter_stmts(then_branch, keep);
            let else_branch = filter_stmts(else_branch, keep);
            if then_branch.is_empty() && else_branch.is_empty() {
                return None;
            }
            StmtKind::If { cond: cond.clone(), then_branch, else_branch }
        }
        StmtKind::While { cond, body } => {
            let body = filter_stmts(body, keep);
            if body.is_empty() {
                return None;
            }
            StmtKind::While { cond: cond.clone(), body }
        }
        StmtKind::DoWhile { body, cond } => {
            let body = filter_stmts(body, keep);
            if body.is_empty() {
                return None;
            }
            StmtKind::DoWhile { body, cond: cond.clone() }
        }
        StmtKind::For { init, cond, update, body } => {
            let body = filter_stmts(body, keep);
            if body.is_empty() {
                return None;
            }
            StmtKind::For {
                init: filter_stmts(init, keep),
                cond: cond.clone(),
                update: filter_stmts(update, keep),
                body,
            }
        }
        StmtKind::ForEach { ty, var, iterable, body } => {
            let body = filter_stmts(body, keep);
            if body.is_empty() {
                return None;
            }
            StmtKind::ForEach {
                ty: ty.clone(),
                var: var.clone(),
                iterable: iterable.clone(),
                body,
            }
        }
        StmtKind::Switch { selector, cases } => {
            let cases: Vec<SwitchCase> = cases
                .iter()
                .filter_map(|case| {
                    let body = filter_stmts(&case.body, keep);
                    (keep.contains(&case.id) || !body.is_empty()).then(|| SwitchCase {
                        id: case.id,
                        line: case.line,
                        label: case.label.clone(),
                        body,
                    })
                })
                .collect();
            if cases.is_empty() {
                return None;
            }
            StmtKind::Switch { selector: selector.clone(), cases }
        }
        StmtKind::Try { body, catches, finally } => {
            let body = filter_stmts(body, keep);
            let catches: Vec<CatchClause> = catches
                .iter()
                .filter_map(|catch| {
                    let body = filter_stmts(&catch.body, keep);
                    (keep.contains(&catch.id) || !body.is_empty()).then(|| CatchClause {
                        id: catch.id,
                        line: catch.line,
                        ty: catch.ty.clone(),
                        var: catch.var.clone(),
                        body,
                    })
                })
                .collect();
            let finally = filter_stmts(finally, keep);
            if body.is_empty() && catches.is_empty() && finally.is_empty() {
                return None;
            }
            StmtKind::Try { body, catches, finally }
        }
        StmtKind::Block { body } => {
            let body = filter_stmts(body, keep);
            if body.is_empty() {
                return None;
            }
            StmtKind::Block { body }
        }
    };
    Some(Stmt { id: stmt.id, line: stmt.line, kind })
}

/// Render a compilation unit back to source text.
pub fn render_unit(unit: &CompilationUnit, header: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(header) = header {
        out.push_str(header);
        out.push('\n');
    }
    for ty in &unit.types {
        let _ = writeln!(out, "class {} {{", ty.name);
        for method in &ty.methods {
            render_method(&mut out, method, 1);
        }
        out.push_str("}\n");
    }
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("    ");
    }
}

fn render_method(out: &mut String, method: &MethodDecl, depth: usize) {
    indent(out, depth);
    let return_type = method.return_type.as_deref().unwrap_or("void");
    let params: Vec<String> = method
        .params
        .iter()
        .map(|p| format!("{} {}", p.ty, p.name))
        .collect();
    let _ = writeln!(out, "{return_type} {}({}) {{", method.name, params.join(", "));
    render_stmts(out, &method.body, depth + 1);
    indent(out, depth);
    out.push_str("}\n");
}

fn render_stmts(out: &mut String, stmts: &[Stmt], depth: usize) {
    for stmt in stmts {
        render_stmt(out, stmt, depth);
    }
}

fn render_stmt(out: &mut String, stmt: &Stmt, depth: usize) {
    match &stmt.kind {
        StmtKind::Expr { .. }
        | StmtKind::Decl { .. }
        | StmtKind::Break
        | StmtKind::Continue
        | StmtKind::Return { .. }
        | StmtKind::Throw { .. } => {
            indent(out, depth);
            let _ = writeln!(out, "{}", stmt.header_text());
        }
        StmtKind::If { cond, then_branch, else_branch } => {
            indent(out, depth);
            let _ = writeln!(out, "if ({cond}) {{");
            render_stmts(out, then_branch, depth + 1);
            indent(out, depth);
            if else_branch.is_empty() {
                out.push_str("}\n");
            } else {
                out.push_str("} else {\n");
                render_stmts(out, else_branch, depth + 1);
                indent(out, depth);
                out.push_str("}\n");
            }
        }
        StmtKind::While { cond, body } => {
            indent(out, depth);
            let _ = writeln!(out, "while ({cond}) {{");
            render_stmts(out, body, depth + 1);
            indent(out, depth);
            out.push_str("}\n");
        }
        StmtKind::DoWhile { body, cond } => {
            indent(out, depth);
            out.push_str("do {\n");
            render_stmts(out, body, depth + 1);
            indent(out, depth);
            let _ = writeln!(out, "}} while ({cond});");
        }
        StmtKind::For { init, cond, update, body } => {
            indent(out, depth);
            let init_text: Vec<String> = init.iter().map(render_inline).collect();
            let update_text: Vec<String> = update.iter().map(render_inline).collect();
            let cond_text = cond.as_ref().map_or_else(String::new, |c| c.to_string());
            let _ = writeln!(
                out,
                "for ({}; {cond_text}; {}) {{",
                init_text.join(", "),
                update_text.join(", ")
            );
            render_stmts(out, body, depth + 1);
            indent(out, depth);
            out.push_str("}\n");
        }
        StmtKind::ForEach { ty, var, iterable, body } => {
            indent(out, depth);
            let _ = writeln!(out, "for ({ty} {var} : {iterable}) {{");
            render_stmts(out, body, depth + 1);
            indent(out, depth);
            out.push_str("}\n");
        }
        StmtKind::Switch { selector, cases } => {
            indent(out, depth);
            let _ = writeln!(out, "switch ({selector}) {{");
            for case in cases {
                indent(out, depth + 1);
                let _ = writeln!(out, "{}:", case.header_text());
                render_stmts(out, &case.body, depth + 2);
            }
            indent(out, depth);
            out.push_str("}\n");
        }
        StmtKind::Try { body, catches, finally } => {
            indent(out, depth);
            out.push_str("try {\n");
            render_stmts(out, body, depth + 1);
            indent(out, depth);
            out.push('}');
            for catch in catches {
                let _ = write!(out, " catch ({} {}) {{", catch.ty, catch.var);
                out.push('\n');
                render_stmts(out, &catch.body, depth + 1);
                indent(out, depth);
                out.push('}');
            }
            if !finally.is_empty() {
                out.push_str(" finally {\n");
                render_stmts(out, finally, depth + 1);
                indent(out, depth);
                out.push('}');
            }
            out.push('\n');
        }
        StmtKind::Block { body } => {
            indent(out, depth);
            out.push_str("{\n");
            render_stmts(out, body, depth + 1);
            indent(out, depth);
            out.push_str("}\n");
        }
    }
}

/// Single-line rendering for `for` headers.
fn render_inline(stmt: &Stmt) -> String {
    stmt.header_text().trim_end_matches(';').to_string()
}

/// Provenance header written at the top of every reconstructed file.
fn disclaimer(criterion: &SlicingCriterion, original: &Path) -> String {
    format!(
        "/*\n * Code sliced at criterion {criterion}.\n * Original file: {}\n */",
        original.display()
    )
}

/// Write one reconstructed file per unit of the projected program into
/// `output_dir`. Individual write failures are reported and skipped; a unit
/// without an originating file is a pipeline bug and aborts.
pub fn write_slice(
    output_dir: &Path,
    projected: &Program,
    criterion: &SlicingCriterion,
) -> anyhow::Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    let mut written = Vec::new();
    for unit in &projected.units {
        if unit.path.as_os_str().is_empty() {
            bail!("internal error: a synthetic compilation unit has no originating file");
        }
        let Some(file_name) = unit.path.file_name() else {
            bail!(
                "internal error: compilation unit path {} has no file name",
                unit.path.display()
            );
        };
        let target = output_dir.join(file_name);
        let text = render_unit(unit, Some(&disclaimer(criterion, &unit.path)));
        match fs::write(&target, text) {
            Ok(()) => written.push(target),
            Err(err) => log::error!("could not write {}: {err}", target.display()),
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ast_builder as b;

    fn keep(ids: &[u32]) -> FxHashSet<StmtId> {
        ids.iter().map(|&i| StmtId(i)).collect()
    }

    #[test]
    fn leaf_statements_outside_the_keep_set_are_omitted() {
        let mut stmts = vec![
            b::decl(1, "int", "x", Some(b::lit("1"))),
            b::decl(2, "int", "y", Some(b::lit("2"))),
        ];
        stmts[0].id = StmtId(1);
        stmts[1].id = StmtId(2);

        let filtered = filter_stmts(&stmts, &keep(&[1]));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, StmtId(1));
    }

    #[test]
    fn control_construct_with_empty_body_is_omitted_entirely() {
        let mut stmt = b::if_then(
            1,
            b::name("c"),
            vec![b::expr_stmt(2, b::assign("a", b::lit("1")))],
        );
        stmt.id = StmtId(1);
        let StmtKind::If { then_branch, .. } = &mut stmt.kind else {
            unreachable!();
        };
        then_branch[0].id = StmtId(2);

        // Even with the predicate itself kept, an emptied body removes the
        // whole construct.
        assert!(filter_stmt(&stmt, &keep(&[1])).is_none());
        assert!(filter_stmt(&stmt, &keep(&[1, 2])).is_some());
    }

    #[test]
    fn ancestors_of_kept_statements_survive() {
        let mut outer = b::while_loop(
            1,
            b::name("c"),
            vec![b::if_then(
                2,
                b::name("d"),
                vec![b::expr_stmt(3, b::assign("a", b::lit("1")))],
            )],
        );
        outer.id = StmtId(1);
        let StmtKind::While { body, .. } = &mut outer.kind else {
            unreachable!();
        };
        body[0].id = StmtId(2);
        let StmtKind::If { then_branch, .. } = &mut body[0].kind else {
            unreachable!();
        };
        then_branch[0].id = StmtId(3);

        let kept = filter_stmt(&outer, &keep(&[3])).expect("ancestors survive");
        let StmtKind::While { body, .. } = &kept.kind else {
            unreachable!();
        };
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn rendering_produces_source_shaped_text() {
        let unit = b::unit(
            "Example.java",
            vec![b::class(
                "Example",
                vec![b::method_returning(
                    "bar",
                    1,
                    vec![b::param("int", "p")],
                    "int",
                    vec![b::ret(2, Some(b::bin("+", b::name("p"), b::lit("1"))))],
                )],
            )],
        );
        let text = render_unit(&unit, Some("/* header */"));
        let expected = "/* header */\n\
                        class Example {\n    \
                        int bar(int p) {\n        \
                        return p + 1;\n    \
                        }\n\
                        }\n";
        assert_eq!(text, expected);
    }
}
