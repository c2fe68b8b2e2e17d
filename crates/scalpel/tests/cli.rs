use std::fs;
use std::path::Path;

use predicates::prelude::*;
use scalpel::ast::Program;
use scalpel::ast_builder as b;
use tempfile::tempdir;

fn sample_program(source: &Path) -> Program {
    b::program(b::unit(
        source,
        vec![b::class(
            "Example",
            vec![b::method(
                "main",
                1,
                vec![],
                vec![
                    b::decl(2, "int", "x", Some(b::lit("1"))),
                    b::decl(3, "int", "noise", Some(b::lit("9"))),
                    b::expr_stmt(4, b::call_unresolved("print", vec![b::name("x")])),
                ],
            )],
        )],
    ))
}

fn write_ast(dir: &Path, program: &Program) {
    let text = serde_json::to_string(program).expect("program serializes");
    fs::write(dir.join("Example.ast.json"), text).expect("ast file written");
}

/// A malformed criterion must abort before any graph work: non-zero exit and
/// no output directory.
#[test]
fn malformed_criterion_fails_fast_without_output() {
    let dir = tempdir().expect("tempdir");

    assert_cmd::cargo::cargo_bin_cmd!("scalpel")
        .current_dir(dir.path())
        .arg("--criterion")
        .arg("definitely-not-a-criterion")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid slicing criterion"));

    assert!(
        !dir.path().join("slice").exists(),
        "no partial output on criterion errors"
    );
}

#[test]
fn slicing_writes_a_reconstructed_file_with_provenance() {
    let dir = tempdir().expect("tempdir");
    let source = dir.path().join("Example.java");
    write_ast(dir.path(), &sample_program(&source));

    assert_cmd::cargo::cargo_bin_cmd!("scalpel")
        .current_dir(dir.path())
        .arg("--criterion")
        .arg(format!("{}#4", source.display()))
        .arg("--output")
        .arg(dir.path().join("out"))
        .assert()
        .success()
        .stdout(predicate::str::contains("file(s) written"));

    let sliced = dir.path().join("out").join("Example.java");
    let text = fs::read_to_string(&sliced).expect("sliced file exists");
    assert!(text.starts_with("/*"), "provenance comment comes first");
    assert!(text.contains("Original file:"));
    assert!(text.contains("int x = 1;"));
    assert!(!text.contains("noise"));
}

#[test]
fn dump_graph_writes_a_dot_file() {
    let dir = tempdir().expect("tempdir");
    let source = dir.path().join("Example.java");
    write_ast(dir.path(), &sample_program(&source));
    let dot = dir.path().join("graph.dot");

    assert_cmd::cargo::cargo_bin_cmd!("scalpel")
        .current_dir(dir.path())
        .arg("-c")
        .arg(format!("{}#4", source.display()))
        .arg("-o")
        .arg(dir.path().join("out"))
        .arg("--dump-graph")
        .arg(&dot)
        .assert()
        .success();

    let text = fs::read_to_string(&dot).expect("dot file exists");
    assert!(text.starts_with("digraph sdg {"));
    assert!(text.contains("style=filled"));
}

/// A criterion that parses but matches nothing is a recoverable slicing
/// error, reported distinctly from parse errors.
#[test]
fn unmatched_criterion_reports_not_found() {
    let dir = tempdir().expect("tempdir");
    let source = dir.path().join("Example.java");
    write_ast(dir.path(), &sample_program(&source));

    assert_cmd::cargo::cargo_bin_cmd!("scalpel")
        .current_dir(dir.path())
        .arg("-c")
        .arg(format!("{}#99", source.display()))
        .assert()
        .failure()
        .stderr(predicate::str::contains("no statement at or after line 99"));
}

#[test]
fn missing_ast_units_are_reported() {
    let dir = tempdir().expect("tempdir");

    assert_cmd::cargo::cargo_bin_cmd!("scalpel")
        .current_dir(dir.path())
        .arg("-c")
        .arg(format!("{}/Example.java#4", dir.path().display()))
        .assert()
        .failure()
        .stderr(predicate::str::contains("compilation units"));
}
