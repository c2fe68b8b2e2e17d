//! Factory functions for constructing AST nodes programmatically.
//!
//! Front ends that live in the same process (and the test suite) build
//! [`Program`]s through these helpers instead of going through JSON.
//! Statement ids are left at their default; run the indexer before analysis.

use std::path::PathBuf;

use crate::ast::{
    CallExpr, CallTarget, CatchClause, CompilationUnit, Expr, MethodDecl, Param, Program, Stmt,
    StmtId, StmtKind, SwitchCase, TypeDecl,
};

/// Create a program from a single compilation unit.
pub fn program(unit: CompilationUnit) -> Program {
    Program { units: vec![unit] }
}

/// Create a compilation unit for `path`.
pub fn unit(path: impl Into<PathBuf>, types: Vec<TypeDecl>) -> CompilationUnit {
    CompilationUnit { path: path.into(), types }
}

/// Create a class declaration.
pub fn class(name: &str, methods: Vec<MethodDecl>) -> TypeDecl {
    TypeDecl { name: name.to_string(), line: 0, methods }
}

/// Create a void method.
pub fn method(name: &str, line: u32, params: Vec<Param>, body: Vec<Stmt>) -> MethodDecl {
    MethodDecl {
        name: name.to_string(),
        line,
        params,
        return_type: None,
        body,
    }
}

/// Create a method with a return type.
pub fn method_returning(
    name: &str,
    line: u32,
    params: Vec<Param>,
    return_type: &str,
    body: Vec<Stmt>,
) -> MethodDecl {
    MethodDecl {
        name: name.to_string(),
        line,
        params,
        return_type: Some(return_type.to_string()),
        body,
    }
}

/// Create a formal parameter.
pub fn param(ty: &str, name: &str) -> Param {
    Param { ty: ty.to_string(), name: name.to_string() }
}

fn stmt(line: u32, kind: StmtKind) -> Stmt {
    Stmt { id: StmtId::default(), line, kind }
}

/// `<expr>;`
pub fn expr_stmt(line: u32, expr: Expr) -> Stmt {
    stmt(line, StmtKind::Expr { expr })
}

/// `<ty> <name>;` or `<ty> <name> = <init>;`
pub fn decl(line: u32, ty: &str, name: &str, init: Option<Expr>) -> Stmt {
    stmt(line, StmtKind::Decl { ty: ty.to_string(), name: name.to_string(), init })
}

/// `if (<cond>) { ... } else { ... }`
pub fn if_else(line: u32, cond: Expr, then_branch: Vec<Stmt>, else_branch: Vec<Stmt>) -> Stmt {
    stmt(line, StmtKind::If { cond, then_branch, else_branch })
}

/// `if (<cond>) { ... }`
pub fn if_then(line: u32, cond: Expr, then_branch: Vec<Stmt>) -> Stmt {
    if_else(line, cond, then_branch, Vec::new())
}

/// `while (<cond>) { ... }`
pub fn while_loop(line: u32, cond: Expr, body: Vec<Stmt>) -> Stmt {
    stmt(line, StmtKind::While { cond, body })
}

/// `do { ... } while (<cond>);`
pub fn do_while(line: u32, body: Vec<Stmt>, cond: Expr) -> Stmt {
    stmt(line, StmtKind::DoWhile { body, cond })
}

/// `for (<init>; <cond>; <update>) { ... }`
pub fn for_loop(
    line: u32,
    init: Vec<Stmt>,
    cond: Option<Expr>,
    update: Vec<Stmt>,
    body: Vec<Stmt>,
) -> Stmt {
    stmt(line, StmtKind::For { init, cond, update, body })
}

/// `for (<ty> <var> : <iterable>) { ... }`
pub fn for_each(line: u32, ty: &str, var: &str, iterable: Expr, body: Vec<Stmt>) -> Stmt {
    stmt(
        line,
        StmtKind::ForEach { ty: ty.to_string(), var: var.to_string(), iterable, body },
    )
}

/// `switch (<selector>) { ... }`
pub fn switch(line: u32, selector: Expr, cases: Vec<SwitchCase>) -> Stmt {
    stmt(line, StmtKind::Switch { selector, cases })
}

/// `case <label>:` entry; `label: None` builds the `default:` entry.
pub fn case(line: u32, label: Option<Expr>, body: Vec<Stmt>) -> SwitchCase {
    SwitchCase { id: StmtId::default(), line, label, body }
}

pub fn break_stmt(line: u32) -> Stmt {
    stmt(line, StmtKind::Break)
}

pub fn continue_stmt(line: u32) -> Stmt {
    stmt(line, StmtKind::Continue)
}

/// `return;` or `return <value>;`
pub fn ret(line: u32, value: Option<Expr>) -> Stmt {
    stmt(line, StmtKind::Return { value })
}

/// `throw <value>;`
pub fn throw(line: u32, value: Expr) -> Stmt {
    stmt(line, StmtKind::Throw { value })
}

/// `try { ... } catch ... finally { ... }`
pub fn try_stmt(line: u32, body: Vec<Stmt>, catches: Vec<CatchClause>, finally: Vec<Stmt>) -> Stmt {
    stmt(line, StmtKind::Try { body, catches, finally })
}

/// `catch (<ty> <var>) { ... }`
pub fn catch(line: u32, ty: &str, var: &str, body: Vec<Stmt>) -> CatchClause {
    CatchClause {
        id: StmtId::default(),
        line,
        ty: ty.to_string(),
        var: var.to_string(),
        body,
    }
}

/// `{ ... }`
pub fn block(line: u32, body: Vec<Stmt>) -> Stmt {
    stmt(line, StmtKind::Block { body })
}

/// A name reference.
pub fn name(name: &str) -> Expr {
    Expr::Name { name: name.to_string() }
}

/// A literal, kept as its source text.
pub fn lit(value: &str) -> Expr {
    Expr::Literal { value: value.to_string() }
}

/// `<lhs> <op> <rhs>`
pub fn bin(op: &str, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary { op: op.to_string(), lhs: Box::new(lhs), rhs: Box::new(rhs) }
}

/// `<op><operand>`, including `++`/`--`.
pub fn unary(op: &str, operand: Expr) -> Expr {
    Expr::Unary { op: op.to_string(), operand: Box::new(operand) }
}

/// `<target> = <value>`
pub fn assign(target: &str, value: Expr) -> Expr {
    Expr::Assign { target: target.to_string(), op: None, value: Box::new(value) }
}

/// `<target> <op>= <value>`
pub fn compound_assign(target: &str, op: &str, value: Expr) -> Expr {
    Expr::Assign {
        target: target.to_string(),
        op: Some(op.to_string()),
        value: Box::new(value),
    }
}

/// A call resolved to `key` (`Type.method`).
pub fn call_resolved(name: &str, key: &str, args: Vec<Expr>) -> Expr {
    Expr::Call(CallExpr {
        receiver: None,
        name: name.to_string(),
        target: CallTarget::Resolved { key: key.to_string() },
        args,
    })
}

/// A call whose target the front end could not resolve.
pub fn call_unresolved(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Call(CallExpr {
        receiver: None,
        name: name.to_string(),
        target: CallTarget::Unresolved,
        args,
    })
}

/// `<object>.<field>`
pub fn field(object: Expr, field_name: &str) -> Expr {
    Expr::Field { object: Box::new(object), field: field_name.to_string() }
}

/// `new <ty>(<args>)`
pub fn new_object(ty: &str, args: Vec<Expr>) -> Expr {
    Expr::New { ty: ty.to_string(), args }
}
