//! Front-end AST contract.
//!
//! The slicer does not parse source text. A front end hands it a [`Program`]:
//! compilation units with type declarations, methods with resolved body
//! statements, call expressions with statically resolved targets, and enough
//! binding information for variable extraction. The model serializes to JSON
//! (`*.ast.json`), which is the interchange format the CLI consumes.
//!
//! Statement ids are not part of the interchange format; they are assigned by
//! the indexing pass (`ast_indexer`) after load.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Identifier of a statement within an indexed program.
///
/// Zero until the indexer has run; unique across the whole program afterwards.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct StmtId(pub u32);

/// A whole analyzed program: every compilation unit the front end produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub units: Vec<CompilationUnit>,
}

/// One source file worth of declarations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationUnit {
    /// Path of the original source file this unit was parsed from.
    pub path: PathBuf,
    pub types: Vec<TypeDecl>,
}

/// A class-like type declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    #[serde(default)]
    pub line: u32,
    pub methods: Vec<MethodDecl>,
}

/// A method with a resolved body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub params: Vec<Param>,
    /// `None` for void methods.
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

/// A formal parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub ty: String,
    pub name: String,
}

/// A statement node. `id` is assigned by the indexer, not the front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stmt {
    #[serde(default, skip_serializing)]
    pub id: StmtId,
    #[serde(default)]
    pub line: u32,
    #[serde(flatten)]
    pub kind: StmtKind,
}

/// Statement kinds of the supported object-oriented statement language.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "stmt", rename_all = "snake_case")]
pub enum StmtKind {
    /// Expression statement (assignments, calls, increments, ...).
    Expr { expr: Expr },
    /// Local variable declaration, optionally initialized.
    Decl {
        ty: String,
        name: String,
        #[serde(default)]
        init: Option<Expr>,
    },
    If {
        cond: Expr,
        #[serde(default)]
        then_branch: Vec<Stmt>,
        #[serde(default)]
        else_branch: Vec<Stmt>,
    },
    While {
        cond: Expr,
        #[serde(default)]
        body: Vec<Stmt>,
    },
    DoWhile {
        #[serde(default)]
        body: Vec<Stmt>,
        cond: Expr,
    },
    For {
        #[serde(default)]
        init: Vec<Stmt>,
        #[serde(default)]
        cond: Option<Expr>,
        #[serde(default)]
        update: Vec<Stmt>,
        #[serde(default)]
        body: Vec<Stmt>,
    },
    ForEach {
        ty: String,
        var: String,
        iterable: Expr,
        #[serde(default)]
        body: Vec<Stmt>,
    },
    Switch {
        selector: Expr,
        #[serde(default)]
        cases: Vec<SwitchCase>,
    },
    Break,
    Continue,
    Return {
        #[serde(default)]
        value: Option<Expr>,
    },
    Throw { value: Expr },
    Try {
        #[serde(default)]
        body: Vec<Stmt>,
        #[serde(default)]
        catches: Vec<CatchClause>,
        #[serde(default)]
        finally: Vec<Stmt>,
    },
    Block {
        #[serde(default)]
        body: Vec<Stmt>,
    },
}

/// One `case`/`default` entry of a switch. `label: None` is the default case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchCase {
    #[serde(default, skip_serializing)]
    pub id: StmtId,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub label: Option<Expr>,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

/// One `catch` clause of a try statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchClause {
    #[serde(default, skip_serializing)]
    pub id: StmtId,
    #[serde(default)]
    pub line: u32,
    pub ty: String,
    pub var: String,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

/// Expression tree. Only the structure the slicer needs: names, writes,
/// calls and their arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum Expr {
    Literal { value: String },
    Name { name: String },
    Unary {
        op: String,
        operand: Box<Expr>,
    },
    Binary {
        op: String,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Assignment to a named target; `op` is the compound operator (`+` for
    /// `+=`), absent for plain `=`.
    Assign {
        target: String,
        #[serde(default)]
        op: Option<String>,
        value: Box<Expr>,
    },
    Call(CallExpr),
    Field {
        object: Box<Expr>,
        field: String,
    },
    New {
        ty: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
}

/// A method call with its resolution result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallExpr {
    #[serde(default)]
    pub receiver: Option<Box<Expr>>,
    pub name: String,
    #[serde(default)]
    pub target: CallTarget,
    #[serde(default)]
    pub args: Vec<Expr>,
}

/// Statically resolved call target. The front end owns symbol resolution;
/// a resolved key is `Type.method`. Anything it could not resolve stays
/// [`CallTarget::Unresolved`] and is treated as an opaque leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallTarget {
    Resolved { key: String },
    #[default]
    Unresolved,
}

impl MethodDecl {
    /// Qualified key of this method inside `type_name`.
    pub fn key(&self, type_name: &str) -> String {
        format!("{type_name}.{}", self.name)
    }
}

impl Stmt {
    /// Rendered header of this statement, as used for graph node labels:
    /// the full text for simple statements, `if (<cond>)` style headers for
    /// block-structured ones.
    pub fn header_text(&self) -> String {
        match &self.kind {
            StmtKind::Expr { expr } => format!("{expr};"),
            StmtKind::Decl { ty, name, init } => match init {
                Some(e) => format!("{ty} {name} = {e};"),
                None => format!("{ty} {name};"),
            },
            StmtKind::If { cond, .. } => format!("if ({cond})"),
            StmtKind::While { cond, .. } => format!("while ({cond})"),
            StmtKind::DoWhile { cond, .. } => format!("do-while ({cond})"),
            StmtKind::For { cond, .. } => match cond {
                Some(c) => format!("for (;{c};)"),
                None => "for (;true;)".to_string(),
            },
            StmtKind::ForEach { ty, var, iterable, .. } => {
                format!("for ({ty} {var} : {iterable})")
            }
            StmtKind::Switch { selector, .. } => format!("switch ({selector})"),
            StmtKind::Break => "break;".to_string(),
            StmtKind::Continue => "continue;".to_string(),
            StmtKind::Return { value } => match value {
                Some(e) => format!("return {e};"),
                None => "return;".to_string(),
            },
            StmtKind::Throw { value } => format!("throw {value};"),
            StmtKind::Try { .. } => "try".to_string(),
            StmtKind::Block { .. } => "{".to_string(),
        }
    }
}

impl SwitchCase {
    pub fn header_text(&self) -> String {
        match &self.label {
            Some(e) => format!("case {e}"),
            None => "default".to_string(),
        }
    }
}

impl CatchClause {
    pub fn header_text(&self) -> String {
        format!("catch ({} {})", self.ty, self.var)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal { value } => f.write_str(value),
            Self::Name { name } => f.write_str(name),
            Self::Unary { op, operand } => write!(f, "{op}{operand}"),
            Self::Binary { op, lhs, rhs } => write!(f, "{lhs} {op} {rhs}"),
            Self::Assign { target, op, value } => match op {
                Some(op) => write!(f, "{target} {op}= {value}"),
                None => write!(f, "{target} = {value}"),
            },
            Self::Call(call) => {
                if let Some(receiver) = &call.receiver {
                    write!(f, "{receiver}.")?;
                }
                write!(f, "{}(", call.name)?;
                for (i, arg) in call.args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            Self::Field { object, field } => write!(f, "{object}.{field}"),
            Self::New { ty, args } => {
                write!(f, "new {ty}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}
