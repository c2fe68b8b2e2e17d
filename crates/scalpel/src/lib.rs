//! scalpel
//!
//! Interprocedural static program slicer for object-oriented source code.
//!
//! The crate builds one control-flow graph per method, derives program
//! dependence graphs from them, merges everything into a system dependence
//! graph with interprocedural and summary arcs, and answers backward slicing
//! requests with the two-phase Horwitz–Reps–Binkley traversal.
//!
//! Parsing is not performed here: an external front end supplies the AST
//! (see [`ast`]), either programmatically or as `*.ast.json` files.

pub mod ast;
pub mod ast_builder;
pub mod ast_indexer;
pub mod cfg;
pub mod codegen;
pub mod config;
pub mod criterion;
pub mod export;
pub mod graph;
pub mod orchestrator;
pub mod pdg;
pub mod sdg;
pub mod slicer;
pub mod summary;
pub mod vars;
