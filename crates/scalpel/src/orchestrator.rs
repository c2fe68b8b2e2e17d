//! One analysis run, end to end: load the front end's compilation units,
//! build and link the SDG, resolve the criterion, slice, and write the
//! reconstructed sources.
//!
//! The SDG is built once per run; the slicing step itself is read-only and
//! could serve any number of criteria against the same graph.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, ensure};
use rustc_hash::FxHashSet;

use crate::ast::Program;
use crate::ast_indexer::AstIndexer;
use crate::codegen;
use crate::config::Config;
use crate::criterion::{CriterionResolver, SlicingCriterion};
use crate::export;
use crate::sdg::SdgBuilder;
use crate::slicer::Slicer;

/// Suffix of front-end interchange files.
pub const AST_SUFFIX: &str = ".ast.json";

/// Result of a completed run.
#[derive(Debug)]
pub struct SliceOutcome {
    /// Files written to the output directory.
    pub written: Vec<PathBuf>,
    /// Number of nodes in the slice.
    pub slice_nodes: usize,
    /// Number of nodes in the whole SDG.
    pub graph_nodes: usize,
}

/// Drives the build → link → slice → emit pipeline.
#[derive(Debug)]
pub struct SliceOrchestrator {
    config: Config,
}

impl SliceOrchestrator {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run a single slicing request. The criterion must already be parsed;
    /// string validation happens before any graph work.
    pub fn run(
        &self,
        criterion: &SlicingCriterion,
        dump_graph: Option<&Path>,
    ) -> anyhow::Result<SliceOutcome> {
        let mut program = self.load_program(criterion)?;
        let indexed = AstIndexer::new().index_program(&mut program);
        log::debug!("indexed {indexed} statements");

        let sdg = SdgBuilder::new(self.config.exception_sensitive).build(&program);

        let nodes = CriterionResolver::new(&sdg)
            .resolve(criterion)
            .with_context(|| format!("resolving criterion {criterion}"))?;
        let slice = Slicer::new(&sdg).slice(&nodes);
        log::info!("slice of {criterion}: {} of {} nodes", slice.len(), sdg.graph.node_count());

        if let Some(path) = dump_graph {
            fs::write(path, export::to_dot(&sdg, Some(&slice)))
                .with_context(|| format!("writing graph export {}", path.display()))?;
        }

        let projected = codegen::project(&program, &sdg, &slice);
        let written = codegen::write_slice(&self.config.output_dir(), &projected, criterion)?;

        Ok(SliceOutcome {
            written,
            slice_nodes: slice.len(),
            graph_nodes: sdg.graph.node_count(),
        })
    }

    /// Load every `*.ast.json` unit from the criterion file's directory and
    /// the configured include directories.
    fn load_program(&self, criterion: &SlicingCriterion) -> anyhow::Result<Program> {
        let mut dirs: Vec<PathBuf> = Vec::new();
        let criterion_dir = criterion
            .file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        dirs.push(criterion_dir);
        dirs.extend(self.config.include.iter().cloned());

        let mut seen: FxHashSet<PathBuf> = FxHashSet::default();
        let mut program = Program::default();
        for dir in dirs {
            ensure!(dir.is_dir(), "include directory {} does not exist", dir.display());
            let mut files = Vec::new();
            collect_ast_files(&dir, &mut files)?;
            files.sort();
            for file in files {
                let canonical = file.canonicalize().unwrap_or_else(|_| file.clone());
                if !seen.insert(canonical) {
                    continue;
                }
                let text = fs::read_to_string(&file)
                    .with_context(|| format!("reading {}", file.display()))?;
                let loaded: Program = serde_json::from_str(&text)
                    .with_context(|| format!("parsing {}", file.display()))?;
                log::debug!("loaded {} unit(s) from {}", loaded.units.len(), file.display());
                program.units.extend(loaded.units);
            }
        }
        ensure!(
            !program.units.is_empty(),
            "no {AST_SUFFIX} compilation units found for criterion {criterion}"
        );
        Ok(program)
    }
}

fn collect_ast_files(dir: &Path, out: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("listing directory {}", dir.display()))?;
    for entry in entries {
        let path = entry
            .with_context(|| format!("listing directory {}", dir.display()))?
            .path();
        if path.is_dir() {
            collect_ast_files(&path, out)?;
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(AST_SUFFIX))
        {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::ast_builder as b;

    fn write_ast(dir: &Path, name: &str, program: &Program) {
        let text = serde_json::to_string_pretty(program).expect("serializes");
        fs::write(dir.join(name), text).expect("writes");
    }

    #[test]
    fn end_to_end_run_writes_a_reconstructed_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = dir.path().join("Example.java");

        let program = b::program(b::unit(
            &source,
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
        ));
        write_ast(dir.path(), "Example.ast.json", &program);

        let config = Config {
            include: vec![],
            output: Some(dir.path().join("out")),
            exception_sensitive: false,
        };
        let criterion: SlicingCriterion =
            format!("{}#4", source.display()).parse().expect("parses");
        let outcome = SliceOrchestrator::new(config)
            .run(&criterion, None)
            .expect("run succeeds");

        assert_eq!(outcome.written.len(), 1);
        let text = fs::read_to_string(&outcome.written[0]).expect("reads");
        assert!(text.starts_with("/*"), "provenance header first");
        assert!(text.contains("int x = 1;"));
        assert!(!text.contains("noise"), "unrelated statement is sliced away");
    }

    #[test]
    fn missing_units_are_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = Config {
            include: vec![],
            output: Some(dir.path().join("out")),
            exception_sensitive: false,
        };
        let criterion: SlicingCriterion = format!("{}/Example.java#4", dir.path().display())
            .parse()
            .expect("parses");
        assert!(SliceOrchestrator::new(config).run(&criterion, None).is_err());
    }
}
