//! Slicing criterion: textual grammar and resolution to SDG nodes.
//!
//! Grammar: `file#line[:var1,var2,...[!occ1,occ2,...]]`. Occurrence numbers
//! default to 1 and, when given, must match the variable list in length.
//! Parsing is validated up front so a malformed criterion fails before any
//! graph work happens.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::graph::{NodeId, NodeKind};
use crate::sdg::Sdg;

fn criterion_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let file = r"(?P<file>[^#]+)";
        let line = r"(?P<line>[1-9]\d*)";
        let vars = r"(?P<vars>[a-zA-Z_]\w*(?:,[a-zA-Z_]\w*)*)";
        let nums = r"(?P<nums>[1-9]\d*(?:,[1-9]\d*)*)";
        Regex::new(&format!("^{file}#{line}(?::{vars}(?:!{nums})?)?$"))
            .expect("criterion pattern is valid")
    })
}

/// Errors raised while reading the criterion string, before any analysis.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CriterionParseError {
    #[error("invalid slicing criterion {0:?}: expected file#line[:var1,var2,...[!occ1,occ2,...]]")]
    InvalidFormat(String),
    #[error("{variables} variable(s) but {occurrences} occurrence number(s): they must match")]
    CountMismatch { variables: usize, occurrences: usize },
    #[error("number out of range in slicing criterion: {0}")]
    NumberOutOfRange(String),
}

/// Recoverable slicing failures, distinct from criterion-string errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SliceError {
    #[error("no statement at or after line {line} of {}", file.display())]
    CriterionNotFound { file: PathBuf, line: u32 },
    #[error(
        "variable {var} has {found} occurrence(s) in {}, occurrence {requested} requested",
        file.display()
    )]
    OccurrenceOutOfRange {
        var: String,
        file: PathBuf,
        found: usize,
        requested: u32,
    },
}

/// A parsed slicing criterion: program point plus optional variable
/// occurrences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlicingCriterion {
    pub file: PathBuf,
    pub line: u32,
    /// (variable name, 1-based occurrence), in the order given.
    pub vars: Vec<(String, u32)>,
}

impl FromStr for SlicingCriterion {
    type Err = CriterionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = criterion_pattern()
            .captures(s)
            .ok_or_else(|| CriterionParseError::InvalidFormat(s.to_string()))?;

        let file = PathBuf::from(&captures["file"]);
        let line: u32 = captures["line"]
            .parse()
            .map_err(|_| CriterionParseError::NumberOutOfRange(captures["line"].to_string()))?;

        let names: Vec<String> = captures
            .name("vars")
            .map(|m| m.as_str().split(',').map(str::to_string).collect())
            .unwrap_or_default();
        let occurrences: Vec<u32> = match captures.name("nums") {
            Some(m) => m
                .as_str()
                .split(',')
                .map(|n| {
                    n.parse()
                        .map_err(|_| CriterionParseError::NumberOutOfRange(n.to_string()))
                })
                .collect::<Result<_, _>>()?,
            None => vec![1; names.len()],
        };
        if names.len() != occurrences.len() {
            return Err(CriterionParseError::CountMismatch {
                variables: names.len(),
                occurrences: occurrences.len(),
            });
        }

        Ok(Self {
            file,
            line,
            vars: names.into_iter().zip(occurrences).collect(),
        })
    }
}

impl fmt::Display for SlicingCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.file.display(), self.line)?;
        if !self.vars.is_empty() {
            let names: Vec<&str> = self.vars.iter().map(|(n, _)| n.as_str()).collect();
            let nums: Vec<String> = self.vars.iter().map(|(_, o)| o.to_string()).collect();
            write!(f, ":{}!{}", names.join(","), nums.join(","))?;
        }
        Ok(())
    }
}

/// Maps a parsed criterion onto concrete SDG nodes.
#[derive(Debug)]
pub struct CriterionResolver<'a> {
    sdg: &'a Sdg,
}

impl<'a> CriterionResolver<'a> {
    pub fn new(sdg: &'a Sdg) -> Self {
        Self { sdg }
    }

    /// Resolve to one node per requested variable, or the first statement at
    /// or after the line when no variables were given. Only Statement nodes
    /// are candidates; synthetic nodes never match a criterion.
    pub fn resolve(&self, criterion: &SlicingCriterion) -> Result<Vec<NodeId>, SliceError> {
        let mut file_nodes: Vec<(u32, NodeId)> = self
            .sdg
            .graph
            .nodes()
            .filter(|n| n.kind == NodeKind::Statement)
            .filter_map(|n| {
                let source = n.source.as_ref()?;
                paths_match(&source.file, &criterion.file).then_some((source.line, n.id))
            })
            .collect();
        file_nodes.sort_unstable();

        let at_or_after: Vec<NodeId> = file_nodes
            .iter()
            .filter(|&&(line, _)| line >= criterion.line)
            .map(|&(_, id)| id)
            .collect();
        if at_or_after.is_empty() {
            return Err(SliceError::CriterionNotFound {
                file: criterion.file.clone(),
                line: criterion.line,
            });
        }

        if criterion.vars.is_empty() {
            return Ok(vec![at_or_after[0]]);
        }

        let mut nodes = Vec::with_capacity(criterion.vars.len());
        for (var, occurrence) in &criterion.vars {
            // Occurrences are counted from the top of the file, in source
            // order.
            let matches: Vec<NodeId> = file_nodes
                .iter()
                .filter(|&&(_, id)| self.sdg.graph.node(id).vars.mentions(var))
                .map(|&(_, id)| id)
                .collect();
            let index = *occurrence as usize - 1;
            match matches.get(index) {
                Some(&id) => nodes.push(id),
                None => {
                    return Err(SliceError::OccurrenceOutOfRange {
                        var: var.clone(),
                        file: criterion.file.clone(),
                        found: matches.len(),
                        requested: *occurrence,
                    });
                }
            }
        }
        Ok(nodes)
    }
}

/// A criterion file matches a unit either exactly or as a path suffix, so
/// `Example.java` finds `src/Example.java`.
fn paths_match(node_file: &Path, criterion_file: &Path) -> bool {
    node_file == criterion_file || node_file.ends_with(criterion_file)
}
