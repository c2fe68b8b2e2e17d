//! Two-phase backward slicing over a linked SDG.
//!
//! Both phases are plain worklist loops over explicit visited sets:
//!
//! - phase 1 walks ControlDependency, DataDependency, Summary, ParameterIn
//!   and Call arcs backward, everything except ParameterOut, so the
//!   traversal ascends into callers and crosses calls via summaries but
//!   never jumps from a callee body to an unrelated caller's actual-out;
//! - phase 2 starts from the full phase-1 set and walks everything except
//!   ParameterIn and Call, descending into callees whose outputs matter.
//!
//! The union (the phase-2 closure) is the slice. Splitting the traversal
//! this way is what keeps calling contexts apart: a single unrestricted
//! backward closure would leak dependencies between distinct call sites of
//! a shared callee.

use indexmap::IndexSet;
use rustc_hash::FxHashSet;

use crate::ast::StmtId;
use crate::graph::{ArcKind, NodeId};
use crate::sdg::Sdg;

/// Direction restriction of a traversal pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    /// Phase 1: may ascend to callers, never descends through actual-outs.
    Ascend,
    /// Phase 2: may descend into callees, never re-ascends.
    Descend,
}

fn follows(kind: &ArcKind, pass: Pass) -> bool {
    match kind {
        ArcKind::ControlDependency { .. } | ArcKind::DataDependency { .. } | ArcKind::Summary => {
            true
        }
        ArcKind::ParameterIn { .. } | ArcKind::Call => pass == Pass::Ascend,
        ArcKind::ParameterOut { .. } => pass == Pass::Descend,
        ArcKind::ControlFlow { .. } => false,
    }
}

/// An immutable slicing result: the member node ids plus the criterion they
/// were computed from.
#[derive(Debug)]
pub struct Slice {
    criterion: Vec<NodeId>,
    nodes: IndexSet<NodeId>,
}

impl Slice {
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    pub fn is_criterion(&self, node: NodeId) -> bool {
        self.criterion.contains(&node)
    }

    pub fn criterion_nodes(&self) -> &[NodeId] {
        &self.criterion
    }

    /// Member nodes in discovery order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Statement ids of the member nodes, the unit of projection.
    pub fn statements(&self, sdg: &Sdg) -> FxHashSet<StmtId> {
        self.nodes
            .iter()
            .filter_map(|&id| sdg.graph.node(id).source.as_ref().and_then(|s| s.stmt))
            .collect()
    }

    /// Method keys touched by the slice.
    pub fn methods<'a>(&self, sdg: &'a Sdg) -> FxHashSet<&'a str> {
        self.nodes
            .iter()
            .filter_map(|&id| sdg.method_of(id))
            .collect()
    }
}

/// Read-only slicing executor over a finished SDG.
#[derive(Debug)]
pub struct Slicer<'a> {
    sdg: &'a Sdg,
}

impl<'a> Slicer<'a> {
    pub fn new(sdg: &'a Sdg) -> Self {
        debug_assert!(sdg.is_linked(), "slicing requires a linked SDG");
        Self { sdg }
    }

    /// Compute the backward slice from the given criterion nodes.
    pub fn slice(&self, criterion: &[NodeId]) -> Slice {
        let phase1 = self.backward_pass(criterion.iter().copied(), Pass::Ascend);
        log::debug!("phase 1 reached {} nodes", phase1.len());
        let phase2 = self.backward_pass(phase1.iter().copied(), Pass::Descend);
        log::debug!("phase 2 reached {} nodes", phase2.len());

        Slice { criterion: criterion.to_vec(), nodes: phase2 }
    }

    fn backward_pass(&self, seeds: impl Iterator<Item = NodeId>, pass: Pass) -> IndexSet<NodeId> {
        let mut visited: IndexSet<NodeId> = IndexSet::new();
        let mut worklist: Vec<NodeId> = Vec::new();
        for seed in seeds {
            if visited.insert(seed) {
                worklist.push(seed);
            }
        }
        while let Some(node) = worklist.pop() {
            for arc in self.sdg.graph.incoming(node) {
                if follows(&arc.kind, pass) && visited.insert(arc.from) {
                    worklist.push(arc.from);
                }
            }
        }
        visited
    }
}
