//! Labeled directed multigraph shared by every graph view in the pipeline.
//!
//! One representation serves CFG, PDG and SDG alike: nodes live in an arena
//! addressed by integer id and hold no relationship state of their own; all
//! adjacency belongs to the graph. Arcs are a single tagged variant carrying
//! kind-specific payload, and arc identity is field equality: inserting the
//! same arc twice is a no-op.

use std::fmt;
use std::path::PathBuf;

use rustc_hash::FxHashSet;

use crate::ast::StmtId;

/// Graph-wide node identifier. Unique within a graph; after a merge into the
/// SDG, unique across the whole program and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a node in the dependence graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// An ordinary statement (or predicate) node.
    Statement,
    /// Synthetic `ENTER <method>` root of a method.
    MethodEntry,
    /// Synthetic holder of a method's returned value.
    MethodOutput,
    /// Parameter definition on the callee side.
    FormalIn,
    /// Callee-side output other than the return value. Part of the node
    /// taxonomy; never generated without alias information.
    FormalOut,
    /// Caller-side argument value at a linked call site.
    ActualIn,
    /// Caller-side landing node for a linked call's returned value.
    ActualOut,
    /// Synthetic CFG exit.
    NormalExit,
    /// Synthetic target of uncaught throws (exception-sensitive mode).
    ExceptionalExit,
}

/// Declared / defined / used variable names of a node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VarActions {
    pub declared: FxHashSet<String>,
    pub defined: FxHashSet<String>,
    pub used: FxHashSet<String>,
}

impl VarActions {
    /// True if `name` appears in any of the three sets.
    pub fn mentions(&self, name: &str) -> bool {
        self.declared.contains(name) || self.defined.contains(name) || self.used.contains(name)
    }

    /// Compact `d:.. w:.. r:..` rendering for diagnostics.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        for (tag, set) in [("d", &self.declared), ("w", &self.defined), ("r", &self.used)] {
            if !set.is_empty() {
                let mut names: Vec<&str> = set.iter().map(String::as_str).collect();
                names.sort_unstable();
                parts.push(format!("{tag}:{}", names.join(",")));
            }
        }
        parts.join(" ")
    }
}

/// Link back to the statement a node originates from. Synthetic nodes carry
/// a file and line (their method's declaration) but no statement id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub stmt: Option<StmtId>,
    pub file: PathBuf,
    pub line: u32,
}

/// A node: plain data, no adjacency.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Rendered statement header (or synthetic label such as `ENTER foo`).
    pub label: String,
    /// Originating statement; synthetic nodes borrow the statement of the
    /// construct they were created for.
    pub source: Option<SourceRef>,
    pub vars: VarActions,
}

/// Which way a predicate went; the label of a control-dependency arc.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BranchLabel {
    True,
    False,
    Case(String),
}

impl fmt::Display for BranchLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => f.write_str("true"),
            Self::False => f.write_str("false"),
            Self::Case(label) => f.write_str(label),
        }
    }
}

/// Arc kinds with their payloads. Consumers match exhaustively; there are no
/// runtime downcasts anywhere in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArcKind {
    /// CFG edge. Non-executable arcs augment the CFG for dependency
    /// computation (entry→exit, try→catch) and carry no data flow.
    ControlFlow { executable: bool },
    ControlDependency { branch: Option<BranchLabel> },
    DataDependency { var: String },
    /// Call site → callee entry.
    Call,
    /// Actual-in → formal-in, labeled with the parameter name.
    ParameterIn { var: String },
    /// Method output / formal-out → actual-out.
    ParameterOut { var: String },
    /// Transitive actual-in → actual-out effect of a call.
    Summary,
}

impl ArcKind {
    pub fn is_control_flow(&self) -> bool {
        matches!(self, Self::ControlFlow { .. })
    }

    pub fn is_executable_flow(&self) -> bool {
        matches!(self, Self::ControlFlow { executable: true })
    }

    /// Short name used by the dot export.
    pub fn short_label(&self) -> String {
        match self {
            Self::ControlFlow { executable: true } => String::new(),
            Self::ControlFlow { executable: false } => "nonexec".to_string(),
            Self::ControlDependency { branch: Some(b) } => format!("CD {b}"),
            Self::ControlDependency { branch: None } => "CD".to_string(),
            Self::DataDependency { var } => format!("DD {var}"),
            Self::Call => "call".to_string(),
            Self::ParameterIn { var } => format!("param-in {var}"),
            Self::ParameterOut { var } => format!("param-out {var}"),
            Self::Summary => "summary".to_string(),
        }
    }
}

/// A directed arc. Equality and hashing cover all fields; there is no
/// separate arc identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Arc {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: ArcKind,
}

/// Arena-backed multigraph.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    arcs: Vec<Arc>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(
        &mut self,
        kind: NodeKind,
        label: impl Into<String>,
        source: Option<SourceRef>,
        vars: VarActions,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { id, kind, label: label.into(), source, vars });
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn arcs(&self) -> &[Arc] {
        &self.arcs
    }

    /// Insert an arc unless an identical one exists. Returns whether the
    /// graph changed.
    pub fn add_arc(&mut self, from: NodeId, to: NodeId, kind: ArcKind) -> bool {
        debug_assert!(from.index() < self.nodes.len() && to.index() < self.nodes.len());
        let exists = self.outgoing[from.index()]
            .iter()
            .any(|&i| self.arcs[i].to == to && self.arcs[i].kind == kind);
        if exists {
            return false;
        }
        let idx = self.arcs.len();
        self.arcs.push(Arc { from, to, kind });
        self.outgoing[from.index()].push(idx);
        self.incoming[to.index()].push(idx);
        true
    }

    pub fn has_arc(&self, from: NodeId, to: NodeId, kind: &ArcKind) -> bool {
        self.outgoing[from.index()]
            .iter()
            .any(|&i| self.arcs[i].to == to && self.arcs[i].kind == *kind)
    }

    pub fn outgoing(&self, id: NodeId) -> impl Iterator<Item = &Arc> {
        self.outgoing[id.index()].iter().map(|&i| &self.arcs[i])
    }

    pub fn incoming(&self, id: NodeId) -> impl Iterator<Item = &Arc> {
        self.incoming[id.index()].iter().map(|&i| &self.arcs[i])
    }

    /// Control-flow successors, optionally restricted to executable arcs.
    pub fn flow_successors(&self, id: NodeId, executable_only: bool) -> Vec<NodeId> {
        self.outgoing(id)
            .filter(|arc| {
                if executable_only {
                    arc.kind.is_executable_flow()
                } else {
                    arc.kind.is_control_flow()
                }
            })
            .map(|arc| arc.to)
            .collect()
    }

    /// Control-flow predecessors, optionally restricted to executable arcs.
    pub fn flow_predecessors(&self, id: NodeId, executable_only: bool) -> Vec<NodeId> {
        self.incoming(id)
            .filter(|arc| {
                if executable_only {
                    arc.kind.is_executable_flow()
                } else {
                    arc.kind.is_control_flow()
                }
            })
            .map(|arc| arc.from)
            .collect()
    }

    /// Move every node and arc of `other` into this graph, remapping ids.
    /// Returns the mapping from `other`'s node indices to the new ids.
    pub fn merge(&mut self, other: Graph) -> Vec<NodeId> {
        let offset = self.nodes.len() as u32;
        let mapping: Vec<NodeId> = other
            .nodes
            .iter()
            .map(|n| NodeId(n.id.0 + offset))
            .collect();

        for mut node in other.nodes {
            node.id = NodeId(node.id.0 + offset);
            self.nodes.push(node);
            self.outgoing.push(Vec::new());
            self.incoming.push(Vec::new());
        }
        for arc in other.arcs {
            let from = mapping[arc.from.index()];
            let to = mapping[arc.to.index()];
            self.add_arc(from, to, arc.kind);
        }
        mapping
    }
}
