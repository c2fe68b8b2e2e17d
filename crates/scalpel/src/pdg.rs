//! Program dependence graph construction.
//!
//! Takes a finished [`MethodCfg`] and adds dependency arcs on top of the
//! control-flow arcs:
//!
//! - control dependencies via immediate post-dominators of the augmented CFG
//!   (the non-executable entry→exit arc makes the method entry the implicit
//!   root);
//! - data dependencies via reaching definitions, a forward fixpoint over the
//!   executable control-flow arcs;
//! - for non-void methods, a synthetic `output` node fed by every
//!   value-carrying return statement.

use std::path::PathBuf;

use rustc_hash::FxHashSet;

use crate::cfg::MethodCfg;
use crate::graph::{ArcKind, Graph, NodeId, NodeKind, SourceRef, VarActions};

/// Label of the pseudo-variable carrying a method's returned value.
pub const OUTPUT_VAR: &str = "-output-";

/// A per-method PDG ready to be merged into the SDG.
#[derive(Debug)]
pub struct MethodPdg {
    pub graph: Graph,
    pub key: String,
    pub file: PathBuf,
    pub entry: NodeId,
    pub exit: NodeId,
    pub exceptional_exit: Option<NodeId>,
    pub formal_ins: Vec<(String, NodeId)>,
    /// Synthetic output node; `None` for void methods.
    pub output: Option<NodeId>,
}

/// Derives control- and data-dependency arcs over a CFG.
#[derive(Debug)]
pub struct PdgBuilder {
    cfg: MethodCfg,
}

impl PdgBuilder {
    pub fn new(cfg: MethodCfg) -> Self {
        Self { cfg }
    }

    pub fn build(mut self) -> MethodPdg {
        log::debug!("building PDG for {}", self.cfg.key);

        let ipdom = self.immediate_postdominators();
        self.add_control_dependencies(&ipdom);
        self.add_data_dependencies();
        self.add_thrown_value_dependencies();
        let output = self.add_method_output();

        let MethodCfg {
            graph,
            key,
            file,
            entry,
            exit,
            exceptional_exit,
            formal_ins,
            ..
        } = self.cfg;
        MethodPdg {
            graph,
            key,
            file,
            entry,
            exit,
            exceptional_exit,
            formal_ins,
            output,
        }
    }

    /// Immediate post-dominators of every node, computed as immediate
    /// dominators of the reverse CFG rooted at the exit (iterative dominance
    /// over a reverse-postorder worklist). All control-flow arcs participate,
    /// including non-executable ones.
    fn immediate_postdominators(&self) -> Vec<Option<NodeId>> {
        let graph = &self.cfg.graph;
        let n = graph.node_count();
        let root = self.cfg.exit;

        // Postorder of the reverse graph (edges flipped: exit is the root and
        // CFG predecessors are its children).
        let mut postorder: Vec<NodeId> = Vec::with_capacity(n);
        let mut order_index: Vec<Option<usize>> = vec![None; n];
        let mut visited = vec![false; n];
        let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];
        visited[root.index()] = true;
        while let Some(&mut (node, ref mut child)) = stack.last_mut() {
            let preds = graph.flow_predecessors(node, false);
            if *child < preds.len() {
                let next = preds[*child];
                *child += 1;
                if !visited[next.index()] {
                    visited[next.index()] = true;
                    stack.push((next, 0));
                }
            } else {
                order_index[node.index()] = Some(postorder.len());
                postorder.push(node);
                stack.pop();
            }
        }

        // Every node reaches the exit by construction; anything unvisited is
        // disconnected and keeps `None`.
        let mut ipdom: Vec<Option<NodeId>> = vec![None; n];
        ipdom[root.index()] = Some(root);

        let intersect = |ipdom: &[Option<NodeId>], mut a: NodeId, mut b: NodeId| -> NodeId {
            while a != b {
                while order_index[a.index()] < order_index[b.index()] {
                    a = ipdom[a.index()].expect("processed node has a post-dominator");
                }
                while order_index[b.index()] < order_index[a.index()] {
                    b = ipdom[b.index()].expect("processed node has a post-dominator");
                }
            }
            a
        };

        let mut changed = true;
        while changed {
            changed = false;
            // Reverse postorder of the reverse graph.
            for &node in postorder.iter().rev() {
                if node == root {
                    continue;
                }
                // Predecessors in the reverse graph are CFG successors.
                let mut new_ipdom: Option<NodeId> = None;
                for succ in graph.flow_successors(node, false) {
                    if ipdom[succ.index()].is_none() {
                        continue;
                    }
                    new_ipdom = Some(match new_ipdom {
                        None => succ,
                        Some(current) => intersect(&ipdom, succ, current),
                    });
                }
                if new_ipdom.is_some() && ipdom[node.index()] != new_ipdom {
                    ipdom[node.index()] = new_ipdom;
                    changed = true;
                }
            }
        }
        ipdom
    }

    /// Classic post-dominance-frontier marking: for every predicate arc B→S,
    /// each node on the post-dominator chain from S up to (excluding)
    /// ipdom(B) is control-dependent on B, labeled with the branch of B→S.
    fn add_control_dependencies(&mut self, ipdom: &[Option<NodeId>]) {
        let node_ids: Vec<NodeId> = self.cfg.graph.nodes().map(|n| n.id).collect();
        let mut deps: Vec<(NodeId, NodeId, Option<crate::graph::BranchLabel>)> = Vec::new();

        for &b in &node_ids {
            let succs = self.cfg.graph.flow_successors(b, false);
            if succs.len() < 2 {
                continue;
            }
            let stop = ipdom[b.index()];
            for s in succs {
                let label = self.cfg.branch_labels.get(&(b, s)).cloned();
                let mut x = Some(s);
                while let Some(current) = x {
                    if Some(current) == stop {
                        break;
                    }
                    // Loop headers would depend on themselves through their
                    // back edge; the dependency relation stays a DAG.
                    if current != b {
                        deps.push((b, current, label.clone()));
                    }
                    let next = ipdom[current.index()];
                    if next == Some(current) {
                        break;
                    }
                    x = next;
                }
            }
        }
        for (from, to, branch) in deps {
            self.cfg.graph.add_arc(from, to, ArcKind::ControlDependency { branch });
        }

        // Anything still ungoverned hangs directly off the entry node.
        let entry = self.cfg.entry;
        let orphans: Vec<NodeId> = self
            .cfg
            .graph
            .nodes()
            .filter(|n| {
                n.id != entry
                    && n.id != self.cfg.exit
                    && !self
                        .cfg
                        .graph
                        .incoming(n.id)
                        .any(|arc| matches!(arc.kind, ArcKind::ControlDependency { .. }))
            })
            .map(|n| n.id)
            .collect();
        for node in orphans {
            self.cfg
                .graph
                .add_arc(entry, node, ArcKind::ControlDependency { branch: None });
        }
    }

    /// Reaching definitions over executable arcs, then one data-dependency
    /// arc per (definition, use) pair with a definition-clear path.
    fn add_data_dependencies(&mut self) {
        type Defs = FxHashSet<(String, NodeId)>;

        let graph = &self.cfg.graph;
        let n = graph.node_count();
        let mut out_sets: Vec<Defs> = vec![Defs::default(); n];

        // Worklist seeded with every node; order does not affect the fixpoint.
        let mut worklist: Vec<NodeId> = graph.nodes().map(|n| n.id).collect();
        let mut queued = vec![true; n];

        while let Some(node) = worklist.pop() {
            queued[node.index()] = false;

            let mut in_set = Defs::default();
            for pred in graph.flow_predecessors(node, true) {
                in_set.extend(out_sets[pred.index()].iter().cloned());
            }

            let defined = &graph.node(node).vars.defined;
            let mut out_set: Defs = in_set
                .iter()
                .filter(|(var, _)| !defined.contains(var))
                .cloned()
                .collect();
            for var in defined {
                out_set.insert((var.clone(), node));
            }

            if out_set != out_sets[node.index()] {
                out_sets[node.index()] = out_set;
                for succ in graph.flow_successors(node, true) {
                    if !queued[succ.index()] {
                        queued[succ.index()] = true;
                        worklist.push(succ);
                    }
                }
            }
        }

        // A definition reaches a use if it is in the IN set of the using node.
        let mut arcs: Vec<(NodeId, NodeId, String)> = Vec::new();
        for node in graph.nodes() {
            if node.vars.used.is_empty() {
                continue;
            }
            let mut in_set = Defs::default();
            for pred in graph.flow_predecessors(node.id, true) {
                in_set.extend(out_sets[pred.index()].iter().cloned());
            }
            for (var, def_site) in in_set {
                if node.vars.used.contains(&var) {
                    arcs.push((def_site, node.id, var));
                }
            }
        }
        for (from, to, var) in arcs {
            self.cfg.graph.add_arc(from, to, ArcKind::DataDependency { var });
        }
    }

    /// Exception-sensitive mode: the thrown value flows into the catch
    /// binding.
    fn add_thrown_value_dependencies(&mut self) {
        let links = std::mem::take(&mut self.cfg.catch_links);
        for (throw, catch_entry) in links {
            let var = self
                .cfg
                .graph
                .node(catch_entry)
                .vars
                .declared
                .iter()
                .next()
                .cloned();
            if let Some(var) = var {
                self.cfg
                    .graph
                    .add_arc(throw, catch_entry, ArcKind::DataDependency { var });
            }
        }
    }

    /// Non-void methods get an `output` node, control-dependent on the entry
    /// and data-dependent on every value-carrying return.
    fn add_method_output(&mut self) -> Option<NodeId> {
        if self.cfg.is_void {
            return None;
        }
        let source = self
            .cfg
            .graph
            .node(self.cfg.entry)
            .source
            .clone()
            .map(|s| SourceRef { stmt: None, ..s });
        let output = self.cfg.graph.add_node(
            NodeKind::MethodOutput,
            "output",
            source,
            VarActions::default(),
        );
        self.cfg
            .graph
            .add_arc(self.cfg.entry, output, ArcKind::ControlDependency { branch: None });
        let returns = self.cfg.returns.clone();
        for (node, has_value) in returns {
            if has_value {
                self.cfg.graph.add_arc(
                    node,
                    output,
                    ArcKind::DataDependency { var: OUTPUT_VAR.to_string() },
                );
            }
        }
        Some(output)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::ast_builder as b;
    use crate::cfg::CfgBuilder;
    use crate::graph::BranchLabel;

    fn build_pdg(method: crate::ast::MethodDecl) -> MethodPdg {
        let mut program = b::program(b::unit("Test.java", vec![b::class("Test", vec![method])]));
        crate::ast_indexer::AstIndexer::new().index_program(&mut program);
        let method = &program.units[0].types[0].methods[0];
        let cfg = CfgBuilder::build(method, "Test", Path::new("Test.java"), false);
        PdgBuilder::new(cfg).build()
    }

    fn node_at_line(pdg: &MethodPdg, line: u32) -> NodeId {
        pdg.graph
            .nodes()
            .find(|n| {
                n.kind == NodeKind::Statement
                    && n.source.as_ref().is_some_and(|s| s.line == line)
            })
            .map(|n| n.id)
            .expect("no node at line")
    }

    fn control_dep_label(pdg: &MethodPdg, from: NodeId, to: NodeId) -> Option<BranchLabel> {
        pdg.graph
            .outgoing(from)
            .find_map(|arc| match (&arc.kind, arc.to) {
                (ArcKind::ControlDependency { branch }, t) if t == to => Some(branch.clone()),
                _ => None,
            })
            .expect("no control dependency arc")
    }

    /// `if (c) { a; } else { b; } d;`: a and b depend on the predicate with
    /// opposite labels, d does not (it post-dominates the predicate).
    #[test]
    fn branches_depend_on_predicate_with_opposite_labels() {
        let pdg = build_pdg(b::method(
            "m",
            1,
            vec![b::param("boolean", "c")],
            vec![
                b::if_else(
                    2,
                    b::name("c"),
                    vec![b::expr_stmt(3, b::assign("a", b::lit("1")))],
                    vec![b::expr_stmt(5, b::assign("b", b::lit("2")))],
                ),
                b::expr_stmt(6, b::assign("d", b::lit("3"))),
            ],
        ));

        let cond = node_at_line(&pdg, 2);
        let a = node_at_line(&pdg, 3);
        let bb = node_at_line(&pdg, 5);
        let d = node_at_line(&pdg, 6);

        assert_eq!(control_dep_label(&pdg, cond, a), Some(BranchLabel::True));
        assert_eq!(control_dep_label(&pdg, cond, bb), Some(BranchLabel::False));
        assert!(!pdg.graph.outgoing(cond).any(|arc| {
            matches!(arc.kind, ArcKind::ControlDependency { .. }) && arc.to == d
        }));
        // d is governed by the entry instead.
        assert!(pdg.graph.incoming(d).any(|arc| {
            matches!(arc.kind, ArcKind::ControlDependency { .. }) && arc.from == pdg.entry
        }));
    }

    #[test]
    fn reaching_definition_is_killed_by_redefinition() {
        let pdg = build_pdg(b::method(
            "m",
            1,
            vec![],
            vec![
                b::decl(2, "int", "x", Some(b::lit("1"))),
                b::expr_stmt(3, b::assign("x", b::lit("2"))),
                b::expr_stmt(4, b::assign("y", b::name("x"))),
            ],
        ));

        let first = node_at_line(&pdg, 2);
        let second = node_at_line(&pdg, 3);
        let use_site = node_at_line(&pdg, 4);

        let x_dep = ArcKind::DataDependency { var: "x".to_string() };
        assert!(pdg.graph.has_arc(second, use_site, &x_dep));
        assert!(!pdg.graph.has_arc(first, use_site, &x_dep));
    }

    /// A definition at the bottom of a loop body reaches the use at the top
    /// of the next iteration through the back edge.
    #[test]
    fn loop_back_edge_carries_definitions() {
        let pdg = build_pdg(b::method(
            "m",
            1,
            vec![b::param("int", "n")],
            vec![
                b::decl(2, "int", "s", Some(b::lit("0"))),
                b::while_loop(
                    3,
                    b::bin("<", b::name("s"), b::name("n")),
                    vec![b::expr_stmt(4, b::compound_assign("s", "+", b::lit("1")))],
                ),
                b::ret(5, Some(b::name("s"))),
            ],
        ));

        let body = node_at_line(&pdg, 4);
        let cond = node_at_line(&pdg, 3);
        let s_dep = ArcKind::DataDependency { var: "s".to_string() };
        assert!(pdg.graph.has_arc(body, cond, &s_dep));
        assert!(pdg.graph.has_arc(body, body, &s_dep));
    }

    #[test]
    fn returns_feed_the_method_output() {
        let pdg = build_pdg(b::method_returning(
            "m",
            1,
            vec![b::param("int", "p")],
            "int",
            vec![b::ret(2, Some(b::bin("+", b::name("p"), b::lit("1"))))],
        ));

        let output = pdg.output.expect("non-void method has an output node");
        let ret = node_at_line(&pdg, 2);
        assert!(pdg.graph.has_arc(
            ret,
            output,
            &ArcKind::DataDependency { var: OUTPUT_VAR.to_string() }
        ));
        assert!(pdg.graph.has_arc(
            pdg.entry,
            output,
            &ArcKind::ControlDependency { branch: None }
        ));
    }
}
