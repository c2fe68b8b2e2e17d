//! Summary arc computation.
//!
//! A Summary arc actual-in[i] → actual-out at a call site records that the
//! callee's output transitively depends on its i-th parameter, so the slicer
//! can cross the call in one hop instead of descending into the callee.
//!
//! The dependency path inside the callee may itself run through nested calls
//! via their already-computed summary arcs, which makes evaluation order
//! matter: the call graph is condensed into strongly connected components
//! (petgraph's Tarjan, components arriving callees-first) and every
//! component iterates to a fixpoint, so recursion and mutual recursion
//! converge instead of under-approximating.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::graph::{ArcKind, NodeId};
use crate::sdg::Sdg;

/// Computes all summary arcs of a linked SDG.
#[derive(Debug)]
pub struct SummaryArcBuilder<'a> {
    sdg: &'a mut Sdg,
}

impl<'a> SummaryArcBuilder<'a> {
    pub fn new(sdg: &'a mut Sdg) -> Self {
        Self { sdg }
    }

    pub fn build(mut self) {
        let mut graph: DiGraph<String, ()> = DiGraph::new();
        let mut indices: FxHashMap<String, NodeIndex> = FxHashMap::default();
        for info in self.sdg.methods() {
            let idx = graph.add_node(info.key.clone());
            indices.insert(info.key.clone(), idx);
        }
        for site in self.sdg.call_sites() {
            let (from, to) = (indices[&site.caller], indices[&site.callee]);
            if !graph.contains_edge(from, to) {
                graph.add_edge(from, to, ());
            }
        }

        // Components come out in reverse topological order of the
        // condensation: callees before their callers.
        let mut total = 0usize;
        for component in tarjan_scc(&graph) {
            let members: FxHashSet<&str> =
                component.iter().map(|&idx| graph[idx].as_str()).collect();
            loop {
                let mut changed = false;
                for &idx in &component {
                    changed |= self.summarize_method(&graph[idx].clone(), &members, &mut total);
                }
                if !changed {
                    break;
                }
            }
        }
        log::debug!("summary arcs: {total} inserted");
    }

    /// Add the summary arcs every call site targeting `callee` is entitled
    /// to. Returns whether an arc inside the current component was added
    /// (which can enable further paths there).
    fn summarize_method(
        &mut self,
        callee: &str,
        component: &FxHashSet<&str>,
        total: &mut usize,
    ) -> bool {
        let Some(info) = self.sdg.method(callee) else {
            return false;
        };
        let Some(output) = info.output else {
            return false;
        };
        let formal_ins = info.formal_ins.clone();
        let reach = self.backward_dependency_closure(output);

        let sites: Vec<(Vec<NodeId>, Option<NodeId>, String)> = self
            .sdg
            .call_sites()
            .iter()
            .filter(|site| site.callee == callee)
            .map(|site| (site.actual_ins.clone(), site.actual_out, site.caller.clone()))
            .collect();

        let mut changed = false;
        for (actual_ins, actual_out, caller) in sites {
            let Some(actual_out) = actual_out else {
                continue;
            };
            for (i, actual_in) in actual_ins.iter().enumerate() {
                let Some((_, formal_in)) = formal_ins.get(i) else {
                    continue;
                };
                if !reach.contains(formal_in) {
                    continue;
                }
                if self.sdg.graph.add_arc(*actual_in, actual_out, ArcKind::Summary) {
                    *total += 1;
                    if component.contains(caller.as_str()) {
                        changed = true;
                    }
                }
            }
        }
        changed
    }

    /// Nodes with a dependency path to `from`, following control, data and
    /// summary arcs backward. Parameter arcs are never crossed, so the
    /// closure stays inside one method and its call-site boundary nodes.
    fn backward_dependency_closure(&self, from: NodeId) -> FxHashSet<NodeId> {
        let mut visited: FxHashSet<NodeId> = FxHashSet::default();
        let mut worklist = vec![from];
        visited.insert(from);
        while let Some(node) = worklist.pop() {
            for arc in self.sdg.graph.incoming(node) {
                let follow = matches!(
                    arc.kind,
                    ArcKind::ControlDependency { .. }
                        | ArcKind::DataDependency { .. }
                        | ArcKind::Summary
                );
                if follow && visited.insert(arc.from) {
                    worklist.push(arc.from);
                }
            }
        }
        visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast_builder as b;
    use crate::ast_indexer::AstIndexer;
    use crate::sdg::SdgBuilder;

    fn build(program: &mut crate::ast::Program) -> Sdg {
        AstIndexer::new().index_program(program);
        SdgBuilder::new(false).build(program)
    }

    fn summary_arcs(sdg: &Sdg) -> Vec<(NodeId, NodeId)> {
        sdg.graph
            .arcs()
            .iter()
            .filter(|a| a.kind == ArcKind::Summary)
            .map(|a| (a.from, a.to))
            .collect()
    }

    /// `bar(int p) { return p + 1; }`: the output depends on p, so the call
    /// site gets a summary arc from its only actual-in.
    #[test]
    fn direct_dependency_produces_summary_arc() {
        let mut program = b::program(b::unit(
            "Example.java",
            vec![b::class(
                "Example",
                vec![
                    b::method(
                        "foo",
                        1,
                        vec![],
                        vec![b::decl(
                            2,
                            "int",
                            "x",
                            Some(b::call_resolved("bar", "Example.bar", vec![b::lit("5")])),
                        )],
                    ),
                    b::method_returning(
                        "bar",
                        4,
                        vec![b::param("int", "p")],
                        "int",
                        vec![b::ret(5, Some(b::bin("+", b::name("p"), b::lit("1"))))],
                    ),
                ],
            )],
        ));
        let sdg = build(&mut program);

        let site = &sdg.call_sites()[0];
        assert_eq!(
            summary_arcs(&sdg),
            vec![(site.actual_ins[0], site.actual_out.expect("value used"))]
        );
    }

    /// The constant-returning parameter-ignoring callee must NOT produce a
    /// summary arc.
    #[test]
    fn unused_parameter_produces_no_summary_arc() {
        let mut program = b::program(b::unit(
            "Example.java",
            vec![b::class(
                "Example",
                vec![
                    b::method(
                        "foo",
                        1,
                        vec![],
                        vec![b::decl(
                            2,
                            "int",
                            "x",
                            Some(b::call_resolved("k", "Example.k", vec![b::name("a")])),
                        )],
                    ),
                    b::method_returning(
                        "k",
                        4,
                        vec![b::param("int", "ignored")],
                        "int",
                        vec![b::ret(5, Some(b::lit("42")))],
                    ),
                ],
            )],
        ));
        let sdg = build(&mut program);
        assert!(summary_arcs(&sdg).is_empty());
    }

    /// Transitivity through a nested call: outer's output depends on its
    /// parameter only through inner's summary arc.
    #[test]
    fn summary_arcs_compose_through_nested_calls() {
        let mut program = b::program(b::unit(
            "Example.java",
            vec![b::class(
                "Example",
                vec![
                    b::method(
                        "main",
                        1,
                        vec![],
                        vec![b::decl(
                            2,
                            "int",
                            "r",
                            Some(b::call_resolved("outer", "Example.outer", vec![b::lit("3")])),
                        )],
                    ),
                    b::method_returning(
                        "outer",
                        4,
                        vec![b::param("int", "a")],
                        "int",
                        vec![b::ret(
                            5,
                            Some(b::call_resolved("inner", "Example.inner", vec![b::name("a")])),
                        )],
                    ),
                    b::method_returning(
                        "inner",
                        7,
                        vec![b::param("int", "b")],
                        "int",
                        vec![b::ret(8, Some(b::bin("*", b::name("b"), b::lit("2"))))],
                    ),
                ],
            )],
        ));
        let sdg = build(&mut program);

        let outer_site = sdg
            .call_sites()
            .iter()
            .find(|s| s.callee == "Example.outer")
            .expect("call to outer");
        assert!(summary_arcs(&sdg).contains(&(
            outer_site.actual_ins[0],
            outer_site.actual_out.expect("value used")
        )));
    }

    /// A recursive method terminates with a converged summary set.
    #[test]
    fn recursion_converges() {
        // fact(int n) { if (n > 0) { return n * fact(n - 1); } return 1; }
        let mut program = b::program(b::unit(
            "Example.java",
            vec![b::class(
                "Example",
                vec![
                    b::method(
                        "main",
                        1,
                        vec![],
                        vec![b::decl(
                            2,
                            "int",
                            "f",
                            Some(b::call_resolved("fact", "Example.fact", vec![b::lit("5")])),
                        )],
                    ),
                    b::method_returning(
                        "fact",
                        4,
                        vec![b::param("int", "n")],
                        "int",
                        vec![
                            b::if_then(
                                5,
                                b::bin(">", b::name("n"), b::lit("0")),
                                vec![b::ret(
                                    6,
                                    Some(b::bin(
                                        "*",
                                        b::name("n"),
                                        b::call_resolved(
                                            "fact",
                                            "Example.fact",
                                            vec![b::bin("-", b::name("n"), b::lit("1"))],
                                        ),
                                    )),
                                )],
                            ),
                            b::ret(7, Some(b::lit("1"))),
                        ],
                    ),
                ],
            )],
        ));
        let sdg = build(&mut program);

        // Both the outer call in main and the recursive call inside fact
        // carry the n → result summary.
        for site in sdg.call_sites() {
            assert!(
                summary_arcs(&sdg)
                    .contains(&(site.actual_ins[0], site.actual_out.expect("value used"))),
                "missing summary arc at call site in {}",
                site.caller
            );
        }
    }
}
