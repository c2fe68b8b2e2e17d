//! System dependence graph: the union of every method's PDG plus the
//! interprocedural arcs connecting them.
//!
//! Per-method graphs are built independently and merged afterwards
//! ("build-then-merge"); the merge remaps node ids into the global id space,
//! so ids are unique across the whole program. Once built and linked, the
//! SDG is read-only; slicing requests only traverse it.

use std::path::PathBuf;

use rustc_hash::FxHashMap;

use crate::ast::{CallExpr, CallTarget, Expr, Program, Stmt, StmtId, StmtKind};
use crate::cfg::CfgBuilder;
use crate::graph::{ArcKind, Graph, NodeId, NodeKind, VarActions};
use crate::pdg::{MethodPdg, OUTPUT_VAR, PdgBuilder};
use crate::summary::SummaryArcBuilder;
use crate::vars;

/// Per-method registry entry.
#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub key: String,
    pub file: PathBuf,
    pub entry: NodeId,
    /// Parameter name and formal-in node, in declaration order.
    pub formal_ins: Vec<(String, NodeId)>,
    /// `None` for void methods.
    pub output: Option<NodeId>,
}

/// One linked call site: the expansion of a resolved call expression.
#[derive(Debug, Clone)]
pub struct CallSite {
    /// Statement node containing the call expression.
    pub call_node: NodeId,
    /// Key of the method the call appears in.
    pub caller: String,
    /// Key of the resolved callee.
    pub callee: String,
    /// Actual-in nodes, one per argument in order.
    pub actual_ins: Vec<NodeId>,
    /// Actual-out node; present only when the call's value is used and the
    /// callee returns one.
    pub actual_out: Option<NodeId>,
}

/// The system dependence graph.
#[derive(Debug, Default)]
pub struct Sdg {
    pub graph: Graph,
    methods: FxHashMap<String, MethodInfo>,
    call_sites: Vec<CallSite>,
    node_method: FxHashMap<NodeId, String>,
    stmt_nodes: FxHashMap<StmtId, NodeId>,
    linked: bool,
}

impl Sdg {
    pub fn method(&self, key: &str) -> Option<&MethodInfo> {
        self.methods.get(key)
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodInfo> {
        self.methods.values()
    }

    pub fn call_sites(&self) -> &[CallSite] {
        &self.call_sites
    }

    /// Key of the method a node belongs to.
    pub fn method_of(&self, node: NodeId) -> Option<&str> {
        self.node_method.get(&node).map(String::as_str)
    }

    /// Graph node of a statement (or case/catch entry).
    pub fn node_of_stmt(&self, stmt: StmtId) -> Option<NodeId> {
        self.stmt_nodes.get(&stmt).copied()
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }

    /// Merge a finished per-method PDG, remapping its node ids.
    fn merge_pdg(&mut self, pdg: MethodPdg) {
        let MethodPdg { graph, key, file, entry, formal_ins, output, .. } = pdg;
        let mapping = self.graph.merge(graph);

        for &id in &mapping {
            self.node_method.insert(id, key.clone());
            if let Some(stmt) = self.graph.node(id).source.as_ref().and_then(|s| s.stmt) {
                self.stmt_nodes.insert(stmt, id);
            }
        }

        let info = MethodInfo {
            key: key.clone(),
            file,
            entry: mapping[entry.index()],
            formal_ins: formal_ins
                .into_iter()
                .map(|(name, id)| (name, mapping[id.index()]))
                .collect(),
            output: output.map(|id| mapping[id.index()]),
        };
        log::debug!("merged PDG of {key}: entry at node {}", info.entry);
        self.methods.insert(key, info);
    }
}

/// Builds a fully linked SDG from an indexed program.
#[derive(Debug)]
pub struct SdgBuilder {
    exception_sensitive: bool,
}

impl SdgBuilder {
    pub fn new(exception_sensitive: bool) -> Self {
        Self { exception_sensitive }
    }

    pub fn build(&self, program: &Program) -> Sdg {
        // Per-method PDGs share nothing; the merge below is the only step
        // that touches the global graph.
        let mut pdgs: Vec<MethodPdg> = Vec::new();
        for unit in &program.units {
            for ty in &unit.types {
                for method in &ty.methods {
                    let cfg =
                        CfgBuilder::build(method, &ty.name, &unit.path, self.exception_sensitive);
                    pdgs.push(PdgBuilder::new(cfg).build());
                }
            }
        }

        let mut sdg = Sdg::default();
        for pdg in pdgs {
            sdg.merge_pdg(pdg);
        }

        MethodCallLinker::new(&mut sdg).link(program);
        SummaryArcBuilder::new(&mut sdg).build();
        sdg.linked = true;
        log::info!(
            "SDG built: {} nodes, {} arcs, {} methods, {} linked call sites",
            sdg.graph.node_count(),
            sdg.graph.arcs().len(),
            sdg.methods.len(),
            sdg.call_sites.len()
        );
        sdg
    }
}

/// Expands resolved call sites into actual-in/actual-out nodes and the
/// parameter-passing arcs between caller and callee.
#[derive(Debug)]
pub struct MethodCallLinker<'a> {
    sdg: &'a mut Sdg,
}

impl<'a> MethodCallLinker<'a> {
    pub fn new(sdg: &'a mut Sdg) -> Self {
        Self { sdg }
    }

    pub fn link(mut self, program: &Program) {
        for unit in &program.units {
            for ty in &unit.types {
                for method in &ty.methods {
                    let caller = method.key(&ty.name);
                    for stmt in &method.body {
                        self.link_stmt(&caller, stmt);
                    }
                }
            }
        }
    }

    fn link_stmt(&mut self, caller: &str, stmt: &Stmt) {
        let mut calls: Vec<(&CallExpr, bool)> = Vec::new();
        match &stmt.kind {
            StmtKind::Expr { expr } => collect_calls(expr, false, &mut calls),
            StmtKind::Decl { init, .. } => {
                if let Some(init) = init {
                    collect_calls(init, true, &mut calls);
                }
            }
            StmtKind::If { cond, .. }
            | StmtKind::While { cond, .. }
            | StmtKind::DoWhile { cond, .. } => collect_calls(cond, true, &mut calls),
            StmtKind::For { cond, .. } => {
                if let Some(cond) = cond {
                    collect_calls(cond, true, &mut calls);
                }
            }
            StmtKind::ForEach { iterable, .. } => collect_calls(iterable, true, &mut calls),
            StmtKind::Switch { selector, .. } => collect_calls(selector, true, &mut calls),
            StmtKind::Return { value } => {
                if let Some(value) = value {
                    collect_calls(value, true, &mut calls);
                }
            }
            StmtKind::Throw { value } => collect_calls(value, true, &mut calls),
            StmtKind::Break | StmtKind::Continue | StmtKind::Try { .. } | StmtKind::Block { .. } => {}
        }

        for (call, value_used) in calls {
            self.link_call(caller, stmt.id, call, value_used);
        }

        // Recurse into nested statements.
        match &stmt.kind {
            StmtKind::If { then_branch, else_branch, .. } => {
                for s in then_branch.iter().chain(else_branch) {
                    self.link_stmt(caller, s);
                }
            }
            StmtKind::While { body, .. }
            | StmtKind::DoWhile { body, .. }
            | StmtKind::ForEach { body, .. }
            | StmtKind::Block { body } => {
                for s in body {
                    self.link_stmt(caller, s);
                }
            }
            StmtKind::For { init, update, body, .. } => {
                for s in init.iter().chain(update).chain(body) {
                    self.link_stmt(caller, s);
                }
            }
            StmtKind::Switch { cases, .. } => {
                for case in cases {
                    for s in &case.body {
                        self.link_stmt(caller, s);
                    }
                }
            }
            StmtKind::Try { body, catches, finally } => {
                for s in body.iter().chain(finally) {
                    self.link_stmt(caller, s);
                }
                for catch in catches {
                    for s in &catch.body {
                        self.link_stmt(caller, s);
                    }
                }
            }
            _ => {}
        }
    }

    fn link_call(&mut self, caller: &str, stmt: StmtId, call: &CallExpr, value_used: bool) {
        let CallTarget::Resolved { key } = &call.target else {
            log::debug!("call to {} left opaque: unresolved target", call.name);
            return;
        };
        let Some(callee) = self.sdg.methods.get(key).cloned() else {
            // Resolved to a method outside the analyzed program; same
            // treatment as an unresolved target.
            log::debug!("call to {key} left opaque: not part of the analyzed program");
            return;
        };
        let Some(call_node) = self.sdg.node_of_stmt(stmt) else {
            log::warn!("no graph node for call statement at {stmt:?}");
            return;
        };

        let source = self.sdg.graph.node(call_node).source.clone();

        // One actual-in per argument, fed by the definitions that reach the
        // call statement for the argument's variables.
        let incoming_defs: Vec<(NodeId, String)> = self
            .sdg
            .graph
            .incoming(call_node)
            .filter_map(|arc| match &arc.kind {
                ArcKind::DataDependency { var } => Some((arc.from, var.clone())),
                _ => None,
            })
            .collect();

        let mut actual_ins = Vec::with_capacity(call.args.len());
        for (i, arg) in call.args.iter().enumerate() {
            let mut actions = VarActions::default();
            vars::collect_expr(arg, &mut actions);
            // Argument expressions only read.
            actions.defined.clear();
            actions.declared.clear();

            let node = self.sdg.graph.add_node(
                NodeKind::ActualIn,
                format!("{arg}"),
                source.clone(),
                actions,
            );
            self.sdg.node_method.insert(node, caller.to_string());
            self.sdg
                .graph
                .add_arc(call_node, node, ArcKind::ControlDependency { branch: None });
            for (def_site, var) in &incoming_defs {
                if self.sdg.graph.node(node).vars.used.contains(var) {
                    self.sdg
                        .graph
                        .add_arc(*def_site, node, ArcKind::DataDependency { var: var.clone() });
                }
            }
            if let Some((param, formal_in)) = callee.formal_ins.get(i) {
                self.sdg
                    .graph
                    .add_arc(node, *formal_in, ArcKind::ParameterIn { var: param.clone() });
            }
            actual_ins.push(node);
        }

        let actual_out = match (value_used, callee.output) {
            (true, Some(output)) => {
                let node = self.sdg.graph.add_node(
                    NodeKind::ActualOut,
                    format!("{}()", call.name),
                    source,
                    VarActions::default(),
                );
                self.sdg.node_method.insert(node, caller.to_string());
                self.sdg
                    .graph
                    .add_arc(call_node, node, ArcKind::ControlDependency { branch: None });
                self.sdg.graph.add_arc(
                    node,
                    call_node,
                    ArcKind::DataDependency { var: OUTPUT_VAR.to_string() },
                );
                self.sdg.graph.add_arc(
                    output,
                    node,
                    ArcKind::ParameterOut { var: OUTPUT_VAR.to_string() },
                );
                Some(node)
            }
            _ => None,
        };

        self.sdg
            .graph
            .add_arc(call_node, callee.entry, ArcKind::Call);
        self.sdg.call_sites.push(CallSite {
            call_node,
            caller: caller.to_string(),
            callee: key.clone(),
            actual_ins,
            actual_out,
        });
    }
}

/// Collect every call expression under `expr`, remembering whether its value
/// is consumed. A call that is itself the whole expression statement has an
/// unused value; anything nested is a value position.
fn collect_calls<'e>(expr: &'e Expr, value_used: bool, out: &mut Vec<(&'e CallExpr, bool)>) {
    match expr {
        Expr::Call(call) => {
            out.push((call, value_used));
            if let Some(receiver) = &call.receiver {
                collect_calls(receiver, true, out);
            }
            for arg in &call.args {
                collect_calls(arg, true, out);
            }
        }
        Expr::Assign { value, .. } => collect_calls(value, true, out),
        Expr::Unary { operand, .. } => collect_calls(operand, true, out),
        Expr::Binary { lhs, rhs, .. } => {
            collect_calls(lhs, true, out);
            collect_calls(rhs, true, out);
        }
        Expr::Field { object, .. } => collect_calls(object, true, out),
        Expr::New { args, .. } => {
            for arg in args {
                collect_calls(arg, true, out);
            }
        }
        Expr::Literal { .. } | Expr::Name { .. } => {}
    }
}
