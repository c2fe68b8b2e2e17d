//! Control-flow graph construction, one graph per method body.
//!
//! The builder keeps a frontier of "open" predecessors: nodes whose outgoing
//! control flow has not found a successor yet. Every statement kind has a
//! wiring rule that consumes and refills this frontier. `break` and
//! `continue` bypass the frontier through an enclosing-construct stack, and
//! `return`/`throw` are terminal: their nodes are recorded and wired to the
//! synthetic exit when the builder finishes.
//!
//! Frontier entries carry an optional branch label (true/false/case) which is
//! recorded per control-flow edge; the PDG builder reads these labels when it
//! creates control-dependency arcs.
//!
//! `finish` consumes the builder, so a second exit node for the same method
//! cannot be built.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::ast::{MethodDecl, Stmt, StmtId, StmtKind};
use crate::graph::{ArcKind, BranchLabel, Graph, NodeId, NodeKind, SourceRef, VarActions};
use crate::vars;

/// A finished per-method CFG plus the bookkeeping the PDG builder needs.
#[derive(Debug)]
pub struct MethodCfg {
    pub graph: Graph,
    /// Qualified `Type.method` key.
    pub key: String,
    pub file: PathBuf,
    pub entry: NodeId,
    pub exit: NodeId,
    /// Present only in exception-sensitive mode.
    pub exceptional_exit: Option<NodeId>,
    /// Parameter name and its formal-in node, in declaration order.
    pub formal_ins: Vec<(String, NodeId)>,
    /// Return statement nodes; the flag tells whether a value is returned.
    pub returns: Vec<(NodeId, bool)>,
    /// Branch label of labeled control-flow edges.
    pub branch_labels: FxHashMap<(NodeId, NodeId), BranchLabel>,
    /// Throw node → catch entry pairs (exception-sensitive mode only), for
    /// the thrown-value data edges.
    pub catch_links: Vec<(NodeId, NodeId)>,
    /// `None` return type in the declaration.
    pub is_void: bool,
}

type Frontier = Vec<(NodeId, Option<BranchLabel>)>;

/// Enclosing constructs `break`/`continue` can target.
#[derive(Debug)]
enum Scope {
    Loop {
        /// Loop condition node; `None` while a do-while body is still being
        /// visited (its condition does not exist yet).
        header: Option<NodeId>,
        breaks: Vec<NodeId>,
        pending_continues: Vec<NodeId>,
    },
    Switch { breaks: Vec<NodeId> },
}

/// Enclosing try statements, for routing `throw` nodes.
#[derive(Debug)]
struct TryScope {
    has_catches: bool,
    throws: Vec<NodeId>,
}

/// Builds the CFG of one method.
#[derive(Debug)]
pub struct CfgBuilder<'a> {
    graph: Graph,
    key: String,
    file: &'a Path,
    frontier: Frontier,
    scopes: Vec<Scope>,
    trys: Vec<TryScope>,
    returns: Vec<(NodeId, bool)>,
    /// Terminal throw nodes with no handler (wired to the exit, or to the
    /// exceptional exit when one exists).
    escaped_throws: Vec<NodeId>,
    branch_labels: FxHashMap<(NodeId, NodeId), BranchLabel>,
    catch_links: Vec<(NodeId, NodeId)>,
    exceptional_exit: Option<NodeId>,
    exception_sensitive: bool,
}

impl<'a> CfgBuilder<'a> {
    /// Build the CFG for `method` of `type_name`, declared in `file`.
    pub fn build(
        method: &MethodDecl,
        type_name: &str,
        file: &'a Path,
        exception_sensitive: bool,
    ) -> MethodCfg {
        let key = method.key(type_name);
        log::debug!("building CFG for {key}");

        let mut builder = Self {
            graph: Graph::new(),
            key,
            file,
            frontier: Vec::new(),
            scopes: Vec::new(),
            trys: Vec::new(),
            returns: Vec::new(),
            escaped_throws: Vec::new(),
            branch_labels: FxHashMap::default(),
            catch_links: Vec::new(),
            exceptional_exit: None,
            exception_sensitive,
        };

        let entry = builder.graph.add_node(
            NodeKind::MethodEntry,
            format!("ENTER {}", builder.key),
            Some(builder.source_at(None, method.line)),
            VarActions::default(),
        );
        builder.frontier.push((entry, None));

        // Formal-in nodes sit on the CFG spine so reaching definitions treat
        // parameters as definitions live at the first statement.
        let mut formal_ins = Vec::with_capacity(method.params.len());
        for param in &method.params {
            let mut actions = VarActions::default();
            actions.declared.insert(param.name.clone());
            actions.defined.insert(param.name.clone());
            let node = builder.graph.add_node(
                NodeKind::FormalIn,
                format!("{} {}", param.ty, param.name),
                Some(builder.source_at(None, method.line)),
                actions,
            );
            builder.close_frontier_into(node);
            builder.frontier.push((node, None));
            formal_ins.push((param.name.clone(), node));
        }

        if exception_sensitive {
            let node = builder.graph.add_node(
                NodeKind::ExceptionalExit,
                "exceptional exit",
                Some(builder.source_at(None, method.line)),
                VarActions::default(),
            );
            builder.exceptional_exit = Some(node);
        }

        builder.visit_stmts(&method.body);
        builder.finish(entry, formal_ins, method)
    }

    /// Consume the builder into the finished CFG, creating the unique
    /// synthetic exit node.
    fn finish(
        mut self,
        entry: NodeId,
        formal_ins: Vec<(String, NodeId)>,
        method: &MethodDecl,
    ) -> MethodCfg {
        let exit = self.graph.add_node(
            NodeKind::NormalExit,
            "Exit",
            Some(self.source_at(None, method.line)),
            VarActions::default(),
        );
        self.close_frontier_into(exit);
        for &(node, _) in &self.returns {
            self.graph.add_arc(node, exit, ArcKind::ControlFlow { executable: true });
        }
        if let Some(ee) = self.exceptional_exit {
            for node in std::mem::take(&mut self.escaped_throws) {
                self.graph.add_arc(node, ee, ArcKind::ControlFlow { executable: true });
            }
            self.graph.add_arc(ee, exit, ArcKind::ControlFlow { executable: true });
        } else {
            for node in std::mem::take(&mut self.escaped_throws) {
                self.graph.add_arc(node, exit, ArcKind::ControlFlow { executable: true });
            }
        }
        // Augmented-CFG edge: makes the entry a predicate whose "body" branch
        // is the whole method, the root of all control dependencies.
        self.graph.add_arc(entry, exit, ArcKind::ControlFlow { executable: false });

        MethodCfg {
            graph: self.graph,
            key: self.key,
            file: self.file.to_path_buf(),
            entry,
            exit,
            exceptional_exit: self.exceptional_exit,
            formal_ins,
            returns: self.returns,
            branch_labels: self.branch_labels,
            catch_links: self.catch_links,
            is_void: method.return_type.is_none(),
        }
    }

    fn source_at(&self, stmt: Option<StmtId>, line: u32) -> SourceRef {
        SourceRef { stmt, file: self.file.to_path_buf(), line }
    }

    /// Wire every open predecessor to `node` and record branch labels.
    fn close_frontier_into(&mut self, node: NodeId) {
        for (pred, label) in std::mem::take(&mut self.frontier) {
            self.graph.add_arc(pred, node, ArcKind::ControlFlow { executable: true });
            if let Some(label) = label {
                self.branch_labels.insert((pred, node), label);
            }
        }
    }

    /// Create a statement node consuming the current frontier.
    fn add_stmt_node(&mut self, stmt: &Stmt) -> NodeId {
        let node = self.graph.add_node(
            NodeKind::Statement,
            stmt.header_text(),
            Some(self.source_at(Some(stmt.id), stmt.line)),
            vars::for_stmt(&stmt.kind),
        );
        self.close_frontier_into(node);
        node
    }

    fn visit_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.visit_stmt(stmt);
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr { .. } | StmtKind::Decl { .. } => {
                let node = self.add_stmt_node(stmt);
                self.frontier.push((node, None));
            }
            StmtKind::If { then_branch, else_branch, .. } => {
                self.visit_if(stmt, then_branch, else_branch);
            }
            StmtKind::While { body, .. } | StmtKind::ForEach { body, .. } => {
                self.visit_condition_first_loop(stmt, body);
            }
            StmtKind::DoWhile { body, .. } => self.visit_do_while(stmt, body),
            StmtKind::For { init, update, body, .. } => {
                self.visit_for(stmt, init, update, body);
            }
            StmtKind::Switch { cases, .. } => self.visit_switch(stmt, cases),
            StmtKind::Break => {
                let node = self.add_stmt_node(stmt);
                if let Some(scope) = self.scopes.last_mut() {
                    match scope {
                        Scope::Loop { breaks, .. } | Scope::Switch { breaks } => breaks.push(node),
                    }
                } else {
                    log::warn!("break outside of loop or switch at line {}", stmt.line);
                    self.frontier.push((node, None));
                }
            }
            StmtKind::Continue => {
                let node = self.add_stmt_node(stmt);
                let target = self.scopes.iter_mut().rev().find_map(|scope| match scope {
                    Scope::Loop { header, pending_continues, .. } => {
                        Some((header.as_ref().copied(), pending_continues))
                    }
                    Scope::Switch { .. } => None,
                });
                match target {
                    Some((Some(header), _)) => {
                        self.graph
                            .add_arc(node, header, ArcKind::ControlFlow { executable: true });
                    }
                    Some((None, pending)) => pending.push(node),
                    None => {
                        log::warn!("continue outside of loop at line {}", stmt.line);
                        self.frontier.push((node, None));
                    }
                }
            }
            StmtKind::Return { value } => {
                let node = self.add_stmt_node(stmt);
                self.returns.push((node, value.is_some()));
            }
            StmtKind::Throw { .. } => {
                let node = self.add_stmt_node(stmt);
                self.route_throw(node);
            }
            StmtKind::Try { body, catches, finally } => {
                self.visit_try(stmt, body, catches, finally);
            }
            StmtKind::Block { body } => self.visit_stmts(body),
        }
    }

    fn visit_if(&mut self, stmt: &Stmt, then_branch: &[Stmt], else_branch: &[Stmt]) {
        let cond = self.add_stmt_node(stmt);

        self.frontier.push((cond, Some(BranchLabel::True)));
        self.visit_stmts(then_branch);
        let after_then = std::mem::take(&mut self.frontier);

        if else_branch.is_empty() {
            self.frontier = after_then;
            self.frontier.push((cond, Some(BranchLabel::False)));
        } else {
            self.frontier.push((cond, Some(BranchLabel::False)));
            self.visit_stmts(else_branch);
            self.frontier.extend(after_then);
        }
    }

    /// `while` and `for-each`: the header is evaluated before the body.
    fn visit_condition_first_loop(&mut self, stmt: &Stmt, body: &[Stmt]) {
        let header = self.add_stmt_node(stmt);

        self.scopes.push(Scope::Loop {
            header: Some(header),
            breaks: Vec::new(),
            pending_continues: Vec::new(),
        });
        self.frontier.push((header, Some(BranchLabel::True)));
        self.visit_stmts(body);
        self.close_frontier_into(header);
        self.exit_loop(header);
    }

    fn visit_do_while(&mut self, stmt: &Stmt, body: &[Stmt]) {
        self.scopes.push(Scope::Loop {
            header: None,
            breaks: Vec::new(),
            pending_continues: Vec::new(),
        });
        let first_body_index = self.graph.node_count();
        self.visit_stmts(body);

        let header = self.add_stmt_node(stmt);
        if first_body_index < header.index() {
            let first = NodeId(first_body_index as u32);
            self.graph.add_arc(header, first, ArcKind::ControlFlow { executable: true });
            self.branch_labels.insert((header, first), BranchLabel::True);
        }
        // Continues recorded while the condition did not exist yet.
        if let Some(Scope::Loop { pending_continues, .. }) = self.scopes.last_mut() {
            for node in std::mem::take(pending_continues) {
                self.graph.add_arc(node, header, ArcKind::ControlFlow { executable: true });
            }
        }
        self.exit_loop(header);
    }

    fn visit_for(&mut self, stmt: &Stmt, init: &[Stmt], update: &[Stmt], body: &[Stmt]) {
        self.visit_stmts(init);
        let header = self.add_stmt_node(stmt);

        self.scopes.push(Scope::Loop {
            header: Some(header),
            breaks: Vec::new(),
            pending_continues: Vec::new(),
        });
        self.frontier.push((header, Some(BranchLabel::True)));
        self.visit_stmts(body);
        // Update expressions run at the tail of every iteration.
        self.visit_stmts(update);
        self.close_frontier_into(header);
        self.exit_loop(header);
    }

    /// Pop the loop scope and open the loop-exit frontier:
    /// {header, false-branch} ∪ collected breaks.
    fn exit_loop(&mut self, header: NodeId) {
        let Some(Scope::Loop { breaks, .. }) = self.scopes.pop() else {
            unreachable!("loop scope mismatch");
        };
        self.frontier.push((header, Some(BranchLabel::False)));
        for node in breaks {
            self.frontier.push((node, None));
        }
    }

    fn visit_switch(&mut self, stmt: &Stmt, cases: &[crate::ast::SwitchCase]) {
        let selector = self.add_stmt_node(stmt);
        self.scopes.push(Scope::Switch { breaks: Vec::new() });

        let mut fallthrough: Frontier = Vec::new();
        let mut has_default = false;
        for case in cases {
            if case.label.is_none() {
                has_default = true;
            }
            self.frontier.push((selector, Some(BranchLabel::Case(case.header_text()))));
            self.frontier.append(&mut fallthrough);

            let entry = self.graph.add_node(
                NodeKind::Statement,
                case.header_text(),
                Some(self.source_at(Some(case.id), case.line)),
                vars::for_case(case),
            );
            self.close_frontier_into(entry);
            self.frontier.push((entry, None));

            self.visit_stmts(&case.body);
            fallthrough = std::mem::take(&mut self.frontier);
        }

        let Some(Scope::Switch { breaks }) = self.scopes.pop() else {
            unreachable!("switch scope mismatch");
        };
        self.frontier = fallthrough;
        for node in breaks {
            self.frontier.push((node, None));
        }
        if !has_default {
            // No default case: the selector itself may fall through.
            self.frontier.push((selector, None));
        }
    }

    fn visit_try(
        &mut self,
        stmt: &Stmt,
        body: &[Stmt],
        catches: &[crate::ast::CatchClause],
        finally: &[Stmt],
    ) {
        let header = self.add_stmt_node(stmt);
        self.frontier.push((header, None));

        self.trys.push(TryScope { has_catches: !catches.is_empty(), throws: Vec::new() });
        self.visit_stmts(body);
        let body_end = std::mem::take(&mut self.frontier);
        let throws = self.trys.pop().map(|t| t.throws).unwrap_or_default();

        let mut exits = body_end;
        for catch in catches {
            let entry = self.graph.add_node(
                NodeKind::Statement,
                catch.header_text(),
                Some(self.source_at(Some(catch.id), catch.line)),
                vars::for_catch(catch),
            );
            // Control may transfer here without a recorded throw site.
            self.graph.add_arc(header, entry, ArcKind::ControlFlow { executable: false });
            for &throw in &throws {
                self.graph.add_arc(throw, entry, ArcKind::ControlFlow { executable: true });
                self.catch_links.push((throw, entry));
            }
            self.frontier.push((entry, None));
            self.visit_stmts(&catch.body);
            exits.append(&mut self.frontier);
        }

        self.frontier = exits;
        self.visit_stmts(finally);
    }

    /// Route a throw node to the nearest enclosing try with handlers, or mark
    /// it as escaping the method.
    fn route_throw(&mut self, node: NodeId) {
        if self.exception_sensitive {
            if let Some(scope) = self.trys.iter_mut().rev().find(|t| t.has_catches) {
                scope.throws.push(node);
                return;
            }
        }
        self.escaped_throws.push(node);
    }
}
