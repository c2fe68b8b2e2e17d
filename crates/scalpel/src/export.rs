//! Graphviz export of dependence graphs, for diagnostics.
//!
//! One line per node (id, truncated statement text, variable-action summary)
//! and one edge per arc, labeled by arc kind or variable. When a slice is
//! given, member nodes are filled and criterion nodes are additionally bold.

use std::fmt::Write as _;

use crate::graph::ArcKind;
use crate::sdg::Sdg;
use crate::slicer::Slice;

const MAX_LABEL: usize = 40;

/// Render the whole SDG as a dot digraph, optionally styled by a slice.
pub fn to_dot(sdg: &Sdg, slice: Option<&Slice>) -> String {
    let mut out = String::from("digraph sdg {\n");
    out.push_str("    node [shape=box, fontname=\"monospace\"];\n");

    for node in sdg.graph.nodes() {
        let mut label = format!("{}: {}", node.id, truncate(&node.label));
        let vars = node.vars.summary();
        if !vars.is_empty() {
            let _ = write!(label, "\\n{vars}");
        }
        let mut attrs = format!("label=\"{}\"", escape(&label));
        if let Some(slice) = slice {
            if slice.is_criterion(node.id) {
                attrs.push_str(", style=\"filled,bold\", fillcolor=lightgoldenrod");
            } else if slice.contains(node.id) {
                attrs.push_str(", style=filled, fillcolor=lightgray");
            }
        }
        let _ = writeln!(out, "    n{} [{attrs}];", node.id);
    }

    for arc in sdg.graph.arcs() {
        let mut attrs = Vec::new();
        let label = arc.kind.short_label();
        if !label.is_empty() {
            attrs.push(format!("label=\"{}\"", escape(&label)));
        }
        match &arc.kind {
            ArcKind::ControlFlow { executable: true } => attrs.push("color=gray".to_string()),
            ArcKind::ControlFlow { executable: false } => {
                attrs.push("color=gray, style=dotted".to_string());
            }
            ArcKind::DataDependency { .. } => attrs.push("color=red".to_string()),
            ArcKind::ControlDependency { .. } => {}
            ArcKind::Call | ArcKind::ParameterIn { .. } | ArcKind::ParameterOut { .. } => {
                attrs.push("color=blue, style=dashed".to_string());
            }
            ArcKind::Summary => attrs.push("color=darkgreen, style=bold".to_string()),
        }
        let _ = writeln!(
            out,
            "    n{} -> n{} [{}];",
            arc.from,
            arc.to,
            attrs.join(", ")
        );
    }

    out.push_str("}\n");
    out
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_LABEL {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX_LABEL - 3).collect();
        format!("{head}...")
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace("\\\\n", "\\n")
}
