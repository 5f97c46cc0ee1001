//! Constant folding.
//!
//! [`calculate`] decides whether an expression has a value known at
//! compile time and never touches the graph. [`simplify`] is the one place
//! a folded value replaces the expression it came from.

use super::{Graph, NodeId, NodeKind, Variant};

pub fn calculate(graph: &Graph, id: NodeId) -> Option<Variant> {
    let types = &graph.types;
    match graph.kind(id) {
        NodeKind::Literal(value) => Some(value.clone()),
        NodeKind::Name { decl: Some(decl), .. } => match graph.kind(*decl) {
            NodeKind::Constant { value, .. } => calculate(graph, *value),
            _ => None,
        },
        NodeKind::Unary { op, operand } => {
            let value = calculate(graph, *operand)?;
            let ty = graph.ty(id)?;
            Variant::unary(*op, &value, types.selector(ty), types.size(ty)? as usize)
        }
        NodeKind::Binary { op, left, right } => {
            let left = calculate(graph, *left)?;
            let right = calculate(graph, *right)?;
            let ty = graph.ty(id)?;
            Variant::binary(*op, &left, &right, types.selector(ty), types.size(ty)? as usize)
        }
        NodeKind::Cast { operand } => {
            let value = calculate(graph, *operand)?;
            let ty = graph.ty(id)?;
            value.cast(types.selector(ty), types.size(ty)? as usize)
        }
        _ => None,
    }
}

/// Replace every foldable, non-literal operand of `parent` with a literal.
pub fn simplify(graph: &mut Graph, parent: NodeId) {
    if !graph.kind(parent).is_expression() {
        return;
    }
    for child in graph.children(parent) {
        if matches!(graph.kind(child), NodeKind::Literal(_)) || !graph.kind(child).is_expression() {
            continue;
        }
        if let Some(value) = calculate(graph, child) {
            let ty = graph.ty(child).map(|t| graph.types.base(t));
            let fragment = graph.fragment(child).clone();
            let literal = graph.add(&fragment, NodeKind::Literal(value), ty);
            graph.replace_child(parent, child, literal);
        }
    }
}
