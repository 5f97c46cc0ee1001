use super::{codegen, Binding, CompiledModule, CompiledProgram, FullAddress};
use crate::error;
use crate::graph::{self, Graph, NodeId, NodeKind};
use crate::lang::{Error, Loader};
use tracing::{debug, info};

type Result<T> = std::result::Result<T, Error>;

/// Load, analyse and compile a program and everything it imports.
pub fn compile(loader: &dyn Loader, name: &str) -> Result<CompiledProgram> {
    let graph = graph::load(loader, name)?;
    compile_graph(&graph)
}

/// Compile every module of an analysed graph and bind its channels.
pub fn compile_graph(graph: &Graph) -> Result<CompiledProgram> {
    let mut modules = vec![];
    for module in graph.modules() {
        modules.push(codegen(graph, *module)?);
    }
    let mut bindings = vec![];
    for channel in graph.channels() {
        if let NodeKind::Channel {
            fields: Some((output, input)),
            ..
        } = graph.kind(*channel)
        {
            let source = address(graph, &modules, *output)?;
            let destination = address(graph, &modules, *input)?;
            let size = graph
                .ty(*output)
                .and_then(|ty| graph.types.size(ty))
                .ok_or_else(|| error!(InternalError, graph.fragment(*channel); "SIZE NOT KNOWN"))?;
            debug!(from = %source.module, to = %destination.module, size, "channel bound");
            bindings.push(Binding {
                source,
                destination,
                size,
            });
        }
    }
    info!(modules = modules.len(), bindings = bindings.len(), "compiled");
    Ok(CompiledProgram::new(modules, bindings))
}

/// Absolute address of a module data field in its module's memory.
fn address(graph: &Graph, modules: &[CompiledModule], field: NodeId) -> Result<FullAddress> {
    let offset = match graph.kind(field) {
        NodeKind::Field { offset, .. } => *offset,
        _ => return Err(error!(InternalError, graph.fragment(field); "NOT A FIELD")),
    };
    let module = graph
        .enclosing_module(field)
        .and_then(|m| graph.modules().iter().position(|n| *n == m))
        .and_then(|index| modules.get(index))
        .ok_or_else(|| error!(InternalError, graph.fragment(field); "NO MODULE"))?;
    Ok(FullAddress {
        module: module.name().to_string(),
        address: module.dynamic_base() + offset,
    })
}
