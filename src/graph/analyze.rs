use super::{fold, DataType, Graph, NodeId, NodeKind, StaticData, TypeId, Variant};
use crate::error;
use crate::lang::ast::DataPrefix;
use crate::lang::Error;
use std::collections::{HashSet, VecDeque};
use tracing::debug;

type Result<T> = std::result::Result<T, Error>;

/// ## Analyzer
///
/// Five passes over the whole graph, each finishing before the next one
/// starts: `bindTypes`, `bindNames`, `buildStaticData`, `checkTypes` and
/// `calculateOffsets`. The graph is mutated in place.

pub fn analyze(graph: &mut Graph) -> Result<()> {
    let mut analyzer = Analyzer::new(graph);
    analyzer.bind_types()?;
    debug!(nodes = analyzer.graph.len(), "types bound");
    analyzer.bind_names()?;
    debug!(nodes = analyzer.graph.len(), "names bound");
    analyzer.build_static_data()?;
    debug!(modules = analyzer.graph.modules().len(), "static data built");
    analyzer.check_types()?;
    debug!(nodes = analyzer.graph.len(), "types checked");
    analyzer.calculate_offsets()?;
    debug!("offsets calculated");
    Ok(())
}

pub struct Analyzer<'a> {
    pub(super) graph: &'a mut Graph,
    /// Constants and string lengths being evaluated, for cycle detection.
    pub(super) checking: HashSet<NodeId>,
    /// Constants with a final type.
    pub(super) checked: HashSet<NodeId>,
}

impl<'a> Analyzer<'a> {
    pub fn new(graph: &'a mut Graph) -> Analyzer<'a> {
        Analyzer {
            graph,
            checking: HashSet::new(),
            checked: HashSet::new(),
        }
    }

    // *** bindTypes

    fn bind_types(&mut self) -> Result<()> {
        for (id, fragment) in self.graph.type_refs.clone() {
            let name = match self.graph.types.get(id) {
                DataType::Named(name) => name.clone(),
                _ => continue,
            };
            let found = self.graph.structs().iter().copied().find(|s| self.graph.name(*s) == name);
            match found {
                Some(node) => self.graph.types.resolve(id, DataType::Struct(node, name)),
                None => return Err(error!(UnknownType, &fragment; "{}", name)),
            }
        }
        Ok(())
    }

    // *** bindNames

    fn bind_names(&mut self) -> Result<()> {
        for constant in self.graph.constants().to_vec() {
            for child in self.graph.children(constant) {
                self.bind_expression(child)?;
            }
        }
        for id in self.graph.types.unresolved() {
            if let DataType::PendingString(node) = self.graph.types.get(id) {
                let node = *node;
                self.bind_expression(node)?;
            }
        }
        for function in self.all_functions() {
            if let NodeKind::Function { body, .. } = self.graph.kind(function) {
                let body = *body;
                self.bind_statement(body)?;
            }
        }
        let mut destinations = HashSet::new();
        for channel in self.graph.channels().to_vec() {
            self.bind_channel(channel, &mut destinations)?;
        }
        Ok(())
    }

    /// User functions of libraries and modules.
    pub(super) fn all_functions(&self) -> Vec<NodeId> {
        let mut functions = vec![];
        for owner in self.graph.libraries().iter().chain(self.graph.modules()) {
            if let NodeKind::CodeBlock { functions: f, .. } | NodeKind::Module { functions: f, .. } = self.graph.kind(*owner) {
                functions.extend(f.iter().filter(|x| matches!(self.graph.kind(**x), NodeKind::Function { .. })));
            }
        }
        functions
    }

    fn bind_statement(&mut self, id: NodeId) -> Result<()> {
        match self.graph.kind(id).clone() {
            NodeKind::Block { statements, .. } => {
                for statement in statements {
                    self.bind_statement(statement)?;
                }
            }
            NodeKind::Var { name, value, .. } => {
                self.check_duplicate_variable(id, &name)?;
                if let Some(value) = value {
                    self.bind_expression(value)?;
                }
            }
            NodeKind::Assign { value, target } => {
                self.bind_expression(value)?;
                self.declare_implicit(target)?;
                self.bind_expression(target)?;
            }
            NodeKind::Invoke { call } => self.bind_expression(call)?,
            NodeKind::Return { value } => {
                if let Some(value) = value {
                    self.bind_expression(value)?;
                }
            }
            NodeKind::If { branches, otherwise } => {
                for (condition, body) in branches {
                    self.bind_expression(condition)?;
                    self.bind_statement(body)?;
                }
                if let Some(body) = otherwise {
                    self.bind_statement(body)?;
                }
            }
            NodeKind::For {
                counter,
                start,
                end,
                step,
                body,
                ..
            } => {
                self.bind_expression(start)?;
                self.bind_expression(end)?;
                if let Some(step) = step {
                    self.bind_expression(step)?;
                }
                self.declare_implicit(counter)?;
                self.bind_expression(counter)?;
                self.bind_statement(body)?;
            }
            NodeKind::Do { condition, body, .. } => {
                if let Some(condition) = condition {
                    self.bind_expression(condition)?;
                }
                self.bind_statement(body)?;
            }
            _ => return Err(error!(InternalError, self.graph.fragment(id); "NOT A STATEMENT")),
        }
        Ok(())
    }

    fn bind_expression(&mut self, id: NodeId) -> Result<()> {
        match self.graph.kind(id).clone() {
            NodeKind::Name { name, .. } => {
                let decl = match self.lookup(id, &name) {
                    Some(decl) => decl,
                    None => return Err(error!(CannotResolveSymbol, self.graph.fragment(id); "{}", name)),
                };
                if let NodeKind::Name { decl: d, .. } = self.graph.kind_mut(id) {
                    *d = Some(decl);
                }
            }
            NodeKind::Call { name, arguments, .. } => {
                let callee = match self.lookup_function(id, &name) {
                    Some(callee) => callee,
                    None => return Err(error!(CannotResolveSymbol, self.graph.fragment(id); "{}", name)),
                };
                if let NodeKind::Call { callee: c, .. } = self.graph.kind_mut(id) {
                    *c = Some(callee);
                }
                for argument in arguments {
                    self.bind_expression(argument)?;
                }
            }
            _ => {
                for child in self.graph.children(id) {
                    self.bind_expression(child)?;
                }
            }
        }
        Ok(())
    }

    /// Resolve a variable, argument, data field or constant by walking
    /// the owners outward.
    fn lookup(&self, from: NodeId, name: &str) -> Option<NodeId> {
        let ancestors: Vec<NodeId> = self.graph.ancestors(from).collect();
        for owner in &ancestors {
            let candidates: Vec<NodeId> = match self.graph.kind(*owner) {
                NodeKind::Block { statements, implicit } => implicit
                    .iter()
                    .chain(statements)
                    .copied()
                    .filter(|s| matches!(self.graph.kind(*s), NodeKind::Var { .. }))
                    .filter(|s| !ancestors.contains(s))
                    .collect(),
                NodeKind::Function { arguments, .. } => arguments.clone(),
                NodeKind::Module { .. } => self.graph.data_fields(*owner, None),
                _ => continue,
            };
            if let Some(found) = candidates.into_iter().find(|c| self.graph.name(*c) == name) {
                return Some(found);
            }
        }
        self.graph.constants().iter().copied().find(|c| self.graph.name(*c) == name)
    }

    fn lookup_function(&self, from: NodeId, name: &str) -> Option<NodeId> {
        let named = |functions: &[NodeId]| functions.iter().copied().find(|f| self.graph.name(*f) == name);
        if let Some(module) = self.graph.enclosing_module(from) {
            if let NodeKind::Module { functions, executor, .. } = self.graph.kind(module) {
                return named(functions.as_slice()).or_else(|| {
                    self.visible_libraries(&[executor.clone()])
                        .into_iter()
                        .find_map(|block| named(self.block_functions(block)))
                });
            }
        }
        let block = self
            .graph
            .ancestors(from)
            .find(|a| matches!(self.graph.kind(*a), NodeKind::CodeBlock { .. }))?;
        let executors = match self.graph.kind(block) {
            NodeKind::CodeBlock { executors, .. } => executors.clone(),
            _ => vec![],
        };
        named(self.block_functions(block)).or_else(|| {
            self.visible_libraries(&executors)
                .into_iter()
                .find_map(|b| named(self.block_functions(b)))
        })
    }

    fn block_functions(&self, block: NodeId) -> &[NodeId] {
        match self.graph.kind(block) {
            NodeKind::CodeBlock { functions, .. } => functions.as_slice(),
            _ => &[],
        }
    }

    /// Common libraries and those scoped to one of `executors`.
    pub(super) fn visible_libraries(&self, executors: &[String]) -> Vec<NodeId> {
        self.graph
            .libraries()
            .iter()
            .copied()
            .filter(|l| match self.graph.kind(*l) {
                NodeKind::CodeBlock { executors: e, .. } => e.is_empty() || e.iter().any(|x| executors.contains(x)),
                _ => false,
            })
            .collect()
    }

    fn check_duplicate_variable(&self, var: NodeId, name: &str) -> Result<()> {
        let block = match self.graph.owner(var) {
            Some(block) => block,
            None => return Ok(()),
        };
        let mut earlier: Vec<NodeId> = match self.graph.kind(block) {
            NodeKind::Block { statements, implicit } => implicit
                .iter()
                .chain(statements.iter().take_while(|s| **s != var))
                .copied()
                .filter(|s| matches!(self.graph.kind(*s), NodeKind::Var { .. }))
                .collect(),
            _ => vec![],
        };
        if let Some(function) = self.graph.enclosing_function(var) {
            if let NodeKind::Function { arguments, .. } = self.graph.kind(function) {
                earlier.extend(arguments);
            }
        }
        if earlier.iter().any(|e| self.graph.name(*e) == name) {
            return Err(error!(DuplicateVariable, self.graph.fragment(var); "{}", name));
        }
        Ok(())
    }

    /// Assigning to an unknown plain name declares a local on the
    /// function body.
    fn declare_implicit(&mut self, target: NodeId) -> Result<()> {
        let name = match self.graph.kind(target) {
            NodeKind::Name { name, .. } => name.clone(),
            _ => return Ok(()),
        };
        if self.lookup(target, &name).is_some() {
            return Ok(());
        }
        let function = match self.graph.enclosing_function(target) {
            Some(function) => function,
            None => return Ok(()),
        };
        let body = match self.graph.kind(function) {
            NodeKind::Function { body, .. } => *body,
            _ => return Ok(()),
        };
        let fragment = self.graph.fragment(target).clone();
        let kind = NodeKind::Var {
            name,
            value: None,
            offset: 0,
        };
        let var = self.graph.add(&fragment, kind, None);
        self.graph.set_owner(var, body);
        if let NodeKind::Block { implicit, .. } = self.graph.kind_mut(body) {
            implicit.push(var);
        }
        Ok(())
    }

    fn bind_channel(&mut self, channel: NodeId, destinations: &mut HashSet<(String, String)>) -> Result<()> {
        let (source, destination) = match self.graph.kind(channel) {
            NodeKind::Channel {
                source, destination, ..
            } => (source.clone(), destination.clone()),
            _ => return Ok(()),
        };
        let fragment = self.graph.fragment(channel).clone();
        let field = |module: &str, prefix: DataPrefix| -> Result<Option<NodeId>> {
            let module = match self.graph.module_named(module) {
                Some(module) => module,
                None => return Err(error!(UnknownModule, &fragment; "{}", module)),
            };
            let name = match prefix {
                DataPrefix::Output => source.1.as_str(),
                _ => destination.1.as_str(),
            };
            Ok(self
                .graph
                .data_fields(module, Some(prefix))
                .into_iter()
                .find(|f| self.graph.name(*f) == name))
        };
        let output = match field(&source.0, DataPrefix::Output)? {
            Some(f) => f,
            None => return Err(error!(UnknownOutputField, &fragment; "{}.{}", source.0, source.1)),
        };
        let input = match field(&destination.0, DataPrefix::Input)? {
            Some(f) => f,
            None => return Err(error!(UnknownInputField, &fragment; "{}.{}", destination.0, destination.1)),
        };
        if !destinations.insert(destination.clone()) {
            return Err(error!(DuplicateChannel, &fragment; "{}.{}", destination.0, destination.1));
        }
        if let NodeKind::Channel { fields, .. } = self.graph.kind_mut(channel) {
            *fields = Some((output, input));
        }
        Ok(())
    }

    // *** buildStaticData

    fn build_static_data(&mut self) -> Result<()> {
        for module in self.graph.modules().to_vec() {
            let reachable = self.reachable(module);
            let mut data = StaticData::default();
            for function in &reachable {
                for node in self.graph.walk(*function) {
                    match self.graph.kind(node) {
                        NodeKind::Literal(Variant::String(text)) => {
                            let capacity = self.graph.ty(node).and_then(|t| self.graph.types.string_length(t));
                            data.intern(text, capacity.unwrap_or(0));
                        }
                        NodeKind::Call {
                            callee: Some(callee), ..
                        } => {
                            if let NodeKind::Native { name, .. } = self.graph.kind(*callee) {
                                data.intern_name(name);
                            }
                        }
                        _ => {}
                    }
                }
            }
            debug!(module = self.graph.name(module), functions = reachable.len(), bytes = data.size(), "static data");
            if let NodeKind::Module {
                reachable: r, data: d, ..
            } = self.graph.kind_mut(module)
            {
                *r = reachable;
                *d = data;
            }
        }
        Ok(())
    }

    /// Module functions followed by every user function they call,
    /// directly or not.
    fn reachable(&self, module: NodeId) -> Vec<NodeId> {
        let mut found = match self.graph.kind(module) {
            NodeKind::Module { functions, .. } => functions.clone(),
            _ => vec![],
        };
        let mut queue: VecDeque<NodeId> = found.iter().copied().collect();
        while let Some(function) = queue.pop_front() {
            for node in self.graph.walk(function) {
                if let NodeKind::Call {
                    callee: Some(callee), ..
                } = self.graph.kind(node)
                {
                    if !found.contains(callee) && matches!(self.graph.kind(*callee), NodeKind::Function { .. }) {
                        found.push(*callee);
                        queue.push_back(*callee);
                    }
                }
            }
        }
        found
    }

    // *** calculateOffsets

    fn calculate_offsets(&mut self) -> Result<()> {
        for s in self.graph.structs().to_vec() {
            self.struct_size(s, &mut vec![])?;
        }
        for module in self.graph.modules().to_vec() {
            let mut offset = 0;
            for field in self.graph.data_fields(module, None) {
                self.set_offset(field, offset);
                offset += self.size_of(field)?;
            }
            if let NodeKind::Module { data_size, .. } = self.graph.kind_mut(module) {
                *data_size = offset;
            }
        }
        for function in self.all_functions() {
            self.frame(function)?;
        }
        Ok(())
    }

    fn struct_size(&mut self, s: NodeId, visiting: &mut Vec<NodeId>) -> Result<i32> {
        if let Some(size) = self.graph.ty(s).and_then(|t| self.graph.types.size(t)) {
            return Ok(size);
        }
        if visiting.contains(&s) {
            return Err(error!(RecursiveDefinition, self.graph.fragment(s); "{}", self.graph.name(s)));
        }
        visiting.push(s);
        let fields = match self.graph.kind(s) {
            NodeKind::Struct { fields, .. } => fields.clone(),
            _ => vec![],
        };
        let mut offset = 0;
        for field in fields {
            let ty = self.graph.ty(field).unwrap_or(0);
            if let Some(inner) = self.graph.types.struct_node(ty) {
                self.struct_size(inner, visiting)?;
            }
            self.set_offset(field, offset);
            offset += self.size_of(field)?;
        }
        visiting.pop();
        self.graph.types.set_struct_size(s, offset);
        Ok(offset)
    }

    fn set_offset(&mut self, id: NodeId, value: i32) {
        match self.graph.kind_mut(id) {
            NodeKind::Field { offset, .. } | NodeKind::Argument { offset, .. } | NodeKind::Var { offset, .. } => {
                *offset = value
            }
            _ => {}
        }
    }

    pub(super) fn size_of(&self, id: NodeId) -> Result<i32> {
        self.type_size(id, self.graph.ty(id))
    }

    pub(super) fn type_size(&self, id: NodeId, ty: Option<TypeId>) -> Result<i32> {
        match ty.and_then(|t| self.graph.types.size(t)) {
            Some(size) => Ok(size),
            None => Err(error!(InternalError, self.graph.fragment(id); "SIZE NOT KNOWN")),
        }
    }

    fn frame(&mut self, function: NodeId) -> Result<()> {
        let (arguments, body) = match self.graph.kind(function) {
            NodeKind::Function { arguments, body, .. } => (arguments.clone(), *body),
            _ => return Ok(()),
        };
        let mut offset = 8;
        for argument in &arguments {
            self.set_offset(*argument, offset);
            offset += self.size_of(*argument)?;
        }
        let result = offset;
        let mut cursor = 0;
        for node in self.graph.walk(body) {
            match self.graph.kind(node).clone() {
                NodeKind::Var { .. } => {
                    cursor -= self.size_of(node)?;
                    self.set_offset(node, cursor);
                }
                NodeKind::For { counter, .. } => {
                    let size = self.size_of(counter)?;
                    let end = cursor - size;
                    let step = end - size;
                    cursor = step - 1;
                    if let NodeKind::For { temps, .. } = self.graph.kind_mut(node) {
                        *temps = [end, step, cursor];
                    }
                }
                NodeKind::Pointer { target, .. } => {
                    if needs_temp(self.graph, target) {
                        cursor -= self.size_of(target)?;
                        if let NodeKind::Pointer { temp, .. } = self.graph.kind_mut(node) {
                            *temp = Some(cursor);
                        }
                    }
                }
                _ => {}
            }
        }
        if let NodeKind::Function { frame, .. } = self.graph.kind_mut(function) {
            frame.locals = -cursor;
            frame.arguments = result - 8;
            frame.result = result;
        }
        Ok(())
    }
}

/// A variable, argument or data field, or a member of one.
pub fn is_addressable(graph: &Graph, id: NodeId) -> bool {
    match graph.kind(id) {
        NodeKind::Name { decl: Some(decl), .. } => matches!(
            graph.kind(*decl),
            NodeKind::Var { .. } | NodeKind::Argument { .. } | NodeKind::Field { .. }
        ),
        NodeKind::Member { target, .. } => is_addressable(graph, *target),
        _ => false,
    }
}

/// Pointers to values without an address copy them to a local first.
/// Constant strings are pointed to in static memory.
pub fn needs_temp(graph: &Graph, target: NodeId) -> bool {
    !is_addressable(graph, target) && !matches!(fold::calculate(graph, target), Some(Variant::String(_)))
}
