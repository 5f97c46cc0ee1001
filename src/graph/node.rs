use super::{TypeId, Types, Variant};
use crate::lang::ast::{BinaryOp, DataPrefix, UnaryOp};
use crate::lang::Fragment;

/// Index of a node in the [`Graph`] arena.
pub type NodeId = usize;

/// ## Program graph
///
/// Every declaration, statement and expression of a program lives in one
/// arena. Children are referenced by index and each node records the
/// index of its owner. Types are not nodes; they live in the [`Types`]
/// side table and nodes refer to them by [`TypeId`].

#[derive(Debug, Clone)]
pub struct Node {
    pub owner: Option<NodeId>,
    pub fragment: Fragment,
    pub kind: NodeKind,
    /// Declared type of a declaration, computed type of an expression.
    pub ty: Option<TypeId>,
}

/// Stack frame of a compiled function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Frame {
    /// Bytes of locals and temporaries below `LP`.
    pub locals: i32,
    /// Bytes of arguments pushed by the caller.
    pub arguments: i32,
    /// Offset of the return value from `LP`.
    pub result: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Program {
        constants: Vec<NodeId>,
        structs: Vec<NodeId>,
        libraries: Vec<NodeId>,
        modules: Vec<NodeId>,
        channels: Vec<NodeId>,
    },
    Constant {
        name: String,
        value: NodeId,
    },
    Struct {
        name: String,
        fields: Vec<NodeId>,
    },
    /// Struct or data set field; the offset is relative to the owner.
    Field {
        name: String,
        offset: i32,
    },
    CodeBlock {
        executors: Vec<String>,
        functions: Vec<NodeId>,
    },
    Module {
        name: String,
        executor: String,
        data_sets: Vec<NodeId>,
        functions: Vec<NodeId>,
        /// Functions the module can reach, its own first.
        reachable: Vec<NodeId>,
        data: StaticData,
        /// Bytes of module data sets.
        data_size: i32,
    },
    DataSet {
        prefix: DataPrefix,
        fields: Vec<NodeId>,
    },
    Function {
        name: String,
        arguments: Vec<NodeId>,
        body: NodeId,
        frame: Frame,
    },
    Native {
        name: String,
        arguments: Vec<TypeId>,
    },
    Argument {
        name: String,
        offset: i32,
    },
    Channel {
        source: (String, String),
        destination: (String, String),
        /// Output and input field once bound.
        fields: Option<(NodeId, NodeId)>,
    },

    // *** Statements
    Block {
        statements: Vec<NodeId>,
        /// Locals declared by first assignment, only on a function body.
        implicit: Vec<NodeId>,
    },
    Var {
        name: String,
        value: Option<NodeId>,
        offset: i32,
    },
    /// Value first so it is bound before an implicit target is declared.
    Assign {
        value: NodeId,
        target: NodeId,
    },
    Invoke {
        call: NodeId,
    },
    Return {
        value: Option<NodeId>,
    },
    If {
        branches: Vec<(NodeId, NodeId)>,
        otherwise: Option<NodeId>,
    },
    For {
        counter: NodeId,
        start: NodeId,
        end: NodeId,
        step: Option<NodeId>,
        body: NodeId,
        /// Offsets of the end, step and step sign temporaries.
        temps: [i32; 3],
    },
    Do {
        condition: Option<NodeId>,
        post: bool,
        negative: bool,
        body: NodeId,
    },

    // *** Expressions
    Literal(Variant),
    Name {
        name: String,
        decl: Option<NodeId>,
    },
    Member {
        target: NodeId,
        name: String,
        decl: Option<NodeId>,
    },
    Call {
        name: String,
        arguments: Vec<NodeId>,
        callee: Option<NodeId>,
    },
    Unary {
        op: UnaryOp,
        operand: NodeId,
    },
    Binary {
        op: BinaryOp,
        left: NodeId,
        right: NodeId,
    },
    Cast {
        operand: NodeId,
    },
    /// Address of `target`; `temp` is the local it is copied to first
    /// when it has no address of its own.
    Pointer {
        target: NodeId,
        temp: Option<i32>,
    },
}

impl NodeKind {
    pub fn is_expression(&self) -> bool {
        use NodeKind::*;
        matches!(
            self,
            Literal(_) | Name { .. } | Member { .. } | Call { .. } | Unary { .. } | Binary { .. } | Cast { .. } | Pointer { .. }
        )
    }

    /// Child nodes in evaluation order.
    pub fn children(&self) -> Vec<NodeId> {
        use NodeKind::*;
        match self {
            Program {
                constants,
                structs,
                libraries,
                modules,
                channels,
            } => constants
                .iter()
                .chain(structs)
                .chain(libraries)
                .chain(modules)
                .chain(channels)
                .copied()
                .collect(),
            Constant { value, .. } => vec![*value],
            Struct { fields, .. } | DataSet { fields, .. } => fields.clone(),
            CodeBlock { functions, .. } => functions.clone(),
            Module {
                data_sets, functions, ..
            } => data_sets.iter().chain(functions).copied().collect(),
            Function { arguments, body, .. } => arguments.iter().chain(Some(body)).copied().collect(),
            Block { statements, implicit } => implicit.iter().chain(statements).copied().collect(),
            Var { value, .. } => value.iter().copied().collect(),
            Assign { value, target } => vec![*value, *target],
            Invoke { call } => vec![*call],
            Return { value } => value.iter().copied().collect(),
            If { branches, otherwise } => branches
                .iter()
                .flat_map(|(c, b)| vec![*c, *b])
                .chain(otherwise.iter().copied())
                .collect(),
            For {
                counter,
                start,
                end,
                step,
                body,
                ..
            } => vec![*counter, *start, *end]
                .into_iter()
                .chain(step.iter().copied())
                .chain(Some(*body))
                .collect(),
            Do { condition, body, .. } => condition.iter().copied().chain(Some(*body)).collect(),
            Member { target, .. } => vec![*target],
            Call { arguments, .. } => arguments.clone(),
            Unary { operand, .. } | Cast { operand } => vec![*operand],
            Binary { left, right, .. } => vec![*left, *right],
            Pointer { target, .. } => vec![*target],
            Field { .. } | Native { .. } | Argument { .. } | Channel { .. } | Literal(_) | Name { .. } => vec![],
        }
    }

    fn slots(&mut self) -> Vec<&mut NodeId> {
        use NodeKind::*;
        match self {
            Constant { value, .. } => vec![value],
            Var { value, .. } | Return { value } => value.iter_mut().collect(),
            Assign { value, target } => vec![value, target],
            Invoke { call } => vec![call],
            If { branches, .. } => branches.iter_mut().map(|(c, _)| c).collect(),
            For { start, end, step, .. } => {
                let mut slots: Vec<&mut NodeId> = vec![start, end];
                slots.extend(step.iter_mut());
                slots
            }
            Do { condition, .. } => condition.iter_mut().collect(),
            Member { target, .. } | Pointer { target, .. } => vec![target],
            Call { arguments, .. } => arguments.iter_mut().collect(),
            Unary { operand, .. } | Cast { operand } => vec![operand],
            Binary { left, right, .. } => vec![left, right],
            _ => vec![],
        }
    }
}

/// Strings a module keeps in static memory: literals and the names of
/// native functions, as `(text, capacity, offset)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticData {
    entries: Vec<(String, u32, i32)>,
    size: i32,
}

impl StaticData {
    /// Offset of a string record, added on first use.
    pub fn intern(&mut self, text: &str, capacity: u32) -> i32 {
        if let Some((_, _, offset)) = self.entries.iter().find(|(t, c, _)| t == text && *c == capacity) {
            return *offset;
        }
        let offset = self.size;
        self.entries.push((text.to_string(), capacity, offset));
        self.size += 8 + 2 * capacity as i32;
        offset
    }

    /// Native names are stored at their exact length.
    pub fn intern_name(&mut self, name: &str) -> i32 {
        let capacity = name.encode_utf16().count() as u32;
        self.intern(name, capacity)
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, u32, i32)> {
        self.entries.iter().map(|(t, c, o)| (t.as_str(), *c, *o))
    }
}

#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Node>,
    pub types: Types,
    root: NodeId,
    /// Named types and where they were written, for `bindTypes`.
    pub(super) type_refs: Vec<(TypeId, Fragment)>,
}

impl Graph {
    pub(super) fn new(fragment: Fragment) -> Graph {
        let root = Node {
            owner: None,
            fragment,
            kind: NodeKind::Program {
                constants: vec![],
                structs: vec![],
                libraries: vec![],
                modules: vec![],
                channels: vec![],
            },
            ty: None,
        };
        Graph {
            nodes: vec![root],
            types: Types::new(),
            root: 0,
            type_refs: vec![],
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add(&mut self, fragment: &Fragment, kind: NodeKind, ty: Option<TypeId>) -> NodeId {
        let id = self.nodes.len();
        for child in kind.children() {
            self.nodes[child].owner = Some(id);
        }
        self.nodes.push(Node {
            owner: None,
            fragment: fragment.clone(),
            kind,
            ty,
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id].kind
    }

    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id].kind
    }

    pub fn fragment(&self, id: NodeId) -> &Fragment {
        &self.nodes[id].fragment
    }

    pub fn ty(&self, id: NodeId) -> Option<TypeId> {
        self.nodes[id].ty
    }

    pub fn set_ty(&mut self, id: NodeId, ty: TypeId) {
        self.nodes[id].ty = Some(ty);
    }

    pub fn owner(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].owner
    }

    pub fn set_owner(&mut self, id: NodeId, owner: NodeId) {
        self.nodes[id].owner = Some(owner);
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes[id].kind.children()
    }

    /// Put `new` where `old` was among the children of `parent`.
    /// Returns false when `old` is not a replaceable child.
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) -> bool {
        let replaced = match self.nodes[parent].kind.slots().into_iter().find(|slot| **slot == old) {
            Some(slot) => {
                *slot = new;
                true
            }
            None => false,
        };
        if replaced {
            self.nodes[new].owner = Some(parent);
        }
        replaced
    }

    /// Depth first, owners before children.
    pub fn walk(&self, from: NodeId) -> Vec<NodeId> {
        let mut order = vec![];
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).into_iter().rev());
        }
        order
    }

    /// Owners of `id`, innermost first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors {
        Ancestors {
            graph: self,
            next: self.owner(id),
        }
    }

    pub fn enclosing_function(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id)
            .find(|a| matches!(self.kind(*a), NodeKind::Function { .. }))
    }

    pub fn enclosing_module(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id).find(|a| matches!(self.kind(*a), NodeKind::Module { .. }))
    }

    pub fn name(&self, id: NodeId) -> &str {
        use NodeKind::*;
        match &self.nodes[id].kind {
            Constant { name, .. }
            | Struct { name, .. }
            | Field { name, .. }
            | Module { name, .. }
            | Function { name, .. }
            | Native { name, .. }
            | Argument { name, .. }
            | Var { name, .. }
            | Name { name, .. }
            | Member { name, .. }
            | Call { name, .. } => name,
            _ => "",
        }
    }

    fn program(&self) -> (&[NodeId], &[NodeId], &[NodeId], &[NodeId], &[NodeId]) {
        match &self.nodes[self.root].kind {
            NodeKind::Program {
                constants,
                structs,
                libraries,
                modules,
                channels,
            } => (
                constants.as_slice(),
                structs.as_slice(),
                libraries.as_slice(),
                modules.as_slice(),
                channels.as_slice(),
            ),
            _ => {
                let empty: &[NodeId] = &[];
                (empty, empty, empty, empty, empty)
            }
        }
    }

    pub fn constants(&self) -> &[NodeId] {
        self.program().0
    }

    pub fn structs(&self) -> &[NodeId] {
        self.program().1
    }

    pub fn libraries(&self) -> &[NodeId] {
        self.program().2
    }

    pub fn modules(&self) -> &[NodeId] {
        self.program().3
    }

    pub fn channels(&self) -> &[NodeId] {
        self.program().4
    }

    pub fn module_named(&self, name: &str) -> Option<NodeId> {
        self.modules().iter().copied().find(|m| self.name(*m) == name)
    }

    /// Fields of every data set of a module with the given prefix.
    pub fn data_fields(&self, module: NodeId, prefix: Option<DataPrefix>) -> Vec<NodeId> {
        let data_sets = match self.kind(module) {
            NodeKind::Module { data_sets, .. } => data_sets,
            _ => return vec![],
        };
        data_sets
            .iter()
            .filter_map(|d| match self.kind(*d) {
                NodeKind::DataSet { prefix: p, fields } if prefix.map_or(true, |x| x == *p) => Some(fields.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Offset and capacity of every string record inside a value of type
    /// `ty`, nested structs included.
    pub fn strings(&self, ty: TypeId) -> Vec<(i32, u32)> {
        if let Some(capacity) = self.types.string_length(ty) {
            return vec![(0, capacity)];
        }
        let fields = match self.types.struct_node(ty).map(|s| self.kind(s)) {
            Some(NodeKind::Struct { fields, .. }) => fields,
            _ => return vec![],
        };
        let mut strings = vec![];
        for field in fields {
            if let (NodeKind::Field { offset, .. }, Some(inner)) = (self.kind(*field), self.ty(*field)) {
                strings.extend(self.strings(inner).into_iter().map(|(o, c)| (offset + o, c)));
            }
        }
        strings
    }

    /// Argument types of a user or native function.
    pub fn parameters(&self, function: NodeId) -> Vec<TypeId> {
        match self.kind(function) {
            NodeKind::Function { arguments, .. } => arguments.iter().filter_map(|a| self.ty(*a)).collect(),
            NodeKind::Native { arguments, .. } => arguments.clone(),
            _ => vec![],
        }
    }

    pub fn module_data(&self, module: NodeId) -> Option<&StaticData> {
        match self.kind(module) {
            NodeKind::Module { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn frame(&self, function: NodeId) -> Frame {
        match self.kind(function) {
            NodeKind::Function { frame, .. } => *frame,
            _ => Frame::default(),
        }
    }
}

pub struct Ancestors<'a> {
    graph: &'a Graph,
    next: Option<NodeId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.graph.owner(current);
        Some(current)
    }
}
