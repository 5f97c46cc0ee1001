use super::{
    BranchSelector, CallSelector, CompiledModule, DataSelector, Entry, Fixed, Instruction, Label, Labels, Link,
    Opcode, Operand, TypeSelector, Val, INSTRUCTION_SIZE, STRING_HEADER,
};
use crate::error;
use crate::graph::{comparator, fold, opcode, Graph, NodeId, NodeKind, StaticData, TypeId, Variant};
use crate::lang::ast::UnaryOp;
use crate::lang::Error;
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::{debug, trace};

type Result<T> = std::result::Result<T, Error>;

/// Compile one module together with every library function it calls.
pub fn codegen(graph: &Graph, module: NodeId) -> Result<CompiledModule> {
    let (name, executor, functions, data, data_size) = match graph.kind(module) {
        NodeKind::Module {
            name,
            executor,
            functions,
            data,
            data_size,
            ..
        } => (name, executor, functions, data, *data_size),
        _ => return Err(error!(InternalError, graph.fragment(module); "NOT A MODULE")),
    };
    let mut unit = Unit {
        graph,
        code: vec![],
        labels: Labels::new(),
        data: data.clone(),
        entries: HashMap::new(),
        queue: VecDeque::new(),
    };
    unit.bootstrap(functions)?;
    for function in functions {
        if matches!(graph.kind(*function), NodeKind::Function { .. }) {
            unit.entry(*function);
        }
    }
    let mut table = BTreeMap::new();
    while let Some(function) = unit.queue.pop_front() {
        let address = unit.address();
        let label = unit.entry(function);
        unit.labels.bind(label, address)?;
        unit.function(function)?;
        let frame = graph.frame(function);
        let result = match graph.ty(function) {
            Some(ty) => unit.size(function, ty)?,
            None => 0,
        };
        let entry = Entry {
            address,
            arguments: frame.arguments,
            result,
        };
        table.insert(graph.name(function).to_string(), entry);
    }
    let code_size = unit.address();
    let static_base = code_size;
    let dynamic_base = static_base + unit.data.size();
    let mut image = Link::new(&unit.labels, static_base, dynamic_base).link(&unit.code)?;
    image.extend(static_image(&unit.data));
    debug!(
        module = name.as_str(),
        instructions = unit.code.len(),
        static_bytes = unit.data.size(),
        data_bytes = data_size,
        "compiled"
    );
    let data = data_image(graph, module, data_size);
    Ok(CompiledModule::new(name, executor, image, code_size, data_size, table).with_data(data))
}

fn record_size(capacity: u32) -> i32 {
    STRING_HEADER as i32 + 2 * capacity as i32
}

/// Initial module data: zeros, with the header of every string field set.
fn data_image(graph: &Graph, module: NodeId, data_size: i32) -> Vec<u8> {
    let mut bytes = vec![0; data_size as usize];
    for field in graph.data_fields(module, None) {
        let (offset, ty) = match (graph.kind(field), graph.ty(field)) {
            (NodeKind::Field { offset, .. }, Some(ty)) => (*offset, ty),
            _ => continue,
        };
        for (at, capacity) in graph.strings(ty) {
            let record = Val::from_text("").encode(record_size(capacity) as usize);
            let start = (offset + at) as usize;
            if let Some(target) = bytes.get_mut(start..start + record.len()) {
                target.copy_from_slice(&record);
            }
        }
    }
    bytes
}

/// String records of the static data segment.
fn static_image(data: &StaticData) -> Vec<u8> {
    let mut bytes = vec![0; data.size() as usize];
    for (text, capacity, offset) in data.entries() {
        let record = Val::from_text(text).encode(record_size(capacity) as usize);
        let offset = offset as usize;
        bytes[offset..offset + record.len()].copy_from_slice(&record);
    }
    bytes
}

#[derive(Debug, Clone, Copy)]
enum Place {
    Local(i32),
    Global(i32),
}

impl Place {
    fn plus(self, delta: i32) -> Place {
        match self {
            Place::Local(offset) => Place::Local(offset + delta),
            Place::Global(offset) => Place::Global(offset + delta),
        }
    }
}

struct Unit<'a> {
    graph: &'a Graph,
    code: Vec<Instruction>,
    labels: Labels,
    data: StaticData,
    /// One label per function called from this module.
    entries: HashMap<NodeId, Label>,
    /// Functions with a label but no code yet.
    queue: VecDeque<NodeId>,
}

impl<'a> Unit<'a> {
    fn emit(&mut self, instruction: Instruction) {
        self.code.push(instruction);
    }

    fn address(&self) -> i32 {
        self.code.len() as i32 * INSTRUCTION_SIZE
    }

    fn bind(&mut self, label: Label) -> Result<()> {
        let address = self.address();
        self.labels.bind(label, address)
    }

    fn ty(&self, id: NodeId) -> Result<TypeId> {
        match self.graph.ty(id) {
            Some(ty) => Ok(ty),
            None => Err(error!(InternalError, self.graph.fragment(id); "UNTYPED NODE")),
        }
    }

    fn size(&self, id: NodeId, ty: TypeId) -> Result<i32> {
        match self.graph.types.size(ty) {
            Some(size) => Ok(size),
            None => Err(error!(InternalError, self.graph.fragment(id); "SIZE NOT KNOWN")),
        }
    }

    fn typed(&self, id: NodeId) -> Result<(TypeSelector, i32)> {
        let ty = self.ty(id)?;
        Ok((self.graph.types.selector(ty), self.size(id, ty)?))
    }

    /// Label of a function, queueing it for compilation on first use.
    fn entry(&mut self, function: NodeId) -> Label {
        if let Some(label) = self.entries.get(&function) {
            return *label;
        }
        trace!(function = self.graph.name(function), "queued");
        let label = self.labels.create();
        self.entries.insert(function, label);
        self.queue.push_back(function);
        label
    }

    fn bootstrap(&mut self, functions: &[NodeId]) -> Result<()> {
        let graph = self.graph;
        let main = functions
            .iter()
            .copied()
            .find(|f| graph.name(*f) == "MAIN" && matches!(graph.kind(*f), NodeKind::Function { .. }));
        if let Some(main) = main {
            if let Some(ty) = graph.ty(main) {
                let size = self.size(main, ty)?;
                self.emit(Instruction::load(DataSelector::Zero, size, Operand::Value(0)));
            }
            let label = self.entry(main);
            self.emit(Instruction::call(CallSelector::UserDefined, Operand::Label(label)));
        }
        self.emit(Instruction::end());
        Ok(())
    }

    fn function(&mut self, function: NodeId) -> Result<()> {
        let graph = self.graph;
        let body = match graph.kind(function) {
            NodeKind::Function { body, .. } => *body,
            _ => return Err(error!(InternalError, graph.fragment(function); "NOT A FUNCTION")),
        };
        let frame = graph.frame(function);
        self.emit(Instruction::enter(frame.locals));
        if let NodeKind::Block { implicit, .. } = graph.kind(body) {
            for var in implicit {
                self.initialize(*var)?;
            }
        }
        self.statement(body, function)?;
        self.emit(Instruction::leave(frame.locals));
        self.emit(Instruction::ret());
        Ok(())
    }

    /// Zero a local and give each string record in it an empty value
    /// carrying its capacity.
    fn initialize(&mut self, var: NodeId) -> Result<()> {
        let ty = self.ty(var)?;
        let size = self.size(var, ty)?;
        let offset = match self.graph.kind(var) {
            NodeKind::Var { offset, .. } => *offset,
            _ => return Err(error!(InternalError, self.graph.fragment(var); "NOT A VARIABLE")),
        };
        let strings = self.graph.strings(ty);
        if strings.first().map_or(true, |(at, capacity)| *at != 0 || record_size(*capacity) != size) {
            self.emit(Instruction::load(DataSelector::Zero, size, Operand::Value(0)));
            self.emit(Instruction::store(DataSelector::Local, size, Operand::Value(offset)));
        }
        for (at, capacity) in strings {
            let empty = self.data.intern("", capacity);
            let record = record_size(capacity);
            self.emit(Instruction::load(DataSelector::Global, record, Operand::Static(empty)));
            self.emit(Instruction::store(DataSelector::Local, record, Operand::Value(offset + at)));
        }
        Ok(())
    }

    // *** Statements

    fn statement(&mut self, id: NodeId, function: NodeId) -> Result<()> {
        let graph = self.graph;
        match graph.kind(id) {
            NodeKind::Block { statements, .. } => {
                for statement in statements {
                    self.statement(*statement, function)?;
                }
            }
            NodeKind::Var {
                value: Some(value),
                offset,
                ..
            } => {
                let (_, size) = self.typed(id)?;
                self.load(*value)?;
                self.emit(Instruction::store(DataSelector::Local, size, Operand::Value(*offset)));
            }
            NodeKind::Var { value: None, .. } => self.initialize(id)?,
            NodeKind::Assign { value, target } => {
                self.load(*value)?;
                self.store(*target)?;
            }
            NodeKind::Invoke { call } => {
                self.load(*call)?;
                if graph.ty(*call).is_some() {
                    let (_, size) = self.typed(*call)?;
                    self.emit(Instruction::pop(size));
                }
            }
            NodeKind::Return { value } => {
                let frame = graph.frame(function);
                if let Some(value) = value {
                    let ty = self.ty(function)?;
                    let size = self.size(function, ty)?;
                    self.load(*value)?;
                    self.emit(Instruction::store(DataSelector::Local, size, Operand::Value(frame.result)));
                }
                self.emit(Instruction::leave(frame.locals));
                self.emit(Instruction::ret());
            }
            NodeKind::If { branches, otherwise } => {
                let end = self.labels.create();
                let last = branches.len() - 1;
                for (index, (condition, body)) in branches.iter().enumerate() {
                    let next = self.labels.create();
                    self.load(*condition)?;
                    self.emit(Instruction::branch(BranchSelector::OnFalse, next));
                    self.statement(*body, function)?;
                    if index < last || otherwise.is_some() {
                        self.emit(Instruction::jump(end));
                    }
                    self.bind(next)?;
                }
                if let Some(body) = otherwise {
                    self.statement(*body, function)?;
                }
                self.bind(end)?;
            }
            NodeKind::For {
                counter,
                start,
                end,
                step,
                body,
                temps,
            } => self.r#for(*counter, *start, *end, *step, *body, *temps, function)?,
            NodeKind::Do {
                condition,
                post,
                negative,
                body,
            } => {
                let head = self.labels.create();
                let exit = self.labels.create();
                self.bind(head)?;
                match (condition, post) {
                    (Some(condition), false) => {
                        self.load(*condition)?;
                        let on = if *negative { BranchSelector::OnTrue } else { BranchSelector::OnFalse };
                        self.emit(Instruction::branch(on, exit));
                        self.statement(*body, function)?;
                        self.emit(Instruction::jump(head));
                    }
                    (Some(condition), true) => {
                        self.statement(*body, function)?;
                        self.load(*condition)?;
                        let on = if *negative { BranchSelector::OnFalse } else { BranchSelector::OnTrue };
                        self.emit(Instruction::branch(on, head));
                    }
                    (None, _) => {
                        self.statement(*body, function)?;
                        self.emit(Instruction::jump(head));
                    }
                }
                self.bind(exit)?;
            }
            _ => return Err(error!(InternalError, graph.fragment(id); "NOT A STATEMENT")),
        }
        Ok(())
    }

    /// The loop ends once `counter - end` has the sign of the step.
    #[allow(clippy::too_many_arguments)]
    fn r#for(
        &mut self,
        counter: NodeId,
        start: NodeId,
        end: NodeId,
        step: Option<NodeId>,
        body: NodeId,
        temps: [i32; 3],
        function: NodeId,
    ) -> Result<()> {
        let [end_temp, step_temp, sign_temp] = temps;
        let ty = self.ty(counter)?;
        let (selector, size) = self.typed(counter)?;
        self.load(end)?;
        self.emit(Instruction::store(DataSelector::Local, size, Operand::Value(end_temp)));
        match step {
            Some(step) => self.load(step)?,
            None => self.literal(counter, &Variant::Integral(1), ty)?,
        }
        self.emit(Instruction::dup(size));
        self.emit(Instruction::store(DataSelector::Local, size, Operand::Value(step_temp)));
        self.emit(Instruction::unary(Opcode::Sign, selector, size));
        self.emit(Instruction::store(DataSelector::Local, 1, Operand::Value(sign_temp)));
        self.load(start)?;
        self.store(counter)?;

        let head = self.labels.create();
        let exit = self.labels.create();
        self.bind(head)?;
        self.emit(Instruction::load(DataSelector::Local, size, Operand::Value(end_temp)));
        self.load(counter)?;
        self.emit(Instruction::binary(Opcode::Sub, selector, size, size, size));
        self.emit(Instruction::unary(Opcode::Sign, selector, size));
        self.emit(Instruction::load(DataSelector::Local, 1, Operand::Value(sign_temp)));
        self.emit(Instruction::compare(TypeSelector::Byte, super::Comparator::Equal, 1, 1));
        self.emit(Instruction::branch(BranchSelector::OnTrue, exit));
        self.statement(body, function)?;
        self.emit(Instruction::load(DataSelector::Local, size, Operand::Value(step_temp)));
        self.load(counter)?;
        self.emit(Instruction::binary(Opcode::Add, selector, size, size, size));
        self.store(counter)?;
        self.emit(Instruction::jump(head));
        self.bind(exit)
    }

    // *** Expressions

    fn place(&self, id: NodeId) -> Option<Place> {
        let graph = self.graph;
        match graph.kind(id) {
            NodeKind::Name { decl: Some(decl), .. } => match graph.kind(*decl) {
                NodeKind::Var { offset, .. } | NodeKind::Argument { offset, .. } => Some(Place::Local(*offset)),
                NodeKind::Field { offset, .. } => Some(Place::Global(*offset)),
                _ => None,
            },
            NodeKind::Member {
                target,
                decl: Some(field),
                ..
            } => match graph.kind(*field) {
                NodeKind::Field { offset, .. } => Some(self.place(*target)?.plus(*offset)),
                _ => None,
            },
            _ => None,
        }
    }

    fn store(&mut self, target: NodeId) -> Result<()> {
        let (_, size) = self.typed(target)?;
        match self.place(target) {
            Some(Place::Local(offset)) => {
                self.emit(Instruction::store(DataSelector::Local, size, Operand::Value(offset)))
            }
            Some(Place::Global(offset)) => {
                self.emit(Instruction::store(DataSelector::Global, size, Operand::Dynamic(offset)))
            }
            None => return Err(error!(ExpressionIsNotAssignable, self.graph.fragment(target))),
        }
        Ok(())
    }

    /// Leave the value of an expression on the stack.
    fn load(&mut self, id: NodeId) -> Result<()> {
        let graph = self.graph;
        match graph.kind(id) {
            NodeKind::Literal(value) => {
                let ty = self.ty(id)?;
                self.literal(id, value, ty)?;
            }
            NodeKind::Name { decl: Some(decl), .. } if matches!(graph.kind(*decl), NodeKind::Constant { .. }) => {
                let value = match fold::calculate(graph, id) {
                    Some(value) => value,
                    None => return Err(error!(ExpectedConstantExpression, graph.fragment(id))),
                };
                let ty = graph.types.base(self.ty(id)?);
                self.literal(id, &value, ty)?;
            }
            NodeKind::Name { .. } | NodeKind::Member { .. } => {
                let (_, size) = self.typed(id)?;
                match self.place(id) {
                    Some(Place::Local(offset)) => {
                        self.emit(Instruction::load(DataSelector::Local, size, Operand::Value(offset)))
                    }
                    Some(Place::Global(offset)) => {
                        self.emit(Instruction::load(DataSelector::Global, size, Operand::Dynamic(offset)))
                    }
                    None => return Err(error!(InternalError, graph.fragment(id); "NO ADDRESS")),
                }
            }
            NodeKind::Call { arguments, callee, .. } => {
                let callee = match callee {
                    Some(callee) => *callee,
                    None => return Err(error!(CannotResolveSymbol, graph.fragment(id))),
                };
                if let Some(ty) = graph.ty(callee) {
                    let size = self.size(id, ty)?;
                    self.emit(Instruction::load(DataSelector::Zero, size, Operand::Value(0)));
                }
                let mut bytes = 0;
                for argument in arguments.iter().rev() {
                    self.load(*argument)?;
                    bytes += self.typed(*argument)?.1;
                }
                let target = match graph.kind(callee) {
                    NodeKind::Native { name, .. } => {
                        let name = self.data.intern_name(name);
                        Instruction::call(CallSelector::Native, Operand::Static(name))
                    }
                    _ => {
                        let label = self.entry(callee);
                        Instruction::call(CallSelector::UserDefined, Operand::Label(label))
                    }
                };
                self.emit(target);
                if bytes > 0 {
                    self.emit(Instruction::pop(bytes));
                }
            }
            NodeKind::Unary { op, operand } => {
                self.load(*operand)?;
                let (selector, size) = self.typed(*operand)?;
                match op {
                    UnaryOp::Plus => {}
                    UnaryOp::Minus => self.emit(Instruction::unary(Opcode::Neg, selector, size)),
                    UnaryOp::Not => self.emit(Instruction::unary(Opcode::Not, selector, size)),
                }
            }
            NodeKind::Binary { op, left, right } => {
                let (selector, left_size) = self.typed(*left)?;
                let (_, right_size) = self.typed(*right)?;
                if let TypeSelector::Unknown | TypeSelector::Pointer | TypeSelector::Array | TypeSelector::Struct =
                    selector
                {
                    return Err(error!(InternalError, graph.fragment(id); "NO INSTRUCTION FOR {} {}", selector, op));
                }
                self.load(*right)?;
                self.load(*left)?;
                let instruction = match (comparator(*op), opcode(*op)) {
                    (Some(comparator), _) => Instruction::compare(selector, comparator, left_size, right_size),
                    (None, Some(opcode)) => {
                        let (_, size) = self.typed(id)?;
                        Instruction::binary(opcode, selector, left_size, right_size, size)
                    }
                    (None, None) => return Err(error!(InternalError, graph.fragment(id); "NO INSTRUCTION FOR {}", op)),
                };
                self.emit(instruction);
            }
            NodeKind::Cast { operand } => {
                self.load(*operand)?;
                let (from, from_size) = self.typed(*operand)?;
                let (to, to_size) = self.typed(id)?;
                self.emit(Instruction::cast(from, from_size, to, to_size));
            }
            NodeKind::Pointer { target, temp } => self.pointer(*target, *temp)?,
            _ => return Err(error!(InternalError, graph.fragment(id); "NOT AN EXPRESSION")),
        }
        Ok(())
    }

    fn literal(&mut self, id: NodeId, value: &Variant, ty: TypeId) -> Result<()> {
        let types = &self.graph.types;
        let selector = types.selector(ty);
        let size = self.size(id, ty)?;
        let instruction = match value {
            Variant::Boolean(b) => Instruction::load_immediate(size, *b as i64),
            Variant::Integral(n) if selector == TypeSelector::Real => {
                Instruction::load_immediate(size, Fixed::from_int(*n).raw())
            }
            Variant::Integral(n) => Instruction::load_immediate(size, *n),
            Variant::Real(r) if selector.is_integral() => Instruction::load_immediate(size, r.to_int()),
            Variant::Real(r) => Instruction::load_immediate(size, r.raw()),
            Variant::String(text) => {
                let capacity = types.string_length(ty).unwrap_or_else(|| text.encode_utf16().count() as u32);
                let offset = self.data.intern(text, capacity);
                Instruction::load(DataSelector::Global, size, Operand::Static(offset))
            }
        };
        self.emit(instruction);
        Ok(())
    }

    fn pointer(&mut self, target: NodeId, temp: Option<i32>) -> Result<()> {
        if let Some(temp) = temp {
            let (_, size) = self.typed(target)?;
            self.load(target)?;
            self.emit(Instruction::store(DataSelector::Local, size, Operand::Value(temp)));
            self.emit(Instruction::load(DataSelector::LocalPointer, 4, Operand::Value(temp)));
            return Ok(());
        }
        let instruction = match self.place(target) {
            Some(Place::Local(offset)) => Instruction::load(DataSelector::LocalPointer, 4, Operand::Value(offset)),
            Some(Place::Global(offset)) => Instruction::load(DataSelector::Immediate, 4, Operand::Dynamic(offset)),
            None => match fold::calculate(self.graph, target) {
                Some(Variant::String(text)) => {
                    let ty = self.ty(target)?;
                    let capacity = self
                        .graph
                        .types
                        .string_length(ty)
                        .unwrap_or_else(|| text.encode_utf16().count() as u32);
                    let offset = self.data.intern(&text, capacity);
                    Instruction::load(DataSelector::Immediate, 4, Operand::Static(offset))
                }
                _ => return Err(error!(InternalError, self.graph.fragment(target); "NO ADDRESS")),
            },
        };
        self.emit(instruction);
        Ok(())
    }
}
