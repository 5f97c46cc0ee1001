use super::{Graph, NodeId, NodeKind, TypeId, Variant};
use std::fmt::Write;

/// Print an analysed graph back as source code. Implicit casts and
/// pointers are not written since the analyzer inserts them again, and
/// folded expressions print as their values.
pub fn to_source_code(graph: &Graph) -> String {
    let mut printer = Printer {
        graph,
        out: String::new(),
        depth: 0,
    };
    printer.program();
    printer.out
}

struct Printer<'a> {
    graph: &'a Graph,
    out: String,
    depth: usize,
}

impl<'a> Printer<'a> {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push('\t');
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn type_name(&self, ty: Option<TypeId>) -> String {
        ty.map(|t| self.graph.types.name(t)).unwrap_or_else(|| "?".into())
    }

    fn program(&mut self) {
        let graph = self.graph;
        if !graph.constants().is_empty() {
            self.line("CONST");
            self.depth += 1;
            for constant in graph.constants() {
                let value = match graph.kind(*constant) {
                    NodeKind::Constant { value, .. } => self.expression(*value),
                    _ => continue,
                };
                let text = match graph.ty(*constant) {
                    Some(ty) => format!("{} = {} AS {}", graph.name(*constant), value, graph.types.name(ty)),
                    None => format!("{} = {}", graph.name(*constant), value),
                };
                self.line(&text);
            }
            self.depth -= 1;
            self.line("END CONST");
        }
        for s in graph.structs() {
            self.line(&format!("TYPE {}", graph.name(*s)));
            self.fields(&graph.children(*s));
            self.line("END TYPE");
        }
        for library in graph.libraries() {
            match graph.kind(*library) {
                NodeKind::CodeBlock { executors, functions } if executors.is_empty() => {
                    self.line("CODE");
                    self.functions(functions);
                }
                NodeKind::CodeBlock { executors, functions } => {
                    self.line(&format!("CODE {}", executors.join(", ")));
                    self.functions(functions);
                }
                _ => continue,
            }
            self.line("END CODE");
        }
        for module in graph.modules() {
            self.module(*module);
        }
        if !graph.channels().is_empty() {
            self.line("TRANSMISSION");
            self.depth += 1;
            for channel in graph.channels() {
                if let NodeKind::Channel {
                    source, destination, ..
                } = graph.kind(*channel)
                {
                    self.line(&format!("{}.{} TO {}.{}", source.0, source.1, destination.0, destination.1));
                }
            }
            self.depth -= 1;
            self.line("END TRANSMISSION");
        }
    }

    fn fields(&mut self, fields: &[NodeId]) {
        self.depth += 1;
        for field in fields {
            let text = format!("{} AS {}", self.graph.name(*field), self.type_name(self.graph.ty(*field)));
            self.line(&text);
        }
        self.depth -= 1;
    }

    fn module(&mut self, module: NodeId) {
        let graph = self.graph;
        let (name, executor, data_sets, functions) = match graph.kind(module) {
            NodeKind::Module {
                name,
                executor,
                data_sets,
                functions,
                ..
            } => (name, executor, data_sets, functions),
            _ => return,
        };
        self.line(&format!("MODULE {} {}", name, executor));
        self.depth += 1;
        for data_set in data_sets {
            if let NodeKind::DataSet { prefix, fields } = graph.kind(*data_set) {
                self.line(&format!("DATA {}", prefix));
                self.fields(fields);
                self.line("END DATA");
            }
        }
        let (main, rest): (Vec<NodeId>, Vec<NodeId>) = functions.iter().partition(|f| graph.name(**f) == "MAIN");
        let ordered: Vec<NodeId> = main.into_iter().chain(rest).collect();
        self.line("CODE");
        self.functions(&ordered);
        self.line("END CODE");
        self.depth -= 1;
        self.line("END MODULE");
    }

    fn functions(&mut self, functions: &[NodeId]) {
        let graph = self.graph;
        self.depth += 1;
        for function in functions {
            let returns = match graph.ty(*function) {
                Some(ty) => format!(" AS {}", graph.types.name(ty)),
                None => String::new(),
            };
            match graph.kind(*function) {
                NodeKind::Native { name, arguments } => {
                    let arguments: Vec<String> = arguments.iter().map(|a| graph.types.name(*a)).collect();
                    self.line(&format!("DECLARE FUNCTION {}({}){}", name, arguments.join(", "), returns));
                }
                NodeKind::Function {
                    name, arguments, body, ..
                } => {
                    let arguments: Vec<String> = arguments
                        .iter()
                        .map(|a| format!("{} AS {}", graph.name(*a), self.type_name(graph.ty(*a))))
                        .collect();
                    self.line(&format!("FUNCTION {}({}){}", name, arguments.join(", "), returns));
                    self.block(*body);
                    self.line("END FUNCTION");
                }
                _ => {}
            }
        }
        self.depth -= 1;
    }

    fn block(&mut self, block: NodeId) {
        self.depth += 1;
        if let NodeKind::Block { statements, .. } = self.graph.kind(block) {
            for statement in statements {
                self.statement(*statement);
            }
        }
        self.depth -= 1;
    }

    fn statement(&mut self, id: NodeId) {
        let graph = self.graph;
        match graph.kind(id) {
            NodeKind::Var { name, value, .. } => {
                let mut text = format!("VAR {}", name);
                if let Some(value) = value {
                    write!(text, " = {}", self.expression(*value)).ok();
                }
                if let Some(ty) = graph.ty(id) {
                    write!(text, " AS {}", graph.types.name(ty)).ok();
                }
                self.line(&text);
            }
            NodeKind::Assign { value, target } => {
                let text = format!("{} = {}", self.expression(*target), self.expression(*value));
                self.line(&text);
            }
            NodeKind::Invoke { call } => {
                let text = self.expression(*call);
                self.line(&text);
            }
            NodeKind::Return { value: Some(value) } => {
                let text = format!("RETURN {}", self.expression(*value));
                self.line(&text);
            }
            NodeKind::Return { value: None } => self.line("RETURN"),
            NodeKind::If { branches, otherwise } => {
                for (index, (condition, body)) in branches.iter().enumerate() {
                    let keyword = if index == 0 { "IF" } else { "ELSE IF" };
                    let text = format!("{} {} THEN", keyword, self.expression(*condition));
                    self.line(&text);
                    self.block(*body);
                }
                if let Some(body) = otherwise {
                    self.line("ELSE");
                    self.block(*body);
                }
                self.line("END IF");
            }
            NodeKind::For {
                counter,
                start,
                end,
                step,
                body,
                ..
            } => {
                let counter = self.expression(*counter);
                let mut text = format!("FOR {} = {} TO {}", counter, self.expression(*start), self.expression(*end));
                if let Some(step) = step {
                    write!(text, " STEP {}", self.expression(*step)).ok();
                }
                self.line(&text);
                self.block(*body);
                self.line(&format!("NEXT {}", counter));
            }
            NodeKind::Do {
                condition,
                post,
                negative,
                body,
            } => {
                let condition = condition.map(|c| {
                    let keyword = if *negative { "UNTIL" } else { "WHILE" };
                    format!(" {} {}", keyword, self.expression(c))
                });
                let (head, tail) = match (condition, post) {
                    (Some(c), false) => (c, String::new()),
                    (Some(c), true) => (String::new(), c),
                    (None, _) => (String::new(), String::new()),
                };
                self.line(&format!("DO{}", head));
                self.block(*body);
                self.line(&format!("LOOP{}", tail));
            }
            _ => {}
        }
    }

    fn expression(&self, id: NodeId) -> String {
        let graph = self.graph;
        match graph.kind(id) {
            NodeKind::Literal(value) => literal(value),
            NodeKind::Name { name, .. } => name.clone(),
            NodeKind::Member { target, name, .. } => format!("{}.{}", self.operand(*target), name),
            NodeKind::Call { name, arguments, .. } => {
                let arguments: Vec<String> = arguments.iter().map(|a| self.expression(*a)).collect();
                format!("{}({})", name, arguments.join(", "))
            }
            NodeKind::Unary { op, operand } => format!("{}{}", op, self.operand(*operand)),
            NodeKind::Binary { op, left, right } => {
                format!("{} {} {}", self.operand(*left), op, self.operand(*right))
            }
            NodeKind::Cast { operand } => self.expression(*operand),
            NodeKind::Pointer { target, .. } => self.expression(*target),
            _ => String::new(),
        }
    }

    /// Operators inside operators are always parenthesized.
    fn operand(&self, id: NodeId) -> String {
        let mut inner = id;
        while let NodeKind::Cast { operand: next } | NodeKind::Pointer { target: next, .. } = self.graph.kind(inner) {
            inner = *next;
        }
        let text = self.expression(inner);
        match self.graph.kind(inner) {
            NodeKind::Unary { .. } | NodeKind::Binary { .. } => format!("({})", text),
            NodeKind::Literal(Variant::Integral(n)) if *n < 0 => format!("({})", text),
            NodeKind::Literal(Variant::Real(r)) if r.sign() < 0 => format!("({})", text),
            _ => text,
        }
    }
}

fn literal(value: &Variant) -> String {
    match value {
        Variant::Boolean(true) => "TRUE".into(),
        Variant::Boolean(false) => "FALSE".into(),
        Variant::Integral(n) => n.to_string(),
        Variant::Real(r) => {
            let text = r.to_string();
            if text.contains('.') {
                text
            } else {
                format!("{}.0", text)
            }
        }
        Variant::String(s) => format!("\"{}\"", s.replace('"', "\"\"")),
    }
}
