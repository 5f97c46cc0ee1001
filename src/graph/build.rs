use super::{DataType, Graph, NodeId, NodeKind, TypeId, Types, Variant};
use crate::error;
use crate::lang::ast::{self, Expression, Statement};
use crate::lang::{Error, Fragment};
use std::collections::HashSet;
use std::rc::Rc;

type Result<T> = std::result::Result<T, Error>;

/// Lower the raw syntax tree into a program graph. Names stay unbound
/// and types unresolved; the analyzer takes it from there.
pub fn build(program: &ast::Program) -> Result<Graph> {
    let fragment = program
        .modules
        .first()
        .map(|m| Fragment::new(&m.fragment.file, 0, 0..0))
        .unwrap_or_else(|| Fragment::new(&Rc::from(""), 0, 0..0));
    let mut builder = Builder {
        graph: Graph::new(fragment),
    };
    builder.program(program)?;
    Ok(builder.graph)
}

struct Builder {
    graph: Graph,
}

impl Builder {
    fn program(&mut self, program: &ast::Program) -> Result<()> {
        let mut names = HashSet::new();
        let mut constants = vec![];
        for constant in &program.constants {
            if !names.insert(constant.name.as_str()) {
                return Err(error!(DuplicateConstant, &constant.fragment; "{}", constant.name));
            }
            constants.push(self.constant(constant)?);
        }
        let mut structs = vec![];
        for s in &program.structs {
            structs.push(self.r#struct(s)?);
        }
        let mut libraries = vec![];
        for block in &program.libraries {
            let functions = self.functions(&block.functions)?;
            let kind = NodeKind::CodeBlock {
                executors: block.executors.clone(),
                functions,
            };
            libraries.push(self.graph.add(&block.fragment, kind, None));
        }
        let mut modules = vec![];
        for module in &program.modules {
            modules.push(self.module(module)?);
        }
        let mut channels = vec![];
        for channel in &program.channels {
            let kind = NodeKind::Channel {
                source: channel.source.clone(),
                destination: channel.destination.clone(),
                fields: None,
            };
            channels.push(self.graph.add(&channel.fragment, kind, None));
        }
        let root = self.graph.root();
        for child in constants.iter().chain(&structs).chain(&libraries).chain(&modules).chain(&channels) {
            self.graph.set_owner(*child, root);
        }
        *self.graph.kind_mut(root) = NodeKind::Program {
            constants,
            structs,
            libraries,
            modules,
            channels,
        };
        Ok(())
    }

    fn constant(&mut self, constant: &ast::Constant) -> Result<NodeId> {
        let ty = match &constant.data_type {
            Some(data_type) => Some(self.data_type(data_type)?),
            None => None,
        };
        let value = self.expression(&constant.value)?;
        let kind = NodeKind::Constant {
            name: constant.name.clone(),
            value,
        };
        Ok(self.graph.add(&constant.fragment, kind, ty))
    }

    fn r#struct(&mut self, s: &ast::Struct) -> Result<NodeId> {
        let fields = self.fields(&s.fields, &mut HashSet::new())?;
        let kind = NodeKind::Struct {
            name: s.name.clone(),
            fields,
        };
        let id = self.graph.add(&s.fragment, kind, None);
        let ty = self.graph.types.add(DataType::Struct(id, s.name.clone()));
        self.graph.set_ty(id, ty);
        Ok(id)
    }

    fn fields(&mut self, fields: &[ast::Field], names: &mut HashSet<String>) -> Result<Vec<NodeId>> {
        let mut ids = vec![];
        for field in fields {
            if !names.insert(field.name.clone()) {
                return Err(error!(DuplicateField, &field.fragment; "{}", field.name));
            }
            let ty = self.data_type(&field.data_type)?;
            let kind = NodeKind::Field {
                name: field.name.clone(),
                offset: 0,
            };
            ids.push(self.graph.add(&field.fragment, kind, Some(ty)));
        }
        Ok(ids)
    }

    fn module(&mut self, module: &ast::Module) -> Result<NodeId> {
        let mut names = HashSet::new();
        let mut data_sets = vec![];
        for data_set in &module.data_sets {
            let fields = self.fields(&data_set.fields, &mut names)?;
            let kind = NodeKind::DataSet {
                prefix: data_set.prefix,
                fields,
            };
            data_sets.push(self.graph.add(&data_set.fragment, kind, None));
        }
        let mut seen = HashSet::new();
        let mut functions = vec![];
        for block in &module.code_blocks {
            for function in &block.functions {
                if !seen.insert(function.name()) {
                    let fragment = match function {
                        ast::Function::Native(f) => &f.fragment,
                        ast::Function::User(f) => &f.fragment,
                    };
                    return Err(error!(FunctionAlreadyExists, fragment; "{}", function.name()));
                }
            }
            functions.extend(self.functions(&block.functions)?);
        }
        let kind = NodeKind::Module {
            name: module.name.clone(),
            executor: module.executor.clone(),
            data_sets,
            functions,
            reachable: vec![],
            data: Default::default(),
            data_size: 0,
        };
        Ok(self.graph.add(&module.fragment, kind, None))
    }

    fn functions(&mut self, functions: &[ast::Function]) -> Result<Vec<NodeId>> {
        functions.iter().map(|f| self.function(f)).collect()
    }

    fn function(&mut self, function: &ast::Function) -> Result<NodeId> {
        match function {
            ast::Function::Native(native) => {
                let mut arguments = vec![];
                for data_type in &native.arguments {
                    arguments.push(self.data_type(data_type)?);
                }
                let ty = self.returns(&native.returns)?;
                let kind = NodeKind::Native {
                    name: native.name.clone(),
                    arguments,
                };
                Ok(self.graph.add(&native.fragment, kind, ty))
            }
            ast::Function::User(user) => {
                let mut names = HashSet::new();
                let mut arguments = vec![];
                for argument in &user.arguments {
                    if !names.insert(argument.name.as_str()) {
                        return Err(error!(DuplicateArgument, &argument.fragment; "{}", argument.name));
                    }
                    let ty = self.data_type(&argument.data_type)?;
                    let kind = NodeKind::Argument {
                        name: argument.name.clone(),
                        offset: 0,
                    };
                    arguments.push(self.graph.add(&argument.fragment, kind, Some(ty)));
                }
                let ty = self.returns(&user.returns)?;
                let body = self.block(&user.fragment, &user.body)?;
                let kind = NodeKind::Function {
                    name: user.name.clone(),
                    arguments,
                    body,
                    frame: Default::default(),
                };
                Ok(self.graph.add(&user.fragment, kind, ty))
            }
        }
    }

    fn returns(&mut self, returns: &Option<ast::DataType>) -> Result<Option<TypeId>> {
        match returns {
            Some(data_type) => Ok(Some(self.data_type(data_type)?)),
            None => Ok(None),
        }
    }

    fn block(&mut self, fragment: &Fragment, statements: &[Statement]) -> Result<NodeId> {
        let mut ids = vec![];
        for statement in statements {
            ids.push(self.statement(statement)?);
        }
        let kind = NodeKind::Block {
            statements: ids,
            implicit: vec![],
        };
        Ok(self.graph.add(fragment, kind, None))
    }

    fn statement(&mut self, statement: &Statement) -> Result<NodeId> {
        let (fragment, kind, ty) = match statement {
            Statement::Var(fragment, name, data_type, value) => {
                let ty = self.returns(data_type)?;
                let value = self.optional(value)?;
                let kind = NodeKind::Var {
                    name: name.clone(),
                    value,
                    offset: 0,
                };
                (fragment, kind, ty)
            }
            Statement::Assign(fragment, target, value) => {
                let value = self.expression(value)?;
                let target = self.expression(target)?;
                (fragment, NodeKind::Assign { value, target }, None)
            }
            Statement::Call(fragment, call) => {
                let call = self.expression(call)?;
                (fragment, NodeKind::Invoke { call }, None)
            }
            Statement::Return(fragment, value) => {
                let value = self.optional(value)?;
                (fragment, NodeKind::Return { value }, None)
            }
            Statement::If(fragment, branches, otherwise) => {
                let mut ids = vec![];
                for (condition, body) in branches {
                    let condition = self.expression(condition)?;
                    let body = self.block(fragment, body)?;
                    ids.push((condition, body));
                }
                let otherwise = match otherwise {
                    Some(body) => Some(self.block(fragment, body)?),
                    None => None,
                };
                let kind = NodeKind::If {
                    branches: ids,
                    otherwise,
                };
                (fragment, kind, None)
            }
            Statement::For(fragment, r#for) => {
                let counter = self.expression(&r#for.counter)?;
                let start = self.expression(&r#for.start)?;
                let end = self.expression(&r#for.end)?;
                let step = self.optional(&r#for.step)?;
                let body = self.block(fragment, &r#for.body)?;
                let kind = NodeKind::For {
                    counter,
                    start,
                    end,
                    step,
                    body,
                    temps: [0; 3],
                };
                (fragment, kind, None)
            }
            Statement::Do(fragment, condition, body) => {
                let (expression, post, negative) = match condition {
                    Some(c) => (Some(self.expression(&c.expression)?), c.post, c.negative),
                    None => (None, false, false),
                };
                let body = self.block(fragment, body)?;
                let kind = NodeKind::Do {
                    condition: expression,
                    post,
                    negative,
                    body,
                };
                (fragment, kind, None)
            }
        };
        Ok(self.graph.add(fragment, kind, ty))
    }

    fn optional(&mut self, expression: &Option<Expression>) -> Result<Option<NodeId>> {
        match expression {
            Some(e) => Ok(Some(self.expression(e)?)),
            None => Ok(None),
        }
    }

    fn expression(&mut self, expression: &Expression) -> Result<NodeId> {
        let (kind, ty) = match expression {
            Expression::Integer(_, n) => (NodeKind::Literal(Variant::Integral(*n as i64)), Some(Types::INTEGER)),
            Expression::Long(_, n) => (NodeKind::Literal(Variant::Integral(*n)), Some(Types::LONG)),
            Expression::Real(_, r) => (NodeKind::Literal(Variant::Real(*r)), Some(Types::REAL)),
            Expression::Boolean(_, b) => (NodeKind::Literal(Variant::Boolean(*b)), Some(Types::BOOLEAN)),
            Expression::String(_, s) => {
                let ty = self.graph.types.string_of(s.encode_utf16().count() as u32);
                (NodeKind::Literal(Variant::String(s.clone())), Some(ty))
            }
            Expression::Name(_, name) => {
                let kind = NodeKind::Name {
                    name: name.clone(),
                    decl: None,
                };
                (kind, None)
            }
            Expression::Member(_, target, name) => {
                let target = self.expression(target)?;
                let kind = NodeKind::Member {
                    target,
                    name: name.clone(),
                    decl: None,
                };
                (kind, None)
            }
            Expression::Call(_, name, arguments) => {
                let mut ids = vec![];
                for argument in arguments {
                    ids.push(self.expression(argument)?);
                }
                let kind = NodeKind::Call {
                    name: name.clone(),
                    arguments: ids,
                    callee: None,
                };
                (kind, None)
            }
            Expression::Unary(_, op, operand) => {
                let operand = self.expression(operand)?;
                (NodeKind::Unary { op: *op, operand }, None)
            }
            Expression::Binary(_, op, left, right) => {
                let left = self.expression(left)?;
                let right = self.expression(right)?;
                (NodeKind::Binary { op: *op, left, right }, None)
            }
        };
        Ok(self.graph.add(expression.fragment(), kind, ty))
    }

    fn data_type(&mut self, data_type: &ast::DataType) -> Result<TypeId> {
        use ast::DataType as Raw;
        Ok(match data_type {
            Raw::Boolean => Types::BOOLEAN,
            Raw::Byte => Types::BYTE,
            Raw::Short => Types::SHORT,
            Raw::Integer => Types::INTEGER,
            Raw::Long => Types::LONG,
            Raw::Real => Types::REAL,
            Raw::String(None) => Types::STRING,
            Raw::String(Some(length)) => {
                let node = self.expression(length)?;
                self.graph.types.add(DataType::PendingString(node))
            }
            Raw::Pointer(inner) => {
                let inner = self.data_type(inner)?;
                self.graph.types.pointer_to(inner)
            }
            Raw::Constant(inner) => {
                let inner = self.data_type(inner)?;
                self.graph.types.constant(inner)
            }
            Raw::Named(fragment, name) => {
                let id = self.graph.types.add(DataType::Named(name.clone()));
                self.graph.type_refs.push((id, fragment.clone()));
                id
            }
        })
    }
}
