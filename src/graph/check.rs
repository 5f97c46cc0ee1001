use super::analyze::{is_addressable, Analyzer};
use super::{fold, DataType, NodeId, NodeKind, TypeId, Types, Variant};
use crate::error;
use crate::lang::ast::{BinaryOp, UnaryOp};
use crate::lang::{Error, ErrorCode};

type Result<T> = std::result::Result<T, Error>;

/// Characters needed to print a value of each type.
fn text_capacity(types: &Types, ty: TypeId) -> Option<u32> {
    if types.is_boolean(ty) {
        return Some(5);
    }
    Some(match types.rank(ty)? {
        1 => 4,
        2 => 6,
        3 => 11,
        4 => 20,
        _ => 21,
    })
}

impl<'a> Analyzer<'a> {
    // *** checkTypes

    pub(super) fn check_types(&mut self) -> Result<()> {
        for id in self.graph.types.unresolved() {
            self.resolve_length(id)?;
        }
        for constant in self.graph.constants().to_vec() {
            self.check_constant(constant)?;
        }
        for s in self.graph.structs().to_vec() {
            for field in self.graph.children(s) {
                self.check_declared(field, ErrorCode::FieldCanNotBeConstant, ErrorCode::FieldCanNotBeAbstract)?;
            }
        }
        for module in self.graph.modules().to_vec() {
            for field in self.graph.data_fields(module, None) {
                self.check_declared(field, ErrorCode::FieldCanNotBeConstant, ErrorCode::FieldCanNotBeAbstract)?;
            }
        }
        let mut functions = self.all_functions();
        let owners: Vec<NodeId> = self.graph.libraries().iter().chain(self.graph.modules()).copied().collect();
        for owner in owners {
            for child in self.graph.children(owner) {
                if let NodeKind::Native { arguments, .. } = self.graph.kind(child) {
                    for argument in arguments.clone() {
                        self.check_type(child, argument, ErrorCode::ArgumentCanNotBeConstant, ErrorCode::ArgumentCanNotBeAbstract)?;
                    }
                    functions.push(child);
                }
            }
        }
        for function in &functions {
            if let Some(ty) = self.graph.ty(*function) {
                self.check_type(*function, ty, ErrorCode::ReturnTypeCanNotBeConstant, ErrorCode::ReturnTypeCanNotBeAbstract)?;
            }
        }
        for function in self.all_functions() {
            let (arguments, body) = match self.graph.kind(function) {
                NodeKind::Function { arguments, body, .. } => (arguments.clone(), *body),
                _ => continue,
            };
            for argument in arguments {
                self.check_declared(argument, ErrorCode::ArgumentCanNotBeConstant, ErrorCode::ArgumentCanNotBeAbstract)?;
            }
            self.check_statement(body, function)?;
        }
        for channel in self.graph.channels().to_vec() {
            self.check_channel(channel)?;
        }
        Ok(())
    }

    /// Evaluate the length of a `STRING OF <expr>`.
    fn resolve_length(&mut self, id: TypeId) -> Result<()> {
        let node = match self.graph.types.get(id) {
            DataType::PendingString(node) => *node,
            _ => return Ok(()),
        };
        let fragment = self.graph.fragment(node).clone();
        if !self.checking.insert(node) {
            return Err(error!(RecursiveDefinition, &fragment));
        }
        self.check_value(node)?;
        let length = match fold::calculate(self.graph, node) {
            Some(Variant::Integral(n)) if n > 0 && n <= i16::max_value() as i64 => n as u32,
            Some(_) => return Err(error!(InvalidStringLength, &fragment)),
            None => return Err(error!(ExpectedConstantExpression, &fragment)),
        };
        self.graph.types.resolve(id, DataType::String(Some(length)));
        self.checking.remove(&node);
        Ok(())
    }

    /// Resolve whatever string lengths a type depends on.
    fn resolve_type(&mut self, ty: TypeId) -> Result<()> {
        match self.graph.types.get(ty).clone() {
            DataType::PendingString(_) => self.resolve_length(ty),
            DataType::Pointer(inner) | DataType::Constant(inner) => self.resolve_type(inner),
            _ => Ok(()),
        }
    }

    fn check_constant(&mut self, constant: NodeId) -> Result<TypeId> {
        let fragment = self.graph.fragment(constant).clone();
        if self.checked.contains(&constant) {
            return match self.graph.ty(constant) {
                Some(ty) => Ok(ty),
                None => Err(error!(InternalError, &fragment)),
            };
        }
        if !self.checking.insert(constant) {
            return Err(error!(RecursiveDefinition, &fragment; "{}", self.graph.name(constant)));
        }
        let value = match self.graph.kind(constant) {
            NodeKind::Constant { value, .. } => *value,
            _ => return Err(error!(InternalError, &fragment)),
        };
        let actual = self.check_value(value)?;
        let ty = match self.graph.ty(constant) {
            Some(declared) => {
                self.resolve_type(declared)?;
                let declared = self.graph.types.base(declared);
                if self.graph.types.is_abstract(declared) {
                    self.graph.types.base(actual)
                } else {
                    self.coerce(constant, value, declared, ErrorCode::IncompatibleTypes)?;
                    declared
                }
            }
            None => self.graph.types.base(actual),
        };
        let value = match self.graph.kind(constant) {
            NodeKind::Constant { value, .. } => *value,
            _ => value,
        };
        if fold::calculate(self.graph, value).is_none() {
            return Err(error!(ExpectedConstantExpression, self.graph.fragment(value)));
        }
        self.graph.set_ty(constant, ty);
        self.checking.remove(&constant);
        self.checked.insert(constant);
        Ok(ty)
    }

    fn check_declared(&mut self, id: NodeId, constant: ErrorCode, r#abstract: ErrorCode) -> Result<()> {
        match self.graph.ty(id) {
            Some(ty) => self.check_type(id, ty, constant, r#abstract),
            None => Err(error!(InternalError, self.graph.fragment(id); "UNTYPED DECLARATION")),
        }
    }

    fn check_type(&mut self, id: NodeId, ty: TypeId, constant: ErrorCode, r#abstract: ErrorCode) -> Result<()> {
        self.resolve_type(ty)?;
        let fragment = self.graph.fragment(id).clone();
        let types = &self.graph.types;
        if types.is_constant(ty) {
            return Err(Error::new(constant).in_fragment(&fragment).message(types.name(ty)));
        }
        if types.is_abstract(ty) {
            return Err(Error::new(r#abstract).in_fragment(&fragment).message(types.name(ty)));
        }
        Ok(())
    }

    fn check_channel(&mut self, channel: NodeId) -> Result<()> {
        let (output, input) = match self.graph.kind(channel) {
            NodeKind::Channel {
                fields: Some(fields), ..
            } => *fields,
            _ => return Ok(()),
        };
        let types = &self.graph.types;
        let (a, b) = match (self.graph.ty(output), self.graph.ty(input)) {
            (Some(a), Some(b)) => (a, b),
            _ => return Err(error!(InternalError, self.graph.fragment(channel))),
        };
        if types.is_abstract(a) || !types.is_binary_analog(a, b) {
            return Err(error!(NonTransferableTypes, self.graph.fragment(channel); "{} TO {}", types.name(a), types.name(b)));
        }
        Ok(())
    }

    // *** Statements

    fn check_statement(&mut self, id: NodeId, function: NodeId) -> Result<()> {
        let fragment = self.graph.fragment(id).clone();
        match self.graph.kind(id).clone() {
            NodeKind::Block { statements, .. } => {
                for statement in statements {
                    self.check_statement(statement, function)?;
                }
            }
            NodeKind::Var { value, .. } => {
                let declared = self.graph.ty(id);
                if let Some(declared) = declared {
                    self.resolve_type(declared)?;
                    if self.graph.types.is_abstract(declared) {
                        return Err(error!(VariableCanNotBeAbstract, &fragment; "{}", self.graph.name(id)));
                    }
                }
                match (declared, value) {
                    (Some(declared), Some(value)) => {
                        self.check_value(value)?;
                        self.coerce(id, value, declared, ErrorCode::IncompatibleTypes)?;
                    }
                    (None, Some(value)) => {
                        let actual = self.check_value(value)?;
                        let inferred = self.graph.types.base(actual);
                        self.graph.set_ty(id, inferred);
                    }
                    (Some(_), None) => {}
                    (None, None) => return Err(error!(ExpectedDataType, &fragment; "{}", self.graph.name(id))),
                }
            }
            NodeKind::Assign { value, target } => {
                let actual = self.check_value(value)?;
                self.infer_implicit(target, actual);
                let expected = self.check_target(target)?;
                self.coerce(id, value, expected, ErrorCode::IncompatibleTypes)?;
            }
            NodeKind::Invoke { call } => {
                self.check_expression(call)?;
            }
            NodeKind::Return { value } => match (self.graph.ty(function), value) {
                (Some(expected), Some(value)) => {
                    self.check_value(value)?;
                    self.coerce(id, value, expected, ErrorCode::IncompatibleTypes)?;
                }
                (Some(_), None) => return Err(error!(ReturnValueExpected, &fragment)),
                (None, Some(_)) => return Err(error!(UnexpectedReturnValue, &fragment)),
                (None, None) => {}
            },
            NodeKind::If { branches, otherwise } => {
                for (condition, body) in branches {
                    self.check_condition(condition)?;
                    self.check_statement(body, function)?;
                }
                if let Some(body) = otherwise {
                    self.check_statement(body, function)?;
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
                let actual = self.check_value(start)?;
                self.infer_implicit(counter, actual);
                let ty = self.check_target(counter)?;
                if !self.graph.types.is_numeric(ty) {
                    return Err(error!(CounterMustBeNumeric, self.graph.fragment(counter); "{}", self.graph.types.name(ty)));
                }
                self.coerce(id, start, ty, ErrorCode::IncompatibleTypes)?;
                self.check_value(end)?;
                self.coerce(id, end, ty, ErrorCode::IncompatibleTypes)?;
                if let Some(step) = step {
                    self.check_value(step)?;
                    self.coerce(id, step, ty, ErrorCode::IncompatibleTypes)?;
                }
                self.check_statement(body, function)?;
            }
            NodeKind::Do { condition, body, .. } => {
                if let Some(condition) = condition {
                    self.check_condition(condition)?;
                }
                self.check_statement(body, function)?;
            }
            _ => return Err(error!(InternalError, &fragment; "NOT A STATEMENT")),
        }
        Ok(())
    }

    /// The first assignment gives an implicit local its type.
    fn infer_implicit(&mut self, target: NodeId, actual: TypeId) {
        if let NodeKind::Name { decl: Some(decl), .. } = self.graph.kind(target) {
            let decl = *decl;
            if matches!(self.graph.kind(decl), NodeKind::Var { .. }) && self.graph.ty(decl).is_none() {
                let inferred = self.graph.types.base(actual);
                self.graph.set_ty(decl, inferred);
            }
        }
    }

    fn check_target(&mut self, target: NodeId) -> Result<TypeId> {
        let ty = self.check_value(target)?;
        let fragment = self.graph.fragment(target);
        if !is_addressable(self.graph, target) {
            return Err(error!(ExpressionIsNotAssignable, fragment));
        }
        if self.graph.types.is_constant(ty) {
            return Err(error!(CanNotAssignToConstant, fragment; "{}", self.graph.name(target)));
        }
        Ok(ty)
    }

    fn check_condition(&mut self, id: NodeId) -> Result<()> {
        let ty = self.check_value(id)?;
        if !self.graph.types.is_boolean(ty) {
            let name = self.graph.types.name(ty);
            return Err(error!(ConditionMustBeBoolean, self.graph.fragment(id); "{}", name));
        }
        Ok(())
    }

    // *** Expressions

    /// Type of an expression that must produce a value.
    pub(super) fn check_value(&mut self, id: NodeId) -> Result<TypeId> {
        match self.check_expression(id)? {
            Some(ty) => Ok(ty),
            None => Err(error!(FunctionDoesNotReturnValue, self.graph.fragment(id); "{}", self.graph.name(id))),
        }
    }

    fn check_expression(&mut self, id: NodeId) -> Result<Option<TypeId>> {
        let fragment = self.graph.fragment(id).clone();
        let ty = match self.graph.kind(id).clone() {
            NodeKind::Literal(_) | NodeKind::Cast { .. } | NodeKind::Pointer { .. } => self.graph.ty(id),
            NodeKind::Name { name, decl } => {
                let decl = match decl {
                    Some(decl) => decl,
                    None => return Err(error!(CannotResolveSymbol, &fragment; "{}", name)),
                };
                let ty = match self.graph.kind(decl) {
                    NodeKind::Constant { .. } => {
                        let ty = self.check_constant(decl)?;
                        Some(self.graph.types.constant(ty))
                    }
                    NodeKind::Var { .. } | NodeKind::Argument { .. } | NodeKind::Field { .. } => self.graph.ty(decl),
                    _ => None,
                };
                match ty {
                    Some(ty) => Some(ty),
                    None => return Err(error!(CannotResolveSymbol, &fragment; "{}", name)),
                }
            }
            NodeKind::Member { target, name, .. } => Some(self.check_member(id, target, &name)?),
            NodeKind::Call { arguments, callee, name } => {
                let callee = match callee {
                    Some(callee) => callee,
                    None => return Err(error!(CannotResolveSymbol, &fragment; "{}", name)),
                };
                let parameters = self.graph.parameters(callee);
                if parameters.len() != arguments.len() {
                    return Err(error!(InvalidNumberOfArguments, &fragment; "{}", name));
                }
                for (argument, parameter) in arguments.into_iter().zip(parameters) {
                    self.check_value(argument)?;
                    self.coerce(id, argument, parameter, ErrorCode::IncompatibleArgumentType)?;
                }
                self.graph.ty(callee)
            }
            NodeKind::Unary { op, operand } => {
                let ty = self.check_value(operand)?;
                let types = &self.graph.types;
                let applicable = match op {
                    UnaryOp::Plus | UnaryOp::Minus => types.is_numeric(ty),
                    UnaryOp::Not => types.is_boolean(ty) || types.is_integral(ty),
                };
                if !applicable {
                    return Err(error!(OperatorNotApplicable, &fragment; "{}{}", op, types.name(ty)));
                }
                Some(types.base(ty))
            }
            NodeKind::Binary { op, left, right } => Some(self.check_binary(id, op, left, right)?),
            _ => return Err(error!(InternalError, &fragment; "NOT AN EXPRESSION")),
        };
        if let Some(ty) = ty {
            self.graph.set_ty(id, ty);
        }
        fold::simplify(self.graph, id);
        Ok(ty)
    }

    fn check_member(&mut self, id: NodeId, target: NodeId, name: &str) -> Result<TypeId> {
        let fragment = self.graph.fragment(id).clone();
        let ty = self.check_value(target)?;
        let s = match self.graph.types.struct_node(ty) {
            Some(s) => s,
            None => return Err(error!(NotAStructure, &fragment; "{}", self.graph.types.name(ty))),
        };
        if !is_addressable(self.graph, target) {
            return Err(error!(OperatorNotApplicable, &fragment; ".{}", name));
        }
        let field = self
            .graph
            .children(s)
            .into_iter()
            .find(|f| self.graph.name(*f) == name);
        let field = match field {
            Some(field) => field,
            None => return Err(error!(UnknownField, &fragment; "{}", name)),
        };
        if let NodeKind::Member { decl, .. } = self.graph.kind_mut(id) {
            *decl = Some(field);
        }
        let field_ty = match self.graph.ty(field) {
            Some(t) => t,
            None => return Err(error!(InternalError, &fragment)),
        };
        if self.graph.types.is_constant(ty) {
            Ok(self.graph.types.constant(field_ty))
        } else {
            Ok(field_ty)
        }
    }

    fn check_binary(&mut self, id: NodeId, op: BinaryOp, left: NodeId, right: NodeId) -> Result<TypeId> {
        let fragment = self.graph.fragment(id).clone();
        let lt = self.check_value(left)?;
        let rt = self.check_value(right)?;
        let not_applicable = |types: &Types| {
            error!(OperatorNotApplicable, &fragment; "{} {} {}", types.name(lt), op, types.name(rt))
        };
        let types = &self.graph.types;
        let numeric = types.is_numeric(lt) && types.is_numeric(rt);
        let integral = types.is_integral(lt) && types.is_integral(rt);
        let boolean = types.is_boolean(lt) && types.is_boolean(rt);
        let strings = types.is_string(lt) && types.is_string(rt);
        let common = match (types.rank(lt), types.rank(rt)) {
            (Some(a), Some(b)) => Some(Types::of_rank(a.max(b))),
            _ => None,
        };
        use BinaryOp::*;
        match op {
            Add if types.is_string(lt) || types.is_string(rt) => {
                let l = self.stringify(id, left, lt, &fragment)?;
                let r = self.stringify(id, right, rt, &fragment)?;
                let types = &self.graph.types;
                match (types.string_length(l), types.string_length(r)) {
                    (Some(n), Some(m)) => Ok(self.graph.types.string_of(n + m)),
                    _ => Err(not_applicable(types)),
                }
            }
            Add | Subtract | Multiply | Divide | Mod => {
                let common = match common {
                    Some(common) if op != Mod || integral => common,
                    _ => return Err(not_applicable(types)),
                };
                self.promote(id, left, right, common)?;
                Ok(match (op, common) {
                    (Multiply, Types::BYTE) => Types::SHORT,
                    (Multiply, Types::SHORT) => Types::INTEGER,
                    _ => common,
                })
            }
            Shl | Shr if integral => Ok(types.base(lt)),
            And | Or | Xor if boolean => Ok(Types::BOOLEAN),
            And | Or | Xor if integral => {
                let common = common.unwrap_or(Types::LONG);
                self.promote(id, left, right, common)?;
                Ok(common)
            }
            Less | LessEqual | Greater | GreaterEqual | Equal | NotEqual => {
                if numeric {
                    let common = common.unwrap_or(Types::REAL);
                    self.promote(id, left, right, common)?;
                } else if !(strings || boolean && (op == Equal || op == NotEqual)) {
                    return Err(not_applicable(types));
                }
                Ok(Types::BOOLEAN)
            }
            _ => Err(not_applicable(types)),
        }
    }

    fn promote(&mut self, parent: NodeId, left: NodeId, right: NodeId, common: TypeId) -> Result<()> {
        self.coerce(parent, left, common, ErrorCode::IncompatibleTypes)?;
        self.coerce(parent, right, common, ErrorCode::IncompatibleTypes)
    }

    /// Numbers and booleans next to a string are converted to text.
    fn stringify(&mut self, parent: NodeId, child: NodeId, ty: TypeId, fragment: &crate::lang::Fragment) -> Result<TypeId> {
        if self.graph.types.is_string(ty) {
            return Ok(ty);
        }
        let capacity = match text_capacity(&self.graph.types, ty) {
            Some(capacity) => capacity,
            None => return Err(error!(OperatorNotApplicable, fragment; "{} + STRING", self.graph.types.name(ty))),
        };
        let target = self.graph.types.string_of(capacity);
        self.coerce(parent, child, target, ErrorCode::IncompatibleTypes)?;
        Ok(target)
    }

    // *** Casting

    /// Make `child` of `parent` acceptable where `expected` is required,
    /// inserting a pointer, a folded literal or a cast node.
    fn coerce(&mut self, parent: NodeId, child: NodeId, expected: TypeId, code: ErrorCode) -> Result<()> {
        let fragment = self.graph.fragment(child).clone();
        let actual = match self.graph.ty(child) {
            Some(actual) => actual,
            None => return Err(error!(InternalError, &fragment; "UNTYPED EXPRESSION")),
        };
        let types = &self.graph.types;
        let mismatch = || Error::new(code).in_fragment(&fragment).message(format!("{} TO {}", types.name(actual), types.name(expected)));
        if types.is_binary_analog(actual, expected) {
            return Ok(());
        }
        if let Some(pointee) = types.pointee(expected) {
            let accepted = match types.pointee(actual) {
                Some(from) => {
                    types.inherits(from, pointee) && (types.is_constant(pointee) || !types.is_constant(from))
                }
                None => {
                    let constant = types.is_constant(actual) || fold::calculate(self.graph, child).is_some();
                    types.inherits(actual, pointee) && (types.is_constant(pointee) || !constant)
                }
            };
            if !accepted {
                return Err(mismatch());
            }
            if types.pointee(actual).is_some() {
                return Ok(());
            }
            let pointer = self.graph.add(&fragment, NodeKind::Pointer { target: child, temp: None }, Some(expected));
            self.replace(parent, child, pointer);
            return Ok(());
        }
        let target = types.base(expected);
        if let Some(value) = fold::calculate(self.graph, child) {
            if let Some(folded) = self.static_cast(&value, actual, target) {
                let literal = self.graph.add(&fragment, NodeKind::Literal(folded), Some(target));
                self.replace(parent, child, literal);
                return Ok(());
            }
        }
        let types = &self.graph.types;
        let implicit = if types.is_numeric(actual) && types.is_numeric(target) {
            types.rank(actual) <= types.rank(target)
        } else {
            types.string_length(target).is_some()
                && (types.is_string(actual) || types.is_numeric(actual) || types.is_boolean(actual))
        };
        if !implicit {
            return Err(Error::new(code)
                .in_fragment(&fragment)
                .message(format!("{} TO {}", types.name(actual), types.name(expected))));
        }
        let cast = self.graph.add(&fragment, NodeKind::Cast { operand: child }, Some(target));
        self.replace(parent, child, cast);
        Ok(())
    }

    /// Fold a constant into `target` when it fits.
    fn static_cast(&self, value: &Variant, actual: TypeId, target: TypeId) -> Option<Variant> {
        let types = &self.graph.types;
        let size = types.size(target)? as usize;
        let selector = types.selector(target);
        if types.is_numeric(target) && types.is_numeric(actual) {
            if types.rank(actual) <= types.rank(target) || value.fits(selector, size) {
                return value.cast(selector, size);
            }
            return None;
        }
        if types.string_length(target).is_some() && !types.is_string(actual) && !types.is_numeric(actual) && !types.is_boolean(actual) {
            return None;
        }
        if types.string_length(target).is_some() {
            return value.cast(selector, size);
        }
        None
    }

    fn replace(&mut self, parent: NodeId, old: NodeId, new: NodeId) {
        if !self.graph.replace_child(parent, old, new) {
            tracing::warn!(parent, old, "coercion target is not a child");
        }
    }
}
