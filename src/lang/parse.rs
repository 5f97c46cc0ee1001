use super::ast::*;
use super::token::*;
use super::{Error, ErrorCode, Fragment, Line};
use crate::mach::Fixed;

type Result<T> = std::result::Result<T, Error>;

/// Parse tokenized lines into the raw program tree.
/// Parsing stops at the first error.
pub fn parse(lines: &[Line]) -> Result<Program> {
    Parser { lines, pos: 0 }.program()
}

/// Parse a single expression from tokens; used by tests and tools.
pub fn parse_expression(line: &Line) -> Result<Expression> {
    let mut cursor = Cursor::new(line);
    let tokens = cursor.rest();
    expression(line, tokens, &line.whole())
}

struct Parser<'a> {
    lines: &'a [Line],
    pos: usize,
}

struct Cursor<'a> {
    line: &'a Line,
    tokens: &'a [Spanned],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(line: &'a Line) -> Cursor<'a> {
        Cursor {
            line,
            tokens: line.tokens(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Option<&'a Spanned> {
        let t = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(t)
    }

    /// Fragment of the next token, or the end of the line.
    fn fragment(&self) -> Fragment {
        match self.tokens.get(self.pos) {
            Some((col, _)) => self.line.fragment(col.clone()),
            None => {
                let end = self.tokens.last().map(|(c, _)| c.end).unwrap_or(0);
                self.line.fragment(end..end)
            }
        }
    }

    fn accept(&mut self, keyword: Keyword) -> bool {
        match self.peek() {
            Some(t) if t.is_keyword(keyword) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn expect(&mut self, keyword: Keyword, code: ErrorCode) -> Result<()> {
        if self.accept(keyword) {
            Ok(())
        } else {
            Err(Error::new(code).in_fragment(&self.fragment()))
        }
    }

    fn ident(&mut self, code: ErrorCode) -> Result<(Fragment, String)> {
        let fragment = self.fragment();
        match self.next() {
            Some((_, Token::Ident(s))) => Ok((fragment, s.clone())),
            _ => Err(Error::new(code).in_fragment(&fragment)),
        }
    }

    fn is_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn end(&self) -> Result<()> {
        if self.is_end() {
            Ok(())
        } else {
            Err(error!(UnexpectedSequence, &self.fragment()))
        }
    }

    /// Take tokens up to, not including, the first one matching `stop`.
    fn until<F: Fn(&Token) -> bool>(&mut self, stop: F) -> &'a [Spanned] {
        let start = self.pos;
        while let Some(t) = self.peek() {
            if stop(t) {
                break;
            }
            self.pos += 1;
        }
        &self.tokens[start..self.pos]
    }

    fn rest(&mut self) -> &'a [Spanned] {
        let start = self.pos;
        self.pos = self.tokens.len();
        &self.tokens[start..]
    }

    /// Expression running to the first stop keyword or the end of the line.
    fn expression(&mut self, stop: &[Keyword]) -> Result<Expression> {
        let fragment = self.fragment();
        let tokens = self.until(|t| match t {
            Token::Keyword(k) => stop.contains(k),
            _ => false,
        });
        expression(self.line, tokens, &fragment)
    }
}

fn starts_with(line: &Line, keywords: &[Keyword]) -> bool {
    let tokens = line.tokens();
    tokens.len() >= keywords.len()
        && keywords
            .iter()
            .zip(tokens.iter())
            .all(|(k, (_, t))| t.is_keyword(*k))
}

impl<'a> Parser<'a> {
    fn next_line(&mut self) -> Option<&'a Line> {
        let line = self.lines.get(self.pos)?;
        self.pos += 1;
        Some(line)
    }

    fn end_of_file(&self, opened: &Fragment, what: &str) -> Error {
        error!(UnexpectedEndOfFile, opened; "{} IS NOT CLOSED", what)
    }

    fn program(&mut self) -> Result<Program> {
        let mut program = Program::default();
        while let Some(line) = self.next_line() {
            let mut cursor = Cursor::new(line);
            match cursor.next() {
                Some((_, Token::Keyword(Keyword::Const))) => {
                    cursor.end()?;
                    self.constants(line, &mut program.constants)?;
                }
                Some((_, Token::Keyword(Keyword::Type))) => {
                    let s = self.r#struct(line, &mut cursor)?;
                    if program.structs.iter().any(|x| x.name == s.name) {
                        return Err(error!(TypeAlreadyExists, &s.fragment; "{}", s.name));
                    }
                    program.structs.push(s);
                }
                Some((_, Token::Keyword(Keyword::Code))) => {
                    let executors = self.executors(&mut cursor)?;
                    let block = self.code_block(line, executors)?;
                    program.libraries.push(block);
                }
                Some((_, Token::Keyword(Keyword::Module))) => {
                    let module = self.module(line, &mut cursor)?;
                    match program.modules.binary_search_by(|m| m.name.cmp(&module.name)) {
                        Ok(_) => {
                            return Err(error!(ModuleAlreadyExists, &module.fragment; "{}", module.name))
                        }
                        Err(index) => program.modules.insert(index, module),
                    }
                }
                Some((_, Token::Keyword(Keyword::Transmission))) => {
                    cursor.end()?;
                    self.transmission(line, &mut program.channels)?;
                }
                _ => return Err(error!(UnexpectedSequence, &line.whole())),
            }
        }
        Ok(program)
    }

    fn constants(&mut self, opened: &Line, constants: &mut Vec<Constant>) -> Result<()> {
        loop {
            let line = match self.next_line() {
                Some(line) => line,
                None => return Err(self.end_of_file(&opened.whole(), "CONST")),
            };
            if starts_with(line, &[Keyword::End, Keyword::Const]) {
                return Cursor { pos: 2, ..Cursor::new(line) }.end();
            }
            let mut cursor = Cursor::new(line);
            let (fragment, name) = cursor.ident(ErrorCode::ExpectedVariableName)?;
            match cursor.next() {
                Some((_, Token::Operator(Operator::Equal))) => {}
                _ => return Err(error!(UnexpectedSequence, &cursor.fragment(); "EXPECTED =")),
            }
            let value = cursor.expression(&[Keyword::As])?;
            let data_type = if cursor.accept(Keyword::As) {
                Some(data_type(&mut cursor)?)
            } else {
                None
            };
            cursor.end()?;
            constants.push(Constant {
                fragment,
                name,
                data_type,
                value,
            });
        }
    }

    fn r#struct(&mut self, opened: &Line, cursor: &mut Cursor) -> Result<Struct> {
        let (fragment, name) = cursor.ident(ErrorCode::ExpectedTypeName)?;
        cursor.end()?;
        let mut fields = vec![];
        loop {
            let line = match self.next_line() {
                Some(line) => line,
                None => return Err(self.end_of_file(&opened.whole(), "TYPE")),
            };
            if starts_with(line, &[Keyword::End, Keyword::Type]) {
                Cursor { pos: 2, ..Cursor::new(line) }.end()?;
                return Ok(Struct {
                    fragment,
                    name,
                    fields,
                });
            }
            fields.push(field(line)?);
        }
    }

    fn executors(&mut self, cursor: &mut Cursor) -> Result<Vec<String>> {
        let mut executors = vec![];
        if cursor.is_end() {
            return Ok(executors);
        }
        loop {
            let (_, name) = cursor.ident(ErrorCode::ExpectedModuleExecutor)?;
            executors.push(name);
            match cursor.next() {
                None => return Ok(executors),
                Some((_, Token::Comma)) => continue,
                Some((col, _)) => {
                    return Err(error!(ExpectedComma, &cursor.line.fragment(col.clone())))
                }
            }
        }
    }

    fn code_block(&mut self, opened: &Line, executors: Vec<String>) -> Result<CodeBlock> {
        let mut block = CodeBlock {
            fragment: opened.whole(),
            executors,
            functions: vec![],
        };
        loop {
            let line = match self.next_line() {
                Some(line) => line,
                None => return Err(self.end_of_file(&opened.whole(), "CODE")),
            };
            if starts_with(line, &[Keyword::End, Keyword::Code]) {
                Cursor { pos: 2, ..Cursor::new(line) }.end()?;
                return Ok(block);
            }
            let function = self.function(line)?;
            add_function(&mut block.functions, function)?;
        }
    }

    fn function(&mut self, line: &'a Line) -> Result<Function> {
        let mut cursor = Cursor::new(line);
        if cursor.accept(Keyword::Declare) {
            cursor.expect(Keyword::Function, ErrorCode::UnexpectedSequence)?;
            let (fragment, name) = cursor.ident(ErrorCode::ExpectedFunctionName)?;
            let mut arguments = vec![];
            for (_, tokens) in bracket_list(line, &mut cursor)? {
                let mut arg = Cursor {
                    tokens,
                    ..Cursor::new(line)
                };
                arguments.push(data_type(&mut arg)?);
                arg.end()?;
            }
            let returns = return_type(&mut cursor)?;
            return Ok(Function::Native(NativeFunction {
                fragment,
                name,
                arguments,
                returns,
            }));
        }
        if !cursor.accept(Keyword::Function) {
            return Err(error!(UnexpectedSequence, &line.whole()));
        }
        let (fragment, name) = cursor.ident(ErrorCode::ExpectedFunctionName)?;
        let mut arguments = vec![];
        for (arg_fragment, tokens) in bracket_list(line, &mut cursor)? {
            let mut arg = Cursor {
                tokens,
                ..Cursor::new(line)
            };
            let (fragment, name) = match arg.ident(ErrorCode::ExpectedArgument) {
                Ok(ident) => ident,
                Err(e) => return Err(e.in_fragment(&arg_fragment)),
            };
            arg.expect(Keyword::As, ErrorCode::ExpectedAsKeyword)?;
            let data_type = data_type(&mut arg)?;
            arg.end()?;
            arguments.push(Argument {
                fragment,
                name,
                data_type,
            });
        }
        let returns = return_type(&mut cursor)?;
        let (body, terminator) = self.statements(line, "FUNCTION", |l| {
            starts_with(l, &[Keyword::End, Keyword::Function])
        })?;
        Cursor { pos: 2, ..Cursor::new(terminator) }.end()?;
        Ok(Function::User(UserFunction {
            fragment,
            name,
            arguments,
            returns,
            body,
        }))
    }

    fn module(&mut self, opened: &'a Line, cursor: &mut Cursor) -> Result<Module> {
        let (fragment, name) = cursor.ident(ErrorCode::ExpectedModuleName)?;
        let (_, executor) = cursor.ident(ErrorCode::ExpectedModuleExecutor)?;
        cursor.end()?;
        let mut module = Module {
            fragment,
            name,
            executor,
            data_sets: vec![],
            code_blocks: vec![],
        };
        loop {
            let line = match self.next_line() {
                Some(line) => line,
                None => return Err(self.end_of_file(&opened.whole(), "MODULE")),
            };
            if starts_with(line, &[Keyword::End, Keyword::Module]) {
                Cursor { pos: 2, ..Cursor::new(line) }.end()?;
                return Ok(module);
            }
            let mut cursor = Cursor::new(line);
            match cursor.peek() {
                Some(Token::Keyword(Keyword::Data)) => {
                    cursor.next();
                    let data_set = self.data_set(line, &mut cursor)?;
                    if module.data_sets.iter().any(|d| d.prefix == data_set.prefix) {
                        return Err(error!(DuplicateDataSet, &data_set.fragment; "{}", data_set.prefix));
                    }
                    module.data_sets.push(data_set);
                }
                Some(Token::Keyword(Keyword::Code)) => {
                    cursor.next();
                    cursor.end()?;
                    let block = self.code_block(line, vec![])?;
                    for function in block.functions.iter() {
                        check_module_function(&module, function)?;
                    }
                    module.code_blocks.push(block);
                }
                Some(Token::Keyword(Keyword::Function)) | Some(Token::Keyword(Keyword::Declare)) => {
                    let function = self.function(line)?;
                    check_module_function(&module, &function)?;
                    match module.code_blocks.last_mut() {
                        Some(block) if block.fragment == module.fragment => {
                            block.functions.push(function)
                        }
                        _ => module.code_blocks.push(CodeBlock {
                            fragment: module.fragment.clone(),
                            executors: vec![],
                            functions: vec![function],
                        }),
                    }
                }
                _ => return Err(error!(UnexpectedSequence, &line.whole())),
            }
        }
    }

    fn data_set(&mut self, opened: &Line, cursor: &mut Cursor) -> Result<DataSet> {
        let fragment = opened.whole();
        let prefix = match cursor.next() {
            None => DataPrefix::Private,
            Some((_, Token::Keyword(Keyword::Private))) => DataPrefix::Private,
            Some((_, Token::Keyword(Keyword::Input))) => DataPrefix::Input,
            Some((_, Token::Keyword(Keyword::Output))) => DataPrefix::Output,
            Some((col, _)) => return Err(error!(InvalidDataPrefix, &opened.fragment(col.clone()))),
        };
        cursor.end()?;
        let mut fields = vec![];
        loop {
            let line = match self.next_line() {
                Some(line) => line,
                None => return Err(self.end_of_file(&fragment, "DATA")),
            };
            if starts_with(line, &[Keyword::End, Keyword::Data]) {
                Cursor { pos: 2, ..Cursor::new(line) }.end()?;
                return Ok(DataSet {
                    fragment,
                    prefix,
                    fields,
                });
            }
            fields.push(field(line)?);
        }
    }

    fn transmission(&mut self, opened: &Line, channels: &mut Vec<Channel>) -> Result<()> {
        loop {
            let line = match self.next_line() {
                Some(line) => line,
                None => return Err(self.end_of_file(&opened.whole(), "TRANSMISSION")),
            };
            if starts_with(line, &[Keyword::End, Keyword::Transmission]) {
                return Cursor { pos: 2, ..Cursor::new(line) }.end();
            }
            let mut cursor = Cursor::new(line);
            let source = qualified_field(&mut cursor)?;
            cursor.expect(Keyword::To, ErrorCode::ExpectedToKeyword)?;
            let destination = qualified_field(&mut cursor)?;
            cursor.end()?;
            channels.push(Channel {
                fragment: line.whole(),
                source,
                destination,
            });
        }
    }

    /// Statements up to a terminator line, which is returned unconsumed
    /// by the statement list but consumed from the line stream.
    fn statements<F: Fn(&Line) -> bool>(
        &mut self,
        opened: &Line,
        what: &str,
        terminator: F,
    ) -> Result<(Vec<Statement>, &'a Line)> {
        let mut statements = vec![];
        loop {
            let line = match self.next_line() {
                Some(line) => line,
                None => return Err(self.end_of_file(&opened.whole(), what)),
            };
            if terminator(line) {
                return Ok((statements, line));
            }
            statements.push(self.statement(line)?);
        }
    }

    fn statement(&mut self, line: &'a Line) -> Result<Statement> {
        let mut cursor = Cursor::new(line);
        let fragment = line.whole();
        match cursor.peek() {
            Some(Token::Keyword(Keyword::Var)) => {
                cursor.next();
                self.r#var(fragment, &mut cursor)
            }
            Some(Token::Keyword(Keyword::Return)) => {
                cursor.next();
                if cursor.is_end() {
                    return Ok(Statement::Return(fragment, None));
                }
                let value = cursor.expression(&[])?;
                Ok(Statement::Return(fragment, Some(value)))
            }
            Some(Token::Keyword(Keyword::If)) => {
                cursor.next();
                self.r#if(line, &mut cursor)
            }
            Some(Token::Keyword(Keyword::For)) => {
                cursor.next();
                self.r#for(line, &mut cursor)
            }
            Some(Token::Keyword(Keyword::Do)) => {
                cursor.next();
                self.r#do(line, &mut cursor)
            }
            Some(Token::Ident(_)) => self.r#let(fragment, &mut cursor),
            _ => Err(error!(UnexpectedSequence, &fragment)),
        }
    }

    fn r#var(&mut self, fragment: Fragment, cursor: &mut Cursor) -> Result<Statement> {
        let (_, name) = cursor.ident(ErrorCode::ExpectedVariableName)?;
        let mut value = None;
        if let Some(Token::Operator(Operator::Equal)) = cursor.peek() {
            cursor.next();
            value = Some(cursor.expression(&[Keyword::As])?);
        }
        let mut data_type_ = None;
        if cursor.accept(Keyword::As) {
            data_type_ = Some(data_type(cursor)?);
        }
        cursor.end()?;
        if value.is_none() && data_type_.is_none() {
            return Err(error!(ExpectedAsKeyword, &cursor.fragment()));
        }
        Ok(Statement::Var(fragment, name, data_type_, value))
    }

    fn r#let(&mut self, fragment: Fragment, cursor: &mut Cursor) -> Result<Statement> {
        let line = cursor.line;
        let target = cursor.until(|t| *t == Token::Operator(Operator::Equal));
        if cursor.is_end() {
            let expr = expression(line, target, &fragment)?;
            return match expr {
                Expression::Call(..) => Ok(Statement::Call(fragment, expr)),
                _ => Err(error!(UnexpectedSequence, &fragment)),
            };
        }
        let equal = cursor.fragment();
        cursor.next();
        let target = expression(line, target, &fragment)?;
        let value = expression(line, cursor.rest(), &equal)?;
        Ok(Statement::Assign(fragment, target, value))
    }

    fn r#if(&mut self, line: &'a Line, cursor: &mut Cursor) -> Result<Statement> {
        let fragment = line.whole();
        let mut branches = vec![];
        let mut condition = cursor.expression(&[Keyword::Then])?;
        cursor.expect(Keyword::Then, ErrorCode::ExpectedThenKeyword)?;
        cursor.end()?;
        loop {
            let (body, terminator) = self.statements(line, "IF", |l| {
                starts_with(l, &[Keyword::Else]) || starts_with(l, &[Keyword::End, Keyword::If])
            })?;
            branches.push((condition, body));
            let mut cursor = Cursor::new(terminator);
            if cursor.accept(Keyword::End) {
                cursor.next();
                cursor.end()?;
                return Ok(Statement::If(fragment, branches, None));
            }
            cursor.next();
            if cursor.accept(Keyword::If) {
                condition = cursor.expression(&[Keyword::Then])?;
                cursor.expect(Keyword::Then, ErrorCode::ExpectedThenKeyword)?;
                cursor.end()?;
                continue;
            }
            cursor.end()?;
            let (otherwise, terminator) = self.statements(line, "IF", |l| {
                starts_with(l, &[Keyword::End, Keyword::If])
            })?;
            Cursor { pos: 2, ..Cursor::new(terminator) }.end()?;
            return Ok(Statement::If(fragment, branches, Some(otherwise)));
        }
    }

    fn r#for(&mut self, line: &'a Line, cursor: &mut Cursor) -> Result<Statement> {
        let fragment = line.whole();
        let (counter_fragment, counter) = cursor.ident(ErrorCode::ExpectedVariableName)?;
        match cursor.next() {
            Some((_, Token::Operator(Operator::Equal))) => {}
            _ => return Err(error!(UnexpectedSequence, &cursor.fragment(); "EXPECTED =")),
        }
        let start = cursor.expression(&[Keyword::To])?;
        cursor.expect(Keyword::To, ErrorCode::ExpectedToKeyword)?;
        let end = cursor.expression(&[Keyword::Step])?;
        let step = if cursor.accept(Keyword::Step) {
            Some(cursor.expression(&[])?)
        } else {
            None
        };
        cursor.end()?;
        let (body, terminator) = self.statements(line, "FOR", |l| starts_with(l, &[Keyword::Next]))?;
        let mut next = Cursor { pos: 1, ..Cursor::new(terminator) };
        if !next.is_end() {
            let (next_fragment, name) = next.ident(ErrorCode::ExpectedVariableName)?;
            if name != counter {
                return Err(error!(CounterDoesNotMatch, &next_fragment; "{}", name));
            }
            next.end()?;
        }
        Ok(Statement::For(
            fragment,
            For {
                counter: Expression::Name(counter_fragment, counter),
                start,
                end,
                step,
                body,
            },
        ))
    }

    fn r#do(&mut self, line: &'a Line, cursor: &mut Cursor) -> Result<Statement> {
        let fragment = line.whole();
        let mut condition = loop_condition(cursor, false)?;
        cursor.end()?;
        let (body, terminator) = self.statements(line, "DO", |l| starts_with(l, &[Keyword::Loop]))?;
        let mut tail = Cursor { pos: 1, ..Cursor::new(terminator) };
        if let Some(post) = loop_condition(&mut tail, true)? {
            if condition.is_some() {
                return Err(error!(UnexpectedSequence, &terminator.whole()));
            }
            condition = Some(post);
        }
        tail.end()?;
        Ok(Statement::Do(fragment, condition, body))
    }
}

fn loop_condition(cursor: &mut Cursor, post: bool) -> Result<Option<Condition>> {
    let negative = if cursor.accept(Keyword::While) {
        false
    } else if cursor.accept(Keyword::Until) {
        true
    } else {
        return Ok(None);
    };
    Ok(Some(Condition {
        post,
        negative,
        expression: cursor.expression(&[])?,
    }))
}

fn add_function(functions: &mut Vec<Function>, function: Function) -> Result<()> {
    if functions.iter().any(|f| f.name() == function.name()) {
        let fragment = match &function {
            Function::Native(f) => f.fragment.clone(),
            Function::User(f) => f.fragment.clone(),
        };
        return Err(error!(FunctionAlreadyExists, &fragment; "{}", function.name()));
    }
    functions.push(function);
    Ok(())
}

fn check_module_function(module: &Module, function: &Function) -> Result<()> {
    for block in module.code_blocks.iter() {
        if block.functions.iter().any(|f| f.name() == function.name()) {
            let fragment = match function {
                Function::Native(f) => &f.fragment,
                Function::User(f) => &f.fragment,
            };
            return Err(error!(FunctionAlreadyExists, fragment; "{}", function.name()));
        }
    }
    Ok(())
}

fn field(line: &Line) -> Result<Field> {
    let mut cursor = Cursor::new(line);
    let (fragment, name) = cursor.ident(ErrorCode::ExpectedFieldName)?;
    cursor.expect(Keyword::As, ErrorCode::ExpectedAsKeyword)?;
    let data_type = data_type(&mut cursor)?;
    cursor.end()?;
    Ok(Field {
        fragment,
        name,
        data_type,
    })
}

fn qualified_field(cursor: &mut Cursor) -> Result<(String, String)> {
    let (_, module) = cursor.ident(ErrorCode::ExpectedModuleName)?;
    match cursor.next() {
        Some((_, Token::Dot)) => {}
        _ => return Err(error!(ExpectedFieldName, &cursor.fragment())),
    }
    let (_, field) = cursor.ident(ErrorCode::ExpectedFieldName)?;
    Ok((module, field))
}

fn return_type(cursor: &mut Cursor) -> Result<Option<DataType>> {
    if cursor.is_end() {
        return Ok(None);
    }
    cursor.expect(Keyword::As, ErrorCode::ExpectedAsKeyword)?;
    let returns = data_type(cursor)?;
    cursor.end()?;
    Ok(Some(returns))
}

/// Comma separated items inside the bracket group that follows.
fn bracket_list<'a>(line: &'a Line, cursor: &mut Cursor<'a>) -> Result<Vec<(Fragment, &'a [Spanned])>> {
    let fragment = cursor.fragment();
    match cursor.next() {
        Some((col, Token::Brackets(inner))) => split_commas(line, inner, &line.fragment(col.clone())),
        _ => Err(error!(MissedBracket, &fragment)),
    }
}

fn split_commas<'a>(
    line: &Line,
    tokens: &'a [Spanned],
    outer: &Fragment,
) -> Result<Vec<(Fragment, &'a [Spanned])>> {
    let mut items = vec![];
    if tokens.is_empty() {
        return Ok(items);
    }
    let mut start = 0;
    for index in 0..=tokens.len() {
        let at_comma = index < tokens.len() && tokens[index].1 == Token::Comma;
        if index == tokens.len() || at_comma {
            let item = &tokens[start..index];
            let fragment = match item.first() {
                Some((col, _)) => line.fragment(col.clone()),
                None => match tokens.get(index) {
                    Some((col, _)) => line.fragment(col.clone()),
                    None => outer.clone(),
                },
            };
            if item.is_empty() {
                return Err(error!(ExpectedExpression, &fragment));
            }
            items.push((fragment, item));
            start = index + 1;
        }
    }
    Ok(items)
}

fn data_type(cursor: &mut Cursor) -> Result<DataType> {
    let fragment = cursor.fragment();
    let keyword = match cursor.next() {
        Some((_, Token::Keyword(keyword))) => *keyword,
        Some((_, Token::Ident(name))) => return Ok(DataType::Named(fragment, name.clone())),
        _ => return Err(error!(ExpectedDataType, &fragment)),
    };
    Ok(match keyword {
        Keyword::Boolean => DataType::Boolean,
        Keyword::Byte => DataType::Byte,
        Keyword::Short => DataType::Short,
        Keyword::Integer => DataType::Integer,
        Keyword::Long => DataType::Long,
        Keyword::Real => DataType::Real,
        Keyword::String => {
            if cursor.accept(Keyword::Of) {
                let length = cursor.expression(&[])?;
                DataType::String(Some(Box::new(length)))
            } else {
                DataType::String(None)
            }
        }
        Keyword::Pointer => {
            cursor.expect(Keyword::To, ErrorCode::ExpectedToKeyword)?;
            DataType::Pointer(Box::new(data_type(cursor)?))
        }
        Keyword::Const => match data_type(cursor)? {
            DataType::Constant(inner) => DataType::Constant(inner),
            inner => DataType::Constant(Box::new(inner)),
        },
        _ => return Err(error!(ExpectedDataType, &fragment)),
    })
}

#[derive(Debug)]
enum Item {
    Operand(Expression),
    Unary(Fragment, UnaryOp),
    Binary(Fragment, BinaryOp),
}

impl Item {
    fn is_operand(&self) -> bool {
        matches!(self, Item::Operand(_))
    }
}

fn expression(line: &Line, tokens: &[Spanned], fragment: &Fragment) -> Result<Expression> {
    if tokens.is_empty() {
        return Err(error!(ExpectedExpression, fragment));
    }
    let mut items = operands(line, tokens)?;
    unary_pass(&mut items, &[UnaryOp::Plus, UnaryOp::Minus]);
    unary_pass(&mut items, &[UnaryOp::Not]);
    use BinaryOp::*;
    let tiers: [&[BinaryOp]; 6] = [
        &[Multiply, Divide, Mod],
        &[Add, Subtract],
        &[Shl, Shr],
        &[And, Or, Xor],
        &[Less, LessEqual, Greater, GreaterEqual],
        &[Equal, NotEqual],
    ];
    for tier in tiers.iter() {
        binary_pass(&mut items, tier);
    }
    let mut iter = items.into_iter();
    match (iter.next(), iter.next()) {
        (Some(Item::Operand(expr)), None) => Ok(expr),
        (Some(Item::Operand(_)), Some(Item::Operand(next))) => {
            Err(error!(UnexpectedSequence, next.fragment()))
        }
        (Some(Item::Unary(f, _)), _) | (Some(Item::Binary(f, _)), _) => {
            Err(error!(ExpectedExpression, &f))
        }
        (_, Some(Item::Unary(f, _))) | (_, Some(Item::Binary(f, _))) => {
            Err(error!(ExpectedExpression, &f))
        }
        (None, _) => Err(error!(ExpectedExpression, fragment)),
    }
}

/// Flatten tokens into operands and operators. Operands include literals,
/// names, calls, member chains and parenthesized sub-expressions.
fn operands(line: &Line, tokens: &[Spanned]) -> Result<Vec<Item>> {
    let mut items: Vec<Item> = vec![];
    let mut pos = 0;
    while pos < tokens.len() {
        let (col, token) = &tokens[pos];
        let fragment = line.fragment(col.clone());
        pos += 1;
        let mut operand = match token {
            Token::Integer(s) => match s.parse::<i64>() {
                Ok(value) => Expression::for_integer(fragment, value),
                Err(_) => return Err(error!(WrongNumberFormat, &fragment; "{}", s)),
            },
            Token::Binary(s) => match i64::from_str_radix(s, 2) {
                Ok(value) => Expression::for_integer(fragment, value),
                Err(_) => return Err(error!(WrongNumberFormat, &fragment; "0b{}", s)),
            },
            Token::Real(s) => match s.parse::<Fixed>() {
                Ok(value) => Expression::Real(fragment, value),
                Err(_) => return Err(error!(WrongNumberFormat, &fragment; "{}", s)),
            },
            Token::String(s) => Expression::String(fragment, s.clone()),
            Token::Keyword(Keyword::True) => Expression::Boolean(fragment, true),
            Token::Keyword(Keyword::False) => Expression::Boolean(fragment, false),
            Token::Ident(name) => match tokens.get(pos) {
                Some((bcol, Token::Brackets(inner))) => {
                    pos += 1;
                    let mut args = vec![];
                    for (f, arg) in split_commas(line, inner, &line.fragment(bcol.clone()))? {
                        args.push(expression(line, arg, &f)?);
                    }
                    Expression::Call(fragment, name.clone(), args)
                }
                _ => Expression::Name(fragment, name.clone()),
            },
            Token::Brackets(inner) => expression(line, inner, &fragment)?,
            Token::Operator(op) => {
                items.push(match op {
                    Operator::Plus if !last_is_operand(&items) => Item::Unary(fragment, UnaryOp::Plus),
                    Operator::Minus if !last_is_operand(&items) => {
                        Item::Unary(fragment, UnaryOp::Minus)
                    }
                    Operator::Plus => Item::Binary(fragment, BinaryOp::Add),
                    Operator::Minus => Item::Binary(fragment, BinaryOp::Subtract),
                    Operator::Multiply => Item::Binary(fragment, BinaryOp::Multiply),
                    Operator::Divide => Item::Binary(fragment, BinaryOp::Divide),
                    Operator::Equal => Item::Binary(fragment, BinaryOp::Equal),
                    Operator::NotEqual => Item::Binary(fragment, BinaryOp::NotEqual),
                    Operator::Less => Item::Binary(fragment, BinaryOp::Less),
                    Operator::LessEqual => Item::Binary(fragment, BinaryOp::LessEqual),
                    Operator::Greater => Item::Binary(fragment, BinaryOp::Greater),
                    Operator::GreaterEqual => Item::Binary(fragment, BinaryOp::GreaterEqual),
                });
                continue;
            }
            Token::Keyword(keyword) => {
                let op = match keyword {
                    Keyword::Not => Item::Unary(fragment, UnaryOp::Not),
                    Keyword::Mod => Item::Binary(fragment, BinaryOp::Mod),
                    Keyword::Shl => Item::Binary(fragment, BinaryOp::Shl),
                    Keyword::Shr => Item::Binary(fragment, BinaryOp::Shr),
                    Keyword::And => Item::Binary(fragment, BinaryOp::And),
                    Keyword::Or => Item::Binary(fragment, BinaryOp::Or),
                    Keyword::Xor => Item::Binary(fragment, BinaryOp::Xor),
                    _ => return Err(error!(UnexpectedSequence, &fragment; "{}", keyword)),
                };
                items.push(op);
                continue;
            }
            _ => return Err(error!(UnexpectedSequence, &fragment)),
        };
        while let Some((_, Token::Dot)) = tokens.get(pos) {
            match tokens.get(pos + 1) {
                Some((fcol, Token::Ident(field))) => {
                    let member = line.fragment(fcol.clone());
                    operand = Expression::Member(member, Box::new(operand), field.clone());
                    pos += 2;
                }
                Some((fcol, _)) => return Err(error!(ExpectedFieldName, &line.fragment(fcol.clone()))),
                None => return Err(error!(ExpectedFieldName, &line.fragment(tokens[pos].0.clone()))),
            }
        }
        items.push(Item::Operand(operand));
    }
    Ok(items)
}

fn last_is_operand(items: &[Item]) -> bool {
    items.last().map(|i| i.is_operand()).unwrap_or(false)
}

/// Prefix operators bind right to left: `- - x` is `-(-x)`.
fn unary_pass(items: &mut Vec<Item>, ops: &[UnaryOp]) {
    let mut index = items.len();
    while index > 0 {
        index -= 1;
        let reduce = match (&items[index], items.get(index + 1)) {
            (Item::Unary(_, op), Some(Item::Operand(_))) => ops.contains(op),
            _ => false,
        };
        if !reduce {
            continue;
        }
        if let Item::Operand(operand) = items.remove(index + 1) {
            if let Item::Unary(fragment, op) = &items[index] {
                let unary = Expression::Unary(fragment.clone(), *op, Box::new(operand));
                items[index] = Item::Operand(unary);
            }
        }
    }
}

/// Reduce `operand op operand` triples of one precedence tier, left to right.
fn binary_pass(items: &mut Vec<Item>, ops: &[BinaryOp]) {
    let mut index = 1;
    while index + 1 < items.len() {
        let reduce = match (&items[index - 1], &items[index], &items[index + 1]) {
            (Item::Operand(_), Item::Binary(_, op), Item::Operand(_)) => ops.contains(op),
            _ => false,
        };
        if !reduce {
            index += 1;
            continue;
        }
        let right = items.remove(index + 1);
        let op = items.remove(index);
        let left = items.remove(index - 1);
        if let (Item::Operand(left), Item::Binary(fragment, op), Item::Operand(right)) = (left, op, right) {
            let binary = Expression::Binary(fragment, op, Box::new(left), Box::new(right));
            items.insert(index - 1, Item::Operand(binary));
        }
    }
}
