//! Raw syntax tree produced by the parser.
//!
//! Nothing here is resolved: names are strings and types are spelled the
//! way they were written. The `graph` module lowers this tree into the
//! analysed node arena.

use super::Fragment;
use crate::mach::Fixed;

#[derive(Debug, Default, PartialEq)]
pub struct Program {
    pub constants: Vec<Constant>,
    pub structs: Vec<Struct>,
    pub libraries: Vec<CodeBlock>,
    /// Sorted by module name.
    pub modules: Vec<Module>,
    pub channels: Vec<Channel>,
}

#[derive(Debug, PartialEq)]
pub struct Constant {
    pub fragment: Fragment,
    pub name: String,
    pub data_type: Option<DataType>,
    pub value: Expression,
}

#[derive(Debug, PartialEq)]
pub struct Struct {
    pub fragment: Fragment,
    pub name: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, PartialEq)]
pub struct Field {
    pub fragment: Fragment,
    pub name: String,
    pub data_type: DataType,
}

#[derive(Debug, PartialEq, Clone)]
pub enum DataType {
    Boolean,
    Byte,
    Short,
    Integer,
    Long,
    Real,
    /// `STRING` alone is abstract, `STRING OF n` is concrete.
    String(Option<Box<Expression>>),
    Pointer(Box<DataType>),
    Constant(Box<DataType>),
    Named(Fragment, String),
}

#[derive(Debug, PartialEq)]
pub struct CodeBlock {
    pub fragment: Fragment,
    pub executors: Vec<String>,
    pub functions: Vec<Function>,
}

#[derive(Debug, PartialEq)]
pub enum Function {
    Native(NativeFunction),
    User(UserFunction),
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Native(f) => &f.name,
            Function::User(f) => &f.name,
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct NativeFunction {
    pub fragment: Fragment,
    pub name: String,
    pub arguments: Vec<DataType>,
    pub returns: Option<DataType>,
}

#[derive(Debug, PartialEq)]
pub struct UserFunction {
    pub fragment: Fragment,
    pub name: String,
    pub arguments: Vec<Argument>,
    pub returns: Option<DataType>,
    pub body: Vec<Statement>,
}

#[derive(Debug, PartialEq)]
pub struct Argument {
    pub fragment: Fragment,
    pub name: String,
    pub data_type: DataType,
}

#[derive(Debug, PartialEq)]
pub struct Module {
    pub fragment: Fragment,
    pub name: String,
    pub executor: String,
    pub data_sets: Vec<DataSet>,
    pub code_blocks: Vec<CodeBlock>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum DataPrefix {
    Private,
    Input,
    Output,
}

impl std::fmt::Display for DataPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DataPrefix::Private => write!(f, "PRIVATE"),
            DataPrefix::Input => write!(f, "INPUT"),
            DataPrefix::Output => write!(f, "OUTPUT"),
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct DataSet {
    pub fragment: Fragment,
    pub prefix: DataPrefix,
    pub fields: Vec<Field>,
}

#[derive(Debug, PartialEq)]
pub struct Channel {
    pub fragment: Fragment,
    pub source: (String, String),
    pub destination: (String, String),
}

#[derive(Debug, PartialEq)]
pub struct Condition {
    /// Tested after the body (`LOOP WHILE`) rather than before (`DO WHILE`).
    pub post: bool,
    /// `UNTIL` rather than `WHILE`.
    pub negative: bool,
    pub expression: Expression,
}

#[derive(Debug, PartialEq)]
pub enum Statement {
    Var(Fragment, String, Option<DataType>, Option<Expression>),
    Assign(Fragment, Expression, Expression),
    Call(Fragment, Expression),
    Return(Fragment, Option<Expression>),
    If(Fragment, Vec<(Expression, Vec<Statement>)>, Option<Vec<Statement>>),
    For(Fragment, For),
    Do(Fragment, Option<Condition>, Vec<Statement>),
}

#[derive(Debug, PartialEq)]
pub struct For {
    pub counter: Expression,
    pub start: Expression,
    pub end: Expression,
    pub step: Option<Expression>,
    pub body: Vec<Statement>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum BinaryOp {
    Multiply,
    Divide,
    Mod,
    Add,
    Subtract,
    Shl,
    Shr,
    And,
    Or,
    Xor,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        use BinaryOp::*;
        matches!(self, Less | LessEqual | Greater | GreaterEqual | Equal | NotEqual)
    }
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            UnaryOp::Plus => write!(f, "+"),
            UnaryOp::Minus => write!(f, "-"),
            UnaryOp::Not => write!(f, "NOT "),
        }
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use BinaryOp::*;
        let s = match self {
            Multiply => "*",
            Divide => "/",
            Mod => "MOD",
            Add => "+",
            Subtract => "-",
            Shl => "SHL",
            Shr => "SHR",
            And => "AND",
            Or => "OR",
            Xor => "XOR",
            Less => "<",
            LessEqual => "<=",
            Greater => ">",
            GreaterEqual => ">=",
            Equal => "=",
            NotEqual => "<>",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Integer(Fragment, i32),
    Long(Fragment, i64),
    Real(Fragment, Fixed),
    String(Fragment, String),
    Boolean(Fragment, bool),
    Name(Fragment, String),
    Member(Fragment, Box<Expression>, String),
    Call(Fragment, String, Vec<Expression>),
    Unary(Fragment, UnaryOp, Box<Expression>),
    Binary(Fragment, BinaryOp, Box<Expression>, Box<Expression>),
}

impl Expression {
    pub fn fragment(&self) -> &Fragment {
        use Expression::*;
        match self {
            Integer(f, ..)
            | Long(f, ..)
            | Real(f, ..)
            | String(f, ..)
            | Boolean(f, ..)
            | Name(f, ..)
            | Member(f, ..)
            | Call(f, ..)
            | Unary(f, ..)
            | Binary(f, ..) => f,
        }
    }

    /// Integer literals that fit 32 bits are INTEGER, the rest LONG.
    pub fn for_integer(fragment: Fragment, value: i64) -> Expression {
        if value >= i32::min_value() as i64 && value <= i32::max_value() as i64 {
            Expression::Integer(fragment, value as i32)
        } else {
            Expression::Long(fragment, value)
        }
    }
}
