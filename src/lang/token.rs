use super::Column;

/// A token together with the characters it was read from.
pub type Spanned = (Column, Token);

#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    Keyword(Keyword),
    Operator(Operator),
    Ident(String),
    /// Decimal integer literal, sign excluded.
    Integer(String),
    /// Binary integer literal without the `0b` prefix.
    Binary(String),
    /// Fixed point literal in `int.int` form.
    Real(String),
    String(String),
    Comma,
    Dot,
    LParen,
    RParen,
    /// Bracketed tokens, grouped by the lexer.
    Brackets(Vec<Spanned>),
}

impl Token {
    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        matches!(self, Token::Keyword(k) if *k == keyword)
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use Token::*;
        match self {
            Keyword(s) => write!(f, "{}", s),
            Operator(s) => write!(f, "{}", s),
            Ident(s) => write!(f, "{}", s),
            Integer(s) => write!(f, "{}", s),
            Binary(s) => write!(f, "0b{}", s),
            Real(s) => write!(f, "{}", s),
            String(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            Comma => write!(f, ","),
            Dot => write!(f, "."),
            LParen => write!(f, "("),
            RParen => write!(f, ")"),
            Brackets(v) => {
                write!(f, "(")?;
                for (i, (_, t)) in v.iter().enumerate() {
                    if i > 0 && !matches!(t, Comma) {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, ")")
            }
        }
    }
}

macro_rules! keywords {
    ($($name:ident => $text:expr,)*) => {
        #[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
        pub enum Keyword {
            $($name,)*
        }

        impl Keyword {
            pub fn from_string(s: &str) -> Option<Keyword> {
                match s {
                    $($text => Some(Keyword::$name),)*
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for Keyword {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                match self {
                    $(Keyword::$name => write!(f, "{}", $text),)*
                }
            }
        }
    };
}

keywords! {
    And => "AND",
    As => "AS",
    Boolean => "BOOLEAN",
    Byte => "BYTE",
    Code => "CODE",
    Const => "CONST",
    Data => "DATA",
    Declare => "DECLARE",
    Do => "DO",
    Else => "ELSE",
    End => "END",
    False => "FALSE",
    For => "FOR",
    Function => "FUNCTION",
    If => "IF",
    Import => "IMPORT",
    Input => "INPUT",
    Integer => "INTEGER",
    Long => "LONG",
    Loop => "LOOP",
    Mod => "MOD",
    Module => "MODULE",
    Next => "NEXT",
    Not => "NOT",
    Of => "OF",
    Or => "OR",
    Output => "OUTPUT",
    Pointer => "POINTER",
    Private => "PRIVATE",
    Real => "REAL",
    Return => "RETURN",
    Short => "SHORT",
    Shl => "SHL",
    Shr => "SHR",
    Step => "STEP",
    String => "STRING",
    Then => "THEN",
    To => "TO",
    Transmission => "TRANSMISSION",
    True => "TRUE",
    Type => "TYPE",
    Until => "UNTIL",
    Var => "VAR",
    While => "WHILE",
    Xor => "XOR",
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Operator {
    Plus,
    Minus,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl Operator {
    pub fn from_string(s: &str) -> Option<Operator> {
        use Operator::*;
        Some(match s {
            "+" => Plus,
            "-" => Minus,
            "*" => Multiply,
            "/" => Divide,
            "=" => Equal,
            "<>" => NotEqual,
            "<" => Less,
            "<=" => LessEqual,
            ">" => Greater,
            ">=" => GreaterEqual,
            _ => return None,
        })
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use Operator::*;
        let s = match self {
            Plus => "+",
            Minus => "-",
            Multiply => "*",
            Divide => "/",
            Equal => "=",
            NotEqual => "<>",
            Less => "<",
            LessEqual => "<=",
            Greater => ">",
            GreaterEqual => ">=",
        };
        write!(f, "{}", s)
    }
}
