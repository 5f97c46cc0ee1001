use super::token::*;
use super::{Column, Error, Fragment};
use std::rc::Rc;

type Result<T> = std::result::Result<T, Error>;

/// Tokenize one line of source. Comments are dropped and brackets are
/// grouped so every `Token::Brackets` holds a balanced sub-sequence.
pub fn lex(file: &Rc<str>, number: usize, s: &str) -> Result<Vec<Spanned>> {
    let mut lexer = BasicLexer {
        chars: s.chars().collect(),
        pos: 0,
        file,
        number,
    };
    let flat = lexer.lex()?;
    lexer.group(flat)
}

fn is_basic_whitespace(c: char) -> bool {
    c == ' ' || c == '\t' || c == '\r' || c == '\n'
}

fn is_basic_alphabetic(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_operator_char(c: char) -> bool {
    matches!(c, '+' | '-' | '*' | '/' | '=' | '<' | '>' | '!' | '&' | '|' | '^' | '%')
}

struct BasicLexer<'a> {
    chars: Vec<char>,
    pos: usize,
    file: &'a Rc<str>,
    number: usize,
}

impl<'a> BasicLexer<'a> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn fragment(&self, column: Column) -> Fragment {
        Fragment::new(self.file, self.number, column)
    }

    fn lex(&mut self) -> Result<Vec<Spanned>> {
        let mut tokens = vec![];
        while let Some(ch) = self.peek() {
            if is_basic_whitespace(ch) {
                self.pos += 1;
                continue;
            }
            if ch == '\'' {
                break;
            }
            let start = self.pos;
            let token = if ch.is_ascii_digit() {
                self.number()?
            } else if is_basic_alphabetic(ch) {
                self.alphabetic()
            } else if ch == '"' {
                self.string()?
            } else {
                self.minutia()?
            };
            tokens.push((start..self.pos, token));
        }
        Ok(tokens)
    }

    fn number(&mut self) -> Result<Token> {
        let start = self.pos;
        if self.peek() == Some('0') && self.peek_at(1) == Some('b') {
            self.pos += 2;
            let mut s = String::new();
            while let Some(ch) = self.peek() {
                if ch != '0' && ch != '1' {
                    break;
                }
                s.push(ch);
                self.pos += 1;
            }
            if s.is_empty() {
                return Err(self.bad_number(start));
            }
            return self.end_of_number(start, Token::Binary(s));
        }
        let mut s = String::new();
        let mut decimal = false;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                s.push(ch);
                self.pos += 1;
                continue;
            }
            if ch == '.' && !decimal {
                match self.peek_at(1) {
                    Some(d) if d.is_ascii_digit() => {
                        decimal = true;
                        s.push(ch);
                        self.pos += 1;
                        continue;
                    }
                    _ => return Err(self.bad_number(start)),
                }
            }
            break;
        }
        if decimal {
            self.end_of_number(start, Token::Real(s))
        } else {
            self.end_of_number(start, Token::Integer(s))
        }
    }

    fn end_of_number(&mut self, start: usize, token: Token) -> Result<Token> {
        match self.peek() {
            Some(ch) if is_basic_alphabetic(ch) || ch.is_ascii_digit() || ch == '.' => {
                Err(self.bad_number(start))
            }
            _ => Ok(token),
        }
    }

    fn bad_number(&mut self, start: usize) -> Error {
        while let Some(ch) = self.peek() {
            if !(ch.is_ascii_alphanumeric() || ch == '.') {
                break;
            }
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        error!(WrongNumberFormat, &self.fragment(start..self.pos); "{}", text)
    }

    fn string(&mut self) -> Result<Token> {
        let start = self.pos;
        self.pos += 1;
        let mut s = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(error!(MissedClosingQuote, &self.fragment(start..self.pos)));
                }
                Some('"') => {
                    if self.peek_at(1) == Some('"') {
                        s.push('"');
                        self.pos += 2;
                        continue;
                    }
                    self.pos += 1;
                    return Ok(Token::String(s));
                }
                Some(ch) => {
                    s.push(ch);
                    self.pos += 1;
                }
            }
        }
    }

    fn alphabetic(&mut self) -> Token {
        let mut s = String::new();
        while let Some(ch) = self.peek() {
            if !(is_basic_alphabetic(ch) || ch.is_ascii_digit()) {
                break;
            }
            s.push(ch);
            self.pos += 1;
        }
        match Keyword::from_string(&s) {
            Some(keyword) => Token::Keyword(keyword),
            None => Token::Ident(s),
        }
    }

    fn minutia(&mut self) -> Result<Token> {
        let start = self.pos;
        let ch = match self.peek() {
            Some(ch) => ch,
            None => return Err(error!(InternalError; "LEXER OVERRUN")),
        };
        self.pos += 1;
        match ch {
            '(' => return Ok(Token::LParen),
            ')' => return Ok(Token::RParen),
            ',' => return Ok(Token::Comma),
            '.' => return Ok(Token::Dot),
            _ => {}
        }
        if !is_operator_char(ch) {
            return Err(error!(UnknownCharacter, &self.fragment(start..self.pos); "{}", ch));
        }
        let mut s = ch.to_string();
        while let Some(pk) = self.peek() {
            if !is_operator_char(pk) {
                break;
            }
            s.push(pk);
            self.pos += 1;
        }
        // Longest operator first, then give back what is left over.
        while !s.is_empty() {
            if let Some(op) = Operator::from_string(&s) {
                return Ok(Token::Operator(op));
            }
            s.pop();
            self.pos -= 1;
        }
        self.pos = start + 1;
        Err(error!(UnknownOperator, &self.fragment(start..self.pos); "{}", ch))
    }

    fn group(&self, flat: Vec<Spanned>) -> Result<Vec<Spanned>> {
        let mut stack: Vec<(usize, Vec<Spanned>)> = vec![];
        let mut current: Vec<Spanned> = vec![];
        for (column, token) in flat {
            match token {
                Token::LParen => {
                    stack.push((column.start, std::mem::take(&mut current)));
                }
                Token::RParen => match stack.pop() {
                    Some((start, outer)) => {
                        let inner = std::mem::replace(&mut current, outer);
                        current.push((start..column.end, Token::Brackets(inner)));
                    }
                    None => return Err(error!(BracketDoesNotMatch, &self.fragment(column))),
                },
                _ => current.push((column, token)),
            }
        }
        if let Some((start, _)) = stack.pop() {
            return Err(error!(MissedBracket, &self.fragment(start..start + 1)));
        }
        Ok(current)
    }
}
