/*!
# Rust Language Module

This Rust module provides source loading, lexical analysis and parsing
of the Ant BASIC language. The result of parsing is the raw syntax tree
in [`ast`] which the `graph` module lowers and analyses.

*/

#[macro_use]
mod error;
mod lex;
mod line;
mod parse;
mod source;
mod token;

pub use error::Error;
pub use error::ErrorCode;
pub use lex::lex;
pub use line::Line;
pub use parse::{parse, parse_expression};
pub use source::{splice, FileLoader, Loader, MemoryLoader};
pub use token::{Keyword, Operator, Spanned, Token};

pub mod ast;

use std::rc::Rc;

/// Character range of a token within its line.
pub type Column = std::ops::Range<usize>;

/// Where a piece of source came from: file, line number and columns.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Fragment {
    pub file: Rc<str>,
    pub line: usize,
    pub column: Column,
}

impl Fragment {
    pub fn new(file: &Rc<str>, line: usize, column: Column) -> Fragment {
        Fragment {
            file: file.clone(),
            line,
            column,
        }
    }

    /// Same file and line, different columns.
    pub fn at(&self, column: &Column) -> Fragment {
        Fragment {
            file: self.file.clone(),
            line: self.line,
            column: column.clone(),
        }
    }
}

impl std::fmt::Debug for Fragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl std::fmt::Display for Fragment {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)?;
        if self.column != (0..0) {
            write!(f, " ({}..{})", self.column.start, self.column.end)?;
        }
        Ok(())
    }
}

/// Parse a whole program: splice imports, tokenize and build the raw tree.
pub fn parse_program(loader: &dyn Loader, name: &str) -> Result<ast::Program, Error> {
    let lines = splice(loader, name)?;
    parse(&lines)
}

#[cfg(test)]
mod tests;
