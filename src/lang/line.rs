use super::lex::*;
use super::token::*;
use super::{Column, Error, Fragment};
use std::rc::Rc;

/// One tokenized source line and where it came from.
#[derive(Debug, PartialEq, Clone)]
pub struct Line {
    file: Rc<str>,
    number: usize,
    tokens: Vec<Spanned>,
}

impl Line {
    pub fn new(file: &Rc<str>, number: usize, s: &str) -> Result<Line, Error> {
        Ok(Line {
            file: file.clone(),
            number,
            tokens: lex(file, number, s)?,
        })
    }

    pub fn file(&self) -> &Rc<str> {
        &self.file
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn tokens(&self) -> &[Spanned] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn fragment(&self, column: Column) -> Fragment {
        Fragment::new(&self.file, self.number, column)
    }

    /// Fragment covering the whole line.
    pub fn whole(&self) -> Fragment {
        let end = self.tokens.last().map(|(c, _)| c.end).unwrap_or(0);
        let start = self.tokens.first().map(|(c, _)| c.start).unwrap_or(0);
        self.fragment(start..end)
    }
}

impl std::fmt::Display for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s: Vec<String> = self.tokens.iter().map(|(_, t)| t.to_string()).collect();
        write!(f, "{}", s.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let file: Rc<str> = Rc::from("t");
        let line = Line::new(&file, 1, "x = f(1,2)  ' note").unwrap();
        assert_eq!(line.to_string(), "x = f (1, 2)");
        assert_eq!(line.whole().column, 0..10);
    }
}
