use super::token::*;
use super::{Error, Fragment, Line};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::rc::Rc;

type Result<T> = std::result::Result<T, Error>;

/// Where program text comes from.
pub trait Loader {
    fn load(&self, name: &str) -> std::io::Result<String>;
}

/// Loads files relative to a root directory.
#[derive(Debug, Clone)]
pub struct FileLoader {
    root: PathBuf,
}

impl FileLoader {
    pub fn new<P: Into<PathBuf>>(root: P) -> FileLoader {
        FileLoader { root: root.into() }
    }
}

impl Loader for FileLoader {
    fn load(&self, name: &str) -> std::io::Result<String> {
        std::fs::read_to_string(self.root.join(name))
    }
}

/// Named sources held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> MemoryLoader {
        MemoryLoader::default()
    }

    pub fn with(mut self, name: &str, text: &str) -> MemoryLoader {
        self.insert(name, text);
        self
    }

    pub fn insert(&mut self, name: &str, text: &str) {
        self.files.insert(name.to_string(), text.to_string());
    }
}

impl Loader for MemoryLoader {
    fn load(&self, name: &str) -> std::io::Result<String> {
        match self.files.get(name) {
            Some(text) => Ok(text.clone()),
            None => Err(std::io::Error::new(std::io::ErrorKind::NotFound, name.to_string())),
        }
    }
}

/// Load `name` and every file it imports, returning the tokenized lines in
/// program order. An `IMPORT "file"` line is replaced by the lines of that
/// file; a file already spliced is not spliced again.
pub fn splice(loader: &dyn Loader, name: &str) -> Result<Vec<Line>> {
    let mut splicer = Splicer {
        loader,
        seen: HashSet::new(),
        lines: vec![],
    };
    splicer.splice(name, None)?;
    Ok(splicer.lines)
}

struct Splicer<'a> {
    loader: &'a dyn Loader,
    seen: HashSet<String>,
    lines: Vec<Line>,
}

impl<'a> Splicer<'a> {
    fn splice(&mut self, name: &str, from: Option<&Fragment>) -> Result<()> {
        if !self.seen.insert(name.to_string()) {
            return Ok(());
        }
        let text = match self.loader.load(name) {
            Ok(text) => text,
            Err(e) => {
                let error = error!(ImportNotFound; "{}: {}", name, e);
                return Err(match from {
                    Some(fragment) => error.in_fragment(fragment),
                    None => error,
                });
            }
        };
        let file: Rc<str> = Rc::from(name);
        for (index, s) in text.lines().enumerate() {
            let line = Line::new(&file, index + 1, s)?;
            if line.is_empty() {
                continue;
            }
            let import = match line.tokens() {
                [(_, Token::Keyword(Keyword::Import)), (_, Token::String(imported))] => {
                    Some(Ok(imported.clone()))
                }
                [(col, Token::Keyword(Keyword::Import)), ..] => Some(Err(col.clone())),
                _ => None,
            };
            match import {
                Some(Ok(imported)) => self.splice(&imported, Some(&line.whole()))?,
                Some(Err(col)) => return Err(error!(ExpectedFileName, &line.fragment(col))),
                None => self.lines.push(line),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splice_once() {
        let loader = MemoryLoader::new()
            .with("main.bas", "IMPORT \"a.bas\"\nIMPORT \"b.bas\"\nx = 1")
            .with("a.bas", "IMPORT \"b.bas\"\ny = 2")
            .with("b.bas", "' only a comment\nz = 3");
        let lines = splice(&loader, "main.bas").unwrap();
        let text: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        assert_eq!(text, vec!["z = 3", "y = 2", "x = 1"]);
        assert_eq!(&**lines[0].file(), "b.bas");
        assert_eq!(lines[0].number(), 2);
    }

    #[test]
    fn test_missing_import() {
        let loader = MemoryLoader::new().with("main.bas", "\n\nIMPORT \"nope.bas\"");
        let e = splice(&loader, "main.bas").unwrap_err();
        assert_eq!(e.code(), super::super::ErrorCode::ImportNotFound);
        assert_eq!(e.fragment().map(|f| f.line), Some(3));
    }
}
