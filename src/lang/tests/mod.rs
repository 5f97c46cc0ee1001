use super::ast::*;
use super::*;

mod parse_test;

fn line(s: &str) -> Line {
    let file: Rc<str> = Rc::from("test.bas");
    Line::new(&file, 1, s).unwrap()
}

fn program(source: &str) -> Result<Program, Error> {
    parse_program(&MemoryLoader::new().with("test.bas", source), "test.bas")
}
