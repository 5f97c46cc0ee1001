use super::*;
use crate::lang::MemoryLoader;

mod for_test;

const MEMORY: usize = 4096;

fn module(source: &str) -> CompiledModule {
    let program = match compile(&MemoryLoader::new().with("test.bas", source), "test.bas") {
        Ok(program) => program,
        Err(e) => panic!("{}", e),
    };
    program.modules()[0].clone()
}

/// Source of a single module `M` holding `functions`.
fn functions(functions: &str) -> String {
    format!("MODULE M Test\n{}\nEND MODULE\n", functions)
}

/// Call `name` directly and return the event and the result bytes.
fn call(source: &str, name: &str, arguments: &[u8]) -> (Event, Vec<u8>) {
    call_with(&mut Natives::new(), source, name, arguments)
}

fn call_with(natives: &mut Natives, source: &str, name: &str, arguments: &[u8]) -> (Event, Vec<u8>) {
    let module = module(source);
    let entry = match module.function(name) {
        Some(entry) => *entry,
        None => panic!("no function {}", name),
    };
    let mut vm = Vm::new(&module, MEMORY).unwrap();
    vm.invoke(&entry, arguments).unwrap();
    let event = vm.run(natives, 100_000);
    let top = vm.memory().len();
    let result = vm.read(top - entry.result, entry.result).unwrap().to_vec();
    (event, result)
}

fn integer(bytes: &[u8]) -> i64 {
    read_integral(bytes)
}
