use ant::lang::MemoryLoader;
use ant::mach::{compile, CompiledProgram, Event, Natives, Vm};
use std::cell::RefCell;
use std::rc::Rc;

/// Declares the `print` native every test program may call.
pub const PRELUDE: &str = "CODE\nDECLARE FUNCTION print(POINTER TO CONST STRING)\nEND CODE\n";

pub fn program(source: &str) -> CompiledProgram {
    let loader = MemoryLoader::new().with("test.bas", &format!("{}{}", PRELUDE, source));
    match compile(&loader, "test.bas") {
        Ok(program) => program,
        Err(e) => panic!("{}", e),
    }
}

pub fn exec(source: &str) -> String {
    exec_n(&program(source), 100)
}

/// Run every module round robin, `cycles` instructions at a time, moving
/// channel data after each round. Printed lines and faults are collected.
pub fn exec_n(program: &CompiledProgram, cycles: usize) -> String {
    let output = Rc::new(RefCell::new(String::new()));
    let mut natives = Natives::standard();
    let sink = output.clone();
    natives.insert("print", move |memory, sp| {
        let address = memory.read_i32(sp + 4)?;
        let text = memory.read_string(address)?;
        sink.borrow_mut().push_str(&format!("{}\n", text));
        Ok(())
    });
    let mut ants: Vec<(String, Vm)> = program
        .modules()
        .iter()
        .map(|m| (m.name().to_string(), Vm::new(m, 65536).unwrap()))
        .collect();
    for _ in 0..1000 {
        if ants.iter().all(|(_, vm)| vm.event() != Event::Running) {
            break;
        }
        for (name, vm) in ants.iter_mut() {
            if vm.event() != Event::Running {
                continue;
            }
            if let Event::Fault(code) = vm.run(&mut natives, cycles) {
                output.borrow_mut().push_str(&format!("{} IN {}\n", code, name));
            }
        }
        for binding in program.bindings() {
            let from = ants.iter().position(|(n, _)| *n == binding.source.module).unwrap();
            let to = ants.iter().position(|(n, _)| *n == binding.destination.module).unwrap();
            let data = ants[from].1.read(binding.source.address, binding.size).unwrap().to_vec();
            ants[to].1.write(binding.destination.address, &data).unwrap();
        }
    }
    let s = output.borrow().clone();
    s
}
