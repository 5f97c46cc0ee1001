/*!
## Rust Machine Module

This Rust module generates bytecode for the analysed program graph and
runs it. Every module of a program compiles to its own memory image and
executes on its own virtual machine; channels copy data between them.

*/

#[macro_use]
mod selector;
mod codegen;
mod compile;
mod fixed;
mod instruction;
mod link;
mod memory;
mod native;
mod opcode;
mod operation;
mod program;
mod val;
mod vm;

pub use codegen::codegen;
pub use compile::{compile, compile_graph};
pub use fixed::{Fixed, ParseFixedError};
pub use instruction::{Code, Instruction, Operand, Record, INSTRUCTION_SIZE};
pub use link::{Label, Labels, Link};
pub use memory::Memory;
pub use native::{Native, Natives};
pub use opcode::Opcode;
pub use operation::Operation;
pub use program::{Binding, CompiledModule, CompiledProgram, Entry, FullAddress};
pub use selector::{BranchSelector, CallSelector, Comparator, DataSelector, TypeSelector};
pub use val::{read_integral, string_capacity, wrap, Val, STRING_HEADER};
pub use vm::{ErrorCode, Event, Vm};

#[cfg(test)]
mod tests;
