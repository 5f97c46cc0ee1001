//! # antc
//!
//! Compile an Ant BASIC program and run its modules.
//!

mod term;

fn main() {
    term::main()
}
