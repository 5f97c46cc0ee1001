//! # Ant BASIC
//!
//! A BASIC dialect for programs made of communicating modules. Each
//! module is compiled to fixed-width bytecode and runs in its own stack
//! machine; channels declared in a `TRANSMISSION` block copy output
//! fields of one module into input fields of another.
//!
//! ```text
//! CODE
//!     DECLARE FUNCTION print(POINTER TO CONST STRING)
//! END CODE
//!
//! MODULE Hello Browser
//!     FUNCTION MAIN()
//!         print("Hello")
//!     END FUNCTION
//! END MODULE
//! ```
//!
//! Compilation runs in three stages: [`lang`] reads and parses the source,
//! [`graph`] builds and analyses the program graph, and [`mach`] generates
//! code for each module and executes it.

pub mod lang;
pub mod graph;
pub mod mach;
