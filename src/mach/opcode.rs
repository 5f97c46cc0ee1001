//! ## Virtual machine instruction set
//!
//! The machine has three registers and no general purpose ones: `IP`,
//! `SP` and `LP`. Every operation works on the stack, which grows down
//! from the top of memory. Binary operations find the left operand on
//! top of the stack with the right operand below it.
//!
//! For example: `x = a - 1` with `x` and `a` locals compiles to
//! `[LOAD IMMEDIATE 1, LOAD LOCAL a, SUB INTEGER, STORE LOCAL x]`.
//!
//! Each instruction occupies one 16 byte record, see [`Code`](super::Code).

selector! {
    Opcode {
        Nop = 0 => "NOP",
        /// Push `x0` bytes selected by `p0`.
        Load = 1 => "LOAD",
        /// Pop `x0` bytes into the place selected by `p0`.
        Store = 2 => "STORE",
        /// Convert the top value from `p0` (`x0` bytes) to `p1` (`x1` bytes).
        Cast = 3 => "CAST",
        Pop = 4 => "POP",
        Dup = 5 => "DUP",
        /// Push the return address and transfer to `x0`.
        Call = 6 => "CALL",
        Ret = 7 => "RET",
        /// Save `LP`, point it at the new frame and reserve `x0` bytes.
        Enter = 8 => "ENTER",
        Leave = 9 => "LEAVE",
        Add = 10 => "ADD",
        Sub = 11 => "SUB",
        Mul = 12 => "MUL",
        Div = 13 => "DIV",
        Mod = 14 => "MOD",
        And = 15 => "AND",
        Or = 16 => "OR",
        Xor = 17 => "XOR",
        /// Compare with comparator `p1`, push a BOOLEAN.
        Cmp = 18 => "CMP",
        /// Replace a number with its sign as a BYTE.
        Sign = 19 => "SIGN",
        /// Pop a BOOLEAN and branch to `x0` on the value selected by `p0`.
        If = 20 => "IF",
        Jump = 21 => "JUMP",
        Neg = 22 => "NEG",
        Not = 23 => "NOT",
        Shl = 24 => "SHL",
        Shr = 25 => "SHR",
        End = 127 => "END",
    }
}

impl Opcode {
    /// Operations with a left, right and result operand.
    pub fn is_binary(self) -> bool {
        use Opcode::*;
        matches!(self, Add | Sub | Mul | Div | Mod | And | Or | Xor | Shl | Shr)
    }
}
