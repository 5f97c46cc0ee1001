use super::{
    read_integral, BranchSelector, CallSelector, Comparator, DataSelector, Label, Opcode, TypeSelector,
};
use std::convert::{TryFrom, TryInto};
use std::fmt;

/// Bytes per instruction record.
pub const INSTRUCTION_SIZE: i32 = 16;

/// A 32 bit instruction operand. Everything but a plain value is an
/// address that becomes known when the module is linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Value(i32),
    Label(Label),
    /// Offset into the static data of the module.
    Static(i32),
    /// Offset into the data sets of the module.
    Dynamic(i32),
}

/// An instruction as emitted by the code generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub p: [u8; 3],
    pub x: [Operand; 3],
}

impl Instruction {
    fn new(opcode: Opcode, p: [u8; 3], x: [i32; 3]) -> Instruction {
        Instruction {
            opcode,
            p,
            x: [Operand::Value(x[0]), Operand::Value(x[1]), Operand::Value(x[2])],
        }
    }

    pub fn load(data: DataSelector, size: i32, from: Operand) -> Instruction {
        let mut i = Instruction::new(Opcode::Load, [data as u8, 0, 0], [size, 0, 0]);
        i.x[1] = from;
        i
    }

    /// Up to eight bytes carried in the `x1` and `x2` slots.
    pub fn load_immediate(size: i32, value: i64) -> Instruction {
        let low = value as i32;
        let high = (value >> 32) as i32;
        Instruction::new(Opcode::Load, [DataSelector::Immediate as u8, 0, 0], [size, low, high])
    }

    pub fn store(data: DataSelector, size: i32, to: Operand) -> Instruction {
        let mut i = Instruction::new(Opcode::Store, [data as u8, 0, 0], [size, 0, 0]);
        i.x[1] = to;
        i
    }

    pub fn cast(from: TypeSelector, from_size: i32, to: TypeSelector, to_size: i32) -> Instruction {
        Instruction::new(Opcode::Cast, [from as u8, to as u8, 0], [from_size, to_size, 0])
    }

    pub fn pop(size: i32) -> Instruction {
        Instruction::new(Opcode::Pop, [0; 3], [size, 0, 0])
    }

    pub fn dup(size: i32) -> Instruction {
        Instruction::new(Opcode::Dup, [0; 3], [size, 0, 0])
    }

    pub fn call(call: CallSelector, target: Operand) -> Instruction {
        let mut i = Instruction::new(Opcode::Call, [call as u8, 0, 0], [0; 3]);
        i.x[0] = target;
        i
    }

    pub fn ret() -> Instruction {
        Instruction::new(Opcode::Ret, [0; 3], [0; 3])
    }

    pub fn enter(size: i32) -> Instruction {
        Instruction::new(Opcode::Enter, [0; 3], [size, 0, 0])
    }

    pub fn leave(size: i32) -> Instruction {
        Instruction::new(Opcode::Leave, [0; 3], [size, 0, 0])
    }

    /// `ADD` and friends: left, right and result sizes.
    pub fn binary(opcode: Opcode, ty: TypeSelector, left: i32, right: i32, result: i32) -> Instruction {
        debug_assert!(opcode.is_binary());
        Instruction::new(opcode, [ty as u8, 0, 0], [left, right, result])
    }

    pub fn compare(ty: TypeSelector, comparator: Comparator, left: i32, right: i32) -> Instruction {
        Instruction::new(Opcode::Cmp, [ty as u8, comparator as u8, 0], [left, right, 0])
    }

    /// `NEG`, `NOT` and `SIGN`.
    pub fn unary(opcode: Opcode, ty: TypeSelector, size: i32) -> Instruction {
        Instruction::new(opcode, [ty as u8, 0, 0], [size, 0, 0])
    }

    pub fn branch(on: BranchSelector, target: Label) -> Instruction {
        let mut i = Instruction::new(Opcode::If, [on as u8, 0, 0], [0; 3]);
        i.x[0] = Operand::Label(target);
        i
    }

    pub fn jump(target: Label) -> Instruction {
        let mut i = Instruction::new(Opcode::Jump, [0; 3], [0; 3]);
        i.x[0] = Operand::Label(target);
        i
    }

    pub fn end() -> Instruction {
        Instruction::new(Opcode::End, [0; 3], [0; 3])
    }

    pub fn resolve<E, F>(&self, mut resolve: F) -> Result<Record, E>
    where
        F: FnMut(Operand) -> Result<i32, E>,
    {
        Ok(Record {
            opcode: self.opcode as u8,
            p: self.p,
            x: [resolve(self.x[0])?, resolve(self.x[1])?, resolve(self.x[2])?],
        })
    }
}

/// ## Instruction record
///
/// ```text
/// offset  0       1    2    3    4..8   8..12  12..16
///         opcode  p0   p1   p2   x0     x1     x2
/// ```
///
/// Integers are little endian. An immediate `LOAD` keeps its value in
/// bytes 8 to 16.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub opcode: u8,
    pub p: [u8; 3],
    pub x: [i32; 3],
}

impl Record {
    pub fn encode(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[0] = self.opcode;
        bytes[1..4].copy_from_slice(&self.p);
        for (index, x) in self.x.iter().enumerate() {
            bytes[4 + 4 * index..8 + 4 * index].copy_from_slice(&x.to_le_bytes());
        }
        bytes
    }

    pub fn decode(bytes: &[u8]) -> Option<Record> {
        if bytes.len() < INSTRUCTION_SIZE as usize {
            return None;
        }
        let x = |index: usize| -> Option<i32> {
            let word: [u8; 4] = bytes[4 + 4 * index..8 + 4 * index].try_into().ok()?;
            Some(i32::from_le_bytes(word))
        };
        Some(Record {
            opcode: bytes[0],
            p: [bytes[1], bytes[2], bytes[3]],
            x: [x(0)?, x(1)?, x(2)?],
        })
    }

    /// The value of an immediate `LOAD`.
    pub fn immediate(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[0..4].copy_from_slice(&self.x[1].to_le_bytes());
        bytes[4..8].copy_from_slice(&self.x[2].to_le_bytes());
        bytes
    }
}

fn tag<T: TryFrom<u8> + fmt::Display>(byte: u8) -> String {
    match T::try_from(byte) {
        Ok(t) => t.to_string(),
        Err(_) => format!("?{}", byte),
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let opcode = match Opcode::try_from(self.opcode) {
            Ok(opcode) => opcode,
            Err(byte) => return write!(f, "?{}", byte),
        };
        let [x0, x1, x2] = self.x;
        let [p0, p1, _] = self.p;
        write!(f, "{}", opcode)?;
        use Opcode::*;
        match opcode {
            Nop | Ret | End => Ok(()),
            Load | Store => match DataSelector::try_from(p0) {
                Ok(DataSelector::Zero) => write!(f, " ZERO {}", x0),
                Ok(DataSelector::Immediate) => {
                    let size = x0.max(0).min(8) as usize;
                    write!(f, " IMMEDIATE {} {}", x0, read_integral(&self.immediate()[..size]))
                }
                _ => write!(f, " {} {} {}", tag::<DataSelector>(p0), x0, x1),
            },
            Cast => write!(f, " {} {} {} {}", tag::<TypeSelector>(p0), tag::<TypeSelector>(p1), x0, x1),
            Pop | Dup | Enter | Leave | Jump => write!(f, " {}", x0),
            Call => write!(f, " {} {}", tag::<CallSelector>(p0), x0),
            Cmp => write!(f, " {} {} {} {}", tag::<TypeSelector>(p0), tag::<Comparator>(p1), x0, x1),
            Sign | Neg | Not => write!(f, " {} {}", tag::<TypeSelector>(p0), x0),
            If => write!(f, " {} {}", tag::<BranchSelector>(p0), x0),
            Add | Sub | Mul | Div | Mod | And | Or | Xor | Shl | Shr => {
                write!(f, " {} {} {} {}", tag::<TypeSelector>(p0), x0, x1, x2)
            }
        }
    }
}

/// The code segment of a module image, displayed as a listing.
pub struct Code<'a>(pub &'a [u8]);

impl<'a> fmt::Display for Code<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (index, bytes) in self.0.chunks(INSTRUCTION_SIZE as usize).enumerate() {
            let address = index * INSTRUCTION_SIZE as usize;
            match Record::decode(bytes) {
                Some(record) => writeln!(f, "{:06}  {}", address, record)?,
                None => writeln!(f, "{:06}  ?", address)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(instruction: Instruction) -> Record {
        instruction.resolve::<(), _>(|operand| match operand {
            Operand::Value(v) => Ok(v),
            _ => Err(()),
        })
        .unwrap()
    }

    #[test]
    fn test_encoding() {
        let record = value(Instruction::binary(Opcode::Add, TypeSelector::Integer, 4, 4, 4));
        let bytes = record.encode();
        assert_eq!(&bytes[0..8], &[10, 5, 0, 0, 4, 0, 0, 0]);
        assert_eq!(Record::decode(&bytes), Some(record));
        assert_eq!(Record::decode(&bytes[..15]), None);
    }

    #[test]
    fn test_immediate() {
        let record = value(Instruction::load_immediate(8, -5_000_000_000));
        assert_eq!(i64::from_le_bytes(record.immediate()), -5_000_000_000);
        assert_eq!(record.to_string(), "LOAD IMMEDIATE 8 -5000000000");
    }

    #[test]
    fn test_listing() {
        let mut image = vec![];
        image.extend_from_slice(&value(Instruction::compare(TypeSelector::Integer, Comparator::Less, 4, 4)).encode());
        image.extend_from_slice(&value(Instruction::unary(Opcode::Sign, TypeSelector::Real, 8)).encode());
        image.extend_from_slice(&value(Instruction::end()).encode());
        assert_eq!(
            Code(&image).to_string(),
            "000000  CMP INTEGER LESS 4 4\n000016  SIGN REAL 8\n000032  END\n"
        );
    }
}
