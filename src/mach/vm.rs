use super::{
    BranchSelector, CallSelector, Comparator, CompiledModule, DataSelector, Entry, Memory, Natives, Opcode,
    Operation, Record, TypeSelector, Val, INSTRUCTION_SIZE,
};
use std::convert::TryFrom;
use tracing::warn;

type Result<T> = std::result::Result<T, ErrorCode>;

/// Why a machine stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Ok,
    BadInstruction,
    FunctionNotDefined,
    SegmentationFault,
    StackOverflow,
    DivisionByZero,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use ErrorCode::*;
        let s = match self {
            Ok => "OK",
            BadInstruction => "BAD_INSTRUCTION",
            FunctionNotDefined => "FUNCTION_NOT_DEFINED",
            SegmentationFault => "SEGMENTATION_FAULT",
            StackOverflow => "STACK_OVERFLOW",
            DivisionByZero => "DIVISION_BY_ZERO",
        };
        write!(f, "{}", s)
    }
}

/// State of a machine after [`Vm::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The instruction quota ran out; call `run` again to continue.
    Running,
    Stopped,
    Fault(ErrorCode),
}

/// ## Virtual machine
///
/// Executes the image of one compiled module in its own memory:
/// `CODE | STATIC DATA | DYNAMIC DATA | ... | STACK`. The stack starts at
/// the top of memory and may not grow into the module data.

#[derive(Debug)]
pub struct Vm {
    memory: Memory,
    ip: i32,
    sp: i32,
    lp: i32,
    /// `RET` to this stack pointer halts the machine.
    entry_sp: i32,
    limit: i32,
    power: bool,
    error: ErrorCode,
}

impl Vm {
    pub fn new(module: &CompiledModule, memory_size: usize) -> Result<Vm> {
        let mut memory = Memory::new(memory_size);
        let limit = module.dynamic_base() + module.data_size();
        if limit > memory.len() {
            return Err(ErrorCode::SegmentationFault);
        }
        memory.write(0, module.image())?;
        if module.data().len() as i32 > module.data_size() {
            return Err(ErrorCode::SegmentationFault);
        }
        memory.write(module.dynamic_base(), module.data())?;
        let top = memory.len();
        Ok(Vm {
            memory,
            ip: 0,
            sp: top,
            lp: top,
            entry_sp: top,
            limit,
            power: true,
            error: ErrorCode::Ok,
        })
    }

    /// Prepare a direct call of a compiled function. The return value is
    /// found at the top of memory when the machine stops.
    pub fn invoke(&mut self, entry: &Entry, arguments: &[u8]) -> Result<()> {
        if arguments.len() as i32 != entry.arguments {
            return Err(ErrorCode::BadInstruction);
        }
        let top = self.memory.len();
        self.sp = top;
        self.lp = top;
        self.power = true;
        self.error = ErrorCode::Ok;
        self.push_zeros(entry.result)?;
        self.push(arguments)?;
        self.entry_sp = self.sp;
        self.push_i32(0)?;
        self.ip = entry.address;
        Ok(())
    }

    /// Execute at most `quota` instructions.
    pub fn run(&mut self, natives: &mut Natives, quota: usize) -> Event {
        for _ in 0..quota {
            if !self.power {
                break;
            }
            if let Err(code) = self.step(natives) {
                self.halt(code);
            }
        }
        self.event()
    }

    pub fn event(&self) -> Event {
        match (self.power, self.error) {
            (true, _) => Event::Running,
            (false, ErrorCode::Ok) => Event::Stopped,
            (false, code) => Event::Fault(code),
        }
    }

    fn halt(&mut self, code: ErrorCode) {
        if code != ErrorCode::Ok {
            warn!(error = %code, ip = self.ip, "machine halted");
        }
        self.power = false;
        self.error = code;
    }

    pub fn error_code(&self) -> ErrorCode {
        self.error
    }

    pub fn ip(&self) -> i32 {
        self.ip
    }

    pub fn sp(&self) -> i32 {
        self.sp
    }

    pub fn lp(&self) -> i32 {
        self.lp
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn read(&self, address: i32, size: i32) -> Result<&[u8]> {
        self.memory.read(address, size)
    }

    pub fn write(&mut self, address: i32, data: &[u8]) -> Result<()> {
        self.memory.write(address, data)
    }

    // *** Stack

    fn reserve(&mut self, size: i32) -> Result<i32> {
        if size < 0 {
            return Err(ErrorCode::StackOverflow);
        }
        match self.sp.checked_sub(size) {
            Some(sp) if sp >= self.limit => {
                self.sp = sp;
                Ok(sp)
            }
            _ => Err(ErrorCode::StackOverflow),
        }
    }

    /// Drop `size` bytes from the stack without reading them.
    fn release(&mut self, size: i32) -> Result<()> {
        if size < 0 {
            return Err(ErrorCode::StackOverflow);
        }
        match self.sp.checked_add(size) {
            Some(sp) if sp <= self.memory.len() => {
                self.sp = sp;
                Ok(())
            }
            _ => Err(ErrorCode::SegmentationFault),
        }
    }

    fn local(&self, offset: i32) -> Result<i32> {
        self.lp.checked_add(offset).ok_or(ErrorCode::SegmentationFault)
    }

    fn push(&mut self, data: &[u8]) -> Result<()> {
        let sp = self.reserve(data.len() as i32)?;
        self.memory.write(sp, data)
    }

    fn push_zeros(&mut self, size: i32) -> Result<()> {
        let sp = self.reserve(size)?;
        self.memory.fill(sp, size, 0)
    }

    fn push_i32(&mut self, value: i32) -> Result<()> {
        self.push(&value.to_le_bytes())
    }

    fn pop(&mut self, size: i32) -> Result<Vec<u8>> {
        let data = self.memory.read(self.sp, size)?.to_vec();
        self.release(size)?;
        Ok(data)
    }

    fn pop_i32(&mut self) -> Result<i32> {
        let value = self.memory.read_i32(self.sp)?;
        self.release(4)?;
        Ok(value)
    }

    fn pop_val(&mut self, ty: TypeSelector, size: i32) -> Result<Val> {
        let bytes = self.pop(size)?;
        Val::decode(ty, &bytes)
    }

    fn push_val(&mut self, val: &Val, size: i32) -> Result<()> {
        let sp = self.reserve(size)?;
        let bytes = val.encode(size as usize);
        self.memory.write(sp, &bytes[..size as usize])
    }

    // *** Execution

    fn step(&mut self, natives: &mut Natives) -> Result<()> {
        let record = match Record::decode(self.memory.read(self.ip, INSTRUCTION_SIZE)?) {
            Some(record) => record,
            None => return Err(ErrorCode::SegmentationFault),
        };
        let opcode = Opcode::try_from(record.opcode).map_err(|_| ErrorCode::BadInstruction)?;
        let [p0, p1, _] = record.p;
        let [x0, x1, x2] = record.x;
        let next = self.ip + INSTRUCTION_SIZE;
        use Opcode::*;
        match opcode {
            Nop => {}
            Load => match selector::<DataSelector>(p0)? {
                DataSelector::Global => {
                    let sp = self.reserve(x0)?;
                    self.memory.copy(x1, sp, x0)?;
                }
                DataSelector::Local => {
                    let from = self.local(x1)?;
                    let sp = self.reserve(x0)?;
                    self.memory.copy(from, sp, x0)?;
                }
                DataSelector::Immediate => {
                    if !(0..=8).contains(&x0) {
                        return Err(ErrorCode::BadInstruction);
                    }
                    let value = record.immediate();
                    self.push(&value[..x0 as usize])?;
                }
                DataSelector::LocalPointer => self.push_i32(self.local(x1)?)?,
                DataSelector::Zero => self.push_zeros(x0)?,
            },
            Store => {
                let to = match selector::<DataSelector>(p0)? {
                    DataSelector::Global => x1,
                    DataSelector::Local => self.local(x1)?,
                    _ => return Err(ErrorCode::BadInstruction),
                };
                self.memory.copy(self.sp, to, x0)?;
                self.release(x0)?;
            }
            Cast => {
                let val = self.pop_val(selector(p0)?, x0)?;
                let val = Operation::cast(val, selector(p1)?)?;
                self.push_val(&val, x1)?;
            }
            Pop => {
                self.memory.read(self.sp, x0)?;
                self.release(x0)?;
            }
            Dup => {
                let top = self.memory.read(self.sp, x0)?.to_vec();
                self.push(&top)?;
            }
            Call => {
                self.push_i32(next)?;
                match selector::<CallSelector>(p0)? {
                    CallSelector::UserDefined => {
                        self.ip = x0;
                        return Ok(());
                    }
                    CallSelector::Native => {
                        let name = self.memory.read_string(x0)?;
                        natives.call(&name, &mut self.memory, self.sp)?;
                        self.ip = self.pop_i32()?;
                        return Ok(());
                    }
                }
            }
            Ret => {
                self.ip = self.pop_i32()?;
                if self.sp == self.entry_sp {
                    self.halt(ErrorCode::Ok);
                }
                return Ok(());
            }
            Enter => {
                self.push_i32(self.lp)?;
                self.lp = self.sp;
                self.reserve(x0)?;
            }
            Leave => {
                self.release(x0)?;
                self.lp = self.pop_i32()?;
            }
            Add | Sub | Mul | Div | Mod | And | Or | Xor | Shl | Shr => {
                let ty = selector(p0)?;
                let left = self.pop_val(ty, x0)?;
                let right = self.pop_val(ty, x1)?;
                let result = Operation::binary(opcode, left, right)?;
                self.push_val(&result, x2)?;
            }
            Cmp => {
                let ty = selector(p0)?;
                let comparator = selector::<Comparator>(p1)?;
                let left = self.pop_val(ty, x0)?;
                let right = self.pop_val(ty, x1)?;
                let result = Operation::compare(comparator, &left, &right)?;
                self.push(&[result as u8])?;
            }
            Sign => {
                let val = self.pop_val(selector(p0)?, x0)?;
                let sign = Operation::sign(&val)?;
                self.push(&[sign as u8])?;
            }
            Neg | Not => {
                let val = self.pop_val(selector(p0)?, x0)?;
                let result = match opcode {
                    Neg => Operation::negate(val)?,
                    _ => Operation::not(val)?,
                };
                self.push_val(&result, x0)?;
            }
            If => {
                let condition = self.pop(1)?[0] != 0;
                let on = selector::<BranchSelector>(p0)? == BranchSelector::OnTrue;
                self.ip = if condition == on { x0 } else { next };
                return Ok(());
            }
            Jump => {
                self.ip = x0;
                return Ok(());
            }
            End => {
                self.halt(ErrorCode::Ok);
                return Ok(());
            }
        }
        self.ip = next;
        Ok(())
    }
}

fn selector<T: TryFrom<u8>>(byte: u8) -> Result<T> {
    T::try_from(byte).map_err(|_| ErrorCode::BadInstruction)
}
