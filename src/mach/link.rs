use super::{Instruction, Operand, INSTRUCTION_SIZE};
use crate::error;
use crate::lang::Error;

type Result<T> = std::result::Result<T, Error>;

/// A code address that is not known yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(usize);

/// ## Label table
///
/// The code generator creates labels as placeholders for jump and call
/// targets and binds each one to an address exactly once. Linking
/// refuses to produce an image while any label is unbound.

#[derive(Debug, Default)]
pub struct Labels {
    addresses: Vec<Option<i32>>,
}

impl Labels {
    pub fn new() -> Labels {
        Labels::default()
    }

    pub fn create(&mut self) -> Label {
        self.addresses.push(None);
        Label(self.addresses.len() - 1)
    }

    pub fn bind(&mut self, label: Label, address: i32) -> Result<()> {
        match self.addresses.get_mut(label.0) {
            Some(slot) if slot.is_none() => {
                *slot = Some(address);
                Ok(())
            }
            Some(_) => Err(error!(InternalError; "LABEL {} BOUND TWICE", label.0)),
            None => Err(error!(InternalError; "UNKNOWN LABEL {}", label.0)),
        }
    }

    pub fn address(&self, label: Label) -> Option<i32> {
        self.addresses.get(label.0).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// ## Linker
///
/// Turns symbolic instructions into the 16 byte records of a module
/// image once the sizes of code and static data are known.

pub struct Link<'a> {
    labels: &'a Labels,
    static_base: i32,
    dynamic_base: i32,
}

impl<'a> Link<'a> {
    pub fn new(labels: &'a Labels, static_base: i32, dynamic_base: i32) -> Link<'a> {
        Link {
            labels,
            static_base,
            dynamic_base,
        }
    }

    pub fn resolve(&self, operand: Operand) -> Result<i32> {
        Ok(match operand {
            Operand::Value(value) => value,
            Operand::Static(offset) => self.static_base + offset,
            Operand::Dynamic(offset) => self.dynamic_base + offset,
            Operand::Label(label) => match self.labels.address(label) {
                Some(address) => address,
                None => return Err(error!(InternalError; "UNRESOLVED LABEL {}", label.0)),
            },
        })
    }

    pub fn link(&self, code: &[Instruction]) -> Result<Vec<u8>> {
        if let Some(index) = self.labels.addresses.iter().position(Option::is_none) {
            return Err(error!(InternalError; "UNRESOLVED LABEL {}", index));
        }
        let mut image = Vec::with_capacity(code.len() * INSTRUCTION_SIZE as usize);
        for instruction in code {
            let record = instruction.resolve(|operand| self.resolve(operand))?;
            image.extend_from_slice(&record.encode());
        }
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::ErrorCode;
    use crate::mach::{BranchSelector, Record};

    #[test]
    fn test_bind_once() {
        let mut labels = Labels::new();
        let a = labels.create();
        assert!(labels.bind(a, 32).is_ok());
        let e = labels.bind(a, 48).unwrap_err();
        assert_eq!(e.code(), ErrorCode::InternalError);
        assert_eq!(labels.address(a), Some(32));
    }

    #[test]
    fn test_link() {
        let mut labels = Labels::new();
        let exit = labels.create();
        let code = vec![Instruction::branch(BranchSelector::OnFalse, exit), Instruction::end()];
        assert!(Link::new(&labels, 32, 32).link(&code).is_err());
        labels.bind(exit, 16).unwrap();
        let image = Link::new(&labels, 32, 32).link(&code).unwrap();
        assert_eq!(image.len(), 32);
        let record = Record::decode(&image[0..16]).unwrap();
        assert_eq!(record.x[0], 16);
        assert_eq!(Link::new(&labels, 32, 40).resolve(Operand::Dynamic(4)).unwrap(), 44);
    }
}
