use super::{ErrorCode, Memory};
use rand::Rng;
use std::collections::HashMap;

/// A host function callable from BASIC. It gets the machine memory and
/// the stack pointer at the call: the return address is at `sp`, the
/// arguments follow in declaration order and the return value space
/// comes right after them.
pub type Native = Box<dyn FnMut(&mut Memory, i32) -> Result<(), ErrorCode>>;

/// ## Native function table

#[derive(Default)]
pub struct Natives {
    table: HashMap<String, Native>,
}

impl std::fmt::Debug for Natives {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.table.keys().collect();
        names.sort();
        write!(f, "Natives {:?}", names)
    }
}

impl Natives {
    pub fn new() -> Natives {
        Natives::default()
    }

    /// `ticks() AS LONG` and `random(INTEGER) AS INTEGER`.
    pub fn standard() -> Natives {
        let mut natives = Natives::new();
        natives.insert("ticks", |memory, sp| {
            memory.write_i64(sp + 4, chrono::Utc::now().timestamp_millis())
        });
        natives.insert("random", |memory, sp| {
            let limit = memory.read_i32(sp + 4)?;
            let value = if limit > 0 {
                rand::thread_rng().gen_range(0..limit)
            } else {
                0
            };
            memory.write_i32(sp + 8, value)
        });
        natives
    }

    pub fn insert<F>(&mut self, name: &str, function: F)
    where
        F: FnMut(&mut Memory, i32) -> Result<(), ErrorCode> + 'static,
    {
        self.table.insert(name.to_string(), Box::new(function));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn call(&mut self, name: &str, memory: &mut Memory, sp: i32) -> Result<(), ErrorCode> {
        match self.table.get_mut(name) {
            Some(function) => function(memory, sp),
            None => Err(ErrorCode::FunctionNotDefined),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard() {
        let mut natives = Natives::standard();
        let mut memory = Memory::new(32);
        memory.write_i32(4, 10).unwrap();
        natives.call("random", &mut memory, 0).unwrap();
        let value = memory.read_i32(8).unwrap();
        assert!((0..10).contains(&value));
        natives.call("ticks", &mut memory, 16).unwrap();
        assert!(memory.read_i64(20).unwrap() > 0);
        assert_eq!(natives.call("nope", &mut memory, 0), Err(ErrorCode::FunctionNotDefined));
    }
}
