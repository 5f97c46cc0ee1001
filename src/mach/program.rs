use super::{Code, ErrorCode, Vm};
use std::collections::BTreeMap;

/// Where a compiled function starts and what a direct call needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub address: i32,
    /// Bytes of arguments.
    pub arguments: i32,
    /// Bytes of the return value.
    pub result: i32,
}

/// ## Compiled module
///
/// The memory image of one module: code followed by static data. The
/// data sets of the module come right after the image and start zeroed,
/// except for the headers of string fields.

#[derive(Debug, Clone)]
pub struct CompiledModule {
    name: String,
    executor: String,
    image: Vec<u8>,
    code_size: i32,
    data_size: i32,
    /// Initial contents of the data sets; the rest of `data_size` is zero.
    data: Vec<u8>,
    functions: BTreeMap<String, Entry>,
}

impl CompiledModule {
    pub fn new(
        name: &str,
        executor: &str,
        image: Vec<u8>,
        code_size: i32,
        data_size: i32,
        functions: BTreeMap<String, Entry>,
    ) -> CompiledModule {
        CompiledModule {
            name: name.to_string(),
            executor: executor.to_string(),
            image,
            code_size,
            data_size,
            data: vec![],
            functions,
        }
    }

    pub fn with_data(mut self, data: Vec<u8>) -> CompiledModule {
        self.data = data;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn executor(&self) -> &str {
        &self.executor
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }

    pub fn code(&self) -> Code {
        Code(&self.image[..self.code_size as usize])
    }

    pub fn static_base(&self) -> i32 {
        self.code_size
    }

    pub fn dynamic_base(&self) -> i32 {
        self.image.len() as i32
    }

    pub fn data_size(&self) -> i32 {
        self.data_size
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn function(&self, name: &str) -> Option<&Entry> {
        self.functions.get(name)
    }

    pub fn functions(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.functions.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Code listing followed by the function table.
    pub fn listing(&self) -> String {
        let mut listing = format!("MODULE {} {}\n", self.name, self.executor);
        listing.push_str(&self.code().to_string());
        for (name, entry) in &self.functions {
            listing.push_str(&format!("{:06}  {}\n", entry.address, name));
        }
        listing
    }
}

/// A byte address inside the memory of a named module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FullAddress {
    pub module: String,
    pub address: i32,
}

/// A channel: the output field of one module copied into the input
/// field of another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub source: FullAddress,
    pub destination: FullAddress,
    pub size: i32,
}

impl Binding {
    pub fn transfer(&self, from: &Vm, to: &mut Vm) -> Result<(), ErrorCode> {
        let data = from.read(self.source.address, self.size)?.to_vec();
        to.write(self.destination.address, &data)
    }
}

/// ## Compiled program
///
/// Every module of a program plus the bindings between them.

#[derive(Debug, Clone, Default)]
pub struct CompiledProgram {
    modules: Vec<CompiledModule>,
    bindings: Vec<Binding>,
}

impl CompiledProgram {
    pub fn new(modules: Vec<CompiledModule>, bindings: Vec<Binding>) -> CompiledProgram {
        CompiledProgram { modules, bindings }
    }

    pub fn modules(&self) -> &[CompiledModule] {
        &self.modules
    }

    pub fn module(&self, name: &str) -> Option<&CompiledModule> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Modules grouped by the executor they run on.
    pub fn executors(&self) -> BTreeMap<&str, Vec<&CompiledModule>> {
        let mut executors: BTreeMap<&str, Vec<&CompiledModule>> = BTreeMap::new();
        for module in &self.modules {
            executors.entry(module.executor()).or_default().push(module);
        }
        executors
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }
}
