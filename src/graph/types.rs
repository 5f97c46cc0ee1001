use super::NodeId;
use crate::mach::TypeSelector;
use std::collections::HashMap;

/// Index of a type in the [`Types`] side table.
pub type TypeId = usize;

/// ## Data types
///
/// Types live in a side table shared by the whole program. Built-in types
/// sit at fixed indices so every node referring to `INTEGER` refers to the
/// same entry. Compound types point at other entries by index.

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Boolean,
    Byte,
    Short,
    Integer,
    Long,
    Real,
    /// Capacity in characters; `None` is the abstract `STRING`.
    String(Option<u32>),
    /// `STRING OF <expr>` before the length expression is evaluated.
    PendingString(NodeId),
    Pointer(TypeId),
    Struct(NodeId, String),
    /// Never wraps another `Constant`.
    Constant(TypeId),
    /// A type used by name before `bindTypes` resolves it.
    Named(String),
}

#[derive(Debug, Clone)]
pub struct Types {
    table: Vec<DataType>,
    struct_sizes: HashMap<NodeId, i32>,
}

impl Default for Types {
    fn default() -> Types {
        Types::new()
    }
}

impl Types {
    pub const BOOLEAN: TypeId = 0;
    pub const BYTE: TypeId = 1;
    pub const SHORT: TypeId = 2;
    pub const INTEGER: TypeId = 3;
    pub const LONG: TypeId = 4;
    pub const REAL: TypeId = 5;
    pub const STRING: TypeId = 6;

    pub fn new() -> Types {
        use DataType::*;
        Types {
            table: vec![Boolean, Byte, Short, Integer, Long, Real, String(None)],
            struct_sizes: HashMap::new(),
        }
    }

    pub fn get(&self, id: TypeId) -> &DataType {
        &self.table[id]
    }

    /// Add a type, reusing an equal entry when there is one. Unresolved
    /// types always get their own entry since `bindTypes` rewrites them.
    pub fn add(&mut self, data_type: DataType) -> TypeId {
        match data_type {
            DataType::Named(_) | DataType::PendingString(_) => {}
            DataType::Constant(inner) if self.is_constant(inner) => return inner,
            _ => {
                if let Some(id) = self.table.iter().position(|t| *t == data_type) {
                    return id;
                }
            }
        }
        self.table.push(data_type);
        self.table.len() - 1
    }

    /// Rewrite an unresolved entry in place.
    pub fn resolve(&mut self, id: TypeId, data_type: DataType) {
        debug_assert!(matches!(
            self.table[id],
            DataType::Named(_) | DataType::PendingString(_)
        ));
        self.table[id] = data_type;
    }

    /// Ids of entries still waiting for `bindTypes`.
    pub fn unresolved(&self) -> Vec<TypeId> {
        (0..self.table.len())
            .filter(|id| matches!(self.table[*id], DataType::Named(_) | DataType::PendingString(_)))
            .collect()
    }

    pub fn constant(&mut self, id: TypeId) -> TypeId {
        self.add(DataType::Constant(id))
    }

    pub fn string_of(&mut self, length: u32) -> TypeId {
        self.add(DataType::String(Some(length)))
    }

    pub fn pointer_to(&mut self, id: TypeId) -> TypeId {
        self.add(DataType::Pointer(id))
    }

    /// Strip a `CONST` modifier.
    pub fn base(&self, id: TypeId) -> TypeId {
        match self.table[id] {
            DataType::Constant(inner) => inner,
            _ => id,
        }
    }

    pub fn is_constant(&self, id: TypeId) -> bool {
        matches!(self.table[id], DataType::Constant(_))
    }

    pub fn rank(&self, id: TypeId) -> Option<u8> {
        match self.table[self.base(id)] {
            DataType::Byte => Some(1),
            DataType::Short => Some(2),
            DataType::Integer => Some(3),
            DataType::Long => Some(4),
            DataType::Real => Some(5),
            _ => None,
        }
    }

    pub fn of_rank(rank: u8) -> TypeId {
        match rank {
            1 => Types::BYTE,
            2 => Types::SHORT,
            3 => Types::INTEGER,
            4 => Types::LONG,
            _ => Types::REAL,
        }
    }

    pub fn is_numeric(&self, id: TypeId) -> bool {
        self.rank(id).is_some()
    }

    pub fn is_integral(&self, id: TypeId) -> bool {
        matches!(self.rank(id), Some(r) if r < 5)
    }

    pub fn is_boolean(&self, id: TypeId) -> bool {
        self.base(id) == Types::BOOLEAN
    }

    pub fn is_string(&self, id: TypeId) -> bool {
        matches!(self.table[self.base(id)], DataType::String(_))
    }

    pub fn string_length(&self, id: TypeId) -> Option<u32> {
        match self.table[self.base(id)] {
            DataType::String(length) => length,
            _ => None,
        }
    }

    pub fn pointee(&self, id: TypeId) -> Option<TypeId> {
        match self.table[self.base(id)] {
            DataType::Pointer(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn struct_node(&self, id: TypeId) -> Option<NodeId> {
        match self.table[self.base(id)] {
            DataType::Struct(node, _) => Some(node),
            _ => None,
        }
    }

    /// Size or length not known: bare `STRING` or anything unresolved.
    pub fn is_abstract(&self, id: TypeId) -> bool {
        match &self.table[self.base(id)] {
            DataType::String(None) | DataType::Named(_) | DataType::PendingString(_) => true,
            _ => false,
        }
    }

    pub fn selector(&self, id: TypeId) -> TypeSelector {
        match self.table[self.base(id)] {
            DataType::Boolean => TypeSelector::Boolean,
            DataType::Byte => TypeSelector::Byte,
            DataType::Short => TypeSelector::Short,
            DataType::Integer => TypeSelector::Integer,
            DataType::Long => TypeSelector::Long,
            DataType::Real => TypeSelector::Real,
            DataType::String(_) => TypeSelector::String,
            DataType::Pointer(_) => TypeSelector::Pointer,
            DataType::Struct(..) => TypeSelector::Struct,
            _ => TypeSelector::Unknown,
        }
    }

    pub fn set_struct_size(&mut self, node: NodeId, size: i32) {
        self.struct_sizes.insert(node, size);
    }

    /// Size in bytes, once known.
    pub fn size(&self, id: TypeId) -> Option<i32> {
        Some(match self.table[self.base(id)] {
            DataType::Boolean | DataType::Byte => 1,
            DataType::Short => 2,
            DataType::Integer | DataType::Pointer(_) => 4,
            DataType::Long | DataType::Real => 8,
            DataType::String(Some(length)) => 8 + 2 * length as i32,
            DataType::Struct(node, _) => return self.struct_sizes.get(&node).copied(),
            _ => return None,
        })
    }

    /// Bit-identical representation, `CONST` on the outside ignored.
    pub fn is_binary_analog(&self, a: TypeId, b: TypeId) -> bool {
        self.same(self.base(a), self.base(b))
    }

    fn same(&self, a: TypeId, b: TypeId) -> bool {
        if a == b {
            return true;
        }
        match (&self.table[a], &self.table[b]) {
            (DataType::Pointer(x), DataType::Pointer(y)) | (DataType::Constant(x), DataType::Constant(y)) => {
                self.same(*x, *y)
            }
            (x, y) => x == y,
        }
    }

    /// `actual` can stand in for `expected` by address: analogs, and every
    /// `STRING OF n` for the abstract `STRING`.
    pub fn inherits(&self, actual: TypeId, expected: TypeId) -> bool {
        if self.is_binary_analog(actual, expected) {
            return true;
        }
        matches!(
            (&self.table[self.base(actual)], &self.table[self.base(expected)]),
            (DataType::String(Some(_)), DataType::String(None))
        )
    }

    pub fn name(&self, id: TypeId) -> String {
        match &self.table[id] {
            DataType::Boolean => "BOOLEAN".into(),
            DataType::Byte => "BYTE".into(),
            DataType::Short => "SHORT".into(),
            DataType::Integer => "INTEGER".into(),
            DataType::Long => "LONG".into(),
            DataType::Real => "REAL".into(),
            DataType::String(None) => "STRING".into(),
            DataType::String(Some(n)) => format!("STRING OF {}", n),
            DataType::PendingString(_) => "STRING OF ?".into(),
            DataType::Pointer(inner) => format!("POINTER TO {}", self.name(*inner)),
            DataType::Struct(_, name) | DataType::Named(name) => name.clone(),
            DataType::Constant(inner) => format!("CONST {}", self.name(*inner)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singletons_and_interning() {
        let mut types = Types::new();
        assert_eq!(types.add(DataType::Integer), Types::INTEGER);
        let s5 = types.string_of(5);
        assert_eq!(types.string_of(5), s5);
        let c = types.constant(s5);
        assert_eq!(types.constant(c), c);
        assert_eq!(types.base(c), s5);
        assert_eq!(types.name(c), "CONST STRING OF 5");
        assert_eq!(types.size(c), Some(18));
    }

    #[test]
    fn test_casting_relations() {
        let mut types = Types::new();
        let s3 = types.string_of(3);
        let cs3 = types.constant(s3);
        assert!(types.is_binary_analog(cs3, s3));
        assert!(types.inherits(s3, Types::STRING));
        assert!(!types.inherits(Types::STRING, s3));
        assert!(types.is_abstract(Types::STRING));
        assert!(!types.is_abstract(s3));
        let cstring = types.constant(Types::STRING);
        let p1 = types.pointer_to(cstring);
        let p2 = types.pointer_to(Types::STRING);
        assert!(!types.is_binary_analog(p1, p2));
        assert_eq!(types.selector(p1), TypeSelector::Pointer);
        assert_eq!(types.name(p1), "POINTER TO CONST STRING");
    }
}
