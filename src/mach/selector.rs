//! One-byte operand tags carried in the `p0..p2` slots of an instruction.

macro_rules! selector {
    ($(#[$doc:meta])* $name:ident { $($(#[$vdoc:meta])* $variant:ident = $value:literal => $text:literal,)* }) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vdoc])* $variant = $value,)*
        }

        impl std::convert::TryFrom<u8> for $name {
            type Error = u8;
            fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
                match value {
                    $($value => Ok($name::$variant),)*
                    _ => Err(value),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                match self {
                    $($name::$variant => write!(f, "{}", $text),)*
                }
            }
        }
    };
}

selector! {
    /// Where `LOAD` reads from and `STORE` writes to.
    DataSelector {
        Global = 0 => "GLOBAL",
        Local = 1 => "LOCAL",
        Immediate = 2 => "IMMEDIATE",
        LocalPointer = 3 => "LOCAL_POINTER",
        Zero = 4 => "ZERO",
    }
}

selector! {
    /// Static type of the data an instruction works on.
    TypeSelector {
        Unknown = 0 => "UNKNOWN",
        Pointer = 1 => "POINTER",
        Boolean = 2 => "BOOLEAN",
        Byte = 3 => "BYTE",
        Short = 4 => "SHORT",
        Integer = 5 => "INTEGER",
        Long = 6 => "LONG",
        Real = 7 => "REAL",
        String = 8 => "STRING",
        Array = 9 => "ARRAY",
        Struct = 10 => "STRUCT",
    }
}

selector! {
    Comparator {
        Equal = 0 => "EQ",
        Diff = 1 => "DIFF",
        Less = 2 => "LESS",
        LessEqual = 3 => "LEQ",
        Greater = 4 => "GT",
        GreaterEqual = 5 => "GEQ",
    }
}

selector! {
    CallSelector {
        Native = 0 => "NATIVE",
        UserDefined = 1 => "USER_DEFINED",
    }
}

selector! {
    /// Condition an `IF` instruction branches on.
    BranchSelector {
        OnFalse = 0 => "FALSE",
        OnTrue = 1 => "TRUE",
    }
}

impl TypeSelector {
    pub fn is_integral(self) -> bool {
        use TypeSelector::*;
        matches!(self, Byte | Short | Integer | Long)
    }
}

impl Comparator {
    pub fn test(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Comparator::Equal => ordering == Equal,
            Comparator::Diff => ordering != Equal,
            Comparator::Less => ordering == Less,
            Comparator::LessEqual => ordering != Greater,
            Comparator::Greater => ordering == Greater,
            Comparator::GreaterEqual => ordering != Less,
        }
    }
}
