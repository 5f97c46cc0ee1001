use crate::lang::ast::{BinaryOp, UnaryOp};
use crate::mach::{wrap, Comparator, Fixed, Opcode, Operation, TypeSelector, Val};

/// ## Compile time values
///
/// A literal or the folded value of a constant expression. Integral
/// values of every width share one variant; the node carrying the value
/// knows its type.

#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    Boolean(bool),
    Integral(i64),
    Real(Fixed),
    String(String),
}

impl Variant {
    fn to_val(&self) -> Val {
        match self {
            Variant::Boolean(b) => Val::Boolean(*b),
            Variant::Integral(n) => Val::Integral(*n),
            Variant::Real(r) => Val::Real(*r),
            Variant::String(s) => Val::from_text(s),
        }
    }

    /// Back from the machine, truncated to `size` bytes of `selector`.
    fn from_val(val: Val, selector: TypeSelector, size: usize) -> Option<Variant> {
        Some(match val {
            Val::Boolean(b) => Variant::Boolean(b),
            Val::Integral(n) if selector.is_integral() => Variant::Integral(wrap(n, size)),
            Val::Real(r) => Variant::Real(r),
            Val::String(chars) => {
                let capacity = crate::mach::string_capacity(size);
                Variant::String(String::from_utf16_lossy(&chars[..chars.len().min(capacity)]))
            }
            Val::Integral(_) => return None,
        })
    }

    pub fn unary(op: UnaryOp, operand: &Variant, selector: TypeSelector, size: usize) -> Option<Variant> {
        let val = match op {
            UnaryOp::Plus => return Some(operand.clone()),
            UnaryOp::Minus => Operation::negate(operand.to_val()).ok()?,
            UnaryOp::Not => Operation::not(operand.to_val()).ok()?,
        };
        Variant::from_val(val, selector, size)
    }

    /// `selector` and `size` describe the result. Division by zero does
    /// not fold; the machine reports it at run time.
    pub fn binary(op: BinaryOp, left: &Variant, right: &Variant, selector: TypeSelector, size: usize) -> Option<Variant> {
        if let Some(comparator) = comparator(op) {
            let result = Operation::compare(comparator, &left.to_val(), &right.to_val()).ok()?;
            return Some(Variant::Boolean(result));
        }
        let val = Operation::binary(opcode(op)?, left.to_val(), right.to_val()).ok()?;
        Variant::from_val(val, selector, size)
    }

    pub fn cast(&self, selector: TypeSelector, size: usize) -> Option<Variant> {
        let val = Operation::cast(self.to_val(), selector).ok()?;
        Variant::from_val(val, selector, size)
    }

    /// Narrowing a constant is allowed when nothing is lost.
    pub fn fits(&self, selector: TypeSelector, size: usize) -> bool {
        match (self, selector) {
            (Variant::Integral(n), s) if s.is_integral() => wrap(*n, size) == *n,
            (Variant::Integral(_), TypeSelector::Real) => true,
            (Variant::Real(r), s) if s.is_integral() => r.is_integral() && wrap(r.to_int(), size) == r.to_int(),
            _ => false,
        }
    }
}

pub fn opcode(op: BinaryOp) -> Option<Opcode> {
    use BinaryOp::*;
    Some(match op {
        Multiply => Opcode::Mul,
        Divide => Opcode::Div,
        Mod => Opcode::Mod,
        Add => Opcode::Add,
        Subtract => Opcode::Sub,
        Shl => Opcode::Shl,
        Shr => Opcode::Shr,
        And => Opcode::And,
        Or => Opcode::Or,
        Xor => Opcode::Xor,
        _ => return None,
    })
}

pub fn comparator(op: BinaryOp) -> Option<Comparator> {
    use BinaryOp::*;
    Some(match op {
        Less => Comparator::Less,
        LessEqual => Comparator::LessEqual,
        Greater => Comparator::Greater,
        GreaterEqual => Comparator::GreaterEqual,
        Equal => Comparator::Equal,
        NotEqual => Comparator::Diff,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folding_matches_machine_widths() {
        let big = Variant::Integral(200);
        let sum = Variant::binary(BinaryOp::Add, &big, &big, TypeSelector::Byte, 1);
        assert_eq!(sum, Some(Variant::Integral(-112)));
        let q = Variant::binary(BinaryOp::Divide, &big, &Variant::Integral(0), TypeSelector::Integer, 4);
        assert_eq!(q, None);
        let lt = Variant::binary(BinaryOp::Less, &Variant::Integral(1), &Variant::Integral(2), TypeSelector::Boolean, 1);
        assert_eq!(lt, Some(Variant::Boolean(true)));
    }

    #[test]
    fn test_casts() {
        let s = Variant::String("abcdef".into());
        assert_eq!(s.cast(TypeSelector::String, 8 + 2 * 4), Some(Variant::String("abcd".into())));
        let n = Variant::Integral(42).cast(TypeSelector::String, 8 + 2 * 11);
        assert_eq!(n, Some(Variant::String("42".into())));
        assert!(Variant::Integral(127).fits(TypeSelector::Byte, 1));
        assert!(!Variant::Integral(128).fits(TypeSelector::Byte, 1));
        assert!(!Variant::Real("1.5".parse().unwrap()).fits(TypeSelector::Integer, 4));
    }
}
