use super::{Comparator, ErrorCode, Fixed, Opcode, TypeSelector, Val};

type Result<T> = std::result::Result<T, ErrorCode>;

/// ## Operations on machine values
///
/// Shared by the interpreter and by constant folding so a folded
/// expression always equals what the machine would have computed.
/// Integral results are exact in 64 bits; the caller truncates them to
/// the width of the destination.

pub struct Operation {}

impl Operation {
    pub fn binary(opcode: Opcode, left: Val, right: Val) -> Result<Val> {
        use Val::*;
        match (left, right) {
            (Integral(l), Integral(r)) => Operation::integral(opcode, l, r).map(Integral),
            (Real(l), Real(r)) => Operation::real(opcode, l, r).map(Real),
            (Boolean(l), Boolean(r)) => match opcode {
                Opcode::And => Ok(Boolean(l && r)),
                Opcode::Or => Ok(Boolean(l || r)),
                Opcode::Xor => Ok(Boolean(l != r)),
                _ => Err(ErrorCode::BadInstruction),
            },
            (String(mut l), String(r)) => match opcode {
                Opcode::Add => {
                    l.extend_from_slice(&r);
                    Ok(String(l))
                }
                _ => Err(ErrorCode::BadInstruction),
            },
            _ => Err(ErrorCode::BadInstruction),
        }
    }

    fn integral(opcode: Opcode, l: i64, r: i64) -> Result<i64> {
        match opcode {
            Opcode::Add => Ok(l.wrapping_add(r)),
            Opcode::Sub => Ok(l.wrapping_sub(r)),
            Opcode::Mul => Ok(l.wrapping_mul(r)),
            Opcode::Div => match r {
                0 => Err(ErrorCode::DivisionByZero),
                _ => Ok(l.wrapping_div(r)),
            },
            Opcode::Mod => match r {
                0 => Err(ErrorCode::DivisionByZero),
                _ => Ok(l.wrapping_rem(r)),
            },
            Opcode::And => Ok(l & r),
            Opcode::Or => Ok(l | r),
            Opcode::Xor => Ok(l ^ r),
            Opcode::Shl => Ok(if (0..64).contains(&r) { l << r } else { 0 }),
            Opcode::Shr => Ok(if (0..64).contains(&r) { l >> r } else { l >> 63 }),
            _ => Err(ErrorCode::BadInstruction),
        }
    }

    fn real(opcode: Opcode, l: Fixed, r: Fixed) -> Result<Fixed> {
        match opcode {
            Opcode::Add => Ok(l.add(r)),
            Opcode::Sub => Ok(l.sub(r)),
            Opcode::Mul => Ok(l.mul(r)),
            Opcode::Div => l.div(r).ok_or(ErrorCode::DivisionByZero),
            _ => Err(ErrorCode::BadInstruction),
        }
    }

    pub fn compare(comparator: Comparator, left: &Val, right: &Val) -> Result<bool> {
        use Val::*;
        let ordering = match (left, right) {
            (Integral(l), Integral(r)) => l.cmp(r),
            (Real(l), Real(r)) => l.cmp(r),
            (String(l), String(r)) => l.cmp(r),
            (Boolean(l), Boolean(r)) => match comparator {
                Comparator::Equal | Comparator::Diff => l.cmp(r),
                _ => return Err(ErrorCode::BadInstruction),
            },
            _ => return Err(ErrorCode::BadInstruction),
        };
        Ok(comparator.test(ordering))
    }

    pub fn negate(val: Val) -> Result<Val> {
        match val {
            Val::Integral(n) => Ok(Val::Integral(n.wrapping_neg())),
            Val::Real(r) => Ok(Val::Real(r.neg())),
            _ => Err(ErrorCode::BadInstruction),
        }
    }

    pub fn not(val: Val) -> Result<Val> {
        match val {
            Val::Boolean(b) => Ok(Val::Boolean(!b)),
            Val::Integral(n) => Ok(Val::Integral(!n)),
            _ => Err(ErrorCode::BadInstruction),
        }
    }

    pub fn sign(val: &Val) -> Result<i8> {
        match val {
            Val::Integral(n) => Ok(n.signum() as i8),
            Val::Real(r) => Ok(r.sign()),
            _ => Err(ErrorCode::BadInstruction),
        }
    }

    /// Convert to the representation of `to`. Narrowing integral casts
    /// are left to the encoder, which truncates.
    pub fn cast(val: Val, to: TypeSelector) -> Result<Val> {
        use TypeSelector::*;
        match (val, to) {
            (val, String) => Ok(Val::from_text(&val.to_text())),
            (Val::Integral(n), Byte) | (Val::Integral(n), Short) | (Val::Integral(n), Integer) | (Val::Integral(n), Long) => {
                Ok(Val::Integral(n))
            }
            (Val::Integral(n), Real) => Ok(Val::Real(Fixed::from_int(n))),
            (Val::Real(r), Real) => Ok(Val::Real(r)),
            (Val::Real(r), Byte) | (Val::Real(r), Short) | (Val::Real(r), Integer) | (Val::Real(r), Long) => {
                Ok(Val::Integral(r.to_int()))
            }
            (Val::Boolean(b), Boolean) => Ok(Val::Boolean(b)),
            _ => Err(ErrorCode::BadInstruction),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i64) -> Val {
        Val::Integral(n)
    }

    #[test]
    fn test_integral() {
        assert_eq!(Operation::binary(Opcode::Sub, int(7), int(9)), Ok(int(-2)));
        assert_eq!(Operation::binary(Opcode::Div, int(-7), int(2)), Ok(int(-3)));
        assert_eq!(Operation::binary(Opcode::Mod, int(-7), int(2)), Ok(int(-1)));
        assert_eq!(Operation::binary(Opcode::Div, int(1), int(0)), Err(ErrorCode::DivisionByZero));
        assert_eq!(Operation::binary(Opcode::Shl, int(1), int(4)), Ok(int(16)));
        assert_eq!(Operation::binary(Opcode::Shr, int(-16), int(2)), Ok(int(-4)));
        assert_eq!(Operation::binary(Opcode::Cmp, int(1), int(2)), Err(ErrorCode::BadInstruction));
    }

    #[test]
    fn test_strings_and_casts() {
        let joined = Operation::binary(Opcode::Add, Val::from_text("abc"), Val::from_text("de")).unwrap();
        assert_eq!(joined.to_text(), "abcde");
        assert_eq!(Operation::cast(Val::Boolean(true), TypeSelector::String).unwrap().to_text(), "TRUE");
        let real = Operation::cast(int(3), TypeSelector::Real).unwrap();
        assert_eq!(real, Val::Real(Fixed::from_int(3)));
        assert_eq!(Operation::cast(real, TypeSelector::String).unwrap().to_text(), "3");
        assert!(Operation::compare(Comparator::Less, &Val::from_text("ab"), &Val::from_text("b")).unwrap());
    }
}
