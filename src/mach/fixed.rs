/// ## Fixed point REAL
///
/// A REAL is a 64-bit integer scaled by 10,000, giving four decimal
/// digits after the point. Products and quotients are computed in 128
/// bits and truncated toward zero.

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed(i64);

impl Fixed {
    pub const FACTOR: i64 = 10_000;
    pub const PRECISION: usize = 4;
    pub const MAX: i64 = i64::max_value() / Fixed::FACTOR;

    pub fn from_raw(raw: i64) -> Fixed {
        Fixed(raw)
    }

    pub fn raw(self) -> i64 {
        self.0
    }

    pub fn from_int(value: i64) -> Fixed {
        Fixed(value.wrapping_mul(Fixed::FACTOR))
    }

    /// Integer part, truncated toward zero.
    pub fn to_int(self) -> i64 {
        self.0 / Fixed::FACTOR
    }

    pub fn is_integral(self) -> bool {
        self.0 % Fixed::FACTOR == 0
    }

    pub fn sign(self) -> i8 {
        self.0.signum() as i8
    }

    pub fn neg(self) -> Fixed {
        Fixed(self.0.wrapping_neg())
    }

    pub fn add(self, other: Fixed) -> Fixed {
        Fixed(self.0.wrapping_add(other.0))
    }

    pub fn sub(self, other: Fixed) -> Fixed {
        Fixed(self.0.wrapping_sub(other.0))
    }

    pub fn mul(self, other: Fixed) -> Fixed {
        let product = self.0 as i128 * other.0 as i128 / Fixed::FACTOR as i128;
        Fixed(product as i64)
    }

    pub fn div(self, other: Fixed) -> Option<Fixed> {
        if other.0 == 0 {
            return None;
        }
        let quotient = self.0 as i128 * Fixed::FACTOR as i128 / other.0 as i128;
        Some(Fixed(quotient as i64))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFixedError;

impl std::str::FromStr for Fixed {
    type Err = ParseFixedError;

    /// Accepts `int` or `int.frac`; digits past the fourth decimal are dropped.
    fn from_str(s: &str) -> Result<Fixed, ParseFixedError> {
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let mut parts = digits.splitn(2, '.');
        let int_part = parts.next().unwrap_or("");
        let frac_part = parts.next().unwrap_or("");
        if int_part.is_empty() || !int_part.chars().all(|c| c.is_ascii_digit()) {
            return Err(ParseFixedError);
        }
        if !frac_part.chars().all(|c| c.is_ascii_digit()) {
            return Err(ParseFixedError);
        }
        let int_value: i64 = int_part.parse().map_err(|_| ParseFixedError)?;
        if int_value > Fixed::MAX {
            return Err(ParseFixedError);
        }
        let mut frac_value: i64 = 0;
        let mut scale = Fixed::FACTOR;
        for c in frac_part.chars().take(Fixed::PRECISION) {
            scale /= 10;
            frac_value += (c as i64 - '0' as i64) * scale;
        }
        let raw = int_value * Fixed::FACTOR + frac_value;
        Ok(Fixed(if negative { -raw } else { raw }))
    }
}

impl std::fmt::Display for Fixed {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let abs = (self.0 as i128).abs();
        let int_part = abs / Fixed::FACTOR as i128;
        let frac_part = abs % Fixed::FACTOR as i128;
        if self.0 < 0 {
            write!(f, "-")?;
        }
        write!(f, "{}", int_part)?;
        if frac_part != 0 {
            let frac = format!("{:04}", frac_part);
            write!(f, ".{}", frac.trim_end_matches('0'))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn real(s: &str) -> Fixed {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(real("3.75").raw(), 37_500);
        assert_eq!(real("0.0001").raw(), 1);
        assert_eq!(real("2.123456").raw(), 21_234);
        assert_eq!(real("12").to_string(), "12");
        assert_eq!(real("-0.5").to_string(), "-0.5");
        assert_eq!(real("1.2300").to_string(), "1.23");
        assert!("1.x".parse::<Fixed>().is_err());
        assert!(".5".parse::<Fixed>().is_err());
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(real("1.5").add(real("2.25")), real("3.75"));
        assert_eq!(real("1.5").sub(real("2.25")), real("-0.75"));
        assert_eq!(real("1.5").mul(real("2.25")), real("3.375"));
        assert_eq!(real("3.375").div(real("1.5")), Some(real("2.25")));
        assert_eq!(real("1").div(real("0")), None);
        assert_eq!(real("1").div(real("3")), Some(real("0.3333")));
        assert_eq!(real("-2.5").sign(), -1);
        assert_eq!(real("-2.5").to_int(), -2);
    }
}
