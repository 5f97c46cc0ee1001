use super::{ErrorCode, Fixed, TypeSelector};
use std::convert::TryInto;

/// ## Machine values
///
/// A value popped off the stack, decoded according to the type selector
/// of the instruction working on it. Integral values of every width are
/// held sign-extended in an `i64`. Strings keep their UTF-16 code units.

#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    Boolean(bool),
    Integral(i64),
    Real(Fixed),
    String(Vec<u16>),
}

/// Bytes in the header of a string record: length and capacity.
pub const STRING_HEADER: usize = 8;

/// Character capacity of a string record of `size` bytes.
pub fn string_capacity(size: usize) -> usize {
    size.saturating_sub(STRING_HEADER) / 2
}

/// Sign-extend a little endian integer of 1 to 8 bytes.
pub fn read_integral(bytes: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    let len = bytes.len().min(8);
    buf[..len].copy_from_slice(&bytes[..len]);
    let value = i64::from_le_bytes(buf);
    let shift = 64 - 8 * len as u32;
    if len == 0 {
        0
    } else {
        (value << shift) >> shift
    }
}

/// Truncate to `size` bytes and sign-extend back.
pub fn wrap(value: i64, size: usize) -> i64 {
    read_integral(&value.to_le_bytes()[..size.min(8)])
}

impl Val {
    pub fn decode(selector: TypeSelector, bytes: &[u8]) -> Result<Val, ErrorCode> {
        use TypeSelector::*;
        match selector {
            Boolean => Ok(Val::Boolean(bytes.first().map_or(false, |b| *b != 0))),
            Byte | Short | Integer | Long | Pointer => Ok(Val::Integral(read_integral(bytes))),
            Real => Ok(Val::Real(Fixed::from_raw(read_integral(bytes)))),
            String => {
                if bytes.len() < STRING_HEADER {
                    return Err(ErrorCode::BadInstruction);
                }
                let capacity = string_capacity(bytes.len());
                let len = i32::from_le_bytes(bytes[0..4].try_into().map_err(|_| ErrorCode::BadInstruction)?);
                let len = (len.max(0) as usize).min(capacity);
                let chars = bytes[STRING_HEADER..STRING_HEADER + 2 * len]
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect();
                Ok(Val::String(chars))
            }
            Unknown | Array | Struct => Err(ErrorCode::BadInstruction),
        }
    }

    /// Encode into exactly `size` bytes. Integers are truncated, strings
    /// are cut to the capacity the size allows.
    pub fn encode(&self, size: usize) -> Vec<u8> {
        match self {
            Val::Boolean(b) => {
                let mut bytes = vec![0; size];
                if let Some(first) = bytes.first_mut() {
                    *first = *b as u8;
                }
                bytes
            }
            Val::Integral(n) => n.to_le_bytes().iter().copied().chain(std::iter::repeat(0)).take(size).collect(),
            Val::Real(r) => r.raw().to_le_bytes().iter().copied().chain(std::iter::repeat(0)).take(size).collect(),
            Val::String(chars) => {
                let capacity = string_capacity(size);
                let len = chars.len().min(capacity);
                let mut bytes = Vec::with_capacity(size);
                bytes.extend_from_slice(&(len as i32).to_le_bytes());
                bytes.extend_from_slice(&(capacity as i32).to_le_bytes());
                for c in &chars[..len] {
                    bytes.extend_from_slice(&c.to_le_bytes());
                }
                bytes.resize(size.max(STRING_HEADER), 0);
                bytes
            }
        }
    }

    pub fn from_text(s: &str) -> Val {
        Val::String(s.encode_utf16().collect())
    }

    /// Decimal text used by numeric to string conversion.
    pub fn to_text(&self) -> String {
        match self {
            Val::Boolean(true) => "TRUE".to_string(),
            Val::Boolean(false) => "FALSE".to_string(),
            Val::Integral(n) => n.to_string(),
            Val::Real(r) => r.to_string(),
            Val::String(chars) => String::from_utf16_lossy(chars),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integral_widths() {
        assert_eq!(read_integral(&[0xff]), -1);
        assert_eq!(read_integral(&[0xff, 0x00]), 255);
        assert_eq!(wrap(300, 1), 44);
        assert_eq!(wrap(-129, 1), 127);
        assert_eq!(wrap(1 << 40, 4), 0);
        assert_eq!(Val::Integral(-2).encode(2), vec![0xfe, 0xff]);
    }

    #[test]
    fn test_string_record() {
        let bytes = Val::from_text("abc").encode(8 + 2 * 5);
        assert_eq!(&bytes[0..8], &[3, 0, 0, 0, 5, 0, 0, 0]);
        assert_eq!(bytes.len(), 18);
        let val = Val::decode(TypeSelector::String, &bytes).unwrap();
        assert_eq!(val.to_text(), "abc");
        let cut = Val::from_text("abcdef").encode(8 + 2 * 4);
        assert_eq!(Val::decode(TypeSelector::String, &cut).unwrap().to_text(), "abcd");
    }
}
