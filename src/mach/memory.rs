use super::{ErrorCode, Val, STRING_HEADER};
use std::convert::TryInto;
use std::ops::Range;

type Result<T> = std::result::Result<T, ErrorCode>;

/// ## Machine memory
///
/// One flat byte array per machine. Addresses are `i32` as they appear
/// in instructions; anything outside the array is a segmentation fault.

#[derive(Debug, Clone)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    pub fn new(size: usize) -> Memory {
        Memory { bytes: vec![0; size] }
    }

    pub fn len(&self) -> i32 {
        self.bytes.len() as i32
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn range(&self, address: i32, size: i32) -> Result<Range<usize>> {
        if address < 0 || size < 0 || address as i64 + size as i64 > self.bytes.len() as i64 {
            return Err(ErrorCode::SegmentationFault);
        }
        Ok(address as usize..(address + size) as usize)
    }

    pub fn read(&self, address: i32, size: i32) -> Result<&[u8]> {
        let range = self.range(address, size)?;
        Ok(&self.bytes[range])
    }

    pub fn write(&mut self, address: i32, data: &[u8]) -> Result<()> {
        let range = self.range(address, data.len() as i32)?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    pub fn copy(&mut self, from: i32, to: i32, size: i32) -> Result<()> {
        let source = self.range(from, size)?;
        self.range(to, size)?;
        self.bytes.copy_within(source, to as usize);
        Ok(())
    }

    pub fn fill(&mut self, address: i32, size: i32, value: u8) -> Result<()> {
        let range = self.range(address, size)?;
        for byte in &mut self.bytes[range] {
            *byte = value;
        }
        Ok(())
    }

    pub fn read_i32(&self, address: i32) -> Result<i32> {
        let word: [u8; 4] = self.read(address, 4)?.try_into().map_err(|_| ErrorCode::SegmentationFault)?;
        Ok(i32::from_le_bytes(word))
    }

    pub fn write_i32(&mut self, address: i32, value: i32) -> Result<()> {
        self.write(address, &value.to_le_bytes())
    }

    pub fn read_i64(&self, address: i32) -> Result<i64> {
        let word: [u8; 8] = self.read(address, 8)?.try_into().map_err(|_| ErrorCode::SegmentationFault)?;
        Ok(i64::from_le_bytes(word))
    }

    pub fn write_i64(&mut self, address: i32, value: i64) -> Result<()> {
        self.write(address, &value.to_le_bytes())
    }

    /// Size in bytes of the string record at `address`, from its capacity.
    pub fn string_size(&self, address: i32) -> Result<i32> {
        let header = address.checked_add(4).ok_or(ErrorCode::SegmentationFault)?;
        let capacity = self.read_i32(header)?;
        capacity
            .checked_mul(2)
            .and_then(|bytes| bytes.checked_add(STRING_HEADER as i32))
            .filter(|_| capacity >= 0)
            .ok_or(ErrorCode::SegmentationFault)
    }

    pub fn read_string(&self, address: i32) -> Result<String> {
        let size = self.string_size(address)?;
        let val = Val::decode(super::TypeSelector::String, self.read(address, size)?)?;
        Ok(val.to_text())
    }

    /// Store text into an existing record, cut to the record's capacity.
    pub fn write_string(&mut self, address: i32, text: &str) -> Result<()> {
        let size = self.string_size(address)?;
        let bytes = Val::from_text(text).encode(size as usize);
        self.write(address, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        let mut memory = Memory::new(16);
        assert!(memory.write_i32(12, 7).is_ok());
        assert_eq!(memory.read_i32(12), Ok(7));
        assert_eq!(memory.read(13, 4), Err(ErrorCode::SegmentationFault));
        assert_eq!(memory.read(-1, 1), Err(ErrorCode::SegmentationFault));
        memory.copy(12, 0, 4).unwrap();
        assert_eq!(memory.read_i32(0), Ok(7));
    }

    #[test]
    fn test_strings() {
        let mut memory = Memory::new(64);
        memory.write(0, &Val::from_text("").encode(8 + 2 * 3)).unwrap();
        memory.write_string(0, "hello").unwrap();
        assert_eq!(memory.read_string(0), Ok("hel".to_string()));
        assert_eq!(memory.string_size(0), Ok(14));
    }
}
