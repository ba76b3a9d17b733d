//! Bounds-checked little-endian reader and writer over byte slices.

use super::ProtocolError;

pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let bytes = self
            .buf
            .get(self.pos..self.pos + N)
            .ok_or(ProtocolError::Truncated)?;
        self.pos += N;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }
}

pub struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes written so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), ProtocolError> {
        self.write_bytes(&[value])
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), ProtocolError> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), ProtocolError> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        let slot = self
            .buf
            .get_mut(self.pos..self.pos + bytes.len())
            .ok_or(ProtocolError::BufferTooSmall)?;
        slot.copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_little_endian_and_bounds() {
        let mut r = Reader::new(&[0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xAA]);
        assert_eq!(r.read_u16(), Ok(0x1234));
        assert_eq!(r.read_u32(), Ok(0x1234_5678));
        assert_eq!(r.remaining(), 1);
        assert_eq!(r.read_u16(), Err(ProtocolError::Truncated));
        assert_eq!(r.read_u8(), Ok(0xAA));
        assert_eq!(r.read_u8(), Err(ProtocolError::Truncated));
    }

    #[test]
    fn test_writer_rejects_overflow_without_partial_write() {
        let mut buf = [0u8; 3];
        let mut w = Writer::new(&mut buf);
        w.write_u16(0xBEEF).unwrap();
        assert_eq!(w.write_u16(0x0102), Err(ProtocolError::BufferTooSmall));
        assert_eq!(w.position(), 2);
        assert_eq!(buf, [0xEF, 0xBE, 0x00]);
    }
}
