//! Binary reading and writing utilities.
//!
//! All values are little-endian. Reads never panic: running out of data
//! yields [`ProtocolError::UnexpectedEof`].

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::ProtocolError;
use crate::revision::StringEncoding;

/// A reader for parsing binary protocol messages.
#[derive(Debug)]
pub struct BinaryReader {
    buf: Bytes,
}

impl BinaryReader {
    /// Create a new reader from raw bytes.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { buf: data.into() }
    }

    /// Returns remaining bytes.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Skip up to `n` bytes.
    #[inline]
    pub fn skip(&mut self, n: usize) {
        self.buf.advance(n.min(self.buf.remaining()));
    }

    #[inline]
    fn ensure(&self, n: usize) -> Result<(), ProtocolError> {
        if self.buf.remaining() >= n {
            Ok(())
        } else {
            Err(ProtocolError::UnexpectedEof)
        }
    }

    #[inline]
    pub fn get_u8(&mut self) -> Result<u8, ProtocolError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    #[inline]
    pub fn get_u16(&mut self) -> Result<u16, ProtocolError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16_le())
    }

    #[inline]
    pub fn get_i16(&mut self) -> Result<i16, ProtocolError> {
        self.ensure(2)?;
        Ok(self.buf.get_i16_le())
    }

    #[inline]
    pub fn get_u32(&mut self) -> Result<u32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32_le())
    }

    #[inline]
    pub fn get_i32(&mut self) -> Result<i32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32_le())
    }

    #[inline]
    pub fn get_f32(&mut self) -> Result<f32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.buf.get_f32_le())
    }

    #[inline]
    pub fn get_f64(&mut self) -> Result<f64, ProtocolError> {
        self.ensure(8)?;
        Ok(self.buf.get_f64_le())
    }

    /// Read a null-terminated UTF-8 string. A missing terminator consumes
    /// the rest of the buffer.
    pub fn get_string_utf8(&mut self) -> String {
        let mut bytes = Vec::new();
        while self.buf.has_remaining() {
            let b = self.buf.get_u8();
            if b == 0 {
                break;
            }
            bytes.push(b);
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Read a null-terminated UCS-2 string. A trailing odd byte is dropped.
    pub fn get_string_ucs2(&mut self) -> String {
        let mut units = Vec::new();
        while self.buf.remaining() >= 2 {
            let c = self.buf.get_u16_le();
            if c == 0 {
                break;
            }
            units.push(c);
        }
        String::from_utf16_lossy(&units)
    }

    /// Read a null-terminated string in the given encoding.
    pub fn get_string(&mut self, encoding: StringEncoding) -> String {
        match encoding {
            StringEncoding::Ucs2 => self.get_string_ucs2(),
            StringEncoding::Utf8 => self.get_string_utf8(),
        }
    }
}

/// A writer for building binary protocol messages.
#[derive(Debug, Default)]
pub struct BinaryWriter {
    buf: BytesMut,
}

impl BinaryWriter {
    /// Create a new writer with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a new writer with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    #[inline]
    pub fn put_u16(&mut self, v: u16) {
        self.buf.put_u16_le(v);
    }

    #[inline]
    pub fn put_i16(&mut self, v: i16) {
        self.buf.put_i16_le(v);
    }

    #[inline]
    pub fn put_u32(&mut self, v: u32) {
        self.buf.put_u32_le(v);
    }

    #[inline]
    pub fn put_i32(&mut self, v: i32) {
        self.buf.put_i32_le(v);
    }

    #[inline]
    pub fn put_f32(&mut self, v: f32) {
        self.buf.put_f32_le(v);
    }

    #[inline]
    pub fn put_f64(&mut self, v: f64) {
        self.buf.put_f64_le(v);
    }

    /// Write a null-terminated UTF-8 string.
    pub fn put_string_utf8(&mut self, s: &str) {
        self.buf.put_slice(s.as_bytes());
        self.buf.put_u8(0);
    }

    /// Write a null-terminated UCS-2 string.
    pub fn put_string_ucs2(&mut self, s: &str) {
        for c in s.encode_utf16() {
            self.buf.put_u16_le(c);
        }
        self.buf.put_u16_le(0);
    }

    /// Write a null-terminated string in the given encoding.
    pub fn put_string(&mut self, s: &str, encoding: StringEncoding) {
        match encoding {
            StringEncoding::Ucs2 => self.put_string_ucs2(s),
            StringEncoding::Utf8 => self.put_string_utf8(s),
        }
    }

    /// Consume the writer and return the built buffer.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }

    /// Get current buffer as a slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_layout() {
        let mut w = BinaryWriter::new();
        w.put_u32(0xDEADBEEF);
        w.put_i16(-2);
        assert_eq!(w.as_slice(), &[0xEF, 0xBE, 0xAD, 0xDE, 0xFE, 0xFF]);

        let mut r = BinaryReader::new(w.finish());
        assert_eq!(r.get_u32(), Ok(0xDEADBEEF));
        assert_eq!(r.get_i16(), Ok(-2));
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_short_read_is_an_error() {
        let mut r = BinaryReader::new(vec![1u8, 2, 3]);
        assert_eq!(r.get_u32(), Err(ProtocolError::UnexpectedEof));
        // A failed read consumes nothing.
        assert_eq!(r.remaining(), 3);
        assert_eq!(r.get_u16(), Ok(0x0201));
        assert_eq!(r.get_f64(), Err(ProtocolError::UnexpectedEof));
    }

    #[test]
    fn test_ucs2_string_with_terminator() {
        let mut w = BinaryWriter::new();
        w.put_string_ucs2("héllo");
        w.put_u8(7);
        assert_eq!(w.len(), 6 * 2 + 1);

        let mut r = BinaryReader::new(w.finish());
        assert_eq!(r.get_string_ucs2(), "héllo");
        assert_eq!(r.get_u8(), Ok(7));
    }

    #[test]
    fn test_unterminated_utf8_takes_rest() {
        let mut r = BinaryReader::new(b"abc".to_vec());
        assert_eq!(r.get_string(StringEncoding::Utf8), "abc");
        assert_eq!(r.remaining(), 0);
    }
}
