//! Binary message codec.
//!
//! Wire records are fixed-layout sequences of byte literals, little-endian
//! unsigned integers (8/16/24/32 bit), MSB-first bit-packed sub-byte fields
//! with explicit padding, and at most one NUL-terminated string field.
//! `ByteWriter`/`ByteReader` keep track of the bit cursor so record
//! definitions read top-to-bottom like the device documentation.

use byteorder::{ByteOrder, LittleEndian};

/// Largest value representable in a 24-bit wire length field.
pub const MAX_UINT24: u32 = 0x00ff_ffff;

/// Errors produced while encoding or decoding a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoderError {
    /// A value does not fit its field, or a literal/enum byte mismatched.
    InvalidValue,
    /// The buffer ended before the record was fully decoded.
    SmallBuffer,
    /// Decoding consumed fewer bytes than were provided.
    TrailingData,
}

/// A fixed-layout wire record.
///
/// `Default` is the canonical value of the record (all counters zero, enums
/// at their first variant). `decode(encode(v)) == v` must hold for every
/// encodable `v`, and `decode` must consume the buffer exactly.
pub trait Message: Sized + Default + PartialEq + std::fmt::Debug {
    fn encode(&self) -> Result<Vec<u8>, CoderError>;
    fn decode(bytes: &[u8]) -> Result<Self, CoderError>;
}

/// Serializes record fields into a byte buffer.
#[derive(Debug, Default)]
pub struct ByteWriter {
    out: Vec<u8>,
    pending: u8,
    pending_bits: u8,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn require_aligned(&self) -> Result<(), CoderError> {
        if self.pending_bits == 0 {
            Ok(())
        } else {
            Err(CoderError::InvalidValue)
        }
    }

    /// Writes a fixed byte sequence.
    pub fn literal(&mut self, bytes: &[u8]) -> Result<(), CoderError> {
        self.require_aligned()?;
        self.out.extend_from_slice(bytes);
        Ok(())
    }

    pub fn u8(&mut self, value: u8) -> Result<(), CoderError> {
        self.require_aligned()?;
        self.out.push(value);
        Ok(())
    }

    pub fn u16(&mut self, value: u16) -> Result<(), CoderError> {
        self.require_aligned()?;
        let mut buf = [0u8; 2];
        LittleEndian::write_u16(&mut buf, value);
        self.out.extend_from_slice(&buf);
        Ok(())
    }

    pub fn u24(&mut self, value: u32) -> Result<(), CoderError> {
        self.require_aligned()?;
        if value > MAX_UINT24 {
            return Err(CoderError::InvalidValue);
        }
        let mut buf = [0u8; 3];
        LittleEndian::write_u24(&mut buf, value);
        self.out.extend_from_slice(&buf);
        Ok(())
    }

    pub fn u32(&mut self, value: u32) -> Result<(), CoderError> {
        self.require_aligned()?;
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, value);
        self.out.extend_from_slice(&buf);
        Ok(())
    }

    /// Writes the low `width` bits of `value`, MSB-first within each byte.
    pub fn bits(&mut self, value: u8, width: u8) -> Result<(), CoderError> {
        debug_assert!(width >= 1 && width <= 8);
        if width < 8 && value >= 1 << width {
            return Err(CoderError::InvalidValue);
        }
        for i in (0..width).rev() {
            let bit = (value >> i) & 1;
            self.pending |= bit << (7 - self.pending_bits);
            self.pending_bits += 1;
            if self.pending_bits == 8 {
                self.out.push(self.pending);
                self.pending = 0;
                self.pending_bits = 0;
            }
        }
        Ok(())
    }

    /// Writes `width` zero bits.
    pub fn padding(&mut self, width: u8) -> Result<(), CoderError> {
        self.bits(0, width)
    }

    /// Writes a NUL-terminated string. The string may not contain NUL.
    pub fn cstring(&mut self, value: &str) -> Result<(), CoderError> {
        self.require_aligned()?;
        if value.as_bytes().contains(&0) {
            return Err(CoderError::InvalidValue);
        }
        self.out.extend_from_slice(value.as_bytes());
        self.out.push(0);
        Ok(())
    }

    pub fn finish(self) -> Result<Vec<u8>, CoderError> {
        self.require_aligned()?;
        Ok(self.out)
    }
}

/// Deserializes record fields from a byte buffer.
#[derive(Debug)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
    bit: u8,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0, bit: 0 }
    }

    fn require_aligned(&self) -> Result<(), CoderError> {
        if self.bit == 0 {
            Ok(())
        } else {
            Err(CoderError::InvalidValue)
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CoderError> {
        self.require_aligned()?;
        if self.buf.len() - self.pos < len {
            return Err(CoderError::SmallBuffer);
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Consumes a fixed byte sequence, failing if it does not match.
    pub fn literal(&mut self, expected: &[u8]) -> Result<(), CoderError> {
        let actual = self.take(expected.len())?;
        if actual == expected {
            Ok(())
        } else {
            Err(CoderError::InvalidValue)
        }
    }

    pub fn u8(&mut self) -> Result<u8, CoderError> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, CoderError> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn u24(&mut self) -> Result<u32, CoderError> {
        Ok(LittleEndian::read_u24(self.take(3)?))
    }

    pub fn u32(&mut self) -> Result<u32, CoderError> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    /// Reads `width` bits, MSB-first within each byte.
    pub fn bits(&mut self, width: u8) -> Result<u8, CoderError> {
        debug_assert!(width >= 1 && width <= 8);
        let mut value = 0u8;
        for _ in 0..width {
            if self.pos >= self.buf.len() {
                return Err(CoderError::SmallBuffer);
            }
            let bit = (self.buf[self.pos] >> (7 - self.bit)) & 1;
            value = (value << 1) | bit;
            self.bit += 1;
            if self.bit == 8 {
                self.bit = 0;
                self.pos += 1;
            }
        }
        Ok(value)
    }

    /// Consumes `width` padding bits (their value is ignored).
    pub fn padding(&mut self, width: u8) -> Result<(), CoderError> {
        self.bits(width).map(|_| ())
    }

    /// Reads a NUL-terminated string, consuming any trailing NUL padding.
    pub fn cstring(&mut self) -> Result<String, CoderError> {
        self.require_aligned()?;
        let rest = &self.buf[self.pos..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(CoderError::SmallBuffer)?;
        let value = std::str::from_utf8(&rest[..nul])
            .map_err(|_| CoderError::InvalidValue)?
            .to_owned();
        let mut end = nul + 1;
        while end < rest.len() && rest[end] == 0 {
            end += 1;
        }
        self.pos += end;
        Ok(value)
    }

    /// Verifies the whole buffer was consumed.
    pub fn finish(&self) -> Result<(), CoderError> {
        if self.bit == 0 && self.pos == self.buf.len() {
            Ok(())
        } else {
            Err(CoderError::TrailingData)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_are_packed_msb_first() {
        let mut w = ByteWriter::new();
        w.padding(4).unwrap();
        w.bits(1, 1).unwrap();
        w.bits(0, 1).unwrap();
        w.bits(0b11, 2).unwrap();
        let bytes = w.finish().unwrap();
        assert_eq!(bytes, vec![0b0000_1011]);

        let mut r = ByteReader::new(&bytes);
        r.padding(4).unwrap();
        assert_eq!(r.bits(1).unwrap(), 1);
        assert_eq!(r.bits(1).unwrap(), 0);
        assert_eq!(r.bits(2).unwrap(), 0b11);
        r.finish().unwrap();
    }

    #[test]
    fn bits_reject_out_of_range_values() {
        let mut w = ByteWriter::new();
        assert_eq!(w.bits(0b100, 2), Err(CoderError::InvalidValue));
    }

    #[test]
    fn unaligned_integer_write_is_rejected() {
        let mut w = ByteWriter::new();
        w.bits(1, 1).unwrap();
        assert_eq!(w.u8(7), Err(CoderError::InvalidValue));
    }

    #[test]
    fn integers_are_little_endian() {
        let mut w = ByteWriter::new();
        w.u16(0x1234).unwrap();
        w.u24(0x00ab_cdef).unwrap();
        w.u32(0xdead_beef).unwrap();
        let bytes = w.finish().unwrap();
        assert_eq!(
            bytes,
            vec![0x34, 0x12, 0xef, 0xcd, 0xab, 0xef, 0xbe, 0xad, 0xde]
        );

        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.u16().unwrap(), 0x1234);
        assert_eq!(r.u24().unwrap(), 0x00ab_cdef);
        assert_eq!(r.u32().unwrap(), 0xdead_beef);
        r.finish().unwrap();
    }

    #[test]
    fn u24_rejects_oversized_values() {
        let mut w = ByteWriter::new();
        assert_eq!(w.u24(MAX_UINT24 + 1), Err(CoderError::InvalidValue));
    }

    #[test]
    fn literal_mismatch() {
        let mut r = ByteReader::new(b"STB");
        assert_eq!(r.literal(b"STA"), Err(CoderError::InvalidValue));
    }

    #[test]
    fn short_buffer_reports_small_buffer() {
        let mut r = ByteReader::new(&[0x01]);
        assert_eq!(r.u16(), Err(CoderError::SmallBuffer));
    }

    #[test]
    fn finish_reports_trailing_data() {
        let mut r = ByteReader::new(&[0x01, 0x02]);
        r.u8().unwrap();
        assert_eq!(r.finish(), Err(CoderError::TrailingData));
    }

    #[test]
    fn cstring_roundtrip_with_padding() {
        let mut w = ByteWriter::new();
        w.cstring("1.2.3").unwrap();
        let mut bytes = w.finish().unwrap();
        bytes.extend_from_slice(&[0, 0, 0]);

        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.cstring().unwrap(), "1.2.3");
        r.finish().unwrap();
    }

    #[test]
    fn cstring_rejects_embedded_nul() {
        let mut w = ByteWriter::new();
        assert_eq!(w.cstring("a\0b"), Err(CoderError::InvalidValue));
    }
}
