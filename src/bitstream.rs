//! Bit reader for the uncompressed frame header
//!
//! VP9 uncompressed headers use simple MSB-first bit packing, not arithmetic
//! coding. Reads past the end of the buffer are reported as corruption.

use crate::error::{Error, Result};

/// MSB-first bit reader over a borrowed byte slice
pub struct BitReader<'a> {
    data: &'a [u8],
    byte_pos: usize,
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    /// Create a new bit reader
    pub fn new(data: &'a [u8]) -> Self {
        BitReader {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// Read a single bit
    #[inline]
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.byte_pos >= self.data.len() {
            return Err(Error::corrupted("bit reader ran out of data"));
        }

        let bit = (self.data[self.byte_pos] >> (7 - self.bit_pos)) & 1;
        self.bit_pos += 1;

        if self.bit_pos == 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }

        Ok(bit != 0)
    }

    /// Read n bits as an unsigned value (MSB first)
    #[inline]
    pub fn read_bits(&mut self, n: u8) -> Result<u32> {
        let mut value = 0u32;
        for _ in 0..n {
            value = (value << 1) | (self.read_bit()? as u32);
        }
        Ok(value)
    }

    /// Read n bits of magnitude followed by a sign bit
    #[inline]
    pub fn read_signed_bits(&mut self, n: u8) -> Result<i32> {
        let value = self.read_bits(n)? as i32;
        if self.read_bit()? {
            Ok(-value)
        } else {
            Ok(value)
        }
    }

    /// Read a flag followed by n magnitude bits and a sign bit if the flag
    /// is set (the "delta coded" form used by loop filter and quantizer
    /// deltas)
    #[inline]
    pub fn read_delta(&mut self, n: u8) -> Result<i32> {
        if self.read_bit()? {
            self.read_signed_bits(n)
        } else {
            Ok(0)
        }
    }

    /// Current byte position (rounded down)
    pub fn position(&self) -> usize {
        self.byte_pos
    }

    /// Position in bits from the start of the buffer
    pub fn bit_position(&self) -> usize {
        self.byte_pos * 8 + self.bit_pos as usize
    }

    /// Advance to the next byte boundary; the skipped bits must be zero
    pub fn byte_align(&mut self) -> Result<()> {
        while self.bit_pos != 0 {
            if self.read_bit()? {
                return Err(Error::corrupted("non-zero trailing bits before byte alignment"));
            }
        }
        Ok(())
    }

    /// Bytes remaining after the current (possibly partial) byte
    pub fn remaining_bytes(&self) -> usize {
        let current = if self.bit_pos > 0 {
            self.byte_pos + 1
        } else {
            self.byte_pos
        };
        self.data.len().saturating_sub(current)
    }
}
