//! VP9 boolean arithmetic decoder
//!
//! The compressed frame header and all tile data are coded with a binary
//! arithmetic coder. The decoder keeps an 8-bit range (stored widened for
//! arithmetic) and a sliding window of undecoded bits; reads past the end of
//! the buffer shift in zeros.

use tracing::warn;

use crate::error::{Error, Result};

/// Boolean arithmetic decoder over a borrowed byte slice
pub struct BoolDecoder<'a> {
    /// Input data buffer
    data: &'a [u8],
    /// Position of the next byte to pull into the window
    pos: usize,
    /// Current range, always in [128, 255] between reads
    range: u32,
    /// Window of undecoded bits, high bits first
    value: u32,
    /// Bits shifted since the last byte was pulled
    bit_count: i32,
}

impl<'a> BoolDecoder<'a> {
    /// Minimum range value before renormalization
    const MIN_RANGE: u32 = 128;

    /// Initialize a decoder and consume the marker bit
    ///
    /// The first coded bool of every bool-coded partition must decode to 0.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::corrupted("empty bool-coded partition"));
        }

        let mut decoder = BoolDecoder {
            data,
            pos: 0,
            range: 255,
            value: 0,
            bit_count: 0,
        };

        if data.len() >= 2 {
            decoder.value = ((data[0] as u32) << 8) | (data[1] as u32);
            decoder.pos = 2;
        } else {
            decoder.value = (data[0] as u32) << 8;
            decoder.pos = 1;
        }

        if decoder.read_bool(128) {
            return Err(Error::corrupted("bool decoder marker bit was set"));
        }

        Ok(decoder)
    }

    /// Read a single boolean with the given probability of being 0
    ///
    /// The probability is on a scale of 1-255 where 128 means 50/50.
    #[inline]
    pub fn read_bool(&mut self, prob: u8) -> bool {
        let split = 1 + (((self.range - 1) * prob as u32) >> 8);
        let split_shifted = split << 8;

        let bit = if self.value >= split_shifted {
            self.range -= split;
            self.value -= split_shifted;
            true
        } else {
            self.range = split;
            false
        };

        while self.range < Self::MIN_RANGE {
            self.range <<= 1;
            self.value <<= 1;
            self.bit_count += 1;

            if self.bit_count == 8 {
                self.bit_count = 0;
                if self.pos < self.data.len() {
                    self.value |= self.data[self.pos] as u32;
                    self.pos += 1;
                }
            }
        }

        bit
    }

    /// Read a single bit with uniform probability
    #[inline]
    pub fn read_bit(&mut self) -> bool {
        self.read_bool(128)
    }

    /// Read n uniform bits as an unsigned literal (MSB first)
    #[inline]
    pub fn read_literal(&mut self, n: u8) -> u32 {
        let mut value = 0u32;
        for _ in 0..n {
            value = (value << 1) | (self.read_bit() as u32);
        }
        value
    }

    /// Read a symbol from a binary tree
    ///
    /// The tree is stored as pairs of children: positive entries index the
    /// next pair, entries <= 0 are negated leaf symbols. `probs[i >> 1]`
    /// is the probability for the pair starting at index `i`.
    #[inline]
    pub fn read_tree(&mut self, tree: &[i8], probs: &[u8]) -> u8 {
        let mut node = 0usize;
        loop {
            let prob = probs[node >> 1];
            let bit = self.read_bool(prob) as usize;
            let next = tree[node + bit];
            if next <= 0 {
                return (-next) as u8;
            }
            node = next as usize;
        }
    }

    /// Bytes pulled from the buffer so far
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Validate the end of the partition
    ///
    /// The bits remaining in the window are encoder padding and must be
    /// zero. Whole trailing bytes never pulled into the window are
    /// tolerated, since tile byte ranges may be padded.
    pub fn finish(self) -> Result<()> {
        if self.value != 0 {
            return Err(Error::corrupted("non-zero padding in bool-coded data"));
        }
        let trailing = self.data.len().saturating_sub(self.pos);
        if trailing > 0 {
            warn!(trailing, "ignoring trailing bytes after bool-coded data");
        }
        Ok(())
    }
}
