//! Bit-level reader for MMR coded data.

use crate::{DecodeError, Result};

#[derive(Debug, Clone)]
pub(crate) struct BitReader<'a> {
    data: &'a [u8],
    bit_offset: usize,
}

impl<'a> BitReader<'a> {
    #[inline(always)]
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            bit_offset: 0,
        }
    }

    /// Return the next `num_bits` bits without consuming them.
    ///
    /// Bits beyond the end of the data read as zero, so that a short code at
    /// the very end of the input can still be looked up in a full window.
    #[inline(always)]
    pub(crate) fn peek_bits(&self, num_bits: u8) -> u32 {
        debug_assert!(num_bits <= 24);

        let byte_pos = self.byte_pos();
        let mut window = 0_u32;
        for i in 0..4 {
            let byte = self.data.get(byte_pos + i).copied().unwrap_or(0);
            window = (window << 8) | byte as u32;
        }

        (window << self.bit_pos()) >> (32 - num_bits as u32)
    }

    #[inline(always)]
    pub(crate) fn consume(&mut self, num_bits: u8) -> Result<()> {
        let new_offset = self.bit_offset + num_bits as usize;

        if new_offset > self.data.len() * 8 {
            return Err(DecodeError::UnexpectedEof);
        }

        self.bit_offset = new_offset;

        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn read_bits(&mut self, num_bits: u8) -> Result<u32> {
        let bits = self.peek_bits(num_bits);
        self.consume(num_bits)?;

        Ok(bits)
    }

    #[inline(always)]
    pub(crate) fn align(&mut self) {
        let bit_pos = self.bit_pos();

        if bit_pos != 0 {
            self.bit_offset += 8 - bit_pos;
        }
    }

    #[inline(always)]
    pub(crate) fn at_end(&self) -> bool {
        self.bit_offset >= self.data.len() * 8
    }

    #[inline(always)]
    pub(crate) fn byte_pos(&self) -> usize {
        self.bit_offset >> 3
    }

    #[inline(always)]
    fn bit_pos(&self) -> usize {
        self.bit_offset & 7
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_pads_with_zeros() {
        let reader = BitReader::new(&[0b1010_0000]);
        assert_eq!(reader.peek_bits(13), 0b1010_0000_0000_0);
    }

    #[test]
    fn read_across_bytes() {
        let mut reader = BitReader::new(&[0b0001_1110, 0b1100_0000]);
        assert_eq!(reader.read_bits(3), Ok(0));
        assert_eq!(reader.read_bits(7), Ok(0b11110_11));
        assert_eq!(reader.byte_pos(), 1);
        reader.align();
        assert_eq!(reader.byte_pos(), 2);
        assert!(reader.at_end());
    }

    #[test]
    fn consume_past_end_fails() {
        let mut reader = BitReader::new(&[0xFF]);
        assert_eq!(reader.read_bits(8), Ok(0xFF));
        assert_eq!(reader.read_bits(1), Err(DecodeError::UnexpectedEof));
    }
}
