//! A bit- and byte-addressable cursor over JBIG2 data.

use smallvec::SmallVec;

use crate::error::{ParseError, Result};

/// A reader for reading bits and bytes from a byte slice.
///
/// Multi-byte integers are big-endian. Bits are read MSB first.
#[derive(Debug, Clone)]
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    /// The position in bits.
    cur_pos: usize,
    /// Saved positions for `mark`/`reset`.
    marks: SmallVec<[usize; 4]>,
}

impl<'a> Reader<'a> {
    #[inline(always)]
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            cur_pos: 0,
            marks: SmallVec::new(),
        }
    }

    /// A reader over the `len` bytes starting at `offset` of the underlying
    /// data. The window is clamped to the available data.
    pub(crate) fn sub(&self, offset: usize, len: usize) -> Self {
        let start = offset.min(self.data.len());
        let end = start.saturating_add(len).min(self.data.len());

        Self::new(&self.data[start..end])
    }

    /// The whole underlying data.
    #[inline(always)]
    pub(crate) fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Remember the current position.
    pub(crate) fn mark(&mut self) {
        self.marks.push(self.cur_pos);
    }

    /// Return to the most recently marked position.
    pub(crate) fn reset(&mut self) {
        if let Some(pos) = self.marks.pop() {
            self.cur_pos = pos;
        }
    }

    /// Drop the most recent mark without moving.
    pub(crate) fn unmark(&mut self) {
        self.marks.pop();
    }

    /// Move to an absolute byte offset. Seeking beyond the end is allowed,
    /// subsequent reads fail.
    pub(crate) fn seek(&mut self, byte_offset: usize) {
        self.cur_pos = byte_offset.saturating_mul(8);
    }

    #[inline(always)]
    pub(crate) fn align(&mut self) {
        let bit_pos = self.bit_pos();

        if bit_pos != 0 {
            self.cur_pos += 8 - bit_pos;
        }
    }

    #[inline(always)]
    pub(crate) fn at_end(&self) -> bool {
        self.byte_pos() >= self.data.len()
    }

    /// The bytes from the current (byte) position to the end.
    #[inline(always)]
    pub(crate) fn tail(&self) -> &'a [u8] {
        self.data.get(self.byte_pos()..).unwrap_or(&[])
    }

    #[inline(always)]
    pub(crate) fn byte_pos(&self) -> usize {
        self.cur_pos >> 3
    }

    #[inline(always)]
    pub(crate) fn bit_pos(&self) -> usize {
        self.cur_pos & 7
    }

    /// Read the given number of bytes.
    ///
    /// Assumes that the reader is currently byte-aligned.
    #[inline(always)]
    pub(crate) fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        debug_assert_eq!(self.bit_pos(), 0);

        let bytes = self.peek_bytes(len)?;
        self.cur_pos += len * 8;

        Ok(bytes)
    }

    #[inline(always)]
    pub(crate) fn skip_bytes(&mut self, len: usize) -> Result<()> {
        self.read_bytes(len).map(|_| ())
    }

    #[inline(always)]
    pub(crate) fn peek_bytes(&self, len: usize) -> Result<&'a [u8]> {
        let start = self.byte_pos();
        let end = start.checked_add(len).ok_or(ParseError::UnexpectedEof)?;

        Ok(self.data.get(start..end).ok_or(ParseError::UnexpectedEof)?)
    }

    #[inline(always)]
    pub(crate) fn read_byte(&mut self) -> Result<u8> {
        debug_assert_eq!(self.bit_pos(), 0);

        let byte = self.cur_byte()?;
        self.cur_pos += 8;

        Ok(byte)
    }

    #[inline(always)]
    pub(crate) fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_byte()? as i8)
    }

    #[inline(always)]
    pub(crate) fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;

        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    #[inline(always)]
    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;

        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    #[inline(always)]
    pub(crate) fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    #[inline(always)]
    pub(crate) fn read_bit(&mut self) -> Result<u32> {
        let byte = self.cur_byte()?;
        let shift = 7 - self.bit_pos();
        self.cur_pos += 1;

        Ok(((byte >> shift) & 1) as u32)
    }

    /// Read up to 32 bits, MSB first.
    #[inline(always)]
    pub(crate) fn read_bits(&mut self, count: u8) -> Result<u32> {
        debug_assert!(count <= 32);

        let mut value = 0_u64;
        let mut remaining = count;

        while remaining > 0 {
            let bit_offset = self.bit_pos() as u8;
            let byte = self.cur_byte()? as u64;

            let available = 8 - bit_offset;
            let take = remaining.min(available);

            let shift = available - take;
            let mask = (1 << take) - 1;

            value = (value << take) | ((byte >> shift) & mask);
            self.cur_pos += take as usize;
            remaining -= take;
        }

        Ok(value as u32)
    }

    #[inline(always)]
    fn cur_byte(&self) -> Result<u8> {
        Ok(self
            .data
            .get(self.byte_pos())
            .copied()
            .ok_or(ParseError::UnexpectedEof)?)
    }
}
