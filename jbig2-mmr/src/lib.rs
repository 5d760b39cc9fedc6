/*!
A memory-safe, pure-Rust decoder for MMR coded bitmaps.

MMR ("Modified Modified READ") is the two-dimensional coding scheme of
ITU-T T.6, better known as CCITT Group 4. JBIG2 uses it as an alternative to
arithmetic coding for generic regions, symbol bitmaps and the bit planes of
halftone regions.

The decoder does not produce pixels on its own. For each decoded row it hands
the positions of the row's changing elements to a [`Decoder`] sink, which can
expand them into whatever pixel layout it needs.

# Example
```rust
use jbig2_mmr::{DecodeSettings, Decoder, decode};

struct Rows(Vec<Vec<u32>>);

impl Decoder for Rows {
    fn push_row(&mut self, changes: &[u32]) {
        self.0.push(changes.to_vec());
    }
}

// Two rows of 8 pixels: all white, then pixels 2..6 black.
let data = [0x97, 0x70];
let mut rows = Rows(Vec::new());
let settings = DecodeSettings { columns: 8, rows: 2 };
decode(&data, &mut rows, &settings).unwrap();

assert_eq!(rows.0, vec![vec![], vec![2, 6]]);
```

# Safety
This crate forbids unsafe code via a crate-level attribute.
*/

#![no_std]
#![forbid(unsafe_code)]

extern crate alloc;

mod bit_reader;
mod decode;
mod tables;

use alloc::vec::Vec;
use core::fmt;

use bit_reader::BitReader;
use log::warn;
use tables::Mode;

/// Settings that describe the geometry of the coded bitmap.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DecodeSettings {
    /// The number of pixels in each row.
    pub columns: u32,
    /// The number of rows to decode.
    pub rows: u32,
}

/// A sink for decoded rows.
pub trait Decoder {
    /// Receive the next row as the strictly increasing positions of its
    /// changing elements.
    ///
    /// Every row starts white. The pixels from `changes[2 * i]` up to (but not
    /// including) `changes[2 * i + 1]` are black. If the number of changes is
    /// odd, the last black span reaches the end of the row.
    fn push_row(&mut self, changes: &[u32]);
}

/// An error that can occur while decoding MMR data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The data ended in the middle of a code word.
    UnexpectedEof,
    /// A bit sequence that is not a valid code was encountered.
    InvalidCode,
    /// A run length overflowed.
    Overflow,
    /// A changing element was placed to the left of the previous one.
    InvalidChangingElement,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => write!(f, "unexpected end of MMR data"),
            Self::InvalidCode => write!(f, "invalid MMR code"),
            Self::Overflow => write!(f, "MMR run length overflow"),
            Self::InvalidChangingElement => write!(f, "invalid changing element position"),
        }
    }
}

impl core::error::Error for DecodeError {}

/// Result type for MMR decoding.
pub type Result<T> = core::result::Result<T, DecodeError>;

/// Decode `settings.rows` rows of MMR data, pushing each of them into
/// `decoder`.
///
/// End-of-line codes (and thus an EOFB marker) after the last row are
/// skipped. Returns the number of bytes consumed, rounded up to a whole byte.
pub fn decode(data: &[u8], decoder: &mut impl Decoder, settings: &DecodeSettings) -> Result<usize> {
    let mut reader = BitReader::new(data);
    let mut ctx = DecoderContext::new(settings.columns);

    for _ in 0..settings.rows {
        ctx.decode_row(&mut reader)?;
        decoder.push_row(&ctx.coding_line);
        ctx.next_row();
    }

    reader.skip_eol();
    reader.align();

    Ok(reader.byte_pos().min(data.len()))
}

struct DecoderContext {
    /// The changing elements of the previous row. "The reference line for the
    /// first coding line in a page is an imaginary white line."
    reference_line: Vec<u32>,
    /// The changing elements of the row being decoded.
    coding_line: Vec<u32>,
    columns: u32,
}

impl DecoderContext {
    fn new(columns: u32) -> Self {
        Self {
            reference_line: Vec::new(),
            coding_line: Vec::new(),
            columns,
        }
    }

    fn decode_row(&mut self, reader: &mut BitReader<'_>) -> Result<()> {
        self.coding_line.clear();

        // `None` is the imaginary changing element before the first pixel.
        let mut a0: Option<u32> = None;
        let mut is_white = true;

        while a0.map_or(self.columns > 0, |a0| a0 < self.columns) {
            let (b1, b2) = self.find_b1_b2(a0, is_white);

            match reader.decode_mode()? {
                // 2.2.3.1 Pass mode.
                Mode::Pass => {
                    a0 = Some(b2);
                }
                // 2.2.3.3 Horizontal mode.
                Mode::Horizontal => {
                    let start = a0.unwrap_or(0);
                    let a0a1 = reader.decode_run(is_white)?;
                    let a1a2 = reader.decode_run(!is_white)?;

                    let a1 = start.checked_add(a0a1).ok_or(DecodeError::Overflow)?;
                    let a2 = a1.checked_add(a1a2).ok_or(DecodeError::Overflow)?;

                    self.push_change(a1);
                    self.push_change(a2);
                    a0 = Some(a2);
                }
                // 2.2.3.2 Vertical mode.
                Mode::Vertical(delta) => {
                    let a1 = b1
                        .checked_add_signed(delta as i32)
                        .ok_or(DecodeError::InvalidChangingElement)?;

                    if a0.is_some_and(|a0| a1 < a0) {
                        return Err(DecodeError::InvalidChangingElement);
                    }

                    self.push_change(a1);
                    a0 = Some(a1);
                    is_white = !is_white;
                }
            }
        }

        if a0.is_some_and(|a0| a0 > self.columns) {
            warn!("MMR row overruns the row width of {}", self.columns);
        }

        Ok(())
    }

    /// Find `b1`, "the first changing element on the reference line to the
    /// right of a0 and of opposite colour to the colour of a0", and `b2`, "the
    /// next changing element to the right of b1 on the reference line".
    fn find_b1_b2(&self, a0: Option<u32>, is_white: bool) -> (u32, u32) {
        let mut idx = match a0 {
            Some(a0) => self.reference_line.partition_point(|&e| e <= a0),
            None => 0,
        };

        // Changing elements at even indices turn the line black, so they are
        // the ones of opposite colour to a white a0.
        if (idx % 2 == 0) != is_white {
            idx += 1;
        }

        (self.reference_at(idx), self.reference_at(idx + 1))
    }

    fn reference_at(&self, idx: usize) -> u32 {
        self.reference_line
            .get(idx)
            .copied()
            .unwrap_or(self.columns)
    }

    fn push_change(&mut self, pos: u32) {
        if pos >= self.columns {
            return;
        }

        // Two changes at the same position cancel out.
        if self.coding_line.last() == Some(&pos) {
            self.coding_line.pop();
        } else {
            self.coding_line.push(pos);
        }
    }

    fn next_row(&mut self) {
        core::mem::swap(&mut self.reference_line, &mut self.coding_line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    struct Rows(Vec<Vec<u32>>);

    impl Decoder for Rows {
        fn push_row(&mut self, changes: &[u32]) {
            self.0.push(changes.to_vec());
        }
    }

    fn decode_rows(data: &[u8], columns: u32, rows: u32) -> Result<(Vec<Vec<u32>>, usize)> {
        let mut sink = Rows(Vec::new());
        let consumed = decode(data, &mut sink, &DecodeSettings { columns, rows })?;
        Ok((sink.0, consumed))
    }

    #[test]
    fn horizontal_then_vertical() {
        // Row 0: V0 against the white reference line.
        // Row 1: H, white 2 (`0111`), black 4 (`011`), then V0 (`1`).
        let data = [0x97, 0x70];
        let (rows, consumed) = decode_rows(&data, 8, 2).unwrap();

        assert_eq!(rows, vec![vec![], vec![2, 6]]);
        assert_eq!(consumed, 2);
    }

    #[test]
    fn vertical_follows_reference_line() {
        // Row 0: H, white 2, black 4, V0 -> changes [2, 6].
        // Row 1: V0, V0, V0 -> the same changes as the reference line.
        // Row 2: VR1, VL1, V0 -> changes [3, 5].
        // Bits: 001 0111 011 1 | 1 1 1 | 011 010 1
        let data = [0b0010_1110, 0b1111_1101, 0b1010_1000];
        let (rows, _) = decode_rows(&data, 8, 3).unwrap();

        assert_eq!(rows, vec![vec![2, 6], vec![2, 6], vec![3, 5]]);
    }

    #[test]
    fn pass_mode_keeps_colour() {
        // Row 0: H, white 1 (`000111`), black 2 (`11`), V0 -> [1, 3].
        // Row 1: P (a0 moves to b2 = 3), V0 (b1 = 8) -> no changes.
        // Bits: 001 000111 11 1 | 0001 1
        let data = [0b0010_0011, 0b1111_0001, 0b1000_0000];
        let (rows, _) = decode_rows(&data, 8, 2).unwrap();

        assert_eq!(rows, vec![vec![1, 3], vec![]]);
    }

    #[test]
    fn trailing_eofb_is_consumed() {
        // One white row (V0 on an all-white reference line) followed by EOFB.
        // Bits: 1 | 000000000001 000000000001
        let data = [0b1000_0000, 0b0000_1000, 0b0000_0000, 0b1000_0000];
        let (rows, consumed) = decode_rows(&data, 8, 1).unwrap();

        assert_eq!(rows, vec![Vec::<u32>::new()]);
        assert_eq!(consumed, 4);
    }

    #[test]
    fn truncated_data_is_an_error() {
        assert_eq!(
            decode_rows(&[0x97], 8, 2).map(|_| ()),
            Err(DecodeError::UnexpectedEof)
        );
    }
}
