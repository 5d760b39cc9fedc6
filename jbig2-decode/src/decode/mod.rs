//! Region and dictionary decoding procedures (6.2 - 6.7), together with the
//! region segment information field they share (7.4.1).

pub(crate) mod generic;
pub(crate) mod generic_refinement;
pub(crate) mod halftone;
pub(crate) mod pattern;
pub(crate) mod symbol;
pub(crate) mod text;

use alloc::vec::Vec;

use log::warn;

use crate::bitmap::Bitmap;
use crate::compose::CombinationOperator;
use crate::error::{FormatError, Result, SymbolError, TemplateError, bail};
use crate::reader::Reader;

/// The region segment information field (7.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RegionSegmentInfo {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) x: u32,
    pub(crate) y: u32,
    /// "Bits 0-2: External combination operator." (7.4.1.5)
    pub(crate) combination_operator: CombinationOperator,
}

impl RegionSegmentInfo {
    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let width = reader.read_u32()?;
        let height = reader.read_u32()?;
        let x = reader.read_u32()?;
        let y = reader.read_u32()?;
        let flags = reader.read_byte()?;

        let combination_operator = CombinationOperator::from_value(flags & 0x07)?;

        // Coloured regions (T.88 Amd. 3) are decoded as plain bi-level ones.
        if flags & 0x08 != 0 {
            warn!("ignoring colour extension flag of region segment");
        }

        if flags & 0xF0 != 0 {
            bail!(FormatError::ReservedBits);
        }

        Ok(Self {
            width,
            height,
            x,
            y,
            combination_operator,
        })
    }
}

/// The decoded bitmap of a region segment, with its placement on the page.
#[derive(Debug, Clone)]
pub(crate) struct RegionBitmap {
    pub(crate) bitmap: Bitmap,
    pub(crate) info: RegionSegmentInfo,
}

/// An adaptive template pixel, relative to the pixel being decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AtPixel {
    pub(crate) x: i32,
    pub(crate) y: i32,
}

impl AtPixel {
    pub(crate) const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Read `count` AT pixels stored as signed byte pairs.
///
/// Generic region AT pixels must refer to pixels that are already decoded
/// (6.2.5.4). Refinement AT pixels may also point into the reference bitmap
/// and are therefore read with `check_causal` set to false.
pub(crate) fn parse_at_pixels(
    reader: &mut Reader<'_>,
    count: usize,
    check_causal: bool,
) -> Result<Vec<AtPixel>> {
    let mut pixels = Vec::with_capacity(count);

    for _ in 0..count {
        let x = reader.read_i8()? as i32;
        let y = reader.read_i8()? as i32;

        if check_causal && (y > 0 || (y == 0 && x >= 0)) {
            bail!(TemplateError::InvalidAtPixel);
        }

        pixels.push(AtPixel::new(x, y));
    }

    Ok(pixels)
}

/// Reject an out-of-band value where a number is required.
pub(crate) fn required(value: Option<i32>) -> Result<i32> {
    value.ok_or(SymbolError::UnexpectedOob.into())
}

/// `ceil(log2(n))`, the number of bits needed to index `n` values.
pub(crate) fn index_bits(n: u32) -> u8 {
    if n <= 1 {
        0
    } else {
        (32 - (n - 1).leading_zeros()) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;

    #[test]
    fn region_info_layout() {
        let data = [
            0, 0, 0, 10, 0, 0, 0, 20, 0, 0, 0, 3, 0, 0, 0, 4, 0x02,
        ];
        let info = RegionSegmentInfo::parse(&mut Reader::new(&data)).unwrap();

        assert_eq!((info.width, info.height, info.x, info.y), (10, 20, 3, 4));
        assert_eq!(info.combination_operator, CombinationOperator::Xor);
    }

    #[test]
    fn region_info_reserved_bits() {
        let data = [0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0x10];
        assert_eq!(
            RegionSegmentInfo::parse(&mut Reader::new(&data)).err(),
            Some(DecodeError::Format(FormatError::ReservedBits))
        );
    }

    #[test]
    fn at_pixels_must_be_causal() {
        let data = [0xFD, 0xFF, 0xFE, 0x00];
        let pixels = parse_at_pixels(&mut Reader::new(&data), 2, true).unwrap();
        assert_eq!(pixels, [AtPixel::new(-3, -1), AtPixel::new(-2, 0)]);

        for bad in [[0x00, 0x00], [0x01, 0x00], [0xFF, 0x01]] {
            assert_eq!(
                parse_at_pixels(&mut Reader::new(&bad), 1, true).err(),
                Some(DecodeError::Template(TemplateError::InvalidAtPixel))
            );
            assert!(parse_at_pixels(&mut Reader::new(&bad), 1, false).is_ok());
        }
    }

    #[test]
    fn index_bits_rounds_up() {
        let cases = [(0, 0), (1, 0), (2, 1), (3, 2), (4, 2), (5, 3), (256, 8), (257, 9)];
        for (n, bits) in cases {
            assert_eq!(index_bits(n), bits, "n = {n}");
        }
    }
}
