//! Extracting and combining bitmaps.

use crate::bitmap::Bitmap;
use crate::error::{RegionError, Result, err};

/// How a bitmap is combined with the bitmap it is drawn onto (7.4.1.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CombinationOperator {
    /// Black if either pixel is black.
    Or,
    /// Black if both pixels are black.
    And,
    /// Black if exactly one pixel is black.
    Xor,
    /// Black if both pixels are equal.
    Xnor,
    /// The source pixel replaces the destination pixel.
    Replace,
}

impl CombinationOperator {
    pub(crate) fn from_value(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Or),
            1 => Ok(Self::And),
            2 => Ok(Self::Xor),
            3 => Ok(Self::Xnor),
            4 => Ok(Self::Replace),
            _ => err!(RegionError::InvalidCombinationOperator),
        }
    }

    #[inline(always)]
    fn apply(self, dst: u8, src: u8) -> u8 {
        match self {
            Self::Or => dst | src,
            Self::And => dst & src,
            Self::Xor => dst ^ src,
            Self::Xnor => !(dst ^ src),
            Self::Replace => src,
        }
    }
}

/// Eight bits of `row`, starting at bit `offset`. Bits outside of the row
/// are zero.
#[inline(always)]
fn fetch(row: &[u8], offset: i64) -> u8 {
    let byte = offset.div_euclid(8);
    let shift = offset.rem_euclid(8) as u32;

    let at = |idx: i64| -> u8 {
        usize::try_from(idx)
            .ok()
            .and_then(|idx| row.get(idx).copied())
            .unwrap_or(0)
    };

    if shift == 0 {
        at(byte)
    } else {
        (at(byte) << shift) | (at(byte + 1) >> (8 - shift))
    }
}

/// Copy the `width` × `height` rectangle at `(x, y)` out of `src`. Parts of
/// the rectangle outside of `src` are white.
pub(crate) fn extract(src: &Bitmap, x: i64, y: i64, width: u32, height: u32) -> Bitmap {
    let mut out = Bitmap::new(width, height);
    let stride = out.stride();
    let tail = width % 8;

    for row in 0..height {
        let src_y = y + row as i64;
        if src_y < 0 || src_y >= src.height() as i64 {
            continue;
        }

        let src_row = src.row(src_y as u32);
        let dst_row = out.row_mut(row);

        if x % 8 == 0 && x >= 0 {
            let start = (x / 8) as usize;
            let available = src_row.len().saturating_sub(start).min(stride);
            dst_row[..available].copy_from_slice(&src_row[start..start + available]);
        } else {
            for (i, byte) in dst_row.iter_mut().enumerate() {
                *byte = fetch(src_row, x + 8 * i as i64);
            }
        }

        // Pixels past the right edge of `src` are padding and thus zero, but
        // the last byte of the output row must not carry bits past `width`.
        if tail != 0 && stride > 0 {
            dst_row[stride - 1] &= 0xFF << (8 - tail);
        }
    }

    out
}

/// Combine `src` into `dst` with its top-left corner at `(x, y)`, clipping
/// everything outside of `dst`.
pub(crate) fn blit(src: &Bitmap, dst: &mut Bitmap, x: i64, y: i64, op: CombinationOperator) {
    let src_x0 = (-x).max(0);
    let src_y0 = (-y).max(0);
    let dst_x0 = x.max(0);
    let dst_y0 = y.max(0);

    let width = (src.width() as i64 - src_x0).min(dst.width() as i64 - dst_x0);
    let height = (src.height() as i64 - src_y0).min(dst.height() as i64 - dst_y0);

    if width <= 0 || height <= 0 {
        return;
    }

    let dst_x1 = dst_x0 + width;
    let first_byte = (dst_x0 / 8) as usize;
    let last_byte = ((dst_x1 - 1) / 8) as usize;
    // The source bit that ends up at bit 0 of destination byte 0.
    let shift = src_x0 - dst_x0;

    let head_mask = 0xFF_u8 >> (dst_x0 % 8);
    let tail_mask = 0xFF_u8 << (7 - (dst_x1 - 1) % 8);

    for row in 0..height {
        let src_row = src.row((src_y0 + row) as u32);
        let dst_row = dst.row_mut((dst_y0 + row) as u32);

        if first_byte == last_byte {
            // The span fits into a single destination byte.
            let mask = head_mask & tail_mask;
            let s = fetch(src_row, shift + 8 * first_byte as i64);
            let d = dst_row[first_byte];
            dst_row[first_byte] = (d & !mask) | (op.apply(d, s) & mask);
        } else if shift.rem_euclid(8) == 0 {
            // Source and destination bytes line up.
            for (i, d) in dst_row[first_byte..=last_byte].iter_mut().enumerate() {
                let idx = first_byte + i;
                let s = fetch(src_row, shift + 8 * idx as i64);
                let mask = match idx {
                    _ if idx == first_byte => head_mask,
                    _ if idx == last_byte => tail_mask,
                    _ => 0xFF,
                };
                *d = (*d & !mask) | (op.apply(*d, s) & mask);
            }
        } else {
            // Every destination byte is assembled from two source bytes.
            let first = fetch(src_row, shift + 8 * first_byte as i64);
            let d = dst_row[first_byte];
            dst_row[first_byte] = (d & !head_mask) | (op.apply(d, first) & head_mask);

            for idx in first_byte + 1..last_byte {
                let s = fetch(src_row, shift + 8 * idx as i64);
                dst_row[idx] = op.apply(dst_row[idx], s);
            }

            let last = fetch(src_row, shift + 8 * last_byte as i64);
            let d = dst_row[last_byte];
            dst_row[last_byte] = (d & !tail_mask) | (op.apply(d, last) & tail_mask);
        }
    }
}
