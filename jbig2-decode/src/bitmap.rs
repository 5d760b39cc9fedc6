//! Packed bi-level bitmaps.

use alloc::vec;
use alloc::vec::Vec;

/// A bi-level bitmap with one bit per pixel.
///
/// Rows are padded to whole bytes. Within a byte, the most significant bit is
/// the leftmost pixel. A set bit is a black pixel, a cleared bit a white one.
/// Padding bits at the end of a row are always zero.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl Bitmap {
    /// Create a white bitmap.
    pub fn new(width: u32, height: u32) -> Self {
        let stride = (width as usize).div_ceil(8);

        Self {
            width,
            height,
            stride,
            data: vec![0; stride * height as usize],
        }
    }

    /// Create a bitmap where every pixel has the given value.
    pub fn filled(width: u32, height: u32, black: bool) -> Self {
        let mut bitmap = Self::new(width, height);
        if black {
            bitmap.fill(true);
        }

        bitmap
    }

    /// The width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// The height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The number of bytes per row.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// The packed pixel data, `stride` bytes per row.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Return whether the pixel at `(x, y)` is black. Pixels outside of the
    /// bitmap are white.
    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }

        let byte = self.data[y as usize * self.stride + (x as usize >> 3)];
        (byte >> (7 - (x & 7))) & 1 != 0
    }

    /// Set the pixel at `(x, y)`. Writes outside of the bitmap are ignored.
    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, black: bool) {
        if x >= self.width || y >= self.height {
            return;
        }

        let idx = y as usize * self.stride + (x as usize >> 3);
        let mask = 0x80 >> (x & 7);

        if black {
            self.data[idx] |= mask;
        } else {
            self.data[idx] &= !mask;
        }
    }

    /// The pixel at a possibly negative position, as a context bit.
    #[inline(always)]
    pub(crate) fn pixel(&self, x: i32, y: i32) -> u32 {
        if x < 0 || y < 0 {
            return 0;
        }

        self.get_pixel(x as u32, y as u32) as u32
    }

    pub(crate) fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.stride]
    }

    pub(crate) fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        &mut self.data[start..start + self.stride]
    }

    /// Copy row `src` over row `dst`.
    pub(crate) fn copy_row(&mut self, src: u32, dst: u32) {
        let stride = self.stride;
        self.data.copy_within(
            src as usize * stride..(src as usize + 1) * stride,
            dst as usize * stride,
        );
    }

    /// Set every pixel to the given value.
    pub(crate) fn fill(&mut self, black: bool) {
        if !black {
            self.data.fill(0);
            return;
        }

        self.data.fill(0xFF);

        let tail = self.width % 8;
        if tail != 0 && self.stride > 0 {
            let mask = 0xFF_u8 << (8 - tail);
            for y in 0..self.height {
                let stride = self.stride;
                self.row_mut(y)[stride - 1] &= mask;
            }
        }
    }

    /// Set the pixels `start..end` of row `y` to black.
    pub(crate) fn fill_span(&mut self, y: u32, start: u32, end: u32) {
        let end = end.min(self.width);
        if start >= end || y >= self.height {
            return;
        }

        let row = self.row_mut(y);
        let (first, last) = ((start >> 3) as usize, ((end - 1) >> 3) as usize);
        let head = 0xFF_u8 >> (start & 7);
        let tail = 0xFF_u8 << (7 - ((end - 1) & 7));

        if first == last {
            row[first] |= head & tail;
        } else {
            row[first] |= head;
            row[first + 1..last].fill(0xFF);
            row[last] |= tail;
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl core::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "Bitmap {}x{}", self.width, self.height)?;

        for y in 0..self.height {
            for x in 0..self.width {
                f.write_str(if self.get_pixel(x, y) { "#" } else { "." })?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixels_are_msb_first() {
        let mut bitmap = Bitmap::new(10, 2);
        assert_eq!(bitmap.stride(), 2);

        bitmap.set_pixel(0, 0, true);
        bitmap.set_pixel(9, 1, true);
        bitmap.set_pixel(10, 1, true);
        assert_eq!(bitmap.data(), &[0x80, 0x00, 0x00, 0x40]);

        assert!(bitmap.get_pixel(9, 1));
        assert!(!bitmap.get_pixel(10, 1));
        assert_eq!(bitmap.pixel(-1, 0), 0);
        assert_eq!(bitmap.pixel(0, 0), 1);
    }

    #[test]
    fn filled_bitmaps_keep_padding_clear() {
        let bitmap = Bitmap::filled(5, 2, true);
        assert_eq!(bitmap.data(), &[0xF8, 0xF8]);
    }

    #[test]
    fn spans() {
        let mut bitmap = Bitmap::new(20, 1);
        bitmap.fill_span(0, 3, 5);
        bitmap.fill_span(0, 6, 19);
        bitmap.fill_span(0, 19, 30);
        assert_eq!(bitmap.data(), &[0b0001_1011, 0xFF, 0xF0]);
    }

    #[test]
    fn copy_rows() {
        let mut bitmap = Bitmap::new(8, 2);
        bitmap.set_pixel(4, 0, true);
        bitmap.copy_row(0, 1);
        assert!(bitmap.get_pixel(4, 1));
    }
}
