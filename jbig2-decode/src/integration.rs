//! Integration with the [image] crate.

use ::image::error::{LimitError, LimitErrorKind};
use ::image::{ColorType, GrayImage, ImageDecoder, ImageError, ImageResult};

use crate::Image;

impl Image {
    /// Convert the image into an 8-bit grayscale image, with black pixels
    /// as 0 and white pixels as 255.
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width(), self.height(), |x, y| {
            ::image::Luma([luma(self.bitmap.get_pixel(x, y))])
        })
    }

    fn write_luma(&self, buf: &mut [u8]) -> ImageResult<()> {
        let width = self.width() as usize;
        let expected = width * self.height() as usize;

        if buf.len() != expected {
            return Err(ImageError::Limits(LimitError::from_kind(
                LimitErrorKind::DimensionError,
            )));
        }

        if width == 0 {
            return Ok(());
        }

        for (y, row) in buf.chunks_exact_mut(width).enumerate() {
            for (x, pixel) in row.iter_mut().enumerate() {
                *pixel = luma(self.bitmap.get_pixel(x as u32, y as u32));
            }
        }

        Ok(())
    }
}

fn luma(black: bool) -> u8 {
    if black { 0 } else { 255 }
}

impl ImageDecoder for Image {
    fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    fn color_type(&self) -> ColorType {
        ColorType::L8
    }

    fn read_image(self, buf: &mut [u8]) -> ImageResult<()>
    where
        Self: Sized,
    {
        self.write_luma(buf)
    }

    fn read_image_boxed(self: Box<Self>, buf: &mut [u8]) -> ImageResult<()> {
        self.write_luma(buf)
    }
}
