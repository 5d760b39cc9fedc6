/*!
A memory-safe, pure-Rust JBIG2 decoder.

`jbig2-decode` decodes bi-level images compressed as specified in ITU-T T.88
(also known as ISO/IEC 14492). JBIG2 is mostly found inside of PDF files, where
it compresses scanned text pages.

All region types are supported: generic regions (arithmetic and MMR coded),
generic refinement regions, text regions with symbol dictionaries, and halftone
regions with pattern dictionaries. Both standalone files and embedded streams
with separate global segments can be decoded.

# Example
```rust,no_run
let data = std::fs::read("image.jb2").unwrap();
let image = jbig2_decode::decode(&data).unwrap();

println!("{}x{} image", image.width(), image.height());
```

Multi-page files are decoded through a [`Document`]:
```rust,no_run
use jbig2_decode::Document;

let data = std::fs::read("document.jb2").unwrap();
let mut document = Document::new(&data).unwrap();

for number in document.page_numbers() {
    let page = document.page(number).unwrap();
    println!("page {number}: {}x{}", page.width(), page.height());
}
```

# Safety
This crate forbids unsafe code via a crate-level attribute.

# Cargo features
- `std`: Use the standard library.
- `image`: Implement `image::ImageDecoder` for [`Image`]. Implies `std`.
*/

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

mod arithmetic_decoder;
mod bitmap;
mod compose;
mod decode;
mod document;
mod error;
mod file;
mod gray_scale;
mod huffman_table;
mod integer_decoder;
#[cfg(feature = "image")]
mod integration;
mod page;
mod page_info;
mod reader;
mod segment;
mod standard_tables;

use error::bail;

pub use bitmap::Bitmap;
pub use compose::CombinationOperator;
pub use document::Document;
pub use error::{
    DecodeError, ErrorKind, FormatError, HuffmanError, ParseError, RegionError, Result,
    SegmentError, SymbolError, TemplateError,
};

/// Limits that protect against streams which would otherwise make the
/// decoder allocate or loop excessively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeSettings {
    /// The maximum number of symbol instances of a text region, and the
    /// maximum number of new symbols of a symbol dictionary.
    pub max_symbol_instances: u32,
    /// The maximum number of pixels of any bitmap the decoder allocates.
    pub max_pixels: u64,
    /// The maximum number of strips of a text region. Defaults to the number
    /// of symbol instances, since every strip holds at least one instance.
    pub max_strip_iterations: Option<u32>,
}

impl Default for DecodeSettings {
    fn default() -> Self {
        Self {
            max_symbol_instances: 1 << 24,
            max_pixels: 1 << 32,
            max_strip_iterations: None,
        }
    }
}

impl DecodeSettings {
    pub(crate) fn check_area(&self, width: u32, height: u32) -> Result<()> {
        if width as u64 * height as u64 > self.max_pixels {
            bail!(DecodeError::LimitExceeded);
        }

        Ok(())
    }
}

/// A decoded page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub(crate) x_resolution: Option<u32>,
    pub(crate) y_resolution: Option<u32>,
    pub(crate) bitmap: Bitmap,
}

impl Image {
    /// The width of the image in pixels.
    pub fn width(&self) -> u32 {
        self.bitmap.width()
    }

    /// The height of the image in pixels.
    pub fn height(&self) -> u32 {
        self.bitmap.height()
    }

    /// The horizontal resolution in pixels per metre, if known.
    pub fn x_resolution(&self) -> Option<u32> {
        self.x_resolution
    }

    /// The vertical resolution in pixels per metre, if known.
    pub fn y_resolution(&self) -> Option<u32> {
        self.y_resolution
    }

    /// The pixels of the image.
    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    /// Return the pixels of the image.
    pub fn into_bitmap(self) -> Bitmap {
        self.bitmap
    }

    /// Whether the pixel at `(x, y)` is black. Pixels outside of the image
    /// are white.
    pub fn pixel(&self, x: u32, y: u32) -> bool {
        x < self.width() && y < self.height() && self.bitmap.get_pixel(x, y)
    }
}

/// Decode the first page of a standalone JBIG2 file or of an embedded stream
/// without globals.
pub fn decode(data: &[u8]) -> Result<Image> {
    decode_embedded(data, None)
}

/// Decode the first page of an embedded JBIG2 stream, together with the
/// global segments it may refer to.
pub fn decode_embedded(data: &[u8], globals: Option<&[u8]>) -> Result<Image> {
    let mut document = Document::with_globals(data, globals, DecodeSettings::default())?;

    let first = document
        .page_numbers()
        .first()
        .copied()
        .ok_or(FormatError::MissingPage)?;

    document.page(first)
}
