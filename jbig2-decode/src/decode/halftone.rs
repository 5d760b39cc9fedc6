//! Halftone region segment parsing and decoding (7.4.5, 6.6).

use super::generic::GenericTemplate;
use super::pattern::PatternDictionary;
use super::{RegionBitmap, RegionSegmentInfo, index_bits};
use crate::DecodeSettings;
use crate::bitmap::Bitmap;
use crate::compose::{CombinationOperator, blit};
use crate::error::{RegionError, Result, bail};
use crate::gray_scale::{GrayScaleParams, decode_gray_scale_image};
use crate::reader::Reader;

/// Decode a halftone region segment (6.6.5).
pub(crate) fn decode_region(
    data: &[u8],
    patterns: &PatternDictionary,
    settings: &DecodeSettings,
) -> Result<RegionBitmap> {
    let mut reader = Reader::new(data);
    let header = HalftoneRegionHeader::parse(&mut reader)?;
    let info = header.info;
    let grid = header.grid;

    settings.check_area(info.width, info.height)?;
    settings.check_area(grid.width, grid.height)?;

    let mut region = Bitmap::filled(info.width, info.height, header.default_pixel);

    let skip = if header.enable_skip {
        Some(skip_mask(&grid, patterns, &region))
    } else {
        None
    };

    let gray = decode_gray_scale_image(
        reader.tail(),
        &GrayScaleParams {
            mmr: header.mmr,
            bits_per_pixel: index_bits(patterns.patterns.len() as u32),
            width: grid.width,
            height: grid.height,
            template: header.template,
            skip: skip.as_ref(),
        },
    )?;

    render_patterns(&mut region, &gray, &grid, patterns, header.combination_operator)?;

    Ok(RegionBitmap {
        bitmap: region,
        info,
    })
}

/// The halftone grid: its size, origin and vector (7.4.5.1.2, 7.4.5.1.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Grid {
    /// `HGW`
    width: u32,
    /// `HGH`
    height: u32,
    /// `HGX`, in 1/256 pixel.
    x: i32,
    /// `HGY`, in 1/256 pixel.
    y: i32,
    /// `HRX`, in 1/256 pixel.
    vector_x: u16,
    /// `HRY`, in 1/256 pixel.
    vector_y: u16,
}

impl Grid {
    /// The top-left corner of the pattern for grid cell `(m, n)`, where `m`
    /// is the row and `n` the column (6.6.5.2).
    fn position(&self, m: u32, n: u32) -> (i64, i64) {
        let (m, n) = (m as i64, n as i64);
        let (rx, ry) = (self.vector_x as i64, self.vector_y as i64);

        let x = (self.x as i64 + m * ry + n * rx) >> 8;
        let y = (self.y as i64 + m * rx - n * ry) >> 8;

        (x, y)
    }
}

/// `HSKIP`: cells whose pattern lies entirely outside of the region
/// (6.6.5.1).
fn skip_mask(grid: &Grid, patterns: &PatternDictionary, region: &Bitmap) -> Bitmap {
    let mut skip = Bitmap::new(grid.width, grid.height);
    let (width, height) = (patterns.width as i64, patterns.height as i64);

    for m in 0..grid.height {
        for n in 0..grid.width {
            let (x, y) = grid.position(m, n);

            if x + width <= 0
                || x >= region.width() as i64
                || y + height <= 0
                || y >= region.height() as i64
            {
                skip.set_pixel(n, m, true);
            }
        }
    }

    skip
}

/// Draw the pattern selected by each gray-scale value at its grid position
/// (6.6.5.2).
fn render_patterns(
    region: &mut Bitmap,
    gray: &[u32],
    grid: &Grid,
    patterns: &PatternDictionary,
    op: CombinationOperator,
) -> Result<()> {
    let mut values = gray.iter();

    for m in 0..grid.height {
        for n in 0..grid.width {
            let Some(&value) = values.next() else {
                bail!(RegionError::InvalidDimension);
            };

            let pattern = patterns
                .patterns
                .get(value as usize)
                .ok_or(RegionError::GrayScaleOutOfRange)?;

            let (x, y) = grid.position(m, n);
            blit(pattern, region, x, y, op);
        }
    }

    Ok(())
}

/// The halftone region segment data header (7.4.5.1).
#[derive(Debug, Clone)]
struct HalftoneRegionHeader {
    info: RegionSegmentInfo,
    mmr: bool,
    template: GenericTemplate,
    enable_skip: bool,
    combination_operator: CombinationOperator,
    default_pixel: bool,
    grid: Grid,
}

impl HalftoneRegionHeader {
    fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let info = RegionSegmentInfo::parse(reader)?;
        let flags = reader.read_byte()?;

        let combination_operator = CombinationOperator::from_value((flags >> 4) & 0x07)?;

        let grid = Grid {
            width: reader.read_u32()?,
            height: reader.read_u32()?,
            x: reader.read_i32()?,
            y: reader.read_i32()?,
            vector_x: reader.read_u16()?,
            vector_y: reader.read_u16()?,
        };

        Ok(Self {
            info,
            mmr: flags & 0x01 != 0,
            template: GenericTemplate::from_value(flags >> 1),
            enable_skip: flags & 0x08 != 0,
            combination_operator,
            default_pixel: flags & 0x80 != 0,
            grid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    fn dictionary() -> PatternDictionary {
        // Pattern `i` of 2 × 2 has its first `i` pixels set in row-major order.
        let patterns = (0..4)
            .map(|i| {
                let mut pattern = Bitmap::new(2, 2);
                for p in 0..i {
                    pattern.set_pixel(p % 2, p / 2, true);
                }
                pattern
            })
            .collect();

        PatternDictionary {
            patterns,
            width: 2,
            height: 2,
        }
    }

    fn axis_grid(width: u32, height: u32) -> Grid {
        // Cells 2 pixels apart along both axes.
        Grid {
            width,
            height,
            x: 0,
            y: 0,
            vector_x: 2 << 8,
            vector_y: 0,
        }
    }

    #[test]
    fn grid_positions() {
        let grid = axis_grid(2, 2);
        assert_eq!(grid.position(0, 1), (2, 0));
        assert_eq!(grid.position(1, 0), (0, 2));

        // A rotated grid, with a negative origin that rounds down.
        let rotated = Grid {
            width: 2,
            height: 2,
            x: -0x80,
            y: 0x300,
            vector_x: 0x100,
            vector_y: 0x200,
        };
        assert_eq!(rotated.position(0, 0), (-1, 3));
        assert_eq!(rotated.position(0, 1), (0, 1));
        assert_eq!(rotated.position(1, 1), (2, 2));
    }

    #[test]
    fn patterns_are_placed_on_grid() {
        let mut region = Bitmap::new(4, 4);
        render_patterns(
            &mut region,
            &[3, 0, 1, 2],
            &axis_grid(2, 2),
            &dictionary(),
            CombinationOperator::Or,
        )
        .unwrap();

        let black: Vec<(u32, u32)> = (0..4)
            .flat_map(|y| (0..4).map(move |x| (x, y)))
            .filter(|&(x, y)| region.get_pixel(x, y))
            .collect();
        assert_eq!(black, [(0, 0), (1, 0), (0, 1), (0, 2), (2, 2), (3, 2)]);
    }

    #[test]
    fn gray_value_must_name_a_pattern() {
        let mut region = Bitmap::new(4, 4);
        let result = render_patterns(
            &mut region,
            &[0, 4, 0, 0],
            &axis_grid(2, 2),
            &dictionary(),
            CombinationOperator::Or,
        );

        assert_eq!(
            result.err(),
            Some(crate::error::DecodeError::Region(
                RegionError::GrayScaleOutOfRange
            ))
        );
    }

    #[test]
    fn cells_outside_region_are_skipped() {
        let grid = Grid {
            x: -3 << 8,
            ..axis_grid(4, 1)
        };
        let skip = skip_mask(&grid, &dictionary(), &Bitmap::new(4, 4));

        // Cells start at x = -3, -1, 1 and 3.
        let skipped: Vec<bool> = (0..4).map(|n| skip.get_pixel(n, 0)).collect();
        assert_eq!(skipped, vec![true, false, false, false]);
    }
}
