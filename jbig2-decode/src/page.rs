//! Page composition (8.2).

use log::{debug, trace, warn};

use crate::Image;
use crate::bitmap::Bitmap;
use crate::compose::{CombinationOperator, blit};
use crate::decode::RegionBitmap;
use crate::document::Document;
use crate::error::{DecodeError, FormatError, Result, bail};
use crate::page_info::{PageInformation, UNKNOWN_HEIGHT};
use crate::reader::Reader;
use crate::segment::{Segment, SegmentType};

/// Compose a page from its segments, given as positions in the document in
/// segment number order.
pub(crate) fn compose(document: &mut Document<'_>, segments: &[usize]) -> Result<Image> {
    let info = segments
        .iter()
        .map(|&position| document.segment(position))
        .find(|segment| segment.header.segment_type == SegmentType::PageInformation)
        .ok_or(FormatError::MissingPageInfo)?;
    let info = PageInformation::parse(&mut Reader::new(info.data))?;

    debug!(
        "page information: {}x{}, striped: {} (max stripe size {})",
        info.width, info.height, info.striped, info.max_stripe_size
    );

    if info.height == UNKNOWN_HEIGHT && !info.striped {
        warn!("page of unknown height is not marked as striped");
    }

    let height = if info.height == UNKNOWN_HEIGHT {
        stripe_height(segments.iter().map(|&position| document.segment(position)))?
            .ok_or(FormatError::UnknownPageHeight)?
    } else {
        info.height
    };

    document.settings().check_area(info.width, height)?;

    let region_count = segments
        .iter()
        .filter(|&&position| {
            document
                .segment(position)
                .header
                .segment_type
                .is_immediate_region()
        })
        .count();

    let mut page = Page::new(info, height);

    for &position in segments {
        let header = &document.segment(position).header;
        let (number, segment_type) = (header.segment_number, header.segment_type);

        if segment_type.is_immediate_region() {
            document.resolve(number, Some(&page.bitmap))?;
            let region = document.decode_region(document.segment(position), Some(&page.bitmap))?;
            page.draw(region, region_count == 1);
            continue;
        }

        match segment_type {
            // Intermediate regions are decoded in page order, since they may
            // refine the page as it is at this point.
            _ if segment_type.region_kind().is_some() => {
                document.resolve(number, Some(&page.bitmap))?;
            }
            SegmentType::Extension => check_extension(document.segment(position))?,
            SegmentType::EndOfStripe => {
                let row = Reader::new(document.segment(position).data).read_u32()?;
                trace!("end of stripe at row {row}");
            }
            SegmentType::EndOfPage => break,
            // Dictionaries and tables are decoded once a region refers to
            // them.
            _ => debug!("skipping {segment_type:?} segment {number}"),
        }
    }

    Ok(page.into_image())
}

/// The height of a page with unknown height: one more than the last row of
/// its last stripe (7.4.8.2).
fn stripe_height<'s, 'a: 's>(
    segments: impl Iterator<Item = &'s Segment<'a>>,
) -> Result<Option<u32>> {
    let mut height = None;

    for segment in segments {
        if segment.header.segment_type != SegmentType::EndOfStripe {
            continue;
        }

        let end = Reader::new(segment.data)
            .read_u32()?
            .checked_add(1)
            .ok_or(DecodeError::Overflow)?;

        height = Some(height.map_or(end, |height: u32| height.max(end)));
    }

    Ok(height)
}

/// Extension segments (7.4.14) are skipped, unless they are flagged as
/// necessary for decoding.
fn check_extension(segment: &Segment<'_>) -> Result<()> {
    let extension_type = Reader::new(segment.data).read_u32()?;

    if extension_type & 0x8000_0000 != 0 {
        warn!("unsupported necessary extension {extension_type:#010x}");
        bail!(DecodeError::Unsupported);
    }

    warn!(
        "ignoring extension segment {} of type {extension_type:#010x}",
        segment.header.segment_number
    );

    Ok(())
}

struct Page {
    info: PageInformation,
    bitmap: Bitmap,
}

impl Page {
    fn new(info: PageInformation, height: u32) -> Self {
        let bitmap = Bitmap::filled(info.width, height, info.default_pixel);
        Self { info, bitmap }
    }

    /// Draw an immediate region onto the page.
    ///
    /// If it is the only region of the page, covers the page exactly and
    /// drawing it onto the blank page would not change any of its pixels,
    /// the region bitmap becomes the page bitmap.
    fn draw(&mut self, region: RegionBitmap, sole: bool) {
        let info = region.info;
        let op = self.info.combination_operator(info.combination_operator);

        let identity = match op {
            CombinationOperator::Replace => true,
            CombinationOperator::Or | CombinationOperator::Xor => !self.info.default_pixel,
            CombinationOperator::And | CombinationOperator::Xnor => self.info.default_pixel,
        };

        if sole
            && identity
            && info.x == 0
            && info.y == 0
            && region.bitmap.width() == self.bitmap.width()
            && region.bitmap.height() == self.bitmap.height()
        {
            trace!("adopting region bitmap as page bitmap");
            self.bitmap = region.bitmap;
        } else {
            blit(
                &region.bitmap,
                &mut self.bitmap,
                info.x as i64,
                info.y as i64,
                op,
            );
        }
    }

    fn into_image(self) -> Image {
        Image {
            x_resolution: self.info.x_resolution,
            y_resolution: self.info.y_resolution,
            bitmap: self.bitmap,
        }
    }
}
