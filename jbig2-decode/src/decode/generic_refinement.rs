//! Generic refinement region decoding (6.3, 7.4.7).

use alloc::borrow::Cow;
use alloc::vec::Vec;

use super::{AtPixel, RegionBitmap, RegionSegmentInfo, parse_at_pixels};
use crate::DecodeSettings;
use crate::arithmetic_decoder::{ArithmeticDecoder, Context, contexts};
use crate::bitmap::Bitmap;
use crate::compose::extract;
use crate::error::{RegionError, Result, TemplateError, bail};
use crate::reader::Reader;

/// The generic refinement templates (6.3.5.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefinementTemplate {
    Template0,
    Template1,
}

impl RefinementTemplate {
    pub(crate) fn from_value(value: u8) -> Self {
        if value & 0x01 == 0 {
            Self::Template0
        } else {
            Self::Template1
        }
    }

    /// The number of AT pixels stored in a segment header.
    pub(crate) fn at_count(self) -> usize {
        match self {
            Self::Template0 => 2,
            Self::Template1 => 0,
        }
    }

    pub(crate) fn context_count(self) -> usize {
        match self {
            Self::Template0 => 1 << 13,
            Self::Template1 => 1 << 10,
        }
    }

    /// Figures 14 and 15.
    fn sltp_context(self) -> usize {
        match self {
            Self::Template0 => 0x0010,
            Self::Template1 => 0x0008,
        }
    }
}

/// The parameters of one invocation of the generic refinement region
/// decoding procedure.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RefinementParams<'a> {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) template: RefinementTemplate,
    pub(crate) reference: &'a Bitmap,
    /// The offset of the reference bitmap relative to the bitmap being
    /// decoded (GRREFERENCEDX, GRREFERENCEDY).
    pub(crate) dx: i32,
    pub(crate) dy: i32,
    pub(crate) tpgron: bool,
    pub(crate) at: &'a [AtPixel],
}

/// Template 0 context (Figure 12). `at` holds the AT pixel of the region
/// followed by that of the reference.
fn context_0(
    region: &Bitmap,
    reference: &Bitmap,
    at: &[AtPixel],
    (x, y): (i32, i32),
    (rx, ry): (i32, i32),
) -> u32 {
    let mut ctx = 0;

    ctx = (ctx << 1) | region.pixel(x + at[0].x, y + at[0].y);
    ctx = (ctx << 1) | region.pixel(x, y - 1);
    ctx = (ctx << 1) | region.pixel(x + 1, y - 1);
    ctx = (ctx << 1) | region.pixel(x - 1, y);

    ctx = (ctx << 1) | reference.pixel(rx + at[1].x, ry + at[1].y);
    for (dx, dy) in [(0, -1), (1, -1), (-1, 0), (0, 0), (1, 0), (-1, 1), (0, 1), (1, 1)] {
        ctx = (ctx << 1) | reference.pixel(rx + dx, ry + dy);
    }

    ctx
}

/// Template 1 context (Figure 13).
fn context_1(region: &Bitmap, reference: &Bitmap, (x, y): (i32, i32), (rx, ry): (i32, i32)) -> u32 {
    let mut ctx = 0;

    for (dx, dy) in [(-1, -1), (0, -1), (1, -1), (-1, 0)] {
        ctx = (ctx << 1) | region.pixel(x + dx, y + dy);
    }
    for (dx, dy) in [(0, -1), (-1, 0), (0, 0), (1, 0), (0, 1), (1, 1)] {
        ctx = (ctx << 1) | reference.pixel(rx + dx, ry + dy);
    }

    ctx
}

/// The common value of the 3 × 3 reference pixels around `(rx, ry)`, if
/// they are all equal (TPGRVAL).
fn typical_value(reference: &Bitmap, rx: i32, ry: i32) -> Option<bool> {
    let center = reference.pixel(rx, ry);

    for dy in -1..=1 {
        for dx in -1..=1 {
            if reference.pixel(rx + dx, ry + dy) != center {
                return None;
            }
        }
    }

    Some(center == 1)
}

/// Decode a refinement bitmap (6.3.5.6).
pub(crate) fn decode_bitmap(
    decoder: &mut ArithmeticDecoder<'_>,
    contexts: &mut [Context],
    params: &RefinementParams<'_>,
) -> Result<Bitmap> {
    let template = params.template;

    if params.at.len() < template.at_count() || contexts.len() < template.context_count() {
        bail!(TemplateError::Invalid);
    }

    let reference = params.reference;
    let mut region = Bitmap::new(params.width, params.height);
    let mut ltp = false;

    for y in 0..params.height {
        if params.tpgron {
            ltp ^= decoder.decode(&mut contexts[template.sltp_context()]) == 1;
        }

        let yi = y as i32;
        let ry = yi - params.dy;

        for x in 0..params.width {
            let xi = x as i32;
            let rx = xi - params.dx;

            // With LTP set, pixels whose reference neighbourhood is uniform
            // are predicted instead of coded.
            if ltp {
                if let Some(value) = typical_value(reference, rx, ry) {
                    region.set_pixel(x, y, value);
                    continue;
                }
            }

            let ctx = match template {
                RefinementTemplate::Template0 => {
                    context_0(&region, reference, params.at, (xi, yi), (rx, ry))
                }
                RefinementTemplate::Template1 => context_1(&region, reference, (xi, yi), (rx, ry)),
            };

            if decoder.decode(&mut contexts[ctx as usize]) == 1 {
                region.set_pixel(x, y, true);
            }
        }
    }

    Ok(region)
}

/// What a refinement region segment refines.
pub(crate) enum RefinementReference<'a> {
    /// The bitmap of the referred intermediate region.
    Region(&'a Bitmap),
    /// The page bitmap, of which the area under the region is used.
    Page(&'a Bitmap),
}

/// The generic refinement region segment data header (7.4.7.1).
struct RefinementRegionHeader {
    info: RegionSegmentInfo,
    template: RefinementTemplate,
    tpgron: bool,
    at: Vec<AtPixel>,
}

impl RefinementRegionHeader {
    fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let info = RegionSegmentInfo::parse(reader)?;
        let flags = reader.read_byte()?;
        let template = RefinementTemplate::from_value(flags);
        let tpgron = flags & 0x02 != 0;
        let at = parse_at_pixels(reader, template.at_count(), false)?;

        Ok(Self {
            info,
            template,
            tpgron,
            at,
        })
    }
}

/// Decode the data of a generic refinement region segment (7.4.7.5).
pub(crate) fn decode_region(
    data: &[u8],
    reference: RefinementReference<'_>,
    settings: &DecodeSettings,
) -> Result<RegionBitmap> {
    let mut reader = Reader::new(data);
    let header = RefinementRegionHeader::parse(&mut reader)?;
    let info = header.info;

    settings.check_area(info.width, info.height)?;

    let reference = match reference {
        RefinementReference::Region(bitmap) => {
            if info.width > bitmap.width() || info.height > bitmap.height() {
                bail!(RegionError::InvalidDimension);
            }
            Cow::Borrowed(bitmap)
        }
        RefinementReference::Page(page) => Cow::Owned(extract(
            page,
            info.x as i64,
            info.y as i64,
            info.width,
            info.height,
        )),
    };

    let mut decoder = ArithmeticDecoder::new(reader.tail());
    let mut contexts = contexts(header.template.context_count());

    let bitmap = decode_bitmap(
        &mut decoder,
        &mut contexts,
        &RefinementParams {
            width: info.width,
            height: info.height,
            template: header.template,
            reference: &reference,
            dx: 0,
            dy: 0,
            tpgron: header.tpgron,
            at: &header.at,
        },
    )?;

    Ok(RegionBitmap { bitmap, info })
}
