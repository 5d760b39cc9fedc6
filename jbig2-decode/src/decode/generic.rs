//! Generic region decoding (6.2, 7.4.6).
//!
//! Every pixel is decoded with a context formed from already decoded
//! neighbours. Which neighbours are used depends on the template (Figures 3
//! to 6), four of them being adaptive (AT) pixels that a segment may move.
//!
//! While all AT pixels sit at their nominal positions, the context of a pixel
//! is derived from the context of its left neighbour by shifting every row of
//! the template one step and pulling in the single new pixel on the right of
//! each row. Otherwise every neighbour is fetched individually.

use alloc::vec::Vec;

use super::{AtPixel, RegionBitmap, RegionSegmentInfo, parse_at_pixels};
use crate::DecodeSettings;
use crate::arithmetic_decoder::{ArithmeticDecoder, Context, contexts};
use crate::bitmap::Bitmap;
use crate::error::{ParseError, RegionError, Result, TemplateError, bail};
use crate::reader::Reader;

/// A neighbour that contributes one bit to a context.
#[derive(Debug, Clone, Copy)]
enum Tap {
    Fixed(i8, i8),
    /// The AT pixel with the given index.
    At(u8),
}

use Tap::{At, Fixed};

/// The taps of each template, most significant context bit first.
const TAPS_0: [Tap; 16] = [
    At(3),
    Fixed(-1, -2),
    Fixed(0, -2),
    Fixed(1, -2),
    At(2),
    At(1),
    Fixed(-2, -1),
    Fixed(-1, -1),
    Fixed(0, -1),
    Fixed(1, -1),
    Fixed(2, -1),
    At(0),
    Fixed(-4, 0),
    Fixed(-3, 0),
    Fixed(-2, 0),
    Fixed(-1, 0),
];

/// Template 0 with EXTTEMPLATE set. The eight fixed pixels of the two rows
/// above become the AT pixels A5 to A12, the current row stays fixed.
const TAPS_0_EXTENDED: [Tap; 16] = [
    At(3),
    At(4),
    At(5),
    At(6),
    At(2),
    At(1),
    At(7),
    At(8),
    At(9),
    At(10),
    At(11),
    At(0),
    Fixed(-4, 0),
    Fixed(-3, 0),
    Fixed(-2, 0),
    Fixed(-1, 0),
];

const TAPS_1: [Tap; 13] = [
    Fixed(-1, -2),
    Fixed(0, -2),
    Fixed(1, -2),
    Fixed(2, -2),
    Fixed(-2, -1),
    Fixed(-1, -1),
    Fixed(0, -1),
    Fixed(1, -1),
    Fixed(2, -1),
    At(0),
    Fixed(-3, 0),
    Fixed(-2, 0),
    Fixed(-1, 0),
];

const TAPS_2: [Tap; 10] = [
    Fixed(-1, -2),
    Fixed(0, -2),
    Fixed(1, -2),
    Fixed(-2, -1),
    Fixed(-1, -1),
    Fixed(0, -1),
    Fixed(1, -1),
    At(0),
    Fixed(-2, 0),
    Fixed(-1, 0),
];

const TAPS_3: [Tap; 10] = [
    Fixed(-3, -1),
    Fixed(-2, -1),
    Fixed(-1, -1),
    Fixed(0, -1),
    Fixed(1, -1),
    At(0),
    Fixed(-4, 0),
    Fixed(-3, 0),
    Fixed(-2, 0),
    Fixed(-1, 0),
];

/// One template row as seen by the sliding window: the row offset, the
/// offset of its rightmost pixel and the context bit that pixel lands in.
#[derive(Debug, Clone, Copy)]
struct Window {
    dy: i8,
    right: i8,
    lsb: u8,
}

const fn window(dy: i8, right: i8, lsb: u8) -> Window {
    Window { dy, right, lsb }
}

const WINDOWS_0: [Window; 3] = [window(-2, 2, 11), window(-1, 3, 4), window(0, -1, 0)];
const WINDOWS_1: [Window; 3] = [window(-2, 2, 9), window(-1, 3, 3), window(0, -1, 0)];
const WINDOWS_2: [Window; 3] = [window(-2, 1, 7), window(-1, 2, 2), window(0, -1, 0)];
const WINDOWS_3: [Window; 2] = [window(-1, 2, 4), window(0, -1, 0)];

const NOMINAL_AT_0: [AtPixel; 4] = [
    AtPixel::new(3, -1),
    AtPixel::new(-3, -1),
    AtPixel::new(2, -2),
    AtPixel::new(-2, -2),
];
/// With these positions the extended template forms the same contexts as
/// template 0.
const NOMINAL_AT_0_EXTENDED: [AtPixel; 12] = [
    AtPixel::new(3, -1),
    AtPixel::new(-3, -1),
    AtPixel::new(2, -2),
    AtPixel::new(-2, -2),
    AtPixel::new(-1, -2),
    AtPixel::new(0, -2),
    AtPixel::new(1, -2),
    AtPixel::new(-2, -1),
    AtPixel::new(-1, -1),
    AtPixel::new(0, -1),
    AtPixel::new(1, -1),
    AtPixel::new(2, -1),
];
const NOMINAL_AT_1: [AtPixel; 1] = [AtPixel::new(3, -1)];
const NOMINAL_AT_2: [AtPixel; 1] = [AtPixel::new(2, -1)];

/// The generic region templates (6.2.5.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GenericTemplate {
    Template0,
    /// Template 0 with twelve AT pixels (EXTTEMPLATE).
    Template0Extended,
    Template1,
    Template2,
    Template3,
}

impl GenericTemplate {
    pub(crate) fn from_value(value: u8) -> Self {
        match value & 0x03 {
            0 => Self::Template0,
            1 => Self::Template1,
            2 => Self::Template2,
            _ => Self::Template3,
        }
    }

    /// The number of AT pixels stored in a segment header.
    pub(crate) fn at_count(self) -> usize {
        match self {
            Self::Template0 => 4,
            Self::Template0Extended => 12,
            _ => 1,
        }
    }

    /// The AT pixel positions of Figures 3 to 6.
    pub(crate) fn nominal_at(self) -> &'static [AtPixel] {
        match self {
            Self::Template0 => &NOMINAL_AT_0,
            Self::Template0Extended => &NOMINAL_AT_0_EXTENDED,
            Self::Template1 => &NOMINAL_AT_1,
            Self::Template2 | Self::Template3 => &NOMINAL_AT_2,
        }
    }

    /// The number of contexts the template can address.
    pub(crate) fn context_count(self) -> usize {
        1 << self.taps().len()
    }

    fn taps(self) -> &'static [Tap] {
        match self {
            Self::Template0 => &TAPS_0,
            Self::Template0Extended => &TAPS_0_EXTENDED,
            Self::Template1 => &TAPS_1,
            Self::Template2 => &TAPS_2,
            Self::Template3 => &TAPS_3,
        }
    }

    fn windows(self) -> &'static [Window] {
        match self {
            Self::Template0 | Self::Template0Extended => &WINDOWS_0,
            Self::Template1 => &WINDOWS_1,
            Self::Template2 => &WINDOWS_2,
            Self::Template3 => &WINDOWS_3,
        }
    }

    /// The context used for the SLTP bit of typical prediction (6.2.5.7).
    fn sltp_context(self) -> usize {
        match self {
            Self::Template0 | Self::Template0Extended => 0x9B25,
            Self::Template1 => 0x0795,
            Self::Template2 => 0x00E5,
            Self::Template3 => 0x0195,
        }
    }
}

/// The context of pixel `(x, y)`, with every tap fetched individually.
fn gather(bitmap: &Bitmap, taps: &[Tap], at: &[AtPixel], x: i32, y: i32) -> u32 {
    taps.iter().fold(0, |ctx, tap| {
        let (dx, dy) = match *tap {
            Fixed(dx, dy) => (dx as i32, dy as i32),
            At(i) => (at[i as usize].x, at[i as usize].y),
        };

        (ctx << 1) | bitmap.pixel(x + dx, y + dy)
    })
}

/// The bits of a sliding context that survive moving one pixel to the right.
fn keep_mask(template: GenericTemplate) -> u32 {
    let all = (1_u32 << template.taps().len()) - 1;
    template
        .windows()
        .iter()
        .fold(all, |mask, w| mask & !(1 << w.lsb))
}

/// The context of pixel `(x, y)`, given the context `ctx` of `(x - 1, y)`.
/// Only valid with nominal AT pixels.
#[inline(always)]
fn slide(bitmap: &Bitmap, windows: &[Window], mask: u32, ctx: u32, x: i32, y: i32) -> u32 {
    windows.iter().fold((ctx << 1) & mask, |ctx, w| {
        ctx | (bitmap.pixel(x + w.right as i32, y + w.dy as i32) << w.lsb)
    })
}

/// The parameters of one invocation of the generic region decoding
/// procedure with arithmetic coding.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GenericParams<'a> {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) template: GenericTemplate,
    pub(crate) tpgdon: bool,
    pub(crate) at: &'a [AtPixel],
    /// Pixels set in this bitmap are not coded and stay white (USESKIP).
    pub(crate) skip: Option<&'a Bitmap>,
}

/// Decode a bitmap with arithmetic coding (6.2.5).
///
/// `contexts` must hold `template.context_count()` entries. They are shared
/// with whatever else the caller decodes with the same statistics.
pub(crate) fn decode_arithmetic(
    decoder: &mut ArithmeticDecoder<'_>,
    contexts: &mut [Context],
    params: &GenericParams<'_>,
) -> Result<Bitmap> {
    let nominal = params
        .at
        .get(..params.template.at_count())
        .is_some_and(|at| at == params.template.nominal_at());

    decode_with(decoder, contexts, params, nominal)
}

fn decode_with(
    decoder: &mut ArithmeticDecoder<'_>,
    contexts: &mut [Context],
    params: &GenericParams<'_>,
    sliding: bool,
) -> Result<Bitmap> {
    let template = params.template;

    if params.at.len() < template.at_count() {
        bail!(TemplateError::Invalid);
    }
    if contexts.len() < template.context_count() {
        bail!(TemplateError::Invalid);
    }

    let taps = template.taps();
    let mask = keep_mask(template);

    let mut bitmap = Bitmap::new(params.width, params.height);
    let mut ltp = false;

    for y in 0..params.height {
        // "If TPGDON is 1, then decode a bit using the arithmetic entropy
        // coder, where the context is SLTP. Let LTP = LTP XOR SLTP." (6.2.5.7)
        if params.tpgdon {
            ltp ^= decoder.decode(&mut contexts[template.sltp_context()]) == 1;

            if ltp {
                // The row above the first one is white.
                if y > 0 {
                    bitmap.copy_row(y - 1, y);
                }
                continue;
            }
        }

        if sliding {
            decode_row_sliding(decoder, contexts, &mut bitmap, params, y, mask);
            continue;
        }

        for x in 0..params.width {
            if params.skip.is_some_and(|skip| skip.get_pixel(x, y)) {
                continue;
            }

            let ctx = gather(&bitmap, taps, params.at, x as i32, y as i32);
            if decoder.decode(&mut contexts[ctx as usize]) == 1 {
                bitmap.set_pixel(x, y, true);
            }
        }
    }

    Ok(bitmap)
}

/// Decode row `y` while all AT pixels are nominal. The pixels of the current
/// row are kept in a byte until it is full and then stored at once.
fn decode_row_sliding(
    decoder: &mut ArithmeticDecoder<'_>,
    contexts: &mut [Context],
    bitmap: &mut Bitmap,
    params: &GenericParams<'_>,
    y: u32,
    mask: u32,
) {
    let template = params.template;
    let yi = y as i32;
    // The last window is always the current row, ending left of the pixel.
    let above = &template.windows()[..template.windows().len() - 1];

    let mut ctx = gather(bitmap, template.taps(), params.at, 0, yi);
    let mut previous = 0_u32;

    for start in (0..params.width).step_by(8) {
        let mut byte = 0_u8;

        for x in start..(start + 8).min(params.width) {
            if x > 0 {
                ctx = slide(bitmap, above, mask, ctx, x as i32, yi) | previous;
            }

            previous = if params.skip.is_some_and(|skip| skip.get_pixel(x, y)) {
                0
            } else {
                decoder.decode(&mut contexts[ctx as usize])
            };
            byte |= (previous as u8) << (7 - (x - start));
        }

        bitmap.row_mut(y)[(start / 8) as usize] = byte;
    }
}

/// Turns the changing elements reported by the MMR decoder into black spans.
struct SpanSink<'a> {
    bitmap: &'a mut Bitmap,
    y: u32,
}

impl jbig2_mmr::Decoder for SpanSink<'_> {
    fn push_row(&mut self, changes: &[u32]) {
        let width = self.bitmap.width();

        // Rows start white, so changes come in (black start, black end)
        // pairs. A missing end means black up to the right edge.
        for span in changes.chunks(2) {
            let end = span.get(1).copied().unwrap_or(width);
            self.bitmap.fill_span(self.y, span[0], end);
        }

        self.y += 1;
    }
}

/// Decode an MMR coded bitmap (6.2.6), returning it together with the
/// number of bytes consumed.
pub(crate) fn decode_mmr(data: &[u8], width: u32, height: u32) -> Result<(Bitmap, usize)> {
    let mut bitmap = Bitmap::new(width, height);
    let settings = jbig2_mmr::DecodeSettings {
        columns: width,
        rows: height,
    };

    let consumed = jbig2_mmr::decode(
        data,
        &mut SpanSink {
            bitmap: &mut bitmap,
            y: 0,
        },
        &settings,
    )?;

    Ok((bitmap, consumed))
}

/// The generic region segment data header (7.4.6.1).
#[derive(Debug, Clone)]
struct GenericRegionHeader {
    info: RegionSegmentInfo,
    mmr: bool,
    template: GenericTemplate,
    tpgdon: bool,
    at: Vec<AtPixel>,
}

impl GenericRegionHeader {
    fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let info = RegionSegmentInfo::parse(reader)?;
        let flags = reader.read_byte()?;

        let mmr = flags & 0x01 != 0;
        let mut template = GenericTemplate::from_value(flags >> 1);
        let tpgdon = flags & 0x08 != 0;

        if template == GenericTemplate::Template0 && flags & 0x10 != 0 {
            template = GenericTemplate::Template0Extended;
        }

        let at = if mmr {
            Vec::new()
        } else {
            parse_at_pixels(reader, template.at_count(), true)?
        };

        Ok(Self {
            info,
            mmr,
            template,
            tpgdon,
            at,
        })
    }
}

/// Decode the data of a generic region segment.
///
/// For an immediate region of unknown length, `data` ends with the 4-byte
/// row count that replaces the height of the region information field.
pub(crate) fn decode_region(
    data: &[u8],
    unknown_length: bool,
    settings: &DecodeSettings,
) -> Result<RegionBitmap> {
    let mut reader = Reader::new(data);
    let header = GenericRegionHeader::parse(&mut reader)?;
    let mut info = header.info;
    let mut encoded = reader.tail();

    if unknown_length {
        let split = encoded
            .len()
            .checked_sub(4)
            .ok_or(ParseError::UnexpectedEof)?;
        let (head, tail) = encoded.split_at(split);
        let rows = u32::from_be_bytes([tail[0], tail[1], tail[2], tail[3]]);

        if rows > info.height {
            bail!(RegionError::InvalidDimension);
        }

        info.height = rows;
        encoded = head;
    }

    settings.check_area(info.width, info.height)?;

    let bitmap = if header.mmr {
        decode_mmr(encoded, info.width, info.height)?.0
    } else {
        let mut decoder = ArithmeticDecoder::new(encoded);
        let mut contexts = contexts(header.template.context_count());

        decode_arithmetic(
            &mut decoder,
            &mut contexts,
            &GenericParams {
                width: info.width,
                height: info.height,
                template: header.template,
                tpgdon: header.tpgdon,
                at: &header.at,
                skip: None,
            },
        )?
    };

    Ok(RegionBitmap { bitmap, info })
}
