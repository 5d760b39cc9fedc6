//! Text region segment parsing and decoding (7.4.3, 6.4).

use alloc::vec::Vec;
use core::iter;

use super::generic_refinement::{self, RefinementParams, RefinementTemplate};
use super::{AtPixel, RegionBitmap, RegionSegmentInfo, index_bits, parse_at_pixels, required};
use crate::DecodeSettings;
use crate::arithmetic_decoder::{ArithmeticDecoder, Context, contexts};
use crate::bitmap::Bitmap;
use crate::compose::{CombinationOperator, blit};
use crate::error::{DecodeError, HuffmanError, RegionError, Result, SymbolError, bail};
use crate::huffman_table::{HuffmanTable, StandardTables, TableLine, TableSelector, line};
use crate::integer_decoder::{IntegerDecoder, SymbolIdDecoder};
use crate::reader::Reader;

/// Decode a text region segment (6.4).
pub(crate) fn decode_region(
    data: &[u8],
    symbols: &[&Bitmap],
    standard: &StandardTables,
    custom: &[&HuffmanTable],
    settings: &DecodeSettings,
) -> Result<RegionBitmap> {
    let mut reader = Reader::new(data);
    let header = TextRegionHeader::parse(&mut reader)?;
    let params = header.params();
    let info = header.info;

    settings.check_area(info.width, info.height)?;

    let bitmap = match header.huffman {
        Some(flags) => {
            let mut selector = TableSelector::new(standard, custom);
            let tables = TextHuffmanTables::select(&flags, &mut selector)?;
            let symbol_codes = SymbolCodes::Table(parse_symbol_id_table(
                &mut reader,
                symbols.len() as u32,
            )?);

            let mut coding = TextCoding::Huffman {
                reader: &mut reader,
                tables,
                symbol_codes,
            };
            decode_text_region(&mut coding, symbols, &params, settings)?
        }
        None => {
            let mut decoder = ArithmeticDecoder::new(reader.tail());
            let mut integers = TextIntegerDecoders::new(index_bits(symbols.len() as u32));
            let mut refinement_contexts = contexts(params.refinement_template.context_count());

            let mut coding = TextCoding::Arithmetic {
                decoder: &mut decoder,
                integers: &mut integers,
                refinement_contexts: &mut refinement_contexts,
            };
            decode_text_region(&mut coding, symbols, &params, settings)?
        }
    };

    Ok(RegionBitmap { bitmap, info })
}

/// The corner of a symbol instance that its coordinates refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReferenceCorner {
    BottomLeft,
    TopLeft,
    BottomRight,
    TopRight,
}

impl ReferenceCorner {
    fn from_value(value: u8) -> Self {
        match value & 0x03 {
            0 => Self::BottomLeft,
            1 => Self::TopLeft,
            2 => Self::BottomRight,
            _ => Self::TopRight,
        }
    }

    fn is_left(self) -> bool {
        matches!(self, Self::TopLeft | Self::BottomLeft)
    }

    fn is_top(self) -> bool {
        matches!(self, Self::TopLeft | Self::TopRight)
    }
}

/// The parameters of the text region decoding procedure (Table 9) that are
/// not tied to the entropy coding.
#[derive(Debug, Clone)]
pub(crate) struct TextRegionParams<'a> {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) num_instances: u32,
    pub(crate) log_strips: u8,
    pub(crate) corner: ReferenceCorner,
    pub(crate) transposed: bool,
    pub(crate) combination_operator: CombinationOperator,
    pub(crate) default_pixel: bool,
    pub(crate) ds_offset: i32,
    pub(crate) refine: bool,
    pub(crate) refinement_template: RefinementTemplate,
    pub(crate) refinement_at: &'a [AtPixel],
}

/// The integer decoders of the text region decoding procedure.
///
/// A symbol dictionary that decodes aggregated symbols keeps one instance
/// of this for all of its embedded text regions.
pub(crate) struct TextIntegerDecoders {
    pub(crate) iadt: IntegerDecoder,
    pub(crate) iafs: IntegerDecoder,
    pub(crate) iads: IntegerDecoder,
    pub(crate) iait: IntegerDecoder,
    pub(crate) iari: IntegerDecoder,
    pub(crate) iardw: IntegerDecoder,
    pub(crate) iardh: IntegerDecoder,
    pub(crate) iardx: IntegerDecoder,
    pub(crate) iardy: IntegerDecoder,
    pub(crate) iaid: SymbolIdDecoder,
}

impl TextIntegerDecoders {
    pub(crate) fn new(symbol_code_len: u8) -> Self {
        Self {
            iadt: IntegerDecoder::new(),
            iafs: IntegerDecoder::new(),
            iads: IntegerDecoder::new(),
            iait: IntegerDecoder::new(),
            iari: IntegerDecoder::new(),
            iardw: IntegerDecoder::new(),
            iardh: IntegerDecoder::new(),
            iardx: IntegerDecoder::new(),
            iardy: IntegerDecoder::new(),
            iaid: SymbolIdDecoder::new(symbol_code_len),
        }
    }
}

/// The Huffman tables of a text region (7.4.3.1.6).
#[derive(Clone, Copy)]
pub(crate) struct TextHuffmanTables<'a> {
    pub(crate) first_s: &'a HuffmanTable,
    pub(crate) delta_s: &'a HuffmanTable,
    pub(crate) delta_t: &'a HuffmanTable,
    pub(crate) refinement_width: &'a HuffmanTable,
    pub(crate) refinement_height: &'a HuffmanTable,
    pub(crate) refinement_y: &'a HuffmanTable,
    pub(crate) refinement_x: &'a HuffmanTable,
    pub(crate) refinement_size: &'a HuffmanTable,
}

impl<'a> TextHuffmanTables<'a> {
    fn select(flags: &TextHuffmanFlags, selector: &mut TableSelector<'a>) -> Result<Self> {
        // Custom tables are assigned in exactly this order.
        Ok(Self {
            first_s: selector.select(flags.first_s, &[6, 7], 3)?,
            delta_s: selector.select(flags.delta_s, &[8, 9, 10], 3)?,
            delta_t: selector.select(flags.delta_t, &[11, 12, 13], 3)?,
            refinement_width: selector.select(flags.refinement_width, &[14, 15], 3)?,
            refinement_height: selector.select(flags.refinement_height, &[14, 15], 3)?,
            refinement_y: selector.select(flags.refinement_y, &[14, 15], 3)?,
            refinement_x: selector.select(flags.refinement_x, &[14, 15], 3)?,
            refinement_size: selector.select(flags.refinement_size, &[1], 1)?,
        })
    }

    /// The tables used for aggregated symbols in a symbol dictionary
    /// (Table 17).
    pub(crate) fn aggregation(standard: &'a StandardTables) -> Self {
        Self {
            first_s: standard.get(6),
            delta_s: standard.get(8),
            delta_t: standard.get(11),
            refinement_width: standard.get(15),
            refinement_height: standard.get(15),
            refinement_y: standard.get(15),
            refinement_x: standard.get(15),
            refinement_size: standard.get(1),
        }
    }
}

/// How symbol IDs are coded when Huffman coding is used.
pub(crate) enum SymbolCodes {
    /// The symbol ID Huffman table of a text region segment (7.4.3.1.7).
    Table(HuffmanTable),
    /// IDs are stored as plain numbers of the given number of bits.
    Fixed(u8),
}

/// The entropy coding state of a text region.
pub(crate) enum TextCoding<'c, 'd> {
    Huffman {
        reader: &'c mut Reader<'d>,
        tables: TextHuffmanTables<'c>,
        symbol_codes: SymbolCodes,
    },
    Arithmetic {
        decoder: &'c mut ArithmeticDecoder<'d>,
        integers: &'c mut TextIntegerDecoders,
        refinement_contexts: &'c mut [Context],
    },
}

impl TextCoding<'_, '_> {
    /// Decode a strip delta T, already multiplied by SBSTRIPS (6.4.6).
    fn strip_delta_t(&mut self, strips: i32) -> Result<i32> {
        let value = match self {
            Self::Huffman { reader, tables, .. } => tables.delta_t.decode_value(reader)?,
            Self::Arithmetic {
                decoder, integers, ..
            } => required(integers.iadt.decode(decoder)?)?,
        };

        value.checked_mul(strips).ok_or(DecodeError::Overflow)
    }

    /// 6.4.7.
    fn first_s(&mut self) -> Result<i32> {
        match self {
            Self::Huffman { reader, tables, .. } => tables.first_s.decode_value(reader),
            Self::Arithmetic {
                decoder, integers, ..
            } => required(integers.iafs.decode(decoder)?),
        }
    }

    /// 6.4.8. OOB ends the strip.
    fn delta_s(&mut self) -> Result<Option<i32>> {
        match self {
            Self::Huffman { reader, tables, .. } => tables.delta_s.decode(reader),
            Self::Arithmetic {
                decoder, integers, ..
            } => integers.iads.decode(decoder),
        }
    }

    /// 6.4.9.
    fn instance_t(&mut self, log_strips: u8) -> Result<i32> {
        if log_strips == 0 {
            return Ok(0);
        }

        match self {
            Self::Huffman { reader, .. } => Ok(reader.read_bits(log_strips)? as i32),
            Self::Arithmetic {
                decoder, integers, ..
            } => required(integers.iait.decode(decoder)?),
        }
    }

    /// 6.4.10.
    fn symbol_id(&mut self) -> Result<usize> {
        match self {
            Self::Huffman {
                reader,
                symbol_codes,
                ..
            } => match symbol_codes {
                SymbolCodes::Table(table) => Ok(table.decode_value(reader)? as usize),
                SymbolCodes::Fixed(bits) => Ok(reader.read_bits(*bits)? as usize),
            },
            Self::Arithmetic {
                decoder, integers, ..
            } => Ok(integers.iaid.decode(decoder) as usize),
        }
    }

    /// The refinement indicator R_I (6.4.11).
    fn is_refined(&mut self) -> Result<bool> {
        match self {
            Self::Huffman { reader, .. } => Ok(reader.read_bit()? == 1),
            Self::Arithmetic {
                decoder, integers, ..
            } => Ok(required(integers.iari.decode(decoder)?)? != 0),
        }
    }

    /// RDW, RDH, RDX and RDY (6.4.11.1 to 6.4.11.4).
    fn refinement_deltas(&mut self) -> Result<[i32; 4]> {
        match self {
            Self::Huffman { reader, tables, .. } => Ok([
                tables.refinement_width.decode_value(reader)?,
                tables.refinement_height.decode_value(reader)?,
                tables.refinement_x.decode_value(reader)?,
                tables.refinement_y.decode_value(reader)?,
            ]),
            Self::Arithmetic {
                decoder, integers, ..
            } => Ok([
                required(integers.iardw.decode(decoder)?)?,
                required(integers.iardh.decode(decoder)?)?,
                required(integers.iardx.decode(decoder)?)?,
                required(integers.iardy.decode(decoder)?)?,
            ]),
        }
    }

    /// Decode a refined symbol bitmap.
    fn refine(&mut self, params: &RefinementParams<'_>) -> Result<Bitmap> {
        match self {
            Self::Huffman { reader, tables, .. } => {
                // With Huffman coding, each refinement is a separately
                // arithmetic coded block of RSIZE bytes.
                let size = tables.refinement_size.decode_value(reader)?;
                reader.align();
                let size = usize::try_from(size).map_err(|_| DecodeError::Overflow)?;
                let data = reader.read_bytes(size)?;

                let mut decoder = ArithmeticDecoder::new(data);
                let mut cx = contexts(params.template.context_count());
                generic_refinement::decode_bitmap(&mut decoder, &mut cx, params)
            }
            Self::Arithmetic {
                decoder,
                refinement_contexts,
                ..
            } => generic_refinement::decode_bitmap(decoder, refinement_contexts, params),
        }
    }
}

/// The text region decoding procedure (6.4.5).
pub(crate) fn decode_text_region(
    coding: &mut TextCoding<'_, '_>,
    symbols: &[&Bitmap],
    params: &TextRegionParams<'_>,
    settings: &DecodeSettings,
) -> Result<Bitmap> {
    if params.num_instances > settings.max_symbol_instances {
        bail!(DecodeError::LimitExceeded);
    }
    if params.num_instances > 0 && symbols.is_empty() {
        bail!(SymbolError::NoSymbols);
    }

    let mut region = Bitmap::filled(params.width, params.height, params.default_pixel);
    let strips = 1_i32 << params.log_strips;
    let max_strips = settings
        .max_strip_iterations
        .unwrap_or(params.num_instances);

    let mut strip_t = coding
        .strip_delta_t(strips)?
        .checked_neg()
        .ok_or(DecodeError::Overflow)?;
    let mut first_s = 0_i32;
    let mut instances = 0_u32;
    let mut strip_count = 0_u32;

    while instances < params.num_instances {
        strip_count += 1;
        if strip_count > max_strips {
            bail!(DecodeError::LimitExceeded);
        }

        strip_t = strip_t
            .checked_add(coding.strip_delta_t(strips)?)
            .ok_or(DecodeError::Overflow)?;

        first_s = first_s
            .checked_add(coding.first_s()?)
            .ok_or(DecodeError::Overflow)?;
        let mut cur_s = first_s;

        loop {
            if instances >= params.num_instances {
                bail!(SymbolError::TooManySymbols);
            }

            let cur_t = coding.instance_t(params.log_strips)?;
            let t = strip_t.checked_add(cur_t).ok_or(DecodeError::Overflow)?;

            let id = coding.symbol_id()?;
            let symbol = *symbols.get(id).ok_or(SymbolError::OutOfRange)?;

            let refined = if params.refine && coding.is_refined()? {
                Some(refine_instance(coding, symbol, params, settings)?)
            } else {
                None
            };
            let bitmap = refined.as_ref().unwrap_or(symbol);

            cur_s = place(&mut region, bitmap, cur_s, t, params)?;
            instances += 1;

            match coding.delta_s()? {
                Some(delta) => {
                    cur_s = cur_s
                        .checked_add(delta)
                        .and_then(|s| s.checked_add(params.ds_offset))
                        .ok_or(DecodeError::Overflow)?;
                }
                None => break,
            }
        }
    }

    Ok(region)
}

/// Combine one symbol instance into the region at (S, T), returning the S
/// coordinate after it (6.4.5, steps 3 c) x) to xi)).
fn place(
    region: &mut Bitmap,
    bitmap: &Bitmap,
    cur_s: i32,
    t: i32,
    params: &TextRegionParams<'_>,
) -> Result<i32> {
    let width = bitmap.width() as i64;
    let height = bitmap.height() as i64;
    let corner = params.corner;
    let mut s = cur_s as i64;

    // Along S, a symbol covers its width, or its height when transposed.
    let extent = if params.transposed { height } else { width };
    let s_is_far_edge = if params.transposed {
        !corner.is_top()
    } else {
        !corner.is_left()
    };

    if s_is_far_edge {
        s += extent - 1;
    }

    let t = t as i64;
    let (x, y) = if params.transposed { (t, s) } else { (s, t) };
    let x = if corner.is_left() { x } else { x - width + 1 };
    let y = if corner.is_top() { y } else { y - height + 1 };

    blit(bitmap, region, x, y, params.combination_operator);

    if !s_is_far_edge {
        s += extent - 1;
    }

    i32::try_from(s).map_err(|_| DecodeError::Overflow)
}

/// Decode the refined bitmap of a symbol instance (6.4.11).
fn refine_instance(
    coding: &mut TextCoding<'_, '_>,
    symbol: &Bitmap,
    params: &TextRegionParams<'_>,
    settings: &DecodeSettings,
) -> Result<Bitmap> {
    let [rdw, rdh, rdx, rdy] = coding.refinement_deltas()?;

    let width = u32::try_from(symbol.width() as i64 + rdw as i64)
        .map_err(|_| RegionError::InvalidDimension)?;
    let height = u32::try_from(symbol.height() as i64 + rdh as i64)
        .map_err(|_| RegionError::InvalidDimension)?;
    settings.check_area(width, height)?;

    // GRREFERENCEDX = floor(RDW / 2) + RDX.
    let dx = rdw.div_euclid(2).checked_add(rdx).ok_or(DecodeError::Overflow)?;
    let dy = rdh.div_euclid(2).checked_add(rdy).ok_or(DecodeError::Overflow)?;

    coding.refine(&RefinementParams {
        width,
        height,
        template: params.refinement_template,
        reference: symbol,
        dx,
        dy,
        tpgron: false,
        at: params.refinement_at,
    })
}

/// Decode the symbol ID Huffman table (7.4.3.1.7).
fn parse_symbol_id_table(reader: &mut Reader<'_>, num_symbols: u32) -> Result<HuffmanTable> {
    let run_lines: Vec<TableLine> = (0..35)
        .map(|value| Ok(line(reader.read_bits(4)? as u8, 0, value)))
        .collect::<Result<_>>()?;
    let run_codes = HuffmanTable::build(&run_lines)?;

    let num_symbols = num_symbols as usize;
    let mut lengths: Vec<u8> = Vec::with_capacity(num_symbols);

    while lengths.len() < num_symbols {
        let code = run_codes.decode_value(reader)?;

        let (length, repeat) = match code {
            0..=31 => (code as u8, 1),
            32 => {
                let previous = *lengths.last().ok_or(HuffmanError::InvalidCode)?;
                (previous, 3 + reader.read_bits(2)? as usize)
            }
            33 => (0, 3 + reader.read_bits(3)? as usize),
            34 => (0, 11 + reader.read_bits(7)? as usize),
            _ => bail!(HuffmanError::InvalidCode),
        };

        if lengths.len() + repeat > num_symbols {
            bail!(HuffmanError::InvalidCode);
        }

        lengths.extend(iter::repeat_n(length, repeat));
    }

    reader.align();

    let lines: Vec<TableLine> = lengths
        .iter()
        .enumerate()
        .map(|(id, &length)| line(length, 0, id as i32))
        .collect();

    HuffmanTable::build(&lines)
}

/// The Huffman table selection of a text region (7.4.3.1.2).
#[derive(Debug, Clone, Copy)]
struct TextHuffmanFlags {
    first_s: u8,
    delta_s: u8,
    delta_t: u8,
    refinement_width: u8,
    refinement_height: u8,
    refinement_y: u8,
    refinement_x: u8,
    refinement_size: u8,
}

impl TextHuffmanFlags {
    fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let flags = reader.read_u16()?;
        let field = |shift: u16, mask: u16| ((flags >> shift) & mask) as u8;

        Ok(Self {
            first_s: field(0, 0x03),
            delta_s: field(2, 0x03),
            delta_t: field(4, 0x03),
            refinement_width: field(6, 0x03),
            refinement_height: field(8, 0x03),
            refinement_y: field(10, 0x03),
            refinement_x: field(12, 0x03),
            refinement_size: field(14, 0x01),
        })
    }
}

/// The text region segment data header (7.4.3.1). The symbol ID table that
/// follows it is read separately.
struct TextRegionHeader {
    info: RegionSegmentInfo,
    huffman: Option<TextHuffmanFlags>,
    num_instances: u32,
    log_strips: u8,
    corner: ReferenceCorner,
    transposed: bool,
    combination_operator: CombinationOperator,
    default_pixel: bool,
    ds_offset: i32,
    refine: bool,
    refinement_template: RefinementTemplate,
    refinement_at: Vec<AtPixel>,
}

impl TextRegionHeader {
    fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let info = RegionSegmentInfo::parse(reader)?;
        let flags = reader.read_u16()?;

        let use_huffman = flags & 0x0001 != 0;
        let refine = flags & 0x0002 != 0;
        let log_strips = ((flags >> 2) & 0x03) as u8;
        let corner = ReferenceCorner::from_value((flags >> 4) as u8);
        let transposed = flags & 0x0040 != 0;
        let combination_operator = CombinationOperator::from_value(((flags >> 7) & 0x03) as u8)?;
        let default_pixel = flags & 0x0200 != 0;
        // SBDSOFFSET is a signed 5-bit value.
        let ds_offset = ((((flags >> 10) & 0x1F) as i32) ^ 0x10) - 0x10;
        let refinement_template = RefinementTemplate::from_value((flags >> 15) as u8);

        let huffman = if use_huffman {
            Some(TextHuffmanFlags::parse(reader)?)
        } else {
            None
        };

        let refinement_at = if refine {
            parse_at_pixels(reader, refinement_template.at_count(), false)?
        } else {
            Vec::new()
        };

        let num_instances = reader.read_u32()?;

        Ok(Self {
            info,
            huffman,
            num_instances,
            log_strips,
            corner,
            transposed,
            combination_operator,
            default_pixel,
            ds_offset,
            refine,
            refinement_template,
            refinement_at,
        })
    }

    fn params(&self) -> TextRegionParams<'_> {
        TextRegionParams {
            width: self.info.width,
            height: self.info.height,
            num_instances: self.num_instances,
            log_strips: self.log_strips,
            corner: self.corner,
            transposed: self.transposed,
            combination_operator: self.combination_operator,
            default_pixel: self.default_pixel,
            ds_offset: self.ds_offset,
            refine: self.refine,
            refinement_template: self.refinement_template,
            refinement_at: &self.refinement_at,
        }
    }
}
