//! Symbol dictionary segment parsing and decoding (7.4.2, 6.5).

use alloc::boxed::Box;
use alloc::vec::Vec;

use log::warn;

use super::generic::{self, GenericParams, GenericTemplate};
use super::generic_refinement::{self, RefinementParams, RefinementTemplate};
use super::text::{
    ReferenceCorner, SymbolCodes, TextCoding, TextHuffmanTables, TextIntegerDecoders,
    TextRegionParams, decode_text_region,
};
use super::{AtPixel, index_bits, parse_at_pixels, required};
use crate::DecodeSettings;
use crate::arithmetic_decoder::{ArithmeticDecoder, Context, contexts};
use crate::bitmap::Bitmap;
use crate::compose::{CombinationOperator, extract};
use crate::error::{
    DecodeError, FormatError, RegionError, Result, SymbolError, TemplateError, bail,
};
use crate::huffman_table::{HuffmanTable, StandardTables, TableSelector};
use crate::integer_decoder::IntegerDecoder;
use crate::reader::Reader;

/// A decoded symbol dictionary segment.
#[derive(Debug, Clone)]
pub(crate) struct SymbolDictionary {
    pub(crate) exported: Vec<Bitmap>,
    /// The coding contexts left behind by the dictionary, if it asked for
    /// them to be retained (7.4.2.1.1, bit 9).
    pub(crate) retained: Option<RetainedContexts>,
}

/// Arithmetic coding statistics carried from one symbol dictionary to the
/// next.
#[derive(Debug, Clone)]
pub(crate) struct RetainedContexts {
    pub(crate) generic: Vec<Context>,
    pub(crate) refinement: Vec<Context>,
}

/// Decode a symbol dictionary segment (7.4.2, 6.5).
///
/// `input_symbols` are the exported symbols of all referred dictionaries,
/// `inherited` the contexts retained by the last of them.
pub(crate) fn decode(
    data: &[u8],
    input_symbols: &[&Bitmap],
    inherited: Option<&RetainedContexts>,
    standard: &StandardTables,
    custom: &[&HuffmanTable],
    settings: &DecodeSettings,
) -> Result<SymbolDictionary> {
    let mut reader = Reader::new(data);
    let header = SymbolDictionaryHeader::parse(&mut reader)?;

    if header.num_new_symbols > settings.max_symbol_instances {
        bail!(DecodeError::LimitExceeded);
    }

    let num_symbols = (input_symbols.len() as u32)
        .checked_add(header.num_new_symbols)
        .ok_or(DecodeError::Overflow)?;

    let mut coding = if header.use_huffman {
        let mut selector = TableSelector::new(standard, custom);

        SymbolCoding::Huffman(HuffmanState {
            height: selector.select(header.height_table, &[4, 5], 3)?,
            width: selector.select(header.width_table, &[2, 3], 3)?,
            bitmap_size: selector.select(header.bitmap_size_table, &[1], 1)?,
            aggregate_instances: selector.select(header.aggregate_table, &[1], 1)?,
            export_run: selector.standard(1),
            reader,
        })
    } else {
        let contexts_in = if header.context_used {
            if inherited.is_none() {
                warn!("symbol dictionary reuses contexts, but none were retained");
            }
            inherited
        } else {
            None
        };

        SymbolCoding::Arithmetic(Box::new(ArithmeticState::new(
            reader.tail(),
            &header,
            contexts_in,
            index_bits(num_symbols),
        )?))
    };

    let mut new_symbols: Vec<Bitmap> = Vec::new();
    // Widths of the current height class, only used for collective bitmaps.
    let mut widths: Vec<u32> = Vec::new();
    let mut height = 0_u32;
    let mut decoded = 0_u32;

    while decoded < header.num_new_symbols {
        let delta_height = coding.height_delta()?;
        height = height
            .checked_add_signed(delta_height)
            .ok_or(RegionError::InvalidDimension)?;

        let mut width = 0_u32;
        let mut total_width = 0_u32;

        // OOB ends the height class.
        while let Some(delta_width) = coding.width_delta()? {
            if decoded >= header.num_new_symbols {
                bail!(SymbolError::TooManySymbols);
            }

            width = width
                .checked_add_signed(delta_width)
                .ok_or(RegionError::InvalidDimension)?;
            total_width = total_width
                .checked_add(width)
                .ok_or(RegionError::InvalidDimension)?;
            settings.check_area(width, height)?;

            if header.refine_aggregate {
                let symbol = decode_refinement_aggregate(
                    &mut coding,
                    &header,
                    input_symbols,
                    &new_symbols,
                    (width, height),
                    num_symbols,
                    standard,
                    settings,
                )?;
                new_symbols.push(symbol);
            } else {
                match &mut coding {
                    SymbolCoding::Arithmetic(state) => {
                        let symbol = generic::decode_arithmetic(
                            &mut state.decoder,
                            &mut state.generic_contexts,
                            &GenericParams {
                                width,
                                height,
                                template: header.template,
                                tpgdon: false,
                                at: &header.at,
                                skip: None,
                            },
                        )?;
                        new_symbols.push(symbol);
                    }
                    // Decoded below, once the class is complete.
                    SymbolCoding::Huffman(_) => widths.push(width),
                }
            }

            decoded += 1;
        }

        if !header.refine_aggregate {
            if let SymbolCoding::Huffman(state) = &mut coding {
                decode_collective_bitmap(
                    state,
                    &widths,
                    total_width,
                    height,
                    settings,
                    &mut new_symbols,
                )?;
                widths.clear();
            }
        }
    }

    let exported = decode_exported_symbols(
        &mut coding,
        header.num_exported_symbols,
        input_symbols,
        &new_symbols,
    )?;

    let retained = match coding {
        SymbolCoding::Arithmetic(state) if header.context_retained => {
            let state = *state;
            Some(RetainedContexts {
                generic: state.generic_contexts,
                refinement: state.refinement_contexts,
            })
        }
        _ => None,
    };

    Ok(SymbolDictionary { exported, retained })
}

/// The symbol with index `id` of the concatenation of the input symbols and
/// the new symbols decoded so far.
fn symbol_at<'s>(
    input_symbols: &[&'s Bitmap],
    new_symbols: &'s [Bitmap],
    id: usize,
) -> Option<&'s Bitmap> {
    match id.checked_sub(input_symbols.len()) {
        None => input_symbols.get(id).copied(),
        Some(new_id) => new_symbols.get(new_id),
    }
}

/// Decode a symbol bitmap with refinement/aggregate coding (6.5.8.2).
fn decode_refinement_aggregate(
    coding: &mut SymbolCoding<'_>,
    header: &SymbolDictionaryHeader,
    input_symbols: &[&Bitmap],
    new_symbols: &[Bitmap],
    (width, height): (u32, u32),
    num_symbols: u32,
    standard: &StandardTables,
    settings: &DecodeSettings,
) -> Result<Bitmap> {
    let instances = coding.aggregate_count()?;
    let instances = u32::try_from(instances)
        .ok()
        .filter(|n| *n > 0)
        .ok_or(SymbolError::Invalid)?;

    // With Huffman coding, symbol IDs are plain numbers of at least one bit.
    let huffman_code_len = index_bits(num_symbols).max(1);

    if instances == 1 {
        // 6.5.8.2.2: refine a single existing symbol.
        return match coding {
            SymbolCoding::Arithmetic(state) => {
                let (decoder, text, refinement_contexts) = state.aggregate_parts()?;
                let id = text.iaid.decode(decoder) as usize;
                let dx = required(text.iardx.decode(decoder)?)?;
                let dy = required(text.iardy.decode(decoder)?)?;
                let reference =
                    symbol_at(input_symbols, new_symbols, id).ok_or(SymbolError::OutOfRange)?;

                generic_refinement::decode_bitmap(
                    decoder,
                    refinement_contexts,
                    &refinement_params(header, reference, (width, height), (dx, dy)),
                )
            }
            SymbolCoding::Huffman(state) => {
                let reader = &mut state.reader;
                let id = reader.read_bits(huffman_code_len)? as usize;
                let dx = standard.get(15).decode_value(reader)?;
                let dy = standard.get(15).decode_value(reader)?;
                let size = standard.get(1).decode_value(reader)?;
                reader.align();

                let size = usize::try_from(size).map_err(|_| DecodeError::Overflow)?;
                let data = reader.read_bytes(size)?;
                let reference =
                    symbol_at(input_symbols, new_symbols, id).ok_or(SymbolError::OutOfRange)?;

                // Each such bitmap is a separate arithmetic coded block.
                let mut decoder = ArithmeticDecoder::new(data);
                let mut cx = contexts(header.refinement_template.context_count());
                generic_refinement::decode_bitmap(
                    &mut decoder,
                    &mut cx,
                    &refinement_params(header, reference, (width, height), (dx, dy)),
                )
            }
        };
    }

    // 6.5.8.2.4: the symbols available to the embedded text region.
    let mut symbols: Vec<&Bitmap> = Vec::with_capacity(input_symbols.len() + new_symbols.len());
    symbols.extend_from_slice(input_symbols);
    symbols.extend(new_symbols);

    // Table 17.
    let params = TextRegionParams {
        width,
        height,
        num_instances: instances,
        log_strips: 0,
        corner: ReferenceCorner::TopLeft,
        transposed: false,
        combination_operator: CombinationOperator::Or,
        default_pixel: false,
        ds_offset: 0,
        refine: true,
        refinement_template: header.refinement_template,
        refinement_at: &header.refinement_at,
    };

    match coding {
        SymbolCoding::Arithmetic(state) => {
            let (decoder, integers, refinement_contexts) = state.aggregate_parts()?;
            let mut text = TextCoding::Arithmetic {
                decoder,
                integers,
                refinement_contexts,
            };
            decode_text_region(&mut text, &symbols, &params, settings)
        }
        SymbolCoding::Huffman(state) => {
            let mut text = TextCoding::Huffman {
                reader: &mut state.reader,
                tables: TextHuffmanTables::aggregation(standard),
                symbol_codes: SymbolCodes::Fixed(huffman_code_len),
            };
            decode_text_region(&mut text, &symbols, &params, settings)
        }
    }
}

fn refinement_params<'a>(
    header: &'a SymbolDictionaryHeader,
    reference: &'a Bitmap,
    (width, height): (u32, u32),
    (dx, dy): (i32, i32),
) -> RefinementParams<'a> {
    RefinementParams {
        width,
        height,
        template: header.refinement_template,
        reference,
        dx,
        dy,
        tpgron: false,
        at: &header.refinement_at,
    }
}

/// Decode a height class collective bitmap and split it into the symbols
/// of the class (6.5.9).
fn decode_collective_bitmap(
    state: &mut HuffmanState<'_>,
    widths: &[u32],
    total_width: u32,
    height: u32,
    settings: &DecodeSettings,
    new_symbols: &mut Vec<Bitmap>,
) -> Result<()> {
    let size = state.bitmap_size.decode_value(&mut state.reader)?;
    state.reader.align();
    settings.check_area(total_width, height)?;

    let collective = if size == 0 {
        // Stored uncompressed, row by row.
        let mut bitmap = Bitmap::new(total_width, height);
        let stride = bitmap.stride();
        let tail = total_width % 8;

        for y in 0..height {
            let row = bitmap.row_mut(y);
            row.copy_from_slice(state.reader.read_bytes(stride)?);

            if tail != 0 {
                row[stride - 1] &= 0xFF << (8 - tail);
            }
        }

        bitmap
    } else {
        let size = usize::try_from(size).map_err(|_| DecodeError::Overflow)?;
        let data = state.reader.read_bytes(size)?;
        generic::decode_mmr(data, total_width, height)?.0
    };

    let mut x = 0_i64;
    for &width in widths {
        new_symbols.push(extract(&collective, x, 0, width, height));
        x += width as i64;
    }

    Ok(())
}

/// Select the exported symbols from the input and new symbols (6.5.10).
fn decode_exported_symbols(
    coding: &mut SymbolCoding<'_>,
    num_exported: u32,
    input_symbols: &[&Bitmap],
    new_symbols: &[Bitmap],
) -> Result<Vec<Bitmap>> {
    let total = input_symbols.len() + new_symbols.len();
    let mut exported = Vec::new();
    let mut index = 0;
    let mut export = false;
    let mut runs = 0;

    while index < total {
        // Only the first run may be empty in a sensible stream.
        runs += 1;
        if runs > total + 1 {
            bail!(SymbolError::Invalid);
        }

        let run = usize::try_from(coding.export_run()?).map_err(|_| SymbolError::Invalid)?;
        let end = index
            .checked_add(run)
            .filter(|end| *end <= total)
            .ok_or(SymbolError::Invalid)?;

        if export {
            for id in index..end {
                let symbol =
                    symbol_at(input_symbols, new_symbols, id).ok_or(SymbolError::OutOfRange)?;
                exported.push(symbol.clone());
            }
        }

        index = end;
        export = !export;
    }

    if exported.len() != num_exported as usize {
        bail!(SymbolError::Invalid);
    }

    Ok(exported)
}

struct ArithmeticState<'a> {
    decoder: ArithmeticDecoder<'a>,
    iadh: IntegerDecoder,
    iadw: IntegerDecoder,
    iaex: IntegerDecoder,
    iaai: IntegerDecoder,
    generic_contexts: Vec<Context>,
    refinement_contexts: Vec<Context>,
    /// IAID, IARDX and IARDY are shared with the aggregate text regions.
    /// Only present with refinement/aggregate coding, since IAID alone
    /// holds `2^SBSYMCODELEN` contexts.
    text: Option<TextIntegerDecoders>,
}

impl<'a> ArithmeticState<'a> {
    fn new(
        data: &'a [u8],
        header: &SymbolDictionaryHeader,
        inherited: Option<&RetainedContexts>,
        symbol_code_len: u8,
    ) -> Result<Self> {
        let generic_count = header.template.context_count();
        let refinement_count = header.refinement_template.context_count();

        let (generic_contexts, refinement_contexts) = match inherited {
            Some(retained) => {
                if retained.generic.len() != generic_count
                    || (header.refine_aggregate && retained.refinement.len() != refinement_count)
                {
                    bail!(TemplateError::Invalid);
                }

                let refinement = if retained.refinement.len() == refinement_count {
                    retained.refinement.clone()
                } else {
                    contexts(refinement_count)
                };

                (retained.generic.clone(), refinement)
            }
            None => (contexts(generic_count), contexts(refinement_count)),
        };

        Ok(Self {
            decoder: ArithmeticDecoder::new(data),
            iadh: IntegerDecoder::new(),
            iadw: IntegerDecoder::new(),
            iaex: IntegerDecoder::new(),
            iaai: IntegerDecoder::new(),
            generic_contexts,
            refinement_contexts,
            text: header
                .refine_aggregate
                .then(|| TextIntegerDecoders::new(symbol_code_len)),
        })
    }

    /// The pieces of the state used by refinement/aggregate coding.
    fn aggregate_parts(
        &mut self,
    ) -> Result<(
        &mut ArithmeticDecoder<'a>,
        &mut TextIntegerDecoders,
        &mut Vec<Context>,
    )> {
        let text = self.text.as_mut().ok_or(SymbolError::Invalid)?;
        Ok((&mut self.decoder, text, &mut self.refinement_contexts))
    }
}

struct HuffmanState<'a> {
    reader: Reader<'a>,
    height: &'a HuffmanTable,
    width: &'a HuffmanTable,
    bitmap_size: &'a HuffmanTable,
    aggregate_instances: &'a HuffmanTable,
    /// Always table B.1.
    export_run: &'a HuffmanTable,
}

enum SymbolCoding<'a> {
    Huffman(HuffmanState<'a>),
    Arithmetic(Box<ArithmeticState<'a>>),
}

impl SymbolCoding<'_> {
    /// HCDH (6.5.6).
    fn height_delta(&mut self) -> Result<i32> {
        match self {
            Self::Huffman(state) => state.height.decode_value(&mut state.reader),
            Self::Arithmetic(state) => required(state.iadh.decode(&mut state.decoder)?),
        }
    }

    /// DW (6.5.7). OOB ends the height class.
    fn width_delta(&mut self) -> Result<Option<i32>> {
        match self {
            Self::Huffman(state) => state.width.decode(&mut state.reader),
            Self::Arithmetic(state) => state.iadw.decode(&mut state.decoder),
        }
    }

    /// REFAGGNINST (6.5.8.2.1).
    fn aggregate_count(&mut self) -> Result<i32> {
        match self {
            Self::Huffman(state) => state.aggregate_instances.decode_value(&mut state.reader),
            Self::Arithmetic(state) => required(state.iaai.decode(&mut state.decoder)?),
        }
    }

    /// EXRUNLENGTH (6.5.10).
    fn export_run(&mut self) -> Result<i32> {
        match self {
            Self::Huffman(state) => state.export_run.decode_value(&mut state.reader),
            Self::Arithmetic(state) => required(state.iaex.decode(&mut state.decoder)?),
        }
    }
}

/// The symbol dictionary segment data header (7.4.2.1).
#[derive(Debug, Clone)]
struct SymbolDictionaryHeader {
    use_huffman: bool,
    refine_aggregate: bool,
    height_table: u8,
    width_table: u8,
    bitmap_size_table: u8,
    aggregate_table: u8,
    context_used: bool,
    context_retained: bool,
    template: GenericTemplate,
    refinement_template: RefinementTemplate,
    at: Vec<AtPixel>,
    refinement_at: Vec<AtPixel>,
    num_exported_symbols: u32,
    num_new_symbols: u32,
}

impl SymbolDictionaryHeader {
    fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let flags = reader.read_u16()?;

        if flags & 0xE000 != 0 {
            bail!(FormatError::ReservedBits);
        }

        let use_huffman = flags & 0x0001 != 0;
        let refine_aggregate = flags & 0x0002 != 0;
        let template = GenericTemplate::from_value((flags >> 10) as u8);
        let refinement_template = RefinementTemplate::from_value((flags >> 12) as u8);

        let at = if use_huffman {
            Vec::new()
        } else {
            parse_at_pixels(reader, template.at_count(), true)?
        };

        let refinement_at = if refine_aggregate {
            parse_at_pixels(reader, refinement_template.at_count(), false)?
        } else {
            Vec::new()
        };

        let num_exported_symbols = reader.read_u32()?;
        let num_new_symbols = reader.read_u32()?;

        Ok(Self {
            use_huffman,
            refine_aggregate,
            height_table: ((flags >> 2) & 0x03) as u8,
            width_table: ((flags >> 4) & 0x03) as u8,
            bitmap_size_table: ((flags >> 6) & 0x01) as u8,
            aggregate_table: ((flags >> 7) & 0x01) as u8,
            context_used: flags & 0x0100 != 0,
            context_retained: flags & 0x0200 != 0,
            template,
            refinement_template,
            at,
            refinement_at,
            num_exported_symbols,
            num_new_symbols,
        })
    }
}
