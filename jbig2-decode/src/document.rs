//! Documents: the segments of a stream, the references between them and the
//! cache of their decoded data.

use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;

use log::debug;
use rustc_hash::FxHashMap;

use crate::bitmap::Bitmap;
use crate::decode::generic_refinement::RefinementReference;
use crate::decode::pattern::PatternDictionary;
use crate::decode::symbol::SymbolDictionary;
use crate::decode::{
    RegionBitmap, generic, generic_refinement, halftone, pattern, symbol, text,
};
use crate::error::{DecodeError, FormatError, Result, SegmentError, bail};
use crate::huffman_table::{HuffmanTable, StandardTables};
use crate::reader::Reader;
use crate::segment::{RegionKind, Segment, SegmentHeader, SegmentType};
use crate::{DecodeSettings, Image, file, page};

/// A JBIG2 document, consisting of one or more pages.
///
/// Segments are decoded lazily, when a page that needs them is requested.
/// Their decoded data stays cached until [`Document::clean`] is called.
pub struct Document<'a> {
    /// The segments of the globals stream, followed by the segments of the
    /// document itself.
    segments: Vec<Segment<'a>>,
    /// Segment number to position in `segments`. A segment of the document
    /// shadows a global segment with the same number.
    index: FxHashMap<u32, usize>,
    /// The segments associated with each page, in segment number order.
    pages: BTreeMap<u32, Vec<usize>>,
    cache: SegmentCache,
    composed: BTreeMap<u32, Image>,
    standard_tables: StandardTables,
    settings: DecodeSettings,
}

impl<'a> Document<'a> {
    /// Parse a standalone JBIG2 file or an embedded stream without globals.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        Self::with_globals(data, None, DecodeSettings::default())
    }

    /// Parse a JBIG2 stream together with a stream of global segments, as
    /// found in the `JBIG2Globals` entry of PDF image dictionaries.
    pub fn with_globals(
        data: &'a [u8],
        globals: Option<&'a [u8]>,
        settings: DecodeSettings,
    ) -> Result<Self> {
        let mut segments = match globals {
            Some(globals) => file::parse(globals)?.1,
            None => Vec::new(),
        };

        let first_own = segments.len();
        segments.extend(file::parse(data)?.1);

        let mut index = FxHashMap::default();
        let mut pages: BTreeMap<u32, Vec<usize>> = BTreeMap::new();

        for (position, segment) in segments.iter().enumerate() {
            index.insert(segment.header.segment_number, position);

            let page = segment.header.page_association;
            if position >= first_own && page != 0 {
                pages.entry(page).or_default().push(position);
            }
        }

        for positions in pages.values_mut() {
            positions.sort_by_key(|&position| segments[position].header.segment_number);
        }

        debug!(
            "{} segments ({} global), pages {:?}",
            segments.len(),
            first_own,
            pages.keys().collect::<Vec<_>>()
        );

        Ok(Self {
            segments,
            index,
            pages,
            cache: SegmentCache::default(),
            composed: BTreeMap::new(),
            standard_tables: StandardTables::new()?,
            settings,
        })
    }

    /// The numbers of all pages that have segments associated with them, in
    /// ascending order.
    pub fn page_numbers(&self) -> Vec<u32> {
        self.pages.keys().copied().collect()
    }

    /// Decode the page with the given number.
    ///
    /// Composed pages are cached, so asking for the same page again is cheap.
    pub fn page(&mut self, number: u32) -> Result<Image> {
        if let Some(image) = self.composed.get(&number) {
            return Ok(image.clone());
        }

        let segments = self
            .pages
            .get(&number)
            .ok_or(FormatError::MissingPage)?
            .clone();

        debug!("composing page {number}");
        let image = page::compose(self, &segments)?;
        self.composed.insert(number, image.clone());

        Ok(image)
    }

    /// Drop all decoded segment data and composed pages.
    ///
    /// Images that were already returned are unaffected. Segments are
    /// decoded again when needed.
    pub fn clean(&mut self) {
        self.cache.clear();
        self.composed.clear();
    }

    pub(crate) fn segment(&self, position: usize) -> &Segment<'a> {
        &self.segments[position]
    }

    pub(crate) fn settings(&self) -> &DecodeSettings {
        &self.settings
    }

    fn lookup(&self, number: u32) -> Result<&Segment<'a>> {
        self.index
            .get(&number)
            .map(|&position| &self.segments[position])
            .ok_or(SegmentError::MissingReference.into())
    }

    /// Decode and cache everything segment `number` depends on, and the
    /// segment itself if its data can be referred to.
    ///
    /// `page` is the current page bitmap, which refinement regions without
    /// a referred region refine.
    pub(crate) fn resolve(&mut self, number: u32, page: Option<&Bitmap>) -> Result<()> {
        let order = decode_order(number, |number| {
            Ok(self.lookup(number)?.header.referred_to_segments.as_slice())
        })?;

        for number in order {
            if self.cache.contains(number) {
                continue;
            }

            let segment = self.lookup(number)?;

            if let Some(data) = self.decode_segment(segment, page)? {
                self.cache.insert(number, data);
            }
        }

        Ok(())
    }

    /// Decode a segment whose data other segments may refer to.
    fn decode_segment(
        &self,
        segment: &Segment<'a>,
        page: Option<&Bitmap>,
    ) -> Result<Option<SegmentData>> {
        let header = &segment.header;

        let data = match header.segment_type {
            SegmentType::SymbolDictionary => {
                let dictionaries: Vec<&SymbolDictionary> =
                    self.referred(header).filter_map(SegmentData::symbols).collect();
                let input: Vec<&Bitmap> = dictionaries
                    .iter()
                    .flat_map(|dictionary| dictionary.exported.iter())
                    .collect();
                let tables: Vec<&HuffmanTable> =
                    self.referred(header).filter_map(SegmentData::table).collect();

                // Contexts are inherited from the last referred dictionary
                // (7.4.2.2, step 3).
                let inherited = dictionaries
                    .last()
                    .and_then(|dictionary| dictionary.retained.as_ref());

                debug!(
                    "symbol dictionary {} with {} input symbols",
                    header.segment_number,
                    input.len()
                );

                SegmentData::Symbols(symbol::decode(
                    segment.data,
                    &input,
                    inherited,
                    &self.standard_tables,
                    &tables,
                    &self.settings,
                )?)
            }
            SegmentType::PatternDictionary => {
                SegmentData::Patterns(pattern::decode(segment.data, &self.settings)?)
            }
            SegmentType::Tables => {
                SegmentData::Table(HuffmanTable::parse(&mut Reader::new(segment.data))?)
            }
            segment_type
                if segment_type.region_kind().is_some() && !segment_type.is_immediate_region() =>
            {
                SegmentData::Region(self.decode_region(segment, page)?)
            }
            _ => return Ok(None),
        };

        Ok(Some(data))
    }

    /// Decode a region segment. All segments it refers to must have been
    /// resolved.
    pub(crate) fn decode_region(
        &self,
        segment: &Segment<'a>,
        page: Option<&Bitmap>,
    ) -> Result<RegionBitmap> {
        let header = &segment.header;
        let settings = &self.settings;

        debug!(
            "decoding {:?} segment {}",
            header.segment_type, header.segment_number
        );

        match header.segment_type.region_kind() {
            Some(RegionKind::Generic) => {
                generic::decode_region(segment.data, header.data_length.is_none(), settings)
            }
            Some(RegionKind::Text) => {
                let symbols: Vec<&Bitmap> = self
                    .referred(header)
                    .filter_map(SegmentData::symbols)
                    .flat_map(|dictionary| dictionary.exported.iter())
                    .collect();
                let tables: Vec<&HuffmanTable> =
                    self.referred(header).filter_map(SegmentData::table).collect();

                text::decode_region(
                    segment.data,
                    &symbols,
                    &self.standard_tables,
                    &tables,
                    settings,
                )
            }
            Some(RegionKind::Halftone) => {
                let patterns = self
                    .referred(header)
                    .find_map(SegmentData::patterns)
                    .ok_or(SegmentError::MissingPatternDictionary)?;

                halftone::decode_region(segment.data, patterns, settings)
            }
            Some(RegionKind::Refinement) => {
                // Without a referred region, the page itself is refined
                // (7.4.7.5).
                let reference = match header.referred_to_segments.first() {
                    Some(&number) => match self.cache.get(number) {
                        Some(SegmentData::Region(region)) => {
                            RefinementReference::Region(&region.bitmap)
                        }
                        Some(_) => bail!(SegmentError::UnexpectedReferenceType),
                        None => bail!(SegmentError::MissingReference),
                    },
                    None => RefinementReference::Page(page.ok_or(SegmentError::MissingReference)?),
                };

                generic_refinement::decode_region(segment.data, reference, settings)
            }
            None => Err(DecodeError::Unsupported),
        }
    }

    /// The cached data of all resolved segments `header` refers to.
    fn referred<'s>(&'s self, header: &'s SegmentHeader) -> impl Iterator<Item = &'s SegmentData> {
        header
            .referred_to_segments
            .iter()
            .filter_map(|&number| self.cache.get(number))
    }
}

/// The decoded data of a segment that other segments can refer to.
#[derive(Debug, Clone)]
pub(crate) enum SegmentData {
    Symbols(SymbolDictionary),
    Patterns(PatternDictionary),
    Table(HuffmanTable),
    /// An intermediate region.
    Region(RegionBitmap),
}

impl SegmentData {
    fn symbols(&self) -> Option<&SymbolDictionary> {
        match self {
            Self::Symbols(dictionary) => Some(dictionary),
            _ => None,
        }
    }

    fn patterns(&self) -> Option<&PatternDictionary> {
        match self {
            Self::Patterns(dictionary) => Some(dictionary),
            _ => None,
        }
    }

    fn table(&self) -> Option<&HuffmanTable> {
        match self {
            Self::Table(table) => Some(table),
            _ => None,
        }
    }
}

/// Decoded segment data, keyed by segment number.
#[derive(Debug, Default)]
pub(crate) struct SegmentCache {
    entries: FxHashMap<u32, SegmentData>,
}

impl SegmentCache {
    fn get(&self, number: u32) -> Option<&SegmentData> {
        self.entries.get(&number)
    }

    fn contains(&self, number: u32) -> bool {
        self.entries.contains_key(&number)
    }

    fn insert(&mut self, number: u32, data: SegmentData) {
        self.entries.insert(number, data);
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// The order in which `root` and all segments it transitively refers to
/// have to be decoded: every segment comes after the segments it refers to.
///
/// The walk is an iterative depth-first search, so deep reference chains
/// cannot overflow the stack.
fn decode_order<'r, F>(root: u32, mut references: F) -> Result<Vec<u32>>
where
    F: FnMut(u32) -> Result<&'r [u32]>,
{
    let mut marks = FxHashMap::default();
    let mut order = Vec::new();
    let mut stack = vec![(root, references(root)?, 0_usize)];
    marks.insert(root, Mark::Visiting);

    while let Some((number, referred, next)) = stack.last_mut() {
        let number = *number;
        let child = referred.get(*next).copied();
        *next += 1;

        match child {
            Some(child) => match marks.get(&child) {
                Some(Mark::Visiting) => bail!(SegmentError::ReferenceCycle),
                Some(Mark::Done) => {}
                None => {
                    marks.insert(child, Mark::Visiting);
                    stack.push((child, references(child)?, 0));
                }
            },
            None => {
                marks.insert(number, Mark::Done);
                order.push(number);
                stack.pop();
            }
        }
    }

    Ok(order)
}
