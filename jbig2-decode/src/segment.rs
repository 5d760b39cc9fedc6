//! Segment headers (7.2) and segment types (7.3).

use alloc::vec::Vec;

use log::trace;

use crate::error::{ParseError, Result, SegmentError, bail};
use crate::reader::Reader;

/// "The segment type is a number between 0 and 63, inclusive. Not all values
/// are allowed." (7.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum SegmentType {
    /// Symbol dictionary, 7.4.2 (type 0).
    SymbolDictionary,
    /// Intermediate text region, 7.4.3 (type 4).
    IntermediateTextRegion,
    /// Immediate text region, 7.4.3 (type 6).
    ImmediateTextRegion,
    /// Immediate lossless text region, 7.4.3 (type 7).
    ImmediateLosslessTextRegion,
    /// Pattern dictionary, 7.4.4 (type 16).
    PatternDictionary,
    /// Intermediate halftone region, 7.4.5 (type 20).
    IntermediateHalftoneRegion,
    /// Immediate halftone region, 7.4.5 (type 22).
    ImmediateHalftoneRegion,
    /// Immediate lossless halftone region, 7.4.5 (type 23).
    ImmediateLosslessHalftoneRegion,
    /// Intermediate generic region, 7.4.6 (type 36).
    IntermediateGenericRegion,
    /// Immediate generic region, 7.4.6 (type 38).
    ImmediateGenericRegion,
    /// Immediate lossless generic region, 7.4.6 (type 39).
    ImmediateLosslessGenericRegion,
    /// Intermediate generic refinement region, 7.4.7 (type 40).
    IntermediateGenericRefinementRegion,
    /// Immediate generic refinement region, 7.4.7 (type 42).
    ImmediateGenericRefinementRegion,
    /// Immediate lossless generic refinement region, 7.4.7 (type 43).
    ImmediateLosslessGenericRefinementRegion,
    /// Page information, 7.4.8 (type 48).
    PageInformation,
    /// End of page, 7.4.9 (type 49).
    EndOfPage,
    /// End of stripe, 7.4.10 (type 50).
    EndOfStripe,
    /// End of file, 7.4.11 (type 51).
    EndOfFile,
    /// Profiles, 7.4.12 (type 52).
    Profiles,
    /// Tables, 7.4.13 (type 53).
    Tables,
    /// Colour palette, 7.4.16 (type 54).
    ColourPalette,
    /// Extension, 7.4.14 (type 62).
    Extension,
}

/// The kind of region a region segment carries, regardless of whether it is
/// intermediate or immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RegionKind {
    Text,
    Halftone,
    Generic,
    Refinement,
}

/// Segment type codes, indexed by the 6-bit type field. "All other segment
/// types are reserved and must not be used." (7.3)
const SEGMENT_TYPES: [Option<SegmentType>; 64] = {
    use SegmentType::*;

    let mut table = [None; 64];
    table[0] = Some(SymbolDictionary);
    table[4] = Some(IntermediateTextRegion);
    table[6] = Some(ImmediateTextRegion);
    table[7] = Some(ImmediateLosslessTextRegion);
    table[16] = Some(PatternDictionary);
    table[20] = Some(IntermediateHalftoneRegion);
    table[22] = Some(ImmediateHalftoneRegion);
    table[23] = Some(ImmediateLosslessHalftoneRegion);
    table[36] = Some(IntermediateGenericRegion);
    table[38] = Some(ImmediateGenericRegion);
    table[39] = Some(ImmediateLosslessGenericRegion);
    table[40] = Some(IntermediateGenericRefinementRegion);
    table[42] = Some(ImmediateGenericRefinementRegion);
    table[43] = Some(ImmediateLosslessGenericRefinementRegion);
    table[48] = Some(PageInformation);
    table[49] = Some(EndOfPage);
    table[50] = Some(EndOfStripe);
    table[51] = Some(EndOfFile);
    table[52] = Some(Profiles);
    table[53] = Some(Tables);
    table[54] = Some(ColourPalette);
    table[62] = Some(Extension);
    table
};

impl SegmentType {
    pub(crate) fn from_code(code: u8) -> Result<Self> {
        match SEGMENT_TYPES.get(code as usize) {
            Some(Some(segment_type)) => Ok(*segment_type),
            _ => Err(SegmentError::UnknownType.into()),
        }
    }

    /// The region kind of a region segment, or `None` for all other
    /// segments.
    pub(crate) fn region_kind(self) -> Option<RegionKind> {
        use SegmentType::*;

        match self {
            IntermediateTextRegion | ImmediateTextRegion | ImmediateLosslessTextRegion => {
                Some(RegionKind::Text)
            }
            IntermediateHalftoneRegion
            | ImmediateHalftoneRegion
            | ImmediateLosslessHalftoneRegion => Some(RegionKind::Halftone),
            IntermediateGenericRegion
            | ImmediateGenericRegion
            | ImmediateLosslessGenericRegion => Some(RegionKind::Generic),
            IntermediateGenericRefinementRegion
            | ImmediateGenericRefinementRegion
            | ImmediateLosslessGenericRefinementRegion => Some(RegionKind::Refinement),
            _ => None,
        }
    }

    /// Whether this is an immediate region segment, i.e. one that is drawn
    /// onto the page directly.
    pub(crate) fn is_immediate_region(self) -> bool {
        use SegmentType::*;

        matches!(
            self,
            ImmediateTextRegion
                | ImmediateLosslessTextRegion
                | ImmediateHalftoneRegion
                | ImmediateLosslessHalftoneRegion
                | ImmediateGenericRegion
                | ImmediateLosslessGenericRegion
                | ImmediateGenericRefinementRegion
                | ImmediateLosslessGenericRefinementRegion
        )
    }
}

/// A parsed segment header (7.2.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SegmentHeader {
    pub(crate) segment_number: u32,
    pub(crate) segment_type: SegmentType,
    /// "Bit 7: Deferred non-retain." (7.2.3)
    pub(crate) deferred_non_retain: bool,
    /// Zero for segments that are not associated with any page.
    pub(crate) page_association: u32,
    pub(crate) referred_to_segments: Vec<u32>,
    /// `None` if the length was unknown (0xFFFFFFFF), which is only allowed
    /// for immediate generic regions.
    pub(crate) data_length: Option<u32>,
}

impl SegmentHeader {
    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let segment_number = reader.read_u32()?;
        let flags = reader.read_byte()?;
        let segment_type = SegmentType::from_code(flags & 0x3F)?;
        let long_page_association = flags & 0x40 != 0;

        // 7.2.4: the top three bits are either the count itself (0 to 4) or
        // 7 for the long form.
        let count_and_retention = reader.read_byte()?;
        let short_count = count_and_retention >> 5;

        let referred_count = match short_count {
            0..=4 => short_count as u32,
            7 => {
                let rest = reader.read_bytes(3)?;
                let count =
                    u32::from_be_bytes([count_and_retention & 0x1F, rest[0], rest[1], rest[2]]);

                // One retention bit for this segment and one per referred
                // segment.
                reader.skip_bytes((count as usize + 1).div_ceil(8))?;
                count
            }
            _ => bail!(SegmentError::InvalidReferredCount),
        };

        // Each referred number is at least one byte long.
        if referred_count as usize > reader.tail().len() {
            bail!(ParseError::UnexpectedEof);
        }

        let mut referred_to_segments = Vec::with_capacity(referred_count as usize);

        for _ in 0..referred_count {
            // 7.2.5
            let referred = if segment_number <= 256 {
                reader.read_byte()? as u32
            } else if segment_number <= 65536 {
                reader.read_u16()? as u32
            } else {
                reader.read_u32()?
            };

            // Only segments with lower numbers may be referred to.
            if referred >= segment_number {
                bail!(SegmentError::InvalidReference);
            }

            referred_to_segments.push(referred);
        }

        let page_association = if long_page_association {
            reader.read_u32()?
        } else {
            reader.read_byte()? as u32
        };

        let data_length = match reader.read_u32()? {
            0xFFFF_FFFF => None,
            length => Some(length),
        };

        trace!(
            "segment {segment_number}: {segment_type:?}, page {page_association}, \
             refers to {referred_to_segments:?}, length {data_length:?}"
        );

        Ok(Self {
            segment_number,
            segment_type,
            deferred_non_retain: flags & 0x80 != 0,
            page_association,
            referred_to_segments,
            data_length,
        })
    }
}

/// A segment header together with its data part.
#[derive(Debug, Clone)]
pub(crate) struct Segment<'a> {
    pub(crate) header: SegmentHeader,
    pub(crate) data: &'a [u8],
}

impl<'a> Segment<'a> {
    /// Parse a segment header directly followed by its data.
    pub(crate) fn parse(reader: &mut Reader<'a>) -> Result<Self> {
        let header = SegmentHeader::parse(reader)?;
        Self::with_data(reader, header)
    }

    /// Take the data part belonging to `header` as a window of the reader
    /// and move past it.
    pub(crate) fn with_data(reader: &mut Reader<'a>, header: SegmentHeader) -> Result<Self> {
        let start = reader.byte_pos();
        let length = match header.data_length {
            Some(length) => length as usize,
            None => unknown_data_length(reader.tail())?,
        };

        let data = reader.sub(start, length).data();
        if data.len() != length {
            bail!(ParseError::UnexpectedEof);
        }

        reader.seek(start + length);

        Ok(Self { data, header })
    }
}

/// Determine the length of an immediate generic region with unknown length
/// (7.2.7).
///
/// The data ends with a 4-byte row count that is preceded by 0x00 0x00 for
/// MMR coded data and by 0xFF 0xAC otherwise. Whether MMR is used can be
/// seen in the eighteenth byte, the generic region segment flags.
fn unknown_data_length(data: &[u8]) -> Result<usize> {
    let flags = *data.get(17).ok_or(ParseError::UnexpectedEof)?;
    let marker: [u8; 2] = if flags & 0x01 != 0 {
        [0x00, 0x00]
    } else {
        [0xFF, 0xAC]
    };

    let start = 18;

    data.get(start..)
        .and_then(|rest| rest.windows(6).position(|window| window[..2] == marker))
        .map(|offset| start + offset + 6)
        .ok_or(SegmentError::MissingEndMarker.into())
}
