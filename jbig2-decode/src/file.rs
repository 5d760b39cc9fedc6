//! The standalone file organisations (Annex D) and the embedded stream
//! format used by PDF.

use alloc::vec::Vec;

use log::{debug, warn};

use crate::error::{FormatError, Result, bail};
use crate::reader::Reader;
use crate::segment::{Segment, SegmentHeader, SegmentType};

/// "This is an 8-byte sequence containing 0x97 0x4A 0x42 0x32 0x0D 0x0A 0x1A
/// 0x0A." (D.4.1)
const FILE_ID: [u8; 8] = [0x97, 0x4A, 0x42, 0x32, 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Organization {
    /// Each segment header is directly followed by its data (D.1). This is
    /// also the layout of streams embedded in PDF files.
    Sequential,
    /// All segment headers come first, followed by the data of all segments
    /// in the same order (D.2).
    RandomAccess,
}

/// The file header (D.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FileHeader {
    pub(crate) organization: Organization,
    /// `None` if the number of pages was not known when the file was written.
    pub(crate) page_count: Option<u32>,
    /// Bit 2: generic regions may use the 12 AT pixel templates.
    pub(crate) extended_templates: bool,
    /// Bit 3: the file may contain coloured region segments.
    pub(crate) coloured_regions: bool,
}

impl FileHeader {
    /// Parse the file header, if the data starts with one.
    ///
    /// Streams without a header are left untouched.
    pub(crate) fn detect(reader: &mut Reader<'_>) -> Result<Option<Self>> {
        reader.mark();

        if reader.read_bytes(FILE_ID.len()).ok() != Some(FILE_ID.as_slice()) {
            reader.reset();
            return Ok(None);
        }

        reader.unmark();

        let flags = reader.read_byte()?;

        // "Bits 4-7: Reserved; must be 0." (D.4.2)
        if flags & 0xF0 != 0 {
            bail!(FormatError::ReservedBits);
        }

        let organization = if flags & 0x01 != 0 {
            Organization::Sequential
        } else {
            Organization::RandomAccess
        };

        let page_count = if flags & 0x02 != 0 {
            None
        } else {
            Some(reader.read_u32()?)
        };

        Ok(Some(Self {
            organization,
            page_count,
            extended_templates: flags & 0x04 != 0,
            coloured_regions: flags & 0x08 != 0,
        }))
    }
}

/// Split a stream into its segments.
///
/// Parsing stops at the end of the data or after an end of file segment.
pub(crate) fn parse(data: &[u8]) -> Result<(Option<FileHeader>, Vec<Segment<'_>>)> {
    let mut reader = Reader::new(data);
    let header = FileHeader::detect(&mut reader)?;

    let organization = match &header {
        Some(header) => {
            debug!(
                "file header: {:?}, {:?} pages, extended templates: {}",
                header.organization, header.page_count, header.extended_templates
            );

            if header.coloured_regions {
                warn!("coloured regions are decoded as bi-level");
            }

            header.organization
        }
        None => Organization::Sequential,
    };

    let segments = match organization {
        Organization::Sequential => parse_sequential(&mut reader)?,
        Organization::RandomAccess => parse_random_access(&mut reader)?,
    };

    if !reader.at_end() {
        warn!("ignoring {} bytes after end of file", reader.tail().len());
    }

    Ok((header, segments))
}

fn parse_sequential<'a>(reader: &mut Reader<'a>) -> Result<Vec<Segment<'a>>> {
    let mut segments = Vec::new();

    while !reader.at_end() {
        let segment = Segment::parse(reader)?;
        let is_end = segment.header.segment_type == SegmentType::EndOfFile;
        segments.push(segment);

        if is_end {
            break;
        }
    }

    Ok(segments)
}

fn parse_random_access<'a>(reader: &mut Reader<'a>) -> Result<Vec<Segment<'a>>> {
    let mut headers = Vec::new();

    while !reader.at_end() {
        let header = SegmentHeader::parse(reader)?;
        let is_end = header.segment_type == SegmentType::EndOfFile;
        headers.push(header);

        if is_end {
            break;
        }
    }

    headers
        .into_iter()
        .map(|header| Segment::with_data(reader, header))
        .collect()
}
