//! Pattern dictionary segment parsing and decoding (7.4.4, 6.7).

use alloc::vec::Vec;

use super::AtPixel;
use super::generic::{self, GenericParams, GenericTemplate};
use crate::DecodeSettings;
use crate::arithmetic_decoder::{ArithmeticDecoder, contexts};
use crate::bitmap::Bitmap;
use crate::compose::extract;
use crate::error::{DecodeError, FormatError, RegionError, Result, bail};
use crate::reader::Reader;

/// A decoded pattern dictionary.
#[derive(Debug, Clone)]
pub(crate) struct PatternDictionary {
    /// `GRAYMAX + 1` patterns of `width` × `height` pixels.
    pub(crate) patterns: Vec<Bitmap>,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

/// Decode a pattern dictionary segment (6.7.5).
pub(crate) fn decode(data: &[u8], settings: &DecodeSettings) -> Result<PatternDictionary> {
    let mut reader = Reader::new(data);
    let header = PatternDictionaryHeader::parse(&mut reader)?;

    let width = header.pattern_width as u32;
    let height = header.pattern_height as u32;
    let count = header.gray_max.checked_add(1).ok_or(DecodeError::Overflow)?;

    // All patterns are stored next to each other in one collective bitmap.
    let collective_width = count.checked_mul(width).ok_or(DecodeError::Overflow)?;
    settings.check_area(collective_width, height)?;

    let collective = if header.mmr {
        generic::decode_mmr(reader.tail(), collective_width, height)?.0
    } else {
        // Table 27.
        let at = [
            AtPixel::new(-(width as i32), 0),
            AtPixel::new(-3, -1),
            AtPixel::new(2, -2),
            AtPixel::new(-2, -2),
        ];

        let mut decoder = ArithmeticDecoder::new(reader.tail());
        let mut contexts = contexts(header.template.context_count());

        generic::decode_arithmetic(
            &mut decoder,
            &mut contexts,
            &GenericParams {
                width: collective_width,
                height,
                template: header.template,
                tpgdon: false,
                at: &at[..header.template.at_count()],
                skip: None,
            },
        )?
    };

    let patterns = (0..count)
        .map(|gray| extract(&collective, gray as i64 * width as i64, 0, width, height))
        .collect();

    Ok(PatternDictionary {
        patterns,
        width,
        height,
    })
}

/// The pattern dictionary segment data header (7.4.4.1).
#[derive(Debug, Clone)]
struct PatternDictionaryHeader {
    mmr: bool,
    template: GenericTemplate,
    /// `HDPW`
    pattern_width: u8,
    /// `HDPH`
    pattern_height: u8,
    gray_max: u32,
}

impl PatternDictionaryHeader {
    fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let flags = reader.read_byte()?;

        if flags & 0xF8 != 0 {
            bail!(FormatError::ReservedBits);
        }

        let pattern_width = reader.read_byte()?;
        let pattern_height = reader.read_byte()?;

        if pattern_width == 0 || pattern_height == 0 {
            bail!(RegionError::InvalidDimension);
        }

        Ok(Self {
            mmr: flags & 0x01 != 0,
            template: GenericTemplate::from_value(flags >> 1),
            pattern_width,
            pattern_height,
            gray_max: reader.read_u32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_fields() {
        let data = [0x05, 4, 3, 0, 0, 0, 15];
        let header = PatternDictionaryHeader::parse(&mut Reader::new(&data)).unwrap();

        assert!(header.mmr);
        assert_eq!(header.template, GenericTemplate::Template2);
        assert_eq!((header.pattern_width, header.pattern_height), (4, 3));
        assert_eq!(header.gray_max, 15);
    }

    #[test]
    fn empty_patterns_are_rejected() {
        let data = [0x00, 0, 3, 0, 0, 0, 1];
        assert_eq!(
            decode(&data, &DecodeSettings::default()).err(),
            Some(DecodeError::Region(RegionError::InvalidDimension))
        );
    }

    #[test]
    fn collective_area_is_limited() {
        let data = [0x00, 255, 255, 0, 0, 0xFF, 0x00];
        let settings = DecodeSettings {
            max_pixels: 1 << 20,
            ..DecodeSettings::default()
        };

        assert_eq!(
            decode(&data, &settings).err(),
            Some(DecodeError::LimitExceeded)
        );
    }
}
