//! Page information segments (7.4.8).

use crate::compose::CombinationOperator;
use crate::error::Result;
use crate::reader::Reader;

/// A page bitmap height of 0xFFFFFFFF means that the height is only known
/// once the last stripe has been decoded (7.4.8.2).
pub(crate) const UNKNOWN_HEIGHT: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PageInformation {
    pub(crate) width: u32,
    /// May be [`UNKNOWN_HEIGHT`] for striped pages.
    pub(crate) height: u32,
    /// Pixels per metre, `None` if unknown.
    pub(crate) x_resolution: Option<u32>,
    /// Pixels per metre, `None` if unknown.
    pub(crate) y_resolution: Option<u32>,
    /// "Bit 2: Page default pixel value." (7.4.8.5)
    pub(crate) default_pixel: bool,
    /// "Bits 3-4: Page default combination operator." (7.4.8.5)
    pub(crate) default_combination_operator: CombinationOperator,
    /// "Bit 6: Page combination operator overridden." (7.4.8.5) If this is
    /// not set, every region is drawn with the default operator.
    pub(crate) combination_operator_overridden: bool,
    /// 7.4.8.6
    pub(crate) striped: bool,
    pub(crate) max_stripe_size: u16,
}

impl PageInformation {
    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let width = reader.read_u32()?;
        let height = reader.read_u32()?;
        let x_resolution = Some(reader.read_u32()?).filter(|&r| r != 0);
        let y_resolution = Some(reader.read_u32()?).filter(|&r| r != 0);
        let flags = reader.read_byte()?;
        let striping = reader.read_u16()?;

        Ok(Self {
            width,
            height,
            x_resolution,
            y_resolution,
            default_pixel: flags & 0x04 != 0,
            // Two bits, so only OR, AND, XOR and XNOR are possible.
            default_combination_operator: CombinationOperator::from_value((flags >> 3) & 0x03)?,
            combination_operator_overridden: flags & 0x40 != 0,
            striped: striping & 0x8000 != 0,
            max_stripe_size: striping & 0x7FFF,
        })
    }

    /// The operator used to draw a region that asks for `requested`.
    pub(crate) fn combination_operator(&self, requested: CombinationOperator) -> CombinationOperator {
        if self.combination_operator_overridden {
            requested
        } else {
            self.default_combination_operator
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_information_fields() {
        #[rustfmt::skip]
        let data = [
            0x00, 0x00, 0x00, 0x40,
            0xFF, 0xFF, 0xFF, 0xFF,
            0x00, 0x00, 0x0B, 0xB8,
            0x00, 0x00, 0x00, 0x00,
            0x54,
            0x80, 0x20,
        ];

        let info = PageInformation::parse(&mut Reader::new(&data)).unwrap();

        assert_eq!(info.width, 64);
        assert_eq!(info.height, UNKNOWN_HEIGHT);
        assert_eq!(info.x_resolution, Some(3000));
        assert_eq!(info.y_resolution, None);
        assert!(info.default_pixel);
        assert_eq!(info.default_combination_operator, CombinationOperator::Xor);
        assert!(info.combination_operator_overridden);
        assert!(info.striped);
        assert_eq!(info.max_stripe_size, 32);
    }

    #[test]
    fn default_operator_wins_without_override() {
        let mut data = [0_u8; 19];
        data[16] = 0x08;

        let info = PageInformation::parse(&mut Reader::new(&data)).unwrap();

        assert_eq!(
            info.combination_operator(CombinationOperator::Replace),
            CombinationOperator::And
        );
    }
}
