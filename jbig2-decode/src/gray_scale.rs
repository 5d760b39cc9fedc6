//! Gray-scale image decoding procedure (Annex C).

use alloc::vec;
use alloc::vec::Vec;

use crate::arithmetic_decoder::{ArithmeticDecoder, contexts};
use crate::bitmap::Bitmap;
use crate::compose::{CombinationOperator, blit};
use crate::decode::generic::{self, GenericParams, GenericTemplate};
use crate::error::{ParseError, Result};

/// Input parameters to the gray-scale image decoding procedure (Table C.1).
#[derive(Debug, Clone, Copy)]
pub(crate) struct GrayScaleParams<'a> {
    /// `GSMMR`
    pub(crate) mmr: bool,
    /// `GSBPP`
    pub(crate) bits_per_pixel: u8,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) template: GenericTemplate,
    /// `GSKIP`, if `GSUSESKIP` is set.
    pub(crate) skip: Option<&'a Bitmap>,
}

/// Decode a gray-scale image, returning its values in row-major order
/// (C.5).
pub(crate) fn decode_gray_scale_image(
    data: &[u8],
    params: &GrayScaleParams<'_>,
) -> Result<Vec<u32>> {
    if params.mmr {
        decode_mmr(data, params)
    } else {
        decode_arithmetic(data, params)
    }
}

/// Each bit plane is a separate MMR block, starting where the previous one
/// ended.
fn decode_mmr(data: &[u8], params: &GrayScaleParams<'_>) -> Result<Vec<u32>> {
    let mut offset = 0;

    combine_planes(params, || {
        let rest = data.get(offset..).ok_or(ParseError::UnexpectedEof)?;
        let (plane, consumed) = generic::decode_mmr(rest, params.width, params.height)?;
        offset += consumed;

        Ok(plane)
    })
}

/// All bit planes share one arithmetic decoder and one set of contexts.
fn decode_arithmetic(data: &[u8], params: &GrayScaleParams<'_>) -> Result<Vec<u32>> {
    let mut decoder = ArithmeticDecoder::new(data);
    let mut contexts = contexts(params.template.context_count());

    // Table C.4.
    let generic_params = GenericParams {
        width: params.width,
        height: params.height,
        template: params.template,
        tpgdon: false,
        at: params.template.nominal_at(),
        skip: params.skip,
    };

    combine_planes(params, || {
        generic::decode_arithmetic(&mut decoder, &mut contexts, &generic_params)
    })
}

/// Decode the bit planes from the most significant one down, undo their
/// Gray coding and sum them up into the gray-scale values (C.5, steps 1 to
/// 4).
fn combine_planes<F>(params: &GrayScaleParams<'_>, mut next_plane: F) -> Result<Vec<u32>>
where
    F: FnMut() -> Result<Bitmap>,
{
    let width = params.width;
    let mut values = vec![0_u32; width as usize * params.height as usize];
    let mut previous: Option<Bitmap> = None;

    for j in (0..params.bits_per_pixel).rev() {
        let mut plane = next_plane()?;

        if let Some(previous) = &previous {
            blit(previous, &mut plane, 0, 0, CombinationOperator::Xor);
        }

        for y in 0..params.height {
            for x in 0..width {
                if plane.get_pixel(x, y) {
                    values[y as usize * width as usize + x as usize] |= 1 << j;
                }
            }
        }

        previous = Some(plane);
    }

    Ok(values)
}
