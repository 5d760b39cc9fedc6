//! The arithmetic integer decoding procedures (Annex A).

use alloc::vec::Vec;

use crate::arithmetic_decoder::{ArithmeticDecoder, Context, contexts};
use crate::error::{DecodeError, Result};

/// The value classes of Figure A.1: after a prefix of `n` one-bits (and a
/// terminating zero, except for the last class), the value is read with the
/// given number of bits and added to the offset.
const VALUE_CLASSES: [(u8, u32); 6] = [(2, 0), (4, 4), (6, 20), (8, 84), (12, 340), (32, 4436)];

/// An arithmetic integer decoder (A.2), one per IAx procedure.
///
/// Each procedure keeps 512 contexts of its own, addressed by the PREV value.
pub(crate) struct IntegerDecoder {
    contexts: Vec<Context>,
}

impl IntegerDecoder {
    pub(crate) fn new() -> Self {
        Self {
            contexts: contexts(512),
        }
    }

    /// Decode a signed integer, returning `None` for OOB.
    pub(crate) fn decode(&mut self, decoder: &mut ArithmeticDecoder<'_>) -> Result<Option<i32>> {
        let mut prev = 1_u32;

        let sign = self.decode_bit(decoder, &mut prev);

        let mut class = 0;
        while class < VALUE_CLASSES.len() - 1 && self.decode_bit(decoder, &mut prev) == 1 {
            class += 1;
        }

        let (bits, offset) = VALUE_CLASSES[class];
        let mut value = 0_u64;
        for _ in 0..bits {
            value = (value << 1) | self.decode_bit(decoder, &mut prev) as u64;
        }
        let value = value + offset as u64;

        match (sign, value) {
            (1, 0) => Ok(None),
            (1, v) => Ok(Some(
                i32::try_from(v)
                    .map(|v| -v)
                    .map_err(|_| DecodeError::Overflow)?,
            )),
            (_, v) => Ok(Some(i32::try_from(v).map_err(|_| DecodeError::Overflow)?)),
        }
    }

    #[inline]
    fn decode_bit(&mut self, decoder: &mut ArithmeticDecoder<'_>, prev: &mut u32) -> u32 {
        let d = decoder.decode(&mut self.contexts[(*prev & 0x1FF) as usize]);

        // Once PREV has collected eight bits, only the most recent eight are
        // kept, together with the leading 1.
        *prev = if *prev < 256 {
            (*prev << 1) | d
        } else {
            (((*prev << 1) | d) & 0x1FF) | 0x100
        };

        d
    }
}

/// The IAID decoding procedure (A.3) for fixed-length symbol IDs.
pub(crate) struct SymbolIdDecoder {
    code_len: u8,
    contexts: Vec<Context>,
}

impl SymbolIdDecoder {
    pub(crate) fn new(code_len: u8) -> Self {
        Self {
            code_len,
            contexts: contexts(1 << code_len),
        }
    }

    pub(crate) fn decode(&mut self, decoder: &mut ArithmeticDecoder<'_>) -> u32 {
        let mut prev = 1_u32;

        for _ in 0..self.code_len {
            let d = decoder.decode(&mut self.contexts[prev as usize]);
            prev = (prev << 1) | d;
        }

        prev - (1 << self.code_len)
    }
}
