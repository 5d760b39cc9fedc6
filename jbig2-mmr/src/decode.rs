use crate::bit_reader::BitReader;
use crate::tables::{
    BLACK_CODES, EOL, EOL_BITS, LookupTable, MAX_CODE_BITS, MODE_LOOKUP, MODES, Mode, WHITE_CODES,
};
use crate::{DecodeError, Result};

impl BitReader<'_> {
    #[inline(always)]
    fn decode_run_inner(&mut self, table: &LookupTable<16>) -> Result<u32> {
        let mut total: u32 = 0;

        loop {
            let code = table
                .lookup(self.peek_bits(MAX_CODE_BITS))
                .ok_or_else(|| self.code_error())?;
            self.consume(code.bits)?;

            total = total
                .checked_add(code.value as u32)
                .ok_or(DecodeError::Overflow)?;

            // Make-up codes are always followed by another code, a terminating
            // code ends the run.
            if code.value < 64 {
                return Ok(total);
            }
        }
    }

    #[inline(always)]
    pub(crate) fn decode_run(&mut self, is_white: bool) -> Result<u32> {
        if is_white {
            self.decode_run_inner(&WHITE_CODES)
        } else {
            self.decode_run_inner(&BLACK_CODES)
        }
    }

    #[inline(always)]
    pub(crate) fn decode_mode(&mut self) -> Result<Mode> {
        let code = MODE_LOOKUP
            .lookup(self.peek_bits(MAX_CODE_BITS))
            .ok_or_else(|| self.code_error())?;
        self.consume(code.bits)?;

        Ok(MODES[code.value as usize])
    }

    /// Unresolvable bits past the end of the data mean the data was truncated.
    fn code_error(&self) -> DecodeError {
        if self.at_end() {
            DecodeError::UnexpectedEof
        } else {
            DecodeError::InvalidCode
        }
    }

    /// Skip over any end-of-line codes, returning how many were found.
    pub(crate) fn skip_eol(&mut self) -> usize {
        let mut count = 0;

        while !self.at_end() && self.peek_bits(EOL_BITS) == EOL {
            if self.consume(EOL_BITS).is_err() {
                break;
            }
            count += 1;
        }

        count
    }
}
