//! The MQ arithmetic decoder (Annex E).
//!
//! The decoder turns a compressed byte sequence plus a sequence of context
//! labels back into the original binary decisions. Every context carries its
//! own adaptive probability estimate, which lives in a [`Context`] owned by
//! whichever procedure is doing the decoding.

use alloc::vec;
use alloc::vec::Vec;

/// The adaptive state of a single context (E.2.4): an index into the
/// probability estimation table and the sense of the more probable symbol.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Context {
    index: u8,
    mps: u8,
}

/// Create a set of `len` fresh contexts.
pub(crate) fn contexts(len: usize) -> Vec<Context> {
    vec![Context::default(); len]
}

/// The arithmetic decoder state (E.3.1).
pub(crate) struct ArithmeticDecoder<'a> {
    data: &'a [u8],
    /// The code register. Chigh is the upper 16 bits.
    c: u32,
    /// The interval register.
    a: u32,
    /// The position of the current byte in `data`.
    bp: usize,
    /// The number of bits left in Clow before the next BYTEIN.
    ct: u32,
}

impl<'a> ArithmeticDecoder<'a> {
    /// Create a decoder and run INITDEC (Figure G.1).
    pub(crate) fn new(data: &'a [u8]) -> Self {
        let mut decoder = Self {
            data,
            c: 0,
            a: 0,
            bp: 0,
            ct: 0,
        };

        decoder.c = ((decoder.byte_at(0) ^ 0xFF) as u32) << 16;
        decoder.byte_in();
        decoder.c <<= 7;
        decoder.ct -= 7;
        decoder.a = 0x8000;

        decoder
    }

    /// Decode one binary decision with the given context (Figure G.2).
    #[inline(always)]
    pub(crate) fn decode(&mut self, cx: &mut Context) -> u32 {
        let entry = &QE_TABLE[cx.index as usize];
        let qe = entry.qe as u32;

        self.a = self.a.wrapping_sub(qe);

        if (self.c >> 16) < self.a {
            if self.a & 0x8000 != 0 {
                return cx.mps as u32;
            }

            // MPS_EXCHANGE (Figure E.16).
            let d = if self.a < qe {
                let d = 1 - cx.mps;
                if entry.switch {
                    cx.mps = 1 - cx.mps;
                }
                cx.index = entry.nlps;
                d
            } else {
                cx.index = entry.nmps;
                cx.mps
            };

            self.renormalize();

            d as u32
        } else {
            self.c = self.c.wrapping_sub(self.a << 16);

            // LPS_EXCHANGE (Figure E.17).
            let d = if self.a < qe {
                cx.index = entry.nmps;
                cx.mps
            } else {
                let d = 1 - cx.mps;
                if entry.switch {
                    cx.mps = 1 - cx.mps;
                }
                cx.index = entry.nlps;
                d
            };
            self.a = qe;

            self.renormalize();

            d as u32
        }
    }

    /// RENORMD (Figure E.18).
    #[inline(always)]
    fn renormalize(&mut self) {
        loop {
            if self.ct == 0 {
                self.byte_in();
            }

            self.a <<= 1;
            self.c <<= 1;
            self.ct -= 1;

            if self.a & 0x8000 != 0 {
                break;
            }
        }
    }

    /// BYTEIN (Figure G.3). A 0xFF followed by a byte above 0x8F is a marker,
    /// after which the decoder keeps feeding 1-bits without advancing.
    #[inline(always)]
    fn byte_in(&mut self) {
        let b = self.byte_at(self.bp);

        if b == 0xFF {
            if self.byte_at(self.bp + 1) > 0x8F {
                self.ct = 8;
            } else {
                self.bp += 1;
                self.c = self
                    .c
                    .wrapping_add(0xFE00)
                    .wrapping_sub((self.byte_at(self.bp) as u32) << 9);
                self.ct = 7;
            }
        } else {
            self.bp += 1;
            self.c = self
                .c
                .wrapping_add(0xFF00)
                .wrapping_sub((self.byte_at(self.bp) as u32) << 8);
            self.ct = 8;
        }
    }

    /// Bytes past the end of the data read as 0xFF.
    #[inline(always)]
    fn byte_at(&self, pos: usize) -> u8 {
        self.data.get(pos).copied().unwrap_or(0xFF)
    }
}

struct QeEntry {
    qe: u16,
    nmps: u8,
    nlps: u8,
    switch: bool,
}

const fn qe(qe: u16, nmps: u8, nlps: u8, switch: u8) -> QeEntry {
    QeEntry {
        qe,
        nmps,
        nlps,
        switch: switch == 1,
    }
}

/// Table E.1, Qe values and probability estimation process.
#[rustfmt::skip]
static QE_TABLE: [QeEntry; 47] = [
    qe(0x5601, 1, 1, 1),   qe(0x3401, 2, 6, 0),   qe(0x1801, 3, 9, 0),
    qe(0x0AC1, 4, 12, 0),  qe(0x0521, 5, 29, 0),  qe(0x0221, 38, 33, 0),
    qe(0x5601, 7, 6, 1),   qe(0x5401, 8, 14, 0),  qe(0x4801, 9, 14, 0),
    qe(0x3801, 10, 14, 0), qe(0x3001, 11, 17, 0), qe(0x2401, 12, 18, 0),
    qe(0x1C01, 13, 20, 0), qe(0x1601, 29, 21, 0), qe(0x5601, 15, 14, 1),
    qe(0x5401, 16, 14, 0), qe(0x5101, 17, 15, 0), qe(0x4801, 18, 16, 0),
    qe(0x3801, 19, 17, 0), qe(0x3401, 20, 18, 0), qe(0x3001, 21, 19, 0),
    qe(0x2801, 22, 19, 0), qe(0x2401, 23, 20, 0), qe(0x2201, 24, 21, 0),
    qe(0x1C01, 25, 22, 0), qe(0x1801, 26, 23, 0), qe(0x1601, 27, 24, 0),
    qe(0x1401, 28, 25, 0), qe(0x1201, 29, 26, 0), qe(0x1101, 30, 27, 0),
    qe(0x0AC1, 31, 28, 0), qe(0x09C1, 32, 29, 0), qe(0x08A1, 33, 30, 0),
    qe(0x0521, 34, 31, 0), qe(0x0441, 35, 32, 0), qe(0x02A1, 36, 33, 0),
    qe(0x0221, 37, 34, 0), qe(0x0141, 38, 35, 0), qe(0x0111, 39, 36, 0),
    qe(0x0085, 40, 37, 0), qe(0x0049, 41, 38, 0), qe(0x0025, 42, 39, 0),
    qe(0x0015, 43, 40, 0), qe(0x0009, 44, 41, 0), qe(0x0005, 45, 42, 0),
    qe(0x0001, 45, 43, 0), qe(0x5601, 46, 46, 0),
];
