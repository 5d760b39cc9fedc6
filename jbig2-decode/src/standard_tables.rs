//! The standard Huffman tables B.1 to B.15.
//!
//! Each line reads `(prefix length, range length, range low)`. Lower-range
//! lines cover everything below their value, upper-range lines everything
//! from their value on.

use crate::huffman_table::{TableLine, line, lower, oob, upper};

/// The standard tables, indexed by table number minus one.
pub(crate) static STANDARD_TABLES: [&[TableLine]; 15] = [
    B1, B2, B3, B4, B5, B6, B7, B8, B9, B10, B11, B12, B13, B14, B15,
];

const B1: &[TableLine] = &[
    line(1, 4, 0),
    line(2, 8, 16),
    line(3, 16, 272),
    upper(3, 65808),
];

const B2: &[TableLine] = &[
    line(1, 0, 0),
    line(2, 0, 1),
    line(3, 0, 2),
    line(4, 3, 3),
    line(5, 6, 11),
    upper(6, 75),
    oob(6),
];

const B3: &[TableLine] = &[
    line(8, 8, -256),
    line(1, 0, 0),
    line(2, 0, 1),
    line(3, 0, 2),
    line(4, 3, 3),
    line(5, 6, 11),
    lower(8, -257),
    upper(7, 75),
    oob(6),
];

const B4: &[TableLine] = &[
    line(1, 0, 1),
    line(2, 0, 2),
    line(3, 0, 3),
    line(4, 3, 4),
    line(5, 6, 12),
    upper(5, 76),
];

const B5: &[TableLine] = &[
    line(7, 8, -255),
    line(1, 0, 1),
    line(2, 0, 2),
    line(3, 0, 3),
    line(4, 3, 4),
    line(5, 6, 12),
    lower(7, -256),
    upper(6, 76),
];

const B6: &[TableLine] = &[
    line(5, 10, -2048),
    line(4, 9, -1024),
    line(4, 8, -512),
    line(4, 7, -256),
    line(5, 6, -128),
    line(5, 5, -64),
    line(4, 5, -32),
    line(2, 7, 0),
    line(3, 7, 128),
    line(3, 8, 256),
    line(4, 9, 512),
    line(4, 10, 1024),
    lower(6, -2049),
    upper(6, 2048),
];

const B7: &[TableLine] = &[
    line(4, 9, -1024),
    line(3, 8, -512),
    line(4, 7, -256),
    line(5, 6, -128),
    line(5, 5, -64),
    line(4, 5, -32),
    line(4, 5, 0),
    line(5, 5, 32),
    line(5, 6, 64),
    line(4, 7, 128),
    line(3, 8, 256),
    line(3, 9, 512),
    line(3, 10, 1024),
    lower(5, -1025),
    upper(5, 2048),
];

const B8: &[TableLine] = &[
    line(8, 3, -15),
    line(9, 1, -7),
    line(8, 1, -5),
    line(9, 0, -3),
    line(7, 0, -2),
    line(4, 0, -1),
    line(2, 1, 0),
    line(5, 0, 2),
    line(6, 0, 3),
    line(3, 4, 4),
    line(6, 1, 20),
    line(4, 4, 22),
    line(4, 5, 38),
    line(5, 6, 70),
    line(5, 7, 134),
    line(6, 7, 262),
    line(7, 8, 390),
    line(6, 10, 646),
    lower(9, -16),
    upper(9, 1670),
    oob(2),
];

const B9: &[TableLine] = &[
    line(8, 4, -31),
    line(9, 2, -15),
    line(8, 2, -11),
    line(9, 1, -7),
    line(7, 1, -5),
    line(4, 1, -3),
    line(3, 1, -1),
    line(3, 1, 1),
    line(5, 1, 3),
    line(6, 1, 5),
    line(3, 5, 7),
    line(6, 2, 39),
    line(4, 5, 43),
    line(4, 6, 75),
    line(5, 7, 139),
    line(5, 8, 267),
    line(6, 8, 523),
    line(7, 9, 779),
    line(6, 11, 1291),
    lower(9, -32),
    upper(9, 3339),
    oob(2),
];

const B10: &[TableLine] = &[
    line(7, 4, -21),
    line(8, 0, -5),
    line(7, 0, -4),
    line(5, 0, -3),
    line(2, 2, -2),
    line(5, 0, 2),
    line(6, 0, 3),
    line(7, 0, 4),
    line(8, 0, 5),
    line(2, 6, 6),
    line(5, 5, 70),
    line(6, 5, 102),
    line(6, 6, 134),
    line(6, 7, 198),
    line(6, 8, 326),
    line(6, 9, 582),
    line(6, 10, 1094),
    line(7, 11, 2118),
    lower(8, -22),
    upper(8, 4166),
    oob(2),
];

const B11: &[TableLine] = &[
    line(1, 0, 1),
    line(2, 1, 2),
    line(4, 0, 4),
    line(4, 1, 5),
    line(5, 1, 7),
    line(5, 2, 9),
    line(6, 2, 13),
    line(7, 2, 17),
    line(7, 3, 21),
    line(7, 4, 29),
    line(7, 5, 45),
    line(7, 6, 77),
    upper(7, 141),
];

const B12: &[TableLine] = &[
    line(1, 0, 1),
    line(2, 0, 2),
    line(3, 1, 3),
    line(5, 0, 5),
    line(5, 1, 6),
    line(6, 1, 8),
    line(7, 0, 10),
    line(7, 1, 11),
    line(7, 2, 13),
    line(7, 3, 17),
    line(7, 4, 25),
    line(8, 5, 41),
    upper(8, 73),
];

const B13: &[TableLine] = &[
    line(1, 0, 1),
    line(3, 0, 2),
    line(4, 0, 3),
    line(5, 0, 4),
    line(4, 1, 5),
    line(3, 3, 7),
    line(6, 1, 15),
    line(6, 2, 17),
    line(6, 3, 21),
    line(6, 4, 29),
    line(6, 5, 45),
    line(7, 6, 77),
    upper(7, 141),
];

const B14: &[TableLine] = &[
    line(3, 0, -2),
    line(3, 0, -1),
    line(1, 0, 0),
    line(3, 0, 1),
    line(3, 0, 2),
];

const B15: &[TableLine] = &[
    line(7, 4, -24),
    line(6, 2, -8),
    line(5, 1, -4),
    line(4, 0, -2),
    line(3, 0, -1),
    line(1, 0, 0),
    line(3, 0, 1),
    line(4, 0, 2),
    line(5, 1, 3),
    line(6, 2, 5),
    line(7, 4, 9),
    lower(7, -25),
    upper(7, 25),
];
