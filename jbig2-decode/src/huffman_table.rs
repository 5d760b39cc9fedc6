//! Huffman table decoding (Annex B).
//!
//! Tables are given as a list of lines. Prefix codes are assigned to the
//! lines canonically (B.3) and stored as a binary tree in an index arena.

use alloc::vec;
use alloc::vec::Vec;

use crate::error::{DecodeError, FormatError, HuffmanError, Result, bail};
use crate::reader::Reader;
use crate::standard_tables::STANDARD_TABLES;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineKind {
    /// Covers `range_low..range_low + 2^range_len`.
    Normal,
    /// Covers everything up to and including `range_low`.
    Lower,
    /// The out-of-band value.
    Oob,
}

/// A single line of a Huffman table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TableLine {
    pub(crate) prefix_len: u8,
    pub(crate) range_len: u8,
    pub(crate) range_low: i32,
    pub(crate) kind: LineKind,
}

pub(crate) const fn line(prefix_len: u8, range_len: u8, range_low: i32) -> TableLine {
    TableLine {
        prefix_len,
        range_len,
        range_low,
        kind: LineKind::Normal,
    }
}

/// A lower-range line for all values up to `range_high`.
pub(crate) const fn lower(prefix_len: u8, range_high: i32) -> TableLine {
    TableLine {
        prefix_len,
        range_len: 32,
        range_low: range_high,
        kind: LineKind::Lower,
    }
}

/// An upper-range line for all values from `range_low` on.
pub(crate) const fn upper(prefix_len: u8, range_low: i32) -> TableLine {
    line(prefix_len, 32, range_low)
}

pub(crate) const fn oob(prefix_len: u8) -> TableLine {
    TableLine {
        prefix_len,
        range_len: 0,
        range_low: 0,
        kind: LineKind::Oob,
    }
}

#[derive(Debug, Clone)]
enum Node {
    Branch([Option<u32>; 2]),
    Leaf(TableLine),
}

/// A Huffman decoding tree.
#[derive(Debug, Clone)]
pub(crate) struct HuffmanTable {
    /// The root is always at index 0.
    nodes: Vec<Node>,
}

impl HuffmanTable {
    /// Standard table B.`number`.
    pub(crate) fn standard(number: usize) -> Result<Self> {
        let lines = number
            .checked_sub(1)
            .and_then(|idx| STANDARD_TABLES.get(idx))
            .ok_or(HuffmanError::InvalidSelection)?;

        Self::build(lines)
    }

    /// Build a table from its lines, assigning prefix codes per B.3.
    pub(crate) fn build(lines: &[TableLine]) -> Result<Self> {
        let max_len = lines.iter().map(|l| l.prefix_len).max().unwrap_or(0) as usize;
        if max_len > 32 {
            bail!(HuffmanError::InvalidTable);
        }

        let mut len_count = vec![0_u64; max_len + 1];
        for l in lines {
            len_count[l.prefix_len as usize] += 1;
        }
        // A prefix length of zero marks a line that is never used.
        len_count[0] = 0;

        let mut table = Self {
            nodes: vec![Node::Branch([None; 2])],
        };

        let mut first_code = 0_u64;
        for cur_len in 1..=max_len {
            first_code = (first_code + len_count[cur_len - 1]) << 1;
            let mut cur_code = first_code;

            for l in lines.iter().filter(|l| l.prefix_len as usize == cur_len) {
                if cur_code >> cur_len != 0 {
                    bail!(HuffmanError::InvalidTable);
                }

                table.insert(cur_code as u32, l.prefix_len, *l)?;
                cur_code += 1;
            }
        }

        Ok(table)
    }

    fn insert(&mut self, code: u32, len: u8, line: TableLine) -> Result<()> {
        let mut idx = 0_usize;

        for i in (0..len).rev() {
            let bit = ((code >> i) & 1) as usize;

            let Node::Branch(children) = &self.nodes[idx] else {
                bail!(HuffmanError::InvalidTable);
            };

            let next = children[bit];
            idx = match next {
                Some(child) => child as usize,
                None => {
                    let child = self.nodes.len();
                    let node = if i == 0 {
                        Node::Leaf(line)
                    } else {
                        Node::Branch([None; 2])
                    };
                    self.nodes.push(node);

                    if let Node::Branch(children) = &mut self.nodes[idx] {
                        children[bit] = Some(child as u32);
                    }

                    child
                }
            };
        }

        match &self.nodes[idx] {
            Node::Leaf(l) if *l == line => Ok(()),
            _ => Err(HuffmanError::InvalidTable.into()),
        }
    }

    /// Decode a value (B.4), returning `None` for the out-of-band value.
    pub(crate) fn decode(&self, reader: &mut Reader<'_>) -> Result<Option<i32>> {
        let mut idx = 0_usize;

        loop {
            match &self.nodes[idx] {
                Node::Branch(children) => {
                    let bit = reader.read_bit()? as usize;
                    idx = children[bit].ok_or(HuffmanError::InvalidCode)? as usize;
                }
                Node::Leaf(line) => {
                    if line.kind == LineKind::Oob {
                        return Ok(None);
                    }

                    let offset = reader.read_bits(line.range_len)? as i64;
                    let value = match line.kind {
                        LineKind::Lower => line.range_low as i64 - offset,
                        _ => line.range_low as i64 + offset,
                    };

                    return Ok(Some(
                        i32::try_from(value).map_err(|_| DecodeError::Overflow)?,
                    ));
                }
            }
        }
    }

    /// Decode a value where the out-of-band value is not allowed.
    pub(crate) fn decode_value(&self, reader: &mut Reader<'_>) -> Result<i32> {
        Ok(self.decode(reader)?.ok_or(HuffmanError::UnexpectedOob)?)
    }

    /// Decode a custom table from the data of a tables segment (B.2).
    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let flags = reader.read_byte()?;

        if flags & 0x80 != 0 {
            bail!(FormatError::ReservedBits);
        }

        let has_oob = flags & 0x01 != 0;
        let prefix_bits = ((flags >> 1) & 0x07) + 1;
        let range_bits = ((flags >> 4) & 0x07) + 1;

        let low = reader.read_i32()?;
        let high = reader.read_i32()?;

        let mut lines = Vec::new();
        let mut cur_low = low as i64;

        while cur_low < high as i64 {
            let prefix_len = reader.read_bits(prefix_bits)? as u8;
            let range_len = reader.read_bits(range_bits)? as u8;
            if range_len > 32 {
                bail!(HuffmanError::InvalidTable);
            }

            lines.push(line(prefix_len, range_len, cur_low as i32));
            cur_low += 1_i64 << range_len;
        }

        lines.push(lower(
            reader.read_bits(prefix_bits)? as u8,
            low.checked_sub(1).ok_or(DecodeError::Overflow)?,
        ));
        lines.push(upper(reader.read_bits(prefix_bits)? as u8, high));

        if has_oob {
            lines.push(oob(reader.read_bits(prefix_bits)? as u8));
        }

        Self::build(&lines)
    }
}

/// The standard tables B.1 to B.15, built once per document.
pub(crate) struct StandardTables {
    tables: Vec<HuffmanTable>,
}

impl StandardTables {
    pub(crate) fn new() -> Result<Self> {
        let tables = (1..=STANDARD_TABLES.len())
            .map(HuffmanTable::standard)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { tables })
    }

    /// Table B.`number`.
    pub(crate) fn get(&self, number: usize) -> &HuffmanTable {
        &self.tables[number - 1]
    }
}

/// Resolves the table selection fields of a segment header, handing out the
/// custom tables of the referred tables segments in order.
pub(crate) struct TableSelector<'a> {
    standard: &'a StandardTables,
    custom: &'a [&'a HuffmanTable],
    next: usize,
}

impl<'a> TableSelector<'a> {
    pub(crate) fn new(standard: &'a StandardTables, custom: &'a [&'a HuffmanTable]) -> Self {
        Self {
            standard,
            custom,
            next: 0,
        }
    }

    pub(crate) fn standard(&self, number: usize) -> &'a HuffmanTable {
        self.standard.get(number)
    }

    /// Select a table by the value of a header field. `standard[value]`
    /// names a standard table, and `custom` is the value that selects the
    /// next custom table.
    pub(crate) fn select(
        &mut self,
        value: u8,
        standard: &[usize],
        custom: u8,
    ) -> Result<&'a HuffmanTable> {
        if value == custom {
            let table = self
                .custom
                .get(self.next)
                .ok_or(HuffmanError::MissingTables)?;
            self.next += 1;
            return Ok(table);
        }

        match standard.get(value as usize) {
            Some(&number) => Ok(self.standard(number)),
            None => Err(HuffmanError::InvalidSelection.into()),
        }
    }
}
