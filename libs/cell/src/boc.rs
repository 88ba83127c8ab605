//! Bag-of-cells serialization
//!
//! Binary layout (all integers big-endian unless noted):
//! ```text
//! magic        b5ee9c72
//! flags        [has_idx:1][has_crc32c:1][has_cache:1][unused:2][size_bytes:3]
//! off_bytes    u8
//! cells        size_bytes
//! roots        size_bytes
//! absent       size_bytes
//! total_size   off_bytes
//! root_list    roots * size_bytes
//! index        cells * off_bytes      (only with has_idx)
//! cell_data    total_size bytes
//! crc32c       4 bytes little-endian  (only with has_crc32c)
//! ```
//! Each cell is `d1 d2 data ref_index...`; references always point to cells
//! later in the list. Only ordinary level-0 cells are accepted, and no tree
//! may be deeper than [`MAX_DEPTH`](crate::cell::MAX_DEPTH).

use crate::cell::{Cell, CellError, CellRef, MAX_REFS};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use crc::{CRC_32_ISCSI, Crc};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Magic prefix of the generic bag-of-cells format
pub const BOC_MAGIC: u32 = 0xb5ee_9c72;

const CRC32C: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

const FLAG_HAS_IDX: u8 = 0x80;
const FLAG_HAS_CRC32C: u8 = 0x40;
const SIZE_MASK: u8 = 0x07;

const D1_REFS_MASK: u8 = 0x07;
const D1_EXOTIC: u8 = 0x08;
const D1_WITH_HASHES: u8 = 0x10;

/// Bag-of-cells errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BocError {
    /// Input does not start with the bag-of-cells magic
    #[error("Invalid BOC magic: 0x{0:08x}")]
    InvalidMagic(u32),

    /// Input ended early
    #[error("BOC truncated: needed {needed} bytes at offset {offset}")]
    Truncated {
        /// Read position
        offset: usize,
        /// Bytes the read needed
        needed: usize,
    },

    /// Header fields are inconsistent
    #[error("Invalid BOC header: {0}")]
    InvalidHeader(String),

    /// CRC-32C trailer mismatch
    #[error("BOC checksum mismatch: expected 0x{expected:08x}, got 0x{actual:08x}")]
    ChecksumMismatch {
        /// Checksum computed over the payload
        expected: u32,
        /// Checksum carried by the trailer
        actual: u32,
    },

    /// Exotic, hashed or higher-level cell
    #[error("Unsupported cell {index}: {reason}")]
    UnsupportedCell {
        /// Position in the cell list
        index: usize,
        /// What was rejected
        reason: &'static str,
    },

    /// Reference index points backwards or past the end
    #[error("Cell {cell} has invalid reference to {reference}")]
    InvalidReference {
        /// Referencing cell
        cell: usize,
        /// Referenced index
        reference: usize,
    },

    /// Wrong number of roots for the requested operation
    #[error("Expected exactly one root cell, found {0}")]
    RootCount(usize),

    /// Base64 wrapper could not be decoded
    #[error("Invalid BOC base64: {0}")]
    Base64(String),

    /// Decoded cell violates cell limits
    #[error(transparent)]
    Cell(#[from] CellError),
}

/// Result type for bag-of-cells operations
pub type Result<T> = std::result::Result<T, BocError>;

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(BocError::Truncated {
                offset: self.pos,
                needed: len,
            });
        }
        let out = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn uint(&mut self, len: usize) -> Result<usize> {
        Ok(self
            .take(len)?
            .iter()
            .fold(0usize, |acc, b| (acc << 8) | usize::from(*b)))
    }
}

struct RawCell {
    data: Vec<u8>,
    bit_len: usize,
    references: Vec<usize>,
}

fn read_raw_cell(reader: &mut Reader<'_>, index: usize, size_bytes: usize) -> Result<RawCell> {
    let d1 = reader.u8()?;
    let d2 = reader.u8()?;

    if d1 & D1_EXOTIC != 0 {
        return Err(BocError::UnsupportedCell {
            index,
            reason: "exotic cell",
        });
    }
    if d1 & D1_WITH_HASHES != 0 {
        return Err(BocError::UnsupportedCell {
            index,
            reason: "stored hashes",
        });
    }
    if d1 >> 5 != 0 {
        return Err(BocError::UnsupportedCell {
            index,
            reason: "non-zero level",
        });
    }
    let ref_count = usize::from(d1 & D1_REFS_MASK);
    if ref_count > MAX_REFS {
        return Err(BocError::UnsupportedCell {
            index,
            reason: "more than four references",
        });
    }

    let data_len = usize::from(d2).div_ceil(2);
    let mut data = reader.take(data_len)?.to_vec();
    let bit_len = if d2 % 2 == 1 {
        let last = data.last().copied().unwrap_or(0);
        if last == 0 {
            return Err(BocError::UnsupportedCell {
                index,
                reason: "missing completion tag",
            });
        }
        let trailing = last.trailing_zeros() as usize;
        if let Some(byte) = data.last_mut() {
            *byte &= !(1u8 << trailing);
        }
        data_len * 8 - trailing - 1
    } else {
        data_len * 8
    };

    let mut references = Vec::with_capacity(ref_count);
    for _ in 0..ref_count {
        references.push(reader.uint(size_bytes)?);
    }

    Ok(RawCell {
        data,
        bit_len,
        references,
    })
}

/// Decode a bag of cells and return its roots
pub fn parse_boc(bytes: &[u8]) -> Result<Vec<CellRef>> {
    let mut reader = Reader::new(bytes);

    let magic = u32::from_be_bytes([reader.u8()?, reader.u8()?, reader.u8()?, reader.u8()?]);
    if magic != BOC_MAGIC {
        return Err(BocError::InvalidMagic(magic));
    }

    let flags = reader.u8()?;
    let has_idx = flags & FLAG_HAS_IDX != 0;
    let has_crc = flags & FLAG_HAS_CRC32C != 0;
    let size_bytes = usize::from(flags & SIZE_MASK);
    if size_bytes == 0 || size_bytes > 4 {
        return Err(BocError::InvalidHeader(format!(
            "reference size {size_bytes} out of range"
        )));
    }
    let off_bytes = usize::from(reader.u8()?);
    if off_bytes == 0 || off_bytes > 8 {
        return Err(BocError::InvalidHeader(format!(
            "offset size {off_bytes} out of range"
        )));
    }

    if has_crc {
        if bytes.len() < reader.pos + 4 {
            return Err(BocError::Truncated {
                offset: reader.pos,
                needed: 4,
            });
        }
        let (payload, trailer) = bytes.split_at(bytes.len() - 4);
        let expected = CRC32C.checksum(payload);
        let actual = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        if expected != actual {
            return Err(BocError::ChecksumMismatch { expected, actual });
        }
        reader.bytes = payload;
    }

    let cell_count = reader.uint(size_bytes)?;
    let root_count = reader.uint(size_bytes)?;
    let _absent = reader.uint(size_bytes)?;
    let total_size = reader.uint(off_bytes)?;

    // Every cell takes at least its two descriptor bytes
    if cell_count == 0 || cell_count > reader.remaining() / 2 {
        return Err(BocError::InvalidHeader(format!(
            "cell count {cell_count} inconsistent with {} bytes",
            bytes.len()
        )));
    }
    if root_count == 0 || root_count > cell_count {
        return Err(BocError::InvalidHeader(format!(
            "root count {root_count} out of range"
        )));
    }

    let mut roots = Vec::with_capacity(root_count);
    for _ in 0..root_count {
        let root = reader.uint(size_bytes)?;
        if root >= cell_count {
            return Err(BocError::InvalidHeader(format!("root index {root} out of range")));
        }
        roots.push(root);
    }

    if has_idx {
        reader.take(cell_count * off_bytes)?;
    }

    let mut cells_reader = Reader::new(reader.take(total_size)?);
    if reader.remaining() != 0 {
        return Err(BocError::InvalidHeader(format!(
            "{} trailing bytes after cell data",
            reader.remaining()
        )));
    }

    let mut raw = Vec::with_capacity(cell_count);
    for index in 0..cell_count {
        raw.push(read_raw_cell(&mut cells_reader, index, size_bytes)?);
    }
    if cells_reader.remaining() != 0 {
        return Err(BocError::InvalidHeader(format!(
            "cell data size {total_size} does not match contents"
        )));
    }

    let mut built: Vec<Option<CellRef>> = vec![None; cell_count];
    for (index, cell) in raw.into_iter().enumerate().rev() {
        let mut references = Vec::with_capacity(cell.references.len());
        for reference in cell.references {
            let child = (reference > index)
                .then(|| built.get(reference).cloned().flatten())
                .flatten()
                .ok_or(BocError::InvalidReference {
                    cell: index,
                    reference,
                })?;
            references.push(child);
        }
        built[index] = Some(Cell::new(cell.data, cell.bit_len, references)?.into_ref());
    }

    log::debug!("Parsed BOC: {cell_count} cells, {root_count} roots");

    roots
        .into_iter()
        .map(|index| {
            built[index].clone().ok_or_else(|| {
                BocError::InvalidHeader(format!("root index {index} was not decoded"))
            })
        })
        .collect()
}

/// Decode a bag of cells that must contain exactly one root
pub fn parse_boc_single(bytes: &[u8]) -> Result<CellRef> {
    let mut roots = parse_boc(bytes)?;
    if roots.len() != 1 {
        return Err(BocError::RootCount(roots.len()));
    }
    roots.pop().ok_or(BocError::RootCount(0))
}

/// Decode a base64 bag of cells with a single root
pub fn from_base64(encoded: &str) -> Result<CellRef> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| BocError::Base64(e.to_string()))?;
    parse_boc_single(&bytes)
}

fn collect_cells(
    cell: &CellRef,
    seen: &mut HashSet<[u8; 32]>,
    post_order: &mut Vec<CellRef>,
) {
    if !seen.insert(*cell.hash()) {
        return;
    }
    for reference in cell.references() {
        collect_cells(reference, seen, post_order);
    }
    post_order.push(cell.clone());
}

fn bytes_needed(value: usize) -> usize {
    let bits = usize::BITS - value.leading_zeros();
    (bits as usize).div_ceil(8).max(1)
}

fn push_uint(out: &mut Vec<u8>, value: usize, len: usize) {
    let be = value.to_be_bytes();
    out.extend_from_slice(&be[be.len() - len..]);
}

/// Encode a single-root bag of cells with a CRC-32C trailer and no index
///
/// Identical subtrees are stored once.
pub fn serialize_boc(root: &CellRef) -> Result<Vec<u8>> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    collect_cells(root, &mut seen, &mut order);
    order.reverse();

    let positions: HashMap<[u8; 32], usize> = order
        .iter()
        .enumerate()
        .map(|(index, cell)| (*cell.hash(), index))
        .collect();

    let size_bytes = bytes_needed(order.len());
    let mut cell_data = Vec::new();
    for cell in &order {
        cell_data.extend_from_slice(&cell.descriptors());
        cell_data.extend_from_slice(&cell.padded_data());
        for reference in cell.references() {
            let index = positions.get(reference.hash()).copied().ok_or_else(|| {
                BocError::InvalidHeader("reference missing from cell list".to_string())
            })?;
            push_uint(&mut cell_data, index, size_bytes);
        }
    }
    let off_bytes = bytes_needed(cell_data.len());
    let header_size = |value: usize| {
        u8::try_from(value)
            .map_err(|_| BocError::InvalidHeader(format!("field width {value} too large")))
    };

    let mut out = Vec::with_capacity(cell_data.len() + 32);
    out.extend_from_slice(&BOC_MAGIC.to_be_bytes());
    out.push(FLAG_HAS_CRC32C | (header_size(size_bytes)? & SIZE_MASK));
    out.push(header_size(off_bytes)?);
    push_uint(&mut out, order.len(), size_bytes);
    push_uint(&mut out, 1, size_bytes);
    push_uint(&mut out, 0, size_bytes);
    push_uint(&mut out, cell_data.len(), off_bytes);
    push_uint(&mut out, 0, size_bytes);
    out.extend_from_slice(&cell_data);

    let crc = CRC32C.checksum(&out);
    out.extend_from_slice(&crc.to_le_bytes());

    log::debug!(
        "Serialized BOC: {} cells, {} bytes",
        order.len(),
        out.len()
    );
    Ok(out)
}

/// Encode a single-root bag of cells as standard base64
pub fn to_base64(root: &CellRef) -> Result<String> {
    Ok(STANDARD.encode(serialize_boc(root)?))
}
