//! Ordinary cells, the builder that writes them and the slice that reads them
//!
//! A cell holds up to 1023 data bits and up to 4 references to other cells.
//! Cells are immutable once built; the representation hash and depth are
//! computed at construction so that hashing a tree never recurses more than
//! once per cell.
//!
//! # Representation hash
//! ```text
//! sha256( d1 || d2 || data_with_completion_tag || depth(ref_i):be16... || hash(ref_i)... )
//! d1 = number of references          (ordinary cell, level 0)
//! d2 = floor(bits / 8) + ceil(bits / 8)
//! ```
//! When the bit length is not a multiple of 8, a single `1` bit followed by
//! zeros pads the data to the next byte boundary.

use crate::address::{Address, AddressError};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Maximum number of data bits in one cell
pub const MAX_BITS: usize = 1023;

/// Maximum number of references in one cell
pub const MAX_REFS: usize = 4;

/// Deepest tree a cell may root
pub const MAX_DEPTH: u16 = 1024;

/// Bits taken by a standard address (`addr_std` without anycast)
pub const ADDRESS_BITS: usize = 2 + 1 + 8 + 256;

/// Shared handle to an immutable cell
pub type CellRef = Arc<Cell>;

/// Cell construction and reading errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CellError {
    /// Writing past the 1023-bit limit
    #[error("Cell overflow: {requested} bits requested, {available} available")]
    BitOverflow {
        /// Bits the write needed
        requested: usize,
        /// Bits left in the cell
        available: usize,
    },

    /// Adding a fifth reference
    #[error("Cell overflow: at most {MAX_REFS} references allowed")]
    RefOverflow,

    /// Integer does not fit the requested width
    #[error("Value {value} does not fit in {bits} bits")]
    ValueOutOfRange {
        /// The rejected value, rendered
        value: String,
        /// Requested field width
        bits: usize,
    },

    /// Raw data length disagrees with the bit length
    #[error("Cell data of {len} bytes cannot hold {bits} bits")]
    DataLength {
        /// Data length in bytes
        len: usize,
        /// Declared bit length
        bits: usize,
    },

    /// Reading past the end of the data
    #[error("Cell underflow: {requested} bits requested, {available} remaining")]
    BitUnderflow {
        /// Bits the read needed
        requested: usize,
        /// Bits left to read
        available: usize,
    },

    /// Reading a reference that is not there
    #[error("Cell underflow: no reference at index {0}")]
    RefUnderflow(usize),

    /// Tree below the cell is deeper than [`MAX_DEPTH`]
    #[error("Cell depth exceeds {MAX_DEPTH}")]
    DepthOverflow,

    /// Address is not a standard `addr_std$10` without anycast
    #[error("Unsupported address encoding")]
    UnsupportedAddress,

    /// Address could not be encoded
    #[error(transparent)]
    Address(#[from] AddressError),
}

/// Result type for cell operations
pub type Result<T> = std::result::Result<T, CellError>;

/// Immutable ordinary cell
#[derive(Clone)]
pub struct Cell {
    data: Vec<u8>,
    bit_len: usize,
    references: Vec<CellRef>,
    hash: [u8; 32],
    depth: u16,
}

fn bit_at(data: &[u8], index: usize) -> bool {
    (data[index / 8] >> (7 - index % 8)) & 1 == 1
}

impl Cell {
    /// Create a cell from raw data, validating limits
    ///
    /// Bits beyond `bit_len` in the last byte are cleared.
    pub fn new(mut data: Vec<u8>, bit_len: usize, references: Vec<CellRef>) -> Result<Self> {
        if bit_len > MAX_BITS {
            return Err(CellError::BitOverflow {
                requested: bit_len,
                available: MAX_BITS,
            });
        }
        if references.len() > MAX_REFS {
            return Err(CellError::RefOverflow);
        }
        if data.len() != bit_len.div_ceil(8) {
            return Err(CellError::DataLength {
                len: data.len(),
                bits: bit_len,
            });
        }

        let used = bit_len % 8;
        if used != 0
            && let Some(last) = data.last_mut()
        {
            *last &= 0xFF << (8 - used);
        }

        Self::finish(data, bit_len, references)
    }

    /// The cell with no data and no references
    #[must_use]
    pub fn empty() -> Self {
        Self::with_depth(Vec::new(), 0, Vec::new(), 0)
    }

    fn finish(data: Vec<u8>, bit_len: usize, references: Vec<CellRef>) -> Result<Self> {
        let depth = match references.iter().map(|r| r.depth).max() {
            None => 0,
            Some(deepest) if deepest >= MAX_DEPTH => return Err(CellError::DepthOverflow),
            Some(deepest) => deepest + 1,
        };
        Ok(Self::with_depth(data, bit_len, references, depth))
    }

    fn with_depth(data: Vec<u8>, bit_len: usize, references: Vec<CellRef>, depth: u16) -> Self {
        let mut cell = Self {
            data,
            bit_len,
            references,
            hash: [0u8; 32],
            depth,
        };
        cell.hash = cell.compute_hash();
        cell
    }

    fn compute_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.descriptors());
        hasher.update(self.padded_data());
        for reference in &self.references {
            hasher.update(reference.depth.to_be_bytes());
        }
        for reference in &self.references {
            hasher.update(reference.hash);
        }
        hasher.finalize().into()
    }

    /// Descriptor bytes `d1`, `d2` shared by hashing and serialization
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "references <= 4 and bits <= 1023 keep both descriptors below 256"
    )]
    pub fn descriptors(&self) -> [u8; 2] {
        let d1 = self.references.len() as u8;
        let d2 = (self.bit_len / 8 + self.bit_len.div_ceil(8)) as u8;
        [d1, d2]
    }

    /// Data bytes with the completion tag applied
    #[must_use]
    pub fn padded_data(&self) -> Vec<u8> {
        let mut data = self.data.clone();
        let used = self.bit_len % 8;
        if used != 0
            && let Some(last) = data.last_mut()
        {
            *last |= 0x80 >> used;
        }
        data
    }

    /// Representation hash
    #[must_use]
    pub fn hash(&self) -> &[u8; 32] {
        &self.hash
    }

    /// Depth of the tree below this cell
    #[must_use]
    pub fn depth(&self) -> u16 {
        self.depth
    }

    /// Number of data bits
    #[must_use]
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Raw data bytes (unused trailing bits are zero)
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Child references
    #[must_use]
    pub fn references(&self) -> &[CellRef] {
        &self.references
    }

    /// Child reference at `index`
    #[must_use]
    pub fn reference(&self, index: usize) -> Option<&CellRef> {
        self.references.get(index)
    }

    /// Start reading this cell from the beginning
    #[must_use]
    pub fn parser(&self) -> CellSlice<'_> {
        CellSlice {
            cell: self,
            bit_pos: 0,
            ref_pos: 0,
        }
    }

    /// Wrap in a shared handle
    #[must_use]
    pub fn into_ref(self) -> CellRef {
        Arc::new(self)
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for Cell {}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("bits", &self.bit_len)
            .field("data", &hex::encode(&self.data))
            .field("refs", &self.references.len())
            .field("hash", &hex::encode(self.hash))
            .finish()
    }
}

/// Bit-level writer for a single cell
#[derive(Debug, Clone, Default)]
pub struct CellBuilder {
    data: Vec<u8>,
    bit_len: usize,
    references: Vec<CellRef>,
}

impl CellBuilder {
    /// Create an empty builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bits written so far
    #[must_use]
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Bits that can still be written
    #[must_use]
    pub fn remaining_bits(&self) -> usize {
        MAX_BITS - self.bit_len
    }

    /// References that can still be added
    #[must_use]
    pub fn remaining_refs(&self) -> usize {
        MAX_REFS - self.references.len()
    }

    fn ensure_bits(&self, requested: usize) -> Result<()> {
        if requested > self.remaining_bits() {
            return Err(CellError::BitOverflow {
                requested,
                available: self.remaining_bits(),
            });
        }
        Ok(())
    }

    fn push_bit(&mut self, bit: bool) {
        if self.bit_len % 8 == 0 {
            self.data.push(0);
        }
        if bit {
            let last = self.data.len() - 1;
            self.data[last] |= 0x80 >> (self.bit_len % 8);
        }
        self.bit_len += 1;
    }

    /// Write one bit
    pub fn store_bit(&mut self, bit: bool) -> Result<&mut Self> {
        self.ensure_bits(1)?;
        self.push_bit(bit);
        Ok(self)
    }

    /// Write an unsigned integer as `bits` big-endian bits
    pub fn store_uint(&mut self, bits: usize, value: u128) -> Result<&mut Self> {
        if bits > 128 || (bits < 128 && value >> bits != 0) {
            return Err(CellError::ValueOutOfRange {
                value: value.to_string(),
                bits,
            });
        }
        self.ensure_bits(bits)?;
        for i in (0..bits).rev() {
            self.push_bit((value >> i) & 1 == 1);
        }
        Ok(self)
    }

    /// Write a signed integer in two's complement as `bits` bits
    pub fn store_int(&mut self, bits: usize, value: i64) -> Result<&mut Self> {
        let wide = i128::from(value);
        let in_range = (1..=64).contains(&bits) && {
            let half = 1i128 << (bits - 1);
            (-half..half).contains(&wide)
        };
        if !in_range {
            return Err(CellError::ValueOutOfRange {
                value: value.to_string(),
                bits,
            });
        }
        let mask = (1u128 << bits) - 1;
        let raw = u128::from_ne_bytes(wide.to_ne_bytes()) & mask;
        self.store_uint(bits, raw)
    }

    /// Write an 8-bit unsigned integer
    pub fn store_u8(&mut self, value: u8) -> Result<&mut Self> {
        self.store_uint(8, u128::from(value))
    }

    /// Write a 32-bit unsigned integer
    pub fn store_u32(&mut self, value: u32) -> Result<&mut Self> {
        self.store_uint(32, u128::from(value))
    }

    /// Write a 64-bit unsigned integer
    pub fn store_u64(&mut self, value: u64) -> Result<&mut Self> {
        self.store_uint(64, u128::from(value))
    }

    /// Write raw bytes
    pub fn store_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        self.ensure_bits(bytes.len() * 8)?;
        if self.bit_len % 8 == 0 {
            self.data.extend_from_slice(bytes);
            self.bit_len += bytes.len() * 8;
        } else {
            for byte in bytes {
                for i in (0..8).rev() {
                    self.push_bit((byte >> i) & 1 == 1);
                }
            }
        }
        Ok(self)
    }

    /// Write a token amount as `VarUInteger 16` (4-bit byte length, then value)
    pub fn store_coins(&mut self, amount: u128) -> Result<&mut Self> {
        if amount == 0 {
            return self.store_uint(4, 0);
        }
        let len = (128 - amount.leading_zeros() as usize).div_ceil(8);
        if len > 15 {
            return Err(CellError::ValueOutOfRange {
                value: amount.to_string(),
                bits: 120,
            });
        }
        self.ensure_bits(4 + len * 8)?;
        self.store_uint(4, len as u128)?;
        self.store_uint(len * 8, amount)
    }

    /// Write a standard address (`addr_std$10`, no anycast)
    pub fn store_address(&mut self, address: &Address) -> Result<&mut Self> {
        let workchain = address.workchain_i8()?;
        self.ensure_bits(ADDRESS_BITS)?;
        self.store_uint(2, 0b10)?;
        self.store_bit(false)?;
        self.store_int(8, i64::from(workchain))?;
        self.store_bytes(&address.hash)
    }

    /// Write the empty address (`addr_none$00`)
    pub fn store_address_none(&mut self) -> Result<&mut Self> {
        self.store_uint(2, 0)
    }

    /// Add a child reference
    pub fn store_reference(&mut self, cell: CellRef) -> Result<&mut Self> {
        if self.references.len() >= MAX_REFS {
            return Err(CellError::RefOverflow);
        }
        self.references.push(cell);
        Ok(self)
    }

    /// Write `Maybe ^Cell`: a presence bit and, if present, the reference
    pub fn store_maybe_reference(&mut self, cell: Option<CellRef>) -> Result<&mut Self> {
        match cell {
            Some(cell) => {
                if self.references.len() >= MAX_REFS {
                    return Err(CellError::RefOverflow);
                }
                self.store_bit(true)?;
                self.store_reference(cell)
            }
            None => self.store_bit(false),
        }
    }

    /// Append the bits and references of another cell
    pub fn store_cell(&mut self, cell: &Cell) -> Result<&mut Self> {
        self.ensure_bits(cell.bit_len())?;
        if self.remaining_refs() < cell.references().len() {
            return Err(CellError::RefOverflow);
        }
        for i in 0..cell.bit_len() {
            self.push_bit(bit_at(cell.data(), i));
        }
        self.references.extend(cell.references().iter().cloned());
        Ok(self)
    }

    /// Write bytes as a snake tail: what fits here, the rest in a chained reference
    pub fn store_string_tail(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        let fits = self.remaining_bits() / 8;
        if bytes.len() <= fits {
            return self.store_bytes(bytes);
        }
        if self.remaining_refs() == 0 {
            return Err(CellError::RefOverflow);
        }

        let (head, tail) = bytes.split_at(fits);
        self.store_bytes(head)?;
        let mut next = CellBuilder::new();
        next.store_string_tail(tail)?;
        self.store_reference(next.build()?.into_ref())
    }

    /// Write bytes as a snake tail starting in a fresh referenced cell
    pub fn store_string_ref_tail(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        let mut tail = CellBuilder::new();
        tail.store_string_tail(bytes)?;
        self.store_reference(tail.build()?.into_ref())
    }

    /// Finish the cell
    pub fn build(&self) -> Result<Cell> {
        Cell::new(self.data.clone(), self.bit_len, self.references.clone())
    }
}

/// Read cursor over a cell's bits and references
#[derive(Debug, Clone)]
pub struct CellSlice<'a> {
    cell: &'a Cell,
    bit_pos: usize,
    ref_pos: usize,
}

impl<'a> CellSlice<'a> {
    /// Bits left to read
    #[must_use]
    pub fn remaining_bits(&self) -> usize {
        self.cell.bit_len - self.bit_pos
    }

    /// References left to read
    #[must_use]
    pub fn remaining_refs(&self) -> usize {
        self.cell.references.len() - self.ref_pos
    }

    fn ensure_bits(&self, requested: usize) -> Result<()> {
        if requested > self.remaining_bits() {
            return Err(CellError::BitUnderflow {
                requested,
                available: self.remaining_bits(),
            });
        }
        Ok(())
    }

    /// Skip `bits` bits
    pub fn skip_bits(&mut self, bits: usize) -> Result<()> {
        self.ensure_bits(bits)?;
        self.bit_pos += bits;
        Ok(())
    }

    /// Read one bit
    pub fn load_bit(&mut self) -> Result<bool> {
        self.ensure_bits(1)?;
        let bit = bit_at(&self.cell.data, self.bit_pos);
        self.bit_pos += 1;
        Ok(bit)
    }

    /// Read an unsigned big-endian integer of `bits` bits (at most 128)
    pub fn load_uint(&mut self, bits: usize) -> Result<u128> {
        if bits > 128 {
            return Err(CellError::ValueOutOfRange {
                value: "u128".to_string(),
                bits,
            });
        }
        self.ensure_bits(bits)?;
        let mut value = 0u128;
        for _ in 0..bits {
            value = (value << 1) | u128::from(bit_at(&self.cell.data, self.bit_pos));
            self.bit_pos += 1;
        }
        Ok(value)
    }

    /// Read a 32-bit unsigned integer
    #[expect(clippy::cast_possible_truncation, reason = "load_uint(32) fits u32")]
    pub fn load_u32(&mut self) -> Result<u32> {
        Ok(self.load_uint(32)? as u32)
    }

    /// Read a 64-bit unsigned integer
    #[expect(clippy::cast_possible_truncation, reason = "load_uint(64) fits u64")]
    pub fn load_u64(&mut self) -> Result<u64> {
        Ok(self.load_uint(64)? as u64)
    }

    /// Read `len` bytes
    pub fn load_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        self.ensure_bits(len * 8)?;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            let mut byte = 0u8;
            for _ in 0..8 {
                byte = (byte << 1) | u8::from(bit_at(&self.cell.data, self.bit_pos));
                self.bit_pos += 1;
            }
            out.push(byte);
        }
        Ok(out)
    }

    /// Read the next reference
    pub fn load_reference(&mut self) -> Result<&'a CellRef> {
        let reference = self
            .cell
            .references
            .get(self.ref_pos)
            .ok_or(CellError::RefUnderflow(self.ref_pos))?;
        self.ref_pos += 1;
        Ok(reference)
    }

    /// Read a `VarUInteger 16` token amount
    #[expect(clippy::cast_possible_truncation, reason = "4-bit length fits usize")]
    pub fn load_coins(&mut self) -> Result<u128> {
        let len = self.load_uint(4)? as usize;
        self.load_uint(len * 8)
    }

    /// Read a standard address (`addr_std$10`, no anycast)
    pub fn load_address(&mut self) -> Result<Address> {
        self.ensure_bits(ADDRESS_BITS)?;
        if self.load_uint(2)? != 0b10 || self.load_bit()? {
            return Err(CellError::UnsupportedAddress);
        }
        let workchain = i32::from(i8::from_be_bytes([self.load_bytes(1)?[0]]));
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&self.load_bytes(32)?);
        Ok(Address::new(workchain, hash))
    }

    /// Read `Maybe ^Cell`
    pub fn load_maybe_reference(&mut self) -> Result<Option<&'a CellRef>> {
        if self.load_bit()? {
            self.load_reference().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Read a snake tail (remaining whole bytes, following the first reference chain)
    pub fn load_string_tail(&mut self) -> Result<Vec<u8>> {
        let mut out = self.load_bytes(self.remaining_bits() / 8)?;
        if self.remaining_refs() > 0 {
            let next = self.load_reference()?;
            out.extend(next.parser().load_string_tail()?);
        }
        Ok(out)
    }
}
