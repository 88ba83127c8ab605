//! Address, cell and bag-of-cells primitives
//!
//! The signer builds wallet messages and sign-data payloads as trees of
//! cells and signs their representation hashes. This crate provides the
//! three pieces that requires:
//!
//! - [`address`]: raw and user-friendly account addresses
//! - [`cell`]: immutable cells, a bit-level builder and a read cursor
//! - [`boc`]: the bag-of-cells wire format used to ship cells as base64
//!
//! # Example
//!
//! ```rust
//! use tonsign_cell::{CellBuilder, boc};
//!
//! let mut builder = CellBuilder::new();
//! builder.store_u32(0).unwrap().store_string_tail(b"Hello, TON!").unwrap();
//! let cell = builder.build().unwrap().into_ref();
//!
//! let encoded = boc::to_base64(&cell).unwrap();
//! assert_eq!(boc::from_base64(&encoded).unwrap().hash(), cell.hash());
//! ```

#![warn(missing_docs)]

pub mod address;
pub mod boc;
pub mod cell;

pub use address::{Address, AddressError, FriendlyFlags};
pub use boc::{BocError, parse_boc, parse_boc_single, serialize_boc};
pub use cell::{Cell, CellBuilder, CellError, CellRef, CellSlice};
