//! Live-memory side of the running model.
//!
//! The simulation owns one contiguous parameter block. Everything the engine writes is
//! addressed as a byte offset into that block ([`Address`]); the block itself is handed
//! to the committer as a `&mut [u8]`, so every write is bounds-checked.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::checksum::ModelChecksum;
use crate::error::{Result, SwapError};

/// A byte offset into the live parameter block.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(usize);

impl Address {
    /// Creates an address from a raw byte offset.
    pub const fn new(offset: usize) -> Self {
        Self(offset)
    }

    /// Returns the raw byte offset.
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Returns the address `bytes` past this one.
    pub fn offset(self, bytes: usize) -> Result<Self> {
        self.0.checked_add(bytes).map(Self).ok_or_else(|| {
            SwapError::validation(format!("address {self} + {bytes} bytes overflows"))
        })
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:#x})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Tables the running model exposes for non-struct parameters.
pub trait LiveTables {
    /// Checksum of the running model.
    fn checksum(&self) -> ModelChecksum;

    /// Resolves a transition table entry to the live address of its parameter data.
    fn transition_address(&self, index: usize) -> Option<Address>;

    /// Byte size the running model uses for one element of a data type id.
    ///
    /// Only real types appear here; complex values use twice this size, interleaved.
    fn live_byte_size(&self, data_type_id: usize) -> Option<usize>;
}

/// In-memory [`LiveTables`].
#[derive(Debug, Clone)]
pub struct StaticLiveTables {
    checksum: ModelChecksum,
    transitions: Vec<Address>,
    data_type_sizes: Vec<usize>,
}

impl StaticLiveTables {
    /// Creates tables for a model with the given checksum and data type size table.
    pub fn new(checksum: ModelChecksum, data_type_sizes: Vec<usize>) -> Self {
        Self {
            checksum,
            transitions: Vec::new(),
            data_type_sizes,
        }
    }

    /// Appends a transition table entry and returns its index.
    pub fn add_transition(&mut self, address: Address) -> usize {
        self.transitions.push(address);
        self.transitions.len() - 1
    }
}

impl LiveTables for StaticLiveTables {
    fn checksum(&self) -> ModelChecksum {
        self.checksum
    }

    fn transition_address(&self, index: usize) -> Option<Address> {
        self.transitions.get(index).copied()
    }

    fn live_byte_size(&self, data_type_id: usize) -> Option<usize> {
        self.data_type_sizes.get(data_type_id).copied()
    }
}
