//! Model checksum gate.
//!
//! Every parameter dataset records the checksum of the model it was generated for.
//! A rehydration is only allowed when all four components match the running model
//! exactly.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SwapError};

/// Number of components in a model checksum.
pub const CHECKSUM_LEN: usize = 4;

/// A fixed 4-element numeric vector identifying a model version.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelChecksum([f64; CHECKSUM_LEN]);

impl ModelChecksum {
    /// Creates a checksum from its four components.
    pub const fn new(components: [f64; CHECKSUM_LEN]) -> Self {
        Self(components)
    }

    /// Returns the raw components.
    pub fn components(&self) -> [f64; CHECKSUM_LEN] {
        self.0
    }

    /// Fails with [`SwapError::ChecksumMismatch`] unless `found` equals `self` in every
    /// component.
    pub fn verify(&self, found: &ModelChecksum) -> Result<()> {
        if self.0.iter().zip(found.0.iter()).all(|(a, b)| a == b) {
            Ok(())
        } else {
            Err(SwapError::ChecksumMismatch {
                expected: *self,
                found: *found,
            })
        }
    }
}

impl From<[f64; CHECKSUM_LEN]> for ModelChecksum {
    fn from(components: [f64; CHECKSUM_LEN]) -> Self {
        Self(components)
    }
}

impl fmt::Display for ModelChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "[{a}, {b}, {c}, {d}]")
    }
}
