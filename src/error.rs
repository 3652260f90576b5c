//! Centralized error handling for paramswap.
//!
//! Every failure in the crate is reported through [`SwapError`]; library code never
//! panics and never unwraps (enforced by the clippy lints in `lib.rs`).
//!
//! ## Error Classes
//!
//! A rehydration attempt can fail in two fundamentally different ways, and callers
//! usually need to tell them apart:
//!
//! - **Pre-commit failures** ([`SwapError::Io`], [`SwapError::Serialization`],
//!   [`SwapError::Compression`], [`SwapError::Format`], [`SwapError::Validation`],
//!   [`SwapError::ChecksumMismatch`], [`SwapError::Allocation`],
//!   [`SwapError::Internal`]): detected while reading the parameter file, checking the
//!   model checksum, counting leaves, or building descriptors. Live memory has not been
//!   written yet.
//! - **Commit failures** ([`SwapError::SizeMismatch`], [`SwapError::Commit`]): detected
//!   while copying leaves into live memory. With the in-place commit mode, the leaves
//!   preceding the failing one have already been written.
//!
//! [`SwapError::leaves_memory_untouched`] answers the question for a given error.
//!
//! ## Usage
//!
//! ```rust
//! use paramswap::SwapError;
//!
//! fn report(err: &SwapError) {
//!     if err.leaves_memory_untouched() {
//!         eprintln!("rehydration rejected: {err}");
//!     } else {
//!         eprintln!("rehydration aborted mid-commit: {err}");
//!     }
//! }
//! # report(&SwapError::Validation("demo".into()));
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;

use crate::checksum::ModelChecksum;

/// A specialized `Result` type for paramswap operations.
pub type Result<T> = std::result::Result<T, SwapError>;

/// The master error enum covering all failure domains in paramswap.
///
/// This type is `Clone`: I/O errors are wrapped in `Arc` so a session report can keep a
/// copy of the error that ended it.
#[derive(Debug, Clone)]
pub enum SwapError {
    /// Low-level I/O failure while opening, mapping, or writing a parameter file.
    Io(Arc<io::Error>),

    /// The value tree could not be encoded or decoded (bincode).
    Serialization(String),

    /// Payload compression or decompression failed, or the algorithm id is unknown.
    Compression(String),

    /// The parameter file framing is invalid: wrong magic bytes, unsupported version,
    /// truncated payload, or payload hash mismatch.
    Format(String),

    /// The dataset does not have the shape the running model expects.
    ///
    /// ## Common Causes
    ///
    /// - Missing `dataTypeName` / `dataTypeId` / `complex` / `dtTransIdx` entry fields
    /// - `structParamInfo` absent or of a different length than `values`
    /// - A record without `ModelParam` / `CAPIIdx`
    /// - A numeric value where a struct value was expected (or the reverse)
    /// - A non-zero fixed-point index on a struct parameter
    /// - Type map lookups with out-of-range indices
    Validation(String),

    /// The dataset was produced for a different model version.
    ChecksumMismatch {
        /// Checksum of the running model.
        expected: ModelChecksum,
        /// Checksum recorded in the dataset.
        found: ModelChecksum,
    },

    /// The descriptor table could not be allocated.
    Allocation(String),

    /// A non-struct leaf's element size disagrees with the live data type size.
    ///
    /// Raised during commit; leaves before `leaf` may already be written.
    SizeMismatch {
        /// Position of the failing leaf in the descriptor table.
        leaf: usize,
        /// Data type id of the leaf.
        data_type: usize,
        /// Element size declared by the dataset.
        declared: usize,
        /// Element size used by the running model.
        live: usize,
    },

    /// Any other failure detected while copying leaves into live memory.
    Commit(String),

    /// Logic error inside the engine (e.g. counted and built descriptors disagree).
    Internal(String),
}

impl SwapError {
    /// Returns `true` if live memory is guaranteed to be unchanged after this error.
    ///
    /// Only commit-time errors can leave a partially updated parameter block behind, and
    /// only when the session committed in place.
    pub fn leaves_memory_untouched(&self) -> bool {
        !self.is_commit_error()
    }

    /// Returns `true` for errors raised while leaves were being copied.
    pub fn is_commit_error(&self) -> bool {
        matches!(self, Self::SizeMismatch { .. } | Self::Commit(_))
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl fmt::Display for SwapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O Error: {e}"),
            Self::Serialization(s) => write!(f, "Serialization Error: {s}"),
            Self::Compression(s) => write!(f, "Compression Error: {s}"),
            Self::Format(s) => write!(f, "Format Error: {s}"),
            Self::Validation(s) => write!(f, "Validation Error: {s}"),
            Self::ChecksumMismatch { expected, found } => write!(
                f,
                "model checksum mismatch - incorrect parameter data specified \
                 (model {expected}, dataset {found})"
            ),
            Self::Allocation(s) => write!(f, "Allocation Error: {s}"),
            Self::SizeMismatch {
                leaf,
                data_type,
                declared,
                live,
            } => write!(
                f,
                "parameter data type sizes in dataset not same as data type sizes in the \
                 running model (leaf {leaf}, data type {data_type}: dataset {declared} bytes, \
                 model {live} bytes)"
            ),
            Self::Commit(s) => write!(f, "Commit Error: {s}"),
            Self::Internal(s) => write!(f, "Internal Logic Error: {s}"),
        }
    }
}

impl std::error::Error for SwapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SwapError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
