//! # paramswap
//!
//! Live parameter rehydration for running simulations: read a new set of tunable
//! parameter values from a dataset, check that it was produced for the running model,
//! and overwrite the model's parameter block in place without restarting it.
//!
//! ## Overview
//!
//! The running model describes its parameter memory through a static **type map**
//! (which fields are scalars, which are structs or arrays of structs, their byte
//! offsets, sizes, fixed-point and complex attributes) and a handful of **live tables**
//! (model checksum, transition table, per-data-type sizes). A dataset is a
//! dynamically-typed **value tree**. The engine walks both in lock-step, flattens the
//! dataset into one descriptor per leaf, and bulk-copies every leaf into live memory.
//!
//! ## Architecture
//!
//! A rehydration runs four passes, orchestrated by [`RehydrationSession`]:
//!
//! 1. **Checksum gate.** The dataset's `modelChecksum` must equal the live checksum
//!    exactly; otherwise nothing else happens.
//! 2. **Counting** ([`counter`]). Computes how many leaf descriptors the dataset needs,
//!    without allocating them.
//! 3. **Building** ([`builder`]). Fills the [`DescriptorTable`], expanding struct arrays
//!    and moving every consumed buffer out of the value tree.
//! 4. **Commit** ([`commit`]). Reconciles element sizes with the running model and copies
//!    each leaf into the parameter block, interleaving real and imaginary parts of
//!    complex values.
//!
//! The descriptor table lives only for the duration of one session and is dropped on
//! every exit path.
//!
//! ### Parameter Files
//!
//! Datasets are stored as framed, optionally LZ4-compressed bincode payloads (see
//! [`format`]). [`DatasetReader`] memory-maps them; [`DatasetWriter`] produces them.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use paramswap::{CommitMode, ParamSwap};
//!
//! // `type_map` and `live` come from the running model, `block` is its parameter memory.
//! let report = ParamSwap::apply_file("tuned.rtp", &type_map, &live, &mut block)?;
//! println!("{} leaves written", report.commit.leaves_written);
//!
//! // Second parameter set, all-or-nothing commit.
//! ParamSwap::builder()
//!     .parameter_set(2)
//!     .commit_mode(CommitMode::Staged)
//!     .apply_file("tuned.rtp", &type_map, &live, &mut block)?;
//! ```
//!
//! ## Consistency
//!
//! Every failure before the commit pass leaves live memory untouched. A failure during
//! an in-place commit leaves the leaves before the failing one written; use
//! [`CommitMode::Staged`] when that is not acceptable. See
//! [`SwapError::leaves_memory_untouched`].
//!
//! ### Safety and Error Handling
//!
//! * **Bounds-checked writes:** live addresses are byte offsets into the parameter block
//!   slice, so a bad offset is an error, never a stray write.
//! * **Encapsulated Unsafe:** the only `unsafe` is the memory map in [`reader`].
//! * **No Panics:** No `unwrap()` or `panic!()` calls in the library (enforced by clippy lints).
//! * **Comprehensive Errors:** All failures correspond to a [`SwapError`] variant.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// --- PUBLIC API MODULES ---
pub mod api;
pub mod checksum;
pub mod compression;
pub mod dataset;
pub mod error;
pub mod format;
pub mod inspector;
pub mod live;
pub mod reader;
pub mod session;
pub mod typemap;
pub mod value;

// --- ENGINE PASSES ---
pub mod builder;
pub mod commit;
pub mod counter;
pub mod descriptor;

// --- INTERNAL IMPLEMENTATION MODULES (Hidden from Docs) ---
#[doc(hidden)]
pub mod io;

// --- RE-EXPORTS ---

#[cfg(feature = "lz4_flex")]
pub use compression::Lz4Compressor;
pub use compression::{Compressor, NoCompression};

pub use api::{ParamSwap, ParamSwapBuilder};
pub use checksum::ModelChecksum;
pub use commit::{CommitMode, CommitStats};
pub use descriptor::{DescriptorTable, LeafCounts, LeafDescriptor, LeafTarget};
pub use error::{Result, SwapError};
pub use inspector::{DatasetInspector, DatasetReport};
pub use io::DatasetWriter;
pub use live::{Address, LiveTables, StaticLiveTables};
pub use reader::DatasetReader;
pub use session::{RehydrationSession, SessionConfig, SessionReport};
pub use typemap::{FieldSpec, ParamScope, StaticTypeMap, TypeMap};
pub use value::{CellArray, ClassId, NumericArray, StructArray, Value};
