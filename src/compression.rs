//! Pluggable payload compression.
//!
//! A parameter file stores one payload (the encoded value tree). The header records the
//! id of the algorithm that produced it, and the reader resolves that id through a
//! [`CompressorRegistry`].

use std::borrow::Cow;

use crate::error::{Result, SwapError};

/// Interface for compression algorithms.
///
/// Each compressor is identified by the id stored in the parameter file header.
pub trait Compressor: Send + Sync + std::fmt::Debug {
    /// Id recorded in the file header. 0 is reserved for no compression.
    fn id(&self) -> u8;

    /// Human-readable algorithm name.
    fn name(&self) -> &'static str;

    /// Compresses the payload.
    fn compress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>>;

    /// Decompresses the payload.
    fn decompress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>>;
}

/// Pass-through compressor (id 0).
#[derive(Debug, Clone, Copy)]
pub struct NoCompression;

impl Compressor for NoCompression {
    fn id(&self) -> u8 {
        0
    }

    fn name(&self) -> &'static str {
        "None"
    }

    fn compress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        Ok(Cow::Borrowed(data))
    }

    fn decompress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        // Zero-copy: the reader hands us a slice of the memory map.
        Ok(Cow::Borrowed(data))
    }
}

#[cfg(feature = "lz4_flex")]
/// LZ4 block compressor (id 1), available with the `lz4_flex` feature.
#[derive(Debug, Clone, Copy)]
pub struct Lz4Compressor;

#[cfg(feature = "lz4_flex")]
impl Compressor for Lz4Compressor {
    fn id(&self) -> u8 {
        1
    }

    fn name(&self) -> &'static str {
        "LZ4"
    }

    fn compress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        Ok(Cow::Owned(lz4_flex::compress_prepend_size(data)))
    }

    fn decompress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        lz4_flex::decompress_size_prepended(data)
            .map(Cow::Owned)
            .map_err(|e| SwapError::Compression(e.to_string()))
    }
}

/// Maps header algorithm ids to compressors.
#[derive(Debug)]
pub struct CompressorRegistry {
    algorithms: Vec<Option<Box<dyn Compressor>>>,
}

impl CompressorRegistry {
    /// Creates a registry holding [`NoCompression`] and, with the `lz4_flex` feature,
    /// [`Lz4Compressor`].
    pub fn new() -> Self {
        let mut reg = Self {
            algorithms: Vec::new(),
        };
        reg.register(Box::new(NoCompression));
        #[cfg(feature = "lz4_flex")]
        reg.register(Box::new(Lz4Compressor));
        reg
    }

    /// Registers a compressor under its id, replacing any previous one.
    pub fn register(&mut self, algo: Box<dyn Compressor>) {
        let id = usize::from(algo.id());
        if id >= self.algorithms.len() {
            self.algorithms.resize_with(id + 1, || None);
        }
        if let Some(slot) = self.algorithms.get_mut(id) {
            *slot = Some(algo);
        }
    }

    /// Retrieves a compressor by id.
    ///
    /// # Errors
    /// Returns [`SwapError::Compression`] if the id is not registered.
    pub fn get(&self, id: u8) -> Result<&dyn Compressor> {
        self.algorithms
            .get(usize::from(id))
            .and_then(Option::as_ref)
            .map(|algo| algo.as_ref())
            .ok_or_else(|| {
                SwapError::Compression(format!(
                    "algorithm id {id} is not registered or available"
                ))
            })
    }
}

impl Default for CompressorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
