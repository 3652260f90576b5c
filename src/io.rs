//! The write side of parameter files.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::compression::{Compressor, NoCompression};
use crate::error::{Result, SwapError};
use crate::format::FileHeader;
use crate::value::Value;

/// Produces framed parameter files.
#[derive(Debug)]
pub struct DatasetWriter {
    compressor: Box<dyn Compressor>,
}

impl Default for DatasetWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetWriter {
    /// A writer that stores payloads uncompressed.
    pub fn new() -> Self {
        Self {
            compressor: Box::new(NoCompression),
        }
    }

    /// A writer that compresses payloads with `compressor`.
    pub fn with_compressor(compressor: Box<dyn Compressor>) -> Self {
        Self { compressor }
    }

    /// A writer that compresses payloads with LZ4 when the `lz4_flex` feature is
    /// enabled, and stores them uncompressed otherwise.
    pub fn compressed() -> Self {
        #[cfg(feature = "lz4_flex")]
        let writer = Self::with_compressor(Box::new(crate::compression::Lz4Compressor));
        #[cfg(not(feature = "lz4_flex"))]
        let writer = Self::new();
        writer
    }

    /// Encodes `value` into the bytes of a complete parameter file.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        let raw = encode_value(value)?;
        let payload = self.compressor.compress(&raw)?;
        let header = FileHeader::new(self.compressor.id(), &payload, raw.len());

        let mut out = Vec::with_capacity(crate::format::HEADER_SIZE + payload.len());
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Writes a parameter file to `writer`. Returns the number of bytes written.
    pub fn write<W: Write>(&self, mut writer: W, value: &Value) -> Result<u64> {
        let bytes = self.encode(value)?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        debug!(
            bytes = bytes.len(),
            compression = self.compressor.name(),
            "wrote parameter file"
        );
        Ok(bytes.len() as u64)
    }

    /// Creates (or truncates) `path` and writes a parameter file to it.
    pub fn save<P: AsRef<Path>>(&self, path: P, value: &Value) -> Result<u64> {
        let file = File::create(path)?;
        self.write(BufWriter::new(file), value)
    }
}

/// Encodes a value tree with bincode (standard config).
pub fn encode_value(value: &Value) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| SwapError::Serialization(e.to_string()))
}
