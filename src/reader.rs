//! The read side of parameter files.
//!
//! Handles memory-mapping the file, validating the header and payload hash, and
//! decoding the value tree.

use std::borrow::Cow;
use std::fs::File;
use std::ops::Range;
use std::path::Path;

use memmap2::Mmap;
use tracing::debug;

use crate::compression::CompressorRegistry;
use crate::error::{Result, SwapError};
use crate::format::{FileHeader, HEADER_SIZE};
use crate::value::Value;

#[derive(Debug)]
enum Source {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Source {
    fn bytes(&self) -> &[u8] {
        match self {
            Self::Mapped(mmap) => &mmap[..],
            Self::Owned(vec) => vec.as_slice(),
        }
    }
}

/// A validated parameter file, memory-mapped or held in memory.
#[derive(Debug)]
pub struct DatasetReader {
    source: Source,
    header: FileHeader,
    /// Byte range of the stored payload, hash-checked on open.
    payload: Range<usize>,
    registry: CompressorRegistry,
}

impl DatasetReader {
    /// Opens and validates a parameter file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;

        // Safety: the map is read-only; a concurrent writer truncating the file is
        // outside what the engine can guard against.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };

        debug!(path = %path.display(), bytes = mmap.len(), "mapped parameter file");
        Self::validate(Source::Mapped(mmap))
    }

    /// Validates a parameter file already loaded into memory.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        Self::validate(Source::Owned(bytes.into()))
    }

    fn validate(source: Source) -> Result<Self> {
        let header = FileHeader::from_bytes(source.bytes())?;
        let payload = HEADER_SIZE..HEADER_SIZE + header.payload(source.bytes())?.len();
        let registry = CompressorRegistry::new();
        registry.get(header.compression_id)?;
        Ok(Self {
            source,
            header,
            payload,
            registry,
        })
    }

    /// The file header.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Total size of the file in bytes.
    pub fn file_size(&self) -> u64 {
        self.source.bytes().len() as u64
    }

    /// Name of the compression algorithm used by the payload.
    pub fn compression_name(&self) -> Result<&'static str> {
        Ok(self.registry.get(self.header.compression_id)?.name())
    }

    /// The decompressed payload.
    pub fn payload(&self) -> Result<Cow<'_, [u8]>> {
        let stored = self
            .source
            .bytes()
            .get(self.payload.clone())
            .ok_or_else(|| SwapError::Internal("validated payload range left the file".into()))?;
        let payload = self
            .registry
            .get(self.header.compression_id)?
            .decompress(stored)?;
        if payload.len() as u64 != self.header.uncompressed_len {
            return Err(SwapError::Format(format!(
                "payload decompressed to {} bytes, header declares {}",
                payload.len(),
                self.header.uncompressed_len
            )));
        }
        Ok(payload)
    }

    /// Decodes the dataset root.
    pub fn read_value(&self) -> Result<Value> {
        decode_value(&self.payload()?)
    }
}

/// Decodes a bincode-encoded value tree.
pub fn decode_value(payload: &[u8]) -> Result<Value> {
    let (value, _) = bincode::serde::decode_from_slice(payload, bincode::config::standard())
        .map_err(|e| SwapError::Serialization(e.to_string()))?;
    Ok(value)
}
