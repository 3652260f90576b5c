//! Physical layout of parameter files.
//!
//! ```text
//! [Header (32 bytes)] [Payload]
//! ```
//!
//! | Offset | Size | Field                                             |
//! |--------|------|---------------------------------------------------|
//! | 0      | 4    | Magic `RTP1`                                      |
//! | 4      | 2    | Version (1)                                       |
//! | 6      | 1    | Compression id                                    |
//! | 7      | 1    | Reserved (0)                                      |
//! | 8      | 8    | Stored payload length                             |
//! | 16     | 8    | Uncompressed payload length                       |
//! | 24     | 8    | `XxHash64` (seed 0) of the stored payload          |
//!
//! All integers are little-endian. The payload is the bincode encoding (standard
//! config) of the dataset root [`crate::Value`], possibly compressed.

use std::hash::Hasher;

use twox_hash::XxHash64;

use crate::error::{Result, SwapError};

/// Magic bytes identifying a parameter file.
pub const MAGIC_BYTES: [u8; 4] = *b"RTP1";

/// Current format version.
pub const FORMAT_VERSION: u16 = 1;

/// Size of the fixed header.
pub const HEADER_SIZE: usize = 32;

/// The fixed header at the start of every parameter file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Format version.
    pub version: u16,
    /// Id of the compressor that produced the payload.
    pub compression_id: u8,
    /// Stored payload length in bytes.
    pub payload_len: u64,
    /// Payload length after decompression.
    pub uncompressed_len: u64,
    /// Hash of the stored payload.
    pub payload_hash: u64,
}

impl FileHeader {
    /// Creates a header describing `payload`.
    pub fn new(compression_id: u8, payload: &[u8], uncompressed_len: usize) -> Self {
        Self {
            version: FORMAT_VERSION,
            compression_id,
            payload_len: payload.len() as u64,
            uncompressed_len: uncompressed_len as u64,
            payload_hash: payload_hash(payload),
        }
    }

    /// Serializes the header.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&MAGIC_BYTES);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6] = self.compression_id;
        buf[8..16].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[16..24].copy_from_slice(&self.uncompressed_len.to_le_bytes());
        buf[24..32].copy_from_slice(&self.payload_hash.to_le_bytes());
        buf
    }

    /// Parses and checks the header at the start of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header = bytes.get(..HEADER_SIZE).ok_or_else(|| {
            SwapError::Format(format!(
                "file of {} bytes is smaller than the {HEADER_SIZE} byte header",
                bytes.len()
            ))
        })?;
        if header.get(0..4) != Some(&MAGIC_BYTES[..]) {
            return Err(SwapError::Format("invalid magic bytes".into()));
        }

        let version = u16::from_le_bytes(le_array(header, 4)?);
        if version != FORMAT_VERSION {
            return Err(SwapError::Format(format!("unsupported version: {version}")));
        }

        Ok(Self {
            version,
            compression_id: header.get(6).copied().unwrap_or_default(),
            payload_len: u64::from_le_bytes(le_array(header, 8)?),
            uncompressed_len: u64::from_le_bytes(le_array(header, 16)?),
            payload_hash: u64::from_le_bytes(le_array(header, 24)?),
        })
    }

    /// Returns the stored payload that follows the header in `bytes`, after checking
    /// its length and hash.
    pub fn payload<'a>(&self, bytes: &'a [u8]) -> Result<&'a [u8]> {
        let payload = usize::try_from(self.payload_len)
            .ok()
            .and_then(|len| HEADER_SIZE.checked_add(len))
            .and_then(|end| bytes.get(HEADER_SIZE..end))
            .ok_or_else(|| {
                SwapError::Format(format!(
                    "payload of {} bytes extends past the end of a {} byte file",
                    self.payload_len,
                    bytes.len()
                ))
            })?;

        let found = payload_hash(payload);
        if found != self.payload_hash {
            return Err(SwapError::Format(format!(
                "payload hash mismatch: header {:#018x}, payload {found:#018x}",
                self.payload_hash
            )));
        }
        Ok(payload)
    }
}

/// `XxHash64` (seed 0) of a stored payload.
pub fn payload_hash(payload: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(payload);
    hasher.finish()
}

fn le_array<const N: usize>(bytes: &[u8], at: usize) -> Result<[u8; N]> {
    bytes
        .get(at..at + N)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| SwapError::Format(format!("header field at {at} is truncated")))
}
