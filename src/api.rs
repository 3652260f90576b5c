//! High-level facade.
//!
//! [`ParamSwap`] covers the common cases with default settings; [`ParamSwapBuilder`]
//! selects the parameter set, the commit mode and payload compression.

use std::io::Write;
use std::path::Path;

use tracing::{debug, info};

use crate::commit::CommitMode;
use crate::error::Result;
use crate::io::DatasetWriter;
use crate::live::LiveTables;
use crate::reader::DatasetReader;
use crate::session::{RehydrationSession, SessionConfig, SessionReport};
use crate::typemap::TypeMap;
use crate::value::Value;

/// The main entry point for applying and producing parameter files.
#[derive(Debug)]
pub struct ParamSwap;

impl ParamSwap {
    /// Starts a configured operation.
    pub fn builder() -> ParamSwapBuilder {
        ParamSwapBuilder::default()
    }

    /// Reads the parameter file at `path` and applies it to `memory`.
    pub fn apply_file<P, M, L>(path: P, type_map: &M, live: &L, memory: &mut [u8]) -> Result<SessionReport>
    where
        P: AsRef<Path>,
        M: TypeMap + ?Sized,
        L: LiveTables + ?Sized,
    {
        Self::builder().apply_file(path, type_map, live, memory)
    }

    /// Applies a parameter file held in memory.
    pub fn apply_bytes<M, L>(bytes: &[u8], type_map: &M, live: &L, memory: &mut [u8]) -> Result<SessionReport>
    where
        M: TypeMap + ?Sized,
        L: LiveTables + ?Sized,
    {
        Self::builder().apply_bytes(bytes, type_map, live, memory)
    }

    /// Applies an already decoded dataset. Consumed buffers are detached from `root`.
    pub fn apply<M, L>(root: &mut Value, type_map: &M, live: &L, memory: &mut [u8]) -> Result<SessionReport>
    where
        M: TypeMap + ?Sized,
        L: LiveTables + ?Sized,
    {
        Self::builder().apply(root, type_map, live, memory)
    }

    /// Applies the parameter file at `path` if one is configured; `None` is a no-op.
    pub fn apply_optional<P, M, L>(
        path: Option<P>,
        type_map: &M,
        live: &L,
        memory: &mut [u8],
    ) -> Result<SessionReport>
    where
        P: AsRef<Path>,
        M: TypeMap + ?Sized,
        L: LiveTables + ?Sized,
    {
        Self::builder().apply_optional(path, type_map, live, memory)
    }

    /// Reads and decodes a parameter file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Value> {
        DatasetReader::open(path)?.read_value()
    }

    /// Decodes a parameter file held in memory.
    pub fn load_bytes(bytes: &[u8]) -> Result<Value> {
        DatasetReader::from_bytes(bytes)?.read_value()
    }

    /// Writes `root` as an uncompressed parameter file at `path`.
    pub fn save<P: AsRef<Path>>(path: P, root: &Value) -> Result<()> {
        Self::builder().save(path, root)
    }

    /// Writes `root` as an uncompressed parameter file to `writer`.
    pub fn write<W: Write>(writer: W, root: &Value) -> Result<()> {
        Self::builder().write(writer, root)
    }
}

/// Configures a [`ParamSwap`] operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParamSwapBuilder {
    config: SessionConfig,
    compression: bool,
}

impl ParamSwapBuilder {
    /// Selects the 1-based parameter set applied from a multi-set dataset.
    #[must_use]
    pub fn parameter_set(mut self, parameter_set: usize) -> Self {
        self.config.parameter_set = parameter_set;
        self
    }

    /// Selects how leaves reach live memory.
    #[must_use]
    pub fn commit_mode(mut self, commit_mode: CommitMode) -> Self {
        self.config.commit_mode = commit_mode;
        self
    }

    /// Replaces the whole session configuration.
    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Compresses written payloads (LZ4, feature `lz4_flex`).
    #[must_use]
    pub fn compression(mut self, enable: bool) -> Self {
        self.compression = enable;
        self
    }

    /// See [`ParamSwap::apply_file`].
    pub fn apply_file<P, M, L>(&self, path: P, type_map: &M, live: &L, memory: &mut [u8]) -> Result<SessionReport>
    where
        P: AsRef<Path>,
        M: TypeMap + ?Sized,
        L: LiveTables + ?Sized,
    {
        let mut root = DatasetReader::open(path)?.read_value()?;
        self.apply(&mut root, type_map, live, memory)
    }

    /// See [`ParamSwap::apply_bytes`].
    pub fn apply_bytes<M, L>(&self, bytes: &[u8], type_map: &M, live: &L, memory: &mut [u8]) -> Result<SessionReport>
    where
        M: TypeMap + ?Sized,
        L: LiveTables + ?Sized,
    {
        let mut root = DatasetReader::from_bytes(bytes)?.read_value()?;
        self.apply(&mut root, type_map, live, memory)
    }

    /// See [`ParamSwap::apply`].
    pub fn apply<M, L>(&self, root: &mut Value, type_map: &M, live: &L, memory: &mut [u8]) -> Result<SessionReport>
    where
        M: TypeMap + ?Sized,
        L: LiveTables + ?Sized,
    {
        RehydrationSession::new(type_map, live)
            .with_config(self.config)
            .rehydrate(root, memory)
    }

    /// See [`ParamSwap::apply_optional`].
    pub fn apply_optional<P, M, L>(
        &self,
        path: Option<P>,
        type_map: &M,
        live: &L,
        memory: &mut [u8],
    ) -> Result<SessionReport>
    where
        P: AsRef<Path>,
        M: TypeMap + ?Sized,
        L: LiveTables + ?Sized,
    {
        match path {
            Some(path) => self.apply_file(path, type_map, live, memory),
            None => {
                debug!("no parameter file configured");
                Ok(SessionReport::default())
            }
        }
    }

    /// Writes `root` as a parameter file at `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P, root: &Value) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.writer().save(path, root)?;
        info!(path = %path.display(), bytes, "saved parameter file");
        Ok(())
    }

    /// Writes `root` as a parameter file to `writer`.
    pub fn write<W: Write>(&self, writer: W, root: &Value) -> Result<()> {
        self.writer().write(writer, root).map(|_| ())
    }

    fn writer(&self) -> DatasetWriter {
        if self.compression {
            DatasetWriter::compressed()
        } else {
            DatasetWriter::new()
        }
    }
}
