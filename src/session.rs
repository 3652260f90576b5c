//! End-to-end rehydration of one dataset.
//!
//! A [`RehydrationSession`] runs the checksum gate, the counting pass, the descriptor
//! table allocation, the building pass and the commit, in that order. The descriptor
//! table is a local of [`RehydrationSession::rehydrate`], so it and every buffer it owns
//! are released on every exit path.
//!
//! Only one session may write a given parameter block at a time; the `&mut [u8]`
//! borrow makes that explicit.

use tracing::{debug, info, warn};

use crate::builder::build_descriptors;
use crate::commit::{commit_with_mode, CommitMode, CommitStats};
use crate::counter::count_dataset;
use crate::dataset::{parameters_mut, Dataset};
use crate::descriptor::{DescriptorTable, LeafCounts};
use crate::error::{Result, SwapError};
use crate::live::LiveTables;
use crate::typemap::TypeMap;
use crate::value::Value;

/// Tuning knobs of a rehydration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// 1-based parameter set, used when the dataset's `parameters` is a cell of sets.
    pub parameter_set: usize,
    /// How leaves reach live memory.
    pub commit_mode: CommitMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            parameter_set: 1,
            commit_mode: CommitMode::InPlace,
        }
    }
}

impl SessionConfig {
    /// Selects the parameter set.
    #[must_use]
    pub fn parameter_set(mut self, parameter_set: usize) -> Self {
        self.parameter_set = parameter_set;
        self
    }

    /// Selects the commit mode.
    #[must_use]
    pub fn commit_mode(mut self, commit_mode: CommitMode) -> Self {
        self.commit_mode = commit_mode;
        self
    }
}

/// What a successful rehydration did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionReport {
    /// Leaf counts of the selected parameter set. All zero when the dataset carried no
    /// parameters.
    pub counts: LeafCounts,
    /// Commit statistics.
    pub commit: CommitStats,
}

impl SessionReport {
    /// Whether the dataset carried nothing to apply.
    pub fn is_noop(&self) -> bool {
        self.counts.top_level_entries == 0
    }
}

/// Drives one rehydration against a running model.
#[derive(Debug)]
pub struct RehydrationSession<'m, M: ?Sized, L: ?Sized> {
    type_map: &'m M,
    live: &'m L,
    config: SessionConfig,
}

impl<'m, M, L> RehydrationSession<'m, M, L>
where
    M: TypeMap + ?Sized,
    L: LiveTables + ?Sized,
{
    /// Creates a session with the default configuration.
    pub fn new(type_map: &'m M, live: &'m L) -> Self {
        Self {
            type_map,
            live,
            config: SessionConfig::default(),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Applies the dataset rooted at `root` to `memory`.
    ///
    /// Every buffer consumed from `root` is detached from it, whatever the outcome.
    /// Errors other than [`SwapError::SizeMismatch`] and [`SwapError::Commit`] leave
    /// `memory` untouched; those two leave it untouched only in
    /// [`CommitMode::Staged`].
    pub fn rehydrate(&self, root: &mut Value, memory: &mut [u8]) -> Result<SessionReport> {
        let result = self.run(root, memory);
        if let Err(err) = &result {
            let untouched =
                err.leaves_memory_untouched() || self.config.commit_mode == CommitMode::Staged;
            warn!(error = %err, memory_untouched = untouched, "parameter rehydration aborted");
        }
        result
    }

    fn run(&self, root: &mut Value, memory: &mut [u8]) -> Result<SessionReport> {
        let counts = {
            let dataset = Dataset::new(root)?;
            self.live.checksum().verify(&dataset.checksum()?)?;

            let Some(params) = dataset.parameters(self.config.parameter_set)? else {
                debug!("dataset carries no parameters");
                return Ok(SessionReport::default());
            };
            if params.is_empty() {
                debug!("dataset parameter table is empty");
                return Ok(SessionReport::default());
            }

            info!(
                entries = params.len(),
                parameter_set = self.config.parameter_set,
                "starting parameter rehydration"
            );
            count_dataset(&params, self.type_map)?
        };

        let mut table = DescriptorTable::with_counts(counts)?;
        debug!(capacity = counts.total(), "allocated descriptor table");

        let entries = parameters_mut(root, self.config.parameter_set)?.ok_or_else(|| {
            SwapError::Internal("parameter table vanished between passes".to_string())
        })?;
        build_descriptors(entries, self.type_map, &mut table)?;
        if !table.is_complete() {
            return Err(SwapError::Internal(format!(
                "counted {} leaves but built {}",
                counts.total(),
                table.len()
            )));
        }

        let commit = commit_with_mode(
            self.config.commit_mode,
            &table,
            self.type_map,
            self.live,
            memory,
        )?;
        info!(
            leaves = commit.leaves_written,
            skipped = commit.leaves_skipped,
            bytes = commit.bytes_written,
            "parameter rehydration complete"
        );
        Ok(SessionReport { counts, commit })
    }
}
