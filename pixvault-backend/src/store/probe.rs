//! Optional-column detection
//!

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};

use pixvault_shared::error::VaultError;
use tracing::debug;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProbeMode {
    /// Check on every call, picks up a column added while the process runs
    #[default]
    PerCall,
    /// Remember the first definitive answer for the life of the process
    Cached,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnState {
    Unknown,
    Present,
    Absent,
}

impl ColumnState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ColumnState::Present,
            2 => ColumnState::Absent,
            _ => ColumnState::Unknown,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ColumnState::Unknown => 0,
            ColumnState::Present => 1,
            ColumnState::Absent => 2,
        }
    }
}

/// Runs an operation against a column that may not exist yet, falling back
/// to an equivalent operation without it.
#[derive(Debug)]
pub struct SchemaProbe {
    column: &'static str,
    mode: ProbeMode,
    state: AtomicU8,
}

impl SchemaProbe {
    pub fn new(column: &'static str, mode: ProbeMode) -> Self {
        Self {
            column,
            mode,
            state: AtomicU8::new(ColumnState::Unknown.as_u8()),
        }
    }

    pub fn column(&self) -> &'static str {
        self.column
    }

    pub fn mode(&self) -> ProbeMode {
        self.mode
    }

    /// The last answer seen. Always `Unknown` in per-call mode.
    pub fn state(&self) -> ColumnState {
        ColumnState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn remember(&self, state: ColumnState) {
        if self.mode == ProbeMode::Cached {
            self.state.store(state.as_u8(), Ordering::Release);
        }
    }

    /// Tries `with_column` first. If the store says the probed column is
    /// missing, `without_column` runs instead and its result is returned as
    /// if the field were simply unset. Any other error is passed through.
    pub async fn run<T, W, WF, O, OF>(&self, with_column: W, without_column: O) -> Result<T, VaultError>
    where
        W: FnOnce() -> WF,
        WF: Future<Output = Result<T, VaultError>>,
        O: FnOnce() -> OF,
        OF: Future<Output = Result<T, VaultError>>,
    {
        if self.state() == ColumnState::Absent {
            return without_column().await;
        }

        match with_column().await {
            Ok(value) => {
                self.remember(ColumnState::Present);
                Ok(value)
            }
            Err(err) if err.missing_column() == Some(self.column) => {
                debug!(column = self.column, "optional column missing, using fallback");
                self.remember(ColumnState::Absent);
                without_column().await
            }
            Err(err) => Err(err),
        }
    }
}
