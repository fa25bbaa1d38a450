//! Traits describing seed sources and the clock, plus shared helper types.

use std::fmt;
use std::io::Error as IoError;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::model::{DateRange, SlotDefinition, WindowParseError};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while loading slot definitions.
pub enum SourceError {
    /// Reading the backing file failed.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
    /// The source data could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),
    /// A time window in the source data is invalid.
    #[error("Window error: {0}")]
    Window(#[from] WindowParseError),
    /// A slot definition is structurally invalid.
    #[error("Invalid slot: {0}")]
    InvalidSlot(String),
    /// No source is registered under the id.
    #[error("Unknown source: {0}")]
    UnknownSource(SourceId),
    /// Internal source error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Identifier for a registered slot source.
pub struct SourceId(pub String);

impl fmt::Display for SourceId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Metadata describing a slot source.
pub struct SourceMeta {
    /// Unique identifier.
    pub id: SourceId,
    /// Human-friendly name.
    pub name: String,
}

#[async_trait]
/// Trait for backends that deliver the bookable slot universe.
pub trait SlotSource: Send + Sync {
    /// Metadata describing the source.
    fn meta(&self) -> &SourceMeta;

    /// Slot definitions whose date lies within `range`, sorted by slot key.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] when the backing data cannot be read or is invalid.
    async fn slots(&self, range: DateRange) -> Result<Vec<SlotDefinition>, SourceError>;
}

/// Source of booking timestamps.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
/// Wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug)]
/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, step: Duration) {
        let mut now = self.now.lock();
        *now += step;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
