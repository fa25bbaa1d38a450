//! Slot source reading explicit slot definitions from TOML.
//!
//! The expected layout is a list of `[[slots]]` tables:
//!
//! ```toml
//! [[slots]]
//! date = "2025-01-15"
//! window = "9:00 AM - 11:00 AM"
//! capacity = 5
//! booked = 2        # optional
//! disabled = false  # optional
//! ```

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tokio::fs;
use tracing::debug;

use recycli_core::{
    model::{DateRange, SlotDefinition, SlotKey, TimeWindow},
    plugin::SourcePlugin,
    ports::{SlotSource, SourceError, SourceId, SourceMeta},
};

const DEMO_CATALOG: &str = include_str!("../data/demo.toml");

/// Top-level document.
#[derive(Debug, Deserialize)]
struct SlotFile {
    #[serde(default)]
    slots: Vec<SlotEntry>,
}

/// Single `[[slots]]` table.
#[derive(Debug, Deserialize)]
struct SlotEntry {
    date: NaiveDate,
    window: String,
    capacity: u32,

    #[serde(default)]
    booked: u32,
    #[serde(default)]
    disabled: bool,
}

/// Where the TOML text comes from.
#[derive(Debug, Clone)]
enum Origin {
    File(PathBuf),
    Bundled(&'static str),
}

/// Slot source backed by a TOML document.
pub struct TomlSlotSource {
    meta: SourceMeta,
    origin: Origin,
}

impl TomlSlotSource {
    /// Source reading `path` on every load.
    #[must_use]
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            meta: SourceMeta {
                id: SourceId(String::from("toml")),
                name: String::from("Slot file"),
            },
            origin: Origin::File(path.into()),
        }
    }

    /// Source serving the bundled demo catalog.
    #[must_use]
    pub fn demo() -> Self {
        Self {
            meta: SourceMeta {
                id: SourceId(String::from("demo")),
                name: String::from("Demo catalog"),
            },
            origin: Origin::Bundled(DEMO_CATALOG),
        }
    }

    async fn read(&self) -> Result<String, SourceError> {
        match &self.origin {
            Origin::File(path) => {
                debug!(path = %path.display(), "reading slot file");
                Ok(fs::read_to_string(path).await?)
            }
            Origin::Bundled(text) => Ok((*text).to_owned()),
        }
    }
}

#[async_trait]
impl SlotSource for TomlSlotSource {
    fn meta(&self) -> &SourceMeta {
        &self.meta
    }

    async fn slots(&self, range: DateRange) -> Result<Vec<SlotDefinition>, SourceError> {
        let text = self.read().await?;
        let mut definitions: Vec<SlotDefinition> = parse_definitions(&text)?
            .into_iter()
            .filter(|definition| range.contains(definition.key.date))
            .collect();
        definitions.sort_by_key(|definition| definition.key);
        Ok(definitions)
    }
}

/// Decode and validate a slot document.
///
/// # Errors
///
/// Returns [`SourceError::Parse`] for malformed TOML, [`SourceError::Window`]
/// for unreadable windows and [`SourceError::InvalidSlot`] for zero capacity,
/// overbooked entries, or a slot listed twice.
pub fn parse_definitions(text: &str) -> Result<Vec<SlotDefinition>, SourceError> {
    let file: SlotFile =
        toml::from_str(text).map_err(|err| SourceError::Parse(err.to_string()))?;

    let mut seen = HashSet::new();
    let mut definitions = Vec::with_capacity(file.slots.len());

    for entry in file.slots {
        let window: TimeWindow = entry.window.parse()?;
        let key = SlotKey::new(entry.date, window);

        if entry.capacity == 0 {
            return Err(SourceError::InvalidSlot(format!("{key}: capacity must be positive")));
        }
        if entry.booked > entry.capacity {
            return Err(SourceError::InvalidSlot(format!(
                "{key}: booked {} exceeds capacity {}",
                entry.booked, entry.capacity
            )));
        }
        if !seen.insert(key) {
            return Err(SourceError::InvalidSlot(format!("{key}: listed twice")));
        }

        definitions.push(SlotDefinition {
            key,
            capacity: entry.capacity,
            booked: entry.booked,
            disabled: entry.disabled,
        });
    }

    Ok(definitions)
}

/// Build the plugin bundle for a slot file.
#[must_use]
pub fn plugin(path: impl Into<PathBuf>) -> SourcePlugin {
    bundle(TomlSlotSource::from_file(path))
}

/// Build the plugin bundle for the bundled demo catalog.
#[must_use]
pub fn demo_plugin() -> SourcePlugin {
    bundle(TomlSlotSource::demo())
}

fn bundle(source: TomlSlotSource) -> SourcePlugin {
    SourcePlugin {
        meta: source.meta.clone(),
        source: Arc::new(source),
    }
}
