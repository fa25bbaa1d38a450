//! Server configuration read from TOML, with environment overrides.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use chrono::{Days, NaiveDate};
use serde::Deserialize;

use recycli_core::{DateRange, SourcePlugin, SourceRegistry};
use recycli_source_weekly::WeeklyTemplate;

const DEFAULT_CONFIG_PATH: &str = "recycli.toml";

/// Longest catalog horizon accepted; sources expand every day in it at start-up.
const MAX_HORIZON_DAYS: u32 = 731;

/// Complete server configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct Config {
    pub(crate) server: ServerSettings,
    pub(crate) catalog: CatalogSettings,
    pub(crate) sources: SourceSettings,
}

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct ServerSettings {
    pub(crate) host: String,
    pub(crate) port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: 8080,
        }
    }
}

/// Date horizon loaded from the sources at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct CatalogSettings {
    /// First bookable date; today when unset.
    pub(crate) start: Option<NaiveDate>,
    pub(crate) horizon_days: u32,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            start: None,
            horizon_days: 60,
        }
    }
}

impl CatalogSettings {
    /// Range covered by the catalog, `start ..= start + horizon_days`.
    pub(crate) fn range(&self, today: NaiveDate) -> DateRange {
        let start = self.start.unwrap_or(today);
        let end = start
            .checked_add_days(Days::new(u64::from(self.horizon_days)))
            .unwrap_or(NaiveDate::MAX);
        DateRange::new(start, end)
    }
}

/// Which seed sources to register, in precedence order file, weekly, demo.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct SourceSettings {
    pub(crate) demo: bool,
    pub(crate) file: Option<PathBuf>,
    pub(crate) weekly: Option<WeeklyTemplate>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            demo: true,
            file: None,
            weekly: None,
        }
    }
}

impl SourceSettings {
    /// Build the registry. Earlier sources win when slots collide.
    pub(crate) fn registry(&self) -> SourceRegistry {
        let mut plugins: Vec<SourcePlugin> = Vec::new();
        if let Some(path) = &self.file {
            plugins.push(recycli_source_toml::plugin(path.clone()));
        }
        if let Some(template) = &self.weekly {
            plugins.push(recycli_source_weekly::plugin(template.clone()));
        }
        if self.demo {
            plugins.push(recycli_source_toml::demo_plugin());
        }
        SourceRegistry::new(plugins)
    }
}

impl Config {
    /// Parse a configuration document.
    pub(crate) fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("Failed to parse config file")?;
        ensure!(
            config.catalog.horizon_days <= MAX_HORIZON_DAYS,
            "catalog.horizon_days must be at most {MAX_HORIZON_DAYS}, got {}",
            config.catalog.horizon_days
        );
        Ok(config)
    }

    /// Load a configuration file.
    pub(crate) fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&text)
    }

    /// Load from `RECYCLI_CONFIG`, else `recycli.toml` if present, else defaults,
    /// then apply `HOST` and `PORT`.
    pub(crate) fn load() -> Result<Self> {
        let config = match env::var_os("RECYCLI_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };
        config.with_overrides(env::var("HOST").ok(), env::var("PORT").ok())
    }

    /// Apply listener overrides taken from the environment.
    pub(crate) fn with_overrides(mut self, host: Option<String>, port: Option<String>) -> Result<Self> {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port
                .parse()
                .with_context(|| format!("PORT is not a valid port: {port}"))?;
        }
        Ok(self)
    }

    /// Socket address the server binds to.
    pub(crate) fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
