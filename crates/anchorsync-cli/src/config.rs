//! Configuration – reads/writes `~/.anchorsync/config.toml`.

use anchorsync_types::{AxisConvention, ResolverConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted simulation and resolver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Number of ticks to simulate.
    #[serde(default = "default_ticks")]
    pub ticks: u64,

    /// Wall-clock pause between ticks (0 = run flat out).
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Number of non-authoritative devices.
    #[serde(default = "default_dependents")]
    pub dependents: usize,

    /// Encode mapping used by the authority.
    #[serde(default)]
    pub axis_convention: AxisConvention,

    /// Broadcast a session reset at this tick and re-locate all anchors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_at_tick: Option<u64>,

    /// Resolver tolerances.
    #[serde(default)]
    pub resolver: ResolverConfig,
}

fn default_ticks() -> u64 {
    120
}
fn default_tick_interval_ms() -> u64 {
    16
}
fn default_dependents() -> usize {
    2
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ticks: default_ticks(),
            tick_interval_ms: default_tick_interval_ms(),
            dependents: default_dependents(),
            axis_convention: AxisConvention::default(),
            reset_at_tick: None,
            resolver: ResolverConfig::default(),
        }
    }
}

/// Return the path to `~/.anchorsync/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".anchorsync").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path, environment overrides applied.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    let mut cfg = read_from(path)?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

/// Parse the file at `path` exactly as written.
pub(crate) fn read_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    toml::from_str(&raw)
        .map(Some)
        .map_err(|e| format!("Failed to parse config: {}", e))
}

/// Apply `ANCHORSYNC_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ANCHORSYNC_TICKS` | `ticks` |
/// | `ANCHORSYNC_TICK_INTERVAL_MS` | `tick_interval_ms` |
/// | `ANCHORSYNC_DEPENDENTS` | `dependents` |
/// | `ANCHORSYNC_AXIS_CONVENTION` | `axis_convention` |
///
/// Values that fail to parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ANCHORSYNC_TICKS")
        && let Ok(n) = v.parse::<u64>()
    {
        cfg.ticks = n;
    }
    if let Ok(v) = std::env::var("ANCHORSYNC_TICK_INTERVAL_MS")
        && let Ok(n) = v.parse::<u64>()
    {
        cfg.tick_interval_ms = n;
    }
    if let Ok(v) = std::env::var("ANCHORSYNC_DEPENDENTS")
        && let Ok(n) = v.parse::<usize>()
    {
        cfg.dependents = n;
    }
    if let Ok(v) = std::env::var("ANCHORSYNC_AXIS_CONVENTION")
        && let Ok(c) = v.parse::<AxisConvention>()
    {
        cfg.axis_convention = c;
    }
}

/// Save the config to disk, creating `~/.anchorsync/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
