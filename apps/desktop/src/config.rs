use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "digest.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub password: Option<String>,
    pub download_dir: PathBuf,
    pub default_location: Option<String>,
    pub phase_pause_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5001".into(),
            password: None,
            download_dir: PathBuf::from("."),
            default_location: None,
            phase_pause_ms: 500,
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    pub fn phase_pause(&self) -> Duration {
        Duration::from_millis(self.phase_pause_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    server_url: Option<String>,
    password: Option<String>,
    download_dir: Option<PathBuf>,
    default_location: Option<String>,
    phase_pause_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
}

/// Defaults, then the config file, then environment variables.
///
/// An explicitly requested file must exist; the default `digest.toml` is optional.
pub fn load_settings(explicit_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();

    let path = explicit_path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg = parse_file_settings(&raw)
                .with_context(|| format!("invalid config file '{}'", path.display()))?;
            apply_file(&mut settings, file_cfg);
        }
        Err(err) if explicit_path.is_some() => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()));
        }
        Err(_) => {}
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

fn parse_file_settings(raw: &str) -> Result<FileSettings> {
    Ok(toml::from_str::<FileSettings>(raw)?)
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.server_url {
        settings.server_url = v;
    }
    if let Some(v) = file_cfg.password {
        settings.password = Some(v);
    }
    if let Some(v) = file_cfg.download_dir {
        settings.download_dir = v;
    }
    if let Some(v) = file_cfg.default_location {
        settings.default_location = Some(v);
    }
    if let Some(v) = file_cfg.phase_pause_ms {
        settings.phase_pause_ms = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
}

/// Keys are applied in order, so the trailing `APP__*` form wins over the
/// plain name. Blank values are skipped.
fn last_set(lookup: &impl Fn(&str) -> Option<String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .rev()
        .filter_map(|&key| lookup(key))
        .find(|value| !value.trim().is_empty())
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| anyhow!("{key} must be a non-negative integer, got '{value}'"))
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(v) = last_set(&lookup, &["DIGEST_SERVER_URL", "APP__SERVER_URL"]) {
        settings.server_url = v;
    }
    if let Some(v) = last_set(&lookup, &["APP_PASSWORD", "APP__PASSWORD"]) {
        settings.password = Some(v);
    }
    if let Some(v) = last_set(&lookup, &["DIGEST_DOWNLOAD_DIR", "APP__DOWNLOAD_DIR"]) {
        settings.download_dir = PathBuf::from(v);
    }
    if let Some(v) = last_set(&lookup, &["DIGEST_LOCATION", "APP__DEFAULT_LOCATION"]) {
        settings.default_location = Some(v);
    }
    if let Some(v) = last_set(&lookup, &["DIGEST_PHASE_PAUSE_MS", "APP__PHASE_PAUSE_MS"]) {
        settings.phase_pause_ms = parse_number("DIGEST_PHASE_PAUSE_MS", &v)?;
    }
    if let Some(v) = last_set(
        &lookup,
        &["DIGEST_REQUEST_TIMEOUT_SECS", "APP__REQUEST_TIMEOUT_SECS"],
    ) {
        settings.request_timeout_secs = parse_number("DIGEST_REQUEST_TIMEOUT_SECS", &v)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
