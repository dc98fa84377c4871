//! Config file loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use std::time::Duration;

use anyhow::{Context, Result, bail};

use nasa_mirror_core::{EndpointTimeout, HttpTimeouts, MAX_CONCURRENCY, SyncConfig};

use crate::cli::Args;

const APP_DIR: &str = "nasa-mirror";
const CONFIG_FILE: &str = "config.toml";

/// Key = value file configuration for mirror defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Mirror root directory.
    pub output_dir: Option<PathBuf>,
    /// Base URL of the image API.
    pub api_base_url: Option<String>,
    /// Wall-clock budget for one run, in seconds.
    pub max_runtime_secs: Option<u64>,
    /// Pause after each fresh download, in milliseconds.
    pub download_delay_ms: Option<u64>,
    /// Records processed at once.
    pub concurrency: Option<usize>,
    /// Search idle-read timeout in seconds.
    pub search_timeout_secs: Option<u64>,
    /// Asset lookup idle-read timeout in seconds.
    pub asset_timeout_secs: Option<u64>,
    /// Download idle-read timeout in seconds.
    pub download_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Validates values against the same ranges the CLI enforces.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(1..=MAX_CONCURRENCY).contains(&concurrency)
        {
            bail!(
                "Invalid config value for `concurrency`: {concurrency}. Expected range: 1..={MAX_CONCURRENCY}"
            );
        }
        if let Some(delay) = self.download_delay_ms
            && delay > 600_000
        {
            bail!("Invalid config value for `download_delay_ms`: {delay}. Expected range: 0..=600000");
        }
        if let Some(url) = &self.api_base_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            bail!("Invalid config value for `api_base_url`: '{url}'. Expected an http(s) URL");
        }
        validate_timeout_secs("search_timeout_secs", self.search_timeout_secs)?;
        validate_timeout_secs("asset_timeout_secs", self.asset_timeout_secs)?;
        validate_timeout_secs("download_timeout_secs", self.download_timeout_secs)?;
        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Builds the run configuration. CLI flags win over the file, the file over
/// built-in defaults.
#[must_use]
pub fn resolve_sync_config(args: &Args, file: Option<&FileConfig>) -> SyncConfig {
    let file = file.cloned().unwrap_or_default();

    let output = args
        .output
        .clone()
        .or(file.output_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut config = SyncConfig::new(output);

    if let Some(url) = args.api_base_url.clone().or(file.api_base_url) {
        config = config.with_api_base_url(url);
    }
    if let Some(secs) = args.max_runtime_secs.or(file.max_runtime_secs) {
        config = config.with_max_runtime(Duration::from_secs(secs));
    }
    if let Some(ms) = args.download_delay_ms.or(file.download_delay_ms) {
        config = config.with_download_delay(Duration::from_millis(ms));
    }
    if let Some(concurrency) = args.concurrency.map(usize::from).or(file.concurrency) {
        config = config.with_concurrency(concurrency);
    }

    let defaults = HttpTimeouts::default();
    let pick = |cli: Option<u64>, file: Option<u64>, default: EndpointTimeout| {
        cli.or(file).map_or(default, EndpointTimeout::from_secs)
    };
    config.with_timeouts(HttpTimeouts {
        search: pick(args.search_timeout_secs, file.search_timeout_secs, defaults.search),
        asset: pick(args.asset_timeout_secs, file.asset_timeout_secs, defaults.asset),
        download: pick(
            args.download_timeout_secs,
            file.download_timeout_secs,
            defaults.download,
        ),
    })
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/nasa-mirror/config.toml`
/// 2. `$HOME/.config/nasa-mirror/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_DIR).join(CONFIG_FILE));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILE),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the file config.
///
/// An explicit path must exist. The default path is used only when present.
pub fn load_file_config(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    if let Some(path) = explicit {
        return read_file_config(path).map(Some);
    }
    match resolve_default_config_path() {
        Some(path) if path.exists() => read_file_config(&path).map(Some),
        _ => Ok(None),
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        let line_no = line_index + 1;

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "output_dir" => {
                cfg.output_dir = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "api_base_url" => {
                cfg.api_base_url = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "max_runtime_secs" => {
                cfg.max_runtime_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "download_delay_ms" => {
                cfg.download_delay_ms = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "concurrency" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                let n = usize::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("concurrency out of range for usize"))
                    .with_context(invalid)?;
                cfg.concurrency = Some(n);
            }
            "search_timeout_secs" => {
                cfg.search_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "asset_timeout_secs" => {
                cfg.asset_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "download_timeout_secs" => {
                cfg.download_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}
