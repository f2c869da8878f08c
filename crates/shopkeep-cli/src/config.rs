// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use shopkeep_app::{PostWriteAction, WritePolicy};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "shopkeep";

const CONFIG_VERSION: i64 = 1;
const DEFAULT_TIMEOUT: &str = "5s";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub remote: Remote,
    #[serde(default)]
    pub table: TableSection,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            remote: Remote::default(),
            table: TableSection::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Remote {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableSection {
    pub after_create: Option<String>,
    pub after_update: Option<String>,
    pub after_delete: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("SHOPKEEP_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set SHOPKEEP_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and place values under [remote], [table], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(timeout) = &self.remote.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "remote.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        for (key, value) in [
            ("after_create", &self.table.after_create),
            ("after_update", &self.table.after_update),
            ("after_delete", &self.table.after_delete),
        ] {
            let Some(value) = value else {
                continue;
            };
            if PostWriteAction::parse(value).is_none() {
                bail!(
                    "table.{key} in {} must be one of reload, remove-row, keep; got {value:?}",
                    path.display()
                );
            }
        }

        // A create has no rendered row yet, so there is nothing to remove.
        if self.table.after_create.as_deref() == Some(PostWriteAction::RemoveRow.as_str()) {
            bail!(
                "table.after_create in {} cannot be \"remove-row\"; use reload or keep",
                path.display()
            );
        }

        Ok(())
    }

    // The configured endpoint wins over the environment override.
    pub fn base_url(&self) -> Option<String> {
        if let Some(url) = &self.remote.base_url {
            return Some(url.trim_end_matches('/').to_owned());
        }
        env::var("SHOPKEEP_BASE_URL")
            .ok()
            .filter(|value| !value.is_empty())
            .map(|value| value.trim_end_matches('/').to_owned())
    }

    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(self.remote.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn write_policy(&self) -> WritePolicy {
        let defaults = WritePolicy::default();
        WritePolicy {
            after_create: policy_value(&self.table.after_create, defaults.after_create),
            after_update: policy_value(&self.table.after_update, defaults.after_update),
            after_delete: policy_value(&self.table.after_delete, defaults.after_delete),
        }
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_file(&self) -> Option<PathBuf> {
        self.log.file.as_deref().map(PathBuf::from)
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# shopkeep config\n# Place this file at: {}\n\nversion = 1\n\n[remote]\n# Required unless SHOPKEEP_BASE_URL is set or shopkeep runs with --demo.\n# base_url = \"https://example.test/products\"\ntimeout = \"{}\"\n\n[table]\nafter_create = \"reload\"\nafter_update = \"reload\"\nafter_delete = \"remove-row\"\n\n[log]\nlevel = \"{}\"\n# Optional. The TUI owns the terminal, so a file keeps the log readable.\n# file = \"/absolute/path/to/shopkeep.log\"\n",
            path.display(),
            DEFAULT_TIMEOUT,
            DEFAULT_LOG_LEVEL,
        )
    }
}

// Validated strings fall back to the defaults here; load() already rejected
// anything unparseable.
fn policy_value(raw: &Option<String>, default: PostWriteAction) -> PostWriteAction {
    raw.as_deref()
        .and_then(PostWriteAction::parse)
        .unwrap_or(default)
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)")
}
