// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use anyhow::{Context, Result, bail};
use log::{LevelFilter, warn};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::procfs::root_path;
use crate::zombie_monitor::{DEFAULT_ZOMBIE_CHILD_REAP_PERIOD, MonitorConfig};

const DEFAULT_CONFIG_PATH: &str = "/etc/crio/zombie-reaper.yaml";

const HOST_PROC_ENV: &str = "HOST_PROC";
const REAP_PERIOD_ENV: &str = "CRIO_ZOMBIE_REAP_PERIOD";
const LOG_LEVEL_ENV: &str = "CRIO_LOG_LEVEL";

/// On-disk configuration. Every key is optional.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    proc_root: Option<PathBuf>,
    reap_period_secs: Option<u64>,
    log_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub monitor: MonitorConfig,
    pub log_level: LevelFilter,
}

/// Load the YAML file at `path` (or the default location) and apply
/// environment overrides.
/// Priority: environment > YAML > built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(Path::new(DEFAULT_CONFIG_PATH));
    let file = read_file_config(path)?;
    resolve(file)
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    // A missing file is fine, the defaults and env vars are enough to run.
    if !path.exists() {
        warn!(
            "Config file not found at {}. Checking environment variables only.",
            path.display()
        );
        return Ok(FileConfig::default());
    }

    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    if contents.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

fn resolve(file: FileConfig) -> Result<Config> {
    let proc_root = match env::var(HOST_PROC_ENV) {
        Ok(v) => PathBuf::from(v),
        Err(_) => file
            .proc_root
            .unwrap_or_else(|| root_path().to_path_buf()),
    };

    let reap_period = match env::var(REAP_PERIOD_ENV) {
        Ok(v) => {
            let secs: u64 = v
                .trim()
                .parse()
                .with_context(|| format!("invalid {REAP_PERIOD_ENV} value: {v:?}"))?;
            Duration::from_secs(secs)
        }
        Err(_) => file
            .reap_period_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_ZOMBIE_CHILD_REAP_PERIOD),
    };
    if reap_period.is_zero() {
        bail!("zombie reap period must be greater than zero");
    }

    let log_level = env::var(LOG_LEVEL_ENV)
        .or_else(|_| env::var("LOG_LEVEL"))
        .ok()
        .or(file.log_level)
        .map(|level| parse_log_level(&level))
        .unwrap_or(LevelFilter::Info);

    Ok(Config {
        monitor: MonitorConfig {
            proc_root,
            reap_period,
        },
        log_level,
    })
}

/// `off`/`error`/`warn`/`info`/`debug`/`trace` in any case, plus the
/// `warning` and `critical` aliases. Anything else falls back to info.
fn parse_log_level(level: &str) -> LevelFilter {
    let level = level.trim();
    match level.to_ascii_lowercase().as_str() {
        "warning" => LevelFilter::Warn,
        "critical" => LevelFilter::Error,
        _ => level.parse().unwrap_or(LevelFilter::Info),
    }
}
