// SPDX-FileCopyrightText: 2026 buildver contributors
//
// SPDX-License-Identifier: MIT

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log;
use serde;
use serde_yml;
use thiserror;

use crate::emit::EmitFormat;

pub const CONFIG_FILE_NAME: &str = "buildver.yaml";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cannot load configuration: {0}")]
    Load(serde_yml::Error),
}

fn default_timeout_secs() -> u64 {
    5
}

/// Tool configuration. Every field has a default, running with no config
/// file at all is the common case.
#[derive(serde::Deserialize, Debug, PartialEq)]
pub struct Config {
    /// Prefix prepended to every emitted variable name.
    #[serde(default)]
    pub prefix: String,
    /// Bound on a single repository query, in seconds.
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Output format for emitted variables.
    #[serde(default)]
    pub format: EmitFormat,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            prefix: String::new(),
            timeout_secs: default_timeout_secs(),
            format: EmitFormat::default(),
        }
    }
}

/// Reads configuration from the provided reader.
pub fn config_from<R>(cfg: R) -> Result<Config, ConfigError>
where
    R: io::Read,
{
    let conf: Config = serde_yml::from_reader(cfg).map_err(ConfigError::Load)?;
    log::debug!("config: {:?}", conf);

    Ok(conf)
}

/// Looks for a config file next to the target checkout or any of its
/// parents. A missing config file is not an error.
pub fn locate(start: &Path) -> Option<PathBuf> {
    let start = fs::canonicalize(start).ok()?;
    let mut dir = Some(start.as_path());

    while let Some(curdir) = dir {
        log::debug!("checking {}", curdir.display());
        let conf = curdir.join(CONFIG_FILE_NAME);

        if conf.exists() {
            log::debug!("found config {}", conf.display());
            return Some(conf);
        }
        dir = curdir.parent();
    }
    None
}
