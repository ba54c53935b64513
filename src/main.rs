// SPDX-FileCopyrightText: 2026 buildver contributors
//
// SPDX-License-Identifier: MIT

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use log;
use simple_logger;

mod config;
mod emit;
mod git;
mod version;

use anyhow::{anyhow, Result};

fn load_config(repo: &Path) -> Result<config::Config> {
    match config::locate(repo) {
        Some(cfg_path) => {
            log::debug!("loading config from {}", cfg_path.to_string_lossy());

            let cfg = fs::File::open(&cfg_path).context("cannot open config file")?;
            config::config_from(cfg).context("cannot parse config file")
        }
        None => Ok(config::Config::default()),
    }
}

fn main() -> Result<()> {
    simple_logger::init_with_level(log::Level::Trace).unwrap();

    let mut args = env::args().skip(1);
    let action = args.next().context("no action")?;

    if action == "--version" {
        let vers = option_env!("BUILD_GIT_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
        println!("buildver {}", vers);
        return Ok(());
    }

    let repo = match args.next() {
        Some(path) => PathBuf::from(path),
        None => env::current_dir().context("cannot determine current directory")?,
    };

    let cfg = load_config(&repo)?;

    let mut resolver = git::resolver_with_timeout(Duration::from_secs(cfg.timeout_secs));
    let state = resolver.resolve(&repo);
    log::debug!("repository state: {:?}", state);

    let encoded = version::encode(&state);
    // Re-parsing our own output doubles as a validation pass. A failure here
    // means the encoder and decoder grammars have diverged.
    let descriptor = version::decode(&encoded).map_err(|err| {
        anyhow!(
            "defect: encoder produced a version the decoder rejects ({}): {}",
            encoded,
            err
        )
    })?;

    match action.as_ref() {
        "version" => {
            println!("{}", encoded);
            Ok(())
        }
        "emit" => {
            // A descriptor without a commit carries no build metadata, the
            // downstream build then proceeds with no version variables.
            let desc = if descriptor.commit.is_some() {
                Some(&descriptor)
            } else {
                None
            };
            emit::emit(&mut io::stdout(), desc, &cfg.prefix, cfg.format)
                .context("cannot write build variables")
        }
        _ => Err(anyhow!("unknown action {}", action)),
    }
}
