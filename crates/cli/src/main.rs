// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! `spiderd-cli`: a thin wrapper translating subcommands into
//! [`spiderd_daemon::Manager`] calls. No business logic lives here — only
//! argument parsing and table rendering.
//!
//! Each invocation builds its own short-lived `Manager` against the same
//! on-disk catalog and SCB segment naming the long-running `spiderd` daemon
//! uses, rather than talking to it over a socket — the catalog (and, for a
//! running container, its deterministically-named SCB segment) is the
//! shared state, the same way `docker` and `dockerd` share `/var/lib/docker`
//! plus a control channel, minus the channel.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use spiderd_core::clock::SystemClock;
use spiderd_core::config::RuntimeConfig;
use spiderd_core::cron::SystemCron;
use spiderd_core::dependency::NoopDependencyInstaller;
use spiderd_core::manifest::RunOverrides;
use spiderd_daemon::Manager;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "spider", about = "spiderd container manager")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a package archive into the catalog
    Load { path: PathBuf },
    /// List loaded packages
    Packages,
    /// Launch a container from a package
    Run {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        entry: Option<String>,
        #[arg(short = 'd', long)]
        daemon: bool,
        #[arg(short = 'e', long = "env", value_parser = parse_env_pair)]
        envs: Vec<(String, String)>,
        #[arg(long)]
        cron: Option<String>,
        package_ref: String,
    },
    /// List containers
    Ps(PsArgs),
    /// Start a stopped container
    Start { spider_ref: String },
    /// Signal a container to stop
    Stop { spider_ref: String },
    /// Stop then start a container
    Restart { spider_ref: String },
    /// Remove a container
    Rm {
        #[arg(short = 'f', long)]
        force: bool,
        spider_ref: String,
    },
    /// Remove a package
    Rmi { package_ref: String },
    /// Print a container's accumulated log lines
    Logs { spider_ref: String },
}

#[derive(Args)]
struct PsArgs {
    #[arg(short = 'a', long)]
    all: bool,
}

fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))
}

fn build_manager() -> Result<Manager<SystemClock>> {
    let config_path = std::env::var("SPIDERD_CONFIG_PATH").unwrap_or_else(|_| "spiderd.toml".to_string());
    let config = RuntimeConfig::load(Path::new(&config_path)).unwrap_or_else(|err| {
        eprintln!("failed to load spiderd.toml, using defaults: {err}");
        RuntimeConfig::default()
    });
    let worker_bin =
        std::env::var("SPIDERD_WORKER_BIN").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("spiderd-worker"));

    Ok(Manager::new(config, worker_bin, Arc::new(NoopDependencyInstaller), Arc::new(SystemCron), SystemClock)?)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let manager = build_manager()?;

    match cli.command {
        Command::Load { path } => {
            let package = manager.load(&path)?;
            println!("{} ({})", package.package_ref(), package.id.short(12));
        }
        Command::Packages => {
            for package in manager.packages()? {
                println!(
                    "{:<12} {:<20} {:<10} {}",
                    package.id.short(12),
                    package.name,
                    package.tag,
                    package.created_at.to_rfc3339()
                );
            }
        }
        Command::Run { name, entry, daemon, envs, cron, package_ref } => {
            let overrides = RunOverrides {
                name,
                entry,
                daemon: daemon.then_some(true),
                envs: envs.into_iter().collect::<BTreeMap<_, _>>(),
                cron,
            };
            let container = manager.run(&package_ref, overrides)?;
            println!("{} ({})", container.name, container.id.short(12));
        }
        Command::Ps(PsArgs { all }) => {
            for row in manager.ps(all)? {
                println!("{:<14} {:<20} {:<16} {:<10} {}", row.id, row.name, row.package_ref, row.created, row.status);
            }
        }
        Command::Start { spider_ref } => manager.start(&spider_ref)?,
        Command::Stop { spider_ref } => manager.stop(&spider_ref)?,
        Command::Restart { spider_ref } => manager.restart(&spider_ref)?,
        Command::Rm { force, spider_ref } => manager.rm(&spider_ref, force)?,
        Command::Rmi { package_ref } => manager.rmi(&package_ref)?,
        Command::Logs { spider_ref } => println!("{}", manager.logs(&spider_ref)?),
    }

    Ok(())
}
