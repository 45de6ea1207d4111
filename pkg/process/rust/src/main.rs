// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use crio_process::config::{self, Config};
use crio_process::{ZombieMonitor, procfs};
use log::{info, warn};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command as ChildCommand};
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::{Duration, timeout};

const COMMAND_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Zombie child reaper for the container runtime
#[derive(Parser, Debug)]
#[command(name = "crio-reaperd", version)]
#[command(about = "Reap defunct children of this process after a grace period")]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "CRIO_ZOMBIE_REAPER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Run the reap loop until SIGTERM or SIGINT, or until COMMAND exits (default)
    Run {
        /// Register as child subreaper so orphaned descendants are reparented here
        #[arg(long)]
        subreaper: bool,

        /// Command to start and supervise, given after `--`
        #[arg(last = true, value_name = "COMMAND")]
        command: Vec<String>,
    },
    /// Print the number of defunct processes on the node and exit
    Count,
}

async fn run(config: Config, subreaper: bool, command: Vec<String>) -> Result<()> {
    if subreaper {
        set_subreaper()?;
    }

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    let mut child = match command.split_first() {
        Some((program, args)) => Some(spawn_command(program, args)?),
        None => None,
    };

    let monitor = ZombieMonitor::start(config.monitor);

    let (received, exited) = tokio::select! {
        _ = sigterm.recv() => (Some(Signal::SIGTERM), None),
        _ = sigint.recv() => (Some(Signal::SIGINT), None),
        status = wait_command(child.as_mut()) => (None, Some(status)),
    };

    if let Some(sig) = received {
        info!("received {sig}");
        if let Some(child) = child.as_mut() {
            stop_command(child, sig).await;
        }
    }

    info!("crio-reaperd shutting down");
    monitor.shutdown();
    monitor.wait().await;

    match exited {
        Some(status) => {
            let status = status.context("Failed to wait for command")?;
            info!("command exited: {status}");
            if !status.success() {
                bail!("command exited unsuccessfully: {status}");
            }
            Ok(())
        }
        None => Ok(()),
    }
}

fn spawn_command(program: &str, args: &[String]) -> Result<Child> {
    let child = ChildCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to spawn: {program}"))?;
    info!(
        "command started (pid={}, cmd={program})",
        child.id().unwrap_or(0)
    );
    Ok(child)
}

/// Resolves when the supervised command exits. Never resolves without one.
async fn wait_command(child: Option<&mut Child>) -> std::io::Result<ExitStatus> {
    match child {
        Some(child) => child.wait().await,
        None => std::future::pending().await,
    }
}

/// Forward `sig` to the command, then SIGKILL it if it outlives the stop timeout.
async fn stop_command(child: &mut Child, sig: Signal) {
    if let Some(pid) = child.id()
        && let Err(e) = signal::kill(Pid::from_raw(pid as i32), sig)
    {
        warn!("failed to forward {sig} to command (pid={pid}): {e}");
    }

    match timeout(COMMAND_STOP_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => info!("command exited: {status}"),
        Ok(Err(e)) => warn!("failed to wait for command: {e}"),
        Err(_) => {
            warn!(
                "command did not exit within {}s, sending SIGKILL",
                COMMAND_STOP_TIMEOUT.as_secs()
            );
            if let Err(e) = child.kill().await {
                warn!("failed to kill command: {e}");
            }
        }
    }
}

#[cfg(target_os = "linux")]
fn set_subreaper() -> Result<()> {
    nix::sys::prctl::set_child_subreaper(true).context("Failed to become child subreaper")?;
    info!("registered as child subreaper");
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn set_subreaper() -> Result<()> {
    anyhow::bail!("child subreaper is only supported on Linux")
}

#[allow(clippy::print_stdout)]
fn count(config: &Config) -> Result<()> {
    let total = procfs::defunct_processes_for_path(&config.monitor.proc_root)
        .with_context(|| format!("scanning {}", config.monitor.proc_root.display()))?;
    println!("{total}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = config::load_config(args.config.as_deref())?;
    simple_logger::SimpleLogger::new()
        .with_level(config.log_level)
        .init()?;
    info!(
        "crio-reaperd starting (version {})",
        env!("CARGO_PKG_VERSION")
    );

    let command = args.command.unwrap_or(Command::Run {
        subreaper: false,
        command: Vec::new(),
    });
    match command {
        Command::Run { subreaper, command } => run(config, subreaper, command).await,
        Command::Count => count(&config),
    }
}
