// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Background reaper for defunct children of the current process.
//!
//! Children that exit while nobody waits on them stay in the process table
//! as zombies. The monitor scans the process filesystem, remembers the
//! zombies whose parent is this process, waits one reap period and only then
//! collects them with a non-blocking `waitpid`. The delay leaves the regular
//! owner of each child (a `Child::wait`, a tokio SIGCHLD driver...) the first
//! chance to collect it.
//!
//! Scans run on the blocking thread pool; the non-blocking `waitpid` calls
//! run on the monitor task.

use std::path::PathBuf;
use std::time::Duration;

use log::{debug, error, info, warn};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{Pid, getpid};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::procfs::{root_path, scan_for_defunct_processes};

pub const DEFAULT_ZOMBIE_CHILD_REAP_PERIOD: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Process filesystem to scan.
    pub proc_root: PathBuf,
    /// Delay between a scan and the reaping of the children it found.
    pub reap_period: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            proc_root: root_path().to_path_buf(),
            reap_period: DEFAULT_ZOMBIE_CHILD_REAP_PERIOD,
        }
    }
}

/// Collects the exit status of one child without blocking.
pub trait Reaper: Send + 'static {
    fn reap(&self, pid: Pid) -> nix::Result<WaitStatus>;
}

/// `waitpid(pid, WNOHANG)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WaitpidReaper;

impl Reaper for WaitpidReaper {
    fn reap(&self, pid: Pid) -> nix::Result<WaitStatus> {
        waitpid(pid, Some(WaitPidFlag::WNOHANG))
    }
}

/// Handle on a running reap loop.
///
/// The loop keeps running when the handle is dropped; call [`shutdown`]
/// to stop it.
///
/// [`shutdown`]: ZombieMonitor::shutdown
pub struct ZombieMonitor {
    cancellation: CancellationToken,
    handle: JoinHandle<()>,
}

impl ZombieMonitor {
    /// Spawn the reap loop on the current tokio runtime.
    pub fn start(config: MonitorConfig) -> Self {
        Self::start_with_reaper(config, WaitpidReaper)
    }

    pub fn start_with_reaper<R: Reaper>(config: MonitorConfig, reaper: R) -> Self {
        let cancellation = CancellationToken::new();
        let handle = tokio::spawn(run(config, reaper, getpid(), cancellation.clone()));
        Self {
            cancellation,
            handle,
        }
    }

    /// Ask the loop to stop. Returns immediately; zombies found by the scan
    /// in progress are left alone.
    pub fn shutdown(&self) {
        self.cancellation.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Wait for the loop to exit.
    pub async fn wait(self) {
        if let Err(e) = self.handle.await {
            error!("zombie monitor task failed: {e}");
        }
    }
}

async fn run<R: Reaper>(
    config: MonitorConfig,
    reaper: R,
    parent: Pid,
    cancellation: CancellationToken,
) {
    info!(
        "zombie monitor started (pid={parent}, proc={}, period={}s)",
        config.proc_root.display(),
        config.reap_period.as_secs_f64()
    );

    loop {
        let root = config.proc_root.clone();
        let scan = tokio::task::spawn_blocking(move || {
            scan_for_defunct_processes(&root, parent.as_raw())
        })
        .await;
        let children = match scan {
            Ok(Ok(result)) => result.defunct_children,
            Ok(Err(e)) => {
                warn!("Failed to get defunct process information: {e}");
                Vec::new()
            }
            Err(e) => {
                error!("defunct process scan task failed: {e}");
                Vec::new()
            }
        };

        tokio::select! {
            biased;
            _ = cancellation.cancelled() => {
                info!("zombie monitor shutting down");
                return;
            }
            _ = sleep(config.reap_period) => {}
        }

        for pid in children {
            reap_child(&reaper, pid);
        }
    }
}

fn reap_child<R: Reaper>(reaper: &R, pid: i32) {
    match reaper.reap(Pid::from_raw(pid)) {
        Ok(WaitStatus::StillAlive) => debug!("child process {pid} has not exited"),
        Ok(status) => debug!("reaped child process {pid}: {status:?}"),
        Err(e) => error!("Failed to reap child process {pid}: {e}"),
    }
}
