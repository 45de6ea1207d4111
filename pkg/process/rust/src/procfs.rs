// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::{debug, warn};

use crate::errors::Error;

/// State code the kernel reports for an exited, unreaped process.
pub const ZOMBIE_STATE: char = 'Z';

static PROC_ROOT: OnceLock<PathBuf> = OnceLock::new();

pub fn root_path() -> &'static Path {
    PROC_ROOT.get_or_init(|| {
        if let Ok(v) = env::var("HOST_PROC") {
            return v.into();
        }

        "/proc".into()
    })
}

/// One process's `/proc/<pid>/stat` record, reduced to the fields the reaper needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessStat {
    pub pid: i32,
    pub comm: String,
    pub state: char,
    pub ppid: i32,
}

impl ProcessStat {
    pub fn is_zombie(&self) -> bool {
        self.state == ZOMBIE_STATE
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// Zombies found anywhere in the scanned table.
    pub total_defunct: usize,
    /// Zombies whose parent is the queried PID, in listing order.
    pub defunct_children: Vec<i32>,
}

/// List the entry names under `root`. Errors are the OS errors from reading
/// the directory, untouched.
pub fn list_process_directory_names(root: &Path) -> Result<Vec<String>, std::io::Error> {
    fs::read_dir(root)?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect()
}

/// Parse a single `stat` record.
///
/// The command name is the only field that may contain spaces or
/// parentheses, so it is delimited by the first `" ("` and the *last* `)` of
/// the record rather than by whitespace.
pub fn parse_stat_record(data: &[u8]) -> Result<ProcessStat, Error> {
    let comm_end = match memchr::memrchr(b')', data) {
        Some(i) if i > 2 && i + 1 < data.len() => i,
        _ => return Err(Error::no_comm(data)),
    };

    let head = data.get(..comm_end).ok_or_else(|| Error::no_comm(data))?;
    let sep = memchr::memmem::find(head, b" (").ok_or_else(|| Error::no_comm(data))?;
    let (Some(pid_field), Some(comm)) = (head.get(..sep), head.get(sep + 2..)) else {
        return Err(Error::no_comm(data));
    };

    // ") S 1 ..." : state is two bytes past the paren, ppid two past the state.
    let state = *data
        .get(comm_end + 2)
        .ok_or_else(|| Error::invalid_ppid(data))?;
    let rest = data
        .get(comm_end + 4..)
        .ok_or_else(|| Error::invalid_ppid(data))?;
    let ppid_len = memchr::memchr(b' ', rest).unwrap_or(rest.len());
    let ppid = rest
        .get(..ppid_len)
        .and_then(|field| std::str::from_utf8(field).ok())
        .and_then(|field| field.trim_end_matches('\n').parse::<i32>().ok())
        .ok_or_else(|| Error::invalid_ppid(data))?;

    let pid = std::str::from_utf8(pid_field)
        .ok()
        .and_then(|field| field.trim().parse::<i32>().ok())
        .unwrap_or(0);

    Ok(ProcessStat {
        pid,
        comm: String::from_utf8_lossy(comm).into_owned(),
        state: char::from(state),
        ppid,
    })
}

/// Read and parse `<root>/<pid>/stat`.
pub fn read_process_stat(root: &Path, pid: i32) -> Result<ProcessStat, Error> {
    let data = fs::read(root.join(pid.to_string()).join("stat"))?;
    let mut stat = parse_stat_record(&data)?;
    stat.pid = pid;
    Ok(stat)
}

fn parse_pid(name: &str) -> Option<i32> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse::<i32>().ok().filter(|pid| *pid > 0)
}

fn scan(root: &Path, parent_pid: Option<i32>) -> Result<ScanResult, Error> {
    let mut result = ScanResult::default();

    for name in list_process_directory_names(root)? {
        let Some(pid) = parse_pid(&name) else {
            continue;
        };

        // Processes routinely exit between the listing and the read.
        let stat = match read_process_stat(root, pid) {
            Ok(stat) => stat,
            Err(e) => {
                debug!("skipping PID {pid}: {e}");
                continue;
            }
        };

        if !stat.is_zombie() {
            continue;
        }

        result.total_defunct += 1;
        warn!("Found defunct process with PID {} ({})", pid, stat.comm);

        if parent_pid == Some(stat.ppid) {
            result.defunct_children.push(pid);
        }
    }

    Ok(result)
}

/// Count every zombie under `root` and collect those whose parent is `parent_pid`.
///
/// Only a failure to list `root` is reported; entries that cannot be read or
/// parsed are skipped.
pub fn scan_for_defunct_processes(root: &Path, parent_pid: i32) -> Result<ScanResult, Error> {
    scan(root, Some(parent_pid))
}

/// Number of zombies under `root`, whatever their parent.
pub fn defunct_processes_for_path(root: &Path) -> Result<usize, Error> {
    Ok(scan(root, None)?.total_defunct)
}

/// Number of zombies on the node.
pub fn defunct_processes() -> Result<usize, Error> {
    defunct_processes_for_path(root_path())
}
