// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

#![allow(dead_code)]

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Spawn a child that exits immediately and is never waited on.
pub fn spawn_zombie() -> i32 {
    let child = Command::new("/bin/sh")
        .args(["-c", "exit 0"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn child");
    // Dropping a std Child neither kills nor waits on it.
    child.id() as i32
}

/// State letter of `pid` from the live `/proc`, if the process exists.
pub fn process_state(pid: i32) -> Option<char> {
    crio_process::procfs::read_process_stat(Path::new("/proc"), pid)
        .ok()
        .map(|stat| stat.state)
}

/// Wait until `pid` reports `state`, or timeout.
pub fn wait_for_state(pid: i32, state: char, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if process_state(pid) == Some(state) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// Wait until `/proc/<pid>` is gone, i.e. the process has been reaped.
pub fn wait_for_pid_gone(pid: i32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if !Path::new("/proc").join(pid.to_string()).exists() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// Write `<root>/<pid>/stat` for a fake process.
pub fn write_stat(root: &Path, pid: i32, comm: &str, state: char, ppid: i32) {
    let dir = root.join(pid.to_string());
    std::fs::create_dir_all(&dir)
        .unwrap_or_else(|e| panic!("failed to create {}: {e}", dir.display()));
    std::fs::write(
        dir.join("stat"),
        format!("{pid} ({comm}) {state} {ppid} {pid} {pid} 0 -1 4194560 97 0 0 0\n"),
    )
    .unwrap_or_else(|e| panic!("failed to write stat for {pid}: {e}"));
}

/// Handle to a running crio-reaperd process.
pub struct DaemonHandle {
    child: Child,
    log_lines: Arc<Mutex<Vec<String>>>,
    _reader_threads: Vec<std::thread::JoinHandle<()>>,
}

fn collect_lines<R: Read + Send + 'static>(
    stream: R,
    lines: Arc<Mutex<Vec<String>>>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        for line in BufReader::new(stream).lines() {
            match line {
                Ok(l) => {
                    eprintln!("[daemon] {l}");
                    lines.lock().unwrap().push(l);
                }
                Err(_) => break,
            }
        }
    })
}

impl DaemonHandle {
    /// Start `crio-reaperd run` against the fake process filesystem at `proc_root`.
    pub fn start(proc_root: &Path, config: &Path) -> Self {
        Self::start_with_args(proc_root, config, &[])
    }

    /// Start `crio-reaperd run <run_args>`; the supervised command's output
    /// is collected along with the daemon's.
    pub fn start_with_args(proc_root: &Path, config: &Path, run_args: &[&str]) -> Self {
        let bin = env!("CARGO_BIN_EXE_crio-reaperd");
        let mut child = Command::new(bin)
            .arg("--config")
            .arg(config)
            .arg("run")
            .args(run_args)
            .env("HOST_PROC", proc_root)
            .env("CRIO_ZOMBIE_REAP_PERIOD", "1")
            .env("CRIO_LOG_LEVEL", "debug")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to start crio-reaperd");

        let stdout = child.stdout.take().expect("failed to capture stdout");
        let stderr = child.stderr.take().expect("failed to capture stderr");
        let log_lines = Arc::new(Mutex::new(Vec::<String>::new()));
        let readers = vec![
            collect_lines(stdout, Arc::clone(&log_lines)),
            collect_lines(stderr, Arc::clone(&log_lines)),
        ];

        Self {
            child,
            log_lines,
            _reader_threads: readers,
        }
    }

    pub fn pid(&self) -> i32 {
        self.child.id() as i32
    }

    /// First collected line starting with `prefix`, with the prefix removed.
    pub fn wait_for_line_with_prefix(&self, prefix: &str, timeout: Duration) -> Option<String> {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let lines = self.log_lines.lock().unwrap();
                if let Some(rest) = lines.iter().find_map(|l| l.strip_prefix(prefix)) {
                    return Some(rest.trim().to_string());
                }
            }
            if Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    /// Wait until a log line containing `pattern` appears, or timeout.
    pub fn wait_for_log(&self, pattern: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let lines = self.log_lines.lock().unwrap();
                if lines.iter().any(|l| l.contains(pattern)) {
                    return true;
                }
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    pub fn send_signal(&self, sig: Signal) {
        signal::kill(Pid::from_raw(self.pid()), sig).expect("failed to send signal to daemon");
    }

    /// Wait for the daemon to exit within the given timeout.
    pub fn wait_with_timeout(&mut self, timeout: Duration) -> std::process::ExitStatus {
        let deadline = Instant::now() + timeout;
        loop {
            match self
                .child
                .try_wait()
                .expect("failed to check daemon status")
            {
                Some(status) => return status,
                None => {
                    if Instant::now() >= deadline {
                        self.child.kill().ok();
                        return self.child.wait().expect("failed to wait on killed daemon");
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
        }
    }
}

impl Drop for DaemonHandle {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
