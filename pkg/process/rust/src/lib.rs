// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

// Correctness
#![deny(clippy::indexing_slicing)]
#![deny(clippy::string_slice)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::undocumented_unsafe_blocks)]
// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unimplemented)]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

pub mod config;
mod errors;
pub mod procfs;
pub mod zombie_monitor;


// Re-export the public API
pub use errors::Error;
pub use procfs::{ProcessStat, ScanResult, scan_for_defunct_processes};
pub use zombie_monitor::{
    DEFAULT_ZOMBIE_CHILD_REAP_PERIOD, MonitorConfig, Reaper, WaitpidReaper, ZombieMonitor,
};
