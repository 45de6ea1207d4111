// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Directory listing or file read failure. The OS message is kept as-is.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid stat data (no comm): {data:?}")]
    NoComm { data: String },

    #[error("invalid stat data (invalid ppid): {data:?}")]
    InvalidPpid { data: String },
}

impl Error {
    pub(crate) fn no_comm(data: &[u8]) -> Self {
        Error::NoComm {
            data: String::from_utf8_lossy(data).into_owned(),
        }
    }

    pub(crate) fn invalid_ppid(data: &[u8]) -> Self {
        Error::InvalidPpid {
            data: String::from_utf8_lossy(data).into_owned(),
        }
    }
}
