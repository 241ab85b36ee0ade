// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run-directory resolution (spec §3, §6): `~/.ccb/run` by default,
//! overridable via `CCB_RUN_DIR`. Grounded on `caskd_daemon.py::_run_dir`.

use std::path::PathBuf;

use crate::error::DaemonError;
use crate::spec::DaemonSpec;

pub fn run_dir() -> Result<PathBuf, DaemonError> {
    if let Some(dir) = std::env::var_os("CCB_RUN_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().ok_or(DaemonError::NoRunDir)?;
    Ok(home.join(".ccb").join("run"))
}

pub fn state_file_path(spec: &DaemonSpec) -> Result<PathBuf, DaemonError> {
    Ok(run_dir()?.join(spec.state_file_name()))
}

pub fn log_file_path(spec: &DaemonSpec) -> Result<PathBuf, DaemonError> {
    Ok(run_dir()?.join(spec.log_file_name()))
}

pub fn lock_file_path(spec: &DaemonSpec) -> Result<PathBuf, DaemonError> {
    Ok(run_dir()?.join(format!("{}.lock", spec.daemon_key)))
}
