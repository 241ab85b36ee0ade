// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idle and parent-liveness supervision threads (spec §4.4), grounded on
//! `askd_server.py`'s `_idle_monitor`/`_parent_monitor` closures: both poll
//! every 500 ms and cancel `cancel` once their condition fires, rather than
//! calling `shutdown()` directly, so the caller decides how shutdown is
//! actually carried out (closing the listener, in our case).

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::activity::Activity;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Requests `cancel` once `active_requests == 0` and `idle_timeout` has
/// elapsed since the last activity. A zero `idle_timeout` disables the
/// monitor entirely (spec §4.4, "managed mode ... disables this by setting
/// timeout to 0").
pub async fn idle_monitor(activity: Arc<Activity>, idle_timeout: Duration, cancel: CancellationToken) {
    if idle_timeout.is_zero() {
        return;
    }
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }
        if activity.is_idle(idle_timeout) {
            tracing::info!(idle_timeout_s = idle_timeout.as_secs_f64(), "idle timeout reached; shutting down");
            cancel.cancel();
            return;
        }
    }
}

/// Requests `cancel` once `parent_pid` is no longer alive, polled via
/// `kill(pid, None)` (spec §4.4's `kill(pid, 0)` POSIX primitive — `nix`
/// maps "no signal, just existence check" to `Signal::None`... this crate
/// uses `None` as the `nix::sys::signal::kill` signal argument directly).
pub async fn parent_monitor(parent_pid: u32, cancel: CancellationToken) {
    let pid = nix::unistd::Pid::from_raw(parent_pid as i32);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }
        if nix::sys::signal::kill(pid, None).is_err() {
            tracing::info!(parent_pid, "parent process exited; shutting down");
            cancel.cancel();
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn idle_monitor_cancels_after_timeout_with_no_activity() {
        let activity = Arc::new(Activity::default());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(idle_monitor(Arc::clone(&activity), Duration::from_millis(10), cancel.clone()));
        tokio::time::timeout(Duration::from_secs(2), cancel.cancelled()).await.expect("cancellation");
        handle.await.expect("task join");
    }

    #[tokio::test]
    async fn zero_timeout_never_cancels() {
        let activity = Arc::new(Activity::default());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(idle_monitor(activity, Duration::ZERO, cancel.clone()));
        tokio::time::timeout(Duration::from_millis(50), handle).await.unwrap_err();
    }
}
