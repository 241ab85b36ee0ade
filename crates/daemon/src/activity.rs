// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `(active_requests, last_activity)` counters guarded by a single lock
//! (spec §4.4, §5 "Shared-resource policy"), grounded on
//! `askd_server.py`'s `Handler`/`activity_lock` pair: incremented on
//! connection enter, decremented on connection exit, `last_activity`
//! touched on every outbound write too so a long-running request keeps
//! the idle monitor from firing mid-flight.

use std::sync::Mutex;
use std::time::Instant;

pub struct Activity {
    inner: Mutex<Inner>,
}

struct Inner {
    active_requests: u32,
    last_activity: Instant,
}

impl Default for Activity {
    fn default() -> Self {
        Self { inner: Mutex::new(Inner { active_requests: 0, last_activity: Instant::now() }) }
    }
}

impl Activity {
    pub fn enter(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.active_requests += 1;
        inner.last_activity = Instant::now();
    }

    pub fn exit(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.active_requests = inner.active_requests.saturating_sub(1);
        inner.last_activity = Instant::now();
    }

    pub fn touch(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.last_activity = Instant::now();
    }

    /// `true` iff there are no in-flight requests and `last_activity` is at
    /// least `idle_timeout` in the past.
    pub fn is_idle(&self, idle_timeout: std::time::Duration) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.active_requests == 0 && inner.last_activity.elapsed() >= idle_timeout
    }
}
