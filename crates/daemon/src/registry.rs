// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Maps a [`Provider`] to its adapter and its own per-session worker pool
//! (spec §4.5's `_UnifiedWorkerPool`): "the unified daemon holds one
//! per-session-worker pool per provider so that concurrent sessions in
//! different providers do not serialize against one another." The same
//! type backs single-provider daemons (`caskd`/`gaskd`/`oaskd`) with
//! exactly one entry, so the dispatch path is identical either way.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ccb_core::{CcbError, Provider};
use ccb_pool::{SubmitOutcome, WorkerPool};

use crate::adapter::{AdapterHandler, ProviderAdapter};
use crate::adapters;
use crate::task::{ProviderRequest, ProviderResult};

struct Entry {
    adapter: Arc<dyn ProviderAdapter>,
    pool: WorkerPool<AdapterHandler>,
}

/// Design note (spec §9): "Worker pool holds workers; workers hold a
/// reference to the adapter; adapters hold no reference to the pool." The
/// registry itself holds the one extra reference to each adapter it needs
/// to compute a session key *before* the request reaches a lane.
pub struct ProviderRegistry {
    entries: HashMap<Provider, Entry>,
}

impl ProviderRegistry {
    /// All four drivable providers, for the unified `askd` (spec §4.5).
    pub fn unified() -> Self {
        let mut entries = HashMap::new();
        for adapter in adapters::all() {
            entries.insert(adapter.provider(), Entry { pool: WorkerPool::new(AdapterHandler(Arc::clone(&adapter))), adapter });
        }
        Self { entries }
    }

    /// Exactly one provider, for a single-provider daemon
    /// (`caskd`/`gaskd`/`oaskd`).
    pub fn single(provider: Provider) -> Option<Self> {
        let adapter = adapters::for_provider(provider)?;
        let mut entries = HashMap::new();
        entries.insert(provider, Entry { pool: WorkerPool::new(AdapterHandler(Arc::clone(&adapter))), adapter });
        Some(Self { entries })
    }

    /// Compute the session key, then enqueue onto that provider's lane
    /// and wait up to `timeout` (spec §4.2/§4.5).
    pub async fn submit(
        &self,
        provider: Provider,
        req_id: &str,
        request: ProviderRequest,
        timeout: Duration,
    ) -> Result<SubmitOutcome<ProviderResult>, CcbError> {
        let entry = self.entries.get(&provider).ok_or_else(|| CcbError::UnknownProvider(provider.to_string()))?;
        let session_key = entry.adapter.compute_session_key(&request).await?;
        Ok(entry.pool.submit(session_key, req_id, request, timeout).await)
    }

    pub fn providers(&self) -> impl Iterator<Item = &Provider> {
        self.entries.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_excludes_claude() {
        assert!(ProviderRegistry::single(Provider::Claude).is_none());
        assert!(ProviderRegistry::single(Provider::Codex).is_some());
    }

    #[tokio::test]
    async fn submit_to_unregistered_provider_is_unknown_provider() {
        let registry = ProviderRegistry::single(Provider::Codex).expect("codex registers");
        let req = ProviderRequest {
            client_id: "c".to_owned(),
            work_dir: "/tmp".to_owned(),
            timeout_s: 1.0,
            quiet: false,
            message: "hi".to_owned(),
            caller: None,
            output_path: None,
            req_id_override: None,
            no_wrap: false,
        };
        let err = registry.submit(Provider::Gemini, "r1", req, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, CcbError::UnknownProvider(_)));
    }
}
