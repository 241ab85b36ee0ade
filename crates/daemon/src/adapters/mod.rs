// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concrete [`crate::adapter::ProviderAdapter`] implementations: one per
//! drivable provider TUI (spec §4.5). Claude has none — it's read-only
//! caller-side tooling, not a daemon-driven provider.

mod codex;
mod common;
mod droid;
mod gemini;
mod opencode;

use std::sync::Arc;

use ccb_core::Provider;

use crate::adapter::ProviderAdapter;

/// One `Arc<dyn ProviderAdapter>` per drivable provider, in
/// [`ccb_core::Provider::ALL`] order (Claude is skipped).
pub fn all() -> Vec<Arc<dyn ProviderAdapter>> {
    vec![
        Arc::new(codex::adapter()),
        Arc::new(gemini::adapter()),
        Arc::new(opencode::adapter()),
        Arc::new(droid::adapter()),
    ]
}

/// The single adapter for `provider`, for a single-provider daemon
/// (`caskd`/`gaskd`/`oaskd`) that only ever serves its own kind.
pub fn for_provider(provider: Provider) -> Option<Arc<dyn ProviderAdapter>> {
    match provider {
        Provider::Codex => Some(Arc::new(codex::adapter())),
        Provider::Gemini => Some(Arc::new(gemini::adapter())),
        Provider::Opencode => Some(Arc::new(opencode::adapter())),
        Provider::Droid => Some(Arc::new(droid::adapter())),
        Provider::Claude => None,
    }
}
