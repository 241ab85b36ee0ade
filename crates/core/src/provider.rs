// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CcbError;

/// The closed set of provider TUIs CCB knows how to drive (spec §1, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Codex,
    Claude,
    Gemini,
    Opencode,
    Droid,
}

impl Provider {
    pub const ALL: [Provider; 5] =
        [Provider::Codex, Provider::Claude, Provider::Gemini, Provider::Opencode, Provider::Droid];

    /// The daemon key (and protocol prefix, sans trailing `d`) of this
    /// provider's own single-provider daemon, for the three providers that
    /// have one: Codex's is `caskd`, Gemini's `gaskd`, OpenCode's `oaskd`.
    /// Claude and Droid have no single-provider daemon in
    /// `original_source/lib` (no `claskd`/`droidd` module exists) — both
    /// are served only through the unified `askd` (spec §4.5).
    pub fn daemon_key(&self) -> Option<&'static str> {
        match self {
            Self::Codex => Some("caskd"),
            Self::Gemini => Some("gaskd"),
            Self::Opencode => Some("oaskd"),
            Self::Claude | Self::Droid => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Codex => "codex",
            Self::Claude => "claude",
            Self::Gemini => "gemini",
            Self::Opencode => "opencode",
            Self::Droid => "droid",
        };
        f.write_str(s)
    }
}

impl FromStr for Provider {
    type Err = CcbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "codex" => Ok(Self::Codex),
            "claude" => Ok(Self::Claude),
            "gemini" => Ok(Self::Gemini),
            "opencode" => Ok(Self::Opencode),
            "droid" => Ok(Self::Droid),
            other => Err(CcbError::UnknownProvider(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_from_str() -> anyhow::Result<()> {
        for p in Provider::ALL {
            assert_eq!(p.to_string().parse::<Provider>()?, p);
        }
        Ok(())
    }

    #[test]
    fn unknown_provider_is_rejected() {
        assert!("nonexistent".parse::<Provider>().is_err());
    }

    #[test]
    fn serde_uses_lowercase_names() -> anyhow::Result<()> {
        let json = serde_json::to_string(&Provider::Opencode)?;
        assert_eq!(json, "\"opencode\"");
        Ok(())
    }

    #[test]
    fn only_codex_gemini_opencode_have_single_provider_daemons() {
        assert_eq!(Provider::Codex.daemon_key(), Some("caskd"));
        assert_eq!(Provider::Gemini.daemon_key(), Some("gaskd"));
        assert_eq!(Provider::Opencode.daemon_key(), Some("oaskd"));
        assert_eq!(Provider::Claude.daemon_key(), None);
        assert_eq!(Provider::Droid.daemon_key(), None);
    }
}
