// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The caller's progress cursor, read from `state.json` (spec §3, §4.6).
//! Grounded directly on
//! `original_source/claude_skills/tr/scripts/autoloop.py`'s `Cursor`
//! dataclass and `_has_remaining_work`.

use serde::{Deserialize, Serialize};

/// `{type, stepIndex, subIndex}` (spec §3), compared for equality on every
/// evaluation to decide whether the caller's progress has advanced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "stepIndex")]
    pub step_index: Option<i64>,
    #[serde(rename = "subIndex")]
    pub sub_index: Option<i64>,
}

impl Cursor {
    pub fn none() -> Self {
        Self { kind: "none".to_owned(), step_index: None, sub_index: None }
    }

    pub fn is_none(&self) -> bool {
        self.kind == "none"
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SubstepStatus {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct StepStatus {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    substeps: Option<Vec<SubstepStatus>>,
}

/// `state.json`'s full shape, as written by the caller (not this crate —
/// autoloop only ever reads it).
#[derive(Debug, Clone, Deserialize)]
pub struct CallerState {
    #[serde(default)]
    current: Option<CurrentField>,
    #[serde(default)]
    steps: Option<Vec<StepStatus>>,
}

#[derive(Debug, Clone, Deserialize)]
struct CurrentField {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(rename = "stepIndex", default)]
    step_index: Option<i64>,
    #[serde(rename = "subIndex", default)]
    sub_index: Option<i64>,
}

fn is_open(status: &Option<String>) -> bool {
    matches!(status.as_deref(), Some("todo") | Some("doing"))
}

impl CallerState {
    pub fn load(path: &std::path::Path) -> Option<Self> {
        let raw = std::fs::read(path).ok()?;
        serde_json::from_slice(&raw).ok()
    }

    pub fn cursor(&self) -> Cursor {
        match &self.current {
            Some(c) => Cursor {
                kind: c.kind.clone().unwrap_or_else(|| "none".to_owned()),
                step_index: c.step_index,
                sub_index: c.sub_index,
            },
            None => Cursor::none(),
        }
    }

    /// True iff any step or substep is still `todo`/`doing` (spec §4.6
    /// step 2). A `steps` array absent entirely is treated as "still
    /// working" — we have a cursor but no way to prove it's done.
    pub fn has_remaining_work(&self) -> bool {
        if self.cursor().is_none() {
            return false;
        }
        let Some(steps) = &self.steps else { return true };
        for step in steps {
            if is_open(&step.status) {
                return true;
            }
            if let Some(substeps) = &step.substeps {
                if substeps.iter().any(|s| is_open(&s.status)) {
                    return true;
                }
            }
        }
        false
    }
}
