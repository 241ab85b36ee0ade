// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Maps a `--daemon` flag to the [`ccb_daemon::spec::DaemonSpec`] it
//! controls, so `ccbctl` can address any of the four daemon flavors
//! without four near-identical subcommand sets.

use clap::ValueEnum;

use ccb_daemon::spec::DaemonSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "lowercase")]
pub enum Target {
    Ask,
    Cask,
    Gask,
    Oask,
}

impl Target {
    pub fn spec(self) -> DaemonSpec {
        match self {
            Self::Ask => DaemonSpec::ASKD,
            Self::Cask => DaemonSpec::CASKD,
            Self::Gask => DaemonSpec::GASKD,
            Self::Oask => DaemonSpec::OASKD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_target_maps_to_its_own_protocol_prefix() {
        assert_eq!(Target::Ask.spec().protocol_prefix, "ask");
        assert_eq!(Target::Cask.spec().protocol_prefix, "cask");
        assert_eq!(Target::Gask.spec().protocol_prefix, "gask");
        assert_eq!(Target::Oask.spec().protocol_prefix, "oask");
    }
}
