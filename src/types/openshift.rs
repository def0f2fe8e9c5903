// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Subset of the OpenShift `ClusterVersion` and `Route` resources read by the fact collector

use crate::error::{AgentError, Result};
use crate::types::version::SemanticVersion;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterVersion {
    pub status: ClusterVersionStatus,
}

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterVersionStatus {
    pub desired: Release,
    pub history: Vec<UpdateHistory>,
}

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Release {
    pub version: String,
}

/// One entry of the cluster's update history. The list is not guaranteed to be sorted.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateHistory {
    pub state: String,
    pub verified: bool,
    pub version: String,
    pub completion_time: Option<DateTime<Utc>>,
}

impl UpdateHistory {
    fn is_completed_and_verified(&self) -> bool {
        self.state == "Completed" && self.verified
    }
}

impl ClusterVersion {
    /// The most recently completed, verified version; falls back to the desired version.
    pub fn current_version(&self) -> Result<SemanticVersion> {
        let mut latest: Option<(&DateTime<Utc>, &UpdateHistory)> = None;
        for entry in self.status.history.iter().filter(|h| h.is_completed_and_verified()) {
            let Some(completed) = entry.completion_time.as_ref() else {
                continue;
            };
            if latest.map_or(true, |(best, _)| completed > best) {
                latest = Some((completed, entry));
            }
        }

        let current = latest.map(|(_, entry)| entry.version.as_str()).unwrap_or_default();
        match current.parse::<SemanticVersion>() {
            Ok(version) => Ok(version),
            Err(e) => {
                warn!("Unable to parse version {:?}: {}; falling back to desired version", current, e);
                self.status.desired.version.parse().map_err(|e| {
                    AgentError::InvalidVersion(format!("unable to parse desired version: {}", e))
                })
            }
        }
    }
}

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct Route {
    pub spec: RouteSpec,
}

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct RouteSpec {
    pub host: String,
}
