// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Wire types of the fleet API's cluster resource

use crate::error::{AgentError, Result};
use crate::types::facts::ClusterFacts;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Body of `PATCH /clusters/{id}`
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_repo: Option<GitRepoPatch>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub facts: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub dynamic_facts: ClusterFacts,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GitRepoPatch {
    pub deploy_key: String,
}

impl ClusterPatch {
    pub fn new(deploy_key: impl Into<String>) -> Self {
        ClusterPatch {
            git_repo: Some(GitRepoPatch {
                deploy_key: deploy_key.into(),
            }),
            ..Default::default()
        }
    }

    /// Set a static fact; empty values are left out
    pub fn with_fact(mut self, key: &str, value: &str) -> Self {
        if !value.is_empty() {
            self.facts.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn with_dynamic_facts(mut self, facts: ClusterFacts) -> Self {
        self.dynamic_facts = facts;
        self
    }
}

/// The cluster as returned by the fleet API. The agent patches it but never owns it.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterRegistration {
    pub id: String,
    pub git_repo: Option<GitRepo>,
    pub facts: BTreeMap<String, String>,
    pub dynamic_facts: BTreeMap<String, serde_json::Value>,
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GitRepo {
    pub url: Option<String>,
    pub deploy_key: Option<String>,
    pub host_keys: Option<String>,
    #[serde(rename = "type")]
    pub repo_type: Option<String>,
}

impl ClusterRegistration {
    /// URL of the cluster's catalog repository
    pub fn repo_url(&self) -> Result<&str> {
        self.git_repo
            .as_ref()
            .and_then(|r| r.url.as_deref())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AgentError::MissingGitRepo(self.id.clone()))
    }

    /// SSH host keys of the Git server, in known_hosts format
    pub fn host_keys(&self) -> Option<&str> {
        self.git_repo
            .as_ref()
            .and_then(|r| r.host_keys.as_deref())
            .filter(|k| !k.is_empty())
    }
}

/// Error body returned by the fleet API for non-200 responses
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct Reason {
    pub reason: String,
}
