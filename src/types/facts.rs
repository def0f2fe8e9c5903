// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::types::version::SemanticVersion;
use k8s_openapi::apimachinery::pkg::version::Info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dynamic facts keyed by fact name. Later inserts win.
pub type ClusterFacts = BTreeMap<String, FactValue>;

/// Value of a single dynamic fact
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum FactValue {
    Text(String),
    Kubernetes(Info),
    Semantic(SemanticVersion),
}

impl From<String> for FactValue {
    fn from(value: String) -> Self {
        FactValue::Text(value)
    }
}

impl From<&str> for FactValue {
    fn from(value: &str) -> Self {
        FactValue::Text(value.to_string())
    }
}

impl From<Info> for FactValue {
    fn from(value: Info) -> Self {
        FactValue::Kubernetes(value)
    }
}

impl From<SemanticVersion> for FactValue {
    fn from(value: SemanticVersion) -> Self {
        FactValue::Semantic(value)
    }
}
