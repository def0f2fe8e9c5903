// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Version parsing for the platform and distribution facts

use crate::error::{AgentError, Result};
use k8s_openapi::apimachinery::pkg::version::Info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A `major.minor.patch` version with purely numeric components.
///
/// Serialised with capitalised keys, the shape the fleet API has always received.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SemanticVersion {
    #[serde(rename = "Major")]
    pub major: String,
    #[serde(rename = "Minor")]
    pub minor: String,
    #[serde(rename = "Patch")]
    pub patch: String,
}

impl FromStr for SemanticVersion {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        let [major, minor, patch] = parts.as_slice() else {
            return Err(AgentError::InvalidVersion(format!("unknown version {:?}", s)));
        };

        Ok(SemanticVersion {
            major: numeric_component("major", major)?,
            minor: numeric_component("minor", minor)?,
            patch: numeric_component("patch", patch)?,
        })
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

fn numeric_component(which: &str, raw: &str) -> Result<String> {
    let trimmed = trim_version(raw);
    if trimmed.is_empty() {
        return Err(AgentError::InvalidVersion(format!(
            "unknown {} version {:?}",
            which, raw
        )));
    }
    Ok(trimmed.to_string())
}

/// Keep the leading run of digits, dropping suffixes such as the `+` in `"20+"`
pub fn trim_version(v: &str) -> &str {
    let end = v.find(|c: char| !c.is_ascii_digit()).unwrap_or(v.len());
    &v[..end]
}

/// Normalise the major and minor fields reported by the API server's `/version` endpoint
pub fn process_kubernetes_version(mut info: Info) -> Result<Info> {
    info.major = numeric_component("major", &info.major)?;
    info.minor = numeric_component("minor", &info.minor)?;
    Ok(info)
}
