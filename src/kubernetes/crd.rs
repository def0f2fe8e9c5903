// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CRD installation from bundled manifests

use crate::error::{is_already_exists, AgentError, Result};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::{api::PostParams, Api, Client, ResourceExt};
use tracing::{info, instrument};

/// A manifest compiled into the binary, with the path it was loaded from
#[derive(Debug, Clone, Copy)]
pub struct BundledManifest {
    pub path: &'static str,
    pub content: &'static str,
}

/// Decode a manifest, rejecting anything that is not a `CustomResourceDefinition`
pub fn parse_crd(manifest: &BundledManifest) -> Result<CustomResourceDefinition> {
    let value: serde_yaml::Value = serde_yaml::from_str(manifest.content)
        .map_err(|e| AgentError::InvalidManifest(format!("{}: {}", manifest.path, e)))?;

    let kind = value.get("kind").and_then(|k| k.as_str()).unwrap_or_default();
    if kind != "CustomResourceDefinition" {
        return Err(AgentError::InvalidManifest(format!(
            "{}: unexpected kind {:?}",
            manifest.path, kind
        )));
    }

    serde_yaml::from_value(value)
        .map_err(|e| AgentError::InvalidManifest(format!("{}: {}", manifest.path, e)))
}

/// Create every bundled CRD, skipping those already installed.
#[instrument(skip(client, manifests))]
pub async fn install_crds(client: &Client, manifests: &[BundledManifest]) -> Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());

    for manifest in manifests {
        let crd = parse_crd(manifest)?;
        let name = crd.name_any();

        match crds.create(&PostParams::default(), &crd).await {
            Ok(_) => info!("{} CRD created", name),
            Err(e) if is_already_exists(&e) => info!("{} CRD already exists, skip", name),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
