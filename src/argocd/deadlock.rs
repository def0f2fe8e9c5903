// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Recovery for an Argo CD operator stuck on an agent-owned admin secret.
//!
//! The operator never finishes creating its config maps while a secret it did not
//! create sits under its admin secret name. The repair removes that secret and
//! restarts the operator, at most once per cooldown window.

use crate::config::ResourceNames;
use crate::constants::argocd::{HEALTHY_CONFIG_MAP_THRESHOLD, OPERATOR_RESTART_COOLDOWN_SECS};
use crate::error::{AgentError, Result};
use crate::kubernetes::count_labeled;
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use k8s_openapi::api::core::v1::{ConfigMap, Pod, Secret};
use kube::{
    api::{DeleteParams, ListParams},
    Api, Client, ResourceExt,
};
use tracing::{debug, info, instrument};

#[instrument(skip(client, names, now))]
pub async fn repair_if_deadlocked(
    client: &Client,
    names: &ResourceNames,
    namespace: &str,
    operator_namespace: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let config_maps: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
    let found = count_labeled(&config_maps, &names.selector).await?;
    if found > HEALTHY_CONFIG_MAP_THRESHOLD {
        debug!("Found {} Argo CD config maps, operator is healthy", found);
        return Ok(());
    }

    let pods_api: Api<Pod> = Api::namespaced(client.clone(), operator_namespace);
    let pods = pods_api.list(&ListParams::default()).await?.items;

    let cutoff = now - Duration::seconds(OPERATOR_RESTART_COOLDOWN_SECS);
    if pods.iter().any(|pod| created_after(pod, cutoff)) {
        info!("Argo CD operator pod was recently created, waiting to reboot...");
        return Ok(());
    }

    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);
    if let Some(secret) = secrets.get_opt(&names.admin_secret).await? {
        if secret.owner_references().is_empty() {
            info!("Deleting agent-managed Argo CD secret {}", names.admin_secret);
            secrets
                .delete(&names.admin_secret, &DeleteParams::default())
                .await?;
        }
    }

    info!("Rebooting Argo CD operator to resolve deadlock...");
    let deletions = pods.iter().map(|pod| {
        let api = pods_api.clone();
        let name = pod.name_any();
        async move {
            info!("Removing pod {}", name);
            api.delete(&name, &DeleteParams::default())
                .await
                .map(|_| ())
                .map_err(|e| format!("{}: {}", name, e))
        }
    });

    let failures: Vec<String> = join_all(deletions)
        .await
        .into_iter()
        .filter_map(|result| result.err())
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(AgentError::PodDeletion(failures))
    }
}

fn created_after(pod: &Pod, cutoff: DateTime<Utc>) -> bool {
    pod.metadata
        .creation_timestamp
        .as_ref()
        .is_some_and(|created| created.0 > cutoff)
}
