// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The project and root applications pointing Argo CD at the cluster catalog

use crate::constants::LOCAL_KUBERNETES_API;
use crate::error::{AgentError, Result};
use crate::kubernetes::create_if_absent;
use crate::types::argocd::{
    AppProject, AppProjectSpec, Application, ApplicationSource, ApplicationSpec, AutomatedSync,
    Destination, GroupKind, SyncPolicy,
};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{Api, Client, Resource, ResourceExt};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use tracing::{debug, info, instrument};

const TEAMS_KEY: &str = "teams";

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AgentError::InvalidResource(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Project allowing any cluster resource, deployed to this cluster, sourced from `repo_url`
pub fn project(name: &str, namespace: &str, repo_url: &str) -> Result<AppProject> {
    require("project name", name)?;
    require("project namespace", namespace)?;
    require("repository URL", repo_url)?;

    let mut project = AppProject::new(
        name,
        AppProjectSpec {
            cluster_resource_whitelist: vec![GroupKind {
                group: "*".to_string(),
                kind: "*".to_string(),
            }],
            destinations: vec![Destination {
                namespace: "*".to_string(),
                server: LOCAL_KUBERNETES_API.to_string(),
            }],
            source_repos: vec![repo_url.to_string()],
        },
    );
    project.metadata.namespace = Some(namespace.to_string());
    Ok(project)
}

/// Self-healing application syncing `path` of the catalog into `namespace`, never pruning
pub fn application(
    name: &str,
    namespace: &str,
    project: &str,
    repo_url: &str,
    path: &str,
) -> Result<Application> {
    require("application name", name)?;
    require("application namespace", namespace)?;
    require("application project", project)?;
    require("repository URL", repo_url)?;
    require("application path", path)?;

    let mut app = Application::new(
        name,
        ApplicationSpec {
            project: project.to_string(),
            source: ApplicationSource {
                repo_url: repo_url.to_string(),
                path: path.to_string(),
                target_revision: "HEAD".to_string(),
            },
            destination: Destination {
                namespace: namespace.to_string(),
                server: LOCAL_KUBERNETES_API.to_string(),
            },
            sync_policy: Some(SyncPolicy {
                automated: AutomatedSync {
                    prune: false,
                    self_heal: true,
                },
            }),
        },
    );
    app.metadata.namespace = Some(namespace.to_string());
    Ok(app)
}

/// Root application of a team, syncing its own apps directory under its own project
pub fn team_application(team: &str, namespace: &str, repo_url: &str) -> Result<Application> {
    application(
        &format!("root-{}", team),
        namespace,
        team,
        repo_url,
        &format!("manifests/apps-{}/", team),
    )
}

/// Create `obj` unless an object of that name exists already. Existing objects are never touched.
#[instrument(skip(client, obj), fields(kind = %K::kind(&()), name = %obj.name_any()))]
pub async fn create_unless_present<K>(client: &Client, namespace: &str, obj: &K) -> Result<()>
where
    K: Resource<DynamicType = (), Scope = k8s_openapi::NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug,
{
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    if api.get_opt(&obj.name_any()).await?.is_some() {
        debug!("{} {} present, leaving it alone", K::kind(&()), obj.name_any());
        return Ok(());
    }
    create_if_absent(&api, obj).await?;
    Ok(())
}

/// Teams listed as a JSON array under `teams` in the given config map
#[instrument(skip(client))]
pub async fn additional_teams(client: &Client, namespace: &str, config_map: &str) -> Result<Vec<String>> {
    if config_map.is_empty() {
        return Ok(Vec::new());
    }

    let api: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
    let Some(cm) = api.get_opt(config_map).await? else {
        info!("Additional root apps config map not present");
        return Ok(Vec::new());
    };

    let teams = cm
        .data
        .as_ref()
        .and_then(|data| data.get(TEAMS_KEY))
        .ok_or_else(|| {
            AgentError::InvalidResource(format!(
                "additional root apps config map {} has no key {}",
                config_map, TEAMS_KEY
            ))
        })?;
    Ok(serde_json::from_str(teams)?)
}
