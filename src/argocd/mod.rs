// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Argo CD bootstrap.
//!
//! A reconciliation first looks for an operator-managed Argo CD in the namespace and,
//! when there is one, only repairs the operator deadlock. Otherwise it counts the
//! labelled workloads and bootstraps the full set when the counts are off. There is
//! no per-field diffing: present objects are left as they are.

pub mod apps;
pub mod configmaps;
pub mod crds;
pub mod deadlock;
pub mod workloads;

use crate::config::{Config, Images, ResourceNames};
use crate::constants::argocd::{
    API_GROUP, API_VERSION, EXPECTED_DEPLOYMENTS, EXPECTED_STATEFULSETS, OPERATOR_KIND,
    OPERATOR_RESOURCE,
};
use crate::credentials::CredentialManager;
use crate::error::{is_not_found, Result};
use crate::gitops::GitOpsBackend;
use crate::kubernetes::{count_labeled, create_if_absent, install_crds};
use crate::types::ClusterRegistration;
use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::Service;
use kube::{
    api::{ApiResource, DynamicObject, GroupVersionKind, ListParams},
    Api, Client,
};
use tracing::{info, instrument};
use workloads::Workloads;

pub struct ArgoCdBackend {
    client: Client,
    namespace: String,
    operator_namespace: String,
    additional_root_apps_config_map: String,
    images: Images,
    names: ResourceNames,
    credentials: CredentialManager,
}

impl ArgoCdBackend {
    pub fn new(client: Client, config: &Config, names: ResourceNames) -> Self {
        let credentials = CredentialManager::new(client.clone(), &config.namespace, names.clone());
        Self {
            client,
            namespace: config.namespace.clone(),
            operator_namespace: config.operator_namespace.clone(),
            additional_root_apps_config_map: config.additional_root_apps_config_map.clone(),
            images: config.images(),
            names,
            credentials,
        }
    }

    /// Whether an `ArgoCD` custom resource exists, i.e. the operator owns this namespace
    async fn operator_managed(&self) -> Result<bool> {
        let gvk = GroupVersionKind::gvk(API_GROUP, API_VERSION, OPERATOR_KIND);
        let resource = ApiResource::from_gvk_with_plural(&gvk, OPERATOR_RESOURCE);
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), &self.namespace, &resource);

        match api.list(&ListParams::default()).await {
            Ok(list) => Ok(!list.items.is_empty()),
            // CRD not installed, no operator
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether exactly the expected number of labelled workloads is present
    async fn deployed(&self) -> Result<bool> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), &self.namespace);
        let statefulsets: Api<StatefulSet> = Api::namespaced(self.client.clone(), &self.namespace);

        let found_deployments = count_labeled(&deployments, &self.names.selector).await?;
        let found_statefulsets = count_labeled(&statefulsets, &self.names.selector).await?;

        if found_deployments == EXPECTED_DEPLOYMENTS && found_statefulsets == EXPECTED_STATEFULSETS {
            return Ok(true);
        }

        info!(
            "Found {} of expected {} deployments, found {} of expected {} statefulsets, bootstrapping now",
            found_deployments, EXPECTED_DEPLOYMENTS, found_statefulsets, EXPECTED_STATEFULSETS
        );
        Ok(false)
    }

    /// Create the full Argo CD installation. The first failing step aborts the rest.
    #[instrument(skip(self, registration), fields(cluster = %registration.id))]
    pub async fn bootstrap(&self, registration: &ClusterRegistration) -> Result<()> {
        let repo_url = registration.repo_url()?;

        self.credentials.ensure_repository_secret(repo_url).await?;

        configmaps::ensure_config_maps(
            &self.client,
            &self.namespace,
            &self.names,
            registration.host_keys(),
        )
        .await?;

        install_crds(&self.client, crds::MANIFESTS).await?;

        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), &self.namespace);
        let services: Api<Service> = Api::namespaced(self.client.clone(), &self.namespace);
        let workloads = Workloads::new(&self.namespace, &self.names, &self.images);

        create_if_absent(&services, &workloads.redis_service()).await?;
        create_if_absent(&deployments, &workloads.redis_deployment()).await?;

        create_if_absent(&services, &workloads.repo_server_service()).await?;
        create_if_absent(&deployments, &workloads.repo_server_deployment()).await?;

        create_if_absent(&deployments, &workloads.server_deployment()).await?;

        let project = apps::project(&self.names.project, &self.namespace, repo_url)?;
        apps::create_unless_present(&self.client, &self.namespace, &project).await?;

        let root = apps::application(
            &self.names.root_app,
            &self.namespace,
            &self.names.project,
            repo_url,
            &self.names.apps_path,
        )?;
        apps::create_unless_present(&self.client, &self.namespace, &root).await?;

        let teams = apps::additional_teams(
            &self.client,
            &self.namespace,
            &self.additional_root_apps_config_map,
        )
        .await?;
        for team in teams {
            let project = apps::project(&team, &self.namespace, repo_url)?;
            apps::create_unless_present(&self.client, &self.namespace, &project).await?;
            let app = apps::team_application(&team, &self.namespace, repo_url)?;
            apps::create_unless_present(&self.client, &self.namespace, &app).await?;
        }

        let statefulsets: Api<StatefulSet> = Api::namespaced(self.client.clone(), &self.namespace);
        create_if_absent(&statefulsets, &workloads.application_controller()).await?;

        Ok(())
    }
}

#[async_trait]
impl GitOpsBackend for ArgoCdBackend {
    fn name(&self) -> &'static str {
        "argocd"
    }

    #[instrument(skip(self, registration), fields(cluster = %registration.id))]
    async fn reconcile(&self, registration: &ClusterRegistration) -> Result<()> {
        if self.operator_managed().await? {
            return deadlock::repair_if_deadlocked(
                &self.client,
                &self.names,
                &self.namespace,
                &self.operator_namespace,
                Utc::now(),
            )
            .await;
        }

        if self.deployed().await? {
            return Ok(());
        }

        self.bootstrap(registration).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::argocd::{AppProject, Application};
    use crate::types::fleet::GitRepo;
    use crate::test_utils::FakeApiServer;
    use clap::Parser;
    use k8s_openapi::api::core::v1::{ConfigMap, Pod, Secret};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use k8s_openapi::ByteString;
    use kube::api::ObjectMeta;
    use serde_json::json;
    use std::collections::BTreeMap;

    const REPO: &str = "ssh://git@git.example.com/org/cluster-catalog.git";

    fn config() -> Config {
        Config::try_parse_from([
            "helmsman",
            "--api",
            "https://api.example.com",
            "--token",
            "t0ken",
            "--cluster-id",
            "c-test-1234",
        ])
        .unwrap()
    }

    fn registration(host_keys: Option<&str>) -> ClusterRegistration {
        ClusterRegistration {
            id: "c-test-1234".to_string(),
            git_repo: Some(GitRepo {
                url: Some(REPO.to_string()),
                host_keys: host_keys.map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn backend(fake: &FakeApiServer) -> ArgoCdBackend {
        ArgoCdBackend::new(fake.client(), &config(), ResourceNames::default())
    }

    /// The keypair exists before any reconcile, the agent creates it first
    fn seed_ssh_secret(fake: &FakeApiServer) {
        fake.seed(&Secret {
            metadata: ObjectMeta {
                name: Some("argo-ssh-key".to_string()),
                namespace: Some("syn".to_string()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([
                ("sshPublicKey".to_string(), ByteString(b"ssh-rsa AAAA\n".to_vec())),
                ("sshPrivateKey".to_string(), ByteString(b"private".to_vec())),
            ])),
            ..Default::default()
        });
    }

    fn assert_single_objects(fake: &FakeApiServer) {
        assert_eq!(fake.object_count("/api/v1/namespaces/syn/configmaps"), 4);
        assert_eq!(fake.object_count("/apis/apps/v1/namespaces/syn/deployments"), 3);
        assert_eq!(fake.object_count("/api/v1/namespaces/syn/services"), 2);
        assert_eq!(fake.object_count("/apis/apps/v1/namespaces/syn/statefulsets"), 1);
        assert_eq!(fake.object_count("/apis/argoproj.io/v1alpha1/namespaces/syn/appprojects"), 1);
        assert_eq!(fake.object_count("/apis/argoproj.io/v1alpha1/namespaces/syn/applications"), 1);
        assert_eq!(
            fake.object_count("/apis/apiextensions.k8s.io/v1/customresourcedefinitions"),
            2
        );
    }

    #[tokio::test]
    async fn test_empty_cluster_is_bootstrapped_once() {
        let fake = FakeApiServer::new();
        seed_ssh_secret(&fake);
        let backend = backend(&fake);
        let registration = registration(Some("git.example.com ssh-ed25519 AAAA"));

        backend.reconcile(&registration).await.unwrap();
        assert_single_objects(&fake);

        let app = fake.get::<Application>(Some("syn"), "root").unwrap();
        assert_eq!(app.spec.source.repo_url, REPO);
        assert_eq!(app.spec.project, "syn");
        let project = fake.get::<AppProject>(Some("syn"), "syn").unwrap();
        assert_eq!(project.spec.source_repos, vec![REPO.to_string()]);

        let repo = fake.get::<Secret>(Some("syn"), "argo-repo").unwrap();
        assert_eq!(repo.data.unwrap()["url"].0, REPO.as_bytes());

        // Second run finds everything in place
        fake.clear_requests();
        backend.reconcile(&registration).await.unwrap();
        assert!(fake.writes().is_empty());
        assert_single_objects(&fake);
    }

    #[tokio::test]
    async fn test_bootstrap_without_host_keys_skips_known_hosts() {
        let fake = FakeApiServer::new();
        seed_ssh_secret(&fake);

        backend(&fake).reconcile(&registration(None)).await.unwrap();

        assert_eq!(fake.object_count("/api/v1/namespaces/syn/configmaps"), 3);
        assert!(fake
            .get::<ConfigMap>(Some("syn"), "argocd-ssh-known-hosts-cm")
            .is_none());
    }

    #[tokio::test]
    async fn test_partial_install_is_completed_without_duplicates() {
        let fake = FakeApiServer::new();
        seed_ssh_secret(&fake);
        let names = ResourceNames::default();
        let images = Images::default();
        let workloads = Workloads::new("syn", &names, &images);
        fake.seed(&workloads.redis_deployment());
        fake.seed(&workloads.server_deployment());

        backend(&fake).reconcile(&registration(Some("keys"))).await.unwrap();

        assert_single_objects(&fake);
        assert_eq!(
            fake.count_requests("PUT", "/apis/apps/v1/namespaces/syn/deployments/argocd-redis"),
            0
        );
    }

    #[tokio::test]
    async fn test_complete_install_performs_no_writes() {
        let fake = FakeApiServer::new();
        let names = ResourceNames::default();
        let images = Images::default();
        let workloads = Workloads::new("syn", &names, &images);
        fake.seed(&workloads.redis_deployment());
        fake.seed(&workloads.repo_server_deployment());
        fake.seed(&workloads.server_deployment());
        fake.seed(&workloads.application_controller());

        backend(&fake).reconcile(&registration(None)).await.unwrap();

        assert!(fake.writes().is_empty());
    }

    #[tokio::test]
    async fn test_operator_managed_namespace_only_repairs() {
        let fake = FakeApiServer::new();
        seed_ssh_secret(&fake);
        fake.insert_raw(
            "/apis/argoproj.io/v1alpha1/namespaces/syn/argocds/syn-argocd",
            json!({
                "apiVersion": "argoproj.io/v1alpha1",
                "kind": "ArgoCD",
                "metadata": {"name": "syn-argocd", "namespace": "syn"},
                "spec": {}
            }),
        );
        fake.seed(&Pod {
            metadata: ObjectMeta {
                name: Some("argocd-operator-7d9f".to_string()),
                namespace: Some("syn-argocd-operator".to_string()),
                creation_timestamp: Some(Time(Utc::now() - chrono::Duration::hours(1))),
                ..Default::default()
            },
            ..Default::default()
        });

        backend(&fake).reconcile(&registration(None)).await.unwrap();

        assert_eq!(fake.object_count("/apis/apps/v1/namespaces/syn/deployments"), 0);
        assert_eq!(fake.object_count("/apis/apps/v1/namespaces/syn/statefulsets"), 0);
        assert!(fake
            .get::<Pod>(Some("syn-argocd-operator"), "argocd-operator-7d9f")
            .is_none());
    }

    #[tokio::test]
    async fn test_missing_repository_aborts_bootstrap() {
        let fake = FakeApiServer::new();
        let registration = ClusterRegistration {
            id: "c-test-1234".to_string(),
            ..Default::default()
        };

        let err = backend(&fake).reconcile(&registration).await.unwrap_err();

        assert!(err.to_string().contains("c-test-1234"));
        assert!(fake.writes().is_empty());
    }

    #[tokio::test]
    async fn test_failing_step_aborts_remaining_steps() {
        let fake = FakeApiServer::new();
        seed_ssh_secret(&fake);
        fake.fail("POST", "/api/v1/namespaces/syn/services", 500);

        assert!(backend(&fake).reconcile(&registration(None)).await.is_err());

        assert_eq!(fake.object_count("/api/v1/namespaces/syn/configmaps"), 3);
        assert_eq!(fake.object_count("/apis/apps/v1/namespaces/syn/deployments"), 0);
        assert_eq!(fake.object_count("/apis/apps/v1/namespaces/syn/statefulsets"), 0);
    }

    #[tokio::test]
    async fn test_team_root_apps_are_created() {
        let fake = FakeApiServer::new();
        seed_ssh_secret(&fake);
        fake.seed(&ConfigMap {
            metadata: ObjectMeta {
                name: Some("additional-root-apps".to_string()),
                namespace: Some("syn".to_string()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([(
                "teams".to_string(),
                r#"["ops"]"#.to_string(),
            )])),
            ..Default::default()
        });

        backend(&fake).reconcile(&registration(None)).await.unwrap();

        let app = fake.get::<Application>(Some("syn"), "root-ops").unwrap();
        assert_eq!(app.spec.project, "ops");
        assert!(fake.get::<AppProject>(Some("syn"), "ops").is_some());
        assert_eq!(fake.object_count("/apis/apps/v1/namespaces/syn/statefulsets"), 1);
    }
}
