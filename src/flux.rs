// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Flux (v1) bootstrap, the older alternative to Argo CD

use crate::config::{Config, ResourceNames};
use crate::error::Result;
use crate::gitops::GitOpsBackend;
use crate::kubernetes::create_or_replace;
use crate::types::ClusterRegistration;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStrategy};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, EnvVar, KeyToPath, Pod, PodSpec,
    PodTemplateSpec, SecretVolumeSource, ServiceAccount, Volume, VolumeMount,
};
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::{
    api::{ListParams, ObjectMeta},
    Api, Client, ResourceExt,
};
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

const FLUX_PORT: i32 = 3030;
const SSH_KEY_MODE: i32 = 0o400;

pub struct FluxBackend {
    client: Client,
    namespace: String,
    image: String,
    names: ResourceNames,
}

impl FluxBackend {
    pub fn new(client: Client, config: &Config, names: ResourceNames) -> Self {
        Self {
            client,
            namespace: config.namespace.clone(),
            image: config.flux_image.clone(),
            names,
        }
    }

    async fn running(&self) -> Result<bool> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);
        let list = pods
            .list(&ListParams::default().labels(&self.names.flux.selector))
            .await?;

        for pod in list.items {
            let phase = pod
                .status
                .as_ref()
                .and_then(|s| s.phase.clone())
                .unwrap_or_default();
            if phase == "Running" {
                info!("Found running flux pod: {}/{}", self.namespace, pod.name_any());
                return Ok(true);
            }
            warn!(
                "Found non running flux pod: {}/{} ({})",
                self.namespace,
                pod.name_any(),
                phase
            );
        }
        Ok(false)
    }

    fn metadata(&self, name: &str, namespaced: bool) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: namespaced.then(|| self.namespace.clone()),
            labels: Some(self.names.flux.labels.clone()),
            ..Default::default()
        }
    }

    pub fn service_account(&self) -> ServiceAccount {
        ServiceAccount {
            metadata: self.metadata(&self.names.flux.name, true),
            ..Default::default()
        }
    }

    pub fn cluster_role_binding(&self) -> ClusterRoleBinding {
        ClusterRoleBinding {
            metadata: self.metadata(&self.names.flux.name, false),
            role_ref: RoleRef {
                api_group: "rbac.authorization.k8s.io".to_string(),
                kind: "ClusterRole".to_string(),
                name: self.names.flux.cluster_role.clone(),
            },
            subjects: Some(vec![Subject {
                kind: "ServiceAccount".to_string(),
                name: self.names.flux.name.clone(),
                namespace: Some(self.namespace.clone()),
                ..Default::default()
            }]),
        }
    }

    pub fn known_hosts(&self, host_keys: &str) -> ConfigMap {
        ConfigMap {
            metadata: self.metadata(&self.names.flux.known_hosts_config_map, true),
            data: Some(BTreeMap::from([(
                "known_hosts".to_string(),
                host_keys.to_string(),
            )])),
            ..Default::default()
        }
    }

    pub fn deployment(&self, repo_url: &str) -> Deployment {
        let flux = &self.names.flux;
        let git_path = format!("--git-path={}", flux.git_path);
        let args: Vec<String> = [
            "--git-url",
            repo_url,
            "--git-readonly",
            "--git-poll-interval=1m",
            git_path.as_str(),
            "--sync-interval=1m",
            "--sync-state=secret",
            "--sync-garbage-collection",
            "--memcached-service=",
            "--registry-exclude-image=*",
            "--k8s-secret-name",
            self.names.ssh_secret.as_str(),
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let container = Container {
            name: flux.name.clone(),
            image: Some(self.image.clone()),
            image_pull_policy: Some("Always".to_string()),
            args: Some(args),
            ports: Some(vec![ContainerPort {
                name: Some("http".to_string()),
                container_port: FLUX_PORT,
                ..Default::default()
            }]),
            env: Some(vec![EnvVar {
                name: "KUBECONFIG".to_string(),
                value: Some("/root/.kubectl/config".to_string()),
                ..Default::default()
            }]),
            volume_mounts: Some(vec![
                VolumeMount {
                    name: "ssh-key".to_string(),
                    mount_path: "/etc/fluxd/ssh".to_string(),
                    read_only: Some(true),
                    ..Default::default()
                },
                VolumeMount {
                    name: "ssh-config".to_string(),
                    mount_path: "/root/.ssh".to_string(),
                    read_only: Some(true),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        };

        Deployment {
            metadata: self.metadata(&flux.name, true),
            spec: Some(DeploymentSpec {
                selector: LabelSelector {
                    match_labels: Some(flux.labels.clone()),
                    ..Default::default()
                },
                strategy: Some(DeploymentStrategy {
                    type_: Some("Recreate".to_string()),
                    ..Default::default()
                }),
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(flux.labels.clone()),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        service_account_name: Some(flux.name.clone()),
                        volumes: Some(vec![
                            // fluxd reads its key from `identity`
                            Volume {
                                name: "ssh-key".to_string(),
                                secret: Some(SecretVolumeSource {
                                    secret_name: Some(self.names.ssh_secret.clone()),
                                    default_mode: Some(SSH_KEY_MODE),
                                    items: Some(vec![KeyToPath {
                                        key: self.names.ssh_private_key.clone(),
                                        path: "identity".to_string(),
                                        ..Default::default()
                                    }]),
                                    ..Default::default()
                                }),
                                ..Default::default()
                            },
                            Volume {
                                name: "ssh-config".to_string(),
                                // Only present when the fleet API sent host keys
                                config_map: Some(ConfigMapVolumeSource {
                                    name: flux.known_hosts_config_map.clone(),
                                    optional: Some(true),
                                    ..Default::default()
                                }),
                                ..Default::default()
                            },
                        ]),
                        containers: vec![container],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[instrument(skip(self, registration), fields(cluster = %registration.id))]
    async fn bootstrap(&self, registration: &ClusterRegistration) -> Result<()> {
        let repo_url = registration.repo_url()?;

        let service_accounts: Api<ServiceAccount> = Api::namespaced(self.client.clone(), &self.namespace);
        create_or_replace(&service_accounts, &self.service_account()).await?;

        let bindings: Api<ClusterRoleBinding> = Api::all(self.client.clone());
        create_or_replace(&bindings, &self.cluster_role_binding()).await?;

        if let Some(host_keys) = registration.host_keys() {
            let config_maps: Api<ConfigMap> = Api::namespaced(self.client.clone(), &self.namespace);
            create_or_replace(&config_maps, &self.known_hosts(host_keys)).await?;
        }

        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), &self.namespace);
        create_or_replace(&deployments, &self.deployment(repo_url)).await?;

        Ok(())
    }
}

#[async_trait]
impl GitOpsBackend for FluxBackend {
    fn name(&self) -> &'static str {
        "flux"
    }

    async fn reconcile(&self, registration: &ClusterRegistration) -> Result<()> {
        if self.running().await? {
            return Ok(());
        }
        info!("No running flux pod found, bootstrapping now");
        self.bootstrap(registration).await
    }
}
