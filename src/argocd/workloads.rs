// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Deployments, services and the stateful set that make up a bootstrapped Argo CD

use crate::config::{Images, ResourceNames};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource, EnvVar, HTTPGetAction,
    PodSpec, PodTemplateSpec, Probe, Service, ServicePort, ServiceSpec, TCPSocketAction, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;

pub const REDIS: &str = "argocd-redis";
pub const REPO_SERVER: &str = "argocd-repo-server";
pub const SERVER: &str = "argocd-server";
pub const APPLICATION_CONTROLLER: &str = "argocd-application-controller";

const REDIS_PORT: i32 = 6379;
const REPO_SERVER_PORT: i32 = 8081;
const SERVER_PORT: i32 = 8080;
const CONTROLLER_PORT: i32 = 8082;

/// Builds the Argo CD workloads for one namespace
pub struct Workloads<'a> {
    namespace: &'a str,
    names: &'a ResourceNames,
    images: &'a Images,
}

impl<'a> Workloads<'a> {
    pub fn new(namespace: &'a str, names: &'a ResourceNames, images: &'a Images) -> Self {
        Self {
            namespace,
            names,
            images,
        }
    }

    pub fn redis_service(&self) -> Service {
        self.service(REDIS, "redis", "redis", REDIS_PORT)
    }

    pub fn redis_deployment(&self) -> Deployment {
        let container = Container {
            name: "redis".to_string(),
            image: Some(self.images.redis.clone()),
            env: Some(vec![
                env("ALLOW_EMPTY_PASSWORD", "yes"),
                env("REDIS_AOF_ENABLED", "no"),
                env("REDIS_EXTRA_FLAGS", "--save ''"),
            ]),
            ports: Some(container_ports(REDIS_PORT)),
            ..Default::default()
        };

        self.deployment(
            REDIS,
            "redis",
            false,
            PodSpec {
                service_account_name: Some(self.names.service_account.clone()),
                containers: vec![container],
                ..Default::default()
            },
        )
    }

    pub fn repo_server_service(&self) -> Service {
        self.service(REPO_SERVER, "repo-server", "server", REPO_SERVER_PORT)
    }

    pub fn repo_server_deployment(&self) -> Deployment {
        let container = Container {
            name: REPO_SERVER.to_string(),
            image: Some(self.images.argocd.clone()),
            command: Some(strings(&["uid_entrypoint.sh", "argocd-repo-server"])),
            ports: Some(container_ports(REPO_SERVER_PORT)),
            volume_mounts: Some(self.config_volume_mounts()),
            liveness_probe: Some(tcp_probe(REPO_SERVER_PORT, 60, 10)),
            readiness_probe: Some(tcp_probe(REPO_SERVER_PORT, 1, 10)),
            ..Default::default()
        };

        self.deployment(
            REPO_SERVER,
            "repo-server",
            false,
            PodSpec {
                volumes: Some(self.config_volumes()),
                containers: vec![container],
                ..Default::default()
            },
        )
    }

    pub fn server_deployment(&self) -> Deployment {
        let container = Container {
            name: SERVER.to_string(),
            image: Some(self.images.argocd.clone()),
            command: Some(strings(&[
                "argocd-server",
                "--staticassets",
                "/shared/app",
                "--insecure",
            ])),
            ports: Some(container_ports(SERVER_PORT)),
            volume_mounts: Some(self.config_volume_mounts()),
            liveness_probe: Some(http_probe(SERVER_PORT, 60, 30)),
            readiness_probe: Some(http_probe(SERVER_PORT, 3, 30)),
            ..Default::default()
        };

        let mut volumes = vec![Volume {
            name: "static-files".to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        }];
        volumes.extend(self.config_volumes());

        self.deployment(
            SERVER,
            "server",
            true,
            PodSpec {
                service_account_name: Some(self.names.service_account.clone()),
                volumes: Some(volumes),
                containers: vec![container],
                ..Default::default()
            },
        )
    }

    pub fn application_controller(&self) -> StatefulSet {
        let container = Container {
            name: APPLICATION_CONTROLLER.to_string(),
            image: Some(self.images.argocd.clone()),
            command: Some(strings(&[
                "argocd-application-controller",
                "--status-processors",
                "20",
                "--operation-processors",
                "10",
                "--app-resync",
                "10",
            ])),
            ports: Some(container_ports(CONTROLLER_PORT)),
            liveness_probe: Some(http_probe(CONTROLLER_PORT, 60, 10)),
            readiness_probe: Some(http_probe(CONTROLLER_PORT, 5, 10)),
            ..Default::default()
        };

        StatefulSet {
            metadata: self.metadata(APPLICATION_CONTROLLER, "application-controller", true),
            spec: Some(StatefulSetSpec {
                selector: selector(APPLICATION_CONTROLLER),
                service_name: APPLICATION_CONTROLLER.to_string(),
                template: pod_template(
                    APPLICATION_CONTROLLER,
                    PodSpec {
                        service_account_name: Some(self.names.service_account.clone()),
                        containers: vec![container],
                        ..Default::default()
                    },
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn metadata(&self, name: &str, component: &str, annotated: bool) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(self.namespace.to_string()),
            labels: Some(self.names.component_labels(component, name)),
            annotations: annotated.then(|| self.names.annotations.clone()),
            ..Default::default()
        }
    }

    fn deployment(&self, name: &str, component: &str, annotated: bool, pod: PodSpec) -> Deployment {
        Deployment {
            metadata: self.metadata(name, component, annotated),
            spec: Some(DeploymentSpec {
                selector: selector(name),
                template: pod_template(name, pod),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn service(&self, name: &str, component: &str, port_name: &str, port: i32) -> Service {
        Service {
            metadata: self.metadata(name, component, false),
            spec: Some(ServiceSpec {
                type_: Some("ClusterIP".to_string()),
                selector: Some(name_label(name)),
                ports: Some(vec![ServicePort {
                    name: Some(port_name.to_string()),
                    port,
                    target_port: Some(IntOrString::Int(port)),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Known hosts and TLS certificates, shared by the repo server and the server
    fn config_volumes(&self) -> Vec<Volume> {
        [
            ("ssh-known-hosts", &self.names.known_hosts_config_map),
            ("tls-certs", &self.names.tls_config_map),
        ]
        .into_iter()
        .map(|(volume, config_map)| Volume {
            name: volume.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: config_map.clone(),
                ..Default::default()
            }),
            ..Default::default()
        })
        .collect()
    }

    fn config_volume_mounts(&self) -> Vec<VolumeMount> {
        [
            ("ssh-known-hosts", "/app/config/ssh"),
            ("tls-certs", "/app/config/tls"),
        ]
        .into_iter()
        .map(|(name, path)| VolumeMount {
            name: name.to_string(),
            mount_path: path.to_string(),
            ..Default::default()
        })
        .collect()
    }
}

fn name_label(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("app.kubernetes.io/name".to_string(), name.to_string())])
}

fn selector(name: &str) -> LabelSelector {
    LabelSelector {
        match_labels: Some(name_label(name)),
        ..Default::default()
    }
}

fn pod_template(name: &str, spec: PodSpec) -> PodTemplateSpec {
    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(name_label(name)),
            ..Default::default()
        }),
        spec: Some(spec),
    }
}

fn env(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn container_ports(port: i32) -> Vec<ContainerPort> {
    vec![ContainerPort {
        container_port: port,
        ..Default::default()
    }]
}

fn tcp_probe(port: i32, initial_delay: i32, period: i32) -> Probe {
    Probe {
        tcp_socket: Some(TCPSocketAction {
            port: IntOrString::Int(port),
            ..Default::default()
        }),
        initial_delay_seconds: Some(initial_delay),
        period_seconds: Some(period),
        ..Default::default()
    }
}

fn http_probe(port: i32, initial_delay: i32, period: i32) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some("/healthz".to_string()),
            port: IntOrString::Int(port),
            ..Default::default()
        }),
        initial_delay_seconds: Some(initial_delay),
        period_seconds: Some(period),
        ..Default::default()
    }
}
