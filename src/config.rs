// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{images, schedule};
use clap::{Parser, ValueEnum};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Agent configuration, from flags or `HELMSMAN_*` environment variables
#[derive(Parser, Debug, Clone)]
#[command(name = "helmsman", version, about = "Registers this cluster with the fleet API and bootstraps its GitOps controller")]
pub struct Config {
    /// API URL to connect to
    #[arg(long, env = "HELMSMAN_API")]
    pub api: Url,

    /// Token to authenticate to the API
    #[arg(long, env = "HELMSMAN_TOKEN", hide_env_values = true)]
    pub token: String,

    /// ID of own cluster
    #[arg(long, env = "HELMSMAN_CLUSTER_ID")]
    pub cluster_id: String,

    /// Cloud type this cluster is running on
    #[arg(long, env = "HELMSMAN_CLOUD", default_value = "")]
    pub cloud: String,

    /// Cloud region this cluster is running in
    #[arg(long, env = "HELMSMAN_REGION", default_value = "")]
    pub region: String,

    /// Kubernetes distribution this cluster is running
    #[arg(long, env = "HELMSMAN_DISTRIBUTION", default_value = "")]
    pub distribution: String,

    /// Namespace in which the agent is running
    #[arg(long, env = "HELMSMAN_NAMESPACE", default_value = "syn")]
    pub namespace: String,

    /// Namespace in which the Argo CD operator will be running
    #[arg(long, env = "HELMSMAN_OPERATOR_NAMESPACE", default_value = "syn-argocd-operator")]
    pub operator_namespace: String,

    /// Image to be used for the Argo CD deployments
    #[arg(long, env = "HELMSMAN_ARGO_IMAGE", default_value = images::DEFAULT_ARGOCD_IMAGE)]
    pub argo_image: String,

    /// Image to be used for the Argo CD Redis deployment
    #[arg(long, env = "HELMSMAN_REDIS_IMAGE", default_value = images::DEFAULT_REDIS_IMAGE)]
    pub redis_image: String,

    /// Image to be used for the Flux deployment
    #[arg(long, env = "HELMSMAN_FLUX_IMAGE", default_value = images::DEFAULT_FLUX_IMAGE)]
    pub flux_image: String,

    /// Config map whose data is merged into the dynamic facts; its keys override detected facts
    #[arg(long, env = "HELMSMAN_ADDITIONAL_FACTS_CONFIG_MAP", default_value = "additional-facts")]
    pub additional_facts_config_map: String,

    /// Config map whose `teams` key lists teams that get their own root application
    #[arg(long, env = "HELMSMAN_ADDITIONAL_ROOT_APPS_CONFIG_MAP", default_value = "additional-root-apps")]
    pub additional_root_apps_config_map: String,

    /// Namespace for the OpenShift OAuth route
    #[arg(long, env = "HELMSMAN_OCP_OAUTH_ROUTE_NAMESPACE", default_value = "openshift-authentication")]
    pub ocp_oauth_route_namespace: String,

    /// Name of the OpenShift OAuth route
    #[arg(long, env = "HELMSMAN_OCP_OAUTH_ROUTE_NAME", default_value = "oauth-openshift")]
    pub ocp_oauth_route_name: String,

    /// GitOps controller to bootstrap
    #[arg(long, env = "HELMSMAN_BACKEND", value_enum, default_value_t = BackendKind::ArgoCd)]
    pub backend: BackendKind,

    /// Seconds between two reconciliations
    #[arg(long, env = "HELMSMAN_INTERVAL_SECS", default_value_t = schedule::INTERVAL_SECS)]
    pub interval_secs: u64,

    /// Upper bound for a single reconciliation, in seconds
    #[arg(long, env = "HELMSMAN_TICK_TIMEOUT_SECS", default_value_t = schedule::TICK_TIMEOUT_SECS)]
    pub tick_timeout_secs: u64,
}

impl Config {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn tick_timeout(&self) -> Duration {
        Duration::from_secs(self.tick_timeout_secs)
    }

    pub fn images(&self) -> Images {
        Images {
            argocd: self.argo_image.clone(),
            redis: self.redis_image.clone(),
            flux: self.flux_image.clone(),
        }
    }
}

/// Which GitOps controller the agent bootstraps
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    #[value(name = "argocd")]
    ArgoCd,
    Flux,
}

/// Container images used for the bootstrapped workloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Images {
    pub argocd: String,
    pub redis: String,
    pub flux: String,
}

impl Default for Images {
    fn default() -> Self {
        Images {
            argocd: images::DEFAULT_ARGOCD_IMAGE.to_string(),
            redis: images::DEFAULT_REDIS_IMAGE.to_string(),
            flux: images::DEFAULT_FLUX_IMAGE.to_string(),
        }
    }
}

/// Names and labels shared by the bootstrapper, the credential manager and the deadlock repair.
///
/// They must agree exactly: the bootstrap presence check and the deadlock detector count
/// objects by `selector`, and the repair deletes `admin_secret` by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    pub ssh_secret: String,
    pub ssh_public_key: String,
    pub ssh_private_key: String,
    pub repo_secret: String,
    pub admin_secret: String,
    /// Copy of the admin secret owned by the Argo CD operator
    pub operator_admin_secret: String,

    pub known_hosts_config_map: String,
    pub tls_config_map: String,
    pub rbac_config_map: String,
    pub argocd_config_map: String,

    pub project: String,
    pub root_app: String,
    pub apps_path: String,
    pub service_account: String,

    /// Labels stamped on every bootstrapped object
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    /// Label selector matching the bootstrapped objects
    pub selector: String,

    pub flux: FluxNames,
}

/// Names used by the Flux backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FluxNames {
    pub name: String,
    pub known_hosts_config_map: String,
    pub cluster_role: String,
    pub git_path: String,
    pub labels: BTreeMap<String, String>,
    pub selector: String,
}

impl Default for ResourceNames {
    fn default() -> Self {
        ResourceNames {
            ssh_secret: "argo-ssh-key".to_string(),
            ssh_public_key: "sshPublicKey".to_string(),
            ssh_private_key: "sshPrivateKey".to_string(),
            repo_secret: "argo-repo".to_string(),
            admin_secret: "argocd-secret".to_string(),
            operator_admin_secret: "syn-argocd-cluster".to_string(),
            known_hosts_config_map: "argocd-ssh-known-hosts-cm".to_string(),
            tls_config_map: "argocd-tls-certs-cm".to_string(),
            rbac_config_map: "argocd-rbac-cm".to_string(),
            argocd_config_map: "argocd-cm".to_string(),
            project: "syn".to_string(),
            root_app: "root".to_string(),
            apps_path: "manifests/apps/".to_string(),
            service_account: "helmsman".to_string(),
            labels: BTreeMap::from([
                ("app.kubernetes.io/part-of".to_string(), "argocd".to_string()),
                ("argocd.argoproj.io/instance".to_string(), "argocd".to_string()),
                ("helmsman.syn.tools/bootstrap".to_string(), "true".to_string()),
            ]),
            annotations: BTreeMap::from([(
                "argocd.argoproj.io/sync-options".to_string(),
                "Prune=false".to_string(),
            )]),
            selector: "app.kubernetes.io/part-of=argocd".to_string(),
            flux: FluxNames::default(),
        }
    }
}

impl Default for FluxNames {
    fn default() -> Self {
        FluxNames {
            name: "flux".to_string(),
            known_hosts_config_map: "flux-ssh-config".to_string(),
            cluster_role: "syn-admin".to_string(),
            git_path: "manifests/flux/".to_string(),
            labels: BTreeMap::from([("app".to_string(), "flux".to_string())]),
            selector: "app=flux".to_string(),
        }
    }
}

impl ResourceNames {
    /// Common labels plus the per-component name and component labels
    pub fn component_labels(&self, component: &str, name: &str) -> BTreeMap<String, String> {
        let mut labels = self.labels.clone();
        labels.insert("app.kubernetes.io/component".to_string(), component.to_string());
        labels.insert("app.kubernetes.io/name".to_string(), name.to_string());
        labels
    }
}
