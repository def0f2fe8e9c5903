// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// The field manager used for server-side apply
pub const FIELD_MANAGER: &str = "helmsman";

/// In-cluster address of the local Kubernetes API, as seen by the GitOps controller
pub const LOCAL_KUBERNETES_API: &str = "https://kubernetes.default.svc";

/// Keys of the dynamic facts reported to the fleet API
pub mod facts {
    pub const KUBERNETES_VERSION: &str = "kubernetesVersion";
    pub const OPENSHIFT_VERSION: &str = "openshiftVersion";
    pub const OPENSHIFT_OAUTH_ROUTE: &str = "openshiftOAuthRoute";

    /// Static facts supplied on the command line
    pub const CLOUD: &str = "cloud";
    pub const REGION: &str = "region";
    pub const DISTRIBUTION: &str = "distribution";
}

/// Admin credential handling
pub mod credentials {
    /// bcrypt ignores everything past this many bytes
    pub const MAX_PASSWORD_BYTES: usize = 72;
    pub const PASSWORD_KEY: &str = "admin.password";
    pub const PASSWORD_MTIME_KEY: &str = "admin.passwordMtime";
    pub const SSH_KEY_BITS: usize = 4096;
}

/// Argo CD bootstrap roster and deadlock repair tuning
pub mod argocd {
    pub const API_GROUP: &str = "argoproj.io";
    pub const API_VERSION: &str = "v1alpha1";
    /// Plural of the operator's top-level custom resource
    pub const OPERATOR_RESOURCE: &str = "argocds";
    pub const OPERATOR_KIND: &str = "ArgoCD";

    /// redis, repo-server and server
    pub const EXPECTED_DEPLOYMENTS: usize = 3;
    /// application-controller
    pub const EXPECTED_STATEFULSETS: usize = 1;

    /// More labelled config maps than this means the operator finished its work
    pub const HEALTHY_CONFIG_MAP_THRESHOLD: usize = 2;
    /// Operator pods younger than this are left alone
    pub const OPERATOR_RESTART_COOLDOWN_SECS: i64 = 10 * 60;
}

/// Reconciliation loop timing
pub mod schedule {
    pub const INTERVAL_SECS: u64 = 60;
    pub const TICK_TIMEOUT_SECS: u64 = 60;
    pub const FLEET_API_TIMEOUT_SECS: u64 = 10;
}

/// Default container images
pub mod images {
    /// Keep the bundled CRD manifests in step with this version.
    pub const DEFAULT_ARGOCD_IMAGE: &str = "quay.io/argoproj/argocd:v2.9.1";
    pub const DEFAULT_REDIS_IMAGE: &str = "docker.io/redis:6.2.6";
    pub const DEFAULT_FLUX_IMAGE: &str = "docker.io/fluxcd/flux:1.25.4";
}
