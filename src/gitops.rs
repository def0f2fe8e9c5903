// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The GitOps controller the agent keeps bootstrapped

use crate::argocd::ArgoCdBackend;
use crate::config::{BackendKind, Config, ResourceNames};
use crate::error::Result;
use crate::flux::FluxBackend;
use crate::types::ClusterRegistration;
use async_trait::async_trait;
use kube::Client;

#[async_trait]
pub trait GitOpsBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Converge the controller towards the given registration
    async fn reconcile(&self, registration: &ClusterRegistration) -> Result<()>;
}

pub fn backend_for(client: Client, config: &Config, names: ResourceNames) -> Box<dyn GitOpsBackend> {
    match config.backend {
        BackendKind::ArgoCd => Box::new(ArgoCdBackend::new(client, config, names)),
        BackendKind::Flux => Box::new(FluxBackend::new(client, config, names)),
    }
}
