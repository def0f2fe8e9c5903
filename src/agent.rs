// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The reconciliation loop.
//!
//! Every tick publishes the cluster's deploy key and facts to the fleet API and hands
//! the returned registration to the GitOps backend. Ticks never overlap and a failing
//! tick never ends the loop.

use crate::config::{Config, ResourceNames};
use crate::constants::facts;
use crate::credentials::CredentialManager;
use crate::error::{AgentError, Result};
use crate::facts::FactCollector;
use crate::fleet::FleetApi;
use crate::gitops::{backend_for, GitOpsBackend};
use crate::types::ClusterPatch;
use kube::Client;
use std::future::Future;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

pub struct Agent<F: FleetApi> {
    config: Config,
    fleet: F,
    credentials: CredentialManager,
    facts: FactCollector,
    backend: Box<dyn GitOpsBackend>,
}

impl<F: FleetApi> Agent<F> {
    pub fn new(config: Config, client: Client, fleet: F, names: ResourceNames) -> Self {
        let credentials = CredentialManager::new(client.clone(), &config.namespace, names.clone());
        let facts = FactCollector::new(client.clone(), &config);
        let backend = backend_for(client, &config, names);
        Self {
            config,
            fleet,
            credentials,
            facts,
            backend,
        }
    }

    /// Run until `cancel` fires. The first tick starts immediately.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            "Starting reconciliation of cluster {} every {}s using {}",
            self.config.cluster_id,
            self.config.interval_secs,
            self.backend.name()
        );

        let mut ticker = interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick_with_timeout().await {
                        error!("Reconciliation failed: {}", e);
                    }
                }
            }
        }
    }

    /// Run until `shutdown` resolves. A tick in flight at that point is finished first.
    pub async fn run_until<S>(&self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        let cancel = CancellationToken::new();
        let run = self.run(cancel.clone());
        tokio::pin!(run);

        tokio::select! {
            _ = &mut run => return,
            _ = shutdown => cancel.cancel(),
        }
        run.await;
    }

    async fn tick_with_timeout(&self) -> Result<()> {
        let limit = self.config.tick_timeout();
        match timeout(limit, self.tick()).await {
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout(limit.as_secs())),
        }
    }

    /// One reconciliation: credentials, facts, fleet API, backend
    #[instrument(skip(self), fields(cluster = %self.config.cluster_id))]
    pub async fn tick(&self) -> Result<()> {
        let deploy_key = self.credentials.ensure_ssh_keypair().await?;
        self.credentials
            .ensure_admin_credential(&self.config.token)
            .await?;

        let dynamic_facts = self.facts.fetch_dynamic_facts().await;
        let patch = ClusterPatch::new(deploy_key)
            .with_fact(facts::CLOUD, &self.config.cloud)
            .with_fact(facts::REGION, &self.config.region)
            .with_fact(facts::DISTRIBUTION, &self.config.distribution)
            .with_dynamic_facts(dynamic_facts);

        let registration = self
            .fleet
            .patch_cluster(&self.config.cluster_id, &patch)
            .await?;
        debug!("Fleet API accepted update for cluster {}", registration.id);

        self.backend.reconcile(&registration).await
    }
}
