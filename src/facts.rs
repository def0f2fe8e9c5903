// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Dynamic fact collection.
//!
//! Every fact is fetched independently. A failing fetch is logged and the fact is
//! left out; collection as a whole never fails.

use crate::config::Config;
use crate::constants::facts;
use crate::error::Result;
use crate::kubernetes::get_json;
use crate::types::openshift::{ClusterVersion, Route};
use crate::types::version::{process_kubernetes_version, SemanticVersion};
use crate::types::{ClusterFacts, FactValue};
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::version::Info;
use kube::{Api, Client};
use std::collections::BTreeMap;
use tracing::{debug, error, info, instrument};

const CLUSTER_VERSION_PATH: &str = "/apis/config.openshift.io/v1/clusterversions/version";

pub struct FactCollector {
    client: Client,
    namespace: String,
    additional_facts_config_map: String,
    oauth_route_namespace: String,
    oauth_route_name: String,
}

impl FactCollector {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            namespace: config.namespace.clone(),
            additional_facts_config_map: config.additional_facts_config_map.clone(),
            oauth_route_namespace: config.ocp_oauth_route_namespace.clone(),
            oauth_route_name: config.ocp_oauth_route_name.clone(),
        }
    }

    #[instrument(skip(self))]
    pub async fn fetch_dynamic_facts(&self) -> ClusterFacts {
        let mut collected = ClusterFacts::new();

        match self.fetch_kubernetes_version().await {
            Ok(version) => {
                collected.insert(facts::KUBERNETES_VERSION.to_string(), version.into());
            }
            Err(e) => error!("Error fetching kubernetes version: {}", e),
        }

        match self.fetch_openshift_version().await {
            Ok(Some(version)) => {
                collected.insert(facts::OPENSHIFT_VERSION.to_string(), version.into());
            }
            Ok(None) => debug!("No cluster version resource, not running on OpenShift"),
            Err(e) => error!("Error fetching openshift version: {}", e),
        }

        match self.fetch_openshift_oauth_route().await {
            Ok(Some(host)) => {
                collected.insert(facts::OPENSHIFT_OAUTH_ROUTE.to_string(), host.into());
            }
            Ok(None) => debug!("No OAuth route found"),
            Err(e) => error!("Error fetching openshift oauth route: {}", e),
        }

        // Operator-supplied facts win over detected ones
        match self.fetch_additional_facts().await {
            Ok(additional) => {
                for (key, value) in additional {
                    collected.insert(key, FactValue::Text(value));
                }
            }
            Err(e) => error!("Error fetching additional facts: {}", e),
        }

        collected
    }

    async fn fetch_kubernetes_version(&self) -> Result<Info> {
        let info = self.client.apiserver_version().await?;
        process_kubernetes_version(info)
    }

    async fn fetch_openshift_version(&self) -> Result<Option<SemanticVersion>> {
        let Some(cluster_version) = get_json::<ClusterVersion>(&self.client, CLUSTER_VERSION_PATH).await?
        else {
            return Ok(None);
        };
        cluster_version.current_version().map(Some)
    }

    async fn fetch_openshift_oauth_route(&self) -> Result<Option<String>> {
        let path = format!(
            "/apis/route.openshift.io/v1/namespaces/{}/routes/{}",
            self.oauth_route_namespace, self.oauth_route_name
        );
        let route = get_json::<Route>(&self.client, &path).await?;
        Ok(route.map(|r| r.spec.host).filter(|host| !host.is_empty()))
    }

    async fn fetch_additional_facts(&self) -> Result<BTreeMap<String, String>> {
        if self.additional_facts_config_map.is_empty() {
            return Ok(BTreeMap::new());
        }

        let config_maps: Api<ConfigMap> = Api::namespaced(self.client.clone(), &self.namespace);
        match config_maps.get_opt(&self.additional_facts_config_map).await? {
            Some(cm) => Ok(cm.data.unwrap_or_default()),
            None => {
                info!(
                    "Additional facts config map {}/{} not present",
                    self.namespace, self.additional_facts_config_map
                );
                Ok(BTreeMap::new())
            }
        }
    }
}
