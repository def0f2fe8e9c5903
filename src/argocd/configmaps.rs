// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Baseline config maps the Argo CD components read at startup

use crate::config::ResourceNames;
use crate::error::Result;
use crate::kubernetes::create_or_replace;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{api::ObjectMeta, Api, Client};
use std::collections::BTreeMap;
use tracing::instrument;

const KAPITAN_PLUGIN: &str = r#"
- name: kapitan
  generate:
    command: [kapitan, refs, --reveal, --refs-path, ../../refs/, --file, ./]
"#;

/// The config maps to write, known hosts first when the registration carries host keys
pub fn config_maps(namespace: &str, names: &ResourceNames, host_keys: Option<&str>) -> Vec<ConfigMap> {
    let config_map = |name: &str, data: Option<BTreeMap<String, String>>| ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(names.labels.clone()),
            ..Default::default()
        },
        data,
        ..Default::default()
    };

    let mut maps = Vec::with_capacity(4);
    if let Some(host_keys) = host_keys {
        maps.push(config_map(
            &names.known_hosts_config_map,
            Some(BTreeMap::from([(
                "ssh_known_hosts".to_string(),
                host_keys.to_string(),
            )])),
        ));
    }
    maps.push(config_map(&names.tls_config_map, None));
    maps.push(config_map(&names.rbac_config_map, None));
    maps.push(config_map(
        &names.argocd_config_map,
        Some(BTreeMap::from([
            ("configManagementPlugins".to_string(), KAPITAN_PLUGIN.to_string()),
            (
                "application.instanceLabelKey".to_string(),
                "argocd.argoproj.io/instance".to_string(),
            ),
            (
                "application.resourceTrackingMethod".to_string(),
                "label".to_string(),
            ),
        ])),
    ));
    maps
}

/// Create or overwrite every baseline config map; the first failure aborts.
#[instrument(skip(client, names, host_keys))]
pub async fn ensure_config_maps(
    client: &Client,
    namespace: &str,
    names: &ResourceNames,
    host_keys: Option<&str>,
) -> Result<()> {
    let api: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
    for config_map in config_maps(namespace, names, host_keys) {
        create_or_replace(&api, &config_map).await?;
    }
    Ok(())
}
