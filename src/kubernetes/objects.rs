// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Idempotent create helpers and label-based presence counting

use crate::error::{is_already_exists, Result};
use kube::{
    api::{ListParams, PostParams},
    Api, Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use tracing::{info, instrument, warn};

/// Create `obj`, treating "already exists" as success. Returns whether it was created.
#[instrument(skip(api, obj), fields(kind = %K::kind(&()), name = %obj.name_any()))]
pub async fn create_if_absent<K>(api: &Api<K>, obj: &K) -> Result<bool>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Serialize + Debug,
{
    match api.create(&PostParams::default(), obj).await {
        Ok(_) => {
            info!("Created {} {}", K::kind(&()), obj.name_any());
            Ok(true)
        }
        Err(e) if is_already_exists(&e) => {
            warn!("{} {} already exists", K::kind(&()), obj.name_any());
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Create `obj`, replacing the live object in place if it already exists.
#[instrument(skip(api, obj), fields(kind = %K::kind(&()), name = %obj.name_any()))]
pub async fn create_or_replace<K>(api: &Api<K>, obj: &K) -> Result<()>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Serialize + Debug,
{
    let name = obj.name_any();
    match api.create(&PostParams::default(), obj).await {
        Ok(_) => {
            info!("Created new {} {}", K::kind(&()), name);
            Ok(())
        }
        Err(e) if is_already_exists(&e) => {
            info!("Update existing {} {}", K::kind(&()), name);
            api.replace(&name, &PostParams::default(), obj).await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Number of objects matching a label selector
pub async fn count_labeled<K>(api: &Api<K>, selector: &str) -> Result<usize>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    let list = api.list(&ListParams::default().labels(selector)).await?;
    Ok(list.items.len())
}
