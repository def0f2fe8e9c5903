// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Client for the fleet management API

use crate::constants::schedule;
use crate::error::{AgentError, Result};
use crate::types::fleet::{ClusterPatch, ClusterRegistration, Reason};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

const MERGE_PATCH: &str = "application/merge-patch+json";

/// The part of the fleet API the agent talks to
#[async_trait]
pub trait FleetApi: Send + Sync {
    /// Publish the agent's view of the cluster and receive the registration back
    async fn patch_cluster(&self, id: &str, patch: &ClusterPatch) -> Result<ClusterRegistration>;
}

pub struct FleetClient {
    http: reqwest::Client,
    api: Url,
    token: String,
}

impl FleetClient {
    pub fn new(api: Url, token: &str) -> Result<Self> {
        if api.cannot_be_a_base() {
            return Err(AgentError::InvalidApiUrl(api.to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(schedule::FLEET_API_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            api,
            token: token.to_string(),
        })
    }

    fn cluster_url(&self, id: &str) -> Result<Url> {
        let mut url = self.api.clone();
        url.path_segments_mut()
            .map_err(|_| AgentError::InvalidApiUrl(self.api.to_string()))?
            .pop_if_empty()
            .extend(["clusters", id]);
        Ok(url)
    }
}

#[async_trait]
impl FleetApi for FleetClient {
    #[instrument(skip(self, patch))]
    async fn patch_cluster(&self, id: &str, patch: &ClusterPatch) -> Result<ClusterRegistration> {
        let body = serde_json::to_vec(patch)?;
        let response = self
            .http
            .patch(self.cluster_url(id)?)
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, MERGE_PATCH)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        debug!("Fleet API answered {}", status);
        decode_response(status, &bytes)
    }
}

fn decode_response(status: StatusCode, body: &[u8]) -> Result<ClusterRegistration> {
    if status != StatusCode::OK {
        let reason = serde_json::from_slice::<Reason>(body)?.reason;
        return Err(AgentError::FleetApi {
            status: status.as_u16(),
            reason,
        });
    }
    Ok(serde_json::from_slice(body)?)
}
