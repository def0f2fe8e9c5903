// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Raw API access for endpoints without a typed client

use crate::error::{is_not_found, Result};
use kube::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

/// GET an absolute API path and decode the JSON body.
///
/// Returns `None` on 404, which the API server also answers when the
/// resource kind is unknown on this platform.
#[instrument(skip(client))]
pub async fn get_json<T: DeserializeOwned>(client: &Client, path: &str) -> Result<Option<T>> {
    let request = http::Request::get(path)
        .body(Vec::new())
        .map_err(kube::Error::HttpError)?;

    match client.request::<T>(request).await {
        Ok(value) => Ok(Some(value)),
        Err(e) if is_not_found(&e) => {
            debug!("{} not found", path);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
