// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Fleet API request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Fleet API rejected the request ({status}): {reason}")]
    FleetApi { status: u16, reason: String },

    #[error("Fleet API URL cannot be used as a base: {0}")]
    InvalidApiUrl(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("SSH key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Provided manifest is not a valid CRD: {0}")]
    InvalidManifest(String),

    #[error("Invalid custom resource: {0}")]
    InvalidResource(String),

    #[error("No git repo information received from API for cluster '{0}'")]
    MissingGitRepo(String),

    #[error("Failed to delete {} operator pod(s): {}", .0.len(), .0.join("; "))]
    PodDeletion(Vec<String>),

    #[error("Reconciliation did not finish within {0} seconds")]
    Timeout(u64),
}

pub type Result<T> = std::result::Result<T, AgentError>;

/// True when the API server answered 404.
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 404)
}

/// True when the API server answered 409 AlreadyExists.
pub fn is_already_exists(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 409)
}

impl AgentError {
    /// True for a Kubernetes 404, the "not on this platform" signal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AgentError::KubeError(e) if is_not_found(e))
    }
}
