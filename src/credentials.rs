// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Admin password, deploy key and repository credentials for the GitOps controller

use crate::config::ResourceNames;
use crate::constants::{credentials, FIELD_MANAGER};
use crate::error::{AgentError, Result};
use chrono::{SecondsFormat, Utc};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::{
    api::{ObjectMeta, Patch, PatchParams},
    Api, Client,
};
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use ssh_key::public::{KeyData, RsaPublicKey};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

const SECRET_TYPE_LABEL: &str = "argocd.argoproj.io/secret-type";

pub struct CredentialManager {
    client: Client,
    namespace: String,
    names: ResourceNames,
    key_bits: usize,
}

impl CredentialManager {
    pub fn new(client: Client, namespace: &str, names: ResourceNames) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
            names,
            key_bits: credentials::SSH_KEY_BITS,
        }
    }

    /// Override the RSA modulus size of newly generated deploy keys
    pub fn with_key_bits(mut self, key_bits: usize) -> Self {
        self.key_bits = key_bits;
        self
    }

    fn secrets(&self) -> Api<Secret> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    /// Make sure the controller's admin password matches `password`.
    ///
    /// When the operator-managed copy exists only that copy is touched. It holds the
    /// plaintext. Otherwise the agent-owned secret holds a bcrypt hash.
    #[instrument(skip(self, password), fields(namespace = %self.namespace))]
    pub async fn ensure_admin_credential(&self, password: &str) -> Result<()> {
        let password = truncate_password(password);
        let secrets = self.secrets();
        let mtime = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        if let Some(operator_secret) = secrets.get_opt(&self.names.operator_admin_secret).await? {
            if secret_value(&operator_secret, credentials::PASSWORD_KEY) == Some(password) {
                debug!("Operator admin secret already up to date");
                return Ok(());
            }

            let secret = self.secret(
                &self.names.operator_admin_secret,
                BTreeMap::new(),
                BTreeMap::from([
                    (credentials::PASSWORD_KEY.to_string(), password.to_vec()),
                    (credentials::PASSWORD_MTIME_KEY.to_string(), mtime.into_bytes()),
                ]),
            );
            secrets
                .patch(
                    &self.names.operator_admin_secret,
                    &PatchParams::apply(FIELD_MANAGER).force(),
                    &Patch::Apply(&secret),
                )
                .await?;
            info!("Argo CD cluster secret updated with new password");
            return Ok(());
        }

        let existing = secrets.get_opt(&self.names.admin_secret).await?;
        let params = match &existing {
            Some(current) => {
                if password_matches(current, password) {
                    debug!("Argo CD admin secret already up to date");
                    return Ok(());
                }
                // Other writers may own these keys
                PatchParams::apply(FIELD_MANAGER).force()
            }
            None => PatchParams::apply(FIELD_MANAGER),
        };

        let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
        let secret = self.secret(
            &self.names.admin_secret,
            BTreeMap::new(),
            BTreeMap::from([
                (credentials::PASSWORD_KEY.to_string(), hash.into_bytes()),
                (credentials::PASSWORD_MTIME_KEY.to_string(), mtime.into_bytes()),
            ]),
        );
        secrets
            .patch(&self.names.admin_secret, &params, &Patch::Apply(&secret))
            .await?;

        if existing.is_some() {
            info!("Argo CD secret updated with new password");
        } else {
            info!("Created new Argo CD secret");
        }
        Ok(())
    }

    /// Return the deploy key, generating and storing a new keypair on first use.
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    pub async fn ensure_ssh_keypair(&self) -> Result<String> {
        let secrets = self.secrets();
        let existing = secrets.get_opt(&self.names.ssh_secret).await?;
        let params = match &existing {
            Some(secret) => {
                let public_key = secret_value(secret, &self.names.ssh_public_key).unwrap_or_default();
                if !public_key.is_empty() {
                    return Ok(String::from_utf8_lossy(public_key).into_owned());
                }
                info!("SSH secret holds no public key, generate new key");
                // Replaces whatever keypair fragment another writer left behind
                PatchParams::apply(FIELD_MANAGER).force()
            }
            None => {
                info!("No SSH secret found, generate new key");
                PatchParams::apply(FIELD_MANAGER)
            }
        };

        let (public_key, private_key) = generate_ssh_key(self.key_bits)?;
        info!("Public key: {}", public_key.trim_end());

        let secret = self.secret(
            &self.names.ssh_secret,
            self.repo_creds_labels(),
            BTreeMap::from([
                (self.names.ssh_private_key.clone(), private_key.into_bytes()),
                (self.names.ssh_public_key.clone(), public_key.clone().into_bytes()),
            ]),
        );
        secrets
            .patch(&self.names.ssh_secret, &params, &Patch::Apply(&secret))
            .await?;
        Ok(public_key)
    }

    /// Register the cluster repository with the controller and map the deploy key to it.
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    pub async fn ensure_repository_secret(&self, repo_url: &str) -> Result<()> {
        let secrets = self.secrets();

        let repo_secret = self.secret(
            &self.names.repo_secret,
            BTreeMap::from([(SECRET_TYPE_LABEL.to_string(), "repository".to_string())]),
            BTreeMap::from([
                ("type".to_string(), b"git".to_vec()),
                ("url".to_string(), repo_url.as_bytes().to_vec()),
            ]),
        );
        secrets
            .patch(
                &self.names.repo_secret,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Apply(&repo_secret),
            )
            .await?;
        debug!("Applied repository secret {}", self.names.repo_secret);

        // An apply drops every field this manager owned but left out, so resend the keypair
        let ssh_secret = secrets.get(&self.names.ssh_secret).await?;
        let mut data: BTreeMap<String, Vec<u8>> = ssh_secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, v.0))
            .collect();
        data.insert("url".to_string(), repo_url.as_bytes().to_vec());

        let ssh_secret = self.secret(&self.names.ssh_secret, self.repo_creds_labels(), data);
        secrets
            .patch(
                &self.names.ssh_secret,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Apply(&ssh_secret),
            )
            .await?;
        debug!("Updated SSH secret with repository URL");
        Ok(())
    }

    fn repo_creds_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(SECRET_TYPE_LABEL.to_string(), "repo-creds".to_string())])
    }

    fn secret(
        &self,
        name: &str,
        labels: BTreeMap<String, String>,
        data: BTreeMap<String, Vec<u8>>,
    ) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(self.namespace.clone()),
                labels: (!labels.is_empty()).then_some(labels),
                ..Default::default()
            },
            data: Some(data.into_iter().map(|(k, v)| (k, ByteString(v))).collect()),
            ..Default::default()
        }
    }
}

/// bcrypt only looks at the first 72 bytes
fn truncate_password(password: &str) -> &[u8] {
    let bytes = password.as_bytes();
    &bytes[..bytes.len().min(credentials::MAX_PASSWORD_BYTES)]
}

fn secret_value<'a>(secret: &'a Secret, key: &str) -> Option<&'a [u8]> {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .map(|v| v.0.as_slice())
}

fn password_matches(secret: &Secret, password: &[u8]) -> bool {
    secret_value(secret, credentials::PASSWORD_KEY)
        .and_then(|hash| std::str::from_utf8(hash).ok())
        .is_some_and(|hash| bcrypt::verify(password, hash).unwrap_or(false))
}

/// New RSA keypair as (authorized_keys line, PKCS#1 PEM private key)
fn generate_ssh_key(bits: usize) -> Result<(String, String)> {
    let mut rng = rand::rngs::OsRng;
    let private_key = RsaPrivateKey::new(&mut rng, bits)
        .map_err(|e| AgentError::KeyGeneration(e.to_string()))?;

    let private_pem = private_key
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| AgentError::KeyGeneration(e.to_string()))?;

    let public_key = RsaPublicKey::try_from(private_key.to_public_key())
        .map_err(|e| AgentError::KeyGeneration(e.to_string()))?;
    let authorized_key = ssh_key::PublicKey::from(KeyData::Rsa(public_key))
        .to_openssh()
        .map_err(|e| AgentError::KeyGeneration(e.to_string()))?;

    Ok((format!("{}\n", authorized_key), private_pem.to_string()))
}
