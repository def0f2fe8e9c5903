// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod agent;
pub mod argocd;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod facts;
pub mod fleet;
pub mod flux;
pub mod gitops;
pub mod kubernetes;
pub mod types;

#[cfg(test)]
pub mod test_utils;
