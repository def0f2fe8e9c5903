// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for raw reads, idempotent object creation and CRD installation.

pub mod client;
pub mod crd;
pub mod objects;

pub use client::get_json;
pub use crd::{install_crds, BundledManifest};
pub use objects::{count_labeled, create_if_absent, create_or_replace};
