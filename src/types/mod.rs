// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Wire, fact and custom-resource types.

pub mod argocd;
pub mod facts;
pub mod fleet;
pub mod openshift;
pub mod version;

pub use facts::{ClusterFacts, FactValue};
pub use fleet::{ClusterPatch, ClusterRegistration};
pub use version::SemanticVersion;
