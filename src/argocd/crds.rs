// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use crate::kubernetes::BundledManifest;

/// CRDs the Argo CD controllers need, installed before any custom resource is created
pub const MANIFESTS: &[BundledManifest] = &[
    BundledManifest {
        path: "manifests/application-crd.yaml",
        content: include_str!("../../manifests/application-crd.yaml"),
    },
    BundledManifest {
        path: "manifests/appproject-crd.yaml",
        content: include_str!("../../manifests/appproject-crd.yaml"),
    },
];
