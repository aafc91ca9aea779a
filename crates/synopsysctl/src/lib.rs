//! # synopsysctl
//!
//! Renders Black Duck and OpsSight custom resources into Kubernetes manifests
//! without a cluster, and prints the versions, sizes and CRDs the operator
//! supports.

pub mod commands;

pub use commands::*;
