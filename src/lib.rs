//! Postflight - Post-Installation Verification Harness
//!
//! Provisions a short-lived test fixture inside a Kubernetes cluster and runs
//! a set of connectivity checks against it to verify that a network platform
//! was installed correctly.
//!
//! ## Architecture
//!
//! - [`cluster`] - the cluster client contract and its kube-backed implementation
//! - [`fixture`] - fixture lifecycle (namespace, workloads, readiness, teardown)
//! - [`checks`] - the `Check` trait, the registry, and the built-in checks
//! - [`runner`] - sequential check execution and outcome accounting
//! - [`probe`] - bounded in-pod connectivity probe used by checks
//! - [`report`] - prefixed console output
//!
//! Checks run strictly one at a time: they mutate shared fixture-adjacent
//! state (for example cluster-wide policy objects), so serialization is a
//! correctness requirement, not a limitation.

pub mod checks;
pub mod cluster;
pub mod error;
pub mod fixture;
pub mod probe;
pub mod report;
pub mod runner;

pub use error::{Error, Result};
