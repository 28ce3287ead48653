//! Check implementations for post-installation verification
//!
//! Provides the [`Check`] trait, the ordered [`Registry`], and the built-in
//! connectivity checks.
//!
//! ## Adding new checks
//!
//! 1. Create a new file in `src/checks/` and implement the [`Check`] trait
//! 2. Register it in [`Registry::with_defaults`] (or register it yourself on
//!    an explicit registry before handing it to the runner)
//!
//! Checks that depend on the cross-node half of the fixture must return
//! [`Outcome::Skipped`] when it is absent.

mod ingress_policy;
mod pod_to_pod;
mod pod_to_service;
pub mod registry;
mod traits;

pub use ingress_policy::DenyAllIngressCheck;
pub use pod_to_pod::{PodToPodInterNodeCheck, PodToPodIntraNodeCheck};
pub use pod_to_service::{PodToServiceInterNodeCheck, PodToServiceIntraNodeCheck};
pub use registry::Registry;
pub use traits::{Check, Outcome};

/// Skip reason shared by the checks that need the cross-node fixture.
pub(crate) const NEEDS_TWO_NODES: &str =
    "cross-node fixture was not provisioned (cluster has fewer than 2 schedulable nodes)";
