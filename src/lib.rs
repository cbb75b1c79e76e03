//! Controller that keeps OpenShift Groups in sync with external identity providers
//!
//! A namespaced `GroupSync` resource lists the providers to read groups from.
//! Each reconcile pass binds every provider, fetches its groups and mirrors
//! them onto cluster-scoped `user.openshift.io/v1` Groups it owns.

pub mod controller;
pub mod crd;
pub mod server;
pub mod syncer;
