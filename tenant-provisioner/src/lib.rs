//! # tenant-provisioner
//!
//! Creates, updates and deletes tenant environments on shared
//! infrastructure. A tenant is an infrastructure stack plus its secrets, a
//! MySQL database, a record-store endpoint, a content tree on the shared
//! filesystem, a load-balancer routing rule and the admin tasks that
//! initialize the application.
//!
//! The [`saga::Saga`] coordinator checks preconditions synchronously and hands
//! long-running steps to [`background::Dispatcher`]; every external system is
//! reached through a trait in [`clients`], so the whole lifecycle can run
//! against [`clients::memory::MemoryWorld`].

pub mod app;
pub mod background;
pub mod clients;
pub mod config;
pub mod http;
pub mod saga;
pub mod steps;

pub use app::{production_collaborators, ProvisionerApp};
pub use config::SagaConfig;
pub use saga::Saga;
