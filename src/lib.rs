//! # cellvisor
//!
//! **Control plane for a Realm → Space → Stack → Cell → Container hierarchy**
//!
//! This crate validates lifecycle requests, enforces the parent/child rules
//! of the hierarchy and drives a pluggable [`Runner`] backend that does the
//! actual work against the container runtime, network plugin and metadata
//! store.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                            cellvisor                                │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────────┐    │
//! │  │                        Controller                           │    │
//! │  │   get / list / create / delete / purge / start / stop /     │    │
//! │  │   kill per level, plus bootstrap of the system hierarchy    │    │
//! │  └─────────────────────────────────────────────────────────────┘    │
//! │                              │                                      │
//! │  ┌───────────────────────────┼───────────────────────────────┐      │
//! │  │                   Policy & Validation                     │      │
//! │  │  Trimmed identities │ strict / cascade / force deletes    │      │
//! │  │  Pre/post existence probes │ partial purge reports        │      │
//! │  └───────────────────────────┼───────────────────────────────┘      │
//! │                              │                                      │
//! │  ┌───────────────────────────┼───────────────────────────────┐      │
//! │  │                     Runner Trait                          │      │
//! │  │  Namespaces │ cgroups │ networks │ metadata │ containers  │      │
//! │  └───────────────────────────────────────────────────────────┘      │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                         Backends                                    │
//! │  ┌──────────────┐  ┌──────────────────────────────┐                 │
//! │  │ MemoryRunner │  │ host runners (out of crate)  │                 │
//! │  └──────────────┘  └──────────────────────────────┘                 │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Hierarchy Rules
//!
//! | Parent → Child   | Delete gated? | Cascade removes |
//! |------------------|---------------|-----------------|
//! | Realm → Space    | yes           | spaces          |
//! | Space → Stack    | yes           | stacks          |
//! | Stack → Cell     | yes           | cells           |
//! | Cell → Container | never         | containers      |
//!
//! A gated delete fails with [`Error::HasDependencies`] unless `force`
//! (skip the check) or `cascade` (remove children first) is set.
//!
//! # Example
//!
//! ```rust,ignore
//! use cellvisor::{Controller, MemoryRunner, Realm};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> cellvisor::Result<()> {
//!     let controller = Controller::with_defaults(Arc::new(MemoryRunner::new()));
//!     let report = controller.bootstrap().await.map_err(|e| e.into_error())?;
//!     assert!(report.realm_created());
//!
//!     let created = controller.create_realm(&Realm::new("payments")).await?;
//!     assert!(created.namespace_created);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod model;
pub mod runner;

// Re-exports
pub use config::ControllerConfig;
pub use controller::{
    BootstrapReport, Controller, CreateCellResult, CreateContainerResult, CreateRealmResult,
    CreateSpaceResult, CreateStackResult, DeleteCellResult, DeleteContainerResult,
    DeletePolicy, DeleteRealmResult, DeleteSpaceResult, DeleteStackResult, GetCellResult,
    GetContainerResult, GetRealmResult, GetSpaceResult, GetStackResult, KillCellResult,
    KillContainerResult, PurgeCellResult, PurgeRealmResult, PurgeSpaceResult, PurgeStackResult,
    StartCellResult, StartContainerResult, StopCellResult, StopContainerResult,
};
pub use error::{Error, ErrorKind, Op, PartialError, PartialResult, Result};
pub use model::{
    Cell, ContainerSpec, ContainerState, Labels, Realm, ResourceKind, ResourceRef,
    ResourceState, Space, Stack,
};
pub use runner::{MemoryRunner, Runner};
