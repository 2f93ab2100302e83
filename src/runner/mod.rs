//! # Runner Interface
//!
//! The runner performs the actual work against the container runtime, the
//! network plugin and the metadata store. The controller only ever talks to
//! it through this trait:
//!
//! ```text
//! ┌──────────────┐   get / list / create / ensure   ┌────────────────────┐
//! │  Controller  │ ───────────────────────────────▶ │       Runner       │
//! │  (validate,  │   start / stop / kill / delete   │  runtime namespace │
//! │   pre/post,  │ ───────────────────────────────▶ │  network plugin    │
//! │   policies)  │   exists_* / state probes        │  cgroups, metadata │
//! └──────────────┘ ───────────────────────────────▶ └────────────────────┘
//! ```
//!
//! ## Contract
//!
//! - `get_*` returns [`Error::NotFound`](crate::Error::NotFound) when the
//!   document does not exist; every other error is a hard failure.
//! - `create_realm` may return
//!   [`Error::NamespaceAlreadyExists`](crate::Error::NamespaceAlreadyExists)
//!   after storing the document; the controller tolerates it.
//! - `create_*` and `ensure_*` are idempotent on existing documents.
//! - Every method is individually atomic from the caller's point of view.
//!   The controller performs no multi-step transactions with rollback.
//! - `start_container` requires the cell's root container to be running and
//!   reports that itself; the controller does not pre-check it.
//!
//! Serialization of concurrent calls on the same resource, if needed, is the
//! runner's responsibility.

pub mod memory;

pub use memory::MemoryRunner;

use crate::error::Result;
use crate::model::{Cell, ContainerSpec, ContainerState, Realm, ResourceRef, Space, Stack};
use async_trait::async_trait;

/// Backend capability contract consumed by the controller.
///
/// Implementations must be `Send + Sync`; internal state should be protected
/// with appropriate synchronization.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Backend name, used in logs.
    fn name(&self) -> &str;

    // =========================================================================
    // Realm
    // =========================================================================

    async fn get_realm(&self, lookup: &Realm) -> Result<Realm>;
    async fn list_realms(&self) -> Result<Vec<Realm>>;
    /// Stores metadata, creates the cgroup and the runtime namespace.
    async fn create_realm(&self, realm: &Realm) -> Result<Realm>;
    async fn ensure_realm(&self, realm: &Realm) -> Result<Realm>;
    /// Removes the namespace, cgroup and metadata of one realm.
    async fn delete_realm(&self, realm: &Realm) -> Result<()>;
    /// Removes orphaned containers, network state and all metadata under a realm.
    async fn purge_realm(&self, realm: &Realm) -> Result<()>;
    async fn exists_realm_namespace(&self, namespace: &str) -> Result<bool>;

    // =========================================================================
    // Space
    // =========================================================================

    async fn get_space(&self, lookup: &Space) -> Result<Space>;
    /// Lists spaces; an empty `realm` lists across all realms.
    async fn list_spaces(&self, realm: &str) -> Result<Vec<Space>>;
    /// Stores metadata, creates the cgroup and the space network.
    async fn create_space(&self, space: &Space) -> Result<Space>;
    async fn ensure_space(&self, space: &Space) -> Result<Space>;
    async fn delete_space(&self, space: &Space) -> Result<()>;
    async fn purge_space(&self, space: &Space) -> Result<()>;
    async fn exists_space_network(&self, space: &Space) -> Result<bool>;

    // =========================================================================
    // Stack
    // =========================================================================

    async fn get_stack(&self, lookup: &Stack) -> Result<Stack>;
    /// Lists stacks; empty filters match everything.
    async fn list_stacks(&self, realm: &str, space: &str) -> Result<Vec<Stack>>;
    async fn create_stack(&self, stack: &Stack) -> Result<Stack>;
    async fn ensure_stack(&self, stack: &Stack) -> Result<Stack>;
    async fn delete_stack(&self, stack: &Stack) -> Result<()>;
    async fn purge_stack(&self, stack: &Stack) -> Result<()>;

    // =========================================================================
    // Cell
    // =========================================================================

    async fn get_cell(&self, lookup: &Cell) -> Result<Cell>;
    /// Lists cells; empty filters match everything.
    async fn list_cells(&self, realm: &str, space: &str, stack: &str) -> Result<Vec<Cell>>;
    /// Stores metadata, creates the cgroup, root container and declared containers.
    async fn create_cell(&self, cell: &Cell) -> Result<Cell>;
    async fn ensure_cell(&self, cell: &Cell) -> Result<Cell>;
    /// Starts the root container, then every declared container.
    async fn start_cell(&self, cell: &Cell) -> Result<()>;
    /// Gracefully stops every container of the cell.
    async fn stop_cell(&self, cell: &Cell) -> Result<()>;
    /// Force-kills every container of the cell.
    async fn kill_cell(&self, cell: &Cell) -> Result<()>;
    /// Removes containers, root container, cgroup and metadata.
    async fn delete_cell(&self, cell: &Cell) -> Result<()>;
    async fn purge_cell(&self, cell: &Cell) -> Result<()>;
    /// Persists the given cell document as-is.
    async fn update_cell_metadata(&self, cell: &Cell) -> Result<()>;
    async fn exists_cell_root_container(&self, cell: &Cell) -> Result<bool>;

    // =========================================================================
    // Container
    // =========================================================================

    /// Merges `spec` into the cell, creates the runtime container, and
    /// returns the updated cell.
    async fn create_container(&self, cell: &Cell, spec: &ContainerSpec) -> Result<Cell>;
    async fn start_container(&self, cell: &Cell, id: &str) -> Result<()>;
    async fn stop_container(&self, cell: &Cell, id: &str) -> Result<()>;
    async fn kill_container(&self, cell: &Cell, id: &str) -> Result<()>;
    /// Removes the runtime container and its task. Metadata is untouched.
    async fn delete_container(&self, cell: &Cell, id: &str) -> Result<()>;
    async fn get_container_state(&self, cell: &Cell, id: &str) -> Result<ContainerState>;

    // =========================================================================
    // Utilities
    // =========================================================================

    async fn exists_cgroup(&self, resource: ResourceRef<'_>) -> Result<bool>;

    /// Writes network plugin defaults (bridge config, IPAM ranges).
    async fn ensure_network_defaults(&self) -> Result<()>;

    /// Releases connections held for the current call.
    ///
    /// Called once at the end of every controller operation; implementations
    /// reconnect lazily on the next call.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}
