//! # Control Plane Constants
//!
//! Default identities provisioned by bootstrap and the tag vocabulary used
//! in delete/purge reports. These are the **single source of truth** for
//! those strings; outer layers match on them.
//!
//! ## Cross-References
//!
//! - [`crate::config`]: Uses the default identities as `ControllerConfig` defaults
//! - [`crate::controller`]: Emits the tags in `deleted` / `purged` lists

// =============================================================================
// Default Identities
// =============================================================================

/// Name of the realm that hosts the control plane's own workloads.
pub const SYSTEM_REALM: &str = "cellvisor-system";

/// Runtime namespace bound to [`SYSTEM_REALM`].
pub const SYSTEM_NAMESPACE: &str = "cellvisor-system";

/// Space created inside the system realm by bootstrap.
pub const DEFAULT_SPACE: &str = "default";

/// Stack created inside the default space by bootstrap.
pub const DEFAULT_STACK: &str = "default";

/// Cell created inside the default stack by bootstrap.
pub const DEFAULT_CELL: &str = "default";

/// Label key stamped on every bootstrapped resource.
pub const MANAGED_BY_LABEL: &str = "cellvisor.io/managed-by";

// =============================================================================
// Delete Tags
// =============================================================================
//
// Pushed to `deleted` after the scoped runner delete succeeds, in this order.
// Children removed by a cascade are tagged `"<kind>:<name>"` ahead of these.
// =============================================================================

/// Stored metadata document.
pub const TAG_METADATA: &str = "metadata";

/// Resource cgroup.
pub const TAG_CGROUP: &str = "cgroup";

/// Realm runtime namespace.
pub const TAG_NAMESPACE: &str = "namespace";

/// Space network configuration.
pub const TAG_NETWORK: &str = "network";

/// Containers of a deleted cell (reported as a count).
pub const TAG_CONTAINERS: &str = "containers";

/// Single container removed from a cell.
pub const TAG_CONTAINER: &str = "container";

/// Task of a removed container.
pub const TAG_TASK: &str = "task";

// =============================================================================
// Purge Tags
// =============================================================================

/// Containers left in the runtime without metadata.
pub const TAG_ORPHANED_CONTAINERS: &str = "orphaned-containers";

/// Network plugin state (interfaces, IPAM leases, config files).
pub const TAG_CNI_RESOURCES: &str = "cni-resources";

/// Every metadata document under the purged resource.
pub const TAG_ALL_METADATA: &str = "all-metadata";

/// Prefix of the entry recorded when the comprehensive purge call fails.
pub const PURGE_ERROR_PREFIX: &str = "purge-error:";

/// Tags recorded by a successful comprehensive purge, in order.
pub const PURGED_TAGS: [&str; 3] = [TAG_ORPHANED_CONTAINERS, TAG_CNI_RESOURCES, TAG_ALL_METADATA];
