//! # Resource Model
//!
//! Documents for the five-level hierarchy and their lifecycle states.
//!
//! ```text
//! Realm ──▶ Space ──▶ Stack ──▶ Cell ──▶ Container
//!  (ns)     (net)              (cgroup,   (embedded in
//!                               root ctr)  Cell::containers)
//! ```
//!
//! Every document carries its ancestors' names. Identity fields are plain
//! strings; trimming and validation happen in the controller before any
//! document reaches a runner.

mod resources;
mod state;

pub use resources::{
    Cell, ContainerSpec, Labels, Realm, ResourceKind, ResourceRef, Space, Stack,
};
pub use state::{ContainerState, ResourceState};
