//! Lifecycle state types.
//!
//! - `ResourceState`: stored aggregate state of a realm, space, stack or cell
//! - `ContainerState`: live task state reported by the runner for one container

use serde::{Deserialize, Serialize};

// =============================================================================
// Resource State
// =============================================================================

/// Stored lifecycle state of a resource.
///
/// Only start/stop/kill move a cell between states:
///
/// ```text
///            start
///   Pending ───────▶ Ready
///      ▲               │ │
///      └──── stop ─────┘ │ kill
///                        ▼
///                     Stopped ──start──▶ Ready
/// ```
///
/// `Unknown` is the placeholder for documents whose state could not be read
/// or derived, e.g. a realm synthesized for a purge after its metadata is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ResourceState {
    /// Provisioned but not running, or stopped gracefully.
    Pending,
    /// Running.
    Ready,
    /// Force-killed or exited.
    Stopped,
    /// State is unknown.
    #[default]
    Unknown,
}

impl std::fmt::Display for ResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceState::Pending => write!(f, "Pending"),
            ResourceState::Ready => write!(f, "Ready"),
            ResourceState::Stopped => write!(f, "Stopped"),
            ResourceState::Unknown => write!(f, "Unknown"),
        }
    }
}

// =============================================================================
// Container State
// =============================================================================

/// Task state of a single container as seen by the container runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    /// Container exists, task not started.
    Created,
    /// Task is running.
    Running,
    /// Task is paused.
    Paused,
    /// Task has exited or was killed.
    Stopped,
    /// Runtime could not tell.
    #[default]
    Unknown,
}

impl ContainerState {
    /// Maps the runtime view onto the stored lifecycle vocabulary.
    #[must_use]
    pub fn as_resource_state(self) -> ResourceState {
        match self {
            ContainerState::Running => ResourceState::Ready,
            ContainerState::Created | ContainerState::Paused => ResourceState::Pending,
            ContainerState::Stopped => ResourceState::Stopped,
            ContainerState::Unknown => ResourceState::Unknown,
        }
    }
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Stopped => write!(f, "stopped"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}
