//! # Controller - Lifecycle Orchestration
//!
//! The controller turns one typed request into an ordered sequence of
//! runner calls:
//!
//! ```text
//!   request ──▶ trim + validate ──▶ read pre-state ──▶ apply policy
//!                                                         │
//!   result  ◀── derive flags   ◀── read post-state ◀── mutate
//! ```
//!
//! ## Key Properties
//!
//! - **Stateless**: nothing is cached between calls; every call re-reads
//!   the state it needs from the runner.
//! - **Derived outcomes**: `created = !exists_pre && exists_post`.
//! - **Policy-gated deletes**: strict, cascade or force (see [`DeletePolicy`]).
//! - **No rollback**: runner calls are individually atomic; a failure midway
//!   is reported, not undone. Re-running is safe because every step checks
//!   existence first.
//! - **Scoped runner handle**: each call holds a [`Session`] that closes the
//!   runner on every exit path.
//!
//! No locking happens here. Concurrent conflicting calls on one resource get
//! whatever ordering the runner provides.

mod bootstrap;
mod cell;
mod container;
mod realm;
mod space;
mod stack;
mod validate;

pub use bootstrap::BootstrapReport;
pub use cell::{
    CreateCellResult, DeleteCellResult, GetCellResult, KillCellResult, PurgeCellResult,
    StartCellResult, StopCellResult,
};
pub use container::{
    CreateContainerResult, DeleteContainerResult, GetContainerResult, KillContainerResult,
    StartContainerResult, StopContainerResult,
};
pub use realm::{CreateRealmResult, DeleteRealmResult, GetRealmResult, PurgeRealmResult};
pub use space::{CreateSpaceResult, DeleteSpaceResult, GetSpaceResult, PurgeSpaceResult};
pub use stack::{CreateStackResult, DeleteStackResult, GetStackResult, PurgeStackResult};

use crate::config::ControllerConfig;
use crate::error::{Error, Result};
use crate::model::ResourceKind;
use crate::runner::Runner;
use std::ops::Deref;
use std::sync::Arc;
use tracing::warn;

/// Orchestrates runner calls for every resource operation.
///
/// Cheap to clone; clones share the runner.
#[derive(Clone)]
pub struct Controller {
    runner: Arc<dyn Runner>,
    config: Arc<ControllerConfig>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("runner", &self.runner.name())
            .field("config", &self.config)
            .finish()
    }
}

impl Controller {
    /// Creates a controller over `runner` with fixed default identities.
    pub fn new(runner: Arc<dyn Runner>, config: ControllerConfig) -> Self {
        Self {
            runner,
            config: Arc::new(config),
        }
    }

    /// Creates a controller with [`ControllerConfig::default`].
    pub fn with_defaults(runner: Arc<dyn Runner>) -> Self {
        Self::new(runner, ControllerConfig::default())
    }

    /// Default identities this controller was built with.
    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Opens a runner session for one call.
    fn session(&self) -> Session<'_> {
        Session {
            runner: self.runner.as_ref(),
        }
    }
}

// =============================================================================
// Runner Session
// =============================================================================

/// Runner handle scoped to one controller call.
///
/// Dropping the session closes the runner, so every early return in an
/// operation releases it. Close failures are logged and otherwise ignored.
pub(crate) struct Session<'a> {
    runner: &'a dyn Runner,
}

impl<'a> Deref for Session<'a> {
    type Target = dyn Runner + 'a;

    fn deref(&self) -> &Self::Target {
        self.runner
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.runner.close() {
            warn!("Failed to close {} runner: {}", self.runner.name(), e);
        }
    }
}

// =============================================================================
// Delete Policy
// =============================================================================

/// Dependency policy of a delete or purge.
///
/// | force | cascade | children listed | children present |
/// |-------|---------|-----------------|------------------|
/// | false | false   | yes             | error            |
/// | true  | false   | no              | ignored          |
/// | any   | true    | yes             | removed first    |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletePolicy {
    /// Skip dependency validation.
    pub force: bool,
    /// Remove children recursively before the parent.
    pub cascade: bool,
}

impl DeletePolicy {
    pub fn new(force: bool, cascade: bool) -> Self {
        Self { force, cascade }
    }

    /// Children are listed to remove them or to validate there are none.
    #[must_use]
    pub fn lists_children(self) -> bool {
        self.cascade || !self.force
    }

    /// Fails a strict delete of a parent that still has children.
    pub fn check(self, kind: ResourceKind, name: &str, count: usize) -> Result<()> {
        if self.cascade || self.force || count == 0 {
            return Ok(());
        }
        Err(Error::HasDependencies {
            kind,
            name: name.to_string(),
            count,
            child: kind.child().unwrap_or(kind),
        })
    }
}

/// Wraps a cascade failure with the child it happened on.
fn child_failed(kind: ResourceKind, name: &str) -> impl FnOnce(Error) -> Error + '_ {
    move |e| Error::ChildFailed {
        kind,
        name: name.to_string(),
        source: Box::new(e),
    }
}
