//! Error types for the control plane.
//!
//! Errors form a cause chain: a runner failure is wrapped exactly once in
//! [`Error::Backend`] with an [`Op`] naming what the controller was doing,
//! and cascade failures wrap the child's error in [`Error::ChildFailed`].
//! [`Error::is`] walks the chain so callers can test for a kind no matter
//! how deep it sits; [`Error::root_cause`] returns the original error.

use crate::model::ResourceKind;

/// Result type alias for control plane operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result of an operation that hands back its partial report on failure.
pub type PartialResult<T> = std::result::Result<T, PartialError<T>>;

/// Errors that can occur in the controller or a runner.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Validation Errors
    // =========================================================================
    /// A required identity field is empty after trimming.
    #[error("{field} name is required{}", required_for(.kind, .field))]
    NameRequired {
        /// Kind of resource the operation targets.
        kind: ResourceKind,
        /// The empty field.
        field: ResourceKind,
    },

    /// Two embedded containers of a cell share an id after trimming.
    #[error("duplicate container id \"{id}\" in cell \"{cell}\"")]
    DuplicateContainer { cell: String, id: String },

    // =========================================================================
    // Lookup Errors
    // =========================================================================
    /// Runner sentinel: the document does not exist.
    #[error("{0} not found")]
    NotFound(ResourceKind),

    /// A resource required by the operation does not exist.
    #[error("{kind} \"{path}\" not found")]
    ResourceNotFound { kind: ResourceKind, path: String },

    /// A cell was found under a different parent than requested.
    #[error("cell \"{name}\" {field} mismatch: requested \"{requested}\", found \"{found}\"")]
    Mismatch {
        name: String,
        field: ResourceKind,
        requested: String,
        found: String,
    },

    // =========================================================================
    // Dependency Errors
    // =========================================================================
    /// Strict delete/purge refused because children exist.
    #[error(
        "resource has dependencies: {kind} \"{name}\" has {count} {child}(s); \
         use --cascade to delete them or --force to skip dependency checks"
    )]
    HasDependencies {
        kind: ResourceKind,
        name: String,
        count: usize,
        child: ResourceKind,
    },

    /// A child failed during a cascading delete or purge.
    #[error("failed to remove {kind} \"{name}\": {source}")]
    ChildFailed {
        kind: ResourceKind,
        name: String,
        #[source]
        source: Box<Error>,
    },

    // =========================================================================
    // Backend Errors
    // =========================================================================
    /// Runtime namespace already exists (tolerated by realm creation).
    #[error("namespace already exists: {0}")]
    NamespaceAlreadyExists(String),

    /// A runner call failed.
    #[error("{op}: {source}")]
    Backend {
        op: Op,
        #[source]
        source: Box<Error>,
    },

    /// Raw failure reported by a runner.
    #[error("runtime error: {0}")]
    Runtime(String),

    // =========================================================================
    // Configuration / I/O Errors
    // =========================================================================
    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn required_for(kind: &ResourceKind, field: &ResourceKind) -> String {
    if kind == field {
        String::new()
    } else {
        format!(" for {kind}")
    }
}

/// Flat classification of [`Error`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NameRequired,
    DuplicateContainer,
    NotFound,
    ResourceNotFound,
    Mismatch,
    HasDependencies,
    ChildFailed,
    NamespaceAlreadyExists,
    Backend,
    Runtime,
    Config,
    Io,
}

impl Error {
    /// Wraps `source` as the failure of `op`.
    pub fn backend(op: Op, source: Error) -> Self {
        Error::Backend {
            op,
            source: Box::new(source),
        }
    }

    /// Returns the kind of this error, ignoring its causes.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NameRequired { .. } => ErrorKind::NameRequired,
            Error::DuplicateContainer { .. } => ErrorKind::DuplicateContainer,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::ResourceNotFound { .. } => ErrorKind::ResourceNotFound,
            Error::Mismatch { .. } => ErrorKind::Mismatch,
            Error::HasDependencies { .. } => ErrorKind::HasDependencies,
            Error::ChildFailed { .. } => ErrorKind::ChildFailed,
            Error::NamespaceAlreadyExists(_) => ErrorKind::NamespaceAlreadyExists,
            Error::Backend { .. } => ErrorKind::Backend,
            Error::Runtime(_) => ErrorKind::Runtime,
            Error::Config(_) => ErrorKind::Config,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Next error in the cause chain, if this one wraps another.
    #[must_use]
    pub fn cause(&self) -> Option<&Error> {
        match self {
            Error::Backend { source, .. } | Error::ChildFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Iterates over this error and every wrapped cause, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &Error> {
        std::iter::successors(Some(self), |e| e.cause())
    }

    /// Returns true if this error or any cause is of `kind`.
    #[must_use]
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.chain().any(|e| e.kind() == kind)
    }

    /// Returns true if any layer was produced by `op`.
    #[must_use]
    pub fn is_op(&self, op: Op) -> bool {
        self.chain()
            .any(|e| matches!(e, Error::Backend { op: o, .. } if *o == op))
    }

    /// Innermost error of the chain.
    #[must_use]
    pub fn root_cause(&self) -> &Error {
        self.chain().last().unwrap_or(self)
    }

    /// Returns true for the runner's soft not-found sentinel.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

// =============================================================================
// Operation Sentinels
// =============================================================================

/// Runner call that failed, rendered as a stable message prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Get(ResourceKind),
    List(ResourceKind),
    Create(ResourceKind),
    Ensure(ResourceKind),
    Delete(ResourceKind),
    Purge(ResourceKind),
    Start(ResourceKind),
    Stop(ResourceKind),
    Kill(ResourceKind),
    UpdateMetadata(ResourceKind),
    CheckCgroup(ResourceKind),
    CheckNamespace,
    CheckNetwork,
    CheckRootContainer,
    NetworkDefaults,
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Op::Get(k) => write!(f, "failed to get {k}"),
            Op::List(k) => write!(f, "failed to list {k}s"),
            Op::Create(k) => write!(f, "failed to create {k}"),
            Op::Ensure(k) => write!(f, "failed to ensure {k}"),
            Op::Delete(k) => write!(f, "failed to delete {k}"),
            Op::Purge(k) => write!(f, "failed to purge {k}"),
            Op::Start(ResourceKind::Cell) => write!(f, "failed to start cell containers"),
            Op::Stop(ResourceKind::Cell) => write!(f, "failed to stop cell containers"),
            Op::Kill(ResourceKind::Cell) => write!(f, "failed to kill cell containers"),
            Op::Start(k) => write!(f, "failed to start {k}"),
            Op::Stop(k) => write!(f, "failed to stop {k}"),
            Op::Kill(k) => write!(f, "failed to kill {k}"),
            Op::UpdateMetadata(k) => write!(f, "failed to update {k} metadata"),
            Op::CheckCgroup(k) => write!(f, "failed to check {k} cgroup"),
            Op::CheckNamespace => write!(f, "failed to check realm namespace"),
            Op::CheckNetwork => write!(f, "failed to check space network"),
            Op::CheckRootContainer => write!(f, "failed to check cell root container"),
            Op::NetworkDefaults => write!(f, "failed to prepare network defaults"),
        }
    }
}

// =============================================================================
// Partial Results
// =============================================================================

/// An error returned together with whatever the operation completed.
///
/// Purge and bootstrap keep going (or stop midway) and still hand back the
/// report they filled in, so callers can inspect both.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct PartialError<T: std::fmt::Debug> {
    /// The partially populated result.
    pub partial: T,
    /// What went wrong.
    #[source]
    pub error: Error,
}

impl<T: std::fmt::Debug> PartialError<T> {
    pub fn new(partial: T, error: Error) -> Self {
        Self { partial, error }
    }

    /// Drops the partial result.
    pub fn into_error(self) -> Error {
        self.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_required_display() {
        let own = Error::NameRequired {
            kind: ResourceKind::Cell,
            field: ResourceKind::Cell,
        };
        assert_eq!(own.to_string(), "cell name is required");

        let parent = Error::NameRequired {
            kind: ResourceKind::Cell,
            field: ResourceKind::Realm,
        };
        assert_eq!(parent.to_string(), "realm name is required for cell");
    }

    #[test]
    fn test_backend_chain() {
        let err = Error::backend(
            Op::Kill(ResourceKind::Cell),
            Error::Runtime("task not found".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "failed to kill cell containers: runtime error: task not found"
        );
        assert!(err.is(ErrorKind::Backend));
        assert!(err.is(ErrorKind::Runtime));
        assert!(err.is_op(Op::Kill(ResourceKind::Cell)));
        assert!(matches!(err.root_cause(), Error::Runtime(m) if m == "task not found"));
    }

    #[test]
    fn test_child_failed_chain() {
        let inner = Error::backend(
            Op::Delete(ResourceKind::Stack),
            Error::Runtime("busy".to_string()),
        );
        let err = Error::ChildFailed {
            kind: ResourceKind::Space,
            name: "blue".to_string(),
            source: Box::new(inner),
        };
        assert!(err.to_string().starts_with("failed to remove space \"blue\""));
        assert_eq!(err.chain().count(), 3);
        assert!(err.is_op(Op::Delete(ResourceKind::Stack)));
    }

    #[test]
    fn test_has_dependencies_display() {
        let err = Error::HasDependencies {
            kind: ResourceKind::Realm,
            name: "test-realm".to_string(),
            count: 2,
            child: ResourceKind::Space,
        };
        let msg = err.to_string();
        assert!(msg.contains("realm \"test-realm\" has 2 space(s)"));
        assert!(msg.contains("--cascade"));
        assert!(msg.contains("--force"));
    }

    #[test]
    fn test_partial_error_display() {
        let err = PartialError::new(vec!["metadata"], Error::Runtime("boom".to_string()));
        assert_eq!(err.to_string(), "runtime error: boom");
        assert_eq!(err.partial, vec!["metadata"]);
        assert!(err.into_error().is(ErrorKind::Runtime));
    }
}
