//! Resource documents.
//!
//! Each level of the hierarchy carries the names of all its ancestors, so a
//! document alone identifies its place in the tree. Containers are not
//! stored on their own: they live inside [`Cell::containers`].

use super::ResourceState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label set attached to a resource.
pub type Labels = BTreeMap<String, String>;

// =============================================================================
// Resource Kind
// =============================================================================

/// The five levels of the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Realm,
    Space,
    Stack,
    Cell,
    Container,
}

impl ResourceKind {
    /// Lowercase name used in messages and `"<kind>:<name>"` tags.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Realm => "realm",
            ResourceKind::Space => "space",
            ResourceKind::Stack => "stack",
            ResourceKind::Cell => "cell",
            ResourceKind::Container => "container",
        }
    }

    /// The kind directly owned by this one, if any.
    #[must_use]
    pub fn child(self) -> Option<ResourceKind> {
        match self {
            ResourceKind::Realm => Some(ResourceKind::Space),
            ResourceKind::Space => Some(ResourceKind::Stack),
            ResourceKind::Stack => Some(ResourceKind::Cell),
            ResourceKind::Cell => Some(ResourceKind::Container),
            ResourceKind::Container => None,
        }
    }

    /// Formats a `"<kind>:<name>"` tag.
    #[must_use]
    pub fn tag(self, name: &str) -> String {
        format!("{}:{}", self.as_str(), name)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Realm
// =============================================================================

/// Top-level isolation boundary, bound 1:1 to a runtime namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Realm {
    pub name: String,
    /// Runtime namespace. Empty means "same as the realm name".
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub state: ResourceState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Realm {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    #[must_use]
    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    /// Namespace with the realm-name default applied.
    #[must_use]
    pub fn effective_namespace(&self) -> &str {
        let ns = self.namespace.trim();
        if ns.is_empty() { self.name.trim() } else { ns }
    }
}

// =============================================================================
// Space
// =============================================================================

/// Subdivision of a realm with its own network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Space {
    pub name: String,
    pub realm: String,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub state: ResourceState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Space {
    pub fn new(realm: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            realm: realm.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    /// `realm/space`.
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}/{}", self.realm, self.name)
    }
}

// =============================================================================
// Stack
// =============================================================================

/// Grouping of cells inside a space.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
    pub name: String,
    pub realm: String,
    pub space: String,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub state: ResourceState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Stack {
    pub fn new(
        realm: impl Into<String>,
        space: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            realm: realm.into(),
            space: space.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    /// `realm/space/stack`.
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}/{}/{}", self.realm, self.space, self.name)
    }
}

// =============================================================================
// Cell
// =============================================================================

/// Unit owning a cgroup and a root container; holds an ordered container list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub name: String,
    pub realm: String,
    pub space: String,
    pub stack: String,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub containers: Vec<ContainerSpec>,
    #[serde(default)]
    pub state: ResourceState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Cell {
    pub fn new(
        realm: impl Into<String>,
        space: impl Into<String>,
        stack: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            realm: realm.into(),
            space: space.into(),
            stack: stack.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    #[must_use]
    pub fn with_container(mut self, container: ContainerSpec) -> Self {
        self.containers.push(container);
        self
    }

    /// `realm/space/stack/cell`.
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}/{}/{}/{}", self.realm, self.space, self.stack, self.name)
    }

    /// Looks up a container by id.
    #[must_use]
    pub fn container(&self, id: &str) -> Option<&ContainerSpec> {
        self.containers.iter().find(|c| c.id == id)
    }

    /// Inserts or replaces a container, keeping list order stable.
    pub fn upsert_container(&mut self, container: ContainerSpec) {
        match self.containers.iter_mut().find(|c| c.id == container.id) {
            Some(existing) => *existing = container,
            None => self.containers.push(container),
        }
    }

    /// Removes a container by id, returning it if present.
    pub fn remove_container(&mut self, id: &str) -> Option<ContainerSpec> {
        let idx = self.containers.iter().position(|c| c.id == id)?;
        Some(self.containers.remove(idx))
    }
}

// =============================================================================
// Container
// =============================================================================

/// A workload inside a cell, addressed by `id` unique within that cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    pub id: String,
    pub realm: String,
    pub space: String,
    pub stack: String,
    pub cell: String,
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Marks the cell's root container (namespace holder).
    #[serde(default)]
    pub root: bool,
}

impl ContainerSpec {
    pub fn new(
        realm: impl Into<String>,
        space: impl Into<String>,
        stack: impl Into<String>,
        cell: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            realm: realm.into(),
            space: space.into(),
            stack: stack.into(),
            cell: cell.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    #[must_use]
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = Some(command);
        self
    }

    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = Some(args);
        self
    }

    /// `realm/space/stack/cell/container`.
    #[must_use]
    pub fn path(&self) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.realm, self.space, self.stack, self.cell, self.id
        )
    }
}

// =============================================================================
// Resource Reference
// =============================================================================

/// Borrowed handle to any cgroup-owning document.
#[derive(Debug, Clone, Copy)]
pub enum ResourceRef<'a> {
    Realm(&'a Realm),
    Space(&'a Space),
    Stack(&'a Stack),
    Cell(&'a Cell),
}

impl ResourceRef<'_> {
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceRef::Realm(_) => ResourceKind::Realm,
            ResourceRef::Space(_) => ResourceKind::Space,
            ResourceRef::Stack(_) => ResourceKind::Stack,
            ResourceRef::Cell(_) => ResourceKind::Cell,
        }
    }

    /// Slash-separated hierarchical path.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            ResourceRef::Realm(r) => r.name.clone(),
            ResourceRef::Space(s) => s.path(),
            ResourceRef::Stack(s) => s.path(),
            ResourceRef::Cell(c) => c.path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_namespace_defaults_to_name() {
        assert_eq!(Realm::new("main").effective_namespace(), "main");
        assert_eq!(
            Realm::new("main").with_namespace("  ").effective_namespace(),
            "main"
        );
        assert_eq!(
            Realm::new("main").with_namespace("ns").effective_namespace(),
            "ns"
        );
    }

    #[test]
    fn test_upsert_and_remove_container_keep_order() {
        let mut cell = Cell::new("r", "s", "t", "c")
            .with_container(ContainerSpec::new("r", "s", "t", "c", "a"))
            .with_container(ContainerSpec::new("r", "s", "t", "c", "b"));

        cell.upsert_container(ContainerSpec::new("r", "s", "t", "c", "a").with_image("nginx"));
        assert_eq!(cell.containers[0].image, "nginx");
        assert_eq!(cell.containers.len(), 2);

        let removed = cell.remove_container("a").map(|c| c.id);
        assert_eq!(removed.as_deref(), Some("a"));
        assert_eq!(cell.containers[0].id, "b");
        assert!(cell.remove_container("missing").is_none());
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(ResourceKind::Space.tag("blue"), "space:blue");
        assert_eq!(ResourceKind::Realm.child(), Some(ResourceKind::Space));
        assert_eq!(ResourceKind::Container.child(), None);
    }

    #[test]
    fn test_paths() {
        let c = ContainerSpec::new("r", "s", "t", "c", "x");
        assert_eq!(c.path(), "r/s/t/c/x");
        assert_eq!(Cell::new("r", "s", "t", "c").path(), "r/s/t/c");
    }

    #[test]
    fn test_resource_ref_kind_and_path() {
        let stack = Stack::new("r", "s", "t");
        let target = ResourceRef::Stack(&stack);
        assert_eq!(target.kind(), ResourceKind::Stack);
        assert_eq!(target.path(), "r/s/t");

        let cell = Cell::new("r", "s", "t", "c");
        assert_eq!(ResourceRef::Cell(&cell).kind(), ResourceKind::Cell);
    }
}
