//! Identity trimming and required-field checks.
//!
//! Every operation runs its document through one of these before the first
//! runner call. Fields are checked in a fixed order: the resource's own name
//! first, then its parents from the realm down. Callers rely on which field
//! is reported when several are empty.

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::model::{Cell, ContainerSpec, Realm, ResourceKind, Space, Stack};

fn required(value: &str, kind: ResourceKind, field: ResourceKind) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::NameRequired { kind, field });
    }
    Ok(trimmed.to_string())
}

/// Trims an optional list filter. Empty means "match everything".
pub(super) fn filter(value: &str) -> &str {
    value.trim()
}

/// Name, then the namespace default.
pub(super) fn realm(doc: &Realm) -> Result<Realm> {
    let mut out = doc.clone();
    out.name = required(&doc.name, ResourceKind::Realm, ResourceKind::Realm)?;
    out.namespace = out.effective_namespace().to_string();
    Ok(out)
}

/// Name, realm.
pub(super) fn space(doc: &Space) -> Result<Space> {
    let kind = ResourceKind::Space;
    let mut out = doc.clone();
    out.name = required(&doc.name, kind, ResourceKind::Space)?;
    out.realm = required(&doc.realm, kind, ResourceKind::Realm)?;
    Ok(out)
}

/// Name, realm, space.
pub(super) fn stack(doc: &Stack) -> Result<Stack> {
    let kind = ResourceKind::Stack;
    let mut out = doc.clone();
    out.name = required(&doc.name, kind, ResourceKind::Stack)?;
    out.realm = required(&doc.realm, kind, ResourceKind::Realm)?;
    out.space = required(&doc.space, kind, ResourceKind::Space)?;
    Ok(out)
}

/// Name, realm, space, stack, then each embedded container id.
///
/// Embedded containers inherit the cell's identity. Ids must be unique
/// within the cell once trimmed.
pub(super) fn cell(doc: &Cell) -> Result<Cell> {
    let kind = ResourceKind::Cell;
    let mut out = doc.clone();
    out.name = required(&doc.name, kind, ResourceKind::Cell)?;
    out.realm = required(&doc.realm, kind, ResourceKind::Realm)?;
    out.space = required(&doc.space, kind, ResourceKind::Space)?;
    out.stack = required(&doc.stack, kind, ResourceKind::Stack)?;
    let mut seen = BTreeSet::new();
    for container in &mut out.containers {
        container.id = required(&container.id, kind, ResourceKind::Container)?;
        if !seen.insert(container.id.clone()) {
            return Err(Error::DuplicateContainer {
                cell: out.name.clone(),
                id: container.id.clone(),
            });
        }
        container.realm = out.realm.clone();
        container.space = out.space.clone();
        container.stack = out.stack.clone();
        container.cell = out.name.clone();
    }
    Ok(out)
}

/// Id, realm, space, stack, cell.
pub(super) fn container(doc: &ContainerSpec) -> Result<ContainerSpec> {
    let kind = ResourceKind::Container;
    let mut out = doc.clone();
    out.id = required(&doc.id, kind, ResourceKind::Container)?;
    out.realm = required(&doc.realm, kind, ResourceKind::Realm)?;
    out.space = required(&doc.space, kind, ResourceKind::Space)?;
    out.stack = required(&doc.stack, kind, ResourceKind::Stack)?;
    out.cell = required(&doc.cell, kind, ResourceKind::Cell)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: Error) -> ResourceKind {
        match err {
            Error::NameRequired { field, .. } => field,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_realm_trims_and_defaults_namespace() {
        let out = realm(&Realm::new("  main ").with_namespace(" ")).unwrap();
        assert_eq!(out.name, "main");
        assert_eq!(out.namespace, "main");
    }

    #[test]
    fn test_cell_name_reported_before_realm() {
        let err = cell(&Cell::new(" ", "s", "t", "")).unwrap_err();
        assert_eq!(field_of(err), ResourceKind::Cell);

        let err = cell(&Cell::new("", "", "", "c")).unwrap_err();
        assert_eq!(field_of(err), ResourceKind::Realm);

        let err = cell(&Cell::new("r", "s", "\t", "c")).unwrap_err();
        assert_eq!(field_of(err), ResourceKind::Stack);
    }

    #[test]
    fn test_container_order() {
        let err = container(&ContainerSpec::new("", "", "", "", "")).unwrap_err();
        assert_eq!(field_of(err), ResourceKind::Container);

        let err = container(&ContainerSpec::new("r", "s", "t", " ", "app")).unwrap_err();
        assert_eq!(field_of(err), ResourceKind::Cell);
    }

    #[test]
    fn test_cell_containers_inherit_identity() {
        let doc = Cell::new(" r ", "s", "t", "c")
            .with_container(ContainerSpec::new("", "", "", "", " app "));
        let out = cell(&doc).unwrap();
        assert_eq!(out.containers[0].id, "app");
        assert_eq!(out.containers[0].path(), "r/s/t/c/app");
    }

    #[test]
    fn test_cell_rejects_duplicate_container_ids() {
        let doc = Cell::new("r", "s", "t", "c")
            .with_container(ContainerSpec::new("r", "s", "t", "c", "app"))
            .with_container(ContainerSpec::new("r", "s", "t", "c", "web"))
            .with_container(ContainerSpec::new("r", "s", "t", "c", " app "));
        let err = cell(&doc).unwrap_err();
        assert_eq!(err.to_string(), "duplicate container id \"app\" in cell \"c\"");
    }

    #[test]
    fn test_space_reports_kind_and_field() {
        let err = space(&Space::new(" ", "blue")).unwrap_err();
        assert_eq!(err.to_string(), "realm name is required for space");
    }
}
