//! Realm operations.

use super::{Controller, DeletePolicy, child_failed, space, validate};
use crate::constants::{
    PURGE_ERROR_PREFIX, PURGED_TAGS, TAG_CGROUP, TAG_METADATA, TAG_NAMESPACE,
};
use crate::error::{Error, Op, PartialError, PartialResult, Result};
use crate::model::{Realm, ResourceKind, ResourceRef, ResourceState};
use crate::runner::Runner;
use serde::Serialize;
use tracing::{debug, info, warn};

const KIND: ResourceKind = ResourceKind::Realm;

// =============================================================================
// Results
// =============================================================================

/// Outcome of [`Controller::get_realm`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRealmResult {
    pub realm: Realm,
    pub metadata_exists: bool,
    pub cgroup_exists: bool,
    pub namespace_exists: bool,
}

/// Outcome of [`Controller::create_realm`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRealmResult {
    pub realm: Realm,
    pub metadata_exists_pre: bool,
    pub metadata_exists_post: bool,
    pub cgroup_exists_pre: bool,
    pub cgroup_exists_post: bool,
    pub namespace_exists_pre: bool,
    pub namespace_exists_post: bool,
    pub created: bool,
    pub cgroup_created: bool,
    pub namespace_created: bool,
}

/// Outcome of [`Controller::delete_realm`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRealmResult {
    pub realm: Realm,
    /// `space:<name>` per cascaded child, then `metadata`, `cgroup`, `namespace`.
    pub deleted: Vec<String>,
    pub metadata_deleted: bool,
    pub cgroup_deleted: bool,
    pub namespace_deleted: bool,
}

/// Outcome of [`Controller::purge_realm`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeRealmResult {
    pub realm: Realm,
    pub force: bool,
    pub cascade: bool,
    /// Metadata was present when the purge started.
    pub metadata_existed: bool,
    pub realm_deleted: bool,
    pub purge_succeeded: bool,
    pub deleted: Vec<String>,
    pub purged: Vec<String>,
}

// =============================================================================
// Runner Sequences
// =============================================================================

/// Fetches realm metadata; `None` when the runner reports not-found.
pub(super) async fn lookup(runner: &dyn Runner, name: &str) -> Result<Option<Realm>> {
    match runner.get_realm(&Realm::new(name)).await {
        Ok(doc) => Ok(Some(doc)),
        Err(e) if e.is_not_found() => {
            debug!("Realm {} not found", name);
            Ok(None)
        }
        Err(e) => Err(Error::backend(Op::Get(KIND), e)),
    }
}

/// Metadata, cgroup and namespace existence of `realm`.
pub(super) async fn probe(runner: &dyn Runner, realm: &Realm) -> Result<GetRealmResult> {
    let found = lookup(runner, &realm.name).await?;
    let mut result = GetRealmResult {
        metadata_exists: found.is_some(),
        realm: found.unwrap_or_else(|| realm.clone()),
        ..Default::default()
    };
    result.cgroup_exists = runner
        .exists_cgroup(ResourceRef::Realm(&result.realm))
        .await
        .map_err(|e| Error::backend(Op::CheckCgroup(KIND), e))?;
    result.namespace_exists = runner
        .exists_realm_namespace(result.realm.effective_namespace())
        .await
        .map_err(|e| Error::backend(Op::CheckNamespace, e))?;
    Ok(result)
}

/// Runs `create_realm` (or `ensure_realm` when `ensure`), tolerating a
/// pre-existing runtime namespace.
pub(super) async fn provision(
    runner: &dyn Runner,
    realm: &Realm,
    ensure: bool,
) -> Result<CreateRealmResult> {
    let pre = probe(runner, realm).await?;

    let outcome = if ensure {
        runner.ensure_realm(realm).await
    } else {
        runner.create_realm(realm).await
    };
    match outcome {
        Ok(_) => {}
        Err(Error::NamespaceAlreadyExists(ns)) => {
            warn!("Namespace {} already exists, adopting it for realm {}", ns, realm.name);
        }
        Err(e) => {
            let op = if ensure { Op::Ensure(KIND) } else { Op::Create(KIND) };
            return Err(Error::backend(op, e));
        }
    }

    let post = probe(runner, realm).await?;
    let result = CreateRealmResult {
        realm: post.realm,
        metadata_exists_pre: pre.metadata_exists,
        metadata_exists_post: post.metadata_exists,
        cgroup_exists_pre: pre.cgroup_exists,
        cgroup_exists_post: post.cgroup_exists,
        namespace_exists_pre: pre.namespace_exists,
        namespace_exists_post: post.namespace_exists,
        created: !pre.metadata_exists && post.metadata_exists,
        cgroup_created: !pre.cgroup_exists && post.cgroup_exists,
        namespace_created: !pre.namespace_exists && post.namespace_exists,
    };
    if result.created {
        info!("Created realm {} (namespace {})", result.realm.name, result.realm.namespace);
    }
    Ok(result)
}

/// Removes `realm` after handling its spaces per `policy`.
///
/// Cascaded children are deleted, or purged when `purge` is set. Every
/// removed artifact is appended to `tags`.
async fn remove(
    runner: &dyn Runner,
    realm: &Realm,
    policy: DeletePolicy,
    purge: bool,
    tags: &mut Vec<String>,
) -> Result<()> {
    if policy.lists_children() {
        let spaces = runner
            .list_spaces(&realm.name)
            .await
            .map_err(|e| Error::backend(Op::List(ResourceKind::Space), e))?;
        policy.check(KIND, &realm.name, spaces.len())?;

        if policy.cascade {
            for child in &spaces {
                let removed = if purge {
                    space::purge_tree(runner, child).await
                } else {
                    space::delete_tree(runner, child).await
                };
                removed.map_err(child_failed(ResourceKind::Space, &child.name))?;
                tags.push(ResourceKind::Space.tag(&child.name));
            }
        }
    }

    runner
        .delete_realm(realm)
        .await
        .map_err(|e| Error::backend(Op::Delete(KIND), e))?;
    tags.extend([TAG_METADATA, TAG_CGROUP, TAG_NAMESPACE].map(String::from));
    Ok(())
}

async fn purge(
    runner: &dyn Runner,
    realm: &Realm,
    policy: DeletePolicy,
    result: &mut PurgeRealmResult,
) -> Result<()> {
    let found = lookup(runner, &realm.name).await?;
    result.metadata_existed = found.is_some();
    result.realm = found.unwrap_or_else(|| Realm {
        name: realm.name.clone(),
        namespace: realm.effective_namespace().to_string(),
        state: ResourceState::Unknown,
        ..Default::default()
    });

    if result.metadata_existed {
        remove(runner, &result.realm, policy, true, &mut result.deleted).await?;
        result.realm_deleted = true;
    } else {
        debug!("Realm {} has no metadata, purging leftovers only", realm.name);
    }

    match runner.purge_realm(&result.realm).await {
        Ok(()) => {
            result.purged.extend(PURGED_TAGS.map(String::from));
            result.purge_succeeded = true;
            info!("Purged realm {}", result.realm.name);
            Ok(())
        }
        Err(e) => {
            warn!("Purge of realm {} incomplete: {}", result.realm.name, e);
            result.purged.push(format!("{PURGE_ERROR_PREFIX}{e}"));
            Err(Error::backend(Op::Purge(KIND), e))
        }
    }
}

// =============================================================================
// Controller API
// =============================================================================

impl Controller {
    /// Looks up a realm. A missing realm is reported, not returned as error.
    pub async fn get_realm(&self, realm: &Realm) -> Result<GetRealmResult> {
        let realm = validate::realm(realm)?;
        let runner = self.session();
        probe(&*runner, &realm).await
    }

    /// Lists every realm.
    pub async fn list_realms(&self) -> Result<Vec<Realm>> {
        let runner = self.session();
        runner
            .list_realms()
            .await
            .map_err(|e| Error::backend(Op::List(KIND), e))
    }

    /// Creates a realm with its cgroup and runtime namespace.
    ///
    /// Idempotent: a second call reports `created = false`.
    pub async fn create_realm(&self, realm: &Realm) -> Result<CreateRealmResult> {
        let realm = validate::realm(realm)?;
        let runner = self.session();
        provision(&*runner, &realm, false).await
    }

    /// Deletes a realm, gated on its spaces per `force` / `cascade`.
    pub async fn delete_realm(
        &self,
        realm: &Realm,
        force: bool,
        cascade: bool,
    ) -> Result<DeleteRealmResult> {
        let realm = validate::realm(realm)?;
        let runner = self.session();

        let doc = lookup(&*runner, &realm.name)
            .await?
            .ok_or_else(|| Error::ResourceNotFound {
                kind: KIND,
                path: realm.name.clone(),
            })?;
        let mut result = DeleteRealmResult {
            realm: doc,
            ..Default::default()
        };
        remove(
            &*runner,
            &result.realm,
            DeletePolicy::new(force, cascade),
            false,
            &mut result.deleted,
        )
        .await?;
        result.metadata_deleted = true;
        result.cgroup_deleted = true;
        result.namespace_deleted = true;

        info!("Deleted realm {}", result.realm.name);
        Ok(result)
    }

    /// Best-effort removal of a realm and everything left behind under it.
    ///
    /// Works without metadata. On failure the partially filled result is
    /// returned inside the error.
    pub async fn purge_realm(
        &self,
        realm: &Realm,
        force: bool,
        cascade: bool,
    ) -> PartialResult<PurgeRealmResult> {
        let mut result = PurgeRealmResult {
            realm: realm.clone(),
            force,
            cascade,
            ..Default::default()
        };
        let realm = match validate::realm(realm) {
            Ok(realm) => realm,
            Err(e) => return Err(PartialError::new(result, e)),
        };

        let runner = self.session();
        match purge(&*runner, &realm, DeletePolicy::new(force, cascade), &mut result).await {
            Ok(()) => Ok(result),
            Err(e) => Err(PartialError::new(result, e)),
        }
    }
}
