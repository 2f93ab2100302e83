//! Space operations.

use super::{Controller, DeletePolicy, child_failed, realm, stack, validate};
use crate::constants::{PURGE_ERROR_PREFIX, PURGED_TAGS, TAG_CGROUP, TAG_METADATA, TAG_NETWORK};
use crate::error::{Error, Op, PartialError, PartialResult, Result};
use crate::model::{ResourceKind, ResourceRef, ResourceState, Space};
use crate::runner::Runner;
use serde::Serialize;
use tracing::{debug, info, warn};

const KIND: ResourceKind = ResourceKind::Space;

// =============================================================================
// Results
// =============================================================================

/// Outcome of [`Controller::get_space`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSpaceResult {
    pub space: Space,
    pub metadata_exists: bool,
    pub cgroup_exists: bool,
    pub network_exists: bool,
}

/// Outcome of [`Controller::create_space`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSpaceResult {
    pub space: Space,
    pub metadata_exists_pre: bool,
    pub metadata_exists_post: bool,
    pub cgroup_exists_pre: bool,
    pub cgroup_exists_post: bool,
    pub network_exists_pre: bool,
    pub network_exists_post: bool,
    pub created: bool,
    pub cgroup_created: bool,
    pub network_created: bool,
}

/// Outcome of [`Controller::delete_space`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSpaceResult {
    pub space: Space,
    /// `stack:<name>` per cascaded child, then `metadata`, `cgroup`, `network`.
    pub deleted: Vec<String>,
    pub metadata_deleted: bool,
    pub cgroup_deleted: bool,
    pub network_deleted: bool,
}

/// Outcome of [`Controller::purge_space`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeSpaceResult {
    pub space: Space,
    pub force: bool,
    pub cascade: bool,
    pub metadata_existed: bool,
    pub space_deleted: bool,
    pub purge_succeeded: bool,
    pub deleted: Vec<String>,
    pub purged: Vec<String>,
}

// =============================================================================
// Runner Sequences
// =============================================================================

pub(super) async fn lookup(runner: &dyn Runner, space: &Space) -> Result<Option<Space>> {
    match runner.get_space(&Space::new(&space.realm, &space.name)).await {
        Ok(doc) => Ok(Some(doc)),
        Err(e) if e.is_not_found() => {
            debug!("Space {} not found", space.path());
            Ok(None)
        }
        Err(e) => Err(Error::backend(Op::Get(KIND), e)),
    }
}

pub(super) async fn probe(runner: &dyn Runner, space: &Space) -> Result<GetSpaceResult> {
    let found = lookup(runner, space).await?;
    let mut result = GetSpaceResult {
        metadata_exists: found.is_some(),
        space: found.unwrap_or_else(|| space.clone()),
        ..Default::default()
    };
    result.cgroup_exists = runner
        .exists_cgroup(ResourceRef::Space(&result.space))
        .await
        .map_err(|e| Error::backend(Op::CheckCgroup(KIND), e))?;
    result.network_exists = runner
        .exists_space_network(&result.space)
        .await
        .map_err(|e| Error::backend(Op::CheckNetwork, e))?;
    Ok(result)
}

/// Creates (or ensures) a space under an existing realm.
pub(super) async fn provision(
    runner: &dyn Runner,
    space: &Space,
    ensure: bool,
) -> Result<CreateSpaceResult> {
    if realm::lookup(runner, &space.realm).await?.is_none() {
        return Err(Error::ResourceNotFound {
            kind: ResourceKind::Realm,
            path: space.realm.clone(),
        });
    }

    let pre = probe(runner, space).await?;
    if ensure {
        runner
            .ensure_space(space)
            .await
            .map_err(|e| Error::backend(Op::Ensure(KIND), e))?;
    } else {
        runner
            .create_space(space)
            .await
            .map_err(|e| Error::backend(Op::Create(KIND), e))?;
    }
    let post = probe(runner, space).await?;

    let result = CreateSpaceResult {
        space: post.space,
        metadata_exists_pre: pre.metadata_exists,
        metadata_exists_post: post.metadata_exists,
        cgroup_exists_pre: pre.cgroup_exists,
        cgroup_exists_post: post.cgroup_exists,
        network_exists_pre: pre.network_exists,
        network_exists_post: post.network_exists,
        created: !pre.metadata_exists && post.metadata_exists,
        cgroup_created: !pre.cgroup_exists && post.cgroup_exists,
        network_created: !pre.network_exists && post.network_exists,
    };
    if result.created {
        info!("Created space {}", result.space.path());
    }
    Ok(result)
}

/// Clears stacks per `policy`, then deletes the space itself.
async fn remove(
    runner: &dyn Runner,
    space: &Space,
    policy: DeletePolicy,
    purge: bool,
    tags: &mut Vec<String>,
) -> Result<()> {
    if policy.lists_children() {
        let stacks = runner
            .list_stacks(&space.realm, &space.name)
            .await
            .map_err(|e| Error::backend(Op::List(ResourceKind::Stack), e))?;
        policy.check(KIND, &space.name, stacks.len())?;

        if policy.cascade {
            for child in &stacks {
                let removed = if purge {
                    stack::purge_tree(runner, child).await
                } else {
                    stack::delete_tree(runner, child).await
                };
                removed.map_err(child_failed(ResourceKind::Stack, &child.name))?;
                tags.push(ResourceKind::Stack.tag(&child.name));
            }
        }
    }

    runner
        .delete_space(space)
        .await
        .map_err(|e| Error::backend(Op::Delete(KIND), e))?;
    tags.extend([TAG_METADATA, TAG_CGROUP, TAG_NETWORK].map(String::from));
    Ok(())
}

/// Cascade step used by realm deletes.
pub(super) async fn delete_tree(runner: &dyn Runner, space: &Space) -> Result<()> {
    remove(runner, space, DeletePolicy::new(false, true), false, &mut Vec::new()).await
}

/// Cascade step used by realm purges.
pub(super) async fn purge_tree(runner: &dyn Runner, space: &Space) -> Result<()> {
    remove(runner, space, DeletePolicy::new(false, true), true, &mut Vec::new()).await?;
    runner
        .purge_space(space)
        .await
        .map_err(|e| Error::backend(Op::Purge(KIND), e))
}

async fn purge(
    runner: &dyn Runner,
    space: &Space,
    policy: DeletePolicy,
    result: &mut PurgeSpaceResult,
) -> Result<()> {
    let found = lookup(runner, space).await?;
    result.metadata_existed = found.is_some();
    result.space = found.unwrap_or_else(|| Space {
        state: ResourceState::Unknown,
        ..space.clone()
    });

    if result.metadata_existed {
        remove(runner, &result.space, policy, true, &mut result.deleted).await?;
        result.space_deleted = true;
    }

    match runner.purge_space(&result.space).await {
        Ok(()) => {
            result.purged.extend(PURGED_TAGS.map(String::from));
            result.purge_succeeded = true;
            info!("Purged space {}", result.space.path());
            Ok(())
        }
        Err(e) => {
            warn!("Purge of space {} incomplete: {}", result.space.path(), e);
            result.purged.push(format!("{PURGE_ERROR_PREFIX}{e}"));
            Err(Error::backend(Op::Purge(KIND), e))
        }
    }
}

// =============================================================================
// Controller API
// =============================================================================

impl Controller {
    /// Looks up a space. A missing space is reported, not returned as error.
    pub async fn get_space(&self, space: &Space) -> Result<GetSpaceResult> {
        let space = validate::space(space)?;
        let runner = self.session();
        probe(&*runner, &space).await
    }

    /// Lists spaces of `realm`, or of every realm when `realm` is blank.
    pub async fn list_spaces(&self, realm: &str) -> Result<Vec<Space>> {
        let runner = self.session();
        runner
            .list_spaces(validate::filter(realm))
            .await
            .map_err(|e| Error::backend(Op::List(KIND), e))
    }

    /// Creates a space with its cgroup and network under an existing realm.
    pub async fn create_space(&self, space: &Space) -> Result<CreateSpaceResult> {
        let space = validate::space(space)?;
        let runner = self.session();
        provision(&*runner, &space, false).await
    }

    /// Deletes a space, gated on its stacks per `force` / `cascade`.
    pub async fn delete_space(
        &self,
        space: &Space,
        force: bool,
        cascade: bool,
    ) -> Result<DeleteSpaceResult> {
        let space = validate::space(space)?;
        let runner = self.session();

        let doc = lookup(&*runner, &space)
            .await?
            .ok_or_else(|| Error::ResourceNotFound {
                kind: KIND,
                path: space.path(),
            })?;
        let mut result = DeleteSpaceResult {
            space: doc,
            ..Default::default()
        };
        remove(
            &*runner,
            &result.space,
            DeletePolicy::new(force, cascade),
            false,
            &mut result.deleted,
        )
        .await?;
        result.metadata_deleted = true;
        result.cgroup_deleted = true;
        result.network_deleted = true;

        info!("Deleted space {}", result.space.path());
        Ok(result)
    }

    /// Best-effort removal of a space and everything left behind under it.
    pub async fn purge_space(
        &self,
        space: &Space,
        force: bool,
        cascade: bool,
    ) -> PartialResult<PurgeSpaceResult> {
        let mut result = PurgeSpaceResult {
            space: space.clone(),
            force,
            cascade,
            ..Default::default()
        };
        let space = match validate::space(space) {
            Ok(space) => space,
            Err(e) => return Err(PartialError::new(result, e)),
        };

        let runner = self.session();
        match purge(&*runner, &space, DeletePolicy::new(force, cascade), &mut result).await {
            Ok(()) => Ok(result),
            Err(e) => Err(PartialError::new(result, e)),
        }
    }
}
