//! Stack operations.

use super::{Controller, DeletePolicy, cell, child_failed, space, validate};
use crate::constants::{PURGE_ERROR_PREFIX, PURGED_TAGS, TAG_CGROUP, TAG_METADATA};
use crate::error::{Error, Op, PartialError, PartialResult, Result};
use crate::model::{ResourceKind, ResourceRef, ResourceState, Space, Stack};
use crate::runner::Runner;
use serde::Serialize;
use tracing::{debug, info, warn};

const KIND: ResourceKind = ResourceKind::Stack;

/// Outcome of [`Controller::get_stack`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetStackResult {
    pub stack: Stack,
    pub metadata_exists: bool,
    pub cgroup_exists: bool,
}

/// Outcome of [`Controller::create_stack`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStackResult {
    pub stack: Stack,
    pub metadata_exists_pre: bool,
    pub metadata_exists_post: bool,
    pub cgroup_exists_pre: bool,
    pub cgroup_exists_post: bool,
    pub created: bool,
    pub cgroup_created: bool,
}

/// Outcome of [`Controller::delete_stack`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteStackResult {
    pub stack: Stack,
    pub deleted: Vec<String>,
    pub metadata_deleted: bool,
    pub cgroup_deleted: bool,
}

/// Outcome of [`Controller::purge_stack`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeStackResult {
    pub stack: Stack,
    pub force: bool,
    pub cascade: bool,
    pub metadata_existed: bool,
    pub stack_deleted: bool,
    pub purge_succeeded: bool,
    pub deleted: Vec<String>,
    pub purged: Vec<String>,
}

pub(super) async fn lookup(runner: &dyn Runner, stack: &Stack) -> Result<Option<Stack>> {
    let key = Stack::new(&stack.realm, &stack.space, &stack.name);
    match runner.get_stack(&key).await {
        Ok(doc) => Ok(Some(doc)),
        Err(e) if e.is_not_found() => {
            debug!("Stack {} not found", stack.path());
            Ok(None)
        }
        Err(e) => Err(Error::backend(Op::Get(KIND), e)),
    }
}

pub(super) async fn probe(runner: &dyn Runner, stack: &Stack) -> Result<GetStackResult> {
    let found = lookup(runner, stack).await?;
    let mut result = GetStackResult {
        metadata_exists: found.is_some(),
        stack: found.unwrap_or_else(|| stack.clone()),
        ..Default::default()
    };
    result.cgroup_exists = runner
        .exists_cgroup(ResourceRef::Stack(&result.stack))
        .await
        .map_err(|e| Error::backend(Op::CheckCgroup(KIND), e))?;
    Ok(result)
}

pub(super) async fn provision(
    runner: &dyn Runner,
    stack: &Stack,
    ensure: bool,
) -> Result<CreateStackResult> {
    let parent = Space::new(&stack.realm, &stack.space);
    if space::lookup(runner, &parent).await?.is_none() {
        return Err(Error::ResourceNotFound {
            kind: ResourceKind::Space,
            path: parent.path(),
        });
    }

    let pre = probe(runner, stack).await?;
    if ensure {
        runner
            .ensure_stack(stack)
            .await
            .map_err(|e| Error::backend(Op::Ensure(KIND), e))?;
    } else {
        runner
            .create_stack(stack)
            .await
            .map_err(|e| Error::backend(Op::Create(KIND), e))?;
    }
    let post = probe(runner, stack).await?;

    let result = CreateStackResult {
        stack: post.stack,
        metadata_exists_pre: pre.metadata_exists,
        metadata_exists_post: post.metadata_exists,
        cgroup_exists_pre: pre.cgroup_exists,
        cgroup_exists_post: post.cgroup_exists,
        created: !pre.metadata_exists && post.metadata_exists,
        cgroup_created: !pre.cgroup_exists && post.cgroup_exists,
    };
    if result.created {
        info!("Created stack {}", result.stack.path());
    }
    Ok(result)
}

async fn remove(
    runner: &dyn Runner,
    stack: &Stack,
    policy: DeletePolicy,
    purge: bool,
    tags: &mut Vec<String>,
) -> Result<()> {
    if policy.lists_children() {
        let cells = runner
            .list_cells(&stack.realm, &stack.space, &stack.name)
            .await
            .map_err(|e| Error::backend(Op::List(ResourceKind::Cell), e))?;
        policy.check(KIND, &stack.name, cells.len())?;

        if policy.cascade {
            for child in &cells {
                let removed = if purge {
                    cell::purge_tree(runner, child).await
                } else {
                    cell::delete_tree(runner, child).await
                };
                removed.map_err(child_failed(ResourceKind::Cell, &child.name))?;
                tags.push(ResourceKind::Cell.tag(&child.name));
            }
        }
    } else {
        debug!("Force-removing stack {} without checking cells", stack.path());
    }

    runner
        .delete_stack(stack)
        .await
        .map_err(|e| Error::backend(Op::Delete(KIND), e))?;
    tags.extend([TAG_METADATA, TAG_CGROUP].map(String::from));
    Ok(())
}

pub(super) async fn delete_tree(runner: &dyn Runner, stack: &Stack) -> Result<()> {
    remove(runner, stack, DeletePolicy::new(false, true), false, &mut Vec::new()).await
}

pub(super) async fn purge_tree(runner: &dyn Runner, stack: &Stack) -> Result<()> {
    remove(runner, stack, DeletePolicy::new(false, true), true, &mut Vec::new()).await?;
    runner
        .purge_stack(stack)
        .await
        .map_err(|e| Error::backend(Op::Purge(KIND), e))
}

async fn purge(
    runner: &dyn Runner,
    stack: &Stack,
    policy: DeletePolicy,
    result: &mut PurgeStackResult,
) -> Result<()> {
    let found = lookup(runner, stack).await?;
    result.metadata_existed = found.is_some();
    result.stack = found.unwrap_or_else(|| Stack {
        state: ResourceState::Unknown,
        ..stack.clone()
    });

    if result.metadata_existed {
        remove(runner, &result.stack, policy, true, &mut result.deleted).await?;
        result.stack_deleted = true;
    }

    match runner.purge_stack(&result.stack).await {
        Ok(()) => {
            result.purged.extend(PURGED_TAGS.map(String::from));
            result.purge_succeeded = true;
            info!("Purged stack {}", result.stack.path());
            Ok(())
        }
        Err(e) => {
            warn!("Purge of stack {} incomplete: {}", result.stack.path(), e);
            result.purged.push(format!("{PURGE_ERROR_PREFIX}{e}"));
            Err(Error::backend(Op::Purge(KIND), e))
        }
    }
}

impl Controller {
    pub async fn get_stack(&self, stack: &Stack) -> Result<GetStackResult> {
        let stack = validate::stack(stack)?;
        let runner = self.session();
        probe(&*runner, &stack).await
    }

    /// Lists stacks; blank filters match everything.
    pub async fn list_stacks(&self, realm: &str, space: &str) -> Result<Vec<Stack>> {
        let runner = self.session();
        runner
            .list_stacks(validate::filter(realm), validate::filter(space))
            .await
            .map_err(|e| Error::backend(Op::List(KIND), e))
    }

    /// Creates a stack and its cgroup under an existing space.
    pub async fn create_stack(&self, stack: &Stack) -> Result<CreateStackResult> {
        let stack = validate::stack(stack)?;
        let runner = self.session();
        provision(&*runner, &stack, false).await
    }

    /// Deletes a stack, gated on its cells per `force` / `cascade`.
    pub async fn delete_stack(
        &self,
        stack: &Stack,
        force: bool,
        cascade: bool,
    ) -> Result<DeleteStackResult> {
        let stack = validate::stack(stack)?;
        let runner = self.session();

        let doc = lookup(&*runner, &stack)
            .await?
            .ok_or_else(|| Error::ResourceNotFound {
                kind: KIND,
                path: stack.path(),
            })?;
        let mut result = DeleteStackResult {
            stack: doc,
            ..Default::default()
        };
        remove(
            &*runner,
            &result.stack,
            DeletePolicy::new(force, cascade),
            false,
            &mut result.deleted,
        )
        .await?;
        result.metadata_deleted = true;
        result.cgroup_deleted = true;

        info!("Deleted stack {}", result.stack.path());
        Ok(result)
    }

    /// Best-effort removal of a stack and everything left behind under it.
    pub async fn purge_stack(
        &self,
        stack: &Stack,
        force: bool,
        cascade: bool,
    ) -> PartialResult<PurgeStackResult> {
        let mut result = PurgeStackResult {
            stack: stack.clone(),
            force,
            cascade,
            ..Default::default()
        };
        let stack = match validate::stack(stack) {
            Ok(stack) => stack,
            Err(e) => return Err(PartialError::new(result, e)),
        };

        let runner = self.session();
        match purge(&*runner, &stack, DeletePolicy::new(force, cascade), &mut result).await {
            Ok(()) => Ok(result),
            Err(e) => Err(PartialError::new(result, e)),
        }
    }
}
