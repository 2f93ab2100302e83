//! Cell operations.
//!
//! A cell owns a cgroup and a root container; its containers are embedded in
//! the cell document, so every container mutation ends in a metadata update
//! here. Cell deletes are never gated on containers.

use super::{Controller, stack, validate};
use crate::constants::{
    PURGE_ERROR_PREFIX, PURGED_TAGS, TAG_CGROUP, TAG_CONTAINERS, TAG_METADATA,
};
use crate::error::{Error, Op, PartialError, PartialResult, Result};
use crate::model::{Cell, ResourceKind, ResourceRef, ResourceState, Stack};
use crate::runner::Runner;
use serde::Serialize;
use tracing::{debug, info, warn};

const KIND: ResourceKind = ResourceKind::Cell;

// =============================================================================
// Results
// =============================================================================

/// Outcome of [`Controller::get_cell`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetCellResult {
    pub cell: Cell,
    pub metadata_exists: bool,
    pub cgroup_exists: bool,
    pub root_container_exists: bool,
}

/// Outcome of [`Controller::create_cell`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCellResult {
    pub cell: Cell,
    pub metadata_exists_pre: bool,
    pub metadata_exists_post: bool,
    pub cgroup_exists_pre: bool,
    pub cgroup_exists_post: bool,
    pub root_container_exists_pre: bool,
    pub root_container_exists_post: bool,
    pub created: bool,
    pub cgroup_created: bool,
    pub root_container_created: bool,
}

/// Outcome of [`Controller::delete_cell`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCellResult {
    pub cell: Cell,
    /// `containers` when any were removed, then `metadata`, `cgroup`.
    pub deleted: Vec<String>,
    pub containers_deleted: usize,
    pub metadata_deleted: bool,
    pub cgroup_deleted: bool,
}

/// Outcome of [`Controller::purge_cell`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeCellResult {
    pub cell: Cell,
    pub metadata_existed: bool,
    pub cell_deleted: bool,
    pub purge_succeeded: bool,
    pub deleted: Vec<String>,
    pub purged: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCellResult {
    pub cell: Cell,
    pub started: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopCellResult {
    pub cell: Cell,
    pub stopped: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KillCellResult {
    pub cell: Cell,
    pub killed: bool,
}

// =============================================================================
// Runner Sequences
// =============================================================================

/// Fetches cell metadata and checks it sits under the requested parents.
pub(super) async fn lookup(runner: &dyn Runner, cell: &Cell) -> Result<Option<Cell>> {
    let key = Cell::new(&cell.realm, &cell.space, &cell.stack, &cell.name);
    let doc = match runner.get_cell(&key).await {
        Ok(doc) => doc,
        Err(e) if e.is_not_found() => {
            debug!("Cell {} not found", cell.path());
            return Ok(None);
        }
        Err(e) => return Err(Error::backend(Op::Get(KIND), e)),
    };

    let parents = [
        (ResourceKind::Realm, &cell.realm, &doc.realm),
        (ResourceKind::Space, &cell.space, &doc.space),
        (ResourceKind::Stack, &cell.stack, &doc.stack),
    ];
    for (field, requested, found) in parents {
        if requested != found {
            return Err(Error::Mismatch {
                name: cell.name.clone(),
                field,
                requested: requested.clone(),
                found: found.clone(),
            });
        }
    }
    Ok(Some(doc))
}

/// Like [`lookup`], but a missing cell is an error naming its path.
pub(super) async fn require(runner: &dyn Runner, cell: &Cell) -> Result<Cell> {
    lookup(runner, cell)
        .await?
        .ok_or_else(|| Error::ResourceNotFound {
            kind: KIND,
            path: cell.path(),
        })
}

/// Metadata first; cgroup and root container only for a known cell.
pub(super) async fn probe(runner: &dyn Runner, cell: &Cell) -> Result<GetCellResult> {
    let Some(doc) = lookup(runner, cell).await? else {
        return Ok(GetCellResult {
            cell: cell.clone(),
            ..Default::default()
        });
    };

    let cgroup_exists = runner
        .exists_cgroup(ResourceRef::Cell(&doc))
        .await
        .map_err(|e| Error::backend(Op::CheckCgroup(KIND), e))?;
    let root_container_exists = runner
        .exists_cell_root_container(&doc)
        .await
        .map_err(|e| Error::backend(Op::CheckRootContainer, e))?;

    Ok(GetCellResult {
        cell: doc,
        metadata_exists: true,
        cgroup_exists,
        root_container_exists,
    })
}

/// Creates (or ensures) a cell under an existing stack.
pub(super) async fn provision(
    runner: &dyn Runner,
    cell: &Cell,
    ensure: bool,
) -> Result<CreateCellResult> {
    let parent = Stack::new(&cell.realm, &cell.space, &cell.stack);
    if stack::lookup(runner, &parent).await?.is_none() {
        return Err(Error::ResourceNotFound {
            kind: ResourceKind::Stack,
            path: parent.path(),
        });
    }

    let pre = probe(runner, cell).await?;
    if ensure {
        runner
            .ensure_cell(cell)
            .await
            .map_err(|e| Error::backend(Op::Ensure(KIND), e))?;
    } else {
        runner
            .create_cell(cell)
            .await
            .map_err(|e| Error::backend(Op::Create(KIND), e))?;
    }
    let post = probe(runner, cell).await?;

    let result = CreateCellResult {
        cell: post.cell,
        metadata_exists_pre: pre.metadata_exists,
        metadata_exists_post: post.metadata_exists,
        cgroup_exists_pre: pre.cgroup_exists,
        cgroup_exists_post: post.cgroup_exists,
        root_container_exists_pre: pre.root_container_exists,
        root_container_exists_post: post.root_container_exists,
        created: !pre.metadata_exists && post.metadata_exists,
        cgroup_created: !pre.cgroup_exists && post.cgroup_exists,
        root_container_created: !pre.root_container_exists && post.root_container_exists,
    };
    if result.created {
        info!(
            "Created cell {} with {} container(s)",
            result.cell.path(),
            result.cell.containers.len()
        );
    }
    Ok(result)
}

/// Stores `cell` with `state`.
pub(super) async fn persist_state(
    runner: &dyn Runner,
    cell: &mut Cell,
    state: ResourceState,
) -> Result<()> {
    cell.state = state;
    runner
        .update_cell_metadata(cell)
        .await
        .map_err(|e| Error::backend(Op::UpdateMetadata(KIND), e))
}

/// Cascade step used by stack deletes.
pub(super) async fn delete_tree(runner: &dyn Runner, cell: &Cell) -> Result<()> {
    runner
        .delete_cell(cell)
        .await
        .map_err(|e| Error::backend(Op::Delete(KIND), e))
}

/// Cascade step used by stack purges.
pub(super) async fn purge_tree(runner: &dyn Runner, cell: &Cell) -> Result<()> {
    delete_tree(runner, cell).await?;
    runner
        .purge_cell(cell)
        .await
        .map_err(|e| Error::backend(Op::Purge(KIND), e))
}

fn delete_tags(containers: usize) -> Vec<String> {
    let mut tags = Vec::with_capacity(3);
    if containers > 0 {
        tags.push(TAG_CONTAINERS.to_string());
    }
    tags.extend([TAG_METADATA, TAG_CGROUP].map(String::from));
    tags
}

async fn purge(runner: &dyn Runner, cell: &Cell, result: &mut PurgeCellResult) -> Result<()> {
    let found = lookup(runner, cell).await?;
    result.metadata_existed = found.is_some();
    result.cell = found.unwrap_or_else(|| Cell {
        state: ResourceState::Unknown,
        ..cell.clone()
    });

    if result.metadata_existed {
        delete_tree(runner, &result.cell).await?;
        result.deleted = delete_tags(result.cell.containers.len());
        result.cell_deleted = true;
    }

    match runner.purge_cell(&result.cell).await {
        Ok(()) => {
            result.purged.extend(PURGED_TAGS.map(String::from));
            result.purge_succeeded = true;
            info!("Purged cell {}", result.cell.path());
            Ok(())
        }
        Err(e) => {
            warn!("Purge of cell {} incomplete: {}", result.cell.path(), e);
            result.purged.push(format!("{PURGE_ERROR_PREFIX}{e}"));
            Err(Error::backend(Op::Purge(KIND), e))
        }
    }
}

// =============================================================================
// Controller API
// =============================================================================

impl Controller {
    /// Looks up a cell and, if it exists, its cgroup and root container.
    pub async fn get_cell(&self, cell: &Cell) -> Result<GetCellResult> {
        let cell = validate::cell(cell)?;
        let runner = self.session();
        probe(&*runner, &cell).await
    }

    /// Lists cells; blank filters match everything.
    pub async fn list_cells(&self, realm: &str, space: &str, stack: &str) -> Result<Vec<Cell>> {
        let runner = self.session();
        runner
            .list_cells(
                validate::filter(realm),
                validate::filter(space),
                validate::filter(stack),
            )
            .await
            .map_err(|e| Error::backend(Op::List(KIND), e))
    }

    /// Creates a cell with its cgroup, root container and declared containers.
    pub async fn create_cell(&self, cell: &Cell) -> Result<CreateCellResult> {
        let cell = validate::cell(cell)?;
        let runner = self.session();
        provision(&*runner, &cell, false).await
    }

    /// Starts the root container and every declared container.
    pub async fn start_cell(&self, cell: &Cell) -> Result<StartCellResult> {
        let cell = validate::cell(cell)?;
        let runner = self.session();

        let mut doc = require(&*runner, &cell).await?;
        runner
            .start_cell(&doc)
            .await
            .map_err(|e| Error::backend(Op::Start(KIND), e))?;
        persist_state(&*runner, &mut doc, ResourceState::Ready).await?;

        info!("Started cell {}", doc.path());
        Ok(StartCellResult {
            cell: doc,
            started: true,
        })
    }

    /// Gracefully stops every container; the cell goes back to `Pending`.
    pub async fn stop_cell(&self, cell: &Cell) -> Result<StopCellResult> {
        let cell = validate::cell(cell)?;
        let runner = self.session();

        let mut doc = require(&*runner, &cell).await?;
        runner
            .stop_cell(&doc)
            .await
            .map_err(|e| Error::backend(Op::Stop(KIND), e))?;
        persist_state(&*runner, &mut doc, ResourceState::Pending).await?;

        info!("Stopped cell {}", doc.path());
        Ok(StopCellResult {
            cell: doc,
            stopped: true,
        })
    }

    /// Force-kills every container; the cell is marked `Stopped`.
    pub async fn kill_cell(&self, cell: &Cell) -> Result<KillCellResult> {
        let cell = validate::cell(cell)?;
        let runner = self.session();

        let mut doc = require(&*runner, &cell).await?;
        runner
            .kill_cell(&doc)
            .await
            .map_err(|e| Error::backend(Op::Kill(KIND), e))?;
        persist_state(&*runner, &mut doc, ResourceState::Stopped).await?;

        info!("Killed cell {}", doc.path());
        Ok(KillCellResult {
            cell: doc,
            killed: true,
        })
    }

    /// Deletes a cell with all of its containers.
    pub async fn delete_cell(&self, cell: &Cell) -> Result<DeleteCellResult> {
        let cell = validate::cell(cell)?;
        let runner = self.session();

        let doc = require(&*runner, &cell).await?;
        delete_tree(&*runner, &doc).await?;

        let containers_deleted = doc.containers.len();
        info!(
            "Deleted cell {} ({} container(s))",
            doc.path(),
            containers_deleted
        );
        Ok(DeleteCellResult {
            cell: doc,
            deleted: delete_tags(containers_deleted),
            containers_deleted,
            metadata_deleted: true,
            cgroup_deleted: true,
        })
    }

    /// Best-effort removal of a cell and anything left behind by it.
    pub async fn purge_cell(&self, cell: &Cell) -> PartialResult<PurgeCellResult> {
        let mut result = PurgeCellResult {
            cell: cell.clone(),
            ..Default::default()
        };
        let cell = match validate::cell(cell) {
            Ok(cell) => cell,
            Err(e) => return Err(PartialError::new(result, e)),
        };

        let runner = self.session();
        match purge(&*runner, &cell, &mut result).await {
            Ok(()) => Ok(result),
            Err(e) => Err(PartialError::new(result, e)),
        }
    }
}
