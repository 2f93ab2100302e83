//! Container operations.
//!
//! Containers are not stored on their own: each one is an entry of its
//! cell's container list. Every operation resolves the cell first and then
//! addresses the container by id.

use super::{Controller, cell, validate};
use crate::constants::{TAG_CONTAINER, TAG_TASK};
use crate::error::{Error, Op, Result};
use crate::model::{Cell, ContainerSpec, ResourceKind, ResourceRef, ResourceState};
use crate::runner::Runner;
use serde::Serialize;
use tracing::{debug, info, warn};

const KIND: ResourceKind = ResourceKind::Container;

// =============================================================================
// Results
// =============================================================================

/// Outcome of [`Controller::get_container`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetContainerResult {
    pub container: ContainerSpec,
    /// The id is listed in the cell document.
    pub container_exists: bool,
    pub cgroup_exists: bool,
    pub root_container_exists: bool,
    pub state: ResourceState,
}

/// Outcome of [`Controller::create_container`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContainerResult {
    pub container: ContainerSpec,
    pub cell: Cell,
    pub exists_pre: bool,
    pub exists_post: bool,
    pub created: bool,
    pub started: bool,
    pub state: ResourceState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartContainerResult {
    pub container: ContainerSpec,
    pub started: bool,
    pub state: ResourceState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopContainerResult {
    pub container: ContainerSpec,
    pub stopped: bool,
    pub state: ResourceState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KillContainerResult {
    pub container: ContainerSpec,
    pub killed: bool,
    pub state: ResourceState,
}

/// Outcome of [`Controller::delete_container`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteContainerResult {
    pub container: ContainerSpec,
    /// `container`, `task`.
    pub deleted: Vec<String>,
}

// =============================================================================
// Runner Sequences
// =============================================================================

fn parent_of(spec: &ContainerSpec) -> Cell {
    Cell::new(&spec.realm, &spec.space, &spec.stack, &spec.cell)
}

/// Resolves the owning cell and the stored spec.
async fn require(runner: &dyn Runner, spec: &ContainerSpec) -> Result<(Cell, ContainerSpec)> {
    let doc = cell::require(runner, &parent_of(spec)).await?;
    let stored = doc
        .container(&spec.id)
        .cloned()
        .ok_or_else(|| Error::ResourceNotFound {
            kind: KIND,
            path: spec.path(),
        })?;
    Ok((doc, stored))
}

/// Runtime state of a container for display; `fallback` if it can't be read.
async fn observed_state(
    runner: &dyn Runner,
    cell: &Cell,
    id: &str,
    fallback: ResourceState,
) -> ResourceState {
    match runner.get_container_state(cell, id).await {
        Ok(state) => state.as_resource_state(),
        Err(e) => {
            warn!(
                "Failed to read state of container {}/{}, assuming {}: {}",
                cell.path(),
                id,
                fallback,
                e
            );
            fallback
        }
    }
}

/// Starts `id` and marks the cell `Ready`.
async fn start(runner: &dyn Runner, mut doc: Cell, id: &str) -> Result<ResourceState> {
    runner
        .start_container(&doc, id)
        .await
        .map_err(|e| Error::backend(Op::Start(KIND), e))?;
    cell::persist_state(runner, &mut doc, ResourceState::Ready).await?;
    Ok(observed_state(runner, &doc, id, ResourceState::Ready).await)
}

// =============================================================================
// Controller API
// =============================================================================

impl Controller {
    /// Looks up a container within its cell. The cell must exist.
    pub async fn get_container(&self, container: &ContainerSpec) -> Result<GetContainerResult> {
        let spec = validate::container(container)?;
        let runner = self.session();

        let doc = cell::require(&*runner, &parent_of(&spec)).await?;
        let stored = doc.container(&spec.id).cloned();

        let cgroup_exists = runner
            .exists_cgroup(ResourceRef::Cell(&doc))
            .await
            .map_err(|e| Error::backend(Op::CheckCgroup(ResourceKind::Cell), e))?;
        let root_container_exists = runner
            .exists_cell_root_container(&doc)
            .await
            .map_err(|e| Error::backend(Op::CheckRootContainer, e))?;

        let state = match stored {
            Some(_) => observed_state(&*runner, &doc, &spec.id, ResourceState::Unknown).await,
            None => {
                debug!("Container {} not found in cell", spec.path());
                ResourceState::Unknown
            }
        };

        Ok(GetContainerResult {
            container_exists: stored.is_some(),
            container: stored.unwrap_or(spec),
            cgroup_exists,
            root_container_exists,
            state,
        })
    }

    /// Lists containers of every cell matching the filters.
    pub async fn list_containers(
        &self,
        realm: &str,
        space: &str,
        stack: &str,
        cell: &str,
    ) -> Result<Vec<ContainerSpec>> {
        let runner = self.session();
        let cell = validate::filter(cell);
        let cells = runner
            .list_cells(
                validate::filter(realm),
                validate::filter(space),
                validate::filter(stack),
            )
            .await
            .map_err(|e| Error::backend(Op::List(KIND), e))?;

        Ok(cells
            .into_iter()
            .filter(|c| cell.is_empty() || c.name == cell)
            .flat_map(|c| c.containers)
            .collect())
    }

    /// Adds a container to an existing cell and starts it.
    pub async fn create_container(
        &self,
        container: &ContainerSpec,
    ) -> Result<CreateContainerResult> {
        let spec = validate::container(container)?;
        let runner = self.session();

        let doc = cell::require(&*runner, &parent_of(&spec)).await?;
        let exists_pre = doc.container(&spec.id).is_some();

        let updated = runner
            .create_container(&doc, &spec)
            .await
            .map_err(|e| Error::backend(Op::Create(KIND), e))?;
        let state = start(&*runner, updated, &spec.id).await?;

        let doc = cell::require(&*runner, &parent_of(&spec)).await?;
        let exists_post = doc.container(&spec.id).is_some();
        let created = !exists_pre && exists_post;
        if created {
            info!("Created container {}", spec.path());
        }

        Ok(CreateContainerResult {
            container: doc.container(&spec.id).cloned().unwrap_or(spec),
            cell: doc,
            exists_pre,
            exists_post,
            created,
            started: true,
            state,
        })
    }

    /// Starts a container; the cell's root container must already run.
    pub async fn start_container(&self, container: &ContainerSpec) -> Result<StartContainerResult> {
        let spec = validate::container(container)?;
        let runner = self.session();

        let (doc, stored) = require(&*runner, &spec).await?;
        let state = start(&*runner, doc, &stored.id).await?;

        info!("Started container {}", stored.path());
        Ok(StartContainerResult {
            container: stored,
            started: true,
            state,
        })
    }

    /// Gracefully stops a container. The cell state is left as is.
    pub async fn stop_container(&self, container: &ContainerSpec) -> Result<StopContainerResult> {
        let spec = validate::container(container)?;
        let runner = self.session();

        let (doc, stored) = require(&*runner, &spec).await?;
        runner
            .stop_container(&doc, &stored.id)
            .await
            .map_err(|e| Error::backend(Op::Stop(KIND), e))?;
        let state = observed_state(&*runner, &doc, &stored.id, ResourceState::Stopped).await;

        info!("Stopped container {}", stored.path());
        Ok(StopContainerResult {
            container: stored,
            stopped: true,
            state,
        })
    }

    /// Force-kills a container. The cell state is left as is.
    pub async fn kill_container(&self, container: &ContainerSpec) -> Result<KillContainerResult> {
        let spec = validate::container(container)?;
        let runner = self.session();

        let (doc, stored) = require(&*runner, &spec).await?;
        runner
            .kill_container(&doc, &stored.id)
            .await
            .map_err(|e| Error::backend(Op::Kill(KIND), e))?;
        let state = observed_state(&*runner, &doc, &stored.id, ResourceState::Stopped).await;

        info!("Killed container {}", stored.path());
        Ok(KillContainerResult {
            container: stored,
            killed: true,
            state,
        })
    }

    /// Removes a container from the runtime and from its cell document.
    pub async fn delete_container(
        &self,
        container: &ContainerSpec,
    ) -> Result<DeleteContainerResult> {
        let spec = validate::container(container)?;
        let runner = self.session();

        let (mut doc, stored) = require(&*runner, &spec).await?;
        runner
            .delete_container(&doc, &stored.id)
            .await
            .map_err(|e| Error::backend(Op::Delete(KIND), e))?;

        doc.remove_container(&stored.id);
        runner
            .update_cell_metadata(&doc)
            .await
            .map_err(|e| Error::backend(Op::UpdateMetadata(ResourceKind::Cell), e))?;

        info!("Deleted container {}", stored.path());
        Ok(DeleteContainerResult {
            container: stored,
            deleted: vec![TAG_CONTAINER.to_string(), TAG_TASK.to_string()],
        })
    }
}
