//! In-process runner backed by in-memory maps.
//!
//! Models the artifacts a real backend manages (metadata documents, cgroups,
//! runtime namespaces, space networks, root containers and container tasks)
//! without touching the host. Every call is recorded, and any method can be
//! made to fail on demand, which makes this the test double for the
//! controller as well as a dry-run backend.
//!
//! ## Thread Safety
//!
//! All state sits behind an internal `RwLock`; the runner is `Send + Sync`.
//! No lock is held across an `.await`.

use super::Runner;
use crate::error::{Error, Result};
use crate::model::{
    Cell, ContainerSpec, ContainerState, Realm, ResourceKind, ResourceRef, ResourceState, Space,
    Stack,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

type SpaceKey = (String, String);
type StackKey = (String, String, String);
type CellKey = (String, String, String, String);

fn space_key(s: &Space) -> SpaceKey {
    (s.realm.clone(), s.name.clone())
}

fn stack_key(s: &Stack) -> StackKey {
    (s.realm.clone(), s.space.clone(), s.name.clone())
}

fn cell_key(c: &Cell) -> CellKey {
    (c.realm.clone(), c.space.clone(), c.stack.clone(), c.name.clone())
}

fn cgroup_path(resource: ResourceRef<'_>) -> String {
    format!("/cellvisor/{}", resource.path())
}

fn matches(filter: &str, value: &str) -> bool {
    filter.is_empty() || filter == value
}

#[derive(Debug, Default)]
struct State {
    realms: BTreeMap<String, Realm>,
    namespaces: BTreeSet<String>,
    spaces: BTreeMap<SpaceKey, Space>,
    networks: BTreeSet<SpaceKey>,
    stacks: BTreeMap<StackKey, Stack>,
    cells: BTreeMap<CellKey, Cell>,
    cgroups: BTreeSet<String>,
    /// Root container state by cell path.
    roots: BTreeMap<String, ContainerState>,
    /// Task state by container path.
    tasks: BTreeMap<String, ContainerState>,
    network_defaults: bool,
}

impl State {
    /// Drops every runtime artifact whose path starts with `prefix`.
    fn remove_runtime_under(&mut self, prefix: &str) {
        let nested = format!("{prefix}/");
        let under = |path: &String| path == prefix || path.starts_with(&nested);
        self.roots.retain(|p, _| !under(p));
        self.tasks.retain(|p, _| !under(p));
        let cgroup_prefix = format!("/cellvisor/{prefix}");
        let cgroup_nested = format!("{cgroup_prefix}/");
        self.cgroups
            .retain(|p| p != &cgroup_prefix && !p.starts_with(&cgroup_nested));
    }

    fn stored_cell(&self, cell: &Cell) -> Result<&Cell> {
        self.cells
            .get(&cell_key(cell))
            .ok_or(Error::NotFound(ResourceKind::Cell))
    }

    fn insert_realm(&mut self, realm: &Realm) -> (Realm, bool) {
        let mut doc = realm.clone();
        doc.namespace = realm.effective_namespace().to_string();
        doc.state = ResourceState::Ready;
        doc.created_at = Some(Utc::now());
        self.cgroups.insert(cgroup_path(ResourceRef::Realm(&doc)));
        let fresh_namespace = self.namespaces.insert(doc.namespace.clone());
        self.realms.insert(doc.name.clone(), doc.clone());
        (doc, fresh_namespace)
    }

    fn insert_space(&mut self, space: &Space) -> Result<Space> {
        if !self.realms.contains_key(&space.realm) {
            return Err(Error::NotFound(ResourceKind::Realm));
        }
        if let Some(existing) = self.spaces.get(&space_key(space)) {
            return Ok(existing.clone());
        }
        let mut doc = space.clone();
        doc.state = ResourceState::Ready;
        doc.created_at = Some(Utc::now());
        self.cgroups.insert(cgroup_path(ResourceRef::Space(&doc)));
        self.networks.insert(space_key(&doc));
        self.spaces.insert(space_key(&doc), doc.clone());
        Ok(doc)
    }

    fn insert_stack(&mut self, stack: &Stack) -> Result<Stack> {
        if !self
            .spaces
            .contains_key(&(stack.realm.clone(), stack.space.clone()))
        {
            return Err(Error::NotFound(ResourceKind::Space));
        }
        if let Some(existing) = self.stacks.get(&stack_key(stack)) {
            return Ok(existing.clone());
        }
        let mut doc = stack.clone();
        doc.state = ResourceState::Ready;
        doc.created_at = Some(Utc::now());
        self.cgroups.insert(cgroup_path(ResourceRef::Stack(&doc)));
        self.stacks.insert(stack_key(&doc), doc.clone());
        Ok(doc)
    }

    fn insert_cell(&mut self, cell: &Cell) -> Result<Cell> {
        let parent = (cell.realm.clone(), cell.space.clone(), cell.stack.clone());
        if !self.stacks.contains_key(&parent) {
            return Err(Error::NotFound(ResourceKind::Stack));
        }
        if let Some(existing) = self.cells.get(&cell_key(cell)) {
            return Ok(existing.clone());
        }
        let mut doc = cell.clone();
        doc.state = ResourceState::Pending;
        doc.created_at = Some(Utc::now());
        self.cgroups.insert(cgroup_path(ResourceRef::Cell(&doc)));
        self.roots.insert(doc.path(), ContainerState::Running);
        for container in &doc.containers {
            self.tasks
                .entry(container.path())
                .or_insert(ContainerState::Created);
        }
        self.cells.insert(cell_key(&doc), doc.clone());
        Ok(doc)
    }

    fn set_cell_tasks(
        &mut self,
        cell: &Cell,
        root: ContainerState,
        tasks: ContainerState,
    ) -> Result<()> {
        let stored = self.stored_cell(cell)?.clone();
        self.roots.insert(stored.path(), root);
        for container in &stored.containers {
            self.tasks.insert(container.path(), tasks);
        }
        Ok(())
    }

    fn set_task(&mut self, cell: &Cell, id: &str, state: ContainerState) -> Result<()> {
        let stored = self.stored_cell(cell)?;
        let path = stored
            .container(id)
            .map(ContainerSpec::path)
            .ok_or(Error::NotFound(ResourceKind::Container))?;
        self.tasks.insert(path, state);
        Ok(())
    }
}

/// In-memory [`Runner`] with call recording and failure injection.
///
/// ```rust,ignore
/// let runner = MemoryRunner::new();
/// runner.fail("purge_realm", "cni plugin unreachable");
/// // ... drive a Controller ...
/// assert_eq!(runner.count("kill_cell"), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryRunner {
    state: RwLock<State>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, String>>,
}

impl MemoryRunner {
    /// Creates an empty runner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Test Controls
    // =========================================================================

    /// Makes every subsequent call to `method` fail with `message`.
    pub fn fail(&self, method: &str, message: &str) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(method.to_string(), message.to_string());
        }
    }

    /// Removes all injected failures.
    pub fn clear_failures(&self) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.clear();
        }
    }

    /// Recorded calls, oldest first, as `method(path)`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    /// Number of recorded calls to `method`.
    #[must_use]
    pub fn count(&self, method: &str) -> usize {
        let prefix = format!("{method}(");
        self.calls().iter().filter(|c| c.starts_with(&prefix)).count()
    }

    /// Marks a runtime namespace as present without a realm.
    pub fn seed_namespace(&self, namespace: &str) {
        if let Ok(mut state) = self.state.write() {
            state.namespaces.insert(namespace.to_string());
        }
    }

    /// Stores `cell` under an explicit key, bypassing parent checks.
    ///
    /// Reproduces a shared metadata store handing back a document that lives
    /// under a different hierarchy than the one requested.
    pub fn insert_cell_at(&self, realm: &str, space: &str, stack: &str, cell: Cell) {
        if let Ok(mut state) = self.state.write() {
            let key = (
                realm.to_string(),
                space.to_string(),
                stack.to_string(),
                cell.name.clone(),
            );
            state.cells.insert(key, cell);
        }
    }

    /// Overrides the task state of a container.
    pub fn set_container_state(&self, container: &ContainerSpec, task: ContainerState) {
        if let Ok(mut state) = self.state.write() {
            state.tasks.insert(container.path(), task);
        }
    }

    /// Overrides the root container state of a cell.
    pub fn set_root_state(&self, cell: &Cell, root: ContainerState) {
        if let Ok(mut state) = self.state.write() {
            state.roots.insert(cell.path(), root);
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Stored realm document.
    #[must_use]
    pub fn realm(&self, name: &str) -> Option<Realm> {
        self.state.read().ok()?.realms.get(name).cloned()
    }

    /// Stored cell document.
    #[must_use]
    pub fn cell(&self, realm: &str, space: &str, stack: &str, name: &str) -> Option<Cell> {
        let key = (
            realm.to_string(),
            space.to_string(),
            stack.to_string(),
            name.to_string(),
        );
        self.state.read().ok()?.cells.get(&key).cloned()
    }

    /// Task state of a container, if the task exists.
    #[must_use]
    pub fn container_state(&self, container: &ContainerSpec) -> Option<ContainerState> {
        self.state.read().ok()?.tasks.get(&container.path()).copied()
    }

    /// True if network defaults were written.
    #[must_use]
    pub fn has_network_defaults(&self) -> bool {
        self.state.read().map(|s| s.network_defaults).unwrap_or(false)
    }

    /// True if the runtime namespace exists.
    #[must_use]
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.state
            .read()
            .map(|s| s.namespaces.contains(namespace))
            .unwrap_or(false)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Records the call and returns the injected failure for `method`, if any.
    fn enter(&self, method: &str, target: &str) -> Result<()> {
        debug!("memory runner: {}({})", method, target);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(format!("{method}({target})"));
        }
        let failures = self
            .failures
            .lock()
            .map_err(|e| Error::Runtime(format!("lock poisoned: {e}")))?;
        match failures.get(method) {
            Some(message) => Err(Error::Runtime(message.clone())),
            None => Ok(()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|e| Error::Runtime(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|e| Error::Runtime(format!("lock poisoned: {e}")))
    }
}

#[async_trait]
impl Runner for MemoryRunner {
    fn name(&self) -> &str {
        "memory"
    }

    // =========================================================================
    // Realm
    // =========================================================================

    async fn get_realm(&self, lookup: &Realm) -> Result<Realm> {
        self.enter("get_realm", &lookup.name)?;
        self.read()?
            .realms
            .get(&lookup.name)
            .cloned()
            .ok_or(Error::NotFound(ResourceKind::Realm))
    }

    async fn list_realms(&self) -> Result<Vec<Realm>> {
        self.enter("list_realms", "")?;
        Ok(self.read()?.realms.values().cloned().collect())
    }

    async fn create_realm(&self, realm: &Realm) -> Result<Realm> {
        self.enter("create_realm", &realm.name)?;
        let mut state = self.write()?;
        if let Some(existing) = state.realms.get(&realm.name) {
            return Ok(existing.clone());
        }
        let (doc, fresh_namespace) = state.insert_realm(realm);
        if !fresh_namespace {
            return Err(Error::NamespaceAlreadyExists(doc.namespace));
        }
        Ok(doc)
    }

    async fn ensure_realm(&self, realm: &Realm) -> Result<Realm> {
        self.enter("ensure_realm", &realm.name)?;
        let mut state = self.write()?;
        if let Some(existing) = state.realms.get(&realm.name) {
            return Ok(existing.clone());
        }
        Ok(state.insert_realm(realm).0)
    }

    async fn delete_realm(&self, realm: &Realm) -> Result<()> {
        self.enter("delete_realm", &realm.name)?;
        let mut state = self.write()?;
        let doc = state
            .realms
            .remove(&realm.name)
            .ok_or(Error::NotFound(ResourceKind::Realm))?;
        state.cgroups.remove(&cgroup_path(ResourceRef::Realm(&doc)));
        state.namespaces.remove(&doc.namespace);
        Ok(())
    }

    async fn purge_realm(&self, realm: &Realm) -> Result<()> {
        self.enter("purge_realm", &realm.name)?;
        let mut state = self.write()?;
        let name = realm.name.clone();
        state.realms.remove(&name);
        state.namespaces.remove(realm.effective_namespace());
        state.spaces.retain(|(r, _), _| r != &name);
        state.networks.retain(|(r, _)| r != &name);
        state.stacks.retain(|(r, _, _), _| r != &name);
        state.cells.retain(|(r, _, _, _), _| r != &name);
        state.remove_runtime_under(&name);
        Ok(())
    }

    async fn exists_realm_namespace(&self, namespace: &str) -> Result<bool> {
        self.enter("exists_realm_namespace", namespace)?;
        Ok(self.read()?.namespaces.contains(namespace))
    }

    // =========================================================================
    // Space
    // =========================================================================

    async fn get_space(&self, lookup: &Space) -> Result<Space> {
        self.enter("get_space", &lookup.path())?;
        self.read()?
            .spaces
            .get(&space_key(lookup))
            .cloned()
            .ok_or(Error::NotFound(ResourceKind::Space))
    }

    async fn list_spaces(&self, realm: &str) -> Result<Vec<Space>> {
        self.enter("list_spaces", realm)?;
        Ok(self
            .read()?
            .spaces
            .values()
            .filter(|s| matches(realm, &s.realm))
            .cloned()
            .collect())
    }

    async fn create_space(&self, space: &Space) -> Result<Space> {
        self.enter("create_space", &space.path())?;
        self.write()?.insert_space(space)
    }

    async fn ensure_space(&self, space: &Space) -> Result<Space> {
        self.enter("ensure_space", &space.path())?;
        self.write()?.insert_space(space)
    }

    async fn delete_space(&self, space: &Space) -> Result<()> {
        self.enter("delete_space", &space.path())?;
        let mut state = self.write()?;
        let doc = state
            .spaces
            .remove(&space_key(space))
            .ok_or(Error::NotFound(ResourceKind::Space))?;
        state.cgroups.remove(&cgroup_path(ResourceRef::Space(&doc)));
        state.networks.remove(&space_key(&doc));
        Ok(())
    }

    async fn purge_space(&self, space: &Space) -> Result<()> {
        self.enter("purge_space", &space.path())?;
        let mut state = self.write()?;
        let (realm, name) = space_key(space);
        state.spaces.remove(&(realm.clone(), name.clone()));
        state.networks.remove(&(realm.clone(), name.clone()));
        state.stacks.retain(|(r, s, _), _| !(r == &realm && s == &name));
        state
            .cells
            .retain(|(r, s, _, _), _| !(r == &realm && s == &name));
        state.remove_runtime_under(&space.path());
        Ok(())
    }

    async fn exists_space_network(&self, space: &Space) -> Result<bool> {
        self.enter("exists_space_network", &space.path())?;
        Ok(self.read()?.networks.contains(&space_key(space)))
    }

    // =========================================================================
    // Stack
    // =========================================================================

    async fn get_stack(&self, lookup: &Stack) -> Result<Stack> {
        self.enter("get_stack", &lookup.path())?;
        self.read()?
            .stacks
            .get(&stack_key(lookup))
            .cloned()
            .ok_or(Error::NotFound(ResourceKind::Stack))
    }

    async fn list_stacks(&self, realm: &str, space: &str) -> Result<Vec<Stack>> {
        self.enter("list_stacks", &format!("{realm}/{space}"))?;
        Ok(self
            .read()?
            .stacks
            .values()
            .filter(|s| matches(realm, &s.realm) && matches(space, &s.space))
            .cloned()
            .collect())
    }

    async fn create_stack(&self, stack: &Stack) -> Result<Stack> {
        self.enter("create_stack", &stack.path())?;
        self.write()?.insert_stack(stack)
    }

    async fn ensure_stack(&self, stack: &Stack) -> Result<Stack> {
        self.enter("ensure_stack", &stack.path())?;
        self.write()?.insert_stack(stack)
    }

    async fn delete_stack(&self, stack: &Stack) -> Result<()> {
        self.enter("delete_stack", &stack.path())?;
        let mut state = self.write()?;
        let doc = state
            .stacks
            .remove(&stack_key(stack))
            .ok_or(Error::NotFound(ResourceKind::Stack))?;
        state.cgroups.remove(&cgroup_path(ResourceRef::Stack(&doc)));
        Ok(())
    }

    async fn purge_stack(&self, stack: &Stack) -> Result<()> {
        self.enter("purge_stack", &stack.path())?;
        let mut state = self.write()?;
        let (realm, space, name) = stack_key(stack);
        state
            .stacks
            .remove(&(realm.clone(), space.clone(), name.clone()));
        state
            .cells
            .retain(|(r, s, t, _), _| !(r == &realm && s == &space && t == &name));
        state.remove_runtime_under(&stack.path());
        Ok(())
    }

    // =========================================================================
    // Cell
    // =========================================================================

    async fn get_cell(&self, lookup: &Cell) -> Result<Cell> {
        self.enter("get_cell", &lookup.path())?;
        self.read()?.stored_cell(lookup).cloned()
    }

    async fn list_cells(&self, realm: &str, space: &str, stack: &str) -> Result<Vec<Cell>> {
        self.enter("list_cells", &format!("{realm}/{space}/{stack}"))?;
        Ok(self
            .read()?
            .cells
            .values()
            .filter(|c| {
                matches(realm, &c.realm) && matches(space, &c.space) && matches(stack, &c.stack)
            })
            .cloned()
            .collect())
    }

    async fn create_cell(&self, cell: &Cell) -> Result<Cell> {
        self.enter("create_cell", &cell.path())?;
        self.write()?.insert_cell(cell)
    }

    async fn ensure_cell(&self, cell: &Cell) -> Result<Cell> {
        self.enter("ensure_cell", &cell.path())?;
        self.write()?.insert_cell(cell)
    }

    async fn start_cell(&self, cell: &Cell) -> Result<()> {
        self.enter("start_cell", &cell.path())?;
        self.write()?
            .set_cell_tasks(cell, ContainerState::Running, ContainerState::Running)
    }

    async fn stop_cell(&self, cell: &Cell) -> Result<()> {
        self.enter("stop_cell", &cell.path())?;
        self.write()?
            .set_cell_tasks(cell, ContainerState::Stopped, ContainerState::Stopped)
    }

    async fn kill_cell(&self, cell: &Cell) -> Result<()> {
        self.enter("kill_cell", &cell.path())?;
        self.write()?
            .set_cell_tasks(cell, ContainerState::Stopped, ContainerState::Stopped)
    }

    async fn delete_cell(&self, cell: &Cell) -> Result<()> {
        self.enter("delete_cell", &cell.path())?;
        let mut state = self.write()?;
        let doc = state
            .cells
            .remove(&cell_key(cell))
            .ok_or(Error::NotFound(ResourceKind::Cell))?;
        state.remove_runtime_under(&doc.path());
        Ok(())
    }

    async fn purge_cell(&self, cell: &Cell) -> Result<()> {
        self.enter("purge_cell", &cell.path())?;
        let mut state = self.write()?;
        state.cells.remove(&cell_key(cell));
        state.remove_runtime_under(&cell.path());
        Ok(())
    }

    async fn update_cell_metadata(&self, cell: &Cell) -> Result<()> {
        self.enter("update_cell_metadata", &cell.path())?;
        let mut state = self.write()?;
        let stored = state
            .cells
            .get_mut(&cell_key(cell))
            .ok_or(Error::NotFound(ResourceKind::Cell))?;
        *stored = cell.clone();
        Ok(())
    }

    async fn exists_cell_root_container(&self, cell: &Cell) -> Result<bool> {
        self.enter("exists_cell_root_container", &cell.path())?;
        Ok(self.read()?.roots.contains_key(&cell.path()))
    }

    // =========================================================================
    // Container
    // =========================================================================

    async fn create_container(&self, cell: &Cell, spec: &ContainerSpec) -> Result<Cell> {
        self.enter("create_container", &spec.path())?;
        let mut state = self.write()?;
        let stored = state
            .cells
            .get_mut(&cell_key(cell))
            .ok_or(Error::NotFound(ResourceKind::Cell))?;
        stored.upsert_container(spec.clone());
        let updated = stored.clone();
        state
            .tasks
            .entry(spec.path())
            .or_insert(ContainerState::Created);
        Ok(updated)
    }

    async fn start_container(&self, cell: &Cell, id: &str) -> Result<()> {
        self.enter("start_container", &format!("{}/{}", cell.path(), id))?;
        let mut state = self.write()?;
        let root = state.roots.get(&cell.path()).copied();
        if root != Some(ContainerState::Running) {
            return Err(Error::Runtime(format!(
                "root container of cell {} is not running",
                cell.path()
            )));
        }
        state.set_task(cell, id, ContainerState::Running)
    }

    async fn stop_container(&self, cell: &Cell, id: &str) -> Result<()> {
        self.enter("stop_container", &format!("{}/{}", cell.path(), id))?;
        self.write()?.set_task(cell, id, ContainerState::Stopped)
    }

    async fn kill_container(&self, cell: &Cell, id: &str) -> Result<()> {
        self.enter("kill_container", &format!("{}/{}", cell.path(), id))?;
        self.write()?.set_task(cell, id, ContainerState::Stopped)
    }

    async fn delete_container(&self, cell: &Cell, id: &str) -> Result<()> {
        let path = format!("{}/{}", cell.path(), id);
        self.enter("delete_container", &path)?;
        self.write()?.tasks.remove(&path);
        Ok(())
    }

    async fn get_container_state(&self, cell: &Cell, id: &str) -> Result<ContainerState> {
        let path = format!("{}/{}", cell.path(), id);
        self.enter("get_container_state", &path)?;
        self.read()?
            .tasks
            .get(&path)
            .copied()
            .ok_or(Error::NotFound(ResourceKind::Container))
    }

    // =========================================================================
    // Utilities
    // =========================================================================

    async fn exists_cgroup(&self, resource: ResourceRef<'_>) -> Result<bool> {
        let path = cgroup_path(resource);
        self.enter("exists_cgroup", &path)?;
        Ok(self.read()?.cgroups.contains(&path))
    }

    async fn ensure_network_defaults(&self) -> Result<()> {
        self.enter("ensure_network_defaults", "")?;
        self.write()?.network_defaults = true;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.enter("close", "")
    }
}
