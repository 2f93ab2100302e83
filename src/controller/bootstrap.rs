//! Bootstrap of the system hierarchy.
//!
//! ```text
//!   network defaults ──▶ system realm ──▶ default space ──▶ default stack ──▶ default cell
//!                        (+ namespace)    (+ network)
//! ```
//!
//! Every step uses the runner's `ensure_*` calls, so running bootstrap on an
//! already initialized host changes nothing and reports nothing created.

use super::{
    Controller, CreateCellResult, CreateRealmResult, CreateSpaceResult, CreateStackResult, cell,
    realm, space, stack, validate,
};
use crate::error::{Error, Op, PartialError, PartialResult, Result};
use crate::model::{Cell, Realm, Space, Stack};
use crate::runner::Runner;
use serde::Serialize;
use tracing::info;

/// What bootstrap found and did, step by step.
///
/// A step that did not run (because an earlier one failed) is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapReport {
    pub network_defaults_ready: bool,
    pub realm: Option<CreateRealmResult>,
    pub space: Option<CreateSpaceResult>,
    pub stack: Option<CreateStackResult>,
    pub cell: Option<CreateCellResult>,
}

impl BootstrapReport {
    #[must_use]
    pub fn realm_created(&self) -> bool {
        self.realm.as_ref().is_some_and(|r| r.created)
    }

    #[must_use]
    pub fn namespace_created(&self) -> bool {
        self.realm.as_ref().is_some_and(|r| r.namespace_created)
    }

    #[must_use]
    pub fn space_created(&self) -> bool {
        self.space.as_ref().is_some_and(|s| s.created)
    }

    #[must_use]
    pub fn space_network_created(&self) -> bool {
        self.space.as_ref().is_some_and(|s| s.network_created)
    }

    #[must_use]
    pub fn stack_created(&self) -> bool {
        self.stack.as_ref().is_some_and(|s| s.created)
    }

    #[must_use]
    pub fn cell_created(&self) -> bool {
        self.cell.as_ref().is_some_and(|c| c.created)
    }

    /// True if any step created something.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.realm_created()
            || self.namespace_created()
            || self.space_created()
            || self.space_network_created()
            || self.stack_created()
            || self.cell_created()
    }
}

async fn run(
    runner: &dyn Runner,
    docs: (Realm, Space, Stack, Cell),
    report: &mut BootstrapReport,
) -> Result<()> {
    let (realm_doc, space_doc, stack_doc, cell_doc) = docs;

    runner
        .ensure_network_defaults()
        .await
        .map_err(|e| Error::backend(Op::NetworkDefaults, e))?;
    report.network_defaults_ready = true;

    report.realm = Some(realm::provision(runner, &realm_doc, true).await?);
    report.space = Some(space::provision(runner, &space_doc, true).await?);
    report.stack = Some(stack::provision(runner, &stack_doc, true).await?);
    report.cell = Some(cell::provision(runner, &cell_doc, true).await?);
    Ok(())
}

impl Controller {
    /// Ensures the system realm and its default space, stack and cell exist.
    ///
    /// Safe to run repeatedly. On failure the remaining steps are skipped and
    /// the report of the completed ones is returned with the error.
    pub async fn bootstrap(&self) -> PartialResult<BootstrapReport> {
        let mut report = BootstrapReport::default();
        let docs = match self.bootstrap_docs() {
            Ok(docs) => docs,
            Err(e) => return Err(PartialError::new(report, e)),
        };

        let runner = self.session();
        if let Err(e) = run(&*runner, docs, &mut report).await {
            return Err(PartialError::new(report, e));
        }

        if report.changed() {
            let path = report.cell.as_ref().map(|c| c.cell.path()).unwrap_or_default();
            info!("Bootstrapped system hierarchy {}", path);
        } else {
            info!("Bootstrap found everything in place");
        }
        Ok(report)
    }

    fn bootstrap_docs(&self) -> Result<(Realm, Space, Stack, Cell)> {
        let config = self.config();
        let labels = config.bootstrap_labels();
        let (r, s, t, c) = (
            &config.system_realm,
            &config.default_space,
            &config.default_stack,
            &config.default_cell,
        );

        let realm_doc = Realm::new(r)
            .with_namespace(&config.system_namespace)
            .with_labels(labels.clone());
        Ok((
            validate::realm(&realm_doc)?,
            validate::space(&Space::new(r, s).with_labels(labels.clone()))?,
            validate::stack(&Stack::new(r, s, t).with_labels(labels.clone()))?,
            validate::cell(&Cell::new(r, s, t, c).with_labels(labels))?,
        ))
    }
}
