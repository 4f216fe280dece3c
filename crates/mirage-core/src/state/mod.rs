//! The typed editor-state model.
//!
//! One `EditorState` value is the *confirmed* state (last acknowledged
//! by the server, owned by the store, mutated only by the reconciler);
//! another is the *optimistic* projection recomputed on demand by
//! [`crate::project`]. The same type serves both roles — the
//! projection is just confirmed state with pending patches folded in.
//!
//! Selection fields (`selected_tab_position`,
//! `selected_step_position`) are client-owned: they never appear in
//! wire updates and the server cannot overwrite them.

pub mod block;

pub use block::Block;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Server-assigned numeric identifier of a pipeline step.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StepId(pub u64);

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Workflow-level scalar fields and ordered slug lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub name: String,
    /// Tab order. Every entry has (or will have, once a pending create
    /// confirms) a record in [`EditorState::tabs`].
    pub tab_slugs: Vec<String>,
    /// Report block order. Meaningful only when `has_custom_report`;
    /// the auto report is derived, not stored.
    pub block_slugs: Vec<String>,
    /// `false` → the report is derived from step output; `true` → the
    /// report is the explicit, directly editable `block_slugs` list.
    pub has_custom_report: bool,
    /// Client-owned; not on the wire.
    #[serde(skip)]
    pub selected_tab_position: Option<usize>,
    pub public: bool,
}

/// One tab: a named, ordered list of steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub slug: String,
    pub name: String,
    pub step_ids: Vec<StepId>,
    /// Client-owned; not on the wire.
    #[serde(skip)]
    pub selected_step_position: Option<usize>,
}

impl Tab {
    /// An empty tab, as created optimistically before the server
    /// confirms it.
    #[must_use]
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            step_ids: Vec::new(),
            selected_step_position: None,
        }
    }
}

/// One pipeline step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: StepId,
    pub slug: String,
    /// Module id-name this step runs ("chart", "filter", ...).
    pub module: String,
    /// Whether the module renders an embeddable output; such steps
    /// contribute a chart block to the derived report.
    pub has_html_output: bool,
    /// Email-on-new-data toggle.
    pub notifications: bool,
    pub is_busy: bool,
    pub last_fetch_error: Option<String>,
}

impl Step {
    /// A placeholder step record, filled in field-by-field by deltas.
    #[must_use]
    pub fn new(id: StepId) -> Self {
        Self {
            id,
            slug: String::new(),
            module: String::new(),
            has_html_output: false,
            notifications: false,
            is_busy: false,
            last_fetch_error: None,
        }
    }
}

/// The complete editor state: workflow scalars plus the three keyed
/// entity collections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorState {
    pub workflow: Workflow,
    pub tabs: BTreeMap<String, Tab>,
    pub steps: BTreeMap<StepId, Step>,
    pub blocks: BTreeMap<String, Block>,
}

impl EditorState {
    /// Look a step up by its slug (steps are keyed by id).
    #[must_use]
    pub fn step_by_slug(&self, slug: &str) -> Option<&Step> {
        self.steps.values().find(|step| step.slug == slug)
    }

    /// Position of a tab in the workflow's tab order.
    #[must_use]
    pub fn tab_position(&self, slug: &str) -> Option<usize> {
        self.workflow.tab_slugs.iter().position(|s| s == slug)
    }
}
