//! The transport boundary.
//!
//! The store never talks to the network. `Store::dispatch` returns an
//! `ApiCall` — a serializable message naming the verb and its
//! arguments — and the caller's transport delivers it however it
//! likes. Every verb that participates in the optimistic queue carries
//! the caller-minted mutation id so the eventual confirmation delta or
//! rejection can be correlated; the two fire-and-forget verbs carry
//! none.

use crate::queue::MutationId;
use crate::state::{Block, StepId};
use serde::{Deserialize, Serialize};

/// One request for the external transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verb", rename_all = "camelCase")]
pub enum ApiCall {
    #[serde(rename_all = "camelCase")]
    AddBlock {
        slug: String,
        position: usize,
        mutation_id: MutationId,
        #[serde(flatten)]
        block: Block,
    },
    #[serde(rename_all = "camelCase")]
    DeleteBlock { slug: String, mutation_id: MutationId },
    #[serde(rename_all = "camelCase")]
    ReorderBlocks {
        slugs: Vec<String>,
        mutation_id: MutationId,
    },
    #[serde(rename_all = "camelCase")]
    SetBlockMarkdown {
        slug: String,
        markdown: String,
        mutation_id: MutationId,
    },
    #[serde(rename_all = "camelCase")]
    ReorderSteps {
        mutation_id: MutationId,
        tab_slug: String,
        slugs: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    SetTabName {
        tab_slug: String,
        name: String,
        mutation_id: MutationId,
    },
    #[serde(rename_all = "camelCase")]
    SetTabOrder {
        slugs: Vec<String>,
        mutation_id: MutationId,
    },
    #[serde(rename_all = "camelCase")]
    CreateTab {
        slug: String,
        name: String,
        mutation_id: MutationId,
    },
    #[serde(rename_all = "camelCase")]
    DuplicateTab {
        source_slug: String,
        new_slug: String,
        new_name: String,
        mutation_id: MutationId,
    },
    #[serde(rename_all = "camelCase")]
    DeleteTab { slug: String, mutation_id: MutationId },
    /// Fire-and-forget; not an optimistic-queue mutation.
    #[serde(rename_all = "camelCase")]
    SetSelectedTab { slug: String },
    /// Fire-and-forget; not an optimistic-queue mutation.
    #[serde(rename_all = "camelCase")]
    SetStepNotifications { step_id: StepId, enabled: bool },
}

impl ApiCall {
    /// The mutation id this call carries, if it participates in the
    /// optimistic queue.
    #[must_use]
    pub const fn mutation_id(&self) -> Option<&MutationId> {
        match self {
            Self::AddBlock { mutation_id, .. }
            | Self::DeleteBlock { mutation_id, .. }
            | Self::ReorderBlocks { mutation_id, .. }
            | Self::SetBlockMarkdown { mutation_id, .. }
            | Self::ReorderSteps { mutation_id, .. }
            | Self::SetTabName { mutation_id, .. }
            | Self::SetTabOrder { mutation_id, .. }
            | Self::CreateTab { mutation_id, .. }
            | Self::DuplicateTab { mutation_id, .. }
            | Self::DeleteTab { mutation_id, .. } => Some(mutation_id),
            Self::SetSelectedTab { .. } | Self::SetStepNotifications { .. } => None,
        }
    }

    /// The wire verb name.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::AddBlock { .. } => "addBlock",
            Self::DeleteBlock { .. } => "deleteBlock",
            Self::ReorderBlocks { .. } => "reorderBlocks",
            Self::SetBlockMarkdown { .. } => "setBlockMarkdown",
            Self::ReorderSteps { .. } => "reorderSteps",
            Self::SetTabName { .. } => "setTabName",
            Self::SetTabOrder { .. } => "setTabOrder",
            Self::CreateTab { .. } => "createTab",
            Self::DuplicateTab { .. } => "duplicateTab",
            Self::DeleteTab { .. } => "deleteTab",
            Self::SetSelectedTab { .. } => "setSelectedTab",
            Self::SetStepNotifications { .. } => "setStepNotifications",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
