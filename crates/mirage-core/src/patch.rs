//! Tagged-union state patches.
//!
//! Every optimistic edit is described by one `StatePatch` value — a
//! plain, serializable description of the transition, interpreted by a
//! single [`StatePatch::apply`] match. Patches are immutable once
//! enqueued and are replayed by the projector every time optimistic
//! state is computed, so `apply` must be deterministic.
//!
//! `apply` is total: a patch that references an entity missing from
//! the state leaves the state unchanged. That keeps replay safe when
//! an earlier pending mutation was rolled back out from under a later
//! one (the later patch simply finds nothing to edit).

use crate::state::{Block, EditorState, StepId, Tab};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One optimistic state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum StatePatch {
    /// Insert a block into the custom report at `position` (clamped).
    #[serde(rename_all = "camelCase")]
    AddBlock {
        slug: String,
        position: usize,
        block: Block,
    },
    /// Remove a block from the custom report.
    #[serde(rename_all = "camelCase")]
    DeleteBlock { slug: String },
    /// Replace the custom report's block order wholesale.
    #[serde(rename_all = "camelCase")]
    ReorderBlocks { slugs: Vec<String> },
    /// Rewrite the prose of an existing text block. No-op if the slug
    /// is missing or not a text block.
    #[serde(rename_all = "camelCase")]
    SetBlockMarkdown { slug: String, markdown: String },
    /// The one-way auto→custom report conversion: flip the flag and
    /// write the explicit equivalents of every derived block.
    #[serde(rename_all = "camelCase")]
    MaterializeReport {
        block_slugs: Vec<String>,
        blocks: BTreeMap<String, Block>,
    },
    /// Insert an empty named tab at `position` (clamped). Also the
    /// optimistic shape of a duplicate: the copy's steps arrive with
    /// the server's confirmation delta.
    #[serde(rename_all = "camelCase")]
    CreateTab {
        slug: String,
        name: String,
        position: usize,
    },
    /// Remove a tab, keeping the selection on a sensible neighbor.
    #[serde(rename_all = "camelCase")]
    DeleteTab { slug: String },
    #[serde(rename_all = "camelCase")]
    SetTabName { slug: String, name: String },
    /// Replace the tab order wholesale; the selection follows the
    /// previously selected tab to its new position.
    #[serde(rename_all = "camelCase")]
    SetTabOrder { slugs: Vec<String> },
    /// Replace one tab's step order.
    #[serde(rename_all = "camelCase")]
    ReorderSteps {
        tab_slug: String,
        step_ids: Vec<StepId>,
    },
    /// Several transitions travelling as one atomic pending entry
    /// (materialize + the edit that triggered it).
    Batch { patches: Vec<StatePatch> },
}

impl StatePatch {
    /// Apply this patch to `state` in place.
    pub fn apply(&self, state: &mut EditorState) {
        match self {
            Self::AddBlock {
                slug,
                position,
                block,
            } => {
                let at = (*position).min(state.workflow.block_slugs.len());
                state.workflow.block_slugs.insert(at, slug.clone());
                state.blocks.insert(slug.clone(), block.clone());
            }

            Self::DeleteBlock { slug } => {
                state.workflow.block_slugs.retain(|s| s != slug);
                state.blocks.remove(slug);
            }

            Self::ReorderBlocks { slugs } => {
                state.workflow.block_slugs.clone_from(slugs);
            }

            Self::SetBlockMarkdown { slug, markdown } => {
                if let Some(Block::Text { markdown: current }) = state.blocks.get_mut(slug) {
                    current.clone_from(markdown);
                }
            }

            Self::MaterializeReport {
                block_slugs,
                blocks,
            } => {
                state.workflow.has_custom_report = true;
                state.workflow.block_slugs.clone_from(block_slugs);
                for (slug, block) in blocks {
                    state.blocks.insert(slug.clone(), block.clone());
                }
            }

            Self::CreateTab {
                slug,
                name,
                position,
            } => {
                let at = (*position).min(state.workflow.tab_slugs.len());
                state.workflow.tab_slugs.insert(at, slug.clone());
                state.tabs.insert(slug.clone(), Tab::new(slug.clone(), name.clone()));
            }

            Self::DeleteTab { slug } => delete_tab(state, slug),

            Self::SetTabName { slug, name } => {
                if let Some(tab) = state.tabs.get_mut(slug) {
                    tab.name.clone_from(name);
                }
            }

            Self::SetTabOrder { slugs } => {
                let selected_slug = state
                    .workflow
                    .selected_tab_position
                    .and_then(|i| state.workflow.tab_slugs.get(i).cloned());
                state.workflow.tab_slugs.clone_from(slugs);
                state.workflow.selected_tab_position = selected_slug
                    .as_deref()
                    .and_then(|slug| state.tab_position(slug));
            }

            Self::ReorderSteps { tab_slug, step_ids } => {
                if let Some(tab) = state.tabs.get_mut(tab_slug) {
                    tab.step_ids.clone_from(step_ids);
                }
            }

            Self::Batch { patches } => {
                for patch in patches {
                    patch.apply(state);
                }
            }
        }
    }
}

/// Remove `slug` and keep the selection usable: deleting the selected
/// tab selects its left neighbor (or the new first tab when it was
/// leftmost); deleting a tab left of the selection shifts the
/// selection down with it.
fn delete_tab(state: &mut EditorState, slug: &str) {
    let Some(deleted) = state.tab_position(slug) else {
        return;
    };
    state.workflow.tab_slugs.remove(deleted);
    state.tabs.remove(slug);

    let remaining = state.workflow.tab_slugs.len();
    state.workflow.selected_tab_position =
        state.workflow.selected_tab_position.and_then(|selected| {
            if remaining == 0 {
                None
            } else if selected == deleted {
                Some(deleted.saturating_sub(1).min(remaining - 1))
            } else if selected > deleted {
                Some((selected - 1).min(remaining - 1))
            } else {
                Some(selected.min(remaining - 1))
            }
        });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
