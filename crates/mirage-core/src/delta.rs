//! Server-authoritative deltas and their merge into confirmed state.
//!
//! A delta is a set of partial-entity updates and slug-list
//! replacements — never code. It arrives either as the confirmation of
//! one of our own mutations (tagged with the mutation id) or as an
//! unsolicited push caused by another session. Merge is a shallow,
//! keyed overlay per entity: `Option` fields overwrite when present,
//! block records are replaced whole (a block is a single-level
//! entity), and `clear*` lists remove keyed records — the server
//! always ships the new ordered slug lists alongside.
//!
//! Client-owned selection fields have no wire representation at all,
//! so a delta cannot clobber them.

use crate::queue::MutationId;
use crate::state::{Block, EditorState, Step, StepId, Tab};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Partial workflow-field update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_slugs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_slugs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_custom_report: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
}

/// Partial tab update, keyed by tab slug in the delta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TabUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_ids: Option<Vec<StepId>>,
}

/// Partial step update, keyed by step id in the delta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StepUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_html_output: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_busy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fetch_error: Option<String>,
}

/// One message from the push/confirmation channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Delta {
    /// Present when this delta confirms one of this session's own
    /// mutations; absent on foreign pushes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutation_id: Option<MutationId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_workflow: Option<WorkflowUpdate>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub update_tabs: BTreeMap<String, TabUpdate>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub update_steps: BTreeMap<StepId, StepUpdate>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub update_blocks: BTreeMap<String, Block>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub clear_tab_slugs: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub clear_block_slugs: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub clear_step_ids: Vec<StepId>,
}

impl EditorState {
    /// Overlay a delta onto this state. Updates apply before clears.
    ///
    /// Entities named by an `update*` map but absent from the state
    /// are created (that is how an optimistically created tab becomes
    /// real). Ids named by a `clear*` list but already absent are
    /// skipped — clears are idempotent.
    pub fn merge_delta(&mut self, delta: &Delta) {
        if let Some(update) = &delta.update_workflow {
            if let Some(name) = &update.name {
                self.workflow.name.clone_from(name);
            }
            if let Some(tab_slugs) = &update.tab_slugs {
                self.workflow.tab_slugs.clone_from(tab_slugs);
                // Selection is client-owned, but a shrinking list can
                // strand it past the end; keep it in range.
                let len = self.workflow.tab_slugs.len();
                self.workflow.selected_tab_position = self
                    .workflow
                    .selected_tab_position
                    .filter(|_| len > 0)
                    .map(|selected| selected.min(len - 1));
            }
            if let Some(block_slugs) = &update.block_slugs {
                self.workflow.block_slugs.clone_from(block_slugs);
            }
            if let Some(has_custom_report) = update.has_custom_report {
                self.workflow.has_custom_report = has_custom_report;
            }
            if let Some(public) = update.public {
                self.workflow.public = public;
            }
        }

        for (slug, update) in &delta.update_tabs {
            let tab = self
                .tabs
                .entry(slug.clone())
                .or_insert_with(|| Tab::new(slug.clone(), String::new()));
            if let Some(name) = &update.name {
                tab.name.clone_from(name);
            }
            if let Some(step_ids) = &update.step_ids {
                tab.step_ids.clone_from(step_ids);
            }
        }

        for (&id, update) in &delta.update_steps {
            let step = self.steps.entry(id).or_insert_with(|| Step::new(id));
            if let Some(slug) = &update.slug {
                step.slug.clone_from(slug);
            }
            if let Some(module) = &update.module {
                step.module.clone_from(module);
            }
            if let Some(has_html_output) = update.has_html_output {
                step.has_html_output = has_html_output;
            }
            if let Some(notifications) = update.notifications {
                step.notifications = notifications;
            }
            if let Some(is_busy) = update.is_busy {
                step.is_busy = is_busy;
            }
            if let Some(last_fetch_error) = &update.last_fetch_error {
                step.last_fetch_error = Some(last_fetch_error.clone());
            }
        }

        for (slug, block) in &delta.update_blocks {
            self.blocks.insert(slug.clone(), block.clone());
        }

        for slug in &delta.clear_tab_slugs {
            self.tabs.remove(slug);
        }
        for slug in &delta.clear_block_slugs {
            self.blocks.remove(slug);
        }
        for id in &delta.clear_step_ids {
            self.steps.remove(id);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overlays_only_present_workflow_fields() {
        let mut state = EditorState::default();
        state.workflow.name = "Untitled".into();
        state.workflow.tab_slugs = vec!["tab-1".into()];

        let delta = Delta {
            update_workflow: Some(WorkflowUpdate {
                name: Some("Quarterly".into()),
                ..WorkflowUpdate::default()
            }),
            ..Delta::default()
        };
        state.merge_delta(&delta);

        assert_eq!(state.workflow.name, "Quarterly");
        assert_eq!(state.workflow.tab_slugs, ["tab-1"]); // untouched
    }

    #[test]
    fn creates_missing_tabs_and_steps() {
        let mut state = EditorState::default();
        let delta = Delta {
            update_tabs: [(
                "tab-2".to_string(),
                TabUpdate {
                    name: Some("Tab 2".into()),
                    step_ids: Some(vec![StepId(9)]),
                },
            )]
            .into_iter()
            .collect(),
            update_steps: [(
                StepId(9),
                StepUpdate {
                    slug: Some("step-9".into()),
                    module: Some("chart".into()),
                    ..StepUpdate::default()
                },
            )]
            .into_iter()
            .collect(),
            ..Delta::default()
        };
        state.merge_delta(&delta);

        assert_eq!(state.tabs["tab-2"].name, "Tab 2");
        assert_eq!(state.tabs["tab-2"].step_ids, [StepId(9)]);
        assert_eq!(state.steps[&StepId(9)].slug, "step-9");
    }

    #[test]
    fn replaces_blocks_whole() {
        let mut state = EditorState::default();
        state.blocks.insert(
            "block-1".into(),
            Block::Text {
                markdown: "old".into(),
            },
        );

        let delta = Delta {
            update_blocks: [(
                "block-1".to_string(),
                Block::Chart {
                    step_slug: "step-1".into(),
                },
            )]
            .into_iter()
            .collect(),
            ..Delta::default()
        };
        state.merge_delta(&delta);

        assert_eq!(
            state.blocks["block-1"],
            Block::Chart {
                step_slug: "step-1".into()
            }
        );
    }

    #[test]
    fn clears_are_idempotent() {
        let mut state = EditorState::default();
        state.blocks.insert(
            "block-1".into(),
            Block::Text {
                markdown: "x".into(),
            },
        );

        let delta = Delta {
            clear_block_slugs: vec!["block-1".into(), "block-missing".into()],
            clear_step_ids: vec![StepId(4)],
            ..Delta::default()
        };
        state.merge_delta(&delta);
        let after_first = state.clone();
        state.merge_delta(&delta);

        assert_eq!(state, after_first);
        assert!(state.blocks.is_empty());
    }

    #[test]
    fn selection_survives_any_delta() {
        let mut state = EditorState::default();
        state.workflow.tab_slugs = vec!["tab-1".into(), "tab-2".into()];
        state.workflow.selected_tab_position = Some(1);

        let delta = Delta {
            update_workflow: Some(WorkflowUpdate {
                tab_slugs: Some(vec!["tab-2".into(), "tab-1".into()]),
                ..WorkflowUpdate::default()
            }),
            ..Delta::default()
        };
        state.merge_delta(&delta);

        assert_eq!(state.workflow.selected_tab_position, Some(1));
    }

    #[test]
    fn shrinking_tab_list_clamps_selection() {
        let mut state = EditorState::default();
        state.workflow.tab_slugs = vec!["tab-1".into(), "tab-2".into(), "tab-3".into()];
        state.workflow.selected_tab_position = Some(2);

        let delta = Delta {
            update_workflow: Some(WorkflowUpdate {
                tab_slugs: Some(vec!["tab-1".into()]),
                ..WorkflowUpdate::default()
            }),
            ..Delta::default()
        };
        state.merge_delta(&delta);

        assert_eq!(state.workflow.selected_tab_position, Some(0));
    }

    #[test]
    fn parses_the_wire_shape() {
        let wire = json!({
            "mutationId": "mutation-3",
            "updateWorkflow": {
                "blockSlugs": ["block-1", "block-3", "block-2"]
            },
            "updateBlocks": {
                "block-3": {"type": "text", "markdown": "new"}
            },
            "clearStepIds": [4]
        });
        let delta: Delta = serde_json::from_value(wire).unwrap();

        assert_eq!(delta.mutation_id, Some("mutation-3".into()));
        assert_eq!(
            delta
                .update_workflow
                .as_ref()
                .and_then(|u| u.block_slugs.as_deref()),
            Some(&["block-1".to_string(), "block-3".into(), "block-2".into()][..])
        );
        assert_eq!(delta.clear_step_ids, [StepId(4)]);
    }

    #[test]
    fn empty_sections_are_omitted_on_the_wire() {
        let delta = Delta {
            mutation_id: Some("mutation-1".into()),
            ..Delta::default()
        };
        let wire = serde_json::to_value(&delta).unwrap();
        assert_eq!(wire, json!({"mutationId": "mutation-1"}));
    }
}
