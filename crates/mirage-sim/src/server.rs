//! The scripted server: a stand-in for the single serializing
//! authority the engine's design assumes.
//!
//! Calls are applied to the server's own state in issue order. Each
//! optimistic call is answered with either an authoritative delta
//! tagged with its mutation id, or a conflict rejection — injected by
//! the simulator, or produced organically when the call's view of an
//! entity is stale (it names a tab/block the server no longer has, or
//! a reorder lists a different membership than the server's).
//!
//! It is a test double, not a server implementation.

use mirage_core::report::{materialize_report, select_report};
use mirage_core::{
    ApiCall, Block, ConflictReason, Delta, EditorState, MutationId, RequestError, StatePatch,
    StepId, StepUpdate, TabUpdate, WorkflowUpdate,
};
use std::collections::{BTreeMap, BTreeSet};

use crate::rng::DeterministicRng;

/// The server's answer to one call.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerResponse {
    /// Applied; the delta is the authoritative result.
    Confirmed(Delta),
    /// Refused; nothing changed server-side.
    Rejected {
        mutation_id: MutationId,
        error: RequestError,
    },
    /// Fire-and-forget call; nothing to send back.
    Silent,
}

/// Scripted single-writer server model.
#[derive(Debug, Clone)]
pub struct ServerModel {
    state: EditorState,
    next_step_id: u64,
    renames: u64,
}

impl ServerModel {
    #[must_use]
    pub fn new(state: EditorState) -> Self {
        let next_step_id = state.steps.keys().map(|id| id.0).max().unwrap_or(0) + 1;
        Self {
            state,
            next_step_id,
            renames: 0,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &EditorState {
        &self.state
    }

    /// Process one call in issue order. `inject_conflict` forces a
    /// rejection without applying, simulating a stale-view refusal.
    #[allow(clippy::too_many_lines)]
    pub fn handle(&mut self, call: &ApiCall, inject_conflict: bool) -> ServerResponse {
        let Some(mutation_id) = call.mutation_id().cloned() else {
            self.handle_fire_and_forget(call);
            return ServerResponse::Silent;
        };
        if inject_conflict {
            return reject(mutation_id, ConflictReason::UpdatedAtMismatch);
        }

        match call.clone() {
            ApiCall::AddBlock {
                slug,
                position,
                block,
                ..
            } => {
                self.materialize_if_auto();
                StatePatch::AddBlock {
                    slug,
                    position,
                    block,
                }
                .apply(&mut self.state);
                self.report_delta(mutation_id, Vec::new())
            }

            ApiCall::DeleteBlock { slug, .. } => {
                self.materialize_if_auto();
                let existed = self.state.workflow.block_slugs.contains(&slug);
                StatePatch::DeleteBlock { slug: slug.clone() }.apply(&mut self.state);
                let cleared = if existed { vec![slug] } else { Vec::new() };
                self.report_delta(mutation_id, cleared)
            }

            ApiCall::ReorderBlocks { slugs, .. } => {
                let visible: BTreeSet<String> = select_report(&self.state)
                    .blocks()
                    .iter()
                    .map(|rb| rb.slug.clone())
                    .collect();
                let requested: BTreeSet<String> = slugs.iter().cloned().collect();
                if visible != requested {
                    return reject(mutation_id, ConflictReason::DeltaIdMismatch);
                }
                self.materialize_if_auto();
                StatePatch::ReorderBlocks { slugs }.apply(&mut self.state);
                self.report_delta(mutation_id, Vec::new())
            }

            ApiCall::SetBlockMarkdown { slug, markdown, .. } => {
                if !matches!(self.state.blocks.get(&slug), Some(Block::Text { .. })) {
                    return reject(mutation_id, ConflictReason::UpdatedAtMismatch);
                }
                StatePatch::SetBlockMarkdown {
                    slug: slug.clone(),
                    markdown: markdown.clone(),
                }
                .apply(&mut self.state);
                ServerResponse::Confirmed(Delta {
                    mutation_id: Some(mutation_id),
                    update_blocks: [(slug, Block::Text { markdown })].into_iter().collect(),
                    ..Delta::default()
                })
            }

            ApiCall::CreateTab { slug, name, .. } => {
                let position = self.state.workflow.tab_slugs.len();
                StatePatch::CreateTab {
                    slug: slug.clone(),
                    name: name.clone(),
                    position,
                }
                .apply(&mut self.state);
                ServerResponse::Confirmed(Delta {
                    mutation_id: Some(mutation_id),
                    update_workflow: Some(WorkflowUpdate {
                        tab_slugs: Some(self.state.workflow.tab_slugs.clone()),
                        ..WorkflowUpdate::default()
                    }),
                    update_tabs: [(
                        slug,
                        TabUpdate {
                            name: Some(name),
                            step_ids: Some(Vec::new()),
                        },
                    )]
                    .into_iter()
                    .collect(),
                    ..Delta::default()
                })
            }

            ApiCall::DuplicateTab {
                source_slug,
                new_slug,
                new_name,
                ..
            } => self.duplicate_tab(mutation_id, &source_slug, new_slug, new_name),

            ApiCall::DeleteTab { slug, .. } => {
                if self.state.workflow.tab_slugs.len() <= 1
                    || !self.state.tabs.contains_key(&slug)
                {
                    return reject(mutation_id, ConflictReason::UpdatedAtMismatch);
                }
                let step_ids = self.state.tabs[&slug].step_ids.clone();
                for id in &step_ids {
                    self.state.steps.remove(id);
                }
                StatePatch::DeleteTab { slug: slug.clone() }.apply(&mut self.state);
                ServerResponse::Confirmed(Delta {
                    mutation_id: Some(mutation_id),
                    update_workflow: Some(WorkflowUpdate {
                        tab_slugs: Some(self.state.workflow.tab_slugs.clone()),
                        ..WorkflowUpdate::default()
                    }),
                    clear_tab_slugs: vec![slug],
                    clear_step_ids: step_ids,
                    ..Delta::default()
                })
            }

            ApiCall::SetTabName { tab_slug, name, .. } => {
                if !self.state.tabs.contains_key(&tab_slug) {
                    return reject(mutation_id, ConflictReason::UpdatedAtMismatch);
                }
                StatePatch::SetTabName {
                    slug: tab_slug.clone(),
                    name: name.clone(),
                }
                .apply(&mut self.state);
                ServerResponse::Confirmed(Delta {
                    mutation_id: Some(mutation_id),
                    update_tabs: [(
                        tab_slug,
                        TabUpdate {
                            name: Some(name),
                            step_ids: None,
                        },
                    )]
                    .into_iter()
                    .collect(),
                    ..Delta::default()
                })
            }

            ApiCall::SetTabOrder { slugs, .. } => {
                let current: BTreeSet<String> =
                    self.state.workflow.tab_slugs.iter().cloned().collect();
                let requested: BTreeSet<String> = slugs.iter().cloned().collect();
                if current != requested {
                    return reject(mutation_id, ConflictReason::DeltaIdMismatch);
                }
                StatePatch::SetTabOrder { slugs }.apply(&mut self.state);
                ServerResponse::Confirmed(Delta {
                    mutation_id: Some(mutation_id),
                    update_workflow: Some(WorkflowUpdate {
                        tab_slugs: Some(self.state.workflow.tab_slugs.clone()),
                        ..WorkflowUpdate::default()
                    }),
                    ..Delta::default()
                })
            }

            ApiCall::ReorderSteps {
                tab_slug, slugs, ..
            } => self.reorder_steps(mutation_id, &tab_slug, &slugs),

            ApiCall::SetSelectedTab { .. } | ApiCall::SetStepNotifications { .. } => {
                unreachable!("fire-and-forget calls carry no mutation id")
            }
        }
    }

    /// An edit made by "another session": mutate our own state and
    /// return the untagged push the other client's server would fan
    /// out to us.
    pub fn foreign_push(&mut self, rng: &mut DeterministicRng) -> Delta {
        let step_ids: Vec<StepId> = self.state.steps.keys().copied().collect();
        let delta = match rng.next_bounded(3) {
            1 if !step_ids.is_empty() => {
                let id = *rng.choose(&step_ids).unwrap_or(&step_ids[0]);
                let is_busy = !self.state.steps[&id].is_busy;
                Delta {
                    update_steps: [(
                        id,
                        StepUpdate {
                            is_busy: Some(is_busy),
                            ..StepUpdate::default()
                        },
                    )]
                    .into_iter()
                    .collect(),
                    ..Delta::default()
                }
            }
            2 if !step_ids.is_empty() => {
                let id = *rng.choose(&step_ids).unwrap_or(&step_ids[0]);
                Delta {
                    update_steps: [(
                        id,
                        StepUpdate {
                            last_fetch_error: Some("fetch failed upstream".into()),
                            ..StepUpdate::default()
                        },
                    )]
                    .into_iter()
                    .collect(),
                    ..Delta::default()
                }
            }
            _ => {
                self.renames += 1;
                Delta {
                    update_workflow: Some(WorkflowUpdate {
                        name: Some(format!("Workflow v{}", self.renames)),
                        ..WorkflowUpdate::default()
                    }),
                    ..Delta::default()
                }
            }
        };
        self.state.merge_delta(&delta);
        delta
    }

    fn handle_fire_and_forget(&mut self, call: &ApiCall) {
        match call {
            ApiCall::SetStepNotifications { step_id, enabled } => {
                if let Some(step) = self.state.steps.get_mut(step_id) {
                    step.notifications = *enabled;
                }
            }
            // Selection is client-owned; the server only remembers it
            // for the next page load, which the simulation never does.
            ApiCall::SetSelectedTab { .. } => {}
            _ => {}
        }
    }

    fn duplicate_tab(
        &mut self,
        mutation_id: MutationId,
        source_slug: &str,
        new_slug: String,
        new_name: String,
    ) -> ServerResponse {
        let Some(source) = self.state.tabs.get(source_slug).cloned() else {
            return reject(mutation_id, ConflictReason::UpdatedAtMismatch);
        };
        let Some(position) = self.state.tab_position(source_slug) else {
            return reject(mutation_id, ConflictReason::UpdatedAtMismatch);
        };

        let mut step_ids = Vec::new();
        let mut step_updates: BTreeMap<StepId, StepUpdate> = BTreeMap::new();
        for old_id in &source.step_ids {
            let Some(old) = self.state.steps.get(old_id).cloned() else {
                continue;
            };
            let id = StepId(self.next_step_id);
            self.next_step_id += 1;
            let mut copy = old;
            copy.id = id;
            copy.slug = format!("step-{}", id.0);
            step_updates.insert(
                id,
                StepUpdate {
                    slug: Some(copy.slug.clone()),
                    module: Some(copy.module.clone()),
                    has_html_output: Some(copy.has_html_output),
                    notifications: Some(copy.notifications),
                    is_busy: Some(copy.is_busy),
                    last_fetch_error: copy.last_fetch_error.clone(),
                },
            );
            self.state.steps.insert(id, copy);
            step_ids.push(id);
        }

        StatePatch::CreateTab {
            slug: new_slug.clone(),
            name: new_name.clone(),
            position: position + 1,
        }
        .apply(&mut self.state);
        if let Some(tab) = self.state.tabs.get_mut(&new_slug) {
            tab.step_ids.clone_from(&step_ids);
        }

        ServerResponse::Confirmed(Delta {
            mutation_id: Some(mutation_id),
            update_workflow: Some(WorkflowUpdate {
                tab_slugs: Some(self.state.workflow.tab_slugs.clone()),
                ..WorkflowUpdate::default()
            }),
            update_tabs: [(
                new_slug,
                TabUpdate {
                    name: Some(new_name),
                    step_ids: Some(step_ids),
                },
            )]
            .into_iter()
            .collect(),
            update_steps: step_updates,
            ..Delta::default()
        })
    }

    fn reorder_steps(
        &mut self,
        mutation_id: MutationId,
        tab_slug: &str,
        slugs: &[String],
    ) -> ServerResponse {
        let Some(tab) = self.state.tabs.get(tab_slug) else {
            return reject(mutation_id, ConflictReason::UpdatedAtMismatch);
        };
        let current: BTreeSet<String> = tab
            .step_ids
            .iter()
            .filter_map(|id| self.state.steps.get(id).map(|step| step.slug.clone()))
            .collect();
        let requested: BTreeSet<String> = slugs.iter().cloned().collect();
        if current != requested {
            return reject(mutation_id, ConflictReason::DeltaIdMismatch);
        }

        let step_ids: Vec<StepId> = slugs
            .iter()
            .filter_map(|slug| self.state.step_by_slug(slug).map(|step| step.id))
            .collect();
        StatePatch::ReorderSteps {
            tab_slug: tab_slug.to_string(),
            step_ids: step_ids.clone(),
        }
        .apply(&mut self.state);

        ServerResponse::Confirmed(Delta {
            mutation_id: Some(mutation_id),
            update_tabs: [(
                tab_slug.to_string(),
                TabUpdate {
                    name: None,
                    step_ids: Some(step_ids),
                },
            )]
            .into_iter()
            .collect(),
            ..Delta::default()
        })
    }

    fn materialize_if_auto(&mut self) {
        if !self.state.workflow.has_custom_report {
            materialize_report(&self.state).apply(&mut self.state);
        }
    }

    /// Confirmation for a report edit: the full authoritative block
    /// list and every live block record.
    fn report_delta(&self, mutation_id: MutationId, cleared: Vec<String>) -> ServerResponse {
        let update_blocks: BTreeMap<String, Block> = self
            .state
            .workflow
            .block_slugs
            .iter()
            .filter_map(|slug| {
                self.state
                    .blocks
                    .get(slug)
                    .map(|block| (slug.clone(), block.clone()))
            })
            .collect();
        ServerResponse::Confirmed(Delta {
            mutation_id: Some(mutation_id),
            update_workflow: Some(WorkflowUpdate {
                block_slugs: Some(self.state.workflow.block_slugs.clone()),
                has_custom_report: Some(self.state.workflow.has_custom_report),
                ..WorkflowUpdate::default()
            }),
            update_blocks,
            clear_block_slugs: cleared,
            ..Delta::default()
        })
    }
}

fn reject(mutation_id: MutationId, reason: ConflictReason) -> ServerResponse {
    ServerResponse::Rejected {
        mutation_id,
        error: RequestError::Conflict(reason),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
