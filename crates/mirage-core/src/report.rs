//! The derived vs. explicit report duality.
//!
//! Until someone edits it, the report has no storage of its own: it is
//! computed on the fly, one chart block per step whose module renders
//! embeddable output, in tab order. The first edit *materializes* that
//! projection — converts it, atomically and exactly once, into an
//! explicit `block_slugs` list plus concrete block records the edit
//! can then patch directly.

use crate::patch::StatePatch;
use crate::state::{Block, EditorState};

/// Prefix of the deterministic slugs minted for materialized derived
/// blocks. Deriving the slug from the source step keeps repeated
/// materializations of the same state byte-identical.
pub const AUTO_BLOCK_PREFIX: &str = "block-auto-";

/// One visible report entry: a slug and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportBlock {
    pub slug: String,
    pub block: Block,
}

/// The report as the UI sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportView {
    /// Derived from step output; read-only until materialized.
    Auto(Vec<ReportBlock>),
    /// The explicit, directly editable block list.
    Custom(Vec<ReportBlock>),
}

impl ReportView {
    /// The visible blocks, whichever way the report is represented.
    #[must_use]
    pub fn blocks(&self) -> &[ReportBlock] {
        match self {
            Self::Auto(blocks) | Self::Custom(blocks) => blocks,
        }
    }

    #[must_use]
    pub const fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

/// Compute the report for `state` (pass the *optimistic* state so
/// pending edits show).
#[must_use]
pub fn select_report(state: &EditorState) -> ReportView {
    if state.workflow.has_custom_report {
        let blocks = state
            .workflow
            .block_slugs
            .iter()
            .filter_map(|slug| {
                state.blocks.get(slug).map(|block| ReportBlock {
                    slug: slug.clone(),
                    block: block.clone(),
                })
            })
            .collect();
        ReportView::Custom(blocks)
    } else {
        ReportView::Auto(auto_report_blocks(state))
    }
}

/// The derived report: one chart block per embeddable step, walking
/// tabs in workflow order and steps in tab order.
fn auto_report_blocks(state: &EditorState) -> Vec<ReportBlock> {
    let mut blocks = Vec::new();
    for tab_slug in &state.workflow.tab_slugs {
        let Some(tab) = state.tabs.get(tab_slug) else {
            continue;
        };
        for step_id in &tab.step_ids {
            let Some(step) = state.steps.get(step_id) else {
                continue;
            };
            if step.has_html_output {
                blocks.push(ReportBlock {
                    slug: format!("{AUTO_BLOCK_PREFIX}{}", step.slug),
                    block: Block::Chart {
                        step_slug: step.slug.clone(),
                    },
                });
            }
        }
    }
    blocks
}

/// Build the base patch that converts the derived report into an
/// explicit one: flip the flag, keep every currently visible block
/// with its deterministic slug, preserve order.
///
/// The caller batches the triggering edit on top so both travel — and
/// roll back — as one pending entry. Must only be called while
/// `has_custom_report` is false; the conversion happens at most once
/// per false→true transition.
#[must_use]
pub fn materialize_report(state: &EditorState) -> StatePatch {
    let auto = auto_report_blocks(state);
    StatePatch::MaterializeReport {
        block_slugs: auto.iter().map(|rb| rb.slug.clone()).collect(),
        blocks: auto
            .into_iter()
            .map(|rb| (rb.slug, rb.block))
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Step, StepId, Tab};

    fn chart_step(id: u64, slug: &str, embeddable: bool) -> Step {
        Step {
            id: StepId(id),
            slug: slug.into(),
            module: "chart".into(),
            has_html_output: embeddable,
            notifications: false,
            is_busy: false,
            last_fetch_error: None,
        }
    }

    fn auto_state() -> EditorState {
        let mut state = EditorState::default();
        state.workflow.tab_slugs = vec!["tab-1".into(), "tab-2".into()];
        let mut tab1 = Tab::new("tab-1", "Tab 1");
        tab1.step_ids = vec![StepId(1), StepId(2)];
        let mut tab2 = Tab::new("tab-2", "Tab 2");
        tab2.step_ids = vec![StepId(3)];
        state.tabs.insert("tab-1".into(), tab1);
        state.tabs.insert("tab-2".into(), tab2);
        state.steps.insert(StepId(1), chart_step(1, "step-1", true));
        state.steps.insert(StepId(2), chart_step(2, "step-2", false));
        state.steps.insert(StepId(3), chart_step(3, "step-3", true));
        state
    }

    #[test]
    fn auto_report_lists_embeddable_steps_in_tab_order() {
        let view = select_report(&auto_state());
        assert!(!view.is_custom());
        let slugs: Vec<&str> = view.blocks().iter().map(|rb| rb.slug.as_str()).collect();
        assert_eq!(slugs, ["block-auto-step-1", "block-auto-step-3"]);
    }

    #[test]
    fn custom_report_follows_block_slugs() {
        let mut state = auto_state();
        state.workflow.has_custom_report = true;
        state.workflow.block_slugs = vec!["block-b".into(), "block-a".into()];
        state.blocks.insert(
            "block-a".into(),
            Block::Text {
                markdown: "a".into(),
            },
        );
        state.blocks.insert(
            "block-b".into(),
            Block::Text {
                markdown: "b".into(),
            },
        );

        let view = select_report(&state);
        assert!(view.is_custom());
        let slugs: Vec<&str> = view.blocks().iter().map(|rb| rb.slug.as_str()).collect();
        assert_eq!(slugs, ["block-b", "block-a"]);
    }

    #[test]
    fn materialization_preserves_the_visible_report() {
        let state = auto_state();
        let before = select_report(&state);

        let mut materialized = state.clone();
        materialize_report(&state).apply(&mut materialized);

        let after = select_report(&materialized);
        assert!(after.is_custom());
        assert_eq!(before.blocks(), after.blocks());
    }

    #[test]
    fn materialization_is_deterministic() {
        let state = auto_state();
        assert_eq!(materialize_report(&state), materialize_report(&state));
    }

    #[test]
    fn auto_report_skips_dangling_references() {
        let mut state = auto_state();
        state.tabs.get_mut("tab-1").unwrap().step_ids.push(StepId(99));
        state.workflow.tab_slugs.push("tab-ghost".into());

        let view = select_report(&state);
        assert_eq!(view.blocks().len(), 2);
    }
}
