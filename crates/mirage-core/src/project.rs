//! The optimistic state projector.
//!
//! Optimistic state is never stored: it is always recomputed as
//! confirmed state with every still-pending patch folded in, so the UI
//! can never observe a half-applied edit.

use crate::queue::PendingQueue;
use crate::state::EditorState;

/// Fold the queue's patches over `confirmed` in submission order.
///
/// Submission order matters even though dequeue is by id: a later
/// pending patch may edit a structure an earlier pending patch
/// introduced (set-markdown on a block whose add is itself still in
/// flight). Pure — identical inputs yield identical output, so callers
/// may memoize on `(confirmed, queue)` identity.
#[must_use]
pub fn project(confirmed: &EditorState, queue: &PendingQueue) -> EditorState {
    let mut state = confirmed.clone();
    for pending in queue {
        pending.patch.apply(&mut state);
    }
    state
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::StatePatch;
    use crate::state::Block;

    fn add_block(slug: &str) -> StatePatch {
        StatePatch::AddBlock {
            slug: slug.into(),
            position: 0,
            block: Block::Text {
                markdown: "draft".into(),
            },
        }
    }

    fn set_markdown(slug: &str, markdown: &str) -> StatePatch {
        StatePatch::SetBlockMarkdown {
            slug: slug.into(),
            markdown: markdown.into(),
        }
    }

    fn custom_report_state() -> EditorState {
        let mut state = EditorState::default();
        state.workflow.has_custom_report = true;
        state
    }

    #[test]
    fn empty_queue_projects_confirmed_state() {
        let confirmed = custom_report_state();
        let queue = PendingQueue::new();
        assert_eq!(project(&confirmed, &queue), confirmed);
    }

    #[test]
    fn projection_is_deterministic() {
        let confirmed = custom_report_state();
        let mut queue = PendingQueue::new();
        queue.enqueue("mutation-1".into(), add_block("block-x"));
        queue.enqueue("mutation-2".into(), set_markdown("block-x", "edited"));

        assert_eq!(project(&confirmed, &queue), project(&confirmed, &queue));
    }

    #[test]
    fn later_patches_see_earlier_pending_structures() {
        // Mutation A adds block X, mutation B edits X. B's edit must
        // land even though X exists only optimistically.
        let confirmed = custom_report_state();
        let mut queue = PendingQueue::new();
        queue.enqueue("mutation-a".into(), add_block("block-x"));
        queue.enqueue("mutation-b".into(), set_markdown("block-x", "edited"));

        let projected = project(&confirmed, &queue);
        assert_eq!(
            projected.blocks.get("block-x"),
            Some(&Block::Text {
                markdown: "edited".into()
            })
        );
    }

    #[test]
    fn reversed_submission_order_loses_the_dependent_edit() {
        // Same two patches, enqueued the other way round: the edit
        // runs before the block exists and no-ops, proving patches
        // apply in submission order rather than resolution order.
        let confirmed = custom_report_state();
        let mut queue = PendingQueue::new();
        queue.enqueue("mutation-b".into(), set_markdown("block-x", "edited"));
        queue.enqueue("mutation-a".into(), add_block("block-x"));

        let projected = project(&confirmed, &queue);
        assert_eq!(
            projected.blocks.get("block-x"),
            Some(&Block::Text {
                markdown: "draft".into()
            })
        );
    }

    #[test]
    fn projecting_never_mutates_inputs() {
        let confirmed = custom_report_state();
        let confirmed_before = confirmed.clone();
        let mut queue = PendingQueue::new();
        queue.enqueue("mutation-1".into(), add_block("block-x"));
        let queue_before = queue.clone();

        let _ = project(&confirmed, &queue);
        assert_eq!(confirmed, confirmed_before);
        assert_eq!(queue, queue_before);
    }
}
