//! The store: single owner of confirmed state and the pending queue.
//!
//! All state transitions funnel through `&mut self` methods, so no two
//! patches can ever interleave mid-application. `dispatch` runs
//! synchronously — it mints ids, builds the optimistic patch, enqueues
//! it, and hands back the `ApiCall` for the caller's transport — so
//! the projected result is visible before any network activity.
//! Responses come back later, in any order, through `apply_delta` and
//! `rollback`.
//!
//! There is no cancellation: once dispatched, a mutation leaves the
//! queue only via a matching delta or a rejection. A caller that loses
//! interest (an unmounted view) simply stops looking; the mutation
//! still reconciles against shared state.

use crate::api::ApiCall;
use crate::delta::Delta;
use crate::error::{ConflictReason, RequestError};
use crate::naming::{next_copy_name, next_numbered_name};
use crate::patch::StatePatch;
use crate::project::project;
use crate::queue::{MutationId, PendingQueue};
use crate::report::materialize_report;
use crate::slug::SlugFactory;
use crate::state::{Block, EditorState, StepId};
use std::collections::HashMap;
use tracing::{debug, warn};

/// One user intent, as the UI layer expresses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    AddBlock { position: usize, block: Block },
    DeleteBlock { slug: String },
    ReorderBlocks { slugs: Vec<String> },
    SetBlockMarkdown { slug: String, markdown: String },
    /// Create "{prefix} N" for the smallest safe N (counting pending
    /// tabs), appended after the last tab.
    CreateTab { prefix: String },
    /// Copy a tab, named "{source} (n)", inserted right after its
    /// source — mimicking where the server will put it.
    DuplicateTab { slug: String },
    DeleteTab { slug: String },
    SetTabName { slug: String, name: String },
    SetTabOrder { slugs: Vec<String> },
    ReorderSteps { tab_slug: String, slugs: Vec<String> },
    /// Local selection change; fire-and-forget on the wire.
    SelectTab { slug: String },
    /// Toggle email-on-new-data; fire-and-forget on the wire.
    SetStepNotifications { step_id: StepId, enabled: bool },
}

/// The logical slot a mutation competes for. A rejection only surfaces
/// to the UI if its mutation is still the most recently issued one for
/// its slot — errors for superseded requests are stale news.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Block add/delete/reorder all contend for the report's shape.
    BlockList,
    BlockMarkdown(String),
    /// Tab create/duplicate/delete/reorder contend for the tab strip.
    TabList,
    TabName(String),
    StepOrder(String),
}

/// A surfaced, request-scoped failure for UI messaging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRequest {
    pub mutation_id: MutationId,
    pub slot: Slot,
    pub reason: ConflictReason,
}

/// Notification emitted to subscribers after each state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    MutationEnqueued { id: MutationId },
    DeltaApplied { mutation_id: Option<MutationId> },
    MutationRolledBack { id: MutationId, error: RequestError },
    /// A purely local transition (selection, notification toggle).
    LocalStateChanged,
}

type Subscriber = Box<dyn FnMut(&StoreEvent)>;

/// Owns [`EditorState`] and the [`PendingQueue`]; nothing else may
/// write either. Inject one store per editing session.
pub struct Store {
    confirmed: EditorState,
    queue: PendingQueue,
    slugs: SlugFactory,
    latest_by_slot: HashMap<Slot, MutationId>,
    last_failure: Option<FailedRequest>,
    subscribers: Vec<Subscriber>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("confirmed", &self.confirmed)
            .field("queue", &self.queue)
            .field("last_failure", &self.last_failure)
            .field("subscribers", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}

impl Store {
    /// A store over server-loaded state.
    #[must_use]
    pub fn new(confirmed: EditorState) -> Self {
        Self::with_slug_factory(confirmed, SlugFactory::new())
    }

    /// A store whose slug generation replays deterministically — for
    /// tests and simulation.
    #[must_use]
    pub fn with_slug_seed(confirmed: EditorState, seed: u64) -> Self {
        Self::with_slug_factory(confirmed, SlugFactory::with_seed(seed))
    }

    fn with_slug_factory(confirmed: EditorState, mut slugs: SlugFactory) -> Self {
        slugs.reserve(confirmed.tabs.keys().cloned());
        slugs.reserve(confirmed.blocks.keys().cloned());
        slugs.reserve(confirmed.steps.values().map(|step| step.slug.clone()));
        Self {
            confirmed,
            queue: PendingQueue::new(),
            slugs,
            latest_by_slot: HashMap::new(),
            last_failure: None,
            subscribers: Vec::new(),
        }
    }

    /// The last server-acknowledged state.
    #[must_use]
    pub const fn confirmed(&self) -> &EditorState {
        &self.confirmed
    }

    /// The in-flight mutations, in submission order.
    #[must_use]
    pub const fn pending(&self) -> &PendingQueue {
        &self.queue
    }

    /// The state the UI should render right now.
    #[must_use]
    pub fn project(&self) -> EditorState {
        project(&self.confirmed, &self.queue)
    }

    /// The most recent surfaced failure, if any.
    #[must_use]
    pub const fn last_failure(&self) -> Option<&FailedRequest> {
        self.last_failure.as_ref()
    }

    /// Consume the surfaced failure (the UI showed it).
    pub fn take_last_failure(&mut self) -> Option<FailedRequest> {
        self.last_failure.take()
    }

    /// Observe store transitions. Subscribers run synchronously after
    /// each transition completes — never mid-patch.
    pub fn subscribe(&mut self, subscriber: impl FnMut(&StoreEvent) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    // -----------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------

    /// Apply one user edit optimistically and return the request the
    /// transport must send.
    ///
    /// Returns `None` when the edit is a guarded no-op (deleting the
    /// last tab, selecting an unknown tab, toggling a missing step).
    pub fn dispatch(&mut self, edit: Edit) -> Option<ApiCall> {
        match edit {
            Edit::AddBlock { position, block } => self.dispatch_add_block(position, block),
            Edit::DeleteBlock { slug } => self.dispatch_delete_block(slug),
            Edit::ReorderBlocks { slugs } => self.dispatch_reorder_blocks(slugs),
            Edit::SetBlockMarkdown { slug, markdown } => {
                self.dispatch_set_block_markdown(slug, markdown)
            }
            Edit::CreateTab { prefix } => self.dispatch_create_tab(&prefix),
            Edit::DuplicateTab { slug } => self.dispatch_duplicate_tab(&slug),
            Edit::DeleteTab { slug } => self.dispatch_delete_tab(slug),
            Edit::SetTabName { slug, name } => self.dispatch_set_tab_name(slug, name),
            Edit::SetTabOrder { slugs } => self.dispatch_set_tab_order(slugs),
            Edit::ReorderSteps { tab_slug, slugs } => {
                self.dispatch_reorder_steps(tab_slug, slugs)
            }
            Edit::SelectTab { slug } => self.dispatch_select_tab(&slug),
            Edit::SetStepNotifications { step_id, enabled } => {
                self.dispatch_set_step_notifications(step_id, enabled)
            }
        }
    }

    fn dispatch_add_block(&mut self, position: usize, block: Block) -> Option<ApiCall> {
        let mutation_id = self.mint_mutation_id();
        let slug = self.slugs.generate("block-");
        let patch = self.report_patch(StatePatch::AddBlock {
            slug: slug.clone(),
            position,
            block: block.clone(),
        });
        self.enqueue(mutation_id.clone(), patch, Slot::BlockList);
        Some(ApiCall::AddBlock {
            slug,
            position,
            mutation_id,
            block,
        })
    }

    fn dispatch_delete_block(&mut self, slug: String) -> Option<ApiCall> {
        let mutation_id = self.mint_mutation_id();
        let patch = self.report_patch(StatePatch::DeleteBlock { slug: slug.clone() });
        self.enqueue(mutation_id.clone(), patch, Slot::BlockList);
        Some(ApiCall::DeleteBlock { slug, mutation_id })
    }

    fn dispatch_reorder_blocks(&mut self, slugs: Vec<String>) -> Option<ApiCall> {
        let mutation_id = self.mint_mutation_id();
        let patch = self.report_patch(StatePatch::ReorderBlocks {
            slugs: slugs.clone(),
        });
        self.enqueue(mutation_id.clone(), patch, Slot::BlockList);
        Some(ApiCall::ReorderBlocks { slugs, mutation_id })
    }

    fn dispatch_set_block_markdown(&mut self, slug: String, markdown: String) -> Option<ApiCall> {
        let mutation_id = self.mint_mutation_id();
        let patch = StatePatch::SetBlockMarkdown {
            slug: slug.clone(),
            markdown: markdown.clone(),
        };
        self.enqueue(
            mutation_id.clone(),
            patch,
            Slot::BlockMarkdown(slug.clone()),
        );
        Some(ApiCall::SetBlockMarkdown {
            slug,
            markdown,
            mutation_id,
        })
    }

    fn dispatch_create_tab(&mut self, prefix: &str) -> Option<ApiCall> {
        let optimistic = self.project();
        let name = next_numbered_name(
            prefix,
            optimistic.tabs.values().map(|tab| tab.name.as_str()),
        );
        let slug = self.slugs.generate("tab-");
        let mutation_id = self.mint_mutation_id();
        let patch = StatePatch::CreateTab {
            slug: slug.clone(),
            name: name.clone(),
            position: optimistic.workflow.tab_slugs.len(),
        };
        self.enqueue(mutation_id.clone(), patch, Slot::TabList);
        Some(ApiCall::CreateTab {
            slug,
            name,
            mutation_id,
        })
    }

    fn dispatch_duplicate_tab(&mut self, source_slug: &str) -> Option<ApiCall> {
        let optimistic = self.project();
        let source = optimistic.tabs.get(source_slug)?;
        let name = next_copy_name(
            &source.name,
            optimistic.tabs.values().map(|tab| tab.name.as_str()),
        );
        let position = optimistic.tab_position(source_slug)? + 1;
        let new_slug = self.slugs.generate("tab-");
        let mutation_id = self.mint_mutation_id();
        let patch = StatePatch::CreateTab {
            slug: new_slug.clone(),
            name: name.clone(),
            position,
        };
        self.enqueue(mutation_id.clone(), patch, Slot::TabList);
        Some(ApiCall::DuplicateTab {
            source_slug: source_slug.to_string(),
            new_slug,
            new_name: name,
            mutation_id,
        })
    }

    fn dispatch_delete_tab(&mut self, slug: String) -> Option<ApiCall> {
        let optimistic = self.project();
        if optimistic.workflow.tab_slugs.len() <= 1 {
            debug!(%slug, "refusing to delete the last tab");
            return None;
        }
        optimistic.tab_position(&slug)?;
        let mutation_id = self.mint_mutation_id();
        let patch = StatePatch::DeleteTab { slug: slug.clone() };
        self.enqueue(mutation_id.clone(), patch, Slot::TabList);
        Some(ApiCall::DeleteTab { slug, mutation_id })
    }

    fn dispatch_set_tab_name(&mut self, slug: String, name: String) -> Option<ApiCall> {
        let mutation_id = self.mint_mutation_id();
        let patch = StatePatch::SetTabName {
            slug: slug.clone(),
            name: name.clone(),
        };
        self.enqueue(mutation_id.clone(), patch, Slot::TabName(slug.clone()));
        Some(ApiCall::SetTabName {
            tab_slug: slug,
            name,
            mutation_id,
        })
    }

    fn dispatch_set_tab_order(&mut self, slugs: Vec<String>) -> Option<ApiCall> {
        let mutation_id = self.mint_mutation_id();
        let patch = StatePatch::SetTabOrder {
            slugs: slugs.clone(),
        };
        self.enqueue(mutation_id.clone(), patch, Slot::TabList);
        Some(ApiCall::SetTabOrder { slugs, mutation_id })
    }

    fn dispatch_reorder_steps(&mut self, tab_slug: String, slugs: Vec<String>) -> Option<ApiCall> {
        let optimistic = self.project();
        let step_ids: Vec<StepId> = slugs
            .iter()
            .filter_map(|slug| optimistic.step_by_slug(slug).map(|step| step.id))
            .collect();
        let mutation_id = self.mint_mutation_id();
        let patch = StatePatch::ReorderSteps {
            tab_slug: tab_slug.clone(),
            step_ids,
        };
        self.enqueue(
            mutation_id.clone(),
            patch,
            Slot::StepOrder(tab_slug.clone()),
        );
        Some(ApiCall::ReorderSteps {
            mutation_id,
            tab_slug,
            slugs,
        })
    }

    fn dispatch_select_tab(&mut self, slug: &str) -> Option<ApiCall> {
        // A click can race the delete that removed its target; ignore.
        let position = self.confirmed.tab_position(slug)?;
        if self.confirmed.workflow.selected_tab_position == Some(position) {
            return None; // avoid spurious requests and transitions
        }
        self.confirmed.workflow.selected_tab_position = Some(position);
        self.notify(&StoreEvent::LocalStateChanged);
        Some(ApiCall::SetSelectedTab {
            slug: slug.to_string(),
        })
    }

    fn dispatch_set_step_notifications(
        &mut self,
        step_id: StepId,
        enabled: bool,
    ) -> Option<ApiCall> {
        let step = self.confirmed.steps.get_mut(&step_id)?;
        step.notifications = enabled;
        self.notify(&StoreEvent::LocalStateChanged);
        Some(ApiCall::SetStepNotifications { step_id, enabled })
    }

    /// Wrap a report edit with the auto→custom conversion when the
    /// optimistic report is still derived. The conversion and the edit
    /// travel as one pending entry, so a rejection rolls both back
    /// atomically; and because the *optimistic* flag flips right here,
    /// a second edit issued before the first confirms patches the
    /// explicit list directly — materialization happens at most once.
    fn report_patch(&self, edit: StatePatch) -> StatePatch {
        let optimistic = self.project();
        if optimistic.workflow.has_custom_report {
            edit
        } else {
            StatePatch::Batch {
                patches: vec![materialize_report(&optimistic), edit],
            }
        }
    }

    fn mint_mutation_id(&mut self) -> MutationId {
        MutationId::new(self.slugs.generate("mutation-"))
    }

    fn enqueue(&mut self, id: MutationId, patch: StatePatch, slot: Slot) {
        debug!(%id, ?slot, "enqueueing optimistic mutation");
        self.queue.enqueue(id.clone(), patch);
        self.latest_by_slot.insert(slot, id.clone());
        self.notify(&StoreEvent::MutationEnqueued { id });
    }

    // -----------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------

    /// Merge a server delta into confirmed state and retire the
    /// matching pending mutation, if any.
    ///
    /// The merge happens *before* the dequeue so there is no frame in
    /// which the optimistic effect has vanished but the authoritative
    /// one has not yet appeared. Deltas with an unknown or absent
    /// mutation id (foreign pushes, stale confirmations) merge only.
    pub fn apply_delta(&mut self, delta: Delta) {
        self.reserve_delta_slugs(&delta);
        self.confirmed.merge_delta(&delta);
        let mutation_id = delta.mutation_id;
        if let Some(id) = &mutation_id {
            if self.queue.dequeue(id) {
                debug!(%id, "mutation confirmed");
                self.latest_by_slot.retain(|_, latest| latest != id);
            } else {
                debug!(%id, "delta for unknown mutation id; merged without dequeue");
            }
        }
        self.notify(&StoreEvent::DeltaApplied { mutation_id });
    }

    /// Drop a rejected mutation from the queue without touching
    /// confirmed state; the projection reverts by recomputation.
    ///
    /// Conflict rejections additionally surface on
    /// [`last_failure`](Self::last_failure) — but only when the failed
    /// mutation is still the most recently issued one for its slot;
    /// errors for superseded requests are discarded.
    pub fn rollback(&mut self, id: &MutationId, error: RequestError) {
        if !self.queue.dequeue(id) {
            debug!(%id, "rejection for unknown mutation id; ignoring");
            return;
        }

        match &error {
            RequestError::Transport(message) => {
                warn!(%id, %message, "mutation rolled back after transport failure");
            }
            RequestError::Conflict(reason) => {
                warn!(%id, %reason, "mutation rolled back after conflict");
                let slot = self
                    .latest_by_slot
                    .iter()
                    .find_map(|(slot, latest)| (latest == id).then(|| slot.clone()));
                if let Some(slot) = slot {
                    self.last_failure = Some(FailedRequest {
                        mutation_id: id.clone(),
                        slot,
                        reason: *reason,
                    });
                } else {
                    debug!(%id, "conflict for superseded request; not surfacing");
                }
            }
        }
        self.latest_by_slot.retain(|_, latest| latest != id);
        self.notify(&StoreEvent::MutationRolledBack {
            id: id.clone(),
            error,
        });
    }

    /// Keep the generator collision-free against slugs minted by other
    /// sessions and delivered via push.
    fn reserve_delta_slugs(&mut self, delta: &Delta) {
        self.slugs.reserve(delta.update_tabs.keys().cloned());
        self.slugs.reserve(delta.update_blocks.keys().cloned());
        self.slugs.reserve(
            delta
                .update_steps
                .values()
                .filter_map(|update| update.slug.clone()),
        );
    }

    fn notify(&mut self, event: &StoreEvent) {
        for subscriber in &mut self.subscribers {
            subscriber(event);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
