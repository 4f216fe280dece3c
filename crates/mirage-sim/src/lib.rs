//! Deterministic simulation harness for mirage's reconciliation.
//!
//! The engine's concurrency contract is easy to state and hard to
//! trust: responses may arrive in any order relative to enqueue order,
//! rejections may duplicate, other sessions may push unsolicited
//! deltas — and the client must still converge on the server's truth
//! with an empty queue. The simulator drives a real [`Store`] through
//! seeded random interleavings of exactly those events and lets the
//! oracle judge the outcome.
//!
//! # Conventions
//!
//! - **Errors**: `anyhow::Result` in the campaign runner and binary.
//! - **Logging**: `tracing` macros; the binary installs the
//!   subscriber.

pub mod campaign;
pub mod oracle;
pub mod rng;
pub mod server;
pub mod wire;

pub use campaign::{CampaignConfig, CampaignResult, run_campaign};
pub use oracle::{ConvergenceOracle, InvariantViolation, OracleResult};
pub use rng::DeterministicRng;
pub use server::{ServerModel, ServerResponse};
pub use wire::{FaultConfig, ResponseWire, WireMessage};

use mirage_core::report::select_report;
use mirage_core::{Block, Edit, EditorState, Step, StepId, Store, Tab};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Parameters for one simulated editing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Seed for every random decision; same seed, same run.
    pub seed: u64,
    /// Rounds of user activity before the drain phase.
    pub rounds: u64,
    /// Percentage chance of dispatching an edit each round.
    pub edit_rate_percent: u8,
    /// Percentage of optimistic calls the server rejects as conflicts.
    pub conflict_rate_percent: u8,
    /// Percentage chance per round of a foreign-session push.
    pub foreign_push_rate_percent: u8,
    /// Wire fault injection.
    pub fault: FaultConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            rounds: 32,
            edit_rate_percent: 80,
            conflict_rate_percent: 10,
            foreign_push_rate_percent: 10,
            fault: FaultConfig::default(),
        }
    }
}

/// Counters collected across one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationStats {
    pub edits_dispatched: usize,
    pub confirmed: usize,
    pub rejected: usize,
    pub foreign_pushes: usize,
    pub messages_delivered: usize,
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationResult {
    pub stats: SimulationStats,
    pub oracle: OracleResult,
}

/// The editing session every simulation starts from: two tabs, three
/// steps (two of them embeddable), derived report.
#[must_use]
pub fn seed_state() -> EditorState {
    let mut state = EditorState::default();
    state.workflow.name = "Untitled workflow".into();
    state.workflow.tab_slugs = vec!["tab-1".into(), "tab-2".into()];

    let mut tab1 = Tab::new("tab-1", "Tab 1");
    tab1.step_ids = vec![StepId(1), StepId(2)];
    let mut tab2 = Tab::new("tab-2", "Tab 2");
    tab2.step_ids = vec![StepId(3)];
    state.tabs.insert("tab-1".into(), tab1);
    state.tabs.insert("tab-2".into(), tab2);

    for (id, module, embeddable) in [
        (1u64, "chart", true),
        (2, "filter", false),
        (3, "chart", true),
    ] {
        let mut step = Step::new(StepId(id));
        step.slug = format!("step-{id}");
        step.module = module.into();
        step.has_html_output = embeddable;
        state.steps.insert(StepId(id), step);
    }
    state
}

/// Drives one store / server / wire triple through a seeded session.
#[derive(Debug)]
pub struct Simulator {
    store: Store,
    server: ServerModel,
    wire: ResponseWire,
    rng: DeterministicRng,
    config: SimulationConfig,
    stats: SimulationStats,
    rename_counter: u64,
}

impl Simulator {
    #[must_use]
    pub fn new(config: SimulationConfig) -> Self {
        let state = seed_state();
        Self {
            store: Store::with_slug_seed(state.clone(), config.seed),
            server: ServerModel::new(state),
            wire: ResponseWire::new(config.fault),
            rng: DeterministicRng::new(config.seed),
            config,
            stats: SimulationStats::default(),
            rename_counter: 0,
        }
    }

    /// Run the session to quiescence and judge it.
    pub fn run(&mut self) -> SimulationResult {
        for round in 0..self.config.rounds {
            if self.rng.hit_rate_percent(self.config.edit_rate_percent) {
                if let Some(edit) = self.random_edit() {
                    self.dispatch(edit, round);
                }
            }
            if self.rng.hit_rate_percent(self.config.foreign_push_rate_percent) {
                let delta = self.server.foreign_push(&mut self.rng);
                self.wire.send_delta(delta, round, &mut self.rng);
                self.stats.foreign_pushes += 1;
            }
            self.deliver(round);
        }

        // Drain: no new activity, deliver whatever is still in flight.
        let mut round = self.config.rounds;
        while !self.wire.is_empty() {
            self.deliver(round);
            round += 1;
        }

        SimulationResult {
            stats: self.stats,
            oracle: ConvergenceOracle::check(&self.store, self.server.state()),
        }
    }

    fn dispatch(&mut self, edit: Edit, round: u64) {
        let Some(call) = self.store.dispatch(edit) else {
            return; // guarded no-op
        };
        self.stats.edits_dispatched += 1;

        let inject_conflict = call.mutation_id().is_some()
            && self.rng.hit_rate_percent(self.config.conflict_rate_percent);
        match self.server.handle(&call, inject_conflict) {
            ServerResponse::Confirmed(delta) => {
                self.stats.confirmed += 1;
                self.wire.send_delta(delta, round, &mut self.rng);
            }
            ServerResponse::Rejected { mutation_id, error } => {
                debug!(%mutation_id, %error, "server rejected call");
                self.stats.rejected += 1;
                self.wire
                    .send_rejection(mutation_id, error, round, &mut self.rng);
            }
            ServerResponse::Silent => {}
        }
    }

    fn deliver(&mut self, round: u64) {
        for message in self.wire.deliver_ready(round, &mut self.rng) {
            self.stats.messages_delivered += 1;
            match message {
                WireMessage::Delta(delta) => self.store.apply_delta(delta),
                WireMessage::Rejection { mutation_id, error } => {
                    self.store.rollback(&mutation_id, error);
                }
            }
        }
    }

    /// Pick an edit that makes sense against the current optimistic
    /// state; `None` when the chosen kind is inapplicable this round.
    #[allow(clippy::too_many_lines)]
    fn random_edit(&mut self) -> Option<Edit> {
        let optimistic = self.store.project();
        let report = select_report(&optimistic);
        let visible: Vec<String> = report
            .blocks()
            .iter()
            .map(|rb| rb.slug.clone())
            .collect();
        let tab_slugs = optimistic.workflow.tab_slugs.clone();

        match self.rng.next_bounded(12) {
            0 => {
                let position = self.rng.next_bounded(visible.len() as u64 + 1);
                Some(Edit::AddBlock {
                    position: usize::try_from(position).unwrap_or(0),
                    block: Block::Text {
                        markdown: format!("note {}", self.rng.next_bounded(1000)),
                    },
                })
            }
            1 => self.rng.choose(&visible).map(|slug| Edit::DeleteBlock {
                slug: slug.clone(),
            }),
            2 => {
                if visible.len() < 2 {
                    return None;
                }
                let mut slugs = visible;
                self.rng.shuffle(&mut slugs);
                Some(Edit::ReorderBlocks { slugs })
            }
            3 => {
                let text_blocks: Vec<String> = report
                    .blocks()
                    .iter()
                    .filter(|rb| matches!(rb.block, Block::Text { .. }))
                    .map(|rb| rb.slug.clone())
                    .collect();
                self.rng.choose(&text_blocks).map(|slug| {
                    Edit::SetBlockMarkdown {
                        slug: slug.clone(),
                        markdown: format!("edited {}", self.rng.next_bounded(1000)),
                    }
                })
            }
            4 => Some(Edit::CreateTab {
                prefix: "Tab".into(),
            }),
            5 => self.rng.choose(&tab_slugs).map(|slug| Edit::DuplicateTab {
                slug: slug.clone(),
            }),
            6 => {
                if tab_slugs.len() < 2 {
                    return None;
                }
                self.rng.choose(&tab_slugs).map(|slug| Edit::DeleteTab {
                    slug: slug.clone(),
                })
            }
            7 => self.rng.choose(&tab_slugs).map(|slug| {
                self.rename_counter += 1;
                Edit::SetTabName {
                    slug: slug.clone(),
                    name: format!("Renamed {}", self.rename_counter),
                }
            }),
            8 => {
                if tab_slugs.len() < 2 {
                    return None;
                }
                let mut slugs = tab_slugs;
                self.rng.shuffle(&mut slugs);
                Some(Edit::SetTabOrder { slugs })
            }
            9 => {
                let candidates: Vec<(String, Vec<String>)> = tab_slugs
                    .iter()
                    .filter_map(|slug| {
                        let tab = optimistic.tabs.get(slug)?;
                        let step_slugs: Vec<String> = tab
                            .step_ids
                            .iter()
                            .filter_map(|id| {
                                optimistic.steps.get(id).map(|step| step.slug.clone())
                            })
                            .collect();
                        (step_slugs.len() >= 2).then(|| (slug.clone(), step_slugs))
                    })
                    .collect();
                let (tab_slug, step_slugs) = self.rng.choose(&candidates)?.clone();
                let mut slugs = step_slugs;
                self.rng.shuffle(&mut slugs);
                Some(Edit::ReorderSteps { tab_slug, slugs })
            }
            10 => self.rng.choose(&tab_slugs).map(|slug| Edit::SelectTab {
                slug: slug.clone(),
            }),
            _ => {
                let step_ids: Vec<StepId> = optimistic.steps.keys().copied().collect();
                self.rng.choose(&step_ids).map(|&step_id| {
                    Edit::SetStepNotifications {
                        step_id,
                        enabled: self.rng.next_bounded(2) == 0,
                    }
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
