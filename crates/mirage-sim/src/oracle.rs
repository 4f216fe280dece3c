//! Convergence oracle.
//!
//! After the wire drains, exactly two things must hold:
//!
//! 1. The pending queue is empty — every mutation was confirmed or
//!    rolled back, none leaked.
//! 2. The client's confirmed state equals the server's state, modulo
//!    client-owned selection fields (which have no wire representation
//!    and legitimately differ).

use mirage_core::{EditorState, Store};

/// Oracle result for a finished simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleResult {
    /// `true` iff no violations were found.
    pub passed: bool,
    /// Detailed description of every violated invariant.
    pub violations: Vec<InvariantViolation>,
}

impl OracleResult {
    fn from_violations(violations: Vec<InvariantViolation>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }
}

/// Diagnostic for a single failed invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Mutations still pending after every response was delivered.
    QueueNotDrained { pending: Vec<String> },
    /// A section of confirmed state differs from the server's.
    StateDivergence { section: &'static str, detail: String },
}

/// Checks that a drained client converged on the server's truth.
pub struct ConvergenceOracle;

impl ConvergenceOracle {
    /// Run all checks.
    #[must_use]
    pub fn check(store: &Store, server: &EditorState) -> OracleResult {
        let mut violations = Vec::new();

        if !store.pending().is_empty() {
            violations.push(InvariantViolation::QueueNotDrained {
                pending: store
                    .pending()
                    .iter()
                    .map(|pending| pending.id.as_str().to_string())
                    .collect(),
            });
        }

        let client = normalized(store.confirmed());
        let server = normalized(server);

        if client.workflow != server.workflow {
            violations.push(InvariantViolation::StateDivergence {
                section: "workflow",
                detail: format!("client {:?} != server {:?}", client.workflow, server.workflow),
            });
        }
        if client.tabs != server.tabs {
            violations.push(InvariantViolation::StateDivergence {
                section: "tabs",
                detail: keyed_diff(
                    client.tabs.keys().map(String::as_str),
                    server.tabs.keys().map(String::as_str),
                ),
            });
        }
        if client.steps != server.steps {
            violations.push(InvariantViolation::StateDivergence {
                section: "steps",
                detail: format!(
                    "client has {} steps, server has {}",
                    client.steps.len(),
                    server.steps.len()
                ),
            });
        }
        if client.blocks != server.blocks {
            violations.push(InvariantViolation::StateDivergence {
                section: "blocks",
                detail: keyed_diff(
                    client.blocks.keys().map(String::as_str),
                    server.blocks.keys().map(String::as_str),
                ),
            });
        }

        OracleResult::from_violations(violations)
    }
}

/// Strip client-owned fields before comparison.
fn normalized(state: &EditorState) -> EditorState {
    let mut state = state.clone();
    state.workflow.selected_tab_position = None;
    for tab in state.tabs.values_mut() {
        tab.selected_step_position = None;
    }
    state
}

fn keyed_diff<'a>(
    client: impl Iterator<Item = &'a str>,
    server: impl Iterator<Item = &'a str>,
) -> String {
    use std::collections::BTreeSet;
    let client: BTreeSet<&str> = client.collect();
    let server: BTreeSet<&str> = server.collect();
    let only_client: Vec<&&str> = client.difference(&server).collect();
    let only_server: Vec<&&str> = server.difference(&client).collect();
    if only_client.is_empty() && only_server.is_empty() {
        "same keys, diverging values".to_string()
    } else {
        format!("only client: {only_client:?}; only server: {only_server:?}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed_state;
    use mirage_core::{Block, Edit};

    #[test]
    fn identical_states_pass() {
        let state = seed_state();
        let store = Store::with_slug_seed(state.clone(), 1);
        let result = ConvergenceOracle::check(&store, &state);
        assert!(result.passed, "violations: {:?}", result.violations);
    }

    #[test]
    fn selection_differences_are_normalized_away() {
        let state = seed_state();
        let mut store = Store::with_slug_seed(state.clone(), 1);
        let _ = store.dispatch(Edit::SelectTab {
            slug: "tab-2".into(),
        });
        let result = ConvergenceOracle::check(&store, &state);
        assert!(result.passed, "violations: {:?}", result.violations);
    }

    #[test]
    fn pending_mutations_fail_the_drain_check() {
        let state = seed_state();
        let mut store = Store::with_slug_seed(state.clone(), 1);
        let _ = store.dispatch(Edit::AddBlock {
            position: 0,
            block: Block::Text {
                markdown: "x".into(),
            },
        });
        let result = ConvergenceOracle::check(&store, &state);
        assert!(!result.passed);
        assert!(matches!(
            result.violations[0],
            InvariantViolation::QueueNotDrained { .. }
        ));
    }

    #[test]
    fn diverging_workflow_is_reported() {
        let state = seed_state();
        let store = Store::with_slug_seed(state.clone(), 1);
        let mut server = state;
        server.workflow.name = "Someone renamed me".into();
        let result = ConvergenceOracle::check(&store, &server);
        assert!(!result.passed);
        assert!(matches!(
            result.violations[0],
            InvariantViolation::StateDivergence {
                section: "workflow",
                ..
            }
        ));
    }
}
