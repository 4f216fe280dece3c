//! mirage-core: optimistic mutation queue and delta reconciliation.
//!
//! The editor shows every edit's result immediately, before the server
//! confirms it, and still converges on a single server-defined truth.
//! The pieces:
//!
//! - [`slug`] — client-side identifier minting (no round trip needed)
//! - [`state`] — the typed editor-state model
//! - [`patch`] — the tagged-union describing one optimistic edit
//! - [`queue`] — the ordered list of in-flight mutations
//! - [`project`] — confirmed state + pending patches, folded in
//!   submission order
//! - [`delta`] — server-authoritative partial updates and their merge
//! - [`report`] — the derived (auto) vs. explicit (custom) report
//!   duality and the one-way materialization between them
//! - [`naming`] — collision-free numbered names ("Tab 6", "Sales (2)")
//! - [`store`] — the facade owning confirmed state and the queue
//!
//! # Conventions
//!
//! - **Errors**: library error types use `thiserror`; recoverable
//!   reconciliation noise (stale deltas, duplicate rejections) is
//!   absorbed and logged, never raised.
//! - **Logging**: `tracing` macros (`debug!`, `warn!`).

pub mod api;
pub mod delta;
pub mod error;
pub mod naming;
pub mod patch;
pub mod project;
pub mod queue;
pub mod report;
pub mod slug;
pub mod state;
pub mod store;

pub use api::ApiCall;
pub use delta::{Delta, StepUpdate, TabUpdate, WorkflowUpdate};
pub use error::{ConflictReason, RequestError};
pub use patch::StatePatch;
pub use project::project;
pub use queue::{MutationId, PendingMutation, PendingQueue};
pub use report::{ReportBlock, ReportView};
pub use slug::SlugFactory;
pub use state::{Block, EditorState, Step, StepId, Tab, Workflow};
pub use store::{Edit, FailedRequest, Slot, Store, StoreEvent};
