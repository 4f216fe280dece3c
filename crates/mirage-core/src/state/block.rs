//! Report block payloads.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One report block. The wire representation carries the kind in a
/// `type` field (`{"type": "chart", "stepSlug": "step-1"}`), which is
/// also the shape spread into an `addBlock` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Block {
    /// Free-form prose between embeds.
    Text { markdown: String },
    /// Embedded chart output of one pipeline step.
    #[serde(rename_all = "camelCase")]
    Chart { step_slug: String },
    /// Embedded output table of one tab.
    #[serde(rename_all = "camelCase")]
    Table { tab_slug: String },
}

impl Block {
    /// The wire name of this block's kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Chart { .. } => "chart",
            Self::Table { .. } => "table",
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text { markdown } => write!(f, "text: {markdown}"),
            Self::Chart { step_slug } => write!(f, "chart: {step_slug}"),
            Self::Table { tab_slug } => write!(f, "table: {tab_slug}"),
        }
    }
}
