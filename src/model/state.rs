//! Per-document processing state.

use serde::{Deserialize, Serialize};

/// The lifecycle phase of a document inside the controller.
///
/// Documents move `Idle -> Loading -> {Ready | Error}` and return to
/// `Loading` on the next switch or refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum DocumentPhase {
    /// Never processed, or cleared by `disable`.
    Idle,
    /// A switch or refresh is in flight.
    Loading,
    /// Figures extracted and styles applied.
    Ready,
    /// The last attempt failed; the message describes why.
    Error {
        /// Human-readable failure description.
        message: String,
    },
}

impl DocumentPhase {
    /// Whether work for the document is currently in flight.
    pub fn is_loading(&self) -> bool {
        matches!(self, DocumentPhase::Loading)
    }

    /// Whether the document reached a terminal success state.
    pub fn is_ready(&self) -> bool {
        matches!(self, DocumentPhase::Ready)
    }
}

impl Default for DocumentPhase {
    fn default() -> Self {
        DocumentPhase::Idle
    }
}
