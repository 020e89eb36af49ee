//! Document access client: the consumed capability contract.
//!
//! The editor, its storage and its network stack live outside this crate.
//! Everything the engine needs from them is expressed as the stateless
//! [`DocumentClient`] trait: raw document content, block attributes, and a
//! read-only structured query path. Implementations are request/response
//! only; retries and timeouts are the implementer's business.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One row of a structured query result, as column name to value.
pub type QueryRow = HashMap<String, String>;

/// Abstract access to documents and blocks.
///
/// All methods are stateless request/response. Failures surface as
/// [`crate::Error::Client`] or [`crate::Error::Query`] and mark the affected
/// document `Error` without touching other documents.
#[async_trait]
pub trait DocumentClient: Send + Sync {
    /// Fetch the full rendered markup of a document.
    ///
    /// `use_cache` is advisory: externally pushed updates pass `false` to
    /// force freshness.
    async fn fetch_document_content(&self, doc_id: &str, use_cache: bool) -> Result<String>;

    /// Read custom attributes of a block.
    async fn get_block_attributes(&self, block_id: &str) -> Result<HashMap<String, String>>;

    /// Write custom attributes of a block.
    async fn set_block_attributes(
        &self,
        block_id: &str,
        attrs: HashMap<String, String>,
    ) -> Result<()>;

    /// Run a read-only structured query and return its rows.
    async fn run_structured_query(&self, query: &str) -> Result<Vec<QueryRow>>;
}

/// A single operation inside a pushed transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOp {
    /// Operation name (insert, update, delete, ...).
    #[serde(default)]
    pub action: String,

    /// Target block or document id.
    #[serde(default)]
    pub id: String,

    /// Serialized operation payload, when present.
    #[serde(default)]
    pub data: Option<String>,
}

/// A transaction pushed from the outside (e.g. over a websocket).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Operations applied by this transaction.
    #[serde(default)]
    pub do_operations: Vec<TransactionOp>,
}

impl Transaction {
    /// Whether any operation targets `doc_id` directly or embeds it in its
    /// string payload.
    pub fn affects_document(&self, doc_id: &str) -> bool {
        if doc_id.is_empty() {
            return false;
        }
        self.do_operations.iter().any(|op| {
            op.id == doc_id
                || op
                    .data
                    .as_deref()
                    .map(|data| data.contains(doc_id))
                    .unwrap_or(false)
        })
    }
}

/// Event notifications consumed by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    /// The user switched to another document.
    DocumentSwitched {
        /// Id of the now-current document.
        doc_id: String,
    },
    /// A document finished loading in the editor.
    DocumentLoaded {
        /// Id of the loaded document.
        doc_id: String,
    },
    /// A figure-affecting operation happened in the current document.
    FigureOperation,
    /// Transactions were pushed from outside the editor process.
    TransactionsPushed {
        /// The pushed transactions, payloads included.
        transactions: Vec<Transaction>,
    },
}
