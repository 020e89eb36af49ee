//! Stylesheet node injection and lifecycle.
//!
//! The "document head" is abstracted behind [`StyleHost`]; the applicator
//! tracks which nodes it injected and under which physical id. Every
//! `apply` allocates a fresh physical id (namespace + monotonic counter +
//! timestamp) instead of reusing the caller's logical id, so concurrent
//! apply/remove sequences for the same logical name never collide.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Namespace prepended to every physical id.
const ID_NAMESPACE: &str = "fignum";

/// A stylesheet node as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleNode {
    /// Physical node id.
    pub id: String,
    /// Stylesheet text.
    pub css: String,
    /// Insertion priority; `None` means plain append.
    pub priority: Option<i32>,
}

/// The abstract injection target: an ordered list of stylesheet nodes.
///
/// Implementations wrap whatever "document head" the embedding editor
/// provides. The host is assumed always available; individual nodes may
/// still disappear underneath the applicator (hence [`StyleHost::contains`]
/// and the cleanup pass).
pub trait StyleHost: Send + Sync {
    /// Append a node at the end.
    fn append(&self, node: StyleNode);

    /// Insert a node before `anchor_id`. Returns false (and does not
    /// insert) when the anchor is not attached; callers fall back to
    /// [`StyleHost::append`].
    fn insert_before(&self, node: StyleNode, anchor_id: &str) -> bool;

    /// Detach a node. Returns whether it was attached.
    fn remove(&self, physical_id: &str) -> bool;

    /// Replace the stylesheet text of an attached node.
    fn update(&self, physical_id: &str, css: &str) -> bool;

    /// Whether a node is currently attached.
    fn contains(&self, physical_id: &str) -> bool;
}

/// In-memory [`StyleHost`] for tests and headless embeddings.
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: Mutex<Vec<StyleNode>>,
}

impl MemoryHost {
    /// Create an empty host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attached nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.lock().unwrap().len()
    }

    /// Ids of attached nodes, in insertion order.
    pub fn node_ids(&self) -> Vec<String> {
        self.nodes
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.id.clone())
            .collect()
    }

    /// Stylesheet text of an attached node.
    pub fn css_of(&self, physical_id: &str) -> Option<String> {
        self.nodes
            .lock()
            .unwrap()
            .iter()
            .find(|n| n.id == physical_id)
            .map(|n| n.css.clone())
    }
}

impl StyleHost for MemoryHost {
    fn append(&self, node: StyleNode) {
        self.nodes.lock().unwrap().push(node);
    }

    fn insert_before(&self, node: StyleNode, anchor_id: &str) -> bool {
        let mut nodes = self.nodes.lock().unwrap();
        match nodes.iter().position(|n| n.id == anchor_id) {
            Some(idx) => {
                nodes.insert(idx, node);
                true
            }
            None => false,
        }
    }

    fn remove(&self, physical_id: &str) -> bool {
        let mut nodes = self.nodes.lock().unwrap();
        let before = nodes.len();
        nodes.retain(|n| n.id != physical_id);
        nodes.len() != before
    }

    fn update(&self, physical_id: &str, css: &str) -> bool {
        let mut nodes = self.nodes.lock().unwrap();
        match nodes.iter_mut().find(|n| n.id == physical_id) {
            Some(node) => {
                node.css = css.to_string();
                true
            }
            None => false,
        }
    }

    fn contains(&self, physical_id: &str) -> bool {
        self.nodes.lock().unwrap().iter().any(|n| n.id == physical_id)
    }
}

/// Options for [`StyleApplicator::apply`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Numeric insertion priority; lower values end up earlier. `None`
    /// appends at the end.
    pub priority: Option<i32>,
}

/// Applicator statistics for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicatorStats {
    /// Tracked stylesheet nodes.
    pub total_styles: usize,
    /// Estimated bytes held by tracked nodes.
    pub memory_usage: usize,
    /// Average bytes per tracked node.
    pub average_style_size: f64,
}

#[derive(Debug, Clone)]
struct AppliedStyle {
    css: String,
    priority: Option<i32>,
    sequence: u64,
}

/// Injects, replaces, and removes stylesheet nodes on a [`StyleHost`].
pub struct StyleApplicator {
    host: std::sync::Arc<dyn StyleHost>,
    applied: Mutex<HashMap<String, AppliedStyle>>,
    counter: AtomicU64,
}

impl StyleApplicator {
    /// Create an applicator over the given host.
    pub fn new(host: std::sync::Arc<dyn StyleHost>) -> Self {
        Self {
            host,
            applied: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
        }
    }

    /// Inject `css` under a freshly allocated physical id derived from
    /// `logical_id`. Returns the physical id.
    pub fn apply(&self, logical_id: &str, css: &str, options: &ApplyOptions) -> Result<String> {
        if logical_id.is_empty() || css.is_empty() {
            return Err(Error::Style(
                "logical id and css must be non-empty".to_string(),
            ));
        }

        let sequence = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let physical_id = format!(
            "{ID_NAMESPACE}-{logical_id}-{sequence}-{}",
            chrono::Utc::now().timestamp_millis()
        );

        let node = StyleNode {
            id: physical_id.clone(),
            css: css.to_string(),
            priority: options.priority,
        };

        match options.priority {
            Some(priority) => {
                let anchor = self.insertion_anchor(priority);
                let inserted = anchor
                    .map(|anchor_id| self.host.insert_before(node.clone(), &anchor_id))
                    .unwrap_or(false);
                if !inserted {
                    self.host.append(node);
                }
            }
            None => self.host.append(node),
        }

        self.applied.lock().unwrap().insert(
            physical_id.clone(),
            AppliedStyle {
                css: css.to_string(),
                priority: options.priority,
                sequence,
            },
        );

        debug!("applicator: applied {physical_id} ({} bytes)", css.len());
        Ok(physical_id)
    }

    /// Detach a node. Removing an already-detached or unknown node is a
    /// no-op.
    pub fn remove(&self, physical_id: &str) -> Result<()> {
        if physical_id.is_empty() {
            return Ok(());
        }
        let tracked = self.applied.lock().unwrap().remove(physical_id).is_some();
        let detached = self.host.remove(physical_id);
        if tracked && !detached {
            debug!("applicator: {physical_id} was already detached");
        }
        Ok(())
    }

    /// Replace the text of a tracked node in place.
    pub fn update(&self, physical_id: &str, css: &str) -> Result<()> {
        if css.is_empty() {
            return Err(Error::Style("css must be non-empty".to_string()));
        }
        let mut applied = self.applied.lock().unwrap();
        let entry = applied
            .get_mut(physical_id)
            .ok_or_else(|| Error::UnknownStyle(physical_id.to_string()))?;
        if !self.host.update(physical_id, css) {
            warn!("applicator: update target {physical_id} is detached");
            return Err(Error::UnknownStyle(physical_id.to_string()));
        }
        entry.css = css.to_string();
        Ok(())
    }

    /// Whether a physical id is tracked.
    pub fn is_applied(&self, physical_id: &str) -> bool {
        self.applied.lock().unwrap().contains_key(physical_id)
    }

    /// Number of tracked nodes.
    pub fn applied_count(&self) -> usize {
        self.applied.lock().unwrap().len()
    }

    /// Drop tracking for nodes no longer attached to the host. Returns how
    /// many entries were purged.
    pub fn cleanup(&self) -> usize {
        let mut applied = self.applied.lock().unwrap();
        let before = applied.len();
        applied.retain(|id, _| self.host.contains(id));
        let purged = before - applied.len();
        if purged > 0 {
            debug!("applicator: purged {purged} orphaned reference(s)");
        }
        purged
    }

    /// Estimated bytes held by tracked nodes.
    pub fn memory_usage(&self) -> usize {
        self.applied
            .lock()
            .unwrap()
            .iter()
            .map(|(id, style)| id.len() + style.css.len())
            .sum()
    }

    /// Diagnostic statistics.
    pub fn stats(&self) -> ApplicatorStats {
        let total = self.applied_count();
        let memory = self.memory_usage();
        ApplicatorStats {
            total_styles: total,
            memory_usage: memory,
            average_style_size: if total > 0 {
                memory as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    /// Detach everything this applicator injected.
    pub fn remove_all(&self) {
        let ids: Vec<String> = self.applied.lock().unwrap().keys().cloned().collect();
        for id in ids {
            let _ = self.remove(&id);
        }
    }

    /// Earliest-inserted attached node with a strictly higher priority,
    /// used as the insert-before anchor.
    fn insertion_anchor(&self, priority: i32) -> Option<String> {
        let applied = self.applied.lock().unwrap();
        applied
            .iter()
            .filter(|(id, style)| {
                style.priority.map(|p| p > priority).unwrap_or(false) && self.host.contains(id)
            })
            .min_by_key(|(_, style)| style.sequence)
            .map(|(id, _)| id.clone())
    }
}

impl std::fmt::Debug for StyleApplicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StyleApplicator")
            .field("applied", &self.applied_count())
            .finish()
    }
}
