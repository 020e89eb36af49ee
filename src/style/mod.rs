//! Stylesheet generation and document-scoped application.
//!
//! [`StyleManager`] is the write path: it binds at most one stylesheet node
//! per document, replaces it atomically (apply the new node before removing
//! the old one, so labels never blink out), and skips the host entirely when
//! the regenerated text is byte-identical to what is already applied.

mod applicator;
mod config;
mod effects;
mod generator;

pub use applicator::{
    ApplicatorStats, ApplyOptions, MemoryHost, StyleApplicator, StyleHost, StyleNode,
};
pub use config::{
    ConfigValidation, StyleConfig, StyleConfigPatch, DEFAULT_CLASS_NAME, DEFAULT_SCOPE,
};
pub use effects::{EffectRunner, DEFAULT_FLASH_DURATION};
pub use generator::{CssValidation, StyleGenerator};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Manager statistics for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleManagerStats {
    /// Documents with an active stylesheet binding.
    pub styled_documents: usize,
    /// Applicator-level node and memory counts.
    pub applicator: ApplicatorStats,
}

#[derive(Debug, Clone)]
struct Binding {
    physical_id: String,
    css: String,
}

/// Owns the one-stylesheet-per-document invariant.
pub struct StyleManager {
    applicator: Arc<StyleApplicator>,
    bindings: Mutex<HashMap<String, Binding>>,
}

impl StyleManager {
    /// Create a manager injecting through `applicator`.
    pub fn new(applicator: Arc<StyleApplicator>) -> Self {
        Self {
            applicator,
            bindings: Mutex::new(HashMap::new()),
        }
    }

    /// The shared applicator, for effect runners and diagnostics.
    pub fn applicator(&self) -> Arc<StyleApplicator> {
        self.applicator.clone()
    }

    /// Bind `css` to `doc_id`, replacing any previous binding. Empty css
    /// clears the binding. Re-applying byte-identical css is a no-op.
    pub fn apply_document_styles(&self, doc_id: &str, css: &str) -> Result<()> {
        if css.trim().is_empty() {
            return self.clear_document_styles(doc_id);
        }

        let previous = {
            let bindings = self.bindings.lock().unwrap();
            bindings.get(doc_id).cloned()
        };

        if let Some(binding) = &previous {
            if binding.css == css && self.applicator.is_applied(&binding.physical_id) {
                debug!("styles: {doc_id} unchanged, skipping");
                return Ok(());
            }
        }

        // apply the replacement before removing the old node
        let physical_id = self
            .applicator
            .apply(&format!("doc-{doc_id}"), css, &ApplyOptions::default())?;

        let old = {
            let mut bindings = self.bindings.lock().unwrap();
            bindings.insert(
                doc_id.to_string(),
                Binding {
                    physical_id,
                    css: css.to_string(),
                },
            )
        };
        if let Some(binding) = old {
            self.applicator.remove(&binding.physical_id)?;
        }
        debug!("styles: applied {} byte(s) to {doc_id}", css.len());
        Ok(())
    }

    /// Remove the binding for one document. Unknown documents are a no-op.
    pub fn clear_document_styles(&self, doc_id: &str) -> Result<()> {
        let binding = self.bindings.lock().unwrap().remove(doc_id);
        if let Some(binding) = binding {
            self.applicator.remove(&binding.physical_id)?;
            debug!("styles: cleared {doc_id}");
        }
        Ok(())
    }

    /// Remove every binding.
    pub fn clear_all(&self) -> Result<()> {
        let bindings: Vec<Binding> = {
            let mut map = self.bindings.lock().unwrap();
            map.drain().map(|(_, b)| b).collect()
        };
        for binding in bindings {
            self.applicator.remove(&binding.physical_id)?;
        }
        Ok(())
    }

    /// Whether `doc_id` has an active binding.
    pub fn has_styles(&self, doc_id: &str) -> bool {
        self.bindings.lock().unwrap().contains_key(doc_id)
    }

    /// Documents with an active binding, sorted.
    pub fn styled_documents(&self) -> Vec<String> {
        let mut docs: Vec<String> = self.bindings.lock().unwrap().keys().cloned().collect();
        docs.sort();
        docs
    }

    /// Diagnostic statistics.
    pub fn stats(&self) -> StyleManagerStats {
        StyleManagerStats {
            styled_documents: self.bindings.lock().unwrap().len(),
            applicator: self.applicator.stats(),
        }
    }
}

impl std::fmt::Debug for StyleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StyleManager")
            .field("styled_documents", &self.styled_documents())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (Arc<MemoryHost>, StyleManager) {
        let host = Arc::new(MemoryHost::new());
        let applicator = Arc::new(StyleApplicator::new(host.clone()));
        (host, StyleManager::new(applicator))
    }

    #[test]
    fn test_one_node_per_document() {
        let (host, manager) = manager();
        manager.apply_document_styles("doc", ".a{}").unwrap();
        manager.apply_document_styles("doc", ".b{}").unwrap();

        assert_eq!(host.node_count(), 1);
        let id = &host.node_ids()[0];
        assert_eq!(host.css_of(id).unwrap(), ".b{}");
    }

    #[test]
    fn test_identical_css_short_circuits() {
        let (host, manager) = manager();
        manager.apply_document_styles("doc", ".a{}").unwrap();
        let first_id = host.node_ids()[0].clone();

        manager.apply_document_styles("doc", ".a{}").unwrap();
        // same physical node, untouched
        assert_eq!(host.node_ids(), vec![first_id]);
    }

    #[test]
    fn test_detached_node_reapplied_despite_identical_css() {
        let (host, manager) = manager();
        manager.apply_document_styles("doc", ".a{}").unwrap();
        let first_id = host.node_ids()[0].clone();
        host.remove(&first_id);

        manager.apply_document_styles("doc", ".a{}").unwrap();
        assert_eq!(host.node_count(), 1);
        assert_ne!(host.node_ids()[0], first_id);
    }

    #[test]
    fn test_empty_css_clears_binding() {
        let (host, manager) = manager();
        manager.apply_document_styles("doc", ".a{}").unwrap();
        manager.apply_document_styles("doc", "   ").unwrap();

        assert_eq!(host.node_count(), 0);
        assert!(!manager.has_styles("doc"));
    }

    #[test]
    fn test_documents_are_independent() {
        let (host, manager) = manager();
        manager.apply_document_styles("a", ".a{}").unwrap();
        manager.apply_document_styles("b", ".b{}").unwrap();
        assert_eq!(host.node_count(), 2);

        manager.clear_document_styles("a").unwrap();
        assert_eq!(host.node_count(), 1);
        assert!(manager.has_styles("b"));
        assert_eq!(manager.styled_documents(), vec!["b"]);
    }

    #[test]
    fn test_clear_unknown_document_is_noop() {
        let (_, manager) = manager();
        manager.clear_document_styles("missing").unwrap();
    }

    #[test]
    fn test_clear_all() {
        let (host, manager) = manager();
        manager.apply_document_styles("a", ".a{}").unwrap();
        manager.apply_document_styles("b", ".b{}").unwrap();
        manager.clear_all().unwrap();

        assert_eq!(host.node_count(), 0);
        assert!(manager.styled_documents().is_empty());
        assert_eq!(manager.stats().styled_documents, 0);
    }
}
