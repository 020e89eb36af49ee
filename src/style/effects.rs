//! Transient visual effects.
//!
//! A flash briefly highlights one block, then removes itself. Flashing a
//! block that is already flashing cancels the pending removal and restarts
//! the effect, so rapid repeated flashes never leave a stale highlight
//! behind.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::style::applicator::{ApplyOptions, StyleApplicator};

/// Default flash duration.
pub const DEFAULT_FLASH_DURATION: Duration = Duration::from_millis(1500);

struct PendingEffect {
    handle: JoinHandle<()>,
    physical_id: String,
}

/// Runs self-removing highlight effects on top of a [`StyleApplicator`].
pub struct EffectRunner {
    applicator: Arc<StyleApplicator>,
    scope: String,
    pending: Arc<Mutex<HashMap<String, PendingEffect>>>,
}

impl EffectRunner {
    /// Create a runner injecting through `applicator`, scoped under the
    /// given root selector.
    pub fn new(applicator: Arc<StyleApplicator>, scope: impl Into<String>) -> Self {
        Self {
            applicator,
            scope: scope.into(),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Flash the block with node id `target` for `duration`. Restarts the
    /// effect if one is already running for the same block.
    pub fn flash(&self, target: &str, duration: Option<Duration>) -> Result<()> {
        if target.is_empty() {
            return Ok(());
        }
        let duration = duration.unwrap_or(DEFAULT_FLASH_DURATION);
        let css = self.highlight_css(target);

        // cancel a pending removal for the same block first
        self.cancel(target);

        let physical_id =
            self.applicator
                .apply(&format!("flash-{target}"), &css, &ApplyOptions::default())?;

        let applicator = self.applicator.clone();
        let pending = self.pending.clone();
        let target_key = target.to_string();
        let removal_id = physical_id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Err(err) = applicator.remove(&removal_id) {
                warn!("effects: failed to remove {removal_id}: {err}");
            }
            pending.lock().unwrap().remove(&target_key);
        });

        debug!("effects: flashing {target} for {duration:?}");
        self.pending.lock().unwrap().insert(
            target.to_string(),
            PendingEffect {
                handle,
                physical_id,
            },
        );
        Ok(())
    }

    /// Cancel a running flash for `target`, removing its highlight now.
    pub fn cancel(&self, target: &str) {
        let effect = self.pending.lock().unwrap().remove(target);
        if let Some(effect) = effect {
            effect.handle.abort();
            let _ = self.applicator.remove(&effect.physical_id);
        }
    }

    /// Cancel every running flash.
    pub fn cancel_all(&self) {
        let effects: Vec<PendingEffect> = {
            let mut pending = self.pending.lock().unwrap();
            pending.drain().map(|(_, effect)| effect).collect()
        };
        for effect in effects {
            effect.handle.abort();
            let _ = self.applicator.remove(&effect.physical_id);
        }
    }

    /// Number of flashes currently running.
    pub fn active_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    fn highlight_css(&self, target: &str) -> String {
        format!(
            "{scope} [data-node-id=\"{target}\"] {{\n    \
             background-color: rgba(255, 255, 0, 0.3);\n    \
             transition: background-color 0.3s ease;\n}}",
            scope = self.scope,
        )
    }
}

impl std::fmt::Debug for EffectRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectRunner")
            .field("scope", &self.scope)
            .field("active", &self.active_count())
            .finish()
    }
}
