//! Component memory accounting.
//!
//! Components register a probe reporting their current estimated byte
//! usage, and optionally a cleanup task. Snapshots sum the probes; a
//! configurable threshold turns high usage into report warnings.

use std::collections::HashMap;
use std::sync::Mutex;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Default usage threshold before warnings are emitted.
pub const DEFAULT_WARN_THRESHOLD: usize = 8 * 1024 * 1024;

type UsageProbe = Box<dyn Fn() -> usize + Send + Sync>;
type CleanupTask = Box<dyn Fn() + Send + Sync>;

/// One component's usage within a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentUsage {
    /// Component name as registered.
    pub name: String,
    /// Estimated bytes in use.
    pub bytes: usize,
}

/// Snapshot of component memory usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryReport {
    /// Per-component usage, sorted by name.
    pub components: Vec<ComponentUsage>,
    /// Sum over all components.
    pub total_bytes: usize,
    /// Threshold crossings.
    pub warnings: Vec<String>,
}

/// Tracks registered memory probes and cleanup tasks.
pub struct MemoryManager {
    probes: Mutex<HashMap<String, UsageProbe>>,
    cleanups: Mutex<Vec<(String, CleanupTask)>>,
    warn_threshold: usize,
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryManager {
    /// Create a manager with the default warning threshold.
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_WARN_THRESHOLD)
    }

    /// Create a manager with an explicit warning threshold in bytes.
    pub fn with_threshold(warn_threshold: usize) -> Self {
        Self {
            probes: Mutex::new(HashMap::new()),
            cleanups: Mutex::new(Vec::new()),
            warn_threshold,
        }
    }

    /// Register (or replace) a component usage probe.
    pub fn register_component(
        &self,
        name: &str,
        probe: impl Fn() -> usize + Send + Sync + 'static,
    ) {
        self.probes
            .lock()
            .unwrap()
            .insert(name.to_string(), Box::new(probe));
        debug!("memory: registered probe {name}");
    }

    /// Register a cleanup task, run in registration order by
    /// [`MemoryManager::perform_cleanup`].
    pub fn register_cleanup(&self, name: &str, task: impl Fn() + Send + Sync + 'static) {
        self.cleanups
            .lock()
            .unwrap()
            .push((name.to_string(), Box::new(task)));
    }

    /// Total estimated bytes across all probes.
    pub fn snapshot(&self) -> usize {
        self.probes.lock().unwrap().values().map(|p| p()).sum()
    }

    /// Full report with per-component breakdown and threshold warnings.
    pub fn export_report(&self) -> MemoryReport {
        let probes = self.probes.lock().unwrap();
        let mut components: Vec<ComponentUsage> = probes
            .iter()
            .map(|(name, probe)| ComponentUsage {
                name: name.clone(),
                bytes: probe(),
            })
            .collect();
        components.sort_by(|a, b| a.name.cmp(&b.name));

        let total_bytes = components.iter().map(|c| c.bytes).sum();
        let mut warnings = Vec::new();
        if total_bytes > self.warn_threshold {
            warn!(
                "memory: total usage {total_bytes} bytes exceeds threshold {}",
                self.warn_threshold
            );
            warnings.push(format!(
                "total usage {total_bytes} bytes exceeds threshold {} bytes",
                self.warn_threshold
            ));
        }

        MemoryReport {
            components,
            total_bytes,
            warnings,
        }
    }

    /// Run every registered cleanup task. Returns bytes reclaimed as
    /// estimated by before/after snapshots.
    pub fn perform_cleanup(&self) -> usize {
        let before = self.snapshot();
        let cleanups = self.cleanups.lock().unwrap();
        for (name, task) in cleanups.iter() {
            debug!("memory: running cleanup {name}");
            task();
        }
        let after = self.snapshot();
        let reclaimed = before.saturating_sub(after);
        if reclaimed > 0 {
            info!("memory: cleanup reclaimed {reclaimed} byte(s)");
        }
        reclaimed
    }
}

impl std::fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryManager")
            .field("probes", &self.probes.lock().unwrap().len())
            .field("cleanups", &self.cleanups.lock().unwrap().len())
            .finish()
    }
}
