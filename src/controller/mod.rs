//! Orchestration: document switches, refreshes, and diagnostics.
//!
//! [`FigureController`] is the composition root. It owns the cache, the
//! extraction pipeline, the numbering engine and the style manager, and it
//! serializes work per document: an in-flight guard gives mutual exclusion,
//! a per-document timestamp throttles repeat switches inside the debounce
//! window. Externally pushed updates bypass both the throttle and the
//! content cache.
//!
//! All shared state lives behind `std::sync::Mutex` and locks are never
//! held across an `.await`.

mod observers;

pub use observers::{ControllerEvent, Subscription};

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheConfig, CacheStats, FigureCache};
use crate::client::{DocumentClient, EditorEvent};
use crate::error::{Error, Result};
use crate::model::{DocumentPhase, Figure, FigureKind, FigureStats};
use crate::monitor::{MemoryManager, MemoryReport, PerformanceMonitor, PerformanceReport};
use crate::parser::FigureExtractor;
use crate::pipeline::{NumberingConfig, NumberingEngine, Pipeline};
use crate::style::{
    EffectRunner, StyleApplicator, StyleConfig, StyleGenerator, StyleHost, StyleManager,
    StyleManagerStats, DEFAULT_SCOPE,
};

/// Block attribute persisting the per-document enabled switch.
const ATTR_ENABLED: &str = "custom-fignum-enabled";

/// Controller configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Display prefix for image labels.
    pub image_prefix: String,
    /// Display prefix for table labels.
    pub table_prefix: String,
    /// Whether editor events trigger automatic refreshes.
    pub auto_update: bool,
    /// Minimum interval between switches to the same document.
    pub debounce_window: Duration,
    /// Figure cache tuning.
    pub cache: CacheConfig,
    /// Root selector for generated styles.
    pub scope: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            image_prefix: "图".to_string(),
            table_prefix: "表".to_string(),
            auto_update: true,
            debounce_window: Duration::from_millis(500),
            cache: CacheConfig::default(),
            scope: DEFAULT_SCOPE.to_string(),
        }
    }
}

impl ControllerConfig {
    /// Apply a patch on top of this config, returning the merged result.
    /// Pure: neither input is modified.
    pub fn merged(&self, patch: &ControllerConfigPatch) -> ControllerConfig {
        ControllerConfig {
            image_prefix: patch
                .image_prefix
                .clone()
                .unwrap_or_else(|| self.image_prefix.clone()),
            table_prefix: patch
                .table_prefix
                .clone()
                .unwrap_or_else(|| self.table_prefix.clone()),
            auto_update: patch.auto_update.unwrap_or(self.auto_update),
            debounce_window: patch.debounce_window.unwrap_or(self.debounce_window),
            cache: patch.cache.clone().unwrap_or_else(|| self.cache.clone()),
            scope: patch.scope.clone().unwrap_or_else(|| self.scope.clone()),
        }
    }

    fn style_config(&self) -> StyleConfig {
        StyleConfig {
            image_prefix: self.image_prefix.clone(),
            table_prefix: self.table_prefix.clone(),
            scope: self.scope.clone(),
            ..Default::default()
        }
    }

    fn numbering_config(&self) -> NumberingConfig {
        NumberingConfig {
            image_prefix: self.image_prefix.clone(),
            table_prefix: self.table_prefix.clone(),
            ..Default::default()
        }
    }
}

/// A partial [`ControllerConfig`], used with [`ControllerConfig::merged`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerConfigPatch {
    /// Overrides the image prefix when set.
    pub image_prefix: Option<String>,
    /// Overrides the table prefix when set.
    pub table_prefix: Option<String>,
    /// Overrides the auto-update flag when set.
    pub auto_update: Option<bool>,
    /// Overrides the debounce window when set.
    pub debounce_window: Option<Duration>,
    /// Overrides the cache tuning when set.
    pub cache: Option<CacheConfig>,
    /// Overrides the style scope when set.
    pub scope: Option<String>,
}

/// Options for [`FigureController::handle_document_switch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwitchOptions {
    /// True for externally pushed updates: bypasses the debounce window
    /// and forces a cache-less content fetch.
    pub from_websocket: bool,
}

/// One figure row from the structured-query listing path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureListing {
    /// Block id.
    pub id: String,
    /// Classified kind.
    pub kind: FigureKind,
    /// Truncated content snippet.
    pub snippet: String,
}

/// Aggregate controller statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerStats {
    /// The currently tracked document, if any.
    pub current_document: Option<String>,
    /// Figure counts for the current document, when cached.
    pub figures: Option<FigureStats>,
    /// Cache statistics.
    pub cache: CacheStats,
    /// Style binding statistics.
    pub styles: StyleManagerStats,
}

/// Outcome of a health check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// True when no warnings were raised.
    pub is_healthy: bool,
    /// Observed problems.
    pub warnings: Vec<String>,
    /// Suggested remedies, parallel to `warnings`.
    pub recommendations: Vec<String>,
}

#[derive(Debug, Default)]
struct ControllerState {
    in_flight: HashSet<String>,
    last_processed: HashMap<String, Instant>,
    phases: HashMap<String, DocumentPhase>,
    disabled: HashSet<String>,
    current: Option<String>,
}

/// The figure numbering engine's composition root.
pub struct FigureController {
    client: Arc<dyn DocumentClient>,
    config: Mutex<ControllerConfig>,
    cache: Arc<Mutex<FigureCache>>,
    extractor: FigureExtractor,
    pipeline: Pipeline,
    generator: StyleGenerator,
    styles: Arc<StyleManager>,
    effects: EffectRunner,
    state: Mutex<ControllerState>,
    observers: observers::ObserverRegistry,
    perf: Arc<PerformanceMonitor>,
    memory: MemoryManager,
    initialized: AtomicBool,
}

impl FigureController {
    /// Create a controller with default configuration.
    pub fn new(client: Arc<dyn DocumentClient>, host: Arc<dyn StyleHost>) -> Self {
        Self::with_config(client, host, ControllerConfig::default())
    }

    /// Create a controller with explicit configuration.
    pub fn with_config(
        client: Arc<dyn DocumentClient>,
        host: Arc<dyn StyleHost>,
        config: ControllerConfig,
    ) -> Self {
        let applicator = Arc::new(StyleApplicator::new(host));
        let styles = Arc::new(StyleManager::new(applicator.clone()));
        let effects = EffectRunner::new(applicator, config.scope.clone());
        let cache = Arc::new(Mutex::new(FigureCache::with_config(config.cache.clone())));

        let controller = Self {
            client,
            config: Mutex::new(config),
            cache,
            extractor: FigureExtractor::new(),
            pipeline: Pipeline::new(),
            generator: StyleGenerator::new(),
            styles,
            effects,
            state: Mutex::new(ControllerState::default()),
            observers: observers::ObserverRegistry::new(),
            perf: Arc::new(PerformanceMonitor::new()),
            memory: MemoryManager::new(),
            initialized: AtomicBool::new(false),
        };
        controller.register_probes();
        controller
    }

    fn register_probes(&self) {
        let cache = self.cache.clone();
        self.memory
            .register_component("figure_cache", move || {
                cache.lock().unwrap().estimated_size()
            });
        let applicator = self.styles.applicator();
        self.memory
            .register_component("style_nodes", move || applicator.memory_usage());

        let cache = self.cache.clone();
        self.memory.register_cleanup("figure_cache", move || {
            cache.lock().unwrap().purge_expired();
        });
        let applicator = self.styles.applicator();
        self.memory.register_cleanup("style_nodes", move || {
            applicator.cleanup();
        });
    }

    /// Start serving requests.
    pub fn init(&self) -> Result<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!("controller: already initialized");
            return Ok(());
        }
        info!("controller: initialized");
        Ok(())
    }

    /// Stop serving requests and release every applied style.
    pub fn destroy(&self) -> Result<()> {
        if !self.initialized.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.effects.cancel_all();
        self.styles.clear_all()?;
        self.cache.lock().unwrap().clear(None);
        *self.state.lock().unwrap() = ControllerState::default();
        info!("controller: destroyed");
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    /// Merge a configuration patch. Prefix or scope changes take effect on
    /// the next style generation.
    pub fn reconfigure(&self, patch: &ControllerConfigPatch) {
        let mut config = self.config.lock().unwrap();
        *config = config.merged(patch);
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> ControllerConfig {
        self.config.lock().unwrap().clone()
    }

    /// Process a document switch end to end: fetch, extract, number,
    /// cache, style. Repeat switches inside the debounce window and
    /// switches racing an in-flight run are skipped.
    pub async fn handle_document_switch(
        &self,
        doc_id: &str,
        options: SwitchOptions,
    ) -> Result<()> {
        self.ensure_initialized()?;
        if doc_id.trim().is_empty() {
            return Err(Error::InvalidDocumentId(doc_id.to_string()));
        }

        let debounce_window = self.config.lock().unwrap().debounce_window;
        {
            let mut state = self.state.lock().unwrap();
            state.current = Some(doc_id.to_string());

            if state.in_flight.contains(doc_id) {
                debug!("controller: {doc_id} already in flight, skipping");
                return Ok(());
            }
            if !options.from_websocket {
                if let Some(last) = state.last_processed.get(doc_id) {
                    if last.elapsed() < debounce_window {
                        debug!("controller: {doc_id} inside debounce window, skipping");
                        return Ok(());
                    }
                }
            }
            if state.disabled.contains(doc_id) {
                state.phases.insert(doc_id.to_string(), DocumentPhase::Idle);
                return Ok(());
            }
            state.in_flight.insert(doc_id.to_string());
        }

        self.set_phase(doc_id, DocumentPhase::Loading);
        let result = self.process_document(doc_id, options.from_websocket).await;

        // the guard is cleared on success and failure alike
        {
            let mut state = self.state.lock().unwrap();
            state.in_flight.remove(doc_id);
            if result.is_ok() {
                state.last_processed.insert(doc_id.to_string(), Instant::now());
            }
        }

        match result {
            Ok(figures) => {
                self.set_phase(doc_id, DocumentPhase::Ready);
                self.observers.notify(&ControllerEvent::FiguresUpdated {
                    doc_id: doc_id.to_string(),
                    figures,
                });
                Ok(())
            }
            Err(err) => {
                warn!("controller: switch to {doc_id} failed: {err}");
                self.set_phase(
                    doc_id,
                    DocumentPhase::Error {
                        message: err.to_string(),
                    },
                );
                Err(err)
            }
        }
    }

    async fn process_document(&self, doc_id: &str, force_fresh: bool) -> Result<Vec<Figure>> {
        self.perf.start_operation("document_switch");

        let figures = if force_fresh {
            None
        } else {
            self.cache.lock().unwrap().get(doc_id)
        };

        let figures = match figures {
            Some(figures) => {
                debug!("controller: {doc_id} served from cache");
                figures
            }
            None => {
                let figures = self.compute_figures(doc_id, !force_fresh).await?;
                self.cache.lock().unwrap().set(doc_id, &figures, None);
                figures
            }
        };

        let style_config = self.config.lock().unwrap().style_config();
        let css = self.generator.generate(&figures, &style_config);
        self.styles.apply_document_styles(doc_id, &css)?;

        self.perf.end_operation("document_switch");
        Ok(figures)
    }

    /// Fetch and run the full extraction pipeline, without touching cache
    /// or styles.
    async fn compute_figures(&self, doc_id: &str, use_cache: bool) -> Result<Vec<Figure>> {
        let markup = self.client.fetch_document_content(doc_id, use_cache).await?;
        let raw = self
            .perf
            .measure("extract", || self.extractor.extract(&markup));
        let figures = self.perf.measure("pipeline", || self.pipeline.process(raw));
        let numbering =
            NumberingEngine::with_config(self.config.lock().unwrap().numbering_config());
        Ok(numbering.assign_numbers(figures))
    }

    /// Re-run the full switch for the current document, bypassing cache
    /// and debounce.
    pub async fn refresh_current_document(&self) -> Result<()> {
        self.ensure_initialized()?;
        let doc_id = self.current_document().ok_or(Error::NoCurrentDocument)?;
        self.handle_document_switch(&doc_id, SwitchOptions { from_websocket: true })
            .await
    }

    /// Enable numbering for a document (default: the current one) and
    /// rebuild its state from scratch.
    pub async fn enable(&self, doc_id: Option<&str>) -> Result<()> {
        self.ensure_initialized()?;
        let doc_id = self.resolve_doc(doc_id)?;
        self.state.lock().unwrap().disabled.remove(&doc_id);
        self.persist_enabled(&doc_id, true).await;
        self.handle_document_switch(&doc_id, SwitchOptions { from_websocket: true })
            .await
    }

    /// Disable numbering for a document (default: the current one),
    /// dropping its style binding, cache entry and phase.
    pub async fn disable(&self, doc_id: Option<&str>) -> Result<()> {
        self.ensure_initialized()?;
        let doc_id = self.resolve_doc(doc_id)?;
        {
            let mut state = self.state.lock().unwrap();
            state.disabled.insert(doc_id.clone());
            state.phases.remove(&doc_id);
            state.last_processed.remove(&doc_id);
        }
        self.styles.clear_document_styles(&doc_id)?;
        self.cache.lock().unwrap().clear(Some(&doc_id));
        self.persist_enabled(&doc_id, false).await;
        info!("controller: disabled numbering for {doc_id}");
        Ok(())
    }

    /// Best-effort persistence of the enabled switch as a block attribute.
    async fn persist_enabled(&self, doc_id: &str, enabled: bool) {
        let mut attrs = HashMap::new();
        attrs.insert(ATTR_ENABLED.to_string(), enabled.to_string());
        if let Err(err) = self.client.set_block_attributes(doc_id, attrs).await {
            warn!("controller: could not persist enabled switch for {doc_id}: {err}");
        }
    }

    /// Regenerate and reapply styles for a document from cached figures,
    /// without refetching. A cache miss is a silent no-op.
    pub fn update_prefix_styles_only(&self, doc_id: &str) -> Result<()> {
        self.ensure_initialized()?;
        let figures = match self.cache.lock().unwrap().get(doc_id) {
            Some(figures) => figures,
            None => {
                debug!("controller: no cached figures for {doc_id}, styles unchanged");
                return Ok(());
            }
        };
        let style_config = self.config.lock().unwrap().style_config();
        let css = self.generator.generate(&figures, &style_config);
        self.styles.apply_document_styles(doc_id, &css)
    }

    /// Canonical figure list for a document: cached when available,
    /// otherwise computed with a full fetch. Never touches styles or the
    /// switch guards.
    pub async fn get_figures_list(&self, doc_id: &str) -> Result<Vec<Figure>> {
        self.ensure_initialized()?;
        if doc_id.trim().is_empty() {
            return Err(Error::InvalidDocumentId(doc_id.to_string()));
        }
        if let Some(figures) = self.cache.lock().unwrap().get(doc_id) {
            return Ok(figures);
        }
        let figures = self.compute_figures(doc_id, true).await?;
        self.cache.lock().unwrap().set(doc_id, &figures, None);
        Ok(figures)
    }

    /// Simplified figure listing over the structured query path, for
    /// callers that only need ids and snippets.
    pub async fn query_figures(&self, doc_id: &str) -> Result<Vec<FigureListing>> {
        self.ensure_initialized()?;
        if doc_id.trim().is_empty() || doc_id.contains('\'') {
            return Err(Error::InvalidDocumentId(doc_id.to_string()));
        }

        let query = format!(
            "SELECT id, type, content FROM blocks \
             WHERE root_id = '{doc_id}' AND type IN ('t', 'p') ORDER BY sort"
        );
        let rows = self.client.run_structured_query(&query).await?;

        let listings = rows
            .into_iter()
            .filter_map(|row| {
                let id = row.get("id")?.clone();
                if id.is_empty() {
                    return None;
                }
                let kind = match row.get("type").map(String::as_str) {
                    Some("t") => FigureKind::Table,
                    _ => FigureKind::Image,
                };
                let content = row.get("content").cloned().unwrap_or_default();
                let snippet: String = content.chars().take(80).collect();
                Some(FigureListing { id, kind, snippet })
            })
            .collect();
        Ok(listings)
    }

    /// Dispatch an editor event.
    pub async fn handle_event(&self, event: EditorEvent) -> Result<()> {
        self.ensure_initialized()?;
        let auto_update = self.config.lock().unwrap().auto_update;

        match event {
            EditorEvent::DocumentSwitched { doc_id } | EditorEvent::DocumentLoaded { doc_id } => {
                self.handle_document_switch(&doc_id, SwitchOptions::default())
                    .await
            }
            EditorEvent::FigureOperation => {
                if !auto_update {
                    return Ok(());
                }
                match self.refresh_current_document().await {
                    Err(Error::NoCurrentDocument) => Ok(()),
                    other => other,
                }
            }
            EditorEvent::TransactionsPushed { transactions } => {
                if !auto_update {
                    return Ok(());
                }
                let current = match self.current_document() {
                    Some(doc_id) => doc_id,
                    None => return Ok(()),
                };
                if transactions.iter().any(|tx| tx.affects_document(&current)) {
                    self.handle_document_switch(&current, SwitchOptions { from_websocket: true })
                        .await
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Briefly highlight a block in the current document.
    pub fn flash_block(&self, block_id: &str, duration: Option<Duration>) -> Result<()> {
        self.ensure_initialized()?;
        self.effects.flash(block_id, duration)
    }

    /// Register an observer; the returned handle unsubscribes on drop.
    pub fn subscribe(
        &self,
        callback: impl Fn(&ControllerEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.observers.subscribe(callback)
    }

    /// Lifecycle phase of a document. Untracked documents are `Idle`.
    pub fn document_phase(&self, doc_id: &str) -> DocumentPhase {
        self.state
            .lock()
            .unwrap()
            .phases
            .get(doc_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Id of the most recently switched-to document.
    pub fn current_document(&self) -> Option<String> {
        self.state.lock().unwrap().current.clone()
    }

    /// Aggregate statistics snapshot.
    pub fn get_stats(&self) -> ControllerStats {
        let current = self.current_document();
        let figures = current.as_deref().and_then(|doc_id| {
            self.cache
                .lock()
                .unwrap()
                .get(doc_id)
                .map(|figures| FigureStats::from_figures(&figures))
        });
        ControllerStats {
            current_document: current,
            figures,
            cache: self.cache.lock().unwrap().stats(),
            styles: self.styles.stats(),
        }
    }

    /// Operation timing report.
    pub fn get_performance_report(&self) -> PerformanceReport {
        self.perf.export_report()
    }

    /// Component memory report.
    pub fn get_memory_report(&self) -> MemoryReport {
        self.memory.export_report()
    }

    /// Cross-check timings, memory and cache effectiveness.
    pub fn check_system_health(&self) -> HealthReport {
        let mut report = HealthReport::default();

        let memory = self.memory.export_report();
        for warning in memory.warnings {
            report.warnings.push(warning);
            report
                .recommendations
                .push("run optimize_performance() to reclaim memory".to_string());
        }

        let perf = self.perf.export_report();
        for name in perf.slow_operations {
            report.warnings.push(format!("operation {name} was slow"));
            report
                .recommendations
                .push(format!("inspect recent {name} inputs"));
        }

        let cache = self.cache.lock().unwrap().stats();
        let traffic = cache.hit_rate + cache.miss_rate;
        if traffic > 0.0 && cache.hit_rate < 0.5 && cache.entries > 0 {
            report
                .warnings
                .push(format!("cache hit rate is low ({:.0}%)", cache.hit_rate * 100.0));
            report
                .recommendations
                .push("consider a longer cache TTL".to_string());
        }

        report.is_healthy = report.warnings.is_empty();
        report
    }

    /// Purge expired cache entries, drop orphaned style references, run
    /// registered cleanup tasks, and trim timing metrics.
    pub fn optimize_performance(&self) -> Result<()> {
        self.ensure_initialized()?;
        let purged = self.cache.lock().unwrap().purge_expired();
        let orphaned = self.styles.applicator().cleanup();
        let reclaimed = self.memory.perform_cleanup();
        self.perf.clear_metrics();
        info!(
            "controller: optimize pass purged {purged} cache entr(ies), \
             {orphaned} orphaned style(s), reclaimed {reclaimed} byte(s)"
        );
        Ok(())
    }

    fn resolve_doc(&self, doc_id: Option<&str>) -> Result<String> {
        match doc_id {
            Some(id) if !id.trim().is_empty() => Ok(id.to_string()),
            Some(id) => Err(Error::InvalidDocumentId(id.to_string())),
            None => self.current_document().ok_or(Error::NoCurrentDocument),
        }
    }

    fn set_phase(&self, doc_id: &str, phase: DocumentPhase) {
        self.state
            .lock()
            .unwrap()
            .phases
            .insert(doc_id.to_string(), phase.clone());
        self.observers.notify(&ControllerEvent::PhaseChanged {
            doc_id: doc_id.to_string(),
            phase,
        });
    }
}

impl std::fmt::Debug for FigureController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FigureController")
            .field("initialized", &self.initialized.load(Ordering::SeqCst))
            .field("current", &self.current_document())
            .finish()
    }
}
