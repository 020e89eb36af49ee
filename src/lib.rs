//! # fignum
//!
//! Automatic figure and table numbering for block-based documents.
//!
//! This library extracts figure/caption pairs from rendered editor markup,
//! assigns dense per-kind numbers, and renders the labels as scoped CSS so
//! the document content itself is never modified.
//!
//! ## Quick Start
//!
//! ```
//! use fignum::{process_markup, StyleConfig, StyleGenerator};
//!
//! let markup = r#"
//!   <div data-type="NodeSuperBlock" data-sb-layout="row">
//!     <div data-type="NodeParagraph" data-node-id="img1" class="p">
//!       <div contenteditable="true"><span data-type="img"><img src="a.png"></span></div>
//!     </div>
//!     <div data-type="NodeParagraph" data-node-id="cap1" class="p">
//!       <div contenteditable="true">System architecture</div>
//!     </div>
//!     <div class="protyle-attr"></div>
//!   </div>"#;
//!
//! let figures = process_markup(markup);
//! assert_eq!(figures.len(), 1);
//! assert_eq!(figures[0].number, 1);
//!
//! let css = StyleGenerator::new().generate(&figures, &StyleConfig::default());
//! assert!(css.contains("图 1"));
//! ```
//!
//! ## Features
//!
//! - **Structure-driven pairing**: figures are recognized from two-child
//!   row layouts, not from caption text heuristics
//! - **Dense per-kind numbering**: images and tables count independently
//! - **Non-invasive rendering**: labels and cross-reference badges are
//!   `::before` rules scoped to one root selector
//! - **TTL cache**: repeated switches reuse processed figure lists
//! - **Debounced orchestration**: rapid document switches collapse into
//!   one processing run
//! - **Instrumentation**: operation timings and component memory reports

pub mod cache;
pub mod client;
pub mod controller;
pub mod error;
pub mod model;
pub mod monitor;
pub mod parser;
pub mod pipeline;
pub mod style;

// Re-export commonly used types
pub use cache::{CacheConfig, CacheStats, FigureCache};
pub use client::{DocumentClient, EditorEvent, QueryRow, Transaction, TransactionOp};
pub use controller::{
    ControllerConfig, ControllerConfigPatch, ControllerEvent, ControllerStats, FigureController,
    FigureListing, HealthReport, Subscription, SwitchOptions,
};
pub use error::{Error, Result};
pub use model::{DocumentPhase, Figure, FigureKind, FigureStats, RawFigure};
pub use monitor::{MemoryManager, MemoryReport, PerformanceMonitor, PerformanceReport};
pub use parser::FigureExtractor;
pub use pipeline::{NumberingConfig, NumberingEngine, NumberingValidation, Pipeline};
pub use style::{
    ApplyOptions, EffectRunner, MemoryHost, StyleApplicator, StyleConfig, StyleConfigPatch,
    StyleGenerator, StyleHost, StyleManager, StyleNode,
};

use std::sync::Arc;

/// Extract raw figure candidates from rendered markup.
///
/// # Example
///
/// ```
/// use fignum::extract_figures;
///
/// assert!(extract_figures("<p>no figure groups here</p>").is_empty());
/// ```
pub fn extract_figures(markup: &str) -> Vec<RawFigure> {
    FigureExtractor::new().extract(markup)
}

/// Run the full stateless path: extract, clean, validate, sort, number.
///
/// Returns canonical figures with dense per-kind numbers assigned using
/// default prefixes. For custom prefixes use [`NumberingEngine::with_config`].
pub fn process_markup(markup: &str) -> Vec<Figure> {
    let raw = FigureExtractor::new().extract(markup);
    let figures = Pipeline::new().process(raw);
    NumberingEngine::new().assign_numbers(figures)
}

/// Builder for a fully wired [`FigureController`].
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use fignum::{Fignum, MemoryHost};
/// # use std::collections::HashMap;
/// # use async_trait::async_trait;
/// # struct Client;
/// # #[async_trait]
/// # impl fignum::DocumentClient for Client {
/// #     async fn fetch_document_content(&self, _: &str, _: bool) -> fignum::Result<String> { Ok(String::new()) }
/// #     async fn get_block_attributes(&self, _: &str) -> fignum::Result<HashMap<String, String>> { Ok(HashMap::new()) }
/// #     async fn set_block_attributes(&self, _: &str, _: HashMap<String, String>) -> fignum::Result<()> { Ok(()) }
/// #     async fn run_structured_query(&self, _: &str) -> fignum::Result<Vec<fignum::QueryRow>> { Ok(Vec::new()) }
/// # }
///
/// let controller = Fignum::new()
///     .with_prefixes("Figure", "Table")
///     .with_auto_update(false)
///     .build(Arc::new(Client), Arc::new(MemoryHost::new()));
/// controller.init()?;
/// # Ok::<(), fignum::Error>(())
/// ```
pub struct Fignum {
    config: ControllerConfig,
}

impl Fignum {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: ControllerConfig::default(),
        }
    }

    /// Set the image and table label prefixes.
    pub fn with_prefixes(
        mut self,
        image_prefix: impl Into<String>,
        table_prefix: impl Into<String>,
    ) -> Self {
        self.config.image_prefix = image_prefix.into();
        self.config.table_prefix = table_prefix.into();
        self
    }

    /// Set the root selector generated rules are scoped under.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.config.scope = scope.into();
        self
    }

    /// Enable or disable automatic refreshes on editor events.
    pub fn with_auto_update(mut self, auto_update: bool) -> Self {
        self.config.auto_update = auto_update;
        self
    }

    /// Set the minimum interval between switches to the same document.
    pub fn with_debounce_window(mut self, window: std::time::Duration) -> Self {
        self.config.debounce_window = window;
        self
    }

    /// Set figure cache tuning.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    /// Wire a controller over the given client and style host.
    pub fn build(
        self,
        client: Arc<dyn DocumentClient>,
        host: Arc<dyn StyleHost>,
    ) -> FigureController {
        FigureController::with_config(client, host, self.config)
    }
}

impl Default for Fignum {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_builder_defaults() {
        let builder = Fignum::default();
        assert_eq!(builder.config.image_prefix, "图");
        assert_eq!(builder.config.table_prefix, "表");
        assert!(builder.config.auto_update);
        assert_eq!(builder.config.debounce_window, Duration::from_millis(500));
    }

    #[test]
    fn test_builder_chained() {
        let builder = Fignum::new()
            .with_prefixes("Figure", "Table")
            .with_scope("#root")
            .with_auto_update(false)
            .with_debounce_window(Duration::from_millis(100))
            .with_cache(CacheConfig::default().with_capacity(5));

        assert_eq!(builder.config.image_prefix, "Figure");
        assert_eq!(builder.config.table_prefix, "Table");
        assert_eq!(builder.config.scope, "#root");
        assert!(!builder.config.auto_update);
        assert_eq!(builder.config.debounce_window, Duration::from_millis(100));
        assert_eq!(builder.config.cache.capacity, 5);
    }

    #[test]
    fn test_process_markup_empty_document() {
        assert!(process_markup("").is_empty());
        assert!(process_markup("<p>plain text</p>").is_empty());
    }

    #[test]
    fn test_process_markup_numbers_pair() {
        let markup = r#"
          <div data-type="NodeSuperBlock" data-sb-layout="row">
            <div data-type="NodeParagraph" data-node-id="img1" class="p">
              <div contenteditable="true"><span data-type="img"><img src="a.png"></span></div>
            </div>
            <div data-type="NodeParagraph" data-node-id="cap1" class="p">
              <div contenteditable="true">System architecture</div>
            </div>
            <div class="protyle-attr"></div>
          </div>"#;

        let figures = process_markup(markup);
        assert_eq!(figures.len(), 1);
        assert_eq!(figures[0].id, "img1");
        assert_eq!(figures[0].caption_id, "cap1");
        assert_eq!(figures[0].number, 1);
        assert_eq!(figures[0].kind, FigureKind::Image);
    }
}
