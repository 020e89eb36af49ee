//! Figure record types.

use serde::{Deserialize, Serialize};

/// The kind of block a figure candidate was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FigureKind {
    /// An image-bearing paragraph block.
    Image,
    /// A table block.
    Table,
}

impl FigureKind {
    /// Stable lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            FigureKind::Image => "image",
            FigureKind::Table => "table",
        }
    }
}

impl std::fmt::Display for FigureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A figure candidate as extracted from document markup, before the
/// processing pipeline has run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFigure {
    /// Stable block id of the figure block.
    pub id: String,

    /// Whether the figure is an image or a table.
    pub kind: FigureKind,

    /// Serialized inner markup of the figure block.
    pub content: String,

    /// Plain text of the caption paragraph.
    pub caption: String,

    /// Block id of the caption paragraph, used as the stylesheet anchor.
    pub caption_id: String,

    /// Index of the enclosing group among its own siblings.
    pub document_order: usize,

    /// Block id of the enclosing group, when present.
    pub container_id: Option<String>,
}

impl RawFigure {
    /// Check the structural invariant: `id` and `caption_id` are non-empty
    /// and distinct, and content is present.
    pub fn is_well_formed(&self) -> bool {
        !self.id.is_empty()
            && !self.caption_id.is_empty()
            && self.id != self.caption_id
            && !self.content.is_empty()
    }
}

/// A canonical figure record: a cleaned candidate plus its assigned number.
///
/// For a given document and kind, numbers are dense (`1..=N`, no gaps or
/// duplicates) and increase with `document_order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Figure {
    /// Stable block id of the figure block.
    pub id: String,

    /// Whether the figure is an image or a table.
    pub kind: FigureKind,

    /// Cleaned inner markup of the figure block.
    pub content: String,

    /// Cleaned caption text.
    pub caption: String,

    /// Block id of the caption paragraph.
    pub caption_id: String,

    /// Index of the enclosing group among its own siblings.
    pub document_order: usize,

    /// Block id of the enclosing group, when present.
    pub container_id: Option<String>,

    /// 1-based number within the figure's kind; 0 until assigned.
    pub number: u32,

    /// Standardized content summary for diagnostic display only.
    /// Never consulted by the numbering engine.
    pub summary: String,
}

impl Figure {
    /// Build an unnumbered canonical record from a raw candidate.
    pub fn from_raw(raw: RawFigure) -> Self {
        Self {
            id: raw.id,
            kind: raw.kind,
            content: raw.content,
            caption: raw.caption,
            caption_id: raw.caption_id,
            document_order: raw.document_order,
            container_id: raw.container_id,
            number: 0,
            summary: String::new(),
        }
    }

    /// Whether a number has been assigned.
    pub fn is_numbered(&self) -> bool {
        self.number > 0
    }

    /// Whether the caption carries visible text.
    pub fn has_caption(&self) -> bool {
        !self.caption.trim().is_empty()
    }
}

/// Aggregate counts over a document's canonical figures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureStats {
    /// Total figures.
    pub total: usize,
    /// Image figures.
    pub images: usize,
    /// Table figures.
    pub tables: usize,
    /// Figures with non-empty captions.
    pub with_captions: usize,
    /// Figures without captions.
    pub without_captions: usize,
}

impl FigureStats {
    /// Compute counts for a list of figures.
    pub fn from_figures(figures: &[Figure]) -> Self {
        let with_captions = figures.iter().filter(|f| f.has_caption()).count();
        Self {
            total: figures.len(),
            images: figures.iter().filter(|f| f.kind == FigureKind::Image).count(),
            tables: figures.iter().filter(|f| f.kind == FigureKind::Table).count(),
            with_captions,
            without_captions: figures.len() - with_captions,
        }
    }
}
