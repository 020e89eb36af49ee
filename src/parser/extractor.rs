//! Extracts figure/caption pairs from loosely structured editor markup.
//!
//! The structural pattern is strict: a horizontal-layout container with
//! exactly two non-metadata children, one figure-bearing (a table block, or
//! a paragraph containing an image) and one plain paragraph acting as the
//! caption. Anything else is rejected silently; extraction never fails on
//! malformed markup.

use log::debug;
use scraper::{ElementRef, Html, Selector};

use crate::model::{FigureKind, RawFigure};

/// Container attribute marking a sibling group.
const GROUP_SELECTOR: &str = r#"[data-type="NodeSuperBlock"][data-sb-layout="row"]"#;
/// Metadata child class excluded from the two-child count.
const METADATA_CLASS: &str = "protyle-attr";

/// Parses markup into raw figure candidates.
#[derive(Debug, Clone, Copy, Default)]
pub struct FigureExtractor;

impl FigureExtractor {
    /// Create a new extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract every qualifying figure/caption pair from `markup`, in
    /// document order. Malformed fragments are skipped, never fatal.
    pub fn extract(&self, markup: &str) -> Vec<RawFigure> {
        if markup.trim().is_empty() {
            return Vec::new();
        }

        let document = Html::parse_fragment(markup);
        let Ok(group_selector) = Selector::parse(GROUP_SELECTOR) else {
            return Vec::new();
        };

        let mut candidates = Vec::new();
        let mut groups = 0usize;
        for group in document.select(&group_selector) {
            groups += 1;
            if let Some(candidate) = analyze_group(group) {
                candidates.push(candidate);
            }
        }

        debug!(
            "extractor: {} candidate(s) from {} sibling group(s)",
            candidates.len(),
            groups
        );
        candidates
    }
}

/// Inspect one sibling group and return its candidate, if it qualifies.
fn analyze_group(group: ElementRef<'_>) -> Option<RawFigure> {
    let children: Vec<ElementRef<'_>> = group
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| !child.value().classes().any(|class| class == METADATA_CLASS))
        .collect();

    if children.len() != 2 {
        return None;
    }

    let mut figure: Option<(ElementRef<'_>, FigureKind)> = None;
    let mut caption: Option<ElementRef<'_>> = None;

    for child in children {
        match child.value().attr("data-type") {
            Some("NodeTable") => {
                if figure.is_some() {
                    return None;
                }
                figure = Some((child, FigureKind::Table));
            }
            Some("NodeParagraph") => {
                if contains_image(child) {
                    if figure.is_some() {
                        return None;
                    }
                    figure = Some((child, FigureKind::Image));
                } else {
                    if caption.is_some() {
                        return None;
                    }
                    caption = Some(child);
                }
            }
            _ => return None,
        }
    }

    let (figure_el, kind) = figure?;
    let caption_el = caption?;

    let id = figure_el.value().attr("data-node-id").unwrap_or_default();
    let caption_id = caption_el.value().attr("data-node-id").unwrap_or_default();
    if id.is_empty() || caption_id.is_empty() || id == caption_id {
        return None;
    }

    Some(RawFigure {
        id: id.to_string(),
        kind,
        content: extract_content(figure_el, kind),
        caption: extract_text(caption_el),
        caption_id: caption_id.to_string(),
        document_order: sibling_index(group),
        container_id: group
            .value()
            .attr("data-node-id")
            .filter(|v| !v.is_empty())
            .map(str::to_string),
    })
}

/// Whether a paragraph block carries an inline image.
fn contains_image(paragraph: ElementRef<'_>) -> bool {
    if let Ok(selector) = Selector::parse(r#"[data-type="img"]"#) {
        paragraph.select(&selector).next().is_some()
    } else {
        false
    }
}

/// Serialized figure content. Images prefer the editable sub-region's inner
/// markup; tables take the full inner markup.
fn extract_content(element: ElementRef<'_>, kind: FigureKind) -> String {
    match kind {
        FigureKind::Image => editable_region(element)
            .map(|region| region.inner_html())
            .unwrap_or_else(|| element.inner_html()),
        FigureKind::Table => element.inner_html(),
    }
}

/// Plain text of a caption paragraph, preferring its editable region.
fn extract_text(element: ElementRef<'_>) -> String {
    let target = editable_region(element).unwrap_or(element);
    target.text().collect::<String>().trim().to_string()
}

/// First `contenteditable` descendant, when present.
fn editable_region(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let selector = Selector::parse(r#"[contenteditable="true"]"#).ok()?;
    element.select(&selector).next()
}

/// The group's index among its parent's element children.
fn sibling_index(group: ElementRef<'_>) -> usize {
    group
        .parent()
        .and_then(|parent| {
            parent
                .children()
                .filter_map(ElementRef::wrap)
                .position(|sibling| sibling.id() == group.id())
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMAGE_GROUP: &str = r#"
        <div data-type="NodeSuperBlock" data-sb-layout="row" data-node-id="sb1">
            <div data-type="NodeParagraph" data-node-id="img1">
                <div contenteditable="true"><span data-type="img"><img src="a.png"></span></div>
            </div>
            <div data-type="NodeParagraph" data-node-id="cap1">
                <div contenteditable="true">Setup diagram</div>
            </div>
            <div class="protyle-attr"></div>
        </div>"#;

    const TABLE_GROUP: &str = r#"
        <div data-type="NodeSuperBlock" data-sb-layout="row" data-node-id="sb2">
            <div data-type="NodeTable" data-node-id="tbl1">
                <table><tr><td>1</td></tr></table>
            </div>
            <div data-type="NodeParagraph" data-node-id="cap2">
                <div contenteditable="true">Results</div>
            </div>
        </div>"#;

    #[test]
    fn test_image_caption_pair() {
        let figures = FigureExtractor::new().extract(IMAGE_GROUP);
        assert_eq!(figures.len(), 1);
        let fig = &figures[0];
        assert_eq!(fig.id, "img1");
        assert_eq!(fig.kind, FigureKind::Image);
        assert_eq!(fig.caption, "Setup diagram");
        assert_eq!(fig.caption_id, "cap1");
        assert_eq!(fig.container_id.as_deref(), Some("sb1"));
        assert!(fig.content.contains("img"));
    }

    #[test]
    fn test_table_caption_pair() {
        let figures = FigureExtractor::new().extract(TABLE_GROUP);
        assert_eq!(figures.len(), 1);
        assert_eq!(figures[0].kind, FigureKind::Table);
        assert_eq!(figures[0].id, "tbl1");
        assert!(figures[0].content.contains("<table>"));
    }

    #[test]
    fn test_document_order_follows_siblings() {
        let markup = format!("<div>{IMAGE_GROUP}{TABLE_GROUP}</div>");
        let figures = FigureExtractor::new().extract(&markup);
        assert_eq!(figures.len(), 2);
        assert_eq!(figures[0].document_order, 0);
        assert_eq!(figures[1].document_order, 1);
    }

    #[test]
    fn test_column_layout_rejected() {
        let markup = IMAGE_GROUP.replace("data-sb-layout=\"row\"", "data-sb-layout=\"col\"");
        assert!(FigureExtractor::new().extract(&markup).is_empty());
    }

    #[test]
    fn test_two_plain_paragraphs_rejected() {
        let markup = r#"
            <div data-type="NodeSuperBlock" data-sb-layout="row">
                <div data-type="NodeParagraph" data-node-id="p1"><div contenteditable="true">a</div></div>
                <div data-type="NodeParagraph" data-node-id="p2"><div contenteditable="true">b</div></div>
            </div>"#;
        assert!(FigureExtractor::new().extract(markup).is_empty());
    }

    #[test]
    fn test_two_figures_rejected() {
        let markup = r#"
            <div data-type="NodeSuperBlock" data-sb-layout="row">
                <div data-type="NodeTable" data-node-id="t1"><table></table></div>
                <div data-type="NodeTable" data-node-id="t2"><table></table></div>
            </div>"#;
        assert!(FigureExtractor::new().extract(markup).is_empty());
    }

    #[test]
    fn test_three_children_rejected() {
        let markup = r#"
            <div data-type="NodeSuperBlock" data-sb-layout="row">
                <div data-type="NodeTable" data-node-id="t1"><table></table></div>
                <div data-type="NodeParagraph" data-node-id="p1"><div contenteditable="true">x</div></div>
                <div data-type="NodeParagraph" data-node-id="p2"><div contenteditable="true">y</div></div>
            </div>"#;
        assert!(FigureExtractor::new().extract(markup).is_empty());
    }

    #[test]
    fn test_foreign_child_rejected() {
        let markup = r#"
            <div data-type="NodeSuperBlock" data-sb-layout="row">
                <div data-type="NodeTable" data-node-id="t1"><table></table></div>
                <div data-type="NodeHeading" data-node-id="h1">Heading</div>
            </div>"#;
        assert!(FigureExtractor::new().extract(markup).is_empty());
    }

    #[test]
    fn test_missing_node_ids_rejected() {
        let markup = r#"
            <div data-type="NodeSuperBlock" data-sb-layout="row">
                <div data-type="NodeTable"><table></table></div>
                <div data-type="NodeParagraph" data-node-id="p1"><div contenteditable="true">x</div></div>
            </div>"#;
        assert!(FigureExtractor::new().extract(markup).is_empty());
    }

    #[test]
    fn test_empty_and_garbage_markup() {
        let extractor = FigureExtractor::new();
        assert!(extractor.extract("").is_empty());
        assert!(extractor.extract("   ").is_empty());
        assert!(extractor.extract("<div><p>no groups here</p>").is_empty());
        assert!(extractor.extract("<<<not markup>>>").is_empty());
    }

    #[test]
    fn test_metadata_child_not_counted() {
        // IMAGE_GROUP carries a protyle-attr child; it must not break the
        // two-child requirement.
        assert_eq!(FigureExtractor::new().extract(IMAGE_GROUP).len(), 1);
    }
}
