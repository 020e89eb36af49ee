//! Clean, validate, sort, and standardize raw figure candidates.
//!
//! Stages run in a fixed order. Validation failures drop the offending
//! record and log an aggregate count; they never abort the batch. The
//! standardize stage only fills the diagnostic `summary` field and never
//! feeds the numbering engine.

use log::{debug, warn};
use regex::Regex;

use crate::model::{Figure, FigureKind, RawFigure};

/// The figure processing pipeline.
#[derive(Debug)]
pub struct Pipeline {
    whitespace: Regex,
    leading_colon: Regex,
    trailing_colon: Regex,
    image_alt: Regex,
    image_markdown: Regex,
    table_summary: Regex,
    table_first_row: Regex,
    tag: Regex,
}

impl Pipeline {
    /// Create a pipeline with its stage patterns compiled.
    pub fn new() -> Self {
        // The patterns are literals; compilation cannot fail.
        Self {
            whitespace: Regex::new(r"\s+").unwrap(),
            leading_colon: Regex::new(r"^[：:]\s*").unwrap(),
            trailing_colon: Regex::new(r"\s*[：:]\s*$").unwrap(),
            image_alt: Regex::new(r#"alt="([^"]*)""#).unwrap(),
            image_markdown: Regex::new(r"!\[([^\]]*)\]").unwrap(),
            table_summary: Regex::new(r#"<table[^>]*summary="([^"]*)"[^>]*>"#).unwrap(),
            table_first_row: Regex::new(r"<tr[^>]*>(.*?)</tr>").unwrap(),
            tag: Regex::new(r"<[^>]*>").unwrap(),
        }
    }

    /// Run every stage over `raw` and return canonical, still unnumbered
    /// figure records sorted by document order.
    pub fn process(&self, raw: Vec<RawFigure>) -> Vec<Figure> {
        if raw.is_empty() {
            return Vec::new();
        }
        let total = raw.len();

        let mut cleaned: Vec<RawFigure> = raw.into_iter().map(|f| self.clean(f)).collect();

        cleaned.retain(|f| f.is_well_formed());
        let dropped = total - cleaned.len();
        if dropped > 0 {
            warn!("pipeline: dropped {dropped} invalid candidate(s) out of {total}");
        }

        cleaned.sort_by(|a, b| {
            a.document_order
                .cmp(&b.document_order)
                .then_with(|| a.id.cmp(&b.id))
        });

        let figures: Vec<Figure> = cleaned
            .into_iter()
            .map(|raw| {
                let mut figure = Figure::from_raw(raw);
                figure.summary = self.standardize(figure.kind, &figure.content);
                figure
            })
            .collect();

        debug!("pipeline: {} canonical figure(s)", figures.len());
        figures
    }

    /// Stage 1: trim and collapse whitespace; captions additionally lose
    /// leading/trailing colon artifacts.
    fn clean(&self, mut figure: RawFigure) -> RawFigure {
        figure.content = self.collapse(&figure.content);
        figure.caption = self.clean_caption(&figure.caption);
        figure
    }

    fn collapse(&self, text: &str) -> String {
        self.whitespace.replace_all(text.trim(), " ").trim().to_string()
    }

    fn clean_caption(&self, caption: &str) -> String {
        let collapsed = self.collapse(caption);
        let stripped = self.leading_colon.replace(&collapsed, "");
        self.trailing_colon.replace(&stripped, "").trim().to_string()
    }

    /// Stage 4: per-kind content summary for diagnostic display.
    fn standardize(&self, kind: FigureKind, content: &str) -> String {
        match kind {
            FigureKind::Image => self.standardize_image(content),
            FigureKind::Table => self.standardize_table(content),
        }
    }

    fn standardize_image(&self, content: &str) -> String {
        if let Some(caps) = self.image_alt.captures(content) {
            let alt = caps[1].trim();
            if !alt.is_empty() {
                return alt.to_string();
            }
        }
        if let Some(caps) = self.image_markdown.captures(content) {
            let label = caps[1].trim();
            if !label.is_empty() {
                return label.to_string();
            }
        }
        "image".to_string()
    }

    fn standardize_table(&self, content: &str) -> String {
        if let Some(caps) = self.table_summary.captures(content) {
            let summary = caps[1].trim();
            if !summary.is_empty() {
                return summary.to_string();
            }
        }
        if let Some(caps) = self.table_first_row.captures(content) {
            let cells = self.collapse(&self.tag.replace_all(&caps[1], " "));
            if !cells.is_empty() && cells.len() < 100 {
                return cells;
            }
        }
        "table".to_string()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, order: usize) -> RawFigure {
        RawFigure {
            id: id.to_string(),
            kind: FigureKind::Image,
            content: "<img alt=\"diagram\" src=\"a.png\">".to_string(),
            caption: "caption".to_string(),
            caption_id: format!("{id}-cap"),
            document_order: order,
            container_id: None,
        }
    }

    #[test]
    fn test_caption_cleanup() {
        let pipeline = Pipeline::new();
        let mut candidate = raw("a", 0);
        candidate.caption = "  ：  Setup   diagram : ".to_string();

        let figures = pipeline.process(vec![candidate]);
        assert_eq!(figures[0].caption, "Setup diagram");
    }

    #[test]
    fn test_content_whitespace_collapsed() {
        let pipeline = Pipeline::new();
        let mut candidate = raw("a", 0);
        candidate.content = "  <img\n  alt=\"x\"   src=\"a.png\">  ".to_string();

        let figures = pipeline.process(vec![candidate]);
        assert_eq!(figures[0].content, "<img alt=\"x\" src=\"a.png\">");
    }

    #[test]
    fn test_invalid_candidates_dropped() {
        let pipeline = Pipeline::new();
        let good = raw("a", 0);
        let mut no_id = raw("b", 1);
        no_id.id = String::new();
        let mut no_content = raw("c", 2);
        no_content.content = "   ".to_string();
        let mut self_captioned = raw("d", 3);
        self_captioned.caption_id = "d".to_string();

        let figures = pipeline.process(vec![good, no_id, no_content, self_captioned]);
        assert_eq!(figures.len(), 1);
        assert_eq!(figures[0].id, "a");
    }

    #[test]
    fn test_sort_by_order_then_id() {
        let pipeline = Pipeline::new();
        let figures = pipeline.process(vec![raw("z", 1), raw("b", 0), raw("a", 1)]);
        let ids: Vec<&str> = figures.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "z"]);
    }

    #[test]
    fn test_image_summary_prefers_alt() {
        let pipeline = Pipeline::new();
        let figures = pipeline.process(vec![raw("a", 0)]);
        assert_eq!(figures[0].summary, "diagram");
    }

    #[test]
    fn test_image_summary_markdown_fallback() {
        let pipeline = Pipeline::new();
        let mut candidate = raw("a", 0);
        candidate.content = "![fallback label](a.png)".to_string();
        let figures = pipeline.process(vec![candidate]);
        assert_eq!(figures[0].summary, "fallback label");
    }

    #[test]
    fn test_table_summary_from_first_row() {
        let pipeline = Pipeline::new();
        let mut candidate = raw("t", 0);
        candidate.kind = FigureKind::Table;
        candidate.content =
            "<table><tr><th>Name</th><th>Value</th></tr><tr><td>x</td></tr></table>".to_string();
        let figures = pipeline.process(vec![candidate]);
        assert_eq!(figures[0].summary, "Name Value");
    }

    #[test]
    fn test_table_summary_attribute_wins() {
        let pipeline = Pipeline::new();
        let mut candidate = raw("t", 0);
        candidate.kind = FigureKind::Table;
        candidate.content = "<table summary=\"yearly results\"><tr><td>1</td></tr></table>".to_string();
        let figures = pipeline.process(vec![candidate]);
        assert_eq!(figures[0].summary, "yearly results");
    }

    #[test]
    fn test_empty_batch() {
        assert!(Pipeline::new().process(Vec::new()).is_empty());
    }
}
