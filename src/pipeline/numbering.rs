//! Dense, kind-partitioned figure numbering.
//!
//! Images and tables are numbered independently, in document order, starting
//! at a configurable base. The returned list keeps layout order; only the
//! `number` field changes, so re-running on unchanged input is idempotent.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::model::{Figure, FigureKind};

/// Numbering configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberingConfig {
    /// First number assigned within each kind.
    pub start_number: u32,

    /// Display prefix for image labels.
    pub image_prefix: String,

    /// Display prefix for table labels.
    pub table_prefix: String,
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            start_number: 1,
            image_prefix: "图".to_string(),
            table_prefix: "表".to_string(),
        }
    }
}

/// Result of checking a numbered list for gaps and duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberingValidation {
    /// Whether every kind forms a dense `start..start+N` sequence.
    pub is_valid: bool,
    /// Human-readable problems found.
    pub errors: Vec<String>,
    /// Suggested follow-ups.
    pub suggestions: Vec<String>,
}

/// Assigns and validates per-kind sequential numbers.
#[derive(Debug, Clone, Default)]
pub struct NumberingEngine {
    config: NumberingConfig,
}

impl NumberingEngine {
    /// Create an engine with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with explicit configuration.
    pub fn with_config(config: NumberingConfig) -> Self {
        Self { config }
    }

    /// Assign dense numbers per kind and return the list re-sorted by
    /// document order (tie-break lexical id).
    pub fn assign_numbers(&self, figures: Vec<Figure>) -> Vec<Figure> {
        if figures.is_empty() {
            return figures;
        }

        let (mut images, mut tables): (Vec<Figure>, Vec<Figure>) = figures
            .into_iter()
            .partition(|f| f.kind == FigureKind::Image);

        self.number_partition(&mut images);
        self.number_partition(&mut tables);
        debug!(
            "numbering: {} image(s), {} table(s)",
            images.len(),
            tables.len()
        );

        let mut merged = images;
        merged.append(&mut tables);
        merged.sort_by(|a, b| {
            a.document_order
                .cmp(&b.document_order)
                .then_with(|| a.id.cmp(&b.id))
        });
        merged
    }

    /// Number one kind's figures densely in document order (tie-break
    /// lexical id), starting at `start_number`.
    fn number_partition(&self, figures: &mut [Figure]) {
        figures.sort_by(|a, b| {
            a.document_order
                .cmp(&b.document_order)
                .then_with(|| a.id.cmp(&b.id))
        });
        for (idx, figure) in figures.iter_mut().enumerate() {
            figure.number = self.config.start_number + idx as u32;
        }
    }

    /// Display label for a numbered figure: `"{prefix} {number}"`. Empty for
    /// unnumbered records.
    pub fn label(&self, figure: &Figure) -> String {
        if !figure.is_numbered() {
            return String::new();
        }
        let prefix = match figure.kind {
            FigureKind::Image => &self.config.image_prefix,
            FigureKind::Table => &self.config.table_prefix,
        };
        format!("{prefix} {}", figure.number)
    }

    /// Check that assigned numbers are dense per kind.
    pub fn validate_numbering(&self, figures: &[Figure]) -> NumberingValidation {
        let mut result = NumberingValidation {
            is_valid: true,
            ..Default::default()
        };

        for kind in [FigureKind::Image, FigureKind::Table] {
            let mut numbers: Vec<u32> = figures
                .iter()
                .filter(|f| f.kind == kind)
                .map(|f| f.number)
                .collect();
            numbers.sort_unstable();

            if numbers.iter().any(|n| *n == 0) {
                result.is_valid = false;
                result.errors.push(format!("unnumbered {kind} figure present"));
                result
                    .suggestions
                    .push(format!("reassign numbers for every {kind} figure"));
                continue;
            }

            for (idx, number) in numbers.iter().enumerate() {
                let expected = self.config.start_number + idx as u32;
                if *number != expected {
                    result.is_valid = false;
                    result.errors.push(format!(
                        "{kind} numbering is not dense: expected {expected}, found {number}"
                    ));
                    result
                        .suggestions
                        .push(format!("renumber {kind} figures in document order"));
                    break;
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawFigure;

    fn figure(id: &str, kind: FigureKind, order: usize) -> Figure {
        Figure::from_raw(RawFigure {
            id: id.to_string(),
            kind,
            content: "content".to_string(),
            caption: "caption".to_string(),
            caption_id: format!("{id}-cap"),
            document_order: order,
            container_id: None,
        })
    }

    #[test]
    fn test_kinds_numbered_independently() {
        let engine = NumberingEngine::new();
        let numbered = engine.assign_numbers(vec![
            figure("img1", FigureKind::Image, 0),
            figure("tbl1", FigureKind::Table, 1),
            figure("img2", FigureKind::Image, 2),
            figure("tbl2", FigureKind::Table, 3),
        ]);

        let pairs: Vec<(&str, u32)> = numbered.iter().map(|f| (f.id.as_str(), f.number)).collect();
        assert_eq!(
            pairs,
            vec![("img1", 1), ("tbl1", 1), ("img2", 2), ("tbl2", 2)]
        );
    }

    #[test]
    fn test_return_order_mirrors_layout() {
        let engine = NumberingEngine::new();
        let numbered = engine.assign_numbers(vec![
            figure("tbl1", FigureKind::Table, 2),
            figure("img1", FigureKind::Image, 0),
            figure("img2", FigureKind::Image, 1),
        ]);
        let ids: Vec<&str> = numbered.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["img1", "img2", "tbl1"]);
    }

    #[test]
    fn test_dense_per_kind() {
        let engine = NumberingEngine::new();
        let numbered = engine.assign_numbers(vec![
            figure("a", FigureKind::Image, 5),
            figure("b", FigureKind::Image, 1),
            figure("c", FigureKind::Image, 3),
        ]);
        let mut numbers: Vec<u32> = numbered.iter().map(|f| f.number).collect();
        numbers.sort_unstable();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(engine.validate_numbering(&numbered).is_valid);
    }

    #[test]
    fn test_idempotent() {
        let engine = NumberingEngine::new();
        let input = vec![
            figure("img1", FigureKind::Image, 0),
            figure("tbl1", FigureKind::Table, 1),
        ];
        let once = engine.assign_numbers(input);
        let twice = engine.assign_numbers(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_custom_start_number() {
        let engine = NumberingEngine::with_config(NumberingConfig {
            start_number: 10,
            ..Default::default()
        });
        let numbered = engine.assign_numbers(vec![figure("a", FigureKind::Image, 0)]);
        assert_eq!(numbered[0].number, 10);
    }

    #[test]
    fn test_label() {
        let engine = NumberingEngine::new();
        let numbered = engine.assign_numbers(vec![
            figure("img1", FigureKind::Image, 0),
            figure("tbl1", FigureKind::Table, 1),
        ]);
        assert_eq!(engine.label(&numbered[0]), "图 1");
        assert_eq!(engine.label(&numbered[1]), "表 1");
        assert_eq!(engine.label(&figure("x", FigureKind::Image, 0)), "");
    }

    #[test]
    fn test_validation_catches_gaps_and_duplicates() {
        let engine = NumberingEngine::new();
        let mut a = figure("a", FigureKind::Image, 0);
        a.number = 1;
        let mut b = figure("b", FigureKind::Image, 1);
        b.number = 3;
        let gap = engine.validate_numbering(&[a.clone(), b]);
        assert!(!gap.is_valid);
        assert!(!gap.errors.is_empty());

        let mut dup = figure("c", FigureKind::Image, 1);
        dup.number = 1;
        let duplicated = engine.validate_numbering(&[a, dup]);
        assert!(!duplicated.is_valid);
    }
}
