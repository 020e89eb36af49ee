//! Scoped stylesheet text generation.
//!
//! Turns a canonical figure list and prefix configuration into CSS: base
//! namespace rules, one caption-label rule per figure, and one rule per
//! figure rewriting on-screen cross-reference badges. Output is
//! byte-deterministic for identical input, which the applicator relies on
//! for its no-op short-circuit.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::{Figure, FigureKind};
use crate::style::config::StyleConfig;

/// Result of a basic CSS syntax check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CssValidation {
    /// Whether the text passed the structural checks.
    pub is_valid: bool,
    /// Structural problems (unbalanced braces).
    pub errors: Vec<String>,
    /// Cosmetic problems (empty selectors).
    pub warnings: Vec<String>,
}

/// Generates scoped stylesheet text from canonical figures.
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleGenerator;

impl StyleGenerator {
    /// Create a new generator.
    pub fn new() -> Self {
        Self
    }

    /// Generate the full stylesheet for `figures`. Empty input yields an
    /// empty string.
    pub fn generate(&self, figures: &[Figure], config: &StyleConfig) -> String {
        if figures.is_empty() {
            return String::new();
        }

        let sections = [
            self.base_rules(config),
            self.caption_rules(figures, config),
            self.badge_rules(figures, config),
        ];

        sections
            .iter()
            .filter(|s| !s.trim().is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Namespace and animation rules under the configured scope.
    fn base_rules(&self, config: &StyleConfig) -> String {
        let scope = &config.scope;
        let class = &config.class_name;
        let transition = if config.animated {
            "\n    transition: all 0.3s ease;"
        } else {
            ""
        };

        format!(
            "/* figure cross-reference base */\n\
             {scope} .{class} {{{transition}\n}}\n\n\
             {scope} .{class}-caption {{\n    \
             font-weight: 500;\n    \
             color: var(--b3-theme-primary);{transition}\n}}\n\n\
             {scope} .{class}-number {{\n    \
             font-weight: 600;\n    \
             color: var(--b3-theme-primary);\n}}"
        )
    }

    /// One `::before` label per figure with a caption anchor, rendered on
    /// the caption's editable region.
    fn caption_rules(&self, figures: &[Figure], config: &StyleConfig) -> String {
        let rules: Vec<String> = figures
            .iter()
            .filter(|f| !f.caption_id.is_empty() && f.is_numbered())
            .map(|f| {
                let prefix = self.prefix_for(f.kind, config);
                format!(
                    "{scope} [data-node-id=\"{caption_id}\"] [contenteditable=\"true\"]::before {{\n    \
                     content: \"{prefix} {number}: \";\n    \
                     color: var(--b3-theme-primary);\n    \
                     font-weight: 500;\n    \
                     margin-right: 0.25em;\n}}",
                    scope = config.scope,
                    caption_id = f.caption_id,
                    number = f.number,
                )
            })
            .collect();

        if rules.is_empty() {
            String::new()
        } else {
            format!("/* caption numbering */\n{}", rules.join("\n\n"))
        }
    }

    /// One rule per figure rewriting the on-screen marker of any
    /// cross-reference pointing at it.
    fn badge_rules(&self, figures: &[Figure], config: &StyleConfig) -> String {
        let rules: Vec<String> = figures
            .iter()
            .filter(|f| f.is_numbered())
            .map(|f| {
                let prefix = self.prefix_for(f.kind, config);
                format!(
                    "{scope} [data-type=\"block-ref\"][data-subtype=\"s\"][data-id=\"{id}\"]::before {{\n    \
                     content: \"{prefix}{number}\";\n}}",
                    scope = config.scope,
                    id = f.id,
                    number = f.number,
                )
            })
            .collect();

        if rules.is_empty() {
            String::new()
        } else {
            format!("/* cross-reference badges */\n{}", rules.join("\n"))
        }
    }

    fn prefix_for<'a>(&self, kind: FigureKind, config: &'a StyleConfig) -> &'a str {
        match kind {
            FigureKind::Image => &config.image_prefix,
            FigureKind::Table => &config.table_prefix,
        }
    }

    /// Structural check: balanced braces, non-empty selectors.
    pub fn validate_css(&self, css: &str) -> CssValidation {
        let mut result = CssValidation {
            is_valid: true,
            ..Default::default()
        };

        let open = css.matches('{').count();
        let close = css.matches('}').count();
        if open != close {
            result.is_valid = false;
            result
                .errors
                .push(format!("unbalanced braces: {open} open, {close} close"));
        }

        // Literal pattern; compilation cannot fail.
        let rule = Regex::new(r"(?s)([^{}]*)\{[^{}]*\}").unwrap();
        for caps in rule.captures_iter(css) {
            if caps[1].trim().is_empty() {
                result.warnings.push("empty selector".to_string());
            }
        }

        result
    }

    /// Strip comments and collapse whitespace for compact injection.
    pub fn compress(&self, css: &str) -> String {
        // Literal patterns; compilation cannot fail.
        let comments = Regex::new(r"(?s)/\*.*?\*/").unwrap();
        let spaces = Regex::new(r"\s+").unwrap();
        let stripped = comments.replace_all(css, "");
        let collapsed = spaces.replace_all(&stripped, " ");
        collapsed
            .replace("; }", "}")
            .replace(" {", "{")
            .replace("{ ", "{")
            .replace(" }", "}")
            .replace("; ", ";")
            .replace(": ", ":")
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawFigure;

    fn figure(id: &str, kind: FigureKind, number: u32, order: usize) -> Figure {
        let mut f = Figure::from_raw(RawFigure {
            id: id.to_string(),
            kind,
            content: "content".to_string(),
            caption: "caption".to_string(),
            caption_id: format!("{id}-cap"),
            document_order: order,
            container_id: None,
        });
        f.number = number;
        f
    }

    #[test]
    fn test_empty_input_empty_output() {
        let generator = StyleGenerator::new();
        assert_eq!(generator.generate(&[], &StyleConfig::default()), "");
    }

    #[test]
    fn test_default_prefix_scenario() {
        let generator = StyleGenerator::new();
        let figures = vec![
            figure("img1", FigureKind::Image, 1, 0),
            figure("tbl1", FigureKind::Table, 1, 1),
        ];
        let css = generator.generate(&figures, &StyleConfig::default());

        assert!(css.contains("content: \"图 1: \""));
        assert!(css.contains("content: \"表 1: \""));
        assert!(css.contains("[data-node-id=\"img1-cap\"]"));
        assert!(css.contains("[data-node-id=\"tbl1-cap\"]"));
        assert!(css.contains("[data-id=\"img1\"]::before"));
        assert!(css.contains("content: \"图1\""));
        assert!(css.contains("content: \"表1\""));
    }

    #[test]
    fn test_rules_scoped() {
        let generator = StyleGenerator::new();
        let config = StyleConfig {
            scope: "#root".to_string(),
            ..Default::default()
        };
        let css = generator.generate(&[figure("a", FigureKind::Image, 1, 0)], &config);
        for line in css.lines().filter(|l| l.contains("{") && !l.starts_with(' ')) {
            assert!(line.starts_with("#root"), "unscoped rule: {line}");
        }
    }

    #[test]
    fn test_deterministic() {
        let generator = StyleGenerator::new();
        let figures = vec![
            figure("img1", FigureKind::Image, 1, 0),
            figure("tbl1", FigureKind::Table, 1, 1),
        ];
        let config = StyleConfig::default();
        assert_eq!(
            generator.generate(&figures, &config),
            generator.generate(&figures, &config)
        );
    }

    #[test]
    fn test_unnumbered_figures_get_no_rules() {
        let generator = StyleGenerator::new();
        let css = generator.generate(
            &[figure("a", FigureKind::Image, 0, 0)],
            &StyleConfig::default(),
        );
        assert!(!css.contains("data-node-id=\"a-cap\""));
        assert!(!css.contains("data-id=\"a\""));
    }

    #[test]
    fn test_generated_css_validates() {
        let generator = StyleGenerator::new();
        let css = generator.generate(
            &[figure("a", FigureKind::Image, 1, 0)],
            &StyleConfig::default(),
        );
        let validation = generator.validate_css(&css);
        assert!(validation.is_valid, "errors: {:?}", validation.errors);
    }

    #[test]
    fn test_validate_css_unbalanced() {
        let generator = StyleGenerator::new();
        let validation = generator.validate_css(".a { color: red;");
        assert!(!validation.is_valid);
    }

    #[test]
    fn test_compress_strips_comments_and_space() {
        let generator = StyleGenerator::new();
        let compressed = generator.compress("/* note */\n.a {\n    color: red;\n}");
        assert_eq!(compressed, ".a{color:red}");
    }

    #[test]
    fn test_no_animation_when_disabled() {
        let generator = StyleGenerator::new();
        let config = StyleConfig {
            animated: false,
            ..Default::default()
        };
        let css = generator.generate(&[figure("a", FigureKind::Image, 1, 0)], &config);
        assert!(!css.contains("transition"));
    }
}
