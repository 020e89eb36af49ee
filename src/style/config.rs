//! Stylesheet configuration and validation.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default root selector scoping all generated rules.
pub const DEFAULT_SCOPE: &str = ".protyle-wysiwyg";
/// Default namespace class for generated rules.
pub const DEFAULT_CLASS_NAME: &str = "fignum-cross-ref";

/// Configuration for generated stylesheets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleConfig {
    /// Prefix rendered before image numbers.
    pub image_prefix: String,

    /// Prefix rendered before table numbers.
    pub table_prefix: String,

    /// Root selector all rules are scoped under.
    pub scope: String,

    /// Namespace class for base rules.
    pub class_name: String,

    /// Whether base rules include a transition.
    pub animated: bool,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            image_prefix: "图".to_string(),
            table_prefix: "表".to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            class_name: DEFAULT_CLASS_NAME.to_string(),
            animated: true,
        }
    }
}

impl StyleConfig {
    /// Apply a patch on top of this config, returning the merged result.
    /// Pure: neither input is modified.
    pub fn merged(&self, patch: &StyleConfigPatch) -> StyleConfig {
        StyleConfig {
            image_prefix: patch
                .image_prefix
                .clone()
                .unwrap_or_else(|| self.image_prefix.clone()),
            table_prefix: patch
                .table_prefix
                .clone()
                .unwrap_or_else(|| self.table_prefix.clone()),
            scope: patch.scope.clone().unwrap_or_else(|| self.scope.clone()),
            class_name: patch
                .class_name
                .clone()
                .unwrap_or_else(|| self.class_name.clone()),
            animated: patch.animated.unwrap_or(self.animated),
        }
    }

    /// Check the config for problems. Returns a structured result instead
    /// of failing: empty scope and malformed class names are errors, empty
    /// prefixes only warnings.
    pub fn validate(&self) -> ConfigValidation {
        let mut result = ConfigValidation {
            is_valid: true,
            ..Default::default()
        };

        if self.scope.trim().is_empty() {
            result.is_valid = false;
            result.errors.push("scope selector is empty".to_string());
        }

        if self.image_prefix.trim().is_empty() {
            result.warnings.push("image prefix is empty".to_string());
        }
        if self.table_prefix.trim().is_empty() {
            result.warnings.push("table prefix is empty".to_string());
        }

        if self.class_name.trim().is_empty() {
            result.warnings.push("class name is empty".to_string());
        } else {
            // Literal pattern; compilation cannot fail.
            let class_name = Regex::new(r"^[A-Za-z][\w-]*$").unwrap();
            if !class_name.is_match(&self.class_name) {
                result.is_valid = false;
                result
                    .errors
                    .push(format!("invalid class name: {:?}", self.class_name));
            }
        }

        result
    }
}

/// A partial [`StyleConfig`]: every field optional, used with
/// [`StyleConfig::merged`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleConfigPatch {
    /// Overrides the image prefix when set.
    pub image_prefix: Option<String>,
    /// Overrides the table prefix when set.
    pub table_prefix: Option<String>,
    /// Overrides the scope selector when set.
    pub scope: Option<String>,
    /// Overrides the namespace class when set.
    pub class_name: Option<String>,
    /// Overrides the animation flag when set.
    pub animated: Option<bool>,
}

/// Structured outcome of config validation; never thrown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValidation {
    /// Whether the config can be used for generation.
    pub is_valid: bool,
    /// Problems that block generation.
    pub errors: Vec<String>,
    /// Problems worth surfacing but not blocking.
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StyleConfig::default();
        assert_eq!(config.image_prefix, "图");
        assert_eq!(config.table_prefix, "表");
        assert_eq!(config.scope, DEFAULT_SCOPE);
        assert!(config.validate().is_valid);
    }

    #[test]
    fn test_merge_is_pure_and_partial() {
        let base = StyleConfig::default();
        let patch = StyleConfigPatch {
            image_prefix: Some("Figure".to_string()),
            animated: Some(false),
            ..Default::default()
        };

        let merged = base.merged(&patch);
        assert_eq!(merged.image_prefix, "Figure");
        assert_eq!(merged.table_prefix, "表");
        assert!(!merged.animated);
        // base untouched
        assert_eq!(base.image_prefix, "图");
        assert!(base.animated);
    }

    #[test]
    fn test_empty_scope_is_error() {
        let config = StyleConfig {
            scope: "  ".to_string(),
            ..Default::default()
        };
        let validation = config.validate();
        assert!(!validation.is_valid);
        assert_eq!(validation.errors.len(), 1);
    }

    #[test]
    fn test_empty_prefix_is_warning_only() {
        let config = StyleConfig {
            image_prefix: String::new(),
            ..Default::default()
        };
        let validation = config.validate();
        assert!(validation.is_valid);
        assert!(!validation.warnings.is_empty());
    }

    #[test]
    fn test_malformed_class_name_is_error() {
        let config = StyleConfig {
            class_name: "9bad name".to_string(),
            ..Default::default()
        };
        assert!(!config.validate().is_valid);
    }
}
