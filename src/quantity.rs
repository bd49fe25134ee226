//! # Quantity Classifier Module
//!
//! Decides whether a chat fragment looks like a quantity-bearing order item.
//!
//! ## Features
//!
//! - One combined, case-insensitive regex built from the unit vocabularies at load time
//! - Weight, count, container, group and specific-item synonyms
//! - Multiplication forms: `3 x 4`, `x3`, `3x`, `corn×6`
//! - Glued weights such as `10kgbutternut`
//! - Free-form `special_patterns` ORed into the same expression

use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, trace};

use crate::config::QuantityPatternConfig;
use crate::errors::{ConfigError, ConfigResult};

/// Number with an optional decimal part, comma or dot separated
const NUMBER: &str = r"\d+(?:[.,]\d+)?";

/// Quantity detector built from the configured unit vocabulary
#[derive(Debug, Clone)]
pub struct QuantityClassifier {
    /// Combined pattern searched anywhere in a fragment
    pattern: Regex,
}

/// Build the combined quantity regex from configuration
///
/// The alternation, in order:
/// 1. `<number><optional unit>`
/// 2. `<number> <mult> <number>`
/// 3. `<mult><number>`
/// 4. `<number><mult>`
/// 5. `<word><mult><number>`
/// 6. `<number>(kg|g)<word>`
/// 7. every configured special pattern
///
/// Units are deduplicated and sorted longest first so that `kgs` wins over `kg`.
pub fn build_quantity_regex_pattern(config: &QuantityPatternConfig) -> String {
    let unique_units: HashSet<String> = config
        .all_units()
        .map(|u| u.trim().to_lowercase())
        .filter(|u| !u.is_empty())
        .collect();
    let mut sorted_units: Vec<String> = unique_units.into_iter().collect();
    sorted_units.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

    let units = sorted_units
        .iter()
        .map(|u| regex::escape(u))
        .collect::<Vec<_>>()
        .join("|");

    let mult = config
        .multiplication_patterns
        .iter()
        .map(|m| regex::escape(m.trim()))
        .collect::<Vec<_>>()
        .join("|");

    let mut alternatives = vec![
        format!(r"{NUMBER}\s*(?:(?:{units})\b)?"),
        format!(r"{NUMBER}\s*(?:{mult})\s*{NUMBER}"),
        format!(r"(?:{mult})\s*{NUMBER}"),
        format!(r"{NUMBER}\s*(?:{mult})"),
        format!(r"[[:alpha:]]+\s*(?:{mult})\s*{NUMBER}"),
        format!(r"{NUMBER}(?:kg|g)[[:alpha:]]+"),
    ];
    alternatives.extend(config.special_patterns.iter().map(|p| format!("(?:{p})")));

    format!("(?i)(?:{})", alternatives.join("|"))
}

impl QuantityClassifier {
    /// Compile the classifier from the quantity pattern configuration
    pub fn from_config(config: &QuantityPatternConfig) -> ConfigResult<Self> {
        for (i, special) in config.special_patterns.iter().enumerate() {
            Regex::new(special)
                .map_err(|e| ConfigError::invalid_pattern(format!("special_patterns[{i}]"), e))?;
        }

        let source = build_quantity_regex_pattern(config);
        debug!(pattern_len = source.len(), "Building quantity classifier");
        let pattern =
            Regex::new(&source).map_err(|e| ConfigError::invalid_pattern("quantity", e))?;
        Ok(Self { pattern })
    }

    /// Whether the fragment contains a quantity anywhere
    pub fn looks_like_quantity_item(&self, fragment: &str) -> bool {
        let result = self.pattern.is_match(fragment);
        trace!(fragment = %fragment, result, "Quantity check");
        result
    }

    /// The first quantity expression found in the fragment, if any
    pub fn find_quantity<'t>(&self, fragment: &'t str) -> Option<&'t str> {
        self.pattern.find(fragment).map(|m| m.as_str())
    }

    /// Source of the combined pattern
    pub fn pattern_str(&self) -> &str {
        self.pattern.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_classifier() -> QuantityClassifier {
        QuantityClassifier::from_config(&QuantityPatternConfig::bundled().unwrap()).unwrap()
    }

    #[test]
    fn test_classifier_creation() {
        let classifier = create_classifier();
        assert!(classifier.pattern_str().starts_with("(?i)"));
    }

    #[test]
    fn test_positive_quantities() {
        let classifier = create_classifier();

        let cases = vec![
            "Tomatoes 5kg",
            "3 x onions",
            "onions x3",
            "5×tomatoes",
            "corn×6",
            "10kgbutternut",
            "2 boxes lettuce",
            "1,5kg mushrooms",
            "half a box of lemons",
        ];

        for text in cases {
            assert!(
                classifier.looks_like_quantity_item(text),
                "expected a quantity in '{}'",
                text
            );
        }
    }

    #[test]
    fn test_negative_quantities() {
        let classifier = create_classifier();

        let cases = vec!["good morning", "fresh basil", "", "please confirm"];

        for text in cases {
            assert!(
                !classifier.looks_like_quantity_item(text),
                "unexpected quantity in '{}'",
                text
            );
        }
    }

    #[test]
    fn test_case_insensitive_units() {
        let classifier = create_classifier();
        assert_eq!(classifier.find_quantity("Spinach 3 BUNCHES"), Some("3 BUNCHES"));
        assert_eq!(classifier.find_quantity("10 KGS carrots"), Some("10 KGS"));
    }

    #[test]
    fn test_longest_unit_wins() {
        let classifier = create_classifier();
        assert_eq!(classifier.find_quantity("4 boxes"), Some("4 boxes"));
        assert_eq!(classifier.find_quantity("4 packets"), Some("4 packets"));
    }

    #[test]
    fn test_invalid_special_pattern_is_rejected() {
        let mut config = QuantityPatternConfig::bundled().unwrap();
        config.special_patterns.push("([".to_string());
        assert!(matches!(
            QuantityClassifier::from_config(&config),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }
}
