//! # Noise Filter Module
//!
//! Decides whether a fragment is order-relevant at all.
//!
//! Classification runs an ordered list of rejections followed by an ordered list
//! of acceptances. The order matters: the length-based acceptance at the end
//! would admit phone numbers and dates if the rejections did not run first.

use regex::Regex;
use tracing::trace;

use crate::noise_patterns::{
    is_phone_like, BARE_DATE, BARE_TIME, DIGITS_AND_SYMBOLS, EMAIL, GREETING_WORDS,
    NON_PRODUCT_STARTS, SYMBOLS_ONLY, URL,
};
use crate::quantity::QuantityClassifier;

/// Why a fragment was rejected as noise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    SkipPattern,
    TooShort,
    NumericOnly,
    Greeting,
    Phone,
    Email,
    Url,
    SymbolsOnly,
    DateOrTime,
    NoLetters,
}

/// Outcome of classifying one fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    /// Accepted as an order line
    Item,
    /// Survived every rejection but is not an item: free-text notes
    Instruction,
    /// Not order-relevant
    Noise(Rejection),
}

/// Fragment classifier shared by the batch and incremental resolvers
#[derive(Debug, Clone)]
pub struct NoiseFilter {
    quantity: QuantityClassifier,
    skip: Option<Regex>,
    /// Lowercased specific-item synonyms
    specific_items: Vec<String>,
}

impl NoiseFilter {
    pub fn new(quantity: QuantityClassifier, skip: Option<Regex>, specific_items: &[String]) -> Self {
        Self {
            quantity,
            skip,
            specific_items: specific_items
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Whether the fragment should become an order item
    pub fn is_likely_order_item(&self, fragment: &str) -> bool {
        self.classify(fragment) == FragmentKind::Item
    }

    /// Classify a fragment as item, instruction or noise
    pub fn classify(&self, fragment: &str) -> FragmentKind {
        let kind = match self.reject(fragment) {
            Some(reason) => FragmentKind::Noise(reason),
            None if self.accept(fragment.trim()) => FragmentKind::Item,
            None => FragmentKind::Instruction,
        };
        trace!(fragment = %fragment, ?kind, "Classified fragment");
        kind
    }

    fn reject(&self, fragment: &str) -> Option<Rejection> {
        let text = fragment.trim();

        if text.is_empty() {
            return Some(Rejection::Empty);
        }
        if self.skip.as_ref().is_some_and(|skip| skip.is_match(text)) {
            return Some(Rejection::SkipPattern);
        }
        if text.chars().count() < 3 {
            return Some(Rejection::TooShort);
        }
        if DIGITS_AND_SYMBOLS.is_match(text) {
            return Some(Rejection::NumericOnly);
        }
        if is_greeting(text) {
            return Some(Rejection::Greeting);
        }
        if is_phone_like(text) {
            return Some(Rejection::Phone);
        }
        if EMAIL.is_match(text) {
            return Some(Rejection::Email);
        }
        if URL.is_match(text) {
            return Some(Rejection::Url);
        }
        if SYMBOLS_ONLY.is_match(text) {
            return Some(Rejection::SymbolsOnly);
        }
        if BARE_TIME.is_match(text) || BARE_DATE.is_match(text) {
            return Some(Rejection::DateOrTime);
        }
        if !text.chars().any(char::is_alphabetic) {
            return Some(Rejection::NoLetters);
        }

        None
    }

    fn accept(&self, text: &str) -> bool {
        if self.quantity.looks_like_quantity_item(text) {
            return true;
        }

        let lower = text.to_lowercase();
        if self.specific_items.iter().any(|item| lower.contains(item.as_str())) {
            return true;
        }

        let len = text.chars().count();
        (4..=50).contains(&len)
            && text.chars().any(char::is_alphabetic)
            && !NON_PRODUCT_STARTS.iter().any(|start| lower.starts_with(start))
    }

    /// The quantity classifier this filter accepts with
    pub fn quantity(&self) -> &QuantityClassifier {
        &self.quantity
    }
}

fn is_greeting(text: &str) -> bool {
    let word = text
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    !word.is_empty()
        && !word.contains(char::is_whitespace)
        && GREETING_WORDS.contains(&word.as_str())
}
