//! # Order Data Model
//!
//! Data structures flowing through the resolver: raw chat lines coming in and
//! per-company orders going out.
//!
//! ## Core Concepts
//!
//! - **ChatLine**: one message as extracted from the chat source
//! - **Order**: a company with its item lines and free-text instructions
//! - **OrderBatch**: the output of one batch resolution pass

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One raw message from the chat source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLine {
    /// Timestamp exactly as rendered by the chat export
    pub timestamp: String,
    /// Account that posted the line, when the format carries one
    pub sender: Option<String>,
    /// Message body, possibly spanning several lines
    pub text: String,
}

impl ChatLine {
    pub fn new(timestamp: &str, sender: Option<&str>, text: &str) -> Self {
        Self {
            timestamp: timestamp.to_string(),
            sender: sender.map(str::to_string),
            text: text.to_string(),
        }
    }
}

/// A purchase order resolved for one company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Canonical company name, never a raw alias
    pub company_name: String,

    /// Item lines in insertion order
    pub items_text: Vec<String>,

    /// Free-text notes that are not items
    pub instructions: Vec<String>,

    /// Earliest timestamp among the merged source messages
    pub timestamp: String,

    /// Item index → removed flag, owned by the review UI
    #[serde(default)]
    pub removed: BTreeMap<usize, bool>,

    /// Set by the review UI once a human has checked the order
    #[serde(default)]
    pub verified: bool,
}

impl Order {
    /// Create an empty order for a canonical company name
    pub fn new(company_name: &str, timestamp: &str) -> Self {
        Self {
            company_name: company_name.to_string(),
            items_text: Vec::new(),
            instructions: Vec::new(),
            timestamp: timestamp.to_string(),
            removed: BTreeMap::new(),
            verified: false,
        }
    }

    /// Add item lines
    pub fn with_items<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.items_text.extend(items.into_iter().map(Into::into));
        self
    }

    /// Add instruction lines
    pub fn with_instructions<I, S>(mut self, instructions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instructions.extend(instructions.into_iter().map(Into::into));
        self
    }

    pub fn has_item(&self, item: &str) -> bool {
        self.items_text.iter().any(|existing| existing == item)
    }

    /// Append `item` unless the exact string is already present; returns whether it was added
    pub fn push_item_once(&mut self, item: &str) -> bool {
        if self.has_item(item) {
            return false;
        }
        self.items_text.push(item.to_string());
        true
    }

    pub fn is_empty(&self) -> bool {
        self.items_text.is_empty() && self.instructions.is_empty()
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.company_name, self.timestamp)?;
        for item in &self.items_text {
            write!(f, "\n  - {item}")?;
        }
        for note in &self.instructions {
            write!(f, "\n  note: {note}")?;
        }
        Ok(())
    }
}

/// Output of one batch resolution pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBatch {
    pub orders: Vec<Order>,
}

impl OrderBatch {
    pub fn order_for(&self, company_name: &str) -> Option<&Order> {
        self.orders.iter().find(|o| o.company_name == company_name)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_order_defaults() {
        let order = Order::new("Casa Bella", "09:00");
        assert!(order.is_empty());
        assert!(order.removed.is_empty());
        assert!(!order.verified);
    }

    #[test]
    fn test_push_item_once() {
        let mut order = Order::new("Casa Bella", "09:00").with_items(["2kg carrots"]);
        assert!(!order.push_item_once("2kg carrots"));
        assert!(order.push_item_once("3kg carrots"));
        assert_eq!(order.items_text, vec!["2kg carrots", "3kg carrots"]);
    }

    #[test]
    fn test_order_serialization() {
        let order = Order::new("Mungers", "08:30")
            .with_items(["5kg tomatoes"])
            .with_instructions(["deliver before 9"]);
        let json = serde_json::to_string(&OrderBatch { orders: vec![order.clone()] }).unwrap();
        assert!(json.contains("\"company_name\":\"Mungers\""));
        assert!(json.contains("\"items_text\":[\"5kg tomatoes\"]"));

        let decoded: OrderBatch = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.order_for("Mungers"), Some(&order));
    }

    #[test]
    fn test_display() {
        let order = Order::new("Mungers", "08:30")
            .with_items(["5kg tomatoes"])
            .with_instructions(["deliver before 9"]);
        let rendered = order.to_string();
        assert!(rendered.starts_with("Mungers (08:30)"));
        assert!(rendered.contains("  - 5kg tomatoes"));
        assert!(rendered.contains("  note: deliver before 9"));
    }
}
