//! # Order Consolidator Module
//!
//! Merges partial orders sharing a canonical company name into one order per company.

use std::collections::HashMap;
use tracing::debug;

use crate::order_model::Order;

/// Merge partial orders by company name
///
/// The first order seen for a company becomes the consolidated entry; later ones
/// have their items and instructions appended (duplicates are kept) and replace
/// the timestamp when theirs sorts lexicographically earlier. Output follows the
/// order in which companies were first seen.
pub fn consolidate(partial_orders: Vec<Order>) -> Vec<Order> {
    let incoming = partial_orders.len();
    let mut merged: Vec<Order> = Vec::new();
    let mut index_by_company: HashMap<String, usize> = HashMap::new();

    for order in partial_orders {
        match index_by_company.get(&order.company_name) {
            Some(&i) => {
                let existing = &mut merged[i];
                existing.items_text.extend(order.items_text);
                existing.instructions.extend(order.instructions);
                // Raw string comparison, not a parsed instant
                if order.timestamp < existing.timestamp {
                    existing.timestamp = order.timestamp;
                }
            }
            None => {
                index_by_company.insert(order.company_name.clone(), merged.len());
                merged.push(order);
            }
        }
    }

    debug!(incoming, consolidated = merged.len(), "Consolidated partial orders");
    merged
}
