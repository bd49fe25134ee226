//! Forwarder-mode resolution, one line at a time.
//!
//! An [`IncrementalSession`] carries the current label, its timestamp, a buffer of
//! fragments nobody has claimed yet and the live order per company. Lines must be
//! fed in arrival order: there is no lookahead, so an item line that precedes its
//! label sits in the pending buffer until the label shows up.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::ForwarderConfig;
use crate::errors::{ConfigError, ConfigResult};
use crate::order_model::{ChatLine, Order};
use crate::pipeline::OrderParser;
use crate::timestamps::parse_timestamp_ms;

/// Bare-name labels longer than this are treated as prose
const MAX_LABEL_WORDS: usize = 5;

/// What a single ingested line did to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// Unparseable, not from a forwarder, or nothing order-relevant in it
    Ignored,
    /// The line carried a company label; `items_added` counts flushed and
    /// attributed items for that company
    Label { company: String, items_added: usize },
    /// Items went to the current label's order
    Attributed { company: String, items_added: usize },
    /// Items were held back; `pending` is the buffer size afterwards
    Buffered { pending: usize },
}

/// Carried-over session state, serializable so a host can snapshot it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub current_label: Option<String>,
    pub last_label_ts_ms: Option<i64>,
    pub pending: Vec<String>,
    pub orders: Vec<Order>,
}

/// A recognised label and the item it may carry ("add 2kg carrots to X")
#[derive(Debug)]
struct LabelMatch {
    company: String,
    item: Option<String>,
}

/// Stateful resolver for live, forwarder-relayed chats
#[derive(Debug, Clone)]
pub struct IncrementalSession {
    parser: Arc<OrderParser>,
    forwarders: ForwarderConfig,
    state: SessionState,
    index_by_company: HashMap<String, usize>,
}

impl IncrementalSession {
    /// Start a session; an empty forwarder allowlist disables forwarder mode
    pub fn new(parser: Arc<OrderParser>, forwarders: ForwarderConfig) -> ConfigResult<Self> {
        if forwarders.forwarders.iter().all(|f| f.trim().is_empty()) {
            return Err(ConfigError::NoForwarders);
        }

        Ok(Self {
            parser,
            forwarders,
            state: SessionState::default(),
            index_by_company: HashMap::new(),
        })
    }

    /// Resume from a previously captured state
    pub fn with_state(mut self, state: SessionState) -> Self {
        self.index_by_company = state
            .orders
            .iter()
            .enumerate()
            .map(|(i, order)| (order.company_name.clone(), i))
            .collect();
        self.state = state;
        self
    }

    /// Process one raw chat line
    pub fn ingest(&mut self, raw_line: &str) -> LineOutcome {
        let Some(line) = self.parser.segmenter().segment(raw_line) else {
            return LineOutcome::Ignored;
        };

        let from_forwarder = line
            .sender
            .as_deref()
            .is_some_and(|sender| self.forwarders.is_forwarder(sender));
        if !from_forwarder {
            trace!(sender = ?line.sender, "Ignoring line from non-forwarder");
            return LineOutcome::Ignored;
        }

        self.ingest_line(&line)
    }

    /// Process an already segmented line; the sender is not checked
    pub fn ingest_line(&mut self, line: &ChatLine) -> LineOutcome {
        let now_ms = parse_timestamp_ms(&line.timestamp);
        let mut label: Option<String> = None;
        let mut added = 0;
        let mut attributed_to: Option<String> = None;
        let mut buffered = false;

        for fragment in self.parser.segmenter().fragments(&line.text) {
            if let Some(found) = self.detect_label(&fragment) {
                added += self.open_label(&found.company, now_ms, &line.timestamp);
                if let Some(item) = found.item {
                    if self.parser.noise_filter().is_likely_order_item(&item) {
                        self.push_item(&found.company, item);
                        added += 1;
                    }
                }
                label = Some(found.company);
                continue;
            }

            if !self.parser.noise_filter().is_likely_order_item(&fragment) {
                trace!(fragment = %fragment, "Dropping non-item fragment");
                continue;
            }

            match self.attributable_label(now_ms) {
                Some(company) => {
                    self.push_item(&company, fragment);
                    added += 1;
                    attributed_to = Some(company);
                }
                None => {
                    trace!(fragment = %fragment, "Buffering fragment without a live label");
                    self.state.pending.push(fragment);
                    buffered = true;
                }
            }
        }

        match (label, attributed_to) {
            (Some(company), _) => LineOutcome::Label {
                company,
                items_added: added,
            },
            (None, Some(company)) => LineOutcome::Attributed {
                company,
                items_added: added,
            },
            (None, None) if buffered => LineOutcome::Buffered {
                pending: self.state.pending.len(),
            },
            (None, None) => LineOutcome::Ignored,
        }
    }

    /// Live orders in the order their companies were first labelled
    pub fn orders(&self) -> &[Order] {
        &self.state.orders
    }

    pub fn order_for(&self, company_name: &str) -> Option<&Order> {
        self.index_by_company
            .get(company_name)
            .map(|&i| &self.state.orders[i])
    }

    /// Fragments still waiting for a label
    pub fn pending(&self) -> &[String] {
        &self.state.pending
    }

    pub fn current_label(&self) -> Option<&str> {
        self.state.current_label.as_deref()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Drop all carried-over state
    pub fn reset(&mut self) {
        self.state = SessionState::default();
        self.index_by_company.clear();
    }

    /// Recognise a company label: an add-to phrase, or a short bare name
    fn detect_label(&self, fragment: &str) -> Option<LabelMatch> {
        let aliases = self.parser.aliases();
        let commands = self.parser.commands();

        if let Some(captures) = commands.add_to_order.captures(fragment) {
            let company = captures.name("company").map(|m| m.as_str()).unwrap_or("");
            if let Some(company) = self.resolve_label_company(company) {
                let item = captures
                    .name("item")
                    .map(|m| self.parser.segmenter().correct(m.as_str()));
                return Some(LabelMatch { company, item });
            }
        }

        if let Some(captures) = commands.please_add_to.captures(fragment) {
            let company = captures.name("company").map(|m| m.as_str()).unwrap_or("");
            if let Some(company) = self.resolve_label_company(company) {
                return Some(LabelMatch { company, item: None });
            }
        }

        let is_bare_name = !fragment.chars().any(|c| c.is_ascii_digit())
            && fragment.split_whitespace().count() <= MAX_LABEL_WORDS
            && !self.parser.quantity().looks_like_quantity_item(fragment);
        if !is_bare_name {
            return None;
        }

        aliases
            .canonicalize(fragment)
            .or_else(|| aliases.find_company_by_containment(fragment))
            .map(|company| LabelMatch { company, item: None })
    }

    /// Make `company` the current label and flush the pending buffer into it
    fn open_label(&mut self, company: &str, now_ms: Option<i64>, timestamp: &str) -> usize {
        self.state.current_label = Some(company.to_string());
        self.state.last_label_ts_ms = now_ms;

        let index = self.order_index(company, timestamp);
        let pending = std::mem::take(&mut self.state.pending);
        let order = &mut self.state.orders[index];
        let mut flushed = 0;
        for fragment in &pending {
            if order.push_item_once(fragment) {
                flushed += 1;
            }
        }

        debug!(company = %company, flushed, "Opened label");
        flushed
    }

    /// The current label, if the line falls inside its attribution window
    fn attributable_label(&self, now_ms: Option<i64>) -> Option<String> {
        let label = self.state.current_label.as_ref()?;
        let within_window = match (now_ms, self.state.last_label_ts_ms) {
            // A line stamped before its label (clock wrap, replay) is outside
            (Some(now), Some(opened)) => {
                (0..=self.forwarders.timeout_ms()).contains(&now.saturating_sub(opened))
            }
            // Unparseable stamps cannot be measured; keep attributing
            _ => true,
        };
        within_window.then(|| label.clone())
    }

    fn order_index(&mut self, company: &str, timestamp: &str) -> usize {
        if let Some(&i) = self.index_by_company.get(company) {
            return i;
        }
        self.state.orders.push(Order::new(company, timestamp));
        let i = self.state.orders.len() - 1;
        self.index_by_company.insert(company.to_string(), i);
        i
    }

    fn resolve_label_company(&self, company: &str) -> Option<String> {
        let aliases = self.parser.aliases();
        aliases
            .canonicalize(company)
            .or_else(|| aliases.find_company_by_containment(company))
    }

    fn push_item(&mut self, company: &str, item: String) {
        if let Some(&i) = self.index_by_company.get(company) {
            self.state.orders[i].items_text.push(item);
        }
    }
}
