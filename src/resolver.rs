//! # Pattern-Matching Resolution Engine
//!
//! Turns an ordered batch of chat lines into partial (pre-consolidation) orders.
//!
//! ## Passes
//!
//! 1. **Items then label**: message `i` carries quantities and message `i+1` is a
//!    lone company name. Runs over the whole batch before anything else.
//! 2. Per unclaimed message, first match wins:
//!    a. label then items (lookback to `i-1`)
//!    b. `add <item> to <company>` directive
//!    c. multi-line `please add to <company>`
//!    d. inline company mention plus items in one message
//!    e. `[IMAGE: <path>]` placeholder attached to the latest order
//!
//! A message index can be claimed by exactly one pattern. Claims are handed out
//! by [`MessageLedger`] and consumed when the match is recorded, so a pattern
//! cannot act on a message without first owning it.

use tracing::{debug, trace};

use crate::alias_resolver::AliasResolver;
use crate::config::CommandPatterns;
use crate::noise_filter::{FragmentKind, NoiseFilter};
use crate::noise_patterns::is_phone_like;
use crate::order_model::{ChatLine, Order};
use crate::segmenter::Segmenter;

/// The structural pattern that claimed a set of messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    ItemsThenLabel,
    LabelThenItems,
    AddToDirective,
    PleaseAddTo,
    InlineCompany,
    ImagePlaceholder,
}

/// Exclusive ownership of one or more message indices
///
/// Only [`MessageLedger::claim`] creates claims, and a claim cannot be copied.
#[derive(Debug)]
pub struct Claim {
    indices: Vec<usize>,
}

impl Claim {
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

/// Tracks which message indices have been claimed during one run
#[derive(Debug)]
pub struct MessageLedger {
    claimed: Vec<bool>,
}

impl MessageLedger {
    pub fn new(len: usize) -> Self {
        Self {
            claimed: vec![false; len],
        }
    }

    pub fn is_claimed(&self, index: usize) -> bool {
        self.claimed.get(index).copied().unwrap_or(true)
    }

    /// Claim every index or none of them
    pub fn claim(&mut self, indices: &[usize]) -> Option<Claim> {
        if indices.iter().any(|&i| self.is_claimed(i)) {
            return None;
        }
        for &i in indices {
            self.claimed[i] = true;
        }
        Some(Claim {
            indices: indices.to_vec(),
        })
    }

    /// Indices no pattern claimed
    pub fn unclaimed(&self) -> Vec<usize> {
        self.claimed
            .iter()
            .enumerate()
            .filter(|(_, claimed)| !**claimed)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Record of which pattern consumed which messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRecord {
    pub pattern: PatternKind,
    pub indices: Vec<usize>,
}

/// Output of a resolution run before consolidation
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub orders: Vec<Order>,
    pub claims: Vec<ClaimRecord>,
    /// Messages that contributed to no order
    pub unclaimed: Vec<usize>,
}

impl Resolution {
    fn record(&mut self, claim: Claim, pattern: PatternKind) {
        debug!(?pattern, indices = ?claim.indices, "Pattern claimed messages");
        self.claims.push(ClaimRecord {
            pattern,
            indices: claim.indices,
        });
    }

    fn push_order(&mut self, order: Order, claim: Claim, pattern: PatternKind) {
        self.orders.push(order);
        self.record(claim, pattern);
    }

    /// Most recent order for `company`, searching backwards
    fn latest_order_mut(&mut self, company: &str) -> Option<&mut Order> {
        self.orders
            .iter_mut()
            .rev()
            .find(|o| o.company_name == company)
    }
}

/// A chat line with its fragments and derived facts computed once
struct Message<'l> {
    line: &'l ChatLine,
    fragments: Vec<String>,
    /// Company named by a single-fragment message
    label: Option<String>,
    has_quantity: bool,
}

/// Batch resolver over borrowed, shared components
pub struct BatchResolver<'a> {
    aliases: &'a AliasResolver,
    filter: &'a NoiseFilter,
    segmenter: &'a Segmenter,
    commands: &'a CommandPatterns,
}

impl<'a> BatchResolver<'a> {
    pub fn new(
        aliases: &'a AliasResolver,
        filter: &'a NoiseFilter,
        segmenter: &'a Segmenter,
        commands: &'a CommandPatterns,
    ) -> Self {
        Self {
            aliases,
            filter,
            segmenter,
            commands,
        }
    }

    /// Resolve lines into partial orders
    pub fn resolve(&self, lines: &[ChatLine]) -> Vec<Order> {
        self.resolve_traced(lines).orders
    }

    /// Resolve lines, also reporting which pattern claimed which messages
    pub fn resolve_traced(&self, lines: &[ChatLine]) -> Resolution {
        let messages: Vec<Message> = lines.iter().map(|line| self.prepare(line)).collect();
        let mut ledger = MessageLedger::new(messages.len());
        let mut resolution = Resolution::default();

        for i in 0..messages.len().saturating_sub(1) {
            self.items_then_label(&messages, i, &mut ledger, &mut resolution);
        }

        for i in 0..messages.len() {
            if ledger.is_claimed(i) {
                continue;
            }
            if self.label_then_items(&messages, i, &mut ledger, &mut resolution)
                || self.add_to_directive(&messages, i, &mut ledger, &mut resolution)
                || self.please_add_to(&messages, i, &mut ledger, &mut resolution)
                || self.inline_company(&messages, i, &mut ledger, &mut resolution)
                || self.image_placeholder(&messages, i, &mut ledger, &mut resolution)
            {
                continue;
            }
            trace!(index = i, "No pattern matched message");
        }

        resolution.unclaimed = ledger.unclaimed();
        resolution
    }

    fn prepare<'l>(&self, line: &'l ChatLine) -> Message<'l> {
        let fragments = self.segmenter.fragments(&line.text);
        let label = match fragments.as_slice() {
            [only] => self.aliases.canonicalize(only),
            _ => None,
        };
        let has_quantity = fragments
            .iter()
            .any(|f| self.filter.quantity().looks_like_quantity_item(f));

        Message {
            line,
            fragments,
            label,
            has_quantity,
        }
    }

    /// Split fragments into items and instructions for `company`
    fn build_order<'f>(
        &self,
        company: &str,
        fragments: impl IntoIterator<Item = &'f String>,
        timestamp: &str,
        sender: Option<&str>,
    ) -> Order {
        let mut order = Order::new(company, timestamp);

        for fragment in fragments {
            // Labels and other company mentions are never items or notes
            if self.aliases.is_company_name(fragment) {
                continue;
            }
            match self.filter.classify(fragment) {
                FragmentKind::Item => order.items_text.push(fragment.clone()),
                FragmentKind::Instruction => {
                    let is_sender = sender.is_some_and(|s| s.eq_ignore_ascii_case(fragment));
                    if !is_sender && !is_phone_like(fragment) {
                        order.instructions.push(fragment.clone());
                    }
                }
                FragmentKind::Noise(_) => {}
            }
        }

        order
    }

    fn items_then_label(
        &self,
        messages: &[Message],
        i: usize,
        ledger: &mut MessageLedger,
        resolution: &mut Resolution,
    ) {
        if ledger.is_claimed(i) || ledger.is_claimed(i + 1) {
            return;
        }
        let (current, next) = (&messages[i], &messages[i + 1]);
        let Some(company) = next.label.as_deref() else {
            return;
        };
        if !current.has_quantity {
            return;
        }

        let order = self.build_order(
            company,
            &current.fragments,
            &current.line.timestamp,
            current.line.sender.as_deref(),
        );
        if order.items_text.is_empty() {
            return;
        }
        if let Some(claim) = ledger.claim(&[i, i + 1]) {
            resolution.push_order(order, claim, PatternKind::ItemsThenLabel);
        }
    }

    fn label_then_items(
        &self,
        messages: &[Message],
        i: usize,
        ledger: &mut MessageLedger,
        resolution: &mut Resolution,
    ) -> bool {
        if i == 0 || ledger.is_claimed(i - 1) {
            return false;
        }
        let (previous, current) = (&messages[i - 1], &messages[i]);
        let Some(company) = previous.label.as_deref() else {
            return false;
        };
        if !current.has_quantity || self.aliases.match_company_in_text(&current.line.text).is_some() {
            return false;
        }

        let order = self.build_order(
            company,
            &current.fragments,
            &previous.line.timestamp,
            current.line.sender.as_deref(),
        );
        if order.items_text.is_empty() {
            return false;
        }
        match ledger.claim(&[i - 1, i]) {
            Some(claim) => {
                resolution.push_order(order, claim, PatternKind::LabelThenItems);
                true
            }
            None => false,
        }
    }

    fn add_to_directive(
        &self,
        messages: &[Message],
        i: usize,
        ledger: &mut MessageLedger,
        resolution: &mut Resolution,
    ) -> bool {
        let text = messages[i].line.text.trim();
        let Some(captures) = self.commands.add_to_order.captures(text) else {
            return false;
        };
        let (Some(item), Some(company)) = (captures.name("item"), captures.name("company")) else {
            return false;
        };
        let Some(company) = self.aliases.canonicalize(company.as_str()) else {
            return false;
        };
        let Some(claim) = ledger.claim(&[i]) else {
            return false;
        };

        let item = self.segmenter.correct(item.as_str());
        match resolution.latest_order_mut(&company) {
            Some(order) => {
                if self.filter.is_likely_order_item(&item) && !order.has_item(&item) {
                    order.items_text.push(item);
                }
            }
            None => debug!(company = %company, "No existing order to add directive item to"),
        }
        resolution.record(claim, PatternKind::AddToDirective);
        true
    }

    fn please_add_to(
        &self,
        messages: &[Message],
        i: usize,
        ledger: &mut MessageLedger,
        resolution: &mut Resolution,
    ) -> bool {
        let message = &messages[i];
        let Some((directive_index, company)) =
            message.fragments.iter().enumerate().find_map(|(j, fragment)| {
                let captures = self.commands.please_add_to.captures(fragment)?;
                Some((j, captures.name("company")?.as_str().to_string()))
            })
        else {
            return false;
        };
        let Some(company) = self.aliases.canonicalize(&company) else {
            return false;
        };

        let additions: Vec<&String> = message
            .fragments
            .iter()
            .enumerate()
            .filter(|(j, fragment)| {
                *j != directive_index
                    && !self.aliases.is_company_name(fragment)
                    && self.filter.quantity().looks_like_quantity_item(fragment)
            })
            .map(|(_, fragment)| fragment)
            .collect();
        if additions.is_empty() {
            return false;
        }
        let Some(claim) = ledger.claim(&[i]) else {
            return false;
        };

        match resolution.latest_order_mut(&company) {
            Some(order) => {
                for fragment in additions {
                    order.push_item_once(fragment);
                }
                resolution.record(claim, PatternKind::PleaseAddTo);
            }
            None => {
                let mut order = Order::new(&company, &message.line.timestamp);
                for fragment in additions {
                    order.push_item_once(fragment);
                }
                resolution.push_order(order, claim, PatternKind::PleaseAddTo);
            }
        }
        true
    }

    fn inline_company(
        &self,
        messages: &[Message],
        i: usize,
        ledger: &mut MessageLedger,
        resolution: &mut Resolution,
    ) -> bool {
        let message = &messages[i];
        if message.fragments.len() < 2 {
            return false;
        }
        let Some(company) = self.aliases.match_company_in_text(&message.line.text) else {
            return false;
        };
        if messages.get(i + 1).is_some_and(|next| next.label.is_some()) {
            return false;
        }
        let Some(claim) = ledger.claim(&[i]) else {
            return false;
        };

        let order = self.build_order(
            &company,
            &message.fragments,
            &message.line.timestamp,
            message.line.sender.as_deref(),
        );
        resolution.push_order(order, claim, PatternKind::InlineCompany);
        true
    }

    fn image_placeholder(
        &self,
        messages: &[Message],
        i: usize,
        ledger: &mut MessageLedger,
        resolution: &mut Resolution,
    ) -> bool {
        let Some(captures) = self.commands.image_placeholder.captures(&messages[i].line.text) else {
            return false;
        };
        let Some(path) = captures.name("path") else {
            return false;
        };
        if resolution.orders.is_empty() {
            debug!(index = i, "Image placeholder with no order to attach to");
            return false;
        }
        let Some(claim) = ledger.claim(&[i]) else {
            return false;
        };

        let entry = format!("[IMAGE: {}]", path.as_str().trim());
        if let Some(order) = resolution.orders.last_mut() {
            order.push_item_once(&entry);
        }
        resolution.record(claim, PatternKind::ImagePlaceholder);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::OrderParser;

    fn lines(texts: &[&str]) -> Vec<ChatLine> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| ChatLine::new(&format!("09:{:02}", i), None, text))
            .collect()
    }

    fn patterns(resolution: &Resolution) -> Vec<PatternKind> {
        resolution.claims.iter().map(|c| c.pattern).collect()
    }

    #[test]
    fn test_ledger_claims_are_exclusive() {
        let mut ledger = MessageLedger::new(3);
        let claim = ledger.claim(&[0, 1]).unwrap();
        assert_eq!(claim.indices(), &[0, 1]);
        assert!(ledger.claim(&[1, 2]).is_none());
        // A failed claim leaves the free index untouched
        assert!(!ledger.is_claimed(2));
        assert!(ledger.claim(&[2]).is_some());
        assert!(ledger.claim(&[3]).is_none());
        assert!(ledger.unclaimed().is_empty());
    }

    #[test]
    fn test_items_then_label() {
        let parser = OrderParser::bundled().unwrap();
        let resolver = parser.batch_resolver();
        let resolution = resolver.resolve_traced(&lines(&["5kg tomatoes\n3 onions", "Casa Bella"]));

        assert_eq!(resolution.orders.len(), 1);
        let order = &resolution.orders[0];
        assert_eq!(order.company_name, "Casa Bella");
        assert_eq!(order.items_text, vec!["5kg tomatoes", "3 onions"]);
        assert_eq!(order.timestamp, "09:00");
        assert_eq!(patterns(&resolution), vec![PatternKind::ItemsThenLabel]);
        assert!(resolution.unclaimed.is_empty());
    }

    #[test]
    fn test_items_then_label_beats_label_then_items() {
        let parser = OrderParser::bundled().unwrap();
        let resolver = parser.batch_resolver();
        // Message 1 could be read as items after label "Mungers" or before label "Casa Bella"
        let resolution =
            resolver.resolve_traced(&lines(&["Mungers", "2 boxes lettuce", "Casa Bella"]));

        assert_eq!(resolution.orders.len(), 1);
        assert_eq!(resolution.orders[0].company_name, "Casa Bella");
        assert_eq!(resolution.unclaimed, vec![0]);
    }

    #[test]
    fn test_label_then_items() {
        let parser = OrderParser::bundled().unwrap();
        let resolver = parser.batch_resolver();
        let resolution = resolver.resolve_traced(&lines(&[
            "Casa Bella",
            "2 boxes lettuce\nplease call on arrival",
        ]));

        assert_eq!(patterns(&resolution), vec![PatternKind::LabelThenItems]);
        let order = &resolution.orders[0];
        assert_eq!(order.timestamp, "09:00");
        assert_eq!(order.items_text, vec!["2 boxes lettuce"]);
        assert_eq!(order.instructions, vec!["please call on arrival"]);
    }

    #[test]
    fn test_label_then_items_yields_to_inline_company() {
        let parser = OrderParser::bundled().unwrap();
        let resolver = parser.batch_resolver();
        let resolution = resolver.resolve_traced(&lines(&["Casa Bella", "Mungers\n5kg potatoes"]));

        assert_eq!(patterns(&resolution), vec![PatternKind::InlineCompany]);
        assert_eq!(resolution.orders.len(), 1);
        assert_eq!(resolution.orders[0].company_name, "Mungers");
        assert_eq!(resolution.orders[0].items_text, vec!["5kg potatoes"]);
        assert_eq!(resolution.unclaimed, vec![0]);
    }

    #[test]
    fn test_company_fragments_are_never_items() {
        let parser = OrderParser::bundled().unwrap();
        let resolver = parser.batch_resolver();
        let orders = resolver.resolve(&lines(&["Mungers\n5kg potatoes\nCasa Bella"]));

        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].company_name, "Mungers");
        assert_eq!(orders[0].items_text, vec!["5kg potatoes"]);
        assert!(orders[0].instructions.is_empty());
    }

    #[test]
    fn test_instructions_are_kept_separately() {
        let parser = OrderParser::bundled().unwrap();
        let resolver = parser.batch_resolver();
        let orders = resolver.resolve(&lines(&[
            "Casa Bella",
            "2 boxes lettuce\nplease confirm delivery time",
        ]));

        assert_eq!(orders[0].items_text, vec!["2 boxes lettuce"]);
        assert_eq!(orders[0].instructions, vec!["please confirm delivery time"]);
    }

    #[test]
    fn test_add_to_directive_suppresses_exact_duplicates() {
        let parser = OrderParser::bundled().unwrap();
        let resolver = parser.batch_resolver();
        let orders = resolver.resolve(&lines(&[
            "5kg tomatoes",
            "Casa Bella",
            "add 2kg carrots to Casa Bella",
            "add 2kg carrots to Casa Bella",
            "add 3kg carrots to Casa Bella",
        ]));

        assert_eq!(orders.len(), 1);
        assert_eq!(
            orders[0].items_text,
            vec!["5kg tomatoes", "2kg carrots", "3kg carrots"]
        );
    }

    #[test]
    fn test_add_to_directive_without_existing_order() {
        let parser = OrderParser::bundled().unwrap();
        let resolver = parser.batch_resolver();
        let resolution = resolver.resolve_traced(&lines(&["add 2kg carrots to Mungers"]));

        assert!(resolution.orders.is_empty());
        assert_eq!(patterns(&resolution), vec![PatternKind::AddToDirective]);
    }

    #[test]
    fn test_please_add_to_creates_or_extends() {
        let parser = OrderParser::bundled().unwrap();
        let resolver = parser.batch_resolver();
        let orders = resolver.resolve(&lines(&[
            "4 trays eggs\n2 bunches mint\nplease add to Mungers",
            "2 bunches mint\n1 box lemons\nPlease add to Mungers boxes",
        ]));

        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].company_name, "Mungers");
        assert_eq!(
            orders[0].items_text,
            vec!["4 trays eggs", "2 bunches mint", "1 box lemons"]
        );
    }

    #[test]
    fn test_please_add_to_skips_company_fragments() {
        let parser = OrderParser::bundled().unwrap();
        let resolver = parser.batch_resolver();
        // "casa bella 2" carries a digit but names a company
        let orders = resolver.resolve(&lines(&[
            "2 boxes lemons\ncasa bella 2\nplease add to Casa Bella",
        ]));

        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].company_name, "Casa Bella");
        assert_eq!(orders[0].items_text, vec!["2 boxes lemons"]);
    }

    #[test]
    fn test_inline_company_is_pushed_even_without_items() {
        let parser = OrderParser::bundled().unwrap();
        let resolver = parser.batch_resolver();
        let resolution = resolver.resolve_traced(&lines(&["Mungers\nthank you"]));

        assert_eq!(patterns(&resolution), vec![PatternKind::InlineCompany]);
        assert_eq!(resolution.orders[0].company_name, "Mungers");
        assert!(resolution.orders[0].items_text.is_empty());
    }

    #[test]
    fn test_inline_company_yields_to_following_label() {
        let parser = OrderParser::bundled().unwrap();
        let resolver = parser.batch_resolver();
        let resolution = resolver.resolve_traced(&lines(&[
            "Mungers\ncall me",
            "Casa Bella",
        ]));

        assert!(resolution.orders.is_empty());
        assert_eq!(resolution.unclaimed, vec![0, 1]);
    }

    #[test]
    fn test_inline_company_with_items() {
        let parser = OrderParser::bundled().unwrap();
        let resolver = parser.batch_resolver();
        let orders = resolver.resolve(&lines(&["Mungers\n5kg potatoes\n2 heads cabbage"]));

        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].items_text, vec!["5kg potatoes", "2 heads cabbage"]);
    }

    #[test]
    fn test_image_placeholder_attaches_once() {
        let parser = OrderParser::bundled().unwrap();
        let resolver = parser.batch_resolver();
        let resolution = resolver.resolve_traced(&lines(&[
            "5kg tomatoes",
            "Casa Bella",
            "[IMAGE: /images/order_image_123.jpg]",
            "[IMAGE: /images/order_image_123.jpg]",
        ]));

        let images: Vec<&String> = resolution.orders[0]
            .items_text
            .iter()
            .filter(|i| i.starts_with("[IMAGE:"))
            .collect();
        assert_eq!(images, vec!["[IMAGE: /images/order_image_123.jpg]"]);
        assert_eq!(resolution.claims.len(), 3);
    }

    #[test]
    fn test_image_placeholder_without_orders_is_dropped() {
        let parser = OrderParser::bundled().unwrap();
        let resolver = parser.batch_resolver();
        let resolution = resolver.resolve_traced(&lines(&["[IMAGE: /images/a.jpg]"]));
        assert!(resolution.orders.is_empty());
        assert_eq!(resolution.unclaimed, vec![0]);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let parser = OrderParser::bundled().unwrap();
        let resolver = parser.batch_resolver();
        let input = lines(&["5kg tomatoes", "Casa Bella", "Mungers", "2 boxes lettuce"]);
        assert_eq!(resolver.resolve(&input), resolver.resolve(&input));
    }
}
