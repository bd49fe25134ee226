//! # Chat Orders
//!
//! Turns a chronologically ordered stream of chat messages, as relayed from
//! WhatsApp groups, into one consolidated order per company.
//!
//! The batch entry point is [`OrderParser::resolve_batch`]; live, forwarder-mode
//! chats go through an [`IncrementalSession`]. Both share the same alias
//! resolver, quantity classifier and noise filter.

pub mod alias_resolver;
pub mod config;
pub mod consolidator;
pub mod errors;
pub mod incremental;
pub mod noise_filter;
pub mod noise_patterns;
pub mod order_model;
pub mod pipeline;
pub mod quantity;
pub mod resolver;
pub mod segmenter;
pub mod timestamps;

pub use config::{CompanyAliasTable, ForwarderConfig, QuantityPatternConfig};
pub use errors::{ConfigError, ConfigResult};
pub use incremental::{IncrementalSession, LineOutcome};
pub use order_model::{ChatLine, Order, OrderBatch};
pub use pipeline::OrderParser;
