//! # Order Parsing Pipeline
//!
//! [`OrderParser`] owns every compiled component (alias resolver, quantity
//! classifier, noise filter, segmenter, command patterns) and exposes the two
//! entry points over them:
//!
//! - [`OrderParser::resolve_batch`]: segment → resolve → consolidate over a full batch
//! - [`OrderParser::incremental_session`]: stateful, one line at a time
//!
//! Build it once at startup and share it; it is immutable after construction.

use std::sync::Arc;
use tracing::{info, warn};

use crate::alias_resolver::AliasResolver;
use crate::config::{
    compile_corrections, compile_skip_patterns, CommandPatterns, CompanyAliasTable,
    ForwarderConfig, QuantityPatternConfig,
};
use crate::consolidator::consolidate;
use crate::errors::ConfigResult;
use crate::incremental::IncrementalSession;
use crate::noise_filter::NoiseFilter;
use crate::order_model::{ChatLine, OrderBatch};
use crate::quantity::QuantityClassifier;
use crate::resolver::BatchResolver;
use crate::segmenter::{split_export, Segmenter};

/// Compiled, read-only resolver components
#[derive(Debug, Clone)]
pub struct OrderParser {
    aliases: AliasResolver,
    filter: NoiseFilter,
    segmenter: Segmenter,
    commands: CommandPatterns,
}

impl OrderParser {
    /// Compile every component from parsed configuration
    pub fn from_config(
        aliases: CompanyAliasTable,
        patterns: &QuantityPatternConfig,
    ) -> ConfigResult<Self> {
        patterns.validate()?;

        let commands = CommandPatterns::compile(&patterns.command_patterns)?;
        let skip = compile_skip_patterns(&patterns.skip_patterns)?;
        let corrections = compile_corrections(&patterns.quantity_corrections)?;
        let quantity = QuantityClassifier::from_config(patterns)?;

        info!(
            companies = aliases.companies().len(),
            corrections = corrections.len(),
            "Order parser configured"
        );

        Ok(Self {
            aliases: AliasResolver::new(aliases, commands.normalize.clone()),
            filter: NoiseFilter::new(quantity, skip.clone(), &patterns.specific_items),
            segmenter: Segmenter::new(commands.whatsapp_message.clone(), skip, corrections),
            commands,
        })
    }

    /// Parser built from the configuration shipped with the crate
    pub fn bundled() -> ConfigResult<Self> {
        Self::from_config(CompanyAliasTable::bundled()?, &QuantityPatternConfig::bundled()?)
    }

    pub fn aliases(&self) -> &AliasResolver {
        &self.aliases
    }

    pub fn noise_filter(&self) -> &NoiseFilter {
        &self.filter
    }

    pub fn quantity(&self) -> &QuantityClassifier {
        self.filter.quantity()
    }

    pub fn segmenter(&self) -> &Segmenter {
        &self.segmenter
    }

    pub fn commands(&self) -> &CommandPatterns {
        &self.commands
    }

    /// Resolver over this parser's components
    pub fn batch_resolver(&self) -> BatchResolver<'_> {
        BatchResolver::new(&self.aliases, &self.filter, &self.segmenter, &self.commands)
    }

    /// Segment raw lines, logging and skipping missing ones
    pub fn segment_lines<I, S>(&self, raw_lines: I) -> Vec<ChatLine>
    where
        I: IntoIterator<Item = Option<S>>,
        S: AsRef<str>,
    {
        raw_lines
            .into_iter()
            .enumerate()
            .filter_map(|(i, raw)| match raw {
                Some(raw) => self.segmenter.segment(raw.as_ref()),
                None => {
                    warn!(index = i, "Skipping missing chat line");
                    None
                }
            })
            .collect()
    }

    /// Resolve a full, chronologically ordered batch of raw lines
    ///
    /// Cross-message patterns depend on adjacency, so the whole batch must be
    /// passed at once; resolving chunks separately gives different results.
    pub fn resolve_batch<I, S>(&self, raw_lines: I) -> OrderBatch
    where
        I: IntoIterator<Item = Option<S>>,
        S: AsRef<str>,
    {
        let raw_lines: Vec<Option<S>> = raw_lines.into_iter().collect();
        let received = raw_lines.len();
        let lines = self.segment_lines(raw_lines);
        let partial = self.batch_resolver().resolve(&lines);
        let partial_count = partial.len();
        let orders = consolidate(partial);

        info!(
            received,
            segmented = lines.len(),
            partial = partial_count,
            orders = orders.len(),
            "Resolved chat batch"
        );

        OrderBatch { orders }
    }

    /// Resolve a plain-text chat export
    pub fn resolve_export(&self, export: &str) -> OrderBatch {
        self.resolve_batch(split_export(export).into_iter().map(Some))
    }

    /// Resolve already segmented chat lines
    pub fn resolve_chat_lines(&self, lines: &[ChatLine]) -> OrderBatch {
        OrderBatch {
            orders: consolidate(self.batch_resolver().resolve(lines)),
        }
    }

    /// Start a forwarder-mode session sharing this parser
    pub fn incremental_session(
        self: &Arc<Self>,
        forwarders: ForwarderConfig,
    ) -> ConfigResult<IncrementalSession> {
        IncrementalSession::new(Arc::clone(self), forwarders)
    }
}
