//! # Alias Resolver Module
//!
//! Canonicalizes raw tokens and phrases to known company names.
//!
//! Two matching strategies, never mixed:
//!
//! - **Exact** ([`AliasResolver::canonicalize`], [`AliasResolver::match_company_in_text`]):
//!   normalized equality against canonical names and literal variants, regex variants
//!   tested against the trimmed value. Used by the batch resolver.
//! - **Containment** ([`AliasResolver::find_company_by_containment`]): the query contains a
//!   name or a name contains the query. Used only for forwarder-mode label detection.

use regex::Regex;
use tracing::trace;

use crate::config::{AliasVariant, CompanyAliasTable, CompanyEntry};

/// Shortest normalized query accepted by containment matching
const MIN_CONTAINMENT_LEN: usize = 3;

/// Company name resolver backed by a compiled alias table
#[derive(Debug, Clone)]
pub struct AliasResolver {
    table: CompanyAliasTable,
    normalize: Regex,
}

impl AliasResolver {
    /// Create a resolver from an alias table and the normalization strip pattern
    pub fn new(table: CompanyAliasTable, normalize: Regex) -> Self {
        Self { table, normalize }
    }

    /// Lowercase `value` and strip every character matched by the normalization pattern
    pub fn normalize(&self, value: &str) -> String {
        self.normalize
            .replace_all(&value.to_lowercase(), "")
            .into_owned()
    }

    /// Resolve a token to its canonical company name
    ///
    /// Auto-corrections are applied first, then companies are tried in table order:
    /// the canonical name itself, then each variant in order. First match wins.
    pub fn canonicalize(&self, token: &str) -> Option<String> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }

        let working = self.table.auto_correction(token).unwrap_or(token).trim();
        let normalized = self.normalize(working);

        let found = self
            .table
            .companies()
            .iter()
            .find(|company| self.matches_exactly(company, working, &normalized))
            .map(|company| company.canonical.clone());

        trace!(token = %token, resolved = ?found, "Canonicalized token");
        found
    }

    fn matches_exactly(&self, company: &CompanyEntry, working: &str, normalized: &str) -> bool {
        if self.normalize(&company.canonical) == normalized {
            return true;
        }

        company.variants.iter().any(|variant| match variant {
            AliasVariant::Pattern(regex) => regex.is_match(working),
            AliasVariant::Literal(literal) => self.normalize(literal) == normalized,
        })
    }

    /// Canonical name of the first whitespace-separated word that resolves to a company
    pub fn match_company_in_text(&self, text: &str) -> Option<String> {
        text.split_whitespace().find_map(|word| self.canonicalize(word))
    }

    /// Whether the whole of `text` canonicalizes to some company
    pub fn is_company_name(&self, text: &str) -> bool {
        self.canonicalize(text).is_some()
    }

    /// Looser substring matching used for forwarder-mode labels
    ///
    /// A company matches when the normalized query contains one of its normalized
    /// names (canonical or literal variant), when such a name contains the query,
    /// or when one of its regex variants matches the trimmed query.
    pub fn find_company_by_containment(&self, text: &str) -> Option<String> {
        let text = text.trim();
        let working = self.table.auto_correction(text).unwrap_or(text).trim();
        let query = self.normalize(working);
        if query.len() < MIN_CONTAINMENT_LEN {
            return None;
        }

        self.table
            .companies()
            .iter()
            .find(|company| {
                let contains = |name: &str| {
                    let name = self.normalize(name);
                    !name.is_empty() && (query.contains(&name) || name.contains(&query))
                };

                contains(&company.canonical)
                    || company.variants.iter().any(|variant| match variant {
                        AliasVariant::Pattern(regex) => regex.is_match(working),
                        AliasVariant::Literal(literal) => contains(literal),
                    })
            })
            .map(|company| company.canonical.clone())
    }
}
