//! # Resolver Configuration Module
//!
//! This module loads and compiles the configuration consumed by the order resolver:
//! the company alias table, the quantity pattern configuration and the forwarder
//! allowlist. Everything is compiled once at load time and treated as read-only
//! for the lifetime of a resolution run.
//!
//! ## Failure policy
//!
//! - Missing required keys or empty unit vocabularies abort loading
//! - A malformed command, skip or correction pattern aborts loading
//! - A malformed `/pattern/flags` alias variant is logged and skipped

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::errors::{ConfigError, ConfigResult};

/// Strip pattern applied to lowercased names before comparison
pub const DEFAULT_NORMALIZE_PATTERN: &str = "[^a-z0-9]";

/// Loose "please add to <company>" tail used when no override is configured
pub const DEFAULT_PLEASE_ADD_TO_PATTERN: &str =
    r"(?i)please\s+add\s+(?:these\s+|this\s+|the\s+following\s+)?to\s+(?P<company>[^\n]+?)(?:\s+boxes)?\s*[.!]*\s*$";

/// Window after a label during which forwarded fragments still belong to it
pub const DEFAULT_FORWARDER_TIMEOUT_SECS: u64 = 300;

/// Key of the typo-correction pseudo-entry inside the alias table
pub const AUTO_CORRECTIONS_KEY: &str = "auto_corrections";

const BUNDLED_ALIASES: &str = include_str!("../config/company_aliases.json");
const BUNDLED_PATTERNS: &str = include_str!("../config/quantity_patterns.json");
const BUNDLED_FORWARDERS: &str = include_str!("../config/forwarders.json");

fn read_config_file(path: &Path) -> ConfigResult<String> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn compile(name: &str, pattern: &str) -> ConfigResult<Regex> {
    Regex::new(pattern).map_err(|e| ConfigError::invalid_pattern(name, e))
}

fn require_groups(
    pattern_name: &'static str,
    regex: &Regex,
    groups: &[&'static str],
) -> ConfigResult<()> {
    for group in groups {
        if !regex.capture_names().flatten().any(|name| name == *group) {
            return Err(ConfigError::MissingCaptureGroup {
                pattern: pattern_name,
                group,
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Company aliases
// ---------------------------------------------------------------------------

/// A single way of referring to a company
#[derive(Debug, Clone)]
pub enum AliasVariant {
    /// Compared against the working value after normalization
    Literal(String),
    /// Tested against the trimmed, un-normalized working value
    Pattern(Regex),
}

/// A canonical company name with its variants in table order
#[derive(Debug, Clone)]
pub struct CompanyEntry {
    pub canonical: String,
    pub variants: Vec<AliasVariant>,
}

/// Compiled company alias table
#[derive(Debug, Clone)]
pub struct CompanyAliasTable {
    companies: Vec<CompanyEntry>,
    /// Lowercased typo → correction, in file order
    auto_corrections: Vec<(String, String)>,
}

impl CompanyAliasTable {
    /// Load the alias table from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::from_json_str(&read_config_file(path.as_ref())?)
    }

    /// Parse the alias table from a JSON string
    ///
    /// The document is an object mapping each canonical name to an array of
    /// variants, plus an optional `auto_corrections` object of typo → correction.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let root: Map<String, Value> = serde_json::from_str(json)?;
        let mut companies = Vec::new();
        let mut auto_corrections = Vec::new();

        for (key, value) in root {
            if key == AUTO_CORRECTIONS_KEY {
                let corrections: Map<String, Value> = serde_json::from_value(value)?;
                for (typo, fixed) in corrections {
                    let fixed: String = serde_json::from_value(fixed)?;
                    auto_corrections.push((typo.trim().to_lowercase(), fixed));
                }
                continue;
            }

            let raw_variants: Vec<String> = serde_json::from_value(value)?;
            let variants = raw_variants
                .iter()
                .filter_map(|raw| match parse_regex_variant(raw) {
                    None => Some(AliasVariant::Literal(raw.clone())),
                    Some(Ok(regex)) => Some(AliasVariant::Pattern(regex)),
                    Some(Err(reason)) => {
                        warn!(company = %key, variant = %raw, %reason, "Skipping malformed alias variant");
                        None
                    }
                })
                .collect();

            companies.push(CompanyEntry {
                canonical: key,
                variants,
            });
        }

        if companies.is_empty() {
            return Err(ConfigError::MissingKey(
                "company alias table has no companies".to_string(),
            ));
        }

        debug!(
            companies = companies.len(),
            corrections = auto_corrections.len(),
            "Loaded company alias table"
        );

        Ok(Self {
            companies,
            auto_corrections,
        })
    }

    /// Alias table shipped with the crate
    pub fn bundled() -> ConfigResult<Self> {
        Self::from_json_str(BUNDLED_ALIASES)
    }

    /// Companies in table order
    pub fn companies(&self) -> &[CompanyEntry] {
        &self.companies
    }

    /// Case-insensitive exact lookup in the typo-correction table
    pub fn auto_correction(&self, token: &str) -> Option<&str> {
        let key = token.trim().to_lowercase();
        self.auto_corrections
            .iter()
            .find(|(typo, _)| *typo == key)
            .map(|(_, fixed)| fixed.as_str())
    }
}

/// Interpret a variant written as `/pattern/flags`
///
/// Returns `None` when the variant is a plain literal, `Some(Err)` when it has the
/// regex shape but cannot be compiled.
pub fn parse_regex_variant(raw: &str) -> Option<Result<Regex, String>> {
    let rest = raw.strip_prefix('/')?;
    let close = rest.rfind('/')?;
    let (pattern, flags) = (&rest[..close], &rest[close + 1..]);
    if flags.is_empty() {
        return None;
    }

    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            'g' | 'u' | 'y' => {}
            other => return Some(Err(format!("unsupported regex flag '{other}'"))),
        }
    }

    Some(builder.build().map_err(|e| e.to_string()))
}

// ---------------------------------------------------------------------------
// Quantity patterns
// ---------------------------------------------------------------------------

/// A regex replacement applied to every fragment before classification
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QuantityCorrection {
    pub pattern: String,
    pub replacement: String,
}

/// Named command patterns as written in the configuration file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommandPatternConfig {
    pub whatsapp_message: String,
    pub add_to_order: String,
    pub image_placeholder: String,
    #[serde(default)]
    pub please_add_to: Option<String>,
    #[serde(default)]
    pub normalize: Option<String>,
}

/// Quantity pattern configuration as written in the configuration file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuantityPatternConfig {
    pub weight_units: Vec<String>,
    pub count_units: Vec<String>,
    pub container_units: Vec<String>,
    pub group_units: Vec<String>,
    pub specific_items: Vec<String>,
    pub multiplication_patterns: Vec<String>,
    #[serde(default)]
    pub special_patterns: Vec<String>,
    pub skip_patterns: Vec<String>,
    pub command_patterns: CommandPatternConfig,
    #[serde(default)]
    pub quantity_corrections: Vec<QuantityCorrection>,
}

impl QuantityPatternConfig {
    /// Load and validate the pattern configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::from_json_str(&read_config_file(path.as_ref())?)
    }

    /// Parse and validate the pattern configuration from a JSON string
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Pattern configuration shipped with the crate
    pub fn bundled() -> ConfigResult<Self> {
        Self::from_json_str(BUNDLED_PATTERNS)
    }

    /// Validate unit vocabularies
    pub fn validate(&self) -> ConfigResult<()> {
        let vocabularies: [(&'static str, &[String]); 5] = [
            ("weight_units", &self.weight_units),
            ("count_units", &self.count_units),
            ("container_units", &self.container_units),
            ("group_units", &self.group_units),
            ("multiplication_patterns", &self.multiplication_patterns),
        ];

        for (name, units) in vocabularies {
            if units.is_empty() {
                return Err(ConfigError::EmptyVocabulary(name));
            }
            if let Some(i) = units.iter().position(|u| u.trim().is_empty()) {
                return Err(ConfigError::BlankEntry {
                    vocabulary: name,
                    index: i,
                });
            }
        }

        Ok(())
    }

    /// All unit synonyms across categories, specific items included
    pub fn all_units(&self) -> impl Iterator<Item = &String> {
        self.weight_units
            .iter()
            .chain(&self.count_units)
            .chain(&self.container_units)
            .chain(&self.group_units)
            .chain(&self.specific_items)
    }
}

/// Compiled command patterns
#[derive(Debug, Clone)]
pub struct CommandPatterns {
    /// Chat line format, compiled in dot-matches-newline mode
    pub whatsapp_message: Regex,
    /// "add <item> to <company>" directive
    pub add_to_order: Regex,
    /// Looser "please add to <company>" tail
    pub please_add_to: Regex,
    /// `[IMAGE: <path>]` sentinel
    pub image_placeholder: Regex,
    /// Characters stripped from lowercased names before comparison
    pub normalize: Regex,
}

impl CommandPatterns {
    /// Compile and check the named groups each pattern must provide
    pub fn compile(config: &CommandPatternConfig) -> ConfigResult<Self> {
        let whatsapp_message = RegexBuilder::new(&config.whatsapp_message)
            .dot_matches_new_line(true)
            .build()
            .map_err(|e| ConfigError::invalid_pattern("whatsapp_message", e))?;
        require_groups("whatsapp_message", &whatsapp_message, &["ts", "text"])?;

        let add_to_order = compile("add_to_order", &config.add_to_order)?;
        require_groups("add_to_order", &add_to_order, &["item", "company"])?;

        let please_add_to = compile(
            "please_add_to",
            config
                .please_add_to
                .as_deref()
                .unwrap_or(DEFAULT_PLEASE_ADD_TO_PATTERN),
        )?;
        require_groups("please_add_to", &please_add_to, &["company"])?;

        let image_placeholder = compile("image_placeholder", &config.image_placeholder)?;
        require_groups("image_placeholder", &image_placeholder, &["path"])?;

        let normalize = compile(
            "normalize",
            config.normalize.as_deref().unwrap_or(DEFAULT_NORMALIZE_PATTERN),
        )?;

        Ok(Self {
            whatsapp_message,
            add_to_order,
            please_add_to,
            image_placeholder,
            normalize,
        })
    }
}

/// Combine the skip patterns into one alternation, `None` when there are none
pub fn compile_skip_patterns(patterns: &[String]) -> ConfigResult<Option<Regex>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    for (i, pattern) in patterns.iter().enumerate() {
        compile(&format!("skip_patterns[{i}]"), pattern)?;
    }

    let combined = patterns
        .iter()
        .map(|p| format!("(?:{p})"))
        .collect::<Vec<_>>()
        .join("|");
    compile("skip_patterns", &combined).map(Some)
}

/// A compiled spacing correction
#[derive(Debug, Clone)]
pub struct CompiledCorrection {
    pub pattern: Regex,
    pub replacement: String,
}

/// Compile the quantity corrections, preserving table order
pub fn compile_corrections(corrections: &[QuantityCorrection]) -> ConfigResult<Vec<CompiledCorrection>> {
    corrections
        .iter()
        .enumerate()
        .map(|(i, c)| {
            Ok(CompiledCorrection {
                pattern: compile(&format!("quantity_corrections[{i}]"), &c.pattern)?,
                replacement: c.replacement.clone(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Forwarders
// ---------------------------------------------------------------------------

fn default_timeout_secs() -> u64 {
    DEFAULT_FORWARDER_TIMEOUT_SECS
}

/// Trusted relay accounts and the attribution window used in forwarder mode
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ForwarderConfig {
    pub forwarders: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ForwarderConfig {
    pub fn new(forwarders: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            forwarders,
            timeout_secs,
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::from_json_str(&read_config_file(path.as_ref())?)
    }

    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn bundled() -> ConfigResult<Self> {
        Self::from_json_str(BUNDLED_FORWARDERS)
    }

    /// Whether `sender` is one of the relay accounts (case and surrounding space ignored)
    pub fn is_forwarder(&self, sender: &str) -> bool {
        let sender = sender.trim();
        self.forwarders
            .iter()
            .any(|f| f.trim().eq_ignore_ascii_case(sender))
    }

    pub fn timeout_ms(&self) -> i64 {
        i64::try_from(self.timeout_secs.saturating_mul(1000)).unwrap_or(i64::MAX)
    }
}
