//! # Line/Message Segmenter Module
//!
//! Splits raw chat lines into timestamp, sender and body, and splits bodies into
//! trimmed fragments with the configured quantity spacing corrections applied.

use regex::Regex;
use tracing::{debug, trace};

use crate::config::CompiledCorrection;
use crate::order_model::ChatLine;

/// Capture group holding the outer (posting) timestamp, used when `ts` is absent
const OUTER_TIMESTAMP_GROUP: &str = "sent";

/// Chat line segmenter
#[derive(Debug, Clone)]
pub struct Segmenter {
    message: Regex,
    skip: Option<Regex>,
    corrections: Vec<CompiledCorrection>,
}

impl Segmenter {
    pub fn new(message: Regex, skip: Option<Regex>, corrections: Vec<CompiledCorrection>) -> Self {
        Self {
            message,
            skip,
            corrections,
        }
    }

    /// Parse one raw line
    ///
    /// Returns `None` when the line does not match the message format, when its
    /// text is empty, or when the text matches a skip pattern.
    pub fn segment(&self, raw_line: &str) -> Option<ChatLine> {
        let Some(captures) = self.message.captures(raw_line) else {
            trace!(line = %raw_line, "Line does not match message format");
            return None;
        };

        let text = captures.name("text").map(|m| m.as_str().trim()).unwrap_or("");
        if text.is_empty() {
            trace!(line = %raw_line, "Line has an empty body");
            return None;
        }

        if self.skip.as_ref().is_some_and(|skip| skip.is_match(text)) {
            debug!(text = %text, "Discarding line matching a skip pattern");
            return None;
        }

        let timestamp = captures
            .name("ts")
            .or_else(|| captures.name(OUTER_TIMESTAMP_GROUP))
            .map(|m| m.as_str().trim())
            .unwrap_or("");
        let sender = captures
            .name("sender")
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty());

        Some(ChatLine::new(timestamp, sender, text))
    }

    /// Split a message body into corrected, non-empty fragments
    pub fn fragments(&self, text: &str) -> Vec<String> {
        text.split('\n')
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .map(|piece| self.correct(piece))
            .collect()
    }

    /// Apply the spacing corrections in table order
    pub fn correct(&self, fragment: &str) -> String {
        let corrected = self
            .corrections
            .iter()
            .fold(fragment.to_string(), |acc, correction| {
                correction
                    .pattern
                    .replace_all(&acc, correction.replacement.as_str())
                    .into_owned()
            });
        corrected.trim().to_string()
    }
}

/// Group a plain-text chat export into raw lines
///
/// A physical line starting with `[` opens a new message; any other non-blank
/// line continues the previous message. Text before the first message is dropped.
pub fn split_export(export: &str) -> Vec<String> {
    let mut messages: Vec<String> = Vec::new();

    for line in export.lines() {
        if line.trim_start().starts_with('[') {
            messages.push(line.trim_end().to_string());
        } else if let Some(current) = messages.last_mut() {
            if !line.trim().is_empty() {
                current.push('\n');
                current.push_str(line.trim_end());
            }
        }
    }

    messages
}
