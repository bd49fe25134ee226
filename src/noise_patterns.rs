//! # Noise Patterns Module
//!
//! Fixed regexes and word lists used by the noise filter. Unlike the unit
//! vocabulary these are not configurable.

use lazy_static::lazy_static;
use regex::Regex;

/// Single-word greetings and acknowledgements that never carry an order
pub const GREETING_WORDS: &[&str] = &[
    "hi", "hello", "hey", "hiya", "morning", "afternoon", "evening", "thanks", "thank",
    "thankyou", "thx", "ty", "cheers", "ok", "okay", "k", "noted", "confirmed", "confirm",
    "received", "yes", "no", "yep", "nope", "sure", "great", "perfect", "awesome", "done",
    "sorry", "please", "monday", "tuesday", "wednesday", "thursday", "friday", "saturday",
    "sunday", "today", "tomorrow",
];

/// Openings of questions and requests that are not products
pub const NON_PRODUCT_STARTS: &[&str] = &[
    "can you",
    "could you",
    "can we",
    "would you",
    "will you",
    "please let",
    "please confirm",
    "please send",
    "please call",
    "let me know",
    "delivery to",
    "deliver to",
    "delivered to",
    "delivery for",
    "total amount",
    "total due",
    "invoice",
    "payment",
    "paid",
    "is it possible",
    "when will",
    "what time",
    "how much",
    "do you have",
    "good morning",
    "good afternoon",
    "thank you",
];

lazy_static! {
    /// Only digits, whitespace and a few separators
    pub static ref DIGITS_AND_SYMBOLS: Regex =
        Regex::new(r"^[\d\s.,:;/\\\-_#]+$").expect("digits pattern should be valid");

    /// Telephone numbers in local or international form
    pub static ref PHONE: Regex =
        Regex::new(r"^[\d+\-()\s]+$").expect("phone pattern should be valid");

    pub static ref EMAIL: Regex =
        Regex::new(r"(?i)^[\w.+\-]+@[\w\-]+(?:\.[\w\-]+)+$").expect("email pattern should be valid");

    pub static ref URL: Regex =
        Regex::new(r"(?i)^(?:https?://|www\.)\S+$").expect("url pattern should be valid");

    /// No word characters at all
    pub static ref SYMBOLS_ONLY: Regex =
        Regex::new(r"^[^\w]+$").expect("symbols pattern should be valid");

    /// `9:30`, `14:05`, `9:30 am`
    pub static ref BARE_TIME: Regex =
        Regex::new(r"(?i)^\d{1,2}:\d{2}\s*(?:am|pm)?$").expect("time pattern should be valid");

    /// `18/10`, `18/10/26`, `18/10/2026`
    pub static ref BARE_DATE: Regex =
        Regex::new(r"^\d{1,2}/\d{1,2}(?:/(?:\d{2}|\d{4}))?$").expect("date pattern should be valid");
}

/// Whether `text` looks like a phone number (phone characters only, longer than five)
pub fn is_phone_like(text: &str) -> bool {
    let text = text.trim();
    text.chars().count() > 5 && PHONE.is_match(text)
}
