//! # Document Analyzer
//!
//! Turns a raw document into the list of terms the vectorizer counts:
//! optional lowercasing, regex tokenization, then stop-word removal.

use regex::Regex;

use super::stop_words::is_stop_word;
use crate::error::Result;

/// Token pattern: runs of two or more word characters.
pub const TOKEN_PATTERN: &str = r"\b\w\w+\b";

/// Splits documents into vocabulary terms.
#[derive(Debug, Clone)]
pub struct Analyzer {
    pattern: Regex,
    lowercase: bool,
}

impl Analyzer {
    /// Create an analyzer using [`TOKEN_PATTERN`].
    pub fn new(lowercase: bool) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(TOKEN_PATTERN)?,
            lowercase,
        })
    }

    pub fn lowercase(&self) -> bool {
        self.lowercase
    }

    /// Tokenize `text`, keeping only terms outside the stop-word list.
    ///
    /// # Examples
    /// ```
    /// use sieve_core::vectorizer::Analyzer;
    ///
    /// let analyzer = Analyzer::new(true).unwrap();
    /// assert_eq!(analyzer.analyze("Buy NOW, a cheap watch!"), ["buy", "cheap", "watch"]);
    /// ```
    pub fn analyze(&self, text: &str) -> Vec<String> {
        let text = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_owned()
        };
        self.pattern
            .find_iter(&text)
            .map(|m| m.as_str())
            .filter(|token| !is_stop_word(token))
            .map(str::to_owned)
            .collect()
    }
}
