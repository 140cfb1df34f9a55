//! Query-parsing collaborator for the question-answering surface.
//!
//! The pipeline core never depends on how a question is interpreted, only
//! on the (country filter, limit, interpretation) triple a parser returns.

use once_cell::sync::Lazy;
use regex::Regex;

static TOP_N_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:top\s*)?(\d+)\b").expect("static pattern is valid"));

/// Structured interpretation of a free-text question.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    /// Canonical country name to filter on, or None for global.
    pub country: Option<String>,
    /// Number of top results to return.
    pub limit: usize,
    /// Human-readable description of how the question was interpreted.
    pub interpretation: String,
}

pub trait QueryParser {
    fn parse(&self, question: &str, default_limit: usize) -> ParsedQuery;
}

/// Keyword-rule parser: recognizes a handful of country keywords and a
/// `top N` number, falling back to the default limit.
pub struct KeywordQueryParser;

impl QueryParser for KeywordQueryParser {
    fn parse(&self, question: &str, default_limit: usize) -> ParsedQuery {
        let lower = question.to_lowercase();

        let country = if lower.contains("usa") || lower.contains("united states") {
            Some("United States")
        } else if lower.contains("india") {
            Some("India")
        } else if lower.contains("germany") {
            Some("Germany")
        } else if lower.contains("uk") || lower.contains("united kingdom") {
            Some("United Kingdom")
        } else {
            None
        };

        let mut limit = default_limit;
        if let Some(caps) = TOP_N_PATTERN.captures(&lower) {
            if let Ok(n) = caps[1].parse::<usize>() {
                if (1..=100).contains(&n) {
                    limit = n;
                }
            }
        }

        let mut parts = Vec::new();
        match country {
            Some(c) => parts.push(format!("Country filter: {c} (from keywords)")),
            None => parts.push("Country filter: None (global)".to_string()),
        }
        parts.push(format!("Top N: {limit} (from keywords or default)"));

        ParsedQuery {
            country: country.map(|c| c.to_string()),
            limit,
            interpretation: parts.join(" | "),
        }
    }
}
