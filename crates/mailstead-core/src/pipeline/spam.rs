//! Spam classification from transport-level scoring headers
//!
//! The content filter in front of the mailbox stamps messages with
//! scoring headers before delivery. Classification combines those with
//! the domain's configured threshold: an explicit verdict header wins,
//! otherwise the highest numeric score found is compared against the
//! threshold.

use mailstead_common::types::SpamClassification;
use regex::Regex;
use tracing::trace;

/// Spam headers pulled from a parsed message
#[derive(Debug, Clone, Default)]
pub struct SpamHeaders {
    /// X-Spam-Flag, "YES" when the filter flagged the message
    pub flag: Option<String>,
    /// X-Spam-Status, e.g. "Yes, score=7.2 required=5.0 ..."
    pub status: Option<String>,
    /// X-Spam-Score, a bare numeric value
    pub score: Option<String>,
    /// X-Spam-Level, one asterisk per score point
    pub level: Option<String>,
}

/// Header-based spam classifier
pub struct SpamClassifier {
    number: Regex,
}

impl SpamClassifier {
    pub fn new() -> Self {
        Self {
            number: Regex::new(r"-?\d+(?:\.\d+)?").unwrap(),
        }
    }

    /// Classify a message given its spam headers and the domain threshold
    pub fn classify(&self, headers: &SpamHeaders, threshold: f64) -> SpamClassification {
        let score = self.extract_score(headers);

        let verdict = headers
            .flag
            .as_deref()
            .map(|v| v.trim().eq_ignore_ascii_case("yes"))
            .or_else(|| {
                headers
                    .status
                    .as_deref()
                    .map(|v| v.trim_start().to_ascii_lowercase().starts_with("yes"))
            });

        let is_spam = match verdict {
            Some(flagged) => flagged,
            None => score.map(|s| s >= threshold).unwrap_or(false),
        };

        trace!(?score, is_spam, threshold, "Classified message");
        SpamClassification { score, is_spam }
    }

    /// Best numeric score across the scoring headers
    fn extract_score(&self, headers: &SpamHeaders) -> Option<f64> {
        let mut best: Option<f64> = None;

        if let Some(value) = headers.score.as_deref() {
            best = max_opt(best, self.parse_number(value));
        }
        if let Some(value) = headers.status.as_deref() {
            if let Some(idx) = value.to_ascii_lowercase().find("score=") {
                best = max_opt(best, self.parse_number(&value[idx + 6..]));
            }
        }
        if let Some(value) = headers.level.as_deref() {
            let stars = value.chars().filter(|c| *c == '*').count();
            if stars > 0 {
                best = max_opt(best, Some(stars as f64));
            }
        }

        best
    }

    fn parse_number(&self, value: &str) -> Option<f64> {
        self.number
            .find(value)
            .and_then(|m| m.as_str().parse().ok())
    }
}

impl Default for SpamClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn max_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}
