//! Delivery filtering and artifact extraction for inbox messages.
//!
//! Everything here is pure: the retriever feeds it listing rows, message
//! bodies and link candidates read from the inbox.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static SIX_DIGIT_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{6}\b").expect("valid code regex"));

/// Keyword set identifying the right message among many.
///
/// Matching is a case-insensitive substring test with OR semantics. An empty
/// filter matches every entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryFilter {
    keywords: Vec<String>,
}

impl DeliveryFilter {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|keyword| keyword.into().to_lowercase())
                .filter(|keyword| !keyword.trim().is_empty())
                .collect(),
        }
    }

    /// Account verification mails carrying a one-time code.
    pub fn verification() -> Self {
        Self::new(["confirm", "email", "verify", "otp", "code"])
    }

    /// Password reset mails carrying a reset link.
    pub fn password_reset() -> Self {
        Self::new(["reset", "password", "forgot"])
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn matches(&self, text: &str) -> bool {
        if self.keywords.is_empty() {
            return true;
        }
        let haystack = text.to_lowercase();
        self.keywords
            .iter()
            .any(|keyword| haystack.contains(keyword.as_str()))
    }

    /// Index of the latest matching row. Rows are ordered newest first.
    pub fn latest_match<S: AsRef<str>>(&self, rows: &[S], scan_limit: usize) -> Option<usize> {
        rows.iter()
            .take(scan_limit)
            .position(|row| self.matches(row.as_ref()))
    }

    pub fn describe(&self) -> String {
        if self.keywords.is_empty() {
            "latest email".to_string()
        } else {
            format!("keywords: {}", self.keywords.join(", "))
        }
    }
}

/// Collapse a listing row to a single line for diagnostics.
pub fn normalize_row(row: &str) -> String {
    row.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate `text` to at most `max_chars` characters.
pub fn snippet(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Extract a six-digit one-time code from a message body.
pub fn extract_code(body: &str) -> Option<String> {
    SIX_DIGIT_CODE
        .find(body)
        .map(|found| found.as_str().to_string())
}

/// A link as rendered in a message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCandidate {
    /// Accessible name / visible text.
    pub text: String,
    pub href: Option<String>,
    /// Whether the element exposes the `link` role.
    pub is_link_role: bool,
}

/// Ordered link lookup strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStrategy {
    /// Element with link role whose accessible name matches the name pattern.
    RoleName,
    /// Any element whose visible text contains the text keyword.
    PartialText,
    /// Any element whose href contains the href keyword.
    HrefSubstring,
}

impl LinkStrategy {
    pub const ORDER: [LinkStrategy; 3] = [
        LinkStrategy::RoleName,
        LinkStrategy::PartialText,
        LinkStrategy::HrefSubstring,
    ];
}

/// What a link must look like for each [`LinkStrategy`].
#[derive(Debug, Clone)]
pub struct LinkQuery {
    pub name_pattern: Regex,
    pub text_keyword: String,
    pub href_keyword: String,
}

impl LinkQuery {
    /// Reset-password links.
    pub fn password_reset() -> Self {
        Self {
            name_pattern: Regex::new(r"(?i)reset password").expect("valid reset link regex"),
            text_keyword: "reset".to_string(),
            href_keyword: "reset".to_string(),
        }
    }

    fn accepts(&self, strategy: LinkStrategy, link: &LinkCandidate) -> bool {
        match strategy {
            LinkStrategy::RoleName => link.is_link_role && self.name_pattern.is_match(&link.text),
            LinkStrategy::PartialText => link
                .text
                .to_lowercase()
                .contains(&self.text_keyword.to_lowercase()),
            LinkStrategy::HrefSubstring => link
                .href
                .as_deref()
                .is_some_and(|href| href.contains(self.href_keyword.as_str())),
        }
    }

    /// Apply strategies in order; the first strategy with any hit picks its first link.
    pub fn select<'a>(
        &self,
        links: &'a [LinkCandidate],
    ) -> Option<(LinkStrategy, &'a LinkCandidate)> {
        LinkStrategy::ORDER.into_iter().find_map(|strategy| {
            links
                .iter()
                .find(|link| self.accepts(strategy, link))
                .map(|link| (strategy, link))
        })
    }
}
