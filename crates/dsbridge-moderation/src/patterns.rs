//! PII pattern catalogue.
//!
//! Patterns are applied in catalogue order over the progressively redacted
//! text, so more specific shapes come first: a card number must be consumed
//! before the phone pattern can see a 10-digit slice of it, and an SSN before
//! the phone pattern can see its digit groups.

use std::fmt;

/// Replacement sentinel for every redacted span.
pub const REDACTED: &str = "[REMOVED]";

/// What a redacted span looked like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RedactionKind {
    Url,
    Email,
    CreditCard,
    Ssn,
    Phone,
    BannedWord,
}

impl fmt::Display for RedactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url => write!(f, "url"),
            Self::Email => write!(f, "email"),
            Self::CreditCard => write!(f, "credit_card"),
            Self::Ssn => write!(f, "ssn"),
            Self::Phone => write!(f, "phone"),
            Self::BannedWord => write!(f, "banned_word"),
        }
    }
}

/// A single PII shape.
pub struct PiiPattern {
    pub kind: RedactionKind,
    pub pattern: &'static str,
}

/// Capture group holding the domain part of [`RedactionKind::Email`] matches.
pub const EMAIL_DOMAIN_GROUP: usize = 1;

pub static PII_PATTERNS: &[PiiPattern] = &[
    PiiPattern {
        kind: RedactionKind::Url,
        pattern: r#"(?i)\b(?:https?://|www\.)[^\s<>"]+"#,
    },
    PiiPattern {
        kind: RedactionKind::Email,
        pattern: r"\b[A-Za-z0-9._%+-]+@([A-Za-z0-9.-]+\.[A-Za-z]{2,})\b",
    },
    // 13 to 16 digits, optionally grouped by spaces or dashes.
    PiiPattern {
        kind: RedactionKind::CreditCard,
        pattern: r"\b(?:\d[ -]?){12,15}\d\b",
    },
    PiiPattern {
        kind: RedactionKind::Ssn,
        pattern: r"\b\d{3}-\d{2}-\d{4}\b",
    },
    // NANP-style ten digits with an optional +country prefix.
    PiiPattern {
        kind: RedactionKind::Phone,
        pattern: r"(?:\+\d{1,3}[\s.-]?)?(?:\(\d{3}\)|\b\d{3})[\s.-]?\d{3}[\s.-]?\d{4}\b",
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn pattern(kind: RedactionKind) -> Regex {
        let entry = PII_PATTERNS.iter().find(|p| p.kind == kind).unwrap();
        Regex::new(entry.pattern).unwrap()
    }

    #[test]
    fn all_patterns_compile() {
        for pat in PII_PATTERNS {
            Regex::new(pat.pattern)
                .unwrap_or_else(|e| panic!("pattern '{}' failed to compile: {e}", pat.kind));
        }
    }

    #[test]
    fn phone_shapes() {
        let re = pattern(RedactionKind::Phone);
        assert!(re.is_match("555-123-4567"));
        assert!(re.is_match("(555) 123-4567"));
        assert!(re.is_match("+1 555 123 4567"));
        assert!(re.is_match("5551234567"));
        assert!(!re.is_match("call me at 10:30"));
        assert!(!re.is_match("order 123456789012"));
    }

    #[test]
    fn card_needs_thirteen_digits() {
        let re = pattern(RedactionKind::CreditCard);
        assert!(re.is_match("4111 1111 1111 1111"));
        assert!(re.is_match("4111-1111-1111-1111"));
        assert!(!re.is_match("555-123-4567"));
    }

    #[test]
    fn email_captures_domain() {
        let re = pattern(RedactionKind::Email);
        let caps = re.captures("write to Jane.Doe@Example.org today").unwrap();
        assert_eq!(&caps[EMAIL_DOMAIN_GROUP], "Example.org");
    }

    #[test]
    fn url_stops_at_whitespace() {
        let re = pattern(RedactionKind::Url);
        let m = re.find("see https://example.com/a?b=c now").unwrap();
        assert_eq!(m.as_str(), "https://example.com/a?b=c");
        assert!(re.is_match("www.example.com"));
    }
}
