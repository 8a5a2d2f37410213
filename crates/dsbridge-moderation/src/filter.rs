//! The moderation pipeline: markup, then PII, then banned words.

use regex::{Captures, Regex};
use thiserror::Error;
use tracing::debug;

use crate::banned::BannedWords;
use crate::markup::MarkupStripper;
use crate::patterns::{EMAIL_DOMAIN_GROUP, PII_PATTERNS, REDACTED, RedactionKind};

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("moderation pattern failed to compile: {0}")]
    Pattern(#[from] regex::Error),
}

/// Outcome of [`ModerationFilter::moderate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Filtered text. Never contains markup.
    pub text: String,
    /// Markup was present in the input. Such messages are deleted at their
    /// source instead of being relayed.
    pub markup_stripped: bool,
    /// One entry per redacted span, in pipeline order.
    pub redactions: Vec<RedactionKind>,
}

impl Verdict {
    pub fn is_suppressed(&self) -> bool {
        self.markup_stripped
    }

    /// Nothing was stripped or redacted.
    pub fn is_clean(&self) -> bool {
        !self.markup_stripped && self.redactions.is_empty()
    }
}

/// Compiled moderation pipeline. Deterministic for a given banned-word list
/// and allowed email domain.
pub struct ModerationFilter {
    markup: MarkupStripper,
    pii: Vec<(RedactionKind, Regex)>,
    banned: Option<Regex>,
    allowed_email_domain: Option<String>,
}

impl ModerationFilter {
    pub fn new(
        banned_words: &BannedWords,
        allowed_email_domain: Option<&str>,
    ) -> Result<Self, FilterError> {
        let pii = PII_PATTERNS
            .iter()
            .map(|p| Ok((p.kind, Regex::new(p.pattern)?)))
            .collect::<Result<Vec<_>, regex::Error>>()?;

        let banned = banned_words.pattern().map(|p| Regex::new(&p)).transpose()?;

        Ok(Self {
            markup: MarkupStripper::new()?,
            pii,
            banned,
            allowed_email_domain: allowed_email_domain
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(|d| d.to_ascii_lowercase()),
        })
    }

    pub fn moderate(&self, text: &str) -> Verdict {
        let stripped = self.markup.strip(text);
        let markup_stripped = stripped != text;

        let mut redactions = Vec::new();
        let mut current = stripped.into_owned();

        for (kind, re) in &self.pii {
            current = match kind {
                RedactionKind::Email => redact(re, &current, *kind, &mut redactions, |caps| {
                    self.is_allowed_domain(&caps[EMAIL_DOMAIN_GROUP])
                }),
                _ => redact(re, &current, *kind, &mut redactions, |_| false),
            };
        }

        if let Some(re) = &self.banned {
            current = redact(re, &current, RedactionKind::BannedWord, &mut redactions, |_| false);
        }

        if markup_stripped || !redactions.is_empty() {
            debug!(
                markup_stripped,
                redactions = redactions.len(),
                "moderation altered message"
            );
        }

        Verdict {
            text: current,
            markup_stripped,
            redactions,
        }
    }

    fn is_allowed_domain(&self, domain: &str) -> bool {
        self.allowed_email_domain
            .as_deref()
            .is_some_and(|allowed| domain.eq_ignore_ascii_case(allowed))
    }
}

/// Replace every match of `re` with [`REDACTED`] unless `keep` says otherwise,
/// recording one `kind` per replacement.
fn redact<F>(
    re: &Regex,
    text: &str,
    kind: RedactionKind,
    redactions: &mut Vec<RedactionKind>,
    keep: F,
) -> String
where
    F: Fn(&Captures) -> bool,
{
    re.replace_all(text, |caps: &Captures| {
        if keep(caps) {
            caps[0].to_string()
        } else {
            redactions.push(kind);
            REDACTED.to_string()
        }
    })
    .into_owned()
}
