//! # dsbridge-moderation
//!
//! Sanitizes chat text before it crosses the bridge. The pipeline runs in a
//! fixed order:
//!
//! 1. **[`markup`]** strips every tag. Nothing is allow-listed, and a message
//!    that contained markup is suppressed rather than relayed.
//! 2. **[`patterns`]** redacts PII-shaped substrings (URLs, emails, card
//!    numbers, SSNs, phone numbers).
//! 3. **[`banned`]** redacts banned words and phrases.
//!
//! ```rust
//! use dsbridge_moderation::{BannedWords, ModerationFilter};
//!
//! let filter = ModerationFilter::new(&BannedWords::default(), None).unwrap();
//! let verdict = filter.moderate("mail me at a@b.com");
//! assert_eq!(verdict.text, "mail me at [REMOVED]");
//! assert!(!verdict.is_suppressed());
//! ```

pub mod banned;
pub mod filter;
pub mod markup;
pub mod patterns;

pub use banned::BannedWords;
pub use filter::{FilterError, ModerationFilter, Verdict};
pub use patterns::{REDACTED, RedactionKind};
