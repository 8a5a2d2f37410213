//! Markup stripping with an empty allow-list: no tag, attribute or protocol
//! survives. Text between tags is kept.

use std::borrow::Cow;

use regex::Regex;

/// Comments, doctype/CDATA declarations, processing instructions, and
/// opening/closing/self-closing elements. A bare `<` that does not start a
/// tag name ("a < b", "<3") is left alone.
pub const MARKUP_PATTERN: &str =
    r"(?s)<!--.*?-->|<![^>]*>|<\?[^>]*>|</?[A-Za-z][A-Za-z0-9:-]*(?:\s[^<>]*)?/?>";

pub struct MarkupStripper {
    re: Regex,
}

impl MarkupStripper {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            re: Regex::new(MARKUP_PATTERN)?,
        })
    }

    /// Remove all markup, repeating until no tag is left: removing an inner
    /// tag can join the pieces of an outer one (`<<b>b>`). Borrowed when
    /// nothing was stripped.
    pub fn strip<'t>(&self, text: &'t str) -> Cow<'t, str> {
        let mut stripped = self.re.replace_all(text, "");
        if matches!(stripped, Cow::Borrowed(_)) {
            return stripped;
        }
        loop {
            let next = match self.re.replace_all(&stripped, "") {
                Cow::Borrowed(_) => break,
                Cow::Owned(next) => next,
            };
            stripped = Cow::Owned(next);
        }
        stripped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(text: &str) -> String {
        MarkupStripper::new().unwrap().strip(text).into_owned()
    }

    #[test]
    fn removes_tags_keeps_text() {
        assert_eq!(strip("<b>bold</b> move"), "bold move");
        assert_eq!(strip(r#"<a href="javascript:x()">click</a>"#), "click");
        assert_eq!(strip("line<br/>break"), "linebreak");
        assert_eq!(strip("<img src=x onerror=alert(1) />"), "");
    }

    #[test]
    fn removes_comments_and_declarations() {
        assert_eq!(strip("a<!-- hidden\nnote -->b"), "ab");
        assert_eq!(strip("<!DOCTYPE html>x"), "x");
        assert_eq!(strip("<?xml version=\"1.0\"?>x"), "x");
    }

    #[test]
    fn tags_rebuilt_by_stripping_are_removed_too() {
        assert_eq!(strip("<<b>b>hi"), "hi");
        assert_eq!(strip("<scr<b>ipt>alert(1)</scr</b>ipt>"), "alert(1)");
        assert_eq!(strip("<scr<b>ipt>"), "");
    }

    #[test]
    fn comparison_operators_are_not_markup() {
        let text = "a < b and I <3 this, 5 > 4";
        assert!(matches!(
            MarkupStripper::new().unwrap().strip(text),
            Cow::Borrowed(_)
        ));
    }
}
