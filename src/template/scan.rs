//! Placeholder scanning over a container's concatenated run text.
//!
//! The scanner never sees runs; it works on the joined text of one paragraph
//! and reports byte ranges into that text. Mapping those ranges back onto
//! runs is the job of [`super::span`].

use crate::error::DocFillError;
use serde::{Deserialize, Serialize};

/// The open/close token pair marking a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delimiters {
    pub open: String,
    pub close: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::new("{{", "}}")
    }
}

impl Delimiters {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }

    /// Both tokens must be non-empty and must not contain whitespace.
    pub fn validate(&self) -> Result<(), DocFillError> {
        for (label, token) in [("open", &self.open), ("close", &self.close)] {
            if token.is_empty() {
                return Err(DocFillError::InvalidConfig(format!(
                    "{label} delimiter must not be empty"
                )));
            }
            if token.chars().any(char::is_whitespace) {
                return Err(DocFillError::InvalidConfig(format!(
                    "{label} delimiter must not contain whitespace, got {token:?}"
                )));
            }
        }
        Ok(())
    }

    /// Wrap a name in the delimiters, e.g. `NAME` → `{{NAME}}`.
    pub fn wrap(&self, name: &str) -> String {
        format!("{}{}{}", self.open, name, self.close)
    }

    /// True if `c` appears in either token. Such characters are illegal in names.
    fn is_delimiter_char(&self, c: char) -> bool {
        self.open.contains(c) || self.close.contains(c)
    }
}

/// One placeholder token found in a container's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderMatch {
    /// Trimmed name without delimiters.
    pub name: String,
    /// Byte offset of the first delimiter character.
    pub start: usize,
    /// Byte offset one past the last delimiter character.
    pub end: usize,
}

/// Find every well-formed placeholder in `text`, in ascending start order.
///
/// An open token without a matching close is ignored. If another open token
/// appears before the close, matching restarts from the later one, so
/// `{{A {{B}}` yields only `B`. Names that are empty after trimming or that
/// contain a delimiter character are skipped.
pub fn find_placeholders(text: &str, delims: &Delimiters) -> Vec<PlaceholderMatch> {
    let open = delims.open.as_str();
    let close = delims.close.as_str();
    let mut found = Vec::new();
    let mut cursor = 0;

    while let Some(rel) = text[cursor..].find(open) {
        let mut start = cursor + rel;
        let Some(close_rel) = text[start + open.len()..].find(close) else {
            break;
        };
        let close_at = start + open.len() + close_rel;

        // Restart from the last open token that precedes the close.
        while let Some(inner) = text[start + open.len()..close_at].find(open) {
            start = start + open.len() + inner;
        }

        let end = close_at + close.len();
        let inner = text[start + open.len()..close_at].trim();
        if !inner.is_empty() && !inner.chars().any(|c| delims.is_delimiter_char(c)) {
            found.push(PlaceholderMatch {
                name: inner.to_string(),
                start,
                end,
            });
            cursor = end;
        } else {
            cursor = start + open.chars().next().map_or(1, char::len_utf8);
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(text: &str) -> Vec<String> {
        find_placeholders(text, &Delimiters::default())
            .into_iter()
            .map(|m| m.name)
            .collect()
    }

    #[test]
    fn finds_two_placeholders_with_offsets() {
        let text = "Name: {{CLIENT_NAME}}, DOB: {{DOB}}";
        let found = find_placeholders(text, &Delimiters::default());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "CLIENT_NAME");
        assert_eq!(&text[found[0].start..found[0].end], "{{CLIENT_NAME}}");
        assert_eq!(&text[found[1].start..found[1].end], "{{DOB}}");
    }

    #[test]
    fn trims_inner_whitespace() {
        assert_eq!(names("Age: {{ AGE }}"), vec!["AGE"]);
    }

    #[test]
    fn unclosed_open_is_ignored() {
        assert!(names("{{UNCLOSED").is_empty());
        assert_eq!(names("{{A}} then {{UNCLOSED"), vec!["A"]);
    }

    #[test]
    fn later_open_restarts_match() {
        assert_eq!(names("{{A {{B}}"), vec!["B"]);
    }

    #[test]
    fn empty_and_brace_names_are_skipped() {
        assert!(names("{{}} {{   }}").is_empty());
        assert!(names("{{a}b}}").is_empty());
    }

    #[test]
    fn skipped_token_does_not_hide_the_next_one() {
        assert_eq!(names("{{}}{{X}}"), vec!["X"]);
    }

    #[test]
    fn extra_braces_around_a_token() {
        let text = "{{{X}}}";
        let found = find_placeholders(text, &Delimiters::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "X");
        assert_eq!((found[0].start, found[0].end), (1, 6));
    }

    #[test]
    fn case_sensitive_and_repeated() {
        assert_eq!(names("{{x}} {{X}} {{x}}"), vec!["x", "X", "x"]);
    }

    #[test]
    fn multibyte_text_offsets_are_char_boundaries() {
        let text = "Café — {{NOM}} ✓";
        let found = find_placeholders(text, &Delimiters::default());
        assert_eq!(found.len(), 1);
        assert!(text.is_char_boundary(found[0].start));
        assert_eq!(&text[found[0].start..found[0].end], "{{NOM}}");
    }

    #[test]
    fn custom_delimiters() {
        let d = Delimiters::new("<<", ">>");
        let found = find_placeholders("Policy <<POLICY_NO>> and {{IGNORED}}", &d);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "POLICY_NO");
        assert_eq!(d.wrap("X"), "<<X>>");
    }

    #[test]
    fn delimiter_validation() {
        assert!(Delimiters::default().validate().is_ok());
        assert!(Delimiters::new("{ {", "}}").validate().is_err());
        assert!(Delimiters::new("{{", "").validate().is_err());
    }
}
