//! `{name}` placeholder templates for URLs, prompts and static replies.
//!
//! Syntax:
//!
//! | Text        | Meaning                                  |
//! |-------------|------------------------------------------|
//! | `{name}`    | substitute the argument `name`           |
//! | `{{` / `}}` | a literal `{` / `}`                      |
//!
//! Placeholder names are identifiers (`[A-Za-z0-9_]+`).  Templates are
//! parsed once when the registry loads, so syntax errors surface at startup
//! and only missing arguments can fail at call time.

use serde_json::{Map, Value};
use thiserror::Error;

// ---------------------------------------------------------------------------
// FormatError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// A placeholder has no resolved argument.
    #[error("missing value for placeholder {{{0}}}")]
    MissingArgument(String),

    /// Unbalanced braces or an invalid placeholder name.
    #[error("malformed template at byte {position}: {reason}")]
    Malformed { position: usize, reason: &'static str },
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse `source`, rejecting unbalanced braces and empty or non
    /// identifier placeholder names.
    pub fn parse(source: &str) -> Result<Self, FormatError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if chars.peek().is_some_and(|&(_, n)| n == '{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek().is_some_and(|&(_, n)| n == '}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, n) in chars.by_ref() {
                        if n == '}' {
                            closed = true;
                            break;
                        }
                        name.push(n);
                    }
                    if !closed {
                        return Err(FormatError::Malformed {
                            position: pos,
                            reason: "unclosed '{'",
                        });
                    }
                    if name.is_empty() || !name.chars().all(|ch| ch.is_alphanumeric() || ch == '_') {
                        return Err(FormatError::Malformed {
                            position: pos,
                            reason: "placeholder name must be an identifier",
                        });
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                '}' => {
                    return Err(FormatError::Malformed {
                        position: pos,
                        reason: "single '}' is not allowed",
                    })
                }
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The original template text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Placeholder names in order of appearance (duplicates included).
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute `args`.  String values are inserted raw, every other JSON
    /// value as its JSON text.
    pub fn render(&self, args: &Map<String, Value>) -> Result<String, FormatError> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => match args.get(name) {
                    Some(Value::String(s)) => out.push_str(s),
                    Some(other) => out.push_str(&other.to_string()),
                    None => return Err(FormatError::MissingArgument(name.clone())),
                },
            }
        }
        Ok(out)
    }
}

/// Parse and render in one step.
pub fn render(template: &str, args: &Map<String, Value>) -> Result<String, FormatError> {
    Template::parse(template)?.render(args)
}

/// Rewrite `{{name}}` (double-brace variables used by workflow editors)
/// into `{name}`.  Other doubled braces are left as escapes.
pub fn normalize_double_braces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let ident_len = after
            .char_indices()
            .find(|&(_, c)| !(c.is_alphanumeric() || c == '_'))
            .map_or(after.len(), |(i, _)| i);

        if ident_len > 0 && after[ident_len..].starts_with("}}") {
            out.push('{');
            out.push_str(&after[..ident_len]);
            out.push('}');
            rest = &after[ident_len + 2..];
        } else {
            out.push_str("{{");
            rest = after;
        }
    }

    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn substitutes_url_placeholder() {
        let out = render("https://x/{coin}", &args(json!({ "coin": "bitcoin" }))).unwrap();
        assert_eq!(out, "https://x/bitcoin");
    }

    #[test]
    fn non_string_values_use_json_text() {
        let out = render(
            "{minutes} minute meeting, urgent={urgent}",
            &args(json!({ "minutes": 30, "urgent": false })),
        )
        .unwrap();
        assert_eq!(out, "30 minute meeting, urgent=false");
    }

    #[test]
    fn missing_argument_is_reported_by_name() {
        let err = render("{a} and {b}", &args(json!({ "a": "x" }))).unwrap_err();
        assert_eq!(err, FormatError::MissingArgument("b".into()));
    }

    #[test]
    fn doubled_braces_are_literal() {
        let out = render("{{\"q\": \"{q}\"}}", &args(json!({ "q": "rome" }))).unwrap();
        assert_eq!(out, "{\"q\": \"rome\"}");
    }

    #[test]
    fn unclosed_brace_is_malformed() {
        assert!(matches!(
            Template::parse("https://x/{coin"),
            Err(FormatError::Malformed { position: 10, .. })
        ));
    }

    #[test]
    fn stray_closing_brace_is_malformed() {
        assert!(matches!(Template::parse("a } b"), Err(FormatError::Malformed { .. })));
    }

    #[test]
    fn non_identifier_placeholder_is_malformed() {
        assert!(Template::parse("{}").is_err());
        assert!(Template::parse("{a b}").is_err());
    }

    #[test]
    fn placeholders_in_order() {
        let t = Template::parse("{b}-{a}-{b}").unwrap();
        assert_eq!(t.placeholders().collect::<Vec<_>>(), vec!["b", "a", "b"]);
    }

    #[test]
    fn normalize_rewrites_double_brace_variables_only() {
        assert_eq!(
            normalize_double_braces("Location: {{location}} at {{ time }}"),
            "Location: {location} at {{ time }}"
        );
        assert_eq!(normalize_double_braces("{{{{x}}}}"), "{{{x}}}");
    }
}
