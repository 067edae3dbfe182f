//! Comment-based governance annotations.
//!
//! Supports directives like:
//! ```text
//! # @arch app.service with auth, cache
//! # @intent payment
//! # @arch-override forbid_import flask reason="migration" expires="2026-12-31"
//! ```

use serde::{Deserialize, Serialize};

/// The architecture tag declared by a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchTag {
    /// Declared architecture id.
    pub id: String,
    /// Line the tag appears on (1-indexed).
    pub line: usize,
    /// Column of the `@arch` token (1-indexed).
    pub column: usize,
}

/// A declared (not yet validated) override annotation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideDecl {
    /// Rule the override targets.
    pub rule: String,
    /// Targeted value; absent means any value (`*`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Justification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Expiry date (ISO `YYYY-MM-DD`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    /// Ticket reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<String>,
    /// Approver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    /// Line the declaration appears on (1-indexed).
    #[serde(default)]
    pub line: usize,
}

/// All annotations extracted from one file's raw text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileAnnotations {
    /// The architecture tag, if present. The first tag wins.
    pub tag: Option<ArchTag>,
    /// Mixins declared inline on the tag (`with a, b`).
    pub inline_mixins: Vec<String>,
    /// Declared overrides.
    pub overrides: Vec<OverrideDecl>,
    /// Declared intents.
    pub intents: Vec<String>,
}

/// Extracts governance annotations from raw file text.
///
/// Implementations never fail on malformed input; malformed directives are
/// ignored and the corresponding fields left empty.
pub trait AnnotationParser: Send + Sync {
    /// Parses the raw text of one file.
    fn parse(&self, raw: &str) -> FileAnnotations;
}

/// Default annotation parser scanning comment lines for `@arch`,
/// `@arch-override` and `@intent` directives.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommentAnnotationParser;

impl CommentAnnotationParser {
    /// Creates a new parser.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl AnnotationParser for CommentAnnotationParser {
    fn parse(&self, raw: &str) -> FileAnnotations {
        let mut ann = FileAnnotations::default();

        for (idx, line) in raw.lines().enumerate() {
            let line_no = idx + 1;
            let Some(body) = comment_body(line) else {
                continue;
            };

            if let Some(rest) = body.strip_prefix("@arch-override") {
                if let Some(decl) = parse_override(rest, line_no) {
                    ann.overrides.push(decl);
                }
            } else if let Some(rest) = body.strip_prefix("@arch ") {
                if ann.tag.is_none() {
                    if let Some((tag, mixins)) = parse_tag(rest, line, line_no) {
                        ann.tag = Some(tag);
                        ann.inline_mixins = mixins;
                    }
                }
            } else if let Some(rest) = body.strip_prefix("@intent ") {
                for intent in rest.split(',') {
                    if let Some(name) = intent.split_whitespace().next() {
                        if !ann.intents.iter().any(|i| i == name) {
                            ann.intents.push(name.to_string());
                        }
                    }
                }
            }
        }

        ann
    }
}

/// Strips a leading comment marker, returning the directive body.
fn comment_body(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    for marker in ["///", "//!", "//", "#", "/*", "*", "--"] {
        if let Some(rest) = trimmed.strip_prefix(marker) {
            return Some(rest.trim());
        }
    }
    None
}

fn parse_tag(rest: &str, original_line: &str, line_no: usize) -> Option<(ArchTag, Vec<String>)> {
    let mut tokens = rest.split_whitespace();
    let id = tokens.next()?.to_string();

    let mixins = if tokens.next() == Some("with") {
        let remainder: Vec<&str> = tokens.collect();
        remainder
            .join(" ")
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from)
            .collect()
    } else {
        Vec::new()
    };

    let column = original_line.find("@arch").map_or(1, |i| i + 1);
    Some((
        ArchTag {
            id,
            line: line_no,
            column,
        },
        mixins,
    ))
}

fn parse_override(rest: &str, line_no: usize) -> Option<OverrideDecl> {
    let (bare, attrs) = split_tokens(rest);
    let mut decl = OverrideDecl {
        rule: bare.first()?.clone(),
        value: bare.get(1).cloned(),
        line: line_no,
        ..OverrideDecl::default()
    };

    for (key, value) in attrs {
        match key.as_str() {
            "reason" => decl.reason = Some(value),
            "expires" => decl.expires = Some(value),
            "ticket" => decl.ticket = Some(value),
            "approved_by" => decl.approved_by = Some(value),
            _ => {}
        }
    }

    Some(decl)
}

/// Splits a directive tail into bare tokens and `key="value"` attributes.
///
/// Quoted values may contain spaces; an unterminated quote invalidates
/// only that attribute.
fn split_tokens(rest: &str) -> (Vec<String>, Vec<(String, String)>) {
    let mut bare = Vec::new();
    let mut attrs = Vec::new();
    let mut pending: Option<(String, String)> = None;

    for chunk in rest.split_whitespace() {
        if let Some((key, mut value)) = pending.take() {
            if let Some(end) = chunk.strip_suffix('"') {
                value.push(' ');
                value.push_str(end);
                attrs.push((key, value));
            } else {
                value.push(' ');
                value.push_str(chunk);
                pending = Some((key, value));
            }
            continue;
        }

        if let Some(eq) = chunk.find("=\"") {
            let key = chunk[..eq].to_string();
            let after = &chunk[eq + 2..];
            if let Some(value) = after.strip_suffix('"') {
                attrs.push((key, value.to_string()));
            } else {
                pending = Some((key, after.to_string()));
            }
        } else {
            bare.push(chunk.to_string());
        }
    }

    (bare, attrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> FileAnnotations {
        CommentAnnotationParser::new().parse(raw)
    }

    #[test]
    fn parses_arch_tag() {
        let ann = parse("# @arch app.service\nimport os\n");
        let tag = ann.tag.unwrap();
        assert_eq!(tag.id, "app.service");
        assert_eq!(tag.line, 1);
        assert_eq!(tag.column, 3);
        assert!(ann.inline_mixins.is_empty());
    }

    #[test]
    fn parses_inline_mixins() {
        let ann = parse("// @arch app.service with auth, cache\n");
        assert_eq!(ann.tag.unwrap().id, "app.service");
        assert_eq!(ann.inline_mixins, vec!["auth", "cache"]);
    }

    #[test]
    fn first_tag_wins() {
        let ann = parse("# @arch first\n# @arch second\n");
        assert_eq!(ann.tag.unwrap().id, "first");
    }

    #[test]
    fn parses_intents() {
        let ann = parse("# @intent payment\n# @intent api, cache\n# @intent payment\n");
        assert_eq!(ann.intents, vec!["payment", "api", "cache"]);
    }

    #[test]
    fn longer_directive_is_not_an_intent() {
        let ann = parse("# @intention payment\n# @intents payment\n");
        assert!(ann.intents.is_empty());
    }

    #[test]
    fn parses_override_with_attrs() {
        let ann = parse(
            "# @arch-override forbid_import flask reason=\"migration in progress\" expires=\"2026-12-31\" ticket=\"ARCH-42\"\n",
        );
        assert_eq!(ann.overrides.len(), 1);
        let decl = &ann.overrides[0];
        assert_eq!(decl.rule, "forbid_import");
        assert_eq!(decl.value.as_deref(), Some("flask"));
        assert_eq!(decl.reason.as_deref(), Some("migration in progress"));
        assert_eq!(decl.expires.as_deref(), Some("2026-12-31"));
        assert_eq!(decl.ticket.as_deref(), Some("ARCH-42"));
        assert_eq!(decl.line, 1);
    }

    #[test]
    fn parses_wildcard_override() {
        let ann = parse("# @arch-override forbid_import * reason=\"r\"\n");
        assert_eq!(ann.overrides[0].value.as_deref(), Some("*"));
    }

    #[test]
    fn override_without_rule_ignored() {
        let ann = parse("# @arch-override\n");
        assert!(ann.overrides.is_empty());
    }

    #[test]
    fn unterminated_quote_drops_attr_only() {
        let ann = parse("# @arch-override forbid_import reason=\"never closed\n");
        assert_eq!(ann.overrides.len(), 1);
        assert!(ann.overrides[0].reason.is_none());
    }

    #[test]
    fn non_comment_lines_ignored() {
        let ann = parse("tag = \"@arch app.service\"\n");
        assert!(ann.tag.is_none());
    }

    #[test]
    fn malformed_input_yields_empty() {
        let ann = parse("\u{0}\u{1}garbage\n# @arch\n");
        assert!(ann.tag.is_none());
        assert!(ann.overrides.is_empty());
        assert!(ann.intents.is_empty());
    }
}
