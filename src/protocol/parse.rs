//! Parsing of `list`, `config` and `fetch` replies.

use std::collections::HashMap;

use crate::types::MetricType;

/// Marker of a field type declaration in a `config` reply.
const TYPE_DIRECTIVE: &str = ".type";

/// Split a `list` reply into plugin names.
///
/// Order and duplicates are kept as sent.
pub fn parse_plugin_list(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

/// Build the field-to-type map from a `config` reply.
///
/// Only `<field>.type <TYPE>` lines are considered; graph directives, labels
/// and the like are ignored.
pub fn parse_value_types(lines: &[String]) -> HashMap<String, MetricType> {
    let mut types = HashMap::new();

    for line in lines {
        if !line.contains(TYPE_DIRECTIVE) {
            continue;
        }

        let field = field_name(line);
        match line.split_whitespace().nth(1) {
            Some(ty) => {
                types.insert(field.to_string(), MetricType::from(ty));
            }
            None => {
                tracing::debug!(line = %line, "Ignoring type declaration without a type");
            }
        }
    }

    types
}

/// Whether a reply line is a node diagnostic such as `# Unknown service`.
pub fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

/// One `fetch` reply line split into field and raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLine<'a> {
    /// Field name, the text before the first `.` of the first token.
    pub field: &'a str,
    /// Raw value, the second token.
    pub value: &'a str,
}

/// Parse a `fetch` reply line, `<field>.value <value>` or `<field> <value>`.
///
/// Returns `None` for lines without both a field and a value.
pub fn parse_fetch_line(line: &str) -> Option<FetchLine<'_>> {
    let mut tokens = line.split_whitespace();
    let first = tokens.next()?;
    let value = tokens.next()?;

    Some(FetchLine {
        field: field_name(first),
        value,
    })
}

fn field_name(s: &str) -> &str {
    s.split('.').next().unwrap_or(s)
}
