//! Identifier validation and query template rendering.
//!
//! Templates reference named identifier parameters as `@name`. Every value is
//! checked against a strict identifier pattern and emitted double-quoted, so a
//! caller can never smuggle SQL through a table or column name.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use enricher_shared::{EnricherError, Result};
use regex::Regex;

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z_][A-Za-z0-9_]*)").expect("valid regex"));

/// Check that `name` is a plain SQL identifier.
pub fn validate_identifier(name: &str) -> Result<&str> {
    if IDENTIFIER_RE.is_match(name) {
        Ok(name)
    } else {
        Err(EnricherError::validation(format!(
            "`{name}` is not a valid identifier"
        )))
    }
}

/// Validate and double-quote an identifier for direct use in SQL.
pub fn quote_identifier(name: &str) -> Result<String> {
    Ok(format!("\"{}\"", validate_identifier(name)?))
}

/// Named identifier parameters bound into a query template.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    identifiers: BTreeMap<String, String>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `@name` to an identifier value.
    pub fn identifier(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.identifiers.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.identifiers.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

/// Substitute every `@name` placeholder in `template` with its quoted value.
///
/// A placeholder with no bound parameter, or a parameter whose value is not a
/// valid identifier, is a validation error. Unused parameters are ignored.
pub fn render_query(template: &str, params: &QueryParams) -> Result<String> {
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let name = &caps[1];
        let value = params.get(name).ok_or_else(|| {
            EnricherError::validation(format!("unknown query parameter `@{name}`"))
        })?;

        rendered.push_str(&template[last..whole.start()]);
        rendered.push_str(&quote_identifier(value).map_err(|_| {
            EnricherError::validation(format!(
                "query parameter `@{name}` has invalid identifier value `{value}`"
            ))
        })?);
        last = whole.end();
    }

    rendered.push_str(&template[last..]);
    Ok(rendered)
}
