//! Multi-dimensional pattern targeting.
//!
//! A line item carries one compiled matcher per targeting dimension. A query
//! key is the colon-joined list of sub-keys in the same dimension order, e.g.
//! `samsung:android:sports`.

use lineitem_core::{EngineError, EngineResult};
use regex::Regex;

/// Separator between sub-keys of a query key.
pub const KEY_SEPARATOR: char = ':';

const WILDCARD_PATTERN: &str = "(.*)";

/// Compiled matcher for a single dimension.
#[derive(Debug, Clone)]
pub struct DimensionMatcher {
    /// `None` matches anything.
    pattern: Option<Regex>,
    display: String,
}

impl DimensionMatcher {
    /// Compile a raw comma-separated allow-list. Blank entries are ignored and
    /// an allow-list with no entries compiles to a wildcard.
    pub fn compile(raw: &str) -> EngineResult<Self> {
        let entries: Vec<&str> = raw
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .collect();

        if entries.is_empty() {
            return Ok(Self::wildcard());
        }

        let alternation = entries.join("|");
        let pattern = Regex::new(&format!("^(?:{alternation})$")).map_err(|e| {
            EngineError::validation(format!("invalid targeting pattern '{raw}': {e}"))
        })?;

        Ok(Self {
            pattern: Some(pattern),
            display: format!("({alternation})"),
        })
    }

    pub fn wildcard() -> Self {
        Self {
            pattern: None,
            display: WILDCARD_PATTERN.to_string(),
        }
    }

    pub fn matches(&self, sub_key: &str) -> bool {
        match &self.pattern {
            None => true,
            Some(re) => re.is_match(sub_key),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.display
    }
}

/// Ordered set of dimension matchers owned by a line item.
#[derive(Debug, Clone, Default)]
pub struct TargetingMatcher {
    dimensions: Vec<DimensionMatcher>,
}

impl TargetingMatcher {
    pub fn compile<S: AsRef<str>>(specs: &[S]) -> EngineResult<Self> {
        let dimensions = specs
            .iter()
            .map(|s| DimensionMatcher::compile(s.as_ref()))
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(Self { dimensions })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions.len()
    }

    /// All dimensions must match, and the key must have exactly as many
    /// sub-keys as there are dimensions. The wildcard key matches everything.
    pub fn matches(&self, key: &QueryKey<'_>) -> bool {
        match key {
            QueryKey::Wildcard => true,
            QueryKey::Composite(parts) => {
                parts.len() == self.dimensions.len()
                    && self
                        .dimensions
                        .iter()
                        .zip(parts.iter())
                        .all(|(matcher, part)| matcher.matches(part))
            }
        }
    }

    /// Human-readable form, e.g. `(samsung|mi):(.*):(sports)`.
    pub fn key(&self) -> String {
        self.dimensions
            .iter()
            .map(DimensionMatcher::as_str)
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// A parsed targeting query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKey<'a> {
    Wildcard,
    Composite(Vec<&'a str>),
}

impl<'a> QueryKey<'a> {
    pub fn parse(raw: &'a str) -> Self {
        if raw.is_empty() {
            QueryKey::Wildcard
        } else {
            QueryKey::Composite(raw.split(KEY_SEPARATOR).collect())
        }
    }
}
