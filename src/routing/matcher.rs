//! Path prefix matching.
//!
//! # Responsibilities
//! - Validate and normalize route group prefixes
//! - Match request paths on segment boundaries
//! - Rewrite a matched URI to the path the group sees
//!
//! # Design Decisions
//! - Matching is case-sensitive
//! - `/group` matches `/group` and `/group/x` but never `/groups`
//! - No regex to guarantee O(n) matching

use std::fmt;

use axum::http::uri::InvalidUri;
use axum::http::Uri;

use crate::routing::table::RouteTableError;

/// A normalized path prefix: starts with `/`, no trailing slash (except
/// the root prefix `/`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathPrefix(String);

impl PathPrefix {
    pub fn parse(raw: &str) -> Result<Self, RouteTableError> {
        let invalid = |reason: &'static str| RouteTableError::InvalidPrefix {
            prefix: raw.to_string(),
            reason,
        };

        if !raw.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }
        if raw.contains("//") {
            return Err(invalid("must not contain empty segments"));
        }
        if raw
            .chars()
            .any(|c| c == '?' || c == '#' || c.is_whitespace() || c.is_control())
        {
            return Err(invalid("must be a plain path"));
        }

        let trimmed = raw.trim_end_matches('/');
        if trimmed.is_empty() {
            Ok(Self("/".to_string()))
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Number of bytes of the path this prefix consumes, used to rank
    /// overlapping matches.
    pub fn specificity(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.0.len()
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        if self.is_root() {
            return true;
        }
        match path.strip_prefix(self.0.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Strip the prefix from `uri`, keeping the query.
    ///
    /// `/group/x?y` under `/group` becomes `/x?y`; `/group` becomes `/`.
    pub fn strip(&self, uri: &Uri) -> Result<Uri, InvalidUri> {
        let path = uri.path();
        let rest = if self.is_root() {
            path
        } else {
            path.strip_prefix(self.0.as_str()).unwrap_or(path)
        };
        let rest = if rest.is_empty() { "/" } else { rest };

        match uri.query() {
            Some(query) => format!("{rest}?{query}").parse(),
            None => rest.parse(),
        }
    }
}

impl fmt::Display for PathPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
