//! Prefix-to-group delegation map.
//!
//! # Responsibilities
//! - Store route groups in registration order
//! - Look up the group for a path
//!
//! # Design Decisions
//! - Immutable after `build()` (shared without locks)
//! - Longest prefix wins when prefixes overlap
//! - Duplicate prefixes are rejected at startup rather than shadowed

use axum::Router;

use crate::routing::matcher::PathPrefix;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteTableError {
    #[error("invalid route prefix '{prefix}': {reason}")]
    InvalidPrefix { prefix: String, reason: &'static str },

    #[error("route prefix '{prefix}' is registered twice")]
    DuplicatePrefix { prefix: String },
}

/// One mounted sub-pipeline.
#[derive(Debug, Clone)]
pub struct RouteGroup {
    prefix: PathPrefix,
    router: Router,
}

impl RouteGroup {
    pub fn prefix(&self) -> &PathPrefix {
        &self.prefix
    }

    pub fn router(&self) -> &Router {
        &self.router
    }
}

#[derive(Debug, Default)]
pub struct RouteTableBuilder {
    groups: Vec<RouteGroup>,
}

impl RouteTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount `router` under `prefix`.
    pub fn register(mut self, prefix: &str, router: Router) -> Result<Self, RouteTableError> {
        let prefix = PathPrefix::parse(prefix)?;
        if self.groups.iter().any(|g| g.prefix == prefix) {
            return Err(RouteTableError::DuplicatePrefix {
                prefix: prefix.to_string(),
            });
        }
        self.groups.push(RouteGroup { prefix, router });
        Ok(self)
    }

    pub fn build(self) -> RouteTable {
        RouteTable {
            groups: self.groups,
        }
    }
}

/// Frozen route table.
#[derive(Debug)]
pub struct RouteTable {
    groups: Vec<RouteGroup>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::new()
    }

    /// The most specific group whose prefix matches `path`.
    pub fn resolve(&self, path: &str) -> Option<&RouteGroup> {
        self.groups
            .iter()
            .filter(|g| g.prefix.matches(path))
            .fold(None, |best: Option<&RouteGroup>, group| match best {
                Some(b) if b.prefix.specificity() >= group.prefix.specificity() => Some(b),
                _ => Some(group),
            })
    }

    /// Prefixes in registration order.
    pub fn prefixes(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.prefix.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
