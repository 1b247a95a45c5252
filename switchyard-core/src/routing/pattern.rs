//! Ant-style route patterns
//!
//! Supported segments:
//! - literal text: `player`
//! - path variable: `{playerId}`
//! - single wildcard: `*` (exactly one segment)
//! - trailing double wildcard: `**` (zero or more segments)
//!
//! Leading and trailing slashes are ignored on both patterns and paths.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use crate::error::RpcError;

/// Path variables captured from a matched route
pub type PathParams = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
    Wildcard,
    DoubleWildcard,
}

impl Segment {
    fn is_literal(&self) -> bool {
        matches!(self, Segment::Literal(_))
    }
}

/// Ordering key: smaller sorts first and wins a tie between matching patterns
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Specificity {
    dynamic_segments: usize,
    literal_prefix: Reverse<usize>,
    catch_all: bool,
    literal_segments: Reverse<usize>,
    source: String,
}

/// A compiled route pattern
#[derive(Debug, Clone)]
pub struct RoutePattern {
    source: String,
    segments: Vec<Segment>,
}

fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

impl RoutePattern {
    pub fn parse(pattern: &str) -> Result<Self, RpcError> {
        let invalid = |reason: &str| RpcError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let parts = split_path(pattern);
        let mut segments = Vec::with_capacity(parts.len());
        let mut names = HashSet::new();

        for (index, part) in parts.iter().enumerate() {
            let segment = if *part == "**" {
                if index + 1 != parts.len() {
                    return Err(invalid("'**' is only allowed as the last segment"));
                }
                Segment::DoubleWildcard
            } else if *part == "*" {
                Segment::Wildcard
            } else if let Some(inner) = part.strip_prefix('{') {
                let name = inner.strip_suffix('}').ok_or_else(|| invalid("unclosed '{'"))?;
                if name.is_empty() || name.contains(['{', '}']) {
                    return Err(invalid("empty or nested variable name"));
                }
                if !names.insert(name.to_string()) {
                    return Err(invalid("variable declared twice"));
                }
                Segment::Variable(name.to_string())
            } else if part.contains(['{', '}', '*']) {
                return Err(invalid("wildcards and variables must span a whole segment"));
            } else {
                Segment::Literal(part.to_string())
            };
            segments.push(segment);
        }

        Ok(Self { source: parts.join("/"), segments })
    }

    /// Normalized pattern text
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Pattern text with variable names erased; two patterns with the same
    /// shape match exactly the same paths
    pub fn shape(&self) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.as_str(),
                Segment::Variable(_) => "{}",
                Segment::Wildcard => "*",
                Segment::DoubleWildcard => "**",
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Variable(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.capture(path).is_some()
    }

    /// Match `path` and return its variables, or `None` when it does not fit
    pub fn capture(&self, path: &str) -> Option<PathParams> {
        let parts = split_path(path);
        let mut params = PathParams::new();

        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::DoubleWildcard => return Some(params),
                _ if index >= parts.len() => return None,
                Segment::Literal(text) if text != parts[index] => return None,
                Segment::Literal(_) | Segment::Wildcard => {}
                Segment::Variable(name) => {
                    params.insert(name.clone(), parts[index].to_string());
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(params)
    }

    pub fn specificity(&self) -> Specificity {
        let catch_all = self.segments.last() == Some(&Segment::DoubleWildcard);
        let dynamic_segments = self.segments.iter().filter(|s| !s.is_literal()).count();
        let literal_prefix = self
            .segments
            .iter()
            .take_while(|s| s.is_literal())
            .map(|s| match s {
                Segment::Literal(text) => text.len() + 1,
                _ => 0,
            })
            .sum();
        let literal_segments = self.segments.len() - dynamic_segments;

        Specificity {
            dynamic_segments,
            literal_prefix: Reverse(literal_prefix),
            catch_all,
            literal_segments: Reverse(literal_segments),
            source: self.source.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_variables() {
        let pattern = RoutePattern::parse("/api/users/{userId}/posts/{postId}").unwrap();

        let params = pattern.capture("api/users/123/posts/456/").unwrap();
        assert_eq!(params.get("userId"), Some(&"123".to_string()));
        assert_eq!(params.get("postId"), Some(&"456".to_string()));
        assert_eq!(pattern.as_str(), "api/users/{userId}/posts/{postId}");
    }

    #[test]
    fn test_static_route_matching() {
        let pattern = RoutePattern::parse("api/health").unwrap();

        assert!(pattern.capture("/api/health").unwrap().is_empty());
        assert!(!pattern.matches("api/status"));
        assert!(!pattern.matches("api"));
        assert!(!pattern.matches("api/health/extra"));
    }

    #[test]
    fn test_wildcards() {
        let single = RoutePattern::parse("files/*/meta").unwrap();
        assert!(single.matches("files/a/meta"));
        assert!(!single.matches("files/meta"));

        let catch_all = RoutePattern::parse("static/**").unwrap();
        assert!(catch_all.matches("static"));
        assert!(catch_all.matches("static/css/site.css"));
        assert!(!catch_all.matches("assets/site.css"));
    }

    #[test]
    fn test_root_pattern() {
        let root = RoutePattern::parse("/").unwrap();
        assert!(root.matches(""));
        assert!(!root.matches("a"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(RoutePattern::parse("a/**/b").is_err());
        assert!(RoutePattern::parse("a/{id").is_err());
        assert!(RoutePattern::parse("a/{}").is_err());
        assert!(RoutePattern::parse("a/{id}/{id}").is_err());
        assert!(RoutePattern::parse("a/pre*").is_err());
    }

    #[test]
    fn test_shape_erases_names() {
        let a = RoutePattern::parse("player/{id}").unwrap();
        let b = RoutePattern::parse("/player/{playerId}").unwrap();
        assert_eq!(a.shape(), b.shape());
        assert_eq!(a.variable_names().collect::<Vec<_>>(), vec!["id"]);
    }

    #[test]
    fn test_specificity_prefers_literals() {
        let literal = RoutePattern::parse("player/me").unwrap().specificity();
        let variable = RoutePattern::parse("player/{id}").unwrap().specificity();
        let wildcard = RoutePattern::parse("{kind}/{id}").unwrap().specificity();
        let catch_all = RoutePattern::parse("player/**").unwrap().specificity();

        assert!(literal < variable);
        assert!(variable < wildcard);
        // A literal-prefixed catch-all outranks a pattern with more variables
        assert!(variable < catch_all);
        assert!(catch_all < wildcard);
    }

    #[test]
    fn test_specificity_prefers_longer_literal_prefix() {
        let deep = RoutePattern::parse("api/v1/{id}").unwrap().specificity();
        let shallow = RoutePattern::parse("api/{version}/x").unwrap().specificity();
        assert!(deep < shallow);
    }
}
