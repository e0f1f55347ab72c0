//! Path templates for route matching
//!
//! Provides [`PathTemplate`] for structural matching of request paths.
//!
//! Matching is purely segment-wise: equal segment count, literal segments
//! equal, dynamic segments accept any non-empty token. There is no regex and
//! no backtracking, so two templates either can match a common concrete
//! path or they cannot, and [`PathTemplate::overlaps`] decides which.

use crate::error::TemplateError;
use crate::request::PathParams;
use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// One segment of a path template
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Must equal the request segment exactly
    Literal(String),
    /// Captures any non-empty request segment under this name
    Param(String),
}

impl Segment {
    /// Check if segment is dynamic
    #[inline]
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Param(_))
    }
}

/// Parsed route path template
///
/// # Syntax
/// - `/resource/:id/sub` → literal, named param `id`, literal
/// - `/files/*` → literal, positional param named `"0"`
///
/// Positional params are named by their zero-based index among the
/// template's dynamic segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

/// Split a path into segments, ignoring leading and trailing slashes
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

impl PathTemplate {
    /// Parse a template
    ///
    /// # Errors
    /// Returns [`TemplateError`] for empty segments, unnamed or duplicate
    /// params, or a template carrying a query string.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        if raw.contains('?') {
            return Err(TemplateError::QueryInTemplate(raw.to_string()));
        }

        let mut segments = Vec::new();
        let mut names = HashSet::new();
        let mut dynamic_index = 0usize;

        for part in split_path(raw) {
            let segment = if part.is_empty() {
                return Err(TemplateError::EmptySegment(raw.to_string()));
            } else if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() {
                    return Err(TemplateError::UnnamedParam(raw.to_string()));
                }
                dynamic_index += 1;
                Segment::Param(name.to_string())
            } else if part == "*" {
                let name = dynamic_index.to_string();
                dynamic_index += 1;
                Segment::Param(name)
            } else {
                Segment::Literal(part.to_string())
            };

            if let Segment::Param(name) = &segment {
                if !names.insert(name.clone()) {
                    return Err(TemplateError::DuplicateParam {
                        template: raw.to_string(),
                        name: name.clone(),
                    });
                }
            }
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// Template text as registered
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of dynamic segments in order
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Match a concrete path, extracting params
    ///
    /// `path` must not carry a query string.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let parts = split_path(path);
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(_) if part.is_empty() => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }

    /// Check if some concrete path matches both templates
    ///
    /// Dynamic segments accept every non-empty token and literals are
    /// non-empty, so the only way two equal-length templates can disagree is
    /// a pair of different literals at the same position.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    _ => true,
                })
    }

    /// Check if templates are the same up to param names
    #[must_use]
    pub fn same_shape(&self, other: &Self) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    (Segment::Param(_), Segment::Param(_)) => true,
                    _ => false,
                })
    }
}

impl Display for PathTemplate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for PathTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn t(s: &str) -> PathTemplate {
        PathTemplate::parse(s).unwrap()
    }

    #[test]
    fn matches_named_segments() {
        let template = t("/resource/:id/sub");
        let params = template.matches("/resource/42/sub").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("42"));

        assert!(template.matches("/resource/42").is_none());
        assert!(template.matches("/resource/42/other").is_none());
        assert!(template.matches("/resource//sub").is_none());
    }

    #[test]
    fn positional_segments_are_indexed() {
        let template = t("/files/*/:name/*");
        let params = template.matches("/files/a/b/c").unwrap();
        assert_eq!(params.get("0").map(String::as_str), Some("a"));
        assert_eq!(params.get("name").map(String::as_str), Some("b"));
        assert_eq!(params.get("2").map(String::as_str), Some("c"));
    }

    #[test]
    fn trailing_slash_is_ignored() {
        let template = t("/resource/:id/");
        assert!(template.matches("/resource/7").is_some());
        assert!(template.matches("resource/7/").is_some());
    }

    #[test]
    fn root_template() {
        let template = t("/");
        assert!(template.matches("/").is_some());
        assert!(template.matches("").is_some());
        assert!(template.matches("/a").is_none());
    }

    #[test]
    fn rejects_bad_templates() {
        assert!(matches!(
            PathTemplate::parse("/a//b"),
            Err(TemplateError::EmptySegment(_))
        ));
        assert!(matches!(
            PathTemplate::parse("/a/:"),
            Err(TemplateError::UnnamedParam(_))
        ));
        assert!(matches!(
            PathTemplate::parse("/a/:id/:id"),
            Err(TemplateError::DuplicateParam { .. })
        ));
        assert!(matches!(
            PathTemplate::parse("/a?x=1"),
            Err(TemplateError::QueryInTemplate(_))
        ));
    }

    #[test]
    fn overlap_detection() {
        assert!(t("/a/:id").overlaps(&t("/a/new")));
        assert!(t("/a/:id").overlaps(&t("/:kind/:id")));
        assert!(!t("/a/:id").overlaps(&t("/b/:id")));
        assert!(!t("/a/:id").overlaps(&t("/a/:id/sub")));
        assert!(t("/a/:id").same_shape(&t("/a/:other")));
        assert!(!t("/a/:id").same_shape(&t("/a/new")));
    }

    fn segment_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("a".to_string()),
            Just("b".to_string()),
            Just(":p".to_string()),
            Just(":q".to_string()),
        ]
    }

    fn template_strategy() -> impl Strategy<Value = String> {
        proptest::collection::vec(segment_strategy(), 0..4).prop_map(|segs| {
            // Rename params by position so names never collide.
            let segs: Vec<String> = segs
                .into_iter()
                .enumerate()
                .map(|(i, s)| if s.starts_with(':') { format!("{s}{i}") } else { s })
                .collect();
            format!("/{}", segs.join("/"))
        })
    }

    fn path_strategy() -> impl Strategy<Value = String> {
        proptest::collection::vec(prop_oneof![Just("a"), Just("b"), Just("c")], 0..4)
            .prop_map(|segs| format!("/{}", segs.join("/")))
    }

    proptest! {
        #[test]
        fn prop_disjoint_templates_never_share_a_path(
            left in template_strategy(),
            right in template_strategy(),
            path in path_strategy(),
        ) {
            let left = t(&left);
            let right = t(&right);
            if left.matches(&path).is_some() && right.matches(&path).is_some() {
                prop_assert!(left.overlaps(&right));
            }
        }
    }
}
