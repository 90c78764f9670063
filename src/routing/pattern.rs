use super::RouteError;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled path pattern such as `/users/{id}/posts`.
///
/// Empty segments are ignored, so `/users/` and `/users` are the same
/// pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, RouteError> {
        if !pattern.starts_with('/') {
            return Err(RouteError::invalid(pattern, "must start with '/'"));
        }

        let mut segments = Vec::new();
        let mut names: Vec<&str> = Vec::new();
        for part in split_path(pattern) {
            let segment = match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(name) => {
                    if name.is_empty() {
                        return Err(RouteError::invalid(pattern, "empty parameter name"));
                    }
                    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                        return Err(RouteError::invalid(
                            pattern,
                            format!("invalid parameter name '{name}'"),
                        ));
                    }
                    if names.contains(&name) {
                        return Err(RouteError::invalid(
                            pattern,
                            format!("duplicate parameter '{name}'"),
                        ));
                    }
                    names.push(name);
                    Segment::Param(name.to_string())
                }
                None if part.contains(['{', '}']) => {
                    return Err(RouteError::invalid(
                        pattern,
                        format!("unbalanced braces in segment '{part}'"),
                    ));
                }
                None => Segment::Literal(part.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: normalize(pattern),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    pub fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Join a router prefix and a route path: `join_paths("/api/", "/users")`
/// is `/api/users`.
pub fn join_paths(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => format!("/{path}"),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{prefix}/{path}"),
    }
}

pub(crate) fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn normalize(path: &str) -> String {
    let joined = split_path(path).collect::<Vec<_>>().join("/");
    format!("/{joined}")
}
