//! `origin.name.attribute` references.

use std::fmt;

/// A parsed interpolation variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableRef {
    /// Where the value comes from, e.g. `this` or `task-output`.
    pub origin: String,
    /// Task or task output name.
    pub name: String,
    /// Output key.
    pub attribute: String,
}

impl VariableRef {
    /// Parses the raw content of a `{{ ... }}` marker.
    ///
    /// Returns `None` unless the content has exactly three dot-separated
    /// segments, each non-empty after trimming.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let mut segments = raw.trim().split('.').map(str::trim);
        let origin = segments.next()?;
        let name = segments.next()?;
        let attribute = segments.next()?;
        if segments.next().is_some() || [origin, name, attribute].iter().any(|s| s.is_empty()) {
            return None;
        }

        Some(Self {
            origin: origin.to_string(),
            name: name.to_string(),
            attribute: attribute.to_string(),
        })
    }
}

impl fmt::Display for VariableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.origin, self.name, self.attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_segments() {
        let var = VariableRef::parse("  this . vpc .id ").unwrap();
        assert_eq!(var.origin, "this");
        assert_eq!(var.name, "vpc");
        assert_eq!(var.attribute, "id");
        assert_eq!(var.to_string(), "this.vpc.id");
    }

    #[test]
    fn test_parse_rejects_wrong_segment_count() {
        assert!(VariableRef::parse("this.vpc").is_none());
        assert!(VariableRef::parse("this.vpc.id.extra").is_none());
        assert!(VariableRef::parse("").is_none());
    }

    #[test]
    fn test_parse_rejects_empty_segment() {
        assert!(VariableRef::parse("this..id").is_none());
        assert!(VariableRef::parse(" .vpc.id").is_none());
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        let var = VariableRef::parse("task-output.Shared.DB_URL").unwrap();
        assert_eq!(var.origin, "task-output");
        assert_eq!(var.name, "Shared");
        assert_eq!(var.attribute, "DB_URL");
    }
}
