//! Helpers for reading caller tags and catalog attribute bags.

use std::collections::HashMap;
use std::fmt;

/// First non-empty value among `keys`, trimmed.
///
/// Exact key matches are tried first; a case-insensitive pass follows so that
/// `InstanceType` and `instanceType` both work.
pub fn lookup<'a>(tags: &'a HashMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    let non_empty = |value: &'a String| Some(value.trim()).filter(|v| !v.is_empty());

    keys.iter()
        .find_map(|key| tags.get(*key).and_then(non_empty))
        .or_else(|| {
            keys.iter().find_map(|key| {
                tags.iter()
                    .find(|(candidate, _)| candidate.eq_ignore_ascii_case(key))
                    .and_then(|(_, value)| non_empty(value))
            })
        })
}

/// Like [`lookup`] but also returns which key matched.
pub fn lookup_with_key<'a>(
    tags: &'a HashMap<String, String>,
    keys: &[&'a str],
) -> Option<(&'a str, &'a str)> {
    keys.iter()
        .find_map(|key| lookup(tags, &[key]).map(|value| (*key, value)))
}

/// How a usage quantity was obtained
#[derive(Debug, Clone, PartialEq)]
pub enum UsageOrigin {
    /// Read from the named tag
    Tag(String),
    /// No tag supplied
    Missing,
    /// Tag present but not a finite non-negative number
    Invalid { key: String, raw: String },
}

/// A numeric usage input plus where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Usage {
    pub value: f64,
    pub origin: UsageOrigin,
}

impl Usage {
    pub fn is_defaulted(&self) -> bool {
        !matches!(self.origin, UsageOrigin::Tag(_))
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            UsageOrigin::Tag(_) => write!(f, "{}", self.value),
            UsageOrigin::Missing => write!(f, "{} (default, not supplied)", self.value),
            UsageOrigin::Invalid { key, raw } => {
                write!(f, "{} (default, {key}={raw:?} is not a number)", self.value)
            }
        }
    }
}

/// Read a non-negative number from the first present key, else `default`.
pub fn usage(tags: &HashMap<String, String>, keys: &[&str], default: f64) -> Usage {
    let Some((key, raw)) = lookup_with_key(tags, keys) else {
        return Usage {
            value: default,
            origin: UsageOrigin::Missing,
        };
    };

    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Usage {
            value,
            origin: UsageOrigin::Tag(key.to_string()),
        },
        _ => Usage {
            value: default,
            origin: UsageOrigin::Invalid {
                key: key.to_string(),
                raw: raw.to_string(),
            },
        },
    }
}

/// Optional finite number from the first present key.
pub fn number(tags: &HashMap<String, String>, keys: &[&str]) -> Option<f64> {
    lookup(tags, keys)
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|value| value.is_finite())
}

/// String option from tags, else `default`; returns whether the default was used.
pub fn text_or<'a>(tags: &'a HashMap<String, String>, keys: &[&str], default: &'a str) -> (&'a str, bool) {
    match lookup(tags, keys) {
        Some(value) => (value, false),
        None => (default, true),
    }
}
