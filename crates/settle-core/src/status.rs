//! Status labels reported by remote entities
//!
//! The engines only ever test a status for membership in a set, so any
//! hashable, displayable type works. Typed entity kinds use enums; `Label`
//! covers the cases where statuses are only known as strings.

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SettleError;

/// Bound satisfied by every status type the engines accept
pub trait Status: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync {}

impl<T> Status for T where T: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync {}

/// Validated status label
///
/// Labels are lowercase ASCII made of `a-z`, `0-9`, `-` and `_`, which is
/// the shape every status the remote service reports has. Rejecting anything
/// else catches typos in pending/target sets at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Label(String);

impl Label {
    /// Create a label, validating its characters
    pub fn new(value: impl Into<String>) -> Result<Self, SettleError> {
        let value = value.into();

        if value.is_empty() {
            return Err(SettleError::InvalidConfig(
                "status label cannot be empty".to_string(),
            ));
        }

        if let Some(c) = value
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '_'))
        {
            return Err(SettleError::InvalidConfig(format!(
                "status label '{}' contains invalid character '{}'",
                value, c
            )));
        }

        Ok(Self(value))
    }

    /// The label text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Label {
    type Err = SettleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Label {
    type Error = SettleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Label> for String {
    fn from(label: Label) -> Self {
        label.0
    }
}

/// Join a set of statuses into a stable, comma-separated description
pub fn describe_set<'a, S, I>(statuses: I) -> String
where
    S: Status + 'a,
    I: IntoIterator<Item = &'a S>,
{
    let mut names: Vec<String> = statuses.into_iter().map(|s| s.to_string()).collect();
    names.sort();
    names.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_labels() {
        assert_eq!(Label::new("available").unwrap().as_str(), "available");
        assert!(Label::new("backing-up").is_ok());
        assert!(Label::new("preparing_data_migration").is_ok());
        assert!(Label::new("v2").is_ok());
    }

    #[test]
    fn test_invalid_labels() {
        assert!(Label::new("").is_err());
        assert!(Label::new("Available").is_err());
        assert!(Label::new("backing up").is_err());
        assert!(Label::new("done!").is_err());
    }

    #[test]
    fn test_label_serde() {
        let label: Label = serde_json::from_str("\"creating\"").unwrap();
        assert_eq!(label.to_string(), "creating");

        let bad: Result<Label, _> = serde_json::from_str("\"Creating\"");
        assert!(bad.is_err());

        assert_eq!(serde_json::to_string(&label).unwrap(), "\"creating\"");
    }

    #[test]
    fn test_describe_set_is_sorted() {
        let set = [
            Label::new("upgrading").unwrap(),
            Label::new("modifying").unwrap(),
        ];
        assert_eq!(describe_set(set.iter()), "modifying, upgrading");
    }
}
