//! Error classification
//!
//! Classification is a property of the call site, not of the error: the same
//! fault can be worth retrying in one place and fatal in another. Every
//! engine entry point therefore takes its classifier as an argument.

use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

/// How a remote error should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorClass {
    /// Retry within the remaining budget
    Transient,
    /// The entity does not exist (sometimes a valid terminal state)
    NotFound,
    /// Stop and surface the error
    Fatal,
}

/// Maps a remote error to an [`ErrorClass`]
pub trait Classifier: Send + Sync {
    fn classify(&self, err: &RemoteError) -> ErrorClass;
}

impl<F> Classifier for F
where
    F: Fn(&RemoteError) -> ErrorClass + Send + Sync,
{
    fn classify(&self, err: &RemoteError) -> ErrorClass {
        self(err)
    }
}

/// Classifier that treats every error as fatal
pub fn fatal(_: &RemoteError) -> ErrorClass {
    ErrorClass::Fatal
}

/// A single classification rule
///
/// Matches when the fault code is equal and, if set, the message contains
/// `message_contains`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub code: String,

    #[serde(default)]
    pub message_contains: Option<String>,

    pub class: ErrorClass,
}

impl Rule {
    fn matches(&self, err: &RemoteError) -> bool {
        match &self.message_contains {
            Some(needle) => err.message_contains(&self.code, needle),
            None => err.code_equals(&self.code),
        }
    }
}

/// Ordered rule list; the first matching rule wins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleClassifier {
    #[serde(default)]
    rules: Vec<Rule>,

    #[serde(default = "default_class")]
    default: ErrorClass,
}

fn default_class() -> ErrorClass {
    ErrorClass::Fatal
}

impl Default for RuleClassifier {
    fn default() -> Self {
        Self::new(ErrorClass::Fatal)
    }
}

impl RuleClassifier {
    /// Create an empty classifier falling back to `default`
    pub fn new(default: ErrorClass) -> Self {
        Self {
            rules: Vec::new(),
            default,
        }
    }

    /// Classify every error with `code` as `class`
    pub fn code(mut self, code: impl Into<String>, class: ErrorClass) -> Self {
        self.rules.push(Rule {
            code: code.into(),
            message_contains: None,
            class,
        });
        self
    }

    /// Classify errors with `code` whose message contains `needle` as `class`
    pub fn message(
        mut self,
        code: impl Into<String>,
        needle: impl Into<String>,
        class: ErrorClass,
    ) -> Self {
        self.rules.push(Rule {
            code: code.into(),
            message_contains: Some(needle.into()),
            class,
        });
        self
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the classifier has no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Classifier for RuleClassifier {
    fn classify(&self, err: &RemoteError) -> ErrorClass {
        self.rules
            .iter()
            .find(|rule| rule.matches(err))
            .map(|rule| rule.class)
            .unwrap_or(self.default)
    }
}
