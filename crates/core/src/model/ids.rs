use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when an identifier or topic name is blank.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind} cannot be empty")]
pub struct IdError {
    kind: &'static str,
}

impl IdError {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

fn normalize(kind: &'static str, raw: impl Into<String>) -> Result<String, IdError> {
    let raw = raw.into();
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(IdError { kind });
    }
    if trimmed.len() == raw.len() {
        Ok(raw)
    } else {
        Ok(trimmed.to_owned())
    }
}

/// Identity of the learner, as handed over by the authenticated caller.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

/// Catalog key of a question.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QuestionId(String);

/// Named skill area (e.g. "Quadratic Equations") a question is tagged with.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

macro_rules! string_key {
    ($ty:ident, $kind:literal) => {
        impl $ty {
            /// Creates a key from a non-blank string (surrounding whitespace is trimmed).
            ///
            /// # Errors
            ///
            /// Returns `IdError` if the value is empty after trimming.
            pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
                normalize($kind, raw).map(Self)
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($ty), self.0)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $ty {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $ty {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_key!(UserId, "user id");
string_key!(QuestionId, "question id");
string_key!(Topic, "topic");

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_trims_whitespace() {
        let topic = Topic::new("  Quadratic Equations ").unwrap();
        assert_eq!(topic.as_str(), "Quadratic Equations");
        assert_eq!(topic.to_string(), "Quadratic Equations");
    }

    #[test]
    fn blank_ids_are_rejected() {
        let err = UserId::new("   ").unwrap_err();
        assert_eq!(err.kind(), "user id");
        assert!("".parse::<QuestionId>().is_err());
    }

    #[test]
    fn debug_names_the_key_type() {
        let id = QuestionId::new("q-17").unwrap();
        assert_eq!(format!("{id:?}"), "QuestionId(\"q-17\")");
    }

    #[test]
    fn serde_rejects_blank_topic() {
        let ok: Topic = serde_json::from_str("\"Ratios\"").unwrap();
        assert_eq!(ok.as_str(), "Ratios");
        assert!(serde_json::from_str::<Topic>("\" \"").is_err());
    }
}
