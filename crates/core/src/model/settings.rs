use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_DAILY_QUESTION_LIMIT: u32 = 10;
pub const MIN_DAILY_QUESTION_LIMIT: u32 = 5;
pub const MAX_DAILY_QUESTION_LIMIT: u32 = 50;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("daily question limit must be between 5 and 50, got {0}")]
    InvalidDailyQuestionLimit(u32),

    #[error("invalid role: {0}")]
    InvalidRole(String),

    #[error("invalid test date (expected YYYY-MM-DD): {0}")]
    InvalidTestDate(String),

    #[error("no settings provided to update")]
    NothingToUpdate,
}

/// Who the learner is; informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    MsStudent,
    HsStudent,
    Teacher,
    Other,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::MsStudent => "ms_student",
            Role::HsStudent => "hs_student",
            Role::Teacher => "teacher",
            Role::Other => "other",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ms_student" => Ok(Role::MsStudent),
            "hs_student" => Ok(Role::HsStudent),
            "teacher" => Ok(Role::Teacher),
            "other" => Ok(Role::Other),
            _ => Err(SettingsError::InvalidRole(s.to_owned())),
        }
    }
}

/// Per-learner preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    daily_question_limit: u32,
    role: Option<Role>,
    test_date: Option<NaiveDate>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            daily_question_limit: DEFAULT_DAILY_QUESTION_LIMIT,
            role: None,
            test_date: None,
        }
    }
}

fn check_limit(limit: u32) -> Result<u32, SettingsError> {
    if (MIN_DAILY_QUESTION_LIMIT..=MAX_DAILY_QUESTION_LIMIT).contains(&limit) {
        Ok(limit)
    } else {
        Err(SettingsError::InvalidDailyQuestionLimit(limit))
    }
}

impl UserSettings {
    /// Rehydrate settings from storage.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidDailyQuestionLimit` if the stored limit is out of range.
    pub fn from_persisted(
        daily_question_limit: u32,
        role: Option<Role>,
        test_date: Option<NaiveDate>,
    ) -> Result<Self, SettingsError> {
        Ok(Self {
            daily_question_limit: check_limit(daily_question_limit)?,
            role,
            test_date,
        })
    }

    /// Number of questions in a prioritized session when the caller gives no limit.
    #[must_use]
    pub fn daily_question_limit(&self) -> u32 {
        self.daily_question_limit
    }

    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    #[must_use]
    pub fn test_date(&self) -> Option<NaiveDate> {
        self.test_date
    }

    /// Merge a partial update into these settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the update is empty or any field is invalid.
    pub fn apply(&self, update: SettingsUpdate) -> Result<Self, SettingsError> {
        if update.is_empty() {
            return Err(SettingsError::NothingToUpdate);
        }

        let mut next = self.clone();
        if let Some(limit) = update.daily_question_limit {
            next.daily_question_limit = check_limit(limit)?;
        }
        if let Some(role) = update.role {
            next.role = Some(role.parse()?);
        }
        if let Some(raw) = update.test_date {
            // an empty string clears the date
            next.test_date = if raw.trim().is_empty() {
                None
            } else {
                Some(
                    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                        .map_err(|_| SettingsError::InvalidTestDate(raw.clone()))?,
                )
            };
        }
        Ok(next)
    }
}

/// Partial settings change as received from the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub daily_question_limit: Option<u32>,
    pub role: Option<String>,
    pub test_date: Option<String>,
}

impl SettingsUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.daily_question_limit.is_none() && self.role.is_none() && self.test_date.is_none()
    }
}
