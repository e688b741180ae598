//! User settings that shape how Facts are created.

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{DobError, Result};

/// Settings read from the user's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// JSON array of item separators for the factoid parser, e.g.
    /// `[",", ":"]`. Empty or absent means the parser's defaults.
    pub fact_separators: Option<String>,
    /// IANA timezone that Fact times are recorded in.
    pub timezone: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            fact_separators: None,
            timezone: "UTC".to_string(),
        }
    }
}

impl Settings {
    /// Read settings from a JSON object; missing keys take their defaults.
    ///
    /// # Errors
    /// Returns `DobError::Config` on malformed JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(DobError::Config)
    }

    /// The configured separators, decoded.
    ///
    /// # Errors
    /// Returns `DobError::InvalidSeparators` if the value is not a JSON array
    /// of strings.
    pub fn separators(&self) -> Result<Option<Vec<String>>> {
        match self.fact_separators.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => serde_json::from_str(raw)
                .map(Some)
                .map_err(DobError::InvalidSeparators),
        }
    }

    /// Wall-clock time in the configured timezone at the instant `utc`.
    ///
    /// # Errors
    /// Returns `DobError::InvalidTimezone` if `timezone` is not a valid IANA
    /// identifier.
    pub fn local_now(&self, utc: DateTime<Utc>) -> Result<NaiveDateTime> {
        let tz: Tz = self
            .timezone
            .parse()
            .map_err(|_| DobError::InvalidTimezone(self.timezone.clone()))?;
        Ok(utc.with_timezone(&tz).naive_local())
    }
}
