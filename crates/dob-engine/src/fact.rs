//! The Fact record and its time values.
//!
//! A Fact's `start` and `end` are each absent, absolute, or (while a draft is
//! being mended) a relative token that still has to be pinned to a date.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{DobError, Result};

const ABSOLUTE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

const CLOCK_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M", "%I:%M%p", "%I:%M %p"];

/// Identity of a Fact relative to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FactId {
    /// Not saved, and not part of a batch.
    #[default]
    Unsaved,
    /// New Fact waiting to be saved as the n-th entry of a batch.
    Placeholder(u32),
    /// Row key assigned by the store.
    Persisted(i64),
}

impl FactId {
    pub fn persisted(&self) -> Option<i64> {
        match self {
            FactId::Persisted(pk) => Some(*pk),
            _ => None,
        }
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, FactId::Persisted(_))
    }
}

impl fmt::Display for FactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactId::Unsaved => write!(f, "new"),
            FactId::Placeholder(n) => write!(f, "new#{}", n),
            FactId::Persisted(pk) => write!(f, "#{}", pk),
        }
    }
}

/// Which of a Fact's two times an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeField {
    Start,
    End,
}

impl TimeField {
    pub fn opposite(self) -> TimeField {
        match self {
            TimeField::Start => TimeField::End,
            TimeField::End => TimeField::Start,
        }
    }
}

impl fmt::Display for TimeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeField::Start => write!(f, "start"),
            TimeField::End => write!(f, "end"),
        }
    }
}

/// A Fact's start or end time.
///
/// Serializes as its string form, e.g. `"2024-01-01 09:00:00"`, `"14:30"`
/// or `"-15"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FactTime {
    Absolute(NaiveDateTime),
    /// Time of day with no date, e.g. `14:30`.
    Clock(NaiveTime),
    /// Signed offset in minutes, e.g. `+15` or `-1h30m`.
    Minutes(i64),
}

impl FactTime {
    pub fn absolute(&self) -> Option<NaiveDateTime> {
        match self {
            FactTime::Absolute(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn is_relative(&self) -> bool {
        !matches!(self, FactTime::Absolute(_))
    }

    /// Parse a time expression as typed by the user.
    ///
    /// # Errors
    /// Returns `DobError::InvalidTimeToken` if the text is none of an
    /// absolute datetime, a clock time, or a signed minute offset.
    pub fn parse(text: &str) -> Result<FactTime> {
        let text = text.trim();
        if let Some(mins) = parse_relative_minutes(text) {
            return Ok(FactTime::Minutes(mins));
        }
        if let Some(clock) = parse_clock_time(text) {
            return Ok(FactTime::Clock(clock));
        }
        ABSOLUTE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            .map(FactTime::Absolute)
            .ok_or_else(|| DobError::InvalidTimeToken(text.to_string()))
    }
}

impl From<NaiveDateTime> for FactTime {
    fn from(dt: NaiveDateTime) -> Self {
        FactTime::Absolute(dt)
    }
}

impl FromStr for FactTime {
    type Err = DobError;

    fn from_str(s: &str) -> Result<Self> {
        FactTime::parse(s)
    }
}

impl TryFrom<String> for FactTime {
    type Error = DobError;

    fn try_from(s: String) -> Result<Self> {
        FactTime::parse(&s)
    }
}

impl From<FactTime> for String {
    fn from(t: FactTime) -> Self {
        t.to_string()
    }
}

impl fmt::Display for FactTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactTime::Absolute(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            FactTime::Clock(t) if t.second() == 0 => write!(f, "{}", t.format("%H:%M")),
            FactTime::Clock(t) => write!(f, "{}", t.format("%H:%M:%S")),
            FactTime::Minutes(m) => write!(f, "{:+}", m),
        }
    }
}

/// Parse a bare time of day: `14:30`, `9:05:30`, `2:30pm`.
pub fn parse_clock_time(text: &str) -> Option<NaiveTime> {
    CLOCK_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(text, fmt).ok())
}

/// Parse a signed offset: `+15`, `-10`, `+15m`, `-2h`, `+1h30m`.
///
/// The sign is mandatory, so `15` is not an offset.
pub fn parse_relative_minutes(text: &str) -> Option<i64> {
    let (sign, body) = match text.as_bytes().first()? {
        b'+' => (1, &text[1..]),
        b'-' => (-1, &text[1..]),
        _ => return None,
    };
    if body.is_empty() {
        return None;
    }
    let mins = if body.bytes().all(|b| b.is_ascii_digit()) {
        body.parse::<i64>().ok()?
    } else {
        let (hours, rest) = match body.split_once('h') {
            Some((h, rest)) => (parse_digits(h)?, rest),
            None => (0, body),
        };
        let minutes = match rest.strip_suffix('m') {
            Some(m) => parse_digits(m)?,
            None if rest.is_empty() => 0,
            None => return None,
        };
        hours.checked_mul(60)?.checked_add(minutes)?
    };
    // Too large for a Duration is not an offset either.
    Duration::try_minutes(sign * mins).map(|_| sign * mins)
}

fn parse_digits(s: &str) -> Option<i64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Why the mender changed a Fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirtyReason {
    /// The ongoing Fact was closed because a new one started.
    Stopped,
    /// The start was taken from the end of the latest Fact.
    Backfilled,
}

impl fmt::Display for DirtyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirtyReason::Stopped => write!(f, "stopped"),
            DirtyReason::Backfilled => write!(f, "backfilled"),
        }
    }
}

/// A time-tracked activity record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Fact {
    #[serde(default)]
    pub id: FactId,
    pub start: Option<FactTime>,
    pub end: Option<FactTime>,
    #[serde(default)]
    pub activity: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub dirty_reasons: BTreeSet<DirtyReason>,
}

impl Fact {
    /// A draft with absolute times and no metadata.
    pub fn between(start: NaiveDateTime, end: Option<NaiveDateTime>) -> Self {
        Fact {
            start: Some(FactTime::Absolute(start)),
            end: end.map(FactTime::Absolute),
            ..Fact::default()
        }
    }

    pub fn with_id(mut self, id: FactId) -> Self {
        self.id = id;
        self
    }

    pub fn with_actegory(mut self, activity: &str, category: &str) -> Self {
        self.activity = activity.to_string();
        self.category = category.to_string();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn time(&self, field: TimeField) -> Option<&FactTime> {
        match field {
            TimeField::Start => self.start.as_ref(),
            TimeField::End => self.end.as_ref(),
        }
    }

    pub fn set_time(&mut self, field: TimeField, value: Option<FactTime>) {
        match field {
            TimeField::Start => self.start = value,
            TimeField::End => self.end = value,
        }
    }

    /// The field's value if it is an absolute datetime.
    pub fn at(&self, field: TimeField) -> Option<NaiveDateTime> {
        self.time(field).and_then(FactTime::absolute)
    }

    pub fn start_at(&self) -> Option<NaiveDateTime> {
        self.at(TimeField::Start)
    }

    pub fn end_at(&self) -> Option<NaiveDateTime> {
        self.at(TimeField::End)
    }

    /// Stored Facts without an end are the ongoing Fact.
    pub fn is_ongoing(&self) -> bool {
        self.end.is_none()
    }

    /// Start if absolute, else end if absolute.
    pub fn first_known_time(&self) -> Option<NaiveDateTime> {
        self.start_at().or_else(|| self.end_at())
    }

    /// End if absolute, else start if absolute.
    pub fn last_known_time(&self) -> Option<NaiveDateTime> {
        self.end_at().or_else(|| self.start_at())
    }

    /// End for overlap purposes: an open Fact runs until `now`.
    pub fn end_or(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        match &self.end {
            None => Some(now),
            Some(t) => t.absolute(),
        }
    }

    pub fn has_actegory(&self) -> bool {
        !self.activity.is_empty() || !self.category.is_empty()
    }

    pub fn mark(&mut self, reason: DirtyReason) {
        self.dirty_reasons.insert(reason);
    }

    pub fn is_dirty_for(&self, reason: DirtyReason) -> bool {
        self.dirty_reasons.contains(&reason)
    }

    /// One-line summary used in log messages.
    pub fn short(&self) -> String {
        let show = |t: Option<&FactTime>| t.map_or_else(|| "..".to_string(), |t| t.to_string());
        format!(
            "{} {} to {} {}@{}",
            self.id,
            show(self.start.as_ref()),
            show(self.end.as_ref()),
            self.activity,
            self.category,
        )
    }
}
