//! Error types for dob-engine operations.
//!
//! Overlaps and unresolvable times are not errors: they are collected as
//! [`Conflict`](crate::conflict::Conflict) values so a caller can show them
//! all at once. The variants here stop the operation.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::fact::FactId;

#[derive(Error, Debug)]
pub enum DobError {
    /// A new Fact would start before the Fact that is currently ongoing.
    #[error("cannot start a new fact ({start}) before the current ongoing fact began ({ongoing_start})")]
    StartsBeforeOngoing {
        start: NaiveDateTime,
        ongoing_start: NaiveDateTime,
    },

    /// Saving would leave two Facts without an end.
    #[error("fact would be ongoing while {ongoing_id} is still ongoing")]
    SecondOngoing { ongoing_id: FactId },

    /// There is no ongoing Fact to cancel.
    #[error("Nothing tracked right now")]
    NothingOngoing,

    /// The user declined one or more conflict edits.
    #[error("{declined} of {total} conflicting edits were not confirmed")]
    Rejected { declined: usize, total: usize },

    #[error("no stored fact with id #{0}")]
    UnknownFact(i64),

    #[error("invalid time: {0}")]
    InvalidTimeToken(String),

    #[error("the 'separators' config value is not valid JSON: {0}")]
    InvalidSeparators(#[source] serde_json::Error),

    #[error("invalid settings: {0}")]
    Config(#[source] serde_json::Error),

    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    /// The factoid parser could not make a Fact of its input.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("store snapshot error: {0}")]
    Snapshot(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DobError>;
