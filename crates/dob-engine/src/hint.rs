//! Time hints: what temporal information a draft Fact is expected to carry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DobError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeHint {
    /// No time expected; the Fact passes through untouched.
    VerifyNone,
    /// Only a start is given.
    VerifyStart,
    /// Only an end is given.
    VerifyEnd,
    /// Both start and end are given.
    VerifyBoth,
    /// Start (optional) of a new Fact that closes the ongoing one.
    VerifyThen,
    /// As `VerifyThen`, and the new Fact takes the closed Fact's metadata.
    VerifyStill,
    /// No time given; the new Fact starts where the latest Fact ended.
    VerifyAfter,
    /// Final Fact of a save batch: like `VerifyBoth`, but may stay open.
    VerifyLast,
}

impl TimeHint {
    /// The hint handed to the factoid parser for a command hint.
    pub fn parser_hint(self) -> TimeHint {
        match self {
            TimeHint::VerifyThen | TimeHint::VerifyStill => TimeHint::VerifyStart,
            TimeHint::VerifyAfter => TimeHint::VerifyNone,
            TimeHint::VerifyLast => TimeHint::VerifyBoth,
            other => other,
        }
    }

    /// Whether a Fact mended under this hint may be left without an end.
    pub fn allows_open_end(self) -> bool {
        matches!(
            self,
            TimeHint::VerifyStart
                | TimeHint::VerifyThen
                | TimeHint::VerifyStill
                | TimeHint::VerifyAfter
                | TimeHint::VerifyLast
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeHint::VerifyNone => "verify_none",
            TimeHint::VerifyStart => "verify_start",
            TimeHint::VerifyEnd => "verify_end",
            TimeHint::VerifyBoth => "verify_both",
            TimeHint::VerifyThen => "verify_then",
            TimeHint::VerifyStill => "verify_still",
            TimeHint::VerifyAfter => "verify_after",
            TimeHint::VerifyLast => "verify_last",
        }
    }
}

impl fmt::Display for TimeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeHint {
    type Err = DobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verify_none" => Ok(TimeHint::VerifyNone),
            "verify_start" => Ok(TimeHint::VerifyStart),
            "verify_end" => Ok(TimeHint::VerifyEnd),
            "verify_both" => Ok(TimeHint::VerifyBoth),
            "verify_then" => Ok(TimeHint::VerifyThen),
            "verify_still" => Ok(TimeHint::VerifyStill),
            "verify_after" => Ok(TimeHint::VerifyAfter),
            "verify_last" => Ok(TimeHint::VerifyLast),
            other => Err(DobError::Parse(format!("unknown time hint: {}", other))),
        }
    }
}
