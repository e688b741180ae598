//! Stored neighbours that bound a sequence of Facts being mended.

use chrono::NaiveDateTime;

use crate::fact::Fact;

/// The stored Facts immediately before and after a sequence, plus `now`.
#[derive(Debug, Clone, Copy)]
pub struct Bounds<'a> {
    /// Nearest stored Fact before the sequence.
    pub antecedent: Option<&'a Fact>,
    /// Nearest stored Fact after the sequence.
    pub subsequent: Option<&'a Fact>,
    /// Caller-supplied current time. Open Facts run until `now`.
    pub now: NaiveDateTime,
    /// Last-resort anchor for relative tokens when nothing follows.
    pub horizon: Option<NaiveDateTime>,
}

impl<'a> Bounds<'a> {
    pub fn new(now: NaiveDateTime) -> Self {
        Bounds {
            antecedent: None,
            subsequent: None,
            now,
            horizon: None,
        }
    }

    pub fn between(
        antecedent: Option<&'a Fact>,
        subsequent: Option<&'a Fact>,
        now: NaiveDateTime,
    ) -> Self {
        Bounds {
            antecedent,
            subsequent,
            now,
            horizon: None,
        }
    }

    pub fn with_horizon(mut self, horizon: NaiveDateTime) -> Self {
        self.horizon = Some(horizon);
        self
    }

    /// Anchor that relative tokens of the first Fact count forward from.
    ///
    /// An ongoing antecedent has no end yet, so its start is used.
    pub fn prev_anchor(&self) -> Option<NaiveDateTime> {
        self.antecedent.and_then(Fact::last_known_time)
    }

    /// When the antecedent ends, for overlap checks.
    pub fn prev_end(&self) -> Option<NaiveDateTime> {
        self.antecedent.and_then(|fact| fact.end_or(self.now))
    }
}

/// The first absolute time found among `later`, then the subsequent Fact's
/// start, with the Fact it came from.
pub fn next_datetime<'a>(
    later: &'a [Fact],
    subsequent: Option<&'a Fact>,
) -> Option<(NaiveDateTime, &'a Fact)> {
    later
        .iter()
        .chain(subsequent)
        .find_map(|fact| fact.first_known_time().map(|t| (t, fact)))
}
