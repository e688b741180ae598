//! Detect overlapping and out-of-order Facts.
//!
//! Walks an ordered sequence of Facts between its stored neighbours and
//! reports every violation, without stopping at the first one. Adjacent
//! Facts (one ends exactly when the next starts) do not conflict.

use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::bounds::{next_datetime, Bounds};
use crate::fact::{Fact, TimeField};

/// Why a Fact needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConflictReason {
    /// A relative token had nothing to anchor to.
    CannotInfer(TimeField),
    /// The field is still blank after mending.
    MissingTime(TimeField),
    StartsBeforePrevious,
    EndsAfterNext,
    StartsAfterEnd,
    /// The ongoing Fact was closed to make way for a new one.
    OngoingStopped,
}

impl ConflictReason {
    /// A time is still relative or blank; no confirmation can fix that.
    pub fn is_unresolved_time(self) -> bool {
        matches!(
            self,
            ConflictReason::CannotInfer(_) | ConflictReason::MissingTime(_)
        )
    }

    fn flags_field(self, field: TimeField) -> bool {
        match self {
            ConflictReason::CannotInfer(f) | ConflictReason::MissingTime(f) => f == field,
            _ => false,
        }
    }
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictReason::CannotInfer(field) => write!(f, "cannot infer {} time", field),
            ConflictReason::MissingTime(field) => write!(f, "could not determine {}", field),
            ConflictReason::StartsBeforePrevious => {
                write!(f, "new fact starts before previous fact ends")
            }
            ConflictReason::EndsAfterNext => write!(f, "new fact ends after next fact starts"),
            ConflictReason::StartsAfterEnd => write!(f, "fact starts after it ends"),
            ConflictReason::OngoingStopped => write!(f, "ongoing fact stopped"),
        }
    }
}

/// An edited Fact, the Fact it ran into (if any), and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conflict {
    pub edited: Fact,
    pub original: Option<Fact>,
    pub reason: ConflictReason,
}

impl Conflict {
    pub fn new(edited: Fact, original: Option<Fact>, reason: ConflictReason) -> Self {
        Conflict {
            edited,
            original,
            reason,
        }
    }

    /// Closing the ongoing Fact is expected and is not put to the user.
    pub fn needs_confirmation(&self) -> bool {
        self.reason != ConflictReason::OngoingStopped
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.edited.short(), self.reason)?;
        if let Some(original) = &self.original {
            write!(f, " (compare {})", original.short())?;
        }
        Ok(())
    }
}

/// Two Facts overlap iff `a.start < b.end && b.start < a.end`; an open Fact
/// ends at `now`. Facts without an absolute start never overlap.
pub fn overlaps(a: &Fact, b: &Fact, now: NaiveDateTime) -> bool {
    match (a.start_at(), a.end_or(now), b.start_at(), b.end_or(now)) {
        (Some(a_start), Some(a_end), Some(b_start), Some(b_end)) => {
            a_start < b_end && b_start < a_end
        }
        _ => false,
    }
}

/// Check an ordered sequence of Facts against each other and its bounds.
///
/// With `open_tail`, the last Fact may lack an end and is then taken to run
/// until `bounds.now`.
pub fn detect_conflicts(facts: &[Fact], bounds: &Bounds<'_>, open_tail: bool) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    detect_conflicts_into(facts, bounds, open_tail, &mut conflicts);
    conflicts
}

/// As [`detect_conflicts`], appending to conflicts already collected while
/// resolving times. A time that was already reported is not reported twice.
pub fn detect_conflicts_into(
    facts: &[Fact],
    bounds: &Bounds<'_>,
    open_tail: bool,
    conflicts: &mut Vec<Conflict>,
) {
    let mut reported = Reported::new(conflicts.len());
    // Latest end (or start) confirmed so far, and the Fact it came from.
    let mut prev_time = bounds.prev_end();
    let mut prev_fact = bounds.antecedent;

    for (idx, fact) in facts.iter().enumerate() {
        let later = &facts[idx + 1..];
        let is_tail = later.is_empty();
        let mut advanced = false;

        match fact.start_at() {
            None => reported.flag_missing(fact, TimeField::Start, conflicts),
            Some(start) => match prev_time {
                Some(prev) if start < prev => conflicts.push(Conflict::new(
                    fact.clone(),
                    prev_fact.cloned(),
                    ConflictReason::StartsBeforePrevious,
                )),
                _ => {
                    prev_time = Some(start);
                    advanced = true;
                }
            },
        }

        let end = match fact.end_at() {
            Some(end) => Some(end),
            None if fact.end.is_none() && open_tail && is_tail => {
                Some(fact.start_at().map_or(bounds.now, |s| s.max(bounds.now)))
            }
            None => {
                reported.flag_missing(fact, TimeField::End, conflicts);
                None
            }
        };
        if let Some(end) = end {
            match next_datetime(later, bounds.subsequent) {
                Some((next_time, next_fact)) if end > next_time => conflicts.push(Conflict::new(
                    fact.clone(),
                    Some(next_fact.clone()),
                    ConflictReason::EndsAfterNext,
                )),
                _ => {
                    if prev_time.is_none_or(|prev| end >= prev) {
                        prev_time = Some(end);
                        advanced = true;
                    }
                }
            }
        }

        if let (Some(start), Some(end)) = (fact.start_at(), fact.end_at()) {
            if start > end {
                conflicts.push(Conflict::new(
                    fact.clone(),
                    None,
                    ConflictReason::StartsAfterEnd,
                ));
            }
        }

        if advanced {
            prev_fact = Some(fact);
        }
    }
}

/// Conflicts recorded before detection began, each standing for one field
/// of one Fact in the sequence.
///
/// Drafts that were never numbered all share [`crate::FactId::Unsaved`], so a
/// match also needs the same token in the field, and each earlier report
/// covers a single Fact.
struct Reported {
    used: Vec<bool>,
}

impl Reported {
    fn new(earlier: usize) -> Self {
        Reported {
            used: vec![false; earlier],
        }
    }

    fn flag_missing(&mut self, fact: &Fact, field: TimeField, conflicts: &mut Vec<Conflict>) {
        let earlier = self.used.iter().zip(conflicts.iter()).position(|(used, c)| {
            !used
                && c.reason.flags_field(field)
                && c.edited.id == fact.id
                && c.edited.time(field) == fact.time(field)
        });
        match earlier {
            Some(idx) => self.used[idx] = true,
            None => conflicts.push(Conflict::new(
                fact.clone(),
                None,
                ConflictReason::MissingTime(field),
            )),
        }
    }
}
