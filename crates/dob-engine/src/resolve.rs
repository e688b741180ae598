//! Pin relative time tokens to absolute datetimes.
//!
//! A clock time (`14:30`) is placed on whichever day puts it closest to an
//! anchor in the requested direction. A minute offset (`+15`, `-10`) is added
//! to an anchor: positive offsets count from the previous known time,
//! negative ones back from the next known time.
//!
//! Sequences are resolved in passes, clock times first, because a clock time
//! pinned in one pass can anchor an offset in the next.

use chrono::{Duration, NaiveDateTime, NaiveTime};

use crate::bounds::{next_datetime, Bounds};
use crate::conflict::{Conflict, ConflictReason};
use crate::fact::{Fact, FactTime, TimeField};

/// One sweep over a sequence, fixing one kind of token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Clock times without a date.
    Clock,
    /// Signed minute offsets.
    Delta,
    /// Blank times, filled from the neighbouring times.
    Blank,
}

/// Latest occurrence of `clock` at or before `anchor`.
pub fn clock_prior(anchor: NaiveDateTime, clock: NaiveTime) -> NaiveDateTime {
    let candidate = anchor.date().and_time(clock);
    if candidate > anchor {
        candidate - Duration::days(1)
    } else {
        candidate
    }
}

/// Earliest occurrence of `clock` at or after `anchor`.
pub fn clock_after(anchor: NaiveDateTime, clock: NaiveTime) -> NaiveDateTime {
    let candidate = anchor.date().and_time(clock);
    if candidate < anchor {
        candidate + Duration::days(1)
    } else {
        candidate
    }
}

/// Resolve one field of `fact` to an absolute datetime.
///
/// Absolute values come back unchanged. `next_time` is only called when no
/// closer anchor exists. Returns `None` for a blank field, when the token
/// has nothing to anchor to, or when the result falls outside the calendar.
pub fn resolve_relative<F>(
    fact: &Fact,
    field: TimeField,
    prev_time: Option<NaiveDateTime>,
    next_time: F,
) -> Option<NaiveDateTime>
where
    F: FnOnce() -> Option<NaiveDateTime>,
{
    match fact.time(field)? {
        FactTime::Absolute(dt) => Some(*dt),
        FactTime::Clock(clock) => resolve_clock(fact, field, *clock, prev_time, next_time),
        FactTime::Minutes(mins) => resolve_delta(fact, field, *mins, prev_time, next_time),
    }
}

fn resolve_clock<F>(
    fact: &Fact,
    field: TimeField,
    clock: NaiveTime,
    prev_time: Option<NaiveDateTime>,
    next_time: F,
) -> Option<NaiveDateTime>
where
    F: FnOnce() -> Option<NaiveDateTime>,
{
    // The Fact's own other time is the best anchor.
    if let Some(oppo) = fact.at(field.opposite()) {
        return Some(match field {
            TimeField::Start => clock_prior(oppo, clock),
            TimeField::End => clock_after(oppo, clock),
        });
    }
    match prev_time {
        Some(prev) => Some(clock_after(prev, clock)),
        None => next_time().map(|next| clock_prior(next, clock)),
    }
}

fn resolve_delta<F>(
    fact: &Fact,
    field: TimeField,
    mins: i64,
    prev_time: Option<NaiveDateTime>,
    next_time: F,
) -> Option<NaiveDateTime>
where
    F: FnOnce() -> Option<NaiveDateTime>,
{
    let delta = Duration::try_minutes(mins)?;
    let anchor = if mins >= 0 {
        prev_time
    } else {
        match (field, fact.end_at()) {
            (TimeField::Start, Some(end)) => Some(end),
            _ => next_time(),
        }
    };
    anchor?.checked_add_signed(delta)
}

/// Run the clock pass then the delta pass over `facts`.
pub fn resolve_times(facts: &mut [Fact], bounds: &Bounds<'_>, conflicts: &mut Vec<Conflict>) {
    fix_times(facts, bounds, Pass::Clock, conflicts);
    fix_times(facts, bounds, Pass::Delta, conflicts);
}

/// Sweep `facts` in order, fixing the tokens `pass` handles.
///
/// Each Fact's anchors are the latest time fixed before it and the first
/// absolute time among the Facts after it (then the subsequent stored Fact,
/// then the horizon). Failures are recorded as conflicts and the sweep
/// carries on.
pub fn fix_times(
    facts: &mut [Fact],
    bounds: &Bounds<'_>,
    pass: Pass,
    conflicts: &mut Vec<Conflict>,
) {
    let mut prev_time = bounds.prev_anchor();
    for idx in 0..facts.len() {
        let (head, later) = facts.split_at_mut(idx + 1);
        let fact = &mut head[idx];
        let later: &[Fact] = later;
        for field in [TimeField::Start, TimeField::End] {
            prev_time = fix_field(fact, field, pass, prev_time, later, bounds, conflicts);
        }
    }
}

fn fix_field(
    fact: &mut Fact,
    field: TimeField,
    pass: Pass,
    prev_time: Option<NaiveDateTime>,
    later: &[Fact],
    bounds: &Bounds<'_>,
    conflicts: &mut Vec<Conflict>,
) -> Option<NaiveDateTime> {
    let next_time = || {
        next_datetime(later, bounds.subsequent)
            .map(|(at, _)| at)
            .or(bounds.horizon)
    };

    let fixed = match (pass, fact.time(field)) {
        (_, Some(FactTime::Absolute(dt))) => return Some(*dt),
        (Pass::Clock, Some(FactTime::Clock(_))) | (Pass::Delta, Some(FactTime::Minutes(_))) => {
            resolve_relative(fact, field, prev_time, next_time)
        }
        (Pass::Blank, None) => match field {
            TimeField::Start => prev_time,
            TimeField::End => Some(next_time().unwrap_or(bounds.now)),
        },
        _ => return prev_time,
    };

    match fixed {
        Some(at) => {
            fact.set_time(field, Some(FactTime::Absolute(at)));
            Some(at)
        }
        None => {
            conflicts.push(Conflict::new(
                fact.clone(),
                None,
                ConflictReason::CannotInfer(field),
            ));
            prev_time
        }
    }
}
