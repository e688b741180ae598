//! The Fact mender: fit one new or edited Fact into the stored timeline.
//!
//! Relative times are pinned using the neighbouring stored Facts, and the
//! result is checked for overlaps. The only stored Fact the mender changes on
//! its own is the ongoing one, which `verify_then` and `verify_still` close
//! at the new Fact's start. Every other problem comes back as a
//! [`Conflict`] for the caller to confirm or reject.

use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime};
use log::debug;

use crate::bounds::Bounds;
use crate::conflict::{detect_conflicts_into, Conflict, ConflictReason};
use crate::error::{DobError, Result};
use crate::fact::{DirtyReason, Fact, FactId, FactTime, TimeField};
use crate::hint::TimeHint;
use crate::resolve::resolve_times;
use crate::store::FactStore;

/// Facts already slated for saving in the same batch, by identity.
///
/// When a stored neighbour appears here, the batch's version is used
/// instead of the stored one.
pub type OtherEdits = HashMap<FactId, Fact>;

/// What the mender wants saved, and what needs confirming first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mended {
    /// Facts to save, in order.
    pub facts_to_save: Vec<Fact>,
    pub conflicts: Vec<Conflict>,
}

impl Mended {
    fn unchanged(fact: Fact) -> Self {
        Mended {
            facts_to_save: vec![fact],
            conflicts: Vec::new(),
        }
    }

    /// True when there is nothing for the user to look at.
    pub fn is_clean(&self) -> bool {
        self.conflicts.iter().all(|c| !c.needs_confirmation())
    }
}

/// Mend `fact` against `store` according to `hint`.
///
/// `now` is the caller's current time; open Facts are taken to run until it.
///
/// # Errors
/// - `DobError::StartsBeforeOngoing` when `verify_then`/`verify_still` would
///   start the new Fact before the ongoing one began.
/// - `DobError::SecondOngoing` when the mended Fact would be left open while
///   another stored Fact is still ongoing.
pub fn mend<S>(
    store: &S,
    fact: Fact,
    hint: TimeHint,
    other_edits: &OtherEdits,
    now: NaiveDateTime,
) -> Result<Mended>
where
    S: FactStore + ?Sized,
{
    debug!("mend: {} [{}]", fact.short(), hint);
    if fact.deleted {
        return Ok(Mended::unchanged(fact));
    }
    match hint {
        TimeHint::VerifyNone => Ok(Mended::unchanged(fact)),
        TimeHint::VerifyStart | TimeHint::VerifyEnd | TimeHint::VerifyBoth | TimeHint::VerifyLast => {
            mend_verified(store, fact, hint, other_edits, now)
        }
        TimeHint::VerifyThen => mend_then(store, fact, false, other_edits, now),
        TimeHint::VerifyStill => mend_then(store, fact, true, other_edits, now),
        TimeHint::VerifyAfter => mend_after(store, fact, other_edits, now),
    }
}

// ---------------------------------------------------------------------------
// verify_start / verify_end / verify_both / verify_last
// ---------------------------------------------------------------------------

fn mend_verified<S>(
    store: &S,
    fact: Fact,
    hint: TimeHint,
    other_edits: &OtherEdits,
    now: NaiveDateTime,
) -> Result<Mended>
where
    S: FactStore + ?Sized,
{
    let mut conflicts = Vec::new();
    let mut facts = vec![fact];

    let around = Neighbours::find(store, &facts[0], other_edits, now);
    resolve_times(&mut facts, &around.bounds(now).with_horizon(now), &mut conflicts);

    // Resolution may have moved the Fact; look again from where it landed.
    let mut around = Neighbours::find(store, &facts[0], other_edits, now);
    if hint == TimeHint::VerifyLast {
        // Nothing follows the last Fact of a batch.
        around.subsequent = None;
    }
    let bounds = around.bounds(now);

    if hint == TimeHint::VerifyEnd && facts[0].start.is_none() {
        match bounds.prev_anchor() {
            Some(start) => facts[0].start = Some(FactTime::Absolute(start)),
            None => conflicts.push(Conflict::new(
                facts[0].clone(),
                None,
                ConflictReason::CannotInfer(TimeField::Start),
            )),
        }
    }

    detect_conflicts_into(&facts, &bounds, hint.allows_open_end(), &mut conflicts);
    if hint.allows_open_end() {
        must_not_leave_two_ongoing(store, &facts[0], other_edits)?;
    }

    Ok(Mended {
        facts_to_save: facts,
        conflicts,
    })
}

// ---------------------------------------------------------------------------
// verify_then / verify_still
// ---------------------------------------------------------------------------

fn mend_then<S>(
    store: &S,
    mut fact: Fact,
    copy_meta: bool,
    other_edits: &OtherEdits,
    now: NaiveDateTime,
) -> Result<Mended>
where
    S: FactStore + ?Sized,
{
    let mut conflicts = Vec::new();
    // The start is the only time that counts.
    fact.end = None;

    let ongoing = current_fact(store, &fact, other_edits);
    let latest = match &ongoing {
        Some(ongoing) => Some(ongoing.clone()),
        None => Neighbours::latest(store, &fact, other_edits, now),
    };

    let mut facts = vec![fact];
    let bounds = Bounds::between(latest.as_ref(), None, now).with_horizon(now);
    resolve_times(&mut facts, &bounds, &mut conflicts);
    let mut fact = facts.remove(0);

    if fact.start.is_none() {
        match (&ongoing, &latest) {
            (None, Some(prev)) if prev.end_at().is_some() => {
                fact.start = prev.end_at().map(FactTime::Absolute);
                fact.mark(DirtyReason::Backfilled);
                if copy_meta {
                    copy_metadata(prev, &mut fact);
                }
            }
            _ => fact.start = Some(FactTime::Absolute(now)),
        }
    }
    let Some(start) = fact.start_at() else {
        // Could not pin the start; nothing else can be decided.
        return Ok(Mended {
            facts_to_save: vec![fact],
            conflicts,
        });
    };

    let mut facts_to_save = Vec::new();
    let mut edits = other_edits.clone();
    if let Some(ongoing) = ongoing {
        let closed = stop_ongoing(&ongoing, start)?;
        if copy_meta {
            copy_metadata(&closed, &mut fact);
        }
        debug!("mend: stopping {}", closed.short());
        conflicts.push(Conflict::new(
            closed.clone(),
            Some(ongoing),
            ConflictReason::OngoingStopped,
        ));
        // The closed Fact ends where the new one starts; look past it.
        let mut hidden = closed.clone();
        hidden.deleted = true;
        edits.insert(closed.id, hidden);
        facts_to_save.push(closed);
    }

    let facts = std::slice::from_ref(&fact);
    let around = Neighbours::find(store, &fact, &edits, now);
    detect_conflicts_into(facts, &around.bounds(now), true, &mut conflicts);
    must_not_leave_two_ongoing(store, &fact, &edits)?;

    facts_to_save.push(fact);
    Ok(Mended {
        facts_to_save,
        conflicts,
    })
}

fn stop_ongoing(ongoing: &Fact, at: NaiveDateTime) -> Result<Fact> {
    if let Some(ongoing_start) = ongoing.start_at() {
        if at < ongoing_start {
            return Err(DobError::StartsBeforeOngoing {
                start: at,
                ongoing_start,
            });
        }
    }
    let mut closed = ongoing.clone();
    closed.end = Some(FactTime::Absolute(at));
    closed.mark(DirtyReason::Stopped);
    Ok(closed)
}

/// Carry activity, category and tags forward, unless the user gave them.
fn copy_metadata(from: &Fact, to: &mut Fact) {
    if !to.has_actegory() {
        to.activity = from.activity.clone();
        to.category = from.category.clone();
    }
    if to.tags.is_empty() {
        to.tags = from.tags.clone();
    }
}

// ---------------------------------------------------------------------------
// verify_after
// ---------------------------------------------------------------------------

fn mend_after<S>(
    store: &S,
    mut fact: Fact,
    other_edits: &OtherEdits,
    now: NaiveDateTime,
) -> Result<Mended>
where
    S: FactStore + ?Sized,
{
    fact.end = None;
    let cannot_infer = |fact: Fact| -> Result<Mended> {
        let conflict = Conflict::new(
            fact.clone(),
            None,
            ConflictReason::CannotInfer(TimeField::Start),
        );
        Ok(Mended {
            facts_to_save: vec![fact],
            conflicts: vec![conflict],
        })
    };
    if current_fact(store, &fact, other_edits).is_some() {
        // The latest Fact has not ended, so there is no "after" yet.
        return cannot_infer(fact);
    }

    let offset = match fact.start {
        Some(FactTime::Minutes(mins)) => Duration::try_minutes(mins),
        _ => Some(Duration::zero()),
    };
    let latest_end = Neighbours::latest(store, &fact, other_edits, now).and_then(|f| f.end_at());
    match latest_end {
        Some(end) => match offset.and_then(|offset| end.checked_add_signed(offset)) {
            Some(start) => fact.start = Some(FactTime::Absolute(start)),
            None => return cannot_infer(fact),
        },
        // No earlier Fact: the caller picks the start.
        None => fact.start = None,
    }

    let mut conflicts = Vec::new();
    if fact.start.is_some() {
        let around = Neighbours::find(store, &fact, other_edits, now);
        detect_conflicts_into(
            std::slice::from_ref(&fact),
            &around.bounds(now),
            true,
            &mut conflicts,
        );
    }
    Ok(Mended {
        facts_to_save: vec![fact],
        conflicts,
    })
}

// ---------------------------------------------------------------------------
// Store lookups
// ---------------------------------------------------------------------------

/// The stored ongoing Fact, unless it is `fact` itself or the batch closes it.
fn current_fact<S>(store: &S, fact: &Fact, other_edits: &OtherEdits) -> Option<Fact>
where
    S: FactStore + ?Sized,
{
    store
        .get_current_fact()
        .filter(|current| current.id != fact.id)
        .map(|current| other_edits.get(&current.id).cloned().unwrap_or(current))
        .filter(|current| current.is_ongoing() && !current.deleted)
}

fn must_not_leave_two_ongoing<S>(store: &S, fact: &Fact, other_edits: &OtherEdits) -> Result<()>
where
    S: FactStore + ?Sized,
{
    if fact.end.is_some() {
        return Ok(());
    }
    match current_fact(store, fact, other_edits) {
        Some(current) => Err(DobError::SecondOngoing {
            ongoing_id: current.id,
        }),
        None => Ok(()),
    }
}

/// Stored Facts on either side of the Fact being mended.
struct Neighbours {
    antecedent: Option<Fact>,
    subsequent: Option<Fact>,
}

impl Neighbours {
    /// Neighbours around the Fact's first known time, else around `now`.
    ///
    /// The Fact's own stored row is skipped, and rows the batch is editing
    /// are replaced by their edited versions (or skipped if deleted).
    fn find<S>(store: &S, fact: &Fact, other_edits: &OtherEdits, now: NaiveDateTime) -> Self
    where
        S: FactStore + ?Sized,
    {
        let ref_time = fact.first_known_time().unwrap_or(now);
        Neighbours {
            antecedent: Self::walk_back(store, fact, other_edits, ref_time),
            subsequent: Self::walk_forward(store, fact, other_edits, ref_time),
        }
    }

    /// The Fact that started most recently before `now`.
    fn latest<S>(store: &S, fact: &Fact, other_edits: &OtherEdits, now: NaiveDateTime) -> Option<Fact>
    where
        S: FactStore + ?Sized,
    {
        Self::walk_back(store, fact, other_edits, now)
    }

    fn walk_back<S>(
        store: &S,
        fact: &Fact,
        other_edits: &OtherEdits,
        mut ref_time: NaiveDateTime,
    ) -> Option<Fact>
    where
        S: FactStore + ?Sized,
    {
        loop {
            let found = store.antecedent(ref_time)?;
            let found_start = found.start_at()?;
            match substitute(found, fact, other_edits) {
                Some(neighbour) => return Some(neighbour),
                None => ref_time = found_start,
            }
        }
    }

    fn walk_forward<S>(
        store: &S,
        fact: &Fact,
        other_edits: &OtherEdits,
        mut ref_time: NaiveDateTime,
    ) -> Option<Fact>
    where
        S: FactStore + ?Sized,
    {
        loop {
            let found = store.subsequent(ref_time)?;
            let found_start = found.start_at()?;
            // Rows are stored at second precision.
            let past = match found.end_at() {
                Some(end) if end > found_start => end,
                _ => found_start + Duration::seconds(1),
            };
            match substitute(found, fact, other_edits) {
                Some(neighbour) => return Some(neighbour),
                None => ref_time = past,
            }
        }
    }

    fn bounds(&self, now: NaiveDateTime) -> Bounds<'_> {
        Bounds::between(self.antecedent.as_ref(), self.subsequent.as_ref(), now)
    }
}

/// `None` when the stored row should be looked past.
fn substitute(found: Fact, fact: &Fact, other_edits: &OtherEdits) -> Option<Fact> {
    if found.id == fact.id {
        return None;
    }
    match other_edits.get(&found.id) {
        Some(edited) if edited.deleted => None,
        Some(edited) => Some(edited.clone()),
        None => Some(found),
    }
}
