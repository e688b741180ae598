//! Tests for the conflict detector.

use chrono::{NaiveDate, NaiveDateTime};
use dob_engine::conflict::{detect_conflicts_into, overlaps};
use dob_engine::{detect_conflicts, Bounds, Conflict, ConflictReason, Fact, FactId, TimeField};

// ── Helpers ─────────────────────────────────────────────────────────────────

fn at(hour: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(hour, min, 0)
        .unwrap()
}

fn fact(n: u32, start: NaiveDateTime, end: Option<NaiveDateTime>) -> Fact {
    Fact::between(start, end).with_id(FactId::Placeholder(n))
}

fn stored(pk: i64, start: NaiveDateTime, end: Option<NaiveDateTime>) -> Fact {
    Fact::between(start, end).with_id(FactId::Persisted(pk))
}

fn reasons(conflicts: &[Conflict]) -> Vec<ConflictReason> {
    conflicts.iter().map(|c| c.reason).collect()
}

// ── Sequences ───────────────────────────────────────────────────────────────

#[test]
fn adjacent_facts_do_not_conflict() {
    let facts = vec![
        fact(1, at(9, 0), Some(at(10, 0))),
        fact(2, at(10, 0), Some(at(11, 0))),
        fact(3, at(11, 0), Some(at(11, 0))),
    ];
    let conflicts = detect_conflicts(&facts, &Bounds::new(at(18, 0)), false);
    assert!(conflicts.is_empty(), "got {:?}", conflicts);
}

#[test]
fn overlap_within_sequence_is_reported_once() {
    // 09:00-10:30 runs into 10:00-11:00.
    let facts = vec![
        fact(1, at(9, 0), Some(at(10, 30))),
        fact(2, at(10, 0), Some(at(11, 0))),
    ];
    let conflicts = detect_conflicts(&facts, &Bounds::new(at(18, 0)), false);

    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].reason, ConflictReason::EndsAfterNext);
    assert_eq!(conflicts[0].edited.id, FactId::Placeholder(1));
    assert_eq!(
        conflicts[0].original.as_ref().map(|f| f.id),
        Some(FactId::Placeholder(2))
    );
}

#[test]
fn start_before_antecedent_end() {
    let ante = stored(7, at(8, 0), Some(at(9, 30)));
    let facts = vec![fact(1, at(9, 0), Some(at(10, 0)))];
    let bounds = Bounds::between(Some(&ante), None, at(18, 0));

    let conflicts = detect_conflicts(&facts, &bounds, false);

    assert_eq!(reasons(&conflicts), vec![ConflictReason::StartsBeforePrevious]);
    assert_eq!(conflicts[0].original.as_ref(), Some(&ante));
}

#[test]
fn end_after_subsequent_start() {
    let seqt = stored(8, at(10, 30), Some(at(11, 0)));
    let facts = vec![fact(1, at(9, 0), Some(at(11, 0)))];
    let bounds = Bounds::between(None, Some(&seqt), at(18, 0));

    let conflicts = detect_conflicts(&facts, &bounds, false);

    assert_eq!(reasons(&conflicts), vec![ConflictReason::EndsAfterNext]);
    assert_eq!(conflicts[0].original.as_ref(), Some(&seqt));
}

#[test]
fn start_after_end() {
    let facts = vec![fact(1, at(11, 0), Some(at(10, 0)))];
    let conflicts = detect_conflicts(&facts, &Bounds::new(at(18, 0)), false);

    assert_eq!(reasons(&conflicts), vec![ConflictReason::StartsAfterEnd]);
    assert!(conflicts[0].original.is_none());
}

#[test]
fn ongoing_antecedent_runs_until_now() {
    let ongoing = stored(1, at(8, 0), None);
    let facts = vec![fact(1, at(10, 0), Some(at(11, 0)))];
    let bounds = Bounds::between(Some(&ongoing), None, at(12, 0));

    let conflicts = detect_conflicts(&facts, &bounds, false);

    assert_eq!(reasons(&conflicts), vec![ConflictReason::StartsBeforePrevious]);
}

#[test]
fn every_violation_is_collected() {
    let ante = stored(7, at(8, 0), Some(at(9, 30)));
    let seqt = stored(8, at(15, 0), Some(at(16, 0)));
    let facts = vec![
        fact(1, at(9, 0), Some(at(10, 0))),  // starts inside ante
        fact(2, at(12, 0), Some(at(11, 0))), // backwards
        fact(3, at(14, 0), Some(at(15, 30))), // runs into seqt
    ];
    let bounds = Bounds::between(Some(&ante), Some(&seqt), at(18, 0));

    let conflicts = detect_conflicts(&facts, &bounds, false);

    assert_eq!(
        reasons(&conflicts),
        vec![
            ConflictReason::StartsBeforePrevious,
            ConflictReason::StartsAfterEnd,
            ConflictReason::EndsAfterNext,
        ]
    );
}

#[test]
fn skipped_fact_is_not_named_as_previous() {
    let ante = stored(7, at(8, 0), Some(at(9, 30)));
    let facts = vec![
        fact(1, at(9, 0), Some(at(9, 10))),  // inside ante, ends before it
        fact(2, at(9, 20), Some(at(10, 0))), // still inside ante
    ];
    let bounds = Bounds::between(Some(&ante), None, at(18, 0));

    let conflicts = detect_conflicts(&facts, &bounds, false);

    assert_eq!(
        reasons(&conflicts),
        vec![
            ConflictReason::StartsBeforePrevious,
            ConflictReason::StartsBeforePrevious,
        ]
    );
    assert_eq!(conflicts[1].edited.id, FactId::Placeholder(2));
    assert_eq!(conflicts[1].original.as_ref(), Some(&ante));
}

// ── Missing times ───────────────────────────────────────────────────────────

#[test]
fn missing_start_is_reported() {
    let mut draft = fact(1, at(9, 0), Some(at(10, 0)));
    draft.start = None;

    let conflicts = detect_conflicts(&[draft], &Bounds::new(at(18, 0)), false);

    assert_eq!(
        reasons(&conflicts),
        vec![ConflictReason::MissingTime(TimeField::Start)]
    );
    assert_eq!(conflicts[0].reason.to_string(), "could not determine start");
}

#[test]
fn missing_time_already_flagged_is_not_repeated() {
    let mut draft = fact(1, at(9, 0), Some(at(10, 0)));
    draft.start = Some("14:30".parse().unwrap());
    let mut conflicts = vec![Conflict::new(
        draft.clone(),
        None,
        ConflictReason::CannotInfer(TimeField::Start),
    )];

    detect_conflicts_into(&[draft], &Bounds::new(at(18, 0)), false, &mut conflicts);

    assert_eq!(conflicts.len(), 1);
}

#[test]
fn unnumbered_drafts_are_reported_separately() {
    let draft = |end| Fact {
        start: None,
        ..Fact::between(at(9, 0), Some(end))
    };
    let drafts = vec![draft(at(10, 0)), draft(at(12, 0))];

    let conflicts = detect_conflicts(&drafts, &Bounds::new(at(13, 0)), false);

    assert_eq!(
        reasons(&conflicts),
        vec![
            ConflictReason::MissingTime(TimeField::Start),
            ConflictReason::MissingTime(TimeField::Start),
        ]
    );
    assert_eq!(conflicts[1].edited.end_at(), Some(at(12, 0)));
}

#[test]
fn one_earlier_report_covers_one_draft() {
    let mut first = Fact::between(at(9, 0), Some(at(10, 0)));
    first.start = Some("14:30".parse().unwrap());
    let second = first.clone();
    let mut conflicts = vec![Conflict::new(
        first.clone(),
        None,
        ConflictReason::CannotInfer(TimeField::Start),
    )];

    detect_conflicts_into(&[first, second], &Bounds::new(at(18, 0)), false, &mut conflicts);

    assert_eq!(
        reasons(&conflicts),
        vec![
            ConflictReason::CannotInfer(TimeField::Start),
            ConflictReason::MissingTime(TimeField::Start),
        ]
    );
}

#[test]
fn open_tail_only_when_allowed() {
    let facts = vec![
        fact(1, at(9, 0), Some(at(10, 0))),
        fact(2, at(10, 0), None),
    ];
    let bounds = Bounds::new(at(12, 0));

    assert!(detect_conflicts(&facts, &bounds, true).is_empty());
    assert_eq!(
        reasons(&detect_conflicts(&facts, &bounds, false)),
        vec![ConflictReason::MissingTime(TimeField::End)]
    );
}

#[test]
fn open_head_is_never_allowed() {
    let facts = vec![
        fact(1, at(9, 0), None),
        fact(2, at(10, 0), Some(at(11, 0))),
    ];
    let conflicts = detect_conflicts(&facts, &Bounds::new(at(12, 0)), true);
    assert_eq!(
        reasons(&conflicts),
        vec![ConflictReason::MissingTime(TimeField::End)]
    );
}

#[test]
fn open_tail_runs_into_later_stored_fact() {
    let seqt = stored(4, at(11, 0), Some(at(11, 30)));
    let facts = vec![fact(1, at(10, 0), None)];
    let bounds = Bounds::between(None, Some(&seqt), at(12, 0));

    let conflicts = detect_conflicts(&facts, &bounds, true);

    assert_eq!(reasons(&conflicts), vec![ConflictReason::EndsAfterNext]);
}

// ── Pairwise overlap ────────────────────────────────────────────────────────

#[test]
fn pairwise_overlap() {
    let now = at(18, 0);
    let a = fact(1, at(9, 0), Some(at(10, 0)));
    let adjacent = fact(2, at(10, 0), Some(at(11, 0)));
    let inside = fact(3, at(9, 15), Some(at(9, 45)));
    let open = fact(4, at(9, 30), None);

    assert!(!overlaps(&a, &adjacent, now));
    assert!(overlaps(&a, &inside, now));
    assert!(overlaps(&inside, &a, now));
    assert!(overlaps(&adjacent, &open, now));
}

#[test]
fn reasons_read_as_messages() {
    assert_eq!(
        ConflictReason::CannotInfer(TimeField::End).to_string(),
        "cannot infer end time"
    );
    assert_eq!(
        ConflictReason::StartsBeforePrevious.to_string(),
        "new fact starts before previous fact ends"
    );
    assert_eq!(
        ConflictReason::EndsAfterNext.to_string(),
        "new fact ends after next fact starts"
    );
    assert_eq!(
        ConflictReason::StartsAfterEnd.to_string(),
        "fact starts after it ends"
    );
}
