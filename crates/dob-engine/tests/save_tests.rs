//! Tests for confirming and saving mended Facts.

use chrono::{NaiveDate, NaiveDateTime};
use dob_engine::save::number_placeholders;
use dob_engine::{
    confirm_and_save, mend, save_batch, AlwaysYes, Conflict, DobError, Fact, FactId, FactStore,
    FactTime, MemoryStore, OtherEdits, SaveOptions, TimeHint,
};

// ── Helpers ─────────────────────────────────────────────────────────────────

fn at(hour: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(hour, min, 0)
        .unwrap()
}

fn noon() -> NaiveDateTime {
    at(12, 0)
}

fn store(facts: Vec<Fact>) -> MemoryStore {
    MemoryStore::with_facts(facts).unwrap()
}

fn never_asked(_: usize, conflict: &Conflict) -> bool {
    panic!("unexpected question: {}", conflict)
}

fn overlapping(db: &MemoryStore) -> dob_engine::Mended {
    mend(
        db,
        Fact::between(at(9, 30), Some(at(10, 30))),
        TimeHint::VerifyBoth,
        &OtherEdits::new(),
        noon(),
    )
    .unwrap()
}

// ── confirm_and_save ────────────────────────────────────────────────────────

#[test]
fn stopping_ongoing_needs_no_confirmation() {
    let mut db = store(vec![Fact::between(at(9, 0), None)]);
    let mended = mend(
        &db,
        Fact::between(at(10, 0), None),
        TimeHint::VerifyThen,
        &OtherEdits::new(),
        noon(),
    )
    .unwrap();

    let saved = confirm_and_save(&mut db, mended, &mut never_asked, SaveOptions::default()).unwrap();

    assert_eq!(saved.len(), 2);
    assert_eq!(saved[0].id, FactId::Persisted(1));
    assert_eq!(saved[0].end_at(), Some(at(10, 0)));
    assert!(saved[0].dirty_reasons.is_empty());
    assert_eq!(saved[1].id, FactId::Persisted(2));
    assert_eq!(db.get_current_fact().map(|f| f.id), Some(FactId::Persisted(2)));
}

#[test]
fn declined_conflict_saves_nothing() {
    let mut db = store(vec![Fact::between(at(9, 0), Some(at(10, 0)))]);
    let mended = overlapping(&db);
    let mut asked = Vec::new();
    let mut decline = |idx: usize, _: &Conflict| {
        asked.push(idx);
        false
    };

    let err = confirm_and_save(&mut db, mended, &mut decline, SaveOptions::default()).unwrap_err();

    assert!(matches!(err, DobError::Rejected { declined: 1, total: 1 }));
    assert_eq!(asked, vec![1]);
    assert_eq!(db.facts().len(), 1);
}

#[test]
fn accepted_conflict_is_saved() {
    let mut db = store(vec![Fact::between(at(9, 0), Some(at(10, 0)))]);
    let mended = overlapping(&db);

    let saved = confirm_and_save(&mut db, mended, &mut AlwaysYes, SaveOptions::default()).unwrap();

    assert_eq!(saved.len(), 1);
    assert_eq!(db.facts().len(), 2);
}

#[test]
fn yes_skips_the_questions() {
    let mut db = store(vec![Fact::between(at(9, 0), Some(at(10, 0)))]);
    let mended = overlapping(&db);
    let opts = SaveOptions {
        yes: true,
        ..SaveOptions::default()
    };

    confirm_and_save(&mut db, mended, &mut never_asked, opts).unwrap();

    assert_eq!(db.facts().len(), 2);
}

#[test]
fn dry_run_writes_nothing() {
    let mut db = store(vec![Fact::between(at(9, 0), None)]);
    let before = db.facts().to_vec();
    let mended = mend(
        &db,
        Fact::between(at(10, 0), None),
        TimeHint::VerifyThen,
        &OtherEdits::new(),
        noon(),
    )
    .unwrap();
    let opts = SaveOptions {
        dry: true,
        ..SaveOptions::default()
    };

    let would_save = confirm_and_save(&mut db, mended, &mut never_asked, opts).unwrap();

    assert_eq!(would_save.len(), 2);
    assert_eq!(would_save[1].id, FactId::Unsaved);
    assert_eq!(db.facts(), before.as_slice());
}

#[test]
fn unresolved_time_cannot_be_confirmed() {
    let mut db = store(vec![Fact::between(at(9, 0), None)]);
    let mended = mend(
        &db,
        Fact::default(),
        TimeHint::VerifyAfter,
        &OtherEdits::new(),
        noon(),
    )
    .unwrap();

    let err = confirm_and_save(&mut db, mended, &mut AlwaysYes, SaveOptions::default()).unwrap_err();

    assert!(matches!(err, DobError::InvalidTimeToken(_)));
    assert_eq!(db.facts().len(), 1);
}

// ── save_batch ──────────────────────────────────────────────────────────────

#[test]
fn batch_closes_and_continues() {
    let mut db = store(vec![Fact::between(at(9, 0), None)]);
    let mut closed = db.get(1).unwrap().clone();
    closed.end = Some(FactTime::Absolute(at(10, 0)));
    let batch = vec![closed, Fact::between(at(10, 0), None)];

    let saved = save_batch(&mut db, batch, &mut never_asked, SaveOptions::default(), noon()).unwrap();

    assert_eq!(saved.len(), 2);
    assert_eq!(db.get(1).and_then(Fact::end_at), Some(at(10, 0)));
    assert_eq!(db.get_current_fact().map(|f| f.id), Some(FactId::Persisted(2)));
}

#[test]
fn batch_entries_see_later_entries() {
    // The new Fact overlaps #1 as stored, but the batch moves #1 out of the way.
    let mut db = store(vec![Fact::between(at(10, 0), Some(at(11, 0)))]);
    let mut moved = db.get(1).unwrap().clone();
    moved.start = Some(FactTime::Absolute(at(10, 30)));
    let batch = vec![Fact::between(at(9, 30), Some(at(10, 30))), moved];

    let saved = save_batch(&mut db, batch, &mut never_asked, SaveOptions::default(), noon()).unwrap();

    assert_eq!(saved.len(), 2);
    assert_eq!(db.get(1).and_then(Fact::start_at), Some(at(10, 30)));
    assert_eq!(db.get(2).and_then(Fact::start_at), Some(at(9, 30)));
}

#[test]
fn batch_drops_dead_facts() {
    let mut db = MemoryStore::new();
    let mut dead = Fact::between(at(8, 0), Some(at(9, 0)));
    dead.deleted = true;
    let batch = vec![dead, Fact::between(at(9, 0), Some(at(10, 0)))];

    let saved = save_batch(&mut db, batch, &mut never_asked, SaveOptions::default(), noon()).unwrap();

    assert_eq!(saved.len(), 1);
    assert_eq!(db.facts().len(), 1);
}

#[test]
fn batch_stops_at_declined_conflict() {
    let mut db = store(vec![Fact::between(at(9, 0), Some(at(10, 0)))]);
    let batch = vec![
        Fact::between(at(7, 0), Some(at(8, 0))),
        Fact::between(at(9, 30), Some(at(10, 30))),
    ];
    let mut decline = |_: usize, _: &Conflict| false;

    let err = save_batch(&mut db, batch, &mut decline, SaveOptions::default(), noon()).unwrap_err();

    assert!(matches!(err, DobError::Rejected { .. }));
    // Entries before the declined one are already written.
    assert_eq!(db.facts().len(), 2);
}

#[test]
fn placeholders_continue_numbering() {
    let mut facts = vec![
        Fact::default().with_id(FactId::Placeholder(3)),
        Fact::default(),
        Fact::default().with_id(FactId::Persisted(9)),
        Fact::default(),
    ];

    number_placeholders(&mut facts);

    let ids: Vec<FactId> = facts.iter().map(|f| f.id).collect();
    assert_eq!(
        ids,
        vec![
            FactId::Placeholder(3),
            FactId::Placeholder(4),
            FactId::Persisted(9),
            FactId::Placeholder(5),
        ]
    );
}
