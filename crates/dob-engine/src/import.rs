//! Sequence a batch of imported drafts into absolute, non-overlapping Facts.
//!
//! Each draft is anchored by its neighbours in the batch, and the batch as a
//! whole by the stored Facts just before and after it. Nothing is closed or
//! moved implicitly: any problem inside the batch aborts it, and only a clean
//! batch is checked against the store.

use chrono::NaiveDateTime;
use log::{debug, warn};

use crate::bounds::Bounds;
use crate::conflict::{detect_conflicts_into, Conflict};
use crate::error::Result;
use crate::fact::Fact;
use crate::hint::TimeHint;
use crate::mend::{mend, OtherEdits};
use crate::resolve::{fix_times, Pass};
use crate::save::number_placeholders;
use crate::store::FactStore;

/// Result of sequencing a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome {
    /// Every draft was placed; save these with
    /// [`save_batch`](crate::save::save_batch).
    Ready(Vec<Fact>),
    /// The batch was rejected. Every problem found is listed.
    Conflicts(Vec<Conflict>),
}

impl ImportOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, ImportOutcome::Ready(_))
    }
}

/// Resolve and check an ordered list of drafts.
///
/// Relative tokens are pinned in three passes (clock times, minute offsets,
/// then blanks); a blank end with nothing after it ends at `now`.
pub fn import_facts<S>(store: &S, drafts: Vec<Fact>, now: NaiveDateTime) -> Result<ImportOutcome>
where
    S: FactStore + ?Sized,
{
    let mut facts = drafts;
    if facts.is_empty() {
        return Ok(ImportOutcome::Ready(facts));
    }
    number_placeholders(&mut facts);

    let antecedent = facts
        .iter()
        .find_map(Fact::first_known_time)
        .and_then(|at| store.antecedent(at));
    let subsequent = facts
        .iter()
        .rev()
        .find_map(Fact::last_known_time)
        .and_then(|at| store.subsequent(at));
    let bounds = Bounds::between(antecedent.as_ref(), subsequent.as_ref(), now);

    let mut conflicts = Vec::new();
    for pass in [Pass::Clock, Pass::Delta, Pass::Blank] {
        fix_times(&mut facts, &bounds, pass, &mut conflicts);
    }
    detect_conflicts_into(&facts, &bounds, false, &mut conflicts);
    if !conflicts.is_empty() {
        warn!(
            "import: {} problem(s) within the new facts; nothing imported",
            conflicts.len()
        );
        return Ok(ImportOutcome::Conflicts(conflicts));
    }

    let no_edits = OtherEdits::new();
    for fact in &facts {
        let mended = mend(store, fact.clone(), TimeHint::VerifyBoth, &no_edits, now)?;
        conflicts.extend(mended.conflicts);
    }
    if !conflicts.is_empty() {
        warn!(
            "import: {} new fact(s) would conflict with saved facts; nothing imported",
            conflicts.len()
        );
        return Ok(ImportOutcome::Conflicts(conflicts));
    }

    debug!("import: {} fact(s) ready", facts.len());
    Ok(ImportOutcome::Ready(facts))
}
