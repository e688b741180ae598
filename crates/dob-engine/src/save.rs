//! Confirm mended edits with the user and write them to the store.

use chrono::NaiveDateTime;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::conflict::Conflict;
use crate::error::{DobError, Result};
use crate::fact::{DirtyReason, Fact, FactId};
use crate::hint::TimeHint;
use crate::mend::{mend, Mended, OtherEdits};
use crate::store::FactStore;

/// Asks the user about each conflicting edit.
pub trait Confirm {
    /// `index` counts from 1 over the conflicts being asked about.
    fn confirm(&mut self, index: usize, conflict: &Conflict) -> bool;
}

/// Accepts every edit, for callers that were told "yes to all".
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysYes;

impl Confirm for AlwaysYes {
    fn confirm(&mut self, _index: usize, _conflict: &Conflict) -> bool {
        true
    }
}

impl<F> Confirm for F
where
    F: FnMut(usize, &Conflict) -> bool,
{
    fn confirm(&mut self, index: usize, conflict: &Conflict) -> bool {
        self(index, conflict)
    }
}

/// Per-invocation switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOptions {
    /// Accept every conflicting edit without asking.
    #[serde(default)]
    pub yes: bool,
    /// Ask nothing and write nothing; return what would be saved.
    #[serde(default)]
    pub dry: bool,
}

/// Put every conflict that needs it to the user.
///
/// Conflicts from stopping the ongoing Fact are expected and skipped. All
/// questions are asked before the answer is decided.
///
/// # Errors
/// - `DobError::InvalidTimeToken` if a time could not be inferred; those
///   cannot be confirmed away.
/// - `DobError::Rejected` if any edit was declined.
pub fn confirm_edits(
    conflicts: &[Conflict],
    confirm: &mut dyn Confirm,
    opts: SaveOptions,
) -> Result<()> {
    if let Some(unresolved) = conflicts.iter().find(|c| c.reason.is_unresolved_time()) {
        return Err(DobError::InvalidTimeToken(unresolved.to_string()));
    }

    let pending: Vec<&Conflict> = conflicts.iter().filter(|c| c.needs_confirmation()).collect();
    if pending.is_empty() {
        return Ok(());
    }
    if opts.yes || opts.dry {
        for conflict in &pending {
            debug!("Editing fact: {}", conflict);
        }
        return Ok(());
    }

    let declined = pending
        .iter()
        .enumerate()
        .filter(|(idx, conflict)| !confirm.confirm(idx + 1, conflict))
        .count();
    if declined > 0 {
        return Err(DobError::Rejected {
            declined,
            total: pending.len(),
        });
    }
    Ok(())
}

/// Confirm the conflicts of one mend, then save its Facts in order.
///
/// Returns the Facts as stored (or, on a dry run, as they would be).
pub fn confirm_and_save<S>(
    store: &mut S,
    mended: Mended,
    confirm: &mut dyn Confirm,
    opts: SaveOptions,
) -> Result<Vec<Fact>>
where
    S: FactStore + ?Sized,
{
    confirm_edits(&mended.conflicts, confirm, opts)?;
    let mut saved = Vec::with_capacity(mended.facts_to_save.len());
    for fact in mended.facts_to_save {
        if let Some(fact) = save_fact(store, fact, opts)? {
            saved.push(fact);
        }
    }
    Ok(saved)
}

/// Save an ordered batch of ready Facts, mending each against the store.
///
/// Every Fact of the batch is visible to the others' mends until it has
/// been saved, so a Fact the batch is about to fix is not flagged again.
/// The last Fact is mended with `verify_last` and may stay open.
///
/// # Panics
/// If a batch entry is left unaccounted for once all are saved.
pub fn save_batch<S>(
    store: &mut S,
    mut facts: Vec<Fact>,
    confirm: &mut dyn Confirm,
    opts: SaveOptions,
    now: NaiveDateTime,
) -> Result<Vec<Fact>>
where
    S: FactStore + ?Sized,
{
    number_placeholders(&mut facts);
    let mut other_edits: OtherEdits = facts.iter().map(|f| (f.id, f.clone())).collect();
    let final_idx = facts.len().saturating_sub(1);

    let mut saved = Vec::new();
    for (idx, fact) in facts.into_iter().enumerate() {
        let key = fact.id;
        let hint = if idx == final_idx {
            TimeHint::VerifyLast
        } else {
            TimeHint::VerifyBoth
        };
        let mended = mend(&*store, fact, hint, &other_edits, now)?;
        saved.extend(confirm_and_save(store, mended, confirm, opts)?);
        other_edits.remove(&key);
    }

    assert!(
        other_edits.is_empty(),
        "batch edits left unsaved: {:?}",
        other_edits.keys().collect::<Vec<_>>()
    );
    Ok(saved)
}

/// Give every unsaved Fact its own placeholder id, numbered from 1.
pub fn number_placeholders(facts: &mut [Fact]) {
    let mut next = facts
        .iter()
        .filter_map(|f| match f.id {
            FactId::Placeholder(n) => Some(n),
            _ => None,
        })
        .max()
        .unwrap_or(0);
    for fact in facts.iter_mut().filter(|f| f.id == FactId::Unsaved) {
        next += 1;
        fact.id = FactId::Placeholder(next);
    }
}

fn save_fact<S>(store: &mut S, mut fact: Fact, opts: SaveOptions) -> Result<Option<Fact>>
where
    S: FactStore + ?Sized,
{
    if let FactId::Placeholder(_) = fact.id {
        fact.id = FactId::Unsaved;
    }
    if fact.deleted && !fact.id.is_persisted() {
        debug!("Dead fact: {}", fact.short());
        return Ok(None);
    }
    if opts.dry {
        debug!("Dry run: {}", fact.short());
        return Ok(Some(fact));
    }

    debug!("Save fact: {}", fact.short());
    let stopped = fact.is_dirty_for(DirtyReason::Stopped);
    let saved = store.save(fact)?;
    if stopped {
        info!("Completed: {}", saved.short());
    }
    Ok(Some(saved))
}
