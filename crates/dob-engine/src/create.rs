//! Add one Fact from a factoid: parse, mend, confirm, save. Or cancel the
//! ongoing one.

use chrono::NaiveDateTime;
use log::{error, info};

use crate::config::Settings;
use crate::error::{DobError, Result};
use crate::fact::{Fact, FactTime};
use crate::hint::TimeHint;
use crate::mend::{mend, OtherEdits};
use crate::save::{confirm_and_save, Confirm, SaveOptions};
use crate::store::FactStore;

/// Turns the words of a factoid into a draft Fact.
///
/// For example `"14:30 Coding@Work #urgent: fixing bug"` under
/// `verify_start`. Times the parser cannot pin to a date are left as
/// relative [`FactTime`]s for the mender.
pub trait FactoidParser {
    fn parse(
        &self,
        factoid: &[String],
        hint: TimeHint,
        separators: Option<&[String]>,
    ) -> Result<Fact>;
}

/// Create a Fact from `factoid` and save it along with any edits it causes
/// to the ongoing Fact.
///
/// Returns the saved Facts, in the order they were written.
#[allow(clippy::too_many_arguments)]
pub fn add_fact<S, P>(
    store: &mut S,
    parser: &P,
    factoid: &[String],
    hint: TimeHint,
    confirm: &mut dyn Confirm,
    settings: &Settings,
    opts: SaveOptions,
    now: NaiveDateTime,
) -> Result<Vec<Fact>>
where
    S: FactStore + ?Sized,
    P: FactoidParser + ?Sized,
{
    let separators = settings.separators()?;
    let mut fact = parser
        .parse(factoid, hint.parser_hint(), separators.as_deref())
        .inspect_err(|err| error!("Oops! {}", err))?;

    // "after" carries no time; start at the latest end.
    if hint == TimeHint::VerifyAfter && fact.start.is_none() && fact.end.is_none() {
        fact.start = Some(FactTime::Minutes(0));
    }

    let mut mended = mend(&*store, fact, hint, &OtherEdits::new(), now)
        .inspect_err(|err| error!("{}", err))?;
    if hint == TimeHint::VerifyAfter {
        // First Fact ever: nothing to follow, so it starts now.
        for fact in mended.facts_to_save.iter_mut().filter(|f| f.start.is_none()) {
            fact.start = Some(FactTime::Absolute(now));
        }
    }
    confirm_and_save(store, mended, confirm, opts)
}

/// Cancel the ongoing Fact.
///
/// The row is kept as a deleted tombstone, or with `purge` removed from the
/// store altogether. Returns the cancelled Fact.
///
/// # Errors
/// `DobError::NothingOngoing` if no stored Fact is ongoing.
pub fn cancel_fact<S>(store: &mut S, purge: bool) -> Result<Fact>
where
    S: FactStore + ?Sized,
{
    let Some((pk, mut fact)) = store
        .get_current_fact()
        .and_then(|f| Some((f.id.persisted()?, f)))
    else {
        info!("Nothing tracked right now. Not doing anything.");
        return Err(DobError::NothingOngoing);
    };
    let cancelled = if purge {
        store.purge(pk)?
    } else {
        fact.deleted = true;
        store.save(fact)?
    };
    info!("Cancelled: {}", cancelled.short());
    Ok(cancelled)
}
