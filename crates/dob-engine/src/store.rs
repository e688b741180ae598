//! The persistent store seen by the mender, and an in-memory implementation.

use chrono::NaiveDateTime;
use log::debug;

use crate::error::{DobError, Result};
use crate::fact::{Fact, FactId};

/// Lookups and writes the mender needs from a Fact store.
///
/// Deleted Facts are invisible to the lookups.
pub trait FactStore {
    /// The latest-starting Fact that starts strictly before `ref_time`.
    fn antecedent(&self, ref_time: NaiveDateTime) -> Option<Fact>;

    /// The earliest-starting Fact that starts at or after `ref_time`.
    fn subsequent(&self, ref_time: NaiveDateTime) -> Option<Fact>;

    /// The Fact without an end, if any.
    fn get_current_fact(&self) -> Option<Fact>;

    /// Persist `fact` and return the stored form with its assigned id.
    ///
    /// # Errors
    /// Fails if the Fact references an unknown row or still has relative or
    /// blank times.
    fn save(&mut self, fact: Fact) -> Result<Fact>;

    /// Remove the row `pk` outright, leaving no tombstone, and return it.
    ///
    /// # Errors
    /// Fails if there is no such row.
    fn purge(&mut self, pk: i64) -> Result<Fact>;
}

/// Facts held in memory, ordered by start.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    facts: Vec<Fact>,
    next_pk: i64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            facts: Vec::new(),
            next_pk: 1,
        }
    }

    /// Load Facts as they are, assigning ids to any that lack one.
    ///
    /// # Errors
    /// Fails on Facts with relative or blank start times.
    pub fn with_facts(facts: Vec<Fact>) -> Result<Self> {
        let mut store = MemoryStore::new();
        store.next_pk = facts
            .iter()
            .filter_map(|f| f.id.persisted())
            .max()
            .unwrap_or(0)
            + 1;
        for fact in facts {
            must_be_storable(&fact)?;
            let fact = match fact.id {
                FactId::Persisted(_) => fact,
                _ => fact.with_id(store.assign_pk()),
            };
            store.insert_sorted(fact);
        }
        Ok(store)
    }

    /// Restore a store from a JSON array of Facts.
    ///
    /// # Errors
    /// Returns `DobError::Snapshot` on malformed JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let facts: Vec<Fact> = serde_json::from_str(json).map_err(DobError::Snapshot)?;
        MemoryStore::with_facts(facts)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.facts).map_err(DobError::Snapshot)
    }

    /// All rows, tombstones included, in start order.
    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn get(&self, pk: i64) -> Option<&Fact> {
        self.facts.iter().find(|f| f.id == FactId::Persisted(pk))
    }

    /// Live (not deleted) rows.
    pub fn live(&self) -> impl Iterator<Item = &Fact> {
        self.facts.iter().filter(|f| !f.deleted)
    }

    fn assign_pk(&mut self) -> FactId {
        let id = FactId::Persisted(self.next_pk);
        self.next_pk += 1;
        id
    }

    fn insert_sorted(&mut self, fact: Fact) {
        let key = sort_key(&fact);
        let at = self.facts.partition_point(|f| sort_key(f) <= key);
        self.facts.insert(at, fact);
    }
}

impl FactStore for MemoryStore {
    fn antecedent(&self, ref_time: NaiveDateTime) -> Option<Fact> {
        self.live()
            .filter(|f| f.start_at().is_some_and(|start| start < ref_time))
            .max_by_key(|f| sort_key(f))
            .cloned()
    }

    fn subsequent(&self, ref_time: NaiveDateTime) -> Option<Fact> {
        self.live()
            .filter(|f| f.start_at().is_some_and(|start| start >= ref_time))
            .min_by_key(|f| sort_key(f))
            .cloned()
    }

    fn get_current_fact(&self) -> Option<Fact> {
        self.live().find(|f| f.is_ongoing()).cloned()
    }

    fn save(&mut self, mut fact: Fact) -> Result<Fact> {
        must_be_storable(&fact)?;
        fact.dirty_reasons.clear();
        match fact.id {
            FactId::Persisted(pk) => {
                let idx = self
                    .facts
                    .iter()
                    .position(|f| f.id == fact.id)
                    .ok_or(DobError::UnknownFact(pk))?;
                self.facts.remove(idx);
                debug!("store: update {}", fact.short());
            }
            FactId::Unsaved | FactId::Placeholder(_) => {
                fact.id = self.assign_pk();
                debug!("store: insert {}", fact.short());
            }
        }
        self.insert_sorted(fact.clone());
        Ok(fact)
    }

    fn purge(&mut self, pk: i64) -> Result<Fact> {
        let idx = self
            .facts
            .iter()
            .position(|f| f.id == FactId::Persisted(pk))
            .ok_or(DobError::UnknownFact(pk))?;
        let fact = self.facts.remove(idx);
        debug!("store: purge {}", fact.short());
        Ok(fact)
    }
}

fn sort_key(fact: &Fact) -> (Option<NaiveDateTime>, Option<i64>) {
    (fact.start_at(), fact.id.persisted())
}

fn must_be_storable(fact: &Fact) -> Result<()> {
    let start_ok = fact.start_at().is_some();
    let end_ok = fact.end.as_ref().is_none_or(|end| !end.is_relative());
    if start_ok && end_ok {
        Ok(())
    } else {
        Err(DobError::InvalidTimeToken(format!(
            "fact {} has unresolved times",
            fact.short()
        )))
    }
}
