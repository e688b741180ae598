//! # dob-engine
//!
//! Time reconciliation for a command-line time tracker.
//!
//! Users record Facts (an activity with a start, an end, a category, tags and
//! a description) with loose time expressions such as `14:30` or `-10m`. This
//! crate pins those expressions to real datetimes, fits the Facts into the
//! stored timeline, closes the ongoing Fact when a new one starts, and
//! reports every overlap it will not fix by itself as a conflict for the user
//! to confirm.
//!
//! Nothing here reads the system clock: every entry point takes `now`.
//!
//! ## Modules
//!
//! - [`fact`]: `Fact`, its identity and time values
//! - [`hint`]: `TimeHint`: which times a draft is expected to carry
//! - [`bounds`]: the stored Facts around a sequence
//! - [`resolve`]: clock times and minute offsets → absolute datetimes
//! - [`conflict`]: detect overlapping and out-of-order Facts
//! - [`mend`]: fit one Fact into the stored timeline
//! - [`import`]: sequence a batch of imported drafts
//! - [`save`]: confirm edits and write them to the store
//! - [`create`]: parse, mend and save one factoid, or cancel the ongoing one
//! - [`store`]: the store seam and an in-memory store
//! - [`config`]: user settings
//! - [`error`]: Error types

pub mod bounds;
pub mod config;
pub mod conflict;
pub mod create;
pub mod error;
pub mod fact;
pub mod hint;
pub mod import;
pub mod mend;
pub mod resolve;
pub mod save;
pub mod store;

pub use bounds::Bounds;
pub use config::Settings;
pub use conflict::{detect_conflicts, Conflict, ConflictReason};
pub use create::{add_fact, cancel_fact, FactoidParser};
pub use error::DobError;
pub use fact::{DirtyReason, Fact, FactId, FactTime, TimeField};
pub use hint::TimeHint;
pub use import::{import_facts, ImportOutcome};
pub use mend::{mend, Mended, OtherEdits};
pub use resolve::resolve_relative;
pub use save::{confirm_and_save, save_batch, AlwaysYes, Confirm, SaveOptions};
pub use store::{FactStore, MemoryStore};
