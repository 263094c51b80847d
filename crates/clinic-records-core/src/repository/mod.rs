//! Patient and visit-note repositories.
//!
//! The store has no notion of a relation between `visitNotes.patientId` and
//! `patients`; the rules that keep the two collections consistent live here:
//!
//! - a note can only be created for a patient that exists
//! - a note never changes patient, visit date or creation time
//! - deleting a patient first removes every note that references it, and
//!   the patient is only removed once that phase has fully succeeded

mod patients;
mod visit_notes;

pub use patients::*;
pub use visit_notes::*;

use chrono::{DateTime, SubsecRound, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::clock::Clock;
use crate::store::{Fields, StoreError};
use crate::validation::ValidationErrors;

/// Default number of attempts for the note phase of a cascade delete.
pub const DEFAULT_CASCADE_ATTEMPTS: u32 = 3;

/// Repository errors.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Record not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
}

impl From<StoreError> for RecordError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { collection, id } => RecordError::NotFound { collection, id },
            other => RecordError::StoreUnavailable(other),
        }
    }
}

impl RecordError {
    pub(crate) fn not_found(collection: &str, id: &str) -> Self {
        RecordError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

pub type RecordResult<T> = Result<T, RecordError>;

/// Current time at the precision the store keeps.
fn timestamp(clock: &dyn Clock) -> DateTime<Utc> {
    clock.now().trunc_subsecs(6)
}

fn into_fields(value: Value) -> Fields {
    match value {
        Value::Object(fields) => fields,
        _ => Fields::new(),
    }
}
