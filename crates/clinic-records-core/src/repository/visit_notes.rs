//! Visit note repository.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{into_fields, timestamp, RecordError, RecordResult, DEFAULT_CASCADE_ATTEMPTS};
use crate::clock::{Clock, SystemClock};
use crate::models::{VisitNote, VisitNoteFormData, VisitNoteUpdate, VisitSummary};
use crate::store::{
    decode_timestamp, encode_timestamp, Document, DocumentStore, Fields, StoreResult,
    PATIENTS_COLLECTION, VISIT_NOTES_COLLECTION,
};
use crate::validation::{validate_visit_note_form, validate_visit_note_update};

/// Visit note fields as stored in a document.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisitNoteDoc {
    patient_id: String,
    note: String,
    #[serde(default)]
    medicines: String,
}

/// Create, list and edit visit notes. Notes are only ever deleted through
/// [`Self::cascade_delete_for_patient`].
pub struct VisitNoteRepository<'a> {
    store: &'a dyn DocumentStore,
    clock: &'a dyn Clock,
    cascade_attempts: u32,
}

impl<'a> VisitNoteRepository<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            store,
            clock: &SystemClock,
            cascade_attempts: DEFAULT_CASCADE_ATTEMPTS,
        }
    }

    pub fn with_clock(mut self, clock: &'a dyn Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cascade_attempts(mut self, attempts: u32) -> Self {
        self.cascade_attempts = attempts;
        self
    }

    /// Notes for a patient, most recent visit first.
    ///
    /// The store gives no ordering guarantee for filtered queries, so the
    /// result is always sorted here.
    pub fn list_for_patient(&self, patient_id: &str) -> RecordResult<Vec<VisitNote>> {
        let docs = self
            .store
            .list_where(VISIT_NOTES_COLLECTION, "patientId", &json!(patient_id))?;

        let now = timestamp(self.clock);
        let mut notes = docs
            .into_iter()
            .map(|doc| decode_visit_note(doc, now))
            .collect::<StoreResult<Vec<_>>>()?;

        notes.sort_by(|a, b| {
            b.visit_date
                .cmp(&a.visit_date)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });

        debug!(patient_id, count = notes.len(), "listed visit notes");
        Ok(notes)
    }

    /// Get a visit note by ID.
    pub fn get_by_id(&self, id: &str) -> RecordResult<Option<VisitNote>> {
        let now = timestamp(self.clock);
        self.store
            .get(VISIT_NOTES_COLLECTION, id)?
            .map(|doc| decode_visit_note(doc, now))
            .transpose()
            .map_err(RecordError::from)
    }

    /// Record a visit for an existing patient, returning the note ID.
    ///
    /// The visit date is the moment of recording.
    pub fn create(&self, patient_id: &str, form: &VisitNoteFormData) -> RecordResult<String> {
        validate_visit_note_form(form)?;

        if self.store.get(PATIENTS_COLLECTION, patient_id)?.is_none() {
            return Err(RecordError::not_found(PATIENTS_COLLECTION, patient_id));
        }

        let now = timestamp(self.clock);
        let fields = into_fields(json!({
            "patientId": patient_id,
            "note": form.note,
            "medicines": form.medicines,
            "visitDate": encode_timestamp(now),
            "createdAt": encode_timestamp(now),
        }));

        let id = self.store.insert(VISIT_NOTES_COLLECTION, fields)?;
        info!(patient_id, note_id = %id, "visit note created");
        Ok(id)
    }

    /// Correct the content of a note. Only `note` and `medicines` are ever
    /// written.
    pub fn update(&self, id: &str, update: &VisitNoteUpdate) -> RecordResult<VisitNote> {
        validate_visit_note_update(update)?;

        let mut note = self
            .get_by_id(id)?
            .ok_or_else(|| RecordError::not_found(VISIT_NOTES_COLLECTION, id))?;

        let mut fields = Fields::new();
        if let Some(text) = &update.note {
            note.note = text.clone();
            fields.insert("note".into(), json!(note.note));
        }
        if let Some(medicines) = &update.medicines {
            note.medicines = medicines.clone();
            fields.insert("medicines".into(), json!(note.medicines));
        }

        if !fields.is_empty() {
            self.store.update(VISIT_NOTES_COLLECTION, id, fields)?;
            info!(note_id = %id, "visit note updated");
        }
        Ok(note)
    }

    /// Counts and latest visit for a patient's detail view.
    pub fn summary_for_patient(&self, patient_id: &str) -> RecordResult<VisitSummary> {
        let notes = self.list_for_patient(patient_id)?;
        Ok(VisitSummary::from_notes(&notes))
    }

    /// Delete every note belonging to a patient.
    ///
    /// Each attempt re-queries what is left, so a retry resumes where the
    /// previous attempt stopped. Fails with `StoreUnavailable` once the
    /// attempts are exhausted. Returns the number of notes removed.
    pub fn cascade_delete_for_patient(&self, patient_id: &str) -> RecordResult<usize> {
        let attempts = self.cascade_attempts.max(1);
        let mut removed = 0;
        let mut attempt = 1;

        loop {
            match self.delete_remaining(patient_id, &mut removed) {
                Ok(()) => {
                    if removed > 0 {
                        info!(patient_id, removed, "visit notes deleted");
                    }
                    return Ok(removed);
                }
                Err(e) if attempt < attempts => {
                    warn!(patient_id, attempt, error = %e, "visit note cascade failed, retrying");
                    attempt += 1;
                }
                Err(e) => {
                    warn!(patient_id, attempt, error = %e, "visit note cascade failed");
                    return Err(RecordError::StoreUnavailable(e));
                }
            }
        }
    }

    fn delete_remaining(&self, patient_id: &str, removed: &mut usize) -> StoreResult<()> {
        let remaining =
            self.store
                .list_where(VISIT_NOTES_COLLECTION, "patientId", &json!(patient_id))?;

        for doc in remaining {
            if self.store.delete(VISIT_NOTES_COLLECTION, &doc.id)? {
                *removed += 1;
            }
        }
        Ok(())
    }
}

fn decode_visit_note(doc: Document, now: DateTime<Utc>) -> StoreResult<VisitNote> {
    let visit_date = decode_timestamp(doc.fields.get("visitDate"), now)?;
    let created_at = decode_timestamp(doc.fields.get("createdAt"), now)?;
    let stored: VisitNoteDoc = serde_json::from_value(Value::Object(doc.fields))?;

    Ok(VisitNote {
        id: doc.id,
        patient_id: stored.patient_id,
        note: stored.note,
        medicines: stored.medicines,
        visit_date,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::PatientFormData;
    use crate::repository::PatientRepository;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn clock() -> ManualClock {
        ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            Duration::minutes(5),
        )
    }

    fn add_patient(store: &MemoryStore) -> String {
        PatientRepository::new(store)
            .create(&PatientFormData::new("Alice", 30, "Migraine"))
            .unwrap()
    }

    #[test]
    fn test_create_stamps_equal_dates() {
        let store = MemoryStore::new();
        let clock = clock();
        let patient_id = add_patient(&store);
        let repo = VisitNoteRepository::new(&store).with_clock(&clock);

        let id = repo
            .create(&patient_id, &VisitNoteFormData::new("Headache improving", ""))
            .unwrap();
        let note = repo.get_by_id(&id).unwrap().unwrap();

        assert_eq!(note.patient_id, patient_id);
        assert_eq!(note.medicines, "");
        assert_eq!(note.visit_date, note.created_at);
    }

    #[test]
    fn test_note_text_kept_verbatim() {
        let store = MemoryStore::new();
        let patient_id = add_patient(&store);
        let repo = VisitNoteRepository::new(&store);

        let text = "  indented\n  - bp 120/80\n";
        let id = repo
            .create(&patient_id, &VisitNoteFormData::new(text, " Aspirin "))
            .unwrap();
        let note = repo.get_by_id(&id).unwrap().unwrap();
        assert_eq!(note.note, text);
        assert_eq!(note.medicines, " Aspirin ");

        let updated = repo
            .update(
                &id,
                &VisitNoteUpdate {
                    note: Some("\tRevised\n".into()),
                    medicines: Some("".into()),
                },
            )
            .unwrap();
        assert_eq!(updated.note, "\tRevised\n");
        assert_eq!(repo.get_by_id(&id).unwrap().unwrap(), updated);
    }

    #[test]
    fn test_create_requires_existing_patient() {
        let store = MemoryStore::new();
        let repo = VisitNoteRepository::new(&store);

        let result = repo.create("ghost", &VisitNoteFormData::new("Seen", ""));
        assert!(matches!(
            result,
            Err(RecordError::NotFound { ref collection, .. }) if collection == PATIENTS_COLLECTION
        ));
        assert_eq!(store.count(VISIT_NOTES_COLLECTION).unwrap(), 0);
    }

    #[test]
    fn test_blank_note_rejected_before_store() {
        let store = MemoryStore::new();
        let patient_id = add_patient(&store);
        let repo = VisitNoteRepository::new(&store);

        let result = repo.create(&patient_id, &VisitNoteFormData::new("", "Aspirin"));
        assert!(matches!(result, Err(RecordError::Validation(_))));
        assert_eq!(store.count(VISIT_NOTES_COLLECTION).unwrap(), 0);
    }

    #[test]
    fn test_update_content_only() {
        let store = MemoryStore::new();
        let clock = clock();
        let patient_id = add_patient(&store);
        let repo = VisitNoteRepository::new(&store).with_clock(&clock);

        let id = repo
            .create(&patient_id, &VisitNoteFormData::new("Initial", ""))
            .unwrap();
        let before = repo.get_by_id(&id).unwrap().unwrap();

        let updated = repo
            .update(
                &id,
                &VisitNoteUpdate {
                    note: None,
                    medicines: Some("Paracetamol 500mg".into()),
                },
            )
            .unwrap();

        assert_eq!(updated.note, "Initial");
        assert_eq!(updated.medicines, "Paracetamol 500mg");
        assert_eq!(updated.visit_date, before.visit_date);
        assert_eq!(repo.get_by_id(&id).unwrap().unwrap(), updated);
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let store = MemoryStore::new();
        let repo = VisitNoteRepository::new(&store);

        let result = repo.update("nope", &VisitNoteUpdate::default());
        assert!(matches!(result, Err(RecordError::NotFound { .. })));
    }

    #[test]
    fn test_cascade_only_touches_one_patient() {
        let store = MemoryStore::new();
        let alice = add_patient(&store);
        let bob = add_patient(&store);
        let repo = VisitNoteRepository::new(&store);

        for text in ["one", "two"] {
            repo.create(&alice, &VisitNoteFormData::new(text, "")).unwrap();
        }
        repo.create(&bob, &VisitNoteFormData::new("three", "")).unwrap();

        assert_eq!(repo.cascade_delete_for_patient(&alice).unwrap(), 2);
        assert!(repo.list_for_patient(&alice).unwrap().is_empty());
        assert_eq!(repo.list_for_patient(&bob).unwrap().len(), 1);

        // Re-running is harmless.
        assert_eq!(repo.cascade_delete_for_patient(&alice).unwrap(), 0);
    }

    #[test]
    fn test_summary() {
        let store = MemoryStore::new();
        let clock = clock();
        let patient_id = add_patient(&store);
        let repo = VisitNoteRepository::new(&store).with_clock(&clock);

        repo.create(&patient_id, &VisitNoteFormData::new("First", "Aspirin"))
            .unwrap();
        let last = repo
            .create(&patient_id, &VisitNoteFormData::new("Second", " "))
            .unwrap();

        let summary = repo.summary_for_patient(&patient_id).unwrap();
        assert_eq!(summary.visit_count, 2);
        assert_eq!(summary.prescription_count, 1);
        assert_eq!(
            summary.last_visit,
            Some(repo.get_by_id(&last).unwrap().unwrap().visit_date)
        );
    }
}
