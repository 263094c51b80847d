//! Patient repository.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{
    into_fields, timestamp, RecordError, RecordResult, VisitNoteRepository,
    DEFAULT_CASCADE_ATTEMPTS,
};
use crate::clock::{Clock, SystemClock};
use crate::models::{Patient, PatientFormData, PatientUpdate};
use crate::store::{
    decode_timestamp, encode_timestamp, Document, DocumentStore, Fields, SortDirection,
    StoreResult, PATIENTS_COLLECTION,
};
use crate::validation::{validate_patient_form, validate_patient_update};

/// Patient fields as stored in a document.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PatientDoc {
    name: String,
    age: u32,
    disease: String,
    #[serde(default)]
    diagnosis: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    medicine: Option<String>,
}

/// Create, read, update and cascade-delete patients.
pub struct PatientRepository<'a> {
    store: &'a dyn DocumentStore,
    clock: &'a dyn Clock,
    cascade_attempts: u32,
}

impl<'a> PatientRepository<'a> {
    /// Create a repository over a store, stamping with the system clock.
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

    /// Attempts allowed for the visit-note phase of [`Self::delete`].
    pub fn with_cascade_attempts(mut self, attempts: u32) -> Self {
        self.cascade_attempts = attempts;
        self
    }

    fn visit_notes(&self) -> VisitNoteRepository<'a> {
        VisitNoteRepository::new(self.store)
            .with_clock(self.clock)
            .with_cascade_attempts(self.cascade_attempts)
    }

    /// All patients, newest first.
    pub fn list_all(&self) -> RecordResult<Vec<Patient>> {
        let docs = self
            .store
            .list_all(PATIENTS_COLLECTION, "createdAt", SortDirection::Descending)?;
        debug!(count = docs.len(), "listed patients");

        let now = timestamp(self.clock);
        docs.into_iter()
            .map(|doc| decode_patient(doc, now).map_err(RecordError::from))
            .collect()
    }

    /// Get a patient by ID. Absence is `Ok(None)`, not an error.
    pub fn get_by_id(&self, id: &str) -> RecordResult<Option<Patient>> {
        let now = timestamp(self.clock);
        self.store
            .get(PATIENTS_COLLECTION, id)?
            .map(|doc| decode_patient(doc, now))
            .transpose()
            .map_err(RecordError::from)
    }

    /// Validate and insert a new patient, returning its ID.
    pub fn create(&self, form: &PatientFormData) -> RecordResult<String> {
        validate_patient_form(form)?;

        let now = timestamp(self.clock);
        let mut fields = into_fields(json!({
            "name": form.name,
            "age": form.age,
            "disease": form.disease,
            "createdAt": encode_timestamp(now),
            "updatedAt": encode_timestamp(now),
        }));
        put_optional(&mut fields, "diagnosis", form.diagnosis.as_deref());
        put_optional(&mut fields, "phone", form.phone.as_deref());
        put_optional(&mut fields, "address", form.address.as_deref());
        put_optional(&mut fields, "medicine", form.medicine.as_deref());

        let id = self.store.insert(PATIENTS_COLLECTION, fields)?;
        info!(patient_id = %id, "patient created");
        Ok(id)
    }

    /// Merge the supplied fields into an existing patient.
    ///
    /// `updated_at` is always refreshed; `created_at` is never written.
    pub fn update(&self, id: &str, update: &PatientUpdate) -> RecordResult<Patient> {
        validate_patient_update(update)?;

        let mut patient = self
            .get_by_id(id)?
            .ok_or_else(|| RecordError::not_found(PATIENTS_COLLECTION, id))?;

        let now = timestamp(self.clock).max(patient.created_at);
        let mut fields = Fields::new();
        if let Some(name) = &update.name {
            fields.insert("name".into(), json!(name));
        }
        if let Some(age) = update.age {
            fields.insert("age".into(), json!(age));
        }
        if let Some(disease) = &update.disease {
            fields.insert("disease".into(), json!(disease));
        }
        put_optional(&mut fields, "diagnosis", update.diagnosis.as_deref());
        put_optional(&mut fields, "phone", update.phone.as_deref());
        put_optional(&mut fields, "address", update.address.as_deref());
        put_optional(&mut fields, "medicine", update.medicine.as_deref());
        fields.insert("updatedAt".into(), encode_timestamp(now));

        self.store.update(PATIENTS_COLLECTION, id, fields)?;

        patient.apply(update);
        patient.updated_at = now;
        info!(patient_id = %id, "patient updated");
        Ok(patient)
    }

    /// Delete a patient and every visit note that references it.
    ///
    /// Notes go first. If that phase fails the patient is left in place and
    /// the call can simply be repeated. A missing patient still has any
    /// orphaned notes cleared before `NotFound` is returned.
    ///
    /// Returns the number of visit notes removed.
    pub fn delete(&self, id: &str) -> RecordResult<usize> {
        let removed_notes = self.visit_notes().cascade_delete_for_patient(id)?;

        if !self.store.delete(PATIENTS_COLLECTION, id)? {
            return Err(RecordError::not_found(PATIENTS_COLLECTION, id));
        }

        info!(patient_id = %id, removed_notes, "patient deleted");
        Ok(removed_notes)
    }
}

/// Supplied values are stored as given; unsupplied ones are left out.
fn put_optional(fields: &mut Fields, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        fields.insert(key.into(), Value::String(value.to_string()));
    }
}

fn decode_patient(doc: Document, now: chrono::DateTime<chrono::Utc>) -> StoreResult<Patient> {
    let created_at = decode_timestamp(doc.fields.get("createdAt"), now)?;
    let updated_at = decode_timestamp(doc.fields.get("updatedAt"), now)?;
    let stored: PatientDoc = serde_json::from_value(Value::Object(doc.fields))?;

    Ok(Patient {
        id: doc.id,
        name: stored.name,
        age: stored.age,
        disease: stored.disease,
        diagnosis: stored.diagnosis,
        phone: stored.phone,
        address: stored.address,
        medicine: stored.medicine,
        created_at,
        updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};

    fn clock() -> ManualClock {
        ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            Duration::minutes(1),
        )
    }

    #[test]
    fn test_create_and_get() {
        let store = MemoryStore::new();
        let clock = clock();
        let repo = PatientRepository::new(&store).with_clock(&clock);

        let mut form = PatientFormData::new(" Alice ", 30, "Migraine ");
        form.phone = Some("555-0100".into());
        form.address = Some("".into());

        let id = repo.create(&form).unwrap();
        let patient = repo.get_by_id(&id).unwrap().unwrap();

        assert_eq!(patient.name, " Alice ");
        assert_eq!(patient.age, 30);
        assert_eq!(patient.disease, "Migraine ");
        assert_eq!(patient.phone, Some("555-0100".into()));
        assert_eq!(patient.address, Some("".into()));
        assert_eq!(patient.diagnosis, None);
        assert_eq!(patient.created_at, patient.updated_at);
    }

    #[test]
    fn test_invalid_form_never_reaches_store() {
        let store = MemoryStore::new();
        let repo = PatientRepository::new(&store);

        let result = repo.create(&PatientFormData::new("", 30, "Flu"));
        assert!(matches!(result, Err(RecordError::Validation(_))));
        assert_eq!(store.count(PATIENTS_COLLECTION).unwrap(), 0);
    }

    #[test]
    fn test_get_missing_is_none() {
        let store = MemoryStore::new();
        let repo = PatientRepository::new(&store);
        assert!(repo.get_by_id("nope").unwrap().is_none());
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let store = MemoryStore::new();
        let repo = PatientRepository::new(&store);

        let result = repo.update(
            "nope",
            &PatientUpdate {
                age: Some(40),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(RecordError::NotFound { .. })));
    }

    #[test]
    fn test_update_stores_supplied_values_as_given() {
        let store = MemoryStore::new();
        let clock = clock();
        let repo = PatientRepository::new(&store).with_clock(&clock);

        let mut form = PatientFormData::new("Bob", 52, "Hypertension");
        form.medicine = Some("Amlodipine 5mg".into());
        let id = repo.create(&form).unwrap();

        let returned = repo
            .update(
                &id,
                &PatientUpdate {
                    medicine: Some("".into()),
                    name: Some(" Bob Jr. ".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        let stored = repo.get_by_id(&id).unwrap().unwrap();
        assert_eq!(stored.medicine, Some("".into()));
        assert_eq!(stored.name, " Bob Jr. ");
        assert_eq!(stored, returned);
    }

    #[test]
    fn test_missing_timestamps_default_to_now() {
        let store = MemoryStore::new();
        let clock = clock();
        let repo = PatientRepository::new(&store).with_clock(&clock);

        let fields = into_fields(json!({"name": "Legacy", "age": 70, "disease": "Gout"}));
        let id = store.insert(PATIENTS_COLLECTION, fields).unwrap();

        let patient = repo.get_by_id(&id).unwrap().unwrap();
        assert_eq!(patient.created_at, Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap());
        assert_eq!(patient.created_at, patient.updated_at);
    }
}
