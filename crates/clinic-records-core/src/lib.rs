//! Clinic Records Core Library
//!
//! Patient records and visit notes over a schemaless document store.
//!
//! # Architecture
//!
//! ```text
//!                    UI shell (forms, lists, sign-in screen)
//!                                   │
//!                      ┌────────────▼────────────┐
//!                      │       ClinicCore        │
//!                      └─────┬─────────────┬─────┘
//!                            │             │
//!               PatientRepository ──► VisitNoteRepository
//!                  (delete cascades)       │
//!                            │             │
//!                      ┌─────▼─────────────▼─────┐
//!                      │      DocumentStore      │
//!                      │  patients / visitNotes  │
//!                      └─────────────────────────┘
//! ```
//!
//! # Core Principle
//!
//! **The store does not enforce the patient/visit-note relation; the
//! repositories do.** Notes are only created for existing patients, never
//! change owner, and are removed before their patient is.
//!
//! # Modules
//!
//! - [`store`]: document store trait with in-memory and SQLite backends
//! - [`models`]: domain types (Patient, VisitNote, form data)
//! - [`validation`]: field-level form validation
//! - [`repository`]: patient and visit-note repositories
//! - [`search`]: patient list filtering
//! - [`session`]: single-credential sign-in gate
//! - [`config`]: startup configuration

pub mod clock;
pub mod config;
pub mod logging;
pub mod models;
pub mod repository;
pub mod search;
pub mod session;
pub mod store;
pub mod validation;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ClinicConfig, ConfigError};
pub use models::{
    Patient, PatientFormData, PatientUpdate, VisitNote, VisitNoteFormData, VisitNoteUpdate,
    VisitSummary,
};
pub use repository::{PatientRepository, RecordError, RecordResult, VisitNoteRepository};
pub use session::{Credentials, SessionContext, SessionError};
pub use store::{DocumentStore, MemoryStore, SqliteStore, StoreError};
pub use validation::{FieldError, ValidationErrors};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::Arc;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinicError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<RecordError> for ClinicError {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::Validation(errors) => ClinicError::ValidationError(errors.to_string()),
            RecordError::NotFound { collection, id } => {
                ClinicError::NotFound(format!("{}/{}", collection, id))
            }
            RecordError::StoreUnavailable(e) => ClinicError::StoreUnavailable(e.to_string()),
        }
    }
}

impl From<StoreError> for ClinicError {
    fn from(e: StoreError) -> Self {
        RecordError::from(e).into()
    }
}

impl From<SessionError> for ClinicError {
    fn from(e: SessionError) -> Self {
        ClinicError::InvalidCredentials(e.to_string())
    }
}

impl From<ConfigError> for ClinicError {
    fn from(e: ConfigError) -> Self {
        ClinicError::ConfigError(e.to_string())
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a SQLite-backed clinic at the given path.
#[uniffi::export]
pub fn open_clinic(path: String) -> Result<Arc<ClinicCore>, ClinicError> {
    let config = ClinicConfig::new(
        Some(path.into()),
        Credentials::default(),
        repository::DEFAULT_CASCADE_ATTEMPTS,
    )?;
    ClinicCore::with_config(config)
}

/// Create an in-memory clinic (for testing and demos).
#[uniffi::export]
pub fn open_clinic_in_memory() -> Result<Arc<ClinicCore>, ClinicError> {
    ClinicCore::with_config(ClinicConfig::default())
}

/// Open a clinic configured from the environment and `.env`.
#[uniffi::export]
pub fn open_clinic_from_env() -> Result<Arc<ClinicCore>, ClinicError> {
    ClinicCore::with_config(ClinicConfig::from_env()?)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Request/result facade consumed by the UI shell.
#[derive(uniffi::Object)]
pub struct ClinicCore {
    store: Box<dyn DocumentStore>,
    config: ClinicConfig,
}

impl ClinicCore {
    /// Open the store named by `config`.
    pub fn with_config(config: ClinicConfig) -> Result<Arc<Self>, ClinicError> {
        let store = config.open_store()?;
        tracing::info!(
            persistent = config.database_path().is_some(),
            "clinic opened"
        );
        Ok(Arc::new(Self { store, config }))
    }

    fn patients(&self) -> PatientRepository<'_> {
        PatientRepository::new(self.store.as_ref())
            .with_cascade_attempts(self.config.cascade_attempts())
    }

    fn visit_notes(&self) -> VisitNoteRepository<'_> {
        VisitNoteRepository::new(self.store.as_ref())
            .with_cascade_attempts(self.config.cascade_attempts())
    }
}

#[uniffi::export]
impl ClinicCore {
    // =========================================================================
    // Session
    // =========================================================================

    /// Check the clinician's credentials.
    pub fn sign_in(&self, email: String, password: String) -> Result<FfiSession, ClinicError> {
        let session = self
            .config
            .credentials()
            .sign_in(&email, &password, &SystemClock)?;
        Ok(session.into())
    }

    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// All patients, newest first.
    pub fn list_patients(&self) -> Result<Vec<FfiPatient>, ClinicError> {
        let patients = self.patients().list_all()?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    /// Patients matching a search query (name, disease or diagnosis).
    pub fn search_patients(&self, query: String) -> Result<Vec<FfiPatient>, ClinicError> {
        let patients = self.patients().list_all()?;
        Ok(search::filter_patients(&patients, &query)
            .into_iter()
            .map(|p| p.clone().into())
            .collect())
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, id: String) -> Result<Option<FfiPatient>, ClinicError> {
        let patient = self.patients().get_by_id(&id)?;
        Ok(patient.map(|p| p.into()))
    }

    /// Create a patient, returning its ID.
    pub fn create_patient(&self, form: FfiPatientForm) -> Result<String, ClinicError> {
        Ok(self.patients().create(&form.into())?)
    }

    /// Update the supplied fields of a patient.
    pub fn update_patient(
        &self,
        id: String,
        update: FfiPatientUpdate,
    ) -> Result<FfiPatient, ClinicError> {
        let patient = self.patients().update(&id, &update.into())?;
        Ok(patient.into())
    }

    /// Delete a patient and all of its visit notes.
    ///
    /// Returns the number of visit notes removed.
    pub fn delete_patient(&self, id: String) -> Result<u32, ClinicError> {
        let removed = self.patients().delete(&id)?;
        Ok(u32::try_from(removed).unwrap_or(u32::MAX))
    }

    // =========================================================================
    // Visit Note Operations
    // =========================================================================

    /// Visit notes for a patient, most recent first.
    pub fn list_visit_notes(&self, patient_id: String) -> Result<Vec<FfiVisitNote>, ClinicError> {
        let notes = self.visit_notes().list_for_patient(&patient_id)?;
        Ok(notes.into_iter().map(|n| n.into()).collect())
    }

    /// Record a visit for a patient, returning the note ID.
    pub fn create_visit_note(
        &self,
        patient_id: String,
        form: FfiVisitNoteForm,
    ) -> Result<String, ClinicError> {
        Ok(self.visit_notes().create(&patient_id, &form.into())?)
    }

    /// Correct a visit note's content.
    pub fn update_visit_note(
        &self,
        id: String,
        update: FfiVisitNoteUpdate,
    ) -> Result<FfiVisitNote, ClinicError> {
        let note = self.visit_notes().update(&id, &update.into())?;
        Ok(note.into())
    }

    /// Visit counts for a patient's detail view.
    pub fn visit_summary(&self, patient_id: String) -> Result<FfiVisitSummary, ClinicError> {
        let summary = self.visit_notes().summary_for_patient(&patient_id)?;
        Ok(summary.into())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe patient. Timestamps are RFC 3339.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub disease: String,
    pub diagnosis: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub medicine: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id,
            name: patient.name,
            age: patient.age,
            disease: patient.disease,
            diagnosis: patient.diagnosis,
            phone: patient.phone,
            address: patient.address,
            medicine: patient.medicine,
            created_at: patient.created_at.to_rfc3339(),
            updated_at: patient.updated_at.to_rfc3339(),
        }
    }
}

/// FFI-safe new-patient form.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientForm {
    pub name: String,
    pub age: i64,
    pub disease: String,
    pub diagnosis: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub medicine: Option<String>,
}

impl From<FfiPatientForm> for PatientFormData {
    fn from(form: FfiPatientForm) -> Self {
        PatientFormData {
            name: form.name,
            age: form.age,
            disease: form.disease,
            diagnosis: form.diagnosis,
            phone: form.phone,
            address: form.address,
            medicine: form.medicine,
        }
    }
}

/// FFI-safe partial patient update.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientUpdate {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub disease: Option<String>,
    pub diagnosis: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub medicine: Option<String>,
}

impl From<FfiPatientUpdate> for PatientUpdate {
    fn from(update: FfiPatientUpdate) -> Self {
        PatientUpdate {
            name: update.name,
            age: update.age,
            disease: update.disease,
            diagnosis: update.diagnosis,
            phone: update.phone,
            address: update.address,
            medicine: update.medicine,
        }
    }
}

/// FFI-safe visit note.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisitNote {
    pub id: String,
    pub patient_id: String,
    pub note: String,
    pub medicines: String,
    pub visit_date: String,
    pub created_at: String,
}

impl From<VisitNote> for FfiVisitNote {
    fn from(note: VisitNote) -> Self {
        Self {
            id: note.id,
            patient_id: note.patient_id,
            note: note.note,
            medicines: note.medicines,
            visit_date: note.visit_date.to_rfc3339(),
            created_at: note.created_at.to_rfc3339(),
        }
    }
}

/// FFI-safe visit note form.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisitNoteForm {
    pub note: String,
    pub medicines: String,
}

impl From<FfiVisitNoteForm> for VisitNoteFormData {
    fn from(form: FfiVisitNoteForm) -> Self {
        VisitNoteFormData {
            note: form.note,
            medicines: form.medicines,
        }
    }
}

/// FFI-safe visit note correction. Only content fields can be changed.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisitNoteUpdate {
    pub note: Option<String>,
    pub medicines: Option<String>,
}

impl From<FfiVisitNoteUpdate> for VisitNoteUpdate {
    fn from(update: FfiVisitNoteUpdate) -> Self {
        VisitNoteUpdate {
            note: update.note,
            medicines: update.medicines,
        }
    }
}

/// FFI-safe visit summary.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisitSummary {
    pub visit_count: u32,
    pub prescription_count: u32,
    pub last_visit: Option<String>,
}

impl From<VisitSummary> for FfiVisitSummary {
    fn from(summary: VisitSummary) -> Self {
        Self {
            visit_count: u32::try_from(summary.visit_count).unwrap_or(u32::MAX),
            prescription_count: u32::try_from(summary.prescription_count).unwrap_or(u32::MAX),
            last_visit: summary.last_visit.map(|d| d.to_rfc3339()),
        }
    }
}

/// FFI-safe session.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSession {
    pub email: String,
    pub signed_in_at: String,
}

impl From<SessionContext> for FfiSession {
    fn from(session: SessionContext) -> Self {
        Self {
            email: session.email,
            signed_in_at: session.signed_in_at.to_rfc3339(),
        }
    }
}
