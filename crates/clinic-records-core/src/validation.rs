//! Field-level validation of form input.
//!
//! Validation runs before any store call; a failing form never reaches
//! persistence. Every failing field is reported, not just the first.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{PatientFormData, PatientUpdate, VisitNoteFormData, VisitNoteUpdate};

/// Youngest accepted patient age.
pub const MIN_AGE: i64 = 0;
/// Oldest accepted patient age.
pub const MAX_AGE: i64 = 150;

/// A single failing form field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// All field errors for one form submission.
#[derive(Error, Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[error("{}", join_errors(.errors))]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    fn push(&mut self, field: &str, message: &str) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Message for a field, if it failed.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

fn check_name(errors: &mut ValidationErrors, name: &str) {
    if name.trim().is_empty() {
        errors.push("name", "Patient name is required");
    }
}

fn check_age(errors: &mut ValidationErrors, age: i64) {
    if !(MIN_AGE..=MAX_AGE).contains(&age) {
        errors.push("age", "Please enter a valid age (0-150)");
    }
}

fn check_disease(errors: &mut ValidationErrors, disease: &str) {
    if disease.trim().is_empty() {
        errors.push("disease", "Disease/Problem is required");
    }
}

fn check_note(errors: &mut ValidationErrors, note: &str) {
    if note.trim().is_empty() {
        errors.push("note", "Consultation notes are required");
    }
}

/// Validate a new patient form.
pub fn validate_patient_form(form: &PatientFormData) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    check_name(&mut errors, &form.name);
    check_age(&mut errors, form.age);
    check_disease(&mut errors, &form.disease);
    errors.into_result()
}

/// Validate the supplied fields of a patient update.
pub fn validate_patient_update(update: &PatientUpdate) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if let Some(name) = &update.name {
        check_name(&mut errors, name);
    }
    if let Some(age) = update.age {
        check_age(&mut errors, age);
    }
    if let Some(disease) = &update.disease {
        check_disease(&mut errors, disease);
    }
    errors.into_result()
}

/// Validate a new visit note form. Medicines may be empty.
pub fn validate_visit_note_form(form: &VisitNoteFormData) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    check_note(&mut errors, &form.note);
    errors.into_result()
}

/// Validate the supplied fields of a visit note update.
pub fn validate_visit_note_update(update: &VisitNoteUpdate) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if let Some(note) = &update.note {
        check_note(&mut errors, note);
    }
    errors.into_result()
}
