//! Patient list filtering.

use crate::models::Patient;

/// Filter patients by a free-text query.
///
/// Case-insensitive substring match over name, disease and diagnosis. A
/// blank query matches every patient. Input order is preserved.
pub fn filter_patients<'p>(patients: &'p [Patient], query: &str) -> Vec<&'p Patient> {
    let query = query.trim().to_lowercase();
    patients
        .iter()
        .filter(|p| query.is_empty() || matches(p, &query))
        .collect()
}

fn matches(patient: &Patient, query: &str) -> bool {
    let fields = [
        Some(patient.name.as_str()),
        Some(patient.disease.as_str()),
        patient.diagnosis.as_deref(),
    ];
    fields
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(query))
}
