//! Visit note models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single dated consultation entry belonging to one patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitNote {
    /// Store-assigned identifier
    pub id: String,
    /// Owning patient (soft reference, checked at write time)
    pub patient_id: String,
    /// Consultation narrative
    pub note: String,
    /// Medicines prescribed at this visit, may be empty
    pub medicines: String,
    /// Clinical timestamp of the visit, fixed at creation
    pub visit_date: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl VisitNote {
    /// Whether anything was prescribed at this visit.
    pub fn has_prescription(&self) -> bool {
        !self.medicines.trim().is_empty()
    }
}

/// Aggregate view of a patient's visits.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VisitSummary {
    /// Number of recorded visits
    pub visit_count: usize,
    /// Visits at which something was prescribed
    pub prescription_count: usize,
    /// Most recent visit date
    pub last_visit: Option<DateTime<Utc>>,
}

impl VisitSummary {
    pub fn from_notes(notes: &[VisitNote]) -> Self {
        Self {
            visit_count: notes.len(),
            prescription_count: notes.iter().filter(|n| n.has_prescription()).count(),
            last_visit: notes.iter().map(|n| n.visit_date).max(),
        }
    }
}

/// Form input for recording a visit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VisitNoteFormData {
    pub note: String,
    pub medicines: String,
}

impl VisitNoteFormData {
    pub fn new(note: impl Into<String>, medicines: impl Into<String>) -> Self {
        Self {
            note: note.into(),
            medicines: medicines.into(),
        }
    }
}

/// Partial update for a visit note.
///
/// Only content fields exist here. Identifier and timestamp fields in
/// incoming JSON (`patientId`, `visitDate`, `createdAt`) are dropped during
/// deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VisitNoteUpdate {
    pub note: Option<String>,
    pub medicines: Option<String>,
}
