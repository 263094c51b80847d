//! Patient models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A patient record, the root entity of the system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Store-assigned identifier
    pub id: String,
    /// Full name
    pub name: String,
    /// Age in years (0-150)
    pub age: u32,
    /// Primary complaint
    pub disease: String,
    /// Clinical diagnosis
    pub diagnosis: Option<String>,
    /// Contact phone number
    pub phone: Option<String>,
    /// Home address
    pub address: Option<String>,
    /// Standing prescription (distinct from per-visit medicines)
    pub medicine: Option<String>,
    /// Creation timestamp, never changes after insert
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    /// Overwrite the supplied fields of `update` onto this record, as given.
    ///
    /// Timestamps are left alone; the repository stamps `updated_at`.
    pub fn apply(&mut self, update: &PatientUpdate) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(age) = update.age {
            // Validated before this point; out-of-range values never reach here.
            self.age = u32::try_from(age).unwrap_or(self.age);
        }
        if let Some(disease) = &update.disease {
            self.disease = disease.clone();
        }
        if let Some(diagnosis) = &update.diagnosis {
            self.diagnosis = Some(diagnosis.clone());
        }
        if let Some(phone) = &update.phone {
            self.phone = Some(phone.clone());
        }
        if let Some(address) = &update.address {
            self.address = Some(address.clone());
        }
        if let Some(medicine) = &update.medicine {
            self.medicine = Some(medicine.clone());
        }
    }
}

/// Form input for creating a patient.
///
/// `age` is signed so out-of-range input can be represented and rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PatientFormData {
    pub name: String,
    pub age: i64,
    pub disease: String,
    pub diagnosis: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub medicine: Option<String>,
}

impl PatientFormData {
    /// Create form data with the required fields.
    pub fn new(name: impl Into<String>, age: i64, disease: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            age,
            disease: disease.into(),
            ..Default::default()
        }
    }
}

/// Partial update for a patient. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PatientUpdate {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub disease: Option<String>,
    pub diagnosis: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub medicine: Option<String>,
}
