//! SQLite schema definition.

/// Database schema for the SQLite document store.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Documents
-- ============================================================================

CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    body TEXT NOT NULL CHECK (json_valid(body)),  -- JSON object of fields
    PRIMARY KEY (collection, id)
);

-- Patient list ordering (newest first)
CREATE INDEX IF NOT EXISTS idx_documents_created_at
    ON documents(collection, json_extract(body, '$.createdAt'));

-- Visit note lookup by patient
CREATE INDEX IF NOT EXISTS idx_documents_patient_id
    ON documents(collection, json_extract(body, '$.patientId'));
"#;
