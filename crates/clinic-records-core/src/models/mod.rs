//! Domain models for the clinic records system.

mod patient;
mod visit_note;

pub use patient::*;
pub use visit_note::*;
