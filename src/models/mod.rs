pub mod data;
pub mod rules;

pub use data::{CandidateBox, CheckReport, CheckTarget, MrzFormat, MrzRecord, Roi};
pub use rules::{CheckSpec, FieldKind, FieldName, FieldSpec, Span};
