pub mod label;
pub mod verdict;

pub use label::{ExpectedLabel, ExtractedLabel, LabelField};
pub use verdict::{FieldMatchResult, Timeliness, ValidationVerdict};
