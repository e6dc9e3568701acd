pub mod field;
pub mod header;

pub use field::{FieldValue, RequirementField, ValueSource, ADDITIONAL_NOTES};
pub use header::{HeaderDimension, HeaderDraft, HeaderSelection, ModelType, Portfolio, Purpose};
