pub mod error;
pub mod field;
pub mod value;

pub use error::{OrmError, Result};
pub use field::{Compute, FieldMap, FieldValue};
pub use value::Value;
