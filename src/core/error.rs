use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrmError {
    #[error("Field enumeration failed for type '{0}': {1}")]
    FieldEnumeration(String, String),

    #[error("Schema resolution failed for type '{0}': {1}")]
    SchemaResolution(String, String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Entity '{0}' with {1} = {2} not found")]
    EntityNotFound(String, String, String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, OrmError>;

impl<T> From<std::sync::PoisonError<T>> for OrmError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Persistence(err.to_string())
    }
}
