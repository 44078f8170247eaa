use thiserror::Error;

use crate::model::ObjectIdentity;

#[derive(Error, Debug)]
pub enum AclError {
    #[error("Object identity not found: {0}")]
    NotFound(ObjectIdentity),

    #[error("Setting parent of {child} to {parent} would create a cycle")]
    Cycle {
        child: ObjectIdentity,
        parent: ObjectIdentity,
    },

    #[error("ACL invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Backing store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<rusqlite::Error> for AclError {
    fn from(err: rusqlite::Error) -> Self {
        AclError::StoreUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AclError>;
