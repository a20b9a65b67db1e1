use common::InvalidRecord;
use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DepotError {
    #[error("Invalid object: {0}")]
    InvalidObject(#[from] InvalidRecord),

    #[error("Unknown field '{field}' for {kind}")]
    UnknownField { kind: &'static str, field: String },

    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),

    #[error("Corrupt {kind} row '{id}': {reason}")]
    Corrupt {
        kind: &'static str,
        id: String,
        reason: String,
    },

    #[error("Database error: {0}")]
    Db(#[from] DbErr),
}

pub type Result<T> = std::result::Result<T, DepotError>;
