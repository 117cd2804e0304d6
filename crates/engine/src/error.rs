//! The module contains the errors the engine can return.
//!
//! Every mutating operation fails synchronously with one of these kinds;
//! nothing is retried inside the engine and nothing is partially written.

use sea_orm::DbErr;
use thiserror::Error;

use crate::MoneyCents;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The actor fails an authorization check. Never retried.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The lifecycle state of an activity or expense forbids the operation.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// A custom split batch does not reconcile with the expense amount.
    #[error("split total {actual} does not match expense amount {expected}")]
    SplitMismatch {
        expected: MoneyCents,
        actual: MoneyCents,
    },
    /// Auto-split resolved zero eligible participants.
    #[error("no eligible participants to split against")]
    NoEligibleParticipants,
    /// The operation would leave an activity without managers.
    #[error("an activity must keep at least one manager")]
    LastManagerViolation,
    #[error("\"{0}\" not found")]
    NotFound(String),
    #[error("\"{0}\" already present")]
    ExistingKey(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unauthorized(a), Self::Unauthorized(b)) => a == b,
            (Self::InvalidState(a), Self::InvalidState(b)) => a == b,
            (
                Self::SplitMismatch {
                    expected: ea,
                    actual: aa,
                },
                Self::SplitMismatch {
                    expected: eb,
                    actual: ab,
                },
            ) => ea == eb && aa == ab,
            (Self::NoEligibleParticipants, Self::NoEligibleParticipants) => true,
            (Self::LastManagerViolation, Self::LastManagerViolation) => true,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
