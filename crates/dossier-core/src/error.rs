//! Module: error
//! Responsibility: the crate-wide error surface.
//! Does not own: recovery policy — callers decide what to do with a failure.
//! Boundary: every fallible public operation returns `Result<T, Error>` or a
//! leaf error convertible into it via `#[from]`.

use crate::value::Value;
use thiserror::Error;

///
/// Error
///
/// Unifies the leaf error enums raised by each subsystem. Callers matching
/// on a specific failure mode should match the inner leaf type; callers
/// that only need to propagate should use `?`.
///

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error(transparent)]
    Ordering(#[from] OrderingError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

///
/// CoercionError
///
/// Raised when a `Value` cannot be normalized into an orderable, hashable
/// coerced key for indexing or predicate evaluation.
///

#[derive(Debug, Error)]
pub enum CoercionError {
    #[error("value {value:?} is not hashable (field: {field:?})")]
    NotHashable {
        value: Value,
        field: Option<String>,
    },
}

///
/// OrderingError
///

#[derive(Debug, Error)]
pub enum OrderingError {
    #[error("value {value:?} has no numeric converter and cannot be sorted descending")]
    NotOrderable { value: Value },
}

///
/// StoreError
///

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no record found for primary key {0:?}")]
    NotFound(Value),

    #[error("primary key {0:?} already exists")]
    Conflict(Value),
}

///
/// TransactionError
///

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("transaction body failed: {0}")]
    Aborted(String),
}
