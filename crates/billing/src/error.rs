//! Billing error types

use thiserror::Error;

pub type BillingResult<T> = Result<T, BillingError>;

#[derive(Debug, Error)]
pub enum BillingError {
    /// Inbound payload could not be parsed into a usable event. Surfaced to
    /// the sender as a 400; the raw body is still kept in the event store.
    #[error("malformed webhook payload: {0}")]
    Parse(String),

    /// A product/price pair matched no keyword and no price bucket. The
    /// classifier is total, so this is never constructed at runtime; it
    /// exists as a tested boundary of the taxonomy.
    #[error("no plan classification for: {0}")]
    ClassificationGap(String),

    /// Datastore write or query failed.
    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for BillingError {
    fn from(e: sqlx::Error) -> Self {
        BillingError::Database(e.to_string())
    }
}
