//! Error taxonomy for the helpdesk platform.
//!
//! Collaborator failures are absorbed at the core boundary and turned
//! into defaulted results; these variants cover the cases that are
//! surfaced to callers or abort initialization.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeskError {
    /// Caller error: resolve requested for a ticket that is not in
    /// the approval gate
    #[error("ticket {0} not found in approval queue")]
    TicketNotFound(i64),

    /// Technician/ticket store failure (fatal at startup, rollback
    /// trigger during assignment)
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("ingestion error: {0}")]
    Ingestion(String),
}

pub type Result<T> = std::result::Result<T, DeskError>;
