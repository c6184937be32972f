//! Shared types for the helpdesk platform.
//!
//! Domain records (tickets, technicians, timeline entries), broadcast
//! event payloads, API request/response structs, and the error
//! taxonomy shared between deskd and deskctl.

pub mod error;
pub mod events;
pub mod rpc;
pub mod technician;
pub mod ticket;
pub mod timeline;

pub use error::DeskError;
pub use technician::Technician;
pub use ticket::{Priority, Ticket, TicketStatus};
pub use timeline::TimelineEntry;

/// Platform version, shared by daemon and CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
