//! Helpdesk daemon library - exposes modules for testing.

pub mod approval;
pub mod assignment;
pub mod collaborators;
pub mod config;
pub mod coordinator;
pub mod directory;
pub mod notify;
pub mod routes;
pub mod scheduler;
pub mod server;
