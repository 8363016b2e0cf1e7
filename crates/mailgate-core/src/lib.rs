//! # mailgate-core
//!
//! Core logic for the `mailgate` inbound relay.
//!
//! This crate provides:
//! - Recipient filtering and alias resolution through redirect records and
//!   user accounts
//! - Sender parsing and account lookup with role-priority tie breaking
//! - HTML body rendering and attachment extraction
//! - Local storage (`SQLite`)
//! - **Module registry** - handler entries and tombstones for retired handlers
//! - **Migrations** - module removal with file-backed rollback state

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod gateway;
pub mod migration;
pub mod modules;
pub mod redirect;
pub mod user;

pub use config::GatewayConfig;
pub use error::{Error, Result};
pub use gateway::{
    Attachment, MailGateway, addresses_from_header, build_email_body, escape_html,
    extract_attachments, filter_recipients, parse_sender_email, select_sender,
};
pub use migration::{MigrationLedger, RemoveModule, Reversal, RollbackState, StepOutcome};
pub use modules::{HandlerEntry, HandlerRegistry, HandlerStatus, ModuleRepository};
pub use redirect::{RedirectRecord, RedirectRepository};
pub use user::{Role, UserAccount, UserRepository};
