#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
//! Rust library to migrate mailboxes and contacts.
//!
//! The main purpose of this library is to move a whole mailbox (all
//! folders and messages) from one account to another, preserving the
//! folder hierarchy, the flags and the arrival dates, without
//! delivering the same message twice and surviving transient
//! connection loss.
//!
//! This goal is achieved by exposing a [`MailMover`] which drives two
//! [`MailClient`]s, one per account. Clients are built from
//! [`Credentials`] by a [`Registry`], keyed by the credentials
//! implementor tag.
//!
//! The same shape is used to migrate address book entries: see
//! [`ContactMover`] and [`ContactService`].
//!
//! ## Mail providers
//!
//! - `imap`: [`ImapClient`](crate::provider::imap::ImapClient)
//! - `memory`: [`MemoryClient`](crate::provider::memory::MemoryClient)
//!
//! ## Contact providers
//!
//! - `google`: [`GoogleContacts`](crate::contact::google::GoogleContacts)
//! - `nextcloud`: [`NextCloudContacts`](crate::contact::carddav::NextCloudContacts)
//! - `memory`: [`MemoryContacts`](crate::contact::memory::MemoryContacts)
//!
//! See examples in the /tests folder.

pub mod account;
#[cfg(feature = "derive")]
pub mod config;
pub mod contact;
mod error;
pub mod flag;
pub mod folder;
pub mod mail;
pub mod message;
pub mod progress;
pub mod provider;
pub mod registry;
pub mod stats;

#[doc(inline)]
pub use self::{
    account::Credentials,
    contact::{Contact, ContactMover, ContactOptions, ContactService},
    error::{AnyBoxedError, AnyError, AnyResult},
    mail::{MailMover, MigrationOptions, MigrationOutcome},
    progress::{Severity, StatusEvent},
    provider::MailClient,
    registry::Registry,
    stats::MigrationStats,
};
