//! # Provider
//!
//! Module dedicated to mail providers. A provider is the client side
//! of one mail account, exposed to the engine through the
//! [`MailClient`] capability trait.
//!
//! Concrete providers reside in their own module: [`imap`] and
//! [`memory`].

#[cfg(feature = "imap")]
pub mod imap;
pub mod memory;

use std::fmt;

use async_trait::async_trait;

use crate::{
    flag::Flags,
    folder::{Folder, Folders},
    message::{Message, Uid},
    AnyResult,
};

/// The access mode used to open a folder.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum FolderAccess {
    ReadOnly,
    #[default]
    ReadWrite,
}

impl fmt::Display for FolderAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "read-only"),
            Self::ReadWrite => write!(f, "read-write"),
        }
    }
}

/// The message search query.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum SearchQuery {
    /// Every message of the opened folder.
    All,

    /// Messages that only live in the all-mail folder, as understood
    /// by Gmail (`in:archive`).
    Archived,

    /// Messages whose `Message-ID` header matches the given one.
    MessageId(String),
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Archived => write!(f, "archived"),
            Self::MessageId(id) => write!(f, "message-id <{id}>"),
        }
    }
}

/// The mail client capability trait.
///
/// A client owns one connection to one account and at most one
/// opened folder at a time. Message operations (search, fetch, flag,
/// expunge) apply to the opened folder.
///
/// When an operation fails because the connection itself is lost,
/// the client must report `false` from [`MailClient::is_connected`]
/// so that the engine can reconnect it.
#[async_trait]
pub trait MailClient: Send {
    /// Connect and authenticate.
    async fn connect(&mut self) -> AnyResult<()>;

    fn is_connected(&self) -> bool;

    /// Log out and drop the connection. Disconnecting a client that
    /// is not connected is not an error.
    async fn disconnect(&mut self) -> AnyResult<()>;

    /// Return the prefix of the personal namespace, if any. Only
    /// meaningful after [`MailClient::list_folders`].
    fn personal_namespace(&self) -> Option<String> {
        None
    }

    /// List all folders of the personal namespace.
    async fn list_folders(&mut self) -> AnyResult<Folders>;

    /// Get a folder by its full path, `None` if it does not exist.
    async fn get_folder(&mut self, path: &str) -> AnyResult<Option<Folder>>;

    async fn create_folder(&mut self, path: &str) -> AnyResult<Folder>;

    async fn subscribe_folder(&mut self, path: &str) -> AnyResult<()>;

    /// Open the given folder and return its message count.
    async fn open_folder(&mut self, path: &str, access: FolderAccess) -> AnyResult<usize>;

    /// Close the opened folder without expunging it.
    async fn close_folder(&mut self) -> AnyResult<()>;

    /// Search the opened folder. UIDs are returned in ascending
    /// order.
    async fn search(&mut self, query: &SearchQuery) -> AnyResult<Vec<Uid>>;

    async fn fetch_message(&mut self, uid: Uid) -> AnyResult<Message>;

    async fn fetch_flags(&mut self, uid: Uid) -> AnyResult<Flags>;

    async fn add_flags(&mut self, uids: &[Uid], flags: &Flags) -> AnyResult<()>;

    /// Append the given message to the folder at the given path,
    /// restoring its flags and internal date.
    async fn append_message(&mut self, folder: &str, msg: &Message, flags: &Flags)
        -> AnyResult<()>;

    /// Permanently remove the messages of the opened folder flagged
    /// as deleted.
    async fn expunge(&mut self) -> AnyResult<()>;
}
