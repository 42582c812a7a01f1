//! # Memory provider
//!
//! In-process [`MailClient`] backed by a shared [`MemoryServer`].
//! Useful for dry runs and as the test double of the engine: the
//! server can be told to drop connections, refuse reconnections or
//! fail on specific messages.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use super::{FolderAccess, MailClient, SearchQuery};
use crate::{
    account::{AuthKind, Credentials},
    error::impl_any_error,
    flag::{Flag, Flags},
    folder::{Folder, FolderAttribute, FolderAttributes, Folders, INBOX},
    message::{self, Message, Uid},
    AnyResult,
};

/// Errors related to the memory provider.
#[derive(Debug, Error)]
pub enum Error {
    #[error("memory: client is not connected")]
    NotConnectedError,
    #[error("memory: connection lost")]
    ConnectionLostError,
    #[error("memory: connection refused")]
    ConnectionRefusedError,
    #[error("memory: authentication failed for user {0}")]
    AuthenticationError(String),
    #[error("memory: cannot find folder {0}")]
    FolderNotFoundError(String),
    #[error("memory: folder {0} already exists")]
    FolderAlreadyExistsError(String),
    #[error("memory: folder {0} is not selectable")]
    FolderNotSelectableError(String),
    #[error("memory: no folder opened")]
    NoFolderOpenedError,
    #[error("memory: folder {0} is opened read-only")]
    ReadOnlyFolderError(String),
    #[error("memory: cannot find message {0} in folder {1}")]
    MessageNotFoundError(Uid, String),
    #[error("memory: cannot fetch message {0} from folder {1}")]
    FetchMessageError(Uid, String),
    #[error("memory: cannot expunge folder {0}")]
    ExpungeError(String),
}

impl_any_error!(Error);

/// A message stored by the memory server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoredMessage {
    pub uid: Uid,
    pub raw: Vec<u8>,
    pub flags: Flags,
    pub internal_date: Option<DateTime<FixedOffset>>,

    /// The message only lives in the all-mail folder.
    pub archived: bool,
}

impl StoredMessage {
    pub fn message_id(&self) -> Option<String> {
        message::message_id(&self.raw)
    }
}

#[derive(Clone, Debug, Default)]
struct MemoryFolder {
    attributes: FolderAttributes,
    next_uid: Uid,
    messages: BTreeMap<Uid, StoredMessage>,
}

#[derive(Debug, Default)]
struct Faults {
    /// Append attempt numbers (1-based, counted across the server)
    /// on which the connection drops.
    drop_on_append: BTreeSet<usize>,

    /// Fetch attempt numbers on which the connection drops, counted
    /// the same way.
    drop_on_fetch: BTreeSet<usize>,

    /// Maximum number of accepted connections.
    max_connections: Option<usize>,

    /// Messages failing to be fetched, by folder path.
    fail_fetch: BTreeSet<(String, Uid)>,

    /// Folders failing to be expunged.
    fail_expunge: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct ServerState {
    folders: BTreeMap<String, MemoryFolder>,
    subscriptions: BTreeSet<String>,
    faults: Faults,
    connections: usize,
    appends: usize,
    fetches: usize,
}

/// The memory server.
///
/// Cloning a server shares its state, so that a test can inspect what
/// the clients did.
#[derive(Clone, Debug)]
pub struct MemoryServer {
    delimiter: char,
    namespace: Option<String>,
    login: Option<(String, String)>,
    state: Arc<Mutex<ServerState>>,
}

impl MemoryServer {
    pub fn new(delimiter: char) -> Self {
        Self {
            delimiter,
            namespace: None,
            login: None,
            state: Default::default(),
        }
    }

    /// Set the personal namespace prefix advertised to clients.
    pub fn with_namespace(mut self, prefix: impl ToString) -> Self {
        self.namespace = Some(prefix.to_string());
        self
    }

    /// Require clients to authenticate with the given user and
    /// secret (password or OAuth token).
    pub fn with_login(mut self, user: impl ToString, secret: impl ToString) -> Self {
        self.login = Some((user.to_string(), secret.to_string()));
        self
    }

    /// Build a client that does not check credentials.
    pub fn client(&self) -> MemoryClient {
        MemoryClient::new(self.clone(), None)
    }

    /// Build a client authenticating with the given credentials.
    pub fn client_for(&self, creds: &Credentials) -> MemoryClient {
        MemoryClient::new(self.clone(), Some(creds.clone()))
    }

    pub async fn add_folder(&self, path: &str, attrs: impl IntoIterator<Item = FolderAttribute>) {
        let mut state = self.state.lock().await;
        let folder = state.folders.entry(path.to_owned()).or_default();
        folder.attributes.extend(attrs);
    }

    /// Store a message in the given folder, creating the folder if
    /// needed. Returns the UID of the message.
    pub async fn add_message(&self, path: &str, raw: impl Into<Vec<u8>>, flags: Flags) -> Uid {
        self.insert_message(path, raw.into(), flags, None, false)
            .await
    }

    /// Store a message that only lives in the all-mail folder.
    pub async fn add_archived_message(&self, path: &str, raw: impl Into<Vec<u8>>) -> Uid {
        self.insert_message(path, raw.into(), Flags::default(), None, true)
            .await
    }

    pub async fn add_message_with_date(
        &self,
        path: &str,
        raw: impl Into<Vec<u8>>,
        flags: Flags,
        date: DateTime<FixedOffset>,
    ) -> Uid {
        self.insert_message(path, raw.into(), flags, Some(date), false)
            .await
    }

    async fn insert_message(
        &self,
        path: &str,
        raw: Vec<u8>,
        flags: Flags,
        internal_date: Option<DateTime<FixedOffset>>,
        archived: bool,
    ) -> Uid {
        let mut state = self.state.lock().await;
        let folder = state.folders.entry(path.to_owned()).or_default();
        folder.next_uid += 1;
        let uid = folder.next_uid;
        folder.messages.insert(
            uid,
            StoredMessage {
                uid,
                raw,
                flags,
                internal_date,
                archived,
            },
        );
        uid
    }

    /// Return the messages of the given folder, ordered by UID.
    pub async fn messages(&self, path: &str) -> Vec<StoredMessage> {
        let state = self.state.lock().await;
        state
            .folders
            .get(path)
            .map(|folder| folder.messages.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn folder_paths(&self) -> Vec<String> {
        self.state.lock().await.folders.keys().cloned().collect()
    }

    pub async fn is_subscribed(&self, path: &str) -> bool {
        self.state.lock().await.subscriptions.contains(path)
    }

    /// Return the number of accepted connections.
    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.connections
    }

    /// Drop the connection of the client performing the nth append
    /// attempt (1-based, counted across all clients of the server).
    pub async fn drop_connection_on_append(&self, nth: usize) {
        self.state.lock().await.faults.drop_on_append.insert(nth);
    }

    /// Drop the connection of the client performing the nth fetch
    /// attempt (1-based, counted across all clients of the server).
    pub async fn drop_connection_on_fetch(&self, nth: usize) {
        self.state.lock().await.faults.drop_on_fetch.insert(nth);
    }

    /// Refuse connections once the given number of connections have
    /// been accepted.
    pub async fn refuse_connections_after(&self, max: usize) {
        self.state.lock().await.faults.max_connections = Some(max);
    }

    pub async fn fail_fetch(&self, path: &str, uid: Uid) {
        self.state
            .lock()
            .await
            .faults
            .fail_fetch
            .insert((path.to_owned(), uid));
    }

    pub async fn fail_expunge(&self, path: &str) {
        self.state
            .lock()
            .await
            .faults
            .fail_expunge
            .insert(path.to_owned());
    }

    fn to_folder(&self, path: &str, folder: &MemoryFolder) -> Folder {
        let mut attributes = folder.attributes.clone();
        if path.eq_ignore_ascii_case(INBOX) {
            attributes.insert(FolderAttribute::Inbox);
        }

        Folder {
            path: path.to_owned(),
            delimiter: Some(self.delimiter),
            attributes,
        }
    }
}

/// The memory client.
#[derive(Debug)]
pub struct MemoryClient {
    server: MemoryServer,
    credentials: Option<Credentials>,
    connected: bool,
    selected: Option<(String, FolderAccess)>,
}

impl MemoryClient {
    pub fn new(server: MemoryServer, credentials: Option<Credentials>) -> Self {
        Self {
            server,
            credentials,
            connected: false,
            selected: None,
        }
    }

    fn ensure_connected(&self) -> Result<(), Error> {
        if self.connected {
            Ok(())
        } else {
            Err(Error::NotConnectedError)
        }
    }

    fn selected(&self) -> Result<(&str, FolderAccess), Error> {
        self.ensure_connected()?;
        match &self.selected {
            Some((path, access)) => Ok((path.as_str(), *access)),
            None => Err(Error::NoFolderOpenedError),
        }
    }

    fn drop_connection(&mut self) -> Error {
        debug!("memory: dropping connection");
        self.connected = false;
        self.selected = None;
        Error::ConnectionLostError
    }

    fn authenticate(&self) -> Result<(), Error> {
        let Some((user, secret)) = &self.server.login else {
            return Ok(());
        };

        let Some(creds) = &self.credentials else {
            return Ok(());
        };

        let given = match creds.auth() {
            AuthKind::Password(password) => password,
            AuthKind::OAuthBearer(token) => token,
        };

        if &creds.user == user && given == secret {
            Ok(())
        } else {
            Err(Error::AuthenticationError(creds.user.clone()))
        }
    }
}

#[async_trait]
impl MailClient for MemoryClient {
    async fn connect(&mut self) -> AnyResult<()> {
        let mut state = self.server.state.lock().await;

        if let Some(max) = state.faults.max_connections {
            if state.connections >= max {
                return Err(Error::ConnectionRefusedError.into());
            }
        }

        self.authenticate()?;
        state.connections += 1;
        self.connected = true;
        self.selected = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn disconnect(&mut self) -> AnyResult<()> {
        self.connected = false;
        self.selected = None;
        Ok(())
    }

    fn personal_namespace(&self) -> Option<String> {
        self.server.namespace.clone()
    }

    async fn list_folders(&mut self) -> AnyResult<Folders> {
        self.ensure_connected()?;
        let state = self.server.state.lock().await;
        let folders = state
            .folders
            .iter()
            .map(|(path, folder)| self.server.to_folder(path, folder))
            .collect();
        Ok(folders)
    }

    async fn get_folder(&mut self, path: &str) -> AnyResult<Option<Folder>> {
        self.ensure_connected()?;
        let state = self.server.state.lock().await;
        let folder = state
            .folders
            .get(path)
            .map(|folder| self.server.to_folder(path, folder));
        Ok(folder)
    }

    async fn create_folder(&mut self, path: &str) -> AnyResult<Folder> {
        self.ensure_connected()?;
        let mut state = self.server.state.lock().await;

        if state.folders.contains_key(path) {
            return Err(Error::FolderAlreadyExistsError(path.to_owned()).into());
        }

        let folder = MemoryFolder::default();
        let created = self.server.to_folder(path, &folder);
        state.folders.insert(path.to_owned(), folder);
        Ok(created)
    }

    async fn subscribe_folder(&mut self, path: &str) -> AnyResult<()> {
        self.ensure_connected()?;
        let mut state = self.server.state.lock().await;

        if !state.folders.contains_key(path) {
            return Err(Error::FolderNotFoundError(path.to_owned()).into());
        }

        state.subscriptions.insert(path.to_owned());
        Ok(())
    }

    async fn open_folder(&mut self, path: &str, access: FolderAccess) -> AnyResult<usize> {
        self.ensure_connected()?;
        let state = self.server.state.lock().await;

        let folder = state
            .folders
            .get(path)
            .ok_or_else(|| Error::FolderNotFoundError(path.to_owned()))?;

        if folder.attributes.contains(&FolderAttribute::NoSelect) {
            return Err(Error::FolderNotSelectableError(path.to_owned()).into());
        }

        let count = folder.messages.len();
        drop(state);

        trace!("memory: opened folder {path} ({access}) with {count} messages");
        self.selected = Some((path.to_owned(), access));
        Ok(count)
    }

    async fn close_folder(&mut self) -> AnyResult<()> {
        self.ensure_connected()?;
        self.selected = None;
        Ok(())
    }

    async fn search(&mut self, query: &SearchQuery) -> AnyResult<Vec<Uid>> {
        let (path, _) = self.selected()?;
        let state = self.server.state.lock().await;
        let folder = state
            .folders
            .get(path)
            .ok_or_else(|| Error::FolderNotFoundError(path.to_owned()))?;

        let uids = folder
            .messages
            .values()
            .filter(|msg| match query {
                SearchQuery::All => true,
                SearchQuery::Archived => msg.archived,
                SearchQuery::MessageId(id) => msg
                    .message_id()
                    .map(|msg_id| msg_id == id.trim_matches(|c| c == '<' || c == '>'))
                    .unwrap_or_default(),
            })
            .map(|msg| msg.uid)
            .collect();

        Ok(uids)
    }

    async fn fetch_message(&mut self, uid: Uid) -> AnyResult<Message> {
        let path = self.selected()?.0.to_owned();
        let shared = self.server.state.clone();
        let mut state = shared.lock().await;

        state.fetches += 1;
        let attempt = state.fetches;
        if state.faults.drop_on_fetch.contains(&attempt) {
            drop(state);
            return Err(self.drop_connection().into());
        }

        if state.faults.fail_fetch.contains(&(path.clone(), uid)) {
            return Err(Error::FetchMessageError(uid, path).into());
        }

        let msg = state
            .folders
            .get(&path)
            .and_then(|folder| folder.messages.get(&uid))
            .ok_or_else(|| Error::MessageNotFoundError(uid, path.clone()))?;

        Ok(Message {
            uid,
            raw: msg.raw.clone(),
            internal_date: msg.internal_date,
        })
    }

    async fn fetch_flags(&mut self, uid: Uid) -> AnyResult<Flags> {
        let (path, _) = self.selected()?;
        let state = self.server.state.lock().await;

        let msg = state
            .folders
            .get(path)
            .and_then(|folder| folder.messages.get(&uid))
            .ok_or_else(|| Error::MessageNotFoundError(uid, path.to_owned()))?;

        Ok(msg.flags.clone())
    }

    async fn add_flags(&mut self, uids: &[Uid], flags: &Flags) -> AnyResult<()> {
        let (path, access) = self.selected()?;

        if access == FolderAccess::ReadOnly {
            return Err(Error::ReadOnlyFolderError(path.to_owned()).into());
        }

        let mut state = self.server.state.lock().await;
        let folder = state
            .folders
            .get_mut(path)
            .ok_or_else(|| Error::FolderNotFoundError(path.to_owned()))?;

        for uid in uids {
            let msg = folder
                .messages
                .get_mut(uid)
                .ok_or_else(|| Error::MessageNotFoundError(*uid, path.to_owned()))?;
            msg.flags.extend(flags.iter().cloned());
        }

        Ok(())
    }

    async fn append_message(
        &mut self,
        path: &str,
        msg: &Message,
        flags: &Flags,
    ) -> AnyResult<()> {
        self.ensure_connected()?;
        let mut state = self.server.state.lock().await;

        state.appends += 1;
        let attempt = state.appends;
        if state.faults.drop_on_append.contains(&attempt) {
            drop(state);
            return Err(self.drop_connection().into());
        }

        let folder = state
            .folders
            .get_mut(path)
            .ok_or_else(|| Error::FolderNotFoundError(path.to_owned()))?;

        folder.next_uid += 1;
        let uid = folder.next_uid;
        folder.messages.insert(
            uid,
            StoredMessage {
                uid,
                raw: msg.raw.clone(),
                flags: flags.clone(),
                internal_date: msg.internal_date,
                archived: false,
            },
        );

        Ok(())
    }

    async fn expunge(&mut self) -> AnyResult<()> {
        let (path, access) = self.selected()?;

        if access == FolderAccess::ReadOnly {
            return Err(Error::ReadOnlyFolderError(path.to_owned()).into());
        }

        let mut state = self.server.state.lock().await;
        if state.faults.fail_expunge.contains(path) {
            return Err(Error::ExpungeError(path.to_owned()).into());
        }

        if let Some(folder) = state.folders.get_mut(path) {
            folder
                .messages
                .retain(|_, msg| !msg.flags.contains(&Flag::Deleted));
        }

        Ok(())
    }
}
