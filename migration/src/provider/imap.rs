//! # IMAP provider
//!
//! [`MailClient`] implementation over `async-imap`, using SSL/TLS
//! (`tokio-rustls` with the Mozilla root certificates) and either
//! `LOGIN` or `XOAUTH2` authentication.

use std::{io, result, sync::Arc};

use async_imap::{
    error::Error as ImapError,
    types::{Fetch, Flag as ImapFlag, Name, NameAttribute},
    Authenticator, Client, Session,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::{
    client::TlsStream,
    rustls::{pki_types::ServerName, ClientConfig, RootCertStore},
    TlsConnector,
};
use tracing::{debug, info, trace, warn};

use super::{FolderAccess, MailClient, SearchQuery};
use crate::{
    account::{AuthKind, Credentials},
    error::impl_any_error,
    flag::{Flag, Flags},
    folder::{Folder, FolderAttribute, FolderAttributes, Folders, INBOX},
    message::{Message, Uid},
    AnyResult,
};

/// The default IMAP over SSL/TLS port.
pub const DEFAULT_PORT: u16 = 993;

/// The global `Result` alias of the module.
pub type Result<T> = result::Result<T, Error>;

type ImapSession = Session<TlsStream<TcpStream>>;

/// Errors related to the IMAP provider.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot connect to IMAP server {1}:{2} using TCP")]
    ConnectTcpError(#[source] io::Error, String, u16),
    #[error("cannot connect to IMAP server {1}:{2} using SSL/TLS")]
    ConnectTlsError(#[source] io::Error, String, u16),
    #[error("cannot parse IMAP server name {0}")]
    ParseServerNameError(String),
    #[error("cannot read IMAP server greeting")]
    ReadGreetingError(#[source] ImapError),
    #[error("cannot authenticate to IMAP server using LOGIN mechanism")]
    LoginError(#[source] ImapError),
    #[error("cannot authenticate to IMAP server using SASL XOAUTH2 mechanism")]
    AuthenticateXOAuth2Error(#[source] ImapError),
    #[error("IMAP client is not connected")]
    NotConnectedError,
    #[error("no IMAP folder selected")]
    NoFolderSelectedError,

    #[error("cannot list IMAP folders")]
    ListFoldersError(#[source] ImapError),
    #[error("cannot create IMAP folder {1}")]
    CreateFolderError(#[source] ImapError, String),
    #[error("cannot subscribe to IMAP folder {1}")]
    SubscribeFolderError(#[source] ImapError, String),
    #[error("cannot select IMAP folder {1}")]
    SelectFolderError(#[source] ImapError, String),
    #[error("cannot close IMAP folder {1}")]
    CloseFolderError(#[source] ImapError, String),
    #[error("cannot search IMAP messages matching {1}")]
    SearchError(#[source] ImapError, String),
    #[error("cannot fetch IMAP message {1}")]
    FetchMessageError(#[source] ImapError, Uid),
    #[error("cannot fetch IMAP message {0}: message not found")]
    FetchMessageNotFoundError(Uid),
    #[error("cannot fetch IMAP message {0}: body is missing")]
    FetchMessageBodyMissingError(Uid),
    #[error("cannot add flags {1} to IMAP messages {2}")]
    AddFlagsError(#[source] ImapError, String, String),
    #[error("cannot append IMAP message to folder {1}")]
    AppendMessageError(#[source] ImapError, String),
    #[error("cannot expunge IMAP folder {1}")]
    ExpungeError(#[source] ImapError, String),
}

impl_any_error!(Error);

/// Return `true` if the error means that the connection is gone.
fn is_connection_error(err: &ImapError) -> bool {
    matches!(err, ImapError::Io(_) | ImapError::ConnectionLost)
}

/// The SASL XOAUTH2 authenticator.
struct XOAuth2 {
    response: Vec<u8>,
    sent: bool,
}

impl XOAuth2 {
    fn new(user: &str, token: &str) -> Self {
        Self {
            response: format!("user={user}\x01auth=Bearer {token}\x01\x01").into_bytes(),
            sent: false,
        }
    }
}

impl Authenticator for XOAuth2 {
    type Response = Vec<u8>;

    fn process(&mut self, _challenge: &[u8]) -> Self::Response {
        if self.sent {
            // an error challenge, answer empty so the server can
            // terminate the exchange
            Vec::new()
        } else {
            self.sent = true;
            self.response.clone()
        }
    }
}

fn tls_connector() -> TlsConnector {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

/// Build a new authenticated IMAP session from the given
/// credentials.
pub async fn build_session(creds: &Credentials) -> Result<ImapSession> {
    let host = creds.server.as_str();
    let port = creds.port.unwrap_or(DEFAULT_PORT);

    debug!("connecting to IMAP server {host}:{port}");

    let tcp = TcpStream::connect((host, port))
        .await
        .map_err(|err| Error::ConnectTcpError(err, host.to_owned(), port))?;

    let domain = ServerName::try_from(host.to_owned())
        .map_err(|_| Error::ParseServerNameError(host.to_owned()))?;

    let tls = tls_connector()
        .connect(domain, tcp)
        .await
        .map_err(|err| Error::ConnectTlsError(err, host.to_owned(), port))?;

    let mut client = Client::new(tls);

    // the greeting must be consumed before SASL exchanges
    match client.read_response().await {
        Some(Ok(_greeting)) => (),
        Some(Err(err)) => return Err(Error::ReadGreetingError(err.into())),
        None => return Err(Error::ReadGreetingError(ImapError::ConnectionLost)),
    }

    let session = match creds.auth() {
        AuthKind::Password(password) => {
            debug!("creating session using login and password");
            client
                .login(&creds.user, password)
                .await
                .map_err(|(err, _)| Error::LoginError(err))?
        }
        AuthKind::OAuthBearer(token) => {
            debug!("creating session using xoauth2");
            client
                .authenticate("XOAUTH2", XOAuth2::new(&creds.user, token))
                .await
                .map_err(|(err, _)| Error::AuthenticateXOAuth2Error(err))?
        }
    };

    info!("authenticated to IMAP server {host}:{port} as {}", creds.user);
    Ok(session)
}

/// Deduce the personal namespace prefix from a full folder listing.
///
/// Servers rooting personal folders below INBOX (`INBOX.Sent`,
/// `INBOX.Drafts`) list every other folder under it.
fn infer_personal_namespace(folders: &Folders) -> Option<String> {
    let inbox = folders.inbox()?;
    let prefix = format!("{}{}", inbox.path, inbox.delimiter?);

    let mut others = folders.iter().filter(|folder| !folder.is_inbox()).peekable();
    others.peek()?;

    others
        .all(|folder| folder.path.starts_with(&prefix))
        .then_some(prefix)
}

fn folder_attribute(attr: &NameAttribute<'_>) -> Option<FolderAttribute> {
    match attr {
        NameAttribute::NoInferiors => Some(FolderAttribute::NoInferiors),
        NameAttribute::NoSelect => Some(FolderAttribute::NoSelect),
        NameAttribute::All => Some(FolderAttribute::All),
        NameAttribute::Archive => Some(FolderAttribute::Archive),
        NameAttribute::Drafts => Some(FolderAttribute::Drafts),
        NameAttribute::Flagged => Some(FolderAttribute::Flagged),
        NameAttribute::Junk => Some(FolderAttribute::Junk),
        NameAttribute::Sent => Some(FolderAttribute::Sent),
        NameAttribute::Trash => Some(FolderAttribute::Trash),
        NameAttribute::Extension(ext) => ext.parse().ok(),
        _ => None,
    }
}

fn to_folder(name: &Name) -> Folder {
    let path = name.name().to_owned();
    let delimiter = name.delimiter().and_then(|delim| delim.chars().next());

    let mut attributes: FolderAttributes = name.attributes().iter().filter_map(folder_attribute).collect();
    if path.eq_ignore_ascii_case(INBOX) {
        attributes.insert(FolderAttribute::Inbox);
    }

    Folder {
        path,
        delimiter,
        attributes,
    }
}

fn to_flags(fetch: &Fetch) -> Flags {
    fetch
        .flags()
        .filter_map(|flag| match flag {
            ImapFlag::Seen => Some(Flag::Seen),
            ImapFlag::Answered => Some(Flag::Answered),
            ImapFlag::Flagged => Some(Flag::Flagged),
            ImapFlag::Deleted => Some(Flag::Deleted),
            ImapFlag::Draft => Some(Flag::Draft),
            ImapFlag::Custom(flag) => Some(Flag::custom(flag)),
            // \Recent cannot be stored by clients
            _ => None,
        })
        .collect()
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn quote(s: &str) -> String {
    format!("\"{}\"", escape(s))
}

/// The IMAP client.
pub struct ImapClient {
    credentials: Credentials,
    session: Option<ImapSession>,
    namespace: Option<String>,
    selected: Option<String>,
}

impl ImapClient {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            session: None,
            namespace: None,
            selected: None,
        }
    }

    fn session(&mut self) -> Result<&mut ImapSession> {
        self.session.as_mut().ok_or(Error::NotConnectedError)
    }

    fn selected(&self) -> Result<String> {
        self.selected.clone().ok_or(Error::NoFolderSelectedError)
    }

    /// Forget the session when the given result carries a connection
    /// error.
    fn check<T>(&mut self, res: result::Result<T, ImapError>) -> result::Result<T, ImapError> {
        if let Err(err) = &res {
            if is_connection_error(err) {
                warn!("IMAP connection to {} lost: {err}", self.credentials.server);
                self.session = None;
                self.selected = None;
            }
        }
        res
    }

    async fn fetch(&mut self, uid: Uid, query: &str) -> Result<Fetch> {
        let session = self.session()?;
        let res = async {
            let fetches = session.uid_fetch(uid.to_string(), query).await?;
            fetches.try_collect::<Vec<_>>().await
        }
        .await;

        self.check(res)
            .map_err(|err| Error::FetchMessageError(err, uid))?
            .into_iter()
            .find(|fetch| fetch.uid == Some(uid))
            .ok_or(Error::FetchMessageNotFoundError(uid))
    }
}

#[async_trait]
impl MailClient for ImapClient {
    async fn connect(&mut self) -> AnyResult<()> {
        self.session = None;
        self.selected = None;

        let session = build_session(&self.credentials).await?;
        self.session = Some(session);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    async fn disconnect(&mut self) -> AnyResult<()> {
        self.selected = None;
        if let Some(mut session) = self.session.take() {
            if let Err(err) = session.logout().await {
                debug!("cannot logout from IMAP session: {err}");
                trace!("{err:?}");
            }
        }
        Ok(())
    }

    fn personal_namespace(&self) -> Option<String> {
        self.namespace.clone()
    }

    async fn list_folders(&mut self) -> AnyResult<Folders> {
        let session = self.session()?;
        let res = async {
            let names = session.list(Some(""), Some("*")).await?;
            names.try_collect::<Vec<_>>().await
        }
        .await;

        let names = self.check(res).map_err(Error::ListFoldersError)?;
        let folders: Folders = names.iter().map(to_folder).collect();

        self.namespace = infer_personal_namespace(&folders);
        debug!(
            "listed {} IMAP folders, personal namespace: {:?}",
            folders.len(),
            self.namespace
        );
        Ok(folders)
    }

    async fn get_folder(&mut self, path: &str) -> AnyResult<Option<Folder>> {
        // the pattern is sent as is
        let pattern = quote(path);
        let session = self.session()?;
        let res = async {
            let names = session.list(Some(""), Some(pattern.as_str())).await?;
            names.try_collect::<Vec<_>>().await
        }
        .await;

        let names = self.check(res).map_err(Error::ListFoldersError)?;
        let folder = names
            .iter()
            .find(|name| name.name() == path)
            .map(to_folder);

        Ok(folder)
    }

    async fn create_folder(&mut self, path: &str) -> AnyResult<Folder> {
        let session = self.session()?;
        let res = session.create(path).await;
        self.check(res)
            .map_err(|err| Error::CreateFolderError(err, path.to_owned()))?;

        let folder = self.get_folder(path).await?;
        let delimiter = self.list_delimiter();
        Ok(folder.unwrap_or_else(|| Folder::new(path, delimiter)))
    }

    async fn subscribe_folder(&mut self, path: &str) -> AnyResult<()> {
        let session = self.session()?;
        let res = session.subscribe(path).await;
        self.check(res)
            .map_err(|err| Error::SubscribeFolderError(err, path.to_owned()))?;
        Ok(())
    }

    async fn open_folder(&mut self, path: &str, access: FolderAccess) -> AnyResult<usize> {
        let session = self.session()?;
        let res = match access {
            FolderAccess::ReadWrite => session.select(path).await,
            FolderAccess::ReadOnly => session.examine(path).await,
        };

        let mailbox = self
            .check(res)
            .map_err(|err| Error::SelectFolderError(err, path.to_owned()))?;

        debug!("selected IMAP folder {path} ({access}): {} messages", mailbox.exists);
        self.selected = Some(path.to_owned());
        Ok(mailbox.exists as usize)
    }

    async fn close_folder(&mut self) -> AnyResult<()> {
        let Some(path) = self.selected.take() else {
            return Ok(());
        };

        let session = self.session()?;

        // CLOSE would expunge, UNSELECT does not
        let res = match session.run_command_and_check_ok("UNSELECT").await {
            Ok(()) => Ok(()),
            Err(err) if is_connection_error(&err) => Err(err),
            Err(err) => {
                debug!("cannot unselect IMAP folder {path}, examining it instead: {err}");
                session.examine(&path).await.map(|_| ())
            }
        };

        self.check(res)
            .map_err(|err| Error::CloseFolderError(err, path))?;
        Ok(())
    }

    async fn search(&mut self, query: &SearchQuery) -> AnyResult<Vec<Uid>> {
        self.selected()?;

        let imap_query = match query {
            SearchQuery::All => String::from("ALL"),
            SearchQuery::Archived => format!("X-GM-RAW {}", quote("in:archive")),
            SearchQuery::MessageId(id) => {
                let id = id.trim_matches(|c| c == '<' || c == '>');
                format!("HEADER Message-ID {}", quote(&format!("<{id}>")))
            }
        };

        trace!("searching IMAP messages: {imap_query}");

        let session = self.session()?;
        let res = session.uid_search(&imap_query).await;
        let uids = self
            .check(res)
            .map_err(|err| Error::SearchError(err, query.to_string()))?;

        let mut uids: Vec<Uid> = uids.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    async fn fetch_message(&mut self, uid: Uid) -> AnyResult<Message> {
        let fetch = self
            .fetch(uid, "(UID FLAGS INTERNALDATE BODY.PEEK[])")
            .await?;

        let raw = fetch
            .body()
            .ok_or(Error::FetchMessageBodyMissingError(uid))?
            .to_vec();

        Ok(Message {
            uid,
            raw,
            internal_date: fetch.internal_date(),
        })
    }

    async fn fetch_flags(&mut self, uid: Uid) -> AnyResult<Flags> {
        let fetch = self.fetch(uid, "(UID FLAGS)").await?;
        Ok(to_flags(&fetch))
    }

    async fn add_flags(&mut self, uids: &[Uid], flags: &Flags) -> AnyResult<()> {
        if uids.is_empty() || flags.is_empty() {
            return Ok(());
        }

        let uid_set = uids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let query = format!("+FLAGS.SILENT ({})", flags.to_imap_query_string());

        let session = self.session()?;
        let res = async {
            let updates = session.uid_store(&uid_set, &query).await?;
            updates.try_collect::<Vec<_>>().await
        }
        .await;

        self.check(res)
            .map_err(|err| Error::AddFlagsError(err, flags.to_string(), uid_set))?;
        Ok(())
    }

    async fn append_message(
        &mut self,
        path: &str,
        msg: &Message,
        flags: &Flags,
    ) -> AnyResult<()> {
        let flags = format!("({})", flags.to_imap_query_string());
        let date = msg
            .internal_date
            .map(|date| date.format("\"%e-%b-%Y %H:%M:%S %z\"").to_string());

        // the mailbox is wrapped in quotes but not escaped
        let mailbox = escape(path);
        let session = self.session()?;
        let res = session
            .append(&mailbox, Some(flags.as_str()), date.as_deref(), &msg.raw)
            .await;

        self.check(res)
            .map_err(|err| Error::AppendMessageError(err, path.to_owned()))?;
        Ok(())
    }

    async fn expunge(&mut self) -> AnyResult<()> {
        let path = self.selected()?;
        let session = self.session()?;
        let res = async {
            let expunged = session.expunge().await?;
            expunged.try_collect::<Vec<_>>().await
        }
        .await;

        let expunged = self
            .check(res)
            .map_err(|err| Error::ExpungeError(err, path.clone()))?;
        debug!("expunged {} messages from IMAP folder {path}", expunged.len());
        Ok(())
    }
}

impl ImapClient {
    fn list_delimiter(&self) -> Option<char> {
        self.namespace
            .as_deref()
            .and_then(|ns| ns.chars().last())
            .filter(|c| !c.is_alphanumeric())
    }
}

#[cfg(test)]
mod tests {
    use super::{escape, infer_personal_namespace, quote};
    use crate::folder::{Folder, FolderAttribute, Folders};

    fn folders(delim: char, paths: &[&str]) -> Folders {
        paths
            .iter()
            .map(|path| {
                let folder = Folder::new(*path, Some(delim));
                if *path == "INBOX" {
                    folder.with_attribute(FolderAttribute::Inbox)
                } else {
                    folder
                }
            })
            .collect()
    }

    #[test]
    fn personal_namespace_under_inbox() {
        let listing = folders('.', &["INBOX", "INBOX.Sent", "INBOX.Drafts", "INBOX.A.B"]);
        assert_eq!(infer_personal_namespace(&listing).as_deref(), Some("INBOX."));
    }

    #[test]
    fn personal_namespace_at_root() {
        let listing = folders('/', &["INBOX", "Sent", "INBOX/Receipts"]);
        assert_eq!(infer_personal_namespace(&listing), None);

        let listing = folders('.', &["INBOX"]);
        assert_eq!(infer_personal_namespace(&listing), None);

        let listing = folders('.', &["Sent"]);
        assert_eq!(infer_personal_namespace(&listing), None);
    }

    #[test]
    fn quote_mailbox_names() {
        assert_eq!(quote("My Projects"), "\"My Projects\"");
        assert_eq!(quote("Sent Items/2023"), "\"Sent Items/2023\"");
        assert_eq!(quote(r#"a "b" \c"#), r#""a \"b\" \\c""#);
        assert_eq!(escape(r#"say "hi""#), r#"say \"hi\""#);
    }
}
