//! # Account
//!
//! Module dedicated to account credentials. The core structure is
//! [`Credentials`], which describes how to reach and authenticate
//! one side of a migration.

use std::fmt;

use thiserror::Error;

use crate::error::impl_any_error;

/// The default implementor tag, used when credentials do not specify
/// one.
pub const DEFAULT_IMPLEMENTOR: &str = "imap";

/// Errors related to account credentials.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid credentials: server must be specified")]
    MissingServerError,
    #[error("invalid credentials for {0}: user must be specified")]
    MissingUserError(String),
    #[error("invalid credentials for {0}: OAuth is enabled but no token is given")]
    MissingOAuthTokenError(String),
}

impl_any_error!(Error);

/// The authentication method resolved from credentials.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuthKind<'a> {
    /// Authenticate with the user name and password.
    Password(&'a str),

    /// Authenticate with an OAuth 2.0 bearer token.
    OAuthBearer(&'a str),
}

/// The account credentials.
///
/// Credentials are immutable for the duration of a migration run.
#[derive(Clone, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case", default)
)]
pub struct Credentials {
    /// The server host name. For HTTP based providers this is the
    /// base URL of the server.
    pub server: String,

    /// The server port. Providers fall back to their own default
    /// when this is not set.
    pub port: Option<u16>,

    /// The login of the account.
    pub user: String,

    /// The password of the account.
    pub password: String,

    /// The OAuth 2.0 access token obtained from an OAuth provider.
    pub oauth_token: Option<String>,

    /// Authenticate with the OAuth token instead of the password.
    pub use_oauth: bool,

    /// The tag selecting which provider client to build.
    pub implementor: Option<String>,
}

impl Credentials {
    pub fn new(server: impl ToString, user: impl ToString, password: impl ToString) -> Self {
        Self {
            server: server.to_string(),
            user: user.to_string(),
            password: password.to_string(),
            ..Default::default()
        }
    }

    pub fn with_implementor(mut self, implementor: impl ToString) -> Self {
        self.implementor = Some(implementor.to_string());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_oauth_token(mut self, token: impl ToString) -> Self {
        self.oauth_token = Some(token.to_string());
        self.use_oauth = true;
        self
    }

    /// Return the implementor tag, or [`DEFAULT_IMPLEMENTOR`].
    pub fn implementor(&self) -> &str {
        self.implementor.as_deref().unwrap_or(DEFAULT_IMPLEMENTOR)
    }

    /// Return the OAuth token when OAuth is enabled and a non-empty
    /// token is present.
    pub fn oauth_token(&self) -> Option<&str> {
        if !self.use_oauth {
            return None;
        }

        self.oauth_token.as_deref().filter(|token| !token.is_empty())
    }

    /// Resolve the authentication method.
    ///
    /// The OAuth token is used only when OAuth is enabled and the
    /// token is not empty, otherwise the password is used.
    pub fn auth(&self) -> AuthKind<'_> {
        match self.oauth_token() {
            Some(token) => AuthKind::OAuthBearer(token),
            None => AuthKind::Password(&self.password),
        }
    }

    /// Check that the credentials are complete enough to attempt a
    /// connection.
    pub fn validate(&self) -> Result<(), Error> {
        if self.server.trim().is_empty() {
            return Err(Error::MissingServerError);
        }

        if self.user.trim().is_empty() {
            return Err(Error::MissingUserError(self.server.clone()));
        }

        if self.use_oauth && self.oauth_token().is_none() {
            return Err(Error::MissingOAuthTokenError(self.server.clone()));
        }

        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("oauth_token", &self.oauth_token.as_ref().map(|_| "<redacted>"))
            .field("use_oauth", &self.use_oauth)
            .field("implementor", &self.implementor())
            .finish()
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.server)
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthKind, Credentials, Error};

    #[test]
    fn auth_prefers_oauth_only_when_enabled() {
        let creds = Credentials::new("imap.localhost", "bob", "passwd");
        assert_eq!(creds.auth(), AuthKind::Password("passwd"));

        let mut creds = creds.with_oauth_token("token");
        assert_eq!(creds.auth(), AuthKind::OAuthBearer("token"));

        creds.use_oauth = false;
        assert_eq!(creds.auth(), AuthKind::Password("passwd"));
    }

    #[test]
    fn validate() {
        let creds = Credentials::new("", "bob", "passwd");
        assert!(matches!(creds.validate(), Err(Error::MissingServerError)));

        let creds = Credentials::new("imap.localhost", " ", "passwd");
        assert!(matches!(creds.validate(), Err(Error::MissingUserError(_))));

        let mut creds = Credentials::new("imap.localhost", "bob", "passwd");
        creds.use_oauth = true;
        assert!(matches!(
            creds.validate(),
            Err(Error::MissingOAuthTokenError(_))
        ));

        let creds = Credentials::new("imap.localhost", "bob", "passwd");
        assert!(creds.validate().is_ok());
        assert_eq!(creds.implementor(), "imap");
    }

    #[test]
    fn debug_redacts_secrets() {
        let creds = Credentials::new("imap.localhost", "bob", "hunter2").with_oauth_token("t0k3n");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("t0k3n"));
    }
}
