//! # Configuration
//!
//! Module dedicated to migration job files. A job file is a TOML
//! document with a `[source]` and a `[destination]` table holding
//! [`Credentials`], plus optional `[options]` and `[contacts]`
//! tables:
//!
//! ```toml
//! [source]
//! server = "imap.gmail.com"
//! user = "alice@gmail.com"
//! oauth-token = "ya29.token"
//! use-oauth = true
//!
//! [destination]
//! server = "imap.example.org"
//! user = "alice"
//! password = "s3cr3t"
//!
//! [options]
//! progress-updates = true
//! ```

use std::{
    fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use thiserror::Error;
use tracing::debug;

use crate::{
    account::Credentials,
    contact::{self, ContactMover, ContactOptions, ContactService},
    error::impl_any_error,
    mail::{self, MailMover, MigrationOptions},
    provider::MailClient,
    registry::Registry,
};

/// The global `Result` alias of the module.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read configuration file {1}")]
    ReadConfigFileError(#[source] io::Error, PathBuf),
    #[error("cannot parse configuration")]
    ParseConfigError(#[source] toml::de::Error),
}

impl_any_error!(Error);

/// The migration job configuration.
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MigrationConfig {
    pub source: Credentials,
    pub destination: Credentials,
    #[serde(default)]
    pub options: MigrationOptions,
    #[serde(default)]
    pub contacts: ContactOptions,
}

impl MigrationConfig {
    /// Read and parse the job file at the given path.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("reading migration configuration at {}", path.display());

        let content = fs::read_to_string(path)
            .map_err(|err| Error::ReadConfigFileError(err, path.to_owned()))?;

        content.parse()
    }

    /// Build the mail mover of the job.
    pub fn mail_mover(&self, registry: &Registry<dyn MailClient>) -> mail::Result<MailMover> {
        MailMover::new(
            registry,
            self.source.clone(),
            self.destination.clone(),
            self.options.clone(),
        )
    }

    /// Build the contact mover of the job.
    pub fn contact_mover(
        &self,
        registry: &Registry<dyn ContactService>,
    ) -> contact::Result<ContactMover> {
        ContactMover::new(
            registry,
            self.source.clone(),
            self.destination.clone(),
            self.contacts.clone(),
        )
    }
}

impl FromStr for MigrationConfig {
    type Err = Error;

    fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(Error::ParseConfigError)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{Error, MigrationConfig};
    use crate::{registry::Registry, MailClient};

    const CONFIG: &str = r#"
        [source]
        server = "imap.gmail.com"
        user = "alice@gmail.com"
        oauth-token = "ya29.token"
        use-oauth = true

        [destination]
        server = "imap.example.org"
        port = 1993
        user = "alice"
        password = "s3cr3t"
        implementor = "memory"

        [options]
        progress-updates = true
        delete-source = true

        [contacts]
        include-collected = true
    "#;

    #[test]
    fn parse_config() {
        let config: MigrationConfig = CONFIG.parse().unwrap();

        assert_eq!(config.source.server, "imap.gmail.com");
        assert_eq!(config.source.oauth_token(), Some("ya29.token"));
        assert_eq!(config.source.implementor(), "imap");
        assert_eq!(config.destination.port, Some(1993));
        assert_eq!(config.destination.implementor(), "memory");
        assert!(config.options.progress_updates);
        assert!(config.options.delete_source);
        assert!(!config.options.folders_only);
        assert!(config.contacts.include_collected);
    }

    #[test]
    fn parse_config_defaults() {
        let config: MigrationConfig = r#"
            [source]
            server = "a"
            user = "b"

            [destination]
            server = "c"
            user = "d"
        "#
        .parse()
        .unwrap();

        assert_eq!(config.options, Default::default());
        assert!(!config.contacts.include_collected);
    }

    #[test]
    fn parse_invalid_config() {
        let err = "[source]\nserver = 1\n".parse::<MigrationConfig>().unwrap_err();
        assert!(matches!(err, Error::ParseConfigError(_)));

        let err = MigrationConfig::from_path("/does/not/exist.toml").unwrap_err();
        assert!(matches!(err, Error::ReadConfigFileError(_, _)));
    }

    #[cfg(feature = "imap")]
    #[test]
    fn build_mover_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();

        let config = MigrationConfig::from_path(file.path()).unwrap();

        // the memory implementor is not registered by default
        let registry = Registry::<dyn MailClient>::mail();
        assert!(config.mail_mover(&registry).is_err());

        let registry = registry.with("memory", |_| {
            Ok(Box::new(crate::provider::memory::MemoryServer::new('/').client()))
        });
        assert!(config.mail_mover(&registry).is_ok());
    }
}
