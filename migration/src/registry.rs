//! # Registry
//!
//! Module dedicated to provider selection. A [`Registry`] maps the
//! implementor tag of [`Credentials`] to a factory building the
//! matching client. Unknown tags are rejected when a mover is built,
//! before any connection is attempted.

use std::{collections::BTreeMap, fmt, sync::Arc};

use thiserror::Error;

use crate::{account::Credentials, error::impl_any_error, AnyResult};

/// Errors related to the registry.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot find implementor {0}, available implementors: {1}")]
    UnknownImplementorError(String, String),
}

impl_any_error!(Error);

/// The client factory.
///
/// A factory takes the credentials of an account and builds the
/// client that will talk to it.
pub type Factory<T> = Arc<dyn Fn(&Credentials) -> AnyResult<Box<T>> + Send + Sync>;

/// The provider registry.
pub struct Registry<T: ?Sized> {
    factories: BTreeMap<String, Factory<T>>,
}

impl<T: ?Sized> Registry<T> {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Register the factory of the given implementor tag, replacing
    /// any previous one.
    pub fn register(
        &mut self,
        tag: impl ToString,
        factory: impl Fn(&Credentials) -> AnyResult<Box<T>> + Send + Sync + 'static,
    ) {
        self.factories.insert(tag.to_string(), Arc::new(factory));
    }

    pub fn with(
        mut self,
        tag: impl ToString,
        factory: impl Fn(&Credentials) -> AnyResult<Box<T>> + Send + Sync + 'static,
    ) -> Self {
        self.register(tag, factory);
        self
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Find the factory matching the implementor tag of the given
    /// credentials.
    pub fn resolve(&self, creds: &Credentials) -> Result<Factory<T>, Error> {
        let tag = creds.implementor();
        self.factories.get(tag).cloned().ok_or_else(|| {
            let available = self.tags().collect::<Vec<_>>().join(", ");
            Error::UnknownImplementorError(tag.to_owned(), available)
        })
    }

    /// Build a client for the given credentials.
    pub fn build(&self, creds: &Credentials) -> AnyResult<Box<T>> {
        let factory = self.resolve(creds)?;
        factory(creds)
    }
}

impl<T: ?Sized> Clone for Registry<T> {
    fn clone(&self) -> Self {
        Self {
            factories: self.factories.clone(),
        }
    }
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.tags()).finish()
    }
}

impl Registry<dyn crate::MailClient> {
    /// Build the registry of the mail providers shipped with the
    /// library: `imap` when the feature is enabled.
    ///
    /// The `memory` provider needs a server instance and is
    /// registered by the caller.
    pub fn mail() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::empty();

        #[cfg(feature = "imap")]
        registry.register("imap", |creds| {
            Ok(Box::new(crate::provider::imap::ImapClient::new(creds.clone())))
        });

        registry
    }
}

impl Registry<dyn crate::ContactService> {
    /// Build the registry of the contact providers shipped with the
    /// library: `google` and `nextcloud` when the `contacts` feature
    /// is enabled.
    pub fn contacts() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::empty();

        #[cfg(feature = "contacts")]
        {
            registry.register("google", |creds| {
                Ok(Box::new(crate::contact::google::GoogleContacts::new(creds)?))
            });
            registry.register("nextcloud", |creds| {
                Ok(Box::new(crate::contact::carddav::NextCloudContacts::new(creds)?))
            });
        }

        registry
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, Registry};
    use crate::{account::Credentials, provider::memory::MemoryServer, MailClient};

    #[test]
    fn unknown_implementor() {
        let registry = Registry::<dyn MailClient>::empty();
        let creds = Credentials::new("localhost", "bob", "passwd").with_implementor("exchange");

        let err = registry.resolve(&creds).err().unwrap();
        assert!(matches!(err, Error::UnknownImplementorError(tag, _) if tag == "exchange"));
    }

    #[test]
    fn build_registered_client() {
        let server = MemoryServer::new('/');
        let registry = Registry::<dyn MailClient>::empty()
            .with("memory", move |creds| Ok(Box::new(server.client_for(creds))));

        let creds = Credentials::new("localhost", "bob", "passwd").with_implementor("memory");
        let client = registry.build(&creds).unwrap();
        assert!(!client.is_connected());
        assert!(registry.contains("memory"));
    }
}
