//! # Memory contact service
//!
//! In-process [`ContactService`] backed by a shared address book.
//! Uploaded contacts go through the vCard writer and reader, the
//! same way they would travel to a CardDAV server.

use std::{collections::BTreeSet, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use super::{vcard, Contact, ContactService};
use crate::{account::Credentials, error::impl_any_error, AnyResult};

/// Errors related to the memory contact service.
#[derive(Debug, Error)]
pub enum Error {
    #[error("memory contacts: authentication failed for user {0}")]
    AuthenticationError(String),
    #[error("memory contacts: cannot upload contact {0}")]
    UploadContactError(String),
    #[error("memory contacts: cannot find contact {0}")]
    ContactNotFoundError(String),
}

impl_any_error!(Error);

#[derive(Debug, Default)]
struct AddressBook {
    contacts: Vec<Contact>,
    collected: Vec<Contact>,
    fail_upload: BTreeSet<String>,
    uploads: usize,
}

/// The memory contact service.
///
/// Cloning the service shares its address book.
#[derive(Clone, Debug, Default)]
pub struct MemoryContacts {
    login: Option<(String, String)>,
    credentials: Option<Credentials>,
    book: Arc<Mutex<AddressBook>>,
}

impl MemoryContacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require clients to authenticate with the given user and
    /// password.
    pub fn with_login(mut self, user: impl ToString, password: impl ToString) -> Self {
        self.login = Some((user.to_string(), password.to_string()));
        self
    }

    /// Build a service handle bound to the given credentials.
    pub fn client_for(&self, creds: &Credentials) -> Self {
        Self {
            credentials: Some(creds.clone()),
            ..self.clone()
        }
    }

    pub async fn add_contact(&self, contact: Contact) {
        self.book.lock().await.contacts.push(contact);
    }

    pub async fn add_collected_contact(&self, contact: Contact) {
        self.book.lock().await.collected.push(contact);
    }

    /// Make the upload of the contact with the given display name
    /// fail.
    pub async fn fail_upload(&self, name: impl ToString) {
        self.book.lock().await.fail_upload.insert(name.to_string());
    }

    pub async fn contacts(&self) -> Vec<Contact> {
        self.book.lock().await.contacts.clone()
    }

    /// Return the number of upload attempts.
    pub async fn upload_count(&self) -> usize {
        self.book.lock().await.uploads
    }

    fn authenticate(&self) -> Result<(), Error> {
        let (Some((user, password)), Some(creds)) = (&self.login, &self.credentials) else {
            return Ok(());
        };

        if &creds.user == user && &creds.password == password {
            Ok(())
        } else {
            Err(Error::AuthenticationError(creds.user.clone()))
        }
    }
}

fn same_name(a: &Contact, b: &Contact) -> bool {
    match (a.display_name(), b.display_name()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

#[async_trait]
impl ContactService for MemoryContacts {
    async fn test_connection(&self) -> AnyResult<()> {
        Ok(self.authenticate()?)
    }

    async fn list_contacts(&self) -> AnyResult<Vec<Contact>> {
        self.authenticate()?;
        Ok(self.book.lock().await.contacts.clone())
    }

    async fn list_collected_contacts(&self) -> AnyResult<Vec<Contact>> {
        self.authenticate()?;
        Ok(self.book.lock().await.collected.clone())
    }

    async fn contact_exists(&self, contact: &Contact) -> AnyResult<bool> {
        self.authenticate()?;
        let book = self.book.lock().await;
        Ok(book.contacts.iter().any(|c| same_name(c, contact)))
    }

    async fn upload_contact(&self, contact: &Contact) -> AnyResult<()> {
        self.authenticate()?;
        let mut book = self.book.lock().await;
        book.uploads += 1;

        let name = contact.display_name().unwrap_or_default();
        if book.fail_upload.contains(name) {
            return Err(Error::UploadContactError(name.to_owned()).into());
        }

        let contact = vcard::parse(&vcard::to_vcard(contact))?;
        debug!("memory contacts: stored contact {contact}");
        book.contacts.push(contact);

        Ok(())
    }

    async fn delete_contact(&self, contact: &Contact) -> AnyResult<()> {
        self.authenticate()?;
        let mut book = self.book.lock().await;

        let count = book.contacts.len();
        book.contacts.retain(|c| !same_name(c, contact));

        if book.contacts.len() == count {
            return Err(Error::ContactNotFoundError(contact.to_string()).into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryContacts;
    use crate::{
        account::Credentials,
        contact::{Contact, ContactService},
    };

    #[test_log::test(tokio::test)]
    async fn upload_exists_delete() {
        let book = MemoryContacts::new();
        let ada = Contact::new("Ada Lovelace").with_email("ada@example.org");

        assert!(!book.contact_exists(&ada).await.unwrap());
        book.upload_contact(&ada).await.unwrap();
        assert!(book
            .contact_exists(&Contact::new("ada lovelace"))
            .await
            .unwrap());

        let stored = book.contacts().await;
        assert_eq!(stored[0].emails, vec!["ada@example.org"]);
        assert!(stored[0].uid.is_some());

        book.delete_contact(&ada).await.unwrap();
        assert!(book.contacts().await.is_empty());
        assert!(book.delete_contact(&ada).await.is_err());
    }

    #[test_log::test(tokio::test)]
    async fn login() {
        let book = MemoryContacts::new().with_login("bob", "s3cr3t");

        let good = book.client_for(&Credentials::new("localhost", "bob", "s3cr3t"));
        assert!(good.test_connection().await.is_ok());

        let bad = book.client_for(&Credentials::new("localhost", "bob", "nope"));
        assert!(bad.test_connection().await.is_err());
        assert!(bad.list_contacts().await.is_err());
    }
}
