//! # Contact migration
//!
//! Module dedicated to address book migration. Contacts are read from
//! a source [`ContactService`] and uploaded to a destination one by
//! the [`ContactMover`].
//!
//! Concrete services reside in their own module: [`google`],
//! [`carddav`] and [`memory`].

#[cfg(feature = "contacts")]
pub mod carddav;
mod error;
#[cfg(feature = "contacts")]
pub mod google;
pub mod memory;
pub mod vcard;

use std::{fmt, future::Future, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[doc(inline)]
pub use self::error::{Error, Result};
use crate::{
    account::Credentials,
    mail::MigrationOutcome,
    progress::{ProgressReporter, StatusEvent, StatusEventHandler},
    registry::{Factory, Registry},
    stats::MigrationStats,
    AnyResult,
};

/// The category given to contacts collected automatically by the
/// provider (Google "other contacts").
pub const COLLECTED_CATEGORY: &str = "Collected Contacts";

/// The contact record.
///
/// Mirrors the vCard 4.0 properties. Single-valued properties are
/// optional, multi-valued ones are plain lists.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case", default)
)]
pub struct Contact {
    pub formatted_name: Option<String>,
    pub family_name: Option<String>,
    pub given_name: Option<String>,
    pub additional_names: Option<String>,
    pub honorific_prefixes: Option<String>,
    pub honorific_suffixes: Option<String>,
    pub nickname: Option<String>,
    pub uid: Option<String>,

    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub addresses: Vec<String>,

    pub organization: Option<String>,
    pub title: Option<String>,
    pub role: Option<String>,

    pub birthday: Option<NaiveDate>,
    pub anniversary: Option<NaiveDate>,
    pub gender: Option<String>,

    pub impp: Vec<String>,
    pub language: Option<String>,
    pub time_zone: Option<String>,
    pub geo: Option<String>,

    pub categories: Vec<String>,
    pub note: Option<String>,
    pub product_id: Option<String>,
    pub revision: Option<DateTime<Utc>>,

    pub urls: Vec<String>,
    pub key: Option<String>,
    pub photo: Option<String>,
    pub logo: Option<String>,
    pub sound: Option<String>,

    pub calendar_address_uri: Option<String>,
    pub calendar_uri: Option<String>,
    pub free_busy_url: Option<String>,
    pub related: Vec<String>,
}

impl Contact {
    pub fn new(formatted_name: impl ToString) -> Self {
        Self {
            formatted_name: Some(formatted_name.to_string()),
            ..Self::default()
        }
    }

    pub fn with_email(mut self, email: impl ToString) -> Self {
        self.emails.push(email.to_string());
        self
    }

    pub fn with_category(mut self, category: impl ToString) -> Self {
        self.categories.push(category.to_string());
        self
    }

    /// Return the name used to identify the contact, if any.
    pub fn display_name(&self) -> Option<&str> {
        self.formatted_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Serialize the contact as a vCard 4.0 document.
    pub fn to_vcard(&self) -> String {
        vcard::to_vcard(self)
    }

    /// Parse a contact from a vCard document.
    pub fn from_vcard(vcard: &str) -> Result<Self> {
        vcard::parse(vcard)
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.display_name(), self.emails.first()) {
            (Some(name), Some(email)) => write!(f, "{name} <{email}>"),
            (Some(name), None) => write!(f, "{name}"),
            (None, Some(email)) => write!(f, "<{email}>"),
            (None, None) => write!(f, "<unnamed>"),
        }
    }
}

/// The contact service capability.
///
/// One implementation per address book provider.
#[async_trait]
pub trait ContactService: Send + Sync {
    /// Check that the service is reachable with the given
    /// credentials.
    async fn test_connection(&self) -> AnyResult<()>;

    /// List the contacts of the address book.
    async fn list_contacts(&self) -> AnyResult<Vec<Contact>>;

    /// List the contacts collected automatically by the provider.
    async fn list_collected_contacts(&self) -> AnyResult<Vec<Contact>> {
        Ok(Vec::new())
    }

    /// Return `true` if an equivalent contact already exists.
    async fn contact_exists(&self, contact: &Contact) -> AnyResult<bool>;

    async fn upload_contact(&self, contact: &Contact) -> AnyResult<()>;

    async fn delete_contact(&self, contact: &Contact) -> AnyResult<()> {
        Err(Error::DeleteContactNotSupportedError(contact.to_string()).into())
    }
}

/// The behaviour flags of a contact migration run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case", default)
)]
pub struct ContactOptions {
    /// Also migrate the contacts collected automatically by the
    /// source provider.
    pub include_collected: bool,
}

/// The contact mover.
pub struct ContactMover {
    source: Credentials,
    destination: Credentials,
    options: ContactOptions,
    source_factory: Factory<dyn ContactService>,
    destination_factory: Factory<dyn ContactService>,
    handler: Option<Arc<StatusEventHandler>>,
    stats: MigrationStats,
}

impl ContactMover {
    pub fn new(
        registry: &Registry<dyn ContactService>,
        source: Credentials,
        destination: Credentials,
        options: ContactOptions,
    ) -> Result<Self> {
        source
            .validate()
            .map_err(Error::ValidateSourceCredentialsError)?;
        destination
            .validate()
            .map_err(Error::ValidateDestinationCredentialsError)?;

        let source_factory = registry
            .resolve(&source)
            .map_err(Error::ResolveSourceImplementorError)?;
        let destination_factory = registry
            .resolve(&destination)
            .map_err(Error::ResolveDestinationImplementorError)?;

        Ok(Self {
            source,
            destination,
            options,
            source_factory,
            destination_factory,
            handler: None,
            stats: MigrationStats::default(),
        })
    }

    pub fn set_some_handler<F: Future<Output = AnyResult<()>> + Send + 'static>(
        &mut self,
        handler: Option<impl Fn(StatusEvent) -> F + Send + Sync + 'static>,
    ) {
        self.handler = match handler {
            Some(handler) => Some(Arc::new(move |evt| Box::pin(handler(evt)))),
            None => None,
        };
    }

    pub fn set_handler<F: Future<Output = AnyResult<()>> + Send + 'static>(
        &mut self,
        handler: impl Fn(StatusEvent) -> F + Send + Sync + 'static,
    ) {
        self.set_some_handler(Some(handler));
    }

    pub fn with_handler<F: Future<Output = AnyResult<()>> + Send + 'static>(
        mut self,
        handler: impl Fn(StatusEvent) -> F + Send + Sync + 'static,
    ) -> Self {
        self.set_handler(handler);
        self
    }

    pub fn statistics(&self) -> MigrationStats {
        self.stats
    }

    /// Run the contact migration.
    pub async fn execute(&mut self, cancel: &CancellationToken) -> Result<MigrationOutcome> {
        self.stats.reset();
        let mut reporter = ProgressReporter::new(self.handler.clone());

        let source = (self.source_factory)(&self.source)
            .map_err(|err| Error::BuildServiceError(err, self.source.to_string()))?;
        let destination = (self.destination_factory)(&self.destination)
            .map_err(|err| Error::BuildServiceError(err, self.destination.to_string()))?;

        let server = &self.source.server;

        reporter
            .info(format!("Listing contacts from {server}..."))
            .await;
        let mut contacts = source
            .list_contacts()
            .await
            .map_err(|err| Error::ListContactsError(err, server.clone()))?;

        if self.options.include_collected {
            reporter
                .info(format!("Listing collected contacts from {server}..."))
                .await;
            let collected = source
                .list_collected_contacts()
                .await
                .map_err(|err| Error::ListCollectedContactsError(err, server.clone()))?;
            contacts.extend(collected);
        }

        reporter.set_total(contacts.len());
        reporter
            .info(format!("Found {} contacts.", contacts.len()))
            .await;

        for contact in &contacts {
            if cancel.is_cancelled() {
                let stats = (self.stats.total > 0).then_some(self.stats);
                return Ok(MigrationOutcome::Cancelled(stats));
            }

            self.stats.total += 1;
            self.transfer(&*destination, contact, &mut reporter).await;
            reporter.advance();
        }

        reporter.info("Transfer complete.").await;
        Ok(MigrationOutcome::Completed(self.stats))
    }

    async fn transfer(
        &mut self,
        destination: &dyn ContactService,
        contact: &Contact,
        reporter: &mut ProgressReporter,
    ) {
        let Some(name) = contact.display_name() else {
            reporter.progress("Contact has no name, Skipping.").await;
            self.stats.skipped += 1;
            return;
        };

        reporter.progress(format!("Moving {name}...")).await;

        match destination.contact_exists(contact).await {
            Ok(true) => {
                reporter
                    .progress(format!("{name} already exists. Skipping."))
                    .await;
                self.stats.skipped += 1;
            }
            Ok(false) => match destination.upload_contact(contact).await {
                Ok(()) => {
                    self.stats.successful += 1;
                }
                Err(err) => {
                    reporter
                        .warn(format!("Failed to upload contact {name}: {err}"))
                        .await;
                    self.stats.failed += 1;
                }
            },
            Err(err) => {
                reporter
                    .warn(format!("Failed to look up contact {name}: {err}"))
                    .await;
                self.stats.failed += 1;
            }
        }
    }

    /// Check that the contact service described by the given
    /// credentials is reachable.
    pub async fn try_authentication(
        registry: &Registry<dyn ContactService>,
        creds: &Credentials,
    ) -> Result<()> {
        creds
            .validate()
            .map_err(Error::ValidateSourceCredentialsError)?;
        let service = registry
            .build(creds)
            .map_err(|err| Error::BuildServiceError(err, creds.to_string()))?;

        service
            .test_connection()
            .await
            .map_err(|err| Error::AuthenticationError(err, creds.to_string()))
    }

    /// Same as [`ContactMover::try_authentication`], collapsing the
    /// error into `false`.
    pub async fn test_authentication(
        registry: &Registry<dyn ContactService>,
        creds: &Credentials,
    ) -> bool {
        match Self::try_authentication(registry, creds).await {
            Ok(()) => true,
            Err(err) => {
                debug!("contact authentication test failed for {creds}: {err}");
                debug!("{err:?}");
                false
            }
        }
    }
}

impl fmt::Debug for ContactMover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContactMover")
            .field("source", &self.source)
            .field("destination", &self.destination)
            .field("options", &self.options)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
