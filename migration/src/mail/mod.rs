//! # Mail migration
//!
//! Module dedicated to mailbox migration. The main structure of this
//! module is [`MailMover`], which moves every folder and message of a
//! source account to a destination account.
//!
//! The per-folder work is done by [`transfer::FolderTransfer`].

mod error;
pub mod transfer;

use std::{fmt, future::Future, sync::Arc};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[doc(inline)]
pub use self::error::{Error, Result};
use self::transfer::FolderTransfer;
use crate::{
    account::Credentials,
    folder::{FolderMapper, Folders},
    progress::{ProgressReporter, Severity, StatusEvent, StatusEventHandler},
    provider::{FolderAccess, MailClient},
    registry::{Factory, Registry},
    stats::MigrationStats,
    AnyResult,
};

/// The behaviour flags of a migration run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case", default)
)]
pub struct MigrationOptions {
    /// Flag source messages as deleted once copied, then expunge the
    /// source folder.
    pub delete_source: bool,

    /// Only recreate the folder tree, do not copy messages.
    pub folders_only: bool,

    /// Count source messages before the transfer so that progress
    /// events carry a meaningful percentage.
    pub progress_updates: bool,

    /// Replace destination copies of migrated messages instead of
    /// skipping them.
    pub replace_existing: bool,
}

/// The outcome of a migration run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MigrationOutcome {
    /// Every folder has been processed.
    Completed(MigrationStats),

    /// The run has been cancelled. Statistics are given only if at
    /// least one folder has been completed.
    Cancelled(Option<MigrationStats>),

    /// The run has been aborted after a failed reconnection.
    Aborted(MigrationStats),
}

impl MigrationOutcome {
    pub fn stats(&self) -> Option<&MigrationStats> {
        match self {
            Self::Completed(stats) | Self::Aborted(stats) => Some(stats),
            Self::Cancelled(stats) => stats.as_ref(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

impl fmt::Display for MigrationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed(stats) => write!(f, "completed: {stats}"),
            Self::Cancelled(Some(stats)) => write!(f, "cancelled: {stats}"),
            Self::Cancelled(None) => write!(f, "cancelled"),
            Self::Aborted(stats) => write!(f, "aborted: {stats}"),
        }
    }
}

/// The mailbox mover.
///
/// Built from two sets of credentials resolved against a
/// [`Registry`]; unknown implementor tags are rejected at this point.
pub struct MailMover {
    source: Credentials,
    destination: Credentials,
    options: MigrationOptions,
    source_factory: Factory<dyn MailClient>,
    destination_factory: Factory<dyn MailClient>,
    handler: Option<Arc<StatusEventHandler>>,
    stats: MigrationStats,
}

impl MailMover {
    pub fn new(
        registry: &Registry<dyn MailClient>,
        source: Credentials,
        destination: Credentials,
        options: MigrationOptions,
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

    pub fn options(&self) -> &MigrationOptions {
        &self.options
    }

    /// Return the statistics of the last run.
    pub fn statistics(&self) -> MigrationStats {
        self.stats
    }

    /// Run the migration.
    ///
    /// Errors raised before the transfer phase (connection, folder
    /// listing) are returned as `Err`. Both ends are disconnected
    /// whatever the outcome.
    pub async fn execute(&mut self, cancel: &CancellationToken) -> Result<MigrationOutcome> {
        self.stats.reset();
        let mut reporter = ProgressReporter::new(self.handler.clone());

        let mut source = (self.source_factory)(&self.source)
            .map_err(|err| Error::BuildClientError(err, self.source.to_string()))?;
        let mut destination = (self.destination_factory)(&self.destination)
            .map_err(|err| Error::BuildClientError(err, self.destination.to_string()))?;

        let outcome = self
            .run(&mut *source, &mut *destination, cancel, &mut reporter)
            .await;

        disconnect(&mut *source, "source").await;
        disconnect(&mut *destination, "destination").await;

        if let Err(err) = &outcome {
            reporter
                .report(format!("Migration failed: {err}"), false, Severity::Error)
                .await;
        }

        outcome
    }

    async fn run(
        &mut self,
        source: &mut dyn MailClient,
        destination: &mut dyn MailClient,
        cancel: &CancellationToken,
        reporter: &mut ProgressReporter,
    ) -> Result<MigrationOutcome> {
        reporter
            .info(format!("Connecting to source: {}...", self.source.server))
            .await;
        source
            .connect()
            .await
            .map_err(|err| Error::ConnectSourceError(err, self.source.server.clone()))?;
        if cancel.is_cancelled() {
            return Ok(MigrationOutcome::Cancelled(None));
        }
        reporter.info("Connected to source server").await;

        let source_folders = source
            .list_folders()
            .await
            .map_err(Error::ListSourceFoldersError)?;
        reporter
            .info(format!(
                "Found {} folders on source server",
                source_folders.len()
            ))
            .await;

        if self.options.progress_updates {
            reporter.info("Counting messages...").await;
            count_messages(source, &source_folders, cancel, reporter).await;
            reporter
                .info(format!(
                    "Found {} messages on source server.",
                    reporter.total()
                ))
                .await;
        }

        if cancel.is_cancelled() {
            return Ok(MigrationOutcome::Cancelled(None));
        }

        reporter
            .info(format!(
                "Connecting to destination: {}...",
                self.destination.server
            ))
            .await;
        destination.connect().await.map_err(|err| {
            Error::ConnectDestinationError(err, self.destination.server.clone())
        })?;
        reporter.info("Connected to destination server").await;

        let destination_folders = destination
            .list_folders()
            .await
            .map_err(Error::ListDestinationFoldersError)?;

        let mapper = FolderMapper::new(&source_folders, &destination_folders)
            .with_namespace(destination.personal_namespace());

        let mut completed_folders = 0;

        for folder in source_folders.iter() {
            if cancel.is_cancelled() {
                return Ok(self.cancelled(completed_folders));
            }

            if folder.should_skip() {
                reporter
                    .info(format!("Skipping special folder {folder}."))
                    .await;
                continue;
            }

            let transfer = FolderTransfer::new(
                source,
                destination,
                &mapper,
                &self.options,
                &mut self.stats,
                reporter,
                cancel,
            );

            match transfer.run(folder).await {
                Ok(report) if report.cancelled => {
                    return Ok(self.cancelled(completed_folders));
                }
                Ok(_) => {
                    completed_folders += 1;
                }
                Err(err) if err.is_fatal() => {
                    warn!("aborting migration: {err}");
                    return Ok(MigrationOutcome::Aborted(self.stats));
                }
                Err(err) => {
                    reporter
                        .error(format!("Error processing folder '{folder}': {err}"))
                        .await;
                }
            }
        }

        reporter.info("Move complete.").await;
        Ok(MigrationOutcome::Completed(self.stats))
    }

    fn cancelled(&self, completed_folders: usize) -> MigrationOutcome {
        if completed_folders > 0 {
            MigrationOutcome::Cancelled(Some(self.stats))
        } else {
            MigrationOutcome::Cancelled(None)
        }
    }

    /// Connect and authenticate to the account described by the given
    /// credentials, then disconnect.
    pub async fn try_authentication(
        registry: &Registry<dyn MailClient>,
        creds: &Credentials,
    ) -> Result<()> {
        creds
            .validate()
            .map_err(Error::ValidateSourceCredentialsError)?;
        let mut client = registry
            .build(creds)
            .map_err(|err| Error::BuildClientError(err, creds.to_string()))?;

        client
            .connect()
            .await
            .map_err(|err| Error::AuthenticationError(err, creds.to_string()))?;
        disconnect(&mut *client, "authentication test").await;

        Ok(())
    }

    /// Same as [`MailMover::try_authentication`], collapsing the
    /// error into `false`.
    pub async fn test_authentication(
        registry: &Registry<dyn MailClient>,
        creds: &Credentials,
    ) -> bool {
        match Self::try_authentication(registry, creds).await {
            Ok(()) => true,
            Err(err) => {
                debug!("authentication test failed for {creds}: {err}");
                debug!("{err:?}");
                false
            }
        }
    }
}

impl fmt::Debug for MailMover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailMover")
            .field("source", &self.source)
            .field("destination", &self.destination)
            .field("options", &self.options)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Add the message count of every migrated folder to the reporter
/// total. Counting errors are reported and ignored.
async fn count_messages(
    client: &mut dyn MailClient,
    folders: &Folders,
    cancel: &CancellationToken,
    reporter: &mut ProgressReporter,
) {
    for folder in folders.iter() {
        if cancel.is_cancelled() {
            return;
        }

        if folder.should_skip() {
            continue;
        }

        match client.open_folder(&folder.path, FolderAccess::ReadOnly).await {
            Ok(count) => {
                reporter.add_to_total(count);
                if let Err(err) = client.close_folder().await {
                    debug!("cannot close source folder {folder}: {err}");
                }
                reporter
                    .info(format!(
                        "{} messages found - {count} discovered in {folder}",
                        reporter.total()
                    ))
                    .await;
            }
            Err(err) => {
                reporter
                    .error(format!(
                        "Error counting messages in source folder {folder}: {err}."
                    ))
                    .await;
            }
        }
    }
}

async fn disconnect(client: &mut dyn MailClient, side: &str) {
    if !client.is_connected() {
        return;
    }

    if let Err(err) = client.disconnect().await {
        debug!("cannot disconnect {side} client: {err}");
        debug!("{err:?}");
    }
}
