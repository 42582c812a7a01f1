//! # Folder transfer
//!
//! Module dedicated to the transfer of the messages of one source
//! folder. The main structure is [`FolderTransfer`], an explicit
//! state machine going through [`TransferState`]s.

use std::{
    collections::{HashSet, VecDeque},
    fmt,
};

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{Error, MigrationOptions, Result};
use crate::{
    flag::Flags,
    folder::{Folder, FolderMapper},
    message::Uid,
    progress::ProgressReporter,
    provider::{FolderAccess, MailClient, SearchQuery},
    stats::MigrationStats,
    AnyResult,
};

/// The access mode used to open source folders.
pub const SOURCE_ACCESS: FolderAccess = FolderAccess::ReadWrite;

/// The state of a folder transfer.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TransferState {
    Opened,
    Enumerating,
    Transferring,
    Expunging,
    Closed,
    Aborted,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opened => write!(f, "opened"),
            Self::Enumerating => write!(f, "enumerating"),
            Self::Transferring => write!(f, "transferring"),
            Self::Expunging => write!(f, "expunging"),
            Self::Closed => write!(f, "closed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// The outcome of a single candidate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Delivery {
    Appended,
    Duplicate,
}

/// The report of a folder transfer that reached [`TransferState::Closed`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TransferReport {
    /// The resolved destination folder, `None` for empty source
    /// folders.
    pub destination: Option<Folder>,

    /// The transfer stopped early because the run was cancelled.
    pub cancelled: bool,
}

/// The folder transfer.
pub struct FolderTransfer<'a, 'm> {
    pub(super) source: &'a mut dyn MailClient,
    pub(super) destination: &'a mut dyn MailClient,
    pub(super) mapper: &'a FolderMapper<'m>,
    pub(super) options: &'a MigrationOptions,
    pub(super) stats: &'a mut MigrationStats,
    pub(super) reporter: &'a mut ProgressReporter,
    pub(super) cancel: &'a CancellationToken,
    state: TransferState,
}

impl<'a, 'm> FolderTransfer<'a, 'm> {
    pub fn new(
        source: &'a mut dyn MailClient,
        destination: &'a mut dyn MailClient,
        mapper: &'a FolderMapper<'m>,
        options: &'a MigrationOptions,
        stats: &'a mut MigrationStats,
        reporter: &'a mut ProgressReporter,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            source,
            destination,
            mapper,
            options,
            stats,
            reporter,
            cancel,
            state: TransferState::Opened,
        }
    }

    fn set_state(&mut self, state: TransferState) {
        trace!("folder transfer: {} → {state}", self.state);
        self.state = state;
    }

    async fn close_source(&mut self) {
        if let Err(err) = self.source.close_folder().await {
            debug!("cannot close source folder: {err}");
        }
    }

    async fn close_destination(&mut self) {
        if let Err(err) = self.destination.close_folder().await {
            debug!("cannot close destination folder: {err}");
        }
    }

    /// Transfer the messages of the given source folder.
    pub async fn run(mut self, folder: &Folder) -> Result<TransferReport> {
        self.reporter
            .info(format!("Processing folder: {folder}"))
            .await;

        let count = self
            .source
            .open_folder(&folder.path, SOURCE_ACCESS)
            .await
            .map_err(|err| Error::OpenSourceFolderError(err, folder.path.clone()))?;
        self.set_state(TransferState::Opened);

        if count == 0 {
            let mut report = TransferReport::default();

            if self.options.folders_only {
                report.destination = Some(self.resolve(folder).await?);
            }

            self.reporter.info("Folder is empty, skipping").await;
            self.close_source().await;
            self.set_state(TransferState::Closed);
            return Ok(report);
        }

        self.reporter
            .info(format!("Contains {count} messages"))
            .await;

        let dst_folder = self.resolve(folder).await?;

        if self.options.folders_only {
            self.close_source().await;
            self.set_state(TransferState::Closed);
            return Ok(TransferReport {
                destination: Some(dst_folder),
                cancelled: false,
            });
        }

        let dst_count = match self
            .destination
            .open_folder(&dst_folder.path, FolderAccess::ReadWrite)
            .await
        {
            Ok(count) => count,
            Err(err) => {
                self.close_source().await;
                return Err(Error::OpenDestinationFolderError(err, dst_folder.path));
            }
        };

        let check_duplicates = dst_count > 0;

        self.set_state(TransferState::Enumerating);

        let query = if folder.is_all_mail() {
            SearchQuery::Archived
        } else {
            SearchQuery::All
        };

        let uids = match self.source.search(&query).await {
            Ok(uids) => uids,
            Err(err) => {
                self.close_destination().await;
                self.close_source().await;
                return Err(Error::SearchSourceFolderError(err, folder.path.clone()));
            }
        };

        debug!("{} candidates in source folder {folder}", uids.len());

        self.set_state(TransferState::Transferring);
        let cancelled = match self
            .transfer_all(folder, &dst_folder, uids, check_duplicates)
            .await
        {
            Ok(cancelled) => cancelled,
            Err(err) => {
                self.set_state(TransferState::Aborted);
                return Err(err);
            }
        };

        self.set_state(TransferState::Expunging);
        self.expunge().await;

        self.close_destination().await;
        self.close_source().await;
        self.set_state(TransferState::Closed);

        self.reporter
            .info(format!("Completed folder: {folder}"))
            .await;

        Ok(TransferReport {
            destination: Some(dst_folder),
            cancelled,
        })
    }

    async fn resolve(&mut self, folder: &Folder) -> Result<Folder> {
        match self
            .mapper
            .resolve(&mut *self.destination, folder, self.reporter)
            .await
        {
            Ok(dst) => Ok(dst),
            Err(err) => {
                self.close_source().await;
                Err(Error::MapFolderError(err, folder.path.clone()))
            }
        }
    }

    /// Process the candidates in reverse enumeration order. Returns
    /// `true` when the run was cancelled before the end.
    async fn transfer_all(
        &mut self,
        folder: &Folder,
        dst_folder: &Folder,
        uids: Vec<Uid>,
        check_duplicates: bool,
    ) -> Result<bool> {
        let mut queue: VecDeque<Uid> = uids.into_iter().rev().collect();
        let mut counted = HashSet::new();
        let mut retried = HashSet::new();

        while let Some(&uid) = queue.front() {
            if self.cancel.is_cancelled() {
                debug!("folder transfer cancelled, {} candidates left", queue.len());
                return Ok(true);
            }

            // a retried candidate is counted once
            if counted.insert(uid) {
                self.stats.total += 1;
            }

            let mut message_id = None;
            let res = self
                .transfer_one(uid, dst_folder, check_duplicates, &mut message_id)
                .await;

            match res {
                Ok(Delivery::Appended) => {
                    self.stats.successful += 1;
                }
                Ok(Delivery::Duplicate) => {
                    trace!("message {uid} already exists in destination, skipping it");
                    self.stats.skipped += 1;
                }
                Err(err) if self.source.is_connected() && self.destination.is_connected() => {
                    self.stats.failed += 1;
                    self.reporter
                        .warn(format!(
                            "Failed to migrate message with header {}: {err}",
                            message_id.as_deref().unwrap_or("<none>")
                        ))
                        .await;
                }
                Err(err) => {
                    debug!("connection lost while migrating message {uid}: {err}");
                    let first_drop = retried.insert(uid);

                    if !first_drop {
                        self.stats.failed += 1;
                        self.reporter
                            .warn(format!(
                                "Failed to migrate message with header {} after reconnecting: {err}",
                                message_id.as_deref().unwrap_or("<none>")
                            ))
                            .await;
                    }

                    if let Err(err) = self.reconnect(folder, dst_folder).await {
                        self.reporter
                            .error("Error while reconnecting. Aborting.")
                            .await;
                        return Err(err);
                    }

                    if first_drop {
                        // retry the same candidate
                        continue;
                    }
                }
            }

            queue.pop_front();
            let completed = self.reporter.advance();
            self.reporter
                .progress(format!("Migrated {completed} messages"))
                .await;
        }

        Ok(false)
    }

    async fn transfer_one(
        &mut self,
        uid: Uid,
        dst_folder: &Folder,
        check_duplicates: bool,
        message_id: &mut Option<String>,
    ) -> AnyResult<Delivery> {
        let msg = self.source.fetch_message(uid).await?;
        *message_id = msg.message_id();

        if let Some(id) = message_id.as_ref() {
            if check_duplicates || self.options.replace_existing {
                let matches = self
                    .destination
                    .search(&SearchQuery::MessageId(id.clone()))
                    .await?;

                if self.options.replace_existing {
                    if !matches.is_empty() {
                        debug!("replacing {} copies of message {id}", matches.len());
                        self.destination
                            .add_flags(&matches, &Flags::deleted())
                            .await?;
                    }
                } else if !matches.is_empty() {
                    return Ok(Delivery::Duplicate);
                }
            }
        }

        let flags = self.source.fetch_flags(uid).await?;
        self.destination
            .append_message(&dst_folder.path, &msg, &flags)
            .await?;

        if self.options.delete_source {
            self.source.add_flags(&[uid], &Flags::deleted()).await?;
        }

        Ok(Delivery::Appended)
    }

    /// Reconnect the dropped side(s) and reopen their folder with
    /// the same access mode.
    async fn reconnect(&mut self, folder: &Folder, dst_folder: &Folder) -> Result<()> {
        if !self.source.is_connected() {
            self.reporter
                .warn("Source is disconnected, reconnecting...")
                .await;
            reopen(&mut *self.source, &folder.path, SOURCE_ACCESS)
                .await
                .map_err(|err| match err {
                    Reopen::Connect(err) => Error::ReconnectSourceError(err),
                    Reopen::NotFound => Error::FindFolderAfterReconnectError(folder.path.clone()),
                })?;
            self.reporter.warn("Reconnected.").await;
        }

        if !self.destination.is_connected() {
            self.reporter
                .warn("Destination is disconnected, reconnecting...")
                .await;
            reopen(&mut *self.destination, &dst_folder.path, FolderAccess::ReadWrite)
                .await
                .map_err(|err| match err {
                    Reopen::Connect(err) => Error::ReconnectDestinationError(err),
                    Reopen::NotFound => {
                        Error::FindFolderAfterReconnectError(dst_folder.path.clone())
                    }
                })?;
            self.reporter.warn("Reconnected.").await;
        }

        Ok(())
    }

    async fn expunge(&mut self) {
        if self.options.delete_source {
            match self.source.expunge().await {
                Ok(()) => {
                    self.reporter
                        .info("Expunged deleted messages from source")
                        .await;
                }
                Err(err) => {
                    self.reporter
                        .warn(format!("Warning: Failed to expunge folder: {err}"))
                        .await;
                }
            }
        }

        if self.options.replace_existing {
            if let Err(err) = self.destination.expunge().await {
                self.reporter
                    .warn(format!("Warning: Failed to expunge folder: {err}"))
                    .await;
            }
        }
    }
}

enum Reopen {
    Connect(crate::AnyBoxedError),
    NotFound,
}

async fn reopen(
    client: &mut dyn MailClient,
    path: &str,
    access: FolderAccess,
) -> std::result::Result<(), Reopen> {
    client.connect().await.map_err(Reopen::Connect)?;

    let folder = client.get_folder(path).await.map_err(Reopen::Connect)?;
    if folder.is_none() {
        return Err(Reopen::NotFound);
    }

    client
        .open_folder(path, access)
        .await
        .map_err(Reopen::Connect)?;

    Ok(())
}
