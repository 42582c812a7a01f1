use std::result;

use thiserror::Error;

use crate::{account, error::impl_any_error, folder, registry, AnyBoxedError};

/// The global `Result` alias of the module.
pub type Result<T> = result::Result<T, Error>;

/// Errors related to mailbox migration.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid source credentials")]
    ValidateSourceCredentialsError(#[source] account::Error),
    #[error("invalid destination credentials")]
    ValidateDestinationCredentialsError(#[source] account::Error),
    #[error("cannot resolve source implementor")]
    ResolveSourceImplementorError(#[source] registry::Error),
    #[error("cannot resolve destination implementor")]
    ResolveDestinationImplementorError(#[source] registry::Error),
    #[error("cannot build client for {1}")]
    BuildClientError(#[source] AnyBoxedError, String),

    #[error("cannot connect to source server {1}")]
    ConnectSourceError(#[source] AnyBoxedError, String),
    #[error("cannot connect to destination server {1}")]
    ConnectDestinationError(#[source] AnyBoxedError, String),
    #[error("cannot authenticate to {1}")]
    AuthenticationError(#[source] AnyBoxedError, String),
    #[error("cannot list source folders")]
    ListSourceFoldersError(#[source] AnyBoxedError),
    #[error("cannot list destination folders")]
    ListDestinationFoldersError(#[source] AnyBoxedError),

    #[error("cannot open source folder {1}")]
    OpenSourceFolderError(#[source] AnyBoxedError, String),
    #[error("cannot open destination folder {1}")]
    OpenDestinationFolderError(#[source] AnyBoxedError, String),
    #[error("cannot resolve destination folder of {1}")]
    MapFolderError(#[source] folder::Error, String),
    #[error("cannot search messages of source folder {1}")]
    SearchSourceFolderError(#[source] AnyBoxedError, String),

    #[error("cannot reconnect to source server")]
    ReconnectSourceError(#[source] AnyBoxedError),
    #[error("cannot reconnect to destination server")]
    ReconnectDestinationError(#[source] AnyBoxedError),
    #[error("cannot find folder {0} after reconnecting")]
    FindFolderAfterReconnectError(String),
}

impl Error {
    /// Return `true` if the error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ReconnectSourceError(_)
                | Self::ReconnectDestinationError(_)
                | Self::FindFolderAfterReconnectError(_)
        )
    }
}

impl_any_error!(Error);
