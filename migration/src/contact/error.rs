use std::result;

use thiserror::Error;

use crate::{account, error::impl_any_error, registry, AnyBoxedError};

/// The global `Result` alias of the module.
pub type Result<T> = result::Result<T, Error>;

/// Errors related to contact migration.
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
    #[error("cannot build contact service for {1}")]
    BuildServiceError(#[source] AnyBoxedError, String),
    #[error("cannot authenticate to contact service {1}")]
    AuthenticationError(#[source] AnyBoxedError, String),

    #[error("cannot list contacts of {1}")]
    ListContactsError(#[source] AnyBoxedError, String),
    #[error("cannot list collected contacts of {1}")]
    ListCollectedContactsError(#[source] AnyBoxedError, String),
    #[error("deleting contacts is not supported by {0}")]
    DeleteContactNotSupportedError(String),

    #[error("cannot parse vCard: missing BEGIN:VCARD")]
    ParseVCardMissingBeginError,
    #[error("cannot parse vCard: missing END:VCARD")]
    ParseVCardMissingEndError,
}

impl_any_error!(Error);
