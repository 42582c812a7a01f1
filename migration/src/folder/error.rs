use std::result;

use thiserror::Error;

use super::SpecialUse;
use crate::{error::impl_any_error, AnyBoxedError};

/// The global `Result` alias of the module.
pub type Result<T> = result::Result<T, Error>;

/// Errors related to folders and folder mapping.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot parse folder attribute {0}")]
    ParseFolderAttributeError(String),

    #[error("cannot find destination {0} folder")]
    MissingSpecialFolderError(SpecialUse),
    #[error("cannot get destination folder {1}")]
    GetFolderError(#[source] AnyBoxedError, String),
    #[error("cannot create destination folder {1}")]
    CreateFolderError(#[source] AnyBoxedError, String),
    #[error("cannot subscribe to destination folder {1}")]
    SubscribeFolderError(#[source] AnyBoxedError, String),
    #[error("cannot map folder {0}: destination path is empty")]
    EmptyPathError(String),
}

impl_any_error!(Error);
