//! # Folder mapper
//!
//! Resolves where a source folder lands on the destination account.
//! Special folders (inbox, sent, trash…) are matched by role, other
//! folders keep their hierarchy below the nearest matched ancestor.

use tracing::debug;

use super::{Error, Folder, Folders, Result, SpecialUse};
use crate::{progress::ProgressReporter, provider::MailClient};

/// The delimiter assumed when the destination listing advertises
/// none.
pub const DEFAULT_DELIMITER: char = '/';

/// The folder mapper.
///
/// Holds the two folder listings taken at the beginning of a run.
/// Role lookups use those listings, path lookups ask the destination
/// client so that folders created during the run are found.
#[derive(Clone, Debug)]
pub struct FolderMapper<'a> {
    source_folders: &'a Folders,
    destination_folders: &'a Folders,
    namespace: Option<String>,
}

impl<'a> FolderMapper<'a> {
    pub fn new(source_folders: &'a Folders, destination_folders: &'a Folders) -> Self {
        Self {
            source_folders,
            destination_folders,
            namespace: None,
        }
    }

    /// Set the personal namespace prefix of the destination.
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace.filter(|ns| !ns.is_empty());
        self
    }

    /// Return the destination hierarchy delimiter.
    pub fn delimiter(&self) -> char {
        self.destination_folders
            .inbox()
            .and_then(|inbox| inbox.delimiter)
            .or_else(|| self.destination_folders.delimiter())
            .unwrap_or(DEFAULT_DELIMITER)
    }

    /// Replace the destination delimiter in a path segment.
    pub fn sanitize(&self, segment: &str) -> String {
        let delim = self.delimiter();
        let replace = if delim == '_' { '-' } else { '_' };
        segment.replace(delim, &replace.to_string())
    }

    /// Find the destination counterpart of the first role of the
    /// given source folder.
    fn match_special_folder(&self, folder: &Folder) -> Option<&'a Folder> {
        let role = folder.special_use()?;
        self.destination_folders.find_by_role(role)
    }

    fn source_parent(&self, folder: &Folder) -> Option<Folder> {
        let parent = folder.parent_path()?;
        let parent = self
            .source_folders
            .find(parent)
            .cloned()
            .unwrap_or_else(|| Folder::new(parent, folder.delimiter));
        Some(parent)
    }

    /// Compute the destination root used when no ancestor matches a
    /// special folder.
    fn default_root(&self) -> Option<String> {
        let inbox = self.destination_folders.inbox()?;

        match inbox.parent_path() {
            Some(parent) => Some(parent.to_owned()),
            None if self.namespace.is_some() => Some(inbox.path.clone()),
            None => None,
        }
    }

    /// Resolve the destination folder of the given source folder,
    /// creating and subscribing missing folders along the way.
    pub async fn resolve(
        &self,
        client: &mut dyn MailClient,
        folder: &Folder,
        reporter: &mut ProgressReporter,
    ) -> Result<Folder> {
        if folder.is_all_mail() {
            reporter
                .info(format!("Using {folder} to find archived messages."))
                .await;
            return self
                .destination_folders
                .find_by_role(SpecialUse::Archive)
                .cloned()
                .ok_or(Error::MissingSpecialFolderError(SpecialUse::Archive));
        }

        if let Some(special) = self.match_special_folder(folder) {
            debug!("source folder {folder} matches destination folder {special}");
            return Ok(special.clone());
        }

        let mut segments = vec![self.sanitize(folder.name())];
        let mut root = None;
        let mut current = folder.clone();

        while let Some(parent) = self.source_parent(&current) {
            if let Some(special) = self.match_special_folder(&parent) {
                debug!("source ancestor {parent} matches destination folder {special}");
                root = Some(special.path.clone());
                break;
            }

            let name = parent.name();
            if !name.is_empty() {
                segments.push(self.sanitize(name));
            }

            current = parent;
        }

        let root = root.or_else(|| self.default_root());
        let delim = self.delimiter();

        if segments.iter().all(String::is_empty) {
            return Err(Error::EmptyPathError(folder.path.clone()));
        }

        let mut path = root.unwrap_or_default();
        let mut resolved = None;

        for segment in segments.into_iter().rev().filter(|s| !s.is_empty()) {
            if !path.is_empty() {
                path.push(delim);
            }
            path.push_str(&segment);

            let existing = client
                .get_folder(&path)
                .await
                .map_err(|err| Error::GetFolderError(err, path.clone()))?;

            let dst = match existing {
                Some(dst) => dst,
                None => {
                    reporter.info(format!("Creating folder: {path}")).await;
                    let dst = client
                        .create_folder(&path)
                        .await
                        .map_err(|err| Error::CreateFolderError(err, path.clone()))?;
                    client
                        .subscribe_folder(&path)
                        .await
                        .map_err(|err| Error::SubscribeFolderError(err, path.clone()))?;
                    dst
                }
            };

            resolved = Some(dst);
        }

        resolved.ok_or(Error::EmptyPathError(folder.path.clone()))
    }
}
