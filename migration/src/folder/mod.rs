//! # Folder module
//!
//! Module dedicated to folder (as known as mailbox) management.
//!
//! The main entities are [`FolderAttribute`], [`SpecialUse`],
//! [`Folder`] and [`Folders`]. The [`mapper`] module resolves where
//! a source folder lands on the destination account.

mod error;
pub mod mapper;

use std::{
    collections::BTreeSet,
    fmt,
    ops::{Deref, DerefMut},
    str::FromStr,
};

#[doc(inline)]
pub use self::{
    error::{Error, Result},
    mapper::FolderMapper,
};

pub const INBOX: &str = "INBOX";

/// Full paths skipped whatever their attributes.
pub const SKIPPED_PATHS: [&str; 2] = ["[Gmail]", "[Gmail]/Important"];

/// The folder attribute.
///
/// Attributes come from the server folder listing. They describe
/// both the structure of the folder (selectable, has children) and
/// its special use.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub enum FolderAttribute {
    NoSelect,
    NoInferiors,
    HasChildren,
    HasNoChildren,
    Inbox,
    All,
    Archive,
    Drafts,
    Flagged,
    Important,
    Junk,
    Sent,
    Trash,
    Custom(String),
}

impl FolderAttribute {
    pub fn custom(attr: impl ToString) -> Self {
        Self::Custom(attr.to_string())
    }
}

/// Parse an attribute from its IMAP representation. Legacy `XLIST`
/// names (`\AllMail`, `\Spam`, `\Starred`) are mapped to their
/// special-use equivalent.
impl FromStr for FolderAttribute {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let attr = s.trim();
        let name = attr.trim_start_matches('\\');

        if name.is_empty() {
            return Err(Error::ParseFolderAttributeError(s.to_owned()));
        }

        let attr = match name.to_ascii_lowercase().as_str() {
            "noselect" | "nonexistent" => Self::NoSelect,
            "noinferiors" => Self::NoInferiors,
            "haschildren" => Self::HasChildren,
            "hasnochildren" => Self::HasNoChildren,
            "inbox" => Self::Inbox,
            "all" | "allmail" => Self::All,
            "archive" => Self::Archive,
            "drafts" => Self::Drafts,
            "flagged" | "starred" => Self::Flagged,
            "important" => Self::Important,
            "junk" | "spam" => Self::Junk,
            "sent" => Self::Sent,
            "trash" => Self::Trash,
            _ => Self::Custom(attr.to_owned()),
        };

        Ok(attr)
    }
}

impl fmt::Display for FolderAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSelect => write!(f, "\\Noselect"),
            Self::NoInferiors => write!(f, "\\Noinferiors"),
            Self::HasChildren => write!(f, "\\HasChildren"),
            Self::HasNoChildren => write!(f, "\\HasNoChildren"),
            Self::Inbox => write!(f, "\\Inbox"),
            Self::All => write!(f, "\\All"),
            Self::Archive => write!(f, "\\Archive"),
            Self::Drafts => write!(f, "\\Drafts"),
            Self::Flagged => write!(f, "\\Flagged"),
            Self::Important => write!(f, "\\Important"),
            Self::Junk => write!(f, "\\Junk"),
            Self::Sent => write!(f, "\\Sent"),
            Self::Trash => write!(f, "\\Trash"),
            Self::Custom(attr) => write!(f, "{attr}"),
        }
    }
}

/// The set of folder attributes.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct FolderAttributes(BTreeSet<FolderAttribute>);

impl Deref for FolderAttributes {
    type Target = BTreeSet<FolderAttribute>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for FolderAttributes {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl FromIterator<FolderAttribute> for FolderAttributes {
    fn from_iter<T: IntoIterator<Item = FolderAttribute>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for FolderAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, attr) in self.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{attr}")?;
        }
        Ok(())
    }
}

/// The special-use role of a folder.
///
/// Roles are matched in the order of [`SpecialUse::ALL`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub enum SpecialUse {
    Inbox,
    All,
    Archive,
    Drafts,
    Flagged,
    Important,
    Junk,
    Sent,
    Trash,
}

impl SpecialUse {
    pub const ALL: [SpecialUse; 9] = [
        SpecialUse::Inbox,
        SpecialUse::All,
        SpecialUse::Archive,
        SpecialUse::Drafts,
        SpecialUse::Flagged,
        SpecialUse::Important,
        SpecialUse::Junk,
        SpecialUse::Sent,
        SpecialUse::Trash,
    ];

    /// Return the attribute advertising this role.
    pub fn attribute(&self) -> FolderAttribute {
        match self {
            Self::Inbox => FolderAttribute::Inbox,
            Self::All => FolderAttribute::All,
            Self::Archive => FolderAttribute::Archive,
            Self::Drafts => FolderAttribute::Drafts,
            Self::Flagged => FolderAttribute::Flagged,
            Self::Important => FolderAttribute::Important,
            Self::Junk => FolderAttribute::Junk,
            Self::Sent => FolderAttribute::Sent,
            Self::Trash => FolderAttribute::Trash,
        }
    }
}

impl fmt::Display for SpecialUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inbox => write!(f, "inbox"),
            Self::All => write!(f, "all-mail"),
            Self::Archive => write!(f, "archive"),
            Self::Drafts => write!(f, "drafts"),
            Self::Flagged => write!(f, "flagged"),
            Self::Important => write!(f, "important"),
            Self::Junk => write!(f, "junk"),
            Self::Sent => write!(f, "sent"),
            Self::Trash => write!(f, "trash"),
        }
    }
}

/// The folder structure.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Folder {
    /// The full hierarchical path of the folder.
    pub path: String,

    /// The hierarchy delimiter, `None` for flat namespaces.
    pub delimiter: Option<char>,

    pub attributes: FolderAttributes,
}

impl Folder {
    pub fn new(path: impl ToString, delimiter: Option<char>) -> Self {
        Self {
            path: path.to_string(),
            delimiter,
            attributes: FolderAttributes::default(),
        }
    }

    pub fn with_attribute(mut self, attr: FolderAttribute) -> Self {
        self.attributes.insert(attr);
        self
    }

    pub fn with_attributes(mut self, attrs: impl IntoIterator<Item = FolderAttribute>) -> Self {
        self.attributes.extend(attrs);
        self
    }

    pub fn has_attribute(&self, attr: &FolderAttribute) -> bool {
        self.attributes.contains(attr)
    }

    /// Return `true` if the folder advertises the given role.
    ///
    /// The inbox role is also given to the folder named `INBOX`,
    /// whatever its case.
    pub fn has_role(&self, role: SpecialUse) -> bool {
        self.has_attribute(&role.attribute())
            || (role == SpecialUse::Inbox && self.path.eq_ignore_ascii_case(INBOX))
    }

    /// Return the first role of the folder, following the order of
    /// [`SpecialUse::ALL`].
    pub fn special_use(&self) -> Option<SpecialUse> {
        SpecialUse::ALL.into_iter().find(|role| self.has_role(*role))
    }

    pub fn is_inbox(&self) -> bool {
        self.has_role(SpecialUse::Inbox)
    }

    pub fn is_all_mail(&self) -> bool {
        self.has_attribute(&FolderAttribute::All)
    }

    pub fn is_selectable(&self) -> bool {
        !self.has_attribute(&FolderAttribute::NoSelect)
    }

    /// Return the last segment of the path.
    pub fn name(&self) -> &str {
        match self.delimiter {
            Some(delim) => self.path.rsplit(delim).next().unwrap_or(&self.path),
            None => &self.path,
        }
    }

    /// Return the path of the parent folder, `None` at the top level.
    pub fn parent_path(&self) -> Option<&str> {
        let delim = self.delimiter?;
        let (parent, _) = self.path.rsplit_once(delim)?;
        if parent.is_empty() {
            None
        } else {
            Some(parent)
        }
    }

    /// Return `true` if the folder must not be migrated: flagged and
    /// important virtual folders, non-selectable containers and the
    /// Gmail root containers.
    pub fn should_skip(&self) -> bool {
        self.has_attribute(&FolderAttribute::Flagged)
            || self.has_attribute(&FolderAttribute::Important)
            || !self.is_selectable()
            || SKIPPED_PATHS.contains(&self.path.as_str())
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

/// The list of folders.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Folders(Vec<Folder>);

impl Folders {
    /// Find a folder by its full path.
    pub fn find(&self, path: &str) -> Option<&Folder> {
        self.iter().find(|folder| folder.path == path)
    }

    /// Find the first folder advertising the given role.
    pub fn find_by_role(&self, role: SpecialUse) -> Option<&Folder> {
        self.iter()
            .find(|folder| folder.has_attribute(&role.attribute()))
            .or_else(|| {
                if role == SpecialUse::Inbox {
                    self.iter().find(|folder| folder.is_inbox())
                } else {
                    None
                }
            })
    }

    pub fn inbox(&self) -> Option<&Folder> {
        self.find_by_role(SpecialUse::Inbox)
    }

    /// Return the hierarchy delimiter of the account, taken from the
    /// first folder advertising one.
    pub fn delimiter(&self) -> Option<char> {
        self.iter().find_map(|folder| folder.delimiter)
    }
}

impl Deref for Folders {
    type Target = Vec<Folder>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Folders {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl IntoIterator for Folders {
    type Item = Folder;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<Folder> for Folders {
    fn from_iter<T: IntoIterator<Item = Folder>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Folders> for Vec<Folder> {
    fn from(val: Folders) -> Self {
        val.0
    }
}

#[cfg(test)]
mod tests {
    use super::{Folder, FolderAttribute, Folders, SpecialUse};

    #[test]
    fn parse_attributes() {
        assert_eq!("\\Noselect".parse::<FolderAttribute>().unwrap(), FolderAttribute::NoSelect);
        assert_eq!("\\AllMail".parse::<FolderAttribute>().unwrap(), FolderAttribute::All);
        assert_eq!("\\Spam".parse::<FolderAttribute>().unwrap(), FolderAttribute::Junk);
        assert_eq!(
            "\\Custom".parse::<FolderAttribute>().unwrap(),
            FolderAttribute::custom("\\Custom")
        );
        assert!("\\".parse::<FolderAttribute>().is_err());
    }

    #[test]
    fn path_helpers() {
        let folder = Folder::new("A/B/C", Some('/'));
        assert_eq!(folder.name(), "C");
        assert_eq!(folder.parent_path(), Some("A/B"));

        let folder = Folder::new("A", Some('/'));
        assert_eq!(folder.name(), "A");
        assert_eq!(folder.parent_path(), None);

        let folder = Folder::new("A.B", None);
        assert_eq!(folder.name(), "A.B");
        assert_eq!(folder.parent_path(), None);
    }

    #[test]
    fn special_use_order() {
        let folder = Folder::new("Mixed", Some('/'))
            .with_attributes([FolderAttribute::Trash, FolderAttribute::Drafts]);
        assert_eq!(folder.special_use(), Some(SpecialUse::Drafts));

        let folder = Folder::new("inbox", Some('/'));
        assert_eq!(folder.special_use(), Some(SpecialUse::Inbox));
    }

    #[test]
    fn skip_policy() {
        let skipped = [
            Folder::new("Starred", Some('/')).with_attribute(FolderAttribute::Flagged),
            Folder::new("Important", Some('/')).with_attribute(FolderAttribute::Important),
            Folder::new("Container", Some('/')).with_attribute(FolderAttribute::NoSelect),
            Folder::new("[Gmail]", Some('/')),
            Folder::new("[Gmail]/Important", Some('/')),
        ];
        assert!(skipped.iter().all(Folder::should_skip));

        let kept = [
            Folder::new("INBOX", Some('/')),
            Folder::new("[Gmail]/Sent Mail", Some('/')).with_attribute(FolderAttribute::Sent),
            Folder::new("[Gmail]/All Mail", Some('/')).with_attribute(FolderAttribute::All),
        ];
        assert!(kept.iter().all(|f| !f.should_skip()));
    }

    #[test]
    fn find_by_role() {
        let folders = Folders::from_iter([
            Folder::new("INBOX", Some('/')),
            Folder::new("Sent Items", Some('/')).with_attribute(FolderAttribute::Sent),
        ]);

        assert_eq!(folders.inbox().map(|f| f.path.as_str()), Some("INBOX"));
        assert_eq!(
            folders.find_by_role(SpecialUse::Sent).map(|f| f.path.as_str()),
            Some("Sent Items")
        );
        assert!(folders.find_by_role(SpecialUse::Archive).is_none());
        assert_eq!(folders.delimiter(), Some('/'));
    }
}
