//! Module dedicated to message flags.
//!
//! Flags are read from the source copy of a message and written back
//! to the destination when the message is appended.

use std::{
    collections::BTreeSet,
    fmt,
    ops::{Deref, DerefMut},
    str::FromStr,
};

use thiserror::Error;
use tracing::debug;

use crate::error::impl_any_error;

/// Errors related to flags.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot parse flag {0}")]
    ParseFlagError(String),
}

impl_any_error!(Error);

/// The message flag.
///
/// A flag is like a tag that can be attached to a message. System
/// flags have their own variant, keywords are kept as
/// [`Flag::Custom`].
#[derive(Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum Flag {
    /// Flag used when the message has been opened.
    Seen,

    /// Flag used when the message has been answered.
    Answered,

    /// Flag used as a bookmark.
    Flagged,

    /// Flag used when the message is marked for deletion.
    Deleted,

    /// Flag used when the message is an incomplete draft.
    Draft,

    /// Server keywords and any other flag.
    Custom(String),
}

impl Flag {
    pub fn custom(flag: impl ToString) -> Self {
        Self::Custom(flag.to_string())
    }

    /// Build a flag from its IMAP representation (`\Seen`, `$Label`
    /// etc). System flags are matched case-insensitively.
    pub fn from_imap(flag: &str) -> Self {
        match flag.trim() {
            seen if seen.eq_ignore_ascii_case("\\seen") => Flag::Seen,
            answered if answered.eq_ignore_ascii_case("\\answered") => Flag::Answered,
            flagged if flagged.eq_ignore_ascii_case("\\flagged") => Flag::Flagged,
            deleted if deleted.eq_ignore_ascii_case("\\deleted") => Flag::Deleted,
            draft if draft.eq_ignore_ascii_case("\\draft") => Flag::Draft,
            keyword => Flag::Custom(keyword.to_owned()),
        }
    }

    /// Return the IMAP representation of the flag.
    pub fn to_imap(&self) -> String {
        match self {
            Flag::Seen => String::from("\\Seen"),
            Flag::Answered => String::from("\\Answered"),
            Flag::Flagged => String::from("\\Flagged"),
            Flag::Deleted => String::from("\\Deleted"),
            Flag::Draft => String::from("\\Draft"),
            Flag::Custom(flag) => flag.clone(),
        }
    }
}

/// Parse a flag from a string. If the string does not match any of
/// the system flags, it is considered as custom.
impl From<&str> for Flag {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(flag) => flag,
            Err(_) => Flag::Custom(s.trim().to_owned()),
        }
    }
}

/// Parse a system flag from a string, with or without its leading
/// backslash.
impl FromStr for Flag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.trim().trim_start_matches('\\') {
            seen if seen.eq_ignore_ascii_case("seen") => Ok(Flag::Seen),
            answered if answered.eq_ignore_ascii_case("answered") => Ok(Flag::Answered),
            flagged if flagged.eq_ignore_ascii_case("flagged") => Ok(Flag::Flagged),
            deleted if deleted.eq_ignore_ascii_case("deleted") => Ok(Flag::Deleted),
            draft if draft.eq_ignore_ascii_case("draft") => Ok(Flag::Draft),
            unknown => Err(Error::ParseFlagError(unknown.to_string())),
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flag::Seen => write!(f, "seen"),
            Flag::Answered => write!(f, "answered"),
            Flag::Flagged => write!(f, "flagged"),
            Flag::Deleted => write!(f, "deleted"),
            Flag::Draft => write!(f, "draft"),
            Flag::Custom(flag) => write!(f, "{flag}"),
        }
    }
}

/// The set of message flags.
///
/// Uses a [`BTreeSet`] so that flags are unique and always iterated
/// in the same order.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Ord, PartialOrd)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct Flags(BTreeSet<Flag>);

impl Flags {
    /// Build the flag set holding only [`Flag::Deleted`].
    pub fn deleted() -> Self {
        Self::from_iter([Flag::Deleted])
    }

    /// Build a flag set from IMAP flags.
    pub fn from_imap<'a>(flags: impl IntoIterator<Item = &'a str>) -> Self {
        flags.into_iter().map(Flag::from_imap).collect()
    }

    /// Return the IMAP representation of the flags, space-separated.
    pub fn to_imap_query_string(&self) -> String {
        self.iter()
            .map(Flag::to_imap)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, flag) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{flag}")?;
        }
        Ok(())
    }
}

impl Deref for Flags {
    type Target = BTreeSet<Flag>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Flags {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<&str> for Flags {
    fn from(s: &str) -> Self {
        s.split_whitespace().map(Flag::from).collect()
    }
}

impl FromStr for Flags {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Ok(Flags(
            s.split_whitespace()
                .map(|flag| {
                    flag.parse().map_err(|err| {
                        debug!("cannot parse flag {flag}: {err}");
                        err
                    })
                })
                .collect::<Result<_, _>>()?,
        ))
    }
}

impl FromIterator<Flag> for Flags {
    fn from_iter<T: IntoIterator<Item = Flag>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Flags {
    type Item = Flag;
    type IntoIter = std::collections::btree_set::IntoIter<Flag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::{Flag, Flags};

    #[test]
    fn imap_flags() {
        let flags = Flags::from_imap(["\\Seen", "\\FLAGGED", "$Forwarded"]);

        assert!(flags.contains(&Flag::Seen));
        assert!(flags.contains(&Flag::Flagged));
        assert!(flags.contains(&Flag::custom("$Forwarded")));
        assert_eq!(flags.to_imap_query_string(), "\\Seen \\Flagged $Forwarded");
    }

    #[test]
    fn parse_flags() {
        let flags: Flags = "seen \\Answered draft".parse().unwrap();
        assert_eq!(
            flags,
            Flags::from_iter([Flag::Seen, Flag::Answered, Flag::Draft])
        );

        assert!("seen $Label".parse::<Flags>().is_err());
        assert_eq!(
            Flags::from("seen $Label"),
            Flags::from_iter([Flag::Seen, Flag::custom("$Label")])
        );
    }
}
