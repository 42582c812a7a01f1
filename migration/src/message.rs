//! Module dedicated to messages.
//!
//! A [`Message`] is a fetched message: its raw RFC 5322 bytes plus
//! the metadata the transfer loop needs to deliver it again.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use mail_parser::MessageParser;

/// The unique identifier of a message within its folder.
pub type Uid = u32;

/// The fetched message.
#[derive(Clone, Eq, PartialEq)]
pub struct Message {
    pub uid: Uid,
    pub raw: Vec<u8>,

    /// The date the server received the message, restored on append.
    pub internal_date: Option<DateTime<FixedOffset>>,
}

impl Message {
    pub fn new(uid: Uid, raw: impl Into<Vec<u8>>) -> Self {
        Self {
            uid,
            raw: raw.into(),
            internal_date: None,
        }
    }

    pub fn with_internal_date(mut self, date: DateTime<FixedOffset>) -> Self {
        self.internal_date = Some(date);
        self
    }

    /// Extract the `Message-ID` header, without angle brackets.
    ///
    /// Returns `None` when the header is missing or empty, in which
    /// case the message cannot be deduplicated.
    pub fn message_id(&self) -> Option<String> {
        message_id(&self.raw)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("uid", &self.uid)
            .field("size", &self.raw.len())
            .field("internal_date", &self.internal_date)
            .finish()
    }
}

/// Extract the `Message-ID` header from raw message bytes.
pub fn message_id(raw: &[u8]) -> Option<String> {
    let msg = MessageParser::default().parse(raw)?;
    let id = msg.message_id()?.trim();

    if id.is_empty() {
        None
    } else {
        Some(id.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use mail_builder::MessageBuilder;

    use super::Message;

    #[test]
    fn message_id() {
        let raw = MessageBuilder::new()
            .message_id("a@localhost")
            .from("alice@localhost")
            .to("bob@localhost")
            .subject("subject")
            .text_body("body")
            .write_to_vec()
            .unwrap();

        let msg = Message::new(1, raw);
        assert_eq!(msg.message_id().as_deref(), Some("a@localhost"));
    }

    #[test]
    fn message_without_id() {
        let msg = Message::new(1, "From: alice@localhost\r\nSubject: no id\r\n\r\nbody\r\n");
        assert_eq!(msg.message_id(), None);
    }
}
