//! # vCard
//!
//! Module dedicated to the vCard text format. Contacts are written as
//! vCard 4.0 (RFC 6350) and read back by a tolerant parser that also
//! accepts vCard 3.0 documents, bare LF line endings and grouped
//! properties.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

use super::{Contact, Error, Result};

/// The product identifier written when the contact does not carry
/// its own.
pub const DEFAULT_PRODID: &str = "-//Pimalaya//Contact Mover//EN";

const DATE_FMT: &str = "%Y%m%d";
const TIMESTAMP_FMT: &str = "%Y%m%dT%H%M%SZ";
const MAX_LINE_LEN: usize = 75;

/// Serialize the given contact as a vCard 4.0 document.
///
/// A missing UID is replaced by a random UUID, a missing formatted
/// name is built from the name components.
pub fn to_vcard(contact: &Contact) -> String {
    let mut card = VCardWriter::default();

    card.line("BEGIN:VCARD");
    card.line("VERSION:4.0");

    match non_blank(&contact.uid) {
        Some(uid) => card.prop("UID", uid),
        None => card.prop("UID", &Uuid::new_v4().to_string()),
    }

    let formatted_name = match non_blank(&contact.formatted_name) {
        Some(name) => name.to_owned(),
        None => {
            let name = format!(
                "{} {}",
                contact.given_name.as_deref().unwrap_or_default(),
                contact.family_name.as_deref().unwrap_or_default()
            );
            match name.trim() {
                "" => String::from("Unknown"),
                name => name.to_owned(),
            }
        }
    };
    card.prop("FN", &formatted_name);

    if non_blank(&contact.family_name).is_some() || non_blank(&contact.given_name).is_some() {
        let components = [
            &contact.family_name,
            &contact.given_name,
            &contact.additional_names,
            &contact.honorific_prefixes,
            &contact.honorific_suffixes,
        ]
        .into_iter()
        .map(|c| escape(c.as_deref().unwrap_or_default()))
        .collect::<Vec<_>>()
        .join(";");
        card.raw("N", &components);
    }

    card.opt("NICKNAME", &contact.nickname);
    card.list("EMAIL", &contact.emails);
    card.list("TEL", &contact.phones);

    for addr in contact.addresses.iter().filter(|a| !a.trim().is_empty()) {
        card.raw("ADR", &format!(";;{};;;;", escape(addr)));
    }

    card.opt("ORG", &contact.organization);
    card.opt("TITLE", &contact.title);
    card.opt("ROLE", &contact.role);

    if let Some(date) = contact.birthday {
        card.raw("BDAY", &date.format(DATE_FMT).to_string());
    }

    if let Some(date) = contact.anniversary {
        card.raw("ANNIVERSARY", &date.format(DATE_FMT).to_string());
    }

    card.opt("GENDER", &contact.gender);
    card.list("IMPP", &contact.impp);
    card.opt("LANG", &contact.language);
    card.opt("TZ", &contact.time_zone);
    card.opt("GEO", &contact.geo);

    if !contact.categories.is_empty() {
        let categories = contact
            .categories
            .iter()
            .map(|c| escape(c))
            .collect::<Vec<_>>()
            .join(",");
        card.raw("CATEGORIES", &categories);
    }

    card.opt("NOTE", &contact.note);
    card.prop(
        "PRODID",
        non_blank(&contact.product_id).unwrap_or(DEFAULT_PRODID),
    );

    let rev = contact.revision.unwrap_or_else(Utc::now);
    card.raw("REV", &rev.format(TIMESTAMP_FMT).to_string());

    card.list("URL", &contact.urls);
    card.opt("KEY", &contact.key);
    card.opt("PHOTO;MEDIATYPE=image/jpeg", &contact.photo);
    card.opt("LOGO", &contact.logo);
    card.opt("SOUND", &contact.sound);
    card.opt("CALADRURI", &contact.calendar_address_uri);
    card.opt("CALURI", &contact.calendar_uri);
    card.opt("FBURL", &contact.free_busy_url);
    card.list("RELATED", &contact.related);

    card.line("END:VCARD");
    card.0
}

/// Parse the first vCard of the given document.
///
/// Unknown properties are ignored, so are values that cannot be
/// interpreted (for example partial dates).
pub fn parse(vcard: &str) -> Result<Contact> {
    let lines = unfold(vcard);
    let mut lines = lines.iter().map(String::as_str);

    lines
        .by_ref()
        .find(|line| line.eq_ignore_ascii_case("BEGIN:VCARD"))
        .ok_or(Error::ParseVCardMissingBeginError)?;

    let mut contact = Contact::default();
    let mut ended = false;

    for line in lines {
        if line.eq_ignore_ascii_case("END:VCARD") {
            ended = true;
            break;
        }

        let Some((name, params, value)) = split_content_line(line) else {
            continue;
        };

        match name.as_str() {
            "UID" => contact.uid = Some(unescape(value)),
            "FN" => contact.formatted_name = Some(unescape(value)),
            "N" => {
                let mut components = split_unescaped(value, ';').into_iter().map(|c| {
                    let c = unescape(c);
                    (!c.is_empty()).then_some(c)
                });
                contact.family_name = components.next().flatten();
                contact.given_name = components.next().flatten();
                contact.additional_names = components.next().flatten();
                contact.honorific_prefixes = components.next().flatten();
                contact.honorific_suffixes = components.next().flatten();
            }
            "NICKNAME" => contact.nickname = Some(unescape(value)),
            "EMAIL" => contact.emails.push(unescape(value)),
            "TEL" => contact.phones.push(unescape(value)),
            "ADR" => {
                let addr = split_unescaped(value, ';')
                    .into_iter()
                    .map(unescape)
                    .filter(|c| !c.trim().is_empty())
                    .collect::<Vec<_>>()
                    .join(", ");
                if !addr.is_empty() {
                    contact.addresses.push(addr);
                }
            }
            "ORG" => {
                let org = split_unescaped(value, ';')
                    .into_iter()
                    .next()
                    .map(unescape)
                    .unwrap_or_default();
                contact.organization = Some(org);
            }
            "TITLE" => contact.title = Some(unescape(value)),
            "ROLE" => contact.role = Some(unescape(value)),
            "BDAY" => contact.birthday = parse_date(value),
            "ANNIVERSARY" => contact.anniversary = parse_date(value),
            "GENDER" => contact.gender = Some(unescape(value)),
            "IMPP" => contact.impp.push(unescape(value)),
            "LANG" => contact.language = Some(unescape(value)),
            "TZ" => contact.time_zone = Some(unescape(value)),
            "GEO" => contact.geo = Some(unescape(value)),
            "CATEGORIES" => contact.categories.extend(
                split_unescaped(value, ',')
                    .into_iter()
                    .map(unescape)
                    .filter(|c| !c.trim().is_empty()),
            ),
            "NOTE" => contact.note = Some(unescape(value)),
            "PRODID" => contact.product_id = Some(unescape(value)),
            "REV" => contact.revision = parse_timestamp(value),
            "URL" => contact.urls.push(unescape(value)),
            "KEY" => contact.key = Some(unescape(value)),
            "PHOTO" => contact.photo = Some(media_value(&params, value)),
            "LOGO" => contact.logo = Some(media_value(&params, value)),
            "SOUND" => contact.sound = Some(media_value(&params, value)),
            "CALADRURI" => contact.calendar_address_uri = Some(unescape(value)),
            "CALURI" => contact.calendar_uri = Some(unescape(value)),
            "FBURL" => contact.free_busy_url = Some(unescape(value)),
            "RELATED" => contact.related.push(unescape(value)),
            _ => (),
        }
    }

    if !ended {
        return Err(Error::ParseVCardMissingEndError);
    }

    Ok(contact)
}

/// Escape a property value.
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());

    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => (),
            ',' => escaped.push_str("\\,"),
            ';' => escaped.push_str("\\;"),
            c => escaped.push(c),
        }
    }

    escaped
}

/// Reverse [`escape`]. Unknown escape sequences are kept verbatim.
pub fn unescape(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }

        match chars.next() {
            Some('n' | 'N') => unescaped.push('\n'),
            Some(c @ ('\\' | ',' | ';' | ':')) => unescaped.push(c),
            Some(c) => {
                unescaped.push('\\');
                unescaped.push(c);
            }
            None => unescaped.push('\\'),
        }
    }

    unescaped
}

#[derive(Default)]
struct VCardWriter(String);

impl VCardWriter {
    /// Write a content line, folding it at 75 octets.
    fn line(&mut self, line: &str) {
        let mut len = 0;

        for c in line.chars() {
            // continuation lines start with a space
            if len + c.len_utf8() > MAX_LINE_LEN {
                self.0.push_str("\r\n ");
                len = 1;
            }
            self.0.push(c);
            len += c.len_utf8();
        }

        self.0.push_str("\r\n");
    }

    fn raw(&mut self, name: &str, value: &str) {
        self.line(&format!("{name}:{value}"));
    }

    fn prop(&mut self, name: &str, value: &str) {
        self.raw(name, &escape(value));
    }

    fn opt(&mut self, name: &str, value: &Option<String>) {
        if let Some(value) = non_blank(value) {
            self.prop(name, value);
        }
    }

    fn list(&mut self, name: &str, values: &[String]) {
        for value in values.iter().filter(|v| !v.trim().is_empty()) {
            self.prop(name, value);
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn unfold(vcard: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();

    for line in vcard.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if let Some(continuation) = line.strip_prefix([' ', '\t']) {
            if let Some(last) = lines.last_mut() {
                last.push_str(continuation);
                continue;
            }
        }

        if !line.trim().is_empty() {
            lines.push(line.to_owned());
        }
    }

    lines
}

/// Split a content line into its upper-cased property name (group
/// prefix removed), its parameters and its raw value.
fn split_content_line(line: &str) -> Option<(String, Vec<String>, &str)> {
    let mut in_quotes = false;
    let colon = line.char_indices().find_map(|(i, c)| match c {
        '"' => {
            in_quotes = !in_quotes;
            None
        }
        ':' if !in_quotes => Some(i),
        _ => None,
    })?;

    let (head, value) = (&line[..colon], &line[colon + 1..]);
    let mut head = head.split(';');
    let name = head.next()?;
    let name = name.rsplit('.').next().unwrap_or(name).to_ascii_uppercase();
    let params = head.map(|p| p.to_ascii_uppercase()).collect();

    Some((name, params, value))
}

fn split_unescaped(value: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;

    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            c if c == sep => {
                parts.push(&value[start..i]);
                start = i + c.len_utf8();
            }
            _ => (),
        }
    }

    parts.push(&value[start..]);
    parts
}

/// Inline vCard 3.0 binary values are turned into data URIs.
fn media_value(params: &[String], value: &str) -> String {
    let inline = params
        .iter()
        .any(|p| p == "ENCODING=B" || p == "ENCODING=BASE64");

    if !inline {
        return unescape(value);
    }

    let mime = params
        .iter()
        .find_map(|p| p.strip_prefix("TYPE="))
        .map(|t| format!("image/{}", t.to_ascii_lowercase()))
        .unwrap_or_else(|| String::from("application/octet-stream"));

    format!("data:{mime};base64,{value}")
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let date = value.split('T').next().unwrap_or(value);

    NaiveDate::parse_from_str(date, DATE_FMT)
        .or_else(|_| NaiveDate::parse_from_str(date, "%Y-%m-%d"))
        .ok()
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    NaiveDateTime::parse_from_str(value, TIMESTAMP_FMT)
        .map(|dt| dt.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        })
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{escape, parse, to_vcard, unescape, DEFAULT_PRODID};
    use crate::contact::{Contact, Error};

    fn contact() -> Contact {
        Contact {
            uid: Some("people/c42".into()),
            formatted_name: Some("Ada Lovelace".into()),
            given_name: Some("Ada".into()),
            family_name: Some("Lovelace".into()),
            honorific_prefixes: Some("Countess".into()),
            emails: vec!["ada@example.org".into(), " ".into()],
            phones: vec!["+44 20 7946 0000".into()],
            addresses: vec!["12 St James's Square, London".into()],
            organization: Some("Analytical Engine; Ltd".into()),
            birthday: NaiveDate::from_ymd_opt(1815, 12, 10),
            categories: vec!["Friends".into(), "Math, Logic".into()],
            note: Some("First line\nsecond line".into()),
            revision: Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap()),
            photo: Some("https://example.org/ada.jpg".into()),
            ..Contact::default()
        }
    }

    #[test]
    fn write_vcard() {
        let vcard = to_vcard(&contact());

        assert!(vcard.starts_with("BEGIN:VCARD\r\nVERSION:4.0\r\nUID:people/c42\r\n"));
        assert!(vcard.ends_with("END:VCARD\r\n"));
        assert!(vcard.contains("FN:Ada Lovelace\r\n"));
        assert!(vcard.contains("N:Lovelace;Ada;;Countess;\r\n"));
        assert!(vcard.contains("EMAIL:ada@example.org\r\n"));
        assert_eq!(vcard.matches("EMAIL:").count(), 1);
        assert!(vcard.contains("ADR:;;12 St James's Square\\, London;;;;\r\n"));
        assert!(vcard.contains("ORG:Analytical Engine\\; Ltd\r\n"));
        assert!(vcard.contains("BDAY:18151210\r\n"));
        assert!(vcard.contains("CATEGORIES:Friends,Math\\, Logic\r\n"));
        assert!(vcard.contains("NOTE:First line\\nsecond line\r\n"));
        assert!(vcard.contains(&format!("PRODID:{DEFAULT_PRODID}\r\n")));
        assert!(vcard.contains("REV:20240301T083000Z\r\n"));
        assert!(vcard.contains("PHOTO;MEDIATYPE=image/jpeg:https://example.org/ada.jpg\r\n"));
    }

    #[test]
    fn write_vcard_defaults() {
        let vcard = to_vcard(&Contact {
            given_name: Some("Grace".into()),
            ..Contact::default()
        });
        assert!(vcard.contains("FN:Grace\r\n"));
        assert!(vcard.contains("UID:"));
        assert!(vcard.contains("REV:"));

        let vcard = to_vcard(&Contact::default());
        assert!(vcard.contains("FN:Unknown\r\n"));
        assert!(!vcard.contains("\r\nN:"));
    }

    #[test]
    fn read_written_vcard() {
        let expected = contact();
        let parsed = parse(&to_vcard(&expected)).unwrap();

        assert_eq!(parsed.uid, expected.uid);
        assert_eq!(parsed.formatted_name, expected.formatted_name);
        assert_eq!(parsed.family_name, expected.family_name);
        assert_eq!(parsed.honorific_prefixes, expected.honorific_prefixes);
        assert_eq!(parsed.additional_names, None);
        assert_eq!(parsed.emails, vec!["ada@example.org"]);
        assert_eq!(parsed.addresses, expected.addresses);
        assert_eq!(parsed.organization.as_deref(), Some("Analytical Engine; Ltd"));
        assert_eq!(parsed.birthday, expected.birthday);
        assert_eq!(parsed.categories, expected.categories);
        assert_eq!(parsed.note, expected.note);
        assert_eq!(parsed.revision, expected.revision);
        assert_eq!(parsed.product_id.as_deref(), Some(DEFAULT_PRODID));
        assert_eq!(parsed.photo, expected.photo);
    }

    #[test]
    fn fold_long_lines() {
        let note = "x".repeat(200);
        let vcard = to_vcard(&Contact {
            formatted_name: Some("Long".into()),
            note: Some(note.clone()),
            ..Contact::default()
        });

        assert!(vcard.split("\r\n").all(|line| line.len() <= 75));
        assert_eq!(parse(&vcard).unwrap().note, Some(note));
    }

    #[test]
    fn read_vcard3() {
        let vcard = concat!(
            "BEGIN:VCARD\n",
            "VERSION:3.0\n",
            "FN:Linus\n",
            " Torvalds\n",
            "N:Torvalds;Linus;;;\n",
            "item1.EMAIL;TYPE=INTERNET:linus@example.org\n",
            "TEL;TYPE=CELL:+1 555 0100\n",
            "ADR;TYPE=HOME:;;1 Penguin Way;Portland;OR;97201;USA\n",
            "BDAY:1969-12-28\n",
            "PHOTO;ENCODING=b;TYPE=JPEG:AAAA\n",
            "X-CUSTOM:ignored\n",
            "END:VCARD\n",
        );

        let contact = parse(vcard).unwrap();
        assert_eq!(contact.formatted_name.as_deref(), Some("LinusTorvalds"));
        assert_eq!(contact.given_name.as_deref(), Some("Linus"));
        assert_eq!(contact.emails, vec!["linus@example.org"]);
        assert_eq!(contact.phones, vec!["+1 555 0100"]);
        assert_eq!(
            contact.addresses,
            vec!["1 Penguin Way, Portland, OR, 97201, USA"]
        );
        assert_eq!(contact.birthday, NaiveDate::from_ymd_opt(1969, 12, 28));
        assert_eq!(contact.photo.as_deref(), Some("data:image/jpeg;base64,AAAA"));
    }

    #[test]
    fn read_invalid_vcard() {
        assert!(matches!(
            parse("FN:nobody\r\n"),
            Err(Error::ParseVCardMissingBeginError)
        ));
        assert!(matches!(
            parse("BEGIN:VCARD\r\nFN:nobody\r\n"),
            Err(Error::ParseVCardMissingEndError)
        ));
    }

    #[test]
    fn escaping() {
        let value = "a\\b, c; d\r\ne";
        assert_eq!(escape(value), "a\\\\b\\, c\\; d\\ne");
        assert_eq!(unescape(&escape(value)), "a\\b, c; d\ne");
        assert_eq!(unescape("\\x"), "\\x");
    }
}
