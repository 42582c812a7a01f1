//! # NextCloud contacts
//!
//! [`ContactService`] talking CardDAV to the default address book of
//! a NextCloud user, authenticated with HTTP Basic auth.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use quick_xml::{events::Event, Reader};
use reqwest::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    Client, Method, RequestBuilder, Response, StatusCode, Url,
};
use thiserror::Error;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use super::{vcard, Contact, ContactService};
use crate::{account::Credentials, error::impl_any_error, AnyResult};

const PROPFIND_RESOURCETYPE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop><d:resourcetype /></d:prop>
</d:propfind>"#;

const PROPFIND_GETETAG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop><d:getetag /></d:prop>
</d:propfind>"#;

/// The global `Result` alias of the module.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors related to the NextCloud contact service.
#[derive(Debug, Error)]
pub enum Error {
    #[error("nextcloud: missing password for {0}")]
    MissingPasswordError(String),
    #[error("nextcloud: cannot parse address book URL {1}")]
    ParseUrlError(#[source] url::ParseError, String),
    #[error("nextcloud: cannot build HTTP client")]
    BuildHttpClientError(#[source] reqwest::Error),
    #[error("nextcloud: cannot send {1} request to {2}")]
    SendRequestError(#[source] reqwest::Error, Method, Url),
    #[error("nextcloud: {1} request to {2} failed with status {0}")]
    ResponseStatusError(StatusCode, Method, Url),
    #[error("nextcloud: cannot read response of {1}")]
    ReadResponseError(#[source] reqwest::Error, Url),
    #[error("nextcloud: cannot parse multistatus response")]
    ParseMultistatusError(#[source] quick_xml::Error),
}

impl_any_error!(Error);

/// The NextCloud contact service.
pub struct NextCloudContacts {
    base_url: Url,
    auth: String,
    client: Client,
}

impl NextCloudContacts {
    pub fn new(creds: &Credentials) -> Result<Self> {
        if creds.password.trim().is_empty() {
            return Err(Error::MissingPasswordError(creds.to_string()));
        }

        let base_url = address_book_url(&creds.server, &creds.user)?;

        let auth = format!("{}:{}", creds.user, creds.password);
        let auth = format!("Basic {}", STANDARD.encode(auth));

        let client = Client::builder()
            .build()
            .map_err(Error::BuildHttpClientError)?;

        Ok(Self {
            base_url,
            auth,
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn contact_url(&self, contact: &Contact) -> Result<Url> {
        let filename = contact_filename(contact);
        self.base_url
            .join(&filename)
            .map_err(|err| Error::ParseUrlError(err, filename))
    }

    fn request(&self, method: Method, url: &Url) -> RequestBuilder {
        self.client
            .request(method, url.clone())
            .header(AUTHORIZATION, &self.auth)
    }

    async fn send(&self, method: Method, url: &Url, req: RequestBuilder) -> Result<Response> {
        trace!("nextcloud: sending {method} request to {url}");

        req.send()
            .await
            .map_err(|err| Error::SendRequestError(err, method, url.clone()))
    }

    async fn propfind(&self, url: &Url, depth: &str, body: &'static str) -> Result<Response> {
        let method = propfind();
        let req = self
            .request(method.clone(), url)
            .header("Depth", depth)
            .header(CONTENT_TYPE, "application/xml; charset=utf-8")
            .body(body);
        self.send(method, url, req).await
    }

    async fn get_contact(&self, url: &Url) -> Result<Contact> {
        let res = self
            .send(Method::GET, url, self.request(Method::GET, url))
            .await?;
        let res = check_status(res, Method::GET, url)?;
        let text = res
            .text()
            .await
            .map_err(|err| Error::ReadResponseError(err, url.clone()))?;

        match vcard::parse(&text) {
            Ok(contact) => Ok(contact),
            Err(err) => {
                warn!("nextcloud: cannot parse vCard at {url}, using an empty one: {err}");
                Ok(Contact::default())
            }
        }
    }
}

#[async_trait]
impl ContactService for NextCloudContacts {
    async fn test_connection(&self) -> AnyResult<()> {
        let res = self
            .propfind(&self.base_url, "0", PROPFIND_RESOURCETYPE)
            .await?;
        check_status(res, propfind(), &self.base_url)?;
        Ok(())
    }

    async fn list_contacts(&self) -> AnyResult<Vec<Contact>> {
        let res = self
            .propfind(&self.base_url, "1", PROPFIND_RESOURCETYPE)
            .await?;
        let res = check_status(res, propfind(), &self.base_url)?;
        let xml = res
            .text()
            .await
            .map_err(|err| Error::ReadResponseError(err, self.base_url.clone()))?;

        let hrefs = parse_vcard_hrefs(&xml)?;
        debug!("nextcloud: found {} vCards", hrefs.len());

        let mut contacts = Vec::with_capacity(hrefs.len());

        for href in hrefs {
            let url = self
                .base_url
                .join(&href)
                .map_err(|err| Error::ParseUrlError(err, href))?;
            contacts.push(self.get_contact(&url).await?);
        }

        Ok(contacts)
    }

    async fn contact_exists(&self, contact: &Contact) -> AnyResult<bool> {
        let url = self.contact_url(contact)?;
        let res = self.propfind(&url, "0", PROPFIND_GETETAG).await?;

        match res.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(Error::ResponseStatusError(status, propfind(), url).into()),
        }
    }

    async fn upload_contact(&self, contact: &Contact) -> AnyResult<()> {
        let url = self.contact_url(contact)?;
        let req = self
            .request(Method::PUT, &url)
            .header(CONTENT_TYPE, "text/vcard; charset=utf-8")
            .body(vcard::to_vcard(contact));
        let res = self.send(Method::PUT, &url, req).await?;
        check_status(res, Method::PUT, &url)?;
        Ok(())
    }

    async fn delete_contact(&self, contact: &Contact) -> AnyResult<()> {
        let url = self.contact_url(contact)?;
        let req = self.request(Method::DELETE, &url);
        let res = self.send(Method::DELETE, &url, req).await?;
        check_status(res, Method::DELETE, &url)?;
        Ok(())
    }
}

fn propfind() -> Method {
    // a valid token, see RFC 4918
    Method::from_bytes(b"PROPFIND").unwrap_or(Method::GET)
}

fn check_status(res: Response, method: Method, url: &Url) -> Result<Response> {
    let status = res.status();

    if status.is_success() {
        Ok(res)
    } else {
        Err(Error::ResponseStatusError(status, method, url.clone()))
    }
}

/// Build the URL of the default address book of the given user.
///
/// A server given without scheme is reached over HTTPS.
pub fn address_book_url(server: &str, user: &str) -> Result<Url> {
    let server = server.trim().trim_end_matches('/');
    let url = if server.starts_with("http://") || server.starts_with("https://") {
        format!("{server}/remote.php/dav/addressbooks/users/{user}/contacts/")
    } else {
        format!("https://{server}/remote.php/dav/addressbooks/users/{user}/contacts/")
    };

    Url::parse(&url).map_err(|err| Error::ParseUrlError(err, url))
}

/// Build the file name of the vCard of the given contact.
///
/// The name is taken from the first available of the formatted name,
/// the first email, the first phone number, the UID and a random
/// UUID. Characters not allowed in file names are replaced by `-`.
pub fn contact_filename(contact: &Contact) -> String {
    let non_blank = |v: &&String| !v.trim().is_empty();

    let id = contact
        .formatted_name
        .as_ref()
        .filter(non_blank)
        .or_else(|| contact.emails.iter().find(non_blank))
        .or_else(|| contact.phones.iter().find(non_blank))
        .or_else(|| contact.uid.as_ref().filter(non_blank))
        .cloned()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let id: String = id
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | '#' | '%' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();

    format!("{id}.vcf")
}

/// Extract the `href`s of the vCards listed in a WebDAV multistatus
/// response.
pub fn parse_vcard_hrefs(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut hrefs = Vec::new();
    let mut in_href = false;

    loop {
        match reader.read_event().map_err(Error::ParseMultistatusError)? {
            Event::Start(e) if e.local_name().as_ref() == b"href" => in_href = true,
            Event::End(e) if e.local_name().as_ref() == b"href" => in_href = false,
            Event::Text(t) if in_href => {
                let href = t
                    .unescape()
                    .map_err(|err| Error::ParseMultistatusError(err.into()))?;
                if href.to_ascii_lowercase().ends_with(".vcf") {
                    hrefs.push(href.into_owned());
                }
            }
            Event::Eof => break,
            _ => (),
        }
    }

    Ok(hrefs)
}

#[cfg(test)]
mod tests {
    use super::{address_book_url, contact_filename, parse_vcard_hrefs, Error, NextCloudContacts};
    use crate::{account::Credentials, contact::Contact};

    #[test]
    fn build_address_book_url() {
        let url = address_book_url("https://cloud.example.org/", "bob").unwrap();
        assert_eq!(
            url.as_str(),
            "https://cloud.example.org/remote.php/dav/addressbooks/users/bob/contacts/"
        );

        let url = address_book_url("cloud.example.org", "bob").unwrap();
        assert_eq!(url.scheme(), "https");
    }

    #[test]
    fn requires_password() {
        let creds = Credentials::new("cloud.example.org", "bob", "");
        assert!(matches!(
            NextCloudContacts::new(&creds),
            Err(Error::MissingPasswordError(_))
        ));

        let creds = Credentials::new("cloud.example.org", "bob", "passwd");
        let contacts = NextCloudContacts::new(&creds).unwrap();
        assert!(contacts.base_url().path().ends_with("/users/bob/contacts/"));
    }

    #[test]
    fn sanitize_filename() {
        let contact = Contact::new("AC/DC: \"Back\" <in> Black?");
        assert_eq!(contact_filename(&contact), "AC-DC- -Back- -in- Black-.vcf");

        let contact = Contact::new("  ").with_email("ada@example.org");
        assert_eq!(contact_filename(&contact), "ada@example.org.vcf");

        let contact = Contact {
            phones: vec!["+1 555 0100".into()],
            uid: Some("uid-1".into()),
            ..Contact::default()
        };
        assert_eq!(contact_filename(&contact), "+1 555 0100.vcf");

        let contact = Contact {
            uid: Some("people/c1".into()),
            ..Contact::default()
        };
        assert_eq!(contact_filename(&contact), "people-c1.vcf");

        let filename = contact_filename(&Contact::default());
        assert_eq!(filename.len(), 36 + 4);
    }

    #[test]
    fn parse_multistatus() {
        let xml = r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/remote.php/dav/addressbooks/users/bob/contacts/</d:href>
    <d:propstat><d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop></d:propstat>
  </d:response>
  <d:response>
    <d:href>/remote.php/dav/addressbooks/users/bob/contacts/Ada%20Lovelace.vcf</d:href>
  </d:response>
  <d:response>
    <d:href>/remote.php/dav/addressbooks/users/bob/contacts/grace.VCF</d:href>
  </d:response>
</d:multistatus>"#;

        let hrefs = parse_vcard_hrefs(xml).unwrap();
        assert_eq!(
            hrefs,
            vec![
                "/remote.php/dav/addressbooks/users/bob/contacts/Ada%20Lovelace.vcf",
                "/remote.php/dav/addressbooks/users/bob/contacts/grace.VCF",
            ]
        );
    }
}
