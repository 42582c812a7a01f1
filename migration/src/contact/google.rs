//! # Google contacts
//!
//! [`ContactService`] talking to the Google People API with an OAuth
//! 2.0 bearer token.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use super::{Contact, ContactService, COLLECTED_CATEGORY};
use crate::{account::Credentials, error::impl_any_error, AnyResult};

/// The base URL of the People API.
pub const DEFAULT_BASE_URL: &str = "https://people.googleapis.com/v1";

const PAGE_SIZE: &str = "1000";
const MAX_GROUP_MEMBERS: &str = "10000";

const PERSON_FIELDS: &[&str] = &[
    "addresses",
    "biographies",
    "birthdays",
    "calendarUrls",
    "emailAddresses",
    "events",
    "genders",
    "imClients",
    "locales",
    "memberships",
    "metadata",
    "names",
    "nicknames",
    "organizations",
    "phoneNumbers",
    "photos",
    "relations",
    "urls",
];

const OTHER_CONTACT_FIELDS: &[&str] = &[
    "emailAddresses",
    "metadata",
    "names",
    "phoneNumbers",
    "photos",
];

/// The global `Result` alias of the module.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors related to the Google contact service.
#[derive(Debug, Error)]
pub enum Error {
    #[error("google: missing OAuth token for {0}")]
    MissingOAuthTokenError(String),
    #[error("google: cannot build HTTP client")]
    BuildHttpClientError(#[source] reqwest::Error),
    #[error("google: cannot send request to {1}")]
    SendRequestError(#[source] reqwest::Error, String),
    #[error("google: request to {1} failed with status {0}: {2}")]
    ResponseStatusError(StatusCode, String, String),
    #[error("google: cannot parse response of {1}")]
    ParseResponseError(#[source] reqwest::Error, String),
}

impl_any_error!(Error);

/// The Google contact service.
pub struct GoogleContacts {
    base_url: String,
    token: String,
    client: Client,
}

impl GoogleContacts {
    pub fn new(creds: &Credentials) -> Result<Self> {
        let token = creds
            .oauth_token()
            .ok_or_else(|| Error::MissingOAuthTokenError(creds.to_string()))?;

        let client = Client::builder()
            .build()
            .map_err(Error::BuildHttpClientError)?;

        Ok(Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            token: token.to_owned(),
            client,
        })
    }

    pub fn with_base_url(mut self, base_url: impl ToString) -> Self {
        self.base_url = base_url.to_string().trim_end_matches('/').to_owned();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(&self, url: String, req: RequestBuilder) -> Result<T> {
        trace!("google: sending request to {url}");

        let res = req
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|err| Error::SendRequestError(err, url.clone()))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(Error::ResponseStatusError(status, url, body));
        }

        res.json()
            .await
            .map_err(|err| Error::ParseResponseError(err, url))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.url(path);
        let req = self.client.get(&url).query(query);
        self.send(url, req).await
    }

    /// Fetch every page of a paged listing.
    async fn get_pages<P: Page>(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<P::Item>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page: P = match page_token.as_deref() {
                Some(token) => {
                    let mut query = query.to_vec();
                    query.push(("pageToken", token));
                    self.get(path, &query).await?
                }
                None => self.get(path, query).await?,
            };
            let (page_items, next) = page.into_parts();
            items.extend(page_items);

            match next.filter(|token| !token.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(items)
    }

    async fn list_groups(&self) -> Result<Vec<ContactGroup>> {
        let groups = self
            .get_pages::<ContactGroupsPage>("contactGroups", &[("pageSize", PAGE_SIZE)])
            .await?;

        let mut detailed = Vec::new();

        for group in groups.into_iter().filter(|g| !g.is_system_all()) {
            let Some(resource_name) = group.resource_name.as_deref() else {
                continue;
            };

            let group: ContactGroup = self
                .get(resource_name, &[("maxMembers", MAX_GROUP_MEMBERS)])
                .await?;
            detailed.push(group);
        }

        Ok(detailed)
    }

    async fn search(&self, name: &str) -> Result<Vec<Person>> {
        let res: SearchResponse = self
            .get("people:searchContacts", &[("query", name), ("readMask", "names")])
            .await?;
        Ok(res.results.into_iter().filter_map(|r| r.person).collect())
    }
}

#[async_trait]
impl ContactService for GoogleContacts {
    async fn test_connection(&self) -> AnyResult<()> {
        let _: Person = self
            .get("people/me", &[("personFields", "names")])
            .await?;
        Ok(())
    }

    async fn list_contacts(&self) -> AnyResult<Vec<Contact>> {
        let fields = PERSON_FIELDS.join(",");
        let people = self
            .get_pages::<ConnectionsPage>(
                "people/me/connections",
                &[("personFields", fields.as_str()), ("pageSize", PAGE_SIZE)],
            )
            .await?;

        let mut seen = HashSet::new();
        let people = people
            .into_iter()
            .filter(|p| match &p.resource_name {
                Some(name) => seen.insert(name.clone()),
                None => true,
            })
            .collect::<Vec<_>>();
        debug!("google: found {} connections", people.len());

        let groups = self.list_groups().await?;

        let contacts = people
            .into_iter()
            .map(|person| {
                let categories = groups
                    .iter()
                    .filter(|g| match &person.resource_name {
                        Some(name) => g.member_resource_names.contains(name),
                        None => false,
                    })
                    .filter_map(ContactGroup::display_name)
                    .map(ToOwned::to_owned)
                    .collect();

                Contact {
                    categories,
                    ..Contact::from(person)
                }
            })
            .collect();

        Ok(contacts)
    }

    async fn list_collected_contacts(&self) -> AnyResult<Vec<Contact>> {
        let fields = OTHER_CONTACT_FIELDS.join(",");
        let people = self
            .get_pages::<OtherContactsPage>(
                "otherContacts",
                &[("readMask", fields.as_str()), ("pageSize", PAGE_SIZE)],
            )
            .await?;

        let mut seen = HashSet::new();
        let contacts = people
            .into_iter()
            .filter(|p| match &p.resource_name {
                Some(name) => seen.insert(name.clone()),
                None => true,
            })
            .map(|person| Contact::from(person).with_category(COLLECTED_CATEGORY))
            .collect();

        Ok(contacts)
    }

    async fn contact_exists(&self, contact: &Contact) -> AnyResult<bool> {
        let Some(name) = contact.display_name() else {
            return Ok(false);
        };

        let exists = self
            .search(name)
            .await?
            .iter()
            .filter_map(Person::display_name)
            .any(|found| found.eq_ignore_ascii_case(name));

        Ok(exists)
    }

    async fn upload_contact(&self, contact: &Contact) -> AnyResult<()> {
        let url = self.url("people:createContact");
        let req = self.client.post(&url).json(&Person::from(contact));
        let _: Person = self.send(url, req).await?;
        Ok(())
    }

    async fn delete_contact(&self, contact: &Contact) -> AnyResult<()> {
        let Some(name) = contact.display_name() else {
            return Ok(());
        };

        for person in self.search(name).await? {
            if !person
                .display_name()
                .is_some_and(|found| found.eq_ignore_ascii_case(name))
            {
                continue;
            }

            if let Some(resource_name) = person.resource_name.as_deref() {
                let url = self.url(&format!("{resource_name}:deleteContact"));
                let req = self.client.delete(&url);
                let _: serde_json::Value = self.send(url, req).await?;
            }
        }

        Ok(())
    }
}

/// A paged listing response.
trait Page: DeserializeOwned {
    type Item;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ConnectionsPage {
    connections: Vec<Person>,
    next_page_token: Option<String>,
}

impl Page for ConnectionsPage {
    type Item = Person;

    fn into_parts(self) -> (Vec<Person>, Option<String>) {
        (self.connections, self.next_page_token)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct OtherContactsPage {
    other_contacts: Vec<Person>,
    next_page_token: Option<String>,
}

impl Page for OtherContactsPage {
    type Item = Person;

    fn into_parts(self) -> (Vec<Person>, Option<String>) {
        (self.other_contacts, self.next_page_token)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ContactGroupsPage {
    contact_groups: Vec<ContactGroup>,
    next_page_token: Option<String>,
}

impl Page for ContactGroupsPage {
    type Item = ContactGroup;

    fn into_parts(self) -> (Vec<ContactGroup>, Option<String>) {
        (self.contact_groups, self.next_page_token)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ContactGroup {
    resource_name: Option<String>,
    name: Option<String>,
    formatted_name: Option<String>,
    group_type: Option<String>,
    member_resource_names: Vec<String>,
}

impl ContactGroup {
    fn is_system_all(&self) -> bool {
        self.name.as_deref() == Some("all")
            && self.group_type.as_deref() == Some("SYSTEM_CONTACT_GROUP")
    }

    fn display_name(&self) -> Option<&str> {
        self.formatted_name.as_deref().or(self.name.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResult {
    person: Option<Person>,
}

/// The People API person resource, restricted to the fields
/// mapped to [`Contact`].
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
struct Person {
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    names: Vec<Name>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    nicknames: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    email_addresses: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    phone_numbers: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    addresses: Vec<Address>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    organizations: Vec<Organization>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    birthdays: Vec<DateField>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    events: Vec<DateField>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    genders: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    im_clients: Vec<ImClient>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    locales: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    biographies: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    urls: Vec<Value>,
    #[serde(skip_serializing)]
    photos: Vec<Url>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    calendar_urls: Vec<Url>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    relations: Vec<Relation>,
    #[serde(skip_serializing)]
    metadata: Option<Metadata>,
}

impl Person {
    fn display_name(&self) -> Option<&str> {
        self.names.first()?.display_name.as_deref()
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
struct Name {
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    family_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    middle_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    honorific_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    honorific_suffix: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
struct Value {
    value: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    formatted_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    street_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    country: Option<String>,
}

impl Address {
    fn to_text(&self) -> Option<String> {
        if let Some(value) = self.formatted_value.as_deref() {
            return Some(value.to_owned());
        }

        let part = |p: &Option<String>| p.as_deref().unwrap_or_default().trim().to_owned();
        let region = format!("{} {}", part(&self.region), part(&self.postal_code));

        let text = [
            part(&self.street_address),
            part(&self.city),
            region.trim().to_owned(),
            part(&self.country),
        ]
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

        (!text.is_empty()).then_some(text)
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
struct Organization {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    job_description: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
struct DateField {
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<Date>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
struct Date {
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
}

impl Date {
    fn to_naive(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year?, self.month?, self.day?)
    }
}

impl From<NaiveDate> for Date {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: Some(date.year()),
            month: Some(date.month()),
            day: Some(date.day()),
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
struct ImClient {
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing)]
    formatted_protocol: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
struct Url {
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
struct Relation {
    person: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Metadata {
    sources: Vec<Source>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Source {
    update_time: Option<DateTime<Utc>>,
}

fn values(values: Vec<Value>) -> Vec<String> {
    values.into_iter().filter_map(|v| v.value).collect()
}

fn first_value(values: Vec<Value>) -> Option<String> {
    values.into_iter().find_map(|v| v.value)
}

fn to_values(values: &[String]) -> Vec<Value> {
    values
        .iter()
        .map(|v| Value {
            value: Some(v.clone()),
        })
        .collect()
}

fn to_value(value: &Option<String>) -> Vec<Value> {
    value.iter().map(|v| Value { value: Some(v.clone()) }).collect()
}

impl From<Person> for Contact {
    fn from(person: Person) -> Self {
        let name = person.names.into_iter().next().unwrap_or_default();
        let org = person.organizations.into_iter().next().unwrap_or_default();

        let mut emails = values(person.email_addresses);
        let mut seen = HashSet::new();
        emails.retain(|email| seen.insert(email.clone()));

        let anniversary = person
            .events
            .iter()
            .find(|e| e.kind.as_deref() == Some("anniversary"))
            .and_then(|e| e.date.as_ref()?.to_naive());

        let mut calendars = person.calendar_urls.into_iter().filter_map(|c| c.url);

        Contact {
            uid: person.resource_name,
            formatted_name: name.display_name,
            family_name: name.family_name,
            given_name: name.given_name,
            additional_names: name.middle_name,
            honorific_prefixes: name.honorific_prefix,
            honorific_suffixes: name.honorific_suffix,
            nickname: first_value(person.nicknames),
            emails,
            phones: values(person.phone_numbers),
            addresses: person.addresses.iter().filter_map(Address::to_text).collect(),
            organization: org.name,
            title: org.title,
            role: org.job_description,
            birthday: person
                .birthdays
                .iter()
                .find_map(|b| b.date.as_ref()?.to_naive()),
            anniversary,
            gender: first_value(person.genders),
            impp: person
                .im_clients
                .into_iter()
                .filter_map(|im| match (im.formatted_protocol, im.username) {
                    (Some(proto), Some(user)) => Some(format!("{proto}:{user}")),
                    (None, user) => user,
                    (Some(_), None) => None,
                })
                .collect(),
            language: first_value(person.locales),
            note: first_value(person.biographies),
            revision: person
                .metadata
                .and_then(|m| m.sources.into_iter().find_map(|s| s.update_time)),
            urls: values(person.urls),
            photo: person.photos.into_iter().find_map(|p| p.url),
            calendar_address_uri: calendars.next(),
            calendar_uri: calendars.next(),
            related: person
                .relations
                .into_iter()
                .filter_map(|r| r.person)
                .collect(),
            ..Contact::default()
        }
    }
}

impl From<&Contact> for Person {
    fn from(contact: &Contact) -> Self {
        let name = Name {
            display_name: contact.formatted_name.clone(),
            family_name: contact.family_name.clone(),
            given_name: contact.given_name.clone(),
            middle_name: contact.additional_names.clone(),
            honorific_prefix: contact.honorific_prefixes.clone(),
            honorific_suffix: contact.honorific_suffixes.clone(),
        };

        let mut organizations = Vec::new();
        if contact.organization.is_some() || contact.title.is_some() || contact.role.is_some() {
            organizations.push(Organization {
                name: contact.organization.clone(),
                title: contact.title.clone(),
                job_description: contact.role.clone(),
            });
        }

        let mut events = Vec::new();
        if let Some(date) = contact.anniversary {
            events.push(DateField {
                date: Some(date.into()),
                kind: Some(String::from("anniversary")),
            });
        }

        Person {
            names: vec![name],
            nicknames: to_value(&contact.nickname),
            email_addresses: to_values(&contact.emails),
            phone_numbers: to_values(&contact.phones),
            addresses: contact
                .addresses
                .iter()
                .map(|addr| Address {
                    formatted_value: Some(addr.clone()),
                    ..Address::default()
                })
                .collect(),
            organizations,
            birthdays: contact
                .birthday
                .map(|date| DateField {
                    date: Some(date.into()),
                    kind: None,
                })
                .into_iter()
                .collect(),
            events,
            genders: to_value(&contact.gender),
            im_clients: contact
                .impp
                .iter()
                .map(|im| ImClient {
                    username: Some(im.clone()),
                    formatted_protocol: None,
                })
                .collect(),
            locales: to_value(&contact.language),
            biographies: to_value(&contact.note),
            urls: to_values(&contact.urls),
            calendar_urls: [&contact.calendar_address_uri, &contact.calendar_uri]
                .into_iter()
                .flatten()
                .map(|url| Url {
                    url: Some(url.clone()),
                })
                .collect(),
            relations: contact
                .related
                .iter()
                .map(|person| Relation {
                    person: Some(person.clone()),
                })
                .collect(),
            ..Person::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::{ConnectionsPage, Error, GoogleContacts, Page, Person};
    use crate::{account::Credentials, contact::Contact};

    #[test]
    fn requires_oauth_token() {
        let creds = Credentials::new("people.googleapis.com", "bob@gmail.com", "passwd")
            .with_implementor("google");
        assert!(matches!(
            GoogleContacts::new(&creds),
            Err(Error::MissingOAuthTokenError(_))
        ));

        let creds = creds.with_oauth_token("ya29.token");
        assert!(GoogleContacts::new(&creds).is_ok());
    }

    #[test]
    fn person_to_contact() {
        let page: ConnectionsPage = serde_json::from_value(json!({
            "connections": [{
                "resourceName": "people/c1",
                "names": [{
                    "displayName": "Ada Lovelace",
                    "givenName": "Ada",
                    "familyName": "Lovelace"
                }],
                "emailAddresses": [
                    { "value": "ada@example.org" },
                    { "value": "ada@example.org" },
                    { "value": "ada@work.example.org" }
                ],
                "addresses": [
                    { "formattedValue": "12 St James's Square, London" },
                    { "streetAddress": "1 Main St", "city": "Springfield", "country": "USA" }
                ],
                "organizations": [{ "name": "Engines", "title": "Analyst" }],
                "birthdays": [{ "date": { "month": 12, "day": 10 } }, { "date": { "year": 1815, "month": 12, "day": 10 } }],
                "events": [{ "type": "anniversary", "date": { "year": 1835, "month": 7, "day": 8 } }],
                "imClients": [{ "username": "ada", "formattedProtocol": "XMPP" }],
                "calendarUrls": [{ "url": "https://cal/1" }, { "url": "https://cal/2" }],
                "metadata": { "sources": [{ "updateTime": "2024-03-01T08:30:00Z" }] }
            }],
            "nextPageToken": "next"
        }))
        .unwrap();

        let (people, next) = page.into_parts();
        assert_eq!(next.as_deref(), Some("next"));

        let contact = Contact::from(people.into_iter().next().unwrap());
        assert_eq!(contact.uid.as_deref(), Some("people/c1"));
        assert_eq!(contact.display_name(), Some("Ada Lovelace"));
        assert_eq!(contact.emails, vec!["ada@example.org", "ada@work.example.org"]);
        assert_eq!(
            contact.addresses,
            vec!["12 St James's Square, London", "1 Main St, Springfield, USA"]
        );
        assert_eq!(contact.organization.as_deref(), Some("Engines"));
        assert_eq!(contact.title.as_deref(), Some("Analyst"));
        assert_eq!(contact.birthday, NaiveDate::from_ymd_opt(1815, 12, 10));
        assert_eq!(contact.anniversary, NaiveDate::from_ymd_opt(1835, 7, 8));
        assert_eq!(contact.impp, vec!["XMPP:ada"]);
        assert_eq!(contact.calendar_address_uri.as_deref(), Some("https://cal/1"));
        assert_eq!(contact.calendar_uri.as_deref(), Some("https://cal/2"));
        assert!(contact.revision.is_some());
    }

    #[test]
    fn contact_to_person() {
        let contact = Contact {
            uid: Some("people/c1".into()),
            given_name: Some("Grace".into()),
            ..Contact::new("Grace Hopper").with_email("grace@example.org")
        };

        let json = serde_json::to_value(Person::from(&contact)).unwrap();
        assert_eq!(
            json,
            json!({
                "names": [{ "displayName": "Grace Hopper", "givenName": "Grace" }],
                "emailAddresses": [{ "value": "grace@example.org" }]
            })
        );
    }
}
