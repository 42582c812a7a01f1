use std::sync::{Arc, Mutex};

use migration::{
    contact::{self, memory::MemoryContacts, ContactOptions, COLLECTED_CATEGORY},
    AnyResult, Contact, ContactMover, ContactService, Credentials, MigrationOutcome,
    MigrationStats, Registry, Severity, StatusEvent,
};
use tokio_util::sync::CancellationToken;

fn registry(source: &MemoryContacts, destination: &MemoryContacts) -> Registry<dyn ContactService> {
    let (source, destination) = (source.clone(), destination.clone());

    Registry::<dyn ContactService>::empty().with("memory", move |creds| {
        let book = if creds.server == "source" {
            &source
        } else {
            &destination
        };
        Ok(Box::new(book.client_for(creds)))
    })
}

fn creds(server: &str) -> Credentials {
    Credentials::new(server, "alice", "passwd").with_implementor("memory")
}

fn mover(
    source: &MemoryContacts,
    destination: &MemoryContacts,
    options: ContactOptions,
) -> ContactMover {
    ContactMover::new(
        &registry(source, destination),
        creds("source"),
        creds("destination"),
        options,
    )
    .unwrap()
}

#[test_log::test(tokio::test)]
async fn migrate_contacts() {
    let source = MemoryContacts::new();
    source
        .add_contact(Contact::new("Ada Lovelace").with_email("ada@example.org"))
        .await;
    source.add_contact(Contact::new("Grace Hopper")).await;
    source
        .add_contact(Contact::default().with_email("anonymous@example.org"))
        .await;
    source.add_contact(Contact::new("Linus Torvalds")).await;
    source.add_contact(Contact::new("Broken")).await;

    let destination = MemoryContacts::new();
    destination.add_contact(Contact::new("linus torvalds")).await;
    destination.fail_upload("Broken").await;

    let events = Arc::new(Mutex::new(Vec::<StatusEvent>::new()));
    let mut mover = mover(&source, &destination, Default::default()).with_handler({
        let events = events.clone();
        move |evt| {
            let events = events.clone();
            async move {
                events.lock().unwrap().push(evt);
                AnyResult::Ok(())
            }
        }
    });

    let outcome = mover.execute(&CancellationToken::new()).await.unwrap();
    let MigrationOutcome::Completed(stats) = outcome else {
        panic!("expected completed migration, got {outcome:?}");
    };

    assert_eq!(
        stats,
        MigrationStats {
            total: 5,
            successful: 2,
            skipped: 2,
            failed: 1,
        }
    );
    assert!(stats.is_balanced());
    assert_eq!(destination.upload_count().await, 3);

    let names: Vec<_> = destination
        .contacts()
        .await
        .into_iter()
        .filter_map(|c| c.formatted_name)
        .collect();
    assert_eq!(names, vec!["linus torvalds", "Ada Lovelace", "Grace Hopper"]);

    let ada = destination.contacts().await.remove(1);
    assert_eq!(ada.emails, vec!["ada@example.org"]);

    let events = events.lock().unwrap();
    assert!(events.iter().any(|evt| evt.message == "Found 5 contacts."));
    assert!(events.iter().any(|evt| {
        evt.severity == Severity::Warning
            && evt.message.starts_with("Failed to upload contact Broken: ")
    }));

    let last = events.last().unwrap();
    assert_eq!(last.message, "Transfer complete.");
    assert_eq!(last.percentage, 100);
}

#[test_log::test(tokio::test)]
async fn include_collected_contacts() {
    let source = MemoryContacts::new();
    source.add_contact(Contact::new("Ada Lovelace")).await;
    source
        .add_collected_contact(
            Contact::new("Charles Babbage").with_category(COLLECTED_CATEGORY),
        )
        .await;

    let destination = MemoryContacts::new();
    let mut mover = mover(&source, &destination, ContactOptions::default());
    let outcome = mover.execute(&CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.stats().map(|stats| stats.total), Some(1));

    let destination = MemoryContacts::new();
    let options = ContactOptions {
        include_collected: true,
    };
    let mut mover = self::mover(&source, &destination, options);
    let outcome = mover.execute(&CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.stats().map(|stats| stats.successful), Some(2));

    let babbage = destination
        .contacts()
        .await
        .into_iter()
        .find(|c| c.display_name() == Some("Charles Babbage"))
        .unwrap();
    assert_eq!(babbage.categories, vec![COLLECTED_CATEGORY]);
}

#[test_log::test(tokio::test)]
async fn cancel_before_transfer() {
    let source = MemoryContacts::new();
    source.add_contact(Contact::new("Ada Lovelace")).await;
    let destination = MemoryContacts::new();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut mover = mover(&source, &destination, Default::default());
    let outcome = mover.execute(&cancel).await.unwrap();

    assert_eq!(outcome, MigrationOutcome::Cancelled(None));
    assert_eq!(destination.upload_count().await, 0);
}

#[test_log::test(tokio::test)]
async fn list_failure() {
    let source = MemoryContacts::new().with_login("alice", "other");
    let destination = MemoryContacts::new();

    let mut mover = mover(&source, &destination, Default::default());
    let err = mover.execute(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, contact::Error::ListContactsError(_, server) if server == "source"));
}

#[test]
fn reject_unknown_implementor() {
    let book = MemoryContacts::new();
    let registry = registry(&book, &book);

    let err = ContactMover::new(
        &registry,
        creds("source"),
        creds("destination").with_implementor("exchange"),
        Default::default(),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        contact::Error::ResolveDestinationImplementorError(_)
    ));
}

#[test_log::test(tokio::test)]
async fn test_authentication() {
    let source = MemoryContacts::new().with_login("alice", "passwd");
    let registry = registry(&source, &MemoryContacts::new());

    assert!(ContactMover::test_authentication(&registry, &creds("source")).await);

    let wrong = Credentials::new("source", "alice", "wrong").with_implementor("memory");
    assert!(!ContactMover::test_authentication(&registry, &wrong).await);
}
