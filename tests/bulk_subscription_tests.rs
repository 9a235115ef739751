mod common;

use common::Harness;
use serde_json::json;
use subcast::actions::{
    self, BulkAddResult, RemovalOutcome, STREAM_ASSIGNMENT_COLORS, SubscriptionProperty,
};
use subcast::db::queries;
use subcast::db::{AuditEventType, DbRealm, DbRealmAuditLog, DbStream, DbUser, UnitOfWork};
use subcast::error::SubcastError;
use subcast_schema::{
    Event, QueuedEvent, RealmUserEvent, StreamEvent, SubscriptionEvent, UserRole,
};

async fn add(h: &Harness, realm: &DbRealm, streams: &[DbStream], users: &[DbUser]) -> BulkAddResult {
    let mut uow = UnitOfWork::begin(&h.pool).await.expect("begin");
    let result = actions::bulk_add_subscriptions(&mut uow, &h.dispatcher, realm, streams, users, None)
        .await
        .expect("bulk add");
    uow.commit().await.expect("commit");
    result
}

async fn remove(
    h: &Harness,
    realm: &DbRealm,
    users: &[DbUser],
    streams: &[DbStream],
) -> RemovalOutcome {
    let mut uow = UnitOfWork::begin(&h.pool).await.expect("begin");
    let outcome =
        actions::bulk_remove_subscriptions(&mut uow, &h.dispatcher, realm, users, streams, None)
            .await
            .expect("bulk remove");
    uow.commit().await.expect("commit");
    outcome
}

async fn audit(h: &Harness, realm: &DbRealm) -> Vec<DbRealmAuditLog> {
    h.db.audit_log(realm.id).await.expect("audit log")
}

fn peer_adds(events: &[QueuedEvent]) -> Vec<(Vec<i64>, Vec<i64>)> {
    events
        .iter()
        .filter_map(|queued| match &queued.event {
            Event::Subscription(SubscriptionEvent::PeerAdd {
                stream_ids,
                user_ids,
            }) => Some((stream_ids.clone(), user_ids.clone())),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn re_adding_active_pairs_is_a_no_op() {
    let h = Harness::new("readd").await;
    let realm = h.realm("zulip", true).await;
    let user = h.user(&realm, "hamlet", UserRole::Member).await;
    let stream = h.stream(&realm, "Denmark", false).await;

    let first = add(&h, &realm, std::slice::from_ref(&stream), std::slice::from_ref(&user)).await;
    assert_eq!(first.subs_to_add.len(), 1);
    let audit_before = audit(&h, &realm).await.len();

    let second = add(&h, &realm, std::slice::from_ref(&stream), std::slice::from_ref(&user)).await;
    assert!(second.subs_to_add.is_empty());
    assert!(second.subs_to_activate.is_empty());
    assert_eq!(second.already_subscribed.len(), 1);
    assert_eq!(second.already_subscribed[0].stream_id, stream.id);

    assert_eq!(audit(&h, &realm).await.len(), audit_before);
    let mut conn = h.pool.acquire().await.expect("acquire");
    let rows = queries::subscriptions_for_users(&mut conn, &[user.id])
        .await
        .expect("rows");
    assert_eq!(rows.len(), 1);
    drop(conn);

    h.cleanup().await;
}

#[tokio::test]
async fn public_and_private_streams_get_the_right_peer_events() {
    let h = Harness::new("s1s2").await;
    let realm = h.realm("zulip", true).await;
    let hamlet = h.user(&realm, "hamlet", UserRole::Member).await;
    let othello = h.user(&realm, "othello", UserRole::Member).await;
    let iago = h.user(&realm, "iago", UserRole::Admin).await;
    let polonius = h.user(&realm, "polonius", UserRole::Guest).await;
    let s1 = h.stream(&realm, "S1", false).await;
    let s2 = h.stream(&realm, "S2", true).await;

    let hamlet_q = h.register(&hamlet).await;
    let othello_q = h.register(&othello).await;
    let iago_q = h.register(&iago).await;
    let polonius_q = h.register(&polonius).await;

    let result = add(&h, &realm, &[s1.clone(), s2.clone()], std::slice::from_ref(&hamlet)).await;
    assert_eq!(result.subs_to_add.len(), 2);

    let mut conn = h.pool.acquire().await.expect("acquire");
    let rows = queries::subscriptions_for_users(&mut conn, &[hamlet.id])
        .await
        .expect("rows");
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.active));
    let s1_recipient = s1.recipient_id.expect("recipient");
    let subscribers = queries::active_subscriber_map(&mut conn, &[s1_recipient])
        .await
        .expect("subscribers");
    assert!(subscribers[&s1_recipient].contains(&hamlet.id));
    drop(conn);

    let created: Vec<i64> = audit(&h, &realm)
        .await
        .iter()
        .filter(|row| row.kind() == Some(AuditEventType::SubscriptionCreated))
        .filter_map(|row| row.modified_stream_id)
        .collect();
    assert_eq!(created, vec![s1.id, s2.id]);

    let expected = vec![(vec![s1.id], vec![hamlet.id])];
    assert_eq!(peer_adds(&h.drain(&othello, &othello_q).await), expected);
    assert_eq!(peer_adds(&h.drain(&iago, &iago_q).await), expected);
    assert!(peer_adds(&h.drain(&polonius, &polonius_q).await).is_empty());

    let own = h.drain(&hamlet, &hamlet_q).await;
    assert!(peer_adds(&own).is_empty());
    let added = own.iter().find_map(|queued| match &queued.event {
        Event::Subscription(SubscriptionEvent::Add { subscriptions }) => Some(subscriptions),
        _ => None,
    });
    assert_eq!(added.map(Vec::len), Some(2));
    let private_created = own.iter().any(|queued| {
        matches!(
            &queued.event,
            Event::Stream(StreamEvent::Create { streams }) if streams.iter().any(|s| s.stream_id == s2.id)
        )
    });
    assert!(private_created, "S2 becomes visible to its new subscriber");

    h.cleanup().await;
}

#[tokio::test]
async fn remove_add_remove_writes_one_audit_row_per_transition() {
    let h = Harness::new("transitions").await;
    let realm = h.realm("zulip", true).await;
    let user = h.user(&realm, "cordelia", UserRole::Member).await;
    let stream = h.stream(&realm, "Verona", false).await;
    let streams = std::slice::from_ref(&stream);
    let users = std::slice::from_ref(&user);

    add(&h, &realm, streams, users).await;
    let outcome = remove(&h, &realm, users, streams).await;
    assert_eq!(outcome.removed.len(), 1);
    let readded = add(&h, &realm, streams, users).await;
    assert_eq!(readded.subs_to_activate.len(), 1);
    remove(&h, &realm, users, streams).await;

    let kinds: Vec<AuditEventType> = audit(&h, &realm)
        .await
        .iter()
        .filter(|row| row.modified_user_id == Some(user.id))
        .filter_map(DbRealmAuditLog::kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            AuditEventType::SubscriptionCreated,
            AuditEventType::SubscriptionDeactivated,
            AuditEventType::SubscriptionActivated,
            AuditEventType::SubscriptionDeactivated,
        ]
    );

    let row = h
        .db
        .subscription_row(user.id, stream.recipient_id.expect("recipient"))
        .await
        .expect("row lookup")
        .expect("row exists");
    assert!(!row.active);

    // Removing again only reports the pair.
    let again = remove(&h, &realm, users, streams).await;
    assert!(again.removed.is_empty());
    assert_eq!(again.not_subscribed.len(), 1);

    h.cleanup().await;
}

#[tokio::test]
async fn new_subscriptions_get_deterministic_colors() {
    let h = Harness::new("colors").await;
    let realm = h.realm("zulip", true).await;
    let hamlet = h.user(&realm, "hamlet", UserRole::Member).await;
    let othello = h.user(&realm, "othello", UserRole::Member).await;
    let streams = vec![
        h.stream(&realm, "alpha", false).await,
        h.stream(&realm, "beta", false).await,
    ];

    add(&h, &realm, &streams, &[hamlet.clone(), othello.clone()]).await;

    let mut conn = h.pool.acquire().await.expect("acquire");
    let rows = queries::subscriptions_for_users(&mut conn, &[hamlet.id, othello.id])
        .await
        .expect("rows");
    drop(conn);
    let colors_of = |user_id: i64| {
        let mut colors: Vec<(i64, String)> = rows
            .iter()
            .filter(|row| row.user_id == user_id)
            .map(|row| (row.recipient_id, row.color.clone()))
            .collect();
        colors.sort();
        colors
    };

    let hamlet_colors = colors_of(hamlet.id);
    assert_eq!(hamlet_colors, colors_of(othello.id));
    assert_eq!(hamlet_colors[0].1, STREAM_ASSIGNMENT_COLORS[0]);
    assert_eq!(hamlet_colors[1].1, STREAM_ASSIGNMENT_COLORS[1]);

    h.cleanup().await;
}

#[tokio::test]
async fn last_private_unsubscribe_deactivates_the_stream() {
    let h = Harness::new("last-private").await;
    let realm = h.realm("zulip", true).await;
    let hamlet = h.user(&realm, "hamlet", UserRole::Member).await;
    let iago = h.user(&realm, "iago", UserRole::Admin).await;
    let secret = h.stream(&realm, "secret", true).await;
    let iago_q = h.register(&iago).await;

    add(&h, &realm, std::slice::from_ref(&secret), std::slice::from_ref(&hamlet)).await;
    remove(&h, &realm, std::slice::from_ref(&hamlet), std::slice::from_ref(&secret)).await;

    let reloaded = h.reload_stream(secret.id).await;
    assert!(reloaded.deactivated);
    let (prefix, rest) = reloaded.name.split_at(7);
    assert!(prefix.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(rest, "!DEACTIVATED:secret");

    let kinds: Vec<_> = audit(&h, &realm)
        .await
        .iter()
        .filter_map(DbRealmAuditLog::kind)
        .collect();
    assert!(kinds.contains(&AuditEventType::StreamDeactivated));

    let deleted = h.drain(&iago, &iago_q).await.iter().any(|queued| {
        matches!(
            &queued.event,
            Event::Stream(StreamEvent::Delete { streams }) if streams[0].stream_id == secret.id
        )
    });
    assert!(deleted, "admins hear about the deactivation");

    h.cleanup().await;
}

#[tokio::test]
async fn property_changes_are_audited_and_announced() {
    let h = Harness::new("properties").await;
    let realm = h.realm("zulip", true).await;
    let hamlet = h.user(&realm, "hamlet", UserRole::Member).await;
    let stream = h.stream(&realm, "Denmark", false).await;
    add(&h, &realm, std::slice::from_ref(&stream), std::slice::from_ref(&hamlet)).await;
    let queue = h.register(&hamlet).await;

    let property = SubscriptionProperty::parse("color").expect("known property");
    let value = property.parse_value(&json!("#abcdef")).expect("valid color");
    let mut uow = UnitOfWork::begin(&h.pool).await.expect("begin");
    actions::change_subscription_property(
        &mut uow,
        &h.dispatcher,
        &hamlet,
        &stream,
        property,
        value,
        Some(&hamlet),
    )
    .await
    .expect("change color");
    uow.commit().await.expect("commit");

    let row = h
        .db
        .subscription_row(hamlet.id, stream.recipient_id.expect("recipient"))
        .await
        .expect("lookup")
        .expect("row");
    assert_eq!(row.color, "#abcdef");

    let changed = audit(&h, &realm)
        .await
        .into_iter()
        .find(|row| row.kind() == Some(AuditEventType::SubscriptionPropertyChanged))
        .expect("audit row");
    assert_eq!(changed.extra()["property"], "color");
    assert_eq!(changed.extra()["new_value"], "#abcdef");

    let update = h.drain(&hamlet, &queue).await.into_iter().find_map(|queued| match queued.event {
        Event::Subscription(SubscriptionEvent::Update {
            stream_id,
            property,
            value,
        }) => Some((stream_id, property, value)),
        _ => None,
    });
    assert_eq!(update, Some((stream.id, "color".to_string(), json!("#abcdef"))));

    assert!(SubscriptionProperty::parse("bogus").is_err());
    assert!(property.parse_value(&json!("blue")).is_err());

    h.cleanup().await;
}

fn kinds(events: &[QueuedEvent]) -> Vec<String> {
    events
        .iter()
        .map(|queued| match queued.event.op() {
            Some(op) => format!("{}/{op}", queued.event.kind()),
            None => queued.event.kind().to_string(),
        })
        .collect()
}

fn position(events: &[QueuedEvent], kind: &str) -> Option<i64> {
    let names = kinds(events);
    events
        .iter()
        .zip(names)
        .find(|(_, name)| name == kind)
        .map(|(queued, _)| queued.id)
}

#[tokio::test]
async fn guests_learn_about_public_streams_they_join() {
    let h = Harness::new("guest-create").await;
    let realm = h.realm("zulip", true).await;
    let polonius = h.user(&realm, "polonius", UserRole::Guest).await;
    let hamlet = h.user(&realm, "hamlet", UserRole::Member).await;
    let denmark = h.stream(&realm, "Denmark", false).await;
    let polonius_q = h.register(&polonius).await;
    let hamlet_q = h.register(&hamlet).await;

    add(&h, &realm, std::slice::from_ref(&denmark), &[polonius.clone(), hamlet.clone()]).await;

    let guest_events = h.drain(&polonius, &polonius_q).await;
    let created = position(&guest_events, "stream/create").expect("guest gets stream/create");
    let added = position(&guest_events, "subscription/add").expect("guest gets subscription/add");
    assert!(created < added);

    // Members could already see the public stream.
    let member_events = h.drain(&hamlet, &hamlet_q).await;
    assert_eq!(position(&member_events, "stream/create"), None);

    h.cleanup().await;
}

#[tokio::test]
async fn restricted_guests_meet_new_peers_before_peer_events() {
    let h = Harness::new("guest-visibility").await;
    let realm = h.realm("zulip", false).await;
    let polonius = h.user(&realm, "polonius", UserRole::Guest).await;
    let hamlet = h.user(&realm, "hamlet", UserRole::Member).await;
    let stream = h.stream(&realm, "Denmark", false).await;
    let streams = std::slice::from_ref(&stream);

    add(&h, &realm, streams, std::slice::from_ref(&polonius)).await;
    let queue = h.register(&polonius).await;

    add(&h, &realm, streams, std::slice::from_ref(&hamlet)).await;
    let events = h.drain(&polonius, &queue).await;
    let introduced = events.iter().find_map(|queued| match &queued.event {
        Event::RealmUser(RealmUserEvent::Add { person }) => Some((queued.id, person.user_id)),
        _ => None,
    });
    let (person_id, user_id) = introduced.expect("guest is told about hamlet");
    assert_eq!(user_id, hamlet.id);
    let peer_id = position(&events, "subscription/peer_add").expect("peer_add");
    assert!(person_id < peer_id, "{:?}", kinds(&events));

    let last_id = events.last().map(|queued| queued.id);
    remove(&h, &realm, std::slice::from_ref(&hamlet), streams).await;
    let events: Vec<QueuedEvent> = h
        .drain(&polonius, &queue)
        .await
        .into_iter()
        .filter(|queued| Some(queued.id) > last_id)
        .collect();
    let removed = events.iter().find_map(|queued| match &queued.event {
        Event::RealmUser(RealmUserEvent::Remove { person }) => Some(person.user_id),
        _ => None,
    });
    assert_eq!(removed, Some(hamlet.id));
    assert!(position(&events, "subscription/peer_remove").is_some());

    h.cleanup().await;
}

#[tokio::test]
async fn cross_realm_targets_write_nothing() {
    let h = Harness::new("cross-realm").await;
    let zulip = h.realm("zulip", true).await;
    let lear = h.realm("lear", true).await;
    let hamlet = h.user(&zulip, "hamlet", UserRole::Member).await;
    let cordelia = h.user(&lear, "cordelia", UserRole::Member).await;
    let denmark = h.stream(&zulip, "Denmark", false).await;
    let verona = h.stream(&lear, "Verona", false).await;

    let mut uow = UnitOfWork::begin(&h.pool).await.expect("begin");
    let err = actions::bulk_add_subscriptions(
        &mut uow,
        &h.dispatcher,
        &zulip,
        &[denmark.clone(), verona.clone()],
        std::slice::from_ref(&hamlet),
        None,
    )
    .await
    .expect_err("stream from another realm");
    assert!(matches!(err, SubcastError::ContractViolation(_)));
    assert_eq!(uow.pending_hooks(), 0);
    uow.rollback().await.expect("rollback");

    let mut uow = UnitOfWork::begin(&h.pool).await.expect("begin");
    let err = actions::bulk_add_subscriptions(
        &mut uow,
        &h.dispatcher,
        &zulip,
        std::slice::from_ref(&denmark),
        &[hamlet.clone(), cordelia.clone()],
        None,
    )
    .await
    .expect_err("user from another realm");
    assert!(matches!(err, SubcastError::ContractViolation(_)));
    uow.rollback().await.expect("rollback");

    add(&h, &zulip, std::slice::from_ref(&denmark), std::slice::from_ref(&hamlet)).await;
    let mut uow = UnitOfWork::begin(&h.pool).await.expect("begin");
    let err = actions::bulk_remove_subscriptions(
        &mut uow,
        &h.dispatcher,
        &zulip,
        std::slice::from_ref(&hamlet),
        &[denmark.clone(), verona.clone()],
        None,
    )
    .await
    .expect_err("stream from another realm");
    assert!(matches!(err, SubcastError::ContractViolation(_)));
    uow.rollback().await.expect("rollback");

    let mut conn = h.pool.acquire().await.expect("acquire");
    let rows = queries::subscriptions_for_users(&mut conn, &[hamlet.id, cordelia.id])
        .await
        .expect("rows");
    drop(conn);
    assert_eq!(rows.len(), 1);
    assert!(rows[0].active);
    assert!(audit(&h, &lear).await.is_empty());
    let zulip_kinds: Vec<_> = audit(&h, &zulip)
        .await
        .iter()
        .filter_map(DbRealmAuditLog::kind)
        .collect();
    assert_eq!(zulip_kinds, vec![AuditEventType::SubscriptionCreated]);

    h.cleanup().await;
}
