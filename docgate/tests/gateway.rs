use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use bson::{Bson, doc, oid::ObjectId};
use docgate::{
    memory::{InMemoryDatabase, InMemoryDriver, MemoryError},
    prelude::*,
};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};

const URL: &str = "memory://local/app";
const HEX: &str = "507f1f77bcf86cd799439011";

/// Collects status notifications so tests can assert on them.
#[derive(Debug, Clone, Default)]
struct RecordingListener {
    events: Arc<Mutex<Vec<ConnectionStatus>>>,
}

impl RecordingListener {
    fn events(&self) -> Vec<ConnectionStatus> {
        self.events.lock().unwrap().clone()
    }
}

impl StatusListener for RecordingListener {
    fn on_status(&self, status: ConnectionStatus) {
        self.events.lock().unwrap().push(status);
    }
}

/// Delays every dial so concurrent callers overlap with it.
#[derive(Debug, Clone)]
struct SlowDriver {
    inner: InMemoryDriver,
    delay: Duration,
}

#[async_trait]
impl Driver for SlowDriver {
    type Handle = InMemoryDatabase;

    async fn connect(&self, config: &GatewayConfig) -> GatewayResult<Self::Handle> {
        tokio::time::sleep(self.delay).await;
        self.inner.connect(config).await
    }
}

fn gateway() -> (Gateway<InMemoryDriver>, InMemoryDriver, RecordingListener) {
    let driver = InMemoryDriver::new();
    let listener = RecordingListener::default();
    let gateway = Gateway::with_listener(driver.clone(), URL, listener.clone());

    (gateway, driver, listener)
}

#[tokio::test]
async fn concurrent_connects_share_one_dial() {
    let driver = InMemoryDriver::new();
    let gateway = Gateway::new(
        SlowDriver { inner: driver.clone(), delay: Duration::from_millis(20) },
        URL,
    );

    let (first, second) = tokio::join!(gateway.connect(false), gateway.connect(true));

    assert_eq!(first.unwrap().session(), second.unwrap().session());
    assert_eq!(driver.dial_count(), 1);
}

#[tokio::test]
async fn concurrent_connects_on_spawned_tasks_share_one_handle() {
    let driver = InMemoryDriver::new();
    let gateway = Gateway::new(
        SlowDriver { inner: driver.clone(), delay: Duration::from_millis(20) },
        URL,
    );

    let tasks = (0..8)
        .map(|_| {
            let gateway = gateway.clone();
            tokio::spawn(async move { gateway.connect(false).await.unwrap().session() })
        })
        .collect::<Vec<_>>();

    let mut sessions = Vec::new();
    for task in tasks {
        sessions.push(task.await.unwrap());
    }

    sessions.dedup();
    assert_eq!(sessions.len(), 1);
    assert_eq!(driver.dial_count(), 1);
}

#[tokio::test]
async fn reconnecting_is_silent_and_does_not_redial() {
    let (gateway, driver, listener) = gateway();

    let handle = gateway.connect(true).await.unwrap();
    assert_eq!(
        listener.events(),
        vec![ConnectionStatus::Connecting, ConnectionStatus::Connected],
    );

    let again = gateway.connect(false).await.unwrap();
    let verbose_again = gateway.connect(true).await.unwrap();

    assert_eq!(handle.session(), again.session());
    assert_eq!(handle.session(), verbose_again.session());
    assert_eq!(listener.events().len(), 2);
    assert_eq!(driver.dial_count(), 1);
}

#[tokio::test]
async fn connect_default_reports_progress() {
    let (gateway, _driver, listener) = gateway();

    gateway.connect_default().await.unwrap();

    assert_eq!(
        listener.events(),
        vec![ConnectionStatus::Connecting, ConnectionStatus::Connected],
    );
}

#[tokio::test]
async fn quiet_connect_emits_nothing() {
    let (gateway, _driver, listener) = gateway();

    gateway.connect(false).await.unwrap();

    assert!(listener.events().is_empty());
}

#[tokio::test]
async fn failed_dial_leaves_gateway_unconnected_and_retryable() {
    let (gateway, driver, listener) = gateway();
    driver.set_unreachable(URL, true).await;

    let err = gateway.connect(true).await.unwrap_err();

    match &err {
        GatewayError::Connection(source) => assert_eq!(
            source.downcast_ref::<MemoryError>(),
            Some(&MemoryError::Unreachable(URL.to_string())),
        ),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!gateway.is_connected().await);
    assert_eq!(
        listener.events(),
        vec![ConnectionStatus::Connecting, ConnectionStatus::Failed],
    );

    driver.set_unreachable(URL, false).await;

    gateway.connect(false).await.unwrap();
    assert!(gateway.is_connected().await);
    assert_eq!(driver.dial_count(), 2);
}

#[tokio::test]
async fn concurrent_connects_to_an_unreachable_url_share_one_failed_dial() {
    let driver = InMemoryDriver::new();
    driver.set_unreachable(URL, true).await;
    let listener = RecordingListener::default();
    let gateway = Gateway::with_listener(
        SlowDriver { inner: driver.clone(), delay: Duration::from_millis(20) },
        URL,
        listener.clone(),
    );

    let tasks = (0..8)
        .map(|_| {
            let gateway = gateway.clone();
            tokio::spawn(async move { gateway.connect(true).await })
        })
        .collect::<Vec<_>>();

    for task in tasks {
        match task.await.unwrap() {
            Err(GatewayError::Connection(source)) => assert_eq!(
                source.downcast_ref::<MemoryError>(),
                Some(&MemoryError::Unreachable(URL.to_string())),
            ),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    assert_eq!(driver.dial_count(), 1);
    assert_eq!(
        listener.events(),
        vec![ConnectionStatus::Connecting, ConnectionStatus::Failed],
    );
    assert!(!gateway.is_connected().await);

    // Once the failure has settled, the next caller dials again
    driver.set_unreachable(URL, false).await;
    gateway.connect(false).await.unwrap();
    assert_eq!(driver.dial_count(), 2);
}

#[tokio::test]
async fn operations_before_connect_are_uninitialized() {
    let (gateway, driver, _listener) = gateway();

    let err = gateway
        .find_one("users", doc! { "_id": HEX })
        .await
        .unwrap_err();
    assert!(err.is_uninitialized());

    // The precondition is checked before identifiers are parsed
    let err = gateway.find_one("users", doc! { "_id": "bad" }).await.unwrap_err();
    assert!(err.is_uninitialized());

    let err = gateway.collection("users").await.unwrap_err();
    assert!(err.is_uninitialized());

    let err = gateway
        .dispatch(Operation::Count, vec!["users".into()])
        .await
        .unwrap_err();
    assert!(err.is_uninitialized());

    assert_eq!(driver.dial_count(), 0);
}

#[tokio::test]
async fn insert_reaches_the_named_collection() {
    let (gateway, _driver, _listener) = gateway();
    let handle = gateway.connect(false).await.unwrap();

    let result = gateway.insert("widgets", doc! { "name": "a" }).await.unwrap();

    let stored = handle
        .collection("widgets")
        .find_one(doc! { "name": "a" })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.inserted_ids, vec![stored.get("_id").cloned().unwrap()]);
    assert_eq!(handle.collection_names().await, vec!["widgets".to_string()]);
}

#[tokio::test]
async fn string_ids_are_stored_and_matched_as_object_ids() {
    let (gateway, _driver, _listener) = gateway();
    let handle = gateway.connect(false).await.unwrap();
    let oid = ObjectId::parse_str(HEX).unwrap();

    let result = gateway
        .insert("users", doc! { "_id": HEX, "name": "ada" })
        .await
        .unwrap();
    assert_eq!(result.inserted_ids, vec![Bson::ObjectId(oid)]);

    let raw = handle.collection("users").find_one(doc! {}).await.unwrap().unwrap();
    assert_eq!(raw.get_object_id("_id").unwrap(), oid);

    let found = gateway.find_one("users", doc! { "_id": HEX }).await.unwrap().unwrap();
    assert_eq!(found.get_str("name").unwrap(), "ada");
    assert_eq!(gateway.count("users", doc! { "_id": HEX }).await.unwrap(), 1);
}

#[tokio::test]
async fn malformed_ids_fail_before_reaching_the_driver() {
    let (gateway, _driver, _listener) = gateway();
    gateway.connect(false).await.unwrap();

    let err = gateway
        .insert("users", doc! { "_id": "bad", "name": "x" })
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::InvalidIdentifier { .. }));
    assert_eq!(gateway.count("users", doc! {}).await.unwrap(), 0);
}

#[tokio::test]
async fn update_update_one_and_remove_accept_string_ids() {
    let (gateway, _driver, _listener) = gateway();
    gateway.connect(false).await.unwrap();

    gateway.insert("users", doc! { "_id": HEX, "visits": 1 }).await.unwrap();
    gateway.insert("users", doc! { "name": "other", "visits": 1 }).await.unwrap();

    let one = gateway
        .update_one("users", doc! { "_id": HEX }, doc! { "$inc": { "visits": 1 } })
        .await
        .unwrap();
    assert_eq!((one.matched_count, one.modified_count), (1, 1));

    let all = gateway
        .update("users", doc! {}, doc! { "$set": { "active": true } })
        .await
        .unwrap();
    assert_eq!((all.matched_count, all.modified_count), (2, 2));

    let found = gateway.find_one("users", doc! { "_id": HEX }).await.unwrap().unwrap();
    assert_eq!(found.get_i32("visits").unwrap(), 2);

    let removed = gateway.remove("users", doc! { "_id": HEX }).await.unwrap();
    assert_eq!(removed.deleted_count, 1);
    assert_eq!(gateway.count("users", doc! { "active": true }).await.unwrap(), 1);
}

#[tokio::test]
async fn find_streams_matching_documents_in_order() {
    let (gateway, _driver, _listener) = gateway();
    gateway.connect(false).await.unwrap();

    for n in 1..=3 {
        gateway.insert("numbers", doc! { "n": n }).await.unwrap();
    }

    let docs = gateway
        .find("numbers", doc! { "n": { "$gte": 2 } })
        .await
        .unwrap()
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    let ns = docs.iter().map(|d| d.get_i32("n").unwrap()).collect::<Vec<_>>();
    assert_eq!(ns, vec![2, 3]);
}

#[tokio::test]
async fn driver_errors_pass_through_unchanged() {
    let (gateway, _driver, _listener) = gateway();
    gateway.connect(false).await.unwrap();
    gateway.insert("users", doc! { "_id": HEX }).await.unwrap();

    let err = gateway.insert("users", doc! { "_id": HEX }).await.unwrap_err();

    match err {
        GatewayError::Driver(source) => assert!(matches!(
            source.downcast_ref::<MemoryError>(),
            Some(MemoryError::DuplicateKey(_, collection)) if collection == "users"
        )),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn dispatch_routes_by_operation_name() {
    let (gateway, _driver, _listener) = gateway();
    gateway.connect(false).await.unwrap();

    let inserted = gateway
        .dispatch(
            "insert".parse().unwrap(),
            vec!["users".into(), doc! { "_id": HEX, "name": "ada" }.into()],
        )
        .await
        .unwrap()
        .into_inserted()
        .unwrap();
    assert_eq!(inserted.inserted_ids, vec![Bson::ObjectId(ObjectId::parse_str(HEX).unwrap())]);

    let found = gateway
        .dispatch("findOne".parse().unwrap(), vec!["users".into(), doc! { "_id": HEX }.into()])
        .await
        .unwrap()
        .into_document()
        .unwrap()
        .unwrap();
    assert_eq!(found.get_str("name").unwrap(), "ada");

    let updated = gateway
        .dispatch(
            Operation::UpdateOne,
            vec![
                "users".into(),
                doc! { "_id": HEX }.into(),
                doc! { "$set": { "name": "grace" } }.into(),
            ],
        )
        .await
        .unwrap()
        .into_updated()
        .unwrap();
    assert_eq!(updated.modified_count, 1);

    let count = gateway
        .dispatch(Operation::Count, vec!["users".into()])
        .await
        .unwrap()
        .into_count();
    assert_eq!(count, Some(1));

    let users = gateway
        .dispatch(Operation::Collection, vec!["users".into()])
        .await
        .unwrap()
        .into_collection()
        .unwrap();
    assert_eq!(users.name(), "users");

    let removed = gateway
        .dispatch(Operation::Remove, vec!["users".into(), doc! {}.into()])
        .await
        .unwrap()
        .into_removed()
        .unwrap();
    assert_eq!(removed.deleted_count, 1);
}

#[tokio::test]
async fn dispatched_array_arguments_are_not_normalized() {
    let (gateway, _driver, _listener) = gateway();
    gateway.connect(false).await.unwrap();

    gateway
        .dispatch(
            Operation::Insert,
            vec!["users".into(), vec![doc! { "_id": HEX }, doc! { "_id": "not-hex" }].into()],
        )
        .await
        .unwrap();

    // Identifiers inside the array keep their string form
    let stored = gateway
        .collection("users")
        .await
        .unwrap()
        .find_one(doc! { "_id": "not-hex" })
        .await
        .unwrap();
    assert!(stored.is_some());
    assert_eq!(gateway.count("users", doc! { "_id": HEX }).await.unwrap(), 0);
}

#[tokio::test]
async fn insert_many_keeps_string_ids() {
    let (gateway, _driver, _listener) = gateway();
    gateway.connect(false).await.unwrap();

    let result = gateway
        .insert_many("users", vec![doc! { "_id": HEX }, doc! { "name": "x" }])
        .await
        .unwrap();

    assert_eq!(result.inserted_ids.len(), 2);
    assert_eq!(result.inserted_ids[0], Bson::String(HEX.to_string()));
}

#[tokio::test]
async fn dispatch_rejects_malformed_argument_lists() {
    let (gateway, _driver, _listener) = gateway();
    gateway.connect(false).await.unwrap();

    let cases: Vec<(Operation, Vec<Arg>)> = vec![
        (Operation::Find, vec![]),
        (Operation::Find, vec![doc! {}.into()]),
        (Operation::Find, vec!["users".into(), doc! {}.into(), doc! {}.into()]),
        (Operation::Update, vec!["users".into(), doc! {}.into()]),
        (Operation::Insert, vec!["users".into(), Arg::Value(Bson::Int32(1))]),
        (Operation::Insert, vec!["users".into(), vec![Bson::Int32(1)].into()]),
        (Operation::Collection, vec![]),
    ];

    for (op, args) in cases {
        let err = gateway.dispatch(op, args).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidArgument(_)), "{op}: {err:?}");
    }
}

#[tokio::test]
async fn shutdown_forces_a_new_dial() {
    let (gateway, driver, _listener) = gateway();
    let first = gateway.connect(false).await.unwrap();

    gateway.shutdown().await.unwrap();
    assert!(!gateway.is_connected().await);
    assert!(gateway.count("users", doc! {}).await.unwrap_err().is_uninitialized());

    let second = gateway.connect(false).await.unwrap();
    assert_ne!(first.session(), second.session());
    assert_eq!(driver.dial_count(), 2);
}

#[tokio::test]
async fn clones_share_the_connection() {
    let (gateway, driver, _listener) = gateway();
    let other = gateway.clone();

    gateway.connect(false).await.unwrap();

    assert!(other.is_connected().await);
    other.insert("widgets", doc! { "name": "a" }).await.unwrap();
    assert_eq!(gateway.count("widgets", doc! {}).await.unwrap(), 1);
    assert_eq!(driver.dial_count(), 1);
}

#[tokio::test]
async fn shared_gateway_hands_out_one_instance() {
    static SHARED: SharedGateway<InMemoryDriver> = SharedGateway::new();

    assert!(SHARED.get().unwrap_err().is_uninitialized());

    let first = SHARED
        .get_or_try_init(|| Ok(Gateway::new(InMemoryDriver::new(), "memory://shared/app")))
        .unwrap();
    let second = SHARED.init(Gateway::new(InMemoryDriver::new(), "memory://other/app"));

    assert!(std::ptr::eq(first, second));
    assert_eq!(second.connection().config().url, "memory://shared/app");

    let handle = first.connect(false).await.unwrap();
    assert_eq!(SHARED.get().unwrap().connect(false).await.unwrap().session(), handle.session());
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Widget {
    name: String,
    size: i32,
}

#[tokio::test]
async fn typed_documents_round_trip_through_the_gateway() {
    let (gateway, _driver, _listener) = gateway();
    gateway.connect(false).await.unwrap();
    let widget = Widget { name: "a".to_string(), size: 3 };

    gateway.insert("widgets", widget.to_document().unwrap()).await.unwrap();

    let mut found = gateway.find_one("widgets", doc! { "name": "a" }).await.unwrap().unwrap();
    found.remove("_id");

    assert_eq!(Widget::from_document(found).unwrap(), widget);
}
