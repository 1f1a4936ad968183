//! Integration tests for sync engine and server.

use hivesync_core::{Entity, EntityKind, FieldValue, LocalStore, Operation};
use hivesync_sync_engine::{
    MockTransport, SyncConfig, SyncEngine, SyncError, SyncResult, SyncStatus, SyncTransport,
};
use hivesync_sync_protocol::{
    ConflictPolicy, PullRequest, PullResponse, PushRequest, WireChange,
};
use hivesync_sync_server::{ServerConfig, SyncServer};
use hivesync_testkit::prelude::*;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

/// A transport that talks to an in-process server.
struct LoopbackTransport {
    server: Arc<SyncServer>,
    push_failure: Mutex<Option<u16>>,
}

impl LoopbackTransport {
    fn new(server: Arc<SyncServer>) -> Self {
        Self {
            server,
            push_failure: Mutex::new(None),
        }
    }

    fn fail_next_push(&self, status: u16) {
        *self.push_failure.lock() = Some(status);
    }
}

impl SyncTransport for LoopbackTransport {
    async fn push(&self, request: &PushRequest) -> SyncResult<()> {
        if let Some(status) = self.push_failure.lock().take() {
            return Err(SyncError::RemoteStatus { status });
        }
        self.server
            .handle_push(request)
            .map(|_| ())
            .map_err(|e| SyncError::RemoteStatus {
                status: e.status_code(),
            })
    }

    async fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        self.server
            .handle_pull(request)
            .map_err(|e| SyncError::RemoteStatus {
                status: e.status_code(),
            })
    }
}

fn server() -> Arc<SyncServer> {
    Arc::new(SyncServer::new(ServerConfig::default()))
}

fn device(server: &Arc<SyncServer>) -> SyncEngine<LoopbackTransport> {
    device_with(server, SyncConfig::default())
}

fn device_with(server: &Arc<SyncServer>, config: SyncConfig) -> SyncEngine<LoopbackTransport> {
    let store = Arc::new(LocalStore::open_in_memory().unwrap());
    SyncEngine::new(store, LoopbackTransport::new(Arc::clone(server)), config).unwrap()
}

fn mock_device(config: SyncConfig) -> SyncEngine<MockTransport> {
    let store = Arc::new(LocalStore::open_in_memory().unwrap());
    SyncEngine::new(store, MockTransport::new(), config).unwrap()
}

fn name(entity: &Entity) -> Option<&str> {
    entity.field("name").and_then(FieldValue::as_str)
}

fn renamed(entity: &Entity, to: &str, day: u32) -> Entity {
    let mut next = entity.clone();
    next.set("name", to);
    next.updated_at = fixed_time(day, 12);
    next
}

// ============================================================================
// Offline create then sync
// ============================================================================

#[tokio::test]
async fn offline_create_is_pushed_once_and_marked_synced() {
    let server = server();
    let phone = device(&server);
    let row = colony("Volk 1");
    phone.store().create(row.clone()).unwrap();

    let unsynced = phone.store().list_unsynced().unwrap();
    assert_eq!(unsynced.len(), 1);
    assert_eq!(unsynced[0].operation, Operation::Create);

    let report = phone.sync().await.unwrap();
    assert_eq!(report.push.changes, 1);
    assert!(phone.store().list_unsynced().unwrap().is_empty());
    assert_eq!(server.change_count(), 1);
    assert_eq!(phone.status().status, SyncStatus::Idle);
    assert!(phone.status().last_sync.is_some());
}

#[tokio::test]
async fn repeated_updates_collapse_into_one_change() {
    let server = server();
    let phone = device(&server);
    let row = colony("Volk 1");
    phone.store().create(row.clone()).unwrap();
    phone.sync().await.unwrap();

    let first = renamed(&row, "Volk 1a", 3);
    let second = renamed(&first, "Volk 1b", 4);
    phone.store().update(first).unwrap();
    phone.store().update(second.clone()).unwrap();
    assert_eq!(phone.store().list_unsynced().unwrap().len(), 2);

    let report = phone.sync().await.unwrap();
    assert_eq!(report.push.changes, 1);
    assert_eq!(report.push.entries, 2);
    assert!(phone.store().list_unsynced().unwrap().is_empty());

    let stream = server.handle_pull(&PullRequest { cursor: "1".into() }).unwrap();
    assert_eq!(stream.changes.len(), 1);
    assert_eq!(stream.changes[0].operation, Operation::Update);
    assert_eq!(
        stream.changes[0].data.as_ref().unwrap()["name"],
        serde_json::json!("Volk 1b")
    );
}

#[tokio::test]
async fn create_then_delete_offline_pushes_first_operation_without_payload() {
    let transport_device = mock_device(SyncConfig::default());
    let row = colony("Volk 1");
    transport_device.store().create(row.clone()).unwrap();
    transport_device.store().delete(&row.id).unwrap();

    transport_device.sync().await.unwrap();

    let applied = transport_device.transport().applied_changes();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].operation, Operation::Create);
    let data = applied[0].data.as_ref().unwrap();
    assert!(data.get("deletedAt").is_some());
}

// ============================================================================
// Pull semantics
// ============================================================================

#[tokio::test]
async fn pulled_delete_of_unknown_id_inserts_tombstone() {
    let phone = mock_device(SyncConfig::default());
    let ghost = colony("never seen");
    phone.transport().queue_pull(pull_page(
        vec![remote_delete(EntityKind::Colony, ghost.id, fixed_time(5, 10))],
        "7",
    ));

    phone.sync().await.unwrap();

    assert!(phone.store().get(&ghost.id).unwrap().is_none());
    let tomb = phone
        .store()
        .get_including_tombstones(&ghost.id)
        .unwrap()
        .unwrap();
    assert_eq!(tomb.deleted_at, Some(fixed_time(5, 10)));
    assert_eq!(phone.store().cursor().unwrap().position(), "7");
}

#[tokio::test]
async fn pulled_delete_tombstones_existing_row() {
    let phone = mock_device(SyncConfig::default());
    let row = colony("Volk 2");
    phone.store().create(row.clone()).unwrap();
    phone.sync().await.unwrap();

    phone.transport().queue_pull(pull_page(
        vec![remote_delete(EntityKind::Colony, row.id, fixed_time(6, 10))],
        "2",
    ));
    phone.sync().await.unwrap();

    let tomb = phone
        .store()
        .get_including_tombstones(&row.id)
        .unwrap()
        .unwrap();
    assert_eq!(name(&tomb), Some("Volk 2"));
    assert!(!tomb.is_live());
    assert!(phone.store().list_unsynced().unwrap().is_empty());
}

#[tokio::test]
async fn pulled_changes_apply_in_stream_order() {
    let phone = mock_device(SyncConfig::default());
    let row = colony("Volk 3");
    let later = renamed(&row, "Volk 3 neu", 9);
    phone.transport().queue_pull(pull_page(
        vec![
            remote_upsert(&row, Operation::Create),
            remote_upsert(&later, Operation::Update),
        ],
        "2",
    ));

    let report = phone.sync().await.unwrap();
    assert_eq!(report.pull.applied, 2);
    assert_eq!(
        name(&phone.store().get(&row.id).unwrap().unwrap()),
        Some("Volk 3 neu")
    );
}

#[tokio::test]
async fn pulled_changes_do_not_enter_the_change_log() {
    let phone = mock_device(SyncConfig::default());
    phone.transport().queue_pull(pull_page(
        vec![remote_upsert(&location("Heide"), Operation::Create)],
        "1",
    ));

    phone.sync().await.unwrap();
    assert!(phone.store().changes().unwrap().is_empty());
}

#[tokio::test]
async fn repeated_page_leaves_same_state() {
    let phone = mock_device(SyncConfig::default());
    let row = colony("Volk 4");
    let page = pull_page(vec![remote_upsert(&row, Operation::Create)], "3");
    phone.transport().queue_pull(page.clone());
    phone.transport().queue_pull(page);

    phone.pull().await.unwrap();
    let once = phone.store().get(&row.id).unwrap();
    phone.pull().await.unwrap();

    assert_eq!(phone.store().get(&row.id).unwrap(), once);
    assert_eq!(phone.store().cursor().unwrap().position(), "3");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn applying_a_page_twice_equals_applying_it_once(
        rows in prop::collection::vec(any_entity_strategy(), 1..8)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let changes: Vec<WireChange> = rows
                .iter()
                .map(|row| remote_upsert(row, Operation::Create))
                .collect();

            let once = mock_device(SyncConfig::default());
            once.transport().queue_pull(pull_page(changes.clone(), "9"));
            once.pull().await.unwrap();

            let twice = mock_device(SyncConfig::default());
            twice.transport().queue_pull(pull_page(changes.clone(), "9"));
            twice.transport().queue_pull(pull_page(changes, "9"));
            twice.pull().await.unwrap();
            twice.pull().await.unwrap();

            for row in &rows {
                assert_eq!(
                    once.store().get_including_tombstones(&row.id).unwrap(),
                    twice.store().get_including_tombstones(&row.id).unwrap()
                );
            }
        });
    }
}

// ============================================================================
// Failures leave the store as it was
// ============================================================================

#[tokio::test]
async fn failed_push_keeps_entries_and_cursor_and_resends_with_new_key() {
    let phone = mock_device(SyncConfig::default());
    phone.store().create(colony("Volk 5")).unwrap();
    let before = phone.store().list_unsynced().unwrap();

    phone.transport().fail_next_push(500);
    let err = phone.sync().await.unwrap_err();
    assert!(matches!(err, SyncError::RemoteStatus { status: 500 }));
    assert_eq!(phone.store().list_unsynced().unwrap(), before);
    assert!(phone.store().cursor().unwrap().is_at_start());
    assert!(phone.transport().pulls().is_empty());
    assert_eq!(phone.status().status, SyncStatus::Error);

    phone.sync().await.unwrap();
    let pushes = phone.transport().pushes();
    assert_eq!(pushes.len(), 2);
    assert_eq!(pushes[0].changes, pushes[1].changes);
    assert_ne!(pushes[0].idempotency_key, pushes[1].idempotency_key);
    assert!(phone.store().list_unsynced().unwrap().is_empty());
}

#[tokio::test]
async fn failed_pull_keeps_cursor_but_push_stays_acknowledged() {
    let phone = mock_device(SyncConfig::default());
    phone.store().create(colony("Volk 6")).unwrap();
    phone.transport().fail_next_pull(503);

    let err = phone.sync().await.unwrap_err();
    assert!(err.is_retryable());
    assert!(phone.store().list_unsynced().unwrap().is_empty());
    assert!(phone.store().cursor().unwrap().is_at_start());
}

#[tokio::test]
async fn malformed_change_rejects_the_whole_page() {
    let phone = mock_device(SyncConfig::default());
    let good = colony("Volk 7");
    phone.transport().queue_pull(pull_page(
        vec![remote_upsert(&good, Operation::Create), unknown_kind_change()],
        "4",
    ));

    let err = phone.sync().await.unwrap_err();
    assert!(matches!(err, SyncError::MalformedChange(_)));
    assert!(phone.store().get(&good.id).unwrap().is_none());
    assert!(phone.store().cursor().unwrap().is_at_start());

    // The next pull asks from the same place.
    phone.sync().await.unwrap();
    let pulls = phone.transport().pulls();
    assert_eq!(pulls[0].cursor, pulls[1].cursor);
}

#[tokio::test]
async fn slow_remote_times_out_without_side_effects() {
    let phone = mock_device(SyncConfig::default().with_timeout(Duration::from_millis(20)));
    phone.store().create(colony("Volk 8")).unwrap();
    phone.transport().set_delay(Duration::from_millis(200));

    let err = phone.sync().await.unwrap_err();
    assert!(matches!(err, SyncError::Timeout));
    assert_eq!(phone.store().list_unsynced().unwrap().len(), 1);
    assert_eq!(phone.stats().cycles_failed, 1);
}

#[tokio::test]
async fn unreachable_remote_is_retryable() {
    let phone = mock_device(SyncConfig::default());
    phone.transport().set_unreachable(true);
    let err = phone.sync().await.unwrap_err();
    assert!(err.is_retryable());
}

// ============================================================================
// Concurrent edits
// ============================================================================

#[tokio::test]
async fn unsynced_local_edit_survives_pull_by_default() {
    let phone = mock_device(SyncConfig::default());
    let row = colony("Volk 9");
    phone.store().create(row.clone()).unwrap();
    phone.sync().await.unwrap();

    phone.store().update(renamed(&row, "lokal", 10)).unwrap();
    phone.transport().queue_pull(pull_page(
        vec![remote_upsert(&renamed(&row, "remote", 11), Operation::Update)],
        "5",
    ));
    let outcome = phone.pull().await.unwrap();

    assert_eq!(outcome.reapplied, 1);
    let current = phone.store().get(&row.id).unwrap().unwrap();
    assert_eq!(name(&current), Some("lokal"));
    assert_eq!(phone.store().list_unsynced().unwrap().len(), 1);
    assert_eq!(phone.store().cursor().unwrap().position(), "5");
}

#[tokio::test]
async fn remote_wins_policy_overwrites_unsynced_local_edit() {
    let phone =
        mock_device(SyncConfig::default().with_conflict_policy(ConflictPolicy::RemoteWins));
    let row = colony("Volk 10");
    phone.store().create(row.clone()).unwrap();
    phone.sync().await.unwrap();

    phone.store().update(renamed(&row, "lokal", 10)).unwrap();
    phone.transport().queue_pull(pull_page(
        vec![remote_upsert(&renamed(&row, "remote", 11), Operation::Update)],
        "5",
    ));
    phone.pull().await.unwrap();

    let current = phone.store().get(&row.id).unwrap().unwrap();
    assert_eq!(name(&current), Some("remote"));
}

// ============================================================================
// Two devices, one remote
// ============================================================================

#[tokio::test]
async fn two_devices_converge() {
    let server = server();
    let phone = device(&server);
    let tablet = device(&server);

    let hive = colony("Volk 11");
    let site = location("Obstwiese");
    phone.store().create(hive.clone()).unwrap();
    tablet.store().create(site.clone()).unwrap();

    phone.sync().await.unwrap();
    tablet.sync().await.unwrap();
    phone.sync().await.unwrap();

    for engine in [&phone, &tablet] {
        assert_eq!(engine.store().get(&hive.id).unwrap(), Some(hive.clone()));
        assert_eq!(engine.store().get(&site.id).unwrap(), Some(site.clone()));
        assert_eq!(engine.store().cursor().unwrap().position(), "2");
        assert!(engine.store().list_unsynced().unwrap().is_empty());
    }
}

#[tokio::test]
async fn one_sync_catches_up_across_small_pages() {
    let server = Arc::new(SyncServer::new(ServerConfig::default().with_max_pull_batch(1)));
    let phone = device(&server);
    let tablet = device(&server);

    let hives = [colony("Volk 17"), colony("Volk 18"), colony("Volk 19")];
    for hive in &hives {
        tablet.store().create(hive.clone()).unwrap();
    }
    tablet.sync().await.unwrap();
    assert_eq!(server.change_count(), 3);

    let report = phone.sync().await.unwrap();
    assert_eq!(report.pull.applied, 3);
    assert_eq!(report.pull.cursor, "3");
    for hive in &hives {
        assert_eq!(phone.store().get(&hive.id).unwrap(), Some(hive.clone()));
    }
    assert_eq!(phone.store().cursor().unwrap().position(), server.cursor().to_string());
}

#[tokio::test]
async fn later_writer_wins_across_devices() {
    let server = server();
    let phone = device(&server);
    let tablet = device(&server);

    let hive = colony("Volk 12");
    phone.store().create(hive.clone()).unwrap();
    phone.sync().await.unwrap();
    tablet.sync().await.unwrap();

    phone.store().update(renamed(&hive, "vom Handy", 13)).unwrap();
    tablet.store().update(renamed(&hive, "vom Tablet", 14)).unwrap();
    phone.sync().await.unwrap();
    tablet.sync().await.unwrap();
    phone.sync().await.unwrap();

    for engine in [&phone, &tablet] {
        let row = engine.store().get(&hive.id).unwrap().unwrap();
        assert_eq!(name(&row), Some("vom Tablet"));
    }
}

#[tokio::test]
async fn push_order_follows_first_mutation() {
    let server = server();
    let phone = device(&server);
    let apiary = scenarios::populated_apiary(phone.store(), 2);
    phone
        .store()
        .update(renamed(&apiary.location, "Waldrand Nord", 20))
        .unwrap();

    phone.sync().await.unwrap();

    let stream = server.handle_pull(&PullRequest { cursor: "0".into() }).unwrap();
    let ids: Vec<String> = stream.changes.iter().map(|c| c.id.clone()).collect();
    let expected = vec![
        apiary.location.id.to_string(),
        apiary.colonies[0].id.to_string(),
        apiary.inspections[0].id.to_string(),
        apiary.colonies[1].id.to_string(),
        apiary.inspections[1].id.to_string(),
    ];
    assert_eq!(ids, expected);
    assert_eq!(stream.changes[0].operation, Operation::Create);
}

#[tokio::test]
async fn server_refusing_push_keeps_entries() {
    let server = server();
    let phone = device(&server);
    phone.store().create(colony("Volk 13")).unwrap();
    phone.transport().fail_next_push(502);

    assert!(phone.sync().await.is_err());
    assert_eq!(server.change_count(), 0);
    assert_eq!(phone.store().list_unsynced().unwrap().len(), 1);

    phone.sync().await.unwrap();
    assert_eq!(server.change_count(), 1);
}

#[test]
fn replayed_push_request_is_stored_once() {
    let server = server();
    let request = PushRequest::new(vec![remote_upsert(&colony("Volk 14"), Operation::Create)]);

    server.handle_push(&request).unwrap();
    let ack = server.handle_push(&request).unwrap();

    assert!(ack.duplicate);
    assert_eq!(server.change_count(), 1);

    let strict = SyncServer::new(ServerConfig::default().rejecting_duplicate_keys());
    strict.handle_push(&request).unwrap();
    assert_eq!(strict.handle_push(&request).unwrap_err().status_code(), 409);
    assert_eq!(strict.change_count(), 1);
}

// ============================================================================
// Durability
// ============================================================================

#[tokio::test]
async fn synced_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store");
    let server = server();
    let hive = colony("Volk 15");

    {
        let store = Arc::new(LocalStore::open(&path).unwrap());
        let engine = SyncEngine::new(
            Arc::clone(&store),
            LoopbackTransport::new(Arc::clone(&server)),
            SyncConfig::default(),
        )
        .unwrap();
        store.create(hive.clone()).unwrap();
        engine.sync().await.unwrap();
        drop(engine);
        store.close().unwrap();
    }

    let store = Arc::new(LocalStore::open(&path).unwrap());
    assert!(store.list_unsynced().unwrap().is_empty());
    assert_eq!(store.cursor().unwrap().position(), "1");
    assert!(store.cursor().unwrap().last_sync_at.is_some());
    assert_eq!(store.get(&hive.id).unwrap(), Some(hive));

    let engine = SyncEngine::new(
        store,
        LoopbackTransport::new(server),
        SyncConfig::default(),
    )
    .unwrap();
    assert!(engine.status().last_sync.is_some());
}

#[tokio::test]
async fn unsynced_entries_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store");

    {
        let store = LocalStore::open(&path).unwrap();
        store.create(colony("Volk 16")).unwrap();
        store.close().unwrap();
    }

    let server = server();
    let store = Arc::new(LocalStore::open(&path).unwrap());
    let engine = SyncEngine::new(
        store,
        LoopbackTransport::new(Arc::clone(&server)),
        SyncConfig::default(),
    )
    .unwrap();
    assert_eq!(engine.store().list_unsynced().unwrap().len(), 1);

    engine.sync().await.unwrap();
    assert_eq!(server.change_count(), 1);
}
